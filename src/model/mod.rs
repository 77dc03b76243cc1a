pub mod identity;
pub mod issue;
pub mod work_item;

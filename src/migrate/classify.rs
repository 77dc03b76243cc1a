use serde_json::Value;

pub const MULTIPLE_ERRORS: &str = "urn:openproject-org:api:v3:errors:MultipleErrors";
pub const PROPERTY_CONSTRAINT_VIOLATION: &str =
    "urn:openproject-org:api:v3:errors:PropertyConstraintViolation";

/// One flattened entry of a target error response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifiedError {
    pub code: String,
    pub attribute: Option<String>,
}

/// The shape of an OpenProject error body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorEnvelope {
    Single {
        identifier: String,
        attribute: Option<String>,
    },
    Composite(Vec<ErrorEnvelope>),
}

impl ErrorEnvelope {
    /// Returns `None` for anything that is not an error resource.
    pub fn parse(body: &Value) -> Option<Self> {
        if body.get("_type").and_then(Value::as_str) != Some("Error") {
            return None;
        }
        let identifier = body.get("errorIdentifier")?.as_str()?;
        if identifier == MULTIPLE_ERRORS {
            let errors = body
                .pointer("/_embedded/errors")
                .and_then(Value::as_array)
                .map(|errors| errors.iter().filter_map(ErrorEnvelope::parse).collect())
                .unwrap_or_default();
            return Some(ErrorEnvelope::Composite(errors));
        }
        Some(ErrorEnvelope::Single {
            identifier: identifier.to_string(),
            attribute: body
                .pointer("/_embedded/details/attribute")
                .and_then(Value::as_str)
                .map(String::from),
        })
    }

    pub fn flatten(self) -> Vec<ClassifiedError> {
        match self {
            ErrorEnvelope::Single {
                identifier,
                attribute,
            } => vec![ClassifiedError {
                code: identifier,
                attribute,
            }],
            ErrorEnvelope::Composite(errors) => {
                errors.into_iter().flat_map(ErrorEnvelope::flatten).collect()
            }
        }
    }
}

/// Flatten a failure body into `(code, attribute)` pairs, in order.
pub fn classify(body: &Value) -> Vec<ClassifiedError> {
    ErrorEnvelope::parse(body)
        .map(ErrorEnvelope::flatten)
        .unwrap_or_default()
}

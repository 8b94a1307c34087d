use serde_json::Value;

/// Errors raised by datatype declaration and the parameter engine.
#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    /// A declaration is malformed (e.g. the start-optional marker used twice).
    #[error("bad declaration: {0}")]
    Declaration(String),

    /// A required field is absent from the raw mapping.
    #[error("missing required field {field:?}")]
    MissingField { field: String },

    /// A raw value does not match the declared datatype.
    #[error("type mismatch{}: got {value}", field_suffix(.field))]
    TypeMismatch {
        field: Option<String>,
        value: Value,
    },

    /// A composite field is present but only partially specified.
    #[error("incomplete field {field:?}: missing {missing:?}")]
    Incomplete {
        field: String,
        missing: Vec<String>,
    },

    /// The raw mapping carries fields the declaration does not know.
    #[error("unexpected fields: {fields:?}")]
    UnexpectedFields { fields: Vec<String> },

    /// `validate`/`as_data` was called with a value whose shape does not
    /// correspond to the cached match. Coerce first.
    #[error("coerce first")]
    CoerceFirst,

    /// A coerced value failed semantic validation.
    #[error("validation failed: {0}")]
    Validation(String),
}

fn field_suffix(field: &Option<String>) -> String {
    match field {
        Some(name) => format!(" for field {name:?}"),
        None => String::new(),
    }
}

pub type Result<T> = std::result::Result<T, SchemaError>;

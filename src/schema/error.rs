use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while loading a schema or validating a document against it
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("failed to read schema {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed XML: {0}")]
    Malformed(String),

    #[error("invalid schema: {0}")]
    InvalidSchema(String),

    #[error("type '{0}' is not defined in the schema")]
    UnknownType(String),

    #[error("root element '{0}' is not declared in the schema")]
    UnknownRoot(String),

    #[error("{location}: element '{name}' is not allowed here")]
    UnexpectedElement { location: String, name: String },

    #[error("{location}: attribute '{name}' is not allowed here")]
    UnexpectedAttribute { location: String, name: String },

    #[error("{location}: missing required element '{name}'")]
    MissingElement { location: String, name: String },

    #[error("{location}: missing required attribute '{name}'")]
    MissingAttribute { location: String, name: String },

    #[error("{location}: element '{name}' occurs {count} times, at most {max} allowed")]
    TooManyOccurrences {
        location: String,
        name: String,
        count: usize,
        max: u32,
    },

    #[error("{location}: '{value}' is not a valid {expected}")]
    InvalidValue {
        location: String,
        value: String,
        expected: &'static str,
    },

    #[error("{location}: '{value}' is not one of the allowed values")]
    NotInEnumeration { location: String, value: String },
}

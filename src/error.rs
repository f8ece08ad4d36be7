use thiserror::Error;

/// Failures while building a vessel from configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("name '{0}' exceeds 32 bytes")]
    NameTooLong(String),
    #[error("duplicate {kind} name '{name}'")]
    DuplicateName { kind: &'static str, name: String },
    #[error("{kind} '{name}' referenced by {referrer} does not exist")]
    UnknownReference {
        kind: &'static str,
        name: String,
        referrer: String,
    },
    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: &'static str },
    #[error("too many {kind}: {count} (limit {limit})")]
    TooMany {
        kind: &'static str,
        count: usize,
        limit: usize,
    },
    #[error("config JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Failures while decoding a command from its wire form.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("command JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("message of {size} bytes exceeds {limit}")]
    TooLarge { size: usize, limit: usize },
    #[error("{field} must be a finite number")]
    InvalidValue { field: &'static str },
    #[error("unknown {kind} '{name}'")]
    UnknownName { kind: &'static str, name: String },
}

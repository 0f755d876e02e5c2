use thiserror::Error;

/// Errors raised while loading a policy document.
///
/// All of these are detected at parse time; a document that parses
/// successfully can always be evaluated.
#[derive(Error, Debug)]
pub enum PolicyParseError {
    #[error("Malformed policy document: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid effect '{0}' (expected \"Allow\" or \"Deny\")")]
    InvalidEffect(String),

    #[error("Invalid pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("Statement {index} is missing {field}")]
    MissingField { index: usize, field: &'static str },

    #[error("Statement {index} sets both {first} and {second}")]
    ConflictingFields {
        index: usize,
        first: &'static str,
        second: &'static str,
    },

    #[error("Policy must have at least one statement")]
    EmptyPolicy,

    #[error("Policy document has no Version")]
    MissingVersion,

    #[error("Unsupported policy version: {0}")]
    UnsupportedVersion(String),

    #[error("Invalid condition: {0}")]
    InvalidCondition(String),
}

/// Errors raised by the policy store and configuration loading.
#[derive(Error, Debug)]
pub enum IamError {
    #[error("Policy parse error: {0}")]
    Parse(#[from] PolicyParseError),

    #[error("Invalid name: {0} (allowed: letters, digits and +=,.@_-, up to 128 characters)")]
    InvalidName(String),

    #[error("Policy already exists: {0}")]
    PolicyAlreadyExists(String),

    #[error("No such policy: {0}")]
    NoSuchPolicy(String),

    #[error("User already exists: {0}")]
    UserAlreadyExists(String),

    #[error("No such user: {0}")]
    NoSuchUser(String),

    #[error("Policy {policy} is not attached to {user}")]
    PolicyNotAttached { policy: String, user: String },

    #[error("Cannot delete {0}: it still has attachments")]
    DeleteConflict(String),

    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, IamError>;

use thiserror::Error;

/// Recoverable error classes of the screening core. None of these is fatal:
/// configuration problems degrade to an empty rule set, permission problems
/// fail open on the affected check, and malformed input yields a neutral
/// result. Persistence failures are the only class surfaced to the caller
/// as a failed operation.
#[derive(Debug, Error)]
pub enum ScreenError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("malformed input: {0}")]
    MalformedInput(String),

    #[error("persistence error: {0}")]
    Persistence(String),
}

pub type Result<T> = std::result::Result<T, ScreenError>;

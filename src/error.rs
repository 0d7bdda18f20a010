/// Error type for input-boost operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The floor backend or the activity source could not be acquired at start-up
    #[error("Initialization failed: {0}")]
    InitializationFailure(String),

    /// The constraint handle was never acquired or has already been released
    #[error("Resource constraint unavailable")]
    ConstraintUnavailable,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("System call error: {0}")]
    System(String),
}

impl Error {
    pub(crate) fn initialization<S: Into<String>>(msg: S) -> Self {
        Error::InitializationFailure(msg.into())
    }

    pub(crate) fn invalid_config<S: Into<String>>(msg: S) -> Self {
        Error::InvalidConfig(msg.into())
    }

    pub(crate) fn system<S: Into<String>>(msg: S) -> Self {
        Error::System(msg.into())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::InvalidConfig(err.to_string())
    }
}

/// Result type for input-boost operations
pub type Result<T> = std::result::Result<T, Error>;

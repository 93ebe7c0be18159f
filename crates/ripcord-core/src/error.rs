//! Error types for Ripcord

/// Result type alias using [`Error`]
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Main error type for Ripcord
///
/// An interrupt is deliberately absent from this enum: a signal-driven
/// shutdown completes `serve()` normally and is reported through the
/// serve outcome instead.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Startup handshake failed (bind, lifespan startup)
    #[error("Startup failed: {0}")]
    Startup(String),

    /// Lifespan hook error
    #[error("Lifespan error: {0}")]
    Lifespan(String),

    /// Lifecycle misuse, such as serving the same instance twice
    #[error("Lifecycle error: {0}")]
    Lifecycle(String),

    /// Application failed while handling a single request
    #[error("Application error: {0}")]
    Application(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Connection-level HTTP error
    #[error("HTTP error: {0}")]
    Http(#[from] hyper::Error),

    /// HTTP message construction error
    #[error("HTTP error: {0}")]
    HttpError(#[from] http::Error),

    /// Runtime error
    #[error("Runtime error: {0}")]
    Runtime(String),

    /// Internal error (should not happen in production)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Convert error to HTTP status code
    pub fn to_status_code(&self) -> http::StatusCode {
        use http::StatusCode;
        match self {
            Error::Http(_) => StatusCode::BAD_REQUEST,
            Error::Startup(_) | Error::Lifecycle(_) => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Whether this error aborted the server before it started serving
    pub fn is_startup_failure(&self) -> bool {
        matches!(self, Error::Startup(_))
    }

    /// Create an application error
    pub fn application(message: impl Into<String>) -> Self {
        Error::Application(message.into())
    }
}

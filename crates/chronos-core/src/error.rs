use std::fmt;

/// Main error type for chronos
#[derive(Debug)]
pub enum Error {
    /// Configuration errors
    Config(String),

    /// Missing job or execution
    NotFound(String),

    /// Bad cron expression, scheduled time in the past, or a missing
    /// required field for the schedule type
    InvalidSchedule(String),

    /// Action not permitted in the job's current lifecycle state
    IllegalStateTransition(String),

    /// Queue backend unreachable
    QueueUnavailable(String),

    /// Store backend unreachable (SQLx wrapped)
    StoreUnavailable(sqlx::Error),

    /// Attempt exceeded its configured timeout (milliseconds)
    TimeoutElapsed(u64),

    /// Executor returned non-success
    AdapterFailure(String),

    /// Serialization/deserialization errors
    Serialization(serde_json::Error),

    /// IO errors
    Io(std::io::Error),

    /// Generic errors with description
    Other(String),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Config(msg) => write!(f, "Configuration error: {}", msg),
            Error::NotFound(msg) => write!(f, "Not found: {}", msg),
            Error::InvalidSchedule(msg) => write!(f, "Invalid schedule: {}", msg),
            Error::IllegalStateTransition(msg) => write!(f, "Illegal state transition: {}", msg),
            Error::QueueUnavailable(msg) => write!(f, "Queue unavailable: {}", msg),
            Error::StoreUnavailable(e) => write!(f, "Store unavailable: {}", e),
            Error::TimeoutElapsed(ms) => write!(f, "Attempt timed out after {}ms", ms),
            Error::AdapterFailure(msg) => write!(f, "Adapter failure: {}", msg),
            Error::Serialization(e) => write!(f, "Serialization error: {}", e),
            Error::Io(e) => write!(f, "IO error: {}", e),
            Error::Other(msg) => write!(f, "Error: {}", msg),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::StoreUnavailable(e) => Some(e),
            Error::Serialization(e) => Some(e),
            Error::Io(e) => Some(e),
            _ => None,
        }
    }
}

// Conversions from external error types
impl From<sqlx::Error> for Error {
    fn from(error: sqlx::Error) -> Self {
        match error {
            sqlx::Error::RowNotFound => Error::NotFound("row not found".to_string()),
            other => Error::StoreUnavailable(other),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(error: serde_json::Error) -> Self {
        Error::Serialization(error)
    }
}

impl From<std::io::Error> for Error {
    fn from(error: std::io::Error) -> Self {
        Error::Io(error)
    }
}

impl From<toml::de::Error> for Error {
    fn from(error: toml::de::Error) -> Self {
        Error::Config(error.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(error: reqwest::Error) -> Self {
        Error::AdapterFailure(error.to_string())
    }
}

impl From<redis::RedisError> for Error {
    fn from(error: redis::RedisError) -> Self {
        Error::QueueUnavailable(error.to_string())
    }
}

impl From<uuid::Error> for Error {
    fn from(error: uuid::Error) -> Self {
        Error::Other(format!("Invalid UUID: {}", error))
    }
}

// Common error constructors
impl Error {
    /// Create a new configuration error
    pub fn config<T: Into<String>>(msg: T) -> Self {
        Error::Config(msg.into())
    }

    /// Create a new not found error
    pub fn not_found<T: Into<String>>(msg: T) -> Self {
        Error::NotFound(msg.into())
    }

    /// Create a new invalid schedule error
    pub fn invalid_schedule<T: Into<String>>(msg: T) -> Self {
        Error::InvalidSchedule(msg.into())
    }

    /// Create a new illegal state transition error
    pub fn illegal_transition<T: Into<String>>(msg: T) -> Self {
        Error::IllegalStateTransition(msg.into())
    }

    /// Create a new queue unavailable error
    pub fn queue<T: Into<String>>(msg: T) -> Self {
        Error::QueueUnavailable(msg.into())
    }

    /// Create a new adapter failure error
    pub fn adapter<T: Into<String>>(msg: T) -> Self {
        Error::AdapterFailure(msg.into())
    }
}

impl Error {
    /// Get HTTP-equivalent status code for error
    pub fn status_code(&self) -> u16 {
        match self {
            Error::NotFound(_) => 404,
            Error::InvalidSchedule(_) => 400,
            Error::IllegalStateTransition(_) => 409,
            Error::QueueUnavailable(_) => 503,
            Error::StoreUnavailable(_) => 503,
            Error::Config(_) => 500,
            Error::TimeoutElapsed(_) => 504,
            Error::AdapterFailure(_) => 502,
            Error::Serialization(_) => 500,
            Error::Io(_) => 500,
            Error::Other(_) => 500,
        }
    }

    /// Get error category for monitoring
    pub fn category(&self) -> &'static str {
        match self {
            Error::Config(_) => "config",
            Error::NotFound(_) => "not_found",
            Error::InvalidSchedule(_) => "invalid_schedule",
            Error::IllegalStateTransition(_) => "illegal_transition",
            Error::QueueUnavailable(_) => "queue",
            Error::StoreUnavailable(_) => "store",
            Error::TimeoutElapsed(_) => "timeout",
            Error::AdapterFailure(_) => "adapter",
            Error::Serialization(_) => "serialization",
            Error::Io(_) => "io",
            Error::Other(_) => "other",
        }
    }

    /// Infrastructure errors are retried/NACKed rather than recorded on the
    /// attempt
    pub fn is_infrastructure(&self) -> bool {
        matches!(self, Error::QueueUnavailable(_) | Error::StoreUnavailable(_))
    }
}

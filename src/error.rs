use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("No generator registered for content type '{0}'")]
    NoGenerator(String),

    #[error("Generation of {content_type} failed: {source}")]
    Generation {
        content_type: String,
        #[source]
        source: Box<EngineError>,
    },

    #[error("Bootstrap stage '{stage}' failed: {source}")]
    BootstrapStage {
        stage: String,
        #[source]
        source: Box<EngineError>,
    },

    #[error("Circuit breaker '{0}' is open")]
    CircuitOpen(String),

    #[error("Retry attempts exhausted after {attempts}: {source}")]
    RetryExhausted {
        attempts: u32,
        #[source]
        source: Box<EngineError>,
    },

    #[error("Operation cancelled: {0}")]
    Cancelled(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, EngineError>;

// Error conversions for common error types

impl From<serde_json::Error> for EngineError {
    fn from(e: serde_json::Error) -> Self {
        EngineError::Serialization(e.to_string())
    }
}

impl From<serde_yaml::Error> for EngineError {
    fn from(e: serde_yaml::Error) -> Self {
        EngineError::Serialization(e.to_string())
    }
}

impl EngineError {
    /// Peel resilience framing to reach the error the operation itself produced.
    pub fn root_cause(&self) -> &EngineError {
        match self {
            EngineError::Generation { source, .. }
            | EngineError::BootstrapStage { source, .. }
            | EngineError::RetryExhausted { source, .. } => source.root_cause(),
            other => other,
        }
    }

    pub fn is_cancellation(&self) -> bool {
        matches!(self.root_cause(), EngineError::Cancelled(_))
    }
}

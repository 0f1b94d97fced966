use thiserror::Error;

#[derive(Error, Debug)]
pub enum AutomationError {
    #[error("No element matched {selectors:?} within {timeout_ms}ms")]
    ElementNotFound {
        selectors: Vec<String>,
        timeout_ms: u64,
    },

    #[error("Element '{0}' has no layout box")]
    ElementNotVisible(String),

    #[error("Response did not settle after {elapsed_ms}ms")]
    ResponseTimeout { elapsed_ms: u64 },

    #[error("No JSON candidate could be extracted from the response")]
    ExtractionEmpty,

    #[error("Validation failed: {}", .violations.join("; "))]
    ValidationFailed { violations: Vec<String> },

    #[error("{0}")]
    SaveFailed(String),

    #[error("Browser launch failed: {0}")]
    LaunchFailed(String),

    #[error("Navigation failed: {0}")]
    NavigationFailed(String),

    #[error("No active tab")]
    NoActiveTab,

    #[error("JavaScript execution failed: {0}")]
    JavaScriptFailed(String),

    #[error("Unknown site adapter: {0}")]
    UnknownAdapter(String),

    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Anyhow error: {0}")]
    AnyhowError(String),
}

pub type Result<T> = std::result::Result<T, AutomationError>;

// headless_chrome reports everything as anyhow::Error
impl From<anyhow::Error> for AutomationError {
    fn from(err: anyhow::Error) -> Self {
        AutomationError::AnyhowError(err.to_string())
    }
}

impl AutomationError {
    /// Stable kind name used as the prefix of message-bus `error` fields.
    pub fn kind(&self) -> &'static str {
        match self {
            AutomationError::ElementNotFound { .. } => "ElementNotFound",
            AutomationError::ElementNotVisible(_) => "ElementNotVisible",
            AutomationError::ResponseTimeout { .. } => "ResponseTimeout",
            AutomationError::ExtractionEmpty => "ExtractionEmpty",
            AutomationError::ValidationFailed { .. } => "ValidationFailed",
            AutomationError::SaveFailed(_) => "SaveFailed",
            AutomationError::LaunchFailed(_) => "LaunchFailed",
            AutomationError::NavigationFailed(_) => "NavigationFailed",
            AutomationError::NoActiveTab => "NoActiveTab",
            AutomationError::JavaScriptFailed(_) => "JavaScriptFailed",
            AutomationError::UnknownAdapter(_) => "UnknownAdapter",
            AutomationError::ConfigurationError(_) => "ConfigurationError",
            AutomationError::SerializationError(_) => "SerializationError",
            AutomationError::IoError(_) => "IoError",
            AutomationError::AnyhowError(_) => "InternalError",
        }
    }

    pub fn from_any_error<E: std::fmt::Display>(err: E) -> Self {
        AutomationError::JavaScriptFailed(err.to_string())
    }

    /// `"<Kind>: <message>"`, the form handed back over the message bus.
    pub fn to_bus_message(&self) -> String {
        format!("{}: {}", self.kind(), self)
    }
}

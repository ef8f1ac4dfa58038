use crate::executor::ExecutorState;
use thiserror::Error;

/// Boxed error carried by [`Error::OperationFailed`].
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Structured error context for configuration problems.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorContext {
    /// Field path or configuration key that caused the error (e.g., "throttle.burst_size")
    pub field_path: Option<String>,
    /// Additional context about the error (e.g., expected range, actual value)
    pub details: Option<String>,
    /// Source of the error (e.g., "throttle_config")
    pub source: Option<String>,
}

impl ErrorContext {
    pub fn new() -> Self {
        Self {
            field_path: None,
            details: None,
            source: None,
        }
    }

    pub fn with_field_path(mut self, path: impl Into<String>) -> Self {
        self.field_path = Some(path.into());
        self
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }
}

impl Default for ErrorContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Unified error type for executors and batchers.
#[derive(Debug, Error)]
pub enum Error {
    /// The operation body returned an error or panicked. Isolated to that operation.
    #[error("operation failed: {source}")]
    OperationFailed {
        #[source]
        source: BoxError,
    },

    /// The operation observed cancellation, or was still queued when the executor was cancelled.
    #[error("operation cancelled")]
    Cancelled,

    /// The executor no longer accepts submissions.
    #[error("executor is {state} and does not accept new operations")]
    InvalidState { state: ExecutorState },

    /// The worker halted before this operation could be resolved.
    #[error("executor worker halted: {message}")]
    FatalWorkerFailure { message: String },

    #[error("Configuration error: {message}{}", format_context(.context))]
    Configuration {
        message: String,
        context: ErrorContext,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

// Helper function to format error context for display
fn format_context(ctx: &ErrorContext) -> String {
    let mut parts = Vec::new();
    if let Some(ref field) = ctx.field_path {
        parts.push(format!("field: {}", field));
    }
    if let Some(ref details) = ctx.details {
        parts.push(format!("details: {}", details));
    }
    if let Some(ref source) = ctx.source {
        parts.push(format!("source: {}", source));
    }
    if parts.is_empty() {
        String::new()
    } else {
        format!(" ({})", parts.join(", "))
    }
}

impl Error {
    /// Wrap an operation body's error.
    pub fn operation_failed(source: impl Into<BoxError>) -> Self {
        Error::OperationFailed {
            source: source.into(),
        }
    }

    pub(crate) fn worker_halted() -> Self {
        Error::FatalWorkerFailure {
            message: "worker stopped before the operation was resolved".to_string(),
        }
    }

    /// Create a new configuration error with structured context
    pub fn configuration_with_context(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::Configuration {
            message: msg.into(),
            context,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled)
    }

    pub fn is_invalid_state(&self) -> bool {
        matches!(self, Error::InvalidState { .. })
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::FatalWorkerFailure { .. })
    }

    /// Extract error context if available
    pub fn context(&self) -> Option<&ErrorContext> {
        match self {
            Error::Configuration { context, .. } => Some(context),
            _ => None,
        }
    }
}

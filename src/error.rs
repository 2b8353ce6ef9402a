use thiserror::Error;

/// Main error type for LedgerLens
#[derive(Error, Debug)]
pub enum LedgerError {
    /// No file selected, malformed row/cell data, missing document id
    #[error("Invalid input: {message}")]
    Input { message: String },

    /// Non-success HTTP status or network failure talking to the extractor
    #[error("Extraction backend error{}: {detail}", .status.map(|s| format!(" (HTTP {})", s)).unwrap_or_default())]
    Transport { status: Option<u16>, detail: String },

    /// A page image or token file that could not be loaded
    #[error("Resource unavailable: {resource}: {detail}")]
    Resource { resource: String, detail: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("File I/O error: {path}")]
    FileIO {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("General error: {0}")]
    General(#[from] anyhow::Error),
}

impl LedgerError {
    pub fn input(message: impl Into<String>) -> Self {
        Self::Input {
            message: message.into(),
        }
    }

    pub fn transport(status: Option<u16>, detail: impl Into<String>) -> Self {
        Self::Transport {
            status,
            detail: detail.into(),
        }
    }

    pub fn resource(resource: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::Resource {
            resource: resource.into(),
            detail: detail.into(),
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    pub fn file_io(path: impl Into<String>, source: std::io::Error) -> Self {
        Self::FileIO {
            path: path.into(),
            source,
        }
    }

    /// Check if error is recoverable (the session stays usable)
    pub fn is_recoverable(&self) -> bool {
        match self {
            LedgerError::Input { .. } => true,
            LedgerError::Transport { .. } => true,
            LedgerError::Http(_) => true,
            LedgerError::Resource { .. } => true,
            LedgerError::Configuration { .. } => false,
            _ => true,
        }
    }

    /// Get the notice shown to the user
    pub fn user_message(&self) -> String {
        match self {
            LedgerError::Input { message } => message.clone(),
            LedgerError::Transport {
                status: Some(status),
                detail,
            } => format!("Extraction backend answered with status {}: {}", status, detail),
            LedgerError::Transport { status: None, detail } => {
                format!("Could not reach the extraction backend: {}", detail)
            }
            LedgerError::Http(_) => "Could not reach the extraction backend.".to_string(),
            LedgerError::Resource { resource, .. } => format!("{} is unavailable.", resource),
            LedgerError::FileIO { path, .. } => {
                format!("File access error on {}. Check permissions and disk space.", path)
            }
            LedgerError::Json(_) => "The extraction data is not valid JSON.".to_string(),
            LedgerError::Configuration { message } => format!("Configuration problem: {}", message),
            LedgerError::General(_) => "Something went wrong. Check the logs for details.".to_string(),
        }
    }
}

/// Result type alias for convenience
pub type LedgerResult<T> = Result<T, LedgerError>;

/// Attach a path to I/O failures
pub trait ErrorContext<T> {
    fn with_path(self, path: &std::path::Path) -> LedgerResult<T>;
}

impl<T> ErrorContext<T> for Result<T, std::io::Error> {
    fn with_path(self, path: &std::path::Path) -> LedgerResult<T> {
        self.map_err(|e| LedgerError::file_io(path.display().to_string(), e))
    }
}

use thiserror::Error;

/// Why a page analysis failed.
///
/// Every variant leaves the page in the failed state. Only
/// [`AnalysisError::MissingCredential`] asks the user to act on settings;
/// the other two are recovered by uploading the image again.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AnalysisError {
    /// No API key was available when the page was uploaded
    #[error("API key is missing, set one in the credential settings")]
    MissingCredential,

    /// The analysis request could not complete
    #[error("analysis request failed: {0}")]
    Transport(String),

    /// The model answered with something that is not a list of translation items
    #[error("analysis response could not be parsed: {0}")]
    MalformedResponse(String),
}

impl AnalysisError {
    /// Stable reason tag, as used in logs and user messages.
    pub const fn reason(&self) -> &'static str {
        match self {
            Self::MissingCredential => "missing-credential",
            Self::Transport(_) => "transport",
            Self::MalformedResponse(_) => "malformed-response",
        }
    }

    pub const fn requires_credential(&self) -> bool {
        matches!(self, Self::MissingCredential)
    }

    /// Message shown to the user when a page fails to analyze.
    pub fn user_message(&self) -> String {
        match self {
            Self::MissingCredential => {
                "No API key found. Add your key in the project settings, then upload the page again."
                    .to_string()
            }
            Self::Transport(_) | Self::MalformedResponse(_) => {
                "Image analysis failed. Upload the page again to retry.".to_string()
            }
        }
    }
}

/// Unified error type for manhua-core
///
/// This enum encompasses all error cases that can occur in the library:
/// - Page analysis (credential, transport, response parsing)
/// - Editing operations against pages and translation items
/// - Durable storage (opening, reading, writing)
/// - Configuration operations (loading, validation)
/// - General I/O operations
#[derive(Error, Debug)]
pub enum Error {
    // ==========================================================================
    // Analysis Errors
    // ==========================================================================
    #[error(transparent)]
    Analysis(#[from] AnalysisError),

    // ==========================================================================
    // Editing Errors
    // ==========================================================================
    /// No page with this id exists in the collection
    #[error("page not found: {0}")]
    PageNotFound(String),

    /// There is no active page to operate on
    #[error("no active page")]
    NoActivePage,

    /// The page is still waiting for its analysis result
    #[error("page {0} is still being analyzed")]
    PageAnalyzing(String),

    /// No translation item with this id exists on the page
    #[error("translation item {item} not found on page {page}")]
    ItemNotFound { page: String, item: u32 },

    /// Rejected user input (blank glossary term, unknown alias, ...)
    #[error("invalid input: {0}")]
    InvalidInput(String),

    // ==========================================================================
    // Storage Errors
    // ==========================================================================
    /// Failed to open the durable store
    #[error("failed to open store: {0}")]
    StoreOpen(String),

    /// Failed to read from the durable store
    #[error("failed to read from store: {0}")]
    StoreRead(String),

    /// Failed to write to the durable store
    #[error("failed to write to store: {0}")]
    StoreWrite(String),

    /// Stored data under a key could not be decoded
    #[error("stored data under '{key}' is unreadable: {reason}")]
    StoreParse { key: String, reason: String },

    // ==========================================================================
    // Configuration Errors
    // ==========================================================================
    /// Failed to load configuration file
    #[error("failed to load config: {0}")]
    ConfigLoad(String),

    /// Invalid configuration value
    #[error("invalid config value for '{field}': {reason}")]
    ConfigInvalid { field: String, reason: String },

    // ==========================================================================
    // I/O Errors
    // ==========================================================================
    /// General I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_analysis_reason_tags() {
        assert_eq!(AnalysisError::MissingCredential.reason(), "missing-credential");
        assert_eq!(AnalysisError::Transport("x".into()).reason(), "transport");
        assert_eq!(
            AnalysisError::MalformedResponse("x".into()).reason(),
            "malformed-response"
        );
    }

    #[test]
    fn test_only_missing_credential_redirects() {
        assert!(AnalysisError::MissingCredential.requires_credential());
        assert!(!AnalysisError::Transport("timeout".into()).requires_credential());
    }

    #[test]
    fn test_analysis_error_wraps_transparently() {
        let err: Error = AnalysisError::Transport("HTTP 503".into()).into();
        assert_eq!(err.to_string(), "analysis request failed: HTTP 503");
    }

    #[test]
    fn test_item_not_found_display() {
        let err = Error::ItemNotFound {
            page: "p1".into(),
            item: 7,
        };
        assert_eq!(err.to_string(), "translation item 7 not found on page p1");
    }
}

//! Error taxonomy for Gemini generation calls.

/// Provider message that signals the selected API key does not exist.
pub const CREDENTIAL_NOT_FOUND_MARKER: &str = "Requested entity was not found.";

/// Coarse classification of a [`GenaiError`], used for user-facing messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Auth,
    InvalidInput,
    GenerationFailed,
    ResultMissing,
    DownloadFailed,
    Timeout,
    UnknownProvider,
}

/// Errors that can occur while talking to the generation provider.
#[derive(Debug, thiserror::Error)]
pub enum GenaiError {
    #[error("Authentication failed: {message}")]
    Auth {
        /// Why the credential was rejected or missing
        message: String,
    },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Generation failed: {0}")]
    GenerationFailed(String),

    #[error("Video generation completed, but no download link was found.")]
    ResultMissing,

    #[error("Failed to download video (status {status}): {message}")]
    DownloadFailed {
        /// HTTP status code of the download response
        status: u16,
        /// Response body or reason phrase
        message: String,
    },

    #[error("Video generation did not finish after {attempts} status checks")]
    Timeout {
        /// Number of poll requests issued before giving up
        attempts: u32,
    },

    #[error("Provider error: {0}")]
    UnknownProvider(String),

    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Invalid base64 payload: {0}")]
    DecodeError(#[from] base64::DecodeError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl GenaiError {
    /// Error returned when no API key is available at call time.
    pub fn missing_key() -> Self {
        GenaiError::Auth {
            message: "API key has not been selected".to_string(),
        }
    }

    /// Classify this error.
    ///
    /// Transport and decoding failures have no dedicated class and are
    /// reported as provider errors.
    pub fn kind(&self) -> ErrorKind {
        match self {
            GenaiError::Auth { .. } => ErrorKind::Auth,
            GenaiError::InvalidInput(_) => ErrorKind::InvalidInput,
            GenaiError::GenerationFailed(_) => ErrorKind::GenerationFailed,
            GenaiError::ResultMissing => ErrorKind::ResultMissing,
            GenaiError::DownloadFailed { .. } => ErrorKind::DownloadFailed,
            GenaiError::Timeout { .. } => ErrorKind::Timeout,
            GenaiError::UnknownProvider(_)
            | GenaiError::HttpError(_)
            | GenaiError::DecodeError(_)
            | GenaiError::IoError(_) => ErrorKind::UnknownProvider,
        }
    }

    /// True when the provider reported that the API key entity does not exist.
    pub fn is_credential_not_found(&self) -> bool {
        self.to_string().contains(CREDENTIAL_NOT_FOUND_MARKER)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(
            GenaiError::ResultMissing.to_string(),
            "Video generation completed, but no download link was found."
        );
        assert_eq!(
            GenaiError::InvalidInput("empty prompt".to_string()).to_string(),
            "Invalid input: empty prompt"
        );
        assert_eq!(
            GenaiError::Timeout { attempts: 3 }.to_string(),
            "Video generation did not finish after 3 status checks"
        );
    }

    #[test]
    fn test_kind_classification() {
        assert_eq!(GenaiError::missing_key().kind(), ErrorKind::Auth);
        assert_eq!(GenaiError::ResultMissing.kind(), ErrorKind::ResultMissing);
        assert_eq!(
            GenaiError::DownloadFailed {
                status: 404,
                message: "gone".to_string()
            }
            .kind(),
            ErrorKind::DownloadFailed
        );
        assert_eq!(
            GenaiError::UnknownProvider("boom".to_string()).kind(),
            ErrorKind::UnknownProvider
        );
    }

    #[test]
    fn test_credential_not_found_detection() {
        let err = GenaiError::UnknownProvider(
            "Requested entity was not found.".to_string(),
        );
        assert!(err.is_credential_not_found());

        let err = GenaiError::UnknownProvider("Internal error".to_string());
        assert!(!err.is_credential_not_found());
    }
}

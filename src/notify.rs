use crate::error::MonitorError;
use crate::job::ArtifactLink;

pub const DEFAULT_SUCCESS_MESSAGE: &str = "PDF generated successfully";
pub const DEFAULT_ERROR_MESSAGE: &str = "Failed to generate PDF";
pub const DEFAULT_GENERATION_FAILED_MESSAGE: &str = "PDF generation failed";

/// User-facing feedback for one generation attempt.
///
/// Every attempt ends in exactly one `success` or `error` call, unless it was
/// cancelled or replaced, in which case it ends silently.
pub trait Notifier: Send + Sync {
    /// Hand a freshly issued link to the platform's open/download affordance.
    fn open_artifact(&self, link: &ArtifactLink);

    fn success(&self, message: &str);

    fn error(&self, error: &MonitorError, message: &str);
}

/// Caller-provided overrides for the notification text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GenerateOptions {
    pub success_message: Option<String>,
    pub error_message: Option<String>,
}

impl GenerateOptions {
    pub fn with_success_message(mut self, message: impl Into<String>) -> Self {
        self.success_message = Some(message.into());
        self
    }

    pub fn with_error_message(mut self, message: impl Into<String>) -> Self {
        self.error_message = Some(message.into());
        self
    }

    pub fn success_text(&self) -> &str {
        self.success_message
            .as_deref()
            .unwrap_or(DEFAULT_SUCCESS_MESSAGE)
    }

    /// Server-supplied detail wins, then the caller's message, then a
    /// fallback that depends on how the attempt failed. Only a failure in
    /// the start response gets the "generation failed" text.
    pub fn error_text<'a>(&'a self, error: &'a MonitorError) -> &'a str {
        if let Some(message) = error.server_message() {
            return message;
        }
        if let Some(message) = self.error_message.as_deref() {
            return message;
        }
        match error {
            MonitorError::GenerationFailure { polled: false, .. } => {
                DEFAULT_GENERATION_FAILED_MESSAGE
            }
            _ => DEFAULT_ERROR_MESSAGE,
        }
    }
}

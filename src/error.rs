use thiserror::Error;

use crate::graphql::ClientError;
use crate::job::{JobId, JobStatus, ObservedStatus, ResourceType};

/// Everything that can end a generation attempt early.
///
/// None of these are fatal to the process; each is scoped to one attempt and
/// is turned into a single user notification at the orchestrator boundary.
#[derive(Debug, Error)]
pub enum MonitorError {
    /// The job-creation call itself failed. Not retried; the user resubmits.
    #[error("failed to start generation job: {0}")]
    StartFailure(#[source] ClientError),

    /// The executor reported a failure terminal.
    #[error("generation job {job_id} ended as {status}")]
    GenerationFailure {
        job_id: JobId,
        status: JobStatus,
        /// Server-supplied detail, preferred over the generic fallback.
        message: Option<String>,
        /// Seen on a status check rather than in the start response.
        polled: bool,
    },

    #[error("generation job {job_id} reported unexpected status {status:?}")]
    UnexpectedStatus { job_id: JobId, status: String },

    /// A status check failed on the wire. Polling stops; it is not retried.
    #[error("status check for job {job_id} failed: {source}")]
    PollTransportFailure {
        job_id: JobId,
        #[source]
        source: ClientError,
    },

    /// The job completed but no download link could be obtained.
    #[error("no download link issued for job {job_id}")]
    LinkIssuanceFailure {
        job_id: JobId,
        #[source]
        source: Option<ClientError>,
    },

    #[error("generation job {job_id} still pending after {polls} status checks")]
    PollTimeout { job_id: JobId, polls: u32 },

    #[error("no status query registered for {0}")]
    UnroutableResource(ResourceType),
}

impl MonitorError {
    /// The error for a job whose start response classified as a failure.
    pub fn from_failed_status(
        job_id: JobId,
        status: &ObservedStatus,
        message: Option<String>,
    ) -> Self {
        match status {
            ObservedStatus::Known(status) => MonitorError::GenerationFailure {
                job_id,
                status: *status,
                message,
                polled: false,
            },
            ObservedStatus::Unrecognized(raw) => MonitorError::UnexpectedStatus {
                job_id,
                status: raw.clone(),
            },
        }
    }

    /// Same as [`from_failed_status`](Self::from_failed_status), for a failure
    /// seen while polling.
    pub fn from_polled_status(
        job_id: JobId,
        status: &ObservedStatus,
        message: Option<String>,
    ) -> Self {
        let mut err = Self::from_failed_status(job_id, status, message);
        if let MonitorError::GenerationFailure { polled, .. } = &mut err {
            *polled = true;
        }
        err
    }

    /// The server-supplied message, if the failure carries one.
    pub fn server_message(&self) -> Option<&str> {
        match self {
            MonitorError::GenerationFailure {
                message: Some(message),
                ..
            } if !message.trim().is_empty() => Some(message.as_str()),
            _ => None,
        }
    }
}

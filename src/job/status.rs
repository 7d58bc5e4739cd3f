use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// The closed set of states a generation job can report.
///
/// `Completed` is the only success terminal; `Failed` and `Removed` are
/// failure terminals; `Pending` is the only non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Pending,
    Completed,
    Failed,
    Removed,
}

/// Which bucket a status falls into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusClass {
    InProgress,
    Succeeded,
    Failed,
}

impl StatusClass {
    pub fn is_terminal(self) -> bool {
        !matches!(self, StatusClass::InProgress)
    }
}

impl JobStatus {
    pub fn class(self) -> StatusClass {
        match self {
            JobStatus::Pending => StatusClass::InProgress,
            JobStatus::Completed => StatusClass::Succeeded,
            JobStatus::Failed | JobStatus::Removed => StatusClass::Failed,
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobStatus::Pending => write!(f, "PENDING"),
            JobStatus::Completed => write!(f, "COMPLETED"),
            JobStatus::Failed => write!(f, "FAILED"),
            JobStatus::Removed => write!(f, "REMOVED"),
        }
    }
}

/// Returned when a wire value is not one of the known statuses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownStatus(pub String);

impl FromStr for JobStatus {
    type Err = UnknownStatus;

    /// Parses document statuses (`PENDING`, `COMPLETED`, ...) as well as the
    /// report executor's run states (`queued`, `running`, `success`, `failed`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" | "queued" | "running" => Ok(JobStatus::Pending),
            "completed" | "success" => Ok(JobStatus::Completed),
            "failed" => Ok(JobStatus::Failed),
            "removed" => Ok(JobStatus::Removed),
            _ => Err(UnknownStatus(s.to_string())),
        }
    }
}

/// A status exactly as the server reported it.
///
/// Values outside [`JobStatus`] are kept verbatim so they can be reported,
/// and they classify as failures so nothing polls forever on them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ObservedStatus {
    Known(JobStatus),
    Unrecognized(String),
}

impl ObservedStatus {
    pub fn class(&self) -> StatusClass {
        match self {
            ObservedStatus::Known(status) => status.class(),
            ObservedStatus::Unrecognized(_) => StatusClass::Failed,
        }
    }

    pub fn known(&self) -> Option<JobStatus> {
        match self {
            ObservedStatus::Known(status) => Some(*status),
            ObservedStatus::Unrecognized(_) => None,
        }
    }
}

impl From<String> for ObservedStatus {
    fn from(raw: String) -> Self {
        match raw.parse::<JobStatus>() {
            Ok(status) => ObservedStatus::Known(status),
            Err(UnknownStatus(raw)) => ObservedStatus::Unrecognized(raw),
        }
    }
}

impl From<JobStatus> for ObservedStatus {
    fn from(status: JobStatus) -> Self {
        ObservedStatus::Known(status)
    }
}

impl From<ObservedStatus> for String {
    fn from(status: ObservedStatus) -> Self {
        status.to_string()
    }
}

impl fmt::Display for ObservedStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ObservedStatus::Known(status) => write!(f, "{status}"),
            ObservedStatus::Unrecognized(raw) => write!(f, "{raw}"),
        }
    }
}

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::status::ObservedStatus;

/// Opaque identifier assigned to a job by the external executor.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(String);

impl JobId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for JobId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// The kind of artifact a job produces. Selects the status query used while
/// polling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceType {
    LoanAgreement,
    CreditFacilityExport,
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceType::LoanAgreement => write!(f, "LoanAgreement"),
            ResourceType::CreditFacilityExport => write!(f, "CreditFacilityExport"),
        }
    }
}

impl FromStr for ResourceType {
    type Err = String;

    /// Parses the GraphQL `__typename` of a generated document.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "LoanAgreement" => Ok(ResourceType::LoanAgreement),
            "CreditFacilityExport" => Ok(ResourceType::CreditFacilityExport),
            other => Err(other.to_string()),
        }
    }
}

/// What to generate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobInput {
    LoanAgreement { customer_id: Uuid },
    CreditFacilityExport,
}

impl JobInput {
    /// The resource type the executor is expected to answer with.
    pub fn resource_type(&self) -> ResourceType {
        match self {
            JobInput::LoanAgreement { .. } => ResourceType::LoanAgreement,
            JobInput::CreditFacilityExport => ResourceType::CreditFacilityExport,
        }
    }
}

/// The descriptor returned by a successful start call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartedJob {
    pub id: JobId,
    pub resource_type: ResourceType,
    pub status: ObservedStatus,
    pub created_at: DateTime<Utc>,
}

/// One long-running unit of work, tracked for the lifetime of a single
/// `generate()` attempt. The executor is the source of truth; nothing here
/// is persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationJob {
    pub id: JobId,
    pub resource_type: ResourceType,
    pub status: ObservedStatus,
    pub created_at: DateTime<Utc>,
}

impl From<StartedJob> for GenerationJob {
    fn from(started: StartedJob) -> Self {
        Self {
            id: started.id,
            resource_type: started.resource_type,
            status: started.status,
            created_at: started.created_at,
        }
    }
}

impl GenerationJob {
    /// Record a status reported by the executor.
    pub fn observe(&mut self, status: ObservedStatus) {
        self.status = status;
    }
}

/// One status reading for a job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusSnapshot {
    pub status: ObservedStatus,
    /// Server-supplied failure detail, when the query exposes one.
    pub error: Option<String>,
}

/// A short-lived download URL. Fetched fresh on every resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactLink {
    pub job_id: JobId,
    pub url: String,
    pub issued_at: DateTime<Utc>,
}

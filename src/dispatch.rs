//! Seams to the external job executor.
//!
//! [`JobBackend`] starts jobs and issues download links. Status checks go
//! through [`StatusDispatch`], a table keyed by [`ResourceType`]: supporting a
//! new artifact kind means registering one more [`StatusQuery`], not touching
//! the orchestrator.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::MonitorError;
use crate::graphql::ClientError;
use crate::job::{JobId, JobInput, ResourceType, StartedJob, StatusSnapshot};

/// Start-job and link-issuance calls of the executor.
#[async_trait]
pub trait JobBackend: Send + Sync {
    async fn start_job(&self, input: &JobInput) -> Result<StartedJob, ClientError>;

    /// Returns `None` when the executor declines to issue a link.
    async fn issue_download_link(&self, id: &JobId) -> Result<Option<String>, ClientError>;
}

/// A status lookup for one resource type. Always reads from the network.
#[async_trait]
pub trait StatusQuery: Send + Sync {
    async fn poll_status(&self, id: &JobId) -> Result<StatusSnapshot, ClientError>;
}

#[derive(Default, Clone)]
pub struct StatusDispatch {
    queries: HashMap<ResourceType, Arc<dyn StatusQuery>>,
}

impl StatusDispatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(mut self, resource_type: ResourceType, query: Arc<dyn StatusQuery>) -> Self {
        self.queries.insert(resource_type, query);
        self
    }

    pub fn route(&self, resource_type: ResourceType) -> Result<Arc<dyn StatusQuery>, MonitorError> {
        self.queries
            .get(&resource_type)
            .cloned()
            .ok_or(MonitorError::UnroutableResource(resource_type))
    }
}

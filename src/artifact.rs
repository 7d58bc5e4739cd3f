use chrono::Utc;
use tokio_util::sync::CancellationToken;

use crate::dispatch::JobBackend;
use crate::error::MonitorError;
use crate::job::{ArtifactLink, JobId};
use crate::notify::Notifier;

/// Request a fresh download link for a completed job and open it.
///
/// Links are never cached; each call issues a new one. A missing or blank
/// link is a `LinkIssuanceFailure`. Returns `Ok(None)` when `cancel` fired
/// while the request was on the wire, in which case nothing is opened.
pub async fn resolve_artifact(
    backend: &dyn JobBackend,
    notifier: &dyn Notifier,
    job_id: &JobId,
    cancel: &CancellationToken,
) -> Result<Option<ArtifactLink>, MonitorError> {
    let issued = backend.issue_download_link(job_id).await;
    if cancel.is_cancelled() {
        tracing::debug!(job_id = %job_id, "Discarding download link for cancelled attempt");
        return Ok(None);
    }

    let url = issued
        .map_err(|source| MonitorError::LinkIssuanceFailure {
            job_id: job_id.clone(),
            source: Some(source),
        })?
        .filter(|url| !url.trim().is_empty())
        .ok_or_else(|| MonitorError::LinkIssuanceFailure {
            job_id: job_id.clone(),
            source: None,
        })?;

    let link = ArtifactLink {
        job_id: job_id.clone(),
        url,
        issued_at: Utc::now(),
    };
    tracing::info!(job_id = %job_id, "Download link issued");
    notifier.open_artifact(&link);
    Ok(Some(link))
}

//! Retrieval of library binaries for verified candidates

use super::backend::Backend;
use crate::error::{status_reason, SearchError};
use crate::runner::{ProgressSnapshot, TaskFailure};
use crate::transport::{ArtifactStore, Transport};
use log::debug;

/// Outcome of downloading a whole catalog
#[derive(Debug, Clone, Default)]
pub struct DownloadReport {
    /// File names present in the store, pre-existing or just fetched
    pub files: Vec<String>,
    pub failures: Vec<TaskFailure<SearchError>>,
    pub progress: ProgressSnapshot,
}

/// Make sure `file_name` is present in `store`, fetching it from `backend`
/// only when no matching artifact exists yet.
pub async fn fetch_library(
    transport: &dyn Transport,
    store: &dyn ArtifactStore,
    backend: &Backend,
    file_name: &str,
) -> Result<String, SearchError> {
    let failed = |reason: String| SearchError::DownloadFailed {
        candidate: file_name.to_string(),
        reason,
    };

    if store.contains(file_name).await.map_err(|e| failed(e.to_string()))? {
        debug!("{} already present, skipping download", file_name);
        return Ok(file_name.to_string());
    }

    let url = backend.download_url(file_name);
    debug!("Downloading {}", url);

    let response = transport
        .get(&url)
        .await
        .map_err(|e| failed(e.to_string()))?;
    if !response.is_success() {
        return Err(failed(status_reason(response.status)));
    }

    store
        .write(file_name, &response.body)
        .await
        .map_err(|e| failed(e.to_string()))?;

    Ok(file_name.to_string())
}

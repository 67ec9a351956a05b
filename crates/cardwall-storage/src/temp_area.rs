//! Per-job file-holding area.
//!
//! Everything a job owns lives under `jobs/<job_id>/`: the uploaded input
//! under `input/` and generated files under `artifacts/`.

use std::sync::Arc;

use bytes::Bytes;

use cardwall_core::result::AppResult;
use cardwall_core::traits::storage::StorageProvider;
use cardwall_core::types::JobId;

const ROOT: &str = "jobs";

/// Job-scoped view over a [`StorageProvider`].
#[derive(Debug, Clone)]
pub struct TempFileArea {
    provider: Arc<dyn StorageProvider>,
}

impl TempFileArea {
    /// Wrap a storage provider.
    pub fn new(provider: Arc<dyn StorageProvider>) -> Self {
        Self { provider }
    }

    /// The underlying provider.
    pub fn provider(&self) -> &Arc<dyn StorageProvider> {
        &self.provider
    }

    /// Directory holding every file of a job.
    pub fn job_dir(job_id: JobId) -> String {
        format!("{ROOT}/{job_id}")
    }

    /// Key under which a job's uploaded input is stored.
    pub fn input_key(job_id: JobId, file_name: &str) -> String {
        format!("{ROOT}/{job_id}/input/{}", sanitize_file_name(file_name))
    }

    /// Key under which a job's artifact is stored.
    pub fn artifact_key(job_id: JobId, file_name: &str) -> String {
        format!("{ROOT}/{job_id}/artifacts/{}", sanitize_file_name(file_name))
    }

    /// Store a job's input and return its key.
    pub async fn store_input(&self, job_id: JobId, file_name: &str, data: Bytes) -> AppResult<String> {
        let key = Self::input_key(job_id, file_name);
        self.provider.write(&key, data).await?;
        tracing::debug!(job_id = %job_id, key = %key, "Stored job input");
        Ok(key)
    }

    /// Store a generated file and return its key.
    pub async fn write_artifact(
        &self,
        job_id: JobId,
        file_name: &str,
        data: Bytes,
    ) -> AppResult<String> {
        let key = Self::artifact_key(job_id, file_name);
        self.provider.write(&key, data).await?;
        tracing::debug!(job_id = %job_id, key = %key, "Stored job artifact");
        Ok(key)
    }

    /// Read a stored file by key.
    pub async fn read(&self, key: &str) -> AppResult<Bytes> {
        self.provider.read_bytes(key).await
    }

    /// Delete a stored file. Missing files are ignored.
    pub async fn delete(&self, key: &str) -> AppResult<()> {
        self.provider.delete(key).await
    }

    /// Delete everything a job owns.
    pub async fn purge_job(&self, job_id: JobId) -> AppResult<()> {
        self.provider.delete_dir(&Self::job_dir(job_id)).await
    }

    /// Last path segment of a key.
    pub fn file_name_of(key: &str) -> &str {
        key.rsplit('/').next().unwrap_or(key)
    }
}

/// Reduce a client-supplied name to a safe single path segment.
fn sanitize_file_name(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name).trim();
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.');
    if cleaned.is_empty() {
        "upload".to_string()
    } else {
        cleaned.to_string()
    }
}

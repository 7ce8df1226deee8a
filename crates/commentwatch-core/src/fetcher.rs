use std::future::Future;

use anyhow::{Context, Result};
use serde::Deserialize;

/// Source of the authoritative comment count for a thread.
///
/// Failures are not retried here; the reconciliation pass leaves the
/// thread's `last_check` timestamp in place, so the next pass (at least one
/// check interval later) retries naturally.
pub trait FetchCommentCount {
    /// Fetch the current comment count for `thread_id`.
    fn fetch(&self, thread_id: &str) -> impl Future<Output = Result<u64>> + Send;
}

/// Shape of the metadata endpoint's JSON response. Extra fields are ignored.
#[derive(Debug, Deserialize)]
struct ThreadMetadata {
    num_comments: u64,
}

/// HTTP client for the thread metadata endpoint.
///
/// One GET per check, `{base_url}/{thread_id}.json`, no timeout beyond the
/// transport's own.
pub struct MetadataClient {
    base_url: String,
    client: reqwest::Client,
}

impl MetadataClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self {
            base_url,
            client: reqwest::Client::new(),
        }
    }
}

impl FetchCommentCount for MetadataClient {
    async fn fetch(&self, thread_id: &str) -> Result<u64> {
        let url = format!("{}/{}.json", self.base_url, thread_id);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .context("Failed to reach metadata endpoint")?;

        if !response.status().is_success() {
            anyhow::bail!(
                "Metadata endpoint error ({}) for thread {}",
                response.status(),
                thread_id
            );
        }

        let metadata: ThreadMetadata = response
            .json()
            .await
            .context("Failed to parse thread metadata response")?;

        Ok(metadata.num_comments)
    }
}

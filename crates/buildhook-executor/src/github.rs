//! Source host API client used to validate a repository before cloning.

use buildhook_core::{Error, Result};
use serde::Deserialize;
use tracing::debug;

/// Client for the source host's repository API.
#[derive(Debug, Clone)]
pub struct SourceHostClient {
    client: reqwest::Client,
    scheme: String,
}

impl SourceHostClient {
    /// Create a client that reaches `{scheme}://api.{host}`.
    pub fn new(scheme: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            scheme: scheme.into(),
        }
    }

    pub fn with_client(client: reqwest::Client, scheme: impl Into<String>) -> Self {
        Self {
            client,
            scheme: scheme.into(),
        }
    }

    /// Scheme used for API calls and clone URLs.
    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    /// Base URL of the host's REST API.
    pub fn api_base(&self, host: &str) -> String {
        format!("{}://api.{}", self.scheme, host)
    }

    /// Look up a repository, failing unless the host answers with a success status.
    pub async fn get_repo(
        &self,
        host: &str,
        token: &str,
        owner: &str,
        repo: &str,
    ) -> Result<SourceRepo> {
        let url = format!("{}/repos/{}/{}", self.api_base(host), owner, repo);
        debug!(url = %url, "Looking up repository");

        let response = self
            .client
            .get(&url)
            .header("Authorization", format!("Bearer {}", token))
            .header("User-Agent", "buildhook")
            .header("Accept", "application/vnd.github+json")
            .send()
            .await
            .map_err(|e| Error::LookupFailed(format!("request to {} failed: {}", host, e)))?;

        let status = response.status();
        if !status.is_success() {
            let reason = match status.as_u16() {
                401 | 403 => "access denied",
                404 => "repository not found",
                _ => "unexpected status",
            };
            return Err(Error::LookupFailed(format!(
                "{}/{} on {}: {} ({})",
                owner, repo, host, reason, status
            )));
        }

        response
            .json()
            .await
            .map_err(|e| Error::LookupFailed(format!("invalid repository response: {}", e)))
    }
}

/// Repository information returned by the lookup.
#[derive(Debug, Clone, Deserialize)]
pub struct SourceRepo {
    /// Canonical `owner/name`, used to build the clone URL.
    pub full_name: String,
}

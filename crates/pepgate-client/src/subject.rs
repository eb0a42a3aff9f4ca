//! Subject lookup: who is asking, with which roles.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use pepgate_core::error::{PepError, Result};

/// Authenticated principal as sent in a subscription's `subject`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subject {
    pub name: String,
    #[serde(default)]
    pub roles: Vec<String>,
}

impl Subject {
    pub fn to_json(&self) -> Value {
        serde_json::json!({ "name": self.name, "roles": self.roles })
    }
}

#[async_trait]
pub trait SubjectResolver: Send + Sync {
    async fn resolve(&self, username: &str) -> Result<Subject>;
}

/// Resolves roles over HTTP: `GET <url>?username=<name>` answering a JSON
/// array of role names.
#[derive(Debug, Clone)]
pub struct AuthorizationManager {
    http: reqwest::Client,
    url: String,
}

impl AuthorizationManager {
    pub fn new(url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), url)
    }

    pub fn with_client(http: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            http,
            url: url.into(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl SubjectResolver for AuthorizationManager {
    async fn resolve(&self, username: &str) -> Result<Subject> {
        let url = reqwest::Url::parse_with_params(&self.url, [("username", username)])
            .map_err(|e| PepError::BadRequest(format!("subject lookup url: {e}")))?;

        let resp = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| PepError::Transport(e.to_string()))?;
        let status = resp.status();
        if !status.is_success() {
            tracing::warn!(status = %status, username, "subject lookup failed");
            return Err(PepError::Upstream(format!("subject lookup answered {status}")));
        }

        let roles: Vec<String> = resp
            .json()
            .await
            .map_err(|e| PepError::Upstream(format!("subject lookup body: {e}")))?;
        tracing::debug!(username, roles = roles.len(), "subject resolved");
        Ok(Subject {
            name: username.to_owned(),
            roles,
        })
    }
}

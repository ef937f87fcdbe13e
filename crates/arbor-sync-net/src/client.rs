//! HTTP client for the tracing server.
//!
//! Wraps a [`reqwest::Client`] with the server's project-scoped URL layout
//! and its JSON error convention: a 200 response whose body carries an
//! `error` field (and optionally a `detail` field) is a failure.

use std::collections::HashMap;

use serde_json::Value;
use url::Url;

use crate::error::{NetworkError, Result};

/// A skeleton identifier as assigned by the server.
pub type SkeletonId = u64;

/// Client for the skeleton endpoints of one project on one server.
///
/// Cheap to clone; the inner connection pool is shared.
#[derive(Clone)]
pub struct ServerClient {
    client: reqwest::Client,
    base_url: Url,
    project_id: u64,
}

impl ServerClient {
    /// Creates a client for `project_id` on the server at `base_url`.
    ///
    /// The base URL must be absolute; a missing trailing slash is tolerated.
    pub fn new(base_url: &str, project_id: u64) -> Result<Self> {
        let mut base_url = Url::parse(base_url)?;
        if !base_url.path().ends_with('/') {
            base_url.set_path(&format!("{}/", base_url.path()));
        }
        Ok(Self {
            client: reqwest::Client::new(),
            base_url,
            project_id,
        })
    }

    /// The project this client is scoped to.
    pub fn project_id(&self) -> u64 {
        self.project_id
    }

    /// Resolves a project-relative endpoint path.
    fn endpoint(&self, path: &str) -> Result<Url> {
        let joined = self
            .base_url
            .join(&format!("{}/{}", self.project_id, path))?;
        Ok(joined)
    }

    /// Fetches the neuron name for each of the given skeletons.
    ///
    /// Skeletons unknown to the server are absent from the result map.
    pub async fn neuron_names(&self, skeleton_ids: &[SkeletonId]) -> Result<HashMap<SkeletonId, String>> {
        let url = self.endpoint("skeleton/neuronnames")?;
        let body = serde_json::json!({ "skids": skeleton_ids });
        let json = self.post_json(url, &body).await?;

        let mut names = HashMap::new();
        if let Value::Object(map) = json {
            for (key, value) in map {
                if let (Ok(id), Some(name)) = (key.parse::<SkeletonId>(), value.as_str()) {
                    names.insert(id, name.to_string());
                }
            }
        }
        Ok(names)
    }

    /// Fetches the review completion percentage for each of the given
    /// skeletons.
    pub async fn review_status(&self, skeleton_ids: &[SkeletonId]) -> Result<HashMap<SkeletonId, u8>> {
        let url = self.endpoint("skeleton/review-status")?;
        let body = serde_json::json!({ "skeleton_ids": skeleton_ids });
        let json = self.post_json(url, &body).await?;

        let mut reviews = HashMap::new();
        if let Value::Object(map) = json {
            for (key, value) in map {
                if let (Ok(id), Some(percent)) = (key.parse::<SkeletonId>(), value.as_u64()) {
                    reviews.insert(id, percent.min(100) as u8);
                }
            }
        }
        Ok(reviews)
    }

    /// POSTs a JSON body and parses the response, applying the server's
    /// error conventions.
    async fn post_json(&self, url: Url, body: &Value) -> Result<Value> {
        tracing::debug!(
            target: "arbor_sync_net::client",
            url = %url,
            "sending request"
        );
        let response = self.client.post(url.clone()).json(body).send().await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.ok().filter(|t| !t.is_empty());
            tracing::warn!(
                target: "arbor_sync_net::client",
                url = %url,
                status = status.as_u16(),
                "request failed"
            );
            return Err(NetworkError::HttpStatus {
                status: status.as_u16(),
                message,
            });
        }

        let json: Value = response.json().await?;
        if let Some(error) = json.get("error").and_then(Value::as_str) {
            let detail = json
                .get("detail")
                .and_then(Value::as_str)
                .map(str::to_string);
            return Err(NetworkError::Api {
                message: error.to_string(),
                detail,
            });
        }
        Ok(json)
    }
}

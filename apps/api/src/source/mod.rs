//! Read-only client of the external resume persistence API.

use async_trait::async_trait;
use reqwest::{StatusCode, Url};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::models::{ResumeContent, StyleRules};

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("Request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Resume {0} not found")]
    NotFound(String),

    #[error("Resume API returned status {status}")]
    Status { status: u16 },

    #[error("Invalid resume id '{0}'")]
    InvalidId(String),
}

/// The current saved state of one resume.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResumeSnapshot {
    pub content: ResumeContent,
    #[serde(default)]
    pub style_rules: StyleRules,
}

/// Where export loads content from when the caller does not send it inline.
#[async_trait]
pub trait ResumeSource: Send + Sync {
    /// `bearer` is the caller's token, passed through unchanged.
    async fn load(&self, resume_id: &str, bearer: Option<&str>) -> Result<ResumeSnapshot, SourceError>;
}

/// `GET {base}/api/resumes/{id}` returning a [`ResumeSnapshot`] body.
pub struct HttpResumeSource {
    base: Url,
    client: reqwest::Client,
}

impl HttpResumeSource {
    pub fn new(base: Url) -> Self {
        Self {
            base,
            client: reqwest::Client::new(),
        }
    }

    fn resume_url(&self, resume_id: &str) -> Result<Url, SourceError> {
        if resume_id.is_empty()
            || !resume_id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(SourceError::InvalidId(resume_id.to_string()));
        }
        let mut url = self.base.clone();
        url.set_path(&format!(
            "{}/api/resumes/{resume_id}",
            self.base.path().trim_end_matches('/')
        ));
        Ok(url)
    }
}

#[async_trait]
impl ResumeSource for HttpResumeSource {
    async fn load(&self, resume_id: &str, bearer: Option<&str>) -> Result<ResumeSnapshot, SourceError> {
        let url = self.resume_url(resume_id)?;
        debug!(%url, "Loading resume snapshot");

        let mut request = self.client.get(url);
        if let Some(token) = bearer {
            request = request.bearer_auth(token);
        }
        let response = request.send().await?;

        match response.status() {
            StatusCode::NOT_FOUND => Err(SourceError::NotFound(resume_id.to_string())),
            status if !status.is_success() => Err(SourceError::Status {
                status: status.as_u16(),
            }),
            _ => Ok(response.json::<ResumeSnapshot>().await?),
        }
    }
}

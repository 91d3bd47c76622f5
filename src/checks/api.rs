use std::time::Duration;

use anyhow::Context;
use reqwest::{
    header::{self, HeaderMap, HeaderValue},
    StatusCode,
};
use serde::Deserialize;
use thiserror::Error;
use tracing::trace;
use url::Url;

use crate::webhooks::github::GitHubUser;

const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));
const GITHUB_JSON: &str = "application/vnd.github+json";

/// Full commit as returned by `GET /repos/{owner}/{repo}/commits/{sha}`.
#[derive(Debug, Deserialize)]
pub struct CommitDetail {
    pub url: String,
    #[allow(dead_code)]
    pub sha: String,
    #[serde(default)]
    pub files: Vec<FileChange>,
    #[serde(default)]
    pub commit: CommitInfo,
}

#[derive(Debug, Deserialize)]
pub struct FileChange {
    pub filename: String,
    #[serde(default)]
    pub additions: u64,
    #[serde(default)]
    pub deletions: u64,
    #[serde(default)]
    pub status: String,
    // binary files and very large diffs come without a patch
    pub patch: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CommitInfo {
    pub author: GitHubUser,
    pub committer: GitHubUser,
    pub message: String,
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{url} answered with status {status}")]
    Status { url: String, status: StatusCode },
    #[error("couldn't read commit from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

/// Minimal client for the hosting provider's REST API.
#[derive(Clone)]
pub struct GitHubApi {
    client: reqwest::Client,
    base_url: Url,
}

impl GitHubApi {
    /// Every request made through this client is cut off after `timeout`.
    pub fn new(base_url: Url, timeout: Duration, token: Option<&str>) -> anyhow::Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(header::ACCEPT, HeaderValue::from_static(GITHUB_JSON));
        if let Some(token) = token {
            let mut value = HeaderValue::from_str(&format!("Bearer {}", token))
                .context("GitHub token isn't a valid header value")?;
            value.set_sensitive(true);
            headers.insert(header::AUTHORIZATION, value);
        }

        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .context("couldn't build GitHub API client")?;

        Ok(Self { client, base_url })
    }

    pub fn commit_url(&self, repo: &str, sha: &str) -> String {
        format!(
            "{}/repos/{}/commits/{}",
            self.base_url.as_str().trim_end_matches('/'),
            repo,
            sha
        )
    }

    pub async fn fetch_commit(&self, repo: &str, sha: &str) -> Result<CommitDetail, FetchError> {
        let url = self.commit_url(repo, sha);
        trace!("fetching {}", url);

        let response = match self.client.get(&url).send().await {
            Ok(response) => response,
            Err(source) => return Err(FetchError::Transport { url, source }),
        };

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status { url, status });
        }

        match response.json::<CommitDetail>().await {
            Ok(commit) => Ok(commit),
            Err(source) => Err(FetchError::Decode { url, source }),
        }
    }
}

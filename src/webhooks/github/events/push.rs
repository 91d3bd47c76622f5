use serde::Deserialize;

use crate::webhooks::github::events::{GitHubUser, Repository};

#[derive(Debug, Deserialize)]
pub struct PushEvent {
    #[serde(default)]
    pub r#ref: String,
    #[serde(default)]
    pub commits: Vec<CommitRef>,
    #[serde(default)]
    pub repository: Repository,
    #[serde(default)]
    pub pusher: GitHubUser,
}

/// A commit as referenced by a push event. The diff isn't part of the webhook payload and has to
/// be fetched separately.
#[derive(Debug, Clone, Deserialize)]
pub struct CommitRef {
    pub id: String,
}

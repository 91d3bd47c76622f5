use std::{fmt::Display, sync::Arc};

use tokio::{sync::Semaphore, task::JoinHandle};
use tracing::{debug, info, trace, warn};

pub mod api;
use api::GitHubApi;

pub mod inspect;
use inspect::{InspectionError, InspectionReport, Inspector};

use crate::{utils::commit_title, webhooks::github::CommitRef};

/// How a single commit check ended. Only ever logged, it never reaches the webhook caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckOutcome {
    Clean,
    Flagged { warnings: usize },
    /// At least one patch couldn't be inspected and nothing was flagged in the others.
    Unverified,
    /// The commit carries no patch text, e.g. only binary files or an empty merge.
    NothingToInspect,
    /// The commit couldn't be fetched.
    Abandoned,
}

impl Display for CheckOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Clean => f.write_str("no issues found"),
            Self::Flagged { warnings } => write!(f, "{} warnings found", warnings),
            Self::Unverified => f.write_str("unable to verify"),
            Self::NothingToInspect => f.write_str("nothing to inspect"),
            Self::Abandoned => f.write_str("abandoned"),
        }
    }
}

/// Fans out one independent check per pushed commit.
///
/// Checks share nothing but a semaphore bounding how many of them may be in flight at once.
/// Their [`JoinHandle`]s can be dropped, the tasks keep running detached.
#[derive(Clone)]
pub struct CommitCheckDispatcher {
    api: GitHubApi,
    inspector: Arc<dyn Inspector>,
    permits: Arc<Semaphore>,
}

impl CommitCheckDispatcher {
    pub fn new(
        api: GitHubApi,
        inspector: Arc<dyn Inspector>,
        max_concurrent_checks: usize,
    ) -> Self {
        Self {
            api,
            inspector,
            permits: Arc::new(Semaphore::new(max_concurrent_checks)),
        }
    }

    pub fn dispatch_checks(
        &self,
        repo_full_name: &str,
        commits: &[CommitRef],
    ) -> Vec<JoinHandle<CheckOutcome>> {
        commits
            .iter()
            .map(|commit| {
                let dispatcher = self.clone();
                let repo = repo_full_name.to_owned();
                let sha = commit.id.clone();

                tokio::spawn(async move {
                    let _permit = match dispatcher.permits.clone().acquire_owned().await {
                        Ok(permit) => permit,
                        Err(_) => {
                            warn!("check pool closed, dropping check of {}@{}", repo, sha);
                            return CheckOutcome::Abandoned;
                        }
                    };
                    let outcome = dispatcher.check_commit(&repo, &sha).await;
                    info!("check of {}@{} complete: {}", repo, sha, outcome);
                    outcome
                })
            })
            .collect()
    }

    async fn check_commit(&self, repo: &str, sha: &str) -> CheckOutcome {
        info!("checking commit {}@{}", repo, sha);

        let commit = match self.api.fetch_commit(repo, sha).await {
            Ok(commit) => commit,
            Err(e) => {
                warn!("failed to retrieve commit {}@{}: {}", repo, sha, e);
                return CheckOutcome::Abandoned;
            }
        };
        debug!(
            "commit {} by {} (committed by {}): {}",
            commit.url,
            commit.commit.author.display_name(),
            commit.commit.committer.display_name(),
            commit_title(&commit.commit.message),
        );
        for file in &commit.files {
            trace!(
                "{} `{}` +{} -{}",
                file.status,
                file.filename,
                file.additions,
                file.deletions
            );
        }

        let patches: Vec<_> = commit
            .files
            .into_iter()
            .filter_map(|file| file.patch.map(|patch| (file.filename, patch)))
            .collect();
        if patches.is_empty() {
            return CheckOutcome::NothingToInspect;
        }

        let mut warnings = 0;
        let mut failed = false;
        let mut unverified = 0;
        for (filename, patch) in patches {
            match self.inspect(patch).await {
                Ok(report) if report.passed => {}
                Ok(report) => {
                    if report.warnings.is_empty() {
                        warn!(
                            "inspection of {}@{} file `{}` failed without warnings",
                            repo, sha, filename
                        );
                    }
                    for warning in &report.warnings {
                        warn!(
                            "warning found in {}@{} file `{}` line {}: {} ({})",
                            repo,
                            sha,
                            filename,
                            warning.line,
                            warning.description,
                            warning.category
                        );
                    }
                    failed = true;
                    warnings += report.warnings.len();
                }
                Err(e) => {
                    warn!("unable to verify {}@{} file `{}`: {}", repo, sha, filename, e);
                    unverified += 1;
                }
            }
        }

        if failed {
            CheckOutcome::Flagged { warnings }
        } else if unverified > 0 {
            CheckOutcome::Unverified
        } else {
            CheckOutcome::Clean
        }
    }

    async fn inspect(&self, patch: String) -> Result<InspectionReport, InspectionError> {
        let inspector = Arc::clone(&self.inspector);
        tokio::task::spawn_blocking(move || inspector.inspect(patch.as_bytes()))
            .await
            .map_err(|e| InspectionError::Aborted(e.to_string()))?
    }
}

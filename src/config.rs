use std::{fs::File, io::BufReader, path::Path, time::Duration};

use anyhow::{anyhow, bail, Context};
use serde::Deserialize;
use url::Url;

use crate::{checks::inspect::Rule, webhooks::github::GitHubSecret};

#[derive(Debug, Deserialize)]
pub struct DiffSnoopConfig {
    /// Secret configured on the GitHub webhook, used to check delivery signatures
    #[serde(default)]
    pub github_secret: Option<String>,
    /// Port the webhook intake listens on
    #[serde(default)]
    pub port: Option<u16>,
    /// Base URL of the GitHub REST API
    #[serde(default = "default_github_api_url")]
    pub github_api_url: Url,
    /// Token used to read commits of private repositories
    #[serde(default)]
    pub github_token: Option<String>,
    /// Upper bound on a single commit lookup, in seconds
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,
    /// How many commit checks may run at the same time. Extra checks wait for a free slot.
    #[serde(default = "default_max_concurrent_checks")]
    pub max_concurrent_checks: usize,
    /// Replaces the built-in inspection rules when set
    #[serde(default)]
    pub rules: Option<Vec<Rule>>,
}

fn default_github_api_url() -> Url {
    Url::parse("https://api.github.com").expect("default GitHub API URL is valid")
}

fn default_fetch_timeout_secs() -> u64 {
    10
}

fn default_max_concurrent_checks() -> usize {
    16
}

impl Default for DiffSnoopConfig {
    fn default() -> Self {
        Self {
            github_secret: None,
            port: None,
            github_api_url: default_github_api_url(),
            github_token: None,
            fetch_timeout_secs: default_fetch_timeout_secs(),
            max_concurrent_checks: default_max_concurrent_checks(),
            rules: None,
        }
    }
}

impl DiffSnoopConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let file =
            File::open(path).with_context(|| format!("couldn't open {}:", path.display()))?;
        serde_yaml::from_reader(BufReader::new(file)).context("couldn't parse config file")
    }

    /// Checks the values that must be present before the service can start.
    pub fn validate(&self) -> anyhow::Result<()> {
        self.secret()?;
        self.port()?;
        if self.max_concurrent_checks == 0 {
            bail!("max_concurrent_checks must be at least 1");
        }
        if self.fetch_timeout_secs == 0 {
            bail!("fetch_timeout_secs must be at least 1");
        }
        Ok(())
    }

    pub fn secret(&self) -> anyhow::Result<GitHubSecret> {
        self.github_secret
            .as_deref()
            .and_then(GitHubSecret::new)
            .ok_or_else(|| anyhow!("missing WEBHOOK_SECRET / github_secret"))
    }

    pub fn port(&self) -> anyhow::Result<u16> {
        self.port.ok_or_else(|| anyhow!("missing PORT / port"))
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }
}

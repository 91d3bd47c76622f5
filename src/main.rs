use std::{net::Ipv4Addr, path::PathBuf, sync::Arc};

use anyhow::Context;
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

mod checks;
use checks::{
    api::GitHubApi,
    inspect::{Inspector, PatternInspector},
    CommitCheckDispatcher,
};

mod config;
use config::DiffSnoopConfig;

mod utils;

mod webhooks;

#[derive(Parser)]
#[command(version)]
struct Opts {
    /// Configuration file for diffsnoop
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Port to listen on, overrides the configuration file
    #[arg(short, long, env = "PORT")]
    port: Option<u16>,
    /// Webhook secret shared with GitHub, overrides the configuration file
    #[arg(long, env = "WEBHOOK_SECRET", hide_env_values = true)]
    secret: Option<String>,
}

#[rocket::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    if let Err(e) = run(Opts::parse()).await {
        error!("failed to start: {:#}", e);
        return Err(e);
    }
    Ok(())
}

async fn run(opts: Opts) -> anyhow::Result<()> {
    let mut config = match &opts.config {
        Some(path) => DiffSnoopConfig::from_file(path)?,
        None => DiffSnoopConfig::default(),
    };
    if opts.port.is_some() {
        config.port = opts.port;
    }
    if opts.secret.is_some() {
        config.github_secret = opts.secret;
    }
    config.validate().context("invalid configuration")?;

    let secret = config.secret()?;
    let port = config.port()?;

    let api = GitHubApi::new(
        config.github_api_url.clone(),
        config.fetch_timeout(),
        config.github_token.as_deref(),
    )?;
    let inspector: Arc<dyn Inspector> = match config.rules.take() {
        Some(rules) => {
            info!("using {} configured inspection rules", rules.len());
            Arc::new(PatternInspector::new(rules))
        }
        None => Arc::new(PatternInspector::default()),
    };
    let dispatcher = CommitCheckDispatcher::new(api, inspector, config.max_concurrent_checks);

    let figment = rocket::Config::figment()
        .merge(("address", Ipv4Addr::UNSPECIFIED))
        .merge(("port", port));
    let rocket = webhooks::mount(rocket::custom(figment), secret, dispatcher);
    rocket
        .launch()
        .await
        .map(|_| ())
        .map_err(|err| anyhow::anyhow!(err))
}

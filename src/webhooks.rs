use rocket::{fairing::AdHoc, routes, Build, Rocket};
use tracing::info;

pub mod github;
use github::{github_webhook, GitHubSecret};

use crate::checks::CommitCheckDispatcher;

/// Mounts the webhook intake on `rocket` with everything its routes need as managed state.
pub fn mount(
    rocket: Rocket<Build>,
    secret: GitHubSecret,
    dispatcher: CommitCheckDispatcher,
) -> Rocket<Build> {
    rocket
        .mount("/", routes![github_webhook])
        .manage(secret)
        .manage(dispatcher)
        .attach(AdHoc::on_liftoff("Liftoff log", |rocket| {
            Box::pin(async move {
                info!(
                    "listening for GitHub webhooks on {}:{}",
                    rocket.config().address,
                    rocket.config().port
                );
            })
        }))
        // in-flight checks are detached tasks, nothing waits for them
        .attach(AdHoc::on_shutdown("Shutdown log", |_| {
            Box::pin(async move {
                info!("shutting down, commit checks still in flight are abandoned");
            })
        }))
}

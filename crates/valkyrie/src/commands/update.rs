//! `valk update`

use colored::Colorize;
use valkyrie_cloud::UpdateRequest;
use valkyrie_core::ProjectStore;

use crate::context::{Session, target_env};

pub async fn handle(
    code: bool,
    config: bool,
    env: Option<String>,
    profile: Option<&str>,
    yes: bool,
) -> anyhow::Result<()> {
    let store = ProjectStore::discover()?;
    let descriptor = store.load().await?;
    let env = target_env(&descriptor, env)?;

    // Without a flag both halves are pushed
    let both = !code && !config;
    let request = UpdateRequest {
        push_code: code || both,
        push_config: config || both,
        assume_yes: yes,
    };

    let region = descriptor.project.region.clone();
    let session = Session::open(store, &region, profile, true).await?;

    let record = descriptor.environment(&env)?;
    println!(
        "{} {}",
        "Updating".blue().bold(),
        env.color(record.env_color.as_str()).bold()
    );
    session
        .orchestrator
        .update_environment(&descriptor, &env, &request)
        .await?;
    Ok(())
}

//! `valk logs`

use chrono::{DateTime, Utc};
use colored::Colorize;
use valkyrie_core::ProjectStore;

use crate::context::{Session, target_env};

pub async fn handle(
    stream: Option<String>,
    env: Option<String>,
    profile: Option<&str>,
) -> anyhow::Result<()> {
    let store = ProjectStore::discover()?;
    let config = store.load().await?;
    let env = target_env(&config, env)?;
    let record = config.environment(&env)?;
    let function = record.lambda.function_name.clone().ok_or_else(|| {
        anyhow::anyhow!("environment {} has no function (was create interrupted?)", env)
    })?;
    let group = format!("/aws/lambda/{}", function);

    let region = config.project.region.clone();
    let session = Session::open(store, &region, profile, true).await?;
    let logs = &session.orchestrator.clients().logs;

    let stream = match stream {
        Some(stream) => stream,
        None => logs
            .latest_stream(&group)
            .await?
            .ok_or_else(|| anyhow::anyhow!("no log streams found in {}", group))?,
    };

    println!("{} {} {}", group.bold(), "›".dimmed(), stream.dimmed());
    let events = logs.events(&group, &stream).await?;
    if events.is_empty() {
        println!("{}", "No events in this stream yet.".yellow());
        return Ok(());
    }
    for event in events {
        let timestamp = DateTime::<Utc>::from_timestamp_millis(event.timestamp)
            .map(|when| when.format("%H:%M:%S%.3f").to_string())
            .unwrap_or_else(|| event.timestamp.to_string());
        println!("{} {}", timestamp.green(), event.message.trim_end());
    }
    Ok(())
}

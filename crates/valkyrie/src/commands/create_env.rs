//! `valk create-env`

use colored::Colorize;
use valkyrie_cloud::{EnvironmentSpec, FunctionSettings};
use valkyrie_core::ProjectStore;

use crate::commands::create::default_env_color;
use crate::context::Session;
use crate::prompt;

const COLOR_CHOICES: [&str; 6] = ["cyan", "magenta", "green", "yellow", "blue", "red"];

pub async fn handle(
    name: Option<String>,
    color: Option<String>,
    confirm: bool,
    profile: Option<&str>,
    yes: bool,
    no_rollback: bool,
) -> anyhow::Result<()> {
    let store = ProjectStore::discover()?;
    let mut config = store.load().await?;

    let name = match name {
        Some(name) => name,
        None if yes => anyhow::bail!("--yes requires an environment name"),
        None => prompt::input("Environment name", "")?,
    };
    anyhow::ensure!(!name.is_empty(), "environment name must not be empty");
    if config.environments.contains_key(&name) {
        anyhow::bail!("environment already exists: {}", name);
    }

    let color = match color {
        Some(color) => color,
        None if yes => default_env_color(&name).to_string(),
        None => {
            let items: Vec<String> = COLOR_CHOICES
                .iter()
                .map(|choice| choice.color(*choice).to_string())
                .collect();
            let index = prompt::select("Color", &items, 0)?;
            COLOR_CHOICES[index].to_string()
        }
    };

    let confirm_on_update = if confirm {
        true
    } else if yes {
        false
    } else {
        prompt::confirm("Require confirmation on update?", false)?
    };

    // New environments share the project's function template
    let settings = match config.environments.values().next() {
        Some(record) => FunctionSettings {
            description: record.lambda.description.clone().unwrap_or_default(),
            handler: record.lambda.handler.clone(),
            memory_mb: record.lambda.memory_size,
            timeout_sec: record.lambda.timeout,
            runtime: record.lambda.runtime.clone(),
        },
        None => FunctionSettings::default(),
    };

    let region = config.project.region.clone();
    let session = Session::open(store, &region, profile, !no_rollback).await?;

    let spec = EnvironmentSpec {
        name,
        color,
        confirm: confirm_on_update,
    };
    session
        .orchestrator
        .create_environment(&mut config, &spec, &settings)
        .await?;

    println!();
    println!(
        "{} {}",
        "✓".green(),
        format!("environment {} is ready.", spec.name).bold()
    );
    if let Some(url) = config.api_url(&spec.name) {
        println!(
            "- {}: {}",
            spec.name.color(spec.color.as_str()),
            url.underline()
        );
    }
    Ok(())
}

//! `valk configure`

use colored::Colorize;
use valkyrie_core::{GlobalConfig, Profile, obfuscate};

use crate::prompt;

pub async fn handle(
    edit: bool,
    default_profile: Option<String>,
    profiles: bool,
    purge: bool,
) -> anyhow::Result<()> {
    if edit {
        return edit_in_editor().await;
    }
    if purge {
        if prompt::confirm(
            "Remove the global configuration and every stored profile?",
            false,
        )? {
            GlobalConfig::purge().await?;
            println!("{}", "Global configuration removed.".green());
        } else {
            println!("{}", "Aborted.".yellow());
        }
        return Ok(());
    }

    let mut config = GlobalConfig::load().await?;

    if let Some(name) = default_profile {
        config.set_default(&name)?;
        config.save().await?;
        println!("{} {}", "Default profile:".green(), name.bold());
        return Ok(());
    }

    if profiles {
        if config.profiles.is_empty() {
            println!(
                "{}",
                "No profiles configured. Run `valk configure` to add one.".yellow()
            );
            return Ok(());
        }
        for (name, profile) in &config.profiles {
            let marker = if config.default_profile.as_deref() == Some(name.as_str()) {
                " (default)"
            } else {
                ""
            };
            println!(
                "{:<16} {}{}",
                name.bold(),
                obfuscate(&profile.access_key_id),
                marker.dimmed()
            );
        }
        return Ok(());
    }

    let suggested = config
        .default_profile
        .clone()
        .unwrap_or_else(|| "default".to_string());
    let name = prompt::input("Profile name", &suggested)?;

    let existing = config.profiles.get(&name);
    let current_key = existing.map(|p| p.access_key_id.clone()).unwrap_or_default();
    let current_secret = existing
        .map(|p| p.secret_access_key.clone())
        .unwrap_or_default();

    let access_key_id = ask_secret("AWS Access Key ID", &current_key)?;
    let secret_access_key = ask_secret("AWS Secret Access Key", &current_secret)?;

    config.set_profile(
        &name,
        Profile {
            access_key_id,
            secret_access_key,
        },
    );
    config.save().await?;
    println!(
        "{} {}",
        "✓".green(),
        format!("profile {} saved to {}", name, GlobalConfig::path()?.display()).bold()
    );
    Ok(())
}

/// Prompt for a secret; an empty answer keeps the stored value
fn ask_secret(label: &str, current: &str) -> anyhow::Result<String> {
    let message = if current.is_empty() {
        label.to_string()
    } else {
        format!("{} [{}]", label, obfuscate(current))
    };
    let answer = prompt::input_optional(&message)?;
    if answer.is_empty() {
        anyhow::ensure!(!current.is_empty(), "{} must not be empty", label);
        Ok(current.to_string())
    } else {
        Ok(answer)
    }
}

/// Open the global configuration in $EDITOR, creating it first when missing
async fn edit_in_editor() -> anyhow::Result<()> {
    let path = GlobalConfig::path()?;
    if !path.exists() {
        GlobalConfig::default().save().await?;
    }

    let editor = std::env::var("EDITOR").unwrap_or_else(|_| "vi".to_string());
    let status = tokio::process::Command::new(&editor)
        .arg(&path)
        .status()
        .await?;
    anyhow::ensure!(status.success(), "{} exited with {}", editor, status);

    // Validate the edited file
    GlobalConfig::load().await?;
    println!("{}", "Global configuration saved.".green());
    Ok(())
}

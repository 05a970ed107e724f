//! `valk info`

use colored::Colorize;
use valkyrie_core::ProjectStore;

pub async fn handle() -> anyhow::Result<()> {
    let store = ProjectStore::discover()?;
    let config = store.load().await?;

    println!("{} {}", "Project:".bold(), config.project.name.cyan());
    println!("{} {}", "Region:".bold(), config.project.region);
    println!();
    for (name, record) in &config.environments {
        match config.api_url(name) {
            Some(url) => println!(
                "- {}: {}",
                name.color(record.env_color.as_str()),
                url.underline()
            ),
            None => println!(
                "- {}: {}",
                name.color(record.env_color.as_str()),
                "not deployed".dimmed()
            ),
        }
    }
    Ok(())
}

//! `valk create`

use colored::Colorize;
use valkyrie_cloud::{EnvironmentSpec, FunctionSettings};
use valkyrie_core::{ProjectInfo, ProjectStore, Valkconfig};

use crate::context::Session;
use crate::prompt;

pub const DEFAULT_REGION: &str = "eu-west-1";

pub struct CreateOptions {
    pub name: Option<String>,
    pub region: Option<String>,
    pub envs: Vec<String>,
    pub handler: Option<String>,
    pub memory: Option<u32>,
    pub timeout: Option<u32>,
    pub runtime: Option<String>,
    pub description: Option<String>,
    pub profile: Option<String>,
    pub yes: bool,
    pub no_rollback: bool,
}

/// Color an environment name shows up in: staging is cyan, everything else
/// magenta
pub fn default_env_color(env: &str) -> &'static str {
    if env.eq_ignore_ascii_case("staging") {
        "cyan"
    } else {
        "magenta"
    }
}

pub async fn handle(options: CreateOptions) -> anyhow::Result<()> {
    let root = std::env::current_dir()?;
    let store = ProjectStore::new(&root);
    if store.exists() {
        anyhow::bail!("a valkconfig.json already exists in {}", root.display());
    }

    let dir_name = root
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("valkyrie-app")
        .to_string();

    let name = match &options.name {
        Some(name) => name.clone(),
        None if options.yes => dir_name,
        None => prompt::input("Project name", &dir_name)?,
    };
    anyhow::ensure!(!name.is_empty(), "project name must not be empty");

    let region = match &options.region {
        Some(region) => region.clone(),
        None if options.yes => DEFAULT_REGION.to_string(),
        None => prompt::input("Region name", DEFAULT_REGION)?,
    };

    let settings = resolve_settings(&options)?;
    let specs = environment_specs(&options.envs);

    let session = Session::open(store, &region, options.profile.as_deref(), !options.no_rollback)
        .await?;
    let account = session.verify_auth().await?;
    println!("{} {}", "Authenticated:".green(), account);

    let mut config = Valkconfig::new(ProjectInfo {
        name: name.clone(),
        region,
        scaffolder: None,
    });
    session
        .orchestrator
        .create_project(&mut config, &specs, &settings)
        .await?;

    println!();
    println!("{} {}", "✓".green(), format!("{} is ready.", name).bold());
    for env in config.env_names() {
        if let Some(url) = config.api_url(&env) {
            let record = config.environment(&env)?;
            println!(
                "- {}: {}",
                env.color(record.env_color.as_str()),
                url.underline()
            );
        }
    }
    Ok(())
}

/// Function template, from flags and prompts
fn resolve_settings(options: &CreateOptions) -> anyhow::Result<FunctionSettings> {
    let defaults = FunctionSettings::default();
    if options.yes {
        return Ok(FunctionSettings {
            description: options.description.clone().unwrap_or_default(),
            handler: options.handler.clone().unwrap_or(defaults.handler),
            memory_mb: options.memory.unwrap_or(defaults.memory_mb),
            timeout_sec: options.timeout.unwrap_or(defaults.timeout_sec),
            runtime: options.runtime.clone().unwrap_or(defaults.runtime),
        });
    }

    let description = match &options.description {
        Some(description) => description.clone(),
        None => prompt::input_optional("Description")?,
    };
    let memory_mb = match options.memory {
        Some(memory) => memory,
        None => prompt::input_number("Memory size (MB)", defaults.memory_mb)?,
    };
    let timeout_sec = match options.timeout {
        Some(timeout) => timeout,
        None => prompt::input_number("Timeout (seconds)", defaults.timeout_sec)?,
    };
    let runtime = match &options.runtime {
        Some(runtime) => runtime.clone(),
        None => prompt::input("Runtime", &defaults.runtime)?,
    };
    let handler = match &options.handler {
        Some(handler) => handler.clone(),
        None => prompt::input("Lambda handler", &defaults.handler)?,
    };

    Ok(FunctionSettings {
        description,
        handler,
        memory_mb,
        timeout_sec,
        runtime,
    })
}

fn environment_specs(envs: &[String]) -> Vec<EnvironmentSpec> {
    let names: Vec<String> = if envs.is_empty() {
        vec!["staging".to_string(), "production".to_string()]
    } else {
        envs.to_vec()
    };
    names
        .into_iter()
        .map(|name| {
            let color = default_env_color(&name).to_string();
            let confirm = name.eq_ignore_ascii_case("production");
            EnvironmentSpec {
                name,
                color,
                confirm,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_environments() {
        let specs = environment_specs(&[]);
        assert_eq!(specs.len(), 2);
        assert_eq!(specs[0].name, "staging");
        assert_eq!(specs[0].color, "cyan");
        assert!(!specs[0].confirm);
        assert_eq!(specs[1].name, "production");
        assert_eq!(specs[1].color, "magenta");
        assert!(specs[1].confirm);
    }

    #[test]
    fn test_custom_environments() {
        let specs = environment_specs(&["qa".to_string()]);
        assert_eq!(specs.len(), 1);
        assert_eq!(specs[0].color, "magenta");
        assert!(!specs[0].confirm);
    }

    #[test]
    fn test_env_color() {
        assert_eq!(default_env_color("staging"), "cyan");
        assert_eq!(default_env_color("Staging"), "cyan");
        assert_eq!(default_env_color("production"), "magenta");
        assert_eq!(default_env_color("qa"), "magenta");
    }
}

//! `valk variables`
//!
//! Variables live in the descriptor; every edit here is local until
//! `valk update --config` pushes them to the function. Encrypted values are
//! stored as KMS ciphertext and shown decrypted only when the caller's
//! credentials allow it.

use colored::Colorize;
use valkyrie_cloud::ApiError;
use valkyrie_core::{EnvironmentRecord, KmsRecord, ProjectStore, Valkconfig};

use crate::context::{Session, target_env};
use crate::prompt;

const VALUE_PREVIEW_CHARS: usize = 25;

pub async fn handle(
    create: bool,
    encrypt: bool,
    delete: bool,
    env: Option<String>,
    profile: Option<&str>,
) -> anyhow::Result<()> {
    let store = ProjectStore::discover()?;
    let mut config = store.load().await?;
    let env = target_env(&config, env)?;

    let region = config.project.region.clone();
    let session = Session::open(store, &region, profile, true).await?;

    if create {
        create_variable(&session, &mut config, &env).await
    } else if encrypt {
        encrypt_variables(&session, &mut config, &env).await
    } else if delete {
        delete_variables(&session, &mut config, &env).await
    } else {
        list_variables(&session, &config, &env).await
    }
}

async fn create_variable(
    session: &Session,
    config: &mut Valkconfig,
    env: &str,
) -> anyhow::Result<()> {
    let name = prompt::input("Name", "")?;
    anyhow::ensure!(!name.is_empty(), "variable name must not be empty");
    let current = config
        .environment(env)?
        .lambda
        .environment
        .variables
        .get(&name)
        .cloned()
        .unwrap_or_default();
    let value = prompt::input("Value", &current)?;

    let record = config.environment_mut(env)?;
    record
        .lambda
        .environment
        .variables
        .insert(name.clone(), value);
    // A re-created variable is plaintext again
    if let Some(kms) = &mut record.kms {
        kms.encrypted_variables.retain(|variable| variable != &name);
    }
    session.orchestrator.store().save(config).await?;

    println!("{}", "Variables updated.".green());
    list_variables(session, config, env).await?;
    print_push_hint();
    Ok(())
}

async fn encrypt_variables(
    session: &Session,
    config: &mut Valkconfig,
    env: &str,
) -> anyhow::Result<()> {
    let names = plain_variable_names(config, env)?;
    let selected = prompt::multi_select("Variables to encrypt", &names)?;
    if selected.is_empty() {
        println!("{}", "Nothing selected.".yellow());
        return Ok(());
    }

    let key_id = ensure_key(session, config, env).await?;
    for index in selected {
        let name = &names[index];
        let value = config
            .environment(env)?
            .lambda
            .environment
            .variables
            .get(name)
            .cloned()
            .unwrap_or_default();
        let ciphertext = session
            .orchestrator
            .clients()
            .keys
            .encrypt(&key_id, &value)
            .await
            .map_err(friendly_kms_error)?;

        let record = config.environment_mut(env)?;
        record
            .lambda
            .environment
            .variables
            .insert(name.clone(), ciphertext);
        if let Some(kms) = &mut record.kms
            && !kms.encrypted_variables.contains(name)
        {
            kms.encrypted_variables.push(name.clone());
        }
        session.orchestrator.store().save(config).await?;
        println!("  {} {} encrypted", "✓".green(), name.bold());
    }
    print_push_hint();
    Ok(())
}

async fn delete_variables(
    session: &Session,
    config: &mut Valkconfig,
    env: &str,
) -> anyhow::Result<()> {
    let names = variable_names(config, env)?;
    let selected = prompt::multi_select("Variables to delete", &names)?;
    if selected.is_empty() {
        println!("{}", "Nothing selected.".yellow());
        return Ok(());
    }

    let record = config.environment_mut(env)?;
    for index in &selected {
        let name = &names[*index];
        record.lambda.environment.variables.remove(name);
        if let Some(kms) = &mut record.kms {
            kms.encrypted_variables.retain(|variable| variable != name);
        }
    }
    session.orchestrator.store().save(config).await?;

    println!("{}", "Variables updated.".green());
    print_push_hint();
    Ok(())
}

async fn list_variables(session: &Session, config: &Valkconfig, env: &str) -> anyhow::Result<()> {
    let record = config.environment(env)?;
    let variables = &record.lambda.environment.variables;
    if variables.is_empty() {
        println!(
            "{}",
            format!("The {} environment doesn't have any variables", env).yellow()
        );
        return Ok(());
    }

    println!("{}", format!("{:<24} {}", "NAME", "VALUE").bold());
    println!("{}", "─".repeat(60).dimmed());
    for (name, value) in variables {
        if is_encrypted(record, name) {
            match session.orchestrator.clients().keys.decrypt(value).await {
                Ok(plain) => println!(
                    "{:<24} {} {} 🔒",
                    name,
                    preview(&plain),
                    "(decrypted)".green()
                ),
                Err(ApiError::AccessDenied(_)) => println!(
                    "{:<24} {} {} 🔒",
                    name,
                    preview(value),
                    "(encrypted)".red()
                ),
                Err(e) => return Err(e.into()),
            }
        } else {
            println!("{:<24} {}", name, preview(value));
        }
    }
    Ok(())
}

/// Key backing this environment's encrypted variables, created on first use
async fn ensure_key(
    session: &Session,
    config: &mut Valkconfig,
    env: &str,
) -> anyhow::Result<String> {
    if let Some(kms) = &config.environment(env)?.kms
        && !kms.key_id.is_empty()
    {
        return Ok(kms.key_id.clone());
    }

    let key_name = format!("{}-{}", config.project.name, env);
    println!("{} {}", "Creating encryption key".blue(), key_name.bold());
    let key_id = session.orchestrator.clients().keys.create(&key_name).await?;

    let record = config.environment_mut(env)?;
    record.kms = Some(KmsRecord {
        key_id: key_id.clone(),
        encrypted_variables: Vec::new(),
    });
    session.orchestrator.store().save(config).await?;
    Ok(key_id)
}

fn friendly_kms_error(err: ApiError) -> anyhow::Error {
    match err {
        ApiError::NotFound(_) => anyhow::anyhow!(
            "the KMS key does not exist in the selected account or you are not allowed to use it"
        ),
        other => other.into(),
    }
}

fn is_encrypted(record: &EnvironmentRecord, name: &str) -> bool {
    record
        .kms
        .as_ref()
        .is_some_and(|kms| kms.encrypted_variables.iter().any(|variable| variable == name))
}

fn variable_names(config: &Valkconfig, env: &str) -> anyhow::Result<Vec<String>> {
    let names: Vec<String> = config
        .environment(env)?
        .lambda
        .environment
        .variables
        .keys()
        .cloned()
        .collect();
    anyhow::ensure!(
        !names.is_empty(),
        "the {} environment doesn't have any variables",
        env
    );
    Ok(names)
}

fn plain_variable_names(config: &Valkconfig, env: &str) -> anyhow::Result<Vec<String>> {
    let all = variable_names(config, env)?;
    let record = config.environment(env)?;
    let names: Vec<String> = all
        .into_iter()
        .filter(|name| !is_encrypted(record, name))
        .collect();
    anyhow::ensure!(
        !names.is_empty(),
        "every variable of {} is already encrypted",
        env
    );
    Ok(names)
}

fn print_push_hint() {
    println!(
        "{}",
        "Run `valk update --config` to push the new values.".dimmed()
    );
}

/// Truncate long values for display
fn preview(value: &str) -> String {
    if value.chars().count() > VALUE_PREVIEW_CHARS {
        let cut: String = value.chars().take(VALUE_PREVIEW_CHARS).collect();
        format!("{}...", cut)
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preview_truncates_long_values() {
        assert_eq!(preview("short"), "short");
        let long = "a".repeat(30);
        let shown = preview(&long);
        assert_eq!(shown, format!("{}...", "a".repeat(25)));
    }

    #[test]
    fn test_is_encrypted() {
        let mut record = EnvironmentRecord::default();
        assert!(!is_encrypted(&record, "TOKEN"));
        record.kms = Some(KmsRecord {
            key_id: "key-1".to_string(),
            encrypted_variables: vec!["TOKEN".to_string()],
        });
        assert!(is_encrypted(&record, "TOKEN"));
        assert!(!is_encrypted(&record, "NODE_ENV"));
    }
}

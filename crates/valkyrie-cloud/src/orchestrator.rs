//! Workflow orchestration
//!
//! Drives the create, delete, and update flows over the client facades. The
//! orchestrator owns its whole client context; nothing here reaches for
//! process-global state. Confirmation prompts go through the [`Confirmation`]
//! collaborator and a declined prompt is a soft abort, reported as
//! [`Outcome::Aborted`] rather than an error.

use crate::api::FunctionConfigPatch;
use crate::client::CloudClients;
use crate::error::{ApiError, Result};
use crate::workflow::{Destroyer, Packager, Provisioner, WorkflowOptions};
use colored::Colorize;
use tracing::warn;
use valkyrie_core::{CoreError, EnvironmentRecord, ProjectStore, Valkconfig};

/// Asks the user to approve a mutating operation
pub trait Confirmation: Send + Sync {
    fn confirm(&self, message: &str) -> std::io::Result<bool>;
}

/// How a gated flow ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Done,
    Aborted,
}

impl Outcome {
    pub fn aborted(&self) -> bool {
        matches!(self, Outcome::Aborted)
    }
}

/// One environment to provision
#[derive(Debug, Clone)]
pub struct EnvironmentSpec {
    pub name: String,
    pub color: String,
    pub confirm: bool,
}

/// Function template shared by every environment of a project
#[derive(Debug, Clone)]
pub struct FunctionSettings {
    pub description: String,
    pub handler: String,
    pub memory_mb: u32,
    pub timeout_sec: u32,
    pub runtime: String,
}

impl Default for FunctionSettings {
    fn default() -> Self {
        Self {
            description: String::new(),
            handler: valkyrie_core::model::DEFAULT_HANDLER.to_string(),
            memory_mb: valkyrie_core::model::DEFAULT_MEMORY_MB,
            timeout_sec: valkyrie_core::model::DEFAULT_TIMEOUT_SEC,
            runtime: valkyrie_core::model::DEFAULT_RUNTIME.to_string(),
        }
    }
}

/// What `update` should push
#[derive(Debug, Clone, Copy)]
pub struct UpdateRequest {
    pub push_code: bool,
    pub push_config: bool,
    pub assume_yes: bool,
}

pub struct Orchestrator {
    clients: CloudClients,
    packager: Box<dyn Packager>,
    confirmation: Box<dyn Confirmation>,
    store: ProjectStore,
    options: WorkflowOptions,
}

impl Orchestrator {
    pub fn new(
        clients: CloudClients,
        packager: Box<dyn Packager>,
        confirmation: Box<dyn Confirmation>,
        store: ProjectStore,
        options: WorkflowOptions,
    ) -> Self {
        Self {
            clients,
            packager,
            confirmation,
            store,
            options,
        }
    }

    pub fn clients(&self) -> &CloudClients {
        &self.clients
    }

    pub fn store(&self) -> &ProjectStore {
        &self.store
    }

    /// Provision every requested environment in order, stopping at the first
    /// failure
    pub async fn create_project(
        &self,
        config: &mut Valkconfig,
        specs: &[EnvironmentSpec],
        settings: &FunctionSettings,
    ) -> Result<()> {
        // Checkpoint the descriptor before any remote call happens
        self.store.save(config).await?;

        for spec in specs {
            self.create_environment(config, spec, settings).await?;
        }
        Ok(())
    }

    /// Provision one environment; on failure tear the partial record down
    /// again unless rollback is disabled, then re-raise the original error
    pub async fn create_environment(
        &self,
        config: &mut Valkconfig,
        spec: &EnvironmentSpec,
        settings: &FunctionSettings,
    ) -> Result<()> {
        if config.environments.contains_key(&spec.name) {
            return Err(CoreError::InvalidDescriptor(format!(
                "environment already exists: {}",
                spec.name
            ))
            .into());
        }

        println!(
            "{} {}",
            "Provisioning environment".blue().bold(),
            spec.name.color(spec.color.as_str()).bold()
        );

        seed_record(config, spec, settings);
        if config.local_env.is_none() {
            config.local_env = Some(spec.name.clone());
        }
        self.store.save(config).await?;

        let provisioner = Provisioner::new(
            &self.clients,
            self.packager.as_ref(),
            &self.store,
            &self.options,
        );
        match provisioner.run(config, &spec.name).await {
            Ok(()) => {
                if let Some(url) = config.api_url(&spec.name) {
                    println!("  {} {}", "✓".green(), url.underline());
                }
                Ok(())
            }
            Err(err) => {
                if self.options.rollback_on_failure {
                    println!(
                        "{}",
                        format!("Provisioning failed, rolling back {}...", spec.name).yellow()
                    );
                    let destroyer = Destroyer::new(&self.clients, &self.store);
                    if let Err(rollback_err) = destroyer.run(config, &spec.name).await {
                        warn!(error = %rollback_err, "Rollback did not complete");
                    }
                } else {
                    println!(
                        "{}",
                        format!(
                            "Provisioning failed; partial environment {} kept (rollback disabled)",
                            spec.name
                        )
                        .yellow()
                    );
                }
                Err(err)
            }
        }
    }

    /// Tear down every environment, best-effort
    pub async fn delete_project(&self, config: &mut Valkconfig, assume_yes: bool) -> Result<Outcome> {
        if !assume_yes {
            let message = format!(
                "Delete every environment of project '{}'? This cannot be undone",
                config.project.name
            );
            if !self.confirmation.confirm(&message).map_err(ApiError::from)? {
                println!("{}", "Aborted.".yellow());
                return Ok(Outcome::Aborted);
            }
        }

        let mut all_clean = true;
        for env in config.env_names() {
            println!("{} {}", "Deleting environment".blue().bold(), env.bold());
            let report = Destroyer::new(&self.clients, &self.store)
                .run(config, &env)
                .await?;
            all_clean &= report.clean();
        }

        if all_clean {
            println!("{}", "All environments removed.".green());
        } else {
            println!(
                "{}",
                "Some resources could not be deleted; re-run delete to retry.".yellow()
            );
        }
        Ok(Outcome::Done)
    }

    /// Tear down a single environment, best-effort
    pub async fn delete_environment(
        &self,
        config: &mut Valkconfig,
        env: &str,
        assume_yes: bool,
    ) -> Result<Outcome> {
        config.environment(env)?;

        if !assume_yes {
            let message = format!(
                "Delete environment '{}' of project '{}'? This cannot be undone",
                env, config.project.name
            );
            if !self.confirmation.confirm(&message).map_err(ApiError::from)? {
                println!("{}", "Aborted.".yellow());
                return Ok(Outcome::Aborted);
            }
        }

        println!("{} {}", "Deleting environment".blue().bold(), env.bold());
        let report = Destroyer::new(&self.clients, &self.store)
            .run(config, env)
            .await?;

        if report.clean() {
            println!("{}", format!("Environment {} removed.", env).green());
        } else {
            println!(
                "{}",
                "Some resources could not be deleted; re-run delete to retry.".yellow()
            );
        }
        Ok(Outcome::Done)
    }

    /// Push new code and/or configuration to an environment's function
    pub async fn update_environment(
        &self,
        config: &Valkconfig,
        env: &str,
        request: &UpdateRequest,
    ) -> Result<Outcome> {
        let record = config.environment(env)?;
        let function_name = record.lambda.function_name.clone().ok_or_else(|| {
            CoreError::InvalidDescriptor(format!(
                "environment {} has no function (was create interrupted?)",
                env
            ))
        })?;

        if record.confirm && !request.assume_yes {
            let message = format!(
                "Environment '{}' requires confirmation before updates. Proceed?",
                env
            );
            if !self.confirmation.confirm(&message).map_err(ApiError::from)? {
                println!("{}", "Aborted.".yellow());
                return Ok(Outcome::Aborted);
            }
        }

        if request.push_code {
            let bundle = self.packager.package(self.store.root()).await?;
            println!("  ✓ packaged code bundle ({} bytes)", bundle.len());
            self.clients
                .functions
                .update_code(&function_name, &bundle)
                .await?;
            println!("  ✓ updated code of {}", function_name.cyan());
        }

        if request.push_config {
            let patch = FunctionConfigPatch {
                description: record.lambda.description.clone(),
                handler: Some(record.lambda.handler.clone()),
                memory_mb: Some(record.lambda.memory_size),
                timeout_sec: Some(record.lambda.timeout),
                runtime: Some(record.lambda.runtime.clone()),
                variables: Some(record.lambda.environment.variables.clone()),
            };
            self.clients
                .functions
                .update_configuration(&function_name, &patch)
                .await?;
            println!("  ✓ updated configuration of {}", function_name.cyan());
        }

        Ok(Outcome::Done)
    }
}

fn seed_record(config: &mut Valkconfig, spec: &EnvironmentSpec, settings: &FunctionSettings) {
    let mut record = EnvironmentRecord {
        env_color: spec.color.clone(),
        confirm: spec.confirm,
        ..Default::default()
    };
    if !settings.description.is_empty() {
        record.lambda.description = Some(settings.description.clone());
    }
    record.lambda.handler = settings.handler.clone();
    record.lambda.memory_size = settings.memory_mb;
    record.lambda.timeout = settings.timeout_sec;
    record.lambda.runtime = settings.runtime.clone();
    record
        .lambda
        .environment
        .variables
        .insert("NODE_ENV".to_string(), spec.name.clone());
    config.environments.insert(spec.name.clone(), record);
}

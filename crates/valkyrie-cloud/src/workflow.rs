//! Provisioning workflow
//!
//! One environment is provisioned by an ordered chain of steps, each of which
//! creates a remote resource, records its identifier in the descriptor, and
//! persists the descriptor before the next step runs. A failed step surfaces
//! as a [`ProvisioningError`] naming the step; the orchestrator decides
//! whether to run the teardown chain on the partial record.
//!
//! Teardown runs the delete chain best-effort: every sub-step is guarded by
//! "identifier present, else skip", failures are reported as warnings, and
//! identifiers are cleared as their resources disappear so a re-run only
//! retries what remains.

use crate::api::{
    ApiIdentity, ApiResult, CreateFunctionRequest, CreatePolicyRequest, CreateRoleRequest,
    FunctionIdentity, ResourceKind,
};
use crate::client::CloudClients;
use crate::documents;
use crate::error::{ApiError, CloudError, ProvisioningError, Result};
use async_trait::async_trait;
use colored::Colorize;
use std::path::Path;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use valkyrie_core::{CoreError, ProjectStore, Valkconfig};

/// Produces the deployable code bundle for a project directory
#[async_trait]
pub trait Packager: Send + Sync {
    async fn package(&self, project_dir: &Path) -> ApiResult<Vec<u8>>;
}

/// Ordered provisioning steps; each name is the state the environment
/// reaches when the step succeeds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProvisionStep {
    RoleCreated,
    PolicyCreated,
    PolicyAttached,
    CodePackaged,
    FunctionCreated,
    ApiCreated,
    BackendAttached,
    Deployed,
}

impl ProvisionStep {
    pub const SEQUENCE: [ProvisionStep; 8] = [
        ProvisionStep::RoleCreated,
        ProvisionStep::PolicyCreated,
        ProvisionStep::PolicyAttached,
        ProvisionStep::CodePackaged,
        ProvisionStep::FunctionCreated,
        ProvisionStep::ApiCreated,
        ProvisionStep::BackendAttached,
        ProvisionStep::Deployed,
    ];

    pub fn resource(&self) -> ResourceKind {
        match self {
            ProvisionStep::RoleCreated => ResourceKind::Role,
            ProvisionStep::PolicyCreated | ProvisionStep::PolicyAttached => ResourceKind::Policy,
            ProvisionStep::CodePackaged => ResourceKind::Bundle,
            ProvisionStep::FunctionCreated => ResourceKind::Function,
            ProvisionStep::ApiCreated
            | ProvisionStep::BackendAttached
            | ProvisionStep::Deployed => ResourceKind::Api,
        }
    }
}

impl std::fmt::Display for ProvisionStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ProvisionStep::RoleCreated => "RoleCreated",
            ProvisionStep::PolicyCreated => "PolicyCreated",
            ProvisionStep::PolicyAttached => "PolicyAttached",
            ProvisionStep::CodePackaged => "CodePackaged",
            ProvisionStep::FunctionCreated => "FunctionCreated",
            ProvisionStep::ApiCreated => "ApiCreated",
            ProvisionStep::BackendAttached => "BackendAttached",
            ProvisionStep::Deployed => "Deployed",
        };
        write!(f, "{}", name)
    }
}

/// Settings shared by the provisioning and teardown flows
#[derive(Debug, Clone)]
pub struct WorkflowOptions {
    /// Tear the partial environment down again when a create chain fails
    pub rollback_on_failure: bool,

    /// Wall-clock limit per step, on top of the per-call retry budget
    pub step_timeout: Duration,

    pub cancel: CancellationToken,
}

impl Default for WorkflowOptions {
    fn default() -> Self {
        Self {
            rollback_on_failure: true,
            step_timeout: Duration::from_secs(300),
            cancel: CancellationToken::new(),
        }
    }
}

/// Names derived once per environment before the chain starts
struct StepNames {
    iam_name: String,
    iam_path: String,
    function_name: String,
    stage: String,
}

impl StepNames {
    fn derive(config: &Valkconfig, env: &str) -> Self {
        Self {
            iam_name: config.iam_name(env),
            iam_path: Valkconfig::iam_path(env),
            function_name: config.function_name(env),
            stage: Valkconfig::stage_name(env),
        }
    }
}

/// Runs the create chain for one environment
pub struct Provisioner<'a> {
    clients: &'a CloudClients,
    packager: &'a dyn Packager,
    store: &'a ProjectStore,
    options: &'a WorkflowOptions,
}

impl<'a> Provisioner<'a> {
    pub fn new(
        clients: &'a CloudClients,
        packager: &'a dyn Packager,
        store: &'a ProjectStore,
        options: &'a WorkflowOptions,
    ) -> Self {
        Self {
            clients,
            packager,
            store,
            options,
        }
    }

    /// Run every step in order, persisting the descriptor after each success
    pub async fn run(&self, config: &mut Valkconfig, env: &str) -> Result<()> {
        let names = StepNames::derive(config, env);
        let mut bundle: Option<Vec<u8>> = None;
        let mut function: Option<FunctionIdentity> = None;

        for step in ProvisionStep::SEQUENCE {
            info!(environment = env, step = %step, "Running provisioning step");

            let work = self.execute(config, env, &names, step, &mut bundle, &mut function);
            let result = match tokio::time::timeout(self.options.step_timeout, work).await {
                Ok(result) => result,
                Err(_) => Err(CloudError::Api(ApiError::Timeout(
                    self.options.step_timeout.as_secs(),
                ))),
            };

            match result {
                Ok(()) => self.store.save(config).await?,
                Err(CloudError::Api(source)) => {
                    return Err(ProvisioningError {
                        step,
                        environment: env.to_string(),
                        resource: step.resource(),
                        source,
                    }
                    .into());
                }
                Err(other) => return Err(other),
            }
        }

        Ok(())
    }

    async fn execute(
        &self,
        config: &mut Valkconfig,
        env: &str,
        names: &StepNames,
        step: ProvisionStep,
        bundle: &mut Option<Vec<u8>>,
        function: &mut Option<FunctionIdentity>,
    ) -> Result<()> {
        match step {
            ProvisionStep::RoleCreated => {
                let request = CreateRoleRequest {
                    name: names.iam_name.clone(),
                    description: format!("Execution role for {}", names.function_name),
                    path: names.iam_path.clone(),
                    trust_policy: documents::lambda_trust_policy(),
                };
                let identity = self.clients.roles.create(&request).await?;
                println!("  ✓ created role {}", identity.name.cyan());
                let record = config.environment_mut(env)?;
                record.iam.role_name = Some(identity.name);
                record.lambda.role = Some(identity.arn);
            }
            ProvisionStep::PolicyCreated => {
                let request = CreatePolicyRequest {
                    name: names.iam_name.clone(),
                    description: format!("Log write policy for {}", names.function_name),
                    path: names.iam_path.clone(),
                    document: documents::log_write_policy(),
                };
                let identity = self.clients.policies.create(&request).await?;
                println!("  ✓ created policy {}", identity.name.cyan());
                config.environment_mut(env)?.iam.policy_arn = Some(identity.arn);
            }
            ProvisionStep::PolicyAttached => {
                let record = config.environment(env)?;
                let policy_arn = require(record.iam.policy_arn.as_deref(), "Iam.PolicyArn")?;
                let role_name = require(record.iam.role_name.as_deref(), "Iam.RoleName")?;
                self.clients
                    .policies
                    .attach_to_role(&policy_arn, &role_name)
                    .await?;
                println!("  ✓ attached policy to {}", role_name.cyan());
            }
            ProvisionStep::CodePackaged => {
                let bytes = self.packager.package(self.store.root()).await?;
                println!("  ✓ packaged code bundle ({} bytes)", bytes.len());
                *bundle = Some(bytes);
            }
            ProvisionStep::FunctionCreated => {
                let record = config.environment(env)?;
                let role_arn = require(record.lambda.role.as_deref(), "Lambda.Role")?;
                let Some(bytes) = bundle.as_deref() else {
                    return Err(
                        CoreError::InvalidDescriptor("code bundle not packaged".to_string()).into(),
                    );
                };
                let request = CreateFunctionRequest {
                    name: names.function_name.clone(),
                    description: record.lambda.description.clone().unwrap_or_default(),
                    handler: record.lambda.handler.clone(),
                    memory_mb: record.lambda.memory_size,
                    timeout_sec: record.lambda.timeout,
                    runtime: record.lambda.runtime.clone(),
                    role_arn,
                    variables: record.lambda.environment.variables.clone(),
                };
                let identity = self.clients.functions.create(&request, bytes).await?;
                println!("  ✓ created function {}", identity.name.cyan());
                config.environment_mut(env)?.lambda.function_name = Some(identity.name.clone());
                *function = Some(identity);
            }
            ProvisionStep::ApiCreated => {
                let description = format!("Valkyrie API for {}", names.function_name);
                let identity = self
                    .clients
                    .apis
                    .create(&names.function_name, &description)
                    .await?;
                println!("  ✓ created API {}", identity.api_id.cyan());
                let record = config.environment_mut(env)?;
                record.api.id = Some(identity.api_id);
                record.api.resource_id = Some(identity.resource_id);
            }
            ProvisionStep::BackendAttached => {
                let record = config.environment(env)?;
                let identity = ApiIdentity {
                    api_id: require(record.api.id.as_deref(), "Api.Id")?,
                    resource_id: require(record.api.resource_id.as_deref(), "Api.ResourceId")?,
                };
                let policy_arn = require(record.iam.policy_arn.as_deref(), "Iam.PolicyArn")?;
                let Some(function) = function.as_ref() else {
                    return Err(
                        CoreError::InvalidDescriptor("function identity not recorded".to_string())
                            .into(),
                    );
                };
                self.clients
                    .apis
                    .attach_backend(&identity, function, &policy_arn)
                    .await?;
                println!("  ✓ wired API to {}", function.name.cyan());
            }
            ProvisionStep::Deployed => {
                let record = config.environment(env)?;
                let api_id = require(record.api.id.as_deref(), "Api.Id")?;
                self.clients
                    .apis
                    .create_deployment(&api_id, &names.stage)
                    .await?;
                println!("  ✓ deployed stage {}", names.stage.cyan());
            }
        }
        Ok(())
    }
}

fn require(value: Option<&str>, field: &str) -> Result<String> {
    value
        .map(str::to_string)
        .ok_or_else(|| CoreError::InvalidDescriptor(format!("missing {}", field)).into())
}

/// What a teardown run left behind
#[derive(Debug, Default)]
pub struct TeardownReport {
    pub failures: Vec<(ResourceKind, ApiError)>,

    /// Whether the environment record was removed from the descriptor
    pub removed: bool,
}

impl TeardownReport {
    pub fn clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Runs the delete chain for one environment
pub struct Destroyer<'a> {
    clients: &'a CloudClients,
    store: &'a ProjectStore,
}

impl<'a> Destroyer<'a> {
    pub fn new(clients: &'a CloudClients, store: &'a ProjectStore) -> Self {
        Self { clients, store }
    }

    /// Delete whatever the descriptor says exists, in the delete-chain order:
    /// detach policy, delete policy, delete role, delete function, delete api
    pub async fn run(&self, config: &mut Valkconfig, env: &str) -> Result<TeardownReport> {
        let mut report = TeardownReport::default();

        // detach policy from role
        let record = config.environment(env)?;
        if let (Some(policy_arn), Some(role_name)) = (
            record.iam.policy_arn.clone(),
            record.iam.role_name.clone(),
        ) {
            match self
                .clients
                .policies
                .detach_from_role(&policy_arn, &role_name)
                .await
            {
                Ok(()) => println!("  ✓ detached policy from {}", role_name.cyan()),
                Err(e) => {
                    warn!(environment = env, error = %e, "Policy detach failed");
                    println!("  ⚠ could not detach policy: {}", e);
                    report.failures.push((ResourceKind::Policy, e));
                }
            }
        }

        // delete policy (non-default versions first)
        if let Some(policy_arn) = config.environment(env)?.iam.policy_arn.clone() {
            match self.clients.policies.delete(&policy_arn).await {
                Ok(()) => {
                    println!("  ✓ deleted policy");
                    config.environment_mut(env)?.iam.policy_arn = None;
                    self.store.save(config).await?;
                }
                Err(e) => {
                    warn!(environment = env, error = %e, "Policy delete failed");
                    println!("  ⚠ could not delete policy: {}", e);
                    report.failures.push((ResourceKind::Policy, e));
                }
            }
        } else {
            println!("  - policy (not created)");
        }

        // delete role
        if let Some(role_name) = config.environment(env)?.iam.role_name.clone() {
            match self.clients.roles.delete(&role_name).await {
                Ok(()) => {
                    println!("  ✓ deleted role {}", role_name.cyan());
                    let record = config.environment_mut(env)?;
                    record.iam.role_name = None;
                    record.lambda.role = None;
                    self.store.save(config).await?;
                }
                Err(e) => {
                    warn!(environment = env, error = %e, "Role delete failed");
                    println!("  ⚠ could not delete role: {}", e);
                    report.failures.push((ResourceKind::Role, e));
                }
            }
        } else {
            println!("  - role (not created)");
        }

        // delete function
        if let Some(function_name) = config.environment(env)?.lambda.function_name.clone() {
            match self.clients.functions.delete(&function_name).await {
                Ok(()) => {
                    println!("  ✓ deleted function {}", function_name.cyan());
                    config.environment_mut(env)?.lambda.function_name = None;
                    self.store.save(config).await?;
                }
                Err(e) => {
                    warn!(environment = env, error = %e, "Function delete failed");
                    println!("  ⚠ could not delete function: {}", e);
                    report.failures.push((ResourceKind::Function, e));
                }
            }
        } else {
            println!("  - function (not created)");
        }

        // delete api
        if let Some(api_id) = config.environment(env)?.api.id.clone() {
            match self.clients.apis.delete(&api_id).await {
                Ok(()) => {
                    println!("  ✓ deleted API {}", api_id.cyan());
                    let record = config.environment_mut(env)?;
                    record.api.id = None;
                    record.api.resource_id = None;
                    self.store.save(config).await?;
                }
                Err(e) => {
                    warn!(environment = env, error = %e, "API delete failed");
                    println!("  ⚠ could not delete API: {}", e);
                    report.failures.push((ResourceKind::Api, e));
                }
            }
        } else {
            println!("  - API (not created)");
        }

        // Key material is never torn down here; key deletion is a scheduled
        // operation on the provider side
        if config.environment(env)?.kms.is_some() {
            println!("  - encryption key left in place");
        }

        // Remove the record only when nothing remains to retry
        let record = config.environment(env)?;
        let empty = record.iam.role_name.is_none()
            && record.iam.policy_arn.is_none()
            && record.lambda.function_name.is_none()
            && record.api.id.is_none();
        if report.clean() && empty {
            config.environments.remove(env);
            if config.local_env.as_deref() == Some(env) {
                config.local_env = config.environments.keys().next().cloned();
            }
            self.store.save(config).await?;
            report.removed = true;
        }

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_names_match_reached_states() {
        let names: Vec<String> = ProvisionStep::SEQUENCE
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(
            names,
            vec![
                "RoleCreated",
                "PolicyCreated",
                "PolicyAttached",
                "CodePackaged",
                "FunctionCreated",
                "ApiCreated",
                "BackendAttached",
                "Deployed",
            ]
        );
    }

    #[test]
    fn test_step_resources() {
        assert_eq!(ProvisionStep::RoleCreated.resource(), ResourceKind::Role);
        assert_eq!(ProvisionStep::CodePackaged.resource(), ResourceKind::Bundle);
        assert_eq!(ProvisionStep::Deployed.resource(), ResourceKind::Api);
    }
}

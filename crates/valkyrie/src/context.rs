//! Shared wiring for cloud-touching commands
//!
//! Every command that talks to AWS goes through a [`Session`]: one backend
//! over the `aws` CLI, the retry-wrapped client facades, and the orchestrator
//! bound to the project's descriptor store. Ctrl-C flips a cancellation token
//! the whole stack listens on.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use valkyrie_build::ZipPackager;
use valkyrie_cloud::{CloudBackend, CloudClients, Orchestrator, RetryPolicy, WorkflowOptions};
use valkyrie_cloud_aws::{AwsCli, AwsCloud, Credentials};
use valkyrie_core::{CoreError, GlobalConfig, ProjectStore, Valkconfig};

use crate::prompt;

/// Wall-clock limit for one provisioning step
const STEP_TIMEOUT: Duration = Duration::from_secs(300);

pub struct Session {
    backend: Arc<AwsCloud>,
    pub orchestrator: Orchestrator,
}

impl Session {
    pub async fn open(
        store: ProjectStore,
        region: &str,
        profile: Option<&str>,
        rollback_on_failure: bool,
    ) -> anyhow::Result<Self> {
        let mut cli = AwsCli::new(region);
        if let Some(credentials) = stored_credentials(profile).await? {
            cli = cli.with_credentials(credentials);
        }
        cli.check_installed().await?;

        let backend = Arc::new(AwsCloud::new(cli));
        let cancel = cancellation_token();
        let clients = CloudClients::new(backend.clone(), RetryPolicy::provisioning(), cancel.clone());
        let options = WorkflowOptions {
            rollback_on_failure,
            step_timeout: STEP_TIMEOUT,
            cancel,
        };
        let orchestrator = Orchestrator::new(
            clients,
            Box::new(ZipPackager),
            Box::new(prompt::TerminalPrompt),
            store,
            options,
        );
        Ok(Self {
            backend,
            orchestrator,
        })
    }

    /// Fail fast when the backend cannot authenticate
    pub async fn verify_auth(&self) -> anyhow::Result<String> {
        let status = self.backend.check_auth().await?;
        if status.authenticated {
            Ok(status.account_info.unwrap_or_default())
        } else {
            anyhow::bail!(
                "AWS authentication failed: {}",
                status.error.unwrap_or_else(|| "unknown error".to_string())
            )
        }
    }
}

/// Stored credentials for the selected profile; `None` lets the `aws` CLI
/// fall back to its own credential chain
async fn stored_credentials(profile: Option<&str>) -> anyhow::Result<Option<Credentials>> {
    let global = GlobalConfig::load().await?;
    match global.resolve_profile(profile) {
        Ok((name, found)) => {
            tracing::debug!(profile = %name, "Using credentials from the global configuration");
            Ok(Some(Credentials {
                access_key_id: found.access_key_id.clone(),
                secret_access_key: found.secret_access_key.clone(),
            }))
        }
        Err(CoreError::NoProfile) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Token cancelled on the first Ctrl-C
fn cancellation_token() -> CancellationToken {
    let cancel = CancellationToken::new();
    let handle = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, stopping after the current call");
            handle.cancel();
        }
    });
    cancel
}

/// Environment a command operates on: explicit flag, sole environment, or an
/// interactive pick
pub fn target_env(config: &Valkconfig, flag: Option<String>) -> anyhow::Result<String> {
    if let Some(env) = flag {
        config.environment(&env)?;
        return Ok(env);
    }

    let names = config.env_names();
    match names.len() {
        0 => anyhow::bail!("no environment found in valkconfig.json"),
        1 => Ok(names[0].clone()),
        _ => {
            let index = prompt::select("Select the environment", &names, 0)?;
            Ok(names[index].clone())
        }
    }
}

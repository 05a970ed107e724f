//! aws CLI wrapper
//!
//! Shells out to the AWS CLI v2 with `--output json` and maps failures onto
//! error kinds by inspecting stderr.

use serde::de::DeserializeOwned;
use std::process::Stdio;
use tokio::process::Command;
use valkyrie_cloud::ApiError;
use valkyrie_cloud::api::ApiResult;

/// Static credentials from a Valkyrie profile
#[derive(Debug, Clone)]
pub struct Credentials {
    pub access_key_id: String,
    pub secret_access_key: String,
}

/// aws CLI wrapper bound to one region
pub struct AwsCli {
    region: String,
    credentials: Option<Credentials>,
}

impl AwsCli {
    pub fn new(region: impl Into<String>) -> Self {
        Self {
            region: region.into(),
            credentials: None,
        }
    }

    /// Use explicit credentials instead of the CLI's own resolution chain
    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    /// Check that the aws CLI is installed
    pub async fn check_installed(&self) -> ApiResult<()> {
        let which = Command::new("which").arg("aws").output().await?;

        if !which.status.success() {
            return Err(ApiError::CliNotFound);
        }
        Ok(())
    }

    /// Run an aws subcommand and return stdout
    pub async fn run(&self, service: &str, args: &[&str]) -> ApiResult<String> {
        let mut cmd = Command::new("aws");
        cmd.arg(service);
        cmd.args(args);
        cmd.arg("--region").arg(&self.region);
        cmd.arg("--output").arg("json");
        if let Some(credentials) = &self.credentials {
            cmd.env("AWS_ACCESS_KEY_ID", &credentials.access_key_id);
            cmd.env("AWS_SECRET_ACCESS_KEY", &credentials.secret_access_key);
        }
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());

        tracing::debug!("Running: aws {} {}", service, args.join(" "));

        let output = cmd.output().await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ApiError::CliNotFound
            } else {
                ApiError::Io(e)
            }
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(classify_failure(stderr.trim()));
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    /// Run a subcommand and parse its JSON stdout
    pub async fn run_json<T: DeserializeOwned>(
        &self,
        service: &str,
        args: &[&str],
    ) -> ApiResult<T> {
        let output = self.run(service, args).await?;
        Ok(serde_json::from_str(&output)?)
    }
}

/// Map CLI stderr onto an error kind
///
/// The CLI prints the service error code in its message, so substring checks
/// are enough to tell throttling and permission problems apart from the rest.
fn classify_failure(stderr: &str) -> ApiError {
    if stderr.contains("Throttling")
        || stderr.contains("TooManyRequests")
        || stderr.contains("Rate exceeded")
    {
        ApiError::Throttled(stderr.to_string())
    } else if stderr.contains("AccessDenied")
        || stderr.contains("UnauthorizedOperation")
        || stderr.contains("not authorized")
    {
        ApiError::AccessDenied(stderr.to_string())
    } else if stderr.contains("InvalidClientTokenId")
        || stderr.contains("SignatureDoesNotMatch")
        || stderr.contains("Unable to locate credentials")
        || stderr.contains("ExpiredToken")
    {
        ApiError::AuthenticationFailed(stderr.to_string())
    } else if stderr.contains("NotFoundException")
        || stderr.contains("NoSuchEntity")
        || stderr.contains("ResourceNotFound")
    {
        ApiError::NotFound(stderr.to_string())
    } else {
        ApiError::CommandFailed(stderr.to_string())
    }
}

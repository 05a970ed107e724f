//! Cloud-layer error types

use crate::api::ResourceKind;
use crate::workflow::ProvisionStep;
use thiserror::Error;
use valkyrie_core::CoreError;

/// Error from a single remote call (or the machinery around one)
///
/// Kinds exist for user-facing messages; the retry engine treats them all the
/// same and propagates the final error unchanged.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("aws CLI not found. Please install the AWS CLI v2: https://aws.amazon.com/cli/")]
    CliNotFound,

    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("command failed: {0}")]
    CommandFailed(String),

    #[error("request throttled: {0}")]
    Throttled(String),

    #[error("access denied: {0}")]
    AccessDenied(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),

    #[error("packaging failed: {0}")]
    Packaging(String),

    #[error("step timed out after {0}s")]
    Timeout(u64),

    #[error("operation cancelled")]
    Cancelled,

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A provisioning step failed after exhausting its retries
#[derive(Error, Debug)]
#[error("step {step} failed for environment '{environment}' ({resource}): {source}")]
pub struct ProvisioningError {
    pub step: ProvisionStep,
    pub environment: String,
    pub resource: ResourceKind,
    #[source]
    pub source: ApiError,
}

#[derive(Error, Debug)]
pub enum CloudError {
    #[error("{0}")]
    Provisioning(#[from] ProvisioningError),

    #[error("{0}")]
    Api(#[from] ApiError),

    #[error("{0}")]
    Descriptor(#[from] CoreError),
}

pub type Result<T> = std::result::Result<T, CloudError>;

//! Resource API seam
//!
//! Raw, unretried calls a cloud backend must provide. The AWS implementation
//! lives in `valkyrie-cloud-aws`; tests substitute recording mocks. Facades
//! in [`crate::client`] wrap each call in the retry engine.

use crate::error::ApiError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub type ApiResult<T> = std::result::Result<T, ApiError>;

/// What kind of remote resource an operation touches
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    Role,
    Policy,
    Function,
    Api,
    Key,
    Logs,
    Bundle,
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResourceKind::Role => write!(f, "role"),
            ResourceKind::Policy => write!(f, "policy"),
            ResourceKind::Function => write!(f, "function"),
            ResourceKind::Api => write!(f, "api"),
            ResourceKind::Key => write!(f, "key"),
            ResourceKind::Logs => write!(f, "logs"),
            ResourceKind::Bundle => write!(f, "bundle"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CreateRoleRequest {
    pub name: String,
    pub description: String,
    pub path: String,
    pub trust_policy: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleIdentity {
    pub name: String,
    pub arn: String,
}

#[derive(Debug, Clone)]
pub struct CreatePolicyRequest {
    pub name: String,
    pub description: String,
    pub path: String,
    pub document: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyIdentity {
    pub name: String,
    pub arn: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyVersion {
    pub version_id: String,
    pub is_default: bool,
}

#[derive(Debug, Clone)]
pub struct CreateFunctionRequest {
    pub name: String,
    pub description: String,
    pub handler: String,
    pub memory_mb: u32,
    pub timeout_sec: u32,
    pub runtime: String,
    pub role_arn: String,
    pub variables: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionIdentity {
    pub name: String,
    pub arn: String,
}

/// Partial configuration push for an existing function
#[derive(Debug, Clone, Default)]
pub struct FunctionConfigPatch {
    pub description: Option<String>,
    pub handler: Option<String>,
    pub memory_mb: Option<u32>,
    pub timeout_sec: Option<u32>,
    pub runtime: Option<String>,
    pub variables: Option<BTreeMap<String, String>>,
}

impl FunctionConfigPatch {
    pub fn is_empty(&self) -> bool {
        self.description.is_none()
            && self.handler.is_none()
            && self.memory_mb.is_none()
            && self.timeout_sec.is_none()
            && self.runtime.is_none()
            && self.variables.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiIdentity {
    pub api_id: String,
    pub resource_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEvent {
    pub timestamp: i64,
    pub message: String,
}

/// Authentication status of the configured backend
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthStatus {
    pub authenticated: bool,
    pub account_info: Option<String>,
    pub error: Option<String>,
}

impl AuthStatus {
    pub fn ok(account_info: impl Into<String>) -> Self {
        Self {
            authenticated: true,
            account_info: Some(account_info.into()),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            authenticated: false,
            account_info: None,
            error: Some(error.into()),
        }
    }
}

#[async_trait]
pub trait RoleApi: Send + Sync {
    async fn create_role(&self, request: &CreateRoleRequest) -> ApiResult<RoleIdentity>;
    async fn delete_role(&self, name: &str) -> ApiResult<()>;
}

#[async_trait]
pub trait PolicyApi: Send + Sync {
    async fn create_policy(&self, request: &CreatePolicyRequest) -> ApiResult<PolicyIdentity>;
    async fn attach_role_policy(&self, policy_arn: &str, role_name: &str) -> ApiResult<()>;
    async fn detach_role_policy(&self, policy_arn: &str, role_name: &str) -> ApiResult<()>;
    async fn list_policy_versions(&self, policy_arn: &str) -> ApiResult<Vec<PolicyVersion>>;
    async fn delete_policy_version(&self, policy_arn: &str, version_id: &str) -> ApiResult<()>;
    async fn delete_policy(&self, policy_arn: &str) -> ApiResult<()>;
}

#[async_trait]
pub trait FunctionApi: Send + Sync {
    async fn create_function(
        &self,
        request: &CreateFunctionRequest,
        bundle: &[u8],
    ) -> ApiResult<FunctionIdentity>;
    async fn delete_function(&self, name: &str) -> ApiResult<()>;
    async fn update_function_code(&self, name: &str, bundle: &[u8]) -> ApiResult<()>;
    async fn update_function_configuration(
        &self,
        name: &str,
        patch: &FunctionConfigPatch,
    ) -> ApiResult<()>;

    /// Allow the gateway to invoke the function; the backend builds the
    /// execute-api source ARN from its configured region
    async fn add_invoke_permission(
        &self,
        function_name: &str,
        statement_id: &str,
        api_id: &str,
        account_id: &str,
    ) -> ApiResult<()>;
}

#[async_trait]
pub trait GatewayApi: Send + Sync {
    async fn create_rest_api(&self, name: &str, description: &str) -> ApiResult<String>;
    async fn root_resource_id(&self, api_id: &str) -> ApiResult<String>;
    async fn create_proxy_resource(&self, api_id: &str, parent_id: &str) -> ApiResult<String>;
    async fn put_any_method(&self, api_id: &str, resource_id: &str) -> ApiResult<()>;
    async fn put_integration(
        &self,
        api_id: &str,
        resource_id: &str,
        function_arn: &str,
    ) -> ApiResult<()>;
    async fn put_integration_response(&self, api_id: &str, resource_id: &str) -> ApiResult<()>;
    async fn create_deployment(&self, api_id: &str, stage_name: &str) -> ApiResult<()>;
    async fn delete_rest_api(&self, api_id: &str) -> ApiResult<()>;
}

#[async_trait]
pub trait KeyApi: Send + Sync {
    async fn create_key(&self, description: &str) -> ApiResult<String>;
    async fn create_alias(&self, alias: &str, key_id: &str) -> ApiResult<()>;
    async fn encrypt(&self, key_id: &str, plaintext: &str) -> ApiResult<String>;
    async fn decrypt(&self, ciphertext: &str) -> ApiResult<String>;
}

#[async_trait]
pub trait LogsApi: Send + Sync {
    async fn latest_stream(&self, group: &str) -> ApiResult<Option<String>>;
    async fn log_events(&self, group: &str, stream: &str) -> ApiResult<Vec<LogEvent>>;
}

/// Full surface a cloud backend provides
#[async_trait]
pub trait CloudBackend:
    RoleApi + PolicyApi + FunctionApi + GatewayApi + KeyApi + LogsApi
{
    /// Check that the backend tooling is installed and credentials work
    async fn check_auth(&self) -> ApiResult<AuthStatus>;
}

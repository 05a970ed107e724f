//! Resource client facades
//!
//! One facade per resource kind, each call individually wrapped in the retry
//! engine. [`CloudClients`] bundles them so workflows receive their whole
//! client context explicitly instead of reaching for shared singletons.

use crate::api::{
    ApiIdentity, ApiResult, CloudBackend, CreateFunctionRequest, CreatePolicyRequest,
    CreateRoleRequest, FunctionApi, FunctionConfigPatch, FunctionIdentity, GatewayApi, KeyApi,
    LogEvent, LogsApi, PolicyApi, PolicyIdentity, PolicyVersion, RoleApi, RoleIdentity,
};
use crate::error::ApiError;
use crate::retry::{RetryPolicy, retry};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Statement ids must be unique within a function's resource policy; derive a
/// stable one from the wiring so re-running the step stays idempotent
pub fn invoke_statement_id(api_id: &str, resource_id: &str) -> String {
    format!("valkyrie-{}-{}", api_id, resource_id)
}

/// Account id is the fifth `:`-separated field of an ARN
pub fn account_id_from_arn(arn: &str) -> ApiResult<String> {
    arn.split(':')
        .nth(4)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .ok_or_else(|| ApiError::UnexpectedResponse(format!("malformed ARN: {}", arn)))
}

pub struct RoleClient {
    api: Arc<dyn RoleApi>,
    retry: RetryPolicy,
    cancel: CancellationToken,
}

impl RoleClient {
    pub fn new(api: Arc<dyn RoleApi>, retry: RetryPolicy, cancel: CancellationToken) -> Self {
        Self { api, retry, cancel }
    }

    pub async fn create(&self, request: &CreateRoleRequest) -> ApiResult<RoleIdentity> {
        retry(&self.retry, &self.cancel, || self.api.create_role(request)).await
    }

    pub async fn delete(&self, name: &str) -> ApiResult<()> {
        retry(&self.retry, &self.cancel, || self.api.delete_role(name)).await
    }
}

pub struct PolicyClient {
    api: Arc<dyn PolicyApi>,
    retry: RetryPolicy,
    cancel: CancellationToken,
}

impl PolicyClient {
    pub fn new(api: Arc<dyn PolicyApi>, retry: RetryPolicy, cancel: CancellationToken) -> Self {
        Self { api, retry, cancel }
    }

    pub async fn create(&self, request: &CreatePolicyRequest) -> ApiResult<PolicyIdentity> {
        retry(&self.retry, &self.cancel, || {
            self.api.create_policy(request)
        })
        .await
    }

    pub async fn attach_to_role(&self, policy_arn: &str, role_name: &str) -> ApiResult<()> {
        retry(&self.retry, &self.cancel, || {
            self.api.attach_role_policy(policy_arn, role_name)
        })
        .await
    }

    pub async fn detach_from_role(&self, policy_arn: &str, role_name: &str) -> ApiResult<()> {
        retry(&self.retry, &self.cancel, || {
            self.api.detach_role_policy(policy_arn, role_name)
        })
        .await
    }

    /// Delete a policy, removing its non-default versions first (the delete
    /// call rejects policies that still have versions)
    pub async fn delete(&self, policy_arn: &str) -> ApiResult<()> {
        let versions = retry(&self.retry, &self.cancel, || {
            self.api.list_policy_versions(policy_arn)
        })
        .await?;

        for version in versions.iter().filter(|v| !v.is_default) {
            retry(&self.retry, &self.cancel, || {
                self.api.delete_policy_version(policy_arn, &version.version_id)
            })
            .await?;
        }

        retry(&self.retry, &self.cancel, || {
            self.api.delete_policy(policy_arn)
        })
        .await
    }

    pub async fn versions(&self, policy_arn: &str) -> ApiResult<Vec<PolicyVersion>> {
        retry(&self.retry, &self.cancel, || {
            self.api.list_policy_versions(policy_arn)
        })
        .await
    }
}

pub struct FunctionClient {
    api: Arc<dyn FunctionApi>,
    retry: RetryPolicy,
    cancel: CancellationToken,
}

impl FunctionClient {
    pub fn new(api: Arc<dyn FunctionApi>, retry: RetryPolicy, cancel: CancellationToken) -> Self {
        Self { api, retry, cancel }
    }

    pub async fn create(
        &self,
        request: &CreateFunctionRequest,
        bundle: &[u8],
    ) -> ApiResult<FunctionIdentity> {
        retry(&self.retry, &self.cancel, || {
            self.api.create_function(request, bundle)
        })
        .await
    }

    pub async fn delete(&self, name: &str) -> ApiResult<()> {
        retry(&self.retry, &self.cancel, || self.api.delete_function(name)).await
    }

    pub async fn update_code(&self, name: &str, bundle: &[u8]) -> ApiResult<()> {
        retry(&self.retry, &self.cancel, || {
            self.api.update_function_code(name, bundle)
        })
        .await
    }

    pub async fn update_configuration(
        &self,
        name: &str,
        patch: &FunctionConfigPatch,
    ) -> ApiResult<()> {
        retry(&self.retry, &self.cancel, || {
            self.api.update_function_configuration(name, patch)
        })
        .await
    }
}

pub struct ApiClient {
    gateway: Arc<dyn GatewayApi>,
    functions: Arc<dyn FunctionApi>,
    retry: RetryPolicy,
    cancel: CancellationToken,
}

impl ApiClient {
    pub fn new(
        gateway: Arc<dyn GatewayApi>,
        functions: Arc<dyn FunctionApi>,
        retry: RetryPolicy,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            gateway,
            functions,
            retry,
            cancel,
        }
    }

    /// Create the REST API with a greedy `{proxy+}` resource accepting ANY
    /// method
    pub async fn create(&self, name: &str, description: &str) -> ApiResult<ApiIdentity> {
        let api_id = retry(&self.retry, &self.cancel, || {
            self.gateway.create_rest_api(name, description)
        })
        .await?;

        let root_id = retry(&self.retry, &self.cancel, || {
            self.gateway.root_resource_id(&api_id)
        })
        .await?;

        let resource_id = retry(&self.retry, &self.cancel, || {
            self.gateway.create_proxy_resource(&api_id, &root_id)
        })
        .await?;

        retry(&self.retry, &self.cancel, || {
            self.gateway.put_any_method(&api_id, &resource_id)
        })
        .await?;

        Ok(ApiIdentity {
            api_id,
            resource_id,
        })
    }

    /// Wire the proxy resource to the function: integration, integration
    /// response, and an invoke permission for the gateway
    pub async fn attach_backend(
        &self,
        identity: &ApiIdentity,
        function: &FunctionIdentity,
        caller_policy_arn: &str,
    ) -> ApiResult<()> {
        retry(&self.retry, &self.cancel, || {
            self.gateway
                .put_integration(&identity.api_id, &identity.resource_id, &function.arn)
        })
        .await?;

        retry(&self.retry, &self.cancel, || {
            self.gateway
                .put_integration_response(&identity.api_id, &identity.resource_id)
        })
        .await?;

        let statement_id = invoke_statement_id(&identity.api_id, &identity.resource_id);
        let account_id = account_id_from_arn(caller_policy_arn)?;
        retry(&self.retry, &self.cancel, || {
            self.functions.add_invoke_permission(
                &function.name,
                &statement_id,
                &identity.api_id,
                &account_id,
            )
        })
        .await
    }

    pub async fn create_deployment(&self, api_id: &str, stage_name: &str) -> ApiResult<()> {
        retry(&self.retry, &self.cancel, || {
            self.gateway.create_deployment(api_id, stage_name)
        })
        .await
    }

    pub async fn delete(&self, api_id: &str) -> ApiResult<()> {
        retry(&self.retry, &self.cancel, || {
            self.gateway.delete_rest_api(api_id)
        })
        .await
    }
}

pub struct KeyClient {
    api: Arc<dyn KeyApi>,
    retry: RetryPolicy,
    cancel: CancellationToken,
}

impl KeyClient {
    pub fn new(api: Arc<dyn KeyApi>, retry: RetryPolicy, cancel: CancellationToken) -> Self {
        Self { api, retry, cancel }
    }

    /// Create a key with an `alias/{name}` alias and return its id
    pub async fn create(&self, name: &str) -> ApiResult<String> {
        let description = format!("{} KMS key", name);
        let key_id = retry(&self.retry, &self.cancel, || {
            self.api.create_key(&description)
        })
        .await?;

        let alias = format!("alias/{}", name);
        retry(&self.retry, &self.cancel, || {
            self.api.create_alias(&alias, &key_id)
        })
        .await?;

        Ok(key_id)
    }

    pub async fn encrypt(&self, key_id: &str, plaintext: &str) -> ApiResult<String> {
        retry(&self.retry, &self.cancel, || {
            self.api.encrypt(key_id, plaintext)
        })
        .await
    }

    pub async fn decrypt(&self, ciphertext: &str) -> ApiResult<String> {
        retry(&self.retry, &self.cancel, || self.api.decrypt(ciphertext)).await
    }
}

pub struct LogsClient {
    api: Arc<dyn LogsApi>,
    retry: RetryPolicy,
    cancel: CancellationToken,
}

impl LogsClient {
    pub fn new(api: Arc<dyn LogsApi>, retry: RetryPolicy, cancel: CancellationToken) -> Self {
        Self { api, retry, cancel }
    }

    pub async fn latest_stream(&self, group: &str) -> ApiResult<Option<String>> {
        retry(&self.retry, &self.cancel, || self.api.latest_stream(group)).await
    }

    pub async fn events(&self, group: &str, stream: &str) -> ApiResult<Vec<LogEvent>> {
        retry(&self.retry, &self.cancel, || {
            self.api.log_events(group, stream)
        })
        .await
    }
}

/// Every facade a workflow needs, built over one backend
pub struct CloudClients {
    pub roles: RoleClient,
    pub policies: PolicyClient,
    pub functions: FunctionClient,
    pub apis: ApiClient,
    pub keys: KeyClient,
    pub logs: LogsClient,
}

impl CloudClients {
    pub fn new<B>(backend: Arc<B>, retry: RetryPolicy, cancel: CancellationToken) -> Self
    where
        B: CloudBackend + 'static,
    {
        Self {
            roles: RoleClient::new(backend.clone(), retry, cancel.clone()),
            policies: PolicyClient::new(backend.clone(), retry, cancel.clone()),
            functions: FunctionClient::new(backend.clone(), retry, cancel.clone()),
            apis: ApiClient::new(backend.clone(), backend.clone(), retry, cancel.clone()),
            keys: KeyClient::new(backend.clone(), retry, cancel.clone()),
            logs: LogsClient::new(backend, retry, cancel),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_statement_id_is_deterministic_and_unique_per_wiring() {
        let a = invoke_statement_id("api1", "res1");
        assert_eq!(a, "valkyrie-api1-res1");
        assert_eq!(a, invoke_statement_id("api1", "res1"));
        assert_ne!(a, invoke_statement_id("api2", "res1"));
    }

    #[test]
    fn test_account_id_from_arn() {
        let arn = "arn:aws:iam::123456789012:policy/valkyrie/staging/demo-staging-lambda";
        assert_eq!(account_id_from_arn(arn).unwrap(), "123456789012");
        assert!(account_id_from_arn("not-an-arn").is_err());
        assert!(account_id_from_arn("arn:aws:iam:::policy/x").is_err());
    }
}

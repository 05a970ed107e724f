//! AWS backend implementation
//!
//! Each trait method maps onto one aws CLI invocation. Zip bundles go through
//! a temp file because the CLI only takes `fileb://` paths for binary
//! parameters.

use crate::awscli::AwsCli;
use crate::types::{
    CallerIdentity, CreateKeyResponse, CreatePolicyResponse, CreateRoleResponse, DecryptResponse,
    EncryptResponse, FunctionInfo, GatewayEntity, ListPolicyVersionsResponse, LogEventList,
    LogStreamList, ResourceList,
};
use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose};
use tempfile::NamedTempFile;
use valkyrie_cloud::ApiError;
use valkyrie_cloud::api::{
    ApiResult, AuthStatus, CloudBackend, CreateFunctionRequest, CreatePolicyRequest,
    CreateRoleRequest, FunctionApi, FunctionConfigPatch, FunctionIdentity, GatewayApi, KeyApi,
    LogEvent, LogsApi, PolicyApi, PolicyIdentity, PolicyVersion, RoleApi, RoleIdentity,
};

/// AWS backend, one instance per region
pub struct AwsCloud {
    cli: AwsCli,
}

impl AwsCloud {
    pub fn new(cli: AwsCli) -> Self {
        Self { cli }
    }

    pub fn region(&self) -> &str {
        self.cli.region()
    }

    /// Stage bundle bytes in a temp file and return it with its `fileb://` URI
    async fn stage_bundle(&self, bundle: &[u8]) -> ApiResult<(NamedTempFile, String)> {
        let file = NamedTempFile::with_suffix(".zip")?;
        tokio::fs::write(file.path(), bundle).await?;
        let uri = format!("fileb://{}", file.path().display());
        Ok((file, uri))
    }
}

#[async_trait]
impl RoleApi for AwsCloud {
    async fn create_role(&self, request: &CreateRoleRequest) -> ApiResult<RoleIdentity> {
        let trust_policy = request.trust_policy.to_string();
        let response: CreateRoleResponse = self
            .cli
            .run_json(
                "iam",
                &[
                    "create-role",
                    "--role-name",
                    &request.name,
                    "--description",
                    &request.description,
                    "--path",
                    &request.path,
                    "--assume-role-policy-document",
                    &trust_policy,
                ],
            )
            .await?;

        Ok(RoleIdentity {
            name: response.role.role_name,
            arn: response.role.arn,
        })
    }

    async fn delete_role(&self, name: &str) -> ApiResult<()> {
        self.cli
            .run("iam", &["delete-role", "--role-name", name])
            .await?;
        Ok(())
    }
}

#[async_trait]
impl PolicyApi for AwsCloud {
    async fn create_policy(&self, request: &CreatePolicyRequest) -> ApiResult<PolicyIdentity> {
        let document = request.document.to_string();
        let response: CreatePolicyResponse = self
            .cli
            .run_json(
                "iam",
                &[
                    "create-policy",
                    "--policy-name",
                    &request.name,
                    "--description",
                    &request.description,
                    "--path",
                    &request.path,
                    "--policy-document",
                    &document,
                ],
            )
            .await?;

        Ok(PolicyIdentity {
            name: response.policy.policy_name,
            arn: response.policy.arn,
        })
    }

    async fn attach_role_policy(&self, policy_arn: &str, role_name: &str) -> ApiResult<()> {
        self.cli
            .run(
                "iam",
                &[
                    "attach-role-policy",
                    "--policy-arn",
                    policy_arn,
                    "--role-name",
                    role_name,
                ],
            )
            .await?;
        Ok(())
    }

    async fn detach_role_policy(&self, policy_arn: &str, role_name: &str) -> ApiResult<()> {
        self.cli
            .run(
                "iam",
                &[
                    "detach-role-policy",
                    "--policy-arn",
                    policy_arn,
                    "--role-name",
                    role_name,
                ],
            )
            .await?;
        Ok(())
    }

    async fn list_policy_versions(&self, policy_arn: &str) -> ApiResult<Vec<PolicyVersion>> {
        let response: ListPolicyVersionsResponse = self
            .cli
            .run_json("iam", &["list-policy-versions", "--policy-arn", policy_arn])
            .await?;

        Ok(response
            .versions
            .into_iter()
            .map(|v| PolicyVersion {
                version_id: v.version_id,
                is_default: v.is_default,
            })
            .collect())
    }

    async fn delete_policy_version(&self, policy_arn: &str, version_id: &str) -> ApiResult<()> {
        self.cli
            .run(
                "iam",
                &[
                    "delete-policy-version",
                    "--policy-arn",
                    policy_arn,
                    "--version-id",
                    version_id,
                ],
            )
            .await?;
        Ok(())
    }

    async fn delete_policy(&self, policy_arn: &str) -> ApiResult<()> {
        self.cli
            .run("iam", &["delete-policy", "--policy-arn", policy_arn])
            .await?;
        Ok(())
    }
}

#[async_trait]
impl FunctionApi for AwsCloud {
    async fn create_function(
        &self,
        request: &CreateFunctionRequest,
        bundle: &[u8],
    ) -> ApiResult<FunctionIdentity> {
        let (_guard, zip_uri) = self.stage_bundle(bundle).await?;
        let memory = request.memory_mb.to_string();
        let timeout = request.timeout_sec.to_string();
        let environment =
            serde_json::json!({ "Variables": request.variables }).to_string();

        let response: FunctionInfo = self
            .cli
            .run_json(
                "lambda",
                &[
                    "create-function",
                    "--function-name",
                    &request.name,
                    "--description",
                    &request.description,
                    "--handler",
                    &request.handler,
                    "--memory-size",
                    &memory,
                    "--timeout",
                    &timeout,
                    "--runtime",
                    &request.runtime,
                    "--role",
                    &request.role_arn,
                    "--environment",
                    &environment,
                    "--zip-file",
                    &zip_uri,
                ],
            )
            .await?;

        Ok(FunctionIdentity {
            name: response.function_name,
            arn: response.function_arn,
        })
    }

    async fn delete_function(&self, name: &str) -> ApiResult<()> {
        self.cli
            .run("lambda", &["delete-function", "--function-name", name])
            .await?;
        Ok(())
    }

    async fn update_function_code(&self, name: &str, bundle: &[u8]) -> ApiResult<()> {
        let (_guard, zip_uri) = self.stage_bundle(bundle).await?;
        self.cli
            .run(
                "lambda",
                &[
                    "update-function-code",
                    "--function-name",
                    name,
                    "--zip-file",
                    &zip_uri,
                ],
            )
            .await?;
        Ok(())
    }

    async fn update_function_configuration(
        &self,
        name: &str,
        patch: &FunctionConfigPatch,
    ) -> ApiResult<()> {
        let mut args = vec![
            "update-function-configuration".to_string(),
            "--function-name".to_string(),
            name.to_string(),
        ];
        if let Some(description) = &patch.description {
            args.push("--description".to_string());
            args.push(description.clone());
        }
        if let Some(handler) = &patch.handler {
            args.push("--handler".to_string());
            args.push(handler.clone());
        }
        if let Some(memory_mb) = patch.memory_mb {
            args.push("--memory-size".to_string());
            args.push(memory_mb.to_string());
        }
        if let Some(timeout_sec) = patch.timeout_sec {
            args.push("--timeout".to_string());
            args.push(timeout_sec.to_string());
        }
        if let Some(runtime) = &patch.runtime {
            args.push("--runtime".to_string());
            args.push(runtime.clone());
        }
        if let Some(variables) = &patch.variables {
            args.push("--environment".to_string());
            args.push(serde_json::json!({ "Variables": variables }).to_string());
        }

        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        self.cli.run("lambda", &args).await?;
        Ok(())
    }

    async fn add_invoke_permission(
        &self,
        function_name: &str,
        statement_id: &str,
        api_id: &str,
        account_id: &str,
    ) -> ApiResult<()> {
        let source_arn = format!(
            "arn:aws:execute-api:{}:{}:{}/*/*/*",
            self.cli.region(),
            account_id,
            api_id
        );
        self.cli
            .run(
                "lambda",
                &[
                    "add-permission",
                    "--function-name",
                    function_name,
                    "--statement-id",
                    statement_id,
                    "--action",
                    "lambda:InvokeFunction",
                    "--principal",
                    "apigateway.amazonaws.com",
                    "--source-arn",
                    &source_arn,
                ],
            )
            .await?;
        Ok(())
    }
}

#[async_trait]
impl GatewayApi for AwsCloud {
    async fn create_rest_api(&self, name: &str, description: &str) -> ApiResult<String> {
        let response: GatewayEntity = self
            .cli
            .run_json(
                "apigateway",
                &[
                    "create-rest-api",
                    "--name",
                    name,
                    "--description",
                    description,
                ],
            )
            .await?;
        Ok(response.id)
    }

    async fn root_resource_id(&self, api_id: &str) -> ApiResult<String> {
        let response: ResourceList = self
            .cli
            .run_json("apigateway", &["get-resources", "--rest-api-id", api_id])
            .await?;

        response
            .items
            .iter()
            .find(|item| item.path.as_deref() == Some("/"))
            .or_else(|| response.items.first())
            .map(|item| item.id.clone())
            .ok_or_else(|| {
                ApiError::UnexpectedResponse(format!("api {} has no root resource", api_id))
            })
    }

    async fn create_proxy_resource(&self, api_id: &str, parent_id: &str) -> ApiResult<String> {
        let response: GatewayEntity = self
            .cli
            .run_json(
                "apigateway",
                &[
                    "create-resource",
                    "--rest-api-id",
                    api_id,
                    "--parent-id",
                    parent_id,
                    "--path-part",
                    "{proxy+}",
                ],
            )
            .await?;
        Ok(response.id)
    }

    async fn put_any_method(&self, api_id: &str, resource_id: &str) -> ApiResult<()> {
        self.cli
            .run(
                "apigateway",
                &[
                    "put-method",
                    "--rest-api-id",
                    api_id,
                    "--resource-id",
                    resource_id,
                    "--http-method",
                    "ANY",
                    "--authorization-type",
                    "NONE",
                    "--no-api-key-required",
                    "--operation-name",
                    "Valkyrie proxy",
                    "--request-parameters",
                    "method.request.path.proxy=true",
                ],
            )
            .await?;
        Ok(())
    }

    async fn put_integration(
        &self,
        api_id: &str,
        resource_id: &str,
        function_arn: &str,
    ) -> ApiResult<()> {
        let uri = format!(
            "arn:aws:apigateway:{}:lambda:path/2015-03-31/functions/{}/invocations",
            self.cli.region(),
            function_arn
        );
        self.cli
            .run(
                "apigateway",
                &[
                    "put-integration",
                    "--rest-api-id",
                    api_id,
                    "--resource-id",
                    resource_id,
                    "--http-method",
                    "ANY",
                    "--type",
                    "AWS_PROXY",
                    "--integration-http-method",
                    "POST",
                    "--content-handling",
                    "CONVERT_TO_TEXT",
                    "--passthrough-behavior",
                    "WHEN_NO_MATCH",
                    "--cache-key-parameters",
                    "method.request.path.proxy",
                    "--request-parameters",
                    "integration.request.path.proxy=method.request.path.proxy",
                    "--uri",
                    &uri,
                ],
            )
            .await?;
        Ok(())
    }

    async fn put_integration_response(&self, api_id: &str, resource_id: &str) -> ApiResult<()> {
        self.cli
            .run(
                "apigateway",
                &[
                    "put-integration-response",
                    "--rest-api-id",
                    api_id,
                    "--resource-id",
                    resource_id,
                    "--http-method",
                    "ANY",
                    "--status-code",
                    "200",
                    "--response-templates",
                    r#"{"application/json": "{}"}"#,
                ],
            )
            .await?;
        Ok(())
    }

    async fn create_deployment(&self, api_id: &str, stage_name: &str) -> ApiResult<()> {
        self.cli
            .run(
                "apigateway",
                &[
                    "create-deployment",
                    "--rest-api-id",
                    api_id,
                    "--stage-name",
                    stage_name,
                ],
            )
            .await?;
        Ok(())
    }

    async fn delete_rest_api(&self, api_id: &str) -> ApiResult<()> {
        self.cli
            .run("apigateway", &["delete-rest-api", "--rest-api-id", api_id])
            .await?;
        Ok(())
    }
}

#[async_trait]
impl KeyApi for AwsCloud {
    async fn create_key(&self, description: &str) -> ApiResult<String> {
        let response: CreateKeyResponse = self
            .cli
            .run_json("kms", &["create-key", "--description", description])
            .await?;
        Ok(response.key_metadata.key_id)
    }

    async fn create_alias(&self, alias: &str, key_id: &str) -> ApiResult<()> {
        self.cli
            .run(
                "kms",
                &[
                    "create-alias",
                    "--alias-name",
                    alias,
                    "--target-key-id",
                    key_id,
                ],
            )
            .await?;
        Ok(())
    }

    /// Returns the ciphertext as base64, which is how the descriptor stores it
    async fn encrypt(&self, key_id: &str, plaintext: &str) -> ApiResult<String> {
        let encoded = general_purpose::STANDARD.encode(plaintext);
        let response: EncryptResponse = self
            .cli
            .run_json(
                "kms",
                &["encrypt", "--key-id", key_id, "--plaintext", &encoded],
            )
            .await?;
        Ok(response.ciphertext_blob)
    }

    async fn decrypt(&self, ciphertext: &str) -> ApiResult<String> {
        let response: DecryptResponse = self
            .cli
            .run_json("kms", &["decrypt", "--ciphertext-blob", ciphertext])
            .await?;

        let bytes = general_purpose::STANDARD
            .decode(&response.plaintext)
            .map_err(|e| ApiError::UnexpectedResponse(format!("invalid plaintext blob: {}", e)))?;
        String::from_utf8(bytes)
            .map_err(|e| ApiError::UnexpectedResponse(format!("plaintext is not UTF-8: {}", e)))
    }
}

#[async_trait]
impl LogsApi for AwsCloud {
    async fn latest_stream(&self, group: &str) -> ApiResult<Option<String>> {
        let response: LogStreamList = self
            .cli
            .run_json(
                "logs",
                &[
                    "describe-log-streams",
                    "--log-group-name",
                    group,
                    "--order-by",
                    "LastEventTime",
                    "--descending",
                    "--limit",
                    "1",
                ],
            )
            .await?;

        Ok(response
            .log_streams
            .into_iter()
            .next()
            .map(|s| s.log_stream_name))
    }

    async fn log_events(&self, group: &str, stream: &str) -> ApiResult<Vec<LogEvent>> {
        let response: LogEventList = self
            .cli
            .run_json(
                "logs",
                &[
                    "get-log-events",
                    "--log-group-name",
                    group,
                    "--log-stream-name",
                    stream,
                ],
            )
            .await?;

        Ok(response
            .events
            .into_iter()
            .map(|e| LogEvent {
                timestamp: e.timestamp,
                message: e.message,
            })
            .collect())
    }
}

#[async_trait]
impl CloudBackend for AwsCloud {
    async fn check_auth(&self) -> ApiResult<AuthStatus> {
        self.cli.check_installed().await?;

        match self
            .cli
            .run_json::<CallerIdentity>("sts", &["get-caller-identity"])
            .await
        {
            Ok(identity) => Ok(AuthStatus::ok(format!(
                "{} ({})",
                identity.account, identity.arn
            ))),
            Err(e) => Ok(AuthStatus::failed(e.to_string())),
        }
    }
}

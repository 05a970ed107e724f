//! Workflow tests against a recording mock backend
//!
//! The mock records every raw call in order, so these tests can assert which
//! remote operations ran, how often, and in what sequence.

use async_trait::async_trait;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use valkyrie_cloud::api::{
    ApiResult, AuthStatus, CloudBackend, CreateFunctionRequest, CreatePolicyRequest,
    CreateRoleRequest, FunctionApi, FunctionConfigPatch, FunctionIdentity, GatewayApi, KeyApi,
    LogEvent, LogsApi, PolicyApi, PolicyIdentity, PolicyVersion, RoleApi, RoleIdentity,
};
use valkyrie_cloud::{
    ApiError, CloudClients, CloudError, Confirmation, EnvironmentSpec, FunctionSettings,
    Orchestrator, Outcome, Packager, PolicyClient, RetryPolicy, UpdateRequest, WorkflowOptions,
};
use valkyrie_core::{EnvironmentRecord, ProjectInfo, ProjectStore, Valkconfig};

#[derive(Default)]
struct MockCloud {
    calls: Mutex<Vec<String>>,
    fail_on: Option<String>,
    policy_versions: Vec<PolicyVersion>,
}

impl MockCloud {
    fn new() -> Self {
        Self::default()
    }

    /// Every call to `method` fails with an injected error
    fn failing(method: &str) -> Self {
        Self {
            fail_on: Some(method.to_string()),
            ..Self::default()
        }
    }

    fn with_versions(versions: Vec<PolicyVersion>) -> Self {
        Self {
            policy_versions: versions,
            ..Self::default()
        }
    }

    fn record(&self, call: String) -> ApiResult<()> {
        let method = call.split(' ').next().unwrap_or_default().to_string();
        self.calls.lock().unwrap().push(call);
        if self.fail_on.as_deref() == Some(method.as_str()) {
            return Err(ApiError::CommandFailed(format!(
                "injected failure in {}",
                method
            )));
        }
        Ok(())
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn count(&self, method: &str) -> usize {
        self.calls()
            .iter()
            .filter(|c| c.split(' ').next() == Some(method))
            .count()
    }

    fn position(&self, method: &str) -> Option<usize> {
        self.calls()
            .iter()
            .position(|c| c.split(' ').next() == Some(method))
    }
}

#[async_trait]
impl RoleApi for MockCloud {
    async fn create_role(&self, request: &CreateRoleRequest) -> ApiResult<RoleIdentity> {
        self.record(format!("create_role {}", request.name))?;
        Ok(RoleIdentity {
            name: request.name.clone(),
            arn: format!(
                "arn:aws:iam::123456789012:role{}{}",
                request.path, request.name
            ),
        })
    }

    async fn delete_role(&self, name: &str) -> ApiResult<()> {
        self.record(format!("delete_role {}", name))
    }
}

#[async_trait]
impl PolicyApi for MockCloud {
    async fn create_policy(&self, request: &CreatePolicyRequest) -> ApiResult<PolicyIdentity> {
        self.record(format!("create_policy {}", request.name))?;
        Ok(PolicyIdentity {
            name: request.name.clone(),
            arn: format!(
                "arn:aws:iam::123456789012:policy{}{}",
                request.path, request.name
            ),
        })
    }

    async fn attach_role_policy(&self, policy_arn: &str, role_name: &str) -> ApiResult<()> {
        self.record(format!("attach_role_policy {} {}", policy_arn, role_name))
    }

    async fn detach_role_policy(&self, policy_arn: &str, role_name: &str) -> ApiResult<()> {
        self.record(format!("detach_role_policy {} {}", policy_arn, role_name))
    }

    async fn list_policy_versions(&self, policy_arn: &str) -> ApiResult<Vec<PolicyVersion>> {
        self.record(format!("list_policy_versions {}", policy_arn))?;
        Ok(self.policy_versions.clone())
    }

    async fn delete_policy_version(&self, policy_arn: &str, version_id: &str) -> ApiResult<()> {
        self.record(format!("delete_policy_version {} {}", policy_arn, version_id))
    }

    async fn delete_policy(&self, policy_arn: &str) -> ApiResult<()> {
        self.record(format!("delete_policy {}", policy_arn))
    }
}

#[async_trait]
impl FunctionApi for MockCloud {
    async fn create_function(
        &self,
        request: &CreateFunctionRequest,
        bundle: &[u8],
    ) -> ApiResult<FunctionIdentity> {
        self.record(format!("create_function {} {}", request.name, bundle.len()))?;
        Ok(FunctionIdentity {
            name: request.name.clone(),
            arn: format!(
                "arn:aws:lambda:eu-west-1:123456789012:function:{}",
                request.name
            ),
        })
    }

    async fn delete_function(&self, name: &str) -> ApiResult<()> {
        self.record(format!("delete_function {}", name))
    }

    async fn update_function_code(&self, name: &str, bundle: &[u8]) -> ApiResult<()> {
        self.record(format!("update_function_code {} {}", name, bundle.len()))
    }

    async fn update_function_configuration(
        &self,
        name: &str,
        _patch: &FunctionConfigPatch,
    ) -> ApiResult<()> {
        self.record(format!("update_function_configuration {}", name))
    }

    async fn add_invoke_permission(
        &self,
        function_name: &str,
        statement_id: &str,
        api_id: &str,
        account_id: &str,
    ) -> ApiResult<()> {
        self.record(format!(
            "add_invoke_permission {} {} {} {}",
            function_name, statement_id, api_id, account_id
        ))
    }
}

#[async_trait]
impl GatewayApi for MockCloud {
    async fn create_rest_api(&self, name: &str, _description: &str) -> ApiResult<String> {
        self.record(format!("create_rest_api {}", name))?;
        Ok("api123".to_string())
    }

    async fn root_resource_id(&self, api_id: &str) -> ApiResult<String> {
        self.record(format!("root_resource_id {}", api_id))?;
        Ok("root1".to_string())
    }

    async fn create_proxy_resource(&self, api_id: &str, parent_id: &str) -> ApiResult<String> {
        self.record(format!("create_proxy_resource {} {}", api_id, parent_id))?;
        Ok("res456".to_string())
    }

    async fn put_any_method(&self, api_id: &str, resource_id: &str) -> ApiResult<()> {
        self.record(format!("put_any_method {} {}", api_id, resource_id))
    }

    async fn put_integration(
        &self,
        api_id: &str,
        resource_id: &str,
        _function_arn: &str,
    ) -> ApiResult<()> {
        self.record(format!("put_integration {} {}", api_id, resource_id))
    }

    async fn put_integration_response(&self, api_id: &str, resource_id: &str) -> ApiResult<()> {
        self.record(format!("put_integration_response {} {}", api_id, resource_id))
    }

    async fn create_deployment(&self, api_id: &str, stage_name: &str) -> ApiResult<()> {
        self.record(format!("create_deployment {} {}", api_id, stage_name))
    }

    async fn delete_rest_api(&self, api_id: &str) -> ApiResult<()> {
        self.record(format!("delete_rest_api {}", api_id))
    }
}

#[async_trait]
impl KeyApi for MockCloud {
    async fn create_key(&self, _description: &str) -> ApiResult<String> {
        self.record("create_key".to_string())?;
        Ok("key-1".to_string())
    }

    async fn create_alias(&self, alias: &str, key_id: &str) -> ApiResult<()> {
        self.record(format!("create_alias {} {}", alias, key_id))
    }

    async fn encrypt(&self, key_id: &str, plaintext: &str) -> ApiResult<String> {
        self.record(format!("encrypt {}", key_id))?;
        Ok(format!("enc:{}", plaintext))
    }

    async fn decrypt(&self, ciphertext: &str) -> ApiResult<String> {
        self.record("decrypt".to_string())?;
        Ok(ciphertext.trim_start_matches("enc:").to_string())
    }
}

#[async_trait]
impl LogsApi for MockCloud {
    async fn latest_stream(&self, group: &str) -> ApiResult<Option<String>> {
        self.record(format!("latest_stream {}", group))?;
        Ok(Some("stream-1".to_string()))
    }

    async fn log_events(&self, group: &str, stream: &str) -> ApiResult<Vec<LogEvent>> {
        self.record(format!("log_events {} {}", group, stream))?;
        Ok(Vec::new())
    }
}

#[async_trait]
impl CloudBackend for MockCloud {
    async fn check_auth(&self) -> ApiResult<AuthStatus> {
        Ok(AuthStatus::ok("123456789012"))
    }
}

struct MockPackager;

#[async_trait]
impl Packager for MockPackager {
    async fn package(&self, _project_dir: &Path) -> ApiResult<Vec<u8>> {
        Ok(vec![0x50, 0x4b, 0x03, 0x04])
    }
}

struct Approve;

impl Confirmation for Approve {
    fn confirm(&self, _message: &str) -> std::io::Result<bool> {
        Ok(true)
    }
}

struct Decline;

impl Confirmation for Decline {
    fn confirm(&self, _message: &str) -> std::io::Result<bool> {
        Ok(false)
    }
}

struct Harness {
    backend: Arc<MockCloud>,
    orchestrator: Orchestrator,
    store: ProjectStore,
    _tmp: TempDir,
}

fn build(backend: MockCloud, rollback: bool, confirmation: Box<dyn Confirmation>) -> Harness {
    let tmp = tempfile::tempdir().unwrap();
    let store = ProjectStore::new(tmp.path());
    let backend = Arc::new(backend);
    let cancel = CancellationToken::new();
    let retry = RetryPolicy {
        max_retries: 10,
        delay: Duration::ZERO,
    };
    let clients = CloudClients::new(backend.clone(), retry, cancel.clone());
    let options = WorkflowOptions {
        rollback_on_failure: rollback,
        step_timeout: Duration::from_secs(30),
        cancel,
    };
    let orchestrator = Orchestrator::new(
        clients,
        Box::new(MockPackager),
        confirmation,
        store.clone(),
        options,
    );
    Harness {
        backend,
        orchestrator,
        store,
        _tmp: tmp,
    }
}

fn harness(backend: MockCloud) -> Harness {
    build(backend, true, Box::new(Approve))
}

fn project() -> Valkconfig {
    Valkconfig::new(ProjectInfo {
        name: "demo".to_string(),
        region: "eu-west-1".to_string(),
        scaffolder: None,
    })
}

fn spec(name: &str) -> EnvironmentSpec {
    EnvironmentSpec {
        name: name.to_string(),
        color: "cyan".to_string(),
        confirm: false,
    }
}

#[tokio::test]
async fn test_create_records_api_id_and_local_env() {
    let h = harness(MockCloud::new());
    let mut config = project();

    h.orchestrator
        .create_project(&mut config, &[spec("staging")], &FunctionSettings::default())
        .await
        .unwrap();

    let staging = config.environment("staging").unwrap();
    assert_eq!(staging.api.id.as_deref(), Some("api123"));
    assert_eq!(staging.api.resource_id.as_deref(), Some("res456"));
    assert_eq!(staging.lambda.function_name.as_deref(), Some("demo-staging"));
    assert_eq!(staging.iam.role_name.as_deref(), Some("demo-staging-lambda"));
    assert_eq!(
        staging.lambda.environment.variables.get("NODE_ENV"),
        Some(&"staging".to_string())
    );
    assert_eq!(config.local_env.as_deref(), Some("staging"));

    // descriptor on disk matches the in-memory one
    let loaded = h.store.load().await.unwrap();
    assert_eq!(loaded, config);

    // stage deployment uses the lowercased environment name
    assert!(
        h.backend
            .calls()
            .contains(&"create_deployment api123 staging".to_string())
    );
    // bundle bytes reached the create call
    assert!(
        h.backend
            .calls()
            .contains(&"create_function demo-staging 4".to_string())
    );
}

#[tokio::test]
async fn test_create_then_delete_leaves_no_record() {
    let h = harness(MockCloud::new());
    let mut config = project();

    h.orchestrator
        .create_project(&mut config, &[spec("staging")], &FunctionSettings::default())
        .await
        .unwrap();
    let outcome = h.orchestrator.delete_project(&mut config, true).await.unwrap();

    assert_eq!(outcome, Outcome::Done);
    assert!(config.environments.is_empty());
    assert!(config.local_env.is_none());
    let loaded = h.store.load().await.unwrap();
    assert!(loaded.environments.is_empty());
}

#[tokio::test]
async fn test_failed_step_rolls_back_prior_steps_in_reverse() {
    let h = harness(MockCloud::failing("create_function"));
    let mut config = project();

    let err = h
        .orchestrator
        .create_project(&mut config, &[spec("staging")], &FunctionSettings::default())
        .await
        .unwrap_err();

    let CloudError::Provisioning(failure) = err else {
        panic!("expected a provisioning error, got: {}", err);
    };
    assert_eq!(failure.step.to_string(), "FunctionCreated");
    assert_eq!(failure.environment, "staging");
    assert!(failure.to_string().contains("FunctionCreated"));

    // initial attempt plus the full retry budget
    assert_eq!(h.backend.count("create_function"), 11);

    // rollback removed the partial record
    assert!(!config.environments.contains_key("staging"));

    // compensation ran once per created resource, none for uncreated ones
    assert_eq!(h.backend.count("detach_role_policy"), 1);
    assert_eq!(h.backend.count("delete_policy"), 1);
    assert_eq!(h.backend.count("delete_role"), 1);
    assert_eq!(h.backend.count("delete_function"), 0);
    assert_eq!(h.backend.count("delete_rest_api"), 0);

    // delete-chain order: detach, then policy, then role
    let detach = h.backend.position("detach_role_policy").unwrap();
    let policy = h.backend.position("delete_policy").unwrap();
    let role = h.backend.position("delete_role").unwrap();
    assert!(detach < policy);
    assert!(policy < role);
}

#[tokio::test]
async fn test_rollback_disabled_keeps_partial_record() {
    let h = build(
        MockCloud::failing("create_function"),
        false,
        Box::new(Approve),
    );
    let mut config = project();

    h.orchestrator
        .create_project(&mut config, &[spec("staging")], &FunctionSettings::default())
        .await
        .unwrap_err();

    let staging = config.environment("staging").unwrap();
    assert!(staging.iam.role_name.is_some());
    assert!(staging.iam.policy_arn.is_some());
    assert!(staging.lambda.function_name.is_none());
    assert_eq!(h.backend.count("delete_role"), 0);

    // the partial record survived on disk for a later delete
    let loaded = h.store.load().await.unwrap();
    assert!(loaded.environments.contains_key("staging"));
}

#[tokio::test]
async fn test_delete_skips_missing_role_but_deletes_rest() {
    let h = harness(MockCloud::new());
    let mut config = project();
    let mut record = EnvironmentRecord::default();
    record.lambda.function_name = Some("demo-staging".to_string());
    record.api.id = Some("api123".to_string());
    config.environments.insert("staging".to_string(), record);
    h.store.save(&config).await.unwrap();

    let outcome = h
        .orchestrator
        .delete_environment(&mut config, "staging", true)
        .await
        .unwrap();

    assert_eq!(outcome, Outcome::Done);
    assert_eq!(h.backend.count("detach_role_policy"), 0);
    assert_eq!(h.backend.count("delete_policy"), 0);
    assert_eq!(h.backend.count("delete_role"), 0);
    assert_eq!(h.backend.count("delete_function"), 1);
    assert_eq!(h.backend.count("delete_rest_api"), 1);
    assert!(config.environments.is_empty());
}

#[tokio::test]
async fn test_policy_delete_removes_versions_first() {
    let backend = Arc::new(MockCloud::with_versions(vec![
        PolicyVersion {
            version_id: "v1".to_string(),
            is_default: true,
        },
        PolicyVersion {
            version_id: "v2".to_string(),
            is_default: false,
        },
        PolicyVersion {
            version_id: "v3".to_string(),
            is_default: false,
        },
        PolicyVersion {
            version_id: "v4".to_string(),
            is_default: false,
        },
    ]));
    let client = PolicyClient::new(
        backend.clone(),
        RetryPolicy::none(),
        CancellationToken::new(),
    );

    client
        .delete("arn:aws:iam::123456789012:policy/p")
        .await
        .unwrap();

    assert_eq!(backend.count("delete_policy_version"), 3);
    let calls = backend.calls();
    let policy_delete = backend.position("delete_policy").unwrap();
    for (i, call) in calls.iter().enumerate() {
        if call.split(' ').next() == Some("delete_policy_version") {
            assert!(i < policy_delete, "version delete after policy delete");
            assert!(!call.ends_with(" v1"), "default version must be kept");
        }
    }
}

#[tokio::test]
async fn test_multi_env_create_stops_at_first_failure() {
    let h = harness(MockCloud::failing("create_rest_api"));
    let mut config = project();

    let err = h
        .orchestrator
        .create_project(
            &mut config,
            &[spec("staging"), spec("production")],
            &FunctionSettings::default(),
        )
        .await
        .unwrap_err();

    let CloudError::Provisioning(failure) = err else {
        panic!("expected a provisioning error, got: {}", err);
    };
    assert_eq!(failure.step.to_string(), "ApiCreated");
    assert_eq!(failure.environment, "staging");

    // the second environment was never started
    assert!(!h.backend.calls().iter().any(|c| c.contains("production")));
    assert!(!config.environments.contains_key("production"));
}

#[tokio::test]
async fn test_teardown_failure_keeps_identifier_for_retry() {
    let h = harness(MockCloud::failing("delete_role"));
    let mut config = project();
    let mut record = EnvironmentRecord::default();
    record.iam.role_name = Some("demo-staging-lambda".to_string());
    record.iam.policy_arn =
        Some("arn:aws:iam::123456789012:policy/valkyrie/staging/demo-staging-lambda".to_string());
    record.lambda.function_name = Some("demo-staging".to_string());
    record.api.id = Some("api123".to_string());
    config.environments.insert("staging".to_string(), record);
    h.store.save(&config).await.unwrap();

    let outcome = h
        .orchestrator
        .delete_environment(&mut config, "staging", true)
        .await
        .unwrap();

    // best-effort: the flow finishes and reports rather than failing
    assert_eq!(outcome, Outcome::Done);

    let staging = config.environment("staging").unwrap();
    assert!(staging.iam.role_name.is_some());
    assert!(staging.iam.policy_arn.is_none());
    assert!(staging.lambda.function_name.is_none());
    assert!(staging.api.id.is_none());

    // the record survives so a re-run can retry the role delete
    let loaded = h.store.load().await.unwrap();
    assert!(loaded.environments.contains_key("staging"));
}

#[tokio::test]
async fn test_update_aborts_when_confirmation_declined() {
    let h = build(MockCloud::new(), true, Box::new(Decline));
    let mut config = project();
    let mut record = EnvironmentRecord {
        confirm: true,
        ..Default::default()
    };
    record.lambda.function_name = Some("demo-production".to_string());
    config.environments.insert("production".to_string(), record);

    let outcome = h
        .orchestrator
        .update_environment(
            &config,
            "production",
            &UpdateRequest {
                push_code: true,
                push_config: true,
                assume_yes: false,
            },
        )
        .await
        .unwrap();

    assert!(outcome.aborted());
    assert!(h.backend.calls().is_empty());

    // override flag skips the gate entirely
    let outcome = h
        .orchestrator
        .update_environment(
            &config,
            "production",
            &UpdateRequest {
                push_code: false,
                push_config: true,
                assume_yes: true,
            },
        )
        .await
        .unwrap();
    assert_eq!(outcome, Outcome::Done);
    assert_eq!(h.backend.count("update_function_configuration"), 1);
}

#[tokio::test]
async fn test_update_pushes_code_and_config() {
    let h = harness(MockCloud::new());
    let mut config = project();
    let mut record = EnvironmentRecord::default();
    record.lambda.function_name = Some("demo-staging".to_string());
    config.environments.insert("staging".to_string(), record);

    let outcome = h
        .orchestrator
        .update_environment(
            &config,
            "staging",
            &UpdateRequest {
                push_code: true,
                push_config: true,
                assume_yes: false,
            },
        )
        .await
        .unwrap();

    assert_eq!(outcome, Outcome::Done);
    assert_eq!(h.backend.count("update_function_code"), 1);
    assert_eq!(h.backend.count("update_function_configuration"), 1);
    assert!(
        h.backend
            .calls()
            .contains(&"update_function_code demo-staging 4".to_string())
    );
}

#[tokio::test]
async fn test_delete_project_declined_makes_no_calls() {
    let h = build(MockCloud::new(), true, Box::new(Decline));
    let mut config = project();
    let mut record = EnvironmentRecord::default();
    record.iam.role_name = Some("demo-staging-lambda".to_string());
    config.environments.insert("staging".to_string(), record);

    let outcome = h.orchestrator.delete_project(&mut config, false).await.unwrap();

    assert_eq!(outcome, Outcome::Aborted);
    assert!(h.backend.calls().is_empty());
    assert!(config.environments.contains_key("staging"));
}

#[tokio::test]
async fn test_invoke_permission_uses_derived_statement_id() {
    let h = harness(MockCloud::new());
    let mut config = project();

    h.orchestrator
        .create_project(&mut config, &[spec("staging")], &FunctionSettings::default())
        .await
        .unwrap();

    let permission = h
        .backend
        .calls()
        .into_iter()
        .find(|c| c.starts_with("add_invoke_permission"))
        .unwrap();
    // statement id derives from api and resource ids; account comes from the
    // caller policy ARN
    assert_eq!(
        permission,
        "add_invoke_permission demo-staging valkyrie-api123-res456 api123 123456789012"
    );
}

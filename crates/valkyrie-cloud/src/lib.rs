//! Valkyrie provisioning engine
//!
//! Provider-agnostic layer between the CLI and a cloud backend:
//!
//! - resource API traits a backend implements ([`api`])
//! - client facades wrapping every call in the retry engine ([`client`])
//! - the per-environment provisioning chain with persisted checkpoints and
//!   best-effort teardown ([`workflow`])
//! - the create/delete/update flows tying it together ([`orchestrator`])
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │                valk (CLI)                    │
//! └──────────────────┬──────────────────────────┘
//!                    │
//! ┌──────────────────▼──────────────────────────┐
//! │              valkyrie-cloud                  │
//! │  Orchestrator → Provisioner / Destroyer      │
//! │        │              │                      │
//! │        ▼              ▼                      │
//! │  CloudClients (retry per call)               │
//! │        │                                     │
//! │  trait CloudBackend (Role/Policy/Function/   │
//! │        Gateway/Key/Logs APIs)                │
//! └──────────────────┬──────────────────────────┘
//!                    │
//! ┌──────────────────▼──────────────────────────┐
//! │        valkyrie-cloud-aws (aws CLI)          │
//! └─────────────────────────────────────────────┘
//! ```

pub mod api;
pub mod client;
pub mod documents;
pub mod error;
pub mod orchestrator;
pub mod retry;
pub mod workflow;

// Re-exports
pub use api::{
    ApiIdentity, ApiResult, AuthStatus, CloudBackend, CreateFunctionRequest, CreatePolicyRequest,
    CreateRoleRequest, FunctionApi, FunctionConfigPatch, FunctionIdentity, GatewayApi, KeyApi,
    LogEvent, LogsApi, PolicyApi, PolicyIdentity, PolicyVersion, ResourceKind, RoleApi,
    RoleIdentity,
};
pub use client::{
    ApiClient, CloudClients, FunctionClient, KeyClient, LogsClient, PolicyClient, RoleClient,
    account_id_from_arn, invoke_statement_id,
};
pub use error::{ApiError, CloudError, ProvisioningError, Result};
pub use orchestrator::{
    Confirmation, EnvironmentSpec, FunctionSettings, Orchestrator, Outcome, UpdateRequest,
};
pub use retry::{RetryPolicy, retry};
pub use workflow::{
    Destroyer, Packager, ProvisionStep, Provisioner, TeardownReport, WorkflowOptions,
};

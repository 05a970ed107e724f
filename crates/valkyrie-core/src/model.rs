//! Project descriptor model
//!
//! Typed representation of `valkconfig.json`, the single source of truth for
//! which remote resources exist. Field names keep the PascalCase spelling of
//! the persisted file. Absence of an identifier means the resource has not
//! been created yet.

use crate::error::{CoreError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const DEFAULT_HANDLER: &str = "index.handler";
pub const DEFAULT_MEMORY_MB: u32 = 128;
pub const DEFAULT_TIMEOUT_SEC: u32 = 3;
pub const DEFAULT_RUNTIME: &str = "nodejs22.x";

/// The whole project descriptor (`valkconfig.json`)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct Valkconfig {
    pub project: ProjectInfo,

    /// Environment records keyed by environment name
    #[serde(default)]
    pub environments: BTreeMap<String, EnvironmentRecord>,

    /// Environment the `local` command serves by default
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_env: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct ProjectInfo {
    pub name: String,
    pub region: String,

    /// Template the project was scaffolded from, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scaffolder: Option<String>,
}

/// Per-environment record tracking remote resource identifiers
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "PascalCase", default)]
pub struct EnvironmentRecord {
    pub iam: IamRecord,
    pub lambda: FunctionRecord,
    pub api: ApiRecord,

    #[serde(rename = "KMS", skip_serializing_if = "Option::is_none")]
    pub kms: Option<KmsRecord>,

    /// Display color for this environment's name
    pub env_color: String,

    /// Require explicit confirmation before mutating this environment
    pub confirm: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "PascalCase", default)]
pub struct IamRecord {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role_name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub policy_arn: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "PascalCase", default)]
pub struct FunctionRecord {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub function_name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    pub handler: String,
    pub memory_size: u32,
    pub timeout: u32,
    pub runtime: String,

    /// ARN of the execution role, filled in once the role exists
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,

    pub environment: FunctionEnvironment,
}

impl Default for FunctionRecord {
    fn default() -> Self {
        Self {
            function_name: None,
            description: None,
            handler: DEFAULT_HANDLER.to_string(),
            memory_size: DEFAULT_MEMORY_MB,
            timeout: DEFAULT_TIMEOUT_SEC,
            runtime: DEFAULT_RUNTIME.to_string(),
            role: None,
            environment: FunctionEnvironment::default(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "PascalCase", default)]
pub struct FunctionEnvironment {
    pub variables: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "PascalCase", default)]
pub struct ApiRecord {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_id: Option<String>,
}

/// Encryption key backing `valk variables --encrypt`
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "PascalCase", default)]
pub struct KmsRecord {
    pub key_id: String,

    /// Variable names whose stored values are ciphertext
    pub encrypted_variables: Vec<String>,
}

impl Valkconfig {
    pub fn new(project: ProjectInfo) -> Self {
        Self {
            project,
            environments: BTreeMap::new(),
            local_env: None,
        }
    }

    /// Function name for an environment: `{project}-{env}`
    pub fn function_name(&self, env: &str) -> String {
        format!("{}-{}", self.project.name, env)
    }

    /// Shared role/policy name for an environment: `{project}-{env}-lambda`
    pub fn iam_name(&self, env: &str) -> String {
        format!("{}-{}-lambda", self.project.name, env)
    }

    /// IAM path grouping everything this tool creates for an environment
    pub fn iam_path(env: &str) -> String {
        format!("/valkyrie/{}/", env)
    }

    /// Deployment stage name (lowercased environment name)
    pub fn stage_name(env: &str) -> String {
        env.to_lowercase()
    }

    /// Public URL of a deployed environment, when its API exists
    pub fn api_url(&self, env: &str) -> Option<String> {
        let record = self.environments.get(env)?;
        let api_id = record.api.id.as_deref()?;
        Some(format!(
            "https://{}.execute-api.{}.amazonaws.com/{}",
            api_id,
            self.project.region,
            Self::stage_name(env)
        ))
    }

    pub fn environment(&self, name: &str) -> Result<&EnvironmentRecord> {
        self.environments
            .get(name)
            .ok_or_else(|| CoreError::InvalidDescriptor(format!("unknown environment: {}", name)))
    }

    pub fn environment_mut(&mut self, name: &str) -> Result<&mut EnvironmentRecord> {
        self.environments
            .get_mut(name)
            .ok_or_else(|| CoreError::InvalidDescriptor(format!("unknown environment: {}", name)))
    }

    pub fn env_names(&self) -> Vec<String> {
        self.environments.keys().cloned().collect()
    }

    /// Structural validation run at load time
    pub fn validate(&self) -> Result<()> {
        if self.project.name.is_empty() {
            return Err(CoreError::InvalidDescriptor(
                "Project.Name must not be empty".to_string(),
            ));
        }
        if self.project.region.is_empty() {
            return Err(CoreError::InvalidDescriptor(
                "Project.Region must not be empty".to_string(),
            ));
        }
        for name in self.environments.keys() {
            if name.is_empty() {
                return Err(CoreError::InvalidDescriptor(
                    "environment names must not be empty".to_string(),
                ));
            }
        }
        if let Some(local) = &self.local_env
            && !self.environments.is_empty()
            && !self.environments.contains_key(local)
        {
            return Err(CoreError::InvalidDescriptor(format!(
                "LocalEnv refers to unknown environment: {}",
                local
            )));
        }
        Ok(())
    }
}

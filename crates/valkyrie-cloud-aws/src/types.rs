//! aws CLI response shapes
//!
//! IAM, Lambda, KMS and STS responses use PascalCase keys; API Gateway and
//! CloudWatch Logs use camelCase.

use serde::Deserialize;

/// `aws iam create-role`
#[derive(Debug, Deserialize)]
pub struct CreateRoleResponse {
    #[serde(rename = "Role")]
    pub role: RoleInfo,
}

#[derive(Debug, Deserialize)]
pub struct RoleInfo {
    #[serde(rename = "RoleName")]
    pub role_name: String,

    #[serde(rename = "Arn")]
    pub arn: String,
}

/// `aws iam create-policy`
#[derive(Debug, Deserialize)]
pub struct CreatePolicyResponse {
    #[serde(rename = "Policy")]
    pub policy: PolicyInfo,
}

#[derive(Debug, Deserialize)]
pub struct PolicyInfo {
    #[serde(rename = "PolicyName")]
    pub policy_name: String,

    #[serde(rename = "Arn")]
    pub arn: String,
}

/// `aws iam list-policy-versions`
#[derive(Debug, Deserialize)]
pub struct ListPolicyVersionsResponse {
    #[serde(rename = "Versions", default)]
    pub versions: Vec<PolicyVersionInfo>,
}

#[derive(Debug, Deserialize)]
pub struct PolicyVersionInfo {
    #[serde(rename = "VersionId")]
    pub version_id: String,

    #[serde(rename = "IsDefaultVersion", default)]
    pub is_default: bool,
}

/// `aws lambda create-function` (fields are at the top level)
#[derive(Debug, Deserialize)]
pub struct FunctionInfo {
    #[serde(rename = "FunctionName")]
    pub function_name: String,

    #[serde(rename = "FunctionArn")]
    pub function_arn: String,
}

/// `aws apigateway create-rest-api` / `create-resource`
#[derive(Debug, Deserialize)]
pub struct GatewayEntity {
    pub id: String,
}

/// `aws apigateway get-resources`
#[derive(Debug, Deserialize)]
pub struct ResourceList {
    #[serde(default)]
    pub items: Vec<ResourceInfo>,
}

#[derive(Debug, Deserialize)]
pub struct ResourceInfo {
    pub id: String,

    #[serde(default)]
    pub path: Option<String>,
}

/// `aws kms create-key`
#[derive(Debug, Deserialize)]
pub struct CreateKeyResponse {
    #[serde(rename = "KeyMetadata")]
    pub key_metadata: KeyMetadata,
}

#[derive(Debug, Deserialize)]
pub struct KeyMetadata {
    #[serde(rename = "KeyId")]
    pub key_id: String,
}

/// `aws kms encrypt`; the blob is already base64
#[derive(Debug, Deserialize)]
pub struct EncryptResponse {
    #[serde(rename = "CiphertextBlob")]
    pub ciphertext_blob: String,
}

/// `aws kms decrypt`; plaintext is base64
#[derive(Debug, Deserialize)]
pub struct DecryptResponse {
    #[serde(rename = "Plaintext")]
    pub plaintext: String,
}

/// `aws sts get-caller-identity`
#[derive(Debug, Deserialize)]
pub struct CallerIdentity {
    #[serde(rename = "Account")]
    pub account: String,

    #[serde(rename = "Arn")]
    pub arn: String,
}

/// `aws logs describe-log-streams`
#[derive(Debug, Deserialize)]
pub struct LogStreamList {
    #[serde(rename = "logStreams", default)]
    pub log_streams: Vec<LogStreamInfo>,
}

#[derive(Debug, Deserialize)]
pub struct LogStreamInfo {
    #[serde(rename = "logStreamName")]
    pub log_stream_name: String,
}

/// `aws logs get-log-events`
#[derive(Debug, Deserialize)]
pub struct LogEventList {
    #[serde(default)]
    pub events: Vec<LogEventInfo>,
}

#[derive(Debug, Deserialize)]
pub struct LogEventInfo {
    pub timestamp: i64,
    pub message: String,
}

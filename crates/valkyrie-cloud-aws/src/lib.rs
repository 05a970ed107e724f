//! AWS backend for Valkyrie
//!
//! This crate implements the cloud backend traits on top of the aws CLI,
//! letting Valkyrie provision IAM, Lambda, API Gateway, KMS and CloudWatch
//! Logs resources without bundling an SDK.
//!
//! # Requirements
//!
//! - AWS CLI v2 must be installed
//! - Credentials come either from a Valkyrie profile or from the CLI's own
//!   resolution chain
//!
//! # Example
//!
//! ```ignore
//! use valkyrie_cloud_aws::{AwsCli, AwsCloud};
//! use valkyrie_cloud::api::CloudBackend;
//!
//! let backend = AwsCloud::new(AwsCli::new("eu-west-1"));
//!
//! let auth = backend.check_auth().await?;
//! if !auth.authenticated {
//!     eprintln!("Not authenticated: {:?}", auth.error);
//! }
//! ```

pub mod awscli;
pub mod provider;
pub mod types;

pub use awscli::{AwsCli, Credentials};
pub use provider::AwsCloud;

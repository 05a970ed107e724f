//! Valkyrie core
//!
//! Project descriptor model (`valkconfig.json`), descriptor store with
//! project-root discovery, and the per-user global configuration holding
//! credential profiles.

pub mod config;
pub mod error;
pub mod model;
pub mod store;

// Re-exports
pub use config::{GlobalConfig, Profile, obfuscate};
pub use error::{CoreError, Result};
pub use model::{
    ApiRecord, EnvironmentRecord, FunctionEnvironment, FunctionRecord, IamRecord, KmsRecord,
    ProjectInfo, Valkconfig,
};
pub use store::{DESCRIPTOR_FILE, ProjectStore};

//! Core error types

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error(
        "{} is not a Valkyrie project (or any of the parent directories): missing valkconfig.json",
        .0.display()
    )]
    ProjectNotFound(PathBuf),

    #[error("invalid descriptor: {0}")]
    InvalidDescriptor(String),

    #[error("invalid global configuration: {0}")]
    InvalidConfig(String),

    #[error("profile not found: {0} (run `valk configure` to add one)")]
    ProfileNotFound(String),

    #[error("no credential profile configured (run `valk configure`)")]
    NoProfile,

    #[error("home directory could not be determined")]
    HomeNotFound,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, CoreError>;

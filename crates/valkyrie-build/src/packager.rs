//! Async packaging adapter for the provisioning workflow

use crate::bundle::Bundler;
use async_trait::async_trait;
use std::path::Path;
use valkyrie_cloud::api::ApiResult;
use valkyrie_cloud::{ApiError, Packager};

/// Runs [`Bundler`] on the blocking pool
pub struct ZipPackager;

#[async_trait]
impl Packager for ZipPackager {
    async fn package(&self, project_dir: &Path) -> ApiResult<Vec<u8>> {
        let dir = project_dir.to_path_buf();
        tokio::task::spawn_blocking(move || Bundler::bundle(&dir))
            .await
            .map_err(|e| ApiError::Packaging(format!("bundling task failed: {}", e)))?
            .map_err(|e| ApiError::Packaging(e.to_string()))
    }
}

//! Descriptor store
//!
//! Locates the project root, loads and validates `valkconfig.json`, and
//! persists it with an atomic rename so an interrupted write never leaves a
//! truncated descriptor behind.

use crate::error::{CoreError, Result};
use crate::model::Valkconfig;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info};

pub const DESCRIPTOR_FILE: &str = "valkconfig.json";
const DESCRIPTOR_TMP: &str = "valkconfig.json.tmp";

/// Reads and writes the descriptor of one project
#[derive(Debug, Clone)]
pub struct ProjectStore {
    root: PathBuf,
}

impl ProjectStore {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// Find the enclosing project
    ///
    /// Search order:
    /// 1. `VALKYRIE_PROJECT_ROOT` environment variable
    /// 2. current directory, then each parent, for `valkconfig.json`
    pub fn discover() -> Result<Self> {
        if let Ok(root) = std::env::var("VALKYRIE_PROJECT_ROOT") {
            let path = PathBuf::from(&root);
            debug!(env_root = %root, "Checking VALKYRIE_PROJECT_ROOT");
            if path.join(DESCRIPTOR_FILE).exists() {
                info!(project_root = %path.display(), "Found project root from environment variable");
                return Ok(Self::new(path));
            }
        }

        let start_dir = std::env::current_dir()?;
        let mut current = start_dir.clone();
        debug!(start_dir = %start_dir.display(), "Searching for project root");

        loop {
            debug!(checking = %current.display(), "Looking for valkconfig.json");
            if current.join(DESCRIPTOR_FILE).exists() {
                info!(project_root = %current.display(), "Found project root");
                return Ok(Self::new(current));
            }

            if !current.pop() {
                break;
            }
        }

        Err(CoreError::ProjectNotFound(start_dir))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn descriptor_path(&self) -> PathBuf {
        self.root.join(DESCRIPTOR_FILE)
    }

    pub fn exists(&self) -> bool {
        self.descriptor_path().exists()
    }

    /// Load and validate the descriptor
    pub async fn load(&self) -> Result<Valkconfig> {
        let path = self.descriptor_path();
        if !path.exists() {
            return Err(CoreError::ProjectNotFound(self.root.clone()));
        }

        let content = fs::read_to_string(&path).await?;
        let config: Valkconfig = serde_json::from_str(&content)
            .map_err(|e| CoreError::InvalidDescriptor(format!("{}: {}", path.display(), e)))?;
        config.validate()?;

        debug!(
            environments = config.environments.len(),
            "Loaded project descriptor"
        );
        Ok(config)
    }

    /// Persist the descriptor atomically (write to a sibling file, rename over)
    pub async fn save(&self, config: &Valkconfig) -> Result<()> {
        let path = self.descriptor_path();
        let tmp = self.root.join(DESCRIPTOR_TMP);

        let content = serde_json::to_string_pretty(config)?;
        fs::write(&tmp, content).await?;
        fs::rename(&tmp, &path).await?;

        debug!(path = %path.display(), "Saved project descriptor");
        Ok(())
    }
}

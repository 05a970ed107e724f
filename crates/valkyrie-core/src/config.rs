//! Global per-user configuration
//!
//! Credential profiles stored in `~/.valkconfig`, shared by every project on
//! the machine. Keys are camelCase in the file.

use crate::error::{CoreError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

pub const GLOBAL_CONFIG_FILE: &str = ".valkconfig";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct GlobalConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_profile: Option<String>,

    pub profiles: BTreeMap<String, Profile>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub access_key_id: String,
    pub secret_access_key: String,
}

impl GlobalConfig {
    /// Path of the global configuration file
    pub fn path() -> Result<PathBuf> {
        let home = dirs::home_dir().ok_or(CoreError::HomeNotFound)?;
        Ok(home.join(GLOBAL_CONFIG_FILE))
    }

    /// Load the global configuration; a missing file is an empty config
    pub async fn load() -> Result<Self> {
        Self::load_from(&Self::path()?).await
    }

    pub async fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!("Global configuration not found, starting empty");
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path).await?;
        let config: Self = serde_json::from_str(&content)
            .map_err(|e| CoreError::InvalidConfig(format!("{}: {}", path.display(), e)))?;
        Ok(config)
    }

    pub async fn save(&self) -> Result<()> {
        self.save_to(&Self::path()?).await
    }

    pub async fn save_to(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content).await?;

        // The file holds secret keys, keep it owner-only
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = std::fs::Permissions::from_mode(0o600);
            fs::set_permissions(path, perms).await?;
        }

        debug!(path = %path.display(), "Saved global configuration");
        Ok(())
    }

    /// Remove the global configuration file entirely
    pub async fn purge() -> Result<()> {
        let path = Self::path()?;
        if path.exists() {
            fs::remove_file(&path).await?;
            debug!(path = %path.display(), "Removed global configuration");
        }
        Ok(())
    }

    /// Resolve credentials: explicit flag, then default profile, then a lone
    /// configured profile
    pub fn resolve_profile(&self, name: Option<&str>) -> Result<(String, &Profile)> {
        if let Some(name) = name {
            let profile = self
                .profiles
                .get(name)
                .ok_or_else(|| CoreError::ProfileNotFound(name.to_string()))?;
            return Ok((name.to_string(), profile));
        }

        if let Some(default) = &self.default_profile {
            let profile = self
                .profiles
                .get(default)
                .ok_or_else(|| CoreError::ProfileNotFound(default.clone()))?;
            return Ok((default.clone(), profile));
        }

        if self.profiles.len() == 1 {
            let (name, profile) = self
                .profiles
                .iter()
                .next()
                .ok_or(CoreError::NoProfile)?;
            return Ok((name.clone(), profile));
        }

        Err(CoreError::NoProfile)
    }

    pub fn set_profile(&mut self, name: impl Into<String>, profile: Profile) {
        let name = name.into();
        if self.default_profile.is_none() {
            self.default_profile = Some(name.clone());
        }
        self.profiles.insert(name, profile);
    }

    pub fn set_default(&mut self, name: &str) -> Result<()> {
        if !self.profiles.contains_key(name) {
            return Err(CoreError::ProfileNotFound(name.to_string()));
        }
        self.default_profile = Some(name.to_string());
        Ok(())
    }
}

/// Mask a secret for display, keeping a short recognizable prefix
pub fn obfuscate(value: &str) -> String {
    let visible: String = value.chars().take(4).collect();
    let hidden = value.chars().count().saturating_sub(visible.chars().count());
    format!("{}{}", visible, "*".repeat(hidden))
}

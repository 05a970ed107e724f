//! Deployment bundle creation
//!
//! Zips a project tree into the in-memory archive Lambda takes as function
//! code. `.valkignore` (gitignore syntax) controls what stays out; `.gitignore`
//! is deliberately not read, since installed dependencies are usually
//! gitignored but must ship.

use crate::error::{BuildError, Result};
use ignore::WalkBuilder;
use std::fs::File;
use std::io::Cursor;
use std::path::Path;
use zip::CompressionMethod;
use zip::write::{SimpleFileOptions, ZipWriter};

/// Name of the per-project ignore file
pub const IGNORE_FILE: &str = ".valkignore";

pub struct Bundler;

impl Bundler {
    /// Zip the project tree and return the archive bytes
    pub fn bundle(project_dir: &Path) -> Result<Vec<u8>> {
        tracing::debug!("Creating bundle from: {}", project_dir.display());

        if !project_dir.is_dir() {
            return Err(BuildError::ProjectNotFound(project_dir.to_path_buf()));
        }

        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .unix_permissions(0o644);

        let walk = WalkBuilder::new(project_dir)
            .hidden(false)
            .ignore(false)
            .git_ignore(false)
            .git_global(false)
            .git_exclude(false)
            .add_custom_ignore_filename(IGNORE_FILE)
            .build();

        for entry in walk {
            let entry = entry?;
            if !entry.file_type().is_some_and(|t| t.is_file()) {
                continue;
            }
            let path = entry.path();
            let Ok(relative) = path.strip_prefix(project_dir) else {
                continue;
            };
            let name = relative.to_string_lossy().replace('\\', "/");
            if Self::excluded(&name) {
                continue;
            }

            writer.start_file(name.as_str(), options)?;
            let mut file = File::open(path)?;
            std::io::copy(&mut file, &mut writer)?;
        }

        let bundle = writer.finish()?.into_inner();
        tracing::debug!("Bundle created: {} bytes", bundle.len());
        Self::check_bundle_size(bundle.len());

        Ok(bundle)
    }

    /// The descriptor, the ignore file itself and git internals never ship
    fn excluded(name: &str) -> bool {
        name == valkyrie_core::DESCRIPTOR_FILE
            || name == IGNORE_FILE
            || name == ".git"
            || name.starts_with(".git/")
    }

    /// Warn past Lambda's direct-upload limit
    fn check_bundle_size(size: usize) {
        const MAX_BUNDLE_SIZE: usize = 50 * 1024 * 1024; // 50MB

        if size > MAX_BUNDLE_SIZE {
            tracing::warn!(
                "bundle is {}MB, over the 50MB direct-upload limit; exclude files with {}",
                size / 1024 / 1024,
                IGNORE_FILE
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;
    use std::fs;
    use std::io::Read;
    use tempfile::tempdir;

    fn entry_names(bundle: &[u8]) -> BTreeSet<String> {
        let mut archive = zip::ZipArchive::new(Cursor::new(bundle.to_vec())).unwrap();
        (0..archive.len())
            .map(|i| archive.by_index(i).unwrap().name().to_string())
            .collect()
    }

    #[test]
    fn test_bundle_round_trip() {
        let temp_dir = tempdir().unwrap();
        fs::write(temp_dir.path().join("index.js"), "exports.handler = x => x").unwrap();

        let lib = temp_dir.path().join("lib");
        fs::create_dir(&lib).unwrap();
        fs::write(lib.join("helper.js"), "module.exports = {}").unwrap();

        fs::write(temp_dir.path().join("valkconfig.json"), "{}").unwrap();

        let bundle = Bundler::bundle(temp_dir.path()).unwrap();
        let names = entry_names(&bundle);

        assert!(names.contains("index.js"));
        assert!(names.contains("lib/helper.js"));
        assert!(!names.contains("valkconfig.json"));

        // contents survive the round trip
        let mut archive = zip::ZipArchive::new(Cursor::new(bundle)).unwrap();
        let mut contents = String::new();
        archive
            .by_name("index.js")
            .unwrap()
            .read_to_string(&mut contents)
            .unwrap();
        assert_eq!(contents, "exports.handler = x => x");
    }

    #[test]
    fn test_valkignore_patterns_apply() {
        let temp_dir = tempdir().unwrap();
        fs::write(temp_dir.path().join("index.js"), "ok").unwrap();
        fs::write(temp_dir.path().join("debug.log"), "noise").unwrap();

        let secrets = temp_dir.path().join("secrets");
        fs::create_dir(&secrets).unwrap();
        fs::write(secrets.join("key.pem"), "private").unwrap();

        fs::write(temp_dir.path().join(".valkignore"), "*.log\nsecrets/\n").unwrap();

        let bundle = Bundler::bundle(temp_dir.path()).unwrap();
        let names = entry_names(&bundle);

        assert!(names.contains("index.js"));
        assert!(!names.contains("debug.log"));
        assert!(!names.contains("secrets/key.pem"));
        assert!(!names.contains(".valkignore"));
    }

    #[test]
    fn test_gitignored_dependencies_still_ship() {
        let temp_dir = tempdir().unwrap();
        fs::write(temp_dir.path().join("index.js"), "ok").unwrap();
        fs::write(temp_dir.path().join(".gitignore"), "node_modules/\n").unwrap();

        let dep = temp_dir.path().join("node_modules").join("dep");
        fs::create_dir_all(&dep).unwrap();
        fs::write(dep.join("index.js"), "module.exports = 1").unwrap();

        let names = entry_names(&Bundler::bundle(temp_dir.path()).unwrap());

        assert!(names.contains("node_modules/dep/index.js"));
    }

    #[test]
    fn test_missing_project_dir() {
        let temp_dir = tempdir().unwrap();
        let missing = temp_dir.path().join("nope");

        let err = Bundler::bundle(&missing).unwrap_err();
        assert!(matches!(err, BuildError::ProjectNotFound(_)));
    }
}

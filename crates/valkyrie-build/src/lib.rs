//! Valkyrie deployment bundling
//!
//! Turns a project tree into the zip archive Lambda accepts as function code,
//! honoring `.valkignore` exclusions, and adapts it to the workflow's
//! packaging seam.

pub mod bundle;
pub mod error;
pub mod packager;

pub use bundle::{Bundler, IGNORE_FILE};
pub use error::{BuildError, Result};
pub use packager::ZipPackager;

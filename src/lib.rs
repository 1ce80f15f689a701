//! Core implementation of toolbelt
//!
//! toolbelt composes command-line invocations of developer tools (formatters,
//! linters, test runners) without repeating argument assembly per tool. Callers
//! build a [`ctx::Ctx`], pick a tool by its role and hand over the target files;
//! the tool turns all of it into a single invocation for a [`session::Session`].

use std::path::PathBuf;

use log::{debug, warn};

use crate::config_file::{Config, ConfigError};
use crate::toolbox::Toolbox;

pub mod config_file;
pub mod ctx;
pub mod files;
pub mod logger;
pub mod session;
pub mod toolbox;
pub mod tools;

/// A loaded configuration: the toolbox, the directory tools run in, the
/// config file path and the install command, if the file sets one
pub struct Loaded {
    pub toolbox: Toolbox,
    pub cwd: PathBuf,
    pub config_path: PathBuf,
    pub installer: Option<Vec<String>>,
}

/// Load configuration from a file (or auto-detect).
///
/// # Errors
///
/// Returns `ConfigError` if the config file is not found, cannot be parsed,
/// or contains invalid values.
pub fn load_config(config_file: Option<&str>) -> Result<Loaded, ConfigError> {
    let config_path = match config_file {
        Some(file) => {
            let config_path = PathBuf::from(file);
            if !config_path.exists() {
                return Err(ConfigError::ConfigNotFound(config_path));
            }
            config_path
        }
        None => Config::find_config()?,
    };
    let cwd = match config_path.parent() {
        Some(parent) if parent.as_os_str().is_empty() => PathBuf::from("."),
        Some(parent) => parent.to_path_buf(),
        None => return Err(ConfigError::ConfigNotFound(config_path.clone())),
    };
    debug!(
        "Loading toolbox from config file: {} (cwd: {})",
        config_path.display(),
        cwd.display()
    );
    let mut parsed = Config::from_file(&config_path)?;
    validate_version(&parsed.toolbelt_version);
    let installer = parsed.installer.take();
    if installer.as_ref().is_some_and(Vec::is_empty) {
        return Err(ConfigError::Validation(
            "installer must contain at least the program to run".to_string(),
        ));
    }
    let toolbox = Toolbox::try_from(parsed)?;
    Ok(Loaded {
        toolbox,
        cwd,
        config_path,
        installer,
    })
}

/// Warn if the config's `toolbelt_version` doesn't match the binary version
fn validate_version(config_version: &str) {
    let binary_version = env!("CARGO_PKG_VERSION");
    if config_version != binary_version {
        warn!(
            "Config toolbelt_version '{config_version}' differs from binary version '{binary_version}'"
        );
    }
}

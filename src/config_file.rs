//! Configuration file handling for toolbelt

use std::path::{Path, PathBuf};

use glob::Pattern;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ctx::Ctx;
use crate::toolbox::{ToolEntry, Toolbox};
use crate::tools::{
    AnyTool, Bandit, Black, Flake8, GenericTool, ISort, Mypy, Pytest, Rustfmt, Tools,
};

/// Errors that can occur while loading configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("No config file found in current directory or its parents: {0}")]
    ConfigNotFound(PathBuf),
    #[error("Unknown working directory: {0}")]
    UnknownWorkingDirectory(String),
    #[error("Unable to parse YAML config file {path}: {source}")]
    Yaml {
        source: serde_yaml::Error,
        path: PathBuf,
    },
    #[error("Unable to parse JSON config file {path}: {source}")]
    Json {
        source: serde_json::Error,
        path: PathBuf,
    },
    #[error("Invalid file pattern `{pattern}`: {source}")]
    Pattern {
        source: glob::PatternError,
        pattern: String,
    },
    #[error("Invalid config: {0}")]
    Validation(String),
}

/// The kinds of tool a config entry can describe
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ToolKind {
    Tool,
    Black,
    Isort,
    Rustfmt,
    Bandit,
    Flake8,
    Mypy,
    Pytest,
}

/// Configuration for a single tool
#[derive(Debug, Deserialize, Serialize)]
pub struct ConfigTool {
    pub kind: ToolKind,
    pub binary: Option<String>,
    pub deps: Option<Vec<String>>,
    pub config: Option<String>,
    pub flags: Option<Vec<String>>,
    pub files: Option<String>,
}

impl ConfigTool {
    fn describe(&self) -> String {
        self.binary
            .clone()
            .unwrap_or_else(|| format!("{:?}", self.kind).to_lowercase())
    }

    fn build(self) -> AnyTool {
        let deps = self.deps.unwrap_or_default();
        let config = self.config.unwrap_or_default();
        let binary = self.binary;
        // Overriding the binary keeps the tool's flag handling
        macro_rules! configured {
            ($variant:ident, $tool:ident) => {{
                let mut tool = $tool::new().with_deps(deps).with_config(config);
                if let Some(binary) = binary {
                    tool = tool.with_binary(binary);
                }
                AnyTool::$variant(Box::new(tool))
            }};
        }
        match self.kind {
            ToolKind::Tool => AnyTool::Plain(Box::new(
                GenericTool::new(binary.unwrap_or_default())
                    .with_deps(deps)
                    .with_flags(self.flags.unwrap_or_default()),
            )),
            ToolKind::Black => configured!(Formatter, Black),
            ToolKind::Isort => configured!(Formatter, ISort),
            ToolKind::Rustfmt => configured!(Formatter, Rustfmt),
            ToolKind::Bandit => configured!(Linter, Bandit),
            ToolKind::Flake8 => configured!(Linter, Flake8),
            ToolKind::Mypy => configured!(Linter, Mypy),
            ToolKind::Pytest => configured!(Tester, Pytest),
        }
    }
}

impl TryFrom<ConfigTool> for ToolEntry {
    type Error = ConfigError;

    fn try_from(config: ConfigTool) -> Result<Self, Self::Error> {
        let name = config.describe();
        match (&config.kind, &config.binary) {
            (ToolKind::Tool, None) => {
                return Err(ConfigError::Validation(
                    "Tool of kind `tool` needs a binary".to_string(),
                ));
            }
            (_, Some(binary)) if binary.trim().is_empty() => {
                return Err(ConfigError::Validation(format!(
                    "Tool of kind `{:?}` has an empty binary",
                    config.kind
                )));
            }
            _ => {}
        }
        if config.kind != ToolKind::Tool && config.flags.is_some() {
            return Err(ConfigError::Validation(format!(
                "Tool '{name}' does not accept flags, only tools of kind `tool` do"
            )));
        }
        if config.kind == ToolKind::Tool && config.config.is_some() {
            return Err(ConfigError::Validation(format!(
                "Tool '{name}' of kind `tool` does not accept a config file"
            )));
        }

        let files = config
            .files
            .as_deref()
            .map(|pattern| {
                Pattern::new(pattern).map_err(|e| ConfigError::Pattern {
                    source: e,
                    pattern: pattern.to_string(),
                })
            })
            .transpose()?;
        let mut entry = ToolEntry::new(config.build());
        entry.files = files;
        Ok(entry)
    }
}

/// Root configuration structure for toolbelt
#[derive(Debug, Deserialize, Serialize)]
pub struct Config {
    pub toolbelt_version: String,
    /// Command packages are appended to on install, `pip install` when unset
    pub installer: Option<Vec<String>>,
    pub ctx: Option<Ctx>,
    pub tools: Vec<ConfigTool>,
}

impl TryFrom<Config> for Toolbox {
    type Error = ConfigError;

    fn try_from(config: Config) -> Result<Self, Self::Error> {
        if config.tools.is_empty() {
            return Err(ConfigError::Validation("No tools configured".to_string()));
        }
        let tools = config
            .tools
            .into_iter()
            .map(ToolEntry::try_from)
            .collect::<Result<Tools<ToolEntry>, ConfigError>>()?;
        Ok(Toolbox::new(tools).with_ctx(config.ctx.unwrap_or_default()))
    }
}

/// List of supported configuration file names
const FILENAMES: [&str; 3] = [".toolbelt.json", ".toolbelt.yaml", ".toolbelt.yml"];

impl Config {
    /// Loads and parses a configuration file.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ConfigNotFound` if the file cannot be read, or
    /// `ConfigError::Yaml`/`ConfigError::Json` if parsing fails.
    pub fn from_file(file: &Path) -> Result<Config, ConfigError> {
        let contents = std::fs::read_to_string(file)
            .map_err(|_| ConfigError::ConfigNotFound(file.to_path_buf()))?;
        let config: Config = if file.extension().is_some_and(|ext| ext == "json") {
            serde_json::from_str(&contents).map_err(|e| ConfigError::Json {
                source: e,
                path: file.to_path_buf(),
            })?
        } else {
            serde_yaml::from_str(&contents).map_err(|e| ConfigError::Yaml {
                source: e,
                path: file.to_path_buf(),
            })?
        };
        Ok(config)
    }

    /// Searches for a configuration file in the current directory and its parents.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::UnknownWorkingDirectory` if the cwd cannot be determined,
    /// or `ConfigError::ConfigNotFound` if no config file is found.
    pub fn find_config() -> Result<PathBuf, ConfigError> {
        let cwd = std::env::current_dir()
            .map_err(|e| ConfigError::UnknownWorkingDirectory(e.to_string()))?;
        Self::find_config_from(&cwd)
    }

    /// Searches for a configuration file in `start` and its parents.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ConfigNotFound` if no config file is found.
    pub fn find_config_from(start: &Path) -> Result<PathBuf, ConfigError> {
        let mut path = start.to_path_buf();
        debug!("Searching for config file in {}", start.display());
        loop {
            for file in &FILENAMES {
                let config_path = path.join(file);
                if config_path.exists() {
                    info!("Found config file: {}", config_path.display());
                    return Ok(config_path);
                }
            }
            if !path.pop() {
                return Err(ConfigError::ConfigNotFound(start.to_path_buf()));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::{Capability, Tool};

    fn parse(yaml: &str) -> Result<Toolbox, ConfigError> {
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        Toolbox::try_from(config)
    }

    #[test]
    fn test_from_file_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".toolbelt.json");
        std::fs::write(
            &path,
            r#"{
                "toolbelt_version": "0.1.0",
                "tools": [{"kind": "black", "config": "pyproject.toml"}]
            }"#,
        )
        .unwrap();
        let config = Config::from_file(&path).unwrap();
        assert_eq!(config.tools.len(), 1);
        assert_eq!(config.tools[0].kind, ToolKind::Black);
    }

    #[test]
    fn test_from_file_yaml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".toolbelt.yaml");
        std::fs::write(
            &path,
            "toolbelt_version: '0.1.0'\ntools:\n  - kind: pytest\n    deps: [pytest-cov]\n",
        )
        .unwrap();
        let config = Config::from_file(&path).unwrap();
        assert_eq!(config.tools[0].kind, ToolKind::Pytest);
        assert_eq!(config.tools[0].deps, Some(vec!["pytest-cov".to_string()]));
    }

    #[test]
    fn test_from_file_yaml_error_keeps_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".toolbelt.yml");
        std::fs::write(&path, "tools: [").unwrap();
        match Config::from_file(&path) {
            Err(ConfigError::Yaml { path: p, .. }) => assert_eq!(p, path),
            other => panic!("Expected ConfigError::Yaml, got: {other:?}"),
        }
    }

    #[test]
    fn test_find_config_in_parent() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a/b");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::write(dir.path().join(".toolbelt.yaml"), "").unwrap();
        let found = Config::find_config_from(&nested).unwrap();
        assert_eq!(found, dir.path().join(".toolbelt.yaml"));
    }

    #[test]
    fn test_toolbox_from_config() {
        let toolbox = parse(
            r"
toolbelt_version: '0.1.0'
ctx:
  env:
    PYTHONDONTWRITEBYTECODE: '1'
tools:
  - kind: black
    config: pyproject.toml
    files: '*.py'
  - kind: mypy
    binary: dmypy
  - kind: tool
    binary: pytest-mock
",
        )
        .unwrap();
        assert_eq!(toolbox.tools.len(), 3);
        assert_eq!(toolbox.ctx.env["PYTHONDONTWRITEBYTECODE"], "1");
        assert_eq!(
            toolbox.tools[0].tool.capability(),
            Some(Capability::Formatter)
        );
        assert!(toolbox.tools[0].files.is_some());
        assert_eq!(toolbox.tools[1].binary(), "dmypy");
        assert_eq!(toolbox.tools[2].tool.capability(), None);
    }

    #[test]
    fn test_empty_binary_rejected() {
        let result = parse(
            "toolbelt_version: '0.1.0'\ntools:\n  - kind: flake8\n    binary: '  '\n",
        );
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_plain_tool_needs_binary() {
        let result = parse("toolbelt_version: '0.1.0'\ntools:\n  - kind: tool\n");
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_flags_only_for_plain_tools() {
        let result = parse(
            "toolbelt_version: '0.1.0'\ntools:\n  - kind: black\n    flags: [--fast]\n",
        );
        match result {
            Err(ConfigError::Validation(msg)) => assert!(msg.contains("black")),
            other => panic!("Expected ConfigError::Validation, got: {other:?}"),
        }
    }

    #[test]
    fn test_invalid_pattern_preserves_pattern() {
        let result = parse(
            "toolbelt_version: '0.1.0'\ntools:\n  - kind: bandit\n    files: '[invalid'\n",
        );
        match result {
            Err(ConfigError::Pattern { pattern, .. }) => assert_eq!(pattern, "[invalid"),
            other => panic!("Expected ConfigError::Pattern, got: {other:?}"),
        }
    }

    #[test]
    fn test_no_tools_rejected() {
        let result = parse("toolbelt_version: '0.1.0'\ntools: []\n");
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }
}

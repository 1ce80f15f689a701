//! Execution boundary: the collaborator that installs tools and runs processes
//!
//! Tools never spawn anything themselves. They assemble an [`Invocation`] or an
//! [`Installation`] and hand it to a [`Session`]. Two sessions ship with the
//! crate: [`ProcessSession`] runs real processes, [`DryRunSession`] only records
//! what would have been run.

use std::fmt;
use std::io::Write;
use std::path::PathBuf;
use std::process::Command as ProcessCommand;

use anstyle::{AnsiColor, Reset, Style};
use log::{debug, info};
use thiserror::Error;

use crate::ctx::{Env, Options};

/// Errors raised by an execution boundary
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Unable to start `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("`{program}` failed with {}", describe_code(.code))]
    Failed { program: String, code: Option<i32> },
    #[error("Invalid value for option `{name}`: {reason}")]
    InvalidOption { name: String, reason: String },
    #[error("Unsupported option: {0}")]
    UnsupportedOption(String),
    #[error("No installer command configured")]
    NoInstaller,
    #[error(transparent)]
    Custom(#[from] Box<dyn std::error::Error + Send + Sync>),
}

#[allow(clippy::ref_option)]
fn describe_code(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exit code {code}"),
        None => "no exit code (terminated by signal)".to_string(),
    }
}

/// A request to run `program` with the given positionals, env overlay and options
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
    pub env: Env,
    pub options: Options,
}

/// A request to install `packages`, the first being the tool itself
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Installation {
    pub packages: Vec<String>,
    pub options: Options,
}

fn quote(arg: &str) -> String {
    let safe = |c: char| c.is_ascii_alphanumeric() || "-_./=:,+@%".contains(c);
    if !arg.is_empty() && arg.chars().all(safe) {
        arg.to_string()
    } else {
        format!("'{}'", arg.replace('\'', r"'\''"))
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", quote(&self.program))?;
        for arg in &self.args {
            write!(f, " {}", quote(arg))?;
        }
        Ok(())
    }
}

impl fmt::Display for Installation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "install")?;
        for package in &self.packages {
            write!(f, " {}", quote(package))?;
        }
        Ok(())
    }
}

/// The install and run capabilities consumed by tools.
///
/// Implementations decide what failure means; tools propagate whatever is
/// returned without retrying or wrapping it.
pub trait Session {
    /// Install the given packages.
    ///
    /// # Errors
    ///
    /// Returns a `SessionError` if installation fails.
    fn install(&mut self, installation: &Installation) -> Result<(), SessionError>;

    /// Run a single invocation to completion.
    ///
    /// # Errors
    ///
    /// Returns a `SessionError` if the process cannot be started or fails.
    fn run(&mut self, invocation: &Invocation) -> Result<(), SessionError>;
}

const ARROW_COLOR: Style = Style::new().fg_color(Some(anstyle::Color::Ansi(AnsiColor::Cyan)));
const ERROR_COLOR: Style = Style::new().fg_color(Some(anstyle::Color::Ansi(AnsiColor::Red)));

fn format_start_message(command: &str) -> String {
    format!("{ARROW_COLOR}❱{Reset} {command}")
}

fn format_failure_message(program: &str, code: Option<i32>) -> String {
    format!(
        "{ERROR_COLOR}✘{Reset} {program} failed with {}",
        describe_code(&code)
    )
}

/// Options understood by [`ProcessSession`]
#[derive(Debug)]
struct RunOptions {
    silent: bool,
    success_codes: Vec<i32>,
    cwd: Option<PathBuf>,
}

impl RunOptions {
    fn parse(options: &Options) -> Result<Self, SessionError> {
        let invalid = |name: &str, reason: &str| SessionError::InvalidOption {
            name: name.to_string(),
            reason: reason.to_string(),
        };
        let mut parsed = RunOptions {
            silent: false,
            success_codes: vec![0],
            cwd: None,
        };
        for (name, value) in options {
            match name.as_str() {
                "silent" => {
                    parsed.silent = value
                        .as_bool()
                        .ok_or_else(|| invalid(name, "expected a boolean"))?;
                }
                "success_codes" => {
                    parsed.success_codes = value
                        .as_array()
                        .ok_or_else(|| invalid(name, "expected a list of exit codes"))?
                        .iter()
                        .map(|code| {
                            code.as_i64()
                                .and_then(|c| i32::try_from(c).ok())
                                .ok_or_else(|| invalid(name, "expected integer exit codes"))
                        })
                        .collect::<Result<Vec<i32>, SessionError>>()?;
                }
                "cwd" => {
                    let dir = value
                        .as_str()
                        .ok_or_else(|| invalid(name, "expected a path"))?;
                    parsed.cwd = Some(PathBuf::from(dir));
                }
                _ => return Err(SessionError::UnsupportedOption(name.clone())),
            }
        }
        Ok(parsed)
    }
}

/// Runs invocations as child processes of the current process
#[derive(Debug, Clone)]
pub struct ProcessSession {
    cwd: PathBuf,
    installer: Vec<String>,
}

impl ProcessSession {
    #[must_use]
    pub fn new(cwd: impl Into<PathBuf>) -> Self {
        Self {
            cwd: cwd.into(),
            installer: vec!["pip".to_string(), "install".to_string()],
        }
    }

    /// Replace the command used for installs; packages are appended to it
    #[must_use]
    pub fn with_installer(mut self, installer: Vec<String>) -> Self {
        self.installer = installer;
        self
    }
}

impl Session for ProcessSession {
    fn install(&mut self, installation: &Installation) -> Result<(), SessionError> {
        let (program, base_args) = self
            .installer
            .split_first()
            .ok_or(SessionError::NoInstaller)?;
        info!("Installing {}", installation.packages.join(", "));
        let invocation = Invocation {
            program: program.clone(),
            args: base_args
                .iter()
                .chain(&installation.packages)
                .cloned()
                .collect(),
            env: Env::new(),
            options: installation.options.clone(),
        };
        self.run(&invocation)
    }

    fn run(&mut self, invocation: &Invocation) -> Result<(), SessionError> {
        let options = RunOptions::parse(&invocation.options)?;
        let cwd = options
            .cwd
            .as_ref()
            .map_or_else(|| self.cwd.clone(), |dir| self.cwd.join(dir));

        info!("Running {invocation} (cwd: {})", cwd.display());
        debug!("Environment overlay: {:?}", invocation.env);
        eprintln!("{}", format_start_message(&invocation.to_string()));

        let mut command = ProcessCommand::new(&invocation.program);
        command
            .args(&invocation.args)
            .envs(&invocation.env)
            .current_dir(&cwd);
        let spawn_error = |source| SessionError::Spawn {
            program: invocation.program.clone(),
            source,
        };

        let (status, captured) = if options.silent {
            let output = command.output().map_err(spawn_error)?;
            (output.status, Some((output.stdout, output.stderr)))
        } else {
            (command.status().map_err(spawn_error)?, None)
        };

        let code = status.code();
        if code.is_some_and(|c| options.success_codes.contains(&c)) {
            debug!("{} exited with {:?}", invocation.program, code);
            return Ok(());
        }

        // Silent runs only show their output when something went wrong
        if let Some((stdout, stderr)) = captured {
            let mut err = std::io::stderr().lock();
            let _ = err.write_all(&stdout);
            let _ = err.write_all(&stderr);
        }
        eprintln!("{}", format_failure_message(&invocation.program, code));
        Err(SessionError::Failed {
            program: invocation.program.clone(),
            code,
        })
    }
}

/// A single request received by a [`DryRunSession`]
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Install(Installation),
    Run(Invocation),
}

impl fmt::Display for Call {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Call::Install(installation) => write!(f, "{installation}"),
            Call::Run(invocation) => write!(f, "{invocation}"),
        }
    }
}

/// Records every request instead of executing it
#[derive(Debug, Default)]
pub struct DryRunSession {
    calls: Vec<Call>,
}

impl DryRunSession {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// All requests in the order they were received
    #[must_use]
    pub fn calls(&self) -> &[Call] {
        &self.calls
    }

    pub fn invocations(&self) -> impl Iterator<Item = &Invocation> {
        self.calls.iter().filter_map(|call| match call {
            Call::Run(invocation) => Some(invocation),
            Call::Install(_) => None,
        })
    }

    pub fn installations(&self) -> impl Iterator<Item = &Installation> {
        self.calls.iter().filter_map(|call| match call {
            Call::Install(installation) => Some(installation),
            Call::Run(_) => None,
        })
    }
}

impl Session for DryRunSession {
    fn install(&mut self, installation: &Installation) -> Result<(), SessionError> {
        info!("[dry-run] {installation}");
        self.calls.push(Call::Install(installation.clone()));
        Ok(())
    }

    fn run(&mut self, invocation: &Invocation) -> Result<(), SessionError> {
        info!("[dry-run] {invocation}");
        debug!("[dry-run] env: {:?}, options: {:?}", invocation.env, invocation.options);
        self.calls.push(Call::Run(invocation.clone()));
        Ok(())
    }
}

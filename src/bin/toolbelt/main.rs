mod exec;
mod setup;

use std::process::ExitCode;

use clap::{ArgAction, Parser, Subcommand};
use log::LevelFilter;

use toolbelt::load_config;
use toolbelt::session::{DryRunSession, ProcessSession, Session, SessionError};
use toolbelt::toolbox::Operation;

#[derive(Parser, Debug)]
#[command(name = "toolbelt", about = "Run formatters, linters and test runners from one config")]
struct Cli {
    /// Path to config file (auto-detected if not specified)
    #[arg(short, long)]
    config: Option<String>,

    /// Log file path (enables file logging in addition to stderr)
    #[arg(long)]
    log_file: Option<String>,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,

    /// Print the commands instead of running them
    #[arg(long)]
    dry_run: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Install every configured tool and its dependencies
    Setup(setup::SetupArgs),
    /// Format files in place
    Format(exec::ExecArgs),
    /// Verify files are formatted, without changing them
    Check(exec::ExecArgs),
    /// Lint files
    Lint(exec::ExecArgs),
    /// Run the test suite, or the given test files
    Test(exec::ExecArgs),
}

fn main() -> ExitCode {
    match run() {
        Ok(code) => code,
        Err(e) => {
            if !already_reported(e.as_ref()) {
                eprintln!("Error: {e}");
            }
            ExitCode::FAILURE
        }
    }
}

/// Failed tool runs are announced by the session as they happen
fn already_reported(error: &(dyn std::error::Error + 'static)) -> bool {
    matches!(
        error.downcast_ref::<SessionError>(),
        Some(SessionError::Failed { .. })
    )
}

fn run() -> Result<ExitCode, Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let log_file = cli
        .log_file
        .as_ref()
        .map(std::fs::File::create)
        .transpose()?;
    let level = match cli.verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        _ => LevelFilter::Debug,
    };
    toolbelt::logger::init(log_file, level);

    let loaded = load_config(cli.config.as_deref())?;

    if cli.dry_run {
        let mut session = DryRunSession::new();
        let code = dispatch(&cli.command, &loaded, &mut session)?;
        for call in session.calls() {
            println!("{call}");
        }
        return Ok(code);
    }

    let mut session = ProcessSession::new(&loaded.cwd);
    if let Some(installer) = loaded.installer.clone() {
        session = session.with_installer(installer);
    }
    dispatch(&cli.command, &loaded, &mut session)
}

fn dispatch(
    command: &Commands,
    loaded: &toolbelt::Loaded,
    session: &mut dyn Session,
) -> Result<ExitCode, Box<dyn std::error::Error>> {
    match command {
        Commands::Setup(args) => setup::run(args, &loaded.toolbox, session),
        Commands::Format(args) => exec::run(Operation::Format, args, loaded, session),
        Commands::Check(args) => exec::run(Operation::Check, args, loaded, session),
        Commands::Lint(args) => exec::run(Operation::Lint, args, loaded, session),
        Commands::Test(args) => exec::run(Operation::Test, args, loaded, session),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failed_runs_are_not_reported_twice() {
        let failed: Box<dyn std::error::Error> = Box::new(SessionError::Failed {
            program: "flake8".to_string(),
            code: Some(1),
        });
        assert!(already_reported(failed.as_ref()));

        let unsupported: Box<dyn std::error::Error> =
            Box::new(SessionError::UnsupportedOption("retries".to_string()));
        assert!(!already_reported(unsupported.as_ref()));

        let other: Box<dyn std::error::Error> = "config is broken".into();
        assert!(!already_reported(other.as_ref()));
    }

    #[test]
    fn test_cli_parses_subcommands() {
        let cli = Cli::try_parse_from(["toolbelt", "-vv", "--dry-run", "lint", "--flag", "-q", "a.py"])
            .unwrap();
        assert_eq!(cli.verbose, 2);
        assert!(cli.dry_run);
        assert!(matches!(cli.command, Commands::Lint(_)));
    }
}

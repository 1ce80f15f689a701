use std::path::Path;
use std::process::ExitCode;

use clap::Args;
use log::{info, warn};

use toolbelt::Loaded;
use toolbelt::ctx::Ctx;
use toolbelt::files::{self, FilesError};
use toolbelt::session::Session;
use toolbelt::toolbox::Operation;

#[derive(Args, Debug)]
pub struct ExecArgs {
    /// Target files (defaults to the git-tracked files below the config directory)
    files: Vec<String>,

    /// Extra flag passed to every tool, may be repeated
    #[arg(long = "flag", allow_hyphen_values = true)]
    flags: Vec<String>,

    /// Environment variable set for every tool, as KEY=VALUE
    #[arg(long = "env", value_parser = parse_env)]
    env: Vec<(String, String)>,

    /// Only show tool output when a tool fails
    #[arg(long)]
    silent: bool,
}

impl ExecArgs {
    /// The caller context handed to every tool
    fn ctx(&self) -> Ctx {
        let mut ctx = Ctx::new().flags(self.flags.iter().cloned());
        for (key, value) in &self.env {
            ctx = ctx.env(key.clone(), value.clone());
        }
        if self.silent {
            ctx = ctx.option("silent", true);
        }
        ctx
    }

    /// Target files relative to `root`, the directory tools run in.
    ///
    /// Files typed on the command line are relative to `invoked_from`; without
    /// any, every git-tracked file below `root` is a target.
    fn targets(&self, invoked_from: &Path, root: &Path) -> Result<Vec<String>, FilesError> {
        if self.files.is_empty() {
            let tracked = files::tracked_files(root)?;
            info!("Using {} git-tracked files", tracked.len());
            return Ok(tracked);
        }
        files::rebase(&self.files, invoked_from, root)
    }
}

fn parse_env(s: &str) -> Result<(String, String), String> {
    s.split_once('=')
        .filter(|(key, _)| !key.is_empty())
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .ok_or_else(|| format!("expected KEY=VALUE, got `{s}`"))
}

/// Run a category operation over the configured tools.
///
/// # Errors
///
/// Returns an error if file discovery fails or a tool fails.
pub fn run(
    operation: Operation,
    args: &ExecArgs,
    loaded: &Loaded,
    session: &mut dyn Session,
) -> Result<ExitCode, Box<dyn std::error::Error>> {
    let invoked_from = std::env::current_dir()?;
    let targets = args.targets(&invoked_from, &loaded.cwd)?;

    let ran = loaded
        .toolbox
        .run_operation(operation, session, &targets, &args.ctx())?;
    if ran == 0 {
        warn!(
            "No {} ran for `{operation}` ({} configured)",
            operation.capability(),
            loaded.toolbox.count(operation)
        );
    }
    Ok(ExitCode::SUCCESS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use git2::Repository;
    use serde_json::json;

    #[derive(Parser, Debug)]
    struct Cli {
        #[command(flatten)]
        exec: ExecArgs,
    }

    fn parse(args: &[&str]) -> ExecArgs {
        Cli::try_parse_from(std::iter::once("toolbelt").chain(args.iter().copied()))
            .unwrap()
            .exec
    }

    #[test]
    fn test_parse_env() {
        assert_eq!(parse_env("CI=true"), Ok(("CI".to_string(), "true".to_string())));
        assert_eq!(parse_env("EMPTY="), Ok(("EMPTY".to_string(), String::new())));
        assert_eq!(
            parse_env("OPTS=a=b=c"),
            Ok(("OPTS".to_string(), "a=b=c".to_string()))
        );
    }

    #[test]
    fn test_parse_env_rejects_malformed() {
        assert!(parse_env("CI").is_err());
        assert!(parse_env("=value").is_err());
        assert!(parse_env("").is_err());
    }

    #[test]
    fn test_ctx_from_args() {
        let args = parse(&[
            "--flag", "-q", "--flag", "--diff", "--env", "CI=1", "--env", "CI=2", "--silent", "a.py",
        ]);
        let ctx = args.ctx();
        assert_eq!(ctx.flags, vec!["-q", "--diff"]);
        assert!(ctx.args.is_empty());
        assert_eq!(ctx.env["CI"], "2");
        assert_eq!(ctx.options["silent"], json!(true));
        assert_eq!(args.files, vec!["a.py"]);
    }

    #[test]
    fn test_ctx_without_args_is_empty() {
        assert!(parse(&[]).ctx().is_empty());
    }

    #[test]
    fn test_malformed_env_is_a_usage_error() {
        let result = Cli::try_parse_from(["toolbelt", "--env", "NOPE"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_targets_rebased_onto_root() {
        let dir = tempfile::tempdir().unwrap();
        let sub = dir.path().join("pkg");
        std::fs::create_dir(&sub).unwrap();

        let targets = parse(&["mod.py", "../setup.py"]).targets(&sub, dir.path()).unwrap();
        assert_eq!(targets, vec!["pkg/mod.py", "setup.py"]);
    }

    #[test]
    fn test_targets_default_to_tracked_files() {
        let dir = tempfile::tempdir().unwrap();
        let repo = Repository::init(dir.path()).unwrap();
        std::fs::create_dir(dir.path().join("pkg")).unwrap();
        std::fs::write(dir.path().join("pkg/mod.py"), "x = 1\n").unwrap();
        std::fs::write(dir.path().join("untracked.py"), "y = 2\n").unwrap();
        let mut index = repo.index().unwrap();
        index.add_path(Path::new("pkg/mod.py")).unwrap();
        index.write().unwrap();

        // Defaults do not depend on where the command was typed
        let targets = parse(&[]).targets(&dir.path().join("pkg"), dir.path()).unwrap();
        assert_eq!(targets, vec!["pkg/mod.py"]);
    }
}

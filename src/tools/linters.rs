use crate::ctx::Ctx;
use crate::session::{Session, SessionError};
use crate::tools::Tool;

/// A tool which lints source code
pub trait Linter: Tool {
    /// Lint the given files.
    ///
    /// # Errors
    ///
    /// Propagates any `SessionError` returned by the session.
    fn lint(&self, session: &mut dyn Session, files: &[String], ctx: &Ctx) -> Result<(), SessionError> {
        self.run(session, &ctx.combine(&Ctx::new().args(files.iter().cloned())))
    }
}

config_tool! {
    /// The bandit security linter
    Bandit { binary: "bandit", config_flag: "--config" }
}

impl Linter for Bandit {}

config_tool! {
    /// The flake8 linter
    Flake8 { binary: "flake8", config_flag: "--config" }
}

impl Linter for Flake8 {}

config_tool! {
    /// The mypy type checker
    Mypy { binary: "mypy", config_flag: "--config-file" }
}

impl Linter for Mypy {}

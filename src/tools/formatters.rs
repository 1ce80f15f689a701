use crate::ctx::Ctx;
use crate::session::{Session, SessionError};
use crate::tools::Tool;

/// A tool which formats source code
pub trait Formatter: Tool {
    /// Flag asking the formatter to only report unformatted files
    fn check_flag(&self) -> &str;

    /// Validate that the given files are formatted correctly.
    ///
    /// # Errors
    ///
    /// Propagates any `SessionError` returned by the session.
    fn check(
        &self,
        session: &mut dyn Session,
        files: &[String],
        ctx: &Ctx,
    ) -> Result<(), SessionError> {
        let files_ctx = Ctx::new().flags([self.check_flag()]).args(files.iter().cloned());
        self.run(session, &ctx.combine(&files_ctx))
    }

    /// Format the given files in place.
    ///
    /// # Errors
    ///
    /// Propagates any `SessionError` returned by the session.
    fn format(
        &self,
        session: &mut dyn Session,
        files: &[String],
        ctx: &Ctx,
    ) -> Result<(), SessionError> {
        self.run(session, &ctx.combine(&Ctx::new().args(files.iter().cloned())))
    }
}

config_tool! {
    /// The black formatter
    Black { binary: "black", config_flag: "--config" }
}

impl Formatter for Black {
    fn check_flag(&self) -> &str {
        "--check"
    }
}

config_tool! {
    /// The isort import formatter
    ISort { binary: "isort", config_flag: "--settings-path" }
}

impl Formatter for ISort {
    fn check_flag(&self) -> &str {
        "--check-only"
    }
}

config_tool! {
    /// rustfmt, the Rust formatter
    Rustfmt { binary: "rustfmt", config_flag: "--config-path" }
}

impl Formatter for Rustfmt {
    fn check_flag(&self) -> &str {
        "--check"
    }
}

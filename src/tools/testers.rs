use crate::ctx::Ctx;
use crate::session::{Session, SessionError};
use crate::tools::Tool;

/// A tool which runs a test suite
pub trait Tester: Tool {
    /// Run the tests in the given files, or the whole suite when `files` is empty.
    ///
    /// # Errors
    ///
    /// Propagates any `SessionError` returned by the session.
    fn test(&self, session: &mut dyn Session, files: &[String], ctx: &Ctx) -> Result<(), SessionError> {
        self.run(session, &ctx.combine(&Ctx::new().args(files.iter().cloned())))
    }
}

config_tool! {
    /// The pytest test runner
    Pytest { binary: "pytest", config_flag: "-c" }
}

impl Tester for Pytest {}

//! A configured set of tools driven as a whole
//!
//! A [`Toolbox`] is what a config file turns into: an ordered list of tools,
//! each optionally restricted to the target files matching a glob pattern,
//! plus a base context applied to every run.

use std::fmt;

use glob::Pattern;
use log::{debug, info};

use crate::ctx::{Ctx, Options};
use crate::files;
use crate::session::{Session, SessionError};
use crate::tools::{AnyTool, Capability, Tool, Tools};

/// A category operation applied to every tool of the matching role
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Format,
    Check,
    Lint,
    Test,
}

impl Operation {
    #[must_use]
    pub fn capability(self) -> Capability {
        match self {
            Operation::Format | Operation::Check => Capability::Formatter,
            Operation::Lint => Capability::Linter,
            Operation::Test => Capability::Tester,
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Format => write!(f, "format"),
            Operation::Check => write!(f, "check"),
            Operation::Lint => write!(f, "lint"),
            Operation::Test => write!(f, "test"),
        }
    }
}

/// A tool together with the pattern selecting its target files
#[derive(Debug)]
pub struct ToolEntry {
    pub tool: AnyTool,
    pub files: Option<Pattern>,
}

impl ToolEntry {
    #[must_use]
    pub fn new(tool: AnyTool) -> Self {
        Self { tool, files: None }
    }

    #[must_use]
    pub fn with_files(mut self, pattern: Pattern) -> Self {
        self.files = Some(pattern);
        self
    }

    /// The targets this tool should receive, `None` when a non-empty list was
    /// filtered down to nothing
    fn select(&self, targets: &[String]) -> Option<Vec<String>> {
        let Some(pattern) = &self.files else {
            return Some(targets.to_vec());
        };
        let selected = files::filter(targets, pattern, false);
        if selected.is_empty() && !targets.is_empty() {
            None
        } else {
            Some(selected)
        }
    }
}

impl Tool for ToolEntry {
    fn binary(&self) -> &str {
        self.tool.binary()
    }

    fn deps(&self) -> &[String] {
        self.tool.deps()
    }

    fn flags(&self) -> &[String] {
        self.tool.flags()
    }

    fn run(&self, session: &mut dyn Session, ctx: &Ctx) -> Result<(), SessionError> {
        self.tool.run(session, ctx)
    }

    fn setup(&self, session: &mut dyn Session, options: &Options) -> Result<(), SessionError> {
        self.tool.setup(session, options)
    }
}

#[derive(Debug, Default)]
pub struct Toolbox {
    /// Context placed in front of the caller's context on every run
    pub ctx: Ctx,
    pub tools: Tools<ToolEntry>,
}

impl Toolbox {
    #[must_use]
    pub fn new(tools: Tools<ToolEntry>) -> Self {
        Self {
            ctx: Ctx::new(),
            tools,
        }
    }

    #[must_use]
    pub fn with_ctx(mut self, ctx: Ctx) -> Self {
        self.ctx = ctx;
        self
    }

    /// Number of tools able to perform `operation`
    #[must_use]
    pub fn count(&self, operation: Operation) -> usize {
        self.tools
            .iter()
            .filter(|entry| entry.tool.capability() == Some(operation.capability()))
            .count()
    }

    /// Install every tool, in order, stopping at the first failure.
    ///
    /// # Errors
    ///
    /// Returns the first `SessionError` raised by the session.
    pub fn setup(&self, session: &mut dyn Session, options: &Options) -> Result<(), SessionError> {
        self.tools.setup(session, options)
    }

    /// Apply `operation` to `files` with every tool of the matching role, in
    /// order, stopping at the first failure. Returns the number of tools run.
    ///
    /// # Errors
    ///
    /// Returns the first `SessionError` raised by the session.
    pub fn run_operation(
        &self,
        operation: Operation,
        session: &mut dyn Session,
        files: &[String],
        ctx: &Ctx,
    ) -> Result<usize, SessionError> {
        let ctx = self.ctx.combine(ctx);
        let mut ran = 0;
        for entry in &self.tools {
            if entry.tool.capability() != Some(operation.capability()) {
                continue;
            }
            let Some(selected) = entry.select(files) else {
                debug!(
                    "Skipping {}: no target matches its file pattern",
                    entry.tool.binary()
                );
                continue;
            };
            info!(
                "{operation}: {} on {} file(s)",
                entry.tool.binary(),
                selected.len()
            );
            match (operation, &entry.tool) {
                (Operation::Format, AnyTool::Formatter(tool)) => {
                    tool.format(session, &selected, &ctx)?;
                }
                (Operation::Check, AnyTool::Formatter(tool)) => {
                    tool.check(session, &selected, &ctx)?;
                }
                (Operation::Lint, AnyTool::Linter(tool)) => tool.lint(session, &selected, &ctx)?,
                (Operation::Test, AnyTool::Tester(tool)) => tool.test(session, &selected, &ctx)?,
                _ => continue,
            }
            ran += 1;
        }
        Ok(ran)
    }

    /// # Errors
    ///
    /// Returns the first `SessionError` raised by the session.
    pub fn format(
        &self,
        session: &mut dyn Session,
        files: &[String],
        ctx: &Ctx,
    ) -> Result<usize, SessionError> {
        self.run_operation(Operation::Format, session, files, ctx)
    }

    /// # Errors
    ///
    /// Returns the first `SessionError` raised by the session.
    pub fn check(
        &self,
        session: &mut dyn Session,
        files: &[String],
        ctx: &Ctx,
    ) -> Result<usize, SessionError> {
        self.run_operation(Operation::Check, session, files, ctx)
    }

    /// # Errors
    ///
    /// Returns the first `SessionError` raised by the session.
    pub fn lint(
        &self,
        session: &mut dyn Session,
        files: &[String],
        ctx: &Ctx,
    ) -> Result<usize, SessionError> {
        self.run_operation(Operation::Lint, session, files, ctx)
    }

    /// # Errors
    ///
    /// Returns the first `SessionError` raised by the session.
    pub fn test(
        &self,
        session: &mut dyn Session,
        files: &[String],
        ctx: &Ctx,
    ) -> Result<usize, SessionError> {
        self.run_operation(Operation::Test, session, files, ctx)
    }
}

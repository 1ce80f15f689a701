//! External tools and the capability roles they play
//!
//! Every tool implements [`Tool`], which knows how to install the tool and how
//! to turn a [`Ctx`] into an [`Invocation`]. On top of that a tool takes exactly
//! one category role: [`Formatter`], [`Linter`] or [`Tester`]. Category
//! operations add the target files to the incoming context and delegate to
//! [`Tool::run`].
//!
//! Concrete tools that accept a configuration file override `run` to put the
//! configuration flag in front of everything else before delegating to
//! [`invoke`].

use std::fmt;
use std::ops::Deref;

use log::debug;

use crate::ctx::{Ctx, Options};
use crate::session::{Installation, Invocation, Session, SessionError};

/// Declare a tool configured by a single file passed with `config_flag`.
///
/// The generated type carries a binary name (overridable), install-time
/// dependencies and the configuration path, and implements [`Tool`] so that
/// the configuration flag leads every invocation.
macro_rules! config_tool {
    ($(#[$meta:meta])* $name:ident { binary: $binary:literal, config_flag: $flag:literal }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq)]
        pub struct $name {
            pub binary: String,
            pub deps: Vec<String>,
            #[doc = concat!("Configuration file passed with `", $flag, "` on every run, if set")]
            pub config: String,
        }

        impl Default for $name {
            fn default() -> Self {
                Self {
                    binary: $binary.to_string(),
                    deps: Vec::new(),
                    config: String::new(),
                }
            }
        }

        impl $name {
            #[must_use]
            pub fn new() -> Self {
                Self::default()
            }

            #[must_use]
            pub fn with_config(mut self, config: impl Into<String>) -> Self {
                self.config = config.into();
                self
            }

            /// Append packages installed alongside the binary
            #[must_use]
            pub fn with_deps<I, S>(mut self, deps: I) -> Self
            where
                I: IntoIterator<Item = S>,
                S: Into<String>,
            {
                self.deps.extend(deps.into_iter().map(Into::into));
                self
            }

            #[must_use]
            pub fn with_binary(mut self, binary: impl Into<String>) -> Self {
                self.binary = binary.into();
                self
            }
        }

        impl $crate::tools::Tool for $name {
            fn binary(&self) -> &str {
                &self.binary
            }

            fn deps(&self) -> &[String] {
                &self.deps
            }

            fn run(
                &self,
                session: &mut dyn $crate::session::Session,
                ctx: &$crate::ctx::Ctx,
            ) -> Result<(), $crate::session::SessionError> {
                let config = $crate::tools::config_ctx($flag, &self.config);
                $crate::tools::invoke(self, session, &config.combine(ctx))
            }
        }
    };
}

pub mod formatters;
pub mod linters;
pub mod testers;

pub use formatters::{Black, Formatter, ISort, Rustfmt};
pub use linters::{Bandit, Flake8, Linter, Mypy};
pub use testers::{Pytest, Tester};

/// A reference to one external executable and its install-time dependencies
pub trait Tool {
    /// Name of the executable, also the first package installed by `setup`
    fn binary(&self) -> &str;

    /// Additional packages installed alongside the binary
    fn deps(&self) -> &[String] {
        &[]
    }

    /// Flags placed between the context flags and the context args on every run
    fn flags(&self) -> &[String] {
        &[]
    }

    /// Run the binary with the given context.
    ///
    /// # Errors
    ///
    /// Propagates any `SessionError` returned by the session.
    fn run(&self, session: &mut dyn Session, ctx: &Ctx) -> Result<(), SessionError> {
        invoke(self, session, ctx)
    }

    /// Install the binary and its dependencies in one request.
    ///
    /// # Errors
    ///
    /// Propagates any `SessionError` returned by the session.
    fn setup(&self, session: &mut dyn Session, options: &Options) -> Result<(), SessionError> {
        let installation = Installation {
            packages: std::iter::once(self.binary().to_string())
                .chain(self.deps().iter().cloned())
                .collect(),
            options: options.clone(),
        };
        debug!("Setting up {}", self.binary());
        session.install(&installation)
    }
}

/// Build the invocation for `tool` from `ctx` and hand it to the session.
///
/// This is the base behaviour of [`Tool::run`]; overriding implementations call
/// it once they have adjusted the context.
///
/// # Errors
///
/// Propagates any `SessionError` returned by the session.
pub fn invoke<T: Tool + ?Sized>(
    tool: &T,
    session: &mut dyn Session,
    ctx: &Ctx,
) -> Result<(), SessionError> {
    let invocation = Invocation {
        program: tool.binary().to_string(),
        args: ctx
            .flags
            .iter()
            .chain(tool.flags())
            .chain(&ctx.args)
            .cloned()
            .collect(),
        env: ctx.env.clone(),
        options: ctx.options.clone(),
    };
    debug!("Assembled invocation: {invocation}");
    session.run(&invocation)
}

/// The context holding a configuration flag pair, or an empty one without config
pub(crate) fn config_ctx(flag: &str, config: &str) -> Ctx {
    if config.is_empty() {
        Ctx::new()
    } else {
        Ctx::new().flags([flag, config])
    }
}

/// A tool without a category role, useful for install-only dependencies
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GenericTool {
    pub binary: String,
    pub deps: Vec<String>,
    pub flags: Vec<String>,
}

impl GenericTool {
    #[must_use]
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
            ..Default::default()
        }
    }

    #[must_use]
    pub fn with_deps<I, S>(mut self, deps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.deps.extend(deps.into_iter().map(Into::into));
        self
    }

    #[must_use]
    pub fn with_flags<I, S>(mut self, flags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.flags.extend(flags.into_iter().map(Into::into));
        self
    }
}

impl Tool for GenericTool {
    fn binary(&self) -> &str {
        &self.binary
    }

    fn deps(&self) -> &[String] {
        &self.deps
    }

    fn flags(&self) -> &[String] {
        &self.flags
    }
}

impl<T: Tool + ?Sized> Tool for Box<T> {
    fn binary(&self) -> &str {
        (**self).binary()
    }

    fn deps(&self) -> &[String] {
        (**self).deps()
    }

    fn flags(&self) -> &[String] {
        (**self).flags()
    }

    fn run(&self, session: &mut dyn Session, ctx: &Ctx) -> Result<(), SessionError> {
        (**self).run(session, ctx)
    }

    fn setup(&self, session: &mut dyn Session, options: &Options) -> Result<(), SessionError> {
        (**self).setup(session, options)
    }
}

/// The category role a tool plays
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    Formatter,
    Linter,
    Tester,
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Capability::Formatter => write!(f, "formatter"),
            Capability::Linter => write!(f, "linter"),
            Capability::Tester => write!(f, "tester"),
        }
    }
}

/// A tool of any role, dispatched dynamically
pub enum AnyTool {
    Plain(Box<dyn Tool>),
    Formatter(Box<dyn Formatter>),
    Linter(Box<dyn Linter>),
    Tester(Box<dyn Tester>),
}

impl AnyTool {
    /// The role of this tool, `None` for plain tools
    #[must_use]
    pub fn capability(&self) -> Option<Capability> {
        match self {
            AnyTool::Plain(_) => None,
            AnyTool::Formatter(_) => Some(Capability::Formatter),
            AnyTool::Linter(_) => Some(Capability::Linter),
            AnyTool::Tester(_) => Some(Capability::Tester),
        }
    }

    fn as_tool(&self) -> &dyn Tool {
        match self {
            AnyTool::Plain(tool) => tool,
            AnyTool::Formatter(tool) => tool,
            AnyTool::Linter(tool) => tool,
            AnyTool::Tester(tool) => tool,
        }
    }
}

impl fmt::Debug for AnyTool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnyTool")
            .field("capability", &self.capability())
            .field("binary", &self.binary())
            .field("deps", &self.deps())
            .finish()
    }
}

impl Tool for AnyTool {
    fn binary(&self) -> &str {
        self.as_tool().binary()
    }

    fn deps(&self) -> &[String] {
        self.as_tool().deps()
    }

    fn flags(&self) -> &[String] {
        self.as_tool().flags()
    }

    fn run(&self, session: &mut dyn Session, ctx: &Ctx) -> Result<(), SessionError> {
        self.as_tool().run(session, ctx)
    }

    fn setup(&self, session: &mut dyn Session, options: &Options) -> Result<(), SessionError> {
        self.as_tool().setup(session, options)
    }
}

/// An ordered group of tools
#[derive(Debug, Clone, PartialEq)]
pub struct Tools<T>(Vec<T>);

impl<T> Default for Tools<T> {
    fn default() -> Self {
        Tools(Vec::new())
    }
}

impl<T> Tools<T> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, tool: T) {
        self.0.push(tool);
    }
}

impl<T: Tool> Tools<T> {
    /// Install every tool in insertion order, stopping at the first failure.
    ///
    /// # Errors
    ///
    /// Returns the first `SessionError` raised by the session.
    pub fn setup(&self, session: &mut dyn Session, options: &Options) -> Result<(), SessionError> {
        for tool in &self.0 {
            tool.setup(session, options)?;
        }
        Ok(())
    }
}

impl<T> Deref for Tools<T> {
    type Target = [T];

    fn deref(&self) -> &[T] {
        &self.0
    }
}

impl<T> From<Vec<T>> for Tools<T> {
    fn from(tools: Vec<T>) -> Self {
        Tools(tools)
    }
}

impl<T> FromIterator<T> for Tools<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Tools(iter.into_iter().collect())
    }
}

impl<'a, T> IntoIterator for &'a Tools<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::session::{Call, DryRunSession};
    use serde_json::json;

    /// Session that records calls and fails the n-th one (zero based)
    pub(crate) struct FailingSession {
        pub fail_at: usize,
        pub calls: Vec<Call>,
    }

    impl FailingSession {
        pub(crate) fn new(fail_at: usize) -> Self {
            Self {
                fail_at,
                calls: Vec::new(),
            }
        }

        fn record(&mut self, call: Call) -> Result<(), SessionError> {
            self.calls.push(call);
            if self.calls.len() > self.fail_at {
                return Err(SessionError::Failed {
                    program: "boom".to_string(),
                    code: Some(2),
                });
            }
            Ok(())
        }
    }

    impl Session for FailingSession {
        fn install(&mut self, installation: &Installation) -> Result<(), SessionError> {
            self.record(Call::Install(installation.clone()))
        }

        fn run(&mut self, invocation: &Invocation) -> Result<(), SessionError> {
            self.record(Call::Run(invocation.clone()))
        }
    }

    pub(crate) fn only_run(session: &DryRunSession) -> &Invocation {
        let invocations: Vec<&Invocation> = session.invocations().collect();
        assert_eq!(invocations.len(), 1, "expected exactly one run call");
        invocations[0]
    }

    #[test]
    fn test_tool_run() {
        let tool = GenericTool::new("tool");
        let ctx = Ctx::new()
            .flags(["--flag1"])
            .args(["arg1"])
            .env("env1", "val1")
            .option("test1", "test");
        let mut session = DryRunSession::new();
        tool.run(&mut session, &ctx).unwrap();

        let inv = only_run(&session);
        assert_eq!(inv.program, "tool");
        assert_eq!(inv.args, vec!["--flag1", "arg1"]);
        assert_eq!(inv.env, ctx.env);
        assert_eq!(inv.options["test1"], json!("test"));
    }

    #[test]
    fn test_tool_flags_sit_between_ctx_flags_and_args() {
        let tool = GenericTool::new("tool").with_flags(["--flag2"]);
        let ctx = Ctx::new().flags(["--flag1"]).args(["arg1"]);
        let mut session = DryRunSession::new();
        tool.run(&mut session, &ctx).unwrap();

        assert_eq!(only_run(&session).args, vec!["--flag1", "--flag2", "arg1"]);
    }

    #[test]
    fn test_tool_run_does_not_touch_ctx() {
        let tool = GenericTool::new("tool").with_flags(["-v"]);
        let ctx = Ctx::new().flags(["-q"]);
        let before = ctx.clone();
        tool.run(&mut DryRunSession::new(), &ctx).unwrap();
        assert_eq!(ctx, before);
    }

    #[test]
    fn test_tool_setup() {
        let tool = GenericTool::new("tool").with_deps(["dep1", "dep2"]);
        let mut options = Options::new();
        options.insert("test".to_string(), json!("test1"));
        let mut session = DryRunSession::new();
        tool.setup(&mut session, &options).unwrap();

        let installs: Vec<&Installation> = session.installations().collect();
        assert_eq!(installs.len(), 1);
        assert_eq!(installs[0].packages, vec!["tool", "dep1", "dep2"]);
        assert_eq!(installs[0].options, options);
    }

    #[test]
    fn test_tools_setup() {
        let tools: Tools<GenericTool> =
            vec![GenericTool::new("tool1"), GenericTool::new("tool2")].into();
        let mut options = Options::new();
        options.insert("test".to_string(), json!("test1"));
        let mut session = DryRunSession::new();
        tools.setup(&mut session, &options).unwrap();

        let installs: Vec<&Installation> = session.installations().collect();
        assert_eq!(installs.len(), 2);
        assert_eq!(installs[0].packages, vec!["tool1"]);
        assert_eq!(installs[1].packages, vec!["tool2"]);
        assert!(installs.iter().all(|i| i.options == options));
    }

    #[test]
    fn test_tools_setup_is_fail_fast() {
        let tools: Tools<GenericTool> = ["a", "b", "c"].into_iter().map(GenericTool::new).collect();
        let mut session = FailingSession::new(1);
        let result = tools.setup(&mut session, &Options::new());
        assert!(matches!(result, Err(SessionError::Failed { .. })));
        assert_eq!(session.calls.len(), 2);
    }

    #[test]
    fn test_tools_keep_duplicates_in_order() {
        let mut tools = Tools::new();
        tools.push(GenericTool::new("same"));
        tools.push(GenericTool::new("same"));
        let mut session = DryRunSession::new();
        tools.setup(&mut session, &Options::new()).unwrap();
        assert_eq!(session.installations().count(), 2);
        assert_eq!(tools.len(), 2);
    }

    #[test]
    fn test_any_tool_dispatch() {
        let tool = AnyTool::Linter(Box::new(Mypy::new().with_config("mypy.ini")));
        assert_eq!(tool.capability(), Some(Capability::Linter));
        assert_eq!(tool.binary(), "mypy");

        let mut session = DryRunSession::new();
        tool.run(&mut session, &Ctx::new()).unwrap();
        assert_eq!(only_run(&session).args, vec!["--config-file", "mypy.ini"]);

        let plain = AnyTool::Plain(Box::new(GenericTool::new("pytest-mock")));
        assert_eq!(plain.capability(), None);
    }
}

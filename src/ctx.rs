//! Invocation context passed from a call site down to the execution boundary
//!
//! A [`Ctx`] splits a command invocation into flags, positional arguments,
//! environment variables and extra named options. Contexts are combined with
//! [`Ctx::combine`] (or `+`): flags and args of the right-hand side are appended
//! after the left-hand side, while env and options are overlaid with the
//! right-hand side winning on key collisions.

use std::collections::BTreeMap;
use std::ops::{Add, AddAssign};

use serde::{Deserialize, Serialize};

/// Environment variables set for a single invocation
pub type Env = BTreeMap<String, String>;

/// Extra named options handed verbatim to the execution boundary
pub type Options = BTreeMap<String, serde_json::Value>;

/// One fragment, or the merge of several fragments, of a command invocation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Ctx {
    pub flags: Vec<String>,
    pub args: Vec<String>,
    pub env: Env,
    pub options: Options,
}

impl Ctx {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append command-line flags
    #[must_use]
    pub fn flags<I, S>(mut self, flags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.flags.extend(flags.into_iter().map(Into::into));
        self
    }

    /// Append positional arguments
    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Set an environment variable, replacing any previous value for `key`
    #[must_use]
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Set a named option, replacing any previous value for `key`
    #[must_use]
    pub fn option(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }

    /// Combine two contexts into a new one, leaving both untouched.
    ///
    /// Flags and args are concatenated (`self` first), env and options are
    /// overlaid with `other` winning on collisions.
    #[must_use]
    pub fn combine(&self, other: &Ctx) -> Ctx {
        let mut env = self.env.clone();
        env.extend(other.env.iter().map(|(k, v)| (k.clone(), v.clone())));
        let mut options = self.options.clone();
        options.extend(other.options.iter().map(|(k, v)| (k.clone(), v.clone())));
        Ctx {
            flags: self.flags.iter().chain(&other.flags).cloned().collect(),
            args: self.args.iter().chain(&other.args).cloned().collect(),
            env,
            options,
        }
    }

    /// Flags followed by args, the positional order used on the command line
    #[must_use]
    pub fn positionals(&self) -> Vec<String> {
        self.flags.iter().chain(&self.args).cloned().collect()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.flags.is_empty() && self.args.is_empty() && self.env.is_empty() && self.options.is_empty()
    }
}

impl Add<&Ctx> for &Ctx {
    type Output = Ctx;

    fn add(self, rhs: &Ctx) -> Ctx {
        self.combine(rhs)
    }
}

impl Add for Ctx {
    type Output = Ctx;

    fn add(self, rhs: Ctx) -> Ctx {
        self.combine(&rhs)
    }
}

impl AddAssign<&Ctx> for Ctx {
    fn add_assign(&mut self, rhs: &Ctx) {
        *self = self.combine(rhs);
    }
}

//! Bounded-lifetime execution of external programs.
//!
//! Everything the console learns about the outside world (the `sx` Vault CLI,
//! `git`) comes through [`CommandRunner`]. The real implementation is
//! [`SystemRunner`]; tests substitute a scripted runner.

mod gateway;
mod locate;

use std::{
    fmt,
    future::Future,
    path::{Path, PathBuf},
    time::Duration,
};

pub use gateway::{DEFAULT_KILL_GRACE, SystemRunner};
pub use locate::{find_in_path, locate};

/// How much of a failing process's stderr is kept in [`ProcessError::Exited`].
pub const STDERR_SNIPPET_CHARS: usize = 200;

/// Correlates the log lines of a single invocation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct InvocationId(pub String);

impl InvocationId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

impl Default for InvocationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for InvocationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One external command: argv (program first), working directory, deadline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub argv: Vec<String>,
    pub cwd: Option<PathBuf>,
    pub timeout: Duration,
}

impl Invocation {
    pub fn new<I, S>(argv: I, timeout: Duration) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            argv: argv.into_iter().map(Into::into).collect(),
            cwd: None,
            timeout,
        }
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    /// Short program name for messages: the file name of `argv[0]`.
    pub fn program(&self) -> String {
        self.argv
            .first()
            .map(|p| program_label(p))
            .unwrap_or_default()
    }

    /// Arguments after the program.
    pub fn args(&self) -> &[String] {
        self.argv.get(1..).unwrap_or(&[])
    }
}

pub(crate) fn program_label(program: &str) -> String {
    Path::new(program)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| program.to_string())
}

fn display_code(code: &Option<i32>) -> String {
    match code {
        Some(c) => c.to_string(),
        None => "signal".to_string(),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    #[error("empty command line")]
    EmptyCommand,

    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to collect output of {program}: {source}")]
    Io {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} timed out after {}ms", .timeout.as_millis())]
    TimedOut {
        program: String,
        timeout: Duration,
        /// SIGTERM was not enough and the process had to be killed.
        forced: bool,
    },

    /// The process ran and reported failure. `stderr` is already truncated.
    #[error("{program} exited with code {}: {stderr}", display_code(.code))]
    Exited {
        program: String,
        code: Option<i32>,
        stderr: String,
    },
}

impl ProcessError {
    /// True when the program ran to completion but exited unsuccessfully.
    pub fn is_nonzero_exit(&self) -> bool {
        matches!(self, Self::Exited { .. })
    }
}

/// Locates and runs external programs.
///
/// `run` resolves to the process's stdout on a zero exit status; every other
/// outcome is a [`ProcessError`].
pub trait CommandRunner: Send + Sync + 'static {
    fn locate(&self, program: &str) -> Option<PathBuf>;

    fn run(
        &self,
        invocation: &Invocation,
    ) -> impl Future<Output = Result<String, ProcessError>> + Send;
}

/// Keep at most `max_chars` characters of `s`.
pub fn truncate_chars(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((end, _)) => s[..end].to_string(),
        None => s.to_string(),
    }
}

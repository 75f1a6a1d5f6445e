//! External command execution with secret masking.
//!
//! A [`CommandInvocation`] is a list of tokens that are already shell-escaped
//! (see [`escape_arg`]) and joined with spaces into one `sh -c` command line, so
//! redirections (`> file`) and leading `VAR=value` assignments work as written.
//! Secrets registered on the invocation are replaced with a same-length run of
//! [`MASK_CHAR`](crate::backup::redacted::MASK_CHAR) in every log line.

use crate::backup::redacted::mask;
use crate::backup::result_error::error::Error;
use crate::backup::result_error::result::Result;
use crate::backup::result_error::AddMsg;
use itertools::Itertools;
use std::process::Command;
use tracing::debug;

/// Shell used to run every invocation.
pub static SHELL: &str = "sh";

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CommandInvocation {
    tokens: Vec<String>,
    secrets: Vec<String>,
}

impl CommandInvocation {
    pub fn new<S: Into<String>>(program: S) -> Self {
        Self {
            tokens: vec![program.into()],
            secrets: Vec::new(),
        }
    }

    pub fn arg<S: Into<String>>(mut self, token: S) -> Self {
        self.tokens.push(token.into());
        self
    }

    pub fn args<I, S>(mut self, tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tokens.extend(tokens.into_iter().map(Into::into));
        self
    }

    /// Marks a literal substring to be masked in logs. Empty strings are ignored.
    pub fn secret<S: Into<String>>(mut self, secret: S) -> Self {
        let secret = secret.into();
        if !secret.is_empty() {
            self.secrets.push(secret);
        }
        self
    }

    /// Masks the escaped form of `value`. An empty value escapes to `''`,
    /// which would mask every empty argument, so it is not registered.
    pub fn escaped_secret<S: AsRef<str>>(self, value: S) -> Self {
        let value = value.as_ref();
        if value.is_empty() {
            self
        } else {
            self.secret(escape_arg(value))
        }
    }

    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    /// First token that is not a `VAR=value` environment assignment.
    pub fn program(&self) -> &str {
        self.tokens
            .iter()
            .find(|t| !is_env_assignment(t))
            .map(String::as_str)
            .unwrap_or_default()
    }

    /// The line handed to the shell. Contains secrets, never log this.
    pub fn command_line(&self) -> String {
        self.tokens.join(" ")
    }

    /// The command line with every secret masked.
    pub fn redacted(&self) -> String {
        // Longest first so a secret containing another secret is masked whole.
        self.secrets
            .iter()
            .sorted_by_key(|s| std::cmp::Reverse(s.len()))
            .fold(self.command_line(), |line, secret| {
                line.replace(secret.as_str(), &mask(secret))
            })
    }
}

fn is_env_assignment(token: &str) -> bool {
    match token.split_once('=') {
        Some((name, _)) => {
            !name.is_empty()
                && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
                && !name.starts_with(|c: char| c.is_ascii_digit())
        }
        None => false,
    }
}

/// Exit code and captured output of one invocation.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub exit_code: i32,
    /// stdout lines followed by stderr lines
    pub lines: Vec<String>,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Runs external commands. The exit code is returned, not interpreted.
pub trait CommandRunner {
    fn run(&self, invocation: &CommandInvocation) -> Result<CommandOutput>;
}

/// Runs invocations through `sh -c`.
#[derive(Clone, Debug, Default)]
pub struct ShellCommandRunner;

impl CommandRunner for ShellCommandRunner {
    fn run(&self, invocation: &CommandInvocation) -> Result<CommandOutput> {
        debug!("  running command: {}", invocation.redacted());

        let output = Command::new(SHELL)
            .arg("-c")
            .arg(invocation.command_line())
            .output()
            .map_err(Error::from)
            .add_msg(format!("Failed to start {:?}", invocation.program()))?;

        // Killed by a signal: no exit code.
        let exit_code = output.status.code().unwrap_or(-1);
        debug!("  result: {exit_code}");

        let lines = String::from_utf8_lossy(&output.stdout)
            .lines()
            .chain(String::from_utf8_lossy(&output.stderr).lines())
            .map(str::to_string)
            .collect_vec();

        Ok(CommandOutput { exit_code, lines })
    }
}

/// Quotes a value for the shell, like `escapeshellarg`: always single-quoted,
/// embedded `'` become `'\''`.
pub fn escape_arg<S: AsRef<str>>(value: S) -> String {
    format!("'{}'", value.as_ref().replace('\'', "'\\''"))
}

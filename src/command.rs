// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Pre-install command handling.
//!
//! A project can ask tuck to run a few shell commands before its files get
//! installed, e.g., to build something or fetch a dependency. These commands
//! are declared in the `commands` list of the configuration file in one of
//! three shapes:
//!
//! ```json
//! "commands": [
//!     "make all",
//!     ["pip", "install", "-r", "requirements.txt"],
//!     {
//!         "name": "python deps",
//!         "command": ["pip", "install", "-r", "requirements.txt"],
//!         "command_user": ["pip", "install", "--user", "-r", "requirements.txt"]
//!     }
//! ]
//! ```
//!
//! Each declaration becomes a [`CommandDecl`] at parse time, and is resolved
//! into a plain [`Command`] once the install type is known.

use crate::report::Reporter;

use serde::Deserialize;
use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    process,
};

/// Single external command invocation.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Command {
    args: Vec<String>,
    name: Option<String>,
}

impl Command {
    /// Construct new command from argument listing and optional display name.
    pub fn new(args: impl IntoIterator<Item = impl Into<String>>, name: Option<String>) -> Self {
        Self {
            args: args.into_iter().map(Into::into).collect(),
            name,
        }
    }

    /// Argument listing, program name first.
    pub fn args(&self) -> &[String] {
        self.args.as_slice()
    }

    /// Display name given by configuration, if any.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Command has nothing to execute.
    pub fn is_empty(&self) -> bool {
        self.args.is_empty()
    }

    /// Execute command as a blocking subprocess.
    ///
    /// Returns the number of failures this invocation produced: 0 if the
    /// subprocess exits successfully, 1 if it exits with a non-zero status or
    /// cannot be spawned at all.
    pub fn run(&self) -> usize {
        let Some((program, args)) = self.args.split_first() else {
            return 1;
        };

        match process::Command::new(program).args(args).status() {
            Ok(status) if status.success() => 0,
            _ => 1,
        }
    }
}

impl Display for Command {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        match &self.name {
            Some(name) => write!(fmt, "{name} ({})", self.args.join(" ")),
            None => fmt.write_str(self.args.join(" ").as_str()),
        }
    }
}

/// Ordered listing of commands with a running failure count.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Commands {
    commands: Vec<Command>,
    failures: usize,
}

impl Commands {
    /// Normalize command declarations into runnable commands.
    ///
    /// Declarations that resolve to nothing to execute are dropped.
    pub fn new(decls: impl IntoIterator<Item = impl Into<CommandDecl>>, use_global: bool) -> Self {
        let commands = decls
            .into_iter()
            .map(|decl| decl.into().resolve(use_global))
            .filter(|command| !command.is_empty())
            .collect();

        Self {
            commands,
            failures: 0,
        }
    }

    /// Normalized commands in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &Command> {
        self.commands.iter()
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Total failures seen across every call to [`Commands::run`].
    pub fn failures(&self) -> usize {
        self.failures
    }

    /// Run every command in declared order.
    ///
    /// Never stops at the first failure. Each command is reported through
    /// `reporter` before it executes. In dry-run mode commands are reported
    /// but never executed.
    ///
    /// Returns running failure count.
    pub fn run(&mut self, reporter: &dyn Reporter, dry_run: bool) -> usize {
        for command in &self.commands {
            if dry_run {
                reporter.info(format!("would run: {command}").as_str());
                continue;
            }

            reporter.debug(format!("run: {command}").as_str());
            let failed = command.run();
            if failed > 0 {
                reporter.warn(format!("command failed: {command}").as_str());
            }
            self.failures += failed;
        }

        self.failures
    }
}

/// Command declaration as written in configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum CommandDecl {
    /// Explicit argument listing.
    Args(Vec<String>),

    /// Space separated command line.
    Line(String),

    /// Command with separate variants for global and per-user installs.
    Named {
        #[serde(default)]
        name: Option<String>,

        #[serde(default)]
        command: Option<CommandArgs>,

        #[serde(default)]
        command_user: Option<CommandArgs>,
    },

    /// Command already built by the caller.
    #[serde(skip_deserializing)]
    Ready(Command),
}

impl CommandDecl {
    /// Resolve declaration into a command.
    ///
    /// Named declarations pick `command_user` for per-user installs when it is
    /// present, otherwise `command`.
    pub fn resolve(self, use_global: bool) -> Command {
        match self {
            Self::Args(args) => Command::new(args, None),
            Self::Line(line) => Command::new(split_line(&line), None),
            Self::Named {
                name,
                command,
                command_user,
            } => {
                let chosen = match (use_global, command_user) {
                    (false, Some(user)) => Some(user),
                    _ => command,
                };
                let args = chosen.map(CommandArgs::into_args).unwrap_or_default();
                Command::new(args, name)
            }
            Self::Ready(command) => command,
        }
    }
}

impl From<Command> for CommandDecl {
    fn from(command: Command) -> Self {
        Self::Ready(command)
    }
}

impl From<Vec<String>> for CommandDecl {
    fn from(args: Vec<String>) -> Self {
        Self::Args(args)
    }
}

impl From<&str> for CommandDecl {
    fn from(line: &str) -> Self {
        Self::Line(line.into())
    }
}

/// Argument listing inside a named declaration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum CommandArgs {
    List(Vec<String>),
    Line(String),
}

impl CommandArgs {
    pub fn into_args(self) -> Vec<String> {
        match self {
            Self::List(args) => args,
            Self::Line(line) => split_line(&line),
        }
    }
}

fn split_line(line: &str) -> Vec<String> {
    line.split(' ')
        .filter(|arg| !arg.is_empty())
        .map(str::to_owned)
        .collect()
}

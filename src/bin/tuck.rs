// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

use tuck::{Installer, InstallerOptions, TracingReporter};

use anyhow::Result;
use clap::{ArgAction, Parser, Subcommand};
use std::{env, process::exit};
use tracing::error;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Debug, Clone, Parser)]
#[command(
    about,
    override_usage = "tuck [options] [<command>]",
    subcommand_help_heading = "Commands",
    disable_version_flag = true,
    version
)]
struct Cli {
    /// Print version.
    #[arg(short = 'v', long, action = ArgAction::Version)]
    version: (),

    /// Install into per-user directories, even when running as root.
    #[arg(short, long, global = true)]
    user: bool,

    /// Report what would happen without touching the file system.
    #[arg(short = 'D', long, global = true)]
    debug: bool,

    /// Install project of current directory when no command is given.
    #[command(subcommand)]
    command: Option<Command>,
}

impl Cli {
    fn run(self) -> Result<bool> {
        let workdir = env::current_dir()?;
        let self_file = env::current_exe()
            .ok()
            .and_then(|path| path.file_name().map(ToOwned::to_owned));

        let options = InstallerOptions {
            workdir,
            use_global: !self.user && nix::unistd::geteuid().is_root(),
            debug: self.debug,
            self_file,
            ..Default::default()
        };

        // INVARIANT: Installer already reported any error it returns.
        let Ok(mut installer) = Installer::new(options, TracingReporter) else {
            return Ok(false);
        };

        let success = match self.command {
            None => installer.install().is_ok(),
            Some(Command::Preinstall) => installer.pre_install() == 0,
            Some(Command::Uninstall) => installer.uninstall(),
        };

        Ok(success)
    }
}

#[derive(Debug, Clone, Subcommand)]
enum Command {
    /// Only run pre-install commands.
    #[command(override_usage = "tuck preinstall [options]")]
    Preinstall,

    /// Remove everything listed in manifest of previous install.
    #[command(override_usage = "tuck uninstall [options]", visible_alias = "remove")]
    Uninstall,
}

fn main() {
    let cli = Cli::parse();

    let level = if cli.debug { "debug" } else { "info" };
    let layer = fmt::layer()
        .compact()
        .with_target(false)
        .without_time();
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::registry()
        .with(layer)
        .with(filter)
        .init();

    match cli.run() {
        Ok(true) => exit(0),
        Ok(false) => exit(1),
        Err(error) => {
            error!("{error:?}");
            exit(1);
        }
    }
}

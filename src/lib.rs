// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Tuck project files into place.
//!
//! Tuck installs the files of a project directory into a destination
//! directory, either a per-user one under the home directory, or a
//! system-wide one. Executables get symlinked into a `bin` directory, and
//! optional pre-install commands can run first. Everything created gets
//! recorded in a manifest, so that an uninstall can remove it all again.
//!
//! Tuck is not a package manager. There is no dependency resolution, no
//! versioning, and no registry. It simply copies what it finds in the
//! project directory, and remembers what it did.

pub mod command;
pub mod config;
pub mod installer;
pub mod path;
pub mod report;

#[doc(inline)]
pub use crate::{
    command::{Command, CommandDecl, Commands},
    config::Config,
    installer::{InstallError, Installer, InstallerOptions},
    report::{Reporter, Silent, TracingReporter},
};

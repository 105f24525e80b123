// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Progress reporting.
//!
//! Tuck never requires anyone to listen to what it is doing. Every message
//! is handed to a [`Reporter`], and every method of that trait does nothing
//! by default. Callers pick how much they care: [`Silent`] drops everything,
//! [`TracingReporter`] forwards everything to [`tracing`].

use std::error::Error;
use tracing::{debug, error, info, warn};

/// Receive progress messages from installer operations.
///
/// Reporting is best-effort. Implementations must not assume that every
/// operation produces a message.
pub trait Reporter {
    /// Low-level detail, e.g., each command about to be executed.
    fn debug(&self, _message: &str) {}

    /// Normal progress, e.g., copied files, or dry-run operations.
    fn info(&self, _message: &str) {}

    /// Non-fatal problems, e.g., executable directory missing from `PATH`.
    fn warn(&self, _message: &str) {}

    /// Fatal error about to be returned to the caller.
    ///
    /// Called after cleanup of partial state has already happened.
    fn error(&self, _error: &dyn Error) {}
}

/// Reporter that discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct Silent;

impl Reporter for Silent {}

/// Reporter that forwards everything to [`tracing`] macros.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingReporter;

impl Reporter for TracingReporter {
    fn debug(&self, message: &str) {
        debug!("{message}");
    }

    fn info(&self, message: &str) {
        info!("{message}");
    }

    fn warn(&self, message: &str) {
        warn!("{message}");
    }

    fn error(&self, error: &dyn Error) {
        let mut message = error.to_string();
        let mut source = error.source();
        while let Some(cause) = source {
            message.push_str(format!("\n  caused by: {cause}").as_str());
            source = cause.source();
        }
        error!("{message}");
    }
}

// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Path resolution utilities.
//!
//! Determine where installed files and executable symlinks should go. Tuck
//! probes an ordered listing of well-known directories for each role, and
//! picks the first one that exists on the user's file system. Explicit paths
//! from configuration always win over probing.

use crate::config::PathsConfig;

use std::{
    env,
    ffi::OsString,
    path::{Path, PathBuf},
};

/// Ordered candidate directories for each installation role.
///
/// Per-user candidates are relative to the user's home directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Candidates {
    pub global_app: &'static [&'static str],
    pub global_exe: &'static [&'static str],
    pub user_app: &'static [&'static str],
    pub user_exe: &'static [&'static str],
}

/// Default candidate directory table.
pub const CANDIDATES: Candidates = Candidates {
    global_app: &["/usr/local/share", "/usr/share", "/opt"],
    global_exe: &["/usr/local/bin", "/usr/bin", "/bin"],
    user_app: &[".local/share", ".local/lib", "local/share"],
    user_exe: &[".local/bin", "bin", "local/bin"],
};

impl Default for Candidates {
    fn default() -> Self {
        CANDIDATES
    }
}

/// Role a resolved directory plays in an installation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Base directory that receives the project's top-level directory.
    App,

    /// Directory that receives executable symlinks.
    Exe,
}

impl std::fmt::Display for Role {
    fn fmt(&self, fmt: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::App => fmt.write_str("application"),
            Self::Exe => fmt.write_str("executable"),
        }
    }
}

/// Determine absolute path to user's home directory.
///
/// Tries the operating system's user database first, then `$HOME`, then
/// `/home/$USER`. Does not check if the path returned actually exists.
///
/// # Errors
///
/// - Return [`PathError::NoWayHome`] if none of the above are available.
pub fn home_dir() -> Result<PathBuf> {
    resolve_home(dirs::home_dir(), env::var_os("HOME"), env::var("USER").ok())
        .ok_or(PathError::NoWayHome)
}

fn resolve_home(
    database: Option<PathBuf>,
    home: Option<OsString>,
    user: Option<String>,
) -> Option<PathBuf> {
    database
        .filter(|path| !path.as_os_str().is_empty())
        .or_else(|| home.filter(|home| !home.is_empty()).map(PathBuf::from))
        .or_else(|| {
            user.filter(|user| !user.is_empty())
                .map(|user| Path::new("/home").join(user))
        })
}

/// Pick first candidate directory that exists.
///
/// Each candidate is joined onto `base` first when given.
pub fn choose_path(candidates: &[&str], base: Option<&Path>) -> Option<PathBuf> {
    candidates
        .iter()
        .map(|candidate| match base {
            Some(base) => base.join(candidate),
            None => PathBuf::from(candidate),
        })
        .find(|path| path.is_dir())
}

/// Expand user supplied path.
///
/// Performs tilde expansion relative to `home`, and environment variable
/// expansion. Relative results are treated as relative to `home`.
///
/// # Errors
///
/// - Return [`PathError::ShellExpansion`] if a referenced variable is unset.
pub fn expand_path(raw: &str, home: &Path) -> Result<PathBuf> {
    let expanded = shellexpand::full_with_context(raw, || home.to_str(), |var| {
        env::var(var).map(Some)
    })?;

    let path = PathBuf::from(expanded.as_ref());
    if path.is_relative() {
        return Ok(home.join(path));
    }

    Ok(path)
}

/// Resolve destination directories for an installation.
#[derive(Debug, Clone)]
pub struct PathResolver {
    candidates: Candidates,
    home: Option<PathBuf>,
    use_global: bool,
}

impl PathResolver {
    /// Construct new path resolver.
    ///
    /// A missing home directory only becomes an error once a per-user path,
    /// or a path needing tilde expansion, has to be resolved.
    pub fn new(candidates: Candidates, home: Option<PathBuf>, use_global: bool) -> Self {
        Self {
            candidates,
            home,
            use_global,
        }
    }

    pub fn use_global(&self) -> bool {
        self.use_global
    }

    /// Home directory this resolver works with.
    ///
    /// # Errors
    ///
    /// - Return [`PathError::NoWayHome`] if home directory was not resolved.
    pub fn home(&self) -> Result<&Path> {
        self.home.as_deref().ok_or(PathError::NoWayHome)
    }

    /// Resolve base application directory.
    ///
    /// Uses `install_base` from configuration if set, otherwise probes
    /// candidates for current install type.
    ///
    /// # Errors
    ///
    /// - Return [`PathError::NoCandidate`] if no candidate exists.
    /// - Return [`PathError::NoWayHome`] if home directory is needed but
    ///   unknown.
    /// - Return [`PathError::ShellExpansion`] if override cannot be expanded.
    pub fn app_base(&self, paths: &PathsConfig) -> Result<PathBuf> {
        self.resolve(Role::App, paths.install_base.as_deref())
    }

    /// Resolve executable directory.
    ///
    /// Uses `exe_base` from configuration if set, otherwise probes
    /// candidates for current install type.
    ///
    /// # Errors
    ///
    /// - Return [`PathError::NoCandidate`] if no candidate exists.
    /// - Return [`PathError::NoWayHome`] if home directory is needed but
    ///   unknown.
    /// - Return [`PathError::ShellExpansion`] if override cannot be expanded.
    pub fn exe_dir(&self, paths: &PathsConfig) -> Result<PathBuf> {
        self.resolve(Role::Exe, paths.exe_base.as_deref())
    }

    fn resolve(&self, role: Role, explicit: Option<&str>) -> Result<PathBuf> {
        if let Some(raw) = explicit.filter(|raw| !raw.trim().is_empty()) {
            return expand_path(raw, self.home()?);
        }

        let found = match (role, self.use_global) {
            (Role::App, true) => choose_path(self.candidates.global_app, None),
            (Role::Exe, true) => choose_path(self.candidates.global_exe, None),
            (Role::App, false) => choose_path(self.candidates.user_app, Some(self.home()?)),
            (Role::Exe, false) => choose_path(self.candidates.user_exe, Some(self.home()?)),
        };

        found.ok_or(PathError::NoCandidate {
            role,
            scope: if self.use_global { "global" } else { "local" },
        })
    }
}

/// Path resolution error types.
#[derive(Debug, thiserror::Error)]
pub enum PathError {
    /// No way to determine user's home directory.
    #[error("cannot determine absolute path to user's home directory")]
    NoWayHome,

    /// None of the candidate directories exist.
    #[error("no {role} directory found for {scope} installation")]
    NoCandidate { role: Role, scope: &'static str },

    /// Failed to perform shell expansion on configured path.
    #[error(transparent)]
    ShellExpansion(#[from] shellexpand::LookupError<env::VarError>),
}

/// Friendly result alias :3
pub type Result<T, E = PathError> = std::result::Result<T, E>;

// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! File discovery.
//!
//! Figure out which files of the working directory get installed, where
//! each one lands, and which of them are executables that deserve a symlink.

use crate::{config::Patterns, installer::manifest::MANIFEST_FILE};

use ignore::WalkBuilder;
use std::{
    ffi::OsStr,
    fs::read_dir,
    os::unix::fs::PermissionsExt,
    path::{Path, PathBuf},
};

/// Source file paired with its installation destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilePair {
    /// Path relative to working directory.
    pub source: PathBuf,

    /// Path inside installation directory.
    pub destination: PathBuf,
}

/// Selects files of a working directory for installation.
#[derive(Debug, Clone)]
pub struct FileSelector<'a> {
    workdir: &'a Path,
    patterns: &'a Patterns,
    self_file: Option<&'a OsStr>,
    recurse: bool,
}

impl<'a> FileSelector<'a> {
    /// Construct new file selector.
    ///
    /// The `self_file` names the installer's own file at the top of
    /// `workdir`. It is always selected, no matter what the patterns say.
    pub fn new(
        workdir: &'a Path,
        patterns: &'a Patterns,
        self_file: Option<&'a OsStr>,
        recurse: bool,
    ) -> Self {
        Self {
            workdir,
            patterns,
            self_file,
            recurse,
        }
    }

    /// List selected files relative to working directory, sorted.
    ///
    /// # Errors
    ///
    /// - Return [`DiscoverError::ReadDir`] if top level cannot be listed.
    /// - Return [`DiscoverError::Walk`] if recursive walk fails.
    pub fn discover(&self) -> Result<Vec<PathBuf>> {
        let mut files = if self.recurse {
            self.walk_tree()?
        } else {
            self.walk_top_level()?
        };

        files.retain(|path| self.is_selected(path));
        files.sort();

        Ok(files)
    }

    /// Pair selected files with destinations under `install_dir`.
    ///
    /// # Errors
    ///
    /// - Return any error of [`FileSelector::discover`].
    pub fn file_pairs(&self, install_dir: &Path) -> Result<Vec<FilePair>> {
        Ok(self
            .discover()?
            .into_iter()
            .map(|source| FilePair {
                destination: install_dir.join(&source),
                source,
            })
            .collect())
    }

    /// Pick executables out of `pairs`, returning their destinations.
    ///
    /// Explicit executable names match by suffix of the destination path. No
    /// explicit names means guessing: files with an execute bit win. If there
    /// are none, fall back to extensionless or `.py` files that are not
    /// private, i.e., do not start with an underscore. Guessing never picks
    /// the installer's own file.
    pub fn select_executables(&self, pairs: &[FilePair], explicit: &[String]) -> Vec<PathBuf> {
        if !explicit.is_empty() {
            return pairs
                .iter()
                .filter(|pair| {
                    let destination = pair.destination.to_string_lossy();
                    explicit
                        .iter()
                        .any(|name| destination.ends_with(name.as_str()))
                })
                .map(|pair| pair.destination.clone())
                .collect();
        }

        let candidates: Vec<&FilePair> = pairs
            .iter()
            .filter(|pair| !self.is_self_file(&pair.source))
            .collect();

        let executable: Vec<PathBuf> = candidates
            .iter()
            .filter(|pair| is_executable(&self.workdir.join(&pair.source)))
            .map(|pair| pair.destination.clone())
            .collect();
        if !executable.is_empty() {
            return executable;
        }

        candidates
            .iter()
            .filter(|pair| looks_like_script(&pair.source))
            .map(|pair| pair.destination.clone())
            .collect()
    }

    fn walk_top_level(&self) -> Result<Vec<PathBuf>> {
        let entries = read_dir(self.workdir).map_err(|err| DiscoverError::ReadDir {
            source: err,
            path: self.workdir.to_path_buf(),
        })?;

        let mut files = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|err| DiscoverError::ReadDir {
                source: err,
                path: self.workdir.to_path_buf(),
            })?;

            if entry.path().is_file() {
                files.push(PathBuf::from(entry.file_name()));
            }
        }

        Ok(files)
    }

    fn walk_tree(&self) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        let walker = WalkBuilder::new(self.workdir)
            .standard_filters(false)
            .build();

        for entry in walker {
            let entry = entry?;
            if !entry.file_type().is_some_and(|kind| kind.is_file()) {
                continue;
            }

            if let Ok(relative) = entry.path().strip_prefix(self.workdir) {
                files.push(relative.to_path_buf());
            }
        }

        Ok(files)
    }

    fn is_selected(&self, path: &Path) -> bool {
        if self.is_self_file(path) {
            return true;
        }

        // INVARIANT: Manifest is written separately, never installed as a
        // regular file.
        if path == Path::new(MANIFEST_FILE) {
            return false;
        }

        let path = path.to_string_lossy();
        self.patterns.is_included(&path) && !self.patterns.is_excluded(&path)
    }

    fn is_self_file(&self, path: &Path) -> bool {
        self.self_file
            .is_some_and(|self_file| path.as_os_str() == self_file)
    }
}

fn is_executable(path: &Path) -> bool {
    path.metadata()
        .map(|metadata| metadata.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

fn looks_like_script(path: &Path) -> bool {
    let private = path
        .file_name()
        .is_some_and(|name| name.to_string_lossy().starts_with('_'));
    let scriptish = match path.extension() {
        None => true,
        Some(extension) => extension == "py",
    };

    scriptish && !private
}

/// File discovery error types.
#[derive(Debug, thiserror::Error)]
pub enum DiscoverError {
    /// Working directory cannot be listed.
    #[error("failed to list directory {:?}", path.display())]
    ReadDir {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Recursive walk over working directory fails.
    #[error(transparent)]
    Walk(#[from] ignore::Error),
}

/// Friendly result alias :3
pub type Result<T, E = DiscoverError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PathsConfig;
    use pretty_assertions::assert_eq;
    use std::fs::{create_dir_all, set_permissions, write, Permissions};

    fn project(files: &[(&str, u32)]) -> anyhow::Result<tempfile::TempDir> {
        let dir = tempfile::tempdir()?;
        for (name, mode) in files {
            let path = dir.path().join(name);
            if let Some(parent) = path.parent() {
                create_dir_all(parent)?;
            }
            write(&path, name.as_bytes())?;
            set_permissions(&path, Permissions::from_mode(*mode))?;
        }
        Ok(dir)
    }

    fn patterns(files: &[&str], excludes: &[&str]) -> anyhow::Result<Patterns> {
        Ok(PathsConfig {
            files: files.iter().map(|s| s.to_string()).collect(),
            excludes: excludes.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        }
        .patterns()?)
    }

    #[test]
    fn discover_top_level_only() -> anyhow::Result<()> {
        let dir = project(&[
            ("script.py", 0o755),
            ("README.md", 0o644),
            ("sub/inner.txt", 0o644),
            (MANIFEST_FILE, 0o644),
        ])?;
        let patterns = patterns(&[], &[])?;

        let selector = FileSelector::new(dir.path(), &patterns, None, false);
        let result = selector.discover()?;
        let expect = vec![PathBuf::from("README.md"), "script.py".into()];
        assert_eq!(result, expect);

        Ok(())
    }

    #[test]
    fn discover_recursive_includes_hidden() -> anyhow::Result<()> {
        let dir = project(&[
            ("script.py", 0o755),
            (".hidden", 0o644),
            ("sub/deeper/inner.txt", 0o644),
        ])?;
        let patterns = patterns(&[], &[])?;

        let selector = FileSelector::new(dir.path(), &patterns, None, true);
        let result = selector.discover()?;
        let expect = vec![
            PathBuf::from(".hidden"),
            "script.py".into(),
            "sub/deeper/inner.txt".into(),
        ];
        assert_eq!(result, expect);

        Ok(())
    }

    #[test]
    fn self_file_survives_include_and_exclude() -> anyhow::Result<()> {
        let dir = project(&[
            ("install", 0o755),
            ("script.py", 0o755),
            ("README.md", 0o644),
            ("notes.md", 0o644),
        ])?;
        let patterns = patterns(&["\\.py$", "\\.md$"], &["\\.md$", "^install$"])?;
        let self_file = OsStr::new("install");

        let selector = FileSelector::new(dir.path(), &patterns, Some(self_file), false);
        let result = selector.discover()?;
        let expect = vec![PathBuf::from("install"), "script.py".into()];
        assert_eq!(result, expect);

        Ok(())
    }

    #[test]
    fn file_pairs_land_under_install_dir() -> anyhow::Result<()> {
        let dir = project(&[("a.txt", 0o644), ("sub/b.txt", 0o644)])?;
        let patterns = patterns(&[], &[])?;

        let selector = FileSelector::new(dir.path(), &patterns, None, true);
        let result = selector.file_pairs(Path::new("/opt/blah"))?;
        let expect = vec![
            FilePair {
                source: "a.txt".into(),
                destination: "/opt/blah/a.txt".into(),
            },
            FilePair {
                source: "sub/b.txt".into(),
                destination: "/opt/blah/sub/b.txt".into(),
            },
        ];
        assert_eq!(result, expect);

        Ok(())
    }

    #[test]
    fn executables_prefer_execute_bit() -> anyhow::Result<()> {
        let dir = project(&[
            ("install", 0o755),
            ("script.py", 0o755),
            ("tool", 0o644),
            ("README.md", 0o644),
        ])?;
        let patterns = patterns(&[], &[])?;
        let selector =
            FileSelector::new(dir.path(), &patterns, Some(OsStr::new("install")), false);
        let pairs = selector.file_pairs(Path::new("/opt/blah"))?;

        let result = selector.select_executables(&pairs, &[]);
        assert_eq!(result, vec![PathBuf::from("/opt/blah/script.py")]);

        Ok(())
    }

    #[test]
    fn executables_fall_back_to_script_names() -> anyhow::Result<()> {
        let dir = project(&[
            ("install", 0o755),
            ("main.py", 0o644),
            ("_helpers.py", 0o644),
            ("tool", 0o644),
            ("README.md", 0o644),
        ])?;
        let patterns = patterns(&[], &[])?;
        let selector =
            FileSelector::new(dir.path(), &patterns, Some(OsStr::new("install")), false);
        let pairs = selector.file_pairs(Path::new("/opt/blah"))?;

        // The installer's execute bit does not count.
        let result = selector.select_executables(&pairs, &[]);
        let expect = vec![PathBuf::from("/opt/blah/main.py"), "/opt/blah/tool".into()];
        assert_eq!(result, expect);

        Ok(())
    }

    #[test]
    fn executables_honor_explicit_names() -> anyhow::Result<()> {
        let dir = project(&[("main.py", 0o755), ("sub/run.sh", 0o644)])?;
        let patterns = patterns(&[], &[])?;
        let selector = FileSelector::new(dir.path(), &patterns, None, true);
        let pairs = selector.file_pairs(Path::new("/opt/blah"))?;

        let result = selector.select_executables(&pairs, &["run.sh".into()]);
        assert_eq!(result, vec![PathBuf::from("/opt/blah/sub/run.sh")]);

        Ok(())
    }
}

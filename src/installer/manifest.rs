// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Installation manifest handling.
//!
//! Every path an install run creates gets recorded, so a later uninstall can
//! remove exactly what was put there and nothing else. The record is kept in
//! memory as a [`CreatedFiles`] set, and persisted as a __manifest__: a plain
//! text file holding one path per line, sorted, newline terminated.
//!
//! # Manifest Locations
//!
//! The manifest is written to `installed_files.txt` in the working directory
//! the install ran from. A copy is placed inside the installation directory
//! itself, so an uninstall can be started from either place.

use std::{
    collections::HashSet,
    fmt::{Display, Formatter, Result as FmtResult},
    fs::{read_to_string, write},
    io,
    path::{Path, PathBuf},
};

/// Name of manifest file.
pub const MANIFEST_FILE: &str = "installed_files.txt";

/// Set of paths created by current run.
///
/// # Invariant
///
/// - No duplicate paths.
/// - Only grows. Nothing is ever removed from the set.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CreatedFiles {
    paths: HashSet<PathBuf>,
}

impl CreatedFiles {
    /// Construct new empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a created path.
    pub fn insert(&mut self, path: impl Into<PathBuf>) {
        self.paths.insert(path.into());
    }

    pub fn contains(&self, path: impl AsRef<Path>) -> bool {
        self.paths.contains(path.as_ref())
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /// Recorded paths in sorted order.
    pub fn sorted(&self) -> Vec<PathBuf> {
        let mut paths: Vec<_> = self.paths.iter().cloned().collect();
        paths.sort();
        paths
    }

    /// Persist set as manifest file at `path`.
    ///
    /// # Errors
    ///
    /// - Return [`io::Error`] if manifest cannot be written.
    pub fn write_manifest(&self, path: impl AsRef<Path>) -> io::Result<()> {
        write(path.as_ref(), self.to_string().as_bytes())
    }
}

impl Display for CreatedFiles {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        for path in self.sorted() {
            writeln!(fmt, "{}", path.display())?;
        }

        Ok(())
    }
}

impl From<&str> for CreatedFiles {
    fn from(content: &str) -> Self {
        let paths = content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(PathBuf::from)
            .collect::<HashSet<_>>();

        Self { paths }
    }
}

/// Read manifest file at `path`.
///
/// Blank lines are ignored. Paths are returned sorted.
///
/// # Errors
///
/// - Return [`io::Error`] if manifest cannot be read, including the
///   [`io::ErrorKind::NotFound`] case that callers usually want to handle.
pub fn read_manifest(path: impl AsRef<Path>) -> io::Result<Vec<PathBuf>> {
    let content = read_to_string(path.as_ref())?;
    Ok(CreatedFiles::from(content.as_str()).sorted())
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;
    use pretty_assertions::assert_eq;

    #[test]
    fn created_files_are_sorted_and_unique() {
        let mut created = CreatedFiles::new();
        created.insert("/opt/blah/script.py");
        created.insert("/usr/local/bin/script");
        created.insert("/opt/blah");
        created.insert("/opt/blah/README.md");
        created.insert("/opt/blah");

        let expect = indoc! {r#"
            /opt/blah
            /opt/blah/README.md
            /opt/blah/script.py
            /usr/local/bin/script
        "#};
        assert_eq!(created.to_string(), expect);
        assert_eq!(created.len(), 4);
        assert!(created.contains("/opt/blah"));
    }

    #[test]
    fn empty_set_writes_empty_manifest() {
        assert_eq!(CreatedFiles::new().to_string(), "");
    }

    #[test]
    fn manifest_round_trips_through_disk() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join(MANIFEST_FILE);

        let created = CreatedFiles::from("/b\n\n/a\n/c\n");
        created.write_manifest(&path)?;

        let result = read_manifest(&path)?;
        let expect = vec![PathBuf::from("/a"), "/b".into(), "/c".into()];
        assert_eq!(result, expect);
        assert_eq!(read_to_string(&path)?, "/a\n/b\n/c\n");

        Ok(())
    }

    #[test]
    fn missing_manifest_is_not_found() {
        let result = read_manifest("/tuck-no-such-dir/installed_files.txt");
        assert!(matches!(result, Err(error) if error.kind() == io::ErrorKind::NotFound));
    }
}

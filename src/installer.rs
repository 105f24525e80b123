// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Install and uninstall transactions.
//!
//! An __install__ copies the selected files of a working directory into an
//! installation directory, symlinks executables into an executable
//! directory, and writes a manifest of everything it created. An
//! __uninstall__ replays that manifest, and removes every path listed in it.
//!
//! # Failure Handling
//!
//! Install is all or nothing, as best as a file system allows. Every created
//! path is recorded the moment it is created. If anything fatal happens half
//! way through, everything recorded so far is removed again before the error
//! is reported and returned. Removal itself is best-effort: a path that
//! cannot be removed is reported, and removal continues with the next one.
//!
//! # Dry Run
//!
//! In debug mode nothing on the file system is touched. Every operation that
//! would mutate something is reported instead, and its path is still
//! recorded, so that reporting shows the full picture of what would happen.

pub mod discover;
pub mod manifest;

use crate::{
    command::Commands,
    config::{Config, ConfigError, Patterns, CONFIG_FILE},
    installer::{
        discover::{DiscoverError, FilePair, FileSelector},
        manifest::{read_manifest, CreatedFiles, MANIFEST_FILE},
    },
    path::{home_dir, Candidates, PathError, PathResolver},
    report::{Reporter, TracingReporter},
};

use nix::unistd::{access, AccessFlags};
use std::{
    collections::HashSet,
    env,
    ffi::OsString,
    fs::{self, File, FileTimes},
    io,
    os::unix::fs::{symlink, MetadataExt},
    path::{self, Path, PathBuf},
};
use tracing::instrument;

/// Options controlling an [`Installer`].
#[derive(Debug, Default, Clone)]
pub struct InstallerOptions {
    /// Directory holding project files, and configuration file.
    pub workdir: PathBuf,

    /// Caller preference for global install. Configuration may override it.
    pub use_global: bool,

    /// Report operations instead of performing them.
    pub debug: bool,

    /// File name of the installer itself at top of working directory.
    pub self_file: Option<OsString>,

    /// Home directory to use instead of resolving it.
    pub home: Option<PathBuf>,

    /// Candidate directories to probe. Defaults to [`crate::path::CANDIDATES`].
    pub candidates: Candidates,
}

impl InstallerOptions {
    /// Construct new options for working directory.
    pub fn new(workdir: impl Into<PathBuf>) -> Self {
        Self {
            workdir: workdir.into(),
            ..Default::default()
        }
    }
}

/// Local installation utility.
#[derive(Debug)]
pub struct Installer<R = TracingReporter>
where
    R: Reporter,
{
    workdir: PathBuf,
    config: Config,
    patterns: Patterns,
    commands: Commands,
    resolver: PathResolver,
    self_file: Option<OsString>,
    debug: bool,
    created: CreatedFiles,
    planned_dirs: HashSet<PathBuf>,
    reporter: R,
}

impl<R> Installer<R>
where
    R: Reporter,
{
    /// Construct new installer.
    ///
    /// Loads configuration from the working directory, compiles its
    /// patterns, and resolves install type and pre-install commands.
    ///
    /// # Errors
    ///
    /// - Return [`InstallError::Config`] if configuration is invalid.
    ///
    /// Errors are passed to `reporter` before being returned.
    pub fn new(options: InstallerOptions, reporter: R) -> Result<Self> {
        let config = match Config::load(options.workdir.join(CONFIG_FILE)) {
            Ok(config) => config,
            Err(error) => return Err(report(&reporter, error.into())),
        };
        let patterns = match config.paths.patterns() {
            Ok(patterns) => patterns,
            Err(error) => return Err(report(&reporter, error.into())),
        };

        let use_global = config.use_global(options.use_global);
        let home = options.home.or_else(|| home_dir().ok());
        let resolver = PathResolver::new(options.candidates, home, use_global);
        let commands = Commands::new(config.commands.clone(), use_global);

        // INVARIANT: Installer file only counts if it actually lives at the
        // top of the working directory.
        let self_file = options
            .self_file
            .filter(|name| options.workdir.join(name).is_file());

        Ok(Self {
            workdir: options.workdir,
            config,
            patterns,
            commands,
            resolver,
            self_file,
            debug: options.debug,
            created: CreatedFiles::new(),
            planned_dirs: HashSet::new(),
            reporter,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn reporter(&self) -> &R {
        &self.reporter
    }

    /// Paths created so far by this installer.
    pub fn created_files(&self) -> &CreatedFiles {
        &self.created
    }

    pub fn is_global(&self) -> bool {
        self.resolver.use_global()
    }

    /// Path of manifest file in working directory.
    pub fn manifest_path(&self) -> PathBuf {
        self.workdir.join(MANIFEST_FILE)
    }

    /// Resolve installation directory.
    ///
    /// This is the project's top-level directory inside the resolved
    /// application base directory.
    ///
    /// # Errors
    ///
    /// - Return [`InstallError::Path`] if base directory cannot be resolved.
    pub fn install_dir(&self) -> Result<PathBuf> {
        let base = self.resolver.app_base(&self.config.paths)?;
        let toplevel = match self.config.paths.toplevel.as_deref() {
            Some(toplevel) if !toplevel.trim().is_empty() => OsString::from(toplevel),
            _ => self.workdir_name()?,
        };

        Ok(absolute(base.join(toplevel)))
    }

    /// Resolve directory receiving executable symlinks.
    ///
    /// # Errors
    ///
    /// - Return [`InstallError::Path`] if directory cannot be resolved.
    pub fn exe_dir(&self) -> Result<PathBuf> {
        Ok(absolute(self.resolver.exe_dir(&self.config.paths)?))
    }

    /// Run pre-install commands.
    ///
    /// Returns total failure count.
    pub fn pre_install(&mut self) -> usize {
        if self.commands.is_empty() {
            self.reporter.debug("no pre-install commands to run");
            return 0;
        }

        self.commands.run(&self.reporter, self.debug)
    }

    /// Run pre-install commands, then install files.
    ///
    /// # Errors
    ///
    /// - Return [`InstallError::Commands`] if any pre-install command fails.
    /// - Return any error of [`Installer::install_files`].
    pub fn install(&mut self) -> Result<()> {
        let failures = self.pre_install();
        if failures > 0 {
            return Err(self.fail(InstallError::Commands { failures }));
        }

        self.install_files()
    }

    /// Copy files, symlink executables, and write manifest.
    ///
    /// Partial state is cleaned up on failure.
    ///
    /// # Errors
    ///
    /// - Return [`InstallError`] describing the first fatal failure.
    #[instrument(skip(self), level = "debug")]
    pub fn install_files(&mut self) -> Result<()> {
        match self.try_install_files() {
            Ok(()) => Ok(()),
            Err(error) => Err(self.fail(error)),
        }
    }

    /// Remove everything listed in manifest of working directory.
    ///
    /// Returns true if everything was removed. A missing manifest means
    /// nothing was removed, which counts as failure.
    #[instrument(skip(self), level = "debug")]
    pub fn uninstall(&mut self) -> bool {
        let manifest = self.manifest_path();
        let paths = match read_manifest(&manifest) {
            Ok(paths) => paths,
            Err(error) if error.kind() == io::ErrorKind::NotFound => {
                self.reporter.warn("no files to remove");
                return false;
            }
            Err(error) => {
                self.reporter.warn(
                    format!("cannot read manifest {}: {error}", manifest.display()).as_str(),
                );
                return false;
            }
        };

        let mut failures = remove_paths(paths, self.debug, &self.reporter);
        failures += remove_paths([manifest], self.debug, &self.reporter);

        if failures > 0 {
            self.reporter
                .warn(format!("failed to remove {failures} path(s)").as_str());
            return false;
        }

        true
    }

    /// Remove every path created so far.
    ///
    /// Returns number of paths that could not be removed.
    pub fn cleanup(&mut self) -> usize {
        if self.created.is_empty() {
            return 0;
        }

        self.reporter.info("cleaning up partial installation");
        remove_paths(self.created.sorted(), self.debug, &self.reporter)
    }

    fn try_install_files(&mut self) -> Result<()> {
        let exe_dir = self.exe_dir()?;
        let install_dir = self.install_dir()?;
        self.ensure_install_dir(&install_dir)?;

        let pairs = self.selector().file_pairs(&install_dir)?;
        for pair in &pairs {
            if let Some(parent) = pair.destination.parent() {
                self.ensure_dir(parent)?;
            }
            self.copy_file(pair)?;
        }

        let executables = self
            .selector()
            .select_executables(&pairs, &self.config.paths.executables);
        for executable in &executables {
            self.link_executable(executable, &exe_dir)?;
        }
        if !executables.is_empty() {
            self.check_search_path(&exe_dir);
        }

        self.write_manifests(&install_dir)
    }

    fn selector(&self) -> FileSelector<'_> {
        FileSelector::new(
            &self.workdir,
            &self.patterns,
            self.self_file.as_deref(),
            self.config.paths.recurse,
        )
    }

    fn workdir_name(&self) -> Result<OsString> {
        absolute(self.workdir.clone())
            .file_name()
            .map(ToOwned::to_owned)
            .ok_or_else(|| InstallError::NoToplevel {
                path: self.workdir.clone(),
            })
    }

    fn ensure_install_dir(&mut self, install_dir: &Path) -> Result<()> {
        // INVARIANT: Top-level directory belongs to the project, so it is
        // recorded even when a previous install already created it.
        if install_dir.is_dir() {
            self.created.insert(install_dir);
            return Ok(());
        }

        let ancestor = existing_ancestor(install_dir);
        if access(ancestor.as_path(), AccessFlags::W_OK).is_err() {
            let error = InstallError::NotWritable { path: ancestor };
            if !self.debug {
                return Err(error);
            }
            self.reporter.warn(error.to_string().as_str());
        }

        self.ensure_dir(install_dir)
    }

    fn ensure_dir(&mut self, dir: &Path) -> Result<()> {
        if dir.is_dir() {
            return Ok(());
        }

        if self.debug {
            if !self.planned_dirs.insert(dir.to_path_buf()) {
                return Ok(());
            }
            self.reporter
                .info(format!("would create directory {}", dir.display()).as_str());
            self.created.insert(first_missing(dir));
            return Ok(());
        }

        let created = mkdirp::mkdirp(dir).map_err(|err| InstallError::CreateDir {
            source: err,
            path: dir.to_path_buf(),
        })?;
        if let Some(created) = created {
            self.reporter
                .debug(format!("created directory {}", created.display()).as_str());
            self.created.insert(created);
        }

        Ok(())
    }

    fn copy_file(&mut self, pair: &FilePair) -> Result<()> {
        let source = self.workdir.join(&pair.source);

        // INVARIANT: Copying a file onto itself truncates it.
        if same_file(&source, &pair.destination) {
            self.reporter
                .debug(format!("{} already in place", pair.destination.display()).as_str());
            self.created.insert(&pair.destination);
            return Ok(());
        }

        if self.debug {
            self.reporter.info(
                format!(
                    "would copy {} to {}",
                    source.display(),
                    pair.destination.display()
                )
                .as_str(),
            );
            self.created.insert(&pair.destination);
            return Ok(());
        }

        copy_preserving(&source, &pair.destination).map_err(|err| InstallError::Copy {
            source: err,
            from: source.clone(),
            to: pair.destination.clone(),
        })?;
        self.reporter
            .info(format!("copied {}", pair.destination.display()).as_str());
        self.created.insert(&pair.destination);

        Ok(())
    }

    fn link_executable(&mut self, executable: &Path, exe_dir: &Path) -> Result<()> {
        let Some(stem) = executable.file_stem() else {
            return Ok(());
        };
        let link = exe_dir.join(stem);
        let existing = fs::symlink_metadata(&link).ok();

        if let Some(metadata) = &existing {
            if !metadata.file_type().is_symlink() {
                return Err(InstallError::LinkConflict { path: link });
            }
        }

        if self.debug {
            self.reporter.info(
                format!(
                    "would link {} to {}",
                    link.display(),
                    executable.display()
                )
                .as_str(),
            );
            self.created.insert(link);
            return Ok(());
        }

        if existing.is_some() {
            fs::remove_file(&link).map_err(|err| InstallError::Link {
                source: err,
                link: link.clone(),
                target: executable.to_path_buf(),
            })?;
        }

        symlink(executable, &link).map_err(|err| InstallError::Link {
            source: err,
            link: link.clone(),
            target: executable.to_path_buf(),
        })?;
        self.reporter.info(
            format!("linked {} to {}", link.display(), executable.display()).as_str(),
        );
        self.created.insert(link);

        Ok(())
    }

    fn check_search_path(&self, exe_dir: &Path) {
        let on_path = env::var_os("PATH")
            .map(|paths| env::split_paths(&paths).any(|path| path == exe_dir))
            .unwrap_or(false);

        if !on_path {
            self.reporter.warn(
                format!(
                    "{} is not in PATH, installed executables will not be found",
                    exe_dir.display()
                )
                .as_str(),
            );
        }
    }

    fn write_manifests(&self, install_dir: &Path) -> Result<()> {
        let manifest = self.manifest_path();
        let copy = install_dir.join(MANIFEST_FILE);

        if self.debug {
            self.reporter.info(
                format!("would write manifest:\n{}", self.created).trim_end(),
            );
            return Ok(());
        }

        self.created
            .write_manifest(&manifest)
            .map_err(|err| InstallError::Manifest {
                source: err,
                path: manifest.clone(),
            })?;

        if absolute(manifest.clone()) != absolute(copy.clone()) {
            fs::copy(&manifest, &copy).map_err(|err| InstallError::Manifest {
                source: err,
                path: copy.clone(),
            })?;
        }
        self.reporter
            .info(format!("wrote manifest {}", manifest.display()).as_str());

        Ok(())
    }

    fn fail(&mut self, error: InstallError) -> InstallError {
        self.cleanup();
        report(&self.reporter, error)
    }
}

fn report(reporter: &impl Reporter, error: InstallError) -> InstallError {
    reporter.error(&error);
    error
}

/// Remove paths, directories recursively.
///
/// Paths that no longer exist are skipped silently. A dry run reports every
/// path, since a dry-run install never created any of them. Returns number
/// of paths that could not be removed.
pub fn remove_paths(
    paths: impl IntoIterator<Item = PathBuf>,
    dry_run: bool,
    reporter: &dyn Reporter,
) -> usize {
    let mut paths: Vec<PathBuf> = paths.into_iter().collect();
    paths.sort();

    let mut failures = 0;
    for path in paths {
        if dry_run {
            reporter.info(format!("would remove {}", path.display()).as_str());
            continue;
        }

        // INVARIANT: Do not follow symlinks, remove the link itself.
        let Ok(metadata) = fs::symlink_metadata(&path) else {
            continue;
        };

        let result = if metadata.is_dir() {
            fs::remove_dir_all(&path)
        } else {
            fs::remove_file(&path)
        };

        match result {
            Ok(()) => reporter.info(format!("removed {}", path.display()).as_str()),
            Err(error) if error.kind() == io::ErrorKind::NotFound => {}
            Err(error) => {
                reporter.warn(format!("cannot remove {}: {error}", path.display()).as_str());
                failures += 1;
            }
        }
    }

    failures
}

fn same_file(lhs: &Path, rhs: &Path) -> bool {
    match (fs::metadata(lhs), fs::metadata(rhs)) {
        (Ok(lhs), Ok(rhs)) => lhs.dev() == rhs.dev() && lhs.ino() == rhs.ino(),
        _ => false,
    }
}

fn copy_preserving(from: &Path, to: &Path) -> io::Result<()> {
    let metadata = fs::metadata(from)?;
    fs::copy(from, to)?;

    let mut times = FileTimes::new();
    if let Ok(accessed) = metadata.accessed() {
        times = times.set_accessed(accessed);
    }
    if let Ok(modified) = metadata.modified() {
        times = times.set_modified(modified);
    }
    // INVARIANT: Owner may set times through a read-only handle, so read-only
    // copies work too.
    File::open(to)?.set_times(times)
}

fn absolute(target: PathBuf) -> PathBuf {
    path::absolute(&target).unwrap_or(target)
}

fn existing_ancestor(path: &Path) -> PathBuf {
    path.ancestors()
        .find(|ancestor| ancestor.exists())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("/"))
}

fn first_missing(path: &Path) -> PathBuf {
    path.ancestors()
        .take_while(|ancestor| !ancestor.as_os_str().is_empty() && !ancestor.exists())
        .last()
        .unwrap_or(path)
        .to_path_buf()
}

/// Installer error types.
#[derive(Debug, thiserror::Error)]
pub enum InstallError {
    /// Configuration cannot be loaded.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Destination directory cannot be resolved.
    #[error(transparent)]
    Path(#[from] PathError),

    /// Working directory cannot be scanned.
    #[error(transparent)]
    Discover(#[from] DiscoverError),

    /// Working directory has no name to use as top-level directory.
    #[error("cannot determine top-level directory name from {:?}", path.display())]
    NoToplevel { path: PathBuf },

    /// Pre-install commands failed.
    #[error("{failures} pre-install command(s) failed")]
    Commands { failures: usize },

    /// Installation directory cannot be created due to permissions.
    #[error("no write permission for {:?}", path.display())]
    NotWritable { path: PathBuf },

    /// Directory cannot be created.
    #[error("failed to create directory {:?}", path.display())]
    CreateDir {
        #[source]
        source: io::Error,
        path: PathBuf,
    },

    /// File cannot be copied.
    #[error("failed to copy {:?} to {:?}", from.display(), to.display())]
    Copy {
        #[source]
        source: io::Error,
        from: PathBuf,
        to: PathBuf,
    },

    /// Something other than a symlink sits where an executable link goes.
    #[error("refusing to replace {:?} with a symlink", path.display())]
    LinkConflict { path: PathBuf },

    /// Symlink cannot be created.
    #[error("failed to link {:?} to {:?}", link.display(), target.display())]
    Link {
        #[source]
        source: io::Error,
        link: PathBuf,
        target: PathBuf,
    },

    /// Manifest cannot be written.
    #[error("failed to write manifest {:?}", path.display())]
    Manifest {
        #[source]
        source: io::Error,
        path: PathBuf,
    },
}

/// Friendly result alias :3
pub type Result<T, E = InstallError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::Silent;
    use pretty_assertions::assert_eq;
    use std::fs::{create_dir_all, write};

    #[test]
    fn remove_paths_tolerates_missing_and_nested() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let tree = dir.path().join("tree");
        create_dir_all(tree.join("sub"))?;
        write(tree.join("sub/file"), "x")?;
        write(dir.path().join("lone"), "x")?;
        symlink(dir.path().join("lone"), dir.path().join("link"))?;

        let paths = vec![
            tree.join("sub/file"),
            tree.clone(),
            dir.path().join("link"),
            dir.path().join("never-existed"),
        ];
        let failures = remove_paths(paths, false, &Silent);

        assert_eq!(failures, 0);
        assert!(!tree.exists());
        assert!(fs::symlink_metadata(dir.path().join("link")).is_err());
        // Symlink target is left alone.
        assert!(dir.path().join("lone").exists());

        Ok(())
    }

    #[test]
    fn remove_paths_dry_run_touches_nothing() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        write(dir.path().join("keep"), "x")?;

        let failures = remove_paths([dir.path().join("keep")], true, &Silent);
        assert_eq!(failures, 0);
        assert!(dir.path().join("keep").exists());

        Ok(())
    }

    #[test]
    fn same_file_detects_copy_onto_itself() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        write(dir.path().join("file"), "x")?;
        write(dir.path().join("other"), "x")?;

        assert!(same_file(&dir.path().join("file"), &dir.path().join("./file")));
        assert!(!same_file(&dir.path().join("file"), &dir.path().join("other")));
        assert!(!same_file(&dir.path().join("file"), &dir.path().join("missing")));

        Ok(())
    }

    #[test]
    fn first_missing_finds_topmost_absent_dir() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let target = dir.path().join("a/b/c");
        assert_eq!(first_missing(&target), dir.path().join("a"));
        assert_eq!(existing_ancestor(&target), dir.path());
        Ok(())
    }

    #[test]
    fn copy_preserving_keeps_mode_and_mtime() -> anyhow::Result<()> {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir()?;
        let from = dir.path().join("from");
        let to = dir.path().join("to");
        write(&from, "#!/bin/sh\n")?;
        fs::set_permissions(&from, fs::Permissions::from_mode(0o750))?;

        copy_preserving(&from, &to)?;

        let source = fs::metadata(&from)?;
        let copied = fs::metadata(&to)?;
        assert_eq!(copied.permissions().mode() & 0o777, 0o750);
        assert_eq!(copied.modified()?, source.modified()?);
        assert_eq!(fs::read_to_string(&to)?, "#!/bin/sh\n");

        Ok(())
    }
}

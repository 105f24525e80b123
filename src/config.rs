// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Configuration layout.
//!
//! Projects describe how they want to be installed through an optional
//! `installer.json` file at the top of their working directory. The file is
//! plain JSON with C-style comments allowed:
//!
//! ```json
//! {
//!     // Where things go.
//!     "paths": {
//!         "toplevel": "my-tool",
//!         "recurse": true,
//!         "files": ["\\.py$", "^data/"],
//!         "excludes": ["^tests/"],
//!         "executables": ["my-tool.py"]
//!     },
//!     /* Forced install type, either "global" or "local". */
//!     "install_type": "local",
//!     "commands": ["make all"]
//! }
//! ```
//!
//! Whatever the file leaves out falls back to the compiled-in defaults of
//! [`default_config`]. The file is merged key by key over those defaults,
//! so nested sections only need to mention the keys they change.

use crate::command::CommandDecl;

use regex::Regex;
use serde::{de::Error as DeError, Deserialize, Deserializer};
use serde_json::{json, Map, Value};
use std::{
    fs::read_to_string,
    io::ErrorKind,
    path::{Path, PathBuf},
    str::FromStr,
    sync::LazyLock,
};

/// Name of configuration file in working directory.
pub const CONFIG_FILE: &str = "installer.json";

/// Compiled-in default configuration.
pub fn default_config() -> Value {
    json!({
        "paths": {
            "exe_base": null,
            "install_base": null,
            "toplevel": null,
            "recurse": false,
            "files": [],
            "excludes": [],
            "executables": []
        },
        "dependencies": {},
        "install_type": null,
        "commands": []
    })
}

/// Merge `overlay` into `base` recursively.
///
/// Objects present on both sides merge key by key. Everything else in
/// `overlay` replaces what `base` holds. Keys only present in `base` are
/// never dropped.
pub fn merge(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Object(base), Value::Object(overlay)) => merge_maps(base, overlay),
        (base, overlay) => *base = overlay,
    }
}

fn merge_maps(base: &mut Map<String, Value>, overlay: Map<String, Value>) {
    for (key, value) in overlay {
        match base.get_mut(&key) {
            Some(existing) => merge(existing, value),
            None => {
                base.insert(key, value);
            }
        }
    }
}

// INVARIANT: String alternative comes first so comment markers inside
// double-quoted strings are consumed as part of the string.
static COMMENTS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#""(?:\\.|[^"\\])*"|//[^\n]*|/\*[\s\S]*?\*/"#).expect("comment pattern is valid")
});

/// Strip `//` and `/* */` comments from JSON text.
///
/// Double-quoted strings are left untouched, so comment markers inside them
/// survive.
pub fn strip_comments(text: &str) -> String {
    COMMENTS
        .replace_all(text, |caps: &regex::Captures<'_>| {
            let found = &caps[0];
            if found.starts_with('"') {
                found.to_owned()
            } else {
                String::new()
            }
        })
        .into_owned()
}

/// Installer configuration.
#[derive(Default, Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Config {
    /// Which files to install, and where to put them.
    pub paths: PathsConfig,

    /// Reserved for future use.
    #[serde(default)]
    pub dependencies: Value,

    /// Forced install type overriding caller preference.
    #[serde(default, deserialize_with = "deserialize_install_type")]
    pub install_type: Option<InstallType>,

    /// Pre-install command declarations.
    #[serde(default)]
    pub commands: Vec<CommandDecl>,
}

impl Config {
    /// Load configuration file at `path`.
    ///
    /// A missing file is not an error. Defaults are used instead.
    ///
    /// # Errors
    ///
    /// - Return [`ConfigError::Read`] if file exists but cannot be read.
    /// - Return any parsing error of [`Config::from_str`].
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        match read_to_string(path.as_ref()) {
            Ok(content) => content.parse(),
            Err(error) if error.kind() == ErrorKind::NotFound => Self::from_value(Value::Null),
            Err(error) => Err(ConfigError::Read {
                source: error,
                path: path.as_ref().to_path_buf(),
            }),
        }
    }

    /// Merge parsed value over defaults and deserialize result.
    ///
    /// A null value means "nothing to merge".
    ///
    /// # Errors
    ///
    /// - Return [`ConfigError::NotAnObject`] if value is neither null nor an
    ///   object.
    /// - Return [`ConfigError::Schema`] if merged value has invalid layout.
    pub fn from_value(value: Value) -> Result<Self> {
        let mut merged = default_config();
        match value {
            Value::Null => {}
            Value::Object(_) => merge(&mut merged, value),
            _ => return Err(ConfigError::NotAnObject),
        }

        serde_json::from_value(merged).map_err(ConfigError::Schema)
    }

    /// Decide between global and local install.
    ///
    /// Configured install type wins over caller `preferred` choice.
    pub fn use_global(&self, preferred: bool) -> bool {
        match self.install_type {
            Some(InstallType::Global) => true,
            Some(InstallType::Local) => false,
            None => preferred,
        }
    }
}

impl FromStr for Config {
    type Err = ConfigError;

    fn from_str(data: &str) -> Result<Self, Self::Err> {
        let value: Value =
            serde_json::from_str(strip_comments(data).as_str()).map_err(ConfigError::Syntax)?;
        Self::from_value(value)
    }
}

/// File selection, and destination settings.
#[derive(Default, Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PathsConfig {
    /// Explicit directory to place executable symlinks in.
    #[serde(default)]
    pub exe_base: Option<String>,

    /// Explicit base directory to place top-level directory in.
    #[serde(default)]
    pub install_base: Option<String>,

    /// Name of directory holding installed files. Defaults to name of
    /// working directory.
    #[serde(default)]
    pub toplevel: Option<String>,

    /// Walk entire working tree instead of its top level only.
    #[serde(default)]
    pub recurse: bool,

    /// Include patterns.
    #[serde(default)]
    pub files: Vec<String>,

    /// Exclude patterns.
    #[serde(default)]
    pub excludes: Vec<String>,

    /// Explicit executable file names.
    #[serde(default)]
    pub executables: Vec<String>,
}

impl PathsConfig {
    /// Compile include and exclude patterns.
    ///
    /// # Errors
    ///
    /// - Return [`ConfigError::Pattern`] naming first invalid pattern.
    pub fn patterns(&self) -> Result<Patterns> {
        Ok(Patterns {
            include: compile(&self.files)?,
            exclude: compile(&self.excludes)?,
        })
    }
}

fn compile(patterns: &[String]) -> Result<Vec<Regex>> {
    patterns
        .iter()
        .map(|pattern| {
            Regex::new(pattern).map_err(|source| ConfigError::Pattern {
                pattern: pattern.clone(),
                source,
            })
        })
        .collect()
}

/// Compiled file selection patterns.
#[derive(Debug, Clone, Default)]
pub struct Patterns {
    include: Vec<Regex>,
    exclude: Vec<Regex>,
}

impl Patterns {
    /// Path is selected by include patterns.
    ///
    /// No include patterns means everything is selected.
    pub fn is_included(&self, path: &str) -> bool {
        self.include.is_empty() || self.include.iter().any(|regex| regex.is_match(path))
    }

    /// Path is rejected by any exclude pattern.
    pub fn is_excluded(&self, path: &str) -> bool {
        self.exclude.iter().any(|regex| regex.is_match(path))
    }
}

/// Type of installation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallType {
    /// System-wide directories.
    Global,

    /// Directories relative to user's home.
    Local,
}

impl FromStr for InstallType {
    type Err = String;

    fn from_str(data: &str) -> Result<Self, Self::Err> {
        match data.trim().to_lowercase().as_str() {
            "global" => Ok(Self::Global),
            "local" => Ok(Self::Local),
            other => Err(format!(
                "invalid install_type {other:?}, expected \"global\" or \"local\""
            )),
        }
    }
}

fn deserialize_install_type<'de, D>(deserializer: D) -> Result<Option<InstallType>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<String>::deserialize(deserializer)? {
        Some(raw) if !raw.trim().is_empty() => raw.parse().map(Some).map_err(D::Error::custom),
        _ => Ok(None),
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Configuration file exists, but cannot be read.
    #[error("failed to read configuration file at {:?}", path.display())]
    Read {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Configuration file is not valid JSON.
    #[error("failed to parse configuration: {0}")]
    Syntax(#[source] serde_json::Error),

    /// Configuration root is not a JSON object.
    #[error("configuration root must be an object")]
    NotAnObject,

    /// Configuration does not fit expected layout.
    #[error("invalid configuration: {0}")]
    Schema(#[source] serde_json::Error),

    /// Include or exclude pattern is not a valid regular expression.
    #[error("invalid pattern {pattern:?}: {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

/// Friendly result alias :3
type Result<T, E = ConfigError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::CommandArgs;
    use indoc::indoc;
    use pretty_assertions::assert_eq;
    use std::fs::write;

    #[test]
    fn merge_keeps_defaults_adds_new_and_recurses() {
        let mut base = json!({
            "paths": {"recurse": false, "files": ["a"], "toplevel": null},
            "keep": 1
        });
        let overlay = json!({
            "paths": {"recurse": true, "files": ["b", "c"], "extra": "x"},
            "added": [1, 2]
        });

        merge(&mut base, overlay);

        let expect = json!({
            "paths": {"recurse": true, "files": ["b", "c"], "toplevel": null, "extra": "x"},
            "keep": 1,
            "added": [1, 2]
        });
        assert_eq!(base, expect);
    }

    #[test]
    fn merge_replaces_object_with_scalar() {
        let mut base = json!({"paths": {"recurse": false}});
        merge(&mut base, json!({"paths": 5}));
        assert_eq!(base, json!({"paths": 5}));
    }

    #[test]
    fn strip_comments_leaves_strings_alone() {
        let text = indoc! {r#"
            {
                // line comment
                "url": "https://example.org/*not a comment*/", /* block
                comment */ "path": "a//b"
            }
        "#};
        let value: Value = serde_json::from_str(&strip_comments(text)).unwrap();
        assert_eq!(
            value,
            json!({"url": "https://example.org/*not a comment*/", "path": "a//b"})
        );
    }

    #[test]
    fn strip_comments_handles_escaped_quotes() {
        let text = r#"{"a": "say \"//hi\"" // trailing
        }"#;
        let value: Value = serde_json::from_str(&strip_comments(text)).unwrap();
        assert_eq!(value, json!({"a": "say \"//hi\""}));
    }

    #[test]
    fn deserialize_config() -> anyhow::Result<()> {
        let result: Config = indoc! {r#"
            {
                "paths": {
                    "toplevel": "blah",
                    "excludes": ["\\.md$"]
                },
                /* Case does not matter. */
                "install_type": "  LOCAL ",
                "commands": [
                    "make all",
                    {"name": "deps", "command": "pip install", "command_user": "pip install --user"}
                ]
            }
        "#}
        .parse()?;

        let expect = Config {
            paths: PathsConfig {
                toplevel: Some("blah".into()),
                excludes: vec!["\\.md$".into()],
                ..Default::default()
            },
            dependencies: json!({}),
            install_type: Some(InstallType::Local),
            commands: vec![
                CommandDecl::Line("make all".into()),
                CommandDecl::Named {
                    name: Some("deps".into()),
                    command: Some(CommandArgs::Line("pip install".into())),
                    command_user: Some(CommandArgs::Line("pip install --user".into())),
                },
            ],
        };
        assert_eq!(result, expect);
        assert!(!result.use_global(true));

        Ok(())
    }

    #[test]
    fn empty_install_type_keeps_preference() -> anyhow::Result<()> {
        let config: Config = r#"{"install_type": ""}"#.parse()?;
        assert_eq!(config.install_type, None);
        assert!(config.use_global(true));
        assert!(!config.use_global(false));
        Ok(())
    }

    #[test]
    fn reject_unknown_install_type() {
        let result = r#"{"install_type": "everywhere"}"#.parse::<Config>();
        assert!(matches!(result, Err(ConfigError::Schema(_))));
    }

    #[test]
    fn reject_malformed_json() {
        let result = r#"{"paths": {'single': 1}}"#.parse::<Config>();
        assert!(matches!(result, Err(ConfigError::Syntax(_))));

        let result = "[1, 2]".parse::<Config>();
        assert!(matches!(result, Err(ConfigError::NotAnObject)));
    }

    #[test]
    fn invalid_pattern_is_named() -> anyhow::Result<()> {
        let config: Config = r#"{"paths": {"files": ["ok", "(unclosed"]}}"#.parse()?;
        match config.paths.patterns() {
            Err(ConfigError::Pattern { pattern, .. }) => assert_eq!(pattern, "(unclosed"),
            other => panic!("expected pattern error, got {other:?}"),
        }
        Ok(())
    }

    #[test]
    fn patterns_default_to_everything() -> anyhow::Result<()> {
        let patterns = PathsConfig {
            excludes: vec!["\\.md$".into()],
            ..Default::default()
        }
        .patterns()?;
        assert!(patterns.is_included("anything/at/all"));
        assert!(patterns.is_excluded("README.md"));
        assert!(!patterns.is_excluded("script.py"));
        Ok(())
    }

    #[test]
    fn load_missing_file_uses_defaults() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let config = Config::load(dir.path().join(CONFIG_FILE))?;
        assert_eq!(config, Config::from_value(default_config())?);
        assert!(!config.paths.recurse);
        assert!(config.commands.is_empty());
        Ok(())
    }

    #[test]
    fn load_existing_file() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join(CONFIG_FILE);
        write(&path, r#"{"paths": {"recurse": true}} // done"#)?;
        let config = Config::load(&path)?;
        assert!(config.paths.recurse);
        Ok(())
    }

    #[test]
    fn load_unreadable_file_is_fatal() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join(CONFIG_FILE);
        std::fs::create_dir(&path)?;

        let result = Config::load(&path);
        assert!(matches!(result, Err(ConfigError::Read { .. })));
        Ok(())
    }
}

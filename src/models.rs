// src/models.rs

use colored::Colorize;
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

// --- SCRIPT MODEL ---

/// Where a discovered script comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScriptOrigin {
    /// Shipped inside the binary and materialized into the cache directory.
    Bundled,
    /// Found in a directory registered with `add-script-dir`.
    External,
}

impl fmt::Display for ScriptOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bundled => write!(f, "bundled"),
            Self::External => write!(f, "external"),
        }
    }
}

/// The stable identity of a script: the directory it was found in plus its file name.
/// Two scripts sharing a file name in different directories are different identities.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScriptId {
    dir: PathBuf,
    file_name: String,
}

impl ScriptId {
    pub fn new(dir: impl Into<PathBuf>, file_name: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            file_name: file_name.into(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// The absolute location of the script file.
    pub fn path(&self) -> PathBuf {
        self.dir.join(&self.file_name)
    }
}

impl fmt::Display for ScriptId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path().display())
    }
}

/// A required argument (`@vercel.arg NAME description`). Its value is shared by every
/// script that declares the same name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptArg {
    pub name: String,
    pub description: String,
}

/// A regular expression that validates a string option. Compiled while the
/// annotation is parsed, so an invalid pattern fails that script only.
#[derive(Debug, Clone)]
pub struct OptPattern(Regex);

impl OptPattern {
    pub fn new(raw: &str) -> Result<Self, regex::Error> {
        Regex::new(raw).map(OptPattern)
    }

    pub fn is_match(&self, value: &str) -> bool {
        self.0.is_match(value)
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl Serialize for OptPattern {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for OptPattern {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Regex::new(&raw)
            .map(OptPattern)
            .map_err(|e| serde::de::Error::custom(format!("invalid pattern '{}': {}", raw, e)))
    }
}

/// An optional parameter (`@vercel.opt {json}`), discriminated by its `type` field.
/// Serializes back to the annotation form, leaving out unset fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ScriptOpt {
    Boolean {
        name: String,
        description: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        default: Option<bool>,
        #[serde(default, skip_serializing_if = "is_false")]
        optional: bool,
    },
    String {
        name: String,
        description: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        default: Option<String>,
        #[serde(default, skip_serializing_if = "is_false")]
        optional: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pattern: Option<OptPattern>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pattern_help: Option<String>,
    },
    Worktree {
        name: String,
        description: String,
        #[serde(rename = "baseDirArg", alias = "base_dir_arg")]
        base_dir_arg: String,
        /// Path of the worktree the picker starts on.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        default: Option<String>,
        #[serde(default, skip_serializing_if = "is_false")]
        optional: bool,
    },
}

fn is_false(value: &bool) -> bool {
    !*value
}

impl ScriptOpt {
    pub fn name(&self) -> &str {
        match self {
            Self::Boolean { name, .. } | Self::String { name, .. } | Self::Worktree { name, .. } => {
                name
            }
        }
    }

    pub fn description(&self) -> &str {
        match self {
            Self::Boolean { description, .. }
            | Self::String { description, .. }
            | Self::Worktree { description, .. } => description,
        }
    }

    pub fn is_optional(&self) -> bool {
        match self {
            Self::Boolean { optional, .. }
            | Self::String { optional, .. }
            | Self::Worktree { optional, .. } => *optional,
        }
    }

    /// Short type tag used by `list-scripts`.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Boolean { .. } => "boolean",
            Self::String { .. } => "string",
            Self::Worktree { .. } => "worktree",
        }
    }
}

/// `@vercel.requires <script> VAR...`: variables this script expects another script to export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Requirement {
    pub script: String,
    pub variables: Vec<String>,
}

/// How the child's standard streams are wired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StdinMode {
    /// Output is captured and re-printed line by line with the script's tag.
    #[default]
    Captured,
    /// `@vercel.stdin inherit`: the child talks to the terminal directly.
    Inherit,
}

/// A validated, discovered script.
#[derive(Debug, Clone)]
pub struct Script {
    pub id: ScriptId,
    pub name: String,
    pub description: Option<String>,
    pub origin: ScriptOrigin,
    /// `@vercel.after` references, normalized (no leading `./`), in declaration order.
    pub dependency_names: Vec<String>,
    pub requires: Vec<Requirement>,
    pub args: Vec<ScriptArg>,
    pub opts: Vec<ScriptOpt>,
    pub stdin_mode: StdinMode,
}

impl Script {
    /// The plain `name (file)` label used by prompts.
    pub fn label(&self) -> String {
        format!("{} ({})", self.name, self.id.file_name())
    }
}

impl fmt::Display for Script {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {}",
            self.name,
            format!("({})", self.id.file_name()).bright_black()
        )
    }
}

// --- PERSISTED STATE ---

/// A resolved parameter value as stored on disk and exported to scripts.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(untagged)]
pub enum StoredValue {
    Bool(bool),
    Text(String),
}

impl fmt::Display for StoredValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{}", b),
            Self::Text(s) => write!(f, "{}", s),
        }
    }
}

impl From<bool> for StoredValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<String> for StoredValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<&str> for StoredValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

/// Per-user state: `<config dir>/vss/global.json`.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct GlobalConfig {
    #[serde(default)]
    pub args: BTreeMap<String, StoredValue>,
    /// Registered external directories, in priority order.
    #[serde(default)]
    pub script_dirs: Vec<String>,
}

/// Per-project state: `.vss-app.json` in the working directory.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct ProjectState {
    /// Identities (absolute paths) of the last selection.
    #[serde(default)]
    pub selected: Vec<String>,
    /// `null` records an answered option that must not be exported.
    #[serde(default)]
    pub opts: BTreeMap<String, Option<StoredValue>>,
}

//! Routing rules configuration.
//!
//! Rules are stored as a JSON object mapping file extensions to destination
//! folders, plus an ignore list and a catch-all folder:
//!
//! ```json
//! {
//!     "include": { "txt": "/home/user/docs", "png": "/home/user/images" },
//!     "ignore": ["tmp", "part"],
//!     "others": "/home/user/misc"
//! }
//! ```
//!
//! An `include` entry keyed `"*"` routes every non-ignored file to that
//! folder, overriding the per-extension entries.
//!
//! The rules file is re-read before every classification rather than cached,
//! so edits take effect without restarting the watch session.

use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

/// Errors that can occur while loading the rules file.
#[derive(Debug)]
pub enum RulesError {
    /// Rules file not found at the specified path.
    RulesNotFound(PathBuf),
    /// IO error while reading the rules file.
    IoError {
        path: PathBuf,
        source: std::io::Error,
    },
    /// Invalid JSON syntax or structure.
    RulesInvalid(String),
    /// A required top-level key is absent.
    MissingKey(&'static str),
}

impl std::fmt::Display for RulesError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RulesError::RulesNotFound(path) => {
                write!(f, "Rules file not found: {}", path.display())
            }
            RulesError::IoError { path, source } => {
                write!(
                    f,
                    "IO error reading rules file {}: {}",
                    path.display(),
                    source
                )
            }
            RulesError::RulesInvalid(msg) => write!(f, "Invalid rules file: {}", msg),
            RulesError::MissingKey(key) => {
                write!(f, "Rules file is missing the required '{}' key", key)
            }
        }
    }
}

impl std::error::Error for RulesError {}

/// Raw shape of the rules file. Required keys are optional here so that an
/// absent key surfaces as a `MissingKey` error instead of a parse error.
#[derive(Debug, Deserialize)]
struct RulesFile {
    include: Option<HashMap<String, PathBuf>>,
    ignore: Option<Vec<String>>,
    others: Option<PathBuf>,
}

/// An immutable snapshot of the extension routing rules.
///
/// Extension keys are normalized on load: lowercased, with any leading dot
/// stripped. If the file carried an `include["*"]` entry it is hoisted into
/// [`RuleSet::wildcard`] and removed from the per-extension map.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleSet {
    include: HashMap<String, PathBuf>,
    ignore: HashSet<String>,
    fallback: PathBuf,
    wildcard: Option<PathBuf>,
}

impl RuleSet {
    /// Load a rule set from a JSON rules file.
    ///
    /// # Errors
    ///
    /// Returns `RulesError::RulesNotFound` if the file does not exist,
    /// `RulesError::IoError` if it cannot be read,
    /// `RulesError::RulesInvalid` if it is not valid JSON of the expected
    /// shape, and `RulesError::MissingKey` if `include`, `ignore`, or
    /// `others` is absent.
    pub fn load(path: &Path) -> Result<Self, RulesError> {
        if !path.exists() {
            return Err(RulesError::RulesNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path).map_err(|e| RulesError::IoError {
            path: path.to_path_buf(),
            source: e,
        })?;

        let raw: RulesFile =
            serde_json::from_str(&content).map_err(|e| RulesError::RulesInvalid(e.to_string()))?;

        let include = raw.include.ok_or(RulesError::MissingKey("include"))?;
        let ignore = raw.ignore.ok_or(RulesError::MissingKey("ignore"))?;
        let fallback = raw.others.ok_or(RulesError::MissingKey("others"))?;

        let mut wildcard = None;
        let mut normalized = HashMap::with_capacity(include.len());
        for (key, folder) in include {
            let key = normalize_extension(&key);
            if key == "*" {
                wildcard = Some(folder);
            } else {
                normalized.insert(key, folder);
            }
        }

        Ok(Self {
            include: normalized,
            ignore: ignore.iter().map(|ext| normalize_extension(ext)).collect(),
            fallback,
            wildcard,
        })
    }

    /// Returns true if files with this extension should be left alone.
    pub fn is_ignored(&self, extension: &str) -> bool {
        self.ignore.contains(extension)
    }

    /// Looks up the folder mapped to an extension, if any.
    pub fn folder_for(&self, extension: &str) -> Option<&Path> {
        self.include.get(extension).map(PathBuf::as_path)
    }

    /// The folder receiving files whose extension has no mapping.
    pub fn fallback(&self) -> &Path {
        &self.fallback
    }

    /// The folder overriding all per-extension mappings, if configured.
    pub fn wildcard(&self) -> Option<&Path> {
        self.wildcard.as_deref()
    }

    #[cfg(test)]
    pub(crate) fn for_tests(
        include: &[(&str, &Path)],
        ignore: &[&str],
        fallback: &Path,
        wildcard: Option<&Path>,
    ) -> Self {
        Self {
            include: include
                .iter()
                .map(|(ext, folder)| (ext.to_string(), folder.to_path_buf()))
                .collect(),
            ignore: ignore.iter().map(|ext| ext.to_string()).collect(),
            fallback: fallback.to_path_buf(),
            wildcard: wildcard.map(Path::to_path_buf),
        }
    }
}

/// Lowercases an extension key and strips a leading dot, so `".PDF"` and
/// `"pdf"` address the same rule.
fn normalize_extension(ext: &str) -> String {
    ext.strip_prefix('.').unwrap_or(ext).to_lowercase()
}

//! Extension-based classification of files and directories.
//!
//! A file is classified by the substring after the last `.` in its name,
//! lowercased. A directory is classified by the extension that occurs most
//! often among the files anywhere under it.
//!
//! # Examples
//!
//! ```
//! use std::path::Path;
//! use tidywatch::file_classifier::{Classification, Classifier};
//! use tidywatch::config::RuleSet;
//! # use tempfile::TempDir;
//! # let dir = TempDir::new().unwrap();
//! # std::fs::write(dir.path().join("rules.json"),
//! #     r#"{"include": {"txt": "/docs"}, "ignore": ["tmp"], "others": "/misc"}"#).unwrap();
//! let rules = RuleSet::load(&dir.path().join("rules.json")).unwrap();
//! assert_eq!(
//!     Classifier::classify_file("notes.txt", &rules),
//!     Classification::Folder("/docs".into())
//! );
//! assert_eq!(Classifier::classify_file("scratch.tmp", &rules), Classification::Skip);
//! ```

use crate::config::RuleSet;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Outcome of classifying a file or directory against a rule set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    /// The object belongs in this destination folder.
    Folder(PathBuf),
    /// The object's extension is ignored; leave it where it is.
    Skip,
    /// A directory's majority extension could not be determined (no files
    /// were found). The caller should retry after a delay.
    Unresolved,
}

/// Decides destination folders for files and directories.
pub struct Classifier;

impl Classifier {
    /// Classifies a single file by name.
    ///
    /// Lookup order: the ignore set first (ignored extensions are skipped no
    /// matter what else is configured), then the wildcard override, then the
    /// per-extension map, then the fallback folder. An unmapped extension is
    /// never an error; it always lands in the fallback.
    pub fn classify_file(name: &str, rules: &RuleSet) -> Classification {
        let extension = extension_of(name);

        if rules.is_ignored(&extension) {
            return Classification::Skip;
        }

        if let Some(folder) = rules.wildcard() {
            return Classification::Folder(folder.to_path_buf());
        }

        match rules.folder_for(&extension) {
            Some(folder) => Classification::Folder(folder.to_path_buf()),
            None => Classification::Folder(rules.fallback().to_path_buf()),
        }
    }

    /// Classifies a directory by the majority extension of the files under
    /// it, walked recursively.
    ///
    /// Every file counts toward the census; the ignore set does not apply
    /// here. On equal counts the extension encountered first during the walk
    /// wins. Returns [`Classification::Unresolved`] when the walk finds no
    /// files at all, whether the directory is empty or unreadable.
    pub fn classify_directory(path: &Path, rules: &RuleSet) -> Classification {
        // Vec rather than a map so that first-encountered order is preserved
        // for the tie-break.
        let mut counts: Vec<(String, usize)> = Vec::new();

        for entry in WalkDir::new(path)
            .min_depth(1)
            .into_iter()
            .filter_map(Result::ok)
            .filter(|e| e.file_type().is_file())
        {
            let extension = extension_of(&entry.file_name().to_string_lossy());
            match counts.iter_mut().find(|(ext, _)| *ext == extension) {
                Some((_, count)) => *count += 1,
                None => counts.push((extension, 1)),
            }
        }

        // Strictly-greater comparison keeps the first-encountered extension
        // on equal counts.
        let winner = counts
            .iter()
            .fold(None::<&(String, usize)>, |best, entry| match best {
                Some(b) if b.1 >= entry.1 => Some(b),
                _ => Some(entry),
            })
            .map(|(ext, _)| ext.clone());

        match winner {
            Some(extension) => match rules.folder_for(&extension) {
                Some(folder) => Classification::Folder(folder.to_path_buf()),
                None => Classification::Folder(rules.fallback().to_path_buf()),
            },
            None => Classification::Unresolved,
        }
    }
}

/// Extracts the classification key from a file name: the substring after the
/// last `.`, lowercased. A name with no `.` yields the whole name.
fn extension_of(name: &str) -> String {
    match name.rsplit_once('.') {
        Some((_, ext)) => ext.to_lowercase(),
        None => name.to_lowercase(),
    }
}

//! File relocation with collision and missing-destination handling.
//!
//! Moves are plain renames, so they are atomic on a single file system and
//! cheap. A name collision at the destination never overwrites: the incoming
//! file is given a timestamp-suffixed alternate name instead. A missing
//! destination folder is created on demand, intermediate directories
//! included.

use chrono::Local;
use std::fs;
use std::path::{Path, PathBuf};

/// Errors that can occur while relocating a file or directory.
#[derive(Debug)]
pub enum MoveError {
    /// The source disappeared before it could be moved.
    SourceVanished(PathBuf),
    /// Failed to create the destination folder.
    DirectoryCreationFailed {
        path: PathBuf,
        source: std::io::Error,
    },
    /// Both the destination name and its timestamp-suffixed alternate are
    /// already taken.
    CollisionUnresolved { destination: PathBuf },
    /// The rename itself failed.
    RenameFailed {
        source: PathBuf,
        destination: PathBuf,
        source_error: std::io::Error,
    },
}

impl std::fmt::Display for MoveError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SourceVanished(path) => {
                write!(f, "Source vanished before it could be moved: {}", path.display())
            }
            Self::DirectoryCreationFailed { path, source } => {
                write!(
                    f,
                    "Failed to create destination folder {}: {}",
                    path.display(),
                    source
                )
            }
            Self::CollisionUnresolved { destination } => {
                write!(
                    f,
                    "Destination and its renamed alternate both exist: {}",
                    destination.display()
                )
            }
            Self::RenameFailed {
                source,
                destination,
                source_error,
            } => {
                write!(
                    f,
                    "Failed to move {} to {}: {}",
                    source.display(),
                    destination.display(),
                    source_error
                )
            }
        }
    }
}

impl std::error::Error for MoveError {}

/// Result type for relocation operations.
pub type MoveResult<T> = Result<T, MoveError>;

/// Records where a completed move put the object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveOutcome {
    /// The path the object was moved from.
    pub source: PathBuf,
    /// The path the object ended up at.
    pub destination: PathBuf,
    /// True when a collision forced the timestamp-suffixed alternate name.
    pub renamed: bool,
}

/// Relocates files and directories into destination folders.
pub struct FileMover;

impl FileMover {
    /// Moves `source` into `dest_folder` under `name`.
    ///
    /// Failure handling, in order of precedence:
    /// 1. `dest_folder/name` already exists: the object is moved to a
    ///    timestamp-suffixed alternate name instead. The existing file is
    ///    untouched and the source is never deleted.
    /// 2. `dest_folder` does not exist: it is created, intermediate
    ///    directories included, and the rename retried.
    /// 3. Anything else is surfaced as a [`MoveError`] for the caller to
    ///    log; no partial-state cleanup is attempted.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use std::path::Path;
    /// use tidywatch::file_mover::FileMover;
    ///
    /// let outcome = FileMover::move_to_folder(
    ///     Path::new("/watch/report.txt"),
    ///     Path::new("/docs"),
    ///     "report.txt",
    /// );
    ///
    /// match outcome {
    ///     Ok(op) => println!("Moved to {}", op.destination.display()),
    ///     Err(e) => eprintln!("Move failed: {}", e),
    /// }
    /// ```
    pub fn move_to_folder(source: &Path, dest_folder: &Path, name: &str) -> MoveResult<MoveOutcome> {
        if !source.exists() {
            return Err(MoveError::SourceVanished(source.to_path_buf()));
        }

        let preferred = dest_folder.join(name);
        let (destination, renamed) = if preferred.exists() {
            let alternate = dest_folder.join(Self::collision_name(name));
            if alternate.exists() {
                return Err(MoveError::CollisionUnresolved {
                    destination: alternate,
                });
            }
            (alternate, true)
        } else {
            (preferred, false)
        };

        if !dest_folder.exists() {
            fs::create_dir_all(dest_folder).map_err(|e| MoveError::DirectoryCreationFailed {
                path: dest_folder.to_path_buf(),
                source: e,
            })?;
        }

        fs::rename(source, &destination).map_err(|e| MoveError::RenameFailed {
            source: source.to_path_buf(),
            destination: destination.clone(),
            source_error: e,
        })?;

        Ok(MoveOutcome {
            source: source.to_path_buf(),
            destination,
            renamed,
        })
    }

    /// Produces the collision-avoiding name for `name` by appending a local
    /// timestamp, e.g. `report.txt` becomes `report.txt.20260807-143052`.
    fn collision_name(name: &str) -> String {
        let timestamp = Local::now().format("%Y%m%d-%H%M%S");
        format!("{}.{}", name, timestamp)
    }
}

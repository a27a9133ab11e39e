//! Event handling: the bridge from watch events to classification and moves.
//!
//! The dispatcher consumes one [`FileEvent`] at a time and decides what, if
//! anything, to do with it:
//!
//! - `created`: logged only. A file is not final until a later `modified`
//!   event confirms the write finished, so creation never triggers a move.
//! - `modified` on a file: wait for the size to settle, classify, move.
//! - `modified` on a directory: classify by extension majority, move the
//!   whole directory.
//! - `moved` file: classify and organize the destination path. A directory
//!   move is logged only.
//! - `deleted`: logged only.
//!
//! The rules file is re-loaded for every classification, so edits take
//! effect on the next event. Every per-event failure is caught here, logged
//! with its context, and dropped; nothing short of a failed watch setup
//! stops the session.

use crate::config::{RuleSet, RulesError};
use crate::file_classifier::{Classification, Classifier};
use crate::file_mover::{FileMover, MoveError, MoveOutcome};
use crate::stability::{StabilityDetector, StabilityError};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// How many times a directory with no determinable majority extension is
/// re-classified before the event is dropped.
const DIR_RETRY_LIMIT: u32 = 3;

/// Delay between those re-classification attempts.
const DIR_RETRY_DELAY: Duration = Duration::from_secs(10);

/// The kind of file-system activity an event describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Created,
    Modified,
    Moved,
    Deleted,
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            EventKind::Created => "created",
            EventKind::Modified => "modified",
            EventKind::Moved => "moved",
            EventKind::Deleted => "deleted",
        };
        f.write_str(label)
    }
}

/// A single file-system event as delivered by the watch mechanism.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEvent {
    pub kind: EventKind,
    pub source: PathBuf,
    /// Present only for `Moved` events.
    pub dest: Option<PathBuf>,
    pub is_directory: bool,
}

impl FileEvent {
    pub fn created(source: PathBuf, is_directory: bool) -> Self {
        Self {
            kind: EventKind::Created,
            source,
            dest: None,
            is_directory,
        }
    }

    pub fn modified(source: PathBuf, is_directory: bool) -> Self {
        Self {
            kind: EventKind::Modified,
            source,
            dest: None,
            is_directory,
        }
    }

    pub fn moved(source: PathBuf, dest: PathBuf, is_directory: bool) -> Self {
        Self {
            kind: EventKind::Moved,
            source,
            dest: Some(dest),
            is_directory,
        }
    }

    pub fn deleted(source: PathBuf, is_directory: bool) -> Self {
        Self {
            kind: EventKind::Deleted,
            source,
            dest: None,
            is_directory,
        }
    }

    /// The path the object currently lives at: the destination for a move,
    /// the source for everything else.
    fn current_path(&self) -> &Path {
        self.dest.as_deref().unwrap_or(&self.source)
    }
}

/// Errors that can occur while handling a single event. All of them are
/// recoverable: the event is dropped and the session continues.
#[derive(Debug)]
pub enum DispatchError {
    Rules(RulesError),
    Stability(StabilityError),
    Move(MoveError),
    /// A directory's majority extension stayed undeterminable through every
    /// retry attempt.
    DirectoryUnresolved { path: PathBuf, attempts: u32 },
    /// The event path has no final name component to classify by.
    MissingFileName(PathBuf),
}

impl std::fmt::Display for DispatchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Rules(e) => write!(f, "{}", e),
            Self::Stability(e) => write!(f, "{}", e),
            Self::Move(e) => write!(f, "{}", e),
            Self::DirectoryUnresolved { path, attempts } => {
                write!(
                    f,
                    "No majority extension for {} after {} attempts",
                    path.display(),
                    attempts
                )
            }
            Self::MissingFileName(path) => {
                write!(f, "Path has no file name component: {}", path.display())
            }
        }
    }
}

impl std::error::Error for DispatchError {}

impl From<RulesError> for DispatchError {
    fn from(e: RulesError) -> Self {
        Self::Rules(e)
    }
}

impl From<StabilityError> for DispatchError {
    fn from(e: StabilityError) -> Self {
        Self::Stability(e)
    }
}

impl From<MoveError> for DispatchError {
    fn from(e: MoveError) -> Self {
        Self::Move(e)
    }
}

/// Routes watch events through stability detection, classification, and the
/// mover.
///
/// Holds no per-file state: the file name travels through each call as a
/// parameter, and the rule set is re-loaded for every classification.
pub struct EventDispatcher {
    rules_path: PathBuf,
    stability: StabilityDetector,
    dir_retry_limit: u32,
    dir_retry_delay: Duration,
    dry_run: bool,
}

impl EventDispatcher {
    pub fn new(rules_path: PathBuf, stability: StabilityDetector, dry_run: bool) -> Self {
        Self {
            rules_path,
            stability,
            dir_retry_limit: DIR_RETRY_LIMIT,
            dir_retry_delay: DIR_RETRY_DELAY,
            dry_run,
        }
    }

    /// Overrides the unresolved-directory retry policy.
    pub fn with_directory_retry(mut self, limit: u32, delay: Duration) -> Self {
        self.dir_retry_limit = limit;
        self.dir_retry_delay = delay;
        self
    }

    /// Handles one event, catching and logging any failure. This is the
    /// error boundary: nothing below it can take the session down.
    pub fn dispatch(&self, event: &FileEvent) {
        if let Err(e) = self.handle_event(event) {
            error!(
                kind = %event.kind,
                path = %event.current_path().display(),
                error = %e,
                "Event dropped"
            );
        }
    }

    /// Handles one event, returning what was moved (if anything).
    ///
    /// # Errors
    ///
    /// Any [`DispatchError`]; callers other than tests usually go through
    /// [`EventDispatcher::dispatch`], which logs and swallows them.
    pub fn handle_event(&self, event: &FileEvent) -> Result<Option<MoveOutcome>, DispatchError> {
        let what = if event.is_directory { "directory" } else { "file" };

        match event.kind {
            EventKind::Created => {
                info!(path = %event.source.display(), "Created {}", what);
                Ok(None)
            }
            EventKind::Deleted => {
                info!(path = %event.source.display(), "Deleted {}", what);
                Ok(None)
            }
            EventKind::Modified => {
                debug!(path = %event.source.display(), "Modified {}", what);
                if event.is_directory {
                    self.organize_directory(&event.source)
                } else {
                    self.organize_file(&event.source, true)
                }
            }
            EventKind::Moved => {
                let dest = event.current_path();
                info!(
                    from = %event.source.display(),
                    to = %dest.display(),
                    "Moved {}", what
                );
                if event.is_directory {
                    // Directory moves are observed but not re-organized.
                    Ok(None)
                } else {
                    // The object is already complete; organize where it landed.
                    self.organize_file(dest, false)
                }
            }
        }
    }

    /// Classifies a file and moves it to its folder. When `await_stability`
    /// is set the file's size must settle first, so a mid-copy file is never
    /// moved out from under its writer.
    fn organize_file(
        &self,
        path: &Path,
        await_stability: bool,
    ) -> Result<Option<MoveOutcome>, DispatchError> {
        let name = file_name_of(path)?;

        if await_stability {
            let size = self.stability.await_stable(path)?;
            debug!(path = %path.display(), size, "Size settled");
        }

        let rules = RuleSet::load(&self.rules_path)?;
        match Classifier::classify_file(&name, &rules) {
            Classification::Skip => {
                info!(path = %path.display(), "Extension ignored");
                Ok(None)
            }
            Classification::Folder(folder) => self.move_object(path, &folder, &name),
            Classification::Unresolved => {
                // Single files always resolve to a folder or a skip.
                warn!(path = %path.display(), "Unexpected unresolved classification");
                Ok(None)
            }
        }
    }

    /// Classifies a directory by extension majority and moves the whole
    /// tree. An unresolved census (no files yet) is retried after a delay,
    /// a bounded number of times, because the directory may still be
    /// filling up.
    fn organize_directory(&self, path: &Path) -> Result<Option<MoveOutcome>, DispatchError> {
        let name = file_name_of(path)?;

        for attempt in 1..=self.dir_retry_limit {
            let rules = RuleSet::load(&self.rules_path)?;
            match Classifier::classify_directory(path, &rules) {
                Classification::Folder(folder) => {
                    return self.move_object(path, &folder, &name);
                }
                Classification::Unresolved => {
                    debug!(
                        path = %path.display(),
                        attempt,
                        limit = self.dir_retry_limit,
                        "No majority extension yet"
                    );
                    if attempt < self.dir_retry_limit {
                        thread::sleep(self.dir_retry_delay);
                    }
                }
                Classification::Skip => {
                    // Directories have no skip path.
                    warn!(path = %path.display(), "Unexpected skip classification");
                    return Ok(None);
                }
            }
        }

        Err(DispatchError::DirectoryUnresolved {
            path: path.to_path_buf(),
            attempts: self.dir_retry_limit,
        })
    }

    fn move_object(
        &self,
        path: &Path,
        folder: &Path,
        name: &str,
    ) -> Result<Option<MoveOutcome>, DispatchError> {
        if self.dry_run {
            info!(
                path = %path.display(),
                folder = %folder.display(),
                "Dry run: would move"
            );
            return Ok(None);
        }

        let outcome = FileMover::move_to_folder(path, folder, name)?;
        info!(
            path = %outcome.source.display(),
            destination = %outcome.destination.display(),
            renamed = outcome.renamed,
            "Organized"
        );
        Ok(Some(outcome))
    }
}

fn file_name_of(path: &Path) -> Result<String, DispatchError> {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| DispatchError::MissingFileName(path.to_path_buf()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::fs;
    use tempfile::TempDir;

    /// A watch root with a rules file routing txt to docs/, ignoring tmp,
    /// and sending everything else to misc/.
    struct Setup {
        dir: TempDir,
        rules_path: PathBuf,
    }

    impl Setup {
        fn new() -> Self {
            let dir = TempDir::new().expect("Failed to create temp directory");
            let rules_path = dir.path().join("rules.json");
            let setup = Self { dir, rules_path };
            setup.write_rules(json!({
                "include": { "txt": setup.folder("docs") },
                "ignore": ["tmp"],
                "others": setup.folder("misc"),
            }));
            setup
        }

        fn write_rules(&self, rules: serde_json::Value) {
            fs::write(&self.rules_path, rules.to_string()).expect("Failed to write rules");
        }

        fn folder(&self, name: &str) -> PathBuf {
            self.dir.path().join(name)
        }

        fn create_file(&self, name: &str) -> PathBuf {
            let path = self.dir.path().join(name);
            fs::write(&path, "contents").expect("Failed to write file");
            path
        }

        fn dispatcher(&self) -> EventDispatcher {
            EventDispatcher::new(
                self.rules_path.clone(),
                StabilityDetector::new(Duration::from_millis(5), 20),
                false,
            )
            .with_directory_retry(2, Duration::from_millis(10))
        }
    }

    #[test]
    fn test_created_event_is_logged_only() {
        let setup = Setup::new();
        let path = setup.create_file("report.txt");

        let outcome = setup
            .dispatcher()
            .handle_event(&FileEvent::created(path.clone(), false))
            .expect("Created should not fail");

        assert!(outcome.is_none());
        assert!(path.exists(), "Created must not trigger a move");
    }

    #[test]
    fn test_deleted_event_is_logged_only() {
        let setup = Setup::new();
        let outcome = setup
            .dispatcher()
            .handle_event(&FileEvent::deleted(setup.folder("gone.txt"), false))
            .expect("Deleted should not fail");
        assert!(outcome.is_none());
    }

    #[test]
    fn test_modified_file_is_organized() {
        let setup = Setup::new();
        let path = setup.create_file("report.txt");

        let outcome = setup
            .dispatcher()
            .handle_event(&FileEvent::modified(path.clone(), false))
            .expect("Modified should succeed")
            .expect("File should have been moved");

        assert!(!path.exists());
        assert_eq!(outcome.destination, setup.folder("docs").join("report.txt"));
        assert!(outcome.destination.exists());
    }

    #[test]
    fn test_modified_ignored_file_stays_put() {
        let setup = Setup::new();
        let path = setup.create_file("scratch.tmp");

        let outcome = setup
            .dispatcher()
            .handle_event(&FileEvent::modified(path.clone(), false))
            .expect("Modified should succeed");

        assert!(outcome.is_none());
        assert!(path.exists());
    }

    #[test]
    fn test_unmapped_extension_goes_to_fallback() {
        let setup = Setup::new();
        let path = setup.create_file("data.csv");

        let outcome = setup
            .dispatcher()
            .handle_event(&FileEvent::modified(path, false))
            .expect("Modified should succeed")
            .expect("File should have been moved");

        assert_eq!(outcome.destination, setup.folder("misc").join("data.csv"));
    }

    #[test]
    fn test_moved_file_organizes_destination_path() {
        let setup = Setup::new();
        let dest = setup.create_file("renamed.txt");
        let old = setup.folder("original.txt");

        let outcome = setup
            .dispatcher()
            .handle_event(&FileEvent::moved(old, dest.clone(), false))
            .expect("Moved should succeed")
            .expect("File should have been organized");

        assert!(!dest.exists());
        assert_eq!(
            outcome.destination,
            setup.folder("docs").join("renamed.txt")
        );
    }

    #[test]
    fn test_moved_directory_is_logged_only() {
        let setup = Setup::new();
        let dir = setup.folder("bundle");
        fs::create_dir(&dir).expect("Failed to create dir");
        fs::write(dir.join("a.txt"), "1").expect("Failed to write");

        let outcome = setup
            .dispatcher()
            .handle_event(&FileEvent::moved(setup.folder("old"), dir.clone(), true))
            .expect("Moved dir should not fail");

        assert!(outcome.is_none());
        assert!(dir.exists());
    }

    #[test]
    fn test_modified_directory_is_organized_by_majority() {
        let setup = Setup::new();
        let dir = setup.folder("bundle");
        fs::create_dir(&dir).expect("Failed to create dir");
        fs::write(dir.join("a.txt"), "1").expect("Failed to write");
        fs::write(dir.join("b.txt"), "2").expect("Failed to write");
        fs::write(dir.join("c.csv"), "3").expect("Failed to write");

        let outcome = setup
            .dispatcher()
            .handle_event(&FileEvent::modified(dir.clone(), true))
            .expect("Modified dir should succeed")
            .expect("Directory should have been moved");

        assert!(!dir.exists());
        assert_eq!(outcome.destination, setup.folder("docs").join("bundle"));
        assert!(outcome.destination.join("c.csv").exists());
    }

    #[test]
    fn test_empty_directory_exhausts_retries() {
        let setup = Setup::new();
        let dir = setup.folder("empty");
        fs::create_dir(&dir).expect("Failed to create dir");

        let result = setup
            .dispatcher()
            .handle_event(&FileEvent::modified(dir.clone(), true));

        assert!(matches!(
            result,
            Err(DispatchError::DirectoryUnresolved { attempts: 2, .. })
        ));
        assert!(dir.exists());
    }

    #[test]
    fn test_vanished_file_is_reported() {
        let setup = Setup::new();
        let result = setup
            .dispatcher()
            .handle_event(&FileEvent::modified(setup.folder("ghost.txt"), false));

        assert!(matches!(
            result,
            Err(DispatchError::Stability(StabilityError::FileVanished(_)))
        ));
    }

    #[test]
    fn test_dry_run_classifies_without_moving() {
        let setup = Setup::new();
        let path = setup.create_file("report.txt");

        let dispatcher = EventDispatcher::new(
            setup.rules_path.clone(),
            StabilityDetector::new(Duration::from_millis(5), 20),
            true,
        );
        let outcome = dispatcher
            .handle_event(&FileEvent::modified(path.clone(), false))
            .expect("Dry run should succeed");

        assert!(outcome.is_none());
        assert!(path.exists(), "Dry run must not move anything");
        assert!(!setup.folder("docs").exists());
    }

    #[test]
    fn test_rules_are_reloaded_between_events() {
        let setup = Setup::new();
        let dispatcher = setup.dispatcher();

        let first = setup.create_file("one.txt");
        dispatcher
            .handle_event(&FileEvent::modified(first, false))
            .expect("First event should succeed");

        // Redirect txt files without rebuilding the dispatcher.
        setup.write_rules(json!({
            "include": { "txt": setup.folder("text") },
            "ignore": [],
            "others": setup.folder("misc"),
        }));

        let second = setup.create_file("two.txt");
        let outcome = dispatcher
            .handle_event(&FileEvent::modified(second, false))
            .expect("Second event should succeed")
            .expect("File should have been moved");

        assert_eq!(outcome.destination, setup.folder("text").join("two.txt"));
    }

    #[test]
    fn test_missing_rules_file_is_recoverable() {
        let setup = Setup::new();
        fs::remove_file(&setup.rules_path).expect("Failed to remove rules");
        let path = setup.create_file("report.txt");

        let result = setup
            .dispatcher()
            .handle_event(&FileEvent::modified(path.clone(), false));

        assert!(matches!(
            result,
            Err(DispatchError::Rules(RulesError::RulesNotFound(_)))
        ));
        assert!(path.exists(), "A rules failure must leave the file alone");
    }

    #[test]
    fn test_dispatch_swallows_errors() {
        let setup = Setup::new();
        // ghost.txt does not exist; handle_event would error.
        setup
            .dispatcher()
            .dispatch(&FileEvent::modified(setup.folder("ghost.txt"), false));
    }
}

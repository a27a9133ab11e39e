//! tidywatch - keep a directory tidy as files arrive
//!
//! This library watches a single directory and relocates new or completed
//! files (and directories) into destination folders chosen by file
//! extension, according to a JSON rules file that is re-read on every
//! decision. Files still being written are left alone until their size
//! settles, name collisions are resolved without overwriting, and missing
//! destination folders are created on demand.

pub mod cli;
pub mod config;
pub mod dispatcher;
pub mod file_classifier;
pub mod file_mover;
pub mod output;
pub mod stability;
pub mod watcher;

pub use config::{RuleSet, RulesError};
pub use dispatcher::{DispatchError, EventDispatcher, EventKind, FileEvent};
pub use file_classifier::{Classification, Classifier};
pub use file_mover::{FileMover, MoveError, MoveOutcome};
pub use stability::{StabilityDetector, StabilityError};
pub use watcher::{WatchError, WatchSession};

pub use cli::{WatchArgs, run};

//! Command-line surface and session wiring.
//!
//! Parses the watch arguments, validates the rules file once up front (a
//! broken configuration is fatal at startup, recoverable afterwards since it
//! is re-read per event), optionally sweeps the files already present, and
//! then hands off to the watch session.

use crate::config::RuleSet;
use crate::dispatcher::{EventDispatcher, FileEvent};
use crate::output::OutputFormatter;
use crate::stability::StabilityDetector;
use crate::watcher::WatchSession;
use clap::Parser;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Size-comparison cap for the stability wait; at the default interval this
/// bounds a single file's wait to a few minutes.
const STABILITY_MAX_POLLS: u32 = 60;

/// Watch a directory and sort incoming files into folders by extension.
#[derive(Debug, Parser)]
#[command(name = "tidywatch", version, about)]
pub struct WatchArgs {
    /// Directory to watch.
    #[arg(default_value = ".")]
    pub directory: PathBuf,

    /// Path to the JSON rules file.
    #[arg(short, long, default_value = "config.json")]
    pub config: PathBuf,

    /// Polling interval in seconds.
    #[arg(short, long, default_value_t = 5)]
    pub interval: u64,

    /// Log routing decisions without moving any files.
    #[arg(long)]
    pub dry_run: bool,

    /// Organize files already in the directory before watching.
    #[arg(long)]
    pub sweep: bool,
}

/// Runs the watch session described by `args`, blocking until the watch
/// ends.
///
/// # Errors
///
/// Returns a message describing an unreadable or malformed rules file, an
/// invalid watch directory, or a failure to establish the watch itself.
pub fn run(args: WatchArgs) -> Result<(), String> {
    // Validate the rules once before anything moves; later reloads surface
    // per-event instead.
    RuleSet::load(&args.config).map_err(|e| format!("Error loading rules: {}", e))?;

    let interval = Duration::from_secs(args.interval);
    let dispatcher = EventDispatcher::new(
        args.config.clone(),
        StabilityDetector::new(interval, STABILITY_MAX_POLLS),
        args.dry_run,
    );

    if args.sweep {
        let swept = sweep_existing(&dispatcher, &args.directory, &args.config)?;
        OutputFormatter::success(&format!("Swept {} existing file(s)", swept));
    }

    let session = WatchSession::new(args.directory, interval, dispatcher)
        .map_err(|e| format!("Error: {}", e))?;
    session.run().map_err(|e| format!("Error: {}", e))
}

/// Dispatches a synthetic `modified` event for every regular file already at
/// the top level of `root`, so a backlog is organized before watching
/// starts. The rules file itself is skipped if it lives inside the root.
///
/// Returns the number of files dispatched.
pub fn sweep_existing(
    dispatcher: &EventDispatcher,
    root: &Path,
    rules_path: &Path,
) -> Result<usize, String> {
    let entries = fs::read_dir(root)
        .map_err(|e| format!("Error reading directory {}: {}", root.display(), e))?;
    let rules_canonical = fs::canonicalize(rules_path).ok();

    let mut swept = 0;
    for entry in entries.flatten() {
        if let Ok(file_type) = entry.file_type()
            && file_type.is_file()
        {
            let path = entry.path();
            if rules_canonical.is_some() && fs::canonicalize(&path).ok() == rules_canonical {
                continue;
            }
            dispatcher.dispatch(&FileEvent::modified(path, false));
            swept += 1;
        }
    }

    Ok(swept)
}

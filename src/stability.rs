//! Write-completion detection.
//!
//! A file that just appeared may still be mid-copy. Before acting on it, the
//! dispatcher polls its size until two consecutive reads agree, taking an
//! unchanged size as the signal that the writer is done.

use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

/// Errors that can occur while waiting for a file to stop growing.
#[derive(Debug)]
pub enum StabilityError {
    /// The file disappeared between polls.
    FileVanished(PathBuf),
    /// The size was still changing after the configured number of polls.
    Timeout { path: PathBuf, polls: u32 },
    /// IO error reading file metadata.
    IoError {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl std::fmt::Display for StabilityError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StabilityError::FileVanished(path) => {
                write!(f, "File vanished while waiting for it to settle: {}", path.display())
            }
            StabilityError::Timeout { path, polls } => {
                write!(
                    f,
                    "File {} was still growing after {} polls",
                    path.display(),
                    polls
                )
            }
            StabilityError::IoError { path, source } => {
                write!(f, "IO error polling {}: {}", path.display(), source)
            }
        }
    }
}

impl std::error::Error for StabilityError {}

/// Polls a file's size until it stops changing.
///
/// The wait is bounded: after `max_polls` size comparisons without two equal
/// consecutive reads, the wait gives up with [`StabilityError::Timeout`] so a
/// wedged transfer cannot stall event handling forever.
#[derive(Debug, Clone)]
pub struct StabilityDetector {
    poll_interval: Duration,
    max_polls: u32,
}

impl StabilityDetector {
    pub fn new(poll_interval: Duration, max_polls: u32) -> Self {
        Self {
            poll_interval,
            max_polls,
        }
    }

    /// Blocks until two consecutive size reads of `path` agree, then returns
    /// the settled size in bytes.
    ///
    /// # Errors
    ///
    /// Returns [`StabilityError::FileVanished`] if the file disappears
    /// during polling, and [`StabilityError::Timeout`] once `max_polls`
    /// comparisons have seen a still-changing size.
    pub fn await_stable(&self, path: &Path) -> Result<u64, StabilityError> {
        let mut last_size = self.size_of(path)?;

        for _ in 0..self.max_polls {
            thread::sleep(self.poll_interval);
            let size = self.size_of(path)?;
            if size == last_size {
                return Ok(size);
            }
            last_size = size;
        }

        Err(StabilityError::Timeout {
            path: path.to_path_buf(),
            polls: self.max_polls,
        })
    }

    fn size_of(&self, path: &Path) -> Result<u64, StabilityError> {
        match std::fs::metadata(path) {
            Ok(meta) => Ok(meta.len()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StabilityError::FileVanished(path.to_path_buf()))
            }
            Err(e) => Err(StabilityError::IoError {
                path: path.to_path_buf(),
                source: e,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::io::Write;
    use tempfile::TempDir;

    fn detector_ms(interval_ms: u64, max_polls: u32) -> StabilityDetector {
        StabilityDetector::new(Duration::from_millis(interval_ms), max_polls)
    }

    #[test]
    fn test_settled_file_returns_size() {
        let dir = TempDir::new().expect("Failed to create temp directory");
        let path = dir.path().join("done.bin");
        fs::write(&path, [0u8; 128]).expect("Failed to write file");

        let size = detector_ms(5, 10)
            .await_stable(&path)
            .expect("File should be stable");
        assert_eq!(size, 128);
    }

    #[test]
    fn test_missing_file_is_vanished() {
        let dir = TempDir::new().expect("Failed to create temp directory");
        let result = detector_ms(5, 10).await_stable(&dir.path().join("ghost.bin"));
        assert!(matches!(result, Err(StabilityError::FileVanished(_))));
    }

    #[test]
    fn test_growing_file_waits_for_settle() {
        let dir = TempDir::new().expect("Failed to create temp directory");
        let path = dir.path().join("incoming.bin");
        fs::write(&path, [0u8; 16]).expect("Failed to write file");

        let writer_path = path.clone();
        let writer = std::thread::spawn(move || {
            // Grow the file a few times, then stop.
            for _ in 0..3 {
                thread::sleep(Duration::from_millis(5));
                let mut file = fs::OpenOptions::new()
                    .append(true)
                    .open(&writer_path)
                    .expect("Failed to open file");
                file.write_all(&[1u8; 16]).expect("Failed to append");
            }
        });

        // The poll interval comfortably exceeds the writer's runtime, so the
        // first comparison sees the final size against the initial one and
        // the second confirms it.
        let size = detector_ms(100, 100)
            .await_stable(&path)
            .expect("File should eventually settle");
        writer.join().expect("Writer thread panicked");

        // The detector must not have returned before the final size.
        assert_eq!(size, fs::metadata(&path).unwrap().len());
        assert_eq!(size, 64);
    }

    #[test]
    fn test_file_deleted_mid_wait_is_vanished() {
        let dir = TempDir::new().expect("Failed to create temp directory");
        let path = dir.path().join("fleeting.bin");
        fs::write(&path, [0u8; 16]).expect("Failed to write file");

        let remover_path = path.clone();
        let remover = std::thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            fs::remove_file(&remover_path).expect("Failed to remove file");
        });

        // First size read sees the file; by the first comparison it is gone.
        let result = detector_ms(100, 100).await_stable(&path);
        remover.join().expect("Remover thread panicked");
        assert!(matches!(result, Err(StabilityError::FileVanished(_))));
    }

    #[test]
    fn test_poll_cap_triggers_timeout() {
        let dir = TempDir::new().expect("Failed to create temp directory");
        let path = dir.path().join("endless.bin");
        fs::write(&path, [0u8; 1]).expect("Failed to write file");

        let stop = std::sync::Arc::new(std::sync::atomic::AtomicBool::new(false));
        let writer_stop = stop.clone();
        let writer_path = path.clone();
        let writer = std::thread::spawn(move || {
            while !writer_stop.load(std::sync::atomic::Ordering::Relaxed) {
                let mut file = fs::OpenOptions::new()
                    .append(true)
                    .open(&writer_path)
                    .expect("Failed to open file");
                file.write_all(&[1u8; 8]).expect("Failed to append");
                thread::sleep(Duration::from_millis(5));
            }
        });

        // Appends land every few milliseconds, so every 50ms comparison sees
        // a changed size until the cap trips.
        let result = detector_ms(50, 3).await_stable(&path);
        stop.store(true, std::sync::atomic::Ordering::Relaxed);
        writer.join().expect("Writer thread panicked");

        assert!(matches!(
            result,
            Err(StabilityError::Timeout { polls: 3, .. })
        ));
    }
}

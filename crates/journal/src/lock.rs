//! Cross-process exclusive lock for the journal file.
//!
//! No locking crate appears in this workspace's dependency set, so the lock
//! is a sibling lockfile created with `O_CREAT | O_EXCL` semantics
//! (`OpenOptions::create_new`). Creation is atomic on every platform we
//! target; whichever process creates the file owns the store until the
//! guard drops.

use std::fs::OpenOptions;
use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use crate::error::JournalError;

/// How long `acquire` keeps retrying before reporting `Locked`.
const ACQUIRE_WINDOW: Duration = Duration::from_millis(2000);
const RETRY_INTERVAL: Duration = Duration::from_millis(10);

/// Guard for the store's exclusive lock. Dropping it releases the lock.
#[derive(Debug)]
pub(crate) struct StoreLock {
    lock_path: PathBuf,
}

impl StoreLock {
    /// Acquire the lock for the journal at `journal_path`, retrying briefly
    /// if another invocation holds it.
    pub(crate) fn acquire(journal_path: &Path) -> Result<Self, JournalError> {
        let lock_path = lock_path_for(journal_path);
        if let Some(parent) = lock_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| JournalError::io(&lock_path, e))?;
        }

        let deadline = Instant::now() + ACQUIRE_WINDOW;
        loop {
            match OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&lock_path)
            {
                Ok(mut file) => {
                    // Owner pid, for post-mortem inspection of a leftover lock.
                    let _ = writeln!(file, "{}", std::process::id());
                    return Ok(Self { lock_path });
                }
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                    if Instant::now() >= deadline {
                        return Err(JournalError::Locked { lock_path });
                    }
                    std::thread::sleep(RETRY_INTERVAL);
                }
                Err(e) => return Err(JournalError::io(&lock_path, e)),
            }
        }
    }
}

impl Drop for StoreLock {
    fn drop(&mut self) {
        // Best effort; a leftover lockfile surfaces as `Locked` with the path.
        let _ = std::fs::remove_file(&self.lock_path);
    }
}

pub(crate) fn lock_path_for(journal_path: &Path) -> PathBuf {
    let mut name = journal_path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "journal".into());
    name.push(".lock");
    journal_path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acquire_and_release() {
        let tmp = tempfile::tempdir().unwrap();
        let journal = tmp.path().join("journal.json");

        let lock = StoreLock::acquire(&journal).unwrap();
        assert!(lock_path_for(&journal).exists());
        drop(lock);
        assert!(!lock_path_for(&journal).exists());
    }

    #[test]
    fn contended_lock_reports_locked() {
        let tmp = tempfile::tempdir().unwrap();
        let journal = tmp.path().join("journal.json");

        // Simulate another process by writing the lockfile directly.
        std::fs::write(lock_path_for(&journal), "99999\n").unwrap();

        match StoreLock::acquire(&journal) {
            Err(JournalError::Locked { lock_path }) => {
                assert_eq!(lock_path, lock_path_for(&journal));
            }
            other => panic!("expected Locked, got {other:?}"),
        }
    }

    #[test]
    fn lock_path_appends_suffix() {
        let p = lock_path_for(Path::new("/tmp/x/journal.json"));
        assert_eq!(p, Path::new("/tmp/x/journal.json.lock"));
    }
}

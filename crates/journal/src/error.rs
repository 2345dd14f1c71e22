use std::path::PathBuf;

/// All errors that can be returned by the journal store.
#[derive(Debug, thiserror::Error)]
pub enum JournalError {
    /// Another process holds the store's exclusive lock and it was not
    /// released within the acquisition window.
    #[error("journal is locked by another process ({lock_path})")]
    Locked { lock_path: PathBuf },

    /// No entry carries the given sequence number.
    #[error("no journal entry with sequence number {seq}")]
    UnknownSequence { seq: u64 },

    /// The entry exists but has no change for the given field.
    #[error("journal entry {seq} has no field {field:?}")]
    UnknownField { seq: u64, field: String },

    /// The journal file exists but could not be parsed.
    #[error("journal file {path} is corrupt: {detail}")]
    Corrupt { path: PathBuf, detail: String },

    /// Filesystem-level failure reading or writing the store.
    #[error("journal i/o error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl JournalError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        JournalError::Io {
            path: path.into(),
            source,
        }
    }
}

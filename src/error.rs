/*!
error module defines the error types used in bgp-distill.
*/
use std::io;
use std::path::PathBuf;
use std::process::ExitStatus;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    /// The store file could not be opened within the configured open timeout.
    ///
    /// ## Occurs during:
    ///  - [KeyValueStore::create](crate::store::KeyValueStore::create), typically because another
    ///    process holds the store lock
    #[error("cannot open store at {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: rocksdb::Error,
    },
    /// The store has been closed or destroyed.
    #[error("store is closed")]
    Closed,
    /// A read or write was attempted before a container was selected.
    #[error("no container selected")]
    NoContainer,
    #[error(transparent)]
    Rocks(#[from] rocksdb::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
}

#[derive(Debug, Error)]
pub enum DistillError {
    #[error(transparent)]
    Store(#[from] StoreError),
    /// A batched append reported failure while draining a window. Fatal to the run.
    #[error("batch append failed: {0}")]
    BatchWrite(#[source] StoreError),
    /// Every sender of the completion sink went away before the expected number of completions
    /// arrived.
    #[error("completion sink disconnected with {outstanding} appends outstanding")]
    CompletionLost { outstanding: usize },
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error("cannot open input: {0}")]
    Input(#[from] oneio::OneIoError),
    /// The external `bgpdump` conversion did not complete successfully.
    #[error("bgpdump failed on {source_file}: {reason}")]
    Bgpdump { source_file: PathBuf, reason: String },
    #[error("invalid AS number {0:?}")]
    InvalidAsn(String),
    #[error("malformed record: {0}")]
    MalformedRecord(String),
}

impl DistillError {
    pub(crate) fn bgpdump_status(source_file: PathBuf, status: ExitStatus, output: &[u8]) -> Self {
        DistillError::Bgpdump {
            source_file,
            reason: format!("{}, output: {:?}", status, String::from_utf8_lossy(output)),
        }
    }
}

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use metadata::{MetadataError, ScanRecord};
use redb::{CommitError, DatabaseError, StorageError, TableError, TransactionError};
use serde::{Deserialize, Serialize};

pub mod artwork;
mod cascade;
pub mod episode;
pub mod fingerprint;
pub mod folders;
pub mod import;
pub mod reconcile;
pub mod scanner;
pub mod store;
pub mod sweep;
pub mod user;

#[cfg(test)]
mod testing;

pub use fingerprint::{fingerprint, fingerprint_with_window, DEFAULT_HASH_WINDOW};
pub use folders::FolderCache;
pub use import::{run_import, ImportMode, ImportProgress, ImportSummary};
pub use reconcile::{ReconcileAction, ReconcileOutcome, Reconciler};
pub use scanner::{ScanItem, ScanProfile, Scanner, DEFAULT_EXTENSIONS};
pub use store::{Catalog, CatalogStats};
pub use sweep::{backfill_missing_hashes, SweepStats};
pub use user::UserData;

/// Parses one audio file into a [`ScanRecord`]. `Ok(None)` skips the file.
pub trait MetadataExtractor: Send + Sync {
    fn extract(&self, path: &Path) -> Result<Option<ScanRecord>, MetadataError>;
}

/// Tag reader backed by `lofty`.
#[derive(Clone, Copy, Debug, Default)]
pub struct LoftyExtractor;

impl MetadataExtractor for LoftyExtractor {
    fn extract(&self, path: &Path) -> Result<Option<ScanRecord>, MetadataError> {
        metadata::read_record(path).map(Some)
    }
}

#[derive(Debug)]
pub enum LibraryError {
    Io(std::io::Error),
    Metadata(MetadataError),
    Redb(redb::Error),
    Bincode(Box<bincode::ErrorKind>),
    KeyParse(String),
    VersionMismatch(u32),
    OutsideRoot(PathBuf),
}

impl std::fmt::Display for LibraryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LibraryError::Io(err) => write!(f, "io error: {}", err),
            LibraryError::Metadata(err) => write!(f, "metadata error: {}", err),
            LibraryError::Redb(err) => write!(f, "db error: {}", err),
            LibraryError::Bincode(err) => write!(f, "bincode error: {}", err),
            LibraryError::KeyParse(value) => write!(f, "key parse error: {}", value),
            LibraryError::VersionMismatch(version) => {
                write!(f, "catalog version mismatch: {}", version)
            }
            LibraryError::OutsideRoot(path) => write!(f, "path outside media roots: {:?}", path),
        }
    }
}

impl std::error::Error for LibraryError {}

impl From<std::io::Error> for LibraryError {
    fn from(err: std::io::Error) -> Self {
        LibraryError::Io(err)
    }
}

impl From<MetadataError> for LibraryError {
    fn from(err: MetadataError) -> Self {
        LibraryError::Metadata(err)
    }
}

impl From<redb::Error> for LibraryError {
    fn from(err: redb::Error) -> Self {
        LibraryError::Redb(err)
    }
}

impl From<DatabaseError> for LibraryError {
    fn from(err: DatabaseError) -> Self {
        LibraryError::Redb(err.into())
    }
}

impl From<TableError> for LibraryError {
    fn from(err: TableError) -> Self {
        LibraryError::Redb(err.into())
    }
}

impl From<TransactionError> for LibraryError {
    fn from(err: TransactionError) -> Self {
        LibraryError::Redb(err.into())
    }
}

impl From<StorageError> for LibraryError {
    fn from(err: StorageError) -> Self {
        LibraryError::Redb(err.into())
    }
}

impl From<CommitError> for LibraryError {
    fn from(err: CommitError) -> Self {
        LibraryError::Redb(err.into())
    }
}

impl From<Box<bincode::ErrorKind>> for LibraryError {
    fn from(err: Box<bincode::ErrorKind>) -> Self {
        LibraryError::Bincode(err)
    }
}

pub(crate) fn encode_value<T: Serialize>(value: &T) -> Result<Vec<u8>, LibraryError> {
    Ok(bincode::serialize(value)?)
}

pub(crate) fn decode_value<T: for<'de> Deserialize<'de>>(bytes: &[u8]) -> Result<T, LibraryError> {
    Ok(bincode::deserialize(bytes)?)
}

pub(crate) fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_else(|_| Duration::from_secs(0))
        .as_secs()
}

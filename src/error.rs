// ⚠️ Error types for the statistics store, history queries and exports

use crate::snapshot::{DataSource, SnapshotKind};
use std::path::PathBuf;
use thiserror::Error;

/// Failures talking to the snapshot store
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("statistics store unavailable at {path}")]
    Unavailable {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    #[error("failed to create directory {path} for the statistics store")]
    Directory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to create or migrate the statistics schema")]
    Schema(#[source] rusqlite::Error),

    #[error("failed to write {kind} snapshot")]
    Write {
        kind: SnapshotKind,
        #[source]
        source: rusqlite::Error,
    },

    #[error("failed to read snapshots")]
    Read(#[source] rusqlite::Error),

    #[error("duplicate {kind} snapshot for {data_source} at {timestamp}")]
    Duplicate {
        kind: SnapshotKind,
        data_source: DataSource,
        timestamp: String,
    },

    #[error("corrupt row in {table}: {reason}")]
    CorruptRow { table: &'static str, reason: String },
}

/// Failures answering a history query
#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("unknown {role} column {column:?}")]
    UnknownColumn { role: &'static str, column: String },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}

/// Failures writing an export
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("CSV export failed")]
    Csv(#[from] csv::Error),

    #[error("JSON export failed")]
    Json(#[from] serde_json::Error),

    #[error("export write failed")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown data source {0:?} (expected births, marriages or deaths)")]
pub struct UnknownDataSource(pub String);

pub type StoreResult<T> = std::result::Result<T, PersistenceError>;
pub type HistoryResult<T> = std::result::Result<T, HistoryError>;

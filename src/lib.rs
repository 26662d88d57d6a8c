// Genealogy Statistics - Core Library
// Normalization of archival record fields and an append-only history of
// statistics snapshots, exposed for the CLI and tests

pub mod rules;      // Rule Table - rules as data
pub mod normalize;  // Normalization Engine
pub mod snapshot;   // Statistics Record Types
pub mod error;
pub mod db;         // Statistics Store (SQLite)
pub mod history;    // Comparison/Retrieval Service
pub mod export;
pub mod config;

// Re-export commonly used types
pub use rules::{EndingRule, NormalizationRuleSet};
pub use normalize::{
    DateNormalization, DatePrecision, DateStatus, DerivedColumn, FieldKind, FieldValue, Normalizer,
    normalize_date, normalize_location, normalize_surname,
};
pub use snapshot::{
    DataSource, SnapshotKind, StatField, StatisticsSnapshot,
    SummarySnapshot, ValueCountSnapshot, YearlySnapshot,
};
pub use error::{ExportError, HistoryError, PersistenceError, UnknownDataSource};
pub use db::{DateRange, SnapshotFilter, StatisticsStore, SCHEMA_VERSION};
pub use history::{Comparison, GroupKey, GroupValue, HistoryService, SeriesPoint};
pub use export::ExportFormat;
pub use config::{AppConfig, JournalMode, StoreConfig};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

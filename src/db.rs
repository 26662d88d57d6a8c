// 🗄️ Statistics Store
// Append-only SQLite history of statistics snapshots

use crate::config::StoreConfig;
use crate::error::{PersistenceError, StoreResult};
use crate::snapshot::{
    truncate_to_micros, DataSource, SnapshotKind, StatisticsSnapshot, SummarySnapshot, ValueCountSnapshot,
    YearlySnapshot,
};
use chrono::{DateTime, NaiveDate, SecondsFormat, TimeDelta, Utc};
use rusqlite::types::{Type, Value};
use rusqlite::{params, params_from_iter, Connection, ErrorCode, Row, TransactionBehavior};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs;
use std::str::FromStr;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tracing::{debug, info, warn};

pub const SCHEMA_VERSION: i64 = 1;

// ==========================================================================
// Schema
// Every snapshot row carries a global `seq` from snapshot_sequence so that
// rows written at the same timestamp keep their insertion order.
// ==========================================================================
const SCHEMA_SQL: &str = "
    CREATE TABLE IF NOT EXISTS schema_version (
        version INTEGER NOT NULL,
        applied_at TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS snapshot_sequence (
        seq INTEGER PRIMARY KEY AUTOINCREMENT,
        kind TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS summary_statistics (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        seq INTEGER NOT NULL UNIQUE,
        timestamp TEXT NOT NULL,
        data_source TEXT NOT NULL,
        total_records INTEGER NOT NULL,
        missing_values INTEGER NOT NULL,
        unique_years INTEGER NOT NULL,
        records_matching_condition INTEGER NOT NULL,
        unique_normalized_values INTEGER NOT NULL,
        additional_data TEXT
    );

    CREATE TABLE IF NOT EXISTS yearly_comparison (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        seq INTEGER NOT NULL UNIQUE,
        timestamp TEXT NOT NULL,
        data_source TEXT NOT NULL,
        year INTEGER NOT NULL,
        total_records INTEGER NOT NULL,
        records_matching_condition INTEGER NOT NULL,
        condition_name TEXT NOT NULL,
        UNIQUE (data_source, year, timestamp, condition_name)
    );

    CREATE TABLE IF NOT EXISTS value_counts (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        seq INTEGER NOT NULL UNIQUE,
        timestamp TEXT NOT NULL,
        data_source TEXT NOT NULL,
        column_name TEXT NOT NULL,
        value TEXT NOT NULL,
        count INTEGER NOT NULL,
        UNIQUE (data_source, column_name, value, timestamp)
    );

    CREATE INDEX IF NOT EXISTS idx_summary_source_time ON summary_statistics(data_source, timestamp);
    CREATE INDEX IF NOT EXISTS idx_yearly_source_time ON yearly_comparison(data_source, timestamp);
    CREATE INDEX IF NOT EXISTS idx_value_counts_source_time ON value_counts(data_source, timestamp);
    CREATE INDEX IF NOT EXISTS idx_value_counts_column ON value_counts(column_name, timestamp);

    CREATE TRIGGER IF NOT EXISTS summary_statistics_no_update BEFORE UPDATE ON summary_statistics
    BEGIN SELECT RAISE(ABORT, 'statistics snapshots are append-only'); END;
    CREATE TRIGGER IF NOT EXISTS summary_statistics_no_delete BEFORE DELETE ON summary_statistics
    BEGIN SELECT RAISE(ABORT, 'statistics snapshots are append-only'); END;
    CREATE TRIGGER IF NOT EXISTS yearly_comparison_no_update BEFORE UPDATE ON yearly_comparison
    BEGIN SELECT RAISE(ABORT, 'statistics snapshots are append-only'); END;
    CREATE TRIGGER IF NOT EXISTS yearly_comparison_no_delete BEFORE DELETE ON yearly_comparison
    BEGIN SELECT RAISE(ABORT, 'statistics snapshots are append-only'); END;
    CREATE TRIGGER IF NOT EXISTS value_counts_no_update BEFORE UPDATE ON value_counts
    BEGIN SELECT RAISE(ABORT, 'statistics snapshots are append-only'); END;
    CREATE TRIGGER IF NOT EXISTS value_counts_no_delete BEFORE DELETE ON value_counts
    BEGIN SELECT RAISE(ABORT, 'statistics snapshots are append-only'); END;
";

fn table_name(kind: SnapshotKind) -> &'static str {
    match kind {
        SnapshotKind::Summary => "summary_statistics",
        SnapshotKind::Yearly => "yearly_comparison",
        SnapshotKind::ValueCount => "value_counts",
    }
}

fn select_columns(kind: SnapshotKind) -> &'static str {
    match kind {
        SnapshotKind::Summary => {
            "seq, timestamp, data_source, total_records, missing_values, unique_years, \
             records_matching_condition, unique_normalized_values, additional_data"
        }
        SnapshotKind::Yearly => {
            "seq, timestamp, data_source, year, total_records, records_matching_condition, condition_name"
        }
        SnapshotKind::ValueCount => "seq, timestamp, data_source, column_name, value, count",
    }
}

/// Stored timestamp form. Fixed width, so text order is time order.
pub(crate) fn format_timestamp(timestamp: &DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Smallest stored (microsecond) timestamp not before `timestamp`
fn ceil_to_micros(timestamp: DateTime<Utc>) -> DateTime<Utc> {
    let truncated = truncate_to_micros(timestamp);
    if truncated < timestamp {
        truncated + TimeDelta::microseconds(1)
    } else {
        truncated
    }
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    DateTime::parse_from_rfc3339(raw).map(|t| t.with_timezone(&Utc))
}

// ============================================================================
// FILTERS
// ============================================================================

/// Inclusive time window; open on a side when that bound is `None`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

impl DateRange {
    pub fn new(start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) -> Self {
        DateRange { start, end }
    }

    pub fn all() -> Self {
        DateRange::default()
    }

    pub fn since(start: DateTime<Utc>) -> Self {
        DateRange::new(Some(start), None)
    }

    pub fn until(end: DateTime<Utc>) -> Self {
        DateRange::new(None, Some(end))
    }

    /// Whole calendar days: `end` covers its day through 23:59:59.999999
    pub fn days(start: Option<NaiveDate>, end: Option<NaiveDate>) -> Self {
        DateRange {
            start: start
                .and_then(|d| d.and_hms_opt(0, 0, 0))
                .map(|t| t.and_utc()),
            end: end
                .and_then(|d| d.and_hms_micro_opt(23, 59, 59, 999_999))
                .map(|t| t.and_utc()),
        }
    }

    pub fn contains(&self, timestamp: DateTime<Utc>) -> bool {
        self.start.map_or(true, |s| timestamp >= s) && self.end.map_or(true, |e| timestamp <= e)
    }
}

/// Snapshot selection. Kind-specific criteria (year, condition, column,
/// value) restrict the result to the kinds that carry them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SnapshotFilter {
    pub data_source: Option<DataSource>,
    pub kind: Option<SnapshotKind>,
    pub range: DateRange,
    pub year: Option<i32>,
    pub condition_name: Option<String>,
    pub column_name: Option<String>,
    pub value: Option<String>,
}

impl SnapshotFilter {
    pub fn new() -> Self {
        SnapshotFilter::default()
    }

    pub fn for_source(data_source: Option<DataSource>) -> Self {
        SnapshotFilter {
            data_source,
            ..SnapshotFilter::default()
        }
    }

    pub fn with_kind(mut self, kind: SnapshotKind) -> Self {
        self.kind = Some(kind);
        self
    }

    pub fn with_range(mut self, range: DateRange) -> Self {
        self.range = range;
        self
    }

    pub fn with_year(mut self, year: i32) -> Self {
        self.year = Some(year);
        self
    }

    pub fn with_condition(mut self, condition_name: &str) -> Self {
        self.condition_name = Some(condition_name.to_string());
        self
    }

    pub fn with_column(mut self, column_name: &str) -> Self {
        self.column_name = Some(column_name.to_string());
        self
    }

    pub fn with_value(mut self, value: &str) -> Self {
        self.value = Some(value.to_string());
        self
    }

    /// Kinds this filter can match, in storage order
    pub fn applicable_kinds(&self) -> Vec<SnapshotKind> {
        SnapshotKind::ALL
            .into_iter()
            .filter(|kind| self.kind.map_or(true, |k| k == *kind))
            .filter(|kind| {
                let yearly_only = self.year.is_some() || self.condition_name.is_some();
                let counts_only = self.column_name.is_some() || self.value.is_some();
                (!yearly_only || *kind == SnapshotKind::Yearly)
                    && (!counts_only || *kind == SnapshotKind::ValueCount)
            })
            .collect()
    }
}

#[derive(Default)]
struct WhereClause {
    conditions: Vec<String>,
    params: Vec<Value>,
}

impl WhereClause {
    fn for_filter(kind: SnapshotKind, filter: &SnapshotFilter) -> Self {
        let mut clause = WhereClause::default();

        if let Some(source) = filter.data_source {
            clause.push("data_source =", Value::Text(source.as_str().to_string()));
        }
        if let Some(start) = filter.range.start {
            clause.push("timestamp >=", Value::Text(format_timestamp(&ceil_to_micros(start))));
        }
        if let Some(end) = filter.range.end {
            clause.push("timestamp <=", Value::Text(format_timestamp(&end)));
        }

        match kind {
            SnapshotKind::Yearly => {
                if let Some(year) = filter.year {
                    clause.push("year =", Value::Integer(i64::from(year)));
                }
                if let Some(condition) = &filter.condition_name {
                    clause.push("condition_name =", Value::Text(condition.clone()));
                }
            }
            SnapshotKind::ValueCount => {
                if let Some(column) = &filter.column_name {
                    clause.push("column_name =", Value::Text(column.clone()));
                }
                if let Some(value) = &filter.value {
                    clause.push("value =", Value::Text(value.clone()));
                }
            }
            SnapshotKind::Summary => {}
        }

        clause
    }

    fn push(&mut self, condition: &str, value: Value) {
        self.params.push(value);
        self.conditions.push(format!("{} ?{}", condition, self.params.len()));
    }

    fn sql(&self) -> String {
        if self.conditions.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", self.conditions.join(" AND "))
        }
    }
}

// ============================================================================
// STORE
// ============================================================================

/// Handle to the snapshot database. Safe to share between threads;
/// statements are serialized on one connection.
pub struct StatisticsStore {
    conn: Mutex<Connection>,
}

impl StatisticsStore {
    /// Open (creating if needed) the database file and its schema
    pub fn open(config: &StoreConfig) -> StoreResult<Self> {
        if let Some(parent) = config.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| PersistenceError::Directory {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let unavailable = |source| PersistenceError::Unavailable {
            path: config.path.clone(),
            source,
        };

        let conn = Connection::open(&config.path).map_err(unavailable)?;
        conn.busy_timeout(Duration::from_millis(config.busy_timeout_ms))
            .map_err(unavailable)?;
        conn.pragma_update(None, "journal_mode", config.journal_mode.pragma_value())
            .map_err(unavailable)?;

        let store = StatisticsStore::attach(conn);
        store.initialize()?;

        info!(path = %config.path.display(), "opened statistics store");
        Ok(store)
    }

    pub fn open_in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory().map_err(|source| PersistenceError::Unavailable {
            path: ":memory:".into(),
            source,
        })?;

        let store = StatisticsStore::attach(conn);
        store.initialize()?;
        Ok(store)
    }

    /// Wrap an existing connection without touching its schema
    pub fn attach(conn: Connection) -> Self {
        StatisticsStore {
            conn: Mutex::new(conn),
        }
    }

    fn connection(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Create tables and indexes if missing. Existing data is untouched.
    pub fn initialize(&self) -> StoreResult<()> {
        let mut conn = self.connection();
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(PersistenceError::Schema)?;

        tx.execute_batch(SCHEMA_SQL).map_err(PersistenceError::Schema)?;
        tx.execute(
            "INSERT INTO schema_version (version, applied_at)
             SELECT ?1, ?2 WHERE NOT EXISTS (SELECT 1 FROM schema_version)",
            params![SCHEMA_VERSION, format_timestamp(&Utc::now())],
        )
        .map_err(PersistenceError::Schema)?;

        tx.commit().map_err(PersistenceError::Schema)?;

        debug!(version = SCHEMA_VERSION, "statistics schema ready");
        Ok(())
    }

    /// Version recorded at first initialization (0 when absent)
    pub fn schema_version(&self) -> StoreResult<i64> {
        self.connection()
            .query_row("SELECT COALESCE(MAX(version), 0) FROM schema_version", [], |row| row.get(0))
            .map_err(PersistenceError::Read)
    }

    /// Append one snapshot, stamping it with the current time unless it
    /// carries a timestamp. Returns the snapshot as stored.
    pub fn record(&self, snapshot: impl Into<StatisticsSnapshot>) -> StoreResult<StatisticsSnapshot> {
        let mut recorded = self.record_run(vec![snapshot.into()])?;
        recorded
            .pop()
            .ok_or_else(|| PersistenceError::CorruptRow {
                table: "snapshot_sequence",
                reason: "recorded run returned no snapshot".to_string(),
            })
    }

    /// Append the snapshots of one statistics run in a single transaction.
    /// Unstamped snapshots share one timestamp; on error nothing is written.
    pub fn record_run(&self, snapshots: Vec<StatisticsSnapshot>) -> StoreResult<Vec<StatisticsSnapshot>> {
        let mut conn = self.connection();
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(|source| PersistenceError::Write {
                kind: snapshots.first().map_or(SnapshotKind::Summary, |s| s.kind()),
                source,
            })?;
        // Clock is read while holding the write lock, so seq order is time order
        let now = Utc::now();

        let mut recorded = Vec::with_capacity(snapshots.len());
        for mut snapshot in snapshots {
            snapshot.stamp(now);
            let timestamp = format_timestamp(&snapshot.timestamp().unwrap_or(now));
            insert_snapshot(&tx, &snapshot, &timestamp)?;
            recorded.push(snapshot);
        }

        let kind = recorded.first().map_or(SnapshotKind::Summary, |s| s.kind());
        tx.commit()
            .map_err(|source| PersistenceError::Write { kind, source })?;

        debug!(snapshots = recorded.len(), "recorded statistics run");
        Ok(recorded)
    }

    /// Snapshots matching `filter`, ordered by timestamp then insertion
    pub fn query(&self, filter: &SnapshotFilter) -> StoreResult<Vec<StatisticsSnapshot>> {
        let conn = self.connection();

        let mut rows = Vec::new();
        for kind in filter.applicable_kinds() {
            rows.extend(query_kind(&conn, kind, filter)?);
        }

        rows.sort_by(|(seq_a, a), (seq_b, b)| a.timestamp().cmp(&b.timestamp()).then(seq_a.cmp(seq_b)));
        Ok(rows.into_iter().map(|(_, snapshot)| snapshot).collect())
    }

    /// Distinct timestamps of snapshots matching `filter`, oldest first
    pub fn distinct_timestamps(&self, filter: &SnapshotFilter) -> StoreResult<Vec<DateTime<Utc>>> {
        let conn = self.connection();

        let mut raw = BTreeSet::new();
        for kind in filter.applicable_kinds() {
            let table = table_name(kind);
            let clause = WhereClause::for_filter(kind, filter);
            let sql = format!("SELECT DISTINCT timestamp FROM {}{}", table, clause.sql());

            let mut stmt = conn.prepare(&sql).map_err(PersistenceError::Read)?;
            let timestamps = stmt
                .query_map(params_from_iter(clause.params.iter()), |row| row.get::<_, String>(0))
                .map_err(PersistenceError::Read)?
                .collect::<Result<Vec<_>, _>>()
                .map_err(PersistenceError::Read)?;
            raw.extend(timestamps.into_iter().map(|t| (table, t)));
        }

        let mut parsed = BTreeSet::new();
        for (table, text) in raw {
            let timestamp = parse_timestamp(&text).map_err(|e| PersistenceError::CorruptRow {
                table,
                reason: format!("timestamp {:?}: {}", text, e),
            })?;
            parsed.insert(timestamp);
        }

        Ok(parsed.into_iter().collect())
    }

    /// Total number of stored snapshots across all kinds
    pub fn count(&self) -> StoreResult<i64> {
        let conn = self.connection();

        let mut total = 0;
        for kind in SnapshotKind::ALL {
            let n: i64 = conn
                .query_row(&format!("SELECT COUNT(*) FROM {}", table_name(kind)), [], |row| row.get(0))
                .map_err(PersistenceError::Read)?;
            total += n;
        }
        Ok(total)
    }
}

fn insert_snapshot(conn: &Connection, snapshot: &StatisticsSnapshot, timestamp: &str) -> StoreResult<()> {
    let kind = snapshot.kind();
    let data_source = snapshot.data_source();

    let write_error = |source: rusqlite::Error| match source {
        rusqlite::Error::SqliteFailure(err, _)
            if err.code == ErrorCode::ConstraintViolation
                && err.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE =>
        {
            warn!(kind = %kind, source = %data_source, timestamp, "rejected duplicate snapshot");
            PersistenceError::Duplicate {
                kind,
                data_source,
                timestamp: timestamp.to_string(),
            }
        }
        other => PersistenceError::Write { kind, source: other },
    };

    conn.execute("INSERT INTO snapshot_sequence (kind) VALUES (?1)", [kind.as_str()])
        .map_err(write_error)?;
    let seq = conn.last_insert_rowid();

    match snapshot {
        StatisticsSnapshot::Summary(s) => conn.execute(
            "INSERT INTO summary_statistics (
                seq, timestamp, data_source, total_records, missing_values, unique_years,
                records_matching_condition, unique_normalized_values, additional_data
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                seq,
                timestamp,
                data_source.as_str(),
                s.total_records,
                s.missing_values,
                s.unique_years,
                s.records_matching_condition,
                s.unique_normalized_values,
                s.additional_data.as_ref().map(|v| v.to_string()),
            ],
        ),
        StatisticsSnapshot::Yearly(s) => conn.execute(
            "INSERT INTO yearly_comparison (
                seq, timestamp, data_source, year, total_records, records_matching_condition, condition_name
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                seq,
                timestamp,
                data_source.as_str(),
                s.year,
                s.total_records,
                s.records_matching_condition,
                s.condition_name,
            ],
        ),
        StatisticsSnapshot::ValueCount(s) => conn.execute(
            "INSERT INTO value_counts (seq, timestamp, data_source, column_name, value, count)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![seq, timestamp, data_source.as_str(), s.column_name, s.value, s.count],
        ),
    }
    .map_err(write_error)?;

    Ok(())
}

fn query_kind(
    conn: &Connection,
    kind: SnapshotKind,
    filter: &SnapshotFilter,
) -> StoreResult<Vec<(i64, StatisticsSnapshot)>> {
    let table = table_name(kind);
    let clause = WhereClause::for_filter(kind, filter);
    let sql = format!("SELECT {} FROM {}{}", select_columns(kind), table, clause.sql());

    let read_error = |e: rusqlite::Error| match e {
        rusqlite::Error::FromSqlConversionFailure(column, _, cause) => PersistenceError::CorruptRow {
            table,
            reason: format!("column {}: {}", column, cause),
        },
        other => PersistenceError::Read(other),
    };

    let mut stmt = conn.prepare(&sql).map_err(PersistenceError::Read)?;
    let rows = stmt
        .query_map(params_from_iter(clause.params.iter()), |row| decode_row(kind, row))
        .map_err(read_error)?
        .collect::<Result<Vec<_>, _>>()
        .map_err(read_error)?;

    Ok(rows)
}

fn decode<T, E>(column: usize, raw: &str, parse: impl FnOnce(&str) -> Result<T, E>) -> rusqlite::Result<T>
where
    E: std::error::Error + Send + Sync + 'static,
{
    parse(raw).map_err(|e| rusqlite::Error::FromSqlConversionFailure(column, Type::Text, Box::new(e)))
}

fn decode_row(kind: SnapshotKind, row: &Row<'_>) -> rusqlite::Result<(i64, StatisticsSnapshot)> {
    let seq: i64 = row.get(0)?;
    let timestamp = decode(1, &row.get::<_, String>(1)?, parse_timestamp)?;
    let data_source = decode(2, &row.get::<_, String>(2)?, DataSource::from_str)?;

    let snapshot = match kind {
        SnapshotKind::Summary => {
            let additional_data = match row.get::<_, Option<String>>(8)? {
                Some(raw) => Some(decode(8, &raw, |s| serde_json::from_str::<serde_json::Value>(s))?),
                None => None,
            };

            StatisticsSnapshot::Summary(SummarySnapshot {
                data_source,
                timestamp: Some(timestamp),
                total_records: row.get(3)?,
                missing_values: row.get(4)?,
                unique_years: row.get(5)?,
                records_matching_condition: row.get(6)?,
                unique_normalized_values: row.get(7)?,
                additional_data,
            })
        }
        SnapshotKind::Yearly => StatisticsSnapshot::Yearly(YearlySnapshot {
            data_source,
            timestamp: Some(timestamp),
            year: row.get(3)?,
            total_records: row.get(4)?,
            records_matching_condition: row.get(5)?,
            condition_name: row.get(6)?,
        }),
        SnapshotKind::ValueCount => StatisticsSnapshot::ValueCount(ValueCountSnapshot {
            data_source,
            timestamp: Some(timestamp),
            column_name: row.get(3)?,
            value: row.get(4)?,
            count: row.get(5)?,
        }),
    };

    Ok((seq, snapshot))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::JournalMode;
    use chrono::TimeZone;

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, hour, 0, 0).unwrap()
    }

    fn yearly(year: i32, total: i64) -> YearlySnapshot {
        YearlySnapshot::new(DataSource::Births, year, total, 0, "in_fs")
    }

    #[test]
    fn test_initialize_is_idempotent() {
        let store = StatisticsStore::open_in_memory().unwrap();
        store.record(yearly(1900, 10)).unwrap();

        store.initialize().unwrap();
        store.initialize().unwrap();

        assert_eq!(store.schema_version().unwrap(), SCHEMA_VERSION);
        assert_eq!(store.count().unwrap(), 1);

        let versions: i64 = store
            .connection()
            .query_row("SELECT COUNT(*) FROM schema_version", [], |row| row.get(0))
            .unwrap();
        assert_eq!(versions, 1);
    }

    #[test]
    fn test_record_stamps_and_round_trips() {
        let store = StatisticsStore::open_in_memory().unwrap();
        let before = Utc::now();

        let summary = SummarySnapshot::new(DataSource::Deaths, 120)
            .with_missing_values(4)
            .with_unique_normalized_values(37)
            .with_additional_data(serde_json::json!({"source_file": "deaths_1900.csv"}));
        let recorded = store.record(summary).unwrap();

        let stamped = recorded.timestamp().unwrap();
        assert!(stamped >= before - chrono::TimeDelta::microseconds(1));

        let stored = store.query(&SnapshotFilter::new()).unwrap();
        assert_eq!(stored, vec![recorded]);
    }

    #[test]
    fn test_record_without_schema_fails() {
        let store = StatisticsStore::attach(Connection::open_in_memory().unwrap());

        let err = store.record(yearly(1900, 10)).unwrap_err();
        assert!(matches!(err, PersistenceError::Write { .. }));
    }

    #[test]
    fn test_duplicate_yearly_rejected() {
        let store = StatisticsStore::open_in_memory().unwrap();
        let first: StatisticsSnapshot = yearly(1900, 10).into();

        store.record(first.clone().with_timestamp(at(1))).unwrap();
        let err = store.record(first.with_timestamp(at(1))).unwrap_err();

        assert!(matches!(
            err,
            PersistenceError::Duplicate { kind: SnapshotKind::Yearly, data_source: DataSource::Births, .. }
        ));
        assert_eq!(store.count().unwrap(), 1);
    }

    #[test]
    fn test_record_run_shares_timestamp() {
        let store = StatisticsStore::open_in_memory().unwrap();

        let recorded = store
            .record_run(vec![
                SummarySnapshot::new(DataSource::Births, 60).into(),
                yearly(1900, 10).into(),
                yearly(1901, 50).into(),
                ValueCountSnapshot::new(DataSource::Births, "surname", "петров", 3).into(),
            ])
            .unwrap();

        let stamps: BTreeSet<_> = recorded.iter().map(|s| s.timestamp()).collect();
        assert_eq!(stamps.len(), 1);
        assert_eq!(store.count().unwrap(), 4);
    }

    #[test]
    fn test_record_run_is_atomic() {
        let store = StatisticsStore::open_in_memory().unwrap();

        let result = store.record_run(vec![
            yearly(1900, 10).into(),
            ValueCountSnapshot::new(DataSource::Births, "surname", "петров", 3).into(),
            ValueCountSnapshot::new(DataSource::Births, "surname", "петров", 4).into(),
        ]);

        assert!(matches!(result, Err(PersistenceError::Duplicate { .. })));
        assert_eq!(store.count().unwrap(), 0);
    }

    #[test]
    fn test_query_orders_by_timestamp_then_insertion() {
        let store = StatisticsStore::open_in_memory().unwrap();

        store.record(StatisticsSnapshot::from(yearly(1902, 30)).with_timestamp(at(2))).unwrap();
        store.record(StatisticsSnapshot::from(yearly(1901, 20)).with_timestamp(at(1))).unwrap();
        store.record(StatisticsSnapshot::from(yearly(1900, 10)).with_timestamp(at(1))).unwrap();

        let years: Vec<i64> = store
            .query(&SnapshotFilter::new())
            .unwrap()
            .iter()
            .filter_map(|s| s.field(crate::snapshot::StatField::TotalRecords))
            .collect();
        assert_eq!(years, vec![20, 10, 30]);
    }

    #[test]
    fn test_query_filters() {
        let store = StatisticsStore::open_in_memory().unwrap();
        let day = |d| Utc.with_ymd_and_hms(2024, 3, d, 18, 30, 0).unwrap();

        store
            .record_run(vec![
                StatisticsSnapshot::from(yearly(1900, 10)).with_timestamp(day(1)),
                StatisticsSnapshot::from(YearlySnapshot::new(DataSource::Deaths, 1900, 7, 1, "in_fs"))
                    .with_timestamp(day(2)),
                StatisticsSnapshot::from(SummarySnapshot::new(DataSource::Births, 10)).with_timestamp(day(2)),
                StatisticsSnapshot::from(ValueCountSnapshot::new(DataSource::Births, "surname", "петров", 3))
                    .with_timestamp(day(3)),
            ])
            .unwrap();

        let births = store.query(&SnapshotFilter::for_source(Some(DataSource::Births))).unwrap();
        assert_eq!(births.len(), 3);

        // end date is inclusive through the end of that day
        let range = DateRange::days(NaiveDate::from_ymd_opt(2024, 3, 2), NaiveDate::from_ymd_opt(2024, 3, 2));
        let on_day_two = store.query(&SnapshotFilter::new().with_range(range)).unwrap();
        assert_eq!(on_day_two.len(), 2);

        let by_year = store.query(&SnapshotFilter::new().with_year(1900)).unwrap();
        assert!(by_year.iter().all(|s| s.kind() == SnapshotKind::Yearly));
        assert_eq!(by_year.len(), 2);

        let by_value = store.query(&SnapshotFilter::new().with_value("петров")).unwrap();
        assert_eq!(by_value.len(), 1);
        assert_eq!(by_value[0].kind(), SnapshotKind::ValueCount);

        let none = store
            .query(&SnapshotFilter::new().with_kind(SnapshotKind::Summary).with_year(1900))
            .unwrap();
        assert!(none.is_empty());
    }

    #[test]
    fn test_range_start_between_microseconds() {
        let store = StatisticsStore::open_in_memory().unwrap();
        let noon = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        store
            .record(StatisticsSnapshot::from(yearly(1900, 10)).with_timestamp(noon))
            .unwrap();

        let after = DateRange::since(noon + TimeDelta::nanoseconds(500));
        assert!(!after.contains(noon));
        assert!(store.query(&SnapshotFilter::new().with_range(after)).unwrap().is_empty());

        let before = DateRange::since(noon - TimeDelta::nanoseconds(500));
        assert!(before.contains(noon));
        assert_eq!(store.query(&SnapshotFilter::new().with_range(before)).unwrap().len(), 1);

        let exact = DateRange::new(Some(noon), Some(noon + TimeDelta::nanoseconds(500)));
        assert_eq!(store.query(&SnapshotFilter::new().with_range(exact)).unwrap().len(), 1);
    }

    #[test]
    fn test_snapshots_are_append_only() {
        let store = StatisticsStore::open_in_memory().unwrap();
        store.record(yearly(1900, 10)).unwrap();

        let conn = store.connection();
        assert!(conn.execute("UPDATE yearly_comparison SET total_records = 99", []).is_err());
        assert!(conn.execute("DELETE FROM yearly_comparison", []).is_err());
    }

    #[test]
    fn test_corrupt_row_reported() {
        let store = StatisticsStore::open_in_memory().unwrap();
        store
            .connection()
            .execute(
                "INSERT INTO value_counts (seq, timestamp, data_source, column_name, value, count)
                 VALUES (1, '2024-03-01T00:00:00.000000Z', 'census', 'surname', 'x', 1)",
                [],
            )
            .unwrap();

        let err = store.query(&SnapshotFilter::new()).unwrap_err();
        assert!(matches!(err, PersistenceError::CorruptRow { table: "value_counts", .. }));
    }

    #[test]
    fn test_distinct_timestamps() {
        let store = StatisticsStore::open_in_memory().unwrap();
        store
            .record_run(vec![
                StatisticsSnapshot::from(yearly(1900, 10)).with_timestamp(at(2)),
                StatisticsSnapshot::from(yearly(1901, 10)).with_timestamp(at(2)),
                StatisticsSnapshot::from(SummarySnapshot::new(DataSource::Births, 20)).with_timestamp(at(1)),
            ])
            .unwrap();

        assert_eq!(store.distinct_timestamps(&SnapshotFilter::new()).unwrap(), vec![at(1), at(2)]);
        assert_eq!(
            store
                .distinct_timestamps(&SnapshotFilter::new().with_kind(SnapshotKind::Yearly))
                .unwrap(),
            vec![at(2)]
        );
    }

    #[test]
    fn test_open_creates_directory_and_persists() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = StoreConfig::at(dir.path().join("nested").join("statistics.db"));
        config.journal_mode = JournalMode::Delete;

        {
            let store = StatisticsStore::open(&config).unwrap();
            store.record(yearly(1900, 10)).unwrap();
        }

        let reopened = StatisticsStore::open(&config).unwrap();
        assert_eq!(reopened.count().unwrap(), 1);
        assert_eq!(reopened.schema_version().unwrap(), SCHEMA_VERSION);
    }

    #[test]
    fn test_concurrent_writers_are_serialized() {
        use std::sync::Arc;
        use std::thread;

        let dir = tempfile::tempdir().unwrap();
        let config = StoreConfig::at(dir.path().join("statistics.db"));
        let shared = Arc::new(StatisticsStore::open(&config).unwrap());

        let writers: Vec<_> = (0..4)
            .map(|writer| {
                let shared = Arc::clone(&shared);
                let config = config.clone();
                thread::spawn(move || {
                    let own = StatisticsStore::open(&config).unwrap();
                    for i in 0..10 {
                        let year = 1800 + writer * 100 + i * 2;
                        shared.record(yearly(year, 1)).unwrap();
                        own.record(yearly(year + 1, 1)).unwrap();
                    }
                })
            })
            .collect();
        for writer in writers {
            writer.join().unwrap();
        }

        assert_eq!(shared.count().unwrap(), 80);

        let conn = shared.connection();
        let distinct_seq: i64 = conn
            .query_row("SELECT COUNT(DISTINCT seq) FROM yearly_comparison", [], |row| row.get(0))
            .unwrap();
        assert_eq!(distinct_seq, 80);

        let mut stmt = conn
            .prepare("SELECT timestamp FROM yearly_comparison ORDER BY seq")
            .unwrap();
        let timestamps: Vec<String> = stmt
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();
        assert!(timestamps.windows(2).all(|pair| pair[0] <= pair[1]));
    }

    #[test]
    fn test_date_range_days() {
        let range = DateRange::days(NaiveDate::from_ymd_opt(2024, 1, 1), NaiveDate::from_ymd_opt(2024, 1, 31));

        assert!(range.contains(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()));
        assert!(range.contains(Utc.with_ymd_and_hms(2024, 1, 31, 23, 59, 59).unwrap()));
        assert!(!range.contains(Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap()));
        assert!(DateRange::all().contains(at(1)));
    }
}

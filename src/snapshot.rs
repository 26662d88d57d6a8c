// 📸 Statistics Snapshots
// Immutable results of one statistics run, stamped when they are recorded

use crate::error::UnknownDataSource;
use chrono::{DateTime, DurationRound, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// DATA SOURCE
// ============================================================================

/// Record category the statistics were computed over
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataSource {
    Births,
    Marriages,
    Deaths,
}

impl DataSource {
    pub const ALL: [DataSource; 3] = [DataSource::Births, DataSource::Marriages, DataSource::Deaths];

    /// Stored form
    pub fn as_str(&self) -> &'static str {
        match self {
            DataSource::Births => "births",
            DataSource::Marriages => "marriages",
            DataSource::Deaths => "deaths",
        }
    }
}

impl FromStr for DataSource {
    type Err = UnknownDataSource;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "births" | "birth" => Ok(DataSource::Births),
            "marriages" | "marriage" => Ok(DataSource::Marriages),
            "deaths" | "death" => Ok(DataSource::Deaths),
            _ => Err(UnknownDataSource(s.to_string())),
        }
    }
}

impl fmt::Display for DataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// KINDS & FIELDS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SnapshotKind {
    Summary,
    Yearly,
    ValueCount,
}

impl SnapshotKind {
    pub const ALL: [SnapshotKind; 3] = [SnapshotKind::Summary, SnapshotKind::Yearly, SnapshotKind::ValueCount];

    pub fn as_str(&self) -> &'static str {
        match self {
            SnapshotKind::Summary => "summary",
            SnapshotKind::Yearly => "yearly",
            SnapshotKind::ValueCount => "value_count",
        }
    }

    /// Numeric fields a snapshot of this kind carries
    pub fn value_fields(&self) -> &'static [StatField] {
        match self {
            SnapshotKind::Summary => &[
                StatField::TotalRecords,
                StatField::MissingValues,
                StatField::UniqueYears,
                StatField::RecordsMatchingCondition,
                StatField::UniqueNormalizedValues,
            ],
            SnapshotKind::Yearly => &[StatField::TotalRecords, StatField::RecordsMatchingCondition],
            SnapshotKind::ValueCount => &[StatField::Count],
        }
    }
}

impl fmt::Display for SnapshotKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Numeric snapshot field usable as a history value column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatField {
    TotalRecords,
    MissingValues,
    UniqueYears,
    RecordsMatchingCondition,
    UniqueNormalizedValues,
    Count,
}

impl StatField {
    pub fn column_name(&self) -> &'static str {
        match self {
            StatField::TotalRecords => "total_records",
            StatField::MissingValues => "missing_values",
            StatField::UniqueYears => "unique_years",
            StatField::RecordsMatchingCondition => "records_matching_condition",
            StatField::UniqueNormalizedValues => "unique_normalized_values",
            StatField::Count => "count",
        }
    }

    pub fn from_column_name(name: &str) -> Option<Self> {
        match name {
            "total_records" => Some(StatField::TotalRecords),
            "missing_values" => Some(StatField::MissingValues),
            "unique_years" => Some(StatField::UniqueYears),
            "records_matching_condition" | "records_in_fs" | "records_with_condition" => {
                Some(StatField::RecordsMatchingCondition)
            }
            "unique_normalized_values" | "unique_surnames" => Some(StatField::UniqueNormalizedValues),
            "count" => Some(StatField::Count),
            _ => None,
        }
    }
}

// ============================================================================
// SNAPSHOTS
// ============================================================================

/// Dataset-level totals for one data source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummarySnapshot {
    pub data_source: DataSource,
    pub timestamp: Option<DateTime<Utc>>,
    pub total_records: i64,
    pub missing_values: i64,
    pub unique_years: i64,
    pub records_matching_condition: i64,
    pub unique_normalized_values: i64,
    /// Free-form run details (source file, rule fingerprint, ...)
    pub additional_data: Option<serde_json::Value>,
}

impl SummarySnapshot {
    pub fn new(data_source: DataSource, total_records: i64) -> Self {
        SummarySnapshot {
            data_source,
            timestamp: None,
            total_records,
            missing_values: 0,
            unique_years: 0,
            records_matching_condition: 0,
            unique_normalized_values: 0,
            additional_data: None,
        }
    }

    pub fn with_missing_values(mut self, n: i64) -> Self {
        self.missing_values = n;
        self
    }

    pub fn with_unique_years(mut self, n: i64) -> Self {
        self.unique_years = n;
        self
    }

    pub fn with_records_matching_condition(mut self, n: i64) -> Self {
        self.records_matching_condition = n;
        self
    }

    pub fn with_unique_normalized_values(mut self, n: i64) -> Self {
        self.unique_normalized_values = n;
        self
    }

    pub fn with_additional_data(mut self, data: serde_json::Value) -> Self {
        self.additional_data = Some(data);
        self
    }
}

/// Per-year breakdown for one data source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct YearlySnapshot {
    pub data_source: DataSource,
    pub timestamp: Option<DateTime<Utc>>,
    pub year: i32,
    pub total_records: i64,
    pub records_matching_condition: i64,
    pub condition_name: String,
}

impl YearlySnapshot {
    pub fn new(
        data_source: DataSource,
        year: i32,
        total_records: i64,
        records_matching_condition: i64,
        condition_name: &str,
    ) -> Self {
        YearlySnapshot {
            data_source,
            timestamp: None,
            year,
            total_records,
            records_matching_condition,
            condition_name: condition_name.to_string(),
        }
    }
}

/// Frequency of one value in one column
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValueCountSnapshot {
    pub data_source: DataSource,
    pub timestamp: Option<DateTime<Utc>>,
    pub column_name: String,
    pub value: String,
    pub count: i64,
}

impl ValueCountSnapshot {
    pub fn new(data_source: DataSource, column_name: &str, value: &str, count: i64) -> Self {
        ValueCountSnapshot {
            data_source,
            timestamp: None,
            column_name: column_name.to_string(),
            value: value.to_string(),
            count,
        }
    }
}

/// Any recorded snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StatisticsSnapshot {
    Summary(SummarySnapshot),
    Yearly(YearlySnapshot),
    ValueCount(ValueCountSnapshot),
}

impl StatisticsSnapshot {
    pub fn kind(&self) -> SnapshotKind {
        match self {
            StatisticsSnapshot::Summary(_) => SnapshotKind::Summary,
            StatisticsSnapshot::Yearly(_) => SnapshotKind::Yearly,
            StatisticsSnapshot::ValueCount(_) => SnapshotKind::ValueCount,
        }
    }

    pub fn data_source(&self) -> DataSource {
        match self {
            StatisticsSnapshot::Summary(s) => s.data_source,
            StatisticsSnapshot::Yearly(s) => s.data_source,
            StatisticsSnapshot::ValueCount(s) => s.data_source,
        }
    }

    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        match self {
            StatisticsSnapshot::Summary(s) => s.timestamp,
            StatisticsSnapshot::Yearly(s) => s.timestamp,
            StatisticsSnapshot::ValueCount(s) => s.timestamp,
        }
    }

    fn timestamp_mut(&mut self) -> &mut Option<DateTime<Utc>> {
        match self {
            StatisticsSnapshot::Summary(s) => &mut s.timestamp,
            StatisticsSnapshot::Yearly(s) => &mut s.timestamp,
            StatisticsSnapshot::ValueCount(s) => &mut s.timestamp,
        }
    }

    /// Pin an explicit timestamp (imports, backfills)
    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        *self.timestamp_mut() = Some(truncate_to_micros(timestamp));
        self
    }

    /// Fill the timestamp with `now` unless one was pinned.
    /// Stored precision is microseconds, so both paths truncate.
    pub fn stamp(&mut self, now: DateTime<Utc>) {
        let slot = self.timestamp_mut();
        let timestamp = slot.unwrap_or(now);
        *slot = Some(truncate_to_micros(timestamp));
    }

    /// Numeric value of `field`, if this kind carries it
    pub fn field(&self, field: StatField) -> Option<i64> {
        match (self, field) {
            (StatisticsSnapshot::Summary(s), StatField::TotalRecords) => Some(s.total_records),
            (StatisticsSnapshot::Summary(s), StatField::MissingValues) => Some(s.missing_values),
            (StatisticsSnapshot::Summary(s), StatField::UniqueYears) => Some(s.unique_years),
            (StatisticsSnapshot::Summary(s), StatField::RecordsMatchingCondition) => {
                Some(s.records_matching_condition)
            }
            (StatisticsSnapshot::Summary(s), StatField::UniqueNormalizedValues) => {
                Some(s.unique_normalized_values)
            }
            (StatisticsSnapshot::Yearly(s), StatField::TotalRecords) => Some(s.total_records),
            (StatisticsSnapshot::Yearly(s), StatField::RecordsMatchingCondition) => {
                Some(s.records_matching_condition)
            }
            (StatisticsSnapshot::ValueCount(s), StatField::Count) => Some(s.count),
            _ => None,
        }
    }
}

impl From<SummarySnapshot> for StatisticsSnapshot {
    fn from(s: SummarySnapshot) -> Self {
        StatisticsSnapshot::Summary(s)
    }
}

impl From<YearlySnapshot> for StatisticsSnapshot {
    fn from(s: YearlySnapshot) -> Self {
        StatisticsSnapshot::Yearly(s)
    }
}

impl From<ValueCountSnapshot> for StatisticsSnapshot {
    fn from(s: ValueCountSnapshot) -> Self {
        StatisticsSnapshot::ValueCount(s)
    }
}

pub(crate) fn truncate_to_micros(timestamp: DateTime<Utc>) -> DateTime<Utc> {
    timestamp
        .duration_trunc(TimeDelta::microseconds(1))
        .unwrap_or(timestamp)
}

// ============================================================================
// TESTS
// ============================================================================

// 📈 Statistics History
// Time series and multi-date comparisons over recorded snapshots

use crate::db::{DateRange, SnapshotFilter, StatisticsStore};
use crate::error::{HistoryError, HistoryResult};
use crate::snapshot::{DataSource, SnapshotKind, StatField, StatisticsSnapshot};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use tracing::debug;

/// Order in which snapshot kinds are tried when resolving a value column
const VALUE_KIND_PRIORITY: [SnapshotKind; 3] =
    [SnapshotKind::Summary, SnapshotKind::ValueCount, SnapshotKind::Yearly];

// ============================================================================
// RESULT TYPES
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeriesPoint {
    pub timestamp: DateTime<Utc>,
    pub value: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum GroupKey {
    Year(i32),
    Text(String),
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GroupKey::Year(year) => write!(f, "{}", year),
            GroupKey::Text(text) => f.write_str(text),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupValue {
    pub key: GroupKey,
    pub value: i64,
}

/// Grouped values for each of the most recent snapshot dates
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comparison {
    pub value_column: String,
    pub group_column: String,
    /// Oldest date first; groups within a date sorted by key
    pub groups: BTreeMap<DateTime<Utc>, Vec<GroupValue>>,
}

impl Comparison {
    pub fn dates(&self) -> Vec<DateTime<Utc>> {
        self.groups.keys().copied().collect()
    }

    pub fn at(&self, timestamp: DateTime<Utc>) -> Option<&[GroupValue]> {
        self.groups.get(&timestamp).map(Vec::as_slice)
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

// ============================================================================
// COLUMN RESOLUTION
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GroupColumn {
    Year,
    ConditionName,
    ColumnName,
    Value,
    DataSource,
}

impl GroupColumn {
    fn parse(name: &str) -> Option<Self> {
        match name {
            "year" => Some(GroupColumn::Year),
            "condition_name" => Some(GroupColumn::ConditionName),
            "column_name" => Some(GroupColumn::ColumnName),
            "value" => Some(GroupColumn::Value),
            "data_source" => Some(GroupColumn::DataSource),
            _ => None,
        }
    }

    fn kinds(&self) -> &'static [SnapshotKind] {
        match self {
            GroupColumn::Year | GroupColumn::ConditionName => &[SnapshotKind::Yearly],
            GroupColumn::ColumnName | GroupColumn::Value => &[SnapshotKind::ValueCount],
            GroupColumn::DataSource => &SnapshotKind::ALL,
        }
    }

    fn key(&self, snapshot: &StatisticsSnapshot) -> Option<GroupKey> {
        match (self, snapshot) {
            (GroupColumn::Year, StatisticsSnapshot::Yearly(s)) => Some(GroupKey::Year(s.year)),
            (GroupColumn::ConditionName, StatisticsSnapshot::Yearly(s)) => {
                Some(GroupKey::Text(s.condition_name.clone()))
            }
            (GroupColumn::ColumnName, StatisticsSnapshot::ValueCount(s)) => {
                Some(GroupKey::Text(s.column_name.clone()))
            }
            (GroupColumn::Value, StatisticsSnapshot::ValueCount(s)) => Some(GroupKey::Text(s.value.clone())),
            (GroupColumn::DataSource, s) => Some(GroupKey::Text(s.data_source().as_str().to_string())),
            _ => None,
        }
    }
}

/// Resolve a value column name to a field and the kind it is read from.
///
/// Summary snapshots win over value counts, which win over yearly rows;
/// `total_by_year` always means the yearly `total_records`.
fn resolve_value_column(name: &str, allowed: &[SnapshotKind]) -> Option<(StatField, SnapshotKind)> {
    let (field, forced) = match name {
        "total_by_year" => (StatField::TotalRecords, Some(SnapshotKind::Yearly)),
        other => (StatField::from_column_name(other)?, None),
    };

    VALUE_KIND_PRIORITY
        .into_iter()
        .filter(|kind| allowed.contains(kind))
        .filter(|kind| forced.map_or(true, |f| f == *kind))
        .find(|kind| kind.value_fields().contains(&field))
        .map(|kind| (field, kind))
}

// ============================================================================
// SERVICE
// ============================================================================

/// Read-only queries over a [`StatisticsStore`]
pub struct HistoryService<'a> {
    store: &'a StatisticsStore,
}

impl<'a> HistoryService<'a> {
    pub fn new(store: &'a StatisticsStore) -> Self {
        HistoryService { store }
    }

    /// Values of `value_column` over time for one source (or all sources)
    pub fn time_series(
        &self,
        data_source: Option<DataSource>,
        value_column: &str,
        range: DateRange,
    ) -> HistoryResult<Vec<SeriesPoint>> {
        self.time_series_with(&SnapshotFilter::for_source(data_source).with_range(range), value_column)
    }

    /// Time series with arbitrary filter criteria. Values sharing a
    /// timestamp are summed into one point.
    pub fn time_series_with(&self, filter: &SnapshotFilter, value_column: &str) -> HistoryResult<Vec<SeriesPoint>> {
        let (field, kind) = resolve_value_column(value_column, &filter.applicable_kinds()).ok_or_else(|| {
            HistoryError::UnknownColumn {
                role: "value",
                column: value_column.to_string(),
            }
        })?;

        let snapshots = self.store.query(&filter.clone().with_kind(kind))?;

        let mut totals: BTreeMap<DateTime<Utc>, i64> = BTreeMap::new();
        for snapshot in &snapshots {
            if let (Some(timestamp), Some(value)) = (snapshot.timestamp(), snapshot.field(field)) {
                *totals.entry(timestamp).or_insert(0) += value;
            }
        }

        debug!(column = value_column, kind = %kind, points = totals.len(), "built time series");

        Ok(totals
            .into_iter()
            .map(|(timestamp, value)| SeriesPoint { timestamp, value })
            .collect())
    }

    /// `value_column` grouped by `group_column` for the `max_dates` most
    /// recent snapshot dates
    pub fn compare(
        &self,
        data_source: Option<DataSource>,
        value_column: &str,
        group_column: &str,
        max_dates: usize,
    ) -> HistoryResult<Comparison> {
        self.compare_with(&SnapshotFilter::for_source(data_source), value_column, group_column, max_dates)
    }

    pub fn compare_with(
        &self,
        filter: &SnapshotFilter,
        value_column: &str,
        group_column: &str,
        max_dates: usize,
    ) -> HistoryResult<Comparison> {
        if max_dates == 0 {
            return Err(HistoryError::InvalidArgument(
                "max_dates must be at least 1".to_string(),
            ));
        }

        let group = GroupColumn::parse(group_column).ok_or_else(|| HistoryError::UnknownColumn {
            role: "group",
            column: group_column.to_string(),
        })?;

        let allowed: Vec<SnapshotKind> = filter
            .applicable_kinds()
            .into_iter()
            .filter(|kind| group.kinds().contains(kind))
            .collect();
        let (field, kind) =
            resolve_value_column(value_column, &allowed).ok_or_else(|| HistoryError::UnknownColumn {
                role: "value",
                column: value_column.to_string(),
            })?;

        let narrowed = filter.clone().with_kind(kind);
        let timestamps = self.store.distinct_timestamps(&narrowed)?;
        let selected = &timestamps[timestamps.len().saturating_sub(max_dates)..];

        let mut comparison = Comparison {
            value_column: value_column.to_string(),
            group_column: group_column.to_string(),
            groups: BTreeMap::new(),
        };

        let (Some(oldest), Some(newest)) = (selected.first(), selected.last()) else {
            return Ok(comparison);
        };

        // The selected dates are the newest ones, so this window holds exactly them
        let window = narrowed.with_range(DateRange::new(Some(*oldest), Some(*newest)));

        let mut grouped: BTreeMap<DateTime<Utc>, BTreeMap<GroupKey, i64>> = BTreeMap::new();
        for snapshot in self.store.query(&window)? {
            let (Some(timestamp), Some(key), Some(value)) =
                (snapshot.timestamp(), group.key(&snapshot), snapshot.field(field))
            else {
                continue;
            };
            *grouped.entry(timestamp).or_default().entry(key).or_insert(0) += value;
        }

        comparison.groups = grouped
            .into_iter()
            .map(|(timestamp, values)| {
                let values = values
                    .into_iter()
                    .map(|(key, value)| GroupValue { key, value })
                    .collect();
                (timestamp, values)
            })
            .collect();

        debug!(
            value = value_column,
            group = group_column,
            dates = comparison.groups.len(),
            "built comparison"
        );

        Ok(comparison)
    }
}

// 📤 Export
// CSV and JSON renderings of stored snapshots and history results

use crate::db::format_timestamp;
use crate::error::ExportError;
use crate::history::{Comparison, SeriesPoint};
use crate::snapshot::StatisticsSnapshot;
use serde::Serialize;
use std::io::Write;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Csv,
    Json,
}

impl ExportFormat {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "csv" => Some(ExportFormat::Csv),
            "json" => Some(ExportFormat::Json),
            _ => None,
        }
    }
}

/// One flat CSV row; columns a kind does not carry stay empty
#[derive(Debug, Serialize)]
struct SnapshotRow<'a> {
    kind: &'static str,
    data_source: &'static str,
    timestamp: String,
    total_records: Option<i64>,
    missing_values: Option<i64>,
    unique_years: Option<i64>,
    records_matching_condition: Option<i64>,
    unique_normalized_values: Option<i64>,
    year: Option<i32>,
    condition_name: Option<&'a str>,
    column_name: Option<&'a str>,
    value: Option<&'a str>,
    count: Option<i64>,
    additional_data: Option<String>,
}

impl<'a> SnapshotRow<'a> {
    fn from_snapshot(snapshot: &'a StatisticsSnapshot) -> Self {
        let mut row = SnapshotRow {
            kind: snapshot.kind().as_str(),
            data_source: snapshot.data_source().as_str(),
            timestamp: snapshot.timestamp().map(|t| format_timestamp(&t)).unwrap_or_default(),
            total_records: None,
            missing_values: None,
            unique_years: None,
            records_matching_condition: None,
            unique_normalized_values: None,
            year: None,
            condition_name: None,
            column_name: None,
            value: None,
            count: None,
            additional_data: None,
        };

        match snapshot {
            StatisticsSnapshot::Summary(s) => {
                row.total_records = Some(s.total_records);
                row.missing_values = Some(s.missing_values);
                row.unique_years = Some(s.unique_years);
                row.records_matching_condition = Some(s.records_matching_condition);
                row.unique_normalized_values = Some(s.unique_normalized_values);
                row.additional_data = s.additional_data.as_ref().map(|v| v.to_string());
            }
            StatisticsSnapshot::Yearly(s) => {
                row.year = Some(s.year);
                row.total_records = Some(s.total_records);
                row.records_matching_condition = Some(s.records_matching_condition);
                row.condition_name = Some(&s.condition_name);
            }
            StatisticsSnapshot::ValueCount(s) => {
                row.column_name = Some(&s.column_name);
                row.value = Some(&s.value);
                row.count = Some(s.count);
            }
        }

        row
    }
}

pub fn write_snapshots<W: Write>(
    writer: W,
    format: ExportFormat,
    snapshots: &[StatisticsSnapshot],
) -> Result<(), ExportError> {
    match format {
        ExportFormat::Json => write_json(writer, snapshots),
        ExportFormat::Csv => {
            let mut csv = csv::Writer::from_writer(writer);
            for snapshot in snapshots {
                csv.serialize(SnapshotRow::from_snapshot(snapshot))?;
            }
            csv.flush()?;
            Ok(())
        }
    }
}

pub fn write_series<W: Write>(writer: W, format: ExportFormat, series: &[SeriesPoint]) -> Result<(), ExportError> {
    match format {
        ExportFormat::Json => write_json(writer, series),
        ExportFormat::Csv => {
            let mut csv = csv::Writer::from_writer(writer);
            csv.write_record(["timestamp", "value"])?;
            for point in series {
                csv.write_record([format_timestamp(&point.timestamp), point.value.to_string()])?;
            }
            csv.flush()?;
            Ok(())
        }
    }
}

/// Comparisons are written long-form in CSV: one row per date and group
pub fn write_comparison<W: Write>(
    writer: W,
    format: ExportFormat,
    comparison: &Comparison,
) -> Result<(), ExportError> {
    match format {
        ExportFormat::Json => write_json(writer, comparison),
        ExportFormat::Csv => {
            let mut csv = csv::Writer::from_writer(writer);
            csv.write_record(["timestamp", comparison.group_column.as_str(), comparison.value_column.as_str()])?;
            for (timestamp, groups) in &comparison.groups {
                let timestamp = format_timestamp(timestamp);
                for group in groups {
                    csv.write_record([timestamp.clone(), group.key.to_string(), group.value.to_string()])?;
                }
            }
            csv.flush()?;
            Ok(())
        }
    }
}

pub fn write_json<W: Write, T: Serialize + ?Sized>(mut writer: W, value: &T) -> Result<(), ExportError> {
    serde_json::to_writer_pretty(&mut writer, value)?;
    writeln!(writer)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::{GroupKey, GroupValue};
    use crate::snapshot::{DataSource, SummarySnapshot, ValueCountSnapshot, YearlySnapshot};
    use chrono::{TimeZone, Utc};
    use std::collections::BTreeMap;

    fn snapshots() -> Vec<StatisticsSnapshot> {
        let at = Utc.with_ymd_and_hms(2024, 2, 1, 8, 0, 0).unwrap();
        vec![
            StatisticsSnapshot::from(
                SummarySnapshot::new(DataSource::Births, 30).with_additional_data(serde_json::json!({"file": "b.csv"})),
            )
            .with_timestamp(at),
            StatisticsSnapshot::from(YearlySnapshot::new(DataSource::Births, 1900, 10, 4, "in_fs")).with_timestamp(at),
            StatisticsSnapshot::from(ValueCountSnapshot::new(DataSource::Births, "surname", "петров", 3))
                .with_timestamp(at),
        ]
    }

    #[test]
    fn test_snapshots_csv() {
        let mut out = Vec::new();
        write_snapshots(&mut out, ExportFormat::Csv, &snapshots()).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines.len(), 4);
        assert!(lines[0].starts_with("kind,data_source,timestamp,total_records"));
        assert!(lines[2].starts_with("yearly,births,2024-02-01T08:00:00.000000Z,10,,,4,,1900,in_fs"));
        assert!(lines[3].ends_with("surname,петров,3,"));
    }

    #[test]
    fn test_snapshots_json() {
        let mut out = Vec::new();
        write_snapshots(&mut out, ExportFormat::Json, &snapshots()).unwrap();

        let parsed: Vec<StatisticsSnapshot> = serde_json::from_slice(&out).unwrap();
        assert_eq!(parsed, snapshots());
    }

    #[test]
    fn test_comparison_csv_is_long_form() {
        let at = Utc.with_ymd_and_hms(2024, 2, 1, 8, 0, 0).unwrap();
        let mut groups = BTreeMap::new();
        groups.insert(
            at,
            vec![
                GroupValue { key: GroupKey::Year(1900), value: 10 },
                GroupValue { key: GroupKey::Year(1901), value: 20 },
            ],
        );
        let comparison = Comparison {
            value_column: "total_records".to_string(),
            group_column: "year".to_string(),
            groups,
        };

        let mut out = Vec::new();
        write_comparison(&mut out, ExportFormat::Csv, &comparison).unwrap();

        assert_eq!(
            String::from_utf8(out).unwrap(),
            "timestamp,year,total_records\n\
             2024-02-01T08:00:00.000000Z,1900,10\n\
             2024-02-01T08:00:00.000000Z,1901,20\n"
        );
    }

    #[test]
    fn test_format_names() {
        assert_eq!(ExportFormat::from_name("CSV"), Some(ExportFormat::Csv));
        assert_eq!(ExportFormat::from_name("json"), Some(ExportFormat::Json));
        assert_eq!(ExportFormat::from_name("xml"), None);
    }
}

//! Hourly per-campaign impression counts.

use std::collections::BTreeMap;
use std::path::Path;

use chrono::{NaiveDateTime, Timelike};
use tracing::{debug, warn};

use crate::dataset::{Dataset, DatasetError, Value, TIMESTAMP_FORMAT};
use crate::schema::validate_with_schema_file;
use crate::transform::TransformError;

pub const IMPRESSION_ID: &str = "IMPRESSION_ID";
pub const IMPRESSION_DATETIME: &str = "IMPRESSION_DATETIME";
pub const CAMPAIGN_ID: &str = "CAMPAIGN_ID";
pub const HOUR: &str = "HOUR";
pub const IMPRESSIONS_COUNT: &str = "IMPRESSIONS_COUNT";

pub fn default_dedup_columns() -> Vec<String> {
    vec![IMPRESSION_ID.to_string(), IMPRESSION_DATETIME.to_string()]
}

/// Validates `dataset` against the schema at `schema_path`, drops duplicate
/// impressions by `dedup_columns` (first occurrence wins) and counts the
/// remaining rows per `(CAMPAIGN_ID, HOUR)`.
///
/// The hour is read from the naive timestamp; no timezone conversion is
/// applied. Output rows are ordered by campaign id, then hour.
pub fn aggregate_impressions<S: AsRef<str>>(
    mut dataset: Dataset,
    schema_path: &Path,
    dedup_columns: &[S],
) -> Result<Dataset, TransformError> {
    if !validate_with_schema_file(&dataset, schema_path)? {
        return Err(TransformError::SchemaMismatch {
            schema: schema_path.to_path_buf(),
        });
    }

    let removed = dataset.drop_duplicates(dedup_columns)?;
    debug!(
        duplicates_removed = removed,
        rows_remaining = dataset.len(),
        "deduplicated impressions"
    );

    parse_timestamp_column(&mut dataset)?;

    let timestamp_index = required_column(&dataset, IMPRESSION_DATETIME)?;
    let campaign_index = required_column(&dataset, CAMPAIGN_ID)?;

    let mut counts: BTreeMap<(Value, u32), i64> = BTreeMap::new();
    let mut excluded = 0usize;
    for row in dataset.rows() {
        let hour = match &row[timestamp_index] {
            Value::Timestamp(timestamp) => Some(timestamp.hour()),
            _ => None,
        };

        let campaign = &row[campaign_index];
        match hour {
            Some(hour) if !campaign.is_null() => {
                *counts.entry((campaign.clone(), hour)).or_insert(0) += 1;
            }
            _ => excluded += 1,
        }
    }

    if excluded > 0 {
        warn!(
            rows_excluded = excluded,
            "rows with null campaign id or timestamp were left out of the hourly counts"
        );
    }

    let mut aggregated = Dataset::with_columns([CAMPAIGN_ID, HOUR, IMPRESSIONS_COUNT]);
    for ((campaign, hour), count) in counts {
        aggregated.push_row(vec![campaign, Value::Int(i64::from(hour)), Value::Int(count)])?;
    }

    Ok(aggregated)
}

fn required_column(dataset: &Dataset, name: &str) -> Result<usize, TransformError> {
    dataset
        .column_index(name)
        .ok_or_else(|| DatasetError::MissingColumn(name.to_string()).into())
}

/// Converts `IMPRESSION_DATETIME` in place to [`Value::Timestamp`] cells.
/// Nulls stay null; any other unparseable value is a fatal format error.
pub fn parse_timestamp_column(dataset: &mut Dataset) -> Result<(), TransformError> {
    dataset.try_map_column(IMPRESSION_DATETIME, |row, value| match value {
        Value::Null => Ok(Value::Null),
        value => parse_impression_timestamp(value)
            .map(Value::Timestamp)
            .ok_or_else(|| TransformError::TimestampFormat {
                row,
                value: value.to_string(),
            }),
    })
}

/// Parses `YYYY-MM-DD HH:MM:SS` exactly; any other shape is rejected.
pub fn parse_impression_timestamp(value: &Value) -> Option<NaiveDateTime> {
    match value {
        Value::Text(text) => NaiveDateTime::parse_from_str(text, TIMESTAMP_FORMAT).ok(),
        Value::Timestamp(timestamp) => Some(*timestamp),
        _ => None,
    }
}

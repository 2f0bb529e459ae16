use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;

use crate::contract::ValidationError;

pub const RESULTS_PREFIX: &str = "results";
pub const TABULAR_EXTENSION: &str = ".csv";
pub const DATE_PARTITION_FORMAT: &str = "%Y-%m-%d";

/// A calendar day selecting input objects and naming the output object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DatePartition(NaiveDate);

impl DatePartition {
    /// Accepts exactly `YYYY-MM-DD` naming a real calendar date.
    pub fn parse(value: &str) -> Result<Self, ValidationError> {
        let invalid = || {
            ValidationError::new(format!(
                "date_partition has incorrect format {value}, should be YYYY-MM-DD"
            ))
        };

        let well_formed = value.len() == 10
            && value.char_indices().all(|(index, ch)| match index {
                4 | 7 => ch == '-',
                _ => ch.is_ascii_digit(),
            });
        if !well_formed {
            return Err(invalid());
        }

        NaiveDate::parse_from_str(value, DATE_PARTITION_FORMAT)
            .map(Self)
            .map_err(|_| invalid())
    }

    pub fn date(self) -> NaiveDate {
        self.0
    }
}

impl FromStr for DatePartition {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::parse(value)
    }
}

impl fmt::Display for DatePartition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format(DATE_PARTITION_FORMAT))
    }
}

/// Storage locations derived from one [`DatePartition`]. The output key
/// always lives under the discovery prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionKeys {
    discovery_prefix: String,
    compact_date: String,
}

impl PartitionKeys {
    /// `YYYY/MM/DD`, the prefix input objects are listed under.
    pub fn discovery_prefix(&self) -> &str {
        &self.discovery_prefix
    }

    pub fn output_key(&self, initials: &str) -> String {
        format!(
            "{RESULTS_PREFIX}/{}/daily_agg_{}_{initials}.csv",
            self.discovery_prefix, self.compact_date,
        )
    }
}

pub fn resolve(partition: &DatePartition) -> PartitionKeys {
    let date = partition.date();
    PartitionKeys {
        discovery_prefix: date.format("%Y/%m/%d").to_string(),
        compact_date: date.format("%Y%m%d").to_string(),
    }
}

pub fn is_tabular_object(key: &str) -> bool {
    key.ends_with(TABULAR_EXTENSION)
}

//! Named transformations and their static dispatch table.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::aggregate::{aggregate_impressions, default_dedup_columns};
use crate::dataset::{Dataset, DatasetError};
use crate::schema::SchemaError;

pub const DEFAULT_IMPRESSIONS_SCHEMA: &str = "schemas/impressions.yaml";

#[derive(Debug, thiserror::Error)]
pub enum TransformError {
    #[error("impressions dataset does not match schema {}", schema.display())]
    SchemaMismatch { schema: PathBuf },

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Dataset(#[from] DatasetError),

    #[error("row {row}: timestamp `{value}` does not match format YYYY-MM-DD HH:MM:SS")]
    TimestampFormat { row: usize, value: String },

    #[error("unknown transformation `{0}`")]
    UnknownTransformation(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransformationKind {
    AggregateImpressions,
    Other,
}

impl TransformationKind {
    pub const ALL: [Self; 2] = [Self::AggregateImpressions, Self::Other];
    pub const NAMES: [&'static str; 2] = ["aggregate_impressions", "other"];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::AggregateImpressions => "aggregate_impressions",
            Self::Other => "other",
        }
    }

    pub fn build(self, settings: &TransformSettings) -> Box<dyn Transformation> {
        match self {
            Self::AggregateImpressions => Box::new(ImpressionAggregation {
                schema_path: settings.impressions_schema.clone(),
                dedup_columns: settings.dedup_columns.clone(),
            }),
            Self::Other => Box::new(EmptyTransformation),
        }
    }
}

impl fmt::Display for TransformationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransformationKind {
    type Err = TransformError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == value)
            .ok_or_else(|| TransformError::UnknownTransformation(value.to_string()))
    }
}

/// Inputs the dispatch table needs to construct a transformation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformSettings {
    pub impressions_schema: PathBuf,
    pub dedup_columns: Vec<String>,
}

impl Default for TransformSettings {
    fn default() -> Self {
        Self {
            impressions_schema: PathBuf::from(DEFAULT_IMPRESSIONS_SCHEMA),
            dedup_columns: default_dedup_columns(),
        }
    }
}

pub trait Transformation {
    fn kind(&self) -> TransformationKind;

    fn transform(&self, dataset: Dataset) -> Result<Dataset, TransformError>;
}

#[derive(Debug, Clone)]
pub struct ImpressionAggregation {
    pub schema_path: PathBuf,
    pub dedup_columns: Vec<String>,
}

impl Transformation for ImpressionAggregation {
    fn kind(&self) -> TransformationKind {
        TransformationKind::AggregateImpressions
    }

    fn transform(&self, dataset: Dataset) -> Result<Dataset, TransformError> {
        aggregate_impressions(dataset, &self.schema_path, &self.dedup_columns)
    }
}

/// Extension point for future transformation kinds; always yields an empty
/// dataset.
#[derive(Debug, Clone, Copy)]
pub struct EmptyTransformation;

impl Transformation for EmptyTransformation {
    fn kind(&self) -> TransformationKind {
        TransformationKind::Other
    }

    fn transform(&self, _dataset: Dataset) -> Result<Dataset, TransformError> {
        warn!("other transformation always returns an empty dataset");
        Ok(Dataset::default())
    }
}

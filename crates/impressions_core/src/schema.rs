//! Declarative required-column schema and the validator that gates
//! transformations.
//!
//! A schema document is YAML of the form:
//!
//! ```yaml
//! columns:
//!   IMPRESSION_ID:
//!     nullable: false
//!   CAMPAIGN_ID:
//!     nullable: true
//! ```
//!
//! Columns are a whitelist of checks, not an exhaustive column list: dataset
//! columns the schema does not mention are ignored.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::error;

use crate::dataset::{normalize_column_name, Dataset};

#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    #[error("failed to read schema {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed schema {}: {message}", path.display())]
    Malformed { path: PathBuf, message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ColumnSpec {
    pub nullable: bool,
}

#[derive(Debug, Deserialize)]
struct SchemaDocument {
    columns: BTreeMap<String, ColumnSpec>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Schema {
    columns: BTreeMap<String, ColumnSpec>,
}

impl Schema {
    /// Reads and parses the schema at `path`. Every call hits the file
    /// system; nothing is cached.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SchemaError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| SchemaError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&text, path)
    }

    /// Parses a schema document; `origin` is only used in error messages.
    pub fn from_yaml_str(text: &str, origin: &Path) -> Result<Self, SchemaError> {
        let malformed = |message: String| SchemaError::Malformed {
            path: origin.to_path_buf(),
            message,
        };

        let document: SchemaDocument =
            serde_yaml::from_str(text).map_err(|error| malformed(error.to_string()))?;

        let mut columns = BTreeMap::new();
        for (name, spec) in document.columns {
            let normalized = normalize_column_name(&name);
            if normalized.is_empty() {
                return Err(malformed(format!("column name {name:?} is blank")));
            }
            columns.insert(normalized, spec);
        }

        Ok(Self { columns })
    }

    pub fn columns(&self) -> &BTreeMap<String, ColumnSpec> {
        &self.columns
    }
}

impl FromIterator<(String, ColumnSpec)> for Schema {
    fn from_iter<T: IntoIterator<Item = (String, ColumnSpec)>>(iter: T) -> Self {
        Self {
            columns: iter
                .into_iter()
                .map(|(name, spec)| (normalize_column_name(&name), spec))
                .collect(),
        }
    }
}

/// Checks every declared column for presence and, when non-nullable, for
/// null cells. Each failing condition is logged; the result is `true` only
/// when nothing failed.
pub fn validate(dataset: &Dataset, schema: &Schema) -> bool {
    let mut valid = true;

    for (column, spec) in schema.columns() {
        let Some(values) = dataset.column(column) else {
            error!(column = %column, "required column is missing in dataset");
            valid = false;
            continue;
        };

        if spec.nullable {
            continue;
        }

        let null_count = values.filter(|value| value.is_null()).count();
        if null_count > 0 {
            error!(
                column = %column,
                null_count,
                "column has null values but is declared non-nullable"
            );
            valid = false;
        }
    }

    valid
}

/// Loads the schema at `path` and validates `dataset` against it.
pub fn validate_with_schema_file(
    dataset: &Dataset,
    path: impl AsRef<Path>,
) -> Result<bool, SchemaError> {
    let schema = Schema::load(path)?;
    Ok(validate(dataset, &schema))
}

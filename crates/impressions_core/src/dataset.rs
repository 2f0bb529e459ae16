//! In-memory tabular dataset parsed from CSV objects.
//!
//! A [`Dataset`] is an ordered list of rows over a fixed, ordered list of
//! column names. Cells are typed [`Value`]s inferred from the raw CSV text.

use std::cmp::Ordering;
use std::collections::HashSet;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::io::Read;

use chrono::NaiveDateTime;
use tracing::warn;

/// Timestamp layout used for impression datetimes and for rendering
/// [`Value::Timestamp`] back to CSV.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Raw cell contents read as null, in addition to the empty cell.
const NULL_TOKENS: [&str; 10] = [
    "NA", "N/A", "n/a", "NaN", "nan", "NULL", "null", "None", "#N/A", "<NA>",
];

#[derive(Debug, thiserror::Error)]
pub enum DatasetError {
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("csv payload has no header row")]
    MissingHeader,

    #[error("duplicate column `{0}` in header")]
    DuplicateColumn(String),

    #[error("column `{0}` is missing in dataset")]
    MissingColumn(String),

    #[error("row {row} has {found} fields but the dataset has {expected} columns")]
    RowWidth {
        row: usize,
        expected: usize,
        found: usize,
    },
}

/// A single typed cell.
#[derive(Debug, Clone)]
pub enum Value {
    Null,
    Int(i64),
    Float(f64),
    Text(String),
    Timestamp(NaiveDateTime),
}

impl Value {
    /// Infers a typed value from raw CSV text.
    pub fn infer(raw: &str) -> Self {
        if raw.is_empty() || NULL_TOKENS.contains(&raw) {
            return Self::Null;
        }
        if let Ok(value) = raw.parse::<i64>() {
            return Self::Int(value);
        }
        match raw.parse::<f64>() {
            Ok(value) if value.is_finite() => Self::Float(value),
            _ => Self::Text(raw.to_string()),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    fn rank(&self) -> u8 {
        match self {
            Self::Null => 0,
            Self::Int(_) | Self::Float(_) => 1,
            Self::Text(_) => 2,
            Self::Timestamp(_) => 3,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => Ok(()),
            Self::Int(value) => write!(f, "{value}"),
            Self::Float(value) => write!(f, "{value}"),
            Self::Text(value) => f.write_str(value),
            Self::Timestamp(value) => write!(f, "{}", value.format(TIMESTAMP_FORMAT)),
        }
    }
}

/// `-2^63`, the smallest `i64`, exactly representable as `f64`.
const I64_MIN_F64: f64 = -9_223_372_036_854_775_808.0;
/// `2^63`, one past the largest `i64`.
const I64_END_F64: f64 = 9_223_372_036_854_775_808.0;

fn compare_floats(left: f64, right: f64) -> Ordering {
    left.partial_cmp(&right)
        .unwrap_or_else(|| left.total_cmp(&right))
}

/// The integral value of `value` when it is a whole number inside `i64`.
fn exact_i64(value: f64) -> Option<i64> {
    (value.fract() == 0.0 && (I64_MIN_F64..I64_END_F64).contains(&value)).then(|| value as i64)
}

/// Orders an integer against a float without rounding the integer.
fn compare_int_float(left: i64, right: f64) -> Ordering {
    if right.is_nan() {
        return if right.is_sign_negative() {
            Ordering::Greater
        } else {
            Ordering::Less
        };
    }
    if right >= I64_END_F64 {
        return Ordering::Less;
    }
    if right < I64_MIN_F64 {
        return Ordering::Greater;
    }
    // In range, so the truncated float converts exactly.
    let whole = right.trunc();
    match left.cmp(&(whole as i64)) {
        Ordering::Equal if right > whole => Ordering::Less,
        Ordering::Equal if right < whole => Ordering::Greater,
        ordering => ordering,
    }
}

impl Ord for Value {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Null, Self::Null) => Ordering::Equal,
            (Self::Int(left), Self::Int(right)) => left.cmp(right),
            (Self::Int(left), Self::Float(right)) => compare_int_float(*left, *right),
            (Self::Float(left), Self::Int(right)) => compare_int_float(*right, *left).reverse(),
            (Self::Float(left), Self::Float(right)) => compare_floats(*left, *right),
            (Self::Text(left), Self::Text(right)) => left.cmp(right),
            (Self::Timestamp(left), Self::Timestamp(right)) => left.cmp(right),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.rank().hash(state);
        match self {
            Self::Null => {}
            Self::Int(value) => value.hash(state),
            // Integral floats hash like the equal integer.
            Self::Float(value) => match exact_i64(*value) {
                Some(whole) => whole.hash(state),
                None => value.to_bits().hash(state),
            },
            Self::Text(value) => value.hash(state),
            Self::Timestamp(value) => value.hash(state),
        }
    }
}

/// Trims a column name and strips embedded newlines, carriage returns and
/// byte-order marks.
pub fn normalize_column_name(name: &str) -> String {
    name.trim()
        .replace(['\n', '\r', '\u{feff}'], "")
        .trim()
        .to_string()
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Dataset {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
}

impl Dataset {
    pub fn with_columns<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    /// Parses CSV bytes with a mandatory header row.
    pub fn from_csv(bytes: &[u8]) -> Result<Self, DatasetError> {
        Self::from_csv_reader(bytes)
    }

    /// Parses CSV from any reader. Short rows are padded with nulls; rows
    /// wider than the header are rejected.
    pub fn from_csv_reader(reader: impl Read) -> Result<Self, DatasetError> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(reader);

        let headers = csv_reader.headers()?.clone();
        if headers.is_empty() {
            return Err(DatasetError::MissingHeader);
        }

        let mut columns: Vec<String> = Vec::with_capacity(headers.len());
        for header in headers.iter() {
            let name = normalize_column_name(header);
            if columns.contains(&name) {
                return Err(DatasetError::DuplicateColumn(name));
            }
            columns.push(name);
        }

        let mut dataset = Self::with_columns(columns);
        for (row_index, record) in csv_reader.records().enumerate() {
            let record = record?;
            if record.len() > dataset.columns.len() {
                return Err(DatasetError::RowWidth {
                    row: row_index,
                    expected: dataset.columns.len(),
                    found: record.len(),
                });
            }
            let mut row: Vec<Value> = record.iter().map(Value::infer).collect();
            row.resize(dataset.columns.len(), Value::Null);
            dataset.rows.push(row);
        }

        Ok(dataset)
    }

    /// Serializes to CSV: header row, comma separated, `\n` after every row.
    pub fn to_csv(&self) -> Result<Vec<u8>, DatasetError> {
        let mut writer = csv::WriterBuilder::new()
            .terminator(csv::Terminator::Any(b'\n'))
            .from_writer(Vec::new());

        writer.write_record(&self.columns)?;
        for row in &self.rows {
            writer.write_record(row.iter().map(ToString::to_string))?;
        }
        writer.flush()?;

        writer
            .into_inner()
            .map_err(|error| DatasetError::Io(error.into_error()))
    }

    /// Concatenates datasets row-wise in the given order. The result's
    /// columns are the union of all inputs in first-seen order; cells for
    /// columns a part does not carry are null.
    pub fn concat(parts: impl IntoIterator<Item = Dataset>) -> Dataset {
        let parts: Vec<Dataset> = parts.into_iter().collect();

        let mut columns: Vec<String> = Vec::new();
        for part in &parts {
            for column in &part.columns {
                if !columns.contains(column) {
                    columns.push(column.clone());
                }
            }
        }

        let mut rows = Vec::with_capacity(parts.iter().map(Dataset::len).sum());
        for (part_index, part) in parts.into_iter().enumerate() {
            if part.columns == columns {
                rows.extend(part.rows);
                continue;
            }

            let missing: Vec<&str> = columns
                .iter()
                .filter(|column| !part.columns.contains(column))
                .map(String::as_str)
                .collect();
            warn!(
                part = part_index,
                missing_columns = ?missing,
                "column set differs across inputs, filling absent columns with nulls"
            );

            let positions: Vec<Option<usize>> = columns
                .iter()
                .map(|column| part.column_index(column))
                .collect();
            for row in part.rows {
                rows.push(
                    positions
                        .iter()
                        .map(|position| {
                            position
                                .map(|index| row[index].clone())
                                .unwrap_or(Value::Null)
                        })
                        .collect(),
                );
            }
        }

        Dataset { columns, rows }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|column| column == name)
    }

    /// Values of one column in row order, or `None` if the column is absent.
    pub fn column(&self, name: &str) -> Option<impl Iterator<Item = &Value> + '_> {
        let index = self.column_index(name)?;
        Some(self.rows.iter().map(move |row| &row[index]))
    }

    pub fn push_row(&mut self, row: Vec<Value>) -> Result<(), DatasetError> {
        if row.len() != self.columns.len() {
            return Err(DatasetError::RowWidth {
                row: self.rows.len(),
                expected: self.columns.len(),
                found: row.len(),
            });
        }
        self.rows.push(row);
        Ok(())
    }

    /// Replaces every cell of column `name` with `convert(row_index, cell)`,
    /// stopping at the first error.
    pub fn try_map_column<E>(
        &mut self,
        name: &str,
        mut convert: impl FnMut(usize, &Value) -> Result<Value, E>,
    ) -> Result<(), E>
    where
        E: From<DatasetError>,
    {
        let index = self
            .column_index(name)
            .ok_or_else(|| DatasetError::MissingColumn(name.to_string()))?;
        for (row_index, row) in self.rows.iter_mut().enumerate() {
            row[index] = convert(row_index, &row[index])?;
        }
        Ok(())
    }

    /// Drops rows whose values in `subset` repeat an earlier row, keeping the
    /// first occurrence. Returns the number of rows removed.
    pub fn drop_duplicates<S: AsRef<str>>(&mut self, subset: &[S]) -> Result<usize, DatasetError> {
        let positions = subset
            .iter()
            .map(|name| {
                let name = name.as_ref();
                self.column_index(name)
                    .ok_or_else(|| DatasetError::MissingColumn(name.to_string()))
            })
            .collect::<Result<Vec<usize>, DatasetError>>()?;

        let before = self.rows.len();
        let mut seen: HashSet<Vec<Value>> = HashSet::with_capacity(before);
        self.rows.retain(|row| {
            let key: Vec<Value> = positions.iter().map(|index| row[*index].clone()).collect();
            seen.insert(key)
        });

        Ok(before - self.rows.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn infers_cell_types() {
        assert_eq!(Value::infer(""), Value::Null);
        assert_eq!(Value::infer("NaN"), Value::Null);
        assert_eq!(Value::infer("1111"), Value::Int(1111));
        assert_eq!(Value::infer("2.5"), Value::Float(2.5));
        assert_eq!(
            Value::infer("2022-04-15 14:00:05"),
            Value::Text("2022-04-15 14:00:05".to_string())
        );
    }

    #[test]
    fn integral_float_equals_and_hashes_like_int() {
        use std::collections::hash_map::DefaultHasher;

        let hash = |value: &Value| {
            let mut hasher = DefaultHasher::new();
            value.hash(&mut hasher);
            hasher.finish()
        };

        assert_eq!(Value::Int(1111), Value::Float(1111.0));
        assert_eq!(hash(&Value::Int(1111)), hash(&Value::Float(1111.0)));
        assert!(Value::Null < Value::Int(-5));
        assert!(Value::Int(3) < Value::Float(3.5));
        assert!(Value::Float(9.0) < Value::Text("1".to_string()));
    }

    #[test]
    fn large_ids_compare_and_hash_exactly() {
        use std::collections::hash_map::DefaultHasher;

        let hash = |value: &Value| {
            let mut hasher = DefaultHasher::new();
            value.hash(&mut hasher);
            hasher.finish()
        };
        // 2^53 + 1 has no exact f64 representation.
        let above = Value::Int(9_007_199_254_740_993);
        let exact = Value::Int(9_007_199_254_740_992);
        let float = Value::Float(9_007_199_254_740_992.0);

        assert_ne!(above, float);
        assert!(above > float);
        assert_eq!(exact, float);
        assert_eq!(hash(&exact), hash(&float));
        assert!(Value::Int(i64::MAX) < Value::Float(9.3e18));
        assert!(Value::Int(i64::MIN) > Value::Float(-9.3e18));
        assert_eq!(Value::Int(i64::MIN), Value::Float(-9_223_372_036_854_775_808.0));
        assert!(Value::Int(-3) > Value::Float(-3.5));
        assert!(Value::Int(-4) < Value::Float(-3.5));
    }

    #[test]
    fn drop_duplicates_keeps_distinct_large_ids() {
        let mut dataset = Dataset::with_columns(["ID"]);
        for value in [
            Value::Int(9_007_199_254_740_993),
            Value::Float(9_007_199_254_740_992.0),
            Value::Int(9_007_199_254_740_992),
        ] {
            dataset.push_row(vec![value]).expect("row");
        }

        let removed = dataset.drop_duplicates(&["ID"]).expect("dedup");

        assert_eq!(removed, 1);
        assert_eq!(
            dataset.rows(),
            [
                vec![Value::Int(9_007_199_254_740_993)],
                vec![Value::Float(9_007_199_254_740_992.0)],
            ]
        );
    }

    #[test]
    fn parses_csv_with_bom_header_and_short_rows() {
        let body = "\u{feff}IMPRESSION_ID, CAMPAIGN_ID\n1,1111\n2\n";
        let dataset = Dataset::from_csv(body.as_bytes()).expect("csv should parse");

        assert_eq!(dataset.columns(), ["IMPRESSION_ID", "CAMPAIGN_ID"]);
        assert_eq!(dataset.len(), 2);
        assert_eq!(dataset.rows()[1], vec![Value::Int(2), Value::Null]);
    }

    #[test]
    fn rejects_rows_wider_than_header() {
        let error = Dataset::from_csv(b"A,B\n1,2,3\n").expect_err("wide row should fail");
        assert!(matches!(
            error,
            DatasetError::RowWidth {
                row: 0,
                expected: 2,
                found: 3
            }
        ));
    }

    #[test]
    fn rejects_empty_payload() {
        let error = Dataset::from_csv(b"").expect_err("empty payload should fail");
        assert!(matches!(error, DatasetError::MissingHeader));
    }

    #[test]
    fn header_only_payload_is_empty_dataset() {
        let dataset = Dataset::from_csv(b"A,B\n").expect("header-only csv should parse");
        assert!(dataset.is_empty());
        assert_eq!(dataset.columns().len(), 2);
    }

    #[test]
    fn concat_unions_columns_and_fills_nulls() {
        let first = Dataset::from_csv(b"A,B\n1,2\n").expect("first");
        let second = Dataset::from_csv(b"B,C\n3,x\n").expect("second");

        let combined = Dataset::concat([first, second]);

        assert_eq!(combined.columns(), ["A", "B", "C"]);
        assert_eq!(
            combined.rows(),
            [
                vec![Value::Int(1), Value::Int(2), Value::Null],
                vec![Value::Null, Value::Int(3), Value::Text("x".to_string())],
            ]
        );
    }

    #[test]
    fn drop_duplicates_keeps_first_occurrence() {
        let mut dataset =
            Dataset::from_csv(b"ID,TS,V\n1,a,first\n1,a,second\n1,b,third\n,a,x\n,a,y\n")
                .expect("csv");

        let removed = dataset.drop_duplicates(&["ID", "TS"]).expect("dedup");

        assert_eq!(removed, 2);
        let kept: Vec<String> = dataset
            .column("V")
            .expect("column V")
            .map(ToString::to_string)
            .collect();
        assert_eq!(kept, ["first", "third", "x"]);
    }

    #[test]
    fn drop_duplicates_requires_subset_columns() {
        let mut dataset = Dataset::from_csv(b"ID\n1\n").expect("csv");
        let error = dataset
            .drop_duplicates(&["ID", "TS"])
            .expect_err("missing column should fail");
        assert!(matches!(error, DatasetError::MissingColumn(name) if name == "TS"));
    }

    #[test]
    fn try_map_column_rewrites_cells_in_place() {
        let mut dataset = Dataset::from_csv(b"ID,V\n1,a\n2,b\n").expect("csv");

        dataset
            .try_map_column("V", |row, value| {
                Ok::<_, DatasetError>(Value::Text(format!("{value}{row}")))
            })
            .expect("map");

        let values: Vec<String> = dataset
            .column("V")
            .expect("column V")
            .map(ToString::to_string)
            .collect();
        assert_eq!(values, ["a0", "b1"]);

        let error = dataset
            .try_map_column("MISSING", |_, value| Ok::<_, DatasetError>(value.clone()))
            .expect_err("missing column should fail");
        assert!(matches!(error, DatasetError::MissingColumn(name) if name == "MISSING"));
    }

    #[test]
    fn writes_csv_with_header_and_trailing_newlines() {
        let mut dataset = Dataset::with_columns(["CAMPAIGN_ID", "HOUR", "IMPRESSIONS_COUNT"]);
        dataset
            .push_row(vec![Value::Float(1111.0), Value::Int(14), Value::Int(2)])
            .expect("row");
        dataset
            .push_row(vec![Value::Text("c-2".to_string()), Value::Int(3), Value::Null])
            .expect("row");

        let body = String::from_utf8(dataset.to_csv().expect("csv")).expect("utf8");
        assert_eq!(
            body,
            "CAMPAIGN_ID,HOUR,IMPRESSIONS_COUNT\n1111,14,2\nc-2,3,\n"
        );
    }
}

//! Consumer dataset loading and normalization using Polars

use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use log::{debug, info, warn};
use polars::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Column holding the consumer age
pub const AGE_COLUMN: &str = "Age";
/// Column holding the annual income, possibly as malformed text
pub const INCOME_COLUMN: &str = "Annual_Income";
/// Column holding the 1-100 spending score
pub const SPENDING_COLUMN: &str = "Spending Score (1-100)";
/// Column holding the payment method
pub const PAYMENT_COLUMN: &str = "Payment_Methods";

const REQUIRED_COLUMNS: [&str; 4] = [AGE_COLUMN, INCOME_COLUMN, SPENDING_COLUMN, PAYMENT_COLUMN];

/// One row of the consumer table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsumerRecord {
    /// Position in the loaded dataset, stable for the process lifetime
    pub id: usize,
    /// Zero-based data row in the source table
    pub source_row: usize,
    pub age: i64,
    /// `None` when the source value could not be parsed as a number
    pub annual_income: Option<f64>,
    pub spending_score: f64,
    pub payment_method: String,
    /// Columns not used by the pipeline, keyed by trimmed column name
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, String>,
}

impl ConsumerRecord {
    /// Build a record without passthrough columns
    pub fn new(
        age: i64,
        annual_income: Option<f64>,
        spending_score: f64,
        payment_method: impl Into<String>,
    ) -> Self {
        Self {
            id: 0,
            source_row: 0,
            age,
            annual_income,
            spending_score,
            payment_method: payment_method.into(),
            extra: BTreeMap::new(),
        }
    }
}

/// A value that failed numeric coercion and was replaced by null
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CoercionWarning {
    pub row: usize,
    pub column: String,
    pub raw: Option<String>,
}

/// A source row that was discarded because a required field was unusable
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DroppedRow {
    pub row: usize,
    pub reason: String,
}

/// Data-quality audit of a load
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LoadReport {
    /// Data rows present in the source
    pub total_rows: usize,
    pub coercion_warnings: Vec<CoercionWarning>,
    pub dropped_rows: Vec<DroppedRow>,
}

impl LoadReport {
    /// Number of values nulled by soft numeric coercion
    pub fn coercion_count(&self) -> usize {
        self.coercion_warnings.len()
    }

    /// Number of rows discarded during the load
    pub fn dropped_count(&self) -> usize {
        self.dropped_rows.len()
    }
}

/// Immutable in-memory consumer table
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    records: Vec<ConsumerRecord>,
    report: LoadReport,
}

impl Dataset {
    /// Build a dataset from already parsed records; ids are reassigned to positions
    pub fn from_records(records: Vec<ConsumerRecord>) -> Self {
        let total_rows = records.len();
        let records = records
            .into_iter()
            .enumerate()
            .map(|(id, mut record)| {
                record.id = id;
                record.source_row = id;
                record
            })
            .collect();

        Self {
            records,
            report: LoadReport {
                total_rows,
                ..Default::default()
            },
        }
    }

    pub fn records(&self) -> &[ConsumerRecord] {
        &self.records
    }

    pub fn get(&self, id: usize) -> Option<&ConsumerRecord> {
        self.records.get(id)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn report(&self) -> &LoadReport {
        &self.report
    }

    /// Distinct payment methods in order of first appearance
    pub fn payment_methods(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        self.records
            .iter()
            .filter(|record| seen.insert(record.payment_method.as_str()))
            .map(|record| record.payment_method.clone())
            .collect()
    }
}

/// Load a consumer CSV file
///
/// Every column is read as text so that a malformed income cell cannot fail
/// the whole read; numeric coercion happens per cell afterwards.
///
/// # Arguments
/// * `file_path` - Path to the CSV file with a header row
///
/// # Returns
/// * `Dataset` with the parsed records and the load report
pub fn load_csv(file_path: impl AsRef<Path>) -> Result<Dataset> {
    let file_path = file_path.as_ref();
    info!("Loading consumer data from {}", file_path.display());

    let df = CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(0))
        .try_into_reader_with_file_path(Some(file_path.to_path_buf()))?
        .finish()?;

    load_dataframe(&df)
}

/// Normalize an in-memory table into a [`Dataset`]
///
/// Column names are trimmed before lookup. Income fails soft (null plus a
/// coercion warning); age, spending score and payment method are required
/// per row and rows failing them are dropped and reported.
pub fn load_dataframe(df: &DataFrame) -> Result<Dataset> {
    // trimmed name -> name as it appears in the frame
    let mut names: Vec<(String, String)> = Vec::with_capacity(df.width());
    for name in df.get_column_names() {
        let trimmed = name.trim().to_string();
        if names.iter().any(|(existing, _)| *existing == trimmed) {
            continue;
        }
        names.push((trimmed, name.to_string()));
    }

    let lookup = |column: &str| -> Result<Vec<Option<String>>> {
        let original = names
            .iter()
            .find(|(trimmed, _)| trimmed == column)
            .map(|(_, original)| original.as_str())
            .ok_or_else(|| Error::missing_column(column))?;
        text_column(df, original)
    };

    let ages = lookup(AGE_COLUMN)?;
    let incomes = lookup(INCOME_COLUMN)?;
    let scores = lookup(SPENDING_COLUMN)?;
    let methods = lookup(PAYMENT_COLUMN)?;

    let mut passthrough = Vec::new();
    for (trimmed, original) in &names {
        if !REQUIRED_COLUMNS.contains(&trimmed.as_str()) {
            passthrough.push((trimmed.clone(), text_column(df, original)?));
        }
    }

    let mut report = LoadReport {
        total_rows: df.height(),
        ..Default::default()
    };
    let mut records = Vec::with_capacity(df.height());

    for row in 0..df.height() {
        let Some(age) = parse_age(ages[row].as_deref()) else {
            report.dropped_rows.push(DroppedRow {
                row,
                reason: format!("unparsable {}: {:?}", AGE_COLUMN, ages[row]),
            });
            continue;
        };
        let Some(spending_score) = parse_spending_score(scores[row].as_deref()) else {
            report.dropped_rows.push(DroppedRow {
                row,
                reason: format!("unparsable {}: {:?}", SPENDING_COLUMN, scores[row]),
            });
            continue;
        };
        let Some(payment_method) = methods[row]
            .as_deref()
            .map(str::trim)
            .filter(|method| !method.is_empty())
        else {
            report.dropped_rows.push(DroppedRow {
                row,
                reason: format!("missing {}", PAYMENT_COLUMN),
            });
            continue;
        };

        let annual_income = coerce_numeric(incomes[row].as_deref());
        if annual_income.is_none() {
            report.coercion_warnings.push(CoercionWarning {
                row,
                column: INCOME_COLUMN.to_string(),
                raw: incomes[row].clone(),
            });
        }

        let extra = passthrough
            .iter()
            .filter_map(|(name, values)| values[row].clone().map(|value| (name.clone(), value)))
            .collect();

        records.push(ConsumerRecord {
            id: records.len(),
            source_row: row,
            age,
            annual_income,
            spending_score,
            payment_method: payment_method.to_string(),
            extra,
        });
    }

    if report.coercion_count() > 0 {
        warn!(
            "{} value(s) in {} could not be parsed and were set to null",
            report.coercion_count(),
            INCOME_COLUMN
        );
    }
    if report.dropped_count() > 0 {
        warn!("Dropped {} row(s) with unusable required fields", report.dropped_count());
        for dropped in &report.dropped_rows {
            debug!("  row {}: {}", dropped.row, dropped.reason);
        }
    }
    info!("Loaded {} of {} consumer rows", records.len(), report.total_rows);

    Ok(Dataset { records, report })
}

/// Read a column as optional text regardless of its stored dtype
fn text_column(df: &DataFrame, name: &str) -> Result<Vec<Option<String>>> {
    let series = df.column(name)?.cast(&DataType::String)?;
    let values = series
        .str()?
        .into_iter()
        .map(|value| value.map(str::to_string))
        .collect();
    Ok(values)
}

/// Lenient numeric parse: anything that is not a plain finite number becomes `None`
pub fn coerce_numeric(raw: Option<&str>) -> Option<f64> {
    raw.map(str::trim)
        .and_then(|value| value.parse::<f64>().ok())
        .filter(|value| value.is_finite())
}

fn parse_age(raw: Option<&str>) -> Option<i64> {
    let raw = raw?.trim();
    if let Ok(age) = raw.parse::<i64>() {
        return Some(age);
    }
    coerce_numeric(Some(raw))
        .filter(|age| age.fract() == 0.0)
        .map(|age| age as i64)
}

fn parse_spending_score(raw: Option<&str>) -> Option<f64> {
    coerce_numeric(raw).filter(|score| (1.0..=100.0).contains(score))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_test_csv() -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "CustomerID, Age ,Annual_Income , Spending Score (1-100),Payment_Methods ").unwrap();
        writeln!(file, "1,25,15,80,Cash").unwrap();
        writeln!(file, "2,40,\"20,000\",60,Card").unwrap();
        writeln!(file, "3,60,abc,90,Cash").unwrap();
        writeln!(file, "4,33,20000,45,Paypal").unwrap();
        writeln!(file, "5,unknown,30,50,Card").unwrap();
        writeln!(file, "6,51,28,150,Card").unwrap();
        file
    }

    #[test]
    fn test_load_csv_trims_and_coerces() {
        let test_file = create_test_csv();
        let dataset = load_csv(test_file.path()).unwrap();

        assert_eq!(dataset.report().total_rows, 6);
        assert_eq!(dataset.len(), 4);
        assert_eq!(dataset.report().dropped_count(), 2);
        assert_eq!(dataset.report().coercion_count(), 2);

        let records = dataset.records();
        assert_eq!(records[0].annual_income, Some(15.0));
        assert_eq!(records[1].annual_income, None);
        assert_eq!(records[2].annual_income, None);
        assert_eq!(records[3].annual_income, Some(20000.0));
        assert_eq!(records[3].source_row, 3);
        assert_eq!(records[3].id, 3);
        assert_eq!(records[0].extra.get("CustomerID").map(String::as_str), Some("1"));
        assert_eq!(records[3].payment_method, "Paypal");
    }

    #[test]
    fn test_missing_column_is_fatal() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "Age,Annual_Income,Payment_Methods").unwrap();
        writeln!(file, "25,15,Cash").unwrap();

        let err = load_csv(file.path()).unwrap_err();
        assert!(matches!(err, Error::MissingColumn { ref column } if column == SPENDING_COLUMN));
    }

    #[test]
    fn test_load_dataframe_with_numeric_columns() {
        let df = polars::df!(
            "Age" => &[25i64, 40],
            " Annual_Income" => &[Some(15.5f64), None],
            "Spending Score (1-100) " => &[80i64, 60],
            "Payment_Methods" => &["Cash", "Card"]
        )
        .unwrap();

        let dataset = load_dataframe(&df).unwrap();
        assert_eq!(dataset.len(), 2);
        assert_eq!(dataset.records()[0].annual_income, Some(15.5));
        assert_eq!(dataset.records()[1].annual_income, None);
        assert_eq!(dataset.records()[0].spending_score, 80.0);
        assert_eq!(dataset.report().coercion_count(), 1);
    }

    #[test]
    fn test_coerce_numeric() {
        assert_eq!(coerce_numeric(Some("20000")), Some(20000.0));
        assert_eq!(coerce_numeric(Some(" 20000 ")), Some(20000.0));
        assert_eq!(coerce_numeric(Some("20,000")), None);
        assert_eq!(coerce_numeric(Some("abc")), None);
        assert_eq!(coerce_numeric(Some("NaN")), None);
        assert_eq!(coerce_numeric(None), None);
    }

    #[test]
    fn test_parse_age_and_score() {
        assert_eq!(parse_age(Some("25")), Some(25));
        assert_eq!(parse_age(Some("25.0")), Some(25));
        assert_eq!(parse_age(Some("25.5")), None);
        assert_eq!(parse_spending_score(Some("1")), Some(1.0));
        assert_eq!(parse_spending_score(Some("0")), None);
        assert_eq!(parse_spending_score(Some("101")), None);
    }

    #[test]
    fn test_payment_methods_first_appearance() {
        let dataset = Dataset::from_records(vec![
            ConsumerRecord::new(20, Some(10.0), 50.0, "Card"),
            ConsumerRecord::new(30, Some(10.0), 50.0, "Cash"),
            ConsumerRecord::new(40, Some(10.0), 50.0, "Card"),
        ]);
        assert_eq!(dataset.payment_methods(), vec!["Card", "Cash"]);
        assert_eq!(dataset.records()[2].id, 2);
    }
}

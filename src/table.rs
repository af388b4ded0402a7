//! Table Model
//!
//! Column-oriented view over a CSV dataset. Cells are typed once at load time;
//! everything downstream reads columns as immutable snapshots.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use crate::error::{AnalysisError, AnalysisResult};

const MISSING_MARKERS: &[&str] = &["", "na", "n/a", "nan", "null", "none", "?"];

/// A single typed cell
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Datum {
    Number(f64),
    Text(String),
    Missing,
}

impl Datum {
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        if MISSING_MARKERS.contains(&trimmed.to_lowercase().as_str()) {
            return Datum::Missing;
        }
        match trimmed.parse::<f64>() {
            Ok(n) if n.is_finite() => Datum::Number(n),
            _ => Datum::Text(trimmed.to_string()),
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, Datum::Missing)
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Datum::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Category label; numbers print without a trailing `.0`.
    pub fn label(&self) -> Option<String> {
        match self {
            Datum::Number(n) => Some(n.to_string()),
            Datum::Text(s) => Some(s.clone()),
            Datum::Missing => None,
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            Datum::Number(n) => json!(n),
            Datum::Text(s) => json!(s),
            Datum::Missing => Value::Null,
        }
    }

    /// Inverse of `to_json`, used when reading imputed values back from an artifact
    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::Number(n) => n.as_f64().map(Datum::Number).unwrap_or(Datum::Missing),
            Value::String(s) => Datum::parse(s),
            Value::Bool(b) => Datum::Number(if *b { 1.0 } else { 0.0 }),
            _ => Datum::Missing,
        }
    }

    fn to_csv_field(&self) -> String {
        match self {
            Datum::Number(n) => n.to_string(),
            Datum::Text(s) => s.clone(),
            Datum::Missing => String::new(),
        }
    }
}

/// A named column of typed cells
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub values: Vec<Datum>,
}

impl Column {
    pub fn new(name: impl Into<String>, values: Vec<Datum>) -> Self {
        Self { name: name.into(), values }
    }

    pub fn from_numbers(name: impl Into<String>, values: &[f64]) -> Self {
        Self::new(name, values.iter().map(|v| Datum::Number(*v)).collect())
    }

    pub fn from_labels(name: impl Into<String>, values: &[&str]) -> Self {
        Self::new(name, values.iter().map(|v| Datum::parse(v)).collect())
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn missing_count(&self) -> usize {
        self.values.iter().filter(|d| d.is_missing()).count()
    }

    pub fn has_missing(&self) -> bool {
        self.values.iter().any(Datum::is_missing)
    }

    pub fn missing_ratio(&self) -> f64 {
        if self.values.is_empty() {
            return 0.0;
        }
        self.missing_count() as f64 / self.values.len() as f64
    }

    /// True when every present cell is a number
    pub fn is_numeric(&self) -> bool {
        let mut present = self.values.iter().filter(|d| !d.is_missing()).peekable();
        present.peek().is_some() && present.all(|d| matches!(d, Datum::Number(_)))
    }

    pub fn numbers(&self) -> Vec<f64> {
        self.values.iter().filter_map(Datum::as_f64).collect()
    }

    pub fn unique_count(&self) -> usize {
        self.values
            .iter()
            .filter_map(Datum::label)
            .collect::<HashSet<_>>()
            .len()
    }

    /// First `limit` present values, for prompts
    pub fn sample(&self, limit: usize) -> Vec<Value> {
        self.values
            .iter()
            .filter(|d| !d.is_missing())
            .take(limit)
            .map(Datum::to_json)
            .collect()
    }

    /// Compact description given to the oracle in place of literal data
    pub fn describe(&self) -> Value {
        let mut summary = json!({
            "count": self.len() - self.missing_count(),
            "missing": self.missing_count(),
            "unique": self.unique_count(),
        });

        if self.is_numeric() {
            let mut numbers = self.numbers();
            numbers.sort_by(f64::total_cmp);
            if let (Some(min), Some(max)) = (numbers.first(), numbers.last()) {
                let mean = numbers.iter().sum::<f64>() / numbers.len() as f64;
                summary["min"] = json!(min);
                summary["max"] = json!(max);
                summary["mean"] = json!(mean);
                summary["median"] = json!(crate::stats::descriptive::quantile_sorted(&numbers, 0.5));
            }
        } else {
            let mut counts: BTreeMap<String, usize> = BTreeMap::new();
            for label in self.values.iter().filter_map(Datum::label) {
                *counts.entry(label).or_default() += 1;
            }
            let mut top: Vec<_> = counts.into_iter().collect();
            top.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
            top.truncate(10);
            summary["top_values"] = json!(top);
        }
        summary
    }
}

/// Column-oriented dataset
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    columns: Vec<Column>,
}

impl Table {
    pub fn new(columns: Vec<Column>) -> AnalysisResult<Self> {
        if let Some(first) = columns.first() {
            if let Some(bad) = columns.iter().find(|c| c.len() != first.len()) {
                return Err(AnalysisError::Table(format!(
                    "column '{}' has {} rows, expected {}",
                    bad.name,
                    bad.len(),
                    first.len()
                )));
            }
        }
        let mut seen = HashSet::new();
        if let Some(dup) = columns.iter().find(|c| !seen.insert(c.name.as_str())) {
            return Err(AnalysisError::Table(format!("duplicate column name '{}'", dup.name)));
        }
        Ok(Self { columns })
    }

    pub fn from_csv_path(path: impl AsRef<Path>) -> AnalysisResult<Self> {
        let reader = csv::ReaderBuilder::new()
            .flexible(false)
            .trim(csv::Trim::All)
            .from_path(path.as_ref())?;
        Self::from_csv_reader(reader)
    }

    pub fn from_csv_str(content: &str) -> AnalysisResult<Self> {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(content.as_bytes());
        Self::from_csv_reader(reader)
    }

    fn from_csv_reader<R: std::io::Read>(mut reader: csv::Reader<R>) -> AnalysisResult<Self> {
        let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
        if headers.is_empty() {
            return Err(AnalysisError::Table("CSV has no header row".to_string()));
        }

        let mut values: Vec<Vec<Datum>> = vec![Vec::new(); headers.len()];
        for record in reader.records() {
            let record = record?;
            for (idx, field) in record.iter().enumerate() {
                values[idx].push(Datum::parse(field));
            }
        }

        Self::new(
            headers
                .into_iter()
                .zip(values)
                .map(|(name, values)| Column::new(name, values))
                .collect(),
        )
    }

    pub fn write_csv(&self, path: impl AsRef<Path>) -> AnalysisResult<()> {
        let mut writer = csv::Writer::from_path(path.as_ref())?;
        writer.write_record(self.columns.iter().map(|c| c.name.as_str()))?;
        for row in 0..self.row_count() {
            writer.write_record(self.columns.iter().map(|c| c.values[row].to_csv_field()))?;
        }
        writer.flush()?;
        Ok(())
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    pub fn row_count(&self) -> usize {
        self.columns.first().map(Column::len).unwrap_or(0)
    }

    /// Keep only the named columns, in table order
    pub fn select(&self, names: &[String]) -> Table {
        Table {
            columns: self
                .columns
                .iter()
                .filter(|c| names.contains(&c.name))
                .cloned()
                .collect(),
        }
    }

    /// Replace a column's values, keeping its position
    pub fn replace_column(&mut self, column: Column) -> AnalysisResult<()> {
        let expected = self.row_count();
        if column.len() != expected {
            return Err(AnalysisError::Table(format!(
                "replacement for '{}' has {} rows, expected {}",
                column.name,
                column.len(),
                expected
            )));
        }
        match self.columns.iter_mut().find(|c| c.name == column.name) {
            Some(slot) => {
                *slot = column;
                Ok(())
            }
            None => Err(AnalysisError::Table(format!("unknown column '{}'", column.name))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CSV: &str = "height,species,score\n1.5,setosa,3\n1.7,versicolor,NA\n,setosa,5\n1.9,virginica,4\n";

    #[test]
    fn test_datum_parse() {
        assert_eq!(Datum::parse(" 2.5 "), Datum::Number(2.5));
        assert_eq!(Datum::parse("NaN"), Datum::Missing);
        assert_eq!(Datum::parse(""), Datum::Missing);
        assert_eq!(Datum::parse("red"), Datum::Text("red".to_string()));
        assert_eq!(Datum::Number(1.0).label().unwrap(), "1");
    }

    #[test]
    fn test_load_csv_types_cells() {
        let table = Table::from_csv_str(CSV).unwrap();
        assert_eq!(table.row_count(), 4);
        assert_eq!(table.column_names(), vec!["height", "species", "score"]);

        let height = table.column("height").unwrap();
        assert!(height.is_numeric());
        assert_eq!(height.missing_count(), 1);
        assert!((height.missing_ratio() - 0.25).abs() < 1e-12);

        let species = table.column("species").unwrap();
        assert!(!species.is_numeric());
        assert_eq!(species.unique_count(), 3);
    }

    #[test]
    fn test_replace_column_checks_length() {
        let mut table = Table::from_csv_str(CSV).unwrap();
        let short = Column::from_numbers("height", &[1.0, 2.0]);
        assert!(table.replace_column(short).is_err());

        let full = Column::from_numbers("height", &[1.5, 1.7, 1.8, 1.9]);
        table.replace_column(full).unwrap();
        assert!(!table.column("height").unwrap().has_missing());
    }

    #[test]
    fn test_csv_roundtrip_through_file() {
        let table = Table::from_csv_str(CSV).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("copy.csv");
        table.write_csv(&path).unwrap();

        let loaded = Table::from_csv_path(&path).unwrap();
        assert_eq!(loaded, table);
    }

    #[test]
    fn test_describe_numeric_and_categorical() {
        let table = Table::from_csv_str(CSV).unwrap();
        let height = table.column("height").unwrap().describe();
        assert_eq!(height["count"], 3);
        assert_eq!(height["min"], 1.5);

        let species = table.column("species").unwrap().describe();
        assert_eq!(species["top_values"][0][0], "setosa");
        assert_eq!(species["top_values"][0][1], 2);
    }
}

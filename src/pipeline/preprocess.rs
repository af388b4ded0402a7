//! Preprocessing
//!
//! Column metadata, feature removal and the missing-value filter run once per
//! dataset; outlier detection and imputation run per column under the
//! critique loop; the cleaned columns are then compared with the raw ones.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use tracing::{info, warn};

use super::artifact::StageArtifact;
use super::critique::CritiqueLoop;
use super::result::SkipRecord;
use super::task::{AnalysisTask, StageKind, Subject};
use crate::knowledge::PreprocessStore;
use crate::oracle::{prompts, SynthesisClient};
use crate::sandbox::Bindings;
use crate::stats::hypothesis::ks_two_sample;
use crate::table::{Column, Table};
use crate::types::{TypeSignature, VariableType};

/// Metadata key holding the whole-dataset description
pub const DATASET_DESCRIPTION: &str = "dataset_desc";

fn as_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// One description per column plus `dataset_desc`; empty when the oracle
/// reply is unusable.
pub async fn generate_metadata(
    client: &SynthesisClient,
    types: &BTreeMap<String, VariableType>,
    context: &str,
) -> BTreeMap<String, String> {
    let prompt = prompts::column_metadata(&json!(types), context);
    match client.synthesize_structured(&prompt).await {
        Ok(Value::Object(map)) => map.iter().map(|(k, v)| (k.clone(), as_text(v))).collect(),
        Ok(other) => {
            warn!("Column metadata reply is not an object: {}", other);
            BTreeMap::new()
        }
        Err(e) => {
            warn!("Column metadata unavailable: {}", e);
            BTreeMap::new()
        }
    }
}

/// Columns the oracle keeps. Unknown names are ignored; an unusable or empty
/// reply keeps every column.
pub async fn remove_features(
    client: &SynthesisClient,
    types: &BTreeMap<String, VariableType>,
    metadata: &BTreeMap<String, String>,
    context: &str,
) -> BTreeMap<String, VariableType> {
    let prompt = prompts::feature_removal(&json!(types), &json!(metadata), context);
    let retained: BTreeMap<String, VariableType> = match client.synthesize_structured(&prompt).await {
        Ok(Value::Object(map)) => map
            .iter()
            .filter_map(|(name, raw)| {
                let original = types.get(name)?;
                let parsed = raw.as_str().and_then(|s| s.parse().ok()).unwrap_or(*original);
                Some((name.clone(), parsed))
            })
            .collect(),
        Ok(other) => {
            warn!("Feature removal reply is not an object: {}", other);
            BTreeMap::new()
        }
        Err(e) => {
            warn!("Feature removal unavailable: {}", e);
            BTreeMap::new()
        }
    };

    if retained.is_empty() {
        return types.clone();
    }
    for name in types.keys().filter(|n| !retained.contains_key(*n)) {
        info!("Feature removal dropped '{}'", name);
    }
    retained
}

/// Drops columns whose missing ratio exceeds `threshold`.
pub fn filter_missing(
    table: &Table,
    types: BTreeMap<String, VariableType>,
    threshold: f64,
) -> (BTreeMap<String, VariableType>, Vec<SkipRecord>) {
    let mut kept = BTreeMap::new();
    let mut skipped = Vec::new();
    for (name, vtype) in types {
        let ratio = table.column(&name).map(Column::missing_ratio).unwrap_or(1.0);
        if ratio > threshold {
            warn!("Dropping '{}': {:.0}% of values missing", name, ratio * 100.0);
            skipped.push(SkipRecord::new(
                &name,
                "preprocessing",
                format!("missing ratio {:.3} exceeds {}", ratio, threshold),
            ));
        } else {
            kept.insert(name, vtype);
        }
    }
    (kept, skipped)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DistributionVerdict {
    Same,
    Different,
    #[serde(rename = "Insufficient data")]
    InsufficientData,
    #[serde(rename = "Not applicable")]
    NotApplicable,
}

/// Raw versus processed column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistributionComparison {
    pub result: DistributionVerdict,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub statistic: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub p_value: Option<f64>,
    pub reason: String,
}

impl DistributionComparison {
    fn without_test(result: DistributionVerdict, reason: impl Into<String>) -> Self {
        Self { result, statistic: None, p_value: None, reason: reason.into() }
    }
}

/// Two-sample Kolmogorov-Smirnov test between raw and processed values.
pub fn compare_distribution(
    raw: &Column,
    processed: &Column,
    vtype: VariableType,
    alpha: f64,
    min_samples: usize,
) -> DistributionComparison {
    if !vtype.is_numeric() || !raw.is_numeric() || !processed.is_numeric() {
        return DistributionComparison::without_test(
            DistributionVerdict::NotApplicable,
            "distribution comparison applies to numeric columns only",
        );
    }
    let (before, after) = (raw.numbers(), processed.numbers());
    if before.len() < min_samples || after.len() < min_samples {
        return DistributionComparison::without_test(
            DistributionVerdict::InsufficientData,
            format!("needs at least {} values on both sides", min_samples),
        );
    }
    match ks_two_sample(&before, &after) {
        Ok(outcome) => {
            let same = outcome.p_value >= alpha;
            DistributionComparison {
                result: if same { DistributionVerdict::Same } else { DistributionVerdict::Different },
                statistic: Some(outcome.statistic),
                p_value: Some(outcome.p_value),
                reason: format!(
                    "Kolmogorov-Smirnov D = {:.4}, p = {:.4} ({} alpha = {})",
                    outcome.statistic,
                    outcome.p_value,
                    if same { ">=" } else { "<" },
                    alpha
                ),
            }
        }
        Err(e) => DistributionComparison::without_test(DistributionVerdict::InsufficientData, e.to_string()),
    }
}

/// Result of cleaning one column
#[derive(Debug)]
pub struct ColumnCleaning {
    pub outliers: Option<StageArtifact>,
    pub imputation: Option<StageArtifact>,
    /// Imputed values when imputation succeeded, else the raw column
    pub column: Column,
    pub skipped: Vec<SkipRecord>,
}

/// Outlier detection, then imputation when the column has gaps.
pub async fn clean_column(
    critique: &CritiqueLoop,
    store: &PreprocessStore,
    column: &Column,
    vtype: VariableType,
    description: Value,
) -> ColumnCleaning {
    let mut cleaning = ColumnCleaning {
        outliers: None,
        imputation: None,
        column: column.clone(),
        skipped: Vec::new(),
    };
    let Some(document) = store.lookup(vtype) else {
        warn!("No preprocessing knowledge for '{}' ({}), passing raw values through", column.name, vtype);
        cleaning.skipped.push(SkipRecord::new(
            &column.name,
            "preprocessing",
            format!("no preprocessing knowledge for type '{}'", vtype),
        ));
        return cleaning;
    };

    let subject = Subject::Column(column.name.clone());
    let signature = TypeSignature::Single(vtype);
    let bindings = Bindings::single(column);

    let outlier_task = AnalysisTask::new(
        StageKind::OutlierDetection,
        subject.clone(),
        signature,
        bindings.clone(),
        document.outlier_subsection(),
        description.clone(),
    );
    cleaning.outliers = match critique.run(outlier_task).await.into_artifact() {
        Ok(artifact) => Some(artifact),
        Err(e) => {
            cleaning.skipped.push(SkipRecord::new(&column.name, StageKind::OutlierDetection.as_str(), e.to_string()));
            None
        }
    };

    if !column.has_missing() {
        return cleaning;
    }
    let upstream = cleaning.outliers.as_ref().filter(|a| a.is_ok()).map(|a| a.findings.clone());
    let imputation_task = AnalysisTask::new(
        StageKind::Imputation,
        subject,
        signature,
        bindings,
        document.imputation_subsection(),
        description,
    )
    .with_context(upstream);

    let mut artifact = match critique.run(imputation_task).await.into_artifact() {
        Ok(artifact) => Some(artifact),
        Err(e) => {
            cleaning.skipped.push(SkipRecord::new(&column.name, StageKind::Imputation.as_str(), e.to_string()));
            None
        }
    };
    match artifact.as_mut().and_then(|a| if a.is_ok() { a.derived.take() } else { None }) {
        Some(imputed) => cleaning.column = imputed,
        None => warn!("No usable imputation for '{}', keeping raw values", column.name),
    }
    cleaning.imputation = artifact;
    cleaning
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::Datum;

    #[test]
    fn test_missing_filter_threshold() {
        let table = Table::new(vec![
            Column::new("sparse", vec![Datum::Missing, Datum::Missing, Datum::Number(1.0), Datum::Missing]),
            Column::new("dense", vec![Datum::Number(1.0), Datum::Missing, Datum::Number(2.0), Datum::Number(3.0)]),
        ])
        .unwrap();
        let types = BTreeMap::from([
            ("sparse".to_string(), VariableType::NumericalContinuous),
            ("dense".to_string(), VariableType::NumericalContinuous),
        ]);
        let (kept, skipped) = filter_missing(&table, types, 0.3);
        assert!(kept.contains_key("dense"));
        assert!(!kept.contains_key("sparse"));
        assert_eq!(skipped.len(), 1);
        assert_eq!(skipped[0].subject, "sparse");
    }

    #[test]
    fn test_distribution_comparison() {
        let values: Vec<f64> = (0..20).map(f64::from).collect();
        let raw = Column::from_numbers("x", &values);
        let same = compare_distribution(&raw, &raw, VariableType::NumericalContinuous, 0.05, 10);
        assert_eq!(same.result, DistributionVerdict::Same);

        let shifted: Vec<f64> = values.iter().map(|v| v + 100.0).collect();
        let different = compare_distribution(
            &raw,
            &Column::from_numbers("x", &shifted),
            VariableType::NumericalContinuous,
            0.05,
            10,
        );
        assert_eq!(different.result, DistributionVerdict::Different);

        let short = Column::from_numbers("x", &values[..5]);
        assert_eq!(
            compare_distribution(&short, &short, VariableType::NumericalContinuous, 0.05, 10).result,
            DistributionVerdict::InsufficientData
        );

        let labels = Column::from_labels("c", &["a", "b"]);
        assert_eq!(
            compare_distribution(&labels, &labels, VariableType::CategoricalNominal, 0.05, 10).result,
            DistributionVerdict::NotApplicable
        );
    }

    #[test]
    fn test_verdict_wire_names() {
        assert_eq!(serde_json::to_value(DistributionVerdict::InsufficientData).unwrap(), "Insufficient data");
        assert_eq!(serde_json::to_value(DistributionVerdict::Same).unwrap(), "Same");
    }
}

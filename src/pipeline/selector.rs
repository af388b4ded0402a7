//! Pair Selection
//!
//! A deterministic statistical pre-filter over every column pair, followed
//! by oracle ranking. A malformed ranking falls back to p-value order.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::error::{AnalysisError, AnalysisResult};
use crate::oracle::{prompts, SynthesisClient};
use crate::stats::hypothesis::{chi2_independence, groups_by_label, one_way_anova, pearson, welch_t_test, cohens_d};
use crate::table::{Column, Table};
use crate::types::VariableType;

/// Association test result for one column pair
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PairCandidate {
    pub columns: (String, String),
    pub types: (VariableType, VariableType),
    pub test: String,
    pub statistic: f64,
    pub p_value: f64,
    /// |r|, |Cohen's d|, eta squared or Cramér's V depending on the test
    pub effect_size: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectedPair {
    pub pair: (String, String),
    #[serde(default)]
    pub reason: String,
}

#[derive(Deserialize)]
struct SelectionReply {
    selected_pairs: Vec<RawSelection>,
}

#[derive(Deserialize)]
struct RawSelection {
    pair: Vec<String>,
    #[serde(default)]
    reason: String,
}

fn complete_numbers(a: &Column, b: &Column) -> (Vec<f64>, Vec<f64>) {
    a.values
        .iter()
        .zip(&b.values)
        .filter_map(|(x, y)| Some((x.as_f64()?, y.as_f64()?)))
        .unzip()
}

fn complete_groups(numeric: &Column, categorical: &Column) -> Vec<(String, Vec<f64>)> {
    let (values, labels): (Vec<f64>, Vec<String>) = numeric
        .values
        .iter()
        .zip(&categorical.values)
        .filter_map(|(x, g)| Some((x.as_f64()?, g.label()?)))
        .unzip();
    groups_by_label(&values, &labels)
}

fn complete_labels(a: &Column, b: &Column) -> (Vec<String>, Vec<String>) {
    a.values
        .iter()
        .zip(&b.values)
        .filter_map(|(x, y)| Some((x.label()?, y.label()?)))
        .unzip()
}

fn candidate(a: &Column, ta: VariableType, b: &Column, tb: VariableType) -> Option<PairCandidate> {
    let (test, statistic, p_value, effect_size) = if ta.is_numeric() && tb.is_numeric() {
        let (x, y) = complete_numbers(a, b);
        let outcome = pearson(&x, &y).ok()?;
        ("Pearson correlation", outcome.statistic, outcome.p_value, outcome.statistic.abs())
    } else if ta.is_categorical() && tb.is_categorical() {
        let (x, y) = complete_labels(a, b);
        let outcome = chi2_independence(&x, &y).ok()?;
        ("Chi-square independence", outcome.test.statistic, outcome.test.p_value, outcome.cramers_v)
    } else {
        let (numeric, categorical) = if ta.is_numeric() { (a, b) } else { (b, a) };
        let groups = complete_groups(numeric, categorical);
        match groups.len() {
            2 => {
                let outcome = welch_t_test(&groups[0].1, &groups[1].1).ok()?;
                let d = cohens_d(&groups[0].1, &groups[1].1).ok()?;
                ("Welch t-test", outcome.statistic, outcome.p_value, d.abs())
            }
            n if n > 2 => {
                let samples: Vec<Vec<f64>> = groups.into_iter().map(|(_, g)| g).collect();
                let outcome = one_way_anova(&samples).ok()?;
                ("One-way ANOVA", outcome.test.statistic, outcome.test.p_value, outcome.eta_squared)
            }
            _ => return None,
        }
    };

    if !statistic.is_finite() || !p_value.is_finite() {
        return None;
    }
    Some(PairCandidate {
        columns: (a.name.clone(), b.name.clone()),
        types: (ta, tb),
        test: test.to_string(),
        statistic,
        p_value,
        effect_size,
    })
}

/// Every unordered pair of typed columns, in table order, with its association test.
///
/// Pairs whose test cannot be computed are dropped.
pub fn prefilter(table: &Table, types: &BTreeMap<String, VariableType>) -> Vec<PairCandidate> {
    let typed: Vec<(&Column, VariableType)> = table
        .columns()
        .iter()
        .filter_map(|c| types.get(&c.name).map(|t| (c, *t)))
        .collect();

    let mut candidates = Vec::new();
    for (i, (a, ta)) in typed.iter().enumerate() {
        for (b, tb) in &typed[i + 1..] {
            match candidate(a, *ta, b, *tb) {
                Some(c) => candidates.push(c),
                None => debug!("No association test for '{}' and '{}'", a.name, b.name),
            }
        }
    }
    candidates
}

/// Ranks by p-value, then by larger effect size.
pub fn fallback_ranking(candidates: &[PairCandidate], max_pairs: usize) -> Vec<SelectedPair> {
    let mut ranked: Vec<&PairCandidate> = candidates.iter().collect();
    ranked.sort_by(|a, b| {
        a.p_value
            .total_cmp(&b.p_value)
            .then_with(|| b.effect_size.total_cmp(&a.effect_size))
    });
    ranked
        .into_iter()
        .take(max_pairs)
        .map(|c| SelectedPair {
            pair: c.columns.clone(),
            reason: format!("{}: p = {:.4}, effect size = {:.3}", c.test, c.p_value, c.effect_size),
        })
        .collect()
}

pub struct PairSelector {
    client: Arc<SynthesisClient>,
    max_pairs: usize,
}

impl PairSelector {
    pub fn new(client: Arc<SynthesisClient>, max_pairs: usize) -> Self {
        Self { client, max_pairs }
    }

    fn validate(
        &self,
        reply: Value,
        candidates: &[PairCandidate],
        types: &BTreeMap<String, VariableType>,
    ) -> AnalysisResult<Vec<SelectedPair>> {
        let reply: SelectionReply = serde_json::from_value(reply)
            .map_err(|e| AnalysisError::malformed(format!("unexpected pair selection reply: {}", e)))?;

        let mut seen = HashSet::new();
        let mut selected = Vec::new();
        for raw in reply.selected_pairs {
            let [a, b] = match <[String; 2]>::try_from(raw.pair) {
                Ok(pair) => pair,
                Err(pair) => {
                    warn!("Ignoring selection that is not a pair: {:?}", pair);
                    continue;
                }
            };
            if a == b || !types.contains_key(&a) || !types.contains_key(&b) {
                warn!("Ignoring selected pair ('{}', '{}')", a, b);
                continue;
            }
            // Keep the table's column order when the pair was pre-filtered.
            let pair = if candidates.iter().any(|c| c.columns == (b.clone(), a.clone())) {
                (b, a)
            } else {
                (a, b)
            };
            let unordered = if pair.0 < pair.1 { pair.clone() } else { (pair.1.clone(), pair.0.clone()) };
            if seen.insert(unordered) {
                selected.push(SelectedPair { pair, reason: raw.reason });
            }
        }
        selected.truncate(self.max_pairs);
        Ok(selected)
    }

    /// Oracle-ranked pairs; context-declared relations may override the statistics.
    pub async fn select(
        &self,
        candidates: &[PairCandidate],
        types: &BTreeMap<String, VariableType>,
        context: &str,
    ) -> Vec<SelectedPair> {
        if candidates.is_empty() && context.trim().is_empty() {
            info!("No candidate pairs to select from");
            return Vec::new();
        }
        let prompt = prompts::pair_selection(&json!(candidates), &json!(types), context, self.max_pairs);
        let ranked = match self.client.synthesize_structured(&prompt).await {
            Ok(reply) => self.validate(reply, candidates, types),
            Err(e) => Err(e),
        };
        match ranked {
            Ok(selected) => {
                info!("Selected {} pair(s) for bivariate analysis", selected.len());
                selected
            }
            Err(e) => {
                warn!("Pair selection fell back to statistical ranking: {}", e);
                fallback_ranking(candidates, self.max_pairs)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::Datum;

    fn numeric_table() -> (Table, BTreeMap<String, VariableType>) {
        let table = Table::new(vec![
            Column::from_numbers("x", &[1.0, 2.0, 3.0, 4.0, 5.0]),
            Column::from_numbers("y", &[2.0, 4.0, 6.0, 8.0, 10.0]),
        ])
        .unwrap();
        let types = BTreeMap::from([
            ("x".to_string(), VariableType::NumericalDiscrete),
            ("y".to_string(), VariableType::NumericalDiscrete),
        ]);
        (table, types)
    }

    #[test]
    fn test_numeric_pair_uses_correlation() {
        let (table, types) = numeric_table();
        let candidates = prefilter(&table, &types);
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].test, "Pearson correlation");
        assert!((candidates[0].statistic - 1.0).abs() < 1e-12);
        assert_eq!(candidates, prefilter(&table, &types));
    }

    #[test]
    fn test_mixed_and_categorical_pairs() {
        let table = Table::new(vec![
            Column::from_numbers("score", &[1.0, 2.0, 3.0, 7.0, 8.0, 9.0]),
            Column::from_labels("group", &["a", "a", "a", "b", "b", "b"]),
            Column::from_labels("region", &["n", "s", "n", "s", "n", "s"]),
            Column::new("constant", vec![Datum::Number(1.0); 6]),
        ])
        .unwrap();
        let types = BTreeMap::from([
            ("score".to_string(), VariableType::NumericalContinuous),
            ("group".to_string(), VariableType::Binary),
            ("region".to_string(), VariableType::CategoricalNominal),
            ("constant".to_string(), VariableType::NumericalDiscrete),
        ]);
        let candidates = prefilter(&table, &types);
        let tests: Vec<(&str, &str, &str)> = candidates
            .iter()
            .map(|c| (c.columns.0.as_str(), c.columns.1.as_str(), c.test.as_str()))
            .collect();

        assert!(tests.contains(&("score", "group", "Welch t-test")));
        assert!(tests.contains(&("score", "region", "Welch t-test")));
        assert!(tests.contains(&("group", "region", "Chi-square independence")));
        // Correlation with a constant column is undefined, so the pair is dropped.
        assert!(!tests.iter().any(|(a, b, _)| *a == "score" && *b == "constant"));
    }

    #[test]
    fn test_fallback_orders_by_p_then_effect() {
        let make = |a: &str, p: f64, e: f64| PairCandidate {
            columns: (a.to_string(), "z".to_string()),
            types: (VariableType::NumericalContinuous, VariableType::NumericalContinuous),
            test: "Pearson correlation".to_string(),
            statistic: e,
            p_value: p,
            effect_size: e,
        };
        let candidates = vec![make("a", 0.2, 0.1), make("b", 0.01, 0.3), make("c", 0.01, 0.6)];
        let ranked = fallback_ranking(&candidates, 2);
        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].pair.0, "c");
        assert_eq!(ranked[1].pair.0, "b");
    }
}

//! Type Classification
//!
//! Assigns a `VariableType` to every column once. The oracle sees compact
//! summaries; columns it omits or mislabels fall back to a heuristic.

use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::oracle::{prompts, SynthesisClient};
use crate::table::{Column, Table};
use crate::types::VariableType;

const SAMPLE_SIZE: usize = 8;
/// Integer columns with at most this many distinct values count as discrete
const DISCRETE_LIMIT: usize = 20;

/// Deterministic fallback classification
pub fn heuristic_type(column: &Column) -> VariableType {
    let unique = column.unique_count();
    if unique == 2 {
        return VariableType::Binary;
    }
    if !column.is_numeric() {
        return VariableType::CategoricalNominal;
    }
    let numbers = column.numbers();
    let integral = numbers.iter().all(|v| v.fract() == 0.0);
    if integral && unique <= DISCRETE_LIMIT {
        VariableType::NumericalDiscrete
    } else {
        VariableType::NumericalContinuous
    }
}

fn summary(column: &Column) -> Value {
    json!({
        "samples": column.sample(SAMPLE_SIZE),
        "unique": column.unique_count(),
        "non_missing": column.len() - column.missing_count(),
        "inferred_kind": if column.is_numeric() { "number" } else { "text" },
    })
}

pub struct TypeClassifier {
    client: Arc<SynthesisClient>,
}

impl TypeClassifier {
    pub fn new(client: Arc<SynthesisClient>) -> Self {
        Self { client }
    }

    #[tracing::instrument(skip_all, fields(columns = table.columns().len()))]
    pub async fn classify(&self, table: &Table) -> BTreeMap<String, VariableType> {
        let summaries: Map<String, Value> = table
            .columns()
            .iter()
            .map(|c| (c.name.clone(), summary(c)))
            .collect();

        let reply = match self
            .client
            .synthesize_structured(&prompts::type_classification(&Value::Object(summaries)))
            .await
        {
            Ok(Value::Object(map)) => map,
            Ok(other) => {
                warn!("Type classification reply is not an object: {}", other);
                Map::new()
            }
            Err(e) => {
                warn!("Type classification unavailable, using heuristics: {}", e);
                Map::new()
            }
        };

        let mut types = BTreeMap::new();
        for column in table.columns() {
            let parsed = reply
                .get(&column.name)
                .and_then(Value::as_str)
                .and_then(|s| s.parse::<VariableType>().ok());
            let vtype = match parsed {
                Some(t) => t,
                None => {
                    let fallback = heuristic_type(column);
                    debug!("'{}' classified heuristically as {}", column.name, fallback);
                    fallback
                }
            };
            types.insert(column.name.clone(), vtype);
        }
        info!("Classified {} column(s)", types.len());
        types
    }
}

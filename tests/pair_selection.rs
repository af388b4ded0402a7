mod common;

use serde_json::json;
use std::collections::BTreeMap;
use std::sync::Arc;

use common::{client, ScriptedProvider};
use stat_agency::oracle::prompts;
use stat_agency::pipeline::selector::{fallback_ranking, prefilter};
use stat_agency::pipeline::PairSelector;
use stat_agency::table::{Column, Table};
use stat_agency::VariableType;

fn dataset() -> (Table, BTreeMap<String, VariableType>) {
    let table = Table::new(vec![
        Column::from_numbers("x", &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]),
        Column::from_numbers("y", &[2.1, 3.9, 6.2, 8.1, 9.8, 12.3]),
        Column::from_labels("group", &["a", "b", "a", "b", "a", "b"]),
        Column::from_numbers("noise", &[3.0, 1.0, 4.0, 1.0, 5.0, 9.0]),
    ])
    .unwrap();
    let types = BTreeMap::from([
        ("x".to_string(), VariableType::NumericalContinuous),
        ("y".to_string(), VariableType::NumericalContinuous),
        ("group".to_string(), VariableType::Binary),
        ("noise".to_string(), VariableType::NumericalContinuous),
    ]);
    (table, types)
}

#[test]
fn test_prefilter_is_deterministic_and_idempotent() {
    let (table, types) = dataset();
    let first = prefilter(&table, &types);
    let second = prefilter(&table, &types);
    assert_eq!(first, second);
    for (a, b) in first.iter().zip(&second) {
        assert_eq!(a.statistic.to_bits(), b.statistic.to_bits());
        assert_eq!(a.p_value.to_bits(), b.p_value.to_bits());
    }

    // Every unordered pair, in table order
    let pairs: Vec<(&str, &str)> = first.iter().map(|c| (c.columns.0.as_str(), c.columns.1.as_str())).collect();
    assert_eq!(
        pairs,
        vec![("x", "y"), ("x", "group"), ("x", "noise"), ("y", "group"), ("y", "noise"), ("group", "noise")]
    );
    assert_eq!(first[0].test, "Pearson correlation");
    assert_eq!(first[1].test, "Welch t-test");

    // The strongly correlated pair ranks first without the oracle.
    let ranked = fallback_ranking(&first, 1);
    assert_eq!(ranked[0].pair, ("x".to_string(), "y".to_string()));
}

#[tokio::test]
async fn test_oracle_selection_is_validated() {
    let provider = Arc::new(ScriptedProvider::new(|heading, _| match heading {
        prompts::PAIR_SELECTION => json!({
            "selected_pairs": [
                {"pair": ["y", "x"], "reason": "declared in context"},
                {"pair": ["x", "y"], "reason": "duplicate"},
                {"pair": ["x", "x"], "reason": "self pair"},
                {"pair": ["x", "unknown"], "reason": "not a column"},
                {"pair": ["x", "y", "noise"], "reason": "not a pair"},
                {"pair": ["group", "noise"], "reason": "weak but interesting"}
            ]
        })
        .to_string(),
        _ => "{}".to_string(),
    }));
    let (table, types) = dataset();
    let candidates = prefilter(&table, &types);
    let selector = PairSelector::new(client(provider.clone()), 3);

    let selected = selector.select(&candidates, &types, "y is derived from x").await;
    let pairs: Vec<(&str, &str)> = selected.iter().map(|s| (s.pair.0.as_str(), s.pair.1.as_str())).collect();
    assert_eq!(pairs, vec![("x", "y"), ("group", "noise")]);
    assert_eq!(selected[0].reason, "declared in context");
    assert!(provider.prompts()[0].contains("y is derived from x"));
}

#[tokio::test]
async fn test_malformed_selection_falls_back_to_statistics() {
    let provider = Arc::new(ScriptedProvider::new(|_, _| "I think x and y look related.".to_string()));
    let (table, types) = dataset();
    let candidates = prefilter(&table, &types);
    let selector = PairSelector::new(client(provider), 2);

    let selected = selector.select(&candidates, &types, "").await;
    assert_eq!(selected, fallback_ranking(&candidates, 2));
    assert_eq!(selected.len(), 2);
}

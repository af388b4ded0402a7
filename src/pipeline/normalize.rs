//! Conversion of interpreter values into plain JSON.

use evalexpr::Value as ExprValue;
use serde_json::{Map, Number, Value};

use crate::table::Datum;

/// Scalars map to JSON scalars; NaN and infinities become `null`.
pub fn to_json(value: &ExprValue) -> Value {
    match value {
        ExprValue::Float(f) => Number::from_f64(*f).map(Value::Number).unwrap_or(Value::Null),
        ExprValue::Int(i) => Value::from(*i),
        ExprValue::Boolean(b) => Value::Bool(*b),
        ExprValue::String(s) => Value::String(s.clone()),
        ExprValue::Tuple(items) => Value::Array(items.iter().map(to_json).collect()),
        ExprValue::Empty => Value::Null,
    }
}

/// `("a.b", 1)` becomes `{"a": {"b": 1}}`.
///
/// A name that is both a value and a prefix keeps the value under `"value"`.
pub fn results_to_object(results: &[(String, ExprValue)]) -> Value {
    let mut root = Map::new();
    for (name, value) in results {
        insert_path(&mut root, name, to_json(value));
    }
    Value::Object(root)
}

fn insert_path(root: &mut Map<String, Value>, path: &str, leaf: Value) {
    let mut parts = path.split('.').filter(|p| !p.is_empty()).peekable();
    let mut node = root;
    while let Some(part) = parts.next() {
        if parts.peek().is_none() {
            match node.get_mut(part) {
                Some(Value::Object(existing)) => {
                    existing.insert("value".to_string(), leaf);
                }
                _ => {
                    node.insert(part.to_string(), leaf);
                }
            }
            return;
        }
        let slot = node
            .entry(part.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        if !slot.is_object() {
            let previous = std::mem::take(slot);
            let mut wrapped = Map::new();
            wrapped.insert("value".to_string(), previous);
            *slot = Value::Object(wrapped);
        }
        node = match slot {
            Value::Object(map) => map,
            _ => return,
        };
    }
}

/// Cell value read back from an interpreter result
pub fn to_datum(value: &ExprValue) -> Datum {
    match value {
        ExprValue::Float(f) if f.is_finite() => Datum::Number(*f),
        ExprValue::Int(i) => Datum::Number(*i as f64),
        ExprValue::Boolean(b) => Datum::Number(if *b { 1.0 } else { 0.0 }),
        ExprValue::String(s) => Datum::parse(s),
        _ => Datum::Missing,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_non_finite_becomes_null() {
        assert_eq!(to_json(&ExprValue::Float(f64::NAN)), Value::Null);
        assert_eq!(to_json(&ExprValue::Float(f64::INFINITY)), Value::Null);
        assert_eq!(to_json(&ExprValue::Float(2.5)), json!(2.5));
    }

    #[test]
    fn test_tuples_become_arrays() {
        let value = ExprValue::Tuple(vec![ExprValue::Float(0.9), ExprValue::Float(0.04), ExprValue::Empty]);
        assert_eq!(to_json(&value), json!([0.9, 0.04, null]));
    }

    #[test]
    fn test_dotted_names_nest() {
        let results = vec![
            ("descriptive.mean".to_string(), ExprValue::Float(3.0)),
            ("descriptive.std".to_string(), ExprValue::Float(f64::NAN)),
            ("n".to_string(), ExprValue::Int(5)),
            ("priority".to_string(), ExprValue::Boolean(true)),
            ("priority.shapiro_p".to_string(), ExprValue::Float(0.2)),
        ];
        let object = results_to_object(&results);
        assert_eq!(
            object,
            json!({
                "descriptive": {"mean": 3.0, "std": null},
                "n": 5,
                "priority": {"value": true, "shapiro_p": 0.2}
            })
        );

        let text = serde_json::to_string(&object).unwrap();
        let back: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(back, object);
    }

    #[test]
    fn test_to_datum() {
        assert_eq!(to_datum(&ExprValue::Int(3)), Datum::Number(3.0));
        assert_eq!(to_datum(&ExprValue::Float(f64::NAN)), Datum::Missing);
        assert_eq!(to_datum(&ExprValue::String("red".to_string())), Datum::Text("red".to_string()));
        assert_eq!(to_datum(&ExprValue::Empty), Datum::Missing);
    }
}

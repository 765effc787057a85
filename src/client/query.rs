//! Query evaluation over wire entities
//!
//! Rows are the JSON objects the client serves for a table. Filters map a
//! field to either a literal (equality) or an object of operators:
//! `$eq`, `$ne`, `$gt`, `$gte`, `$lt`, `$lte`, `$oneof` and `$like`.
//! `$and`/`$or` take arrays of nested filters. Dotted field names reach into
//! nested objects.

use std::cmp::Ordering;

use serde_json::{Map, Value};

use crate::error::{EnvelopeError, EnvelopeResult};

use super::types::{OrderBy, Query, SortDirection};

/// Filter, order, page and project `rows`
pub fn run(rows: Vec<Value>, query: &Query) -> EnvelopeResult<Vec<Value>> {
    let mut matched = Vec::new();
    for row in rows {
        if matches_filter(&row, &query.filter)? {
            matched.push(row);
        }
    }

    let order = sort_keys(&query.order_by);
    if !order.is_empty() {
        matched.sort_by(|a, b| {
            order
                .iter()
                .map(|(field, direction)| {
                    let ordering = compare(field_value(a, field), field_value(b, field));
                    match direction {
                        SortDirection::Asc => ordering,
                        SortDirection::Desc => ordering.reverse(),
                    }
                })
                .find(|o| *o != Ordering::Equal)
                .unwrap_or(Ordering::Equal)
        });
    }

    let rows = matched
        .into_iter()
        .skip(query.offset.unwrap_or(0))
        .take(query.limit.unwrap_or(usize::MAX));

    Ok(match &query.select {
        Some(fields) if !fields.iter().any(|f| f == "*") => {
            rows.map(|row| project(&row, fields)).collect()
        }
        _ => rows.collect(),
    })
}

fn sort_keys(order_by: &[OrderBy]) -> Vec<(String, SortDirection)> {
    order_by
        .iter()
        .flat_map(|o| match o {
            OrderBy::Field(field) => vec![(field.clone(), SortDirection::Asc)],
            OrderBy::Directed(fields) => fields.iter().map(|(f, d)| (f.clone(), *d)).collect(),
        })
        .collect()
}

fn field_value<'v>(row: &'v Value, field: &str) -> &'v Value {
    field
        .split('.')
        .try_fold(row, |value, key| value.get(key))
        .unwrap_or(&Value::Null)
}

fn project(row: &Value, fields: &[String]) -> Value {
    let selected: Map<String, Value> = fields
        .iter()
        .map(|f| (f.clone(), field_value(row, f).clone()))
        .collect();
    Value::Object(selected)
}

fn matches_filter(row: &Value, filter: &Map<String, Value>) -> EnvelopeResult<bool> {
    for (key, condition) in filter {
        let ok = match key.as_str() {
            "$and" => nested(condition)?
                .iter()
                .map(|f| matches_filter(row, f))
                .collect::<EnvelopeResult<Vec<_>>>()?
                .into_iter()
                .all(|b| b),
            "$or" => nested(condition)?
                .iter()
                .map(|f| matches_filter(row, f))
                .collect::<EnvelopeResult<Vec<_>>>()?
                .into_iter()
                .any(|b| b),
            field => matches_condition(field_value(row, field), condition)?,
        };
        if !ok {
            return Ok(false);
        }
    }
    Ok(true)
}

fn nested(condition: &Value) -> EnvelopeResult<Vec<&Map<String, Value>>> {
    condition
        .as_array()
        .ok_or_else(|| EnvelopeError::Query("$and/$or expect an array of filters".into()))?
        .iter()
        .map(|f| {
            f.as_object()
                .ok_or_else(|| EnvelopeError::Query("$and/$or entries must be objects".into()))
        })
        .collect()
}

fn matches_condition(actual: &Value, condition: &Value) -> EnvelopeResult<bool> {
    let Some(ops) = condition
        .as_object()
        .filter(|m| m.keys().all(|k| k.starts_with('$')) && !m.is_empty())
    else {
        return Ok(loosely_equal(actual, condition));
    };

    for (op, operand) in ops {
        let ok = match op.as_str() {
            "$eq" => loosely_equal(actual, operand),
            "$ne" => !loosely_equal(actual, operand),
            "$gt" => !actual.is_null() && compare(actual, operand) == Ordering::Greater,
            "$gte" => !actual.is_null() && compare(actual, operand) != Ordering::Less,
            "$lt" => !actual.is_null() && compare(actual, operand) == Ordering::Less,
            "$lte" => !actual.is_null() && compare(actual, operand) != Ordering::Greater,
            "$oneof" => operand
                .as_array()
                .ok_or_else(|| EnvelopeError::Query("$oneof expects an array".into()))?
                .iter()
                .any(|v| loosely_equal(actual, v)),
            "$like" => {
                let pattern = operand
                    .as_str()
                    .ok_or_else(|| EnvelopeError::Query("$like expects a string".into()))?;
                actual.as_str().is_some_and(|s| like(s, pattern))
            }
            other => return Err(EnvelopeError::Query(format!("Unknown operator {}", other))),
        };
        if !ok {
            return Ok(false);
        }
    }
    Ok(true)
}

fn loosely_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        _ => a == b,
    }
}

/// Total order over JSON values: null < bool < number < string < others
fn compare(a: &Value, b: &Value) -> Ordering {
    fn rank(v: &Value) -> u8 {
        match v {
            Value::Null => 0,
            Value::Bool(_) => 1,
            Value::Number(_) => 2,
            Value::String(_) => 3,
            Value::Array(_) => 4,
            Value::Object(_) => 5,
        }
    }
    match (a, b) {
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Number(x), Value::Number(y)) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Value::String(x), Value::String(y)) => x.cmp(y),
        _ => rank(a).cmp(&rank(b)),
    }
}

/// SQL `LIKE`, case-insensitive: `%` is any run, `_` any single character
fn like(value: &str, pattern: &str) -> bool {
    let value: Vec<char> = value.to_lowercase().chars().collect();
    let pattern: Vec<char> = pattern.to_lowercase().chars().collect();

    let (mut v, mut p) = (0, 0);
    let mut backtrack: Option<(usize, usize)> = None;
    while v < value.len() {
        match pattern.get(p) {
            Some('%') => {
                backtrack = Some((p, v));
                p += 1;
            }
            Some(&c) if c == '_' || c == value[v] => {
                v += 1;
                p += 1;
            }
            _ => match backtrack {
                Some((bp, bv)) => {
                    p = bp + 1;
                    v = bv + 1;
                    backtrack = Some((bp, bv + 1));
                }
                None => return false,
            },
        }
    }
    pattern[p..].iter().all(|&c| c == '%')
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rows() -> Vec<Value> {
        vec![
            json!({"id": "1", "date": "2025-01-03", "amount": -500, "notes": "Coffee beans", "payee": {"name": "Cafe"}}),
            json!({"id": "2", "date": "2025-01-01", "amount": 250000, "notes": null, "payee": {"name": "Employer"}}),
            json!({"id": "3", "date": "2025-01-02", "amount": -4200, "notes": "coffee", "payee": {"name": "Cafe"}}),
        ]
    }

    fn query(value: Value) -> Query {
        serde_json::from_value(value).unwrap()
    }

    fn ids(rows: &[Value]) -> Vec<&str> {
        rows.iter().map(|r| r["id"].as_str().unwrap()).collect()
    }

    #[test]
    fn test_operators() {
        let result = run(
            rows(),
            &query(json!({"table": "transactions", "filter": {"amount": {"$lt": 0}}})),
        )
        .unwrap();
        assert_eq!(ids(&result), vec!["1", "3"]);

        let result = run(
            rows(),
            &query(json!({"table": "transactions", "filter": {"notes": {"$like": "coffee%"}}})),
        )
        .unwrap();
        assert_eq!(ids(&result), vec!["1", "3"]);

        let result = run(
            rows(),
            &query(json!({"table": "transactions", "filter": {"id": {"$oneof": ["2", "3"]}, "payee.name": "Cafe"}})),
        )
        .unwrap();
        assert_eq!(ids(&result), vec!["3"]);
    }

    #[test]
    fn test_or_filter() {
        let result = run(
            rows(),
            &query(json!({"table": "t", "filter": {"$or": [{"id": "1"}, {"amount": {"$gte": 250000}}]}})),
        )
        .unwrap();
        assert_eq!(ids(&result), vec!["1", "2"]);
    }

    #[test]
    fn test_order_limit_and_select() {
        let result = run(
            rows(),
            &query(json!({
                "table": "transactions",
                "orderBy": [{"date": "desc"}],
                "offset": 1,
                "limit": 1,
                "select": ["id", "payee.name"]
            })),
        )
        .unwrap();
        assert_eq!(result, vec![json!({"id": "3", "payee.name": "Cafe"})]);
    }

    #[test]
    fn test_unknown_operator_is_an_error() {
        let err = run(
            rows(),
            &query(json!({"table": "t", "filter": {"amount": {"$between": [1, 2]}}})),
        )
        .unwrap_err();
        assert!(matches!(err, EnvelopeError::Query(_)));
    }

    #[test]
    fn test_like() {
        assert!(like("Coffee Shop", "%shop"));
        assert!(like("abc", "a_c"));
        assert!(!like("abc", "a_d"));
        assert!(like("anything", "%"));
        assert!(like("aXbXc", "%b%c"));
    }
}

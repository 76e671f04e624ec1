// src/store/filter.rs
//! Mongo-style query documents.
//!
//! A [`Filter`] is a flat map from (optionally dotted) field paths to either a
//! literal value (equality) or an operator object such as
//! `{"$in": [...], "$gte": ...}`. Filters compose by object spread: when two
//! filters are merged, keys of the right-hand side replace keys of the left.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::cmp::Ordering;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Filter(Map<String, Value>);

impl Filter {
    pub fn new() -> Self {
        Self(Map::new())
    }

    pub fn with(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.0.insert(field.to_string(), value.into());
        self
    }

    /// Sets (or replaces) the operator object for `field`.
    pub fn op(mut self, field: &str, operator: &str, value: impl Into<Value>) -> Self {
        let entry = self
            .0
            .entry(field.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        if !entry.is_object() {
            *entry = Value::Object(Map::new());
        }
        if let Value::Object(ops) = entry {
            ops.insert(operator.to_string(), value.into());
        }
        self
    }

    /// Object-spread merge: `other` wins on key collision.
    pub fn merge(mut self, other: &Filter) -> Self {
        for (key, value) in &other.0 {
            self.0.insert(key.clone(), value.clone());
        }
        self
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn matches(&self, doc: &Value) -> bool {
        self.0.iter().all(|(path, condition)| match path.as_str() {
            "$and" => condition
                .as_array()
                .map(|clauses| clauses.iter().all(|c| clause_matches(c, doc)))
                .unwrap_or(false),
            "$or" => condition
                .as_array()
                .map(|clauses| clauses.iter().any(|c| clause_matches(c, doc)))
                .unwrap_or(false),
            _ => field_matches(lookup(doc, path), condition),
        })
    }
}

impl From<Map<String, Value>> for Filter {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

fn clause_matches(clause: &Value, doc: &Value) -> bool {
    match clause {
        Value::Object(map) => Filter(map.clone()).matches(doc),
        _ => false,
    }
}

fn lookup<'a>(doc: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = doc;
    for segment in path.split('.') {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}

fn is_operator_object(condition: &Value) -> bool {
    match condition {
        Value::Object(map) => !map.is_empty() && map.keys().all(|k| k.starts_with('$')),
        _ => false,
    }
}

fn field_matches(actual: Option<&Value>, condition: &Value) -> bool {
    if !is_operator_object(condition) {
        return equals(actual, condition);
    }

    let Some(ops) = condition.as_object() else {
        return false;
    };
    ops.iter().all(|(op, operand)| match op.as_str() {
        "$eq" => equals(actual, operand),
        "$ne" => !equals(actual, operand),
        "$in" => operand
            .as_array()
            .map(|values| values.iter().any(|v| equals(actual, v)))
            .unwrap_or(false),
        "$nin" => operand
            .as_array()
            .map(|values| !values.iter().any(|v| equals(actual, v)))
            .unwrap_or(true),
        "$exists" => {
            let present = matches!(actual, Some(v) if !v.is_null());
            present == operand.as_bool().unwrap_or(true)
        }
        "$gt" => compare(actual, operand) == Some(Ordering::Greater),
        "$gte" => matches!(
            compare(actual, operand),
            Some(Ordering::Greater | Ordering::Equal)
        ),
        "$lt" => compare(actual, operand) == Some(Ordering::Less),
        "$lte" => matches!(
            compare(actual, operand),
            Some(Ordering::Less | Ordering::Equal)
        ),
        other => {
            tracing::warn!("Unsupported filter operator {}", other);
            false
        }
    })
}

/// Equality with Mongo's array semantics: a scalar condition matches an
/// array field when any element equals it.
fn equals(actual: Option<&Value>, expected: &Value) -> bool {
    match actual {
        None => expected.is_null(),
        Some(Value::Array(items)) if !expected.is_array() => items.iter().any(|i| i == expected),
        Some(value) => value == expected,
    }
}

fn compare(actual: Option<&Value>, operand: &Value) -> Option<Ordering> {
    let actual = actual?;
    match (actual, operand) {
        (Value::Number(a), Value::Number(b)) => a.as_f64()?.partial_cmp(&b.as_f64()?),
        (Value::String(a), Value::String(b)) => {
            match (parse_instant(a), parse_instant(b)) {
                (Some(a), Some(b)) => Some(a.cmp(&b)),
                _ => Some(a.cmp(b)),
            }
        }
        _ => None,
    }
}

fn parse_instant(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

//! Constraint Checker - pure shape and range checks
//!
//! Every check here is total over its inputs and touches nothing but its
//! arguments. The configuration and publication validators compose them.

use serde::Serialize;
use std::borrow::Borrow;
use std::collections::HashSet;
use std::fmt;
use std::hash::Hash;
use thiserror::Error;
use toml::Value;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConstraintError {
    #[error("{description} must have length 2, given: {values:?}")]
    WrongLength { description: String, values: Vec<i64> },

    #[error("{description} must be [a, b] with 0 < a < b, given: [{low}, {high}]")]
    NotOrdered {
        description: String,
        low: i64,
        high: i64,
    },
}

/// Inclusive bounds `[low, high]` with `0 < low < high`.
///
/// Only `check_ordered_pair` builds one, so every `Limits` in circulation
/// already satisfies the invariant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(into = "[i64; 2]")]
pub struct Limits {
    low: i64,
    high: i64,
}

impl Limits {
    pub fn low(&self) -> i64 {
        self.low
    }

    pub fn high(&self) -> i64 {
        self.high
    }

    /// Inclusive on both ends.
    pub fn contains(&self, x: i64) -> bool {
        self.low <= x && x <= self.high
    }
}

impl From<Limits> for [i64; 2] {
    fn from(limits: Limits) -> Self {
        [limits.low, limits.high]
    }
}

impl fmt::Display for Limits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.low, self.high)
    }
}

/// Check that `values` is exactly `[a, b]` with `0 < a < b`.
pub fn check_ordered_pair(values: &[i64], description: &str) -> Result<Limits, ConstraintError> {
    let [low, high] = values else {
        return Err(ConstraintError::WrongLength {
            description: description.to_string(),
            values: values.to_vec(),
        });
    };
    if !(*low > 0 && *high > 0 && low < high) {
        return Err(ConstraintError::NotOrdered {
            description: description.to_string(),
            low: *low,
            high: *high,
        });
    }
    Ok(Limits { low: *low, high: *high })
}

/// Length in characters, not bytes.
pub fn check_fixed_length(s: &str, n: usize) -> bool {
    s.chars().count() == n
}

pub fn check_unique<T: Eq + Hash>(values: &[T]) -> bool {
    let mut seen = HashSet::with_capacity(values.len());
    values.iter().all(|v| seen.insert(v))
}

/// Every value that repeats, reported once, in order of its first repeat.
pub fn duplicates<T: Eq + Hash + Clone>(values: &[T]) -> Vec<T> {
    let mut seen = HashSet::with_capacity(values.len());
    let mut reported = HashSet::new();
    let mut out = vec![];
    for v in values {
        if !seen.insert(v) && reported.insert(v) {
            out.push(v.clone());
        }
    }
    out
}

pub fn check_membership<T, Q>(value: &Q, allowed: &[T]) -> bool
where
    T: Borrow<Q>,
    Q: PartialEq + ?Sized,
{
    allowed.iter().any(|a| a.borrow() == value)
}

/// Keys in `required` that do not appear in `present`, in `required` order.
pub fn missing_keys<I, S>(required: &[&str], present: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let present: HashSet<String> = present.into_iter().map(|s| s.as_ref().to_string()).collect();
    required
        .iter()
        .filter(|k| !present.contains(**k))
        .map(|k| k.to_string())
        .collect()
}

/// Keys in `present` that are not in `required`, in `present` order.
pub fn extra_keys<I, S>(required: &[&str], present: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    present
        .into_iter()
        .map(|k| k.as_ref().to_string())
        .filter(|k| !required.contains(&k.as_str()))
        .collect()
}

/// Primitive shapes a document value can be required to have.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueType {
    Integer,
    /// Float or integer.
    Number,
    String,
    StringArray,
    IntegerArray,
    Array,
    Table,
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueType::Integer => "an integer",
            ValueType::Number => "a number",
            ValueType::String => "a string",
            ValueType::StringArray => "an array of strings",
            ValueType::IntegerArray => "an array of integers",
            ValueType::Array => "an array",
            ValueType::Table => "a table",
        };
        f.write_str(name)
    }
}

pub fn check_type(value: &Value, ty: ValueType) -> bool {
    match ty {
        ValueType::Integer => value.is_integer(),
        ValueType::Number => value.is_integer() || value.is_float(),
        ValueType::String => value.is_str(),
        ValueType::StringArray => value
            .as_array()
            .map_or(false, |items| items.iter().all(Value::is_str)),
        ValueType::IntegerArray => value
            .as_array()
            .map_or(false, |items| items.iter().all(Value::is_integer)),
        ValueType::Array => value.is_array(),
        ValueType::Table => value.is_table(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_ordered_pair_accepts_increasing() {
        let limits = check_ordered_pair(&[100, 200], "block-limits").unwrap();
        assert_eq!(limits.low(), 100);
        assert_eq!(limits.high(), 200);
    }

    #[test]
    fn test_ordered_pair_rejects_wrong_length() {
        let err = check_ordered_pair(&[100, 200, 300], "cover-limits").unwrap_err();
        assert!(matches!(err, ConstraintError::WrongLength { .. }));
        assert!(err.to_string().contains("cover-limits"));
        assert!(check_ordered_pair(&[], "cover-limits").is_err());
    }

    #[test]
    fn test_ordered_pair_rejects_equal_bounds() {
        assert!(check_ordered_pair(&[150, 150], "block-limits").is_err());
    }

    #[test]
    fn test_limits_inclusive() {
        let limits = check_ordered_pair(&[100, 200], "block-limits").unwrap();
        assert!(limits.contains(100));
        assert!(limits.contains(200));
        assert!(!limits.contains(99));
        assert!(!limits.contains(201));
    }

    #[test]
    fn test_limits_serialize_as_pair() {
        let limits = check_ordered_pair(&[3, 7], "x").unwrap();
        assert_eq!(serde_json::to_string(&limits).unwrap(), "[3,7]");
    }

    #[test]
    fn test_fixed_length_counts_chars() {
        assert!(check_fixed_length("RED", 3));
        assert!(check_fixed_length("ÉTÉ", 3));
        assert!(!check_fixed_length("BLUE", 3));
        assert!(!check_fixed_length("", 3));
    }

    #[test]
    fn test_duplicates_reported_once() {
        let colors = ["RED", "BLU", "RED", "GRN", "RED", "BLU"];
        assert_eq!(duplicates(&colors), vec!["RED", "BLU"]);
        assert!(!check_unique(&colors));
        assert!(check_unique(&["RED", "BLU"]));
    }

    #[test]
    fn test_membership() {
        let allowed = vec!["RED".to_string(), "BLU".to_string()];
        assert!(check_membership("RED", &allowed));
        assert!(!check_membership("XYZ", &allowed));
    }

    #[test]
    fn test_missing_and_extra_keys() {
        let required = ["colors", "block-limits", "cover-limits"];
        let present = ["colors", "cover-limits", "shade"];
        assert_eq!(missing_keys(&required, present), vec!["block-limits"]);
        assert_eq!(extra_keys(&required, present), vec!["shade"]);

        let exact = ["cover-limits", "colors", "block-limits"];
        assert!(missing_keys(&required, exact).is_empty());
        assert!(extra_keys(&required, exact).is_empty());
    }

    #[test]
    fn test_check_type() {
        assert!(check_type(&Value::Integer(3), ValueType::Integer));
        assert!(check_type(&Value::Integer(3), ValueType::Number));
        assert!(check_type(&Value::Float(1.5), ValueType::Number));
        assert!(!check_type(&Value::Float(1.5), ValueType::Integer));
        assert!(!check_type(&Value::String("12".into()), ValueType::Integer));

        let strings = Value::Array(vec![Value::String("RED".into())]);
        assert!(check_type(&strings, ValueType::StringArray));
        assert!(!check_type(&strings, ValueType::IntegerArray));
    }

    proptest! {
        #[test]
        fn ordered_pair_accepts_all_valid(a in 1i64..10_000, gap in 1i64..10_000) {
            let b = a + gap;
            let limits = check_ordered_pair(&[a, b], "limits").unwrap();
            prop_assert_eq!(limits.low(), a);
            prop_assert_eq!(limits.high(), b);
        }

        #[test]
        fn ordered_pair_rejects_unordered(a in -10_000i64..10_000, b in -10_000i64..10_000) {
            prop_assume!(a >= b || a <= 0);
            prop_assert!(check_ordered_pair(&[a, b], "limits").is_err());
        }
    }
}

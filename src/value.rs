//! Answer values and answer comparison.
//!
//! Reference answers and engine answers are both lists of [`Row`]s. Two
//! answers agree when they contain the same set of rows, regardless of order
//! or duplication.

use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::fmt;

use serde::Serialize;

/// A single cell of an answer row.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
}

impl Value {
    fn type_rank(&self) -> u8 {
        match self {
            Value::Null => 0,
            Value::Integer(_) | Value::Real(_) => 1,
            Value::Text(_) => 2,
            Value::Blob(_) => 3,
        }
    }
}

/// Reals order by `total_cmp`, except that `-0.0` equals `0.0`.
fn cmp_reals(a: f64, b: f64) -> Ordering {
    if a == b {
        Ordering::Equal
    } else {
        a.total_cmp(&b)
    }
}

/// Compare an integer with a real exactly. NaNs sit where `total_cmp` puts
/// them: positive NaN above every number, negative NaN below.
fn cmp_integer_real(i: i64, r: f64) -> Ordering {
    const TWO_POW_63: f64 = 9_223_372_036_854_775_808.0;

    if r.is_nan() {
        return if r.is_sign_negative() {
            Ordering::Greater
        } else {
            Ordering::Less
        };
    }
    if r >= TWO_POW_63 {
        return Ordering::Less;
    }
    if r < -TWO_POW_63 {
        return Ordering::Greater;
    }

    // in range, so the truncated value converts to i64 without loss
    let whole = r.trunc();
    match i.cmp(&(whole as i64)) {
        Ordering::Equal => cmp_reals(0.0, r - whole),
        other => other,
    }
}

impl Ord for Value {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Value::Null, Value::Null) => Ordering::Equal,
            (Value::Integer(a), Value::Integer(b)) => a.cmp(b),
            (Value::Real(a), Value::Real(b)) => cmp_reals(*a, *b),
            (Value::Integer(a), Value::Real(b)) => cmp_integer_real(*a, *b),
            (Value::Real(a), Value::Integer(b)) => cmp_integer_real(*b, *a).reverse(),
            (Value::Text(a), Value::Text(b)) => a.cmp(b),
            (Value::Blob(a), Value::Blob(b)) => a.cmp(b),
            _ => self.type_rank().cmp(&other.type_rank()),
        }
    }
}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Value {}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Integer(i) => write!(f, "{i}"),
            Value::Real(r) => write!(f, "{r:?}"),
            Value::Text(s) => write!(f, "'{}'", s.replace('\'', "\\'")),
            Value::Blob(b) => {
                write!(f, "X'")?;
                for byte in b {
                    write!(f, "{byte:02X}")?;
                }
                write!(f, "'")
            }
        }
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Integer(value)
    }
}

impl From<usize> for Value {
    fn from(value: usize) -> Self {
        Value::Integer(value as i64)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Real(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<&String> for Value {
    fn from(value: &String) -> Self {
        Value::Text(value.clone())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Null, Into::into)
    }
}

/// A tuple of an answer.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct Row(pub Vec<Value>);

impl Row {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn values(&self) -> &[Value] {
        &self.0
    }
}

/// Displays like a tuple: `('Object 3', 45, NULL)`, `('gold',)`.
impl fmt::Display for Row {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for (i, value) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{value}")?;
        }
        if self.0.len() == 1 {
            write!(f, ",")?;
        }
        write!(f, ")")
    }
}

/// Build a [`Row`] from expressions convertible into [`Value`].
#[macro_export]
macro_rules! row {
    ($($value:expr),* $(,)?) => {
        $crate::value::Row(vec![$($crate::value::Value::from($value)),*])
    };
}

/// Difference between two answers, compared as sets of rows.
#[derive(Debug, Clone, Default)]
pub struct AnswerDiff {
    /// Rows the reference produced that the engine did not.
    pub only_in_expected: Vec<Row>,
    /// Rows the engine produced that the reference did not.
    pub only_in_got: Vec<Row>,
}

impl AnswerDiff {
    pub fn between(expected: &[Row], got: &[Row]) -> Self {
        let expected: BTreeSet<&Row> = expected.iter().collect();
        let got: BTreeSet<&Row> = got.iter().collect();
        Self {
            only_in_expected: expected.difference(&got).map(|&r| r.clone()).collect(),
            only_in_got: got.difference(&expected).map(|&r| r.clone()).collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.only_in_expected.is_empty() && self.only_in_got.is_empty()
    }
}

/// Whether two answers contain the same set of rows.
pub fn same_answer(expected: &[Row], got: &[Row]) -> bool {
    let expected: BTreeSet<&Row> = expected.iter().collect();
    let got: BTreeSet<&Row> = got.iter().collect();
    expected == got
}

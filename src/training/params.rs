//! Hyperparameter assignments and grids

use crate::error::{HarnessError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A single hyperparameter value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Bool(b) => write!(f, "{}", b),
            ParamValue::Int(i) => write!(f, "{}", i),
            ParamValue::Float(x) => write!(f, "{}", x),
            ParamValue::Text(s) => write!(f, "{}", s),
        }
    }
}

impl From<bool> for ParamValue {
    fn from(v: bool) -> Self {
        ParamValue::Bool(v)
    }
}

impl From<i64> for ParamValue {
    fn from(v: i64) -> Self {
        ParamValue::Int(v)
    }
}

impl From<usize> for ParamValue {
    fn from(v: usize) -> Self {
        ParamValue::Int(v as i64)
    }
}

impl From<f64> for ParamValue {
    fn from(v: f64) -> Self {
        ParamValue::Float(v)
    }
}

impl From<&str> for ParamValue {
    fn from(v: &str) -> Self {
        ParamValue::Text(v.to_string())
    }
}

/// One classifier configuration: hyperparameter name → value
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParamSet(BTreeMap<String, ParamValue>);

impl ParamSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn with(mut self, key: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&ParamValue> {
        self.0.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ParamValue)> {
        self.0.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Reject keys outside the classifier's schema
    pub fn ensure_known(&self, allowed: &[&str]) -> Result<()> {
        match self.0.keys().find(|k| !allowed.contains(&k.as_str())) {
            Some(key) => Err(HarnessError::config(
                key.clone(),
                format!("unknown hyperparameter (expected one of: {})", allowed.join(", ")),
            )),
            None => Ok(()),
        }
    }

    /// Non-negative integer value
    pub fn usize(&self, key: &str) -> Result<Option<usize>> {
        match self.0.get(key) {
            None => Ok(None),
            Some(ParamValue::Int(i)) if *i >= 0 => Ok(Some(*i as usize)),
            Some(ParamValue::Float(x)) if *x >= 0.0 && x.fract() == 0.0 => Ok(Some(*x as usize)),
            Some(other) => Err(HarnessError::config(
                key,
                format!("expected a non-negative integer, got {}", other),
            )),
        }
    }

    /// Numeric value
    pub fn f64(&self, key: &str) -> Result<Option<f64>> {
        match self.0.get(key) {
            None => Ok(None),
            Some(ParamValue::Int(i)) => Ok(Some(*i as f64)),
            Some(ParamValue::Float(x)) if x.is_finite() => Ok(Some(*x)),
            Some(other) => Err(HarnessError::config(key, format!("expected a number, got {}", other))),
        }
    }

    /// Text value
    pub fn text(&self, key: &str) -> Result<Option<&str>> {
        match self.0.get(key) {
            None => Ok(None),
            Some(ParamValue::Text(s)) => Ok(Some(s.as_str())),
            Some(other) => Err(HarnessError::config(key, format!("expected a string, got {}", other))),
        }
    }

    /// Boolean value
    pub fn flag(&self, key: &str) -> Result<Option<bool>> {
        match self.0.get(key) {
            None => Ok(None),
            Some(ParamValue::Bool(b)) => Ok(Some(*b)),
            Some(other) => Err(HarnessError::config(key, format!("expected true or false, got {}", other))),
        }
    }
}

impl fmt::Display for ParamSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return write!(f, "(defaults)");
        }
        let parts: Vec<String> = self.0.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
        write!(f, "{}", parts.join(", "))
    }
}

/// Candidate values per hyperparameter.
///
/// Configurations are the cartesian product over the keys in sorted order,
/// with the last key varying fastest. That order is the canonical grid order
/// used for tie-breaking.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParamGrid(BTreeMap<String, Vec<ParamValue>>);

impl ParamGrid {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add candidate values for one hyperparameter
    pub fn axis<V: Into<ParamValue>>(mut self, key: impl Into<String>, values: impl IntoIterator<Item = V>) -> Self {
        self.0.insert(key.into(), values.into_iter().map(Into::into).collect());
        self
    }

    /// Grid holding exactly one configuration
    pub fn single(params: &ParamSet) -> Self {
        Self(params.iter().map(|(k, v)| (k.clone(), vec![v.clone()])).collect())
    }

    /// Number of configurations
    pub fn len(&self) -> usize {
        self.0.values().map(Vec::len).product()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Enumerate every configuration in canonical order
    pub fn configurations(&self) -> Result<Vec<ParamSet>> {
        let mut configs = vec![ParamSet::new()];
        for (key, values) in &self.0 {
            if values.is_empty() {
                return Err(HarnessError::config(key.clone(), "grid axis has no values"));
            }
            configs = configs
                .into_iter()
                .flat_map(|base| {
                    values.iter().map(move |v| {
                        let mut next = base.clone();
                        next.0.insert(key.clone(), v.clone());
                        next
                    })
                })
                .collect();
        }
        Ok(configs)
    }
}

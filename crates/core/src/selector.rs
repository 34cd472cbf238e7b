// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Key/operator/values expressions used to filter resources by labels and
//! to gate box resources and workflows by build settings.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Selector {
    /// Key equality map: every entry must match.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub matches: HashMap<String, String>,
    /// Richer operations: every entry must match.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub operations: Vec<Operation>,
}

impl Selector {
    pub fn validate(&self) -> Result<(), crate::Error> {
        for op in &self.operations {
            op.validate()?;
        }
        Ok(())
    }

    pub fn matches(&self, data: &HashMap<String, String>) -> bool {
        for (k, v) in &self.matches {
            if data.get(k) != Some(v) {
                return false;
            }
        }
        self.operations.iter().all(|op| op.matches(data))
    }
}

/// Match an optional selector: absence matches everything.
pub fn matches_opt(selector: Option<&Selector>, data: &HashMap<String, String>) -> bool {
    selector.is_none_or(|s| s.matches(data))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Operation {
    pub key: String,
    pub operator: Operator,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub values: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operator {
    In,
    NotIn,
    Equals,
    NotEquals,
    Exists,
    DoesNotExist,
    GreaterThan,
    LessThan,
}

crate::simple_display! {
    Operator {
        In => "In",
        NotIn => "NotIn",
        Equals => "Equals",
        NotEquals => "NotEquals",
        Exists => "Exists",
        DoesNotExist => "DoesNotExist",
        GreaterThan => "GreaterThan",
        LessThan => "LessThan",
    }
}

impl Operation {
    /// Validate the operator/values combination:
    ///
    /// 1. `In`/`NotIn` require a non-empty values set.
    /// 2. `Equals`/`NotEquals` require exactly one value.
    /// 3. `Exists`/`DoesNotExist` require an empty values set.
    /// 4. `GreaterThan`/`LessThan` require exactly one value parseable as a
    ///    64-bit integer.
    pub fn validate(&self) -> Result<(), crate::Error> {
        let key = &self.key;
        match self.operator {
            Operator::In | Operator::NotIn => {
                if self.values.is_empty() {
                    return Err(crate::Error::invalid(format!(
                        "{key}: for 'In', 'NotIn' operators, values set can't be empty"
                    )));
                }
            }
            Operator::Equals | Operator::NotEquals => {
                if self.values.len() != 1 {
                    return Err(crate::Error::invalid(format!(
                        "{key}: exact-match compatibility requires one single value"
                    )));
                }
            }
            Operator::Exists | Operator::DoesNotExist => {
                if !self.values.is_empty() {
                    return Err(crate::Error::invalid(format!(
                        "{key}: values set must be empty for exists and does not exist"
                    )));
                }
            }
            Operator::GreaterThan | Operator::LessThan => {
                if self.values.len() != 1 {
                    return Err(crate::Error::invalid(format!(
                        "{key}: for 'Gt', 'Lt' operators, exactly one value is required"
                    )));
                }
                if self.values[0].parse::<i64>().is_err() {
                    return Err(crate::Error::invalid(format!(
                        "{key}: for 'Gt', 'Lt' operators, the value must be an integer"
                    )));
                }
            }
        }
        Ok(())
    }

    pub fn matches(&self, data: &HashMap<String, String>) -> bool {
        let Some(val) = data.get(&self.key) else {
            return self.operator == Operator::DoesNotExist;
        };
        match self.operator {
            Operator::In => self.values.iter().any(|v| v == val),
            Operator::NotIn => !self.values.iter().any(|v| v == val),
            Operator::Equals => val == &self.values[0],
            Operator::NotEquals => val != &self.values[0],
            Operator::Exists => true,
            Operator::DoesNotExist => false,
            Operator::GreaterThan => compare_ints(val, &self.values[0], |a, b| a > b),
            Operator::LessThan => compare_ints(val, &self.values[0], |a, b| a < b),
        }
    }
}

fn compare_ints(a: &str, b: &str, cmp: impl Fn(i64, i64) -> bool) -> bool {
    match (a.parse::<i64>(), b.parse::<i64>()) {
        (Ok(a), Ok(b)) => cmp(a, b),
        _ => false,
    }
}

#[cfg(test)]
#[path = "selector_tests.rs"]
mod tests;

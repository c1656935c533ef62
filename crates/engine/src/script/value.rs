use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::command::CommandError;

/// Scalar carried by variables, event parameters and command operands.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Bool(bool),
    Number(f64),
    Text(String),
}

impl Default for Value {
    fn default() -> Self {
        Value::Number(0.0)
    }
}

impl Value {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(number) => Some(*number),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(flag) => Some(*flag),
            _ => None,
        }
    }

    pub fn number(&self) -> Result<f64, CommandError> {
        self.as_number().ok_or_else(|| CommandError::NotANumber {
            value: self.to_string(),
        })
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(flag) => write!(f, "{flag}"),
            Value::Number(number) => write!(f, "{number}"),
            Value::Text(text) => write!(f, "\"{text}\""),
        }
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Number(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

/// Operand resolved at run time against the world variables or the
/// parameters the reaction was triggered with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DynamicValue {
    Variable { var: u32 },
    Parameter { param: usize },
    Constant(Value),
}

impl From<Value> for DynamicValue {
    fn from(value: Value) -> Self {
        DynamicValue::Constant(value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Comparison {
    #[serde(rename = "==")]
    Equal,
    #[serde(rename = "!=")]
    NotEqual,
    #[serde(rename = "<")]
    Less,
    #[serde(rename = "<=")]
    LessOrEqual,
    #[serde(rename = ">")]
    Greater,
    #[serde(rename = ">=")]
    GreaterOrEqual,
}

impl Comparison {
    pub fn evaluate(self, left: &Value, right: &Value) -> Result<bool, CommandError> {
        let ordering = || {
            match (left, right) {
                (Value::Number(l), Value::Number(r)) => l.partial_cmp(r),
                (Value::Text(l), Value::Text(r)) => Some(l.cmp(r)),
                _ => None,
            }
            .ok_or_else(|| CommandError::IncomparableValues {
                left: left.to_string(),
                right: right.to_string(),
            })
        };

        Ok(match self {
            Comparison::Equal => left == right,
            Comparison::NotEqual => left != right,
            Comparison::Less => ordering()? == Ordering::Less,
            Comparison::LessOrEqual => ordering()? != Ordering::Greater,
            Comparison::Greater => ordering()? == Ordering::Greater,
            Comparison::GreaterOrEqual => ordering()? != Ordering::Less,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    pub left: DynamicValue,
    pub op: Comparison,
    pub right: DynamicValue,
}

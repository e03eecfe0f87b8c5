//! Chroma-style `where` / `where_document` filters.
//!
//! Filters arrive as JSON objects and are parsed once into typed trees, then
//! evaluated against stored records:
//!
//! - metadata: `{"k": v}`, `{"k": {"$gt": 3}}`, `{"k": {"$in": [..]}}`,
//!   `{"$and": [..]}`, `{"$or": [..]}`. Several keys in one object are AND-ed.
//! - document: `{"$contains": "s"}`, `{"$not_contains": "s"}`, `$and`, `$or`.
//!
//! A condition on a key the record does not carry never matches.

use std::cmp::Ordering;

use serde_json::Value;

use crate::error::{Error, Result};
use crate::types::Metadata;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
    In,
    Nin,
}

impl Comparison {
    fn from_operator(op: &str) -> Option<Self> {
        Some(match op {
            "$eq" => Self::Eq,
            "$ne" => Self::Ne,
            "$gt" => Self::Gt,
            "$gte" => Self::Gte,
            "$lt" => Self::Lt,
            "$lte" => Self::Lte,
            "$in" => Self::In,
            "$nin" => Self::Nin,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum MetadataFilter {
    And(Vec<MetadataFilter>),
    Or(Vec<MetadataFilter>),
    Field { key: String, op: Comparison, value: Value },
}

impl MetadataFilter {
    pub fn parse(value: &Value) -> Result<Self> {
        let obj = value
            .as_object()
            .ok_or_else(|| Error::InvalidFilter(format!("where must be an object, got {}", value)))?;
        if obj.is_empty() {
            return Err(Error::InvalidFilter("where must not be empty".into()));
        }
        let mut clauses = Vec::with_capacity(obj.len());
        for (key, inner) in obj {
            let clause = match key.as_str() {
                "$and" => Self::And(Self::parse_list(key, inner)?),
                "$or" => Self::Or(Self::parse_list(key, inner)?),
                k if k.starts_with('$') => {
                    return Err(Error::InvalidFilter(format!("unknown logical operator {}", k)))
                }
                k => Self::parse_field(k, inner)?,
            };
            clauses.push(clause);
        }
        if clauses.len() == 1 {
            Ok(clauses.remove(0))
        } else {
            Ok(Self::And(clauses))
        }
    }

    fn parse_list(op: &str, value: &Value) -> Result<Vec<Self>> {
        let items = value
            .as_array()
            .ok_or_else(|| Error::InvalidFilter(format!("{} expects a list", op)))?;
        if items.is_empty() {
            return Err(Error::InvalidFilter(format!("{} expects at least one clause", op)));
        }
        items.iter().map(Self::parse).collect()
    }

    fn parse_field(key: &str, value: &Value) -> Result<Self> {
        let (op, operand) = match value {
            Value::Object(ops) => {
                if ops.len() != 1 {
                    return Err(Error::InvalidFilter(format!(
                        "condition on '{}' must have exactly one operator",
                        key
                    )));
                }
                let (name, operand) = ops.iter().next().ok_or_else(|| {
                    Error::InvalidFilter(format!("condition on '{}' has no operator", key))
                })?;
                let op = Comparison::from_operator(name)
                    .ok_or_else(|| Error::InvalidFilter(format!("unknown operator {}", name)))?;
                (op, operand.clone())
            }
            Value::Array(_) | Value::Null => {
                return Err(Error::InvalidFilter(format!("unsupported value for '{}': {}", key, value)))
            }
            scalar => (Comparison::Eq, scalar.clone()),
        };
        match op {
            Comparison::In | Comparison::Nin if !operand.is_array() => {
                return Err(Error::InvalidFilter(format!("$in/$nin on '{}' expects a list", key)))
            }
            Comparison::Gt | Comparison::Gte | Comparison::Lt | Comparison::Lte if !operand.is_number() => {
                return Err(Error::InvalidFilter(format!("range operator on '{}' expects a number", key)))
            }
            _ => {}
        }
        Ok(Self::Field { key: key.to_string(), op, value: operand })
    }

    pub fn matches(&self, metadata: &Metadata) -> bool {
        match self {
            Self::And(all) => all.iter().all(|f| f.matches(metadata)),
            Self::Or(any) => any.iter().any(|f| f.matches(metadata)),
            Self::Field { key, op, value } => {
                let Some(field) = metadata.get(key) else { return false };
                match op {
                    Comparison::Eq => json_eq(field, value),
                    Comparison::Ne => !json_eq(field, value),
                    Comparison::Gt => json_cmp(field, value) == Some(Ordering::Greater),
                    Comparison::Gte => matches!(json_cmp(field, value), Some(Ordering::Greater | Ordering::Equal)),
                    Comparison::Lt => json_cmp(field, value) == Some(Ordering::Less),
                    Comparison::Lte => matches!(json_cmp(field, value), Some(Ordering::Less | Ordering::Equal)),
                    Comparison::In => value.as_array().is_some_and(|vs| vs.iter().any(|v| json_eq(field, v))),
                    Comparison::Nin => value.as_array().is_some_and(|vs| !vs.iter().any(|v| json_eq(field, v))),
                }
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentFilter {
    Contains(String),
    NotContains(String),
    And(Vec<DocumentFilter>),
    Or(Vec<DocumentFilter>),
}

impl DocumentFilter {
    pub fn parse(value: &Value) -> Result<Self> {
        let obj = value
            .as_object()
            .ok_or_else(|| Error::InvalidFilter(format!("where_document must be an object, got {}", value)))?;
        if obj.len() != 1 {
            return Err(Error::InvalidFilter("where_document must have exactly one operator".into()));
        }
        let (op, operand) = obj
            .iter()
            .next()
            .ok_or_else(|| Error::InvalidFilter("where_document has no operator".into()))?;
        match op.as_str() {
            "$contains" => Ok(Self::Contains(Self::needle(op, operand)?)),
            "$not_contains" => Ok(Self::NotContains(Self::needle(op, operand)?)),
            "$and" | "$or" => {
                let items = operand
                    .as_array()
                    .filter(|items| !items.is_empty())
                    .ok_or_else(|| Error::InvalidFilter(format!("{} expects a non-empty list", op)))?;
                let parsed = items.iter().map(Self::parse).collect::<Result<Vec<_>>>()?;
                Ok(if op == "$and" { Self::And(parsed) } else { Self::Or(parsed) })
            }
            other => Err(Error::InvalidFilter(format!("unknown document operator {}", other))),
        }
    }

    fn needle(op: &str, value: &Value) -> Result<String> {
        value
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| Error::InvalidFilter(format!("{} expects a string", op)))
    }

    pub fn matches(&self, text: &str) -> bool {
        match self {
            Self::Contains(s) => text.contains(s.as_str()),
            Self::NotContains(s) => !text.contains(s.as_str()),
            Self::And(all) => all.iter().all(|f| f.matches(text)),
            Self::Or(any) => any.iter().any(|f| f.matches(text)),
        }
    }
}

/// Both filters of a query, parsed up front so malformed input is rejected
/// before the store is touched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordFilter {
    pub metadata: Option<MetadataFilter>,
    pub document: Option<DocumentFilter>,
}

impl RecordFilter {
    pub fn parse(where_: Option<&Value>, where_document: Option<&Value>) -> Result<Self> {
        Ok(Self {
            metadata: where_.map(MetadataFilter::parse).transpose()?,
            document: where_document.map(DocumentFilter::parse).transpose()?,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.metadata.is_none() && self.document.is_none()
    }

    pub fn matches(&self, text: &str, metadata: &Metadata) -> bool {
        self.metadata.as_ref().map_or(true, |f| f.matches(metadata))
            && self.document.as_ref().map_or(true, |f| f.matches(text))
    }
}

fn json_eq(field: &Value, value: &Value) -> bool {
    match (field, value) {
        (Value::Number(a), Value::Number(b)) => match (a.as_f64(), b.as_f64()) {
            (Some(x), Some(y)) => (x - y).abs() < f64::EPSILON,
            _ => false,
        },
        (a, b) => a == b,
    }
}

fn json_cmp(field: &Value, value: &Value) -> Option<Ordering> {
    field.as_f64()?.partial_cmp(&value.as_f64()?)
}

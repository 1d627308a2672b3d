//! Runtime values.
//!
//! Scalars are held inline. Arrays and objects stay as borrowed
//! `serde_json::Value` nodes so attribute walks over a large snapshot never
//! copy it.

use std::borrow::Cow;
use std::cmp::Ordering;
use std::fmt;

use serde_json::Value as Json;

use crate::error::EvalError;

/// A value produced while evaluating an expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Value<'a> {
    /// `None`
    None,
    /// Boolean
    Bool(bool),
    /// Integer
    Int(i64),
    /// Float
    Float(f64),
    /// String
    Str(Cow<'a, str>),
    /// A borrowed JSON array or object
    Json(&'a Json),
}

/// Numeric view of a value; booleans count as `0`/`1`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum Num {
    Int(i64),
    Float(f64),
}

impl Num {
    #[allow(clippy::cast_precision_loss)]
    pub(crate) fn as_f64(self) -> f64 {
        match self {
            Self::Int(v) => v as f64,
            Self::Float(v) => v,
        }
    }
}

impl<'a> Value<'a> {
    /// Wraps a JSON node, unpacking scalars.
    #[must_use]
    pub fn from_json(json: &'a Json) -> Self {
        match json {
            Json::Null => Self::None,
            Json::Bool(b) => Self::Bool(*b),
            Json::Number(n) => n
                .as_i64()
                .map(Self::Int)
                .or_else(|| n.as_f64().map(Self::Float))
                .unwrap_or(Self::None),
            Json::String(s) => Self::Str(Cow::Borrowed(s)),
            Json::Array(_) | Json::Object(_) => Self::Json(json),
        }
    }

    /// Python-style type name, used in error messages.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::None => "NoneType",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Str(_) => "str",
            Self::Json(Json::Array(_)) => "list",
            Self::Json(_) => "object",
        }
    }

    /// Python truthiness: zero, empty and `None` are false.
    #[must_use]
    pub fn is_truthy(&self) -> bool {
        match self {
            Self::None => false,
            Self::Bool(b) => *b,
            Self::Int(v) => *v != 0,
            Self::Float(v) => *v != 0.0,
            Self::Str(s) => !s.is_empty(),
            Self::Json(Json::Array(a)) => !a.is_empty(),
            Self::Json(Json::Object(o)) => !o.is_empty(),
            Self::Json(_) => true,
        }
    }

    /// Returns the value as `f64` if it is numeric (including booleans).
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        self.as_num().map(Num::as_f64)
    }

    pub(crate) fn as_num(&self) -> Option<Num> {
        match self {
            Self::Bool(b) => Some(Num::Int(i64::from(*b))),
            Self::Int(v) => Some(Num::Int(*v)),
            Self::Float(v) => Some(Num::Float(*v)),
            _ => None,
        }
    }

    pub(crate) fn from_num(num: Num) -> Self {
        match num {
            Num::Int(v) => Self::Int(v),
            Num::Float(v) => Self::Float(v),
        }
    }

    /// Attribute access on an object node.
    pub(crate) fn attr(&self, attr: &str) -> Result<Value<'a>, EvalError> {
        match self {
            Self::Json(Json::Object(map)) => map
                .get(attr)
                .map(Value::from_json)
                .ok_or_else(|| EvalError::MissingAttribute {
                    attr: attr.to_string(),
                    on: "object",
                }),
            other => Err(EvalError::MissingAttribute {
                attr: attr.to_string(),
                on: other.type_name(),
            }),
        }
    }

    /// Subscript: integer index into arrays and strings, string key into objects.
    pub(crate) fn index(&self, index: &Value<'_>) -> Result<Value<'a>, EvalError> {
        match (self, index) {
            (Self::Json(Json::Array(items)), idx) => {
                let i = int_index(idx)?;
                let slot = normalize_index(i, items.len())?;
                Ok(Value::from_json(&items[slot]))
            }
            (Self::Str(s), idx) => {
                let i = int_index(idx)?;
                let len = s.chars().count();
                let slot = normalize_index(i, len)?;
                let c = s.chars().nth(slot).map(String::from).unwrap_or_default();
                Ok(Value::Str(Cow::Owned(c)))
            }
            (Self::Json(Json::Object(map)), Value::Str(key)) => map
                .get(key.as_ref())
                .map(Value::from_json)
                .ok_or_else(|| EvalError::MissingKey(key.to_string())),
            (target, idx) => Err(EvalError::TypeMismatch {
                op: "[]",
                lhs: target.type_name(),
                rhs: idx.type_name(),
            }),
        }
    }

    /// Length of strings, arrays and objects.
    pub(crate) fn len(&self) -> Option<usize> {
        match self {
            Self::Str(s) => Some(s.chars().count()),
            Self::Json(Json::Array(a)) => Some(a.len()),
            Self::Json(Json::Object(o)) => Some(o.len()),
            _ => None,
        }
    }

    /// Equality with Python semantics: numbers compare across int/float/bool,
    /// everything else compares within its own type, mismatches are unequal.
    #[must_use]
    pub fn loose_eq(&self, other: &Value<'_>) -> bool {
        if let (Some(a), Some(b)) = (self.as_num(), other.as_num()) {
            return match (a, b) {
                (Num::Int(x), Num::Int(y)) => x == y,
                (x, y) => x.as_f64() == y.as_f64(),
            };
        }
        match (self, other) {
            (Self::None, Value::None) => true,
            (Self::Str(a), Value::Str(b)) => a == b,
            (Self::Json(a), Value::Json(b)) => a == b,
            _ => false,
        }
    }

    /// Ordering for `< <= > >=`; numbers and strings only.
    pub(crate) fn partial_order(
        &self,
        other: &Value<'_>,
        op: &'static str,
    ) -> Result<Option<Ordering>, EvalError> {
        if let (Some(a), Some(b)) = (self.as_num(), other.as_num()) {
            return Ok(match (a, b) {
                (Num::Int(x), Num::Int(y)) => Some(x.cmp(&y)),
                (x, y) => x.as_f64().partial_cmp(&y.as_f64()),
            });
        }
        match (self, other) {
            (Self::Str(a), Value::Str(b)) => Ok(Some(a.as_ref().cmp(b.as_ref()))),
            _ => Err(EvalError::TypeMismatch {
                op,
                lhs: self.type_name(),
                rhs: other.type_name(),
            }),
        }
    }

    /// Detaches the value from the scope it borrows from.
    #[must_use]
    pub fn into_owned(self) -> OwnedValue {
        match self {
            Self::None => OwnedValue::None,
            Self::Bool(b) => OwnedValue::Bool(b),
            Self::Int(v) => OwnedValue::Int(v),
            Self::Float(v) => OwnedValue::Float(v),
            Self::Str(s) => OwnedValue::Str(s.into_owned()),
            Self::Json(j) => OwnedValue::Json(j.clone()),
        }
    }
}

impl fmt::Display for Value<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "None"),
            Self::Bool(true) => write!(f, "True"),
            Self::Bool(false) => write!(f, "False"),
            Self::Int(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v:?}"),
            Self::Str(s) => write!(f, "{s}"),
            Self::Json(j) => write!(f, "{j}"),
        }
    }
}

impl From<bool> for Value<'_> {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i64> for Value<'_> {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<f64> for Value<'_> {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl<'a> From<&'a str> for Value<'a> {
    fn from(s: &'a str) -> Self {
        Self::Str(Cow::Borrowed(s))
    }
}

impl From<String> for Value<'_> {
    fn from(s: String) -> Self {
        Self::Str(Cow::Owned(s))
    }
}

/// A [`Value`] that owns its data, for results that outlive the scope.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(untagged)]
pub enum OwnedValue {
    /// `None`
    None,
    /// Boolean
    Bool(bool),
    /// Integer
    Int(i64),
    /// Float
    Float(f64),
    /// String
    Str(String),
    /// JSON array or object
    Json(Json),
}

fn int_index(idx: &Value<'_>) -> Result<i64, EvalError> {
    match idx {
        Value::Int(i) => Ok(*i),
        Value::Bool(b) => Ok(i64::from(*b)),
        other => Err(EvalError::BadOperand {
            op: "[]",
            ty: other.type_name(),
        }),
    }
}

fn normalize_index(index: i64, len: usize) -> Result<usize, EvalError> {
    let out_of_range = EvalError::IndexOutOfRange { index, len };
    let len_i = i64::try_from(len).map_err(|_| out_of_range.clone())?;
    let resolved = if index < 0 { index + len_i } else { index };
    if (0..len_i).contains(&resolved) {
        usize::try_from(resolved).map_err(|_| out_of_range)
    } else {
        Err(out_of_range)
    }
}

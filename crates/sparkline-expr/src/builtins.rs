//! The whitelist of pure builtin functions.
//!
//! Calls are resolved at parse time, so a name outside this list can never
//! reach the evaluator.

use std::borrow::Cow;
use std::cmp::Ordering;

use serde_json::Value as Json;

use crate::error::EvalError;
use crate::value::{Num, Value};

/// A callable builtin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Builtin {
    /// `abs(x)`
    Abs,
    /// `min(a, b, ...)` or `min(list)`
    Min,
    /// `max(a, b, ...)` or `max(list)`
    Max,
    /// `len(x)`
    Len,
    /// `round(x)` or `round(x, ndigits)`
    Round,
    /// `int(x)`
    Int,
    /// `float(x)`
    Float,
    /// `bool(x)`
    Bool,
    /// `sum(list)`
    Sum,
    /// `sqrt(x)`
    Sqrt,
}

impl Builtin {
    /// Every builtin, in documentation order.
    pub const ALL: [Builtin; 10] = [
        Self::Abs,
        Self::Min,
        Self::Max,
        Self::Len,
        Self::Round,
        Self::Int,
        Self::Float,
        Self::Bool,
        Self::Sum,
        Self::Sqrt,
    ];

    /// Looks up a builtin by the name used in source.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|b| b.name() == name)
    }

    /// The name used in source.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Abs => "abs",
            Self::Min => "min",
            Self::Max => "max",
            Self::Len => "len",
            Self::Round => "round",
            Self::Int => "int",
            Self::Float => "float",
            Self::Bool => "bool",
            Self::Sum => "sum",
            Self::Sqrt => "sqrt",
        }
    }

    /// Applies the builtin to already-evaluated arguments.
    ///
    /// # Errors
    ///
    /// Returns [`EvalError::Arity`] for a wrong argument count and
    /// [`EvalError::BadOperand`]/[`EvalError::InvalidArgument`] for values the
    /// builtin cannot handle.
    pub fn call<'a>(self, args: Vec<Value<'a>>) -> Result<Value<'a>, EvalError> {
        match self {
            Self::Abs => {
                let [x] = exactly::<1>(self, args)?;
                match numeric(self, &x)? {
                    Num::Int(v) => Ok(v
                        .checked_abs()
                        .map_or_else(|| Value::Float(Num::Int(v).as_f64().abs()), Value::Int)),
                    Num::Float(v) => Ok(Value::Float(v.abs())),
                }
            }
            Self::Min => extreme(self, args, Ordering::Less),
            Self::Max => extreme(self, args, Ordering::Greater),
            Self::Len => {
                let [x] = exactly::<1>(self, args)?;
                let len = x.len().ok_or(EvalError::BadOperand {
                    op: "len",
                    ty: x.type_name(),
                })?;
                Ok(Value::Int(i64::try_from(len).unwrap_or(i64::MAX)))
            }
            Self::Round => round(args),
            Self::Int => {
                let [x] = exactly::<1>(self, args)?;
                to_int(&x)
            }
            Self::Float => {
                let [x] = exactly::<1>(self, args)?;
                match &x {
                    Value::Str(s) => s.trim().parse().map(Value::Float).map_err(|_| {
                        EvalError::InvalidArgument {
                            func: "float",
                            reason: format!("could not convert string to float: {s:?}"),
                        }
                    }),
                    other => Ok(Value::Float(numeric(self, other)?.as_f64())),
                }
            }
            Self::Bool => {
                let [x] = exactly::<1>(self, args)?;
                Ok(Value::Bool(x.is_truthy()))
            }
            Self::Sum => {
                let [x] = exactly::<1>(self, args)?;
                let items = iterable(self, &x)?;
                let mut total = Num::Int(0);
                for item in &items {
                    total = add_nums(total, numeric(self, item)?);
                }
                Ok(Value::from_num(total))
            }
            Self::Sqrt => {
                let [x] = exactly::<1>(self, args)?;
                let v = numeric(self, &x)?.as_f64();
                if v < 0.0 {
                    return Err(EvalError::InvalidArgument {
                        func: "sqrt",
                        reason: "math domain error".to_string(),
                    });
                }
                Ok(Value::Float(v.sqrt()))
            }
        }
    }
}

fn exactly<const N: usize>(func: Builtin, args: Vec<Value<'_>>) -> Result<[Value<'_>; N], EvalError> {
    let got = args.len();
    args.try_into().map_err(|_| EvalError::Arity {
        func: func.name(),
        expected: match N {
            1 => "exactly one",
            2 => "exactly two",
            _ => "a different number of",
        },
        got,
    })
}

fn numeric(func: Builtin, value: &Value<'_>) -> Result<Num, EvalError> {
    value.as_num().ok_or(EvalError::BadOperand {
        op: func.name(),
        ty: value.type_name(),
    })
}

fn iterable<'a>(func: Builtin, value: &Value<'a>) -> Result<Vec<Value<'a>>, EvalError> {
    match value {
        Value::Json(Json::Array(items)) => Ok(items.iter().map(Value::from_json).collect()),
        Value::Str(s) => Ok(s
            .chars()
            .map(|c| Value::Str(Cow::Owned(c.to_string())))
            .collect()),
        other => Err(EvalError::BadOperand {
            op: func.name(),
            ty: other.type_name(),
        }),
    }
}

fn add_nums(a: Num, b: Num) -> Num {
    match (a, b) {
        (Num::Int(x), Num::Int(y)) => x
            .checked_add(y)
            .map_or_else(|| Num::Float(a.as_f64() + b.as_f64()), Num::Int),
        (x, y) => Num::Float(x.as_f64() + y.as_f64()),
    }
}

fn extreme<'a>(func: Builtin, args: Vec<Value<'a>>, want: Ordering) -> Result<Value<'a>, EvalError> {
    let candidates = match args.len() {
        0 => {
            return Err(EvalError::Arity {
                func: func.name(),
                expected: "at least one",
                got: 0,
            })
        }
        1 => iterable(func, &args[0])?,
        _ => args,
    };

    let mut iter = candidates.into_iter();
    let mut best = iter.next().ok_or_else(|| EvalError::InvalidArgument {
        func: func.name(),
        reason: "arg is an empty sequence".to_string(),
    })?;
    for candidate in iter {
        if candidate.partial_order(&best, func.name())? == Some(want) {
            best = candidate;
        }
    }
    Ok(best)
}

fn round(args: Vec<Value<'_>>) -> Result<Value<'_>, EvalError> {
    let got = args.len();
    let mut args = args.into_iter();
    let (Some(x), digits, None) = (args.next(), args.next(), args.next()) else {
        return Err(EvalError::Arity {
            func: "round",
            expected: "one or two",
            got,
        });
    };

    let num = numeric(Builtin::Round, &x)?;
    match digits {
        None | Some(Value::None) => match num {
            Num::Int(v) => Ok(Value::Int(v)),
            Num::Float(v) => float_to_int("round", v.round_ties_even()),
        },
        Some(d) => {
            let ndigits = match d {
                Value::Int(n) => n,
                other => {
                    return Err(EvalError::BadOperand {
                        op: "round",
                        ty: other.type_name(),
                    })
                }
            };
            let exp = i32::try_from(ndigits.clamp(-308, 308)).unwrap_or(0);
            let scale = 10f64.powi(exp);
            let rounded = (num.as_f64() * scale).round_ties_even() / scale;
            match num {
                Num::Int(_) => float_to_int("round", rounded),
                Num::Float(_) => Ok(Value::Float(rounded)),
            }
        }
    }
}

fn to_int<'a>(value: &Value<'_>) -> Result<Value<'a>, EvalError> {
    match value {
        Value::Str(s) => s
            .trim()
            .parse::<i64>()
            .map(Value::Int)
            .map_err(|_| EvalError::InvalidArgument {
                func: "int",
                reason: format!("invalid literal for int(): {s:?}"),
            }),
        Value::Float(v) => float_to_int("int", v.trunc()),
        other => match numeric(Builtin::Int, other)? {
            Num::Int(v) => Ok(Value::Int(v)),
            Num::Float(v) => float_to_int("int", v.trunc()),
        },
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
fn float_to_int<'a>(func: &'static str, v: f64) -> Result<Value<'a>, EvalError> {
    if !v.is_finite() || v >= i64::MAX as f64 || v < i64::MIN as f64 {
        return Err(EvalError::InvalidArgument {
            func,
            reason: format!("cannot convert {v} to integer"),
        });
    }
    Ok(Value::Int(v as i64))
}

//! Tree-walking evaluator.

use std::borrow::Cow;
use std::cmp::Ordering;

use crate::ast::{BinaryOp, CmpOp, Literal, Node, UnaryOp};
use crate::error::EvalError;
use crate::scope::Scope;
use crate::value::{Num, Value};

/// Evaluates `node` against `scope`.
pub(crate) fn eval<'a>(node: &'a Node, scope: &Scope<'a>) -> Result<Value<'a>, EvalError> {
    match node {
        Node::Literal(lit) => Ok(match lit {
            Literal::None => Value::None,
            Literal::Bool(b) => Value::Bool(*b),
            Literal::Int(v) => Value::Int(*v),
            Literal::Float(v) => Value::Float(*v),
            Literal::Str(s) => Value::Str(Cow::Borrowed(s)),
        }),
        Node::Name(name) => scope
            .get(name)
            .cloned()
            .ok_or_else(|| EvalError::UnknownName(name.clone())),
        Node::Attr { target, attr } => eval(target, scope)?.attr(attr),
        Node::Index { target, index } => {
            let target = eval(target, scope)?;
            let index = eval(index, scope)?;
            target.index(&index)
        }
        Node::Call { func, args } => {
            let values = args
                .iter()
                .map(|arg| eval(arg, scope))
                .collect::<Result<Vec<_>, _>>()?;
            func.call(values)
        }
        Node::Unary { op, operand } => unary(*op, eval(operand, scope)?),
        Node::Binary { op, lhs, rhs } => arith(*op, eval(lhs, scope)?, eval(rhs, scope)?),
        Node::Compare { first, rest } => {
            let mut left = eval(first, scope)?;
            for (op, operand) in rest {
                let right = eval(operand, scope)?;
                if !compare(*op, &left, &right)? {
                    return Ok(Value::Bool(false));
                }
                left = right;
            }
            Ok(Value::Bool(true))
        }
        Node::And(lhs, rhs) => {
            let left = eval(lhs, scope)?;
            if left.is_truthy() {
                eval(rhs, scope)
            } else {
                Ok(left)
            }
        }
        Node::Or(lhs, rhs) => {
            let left = eval(lhs, scope)?;
            if left.is_truthy() {
                Ok(left)
            } else {
                eval(rhs, scope)
            }
        }
    }
}

fn unary(op: UnaryOp, value: Value<'_>) -> Result<Value<'_>, EvalError> {
    if op == UnaryOp::Not {
        return Ok(Value::Bool(!value.is_truthy()));
    }

    let symbol = if op == UnaryOp::Neg { "unary -" } else { "unary +" };
    let num = value.as_num().ok_or(EvalError::BadOperand {
        op: symbol,
        ty: value.type_name(),
    })?;
    Ok(match (op, num) {
        (UnaryOp::Neg, Num::Int(v)) => v
            .checked_neg()
            .map_or_else(|| Value::Float(-num.as_f64()), Value::Int),
        (UnaryOp::Neg, Num::Float(v)) => Value::Float(-v),
        _ => Value::from_num(num),
    })
}

fn arith<'a>(op: BinaryOp, lhs: Value<'a>, rhs: Value<'a>) -> Result<Value<'a>, EvalError> {
    if op == BinaryOp::Add {
        if let (Value::Str(a), Value::Str(b)) = (&lhs, &rhs) {
            return Ok(Value::Str(Cow::Owned(format!("{a}{b}"))));
        }
    }

    let (Some(a), Some(b)) = (lhs.as_num(), rhs.as_num()) else {
        return Err(EvalError::TypeMismatch {
            op: op.symbol(),
            lhs: lhs.type_name(),
            rhs: rhs.type_name(),
        });
    };

    match (a, b) {
        (Num::Int(x), Num::Int(y)) => int_arith(op, x, y),
        _ => float_arith(op, a.as_f64(), b.as_f64()).map(Value::Float),
    }
}

fn int_arith<'a>(op: BinaryOp, x: i64, y: i64) -> Result<Value<'a>, EvalError> {
    let promoted = || float_arith(op, Num::Int(x).as_f64(), Num::Int(y).as_f64()).map(Value::Float);
    let checked = match op {
        BinaryOp::Add => x.checked_add(y),
        BinaryOp::Sub => x.checked_sub(y),
        BinaryOp::Mul => x.checked_mul(y),
        BinaryOp::Div => return promoted(),
        BinaryOp::FloorDiv => {
            if y == 0 {
                return Err(EvalError::DivisionByZero);
            }
            x.checked_div(y).map(|q| {
                if x % y != 0 && (x < 0) != (y < 0) {
                    q - 1
                } else {
                    q
                }
            })
        }
        BinaryOp::Mod => {
            if y == 0 {
                return Err(EvalError::DivisionByZero);
            }
            let r = x.checked_rem(y).unwrap_or(0);
            Some(if r != 0 && (r < 0) != (y < 0) { r + y } else { r })
        }
        BinaryOp::Pow => {
            if y < 0 {
                if x == 0 {
                    return Err(EvalError::DivisionByZero);
                }
                return promoted();
            }
            u32::try_from(y).ok().and_then(|e| x.checked_pow(e))
        }
    };
    match checked {
        Some(v) => Ok(Value::Int(v)),
        None => promoted(),
    }
}

fn float_arith(op: BinaryOp, x: f64, y: f64) -> Result<f64, EvalError> {
    Ok(match op {
        BinaryOp::Add => x + y,
        BinaryOp::Sub => x - y,
        BinaryOp::Mul => x * y,
        BinaryOp::Div => {
            if y == 0.0 {
                return Err(EvalError::DivisionByZero);
            }
            x / y
        }
        BinaryOp::FloorDiv => {
            if y == 0.0 {
                return Err(EvalError::DivisionByZero);
            }
            (x / y).floor()
        }
        BinaryOp::Mod => {
            if y == 0.0 {
                return Err(EvalError::DivisionByZero);
            }
            let r = x % y;
            if r != 0.0 && (r < 0.0) != (y < 0.0) {
                r + y
            } else {
                r
            }
        }
        BinaryOp::Pow => {
            if x == 0.0 && y < 0.0 {
                return Err(EvalError::DivisionByZero);
            }
            x.powf(y)
        }
    })
}

fn compare(op: CmpOp, lhs: &Value<'_>, rhs: &Value<'_>) -> Result<bool, EvalError> {
    let ordering = match op {
        CmpOp::Eq => return Ok(lhs.loose_eq(rhs)),
        CmpOp::Ne => return Ok(!lhs.loose_eq(rhs)),
        _ => lhs.partial_order(rhs, op.symbol())?,
    };
    // NaN compares false with everything.
    let Some(ordering) = ordering else {
        return Ok(false);
    };
    Ok(match op {
        CmpOp::Lt => ordering == Ordering::Less,
        CmpOp::Le => ordering != Ordering::Greater,
        CmpOp::Gt => ordering == Ordering::Greater,
        CmpOp::Ge => ordering != Ordering::Less,
        CmpOp::Eq | CmpOp::Ne => unreachable!("handled above"),
    })
}

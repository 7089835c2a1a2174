//! Operator semantics over [`Value`]s.
//!
//! `+` concatenates as soon as either side is a string. Integer arithmetic is
//! checked: overflow and integer division by zero are errors. Mixing ints and
//! floats promotes to float.

use crate::{
    ast::{BinaryOp, UnaryOp},
    error::{EvalResult, RenderErrorKind},
    value::Value,
};

/// Apply a binary operator.
pub fn binary(op: BinaryOp, lhs: &Value, rhs: &Value) -> EvalResult<Value> {
    match op {
        BinaryOp::Add => add(lhs, rhs),
        BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Rem => arith(op, lhs, rhs),
        BinaryOp::Eq => Ok(Value::Bool(lhs.loose_eq(rhs))),
        BinaryOp::Ne => Ok(Value::Bool(!lhs.loose_eq(rhs))),
        BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
            let ordering = lhs.compare(rhs).ok_or_else(|| {
                RenderErrorKind::type_error(format!(
                    "cannot compare {} with {} using `{}`",
                    lhs.type_name(),
                    rhs.type_name(),
                    op.symbol()
                ))
            })?;
            Ok(Value::Bool(match op {
                BinaryOp::Lt => ordering.is_lt(),
                BinaryOp::Le => ordering.is_le(),
                BinaryOp::Gt => ordering.is_gt(),
                _ => ordering.is_ge(),
            }))
        }
    }
}

/// Apply a unary operator.
pub fn unary(op: UnaryOp, value: &Value) -> EvalResult<Value> {
    match (op, value) {
        (UnaryOp::Not, value) => Ok(Value::Bool(!value.is_truthy())),
        (UnaryOp::Neg, Value::Int(i)) => i
            .checked_neg()
            .map(Value::Int)
            .ok_or_else(|| overflow("-")),
        (UnaryOp::Neg, Value::Float(f)) => Ok(Value::Float(-f)),
        (UnaryOp::Plus, Value::Int(_) | Value::Float(_)) => Ok(value.clone()),
        (_, value) => Err(RenderErrorKind::type_error(format!(
            "cannot apply unary `{}` to {}",
            if op == UnaryOp::Neg { "-" } else { "+" },
            value.type_name()
        ))),
    }
}

fn add(lhs: &Value, rhs: &Value) -> EvalResult<Value> {
    match (lhs, rhs) {
        (Value::Str(_), _) | (_, Value::Str(_)) => Ok(Value::from(format!("{lhs}{rhs}"))),
        _ => arith(BinaryOp::Add, lhs, rhs),
    }
}

fn arith(op: BinaryOp, lhs: &Value, rhs: &Value) -> EvalResult<Value> {
    match (lhs, rhs) {
        (Value::Int(a), Value::Int(b)) => int_arith(op, *a, *b),
        _ => match (lhs.as_f64(), rhs.as_f64()) {
            (Some(a), Some(b)) => Ok(Value::Float(match op {
                BinaryOp::Add => a + b,
                BinaryOp::Sub => a - b,
                BinaryOp::Mul => a * b,
                BinaryOp::Div => a / b,
                _ => a % b,
            })),
            _ => Err(RenderErrorKind::type_error(format!(
                "cannot apply `{}` to {} and {}",
                op.symbol(),
                lhs.type_name(),
                rhs.type_name()
            ))),
        },
    }
}

fn int_arith(op: BinaryOp, a: i64, b: i64) -> EvalResult<Value> {
    if b == 0 && matches!(op, BinaryOp::Div | BinaryOp::Rem) {
        return Err(RenderErrorKind::Arithmetic("division by zero".to_string()));
    }
    let result = match op {
        BinaryOp::Add => a.checked_add(b),
        BinaryOp::Sub => a.checked_sub(b),
        BinaryOp::Mul => a.checked_mul(b),
        BinaryOp::Div => a.checked_div(b),
        _ => a.checked_rem(b),
    };
    result.map(Value::Int).ok_or_else(|| overflow(op.symbol()))
}

fn overflow(symbol: &str) -> RenderErrorKind {
    RenderErrorKind::Arithmetic(format!("integer overflow in `{symbol}`"))
}

#[cfg(test)]
mod tests {
    use float_cmp::approx_eq;

    use super::*;

    #[test]
    fn test_int_arithmetic() {
        let v = binary(BinaryOp::Mul, &Value::Int(6), &Value::Int(7)).unwrap();
        assert_eq!(v.as_int(), Some(42));
        let v = binary(BinaryOp::Div, &Value::Int(7), &Value::Int(2)).unwrap();
        assert_eq!(v.as_int(), Some(3));
    }

    #[test]
    fn test_mixed_promotes_to_float() {
        let v = binary(BinaryOp::Add, &Value::Int(1), &Value::Float(0.25)).unwrap();
        assert!(approx_eq!(f64, v.as_f64().unwrap(), 1.25));
    }

    #[test]
    fn test_string_concat() {
        let v = binary(BinaryOp::Add, &Value::str("n="), &Value::Int(3)).unwrap();
        assert_eq!(v.as_str(), Some("n=3"));
        let v = binary(BinaryOp::Add, &Value::Int(3), &Value::str("px")).unwrap();
        assert_eq!(v.as_str(), Some("3px"));
    }

    #[test]
    fn test_division_by_zero() {
        let err = binary(BinaryOp::Rem, &Value::Int(1), &Value::Int(0)).unwrap_err();
        assert!(matches!(err, RenderErrorKind::Arithmetic(_)));
    }

    #[test]
    fn test_overflow() {
        let err = binary(BinaryOp::Add, &Value::Int(i64::MAX), &Value::Int(1)).unwrap_err();
        assert!(err.to_string().contains("overflow"));
        assert!(unary(UnaryOp::Neg, &Value::Int(i64::MIN)).is_err());
    }

    #[test]
    fn test_comparisons() {
        let lt = binary(BinaryOp::Lt, &Value::Int(1), &Value::Int(2)).unwrap();
        assert_eq!(lt.as_bool(), Some(true));
        let eq = binary(BinaryOp::Eq, &Value::Null, &Value::Null).unwrap();
        assert_eq!(eq.as_bool(), Some(true));
        assert!(binary(BinaryOp::Gt, &Value::Null, &Value::Int(1)).is_err());
    }

    #[test]
    fn test_type_errors() {
        let err = binary(BinaryOp::Sub, &Value::Bool(true), &Value::Int(1)).unwrap_err();
        assert!(err.to_string().contains("bool"));
        assert!(unary(UnaryOp::Neg, &Value::str("x")).is_err());
        assert_eq!(
            unary(UnaryOp::Not, &Value::Null).unwrap().as_bool(),
            Some(true)
        );
    }
}

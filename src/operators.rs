use crate::ast::{BinaryOperator, UnaryOperator};
use crate::error::{RuntimeError, RuntimeResult, SourceLocation};
use crate::value::Value;
use std::cmp::Ordering;

/// Applies a non-short-circuit binary operator. `&&` and `||` are evaluated by the caller.
pub fn binary_op(
    operator: BinaryOperator,
    left: &Value,
    right: &Value,
    location: SourceLocation,
) -> RuntimeResult<Value> {
    use BinaryOperator::*;

    match operator {
        Equal => return Ok(Value::Bool(left.equals(right, location)?)),
        NotEqual => return Ok(Value::Bool(!left.equals(right, location)?)),
        _ => {}
    }

    match (left, right) {
        (Value::Int(a), Value::Int(b)) => int_op(operator, *a, *b, location),
        (Value::Float(a), Value::Float(b)) => float_op(operator, *a, *b, location),
        (Value::String(a), Value::String(b)) => match operator {
            Add => Ok(Value::string(format!("{}{}", a, b))),
            _ => compare(operator, a.cmp(b))
                .ok_or_else(|| undefined_operator(operator, left, location)),
        },
        (Value::Bool(a), Value::Bool(b)) => match operator {
            And => Ok(Value::Bool(*a && *b)),
            Or => Ok(Value::Bool(*a || *b)),
            _ => Err(undefined_operator(operator, left, location)),
        },
        (a, b) if !a.same_kind(b) => Err(RuntimeError::type_mismatch(
            format!(
                "invalid operation: mismatched types {} and {}",
                a.type_name(),
                b.type_name()
            ),
            location,
        )),
        _ => Err(undefined_operator(operator, left, location)),
    }
}

fn int_op(operator: BinaryOperator, a: i64, b: i64, location: SourceLocation) -> RuntimeResult<Value> {
    use BinaryOperator::*;

    let result = match operator {
        Add => a.wrapping_add(b),
        Subtract => a.wrapping_sub(b),
        Multiply => a.wrapping_mul(b),
        Divide | Modulo if b == 0 => return Err(RuntimeError::DivisionByZero { location }),
        Divide => a.wrapping_div(b),
        Modulo => a.wrapping_rem(b),
        BitAnd => a & b,
        BitOr => a | b,
        BitXor => a ^ b,
        BitClear => a & !b,
        ShiftLeft | ShiftRight if b < 0 => return Err(RuntimeError::NegativeShift { location }),
        ShiftLeft if b >= 64 => 0,
        ShiftLeft => a << b,
        ShiftRight if b >= 64 => {
            if a < 0 {
                -1
            } else {
                0
            }
        }
        ShiftRight => a >> b,
        _ => {
            return compare(operator, a.cmp(&b))
                .ok_or_else(|| undefined_operator(operator, &Value::Int(a), location))
        }
    };
    Ok(Value::Int(result))
}

fn float_op(operator: BinaryOperator, a: f64, b: f64, location: SourceLocation) -> RuntimeResult<Value> {
    use BinaryOperator::*;

    let result = match operator {
        Add => a + b,
        Subtract => a - b,
        Multiply => a * b,
        Divide if b == 0.0 => return Err(RuntimeError::DivisionByZero { location }),
        Divide => a / b,
        _ => {
            // NaN compares false against everything, including itself.
            return match a.partial_cmp(&b) {
                Some(ordering) => compare(operator, ordering),
                None => comparison(operator).map(|_| Value::Bool(false)),
            }
            .ok_or_else(|| undefined_operator(operator, &Value::Float(a), location));
        }
    };
    Ok(Value::Float(result))
}

fn comparison(operator: BinaryOperator) -> Option<BinaryOperator> {
    use BinaryOperator::*;
    matches!(operator, Less | LessEqual | Greater | GreaterEqual).then_some(operator)
}

fn compare(operator: BinaryOperator, ordering: Ordering) -> Option<Value> {
    use BinaryOperator::*;

    let result = match comparison(operator)? {
        Less => ordering == Ordering::Less,
        LessEqual => ordering != Ordering::Greater,
        Greater => ordering == Ordering::Greater,
        _ => ordering != Ordering::Less,
    };
    Some(Value::Bool(result))
}

fn undefined_operator(operator: BinaryOperator, operand: &Value, location: SourceLocation) -> RuntimeError {
    RuntimeError::type_mismatch(
        format!(
            "invalid operation: operator {} not defined on {}",
            operator.symbol(),
            operand.type_name()
        ),
        location,
    )
}

pub fn unary_op(operator: UnaryOperator, operand: &Value, location: SourceLocation) -> RuntimeResult<Value> {
    match (operator, operand) {
        (UnaryOperator::Negate, Value::Int(n)) => Ok(Value::Int(n.wrapping_neg())),
        (UnaryOperator::Negate, Value::Float(x)) => Ok(Value::Float(-x)),
        (UnaryOperator::Plus, Value::Int(_) | Value::Float(_)) => Ok(operand.clone()),
        (UnaryOperator::Not, Value::Bool(b)) => Ok(Value::Bool(!b)),
        (UnaryOperator::BitNot, Value::Int(n)) => Ok(Value::Int(!n)),
        _ => Err(RuntimeError::type_mismatch(
            format!(
                "invalid operation: operator {} not defined on {}",
                operator.symbol(),
                operand.type_name()
            ),
            location,
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use BinaryOperator::*;

    fn at() -> SourceLocation {
        SourceLocation::new(1, 1)
    }

    fn int(op: BinaryOperator, a: i64, b: i64) -> RuntimeResult<Value> {
        binary_op(op, &Value::Int(a), &Value::Int(b), at())
    }

    #[test]
    fn test_integer_arithmetic() {
        assert_eq!(int(Add, 40, 5), Ok(Value::Int(45)));
        assert_eq!(int(Divide, -7, 2), Ok(Value::Int(-3)));
        assert_eq!(int(Modulo, -7, 2), Ok(Value::Int(-1)));
        assert_eq!(int(BitClear, 0b1111, 0b0101), Ok(Value::Int(0b1010)));
        assert_eq!(int(Less, 1, 2), Ok(Value::Bool(true)));
        assert_eq!(int(GreaterEqual, 1, 2), Ok(Value::Bool(false)));
    }

    #[test]
    fn test_integer_wraps_at_64_bits() {
        assert_eq!(int(Add, i64::MAX, 1), Ok(Value::Int(i64::MIN)));
        assert_eq!(int(Divide, i64::MIN, -1), Ok(Value::Int(i64::MIN)));
        assert_eq!(
            unary_op(UnaryOperator::Negate, &Value::Int(i64::MIN), at()),
            Ok(Value::Int(i64::MIN))
        );
    }

    #[test]
    fn test_division_by_zero() {
        assert_eq!(
            int(Divide, 1, 0),
            Err(RuntimeError::DivisionByZero { location: at() })
        );
        assert_eq!(
            int(Modulo, 1, 0),
            Err(RuntimeError::DivisionByZero { location: at() })
        );
        let err = binary_op(Divide, &Value::Float(1.0), &Value::Float(0.0), at()).unwrap_err();
        assert_eq!(err, RuntimeError::DivisionByZero { location: at() });
        assert_eq!(err.to_string(), format!("{}: division by zero", at()));
    }

    #[test]
    fn test_shifts() {
        assert_eq!(int(ShiftLeft, 1, 10), Ok(Value::Int(1024)));
        assert_eq!(int(ShiftLeft, 1, 64), Ok(Value::Int(0)));
        assert_eq!(int(ShiftRight, -8, 1), Ok(Value::Int(-4)));
        assert_eq!(int(ShiftRight, -8, 100), Ok(Value::Int(-1)));
        assert_eq!(
            int(ShiftLeft, 1, -1),
            Err(RuntimeError::NegativeShift { location: at() })
        );
    }

    #[test]
    fn test_no_implicit_numeric_conversion() {
        let err = binary_op(Add, &Value::Int(1), &Value::Float(2.0), at()).unwrap_err();
        assert_eq!(
            err.to_string(),
            "1:1: invalid operation: mismatched types int and float64"
        );
    }

    #[test]
    fn test_float_operations() {
        assert_eq!(
            binary_op(Multiply, &Value::Float(1.5), &Value::Float(2.0), at()),
            Ok(Value::Float(3.0))
        );
        assert!(binary_op(Modulo, &Value::Float(1.5), &Value::Float(2.0), at()).is_err());
        assert_eq!(
            binary_op(Less, &Value::Float(f64::NAN), &Value::Float(1.0), at()),
            Ok(Value::Bool(false))
        );
    }

    #[test]
    fn test_strings_concatenate_and_compare() {
        let a = Value::string("go");
        let b = Value::string("lang");
        assert_eq!(binary_op(Add, &a, &b, at()), Ok(Value::string("golang")));
        assert_eq!(binary_op(Less, &a, &b, at()), Ok(Value::Bool(true)));
        assert_eq!(binary_op(Equal, &a, &a, at()), Ok(Value::Bool(true)));
        assert!(binary_op(Subtract, &a, &b, at()).is_err());
    }

    #[test]
    fn test_unary_operators() {
        assert_eq!(
            unary_op(UnaryOperator::Not, &Value::Bool(true), at()),
            Ok(Value::Bool(false))
        );
        assert_eq!(
            unary_op(UnaryOperator::BitNot, &Value::Int(0), at()),
            Ok(Value::Int(-1))
        );
        assert!(unary_op(UnaryOperator::Negate, &Value::string("x"), at()).is_err());
    }
}

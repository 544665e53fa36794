use crate::ast::{FunctionLiteral, Type};
use crate::error::{RuntimeError, RuntimeResult, SourceLocation};
use crate::output::Output;
use crate::scope::Environment;
use std::fmt;
use std::rc::Rc;

pub type BuiltinFn = fn(&[Value], &mut Output, SourceLocation) -> RuntimeResult<Vec<Value>>;

#[derive(Clone, Copy)]
pub struct Builtin {
    pub name: &'static str,
    pub func: BuiltinFn,
}

impl fmt::Debug for Builtin {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Builtin({})", self.name)
    }
}

/// A function value: the literal plus the scope it was created in.
pub struct Closure {
    pub name: String,
    pub function: Rc<FunctionLiteral>,
    pub env: Environment,
}

impl fmt::Debug for Closure {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Closure({})", self.name)
    }
}

/// The exported face of a loaded package.
pub struct PackageTable {
    pub name: String,
    pub path: String,
    pub scope: Environment,
}

impl fmt::Debug for PackageTable {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Package({})", self.path)
    }
}

#[derive(Debug, Clone)]
pub enum Value {
    Int(i64),
    Float(f64),
    String(Rc<str>),
    Bool(bool),
    Function(Rc<Closure>),
    Builtin(Builtin),
    /// Zero value of a function type.
    NilFunction,
    Package(Rc<PackageTable>),
    /// Results of a multi-value call. Never stored in a binding.
    Tuple(Vec<Value>),
    Unit,
}

impl Value {
    pub fn string(text: impl AsRef<str>) -> Self {
        Value::String(Rc::from(text.as_ref()))
    }

    pub fn zero(value_type: &Type) -> Self {
        match value_type {
            Type::Int => Value::Int(0),
            Type::Float => Value::Float(0.0),
            Type::String => Value::string(""),
            Type::Bool => Value::Bool(false),
            Type::Func(_) => Value::NilFunction,
            Type::Named(_) => Value::Unit,
        }
    }

    /// Packs call results: none is unit, one is itself, more is a tuple.
    pub fn from_results(mut results: Vec<Value>) -> Self {
        match results.len() {
            0 => Value::Unit,
            1 => results.remove(0),
            _ => Value::Tuple(results),
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Int(_) => "int",
            Value::Float(_) => "float64",
            Value::String(_) => "string",
            Value::Bool(_) => "bool",
            Value::Function(_) | Value::Builtin(_) | Value::NilFunction => "func",
            Value::Package(_) => "package",
            Value::Tuple(_) => "tuple",
            Value::Unit => "()",
        }
    }

    pub fn same_kind(&self, other: &Value) -> bool {
        self.type_name() == other.type_name()
    }

    pub fn conforms_to(&self, value_type: &Type) -> bool {
        matches!(
            (self, value_type),
            (Value::Int(_), Type::Int)
                | (Value::Float(_), Type::Float)
                | (Value::String(_), Type::String)
                | (Value::Bool(_), Type::Bool)
                | (
                    Value::Function(_) | Value::Builtin(_) | Value::NilFunction,
                    Type::Func(_)
                )
        )
    }

    pub fn as_bool(&self, location: SourceLocation) -> RuntimeResult<bool> {
        match self {
            Value::Bool(b) => Ok(*b),
            other => Err(RuntimeError::type_mismatch(
                format!("non-boolean condition (type {})", other.type_name()),
                location,
            )),
        }
    }

    pub fn equals(&self, other: &Value, location: SourceLocation) -> RuntimeResult<bool> {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => Ok(a == b),
            (Value::Float(a), Value::Float(b)) => Ok(a == b),
            (Value::String(a), Value::String(b)) => Ok(a == b),
            (Value::Bool(a), Value::Bool(b)) => Ok(a == b),
            (a, b) if a.same_kind(b) => Err(RuntimeError::type_mismatch(
                format!("invalid operation: {} values cannot be compared", a.type_name()),
                location,
            )),
            (a, b) => Err(RuntimeError::type_mismatch(
                format!(
                    "invalid operation: mismatched types {} and {}",
                    a.type_name(),
                    b.type_name()
                ),
                location,
            )),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Function(a), Value::Function(b)) => Rc::ptr_eq(a, b),
            (Value::Builtin(a), Value::Builtin(b)) => a.name == b.name,
            (Value::Package(a), Value::Package(b)) => Rc::ptr_eq(a, b),
            (Value::Tuple(a), Value::Tuple(b)) => a == b,
            (Value::NilFunction, Value::NilFunction) | (Value::Unit, Value::Unit) => true,
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Value::Int(n) => write!(f, "{}", n),
            Value::Float(x) => write!(f, "{}", format_float(*x)),
            Value::String(s) => write!(f, "{}", s),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Function(closure) => write!(f, "func@{}", closure.name),
            Value::Builtin(builtin) => write!(f, "func@{}", builtin.name),
            Value::NilFunction => write!(f, "<nil>"),
            Value::Package(package) => write!(f, "package {}", package.name),
            Value::Tuple(values) => {
                for (i, value) in values.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{}", value)?;
                }
                Ok(())
            }
            Value::Unit => Ok(()),
        }
    }
}

/// Formats like Go's `%v`: shortest digits, exponent form when the decimal
/// exponent is below -4 or at least 6 (`1e+06`, `1.5e-07`).
pub fn format_float(value: f64) -> String {
    if value.is_nan() {
        return "NaN".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "+Inf" } else { "-Inf" }.to_string();
    }
    if value == 0.0 {
        return if value.is_sign_negative() { "-0" } else { "0" }.to_string();
    }

    let scientific = format!("{:e}", value);
    let (mantissa, exponent) = match scientific.split_once('e') {
        Some((mantissa, exponent)) => match exponent.parse::<i32>() {
            Ok(exponent) => (mantissa, exponent),
            Err(_) => return format!("{}", value),
        },
        None => return format!("{}", value),
    };

    if (-4..6).contains(&exponent) {
        format!("{}", value)
    } else {
        let sign = if exponent < 0 { '-' } else { '+' };
        format!("{}e{}{:02}", mantissa, sign, exponent.abs())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::FuncType;

    #[test]
    fn test_float_rendering_matches_go() {
        assert_eq!(format_float(3.14), "3.14");
        assert_eq!(format_float(1.0), "1");
        assert_eq!(format_float(100000.0), "100000");
        assert_eq!(format_float(1000000.0), "1e+06");
        assert_eq!(format_float(1234567.0), "1.234567e+06");
        assert_eq!(format_float(0.0001), "0.0001");
        assert_eq!(format_float(0.00001), "1e-05");
        assert_eq!(format_float(-2.5e-7), "-2.5e-07");
        assert_eq!(format_float(1e100), "1e+100");
        assert_eq!(format_float(f64::INFINITY), "+Inf");
        assert_eq!(format_float(f64::NAN), "NaN");
    }

    #[test]
    fn test_render_contract() {
        assert_eq!(Value::Int(-45).to_string(), "-45");
        assert_eq!(Value::string("hello").to_string(), "hello");
        assert_eq!(Value::Bool(true).to_string(), "true");
        assert_eq!(Value::Unit.to_string(), "");
        assert_eq!(
            Value::Tuple(vec![Value::Int(2), Value::Int(1)]).to_string(),
            "2 1"
        );
    }

    #[test]
    fn test_zero_values() {
        assert_eq!(Value::zero(&Type::Int), Value::Int(0));
        assert_eq!(Value::zero(&Type::Float), Value::Float(0.0));
        assert_eq!(Value::zero(&Type::String), Value::string(""));
        assert_eq!(Value::zero(&Type::Bool), Value::Bool(false));
        assert_eq!(
            Value::zero(&Type::Func(FuncType {
                params: vec![],
                results: vec![],
            })),
            Value::NilFunction
        );
    }

    #[test]
    fn test_from_results() {
        assert_eq!(Value::from_results(vec![]), Value::Unit);
        assert_eq!(Value::from_results(vec![Value::Int(1)]), Value::Int(1));
        assert!(matches!(
            Value::from_results(vec![Value::Int(1), Value::Int(2)]),
            Value::Tuple(v) if v.len() == 2
        ));
    }

    #[test]
    fn test_equality_rules() {
        let at = SourceLocation::new(1, 1);
        assert!(Value::Int(2).equals(&Value::Int(2), at).unwrap());
        assert!(!Value::string("a").equals(&Value::string("b"), at).unwrap());
        assert!(Value::Int(1).equals(&Value::Float(1.0), at).is_err());
        assert!(Value::NilFunction.equals(&Value::NilFunction, at).is_err());
    }

    #[test]
    fn test_conformance() {
        assert!(Value::Int(1).conforms_to(&Type::Int));
        assert!(!Value::Int(1).conforms_to(&Type::Float));
        assert!(Value::NilFunction.conforms_to(&Type::Func(FuncType {
            params: vec![Type::Int],
            results: vec![],
        })));
        assert!(Value::Int(1).same_kind(&Value::Int(7)));
        assert!(!Value::Int(1).same_kind(&Value::Bool(false)));
    }
}

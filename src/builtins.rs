use crate::ast::{FuncType, Type};
use crate::checker::{Member, PackageInterface};
use crate::error::{RuntimeError, RuntimeResult, SourceLocation};
use crate::output::Output;
use crate::scope::Environment;
use crate::symbol_table::SymbolKind;
use crate::value::{Builtin, PackageTable, Value};
use std::collections::HashMap;
use std::rc::Rc;

/// Import path of the natively provided formatting package.
pub const FMT_PATH: &str = "fmt";

fn fmt_functions() -> Vec<(Builtin, Vec<Type>)> {
    vec![
        (Builtin { name: "Println", func: println }, vec![]),
        (Builtin { name: "Print", func: print }, vec![]),
        (Builtin { name: "Sprint", func: sprint }, vec![Type::String]),
        (Builtin { name: "Sprintln", func: sprintln }, vec![Type::String]),
    ]
}

/// Operands joined by single spaces.
fn join_spaced(args: &[Value]) -> String {
    args.iter()
        .map(|arg| arg.to_string())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Spaces only between operands when neither side is a string.
fn join_print(args: &[Value]) -> String {
    let mut text = String::new();
    for (i, arg) in args.iter().enumerate() {
        if i > 0 {
            let is_string = |v: &Value| matches!(v, Value::String(_));
            if !is_string(&args[i - 1]) && !is_string(arg) {
                text.push(' ');
            }
        }
        text.push_str(&arg.to_string());
    }
    text
}

fn println(args: &[Value], output: &mut Output, _: SourceLocation) -> RuntimeResult<Vec<Value>> {
    output.println(&join_spaced(args));
    Ok(vec![])
}

fn print(args: &[Value], output: &mut Output, _: SourceLocation) -> RuntimeResult<Vec<Value>> {
    output.print(&join_print(args));
    Ok(vec![])
}

fn sprint(args: &[Value], _: &mut Output, _: SourceLocation) -> RuntimeResult<Vec<Value>> {
    Ok(vec![Value::string(join_print(args))])
}

fn sprintln(args: &[Value], _: &mut Output, _: SourceLocation) -> RuntimeResult<Vec<Value>> {
    Ok(vec![Value::string(format!("{}\n", join_spaced(args)))])
}

fn len(args: &[Value], _: &mut Output, location: SourceLocation) -> RuntimeResult<Vec<Value>> {
    match args {
        [Value::String(s)] => Ok(vec![Value::Int(s.len() as i64)]),
        [other] => Err(RuntimeError::type_mismatch(
            format!("invalid argument: type {} for len", other.type_name()),
            location,
        )),
        _ => Err(RuntimeError::ArgumentCount {
            function: "len".to_string(),
            expected: 1,
            found: args.len(),
            location,
        }),
    }
}

fn builtin_type(results: Vec<Type>) -> Type {
    Type::Func(FuncType {
        params: vec![],
        results,
    })
}

/// Predeclared names visible in every package: `true`, `false` and `len`.
pub fn universe_symbols() -> Vec<(&'static str, SymbolKind, Type)> {
    vec![
        ("true", SymbolKind::Constant, Type::Bool),
        ("false", SymbolKind::Constant, Type::Bool),
        ("len", SymbolKind::Builtin, builtin_type(vec![Type::Int])),
    ]
}

pub fn universe() -> Environment {
    let env = Environment::new();
    env.define_const("true", Value::Bool(true));
    env.define_const("false", Value::Bool(false));
    env.define_const("len", Value::Builtin(Builtin { name: "len", func: len }));
    env
}

pub fn fmt_package() -> Rc<PackageTable> {
    let scope = Environment::new();
    for (builtin, _) in fmt_functions() {
        scope.define_const(builtin.name, Value::Builtin(builtin));
    }
    Rc::new(PackageTable {
        name: FMT_PATH.to_string(),
        path: FMT_PATH.to_string(),
        scope,
    })
}

pub fn fmt_interface() -> PackageInterface {
    let members: HashMap<String, Member> = fmt_functions()
        .into_iter()
        .map(|(builtin, results)| {
            (
                builtin.name.to_string(),
                Member {
                    kind: SymbolKind::Builtin,
                    member_type: Some(builtin_type(results)),
                },
            )
        })
        .collect();

    PackageInterface {
        name: FMT_PATH.to_string(),
        members,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(name: &str, args: &[Value]) -> (Vec<Value>, String) {
        let package = fmt_package();
        let mut output = Output::buffer();
        let results = match package.scope.get(name) {
            Some(Value::Builtin(builtin)) => {
                (builtin.func)(args, &mut output, SourceLocation::default()).unwrap()
            }
            other => panic!("Expected builtin, got {:?}", other),
        };
        (results, output.take())
    }

    #[test]
    fn test_println_joins_with_spaces() {
        let (results, text) = call(
            "Println",
            &[Value::string("a"), Value::Int(1), Value::Float(2.5), Value::Bool(true)],
        );
        assert!(results.is_empty());
        assert_eq!(text, "a 1 2.5 true\n");
    }

    #[test]
    fn test_print_spaces_only_between_non_strings() {
        let (_, text) = call(
            "Print",
            &[Value::Int(1), Value::Int(2), Value::string("x"), Value::Int(3)],
        );
        assert_eq!(text, "1 2x3");
    }

    #[test]
    fn test_sprint_returns_string() {
        let (results, text) = call("Sprintln", &[Value::string("a"), Value::Int(2)]);
        assert_eq!(results, vec![Value::string("a 2\n")]);
        assert_eq!(text, "");
    }

    #[test]
    fn test_len_of_string() {
        let mut output = Output::Silent;
        let at = SourceLocation::default();
        assert_eq!(
            len(&[Value::string("hello")], &mut output, at),
            Ok(vec![Value::Int(5)])
        );
        assert!(len(&[Value::Int(1)], &mut output, at).is_err());
        assert!(len(&[], &mut output, at).is_err());
    }

    #[test]
    fn test_interface_lists_exported_builtins() {
        let interface = fmt_interface();
        assert_eq!(interface.name, "fmt");
        assert!(interface.members.contains_key("Println"));
        assert_eq!(
            interface.members["Sprint"].member_type,
            Some(builtin_type(vec![Type::String]))
        );
    }
}

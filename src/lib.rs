pub mod ast;
pub mod builtins;
pub mod checker;
pub mod config;
pub mod error;
pub mod initialization;
pub mod interpreter;
pub mod lexer;
pub mod module;
pub mod operators;
pub mod output;
pub mod parser;
pub mod printer;
pub mod scope;
pub mod stack;
pub mod symbol_table;
pub mod value;

use checker::{Checker, PackageInterface};
use config::Config;
use error::Result;
use interpreter::{Interpreter, ENTRY_PACKAGE};
use module::ModuleSystem;
use output::Output;
use std::collections::HashMap;

/// Resolves `entry` and everything it imports, checks each package, then
/// initializes them dependencies-first into a ready-to-run interpreter.
pub fn build(
    modules: &mut ModuleSystem,
    entry: &str,
    config: Config,
    output: Output,
) -> Result<Interpreter> {
    let packages = modules.resolve(entry)?;

    let mut interfaces: HashMap<String, PackageInterface> = HashMap::new();
    interfaces.insert(builtins::FMT_PATH.to_string(), builtins::fmt_interface());
    for package in &packages {
        let interface = Checker::new(&interfaces).check_package(package)?;
        interfaces.insert(package.path.clone(), interface);
    }

    let mut interpreter = Interpreter::new(config, output);
    for package in &packages {
        interpreter.load_package(package)?;
    }
    interpreter.set_entry_package(entry);
    Ok(interpreter)
}

/// Runs a single-file `main` package and returns what it printed.
pub fn run_source(source: &str) -> Result<String> {
    let mut modules = ModuleSystem::new();
    modules.add_source(ENTRY_PACKAGE, "main.go", source)?;

    let mut interpreter = build(&mut modules, ENTRY_PACKAGE, Config::default(), Output::buffer())?;
    interpreter.run_main()?;
    Ok(interpreter.take_output())
}

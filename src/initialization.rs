use crate::ast::{Block, CaseLabel, ElseBranch, Expression, FunctionLiteral, Statement};
use crate::error::{Error, ResolutionError, Result, SourceLocation};
use crate::module::Package;
use crate::symbol_table::BLANK;
use std::collections::{HashMap, HashSet};
use tracing::trace;

/// A package-level `var` or `const` declaration and the index of its file.
#[derive(Debug, Clone, Copy)]
pub struct Initializer<'a> {
    pub file: usize,
    pub declaration: &'a Statement,
}

impl<'a> Initializer<'a> {
    fn name(&self) -> &'a str {
        declared_names(self.declaration)
            .iter()
            .map(String::as_str)
            .find(|name| *name != BLANK)
            .unwrap_or(BLANK)
    }
}

enum Entity<'a> {
    Value(usize),
    Function(&'a FunctionLiteral),
}

/// Orders the package-level declarations of `package` for initialization.
///
/// The next declaration is always the earliest one, across files in order,
/// whose references to package variables (direct or through the functions it
/// calls) are all initialized already. A declaration that can never become
/// ready is part of a cycle.
pub fn initialization_order(package: &Package) -> Result<Vec<Initializer<'_>>> {
    let mut initializers = Vec::new();
    let mut entities: HashMap<&str, Entity> = HashMap::new();

    for (index, file) in package.files.iter().enumerate() {
        for declaration in &file.program.declarations {
            match declaration {
                Statement::VarDecl { names, .. } | Statement::ConstDecl { names, .. } => {
                    for name in names.iter().filter(|name| name.as_str() != BLANK) {
                        entities
                            .entry(name.as_str())
                            .or_insert(Entity::Value(initializers.len()));
                    }
                    initializers.push(Initializer {
                        file: index,
                        declaration,
                    });
                }
                Statement::Function { name, function } => {
                    entities
                        .entry(name.as_str())
                        .or_insert(Entity::Function(function));
                }
                _ => {}
            }
        }
    }

    let mut function_references = HashMap::new();
    for (name, entity) in &entities {
        if let Entity::Function(function) = entity {
            let mut references = References::default();
            references.function(function);
            function_references.insert(*name, references.found);
        }
    }

    let dependencies: Vec<HashSet<usize>> = initializers
        .iter()
        .map(|initializer| {
            let mut references = References::default();
            references.expressions(declared_values(initializer.declaration));
            variables_reached(references.found, &entities, &function_references)
        })
        .collect();

    let mut done = vec![false; initializers.len()];
    let mut order = Vec::with_capacity(initializers.len());
    while order.len() < initializers.len() {
        let ready = (0..initializers.len())
            .find(|&i| !done[i] && dependencies[i].iter().all(|&d| done[d]));
        match ready {
            Some(i) => {
                done[i] = true;
                order.push(initializers[i]);
            }
            None => return Err(cycle_error(package, &initializers, &dependencies, &done)),
        }
    }

    trace!(package = %package.path, initializers = order.len(), "ordered initializers");
    Ok(order)
}

/// Package variables named by `names`, following calls into package functions.
fn variables_reached<'a>(
    names: HashSet<&'a str>,
    entities: &HashMap<&str, Entity>,
    function_references: &HashMap<&str, HashSet<&'a str>>,
) -> HashSet<usize> {
    let mut variables = HashSet::new();
    let mut visited = HashSet::new();
    let mut pending: Vec<&str> = names.into_iter().collect();

    while let Some(name) = pending.pop() {
        match entities.get(name) {
            Some(Entity::Value(index)) => {
                variables.insert(*index);
            }
            Some(Entity::Function(_)) => {
                if visited.insert(name) {
                    if let Some(references) = function_references.get(name) {
                        pending.extend(references.iter().copied());
                    }
                }
            }
            None => {}
        }
    }
    variables
}

// Every pending initializer waits on another pending one, so walking the
// lowest pending dependency from the first of them must come back around.
fn cycle_error(
    package: &Package,
    initializers: &[Initializer],
    dependencies: &[HashSet<usize>],
    done: &[bool],
) -> Error {
    let mut path: Vec<usize> = Vec::new();
    let mut current = done.iter().position(|d| !d).unwrap_or_default();

    let start = loop {
        if let Some(start) = path.iter().position(|&i| i == current) {
            break start;
        }
        path.push(current);
        current = dependencies[current]
            .iter()
            .copied()
            .filter(|&d| !done[d])
            .min()
            .unwrap_or(current);
    };

    let cycle = &path[start..];
    let mut names: Vec<&str> = cycle.iter().map(|&i| initializers[i].name()).collect();
    names.push(initializers[cycle[0]].name());

    let first = initializers[cycle[0]];
    Error::from(ResolutionError::InitializationCycle {
        path: names.join(" refers to "),
        location: declaration_location(first.declaration),
    })
    .in_file(package.files[first.file].display_path())
}

fn declared_names(declaration: &Statement) -> &[String] {
    match declaration {
        Statement::VarDecl { names, .. } | Statement::ConstDecl { names, .. } => names,
        _ => &[],
    }
}

fn declared_values(declaration: &Statement) -> &[Expression] {
    match declaration {
        Statement::VarDecl { values, .. } | Statement::ConstDecl { values, .. } => values,
        _ => &[],
    }
}

fn declaration_location(declaration: &Statement) -> SourceLocation {
    match declaration {
        Statement::VarDecl { location, .. } | Statement::ConstDecl { location, .. } => *location,
        _ => Default::default(),
    }
}

/// Free names of a piece of code: every identifier not bound by an enclosing
/// local declaration.
#[derive(Default)]
struct References<'a> {
    locals: Vec<HashSet<&'a str>>,
    found: HashSet<&'a str>,
}

impl<'a> References<'a> {
    fn name(&mut self, name: &'a str) {
        if !self.locals.iter().any(|scope| scope.contains(name)) {
            self.found.insert(name);
        }
    }

    fn declare(&mut self, name: &'a str) {
        if let Some(scope) = self.locals.last_mut() {
            scope.insert(name);
        }
    }

    fn scoped(&mut self, walk: impl FnOnce(&mut Self)) {
        self.locals.push(HashSet::new());
        walk(self);
        self.locals.pop();
    }

    fn function(&mut self, function: &'a FunctionLiteral) {
        self.scoped(|refs| {
            for param in &function.signature.params {
                refs.declare(&param.name);
            }
            for name in &function.signature.result_names {
                refs.declare(name);
            }
            refs.statements(&function.body.statements);
        });
    }

    fn block(&mut self, block: &'a Block) {
        self.scoped(|refs| refs.statements(&block.statements));
    }

    fn statements(&mut self, statements: &'a [Statement]) {
        for statement in statements {
            self.statement(statement);
        }
    }

    fn statement(&mut self, statement: &'a Statement) {
        match statement {
            Statement::VarDecl { names, values, .. }
            | Statement::ConstDecl { names, values, .. }
            | Statement::ShortVarDecl { names, values, .. } => {
                self.expressions(values);
                for name in names {
                    self.declare(name);
                }
            }
            Statement::Assignment {
                targets, values, ..
            } => {
                self.expressions(values);
                for target in targets.iter().filter(|target| *target != BLANK) {
                    self.name(target);
                }
            }
            Statement::IncDec { target, .. } => self.name(target),
            Statement::If {
                init,
                condition,
                then_body,
                else_body,
                ..
            } => self.scoped(|refs| {
                if let Some(init) = init {
                    refs.statement(init);
                }
                refs.expression(condition);
                refs.block(then_body);
                match else_body {
                    Some(ElseBranch::Block(block)) => refs.block(block),
                    Some(ElseBranch::If(nested)) => refs.statement(nested),
                    None => {}
                }
            }),
            Statement::For {
                init,
                condition,
                post,
                body,
                ..
            } => self.scoped(|refs| {
                if let Some(init) = init {
                    refs.statement(init);
                }
                if let Some(condition) = condition {
                    refs.expression(condition);
                }
                if let Some(post) = post {
                    refs.statement(post);
                }
                refs.block(body);
            }),
            Statement::Switch {
                init, tag, cases, ..
            } => self.scoped(|refs| {
                if let Some(init) = init {
                    refs.statement(init);
                }
                if let Some(tag) = tag {
                    refs.expression(tag);
                }
                for case in cases {
                    if let CaseLabel::Values(values) = &case.label {
                        refs.expressions(values);
                    }
                    refs.scoped(|refs| refs.statements(&case.body));
                }
            }),
            Statement::Function { name, function } => {
                self.declare(name);
                self.function(function);
            }
            Statement::Return { values, .. } => self.expressions(values),
            Statement::Break(_) | Statement::Continue(_) => {}
            Statement::Block(block) => self.block(block),
            Statement::Expression(expr) => self.expression(expr),
        }
    }

    fn expressions(&mut self, expressions: &'a [Expression]) {
        for expr in expressions {
            self.expression(expr);
        }
    }

    fn expression(&mut self, expr: &'a Expression) {
        match expr {
            Expression::IntegerLiteral(_)
            | Expression::FloatLiteral(_)
            | Expression::StringLiteral(_)
            | Expression::Qualified { .. } => {}
            Expression::Identifier { name, .. } => self.name(name),
            Expression::BinaryOp { left, right, .. } => {
                self.expression(left);
                self.expression(right);
            }
            Expression::UnaryOp { operand, .. } => self.expression(operand),
            Expression::Call { callee, args, .. } => {
                self.expression(callee);
                self.expressions(args);
            }
            Expression::FunctionLiteral(function) => self.function(function),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::ModuleSystem;

    fn order(files: &[(&str, &str)]) -> Result<Vec<String>> {
        let mut modules = ModuleSystem::new();
        for (path, source) in files {
            modules.add_source("p", *path, source)?;
        }
        let packages = modules.resolve("p")?;
        Ok(initialization_order(packages[0])?
            .iter()
            .map(|initializer| initializer.name().to_string())
            .collect())
    }

    #[test]
    fn test_independent_declarations_keep_source_order() {
        let names = order(&[("a.go", "package p\nvar b = 2\nvar a = 1\nconst c = 3\n")]).unwrap();
        assert_eq!(names, vec!["b", "a", "c"]);
    }

    #[test]
    fn test_dependencies_initialize_first() {
        let names = order(&[(
            "a.go",
            "package p\nvar a = c + b\nvar b = f()\nvar c = f()\nvar d = 3\nfunc f() int { return d }\n",
        )])
        .unwrap();
        assert_eq!(names, vec!["d", "b", "c", "a"]);
    }

    #[test]
    fn test_dependencies_cross_files() {
        let names = order(&[
            ("a.go", "package p\nvar total = count * 2\n"),
            ("b.go", "package p\nvar count = 4\n"),
        ])
        .unwrap();
        assert_eq!(names, vec!["count", "total"]);
    }

    #[test]
    fn test_locals_shadow_package_names() {
        let names = order(&[(
            "a.go",
            "package p\nvar y = f()\nvar x = 5\nfunc f() int {\nx := 1\nreturn x\n}\n",
        )])
        .unwrap();
        assert_eq!(names, vec!["y", "x"]);

        let names = order(&[(
            "a.go",
            "package p\nvar y = g(1)\nvar x = 5\nfunc g(x int) int { return x }\n",
        )])
        .unwrap();
        assert_eq!(names, vec!["y", "x"]);
    }

    #[test]
    fn test_function_literal_bodies_count_as_references() {
        let names = order(&[(
            "a.go",
            "package p\nvar get = func() int { return n }\nvar n = 7\n",
        )])
        .unwrap();
        assert_eq!(names, vec!["n", "get"]);
    }

    #[test]
    fn test_self_reference_through_function_is_a_cycle() {
        let err = order(&[("a.go", "package p\nvar x = f()\nfunc f() int { return x }\n")])
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "a.go: resolution error: 2:1: initialization cycle: x refers to x"
        );
    }

    #[test]
    fn test_mutual_reference_is_a_cycle() {
        let err = order(&[("a.go", "package p\nvar z = a\nvar a = b\nvar b = a\n")]).unwrap_err();
        match err {
            Error::InFile { source, .. } => match *source {
                Error::Resolution(err) => assert_eq!(
                    err,
                    ResolutionError::InitializationCycle {
                        path: "a refers to b refers to a".to_string(),
                        location: SourceLocation::new(3, 1),
                    }
                ),
                other => panic!("Expected resolution error, got {:?}", other),
            },
            other => panic!("Expected error in file, got {:?}", other),
        }
    }

    #[test]
    fn test_recursive_functions_are_not_cycles() {
        let names = order(&[(
            "a.go",
            "package p\nvar n = fact(5)\nfunc fact(k int) int {\nif k == 0 {\nreturn 1\n}\nreturn k * fact(k - 1)\n}\n",
        )])
        .unwrap();
        assert_eq!(names, vec!["n"]);
    }
}

use crate::ast::{
    AssignOperator, BinaryOperator, Block, CaseLabel, ElseBranch, Expression, FunctionLiteral,
    Statement, SwitchCase, Type,
};
use crate::builtins;
use crate::config::Config;
use crate::error::{Error, ResolutionError, Result, RuntimeError, RuntimeResult, SourceLocation};
use crate::initialization::initialization_order;
use crate::module::Package;
use crate::operators::{binary_op, unary_op};
use crate::output::Output;
use crate::scope::Environment;
use crate::stack::ensure_sufficient_stack;
use crate::symbol_table::{is_exported, BLANK};
use crate::value::{Closure, PackageTable, Value};
use std::collections::HashMap;
use std::rc::Rc;
use tracing::{debug, trace};

/// Import path of the package `run_main` starts in.
pub const ENTRY_PACKAGE: &str = "main";

/// How a statement finished.
#[derive(Debug, Clone, PartialEq)]
pub enum Flow {
    Normal,
    Break,
    Continue,
    Return(Vec<Value>),
}

struct Frame {
    function: String,
    results: Vec<Type>,
}

/// Tree-walking evaluator over checked packages.
pub struct Interpreter {
    config: Config,
    output: Output,
    universe: Environment,
    packages: HashMap<String, Rc<PackageTable>>,
    entry_package: String,
    frames: Vec<Frame>,
}

impl Interpreter {
    pub fn new(config: Config, output: Output) -> Self {
        let mut packages = HashMap::new();
        packages.insert(builtins::FMT_PATH.to_string(), builtins::fmt_package());

        Self {
            config,
            output,
            universe: builtins::universe(),
            packages,
            entry_package: ENTRY_PACKAGE.to_string(),
            frames: Vec::new(),
        }
    }

    pub fn set_entry_package(&mut self, import_path: impl Into<String>) {
        self.entry_package = import_path.into();
    }

    pub fn take_output(&mut self) -> String {
        self.output.take()
    }

    /// Binds a package's functions, then runs its variable initializers in dependency order.
    /// Every package it imports must already be loaded.
    pub fn load_package(&mut self, package: &Package) -> Result<()> {
        debug!(package = %package.path, files = package.files.len(), "initializing package");
        let scope = self.universe.child();

        let mut file_scopes = Vec::new();
        for file in &package.files {
            let file_scope = scope.child();
            for import in &file.program.imports {
                let imported = self.packages.get(&import.path).cloned().ok_or_else(|| {
                    Error::from(ResolutionError::PackageNotFound {
                        path: import.path.clone(),
                        searched: "loaded packages".to_string(),
                    })
                    .in_file(file.display_path())
                })?;
                let name = import
                    .alias
                    .clone()
                    .unwrap_or_else(|| imported.name.clone());
                file_scope.define_const(name, Value::Package(imported));
            }
            file_scopes.push(file_scope);
        }

        for (file, file_scope) in package.files.iter().zip(&file_scopes) {
            for declaration in &file.program.declarations {
                if let Statement::Function { name, function } = declaration {
                    scope.define_const(name.clone(), closure(name, function, file_scope));
                }
            }
        }

        for initializer in initialization_order(package)? {
            let file = &package.files[initializer.file];
            let file_scope = &file_scopes[initializer.file];
            let declared = match initializer.declaration {
                Statement::VarDecl {
                    names,
                    type_annotation,
                    values,
                    location,
                } => self.declare_values(
                    names,
                    type_annotation.as_ref(),
                    values,
                    *location,
                    file_scope,
                    &scope,
                    false,
                ),
                Statement::ConstDecl {
                    names,
                    type_annotation,
                    values,
                    location,
                } => self.declare_values(
                    names,
                    type_annotation.as_ref(),
                    values,
                    *location,
                    file_scope,
                    &scope,
                    true,
                ),
                _ => Ok(()),
            };
            declared.map_err(|e| Error::from(e).in_file(file.display_path()))?;
        }

        self.packages.insert(
            package.path.clone(),
            Rc::new(PackageTable {
                name: package.name.clone(),
                path: package.path.clone(),
                scope,
            }),
        );
        Ok(())
    }

    pub fn run_main(&mut self) -> Result<()> {
        let package = self.entry_package.clone();
        let entry = self.config.entry.clone();
        debug!(package = %package, function = %entry, "running entry point");
        self.invoke(&package, &entry, Vec::new())?;
        Ok(())
    }

    /// Calls a top-level function of a loaded package and returns all of its results.
    pub fn invoke(&mut self, package: &str, name: &str, args: Vec<Value>) -> Result<Vec<Value>> {
        let missing = || ResolutionError::MissingEntry {
            package: package.to_string(),
            function: name.to_string(),
        };

        let table = self.packages.get(package).cloned().ok_or_else(missing)?;
        let function = match table.scope.get_local(name) {
            Some(function @ Value::Function(_)) => function,
            _ => return Err(missing().into()),
        };

        self.frames.clear();
        Ok(self.call_value(&function, args, SourceLocation::default())?)
    }

    /// Like `invoke`, with the results packed into one value.
    pub fn call(&mut self, package: &str, name: &str, args: Vec<Value>) -> Result<Value> {
        Ok(Value::from_results(self.invoke(package, name, args)?))
    }

    fn call_value(
        &mut self,
        callee: &Value,
        args: Vec<Value>,
        location: SourceLocation,
    ) -> RuntimeResult<Vec<Value>> {
        match callee {
            Value::Function(closure) => self.call_closure(closure, args, location),
            Value::Builtin(builtin) => (builtin.func)(&args, &mut self.output, location),
            Value::NilFunction => Err(RuntimeError::NilFunction { location }),
            other => Err(RuntimeError::NotCallable {
                found: other.type_name().to_string(),
                location,
            }),
        }
    }

    fn call_closure(
        &mut self,
        closure: &Rc<Closure>,
        args: Vec<Value>,
        location: SourceLocation,
    ) -> RuntimeResult<Vec<Value>> {
        let signature = &closure.function.signature;
        if args.len() != signature.params.len() {
            return Err(RuntimeError::ArgumentCount {
                function: closure.name.clone(),
                expected: signature.params.len(),
                found: args.len(),
                location,
            });
        }
        if self.frames.len() >= self.config.max_call_depth {
            return Err(RuntimeError::StackOverflow {
                limit: self.config.max_call_depth,
                location,
            });
        }

        let env = closure.env.child();
        for (param, arg) in signature.params.iter().zip(args) {
            if !arg.conforms_to(&param.param_type) {
                return Err(RuntimeError::type_mismatch(
                    format!(
                        "cannot use {} value as {} in argument to {}",
                        arg.type_name(),
                        param.param_type,
                        closure.name
                    ),
                    location,
                ));
            }
            env.define(param.name.clone(), arg);
        }
        for (name, result_type) in signature.result_names.iter().zip(&signature.results) {
            env.define(name.clone(), Value::zero(result_type));
        }

        self.frames.push(Frame {
            function: closure.name.clone(),
            results: signature.results.clone(),
        });
        trace!(function = %closure.name, depth = self.frames.len(), "call");

        let body = Rc::clone(&closure.function.body);
        let flow = ensure_sufficient_stack(|| self.execute_statements(&body.statements, &env));
        self.frames.pop();

        let values = match flow? {
            // Bare return with named results.
            Flow::Return(values) if values.is_empty() && !signature.result_names.is_empty() => {
                signature
                    .result_names
                    .iter()
                    .zip(&signature.results)
                    .map(|(name, result_type)| {
                        env.get_local(name)
                            .unwrap_or_else(|| Value::zero(result_type))
                    })
                    .collect()
            }
            Flow::Return(values) => values,
            Flow::Normal | Flow::Break | Flow::Continue => Vec::new(),
        };

        if values.len() != signature.results.len() {
            return Err(RuntimeError::ReturnCount {
                function: closure.name.clone(),
                expected: signature.results.len(),
                found: values.len(),
                location,
            });
        }
        Ok(values)
    }

    fn execute_statements(
        &mut self,
        statements: &[Statement],
        env: &Environment,
    ) -> RuntimeResult<Flow> {
        for statement in statements {
            match self.execute_statement(statement, env)? {
                Flow::Normal => {}
                flow => return Ok(flow),
            }
        }
        Ok(Flow::Normal)
    }

    fn execute_block(&mut self, block: &Block, env: &Environment) -> RuntimeResult<Flow> {
        self.execute_statements(&block.statements, &env.child())
    }

    /// Runs `body` in a fresh scope holding the optional init statement's declarations.
    fn with_scope(
        &mut self,
        env: &Environment,
        init: Option<&Statement>,
        body: impl FnOnce(&mut Self, &Environment) -> RuntimeResult<Flow>,
    ) -> RuntimeResult<Flow> {
        let scope = env.child();
        if let Some(init) = init {
            self.execute_statement(init, &scope)?;
        }
        body(self, &scope)
    }

    fn execute_statement(&mut self, statement: &Statement, env: &Environment) -> RuntimeResult<Flow> {
        match statement {
            Statement::VarDecl {
                names,
                type_annotation,
                values,
                location,
            } => {
                self.declare_values(names, type_annotation.as_ref(), values, *location, env, env, false)?;
                Ok(Flow::Normal)
            }
            Statement::ConstDecl {
                names,
                type_annotation,
                values,
                location,
            } => {
                self.declare_values(names, type_annotation.as_ref(), values, *location, env, env, true)?;
                Ok(Flow::Normal)
            }
            Statement::ShortVarDecl {
                names,
                values,
                location,
            } => {
                self.short_var_decl(names, values, *location, env)?;
                Ok(Flow::Normal)
            }
            Statement::Assignment {
                targets,
                operator,
                values,
                location,
            } => {
                self.assign(targets, operator, values, *location, env)?;
                Ok(Flow::Normal)
            }
            Statement::IncDec {
                target,
                increment,
                location,
            } => {
                self.inc_dec(target, *increment, *location, env)?;
                Ok(Flow::Normal)
            }
            Statement::If {
                init,
                condition,
                then_body,
                else_body,
                location,
            } => self.with_scope(env, init.as_deref(), |this, scope| {
                if this.eval_condition(condition, scope, *location)? {
                    return this.execute_block(then_body, scope);
                }
                match else_body {
                    Some(ElseBranch::Block(block)) => this.execute_block(block, scope),
                    Some(ElseBranch::If(nested)) => this.execute_statement(nested, scope),
                    None => Ok(Flow::Normal),
                }
            }),
            Statement::For {
                init,
                condition,
                post,
                body,
                location,
            } => self.with_scope(env, init.as_deref(), |this, scope| {
                loop {
                    if let Some(condition) = condition {
                        if !this.eval_condition(condition, scope, *location)? {
                            break;
                        }
                    }
                    match this.execute_block(body, scope)? {
                        Flow::Break => break,
                        Flow::Return(values) => return Ok(Flow::Return(values)),
                        Flow::Normal | Flow::Continue => {}
                    }
                    if let Some(post) = post {
                        this.execute_statement(post, scope)?;
                    }
                }
                Ok(Flow::Normal)
            }),
            Statement::Switch {
                init,
                tag,
                cases,
                location,
            } => self.with_scope(env, init.as_deref(), |this, scope| {
                this.execute_switch(tag.as_ref(), cases, *location, scope)
            }),
            Statement::Function { name, function } => {
                env.define_const(name.clone(), closure(name, function, env));
                Ok(Flow::Normal)
            }
            Statement::Return { values, location } => self.return_values(values, *location, env),
            Statement::Break(_) => Ok(Flow::Break),
            Statement::Continue(_) => Ok(Flow::Continue),
            Statement::Block(block) => self.execute_block(block, env),
            Statement::Expression(expr) => {
                self.eval_multi(expr, env)?;
                Ok(Flow::Normal)
            }
        }
    }

    /// Cases are tried in textual order; `default` runs only when none matched.
    fn execute_switch(
        &mut self,
        tag: Option<&Expression>,
        cases: &[SwitchCase],
        location: SourceLocation,
        env: &Environment,
    ) -> RuntimeResult<Flow> {
        let tag = match tag {
            Some(expr) => Some((self.evaluate(expr, env)?, expr)),
            None => None,
        };

        let mut chosen = None;
        'cases: for case in cases {
            let values = match &case.label {
                CaseLabel::Values(values) => values,
                CaseLabel::Default => continue,
            };
            for value in values {
                let matched = match &tag {
                    Some((tag_value, tag_expr)) => {
                        let candidate = self.evaluate(value, env)?;
                        let (tag_value, candidate) =
                            unify_untyped(tag_value.clone(), tag_expr, candidate, value);
                        tag_value.equals(&candidate, value.location().unwrap_or(case.location))?
                    }
                    None => self.eval_condition(value, env, case.location)?,
                };
                if matched {
                    chosen = Some(case);
                    break 'cases;
                }
            }
        }

        let chosen = chosen.or_else(|| cases.iter().find(|case| case.label == CaseLabel::Default));
        match chosen {
            Some(case) => match self.execute_statements(&case.body, &env.child())? {
                Flow::Break => Ok(Flow::Normal),
                flow => Ok(flow),
            },
            None => {
                trace!(%location, "no switch case matched");
                Ok(Flow::Normal)
            }
        }
    }

    fn return_values(
        &mut self,
        values: &[Expression],
        location: SourceLocation,
        env: &Environment,
    ) -> RuntimeResult<Flow> {
        if values.is_empty() {
            return Ok(Flow::Return(Vec::new()));
        }

        let (function, results) = match self.frames.last() {
            Some(frame) => (frame.function.clone(), frame.results.clone()),
            None => (String::new(), Vec::new()),
        };

        let received = self.eval_values(values, env)?;
        if received.len() != results.len() {
            return Err(RuntimeError::ReturnCount {
                function,
                expected: results.len(),
                found: received.len(),
                location,
            });
        }

        let mut returned = Vec::with_capacity(results.len());
        for ((value, expr), result_type) in received.into_iter().zip(&results) {
            let value = coerce(value, expr, result_type);
            if !value.conforms_to(result_type) {
                return Err(RuntimeError::type_mismatch(
                    format!(
                        "cannot use {} value as {} in return statement",
                        value.type_name(),
                        result_type
                    ),
                    expr.and_then(Expression::location).unwrap_or(location),
                ));
            }
            returned.push(value);
        }
        Ok(Flow::Return(returned))
    }

    /// Evaluates initializers in `eval_env` and binds the names in `target`.
    #[allow(clippy::too_many_arguments)]
    fn declare_values(
        &mut self,
        names: &[String],
        type_annotation: Option<&Type>,
        values: &[Expression],
        location: SourceLocation,
        eval_env: &Environment,
        target: &Environment,
        constant: bool,
    ) -> RuntimeResult<()> {
        let initial: Vec<Value> = if values.is_empty() {
            match type_annotation {
                Some(declared) => names.iter().map(|_| Value::zero(declared)).collect(),
                None => {
                    return Err(RuntimeError::type_mismatch(
                        "missing type or initializer",
                        location,
                    ))
                }
            }
        } else {
            let received = self.eval_values(values, eval_env)?;
            if received.len() != names.len() {
                return Err(RuntimeError::AssignmentCount {
                    targets: names.len(),
                    values: received.len(),
                    location,
                });
            }

            let mut initial = Vec::with_capacity(received.len());
            for (value, expr) in received {
                let value = match type_annotation {
                    Some(declared) => {
                        let value = coerce(value, expr, declared);
                        if !value.conforms_to(declared) {
                            return Err(RuntimeError::type_mismatch(
                                format!(
                                    "cannot use {} value as {} in variable declaration",
                                    value.type_name(),
                                    declared
                                ),
                                location,
                            ));
                        }
                        value
                    }
                    None => value,
                };
                initial.push(value);
            }
            initial
        };

        for (name, value) in names.iter().zip(initial) {
            if constant {
                target.define_const(name.clone(), value);
            } else {
                target.define(name.clone(), value);
            }
        }
        Ok(())
    }

    /// `:=` defines the names new to this scope and assigns the rest.
    fn short_var_decl(
        &mut self,
        names: &[String],
        values: &[Expression],
        location: SourceLocation,
        env: &Environment,
    ) -> RuntimeResult<()> {
        let received = self.eval_values(values, env)?;
        if received.len() != names.len() {
            return Err(RuntimeError::AssignmentCount {
                targets: names.len(),
                values: received.len(),
                location,
            });
        }

        for (name, (value, expr)) in names.iter().zip(received) {
            if name == BLANK {
                continue;
            }
            if env.has_local(name) {
                self.store(name, value, expr, location, env)?;
            } else {
                env.define(name.clone(), value);
            }
        }
        Ok(())
    }

    fn assign(
        &mut self,
        targets: &[String],
        operator: &AssignOperator,
        values: &[Expression],
        location: SourceLocation,
        env: &Environment,
    ) -> RuntimeResult<()> {
        match operator {
            AssignOperator::Assign => {
                // Every right-hand side is evaluated before any target changes.
                let received = self.eval_values(values, env)?;
                if received.len() != targets.len() {
                    return Err(RuntimeError::AssignmentCount {
                        targets: targets.len(),
                        values: received.len(),
                        location,
                    });
                }
                for (target, (value, expr)) in targets.iter().zip(received) {
                    if target != BLANK {
                        self.store(target, value, expr, location, env)?;
                    }
                }
                Ok(())
            }
            AssignOperator::Compound(operator) => {
                let (target, expr) = match (targets, values) {
                    ([target], [expr]) => (target, expr),
                    _ => {
                        return Err(RuntimeError::AssignmentCount {
                            targets: targets.len(),
                            values: values.len(),
                            location,
                        })
                    }
                };
                let current = lookup(env, target, location)?;
                let operand = self.evaluate(expr, env)?;
                let operand = match current {
                    Value::Float(_) => coerce(operand, Some(expr), &Type::Float),
                    _ => operand,
                };
                let updated = binary_op(*operator, &current, &operand, location)?;
                env.assign(target, updated, location)
            }
        }
    }

    /// Assigns to an existing variable, which keeps its kind.
    fn store(
        &mut self,
        name: &str,
        value: Value,
        expr: Option<&Expression>,
        location: SourceLocation,
        env: &Environment,
    ) -> RuntimeResult<()> {
        let current = lookup(env, name, location)?;
        let value = match current {
            Value::Float(_) => coerce(value, expr, &Type::Float),
            _ => value,
        };
        if !current.same_kind(&value) {
            return Err(RuntimeError::type_mismatch(
                format!(
                    "cannot use {} value as {} value in assignment",
                    value.type_name(),
                    current.type_name()
                ),
                location,
            ));
        }
        env.assign(name, value, location)
    }

    fn inc_dec(
        &mut self,
        target: &str,
        increment: bool,
        location: SourceLocation,
        env: &Environment,
    ) -> RuntimeResult<()> {
        let updated = match lookup(env, target, location)? {
            Value::Int(n) if increment => Value::Int(n.wrapping_add(1)),
            Value::Int(n) => Value::Int(n.wrapping_sub(1)),
            Value::Float(x) if increment => Value::Float(x + 1.0),
            Value::Float(x) => Value::Float(x - 1.0),
            other => {
                return Err(RuntimeError::type_mismatch(
                    format!(
                        "invalid operation: {}{} (non-numeric type {})",
                        target,
                        if increment { "++" } else { "--" },
                        other.type_name()
                    ),
                    location,
                ))
            }
        };
        env.assign(target, updated, location)
    }

    fn eval_condition(
        &mut self,
        condition: &Expression,
        env: &Environment,
        fallback: SourceLocation,
    ) -> RuntimeResult<bool> {
        self.evaluate(condition, env)?
            .as_bool(condition.location().unwrap_or(fallback))
    }

    /// Evaluates an expression list, spreading a lone multi-value call.
    /// Each value keeps its source expression when it has one of its own.
    fn eval_values<'e>(
        &mut self,
        exprs: &'e [Expression],
        env: &Environment,
    ) -> RuntimeResult<Vec<(Value, Option<&'e Expression>)>> {
        if let [single] = exprs {
            if single.is_call() {
                let results = self.eval_multi(single, env)?;
                let source = if results.len() == 1 { Some(single) } else { None };
                return Ok(results.into_iter().map(|value| (value, source)).collect());
            }
        }

        let mut values = Vec::with_capacity(exprs.len());
        for expr in exprs {
            values.push((self.evaluate(expr, env)?, Some(expr)));
        }
        Ok(values)
    }

    fn eval_multi(&mut self, expr: &Expression, env: &Environment) -> RuntimeResult<Vec<Value>> {
        match expr {
            Expression::Call {
                callee,
                args,
                location,
            } => self.eval_call(callee, args, *location, env),
            _ => Ok(vec![self.evaluate(expr, env)?]),
        }
    }

    /// Evaluates `expr` in a single-value context.
    pub fn evaluate(&mut self, expr: &Expression, env: &Environment) -> RuntimeResult<Value> {
        ensure_sufficient_stack(|| self.eval_expression(expr, env))
    }

    fn eval_expression(&mut self, expr: &Expression, env: &Environment) -> RuntimeResult<Value> {
        match expr {
            Expression::IntegerLiteral(n) => Ok(Value::Int(*n)),
            Expression::FloatLiteral(x) => Ok(Value::Float(*x)),
            Expression::StringLiteral(s) => Ok(Value::string(s)),
            Expression::Identifier { name, location } => match env.get(name) {
                Some(Value::Package(_)) => Err(RuntimeError::type_mismatch(
                    format!("use of package {} without selector", name),
                    *location,
                )),
                Some(value) => Ok(value),
                None => Err(RuntimeError::Undefined {
                    name: name.clone(),
                    location: *location,
                }),
            },
            Expression::Qualified {
                package,
                name,
                location,
            } => qualified(env, package, name, *location),
            Expression::BinaryOp {
                left,
                operator,
                right,
                location,
            } => self.eval_binary(left, *operator, right, *location, env),
            Expression::UnaryOp {
                operator,
                operand,
                location,
            } => {
                let value = self.evaluate(operand, env)?;
                unary_op(*operator, &value, *location)
            }
            Expression::Call { location, .. } => {
                let mut results = self.eval_multi(expr, env)?;
                match results.len() {
                    1 => Ok(results.remove(0)),
                    0 => Err(RuntimeError::NoValue {
                        location: *location,
                    }),
                    count => Err(RuntimeError::MultiValue {
                        count,
                        location: *location,
                    }),
                }
            }
            Expression::FunctionLiteral(function) => {
                let enclosing = self.frames.last().map_or("init", |f| f.function.as_str());
                let name = format!("{}.func", enclosing);
                Ok(closure(&name, function, env))
            }
        }
    }

    fn eval_binary(
        &mut self,
        left: &Expression,
        operator: BinaryOperator,
        right: &Expression,
        location: SourceLocation,
        env: &Environment,
    ) -> RuntimeResult<Value> {
        match operator {
            BinaryOperator::And => {
                let result = self.eval_condition(left, env, location)?
                    && self.eval_condition(right, env, location)?;
                return Ok(Value::Bool(result));
            }
            BinaryOperator::Or => {
                let result = self.eval_condition(left, env, location)?
                    || self.eval_condition(right, env, location)?;
                return Ok(Value::Bool(result));
            }
            _ => {}
        }

        let left_value = self.evaluate(left, env)?;
        let right_value = self.evaluate(right, env)?;
        let (left_value, right_value) = unify_untyped(left_value, left, right_value, right);
        binary_op(operator, &left_value, &right_value, location)
    }

    fn eval_call(
        &mut self,
        callee: &Expression,
        args: &[Expression],
        location: SourceLocation,
        env: &Environment,
    ) -> RuntimeResult<Vec<Value>> {
        let function = self.evaluate(callee, env)?;
        let received = self.eval_values(args, env)?;

        let args: Vec<Value> = match &function {
            Value::Function(closure) => {
                let params = &closure.function.signature.params;
                received
                    .into_iter()
                    .enumerate()
                    .map(|(i, (value, expr))| match params.get(i) {
                        Some(param) => coerce(value, expr, &param.param_type),
                        None => value,
                    })
                    .collect()
            }
            _ => received.into_iter().map(|(value, _)| value).collect(),
        };

        self.call_value(&function, args, location)
    }
}

fn closure(name: &str, function: &Rc<FunctionLiteral>, env: &Environment) -> Value {
    Value::Function(Rc::new(Closure {
        name: name.to_string(),
        function: Rc::clone(function),
        env: env.clone(),
    }))
}

fn lookup(env: &Environment, name: &str, location: SourceLocation) -> RuntimeResult<Value> {
    env.get(name).ok_or_else(|| RuntimeError::Undefined {
        name: name.to_string(),
        location,
    })
}

fn qualified(
    env: &Environment,
    package: &str,
    name: &str,
    location: SourceLocation,
) -> RuntimeResult<Value> {
    let undefined = || RuntimeError::Undefined {
        name: format!("{}.{}", package, name),
        location,
    };

    match env.get(package) {
        Some(Value::Package(table)) if is_exported(name) => {
            table.scope.get_local(name).ok_or_else(undefined)
        }
        Some(Value::Package(_)) | None => Err(undefined()),
        Some(other) => Err(RuntimeError::type_mismatch(
            format!(
                "{}.{} undefined (type {} has no field or method {})",
                package,
                name,
                other.type_name(),
                name
            ),
            location,
        )),
    }
}

/// An untyped integer constant takes the float type where a float is expected.
fn coerce(value: Value, expr: Option<&Expression>, target: &Type) -> Value {
    match (value, target) {
        (Value::Int(n), Type::Float) if expr.map_or(false, Expression::is_untyped_integer) => {
            Value::Float(n as f64)
        }
        (value, _) => value,
    }
}

/// Converts an untyped integer operand when the other operand is a float.
fn unify_untyped(
    left: Value,
    left_expr: &Expression,
    right: Value,
    right_expr: &Expression,
) -> (Value, Value) {
    match (left, right) {
        (Value::Int(n), right @ Value::Float(_)) if left_expr.is_untyped_integer() => {
            (Value::Float(n as f64), right)
        }
        (left @ Value::Float(_), Value::Int(n)) if right_expr.is_untyped_integer() => {
            (left, Value::Float(n as f64))
        }
        pair => pair,
    }
}

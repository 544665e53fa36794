use crate::ast::{
    AssignOperator, Block, CaseLabel, ElseBranch, Expression, FunctionLiteral, Signature,
    Statement, SwitchCase, Type, UnaryOperator,
};
use crate::builtins;
use crate::error::{Error, ResolutionError, ResolveResult, Result, SourceLocation};
use crate::initialization::initialization_order;
use crate::module::{Package, SourceFile};
use crate::stack::ensure_sufficient_stack;
use crate::symbol_table::{is_exported, ScopeId, ScopeKind, SymbolKind, SymbolTable, BLANK};
use std::collections::HashMap;
use tracing::debug;

/// A package-level name as seen by importers.
#[derive(Debug, Clone, PartialEq)]
pub struct Member {
    pub kind: SymbolKind,
    pub member_type: Option<Type>,
}

/// Every top-level name of a checked package, keyed by name.
#[derive(Debug, Clone, PartialEq)]
pub struct PackageInterface {
    pub name: String,
    pub members: HashMap<String, Member>,
}

struct FunctionContext {
    name: String,
    results: usize,
    named_results: bool,
    loops: usize,
    breakables: usize,
}

/// Resolves every name in a package and validates declaration and return arity.
pub struct Checker<'a> {
    table: SymbolTable,
    imports: &'a HashMap<String, PackageInterface>,
    functions: Vec<FunctionContext>,
}

impl<'a> Checker<'a> {
    /// `imports` maps import paths to the interfaces of already checked packages.
    pub fn new(imports: &'a HashMap<String, PackageInterface>) -> Self {
        let mut table = SymbolTable::new();
        for (name, kind, symbol_type) in builtins::universe_symbols() {
            // The universe starts empty, so these cannot collide.
            let _ = table.declare(name, kind, Some(symbol_type), None);
        }

        Self {
            table,
            imports,
            functions: Vec::new(),
        }
    }

    pub fn check_package(mut self, package: &Package) -> Result<PackageInterface> {
        let package_scope = self.table.enter_scope(ScopeKind::Package {
            name: package.name.clone(),
        });

        for file in &package.files {
            self.declare_functions(file, package_scope)
                .map_err(in_file(file))?;
        }

        let mut file_scopes = Vec::new();
        for file in &package.files {
            self.table.set_current_scope(package_scope);
            file_scopes.push(self.table.enter_scope(ScopeKind::File {
                path: file.display_path(),
            }));
            self.bind_imports(file).map_err(in_file(file))?;
        }

        // An initializer is checked once everything it depends on is declared.
        for initializer in initialization_order(package)? {
            let file = &package.files[initializer.file];
            self.table.set_current_scope(file_scopes[initializer.file]);
            let checked = match initializer.declaration {
                Statement::VarDecl {
                    names,
                    type_annotation,
                    values,
                    location,
                } => self.check_value_decl(
                    names,
                    type_annotation.as_ref(),
                    values,
                    *location,
                    SymbolKind::Variable,
                    package_scope,
                ),
                Statement::ConstDecl {
                    names,
                    type_annotation,
                    values,
                    location,
                } => self.check_value_decl(
                    names,
                    type_annotation.as_ref(),
                    values,
                    *location,
                    SymbolKind::Constant,
                    package_scope,
                ),
                _ => Ok(()),
            };
            checked.map_err(in_file(file))?;
        }

        for (file, scope) in package.files.iter().zip(&file_scopes) {
            for declaration in &file.program.declarations {
                if let Statement::Function { name, function } = declaration {
                    self.table.set_current_scope(*scope);
                    self.check_function(name, function)
                        .map_err(in_file(file))?;
                }
            }
        }

        let members: HashMap<String, Member> = self
            .table
            .symbols_in_scope(package_scope)
            .into_iter()
            .map(|symbol| {
                (
                    symbol.name.clone(),
                    Member {
                        kind: symbol.kind.clone(),
                        member_type: symbol.symbol_type.clone(),
                    },
                )
            })
            .collect();

        debug!(
            package = %package.path,
            members = members.len(),
            "checked package"
        );

        Ok(PackageInterface {
            name: package.name.clone(),
            members,
        })
    }

    fn declare_functions(&mut self, file: &SourceFile, package_scope: ScopeId) -> ResolveResult<()> {
        for declaration in &file.program.declarations {
            if let Statement::Function { name, function } = declaration {
                self.check_signature(&function.signature, function.location)?;
                self.table.declare_in(
                    package_scope,
                    name,
                    SymbolKind::Function,
                    Some(Type::Func(function.signature.func_type())),
                    Some(function.location),
                )?;
            }
        }
        Ok(())
    }

    fn bind_imports(&mut self, file: &SourceFile) -> ResolveResult<()> {
        for import in &file.program.imports {
            let interface =
                self.imports
                    .get(&import.path)
                    .ok_or_else(|| ResolutionError::PackageNotFound {
                        path: import.path.clone(),
                        searched: "loaded packages".to_string(),
                    })?;
            let name = import.alias.as_ref().unwrap_or(&interface.name);
            self.table.declare(
                name,
                SymbolKind::Package {
                    path: import.path.clone(),
                },
                None,
                Some(import.location),
            )?;
        }
        Ok(())
    }

    fn check_function(&mut self, name: &str, function: &FunctionLiteral) -> ResolveResult<()> {
        let signature = &function.signature;
        let location = Some(function.location);

        self.table.enter_scope(ScopeKind::Function {
            name: name.to_string(),
        });
        for param in &signature.params {
            self.table.declare(
                &param.name,
                SymbolKind::Parameter,
                Some(param.param_type.clone()),
                location,
            )?;
        }
        for (result_name, result_type) in signature.result_names.iter().zip(&signature.results) {
            self.table.declare(
                result_name,
                SymbolKind::Variable,
                Some(result_type.clone()),
                location,
            )?;
        }

        self.functions.push(FunctionContext {
            name: name.to_string(),
            results: signature.results.len(),
            named_results: !signature.result_names.is_empty(),
            loops: 0,
            breakables: 0,
        });
        let checked = self.check_statements(&function.body.statements);
        self.functions.pop();
        self.table.exit_scope();
        checked?;

        if !signature.results.is_empty() && !is_terminating_list(&function.body.statements) {
            return Err(ResolutionError::MissingReturn {
                function: name.to_string(),
                location: function.location,
            });
        }
        Ok(())
    }

    fn check_signature(&self, signature: &Signature, location: SourceLocation) -> ResolveResult<()> {
        for param in &signature.params {
            check_type(&param.param_type, location)?;
        }
        for result in &signature.results {
            check_type(result, location)?;
        }
        Ok(())
    }

    fn check_statements(&mut self, statements: &[Statement]) -> ResolveResult<()> {
        for statement in statements {
            self.check_statement(statement)?;
        }
        Ok(())
    }

    fn check_block(&mut self, block: &Block) -> ResolveResult<()> {
        self.table.enter_scope(ScopeKind::Block);
        let checked = self.check_statements(&block.statements);
        self.table.exit_scope();
        checked
    }

    fn check_statement(&mut self, statement: &Statement) -> ResolveResult<()> {
        match statement {
            Statement::VarDecl {
                names,
                type_annotation,
                values,
                location,
            } => {
                let scope = self.table.current_scope();
                self.check_value_decl(
                    names,
                    type_annotation.as_ref(),
                    values,
                    *location,
                    SymbolKind::Variable,
                    scope,
                )
            }
            Statement::ConstDecl {
                names,
                type_annotation,
                values,
                location,
            } => {
                let scope = self.table.current_scope();
                self.check_value_decl(
                    names,
                    type_annotation.as_ref(),
                    values,
                    *location,
                    SymbolKind::Constant,
                    scope,
                )
            }
            Statement::ShortVarDecl {
                names,
                values,
                location,
            } => self.check_short_var_decl(names, values, *location),
            Statement::Assignment {
                targets,
                operator,
                values,
                location,
            } => {
                for value in values {
                    self.check_expression(value)?;
                }
                for target in targets {
                    if target == BLANK && *operator == AssignOperator::Assign {
                        continue;
                    }
                    self.check_assignable(target, *location)?;
                }
                self.check_value_count(targets.len(), values, *location)
            }
            Statement::IncDec {
                target, location, ..
            } => self.check_assignable(target, *location),
            Statement::If {
                init,
                condition,
                then_body,
                else_body,
                ..
            } => {
                self.table.enter_scope(ScopeKind::If);
                let checked = self.check_if(init.as_deref(), condition, then_body, else_body.as_ref());
                self.table.exit_scope();
                checked
            }
            Statement::For {
                init,
                condition,
                post,
                body,
                ..
            } => {
                self.table.enter_scope(ScopeKind::For);
                let checked = self.check_for(init.as_deref(), condition.as_ref(), post.as_deref(), body);
                self.table.exit_scope();
                checked
            }
            Statement::Switch {
                init, tag, cases, ..
            } => {
                self.table.enter_scope(ScopeKind::Switch);
                let checked = self.check_switch(init.as_deref(), tag.as_ref(), cases);
                self.table.exit_scope();
                checked
            }
            Statement::Function { name, function } => {
                self.check_signature(&function.signature, function.location)?;
                self.table.declare(
                    name,
                    SymbolKind::Function,
                    Some(Type::Func(function.signature.func_type())),
                    Some(function.location),
                )?;
                self.check_function(name, function)
            }
            Statement::Return { values, location } => self.check_return(values, *location),
            Statement::Break(location) => {
                if self.functions.last().map_or(0, |f| f.breakables) == 0 {
                    return Err(ResolutionError::MisplacedControl {
                        keyword: "break",
                        suffix: " or switch",
                        location: *location,
                    });
                }
                Ok(())
            }
            Statement::Continue(location) => {
                if self.functions.last().map_or(0, |f| f.loops) == 0 {
                    return Err(ResolutionError::MisplacedControl {
                        keyword: "continue",
                        suffix: "",
                        location: *location,
                    });
                }
                Ok(())
            }
            Statement::Block(block) => self.check_block(block),
            Statement::Expression(expr) => self.check_expression(expr),
        }
    }

    fn check_if(
        &mut self,
        init: Option<&Statement>,
        condition: &Expression,
        then_body: &Block,
        else_body: Option<&ElseBranch>,
    ) -> ResolveResult<()> {
        if let Some(init) = init {
            self.check_statement(init)?;
        }
        self.check_operand(condition)?;
        self.check_block(then_body)?;
        match else_body {
            Some(ElseBranch::Block(block)) => self.check_block(block),
            Some(ElseBranch::If(nested)) => self.check_statement(nested),
            None => Ok(()),
        }
    }

    fn check_for(
        &mut self,
        init: Option<&Statement>,
        condition: Option<&Expression>,
        post: Option<&Statement>,
        body: &Block,
    ) -> ResolveResult<()> {
        if let Some(init) = init {
            self.check_statement(init)?;
        }
        if let Some(condition) = condition {
            self.check_operand(condition)?;
        }
        if let Some(post) = post {
            self.check_statement(post)?;
        }

        self.enter_breakable(true);
        let checked = self.check_block(body);
        self.leave_breakable(true);
        checked
    }

    fn check_switch(
        &mut self,
        init: Option<&Statement>,
        tag: Option<&Expression>,
        cases: &[SwitchCase],
    ) -> ResolveResult<()> {
        if let Some(init) = init {
            self.check_statement(init)?;
        }
        if let Some(tag) = tag {
            self.check_operand(tag)?;
        }

        for case in cases {
            if let CaseLabel::Values(values) = &case.label {
                for value in values {
                    self.check_operand(value)?;
                }
            }

            self.enter_breakable(false);
            self.table.enter_scope(ScopeKind::Case);
            let checked = self.check_statements(&case.body);
            self.table.exit_scope();
            self.leave_breakable(false);
            checked?;
        }
        Ok(())
    }

    fn enter_breakable(&mut self, is_loop: bool) {
        if let Some(function) = self.functions.last_mut() {
            function.breakables += 1;
            if is_loop {
                function.loops += 1;
            }
        }
    }

    fn leave_breakable(&mut self, is_loop: bool) {
        if let Some(function) = self.functions.last_mut() {
            function.breakables -= 1;
            if is_loop {
                function.loops -= 1;
            }
        }
    }

    fn check_value_decl(
        &mut self,
        names: &[String],
        type_annotation: Option<&Type>,
        values: &[Expression],
        location: SourceLocation,
        kind: SymbolKind,
        target: ScopeId,
    ) -> ResolveResult<()> {
        if let Some(declared) = type_annotation {
            check_type(declared, location)?;
        }
        // Initializers are resolved before the new names come into scope.
        for value in values {
            self.check_expression(value)?;
        }

        let inferred = if values.is_empty() {
            vec![None; names.len()]
        } else {
            self.check_value_count(names.len(), values, location)?;
            self.value_types(names.len(), values)
        };

        for (name, inferred) in names.iter().zip(inferred) {
            let symbol_type = type_annotation.cloned().or(inferred);
            self.table
                .declare_in(target, name, kind.clone(), symbol_type, Some(location))?;
        }
        Ok(())
    }

    fn check_short_var_decl(
        &mut self,
        names: &[String],
        values: &[Expression],
        location: SourceLocation,
    ) -> ResolveResult<()> {
        for value in values {
            self.check_expression(value)?;
        }
        self.check_value_count(names.len(), values, location)?;
        let types = self.value_types(names.len(), values);

        let mut declared_new = false;
        for (name, symbol_type) in names.iter().zip(types) {
            if name == BLANK {
                continue;
            }
            match self.table.lookup_current_scope(name) {
                Some(id) => {
                    let assignable = self
                        .table
                        .get_symbol(id)
                        .map_or(false, |symbol| symbol.kind.is_assignable());
                    if !assignable {
                        return Err(ResolutionError::NotAssignable {
                            name: name.clone(),
                            location,
                        });
                    }
                }
                None => {
                    self.table
                        .declare(name, SymbolKind::Variable, symbol_type, Some(location))?;
                    declared_new = true;
                }
            }
        }

        if !declared_new {
            return Err(ResolutionError::NoNewVariables { location });
        }
        Ok(())
    }

    fn check_assignable(&mut self, name: &str, location: SourceLocation) -> ResolveResult<()> {
        let id = self
            .table
            .lookup(name)
            .filter(|_| name != BLANK)
            .ok_or_else(|| ResolutionError::Undefined {
                name: name.to_string(),
                location,
            })?;

        let assignable = self
            .table
            .get_symbol(id)
            .map_or(false, |symbol| symbol.kind.is_assignable());
        if !assignable {
            return Err(ResolutionError::NotAssignable {
                name: name.to_string(),
                location,
            });
        }
        Ok(())
    }

    fn check_return(&mut self, values: &[Expression], location: SourceLocation) -> ResolveResult<()> {
        for value in values {
            self.check_expression(value)?;
        }

        let (function, expected, named_results) = match self.functions.last() {
            Some(f) => (f.name.clone(), f.results, f.named_results),
            None => return Ok(()),
        };

        let found = if values.is_empty() {
            if named_results {
                return Ok(());
            }
            0
        } else if values.len() == 1 {
            match self.result_count(&values[0]) {
                Some(count) => count,
                None => return Ok(()),
            }
        } else {
            for value in values {
                self.check_single_value(value)?;
            }
            values.len()
        };

        if found != expected {
            return Err(ResolutionError::ReturnCount {
                function,
                expected,
                found,
                location,
            });
        }
        Ok(())
    }

    /// `targets` names receiving `values`; a lone call may supply all of them.
    fn check_value_count(
        &self,
        targets: usize,
        values: &[Expression],
        location: SourceLocation,
    ) -> ResolveResult<()> {
        if values.len() == 1 && targets != 1 {
            match self.result_count(&values[0]) {
                Some(found) if found != targets => Err(ResolutionError::AssignmentCount {
                    targets,
                    values: found,
                    location,
                }),
                _ => Ok(()),
            }
        } else if values.len() != targets {
            Err(ResolutionError::AssignmentCount {
                targets,
                values: values.len(),
                location,
            })
        } else if targets == 1 {
            match self.result_count(&values[0]) {
                Some(found) if found != 1 => Err(ResolutionError::AssignmentCount {
                    targets,
                    values: found,
                    location,
                }),
                _ => Ok(()),
            }
        } else {
            values
                .iter()
                .try_for_each(|value| self.check_single_value(value))
        }
    }

    /// A call used where exactly one value is expected must produce exactly one.
    fn check_single_value(&self, expr: &Expression) -> ResolveResult<()> {
        let location = expr.location().unwrap_or_default();
        match self.result_count(expr) {
            Some(0) => Err(ResolutionError::NoValue { location }),
            Some(count) if count != 1 => Err(ResolutionError::MultiValue { count, location }),
            _ => Ok(()),
        }
    }

    fn check_operand(&mut self, expr: &Expression) -> ResolveResult<()> {
        self.check_expression(expr)?;
        self.check_single_value(expr)
    }

    fn check_expression(&mut self, expr: &Expression) -> ResolveResult<()> {
        ensure_sufficient_stack(|| self.resolve_expression(expr))
    }

    fn resolve_expression(&mut self, expr: &Expression) -> ResolveResult<()> {
        match expr {
            Expression::IntegerLiteral(_)
            | Expression::FloatLiteral(_)
            | Expression::StringLiteral(_) => Ok(()),
            Expression::Identifier { name, location } => {
                let id = self
                    .table
                    .lookup(name)
                    .filter(|_| name != BLANK)
                    .ok_or_else(|| ResolutionError::Undefined {
                        name: name.clone(),
                        location: *location,
                    })?;
                if let Some(SymbolKind::Package { .. }) = self.table.get_symbol(id).map(|s| &s.kind) {
                    return Err(ResolutionError::PackageAsValue {
                        name: name.clone(),
                        location: *location,
                    });
                }
                Ok(())
            }
            Expression::Qualified {
                package,
                name,
                location,
            } => self.check_qualified(package, name, *location),
            Expression::BinaryOp { left, right, .. } => {
                self.check_operand(left)?;
                self.check_operand(right)
            }
            Expression::UnaryOp { operand, .. } => self.check_operand(operand),
            Expression::Call { callee, args, .. } => {
                self.check_operand(callee)?;
                match args.as_slice() {
                    // A lone call argument may spread all of its results.
                    [arg] if arg.is_call() => {
                        self.check_expression(arg)?;
                        if self.result_count(arg) == Some(0) {
                            return Err(ResolutionError::NoValue {
                                location: arg.location().unwrap_or_default(),
                            });
                        }
                        Ok(())
                    }
                    args => args.iter().try_for_each(|arg| self.check_operand(arg)),
                }
            }
            Expression::FunctionLiteral(function) => {
                self.check_signature(&function.signature, function.location)?;
                self.check_function("func literal", function)
            }
        }
    }

    fn check_qualified(
        &mut self,
        package: &str,
        name: &str,
        location: SourceLocation,
    ) -> ResolveResult<()> {
        let id = self
            .table
            .lookup(package)
            .ok_or_else(|| ResolutionError::Undefined {
                name: package.to_string(),
                location,
            })?;
        let path = match self.table.get_symbol(id).map(|s| &s.kind) {
            Some(SymbolKind::Package { path }) => path.clone(),
            _ => {
                return Err(ResolutionError::UnknownPackage {
                    name: package.to_string(),
                    location,
                })
            }
        };

        if !is_exported(name) {
            return Err(ResolutionError::Unexported {
                package: package.to_string(),
                name: name.to_string(),
                location,
            });
        }

        let defined = self
            .imports
            .get(&path)
            .map_or(false, |interface| interface.members.contains_key(name));
        if !defined {
            return Err(ResolutionError::UndefinedInPackage {
                package: package.to_string(),
                name: name.to_string(),
                location,
            });
        }
        Ok(())
    }

    fn member(&self, package: &str, name: &str) -> Option<&Member> {
        let id = self.table.lookup(package)?;
        match &self.table.get_symbol(id)?.kind {
            SymbolKind::Package { path } => self.imports.get(path)?.members.get(name),
            _ => None,
        }
    }

    /// Number of values `expr` produces, when it can be known before running.
    fn result_count(&self, expr: &Expression) -> Option<usize> {
        match expr {
            Expression::Call { callee, .. } => match self.static_type(callee)? {
                Type::Func(func) => Some(func.results.len()),
                _ => None,
            },
            _ => Some(1),
        }
    }

    fn static_type(&self, expr: &Expression) -> Option<Type> {
        match expr {
            Expression::IntegerLiteral(_) => Some(Type::Int),
            Expression::FloatLiteral(_) => Some(Type::Float),
            Expression::StringLiteral(_) => Some(Type::String),
            Expression::Identifier { name, .. } => {
                let id = self.table.lookup(name)?;
                self.table.get_symbol(id)?.symbol_type.clone()
            }
            Expression::Qualified { package, name, .. } => {
                self.member(package, name)?.member_type.clone()
            }
            Expression::Call { callee, .. } => match self.static_type(callee)? {
                Type::Func(func) if func.results.len() == 1 => func.results.into_iter().next(),
                _ => None,
            },
            Expression::FunctionLiteral(function) => {
                Some(Type::Func(function.signature.func_type()))
            }
            Expression::UnaryOp {
                operator: UnaryOperator::Not,
                ..
            } => Some(Type::Bool),
            Expression::UnaryOp { operand, .. } => self.static_type(operand),
            Expression::BinaryOp {
                left,
                operator,
                right,
                ..
            } => {
                if !operator.is_arithmetic() {
                    return Some(Type::Bool);
                }
                match (self.static_type(left), self.static_type(right)) {
                    (Some(Type::Float), _) | (_, Some(Type::Float)) => Some(Type::Float),
                    (left, right) => left.or(right),
                }
            }
        }
    }

    fn value_types(&self, count: usize, values: &[Expression]) -> Vec<Option<Type>> {
        if values.len() == 1 && count != 1 {
            if let Expression::Call { callee, .. } = &values[0] {
                if let Some(Type::Func(func)) = self.static_type(callee) {
                    return func.results.into_iter().map(Some).collect();
                }
            }
            return vec![None; count];
        }
        values.iter().map(|value| self.static_type(value)).collect()
    }
}

fn in_file(file: &SourceFile) -> impl Fn(ResolutionError) -> Error + '_ {
    move |err| Error::from(err).in_file(file.display_path())
}

fn check_type(declared: &Type, location: SourceLocation) -> ResolveResult<()> {
    match declared {
        Type::Named(name) => Err(ResolutionError::UnknownType {
            name: name.clone(),
            location,
        }),
        Type::Func(func) => {
            for inner in func.params.iter().chain(&func.results) {
                check_type(inner, location)?;
            }
            Ok(())
        }
        Type::Int | Type::Float | Type::String | Type::Bool => Ok(()),
    }
}

fn is_terminating_list(statements: &[Statement]) -> bool {
    statements.last().map_or(false, is_terminating)
}

/// Go's terminating statements: control never reaches the end of them.
fn is_terminating(statement: &Statement) -> bool {
    match statement {
        Statement::Return { .. } => true,
        Statement::Block(block) => is_terminating_list(&block.statements),
        Statement::If {
            then_body,
            else_body: Some(else_body),
            ..
        } => {
            is_terminating_list(&then_body.statements)
                && match else_body {
                    ElseBranch::Block(block) => is_terminating_list(&block.statements),
                    ElseBranch::If(nested) => is_terminating(nested),
                }
        }
        Statement::For {
            condition: None,
            body,
            ..
        } => !breaks_out(&body.statements),
        Statement::Switch { cases, .. } => {
            cases.iter().any(|case| case.label == CaseLabel::Default)
                && cases
                    .iter()
                    .all(|case| is_terminating_list(&case.body) && !breaks_out(&case.body))
        }
        _ => false,
    }
}

/// Whether a `break` in `statements` leaves the statement that encloses them.
/// Nested loops and switches own the breaks inside them.
fn breaks_out(statements: &[Statement]) -> bool {
    statements.iter().any(|statement| match statement {
        Statement::Break(_) => true,
        Statement::Block(block) => breaks_out(&block.statements),
        Statement::If {
            then_body,
            else_body,
            ..
        } => {
            breaks_out(&then_body.statements)
                || match else_body {
                    Some(ElseBranch::Block(block)) => breaks_out(&block.statements),
                    Some(ElseBranch::If(nested)) => breaks_out(std::slice::from_ref(nested.as_ref())),
                    None => false,
                }
        }
        _ => false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::ModuleSystem;

    /// Checks `source` as package `p`, with `lib` available for import.
    fn check(source: &str) -> Result<PackageInterface> {
        let mut modules = ModuleSystem::new();
        modules
            .add_source(
                "lib",
                "lib.go",
                "package lib\nvar Count = 1\nfunc Pair() (int, int) { return 1, 2 }\nfunc hidden() {}\n",
            )
            .unwrap();
        modules.add_source("p", "p.go", source).unwrap();

        let mut interfaces = HashMap::new();
        interfaces.insert(builtins::FMT_PATH.to_string(), builtins::fmt_interface());
        for package in modules.resolve("p")? {
            let interface = Checker::new(&interfaces).check_package(package)?;
            interfaces.insert(package.path.clone(), interface);
        }
        Ok(interfaces.remove("p").unwrap())
    }

    fn resolution_error(source: &str) -> ResolutionError {
        match check(source) {
            Err(Error::InFile { source, .. }) => match *source {
                Error::Resolution(err) => err,
                other => panic!("Expected resolution error, got {:?}", other),
            },
            other => panic!("Expected error in file, got {:?}", other),
        }
    }

    #[test]
    fn test_valid_package_interface() {
        let interface = check(
            "package p\n\
             import \"fmt\"\n\
             import \"lib\"\n\
             var total = lib.Count\n\
             func Sum(a, b int) int { return a + b }\n\
             func main() {\n\
                 x, y := lib.Pair()\n\
                 fmt.Println(Sum(x, y), total)\n\
             }\n",
        )
        .unwrap();

        assert_eq!(interface.name, "p");
        assert_eq!(interface.members["Sum"].kind, SymbolKind::Function);
        assert_eq!(interface.members["total"].member_type, Some(Type::Int));
        assert!(!interface.members.contains_key("fmt"));
    }

    #[test]
    fn test_functions_may_be_used_before_declaration() {
        check("package p\nfunc A() int { return B() }\nfunc B() int { return 1 }\n").unwrap();
    }

    #[test]
    fn test_undefined_name() {
        assert!(matches!(
            resolution_error("package p\nfunc f() int { return missing }\n"),
            ResolutionError::Undefined { name, location } if name == "missing" && location == SourceLocation::new(2, 23)
        ));
    }

    #[test]
    fn test_if_initializer_is_invisible_afterwards() {
        let err = resolution_error(
            "package p\nfunc f() int {\nif x := 10; x < 0 {\nreturn x\n}\nreturn x\n}\n",
        );
        assert!(matches!(err, ResolutionError::Undefined { name, .. } if name == "x"));
    }

    #[test]
    fn test_short_var_decl_needs_a_new_name() {
        check("package p\nfunc f() int {\nx := 1\nx, y := 2, 3\nreturn x + y\n}\n").unwrap();
        assert!(matches!(
            resolution_error("package p\nfunc f() {\nx := 1\nx := 2\n}\n"),
            ResolutionError::NoNewVariables { .. }
        ));
    }

    #[test]
    fn test_redeclaration_in_same_block() {
        assert!(matches!(
            resolution_error("package p\nfunc f(a int) {\nvar a = 2\n}\n"),
            ResolutionError::Redeclared { name, .. } if name == "a"
        ));
    }

    #[test]
    fn test_return_arity() {
        assert_eq!(
            resolution_error("package p\nfunc f() (int, int) {\nreturn 1\n}\n"),
            ResolutionError::ReturnCount {
                function: "f".to_string(),
                expected: 2,
                found: 1,
                location: SourceLocation::new(3, 1),
            }
        );
        check("package p\nfunc f() (int, int) { return g() }\nfunc g() (int, int) { return 1, 2 }\n")
            .unwrap();
        check("package p\nfunc f() (a int, b int) {\nreturn\n}\n").unwrap();
    }

    #[test]
    fn test_assignment_arity_from_call() {
        assert!(matches!(
            resolution_error("package p\nimport \"lib\"\nfunc f() {\na, b, c := lib.Pair()\n}\n"),
            ResolutionError::AssignmentCount {
                targets: 3,
                values: 2,
                ..
            }
        ));
        assert!(matches!(
            resolution_error("package p\nfunc f() {\nvar a, b = 1\n}\n"),
            ResolutionError::AssignmentCount { .. }
        ));
    }

    #[test]
    fn test_missing_return() {
        assert!(matches!(
            resolution_error("package p\nfunc f(x int) int {\nif x > 0 {\nreturn 1\n}\n}\n"),
            ResolutionError::MissingReturn { function, .. } if function == "f"
        ));
        assert!(matches!(
            resolution_error("package p\nfunc f() int {\nfor {\nbreak\n}\n}\n"),
            ResolutionError::MissingReturn { .. }
        ));
        check("package p\nfunc f() int {\nfor {\nreturn 0\n}\n}\n").unwrap();
        check(
            "package p\nfunc f(x int) string {\nswitch x {\ncase 1:\nreturn \"a\"\ndefault:\nreturn \"c\"\n}\n}\n",
        )
        .unwrap();
    }

    #[test]
    fn test_package_member_rules() {
        assert!(matches!(
            resolution_error("package p\nimport \"lib\"\nfunc f() {\nlib.hidden()\n}\n"),
            ResolutionError::Unexported { .. }
        ));
        assert!(matches!(
            resolution_error("package p\nimport \"lib\"\nfunc f() {\nlib.Nope()\n}\n"),
            ResolutionError::UndefinedInPackage { .. }
        ));
        assert!(matches!(
            resolution_error("package p\nimport \"lib\"\nvar x = lib\n"),
            ResolutionError::PackageAsValue { .. }
        ));
        assert!(matches!(
            resolution_error("package p\nfunc f() {\nx := 1\nx.Y()\n}\n"),
            ResolutionError::UnknownPackage { .. }
        ));
    }

    #[test]
    fn test_assignment_targets() {
        assert!(matches!(
            resolution_error("package p\nconst limit = 3\nfunc f() {\nlimit = 4\n}\n"),
            ResolutionError::NotAssignable { name, .. } if name == "limit"
        ));
        assert!(matches!(
            resolution_error("package p\nfunc f() {\nf++\n}\n"),
            ResolutionError::NotAssignable { .. }
        ));
        check("package p\nfunc f() {\n_ = 1\n}\n").unwrap();
    }

    #[test]
    fn test_break_and_continue_placement() {
        assert_eq!(
            resolution_error("package p\nfunc f() {\nbreak\n}\n").to_string(),
            "3:1: break is not in a loop or switch"
        );
        assert!(matches!(
            resolution_error("package p\nfunc f(x int) {\nswitch x {\ndefault:\ncontinue\n}\n}\n"),
            ResolutionError::MisplacedControl { keyword: "continue", .. }
        ));
        check("package p\nfunc f(x int) {\nfor {\nswitch x {\ndefault:\ncontinue\n}\n}\n}\n").unwrap();
    }

    #[test]
    fn test_unknown_type() {
        assert!(matches!(
            resolution_error("package p\nfunc f(x widget) {}\n"),
            ResolutionError::UnknownType { name, .. } if name == "widget"
        ));
    }

    #[test]
    fn test_package_vars_initialize_after_their_dependencies() {
        let interface = check("package p\nvar a = b\nvar b = 1.5\n").unwrap();
        assert_eq!(interface.members["a"].member_type, Some(Type::Float));
        check("package p\nvar y = f()\nvar x = 5\nfunc f() int { return x }\n").unwrap();
        assert!(matches!(
            resolution_error("package p\nvar x = f()\nfunc f() int { return x }\n"),
            ResolutionError::InitializationCycle { path, .. } if path == "x refers to x"
        ));
    }

    #[test]
    fn test_multi_value_call_in_single_value_context() {
        let pair = "package p\nfunc pair() (int, int) { return 1, 2 }\nfunc one(x int) int { return x }\n";
        let single = |body: &str| resolution_error(&format!("{}{}", pair, body));

        assert_eq!(
            single("func f() int { return pair() + 1 }\n"),
            ResolutionError::MultiValue {
                count: 2,
                location: SourceLocation::new(4, 27),
            }
        );
        assert!(matches!(
            single("func f() int { return -pair() }\n"),
            ResolutionError::MultiValue { count: 2, .. }
        ));
        assert!(matches!(
            single("func f() int { return pair() }\n"),
            ResolutionError::ReturnCount { expected: 1, found: 2, .. }
        ));
        assert!(matches!(
            single("func f() int { return one(pair(), 1) }\n"),
            ResolutionError::MultiValue { count: 2, .. }
        ));
        assert!(matches!(
            single("func f() {\nif pair() {\n}\n}\n"),
            ResolutionError::MultiValue { .. }
        ));
        assert!(matches!(
            single("func f() {\nfor pair() {\n}\n}\n"),
            ResolutionError::MultiValue { .. }
        ));
        assert!(matches!(
            single("func f() {\nswitch pair() {\n}\n}\n"),
            ResolutionError::MultiValue { .. }
        ));
        assert!(matches!(
            single("func f(x int) {\nswitch x {\ncase pair():\n}\n}\n"),
            ResolutionError::MultiValue { .. }
        ));
        assert!(matches!(
            single("func f() {\nx := pair()\n}\n"),
            ResolutionError::AssignmentCount { targets: 1, values: 2, .. }
        ));
        assert!(matches!(
            single("func f() {\nx, y := pair(), 1\n}\n"),
            ResolutionError::MultiValue { .. }
        ));
        assert!(matches!(
            single("func f() (int, int) { return pair(), 1 }\n"),
            ResolutionError::MultiValue { .. }
        ));

        check(&format!("{}func add(a, b int) int {{ return a + b }}\nfunc f() int {{ return add(pair()) }}\n", pair))
            .unwrap();
    }

    #[test]
    fn test_no_value_call_used_as_value() {
        let source = "package p\nimport \"fmt\"\nfunc f() int { return 1 + fmt.Println() }\n";
        assert!(matches!(
            resolution_error(source),
            ResolutionError::NoValue { .. }
        ));
        assert!(matches!(
            resolution_error("package p\nimport \"fmt\"\nfunc f() {\nfmt.Println(fmt.Print())\n}\n"),
            ResolutionError::NoValue { .. }
        ));
    }
}

use crate::ast::{
    AssignOperator, BinaryOperator, Block, CaseLabel, ElseBranch, Expression, FuncType,
    FunctionLiteral, Import, Parameter, Program, Signature, Statement, SwitchCase, Type,
    UnaryOperator,
};
use crate::error::{ParseResult, SourceLocation, SyntaxError};
use crate::lexer::{Token, TokenType};
use crate::stack::ensure_sufficient_stack;
use std::rc::Rc;

/// Deepest nesting of expressions and blocks a source file may use.
pub const MAX_NESTING: usize = 1000;

/// A parenthesized parameter or result entry before grouping is resolved.
enum ParamEntry {
    /// A lone identifier: a name awaiting a grouped type, or itself a type.
    Bare(String),
    Named(String, Type),
    Unnamed(Type),
}

pub struct Parser {
    tokens: Vec<Token>,
    current: usize,
    depth: usize,
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        Self {
            tokens,
            current: 0,
            depth: 0,
        }
    }

    pub fn parse(&mut self) -> ParseResult<Program> {
        self.skip_semicolons();
        self.expect(&TokenType::Package, "package clause")?;
        let (package, _) = self.expect_identifier("package name")?;
        self.expect_terminator()?;
        self.skip_semicolons();

        let mut imports = Vec::new();
        while self.check(&TokenType::Import) {
            imports.extend(self.parse_import()?);
            self.expect_terminator()?;
            self.skip_semicolons();
        }

        let mut declarations = Vec::new();
        while !self.is_at_end() {
            let declaration = match &self.peek().token_type {
                TokenType::Func => self.parse_function_decl()?,
                TokenType::Var => self.parse_var_decl()?,
                TokenType::Const => self.parse_const_decl()?,
                TokenType::Import => {
                    return Err(SyntaxError::InvalidSyntax {
                        message: "imports must appear before other declarations".to_string(),
                        location: self.peek().location(),
                    })
                }
                _ => return Err(self.error_here("declaration")),
            };
            declarations.push(declaration);
            self.expect_terminator()?;
            self.skip_semicolons();
        }

        Ok(Program {
            package,
            imports,
            declarations,
        })
    }

    fn parse_import(&mut self) -> ParseResult<Vec<Import>> {
        self.advance(); // consume 'import'

        if !self.check(&TokenType::LeftParen) {
            return Ok(vec![self.parse_import_spec()?]);
        }

        self.advance(); // consume '('
        let mut imports = Vec::new();
        self.skip_semicolons();
        while !self.check(&TokenType::RightParen) {
            imports.push(self.parse_import_spec()?);
            if !self.check(&TokenType::RightParen) {
                self.expect(&TokenType::Semicolon, "';' or newline")?;
            }
            self.skip_semicolons();
        }
        self.expect(&TokenType::RightParen, "')'")?;
        Ok(imports)
    }

    fn parse_import_spec(&mut self) -> ParseResult<Import> {
        let location = self.peek().location();
        let alias = match &self.peek().token_type {
            TokenType::Identifier(name) => {
                let name = name.clone();
                self.advance();
                Some(name)
            }
            _ => None,
        };

        match &self.peek().token_type {
            TokenType::String(path) => {
                let path = path.clone();
                self.advance();
                Ok(Import {
                    alias,
                    path,
                    location,
                })
            }
            _ => Err(self.error_here("import path")),
        }
    }

    fn parse_function_decl(&mut self) -> ParseResult<Statement> {
        let location = self.advance().location(); // consume 'func'
        let (name, _) = self.expect_identifier("function name")?;
        let signature = self.parse_signature()?;
        let body = self.parse_block()?;

        Ok(Statement::Function {
            name,
            function: Rc::new(FunctionLiteral {
                signature,
                body: Rc::new(body),
                location,
            }),
        })
    }

    fn parse_function_literal(&mut self) -> ParseResult<Expression> {
        let location = self.advance().location(); // consume 'func'
        let signature = self.parse_signature()?;
        let body = self.parse_block()?;

        Ok(Expression::FunctionLiteral(Rc::new(FunctionLiteral {
            signature,
            body: Rc::new(body),
            location,
        })))
    }

    fn parse_signature(&mut self) -> ParseResult<Signature> {
        let location = self.peek().location();
        let mut params = Vec::new();
        for (name, param_type) in self.parse_parameter_list()? {
            match name {
                Some(name) => params.push(Parameter { name, param_type }),
                None => {
                    return Err(SyntaxError::InvalidSyntax {
                        message: "missing parameter name".to_string(),
                        location,
                    })
                }
            }
        }

        let (results, result_names) = self.parse_results()?;
        Ok(Signature {
            params,
            results,
            result_names,
        })
    }

    /// Result list: nothing, a single type, or a parenthesized (possibly named) list.
    fn parse_results(&mut self) -> ParseResult<(Vec<Type>, Vec<String>)> {
        if self.check(&TokenType::LeftParen) {
            let entries = self.parse_parameter_list()?;
            let names: Vec<String> = entries.iter().filter_map(|(n, _)| n.clone()).collect();
            let types = entries.into_iter().map(|(_, t)| t).collect();
            Ok((types, names))
        } else if self.starts_type() {
            Ok((vec![self.parse_type()?], Vec::new()))
        } else {
            Ok((Vec::new(), Vec::new()))
        }
    }

    /// Parses `(a, b int, c string)` or `(int, string)`.
    ///
    /// A lone identifier is ambiguous until the whole list is seen: it is a
    /// parameter name if any entry in the list is named, a type otherwise.
    fn parse_parameter_list(&mut self) -> ParseResult<Vec<(Option<String>, Type)>> {
        let location = self.expect(&TokenType::LeftParen, "'('")?.location();
        let mut entries = Vec::new();

        while !self.check(&TokenType::RightParen) {
            let lone_name = match (&self.peek().token_type, &self.peek_next().token_type) {
                (TokenType::Identifier(name), TokenType::Comma | TokenType::RightParen) => {
                    Some(name.clone())
                }
                _ => None,
            };

            if let Some(name) = lone_name {
                self.advance();
                entries.push(ParamEntry::Bare(name));
            } else if matches!(self.peek().token_type, TokenType::Identifier(_))
                && matches!(
                    self.peek_next().token_type,
                    TokenType::Identifier(_) | TokenType::Func | TokenType::LeftParen
                )
            {
                let (name, _) = self.expect_identifier("parameter name")?;
                let param_type = self.parse_type()?;
                entries.push(ParamEntry::Named(name, param_type));
            } else {
                entries.push(ParamEntry::Unnamed(self.parse_type()?));
            }

            if self.check(&TokenType::Comma) {
                self.advance();
            } else {
                break;
            }
        }
        self.expect(&TokenType::RightParen, "')'")?;

        let mixed = || SyntaxError::InvalidSyntax {
            message: "mixed named and unnamed parameters".to_string(),
            location,
        };

        if !entries.iter().any(|e| matches!(e, ParamEntry::Named(..))) {
            return Ok(entries
                .into_iter()
                .map(|entry| match entry {
                    ParamEntry::Bare(name) => (None, type_from_name(&name)),
                    ParamEntry::Named(_, t) | ParamEntry::Unnamed(t) => (None, t),
                })
                .collect());
        }

        let mut params = Vec::new();
        let mut pending = Vec::new();
        for entry in entries {
            match entry {
                ParamEntry::Bare(name) => pending.push(name),
                ParamEntry::Named(name, param_type) => {
                    for grouped in pending.drain(..) {
                        params.push((Some(grouped), param_type.clone()));
                    }
                    params.push((Some(name), param_type));
                }
                ParamEntry::Unnamed(_) => return Err(mixed()),
            }
        }
        if !pending.is_empty() {
            return Err(mixed());
        }
        Ok(params)
    }

    fn starts_type(&self) -> bool {
        matches!(
            self.peek().token_type,
            TokenType::Identifier(_) | TokenType::Func
        )
    }

    fn parse_type(&mut self) -> ParseResult<Type> {
        match &self.peek().token_type {
            TokenType::Identifier(name) => {
                let parsed = type_from_name(name);
                self.advance();
                Ok(parsed)
            }
            TokenType::Func => {
                self.advance(); // consume 'func'
                let params = self
                    .parse_parameter_list()?
                    .into_iter()
                    .map(|(_, t)| t)
                    .collect();
                let (results, _) = self.parse_results()?;
                Ok(Type::Func(FuncType { params, results }))
            }
            TokenType::LeftParen => {
                self.advance();
                let inner = self.parse_type()?;
                self.expect(&TokenType::RightParen, "')'")?;
                Ok(inner)
            }
            _ => Err(self.error_here("type")),
        }
    }

    fn parse_block(&mut self) -> ParseResult<Block> {
        self.nested(Self::parse_block_body)
    }

    fn parse_block_body(&mut self) -> ParseResult<Block> {
        self.expect(&TokenType::LeftBrace, "'{'")?;
        let mut statements = Vec::new();

        self.skip_semicolons();
        while !self.check(&TokenType::RightBrace) && !self.is_at_end() {
            statements.push(self.parse_statement()?);
            if !self.check(&TokenType::RightBrace) {
                self.expect(&TokenType::Semicolon, "';' or newline")?;
            }
            self.skip_semicolons();
        }

        self.expect(&TokenType::RightBrace, "'}'")?;
        Ok(Block { statements })
    }

    fn parse_statement(&mut self) -> ParseResult<Statement> {
        match &self.peek().token_type {
            TokenType::Var => self.parse_var_decl(),
            TokenType::Const => self.parse_const_decl(),
            TokenType::If => self.parse_if_statement(),
            TokenType::For => self.parse_for_loop(),
            TokenType::Switch => self.parse_switch(),
            TokenType::Return => self.parse_return(),
            TokenType::Break => Ok(Statement::Break(self.advance().location())),
            TokenType::Continue => Ok(Statement::Continue(self.advance().location())),
            TokenType::LeftBrace => Ok(Statement::Block(self.parse_block()?)),
            _ => {
                let location = self.peek().location();
                let statement = self.parse_simple_statement()?;
                if let Statement::Expression(expr) = &statement {
                    if !expr.is_call() {
                        return Err(SyntaxError::InvalidSyntax {
                            message: "expression evaluated but not used".to_string(),
                            location,
                        });
                    }
                }
                Ok(statement)
            }
        }
    }

    /// Expression, assignment, short declaration, or inc/dec statement.
    fn parse_simple_statement(&mut self) -> ParseResult<Statement> {
        let location = self.peek().location();
        let mut exprs = self.parse_expression_list()?;

        let compound = compound_operator(&self.peek().token_type);
        match &self.peek().token_type {
            TokenType::ColonEqual => {
                let names = self.assignable_names(exprs, ":=")?;
                self.advance();
                let values = self.parse_expression_list()?;
                Ok(Statement::ShortVarDecl {
                    names,
                    values,
                    location,
                })
            }
            TokenType::Equal => {
                let targets = self.assignable_names(exprs, "=")?;
                self.advance();
                let values = self.parse_expression_list()?;
                Ok(Statement::Assignment {
                    targets,
                    operator: AssignOperator::Assign,
                    values,
                    location,
                })
            }
            TokenType::PlusPlus | TokenType::MinusMinus => {
                let increment = self.check(&TokenType::PlusPlus);
                let target = self.single_target(exprs, if increment { "++" } else { "--" })?;
                self.advance();
                Ok(Statement::IncDec {
                    target,
                    increment,
                    location,
                })
            }
            _ if compound.is_some() => {
                let symbol = self.peek().lexeme.clone();
                let target = self.single_target(exprs, &symbol)?;
                self.advance();
                let value = self.parse_expression()?;
                Ok(Statement::Assignment {
                    targets: vec![target],
                    operator: compound.map_or(AssignOperator::Assign, AssignOperator::Compound),
                    values: vec![value],
                    location,
                })
            }
            _ if exprs.len() == 1 => Ok(Statement::Expression(exprs.remove(0))),
            _ => Err(self.error_here("':=' or '=' or ','")),
        }
    }

    fn assignable_names(&self, exprs: Vec<Expression>, operator: &str) -> ParseResult<Vec<String>> {
        exprs
            .into_iter()
            .map(|expr| match expr {
                Expression::Identifier { name, .. } => Ok(name),
                other => Err(SyntaxError::InvalidSyntax {
                    message: format!("non-name on left side of {}", operator),
                    location: other.location().unwrap_or_else(|| self.peek().location()),
                }),
            })
            .collect()
    }

    fn single_target(&self, exprs: Vec<Expression>, operator: &str) -> ParseResult<String> {
        if exprs.len() != 1 {
            return Err(SyntaxError::InvalidSyntax {
                message: format!("unexpected {}, expected := or = or comma", operator),
                location: self.peek().location(),
            });
        }
        let mut names = self.assignable_names(exprs, operator)?;
        Ok(names.remove(0))
    }

    fn parse_var_decl(&mut self) -> ParseResult<Statement> {
        let location = self.advance().location(); // consume 'var'
        let (names, type_annotation, values) = self.parse_value_spec("var")?;

        if type_annotation.is_none() && values.is_empty() {
            return Err(self.error_here("type or '='"));
        }

        Ok(Statement::VarDecl {
            names,
            type_annotation,
            values,
            location,
        })
    }

    fn parse_const_decl(&mut self) -> ParseResult<Statement> {
        let location = self.advance().location(); // consume 'const'
        let (names, type_annotation, values) = self.parse_value_spec("const")?;

        if values.is_empty() {
            return Err(SyntaxError::InvalidSyntax {
                message: "missing init expr for const declaration".to_string(),
                location,
            });
        }

        Ok(Statement::ConstDecl {
            names,
            type_annotation,
            values,
            location,
        })
    }

    fn parse_value_spec(
        &mut self,
        keyword: &str,
    ) -> ParseResult<(Vec<String>, Option<Type>, Vec<Expression>)> {
        let mut names = vec![self.expect_identifier(&format!("name after '{}'", keyword))?.0];
        while self.check(&TokenType::Comma) {
            self.advance();
            names.push(self.expect_identifier("name")?.0);
        }

        let type_annotation = if !self.check(&TokenType::Equal) && self.starts_type() {
            Some(self.parse_type()?)
        } else {
            None
        };

        let values = if self.check(&TokenType::Equal) {
            self.advance(); // consume '='
            self.parse_expression_list()?
        } else {
            Vec::new()
        };

        Ok((names, type_annotation, values))
    }

    fn parse_if_statement(&mut self) -> ParseResult<Statement> {
        let location = self.advance().location(); // consume 'if'

        let header_location = self.peek().location();
        let first = self.parse_simple_statement()?;
        let (init, condition) = if self.check_explicit_semicolon() {
            self.advance();
            (Some(Box::new(first)), self.parse_expression()?)
        } else {
            (None, self.expect_condition(first, header_location)?)
        };

        let then_body = self.parse_block()?;

        let else_body = if self.check(&TokenType::Else) {
            self.advance(); // consume 'else'
            match &self.peek().token_type {
                TokenType::If => Some(ElseBranch::If(Box::new(self.parse_if_statement()?))),
                TokenType::LeftBrace => Some(ElseBranch::Block(self.parse_block()?)),
                _ => return Err(self.error_here("if statement or block")),
            }
        } else {
            None
        };

        Ok(Statement::If {
            init,
            condition,
            then_body,
            else_body,
            location,
        })
    }

    fn parse_for_loop(&mut self) -> ParseResult<Statement> {
        let location = self.advance().location(); // consume 'for'

        let mut init = None;
        let mut condition = None;
        let mut post = None;

        if !self.check(&TokenType::LeftBrace) {
            let header_location = self.peek().location();
            let first = if self.check(&TokenType::Semicolon) {
                None
            } else {
                Some(self.parse_simple_statement()?)
            };

            match first {
                Some(statement) if !self.check(&TokenType::Semicolon) => {
                    condition = Some(self.expect_condition(statement, header_location)?);
                }
                first => {
                    // for init; cond; post
                    self.advance(); // consume ';'
                    init = first.map(Box::new);
                    if !self.check(&TokenType::Semicolon) {
                        condition = Some(self.parse_expression()?);
                    }
                    self.expect(&TokenType::Semicolon, "';'")?;
                    if !self.check(&TokenType::LeftBrace) {
                        let post_location = self.peek().location();
                        let statement = self.parse_simple_statement()?;
                        if matches!(statement, Statement::ShortVarDecl { .. }) {
                            return Err(SyntaxError::InvalidSyntax {
                                message: "cannot declare in post statement of for loop"
                                    .to_string(),
                                location: post_location,
                            });
                        }
                        post = Some(Box::new(statement));
                    }
                }
            }
        }

        let body = self.parse_block()?;

        Ok(Statement::For {
            init,
            condition,
            post,
            body,
            location,
        })
    }

    fn parse_switch(&mut self) -> ParseResult<Statement> {
        let location = self.advance().location(); // consume 'switch'

        let mut init = None;
        let mut tag = None;
        if !self.check(&TokenType::LeftBrace) {
            let header_location = self.peek().location();
            let first = if self.check(&TokenType::Semicolon) {
                None
            } else {
                Some(self.parse_simple_statement()?)
            };

            match first {
                Some(statement) if !self.check(&TokenType::Semicolon) => {
                    tag = Some(self.expect_condition(statement, header_location)?);
                }
                first => {
                    self.advance(); // consume ';'
                    init = first.map(Box::new);
                    if !self.check(&TokenType::LeftBrace) {
                        tag = Some(self.parse_expression()?);
                    }
                }
            }
        }

        self.expect(&TokenType::LeftBrace, "'{'")?;
        self.skip_semicolons();

        let mut cases = Vec::new();
        let mut saw_default = false;
        while !self.check(&TokenType::RightBrace) {
            let case_location = self.peek().location();
            let label = match &self.peek().token_type {
                TokenType::Case => {
                    self.advance();
                    CaseLabel::Values(self.parse_expression_list()?)
                }
                TokenType::Default => {
                    if saw_default {
                        return Err(SyntaxError::InvalidSyntax {
                            message: "multiple defaults in switch".to_string(),
                            location: case_location,
                        });
                    }
                    saw_default = true;
                    self.advance();
                    CaseLabel::Default
                }
                _ => return Err(self.error_here("case or default or '}'")),
            };
            self.expect(&TokenType::Colon, "':'")?;
            self.skip_semicolons();

            let mut body = Vec::new();
            while !self.check(&TokenType::Case)
                && !self.check(&TokenType::Default)
                && !self.check(&TokenType::RightBrace)
                && !self.is_at_end()
            {
                body.push(self.parse_statement()?);
                if !self.check(&TokenType::RightBrace) {
                    self.expect(&TokenType::Semicolon, "';' or newline")?;
                }
                self.skip_semicolons();
            }

            cases.push(SwitchCase {
                label,
                body,
                location: case_location,
            });
        }
        self.expect(&TokenType::RightBrace, "'}'")?;

        Ok(Statement::Switch {
            init,
            tag,
            cases,
            location,
        })
    }

    fn parse_return(&mut self) -> ParseResult<Statement> {
        let location = self.advance().location(); // consume 'return'

        let values = if self.check(&TokenType::Semicolon) || self.check(&TokenType::RightBrace) {
            Vec::new()
        } else {
            self.parse_expression_list()?
        };

        Ok(Statement::Return { values, location })
    }

    fn expect_condition(
        &self,
        statement: Statement,
        location: SourceLocation,
    ) -> ParseResult<Expression> {
        match statement {
            Statement::Expression(expr) => Ok(expr),
            _ => Err(SyntaxError::InvalidSyntax {
                message: "cannot use statement as value".to_string(),
                location,
            }),
        }
    }

    fn parse_expression_list(&mut self) -> ParseResult<Vec<Expression>> {
        let mut exprs = vec![self.parse_expression()?];
        while self.check(&TokenType::Comma) {
            self.advance();
            exprs.push(self.parse_expression()?);
        }
        Ok(exprs)
    }

    pub fn parse_expression(&mut self) -> ParseResult<Expression> {
        self.nested(Self::parse_logical_or)
    }

    fn parse_logical_or(&mut self) -> ParseResult<Expression> {
        let mut expr = self.parse_logical_and()?;

        while self.check(&TokenType::OrOr) {
            let location = self.advance().location(); // consume '||'
            let right = self.parse_logical_and()?;
            expr = binary(expr, BinaryOperator::Or, right, location);
        }

        Ok(expr)
    }

    fn parse_logical_and(&mut self) -> ParseResult<Expression> {
        let mut expr = self.parse_comparison()?;

        while self.check(&TokenType::AndAnd) {
            let location = self.advance().location(); // consume '&&'
            let right = self.parse_comparison()?;
            expr = binary(expr, BinaryOperator::And, right, location);
        }

        Ok(expr)
    }

    fn parse_comparison(&mut self) -> ParseResult<Expression> {
        let mut expr = self.parse_additive()?;

        loop {
            let operator = match self.peek().token_type {
                TokenType::EqualEqual => BinaryOperator::Equal,
                TokenType::NotEqual => BinaryOperator::NotEqual,
                TokenType::Less => BinaryOperator::Less,
                TokenType::LessEqual => BinaryOperator::LessEqual,
                TokenType::Greater => BinaryOperator::Greater,
                TokenType::GreaterEqual => BinaryOperator::GreaterEqual,
                _ => break,
            };
            let location = self.advance().location();
            let right = self.parse_additive()?;
            expr = binary(expr, operator, right, location);
        }

        Ok(expr)
    }

    fn parse_additive(&mut self) -> ParseResult<Expression> {
        let mut expr = self.parse_multiplicative()?;

        loop {
            let operator = match self.peek().token_type {
                TokenType::Plus => BinaryOperator::Add,
                TokenType::Minus => BinaryOperator::Subtract,
                TokenType::Pipe => BinaryOperator::BitOr,
                TokenType::Caret => BinaryOperator::BitXor,
                _ => break,
            };
            let location = self.advance().location();
            let right = self.parse_multiplicative()?;
            expr = binary(expr, operator, right, location);
        }

        Ok(expr)
    }

    fn parse_multiplicative(&mut self) -> ParseResult<Expression> {
        let mut expr = self.parse_unary()?;

        loop {
            let operator = match self.peek().token_type {
                TokenType::Star => BinaryOperator::Multiply,
                TokenType::Slash => BinaryOperator::Divide,
                TokenType::Percent => BinaryOperator::Modulo,
                TokenType::ShiftLeft => BinaryOperator::ShiftLeft,
                TokenType::ShiftRight => BinaryOperator::ShiftRight,
                TokenType::Ampersand => BinaryOperator::BitAnd,
                TokenType::AndNot => BinaryOperator::BitClear,
                _ => break,
            };
            let location = self.advance().location();
            let right = self.parse_unary()?;
            expr = binary(expr, operator, right, location);
        }

        Ok(expr)
    }

    fn parse_unary(&mut self) -> ParseResult<Expression> {
        let operator = match self.peek().token_type {
            TokenType::Minus => UnaryOperator::Negate,
            TokenType::Plus => UnaryOperator::Plus,
            TokenType::Bang => UnaryOperator::Not,
            TokenType::Caret => UnaryOperator::BitNot,
            _ => return self.parse_postfix(),
        };
        let location = self.advance().location();

        // The magnitude of the smallest int only fits once negated.
        if operator == UnaryOperator::Negate
            && self.peek().token_type == TokenType::Integer(i64::MIN.unsigned_abs())
        {
            self.advance();
            return Ok(Expression::IntegerLiteral(i64::MIN));
        }

        let operand = self.nested(Self::parse_unary)?;

        Ok(Expression::UnaryOp {
            operator,
            operand: Box::new(operand),
            location,
        })
    }

    fn parse_postfix(&mut self) -> ParseResult<Expression> {
        let mut expr = self.parse_primary()?;

        while self.check(&TokenType::LeftParen) {
            let location = self.advance().location(); // consume '('
            let mut args = Vec::new();
            while !self.check(&TokenType::RightParen) {
                args.push(self.parse_expression()?);
                if self.check(&TokenType::Comma) {
                    self.advance();
                } else {
                    break;
                }
            }
            self.expect(&TokenType::RightParen, "')' after arguments")?;

            expr = Expression::Call {
                callee: Box::new(expr),
                args,
                location,
            };
        }

        Ok(expr)
    }

    fn parse_primary(&mut self) -> ParseResult<Expression> {
        let token = self.peek().clone();
        let location = token.location();

        match token.token_type {
            TokenType::Integer(value) => {
                self.advance();
                let value = i64::try_from(value).map_err(|_| SyntaxError::InvalidSyntax {
                    message: format!("constant {} overflows int", value),
                    location,
                })?;
                Ok(Expression::IntegerLiteral(value))
            }
            TokenType::Float(value) => {
                self.advance();
                Ok(Expression::FloatLiteral(value))
            }
            TokenType::String(value) => {
                self.advance();
                Ok(Expression::StringLiteral(value))
            }
            TokenType::Identifier(name) => {
                self.advance();
                if self.check(&TokenType::Dot) {
                    self.advance(); // consume '.'
                    let (member, _) = self.expect_identifier("name after '.'")?;
                    Ok(Expression::Qualified {
                        package: name,
                        name: member,
                        location,
                    })
                } else {
                    Ok(Expression::Identifier { name, location })
                }
            }
            TokenType::LeftParen => {
                self.advance(); // consume '('
                let expr = self.parse_expression()?;
                self.expect(&TokenType::RightParen, "')' after expression")?;
                Ok(expr)
            }
            TokenType::Func => self.parse_function_literal(),
            _ => Err(self.error_here("expression")),
        }
    }

    fn expect(&mut self, token_type: &TokenType, expected: &str) -> ParseResult<&Token> {
        if self.check(token_type) {
            Ok(self.advance())
        } else {
            Err(self.error_here(expected))
        }
    }

    fn expect_identifier(&mut self, expected: &str) -> ParseResult<(String, SourceLocation)> {
        match &self.peek().token_type {
            TokenType::Identifier(name) => {
                let name = name.clone();
                let location = self.advance().location();
                Ok((name, location))
            }
            _ => Err(self.error_here(expected)),
        }
    }

    /// Statement end: a semicolon, or nothing before a closing brace or end of file.
    fn expect_terminator(&mut self) -> ParseResult<()> {
        if self.check(&TokenType::Semicolon) {
            self.advance();
            Ok(())
        } else if self.check(&TokenType::RightBrace) || self.is_at_end() {
            Ok(())
        } else {
            Err(self.error_here("';' or newline"))
        }
    }

    /// Runs one level of recursive descent, refusing to go past `MAX_NESTING`.
    fn nested<T>(&mut self, parse: impl FnOnce(&mut Self) -> ParseResult<T>) -> ParseResult<T> {
        if self.depth >= MAX_NESTING {
            return Err(SyntaxError::InvalidSyntax {
                message: format!("nesting exceeds {} levels", MAX_NESTING),
                location: self.peek().location(),
            });
        }

        self.depth += 1;
        let result = ensure_sufficient_stack(|| parse(self));
        self.depth -= 1;
        result
    }

    fn error_here(&self, expected: &str) -> SyntaxError {
        let token = self.peek();
        if token.token_type == TokenType::Eof {
            SyntaxError::UnexpectedEof {
                expected: expected.to_string(),
                location: token.location(),
            }
        } else {
            SyntaxError::UnexpectedToken {
                expected: expected.to_string(),
                found: token.describe(),
                location: token.location(),
            }
        }
    }

    fn skip_semicolons(&mut self) {
        while self.check(&TokenType::Semicolon) {
            self.advance();
        }
    }

    fn check(&self, token_type: &TokenType) -> bool {
        &self.peek().token_type == token_type
    }

    fn check_explicit_semicolon(&self) -> bool {
        self.check(&TokenType::Semicolon) && !self.peek().is_implicit()
    }

    fn peek(&self) -> &Token {
        &self.tokens[self.current.min(self.tokens.len() - 1)]
    }

    fn peek_next(&self) -> &Token {
        &self.tokens[(self.current + 1).min(self.tokens.len() - 1)]
    }

    fn advance(&mut self) -> &Token {
        if !self.is_at_end() {
            self.current += 1;
        }
        &self.tokens[self.current - 1]
    }

    fn is_at_end(&self) -> bool {
        self.peek().token_type == TokenType::Eof
    }
}

fn binary(
    left: Expression,
    operator: BinaryOperator,
    right: Expression,
    location: SourceLocation,
) -> Expression {
    Expression::BinaryOp {
        left: Box::new(left),
        operator,
        right: Box::new(right),
        location,
    }
}

fn compound_operator(token_type: &TokenType) -> Option<BinaryOperator> {
    let operator = match token_type {
        TokenType::PlusEqual => BinaryOperator::Add,
        TokenType::MinusEqual => BinaryOperator::Subtract,
        TokenType::StarEqual => BinaryOperator::Multiply,
        TokenType::SlashEqual => BinaryOperator::Divide,
        TokenType::PercentEqual => BinaryOperator::Modulo,
        TokenType::AmpersandEqual => BinaryOperator::BitAnd,
        TokenType::PipeEqual => BinaryOperator::BitOr,
        TokenType::CaretEqual => BinaryOperator::BitXor,
        TokenType::AndNotEqual => BinaryOperator::BitClear,
        TokenType::ShiftLeftEqual => BinaryOperator::ShiftLeft,
        TokenType::ShiftRightEqual => BinaryOperator::ShiftRight,
        _ => return None,
    };
    Some(operator)
}

fn type_from_name(name: &str) -> Type {
    match name {
        "int" => Type::Int,
        "float32" | "float64" => Type::Float,
        "string" => Type::String,
        "bool" => Type::Bool,
        _ => Type::Named(name.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::Lexer;

    fn parse_source(input: &str) -> ParseResult<Program> {
        let tokens = Lexer::new(input).tokenize().unwrap();
        Parser::new(tokens).parse()
    }

    /// Parses `body` as the statements of `func f()`.
    fn parse_body(body: &str) -> Vec<Statement> {
        let source = format!("package p\nfunc f() {{\n{}\n}}\n", body);
        let program = parse_source(&source).unwrap();
        match program.declarations.into_iter().next() {
            Some(Statement::Function { function, .. }) => function.body.statements.clone(),
            other => panic!("Expected function, got {:?}", other),
        }
    }

    fn parse_expression_from_string(input: &str) -> Expression {
        let tokens = Lexer::new(input).tokenize().unwrap();
        Parser::new(tokens).parse_expression().unwrap()
    }

    #[test]
    fn test_package_and_imports() {
        let program =
            parse_source("package main\n\nimport \"fmt\"\nimport (\n\t\"a\"\n\tb \"lib/b\"\n)\n")
                .unwrap();
        assert_eq!(program.package, "main");
        let paths: Vec<_> = program.imports.iter().map(|i| i.path.as_str()).collect();
        assert_eq!(paths, vec!["fmt", "a", "lib/b"]);
        assert_eq!(program.imports[2].alias.as_deref(), Some("b"));
    }

    #[test]
    fn test_function_signatures() {
        let program = parse_source(
            "package p\n\
             func Second(a, b int) int { return b }\n\
             func Pair() (int, string) { return 1, \"x\" }\n\
             func Named() (x int, y int) { return }\n\
             func ReturnSwap() func(int, int) (int, int) { return nil }\n",
        )
        .unwrap();

        let signatures: Vec<_> = program
            .declarations
            .iter()
            .map(|d| match d {
                Statement::Function { function, .. } => function.signature.clone(),
                _ => panic!("Expected function"),
            })
            .collect();

        assert_eq!(signatures[0].params.len(), 2);
        assert_eq!(signatures[0].params[0].name, "a");
        assert_eq!(signatures[0].params[0].param_type, Type::Int);
        assert_eq!(signatures[0].results, vec![Type::Int]);

        assert_eq!(signatures[1].results, vec![Type::Int, Type::String]);
        assert!(signatures[1].result_names.is_empty());

        assert_eq!(signatures[2].result_names, vec!["x", "y"]);

        assert_eq!(
            signatures[3].results,
            vec![Type::Func(FuncType {
                params: vec![Type::Int, Type::Int],
                results: vec![Type::Int, Type::Int],
            })]
        );
    }

    #[test]
    fn test_three_for_forms() {
        let statements = parse_body(
            "for i := 0; i < 10; i += 1 {\n}\nfor sum < 1000 {\n}\nfor {\nreturn\n}",
        );
        match &statements[0] {
            Statement::For {
                init,
                condition,
                post,
                ..
            } => {
                assert!(matches!(init.as_deref(), Some(Statement::ShortVarDecl { .. })));
                assert!(condition.is_some());
                assert!(matches!(
                    post.as_deref(),
                    Some(Statement::Assignment {
                        operator: AssignOperator::Compound(BinaryOperator::Add),
                        ..
                    })
                ));
            }
            other => panic!("Expected for, got {:?}", other),
        }
        assert!(matches!(
            &statements[1],
            Statement::For { init: None, condition: Some(_), post: None, .. }
        ));
        assert!(matches!(
            &statements[2],
            Statement::For { init: None, condition: None, post: None, .. }
        ));
    }

    #[test]
    fn test_if_with_initializer_and_else_if() {
        let statements = parse_body(
            "if x := 10; x < 0 {\nreturn\n} else if x > 5 {\nreturn\n} else {\nreturn\n}",
        );
        match &statements[0] {
            Statement::If {
                init, else_body, ..
            } => {
                assert!(matches!(init.as_deref(), Some(Statement::ShortVarDecl { .. })));
                match else_body {
                    Some(ElseBranch::If(nested)) => assert!(matches!(
                        nested.as_ref(),
                        Statement::If {
                            else_body: Some(ElseBranch::Block(_)),
                            ..
                        }
                    )),
                    other => panic!("Expected else-if, got {:?}", other),
                }
            }
            other => panic!("Expected if, got {:?}", other),
        }
    }

    #[test]
    fn test_switch_forms() {
        let statements = parse_body(
            "switch x {\ncase 1, 2:\nreturn\ndefault:\nreturn\n}\nswitch {\ndefault:\ncase x < 0:\n}",
        );
        match &statements[0] {
            Statement::Switch { tag, cases, .. } => {
                assert!(tag.is_some());
                assert_eq!(cases.len(), 2);
                assert!(matches!(&cases[0].label, CaseLabel::Values(v) if v.len() == 2));
                assert_eq!(cases[1].label, CaseLabel::Default);
            }
            other => panic!("Expected switch, got {:?}", other),
        }
        match &statements[1] {
            Statement::Switch { tag, cases, .. } => {
                assert!(tag.is_none());
                assert_eq!(cases[0].label, CaseLabel::Default);
                assert!(cases[1].body.is_empty());
            }
            other => panic!("Expected switch, got {:?}", other),
        }
    }

    #[test]
    fn test_declaration_forms() {
        let statements = parse_body("var a int\nvar b = 1\nc := 2\nc, d := 3, 4\nconst e = 5");
        assert!(matches!(
            &statements[0],
            Statement::VarDecl { type_annotation: Some(Type::Int), values, .. } if values.is_empty()
        ));
        assert!(matches!(
            &statements[1],
            Statement::VarDecl { type_annotation: None, values, .. } if values.len() == 1
        ));
        assert!(matches!(&statements[2], Statement::ShortVarDecl { names, .. } if names == &["c"]));
        assert!(
            matches!(&statements[3], Statement::ShortVarDecl { names, values, .. } if names.len() == 2 && values.len() == 2)
        );
        assert!(matches!(&statements[4], Statement::ConstDecl { .. }));
    }

    #[test]
    fn test_inc_dec_statement() {
        let statements = parse_body("times --;\ni++");
        assert!(matches!(
            &statements[0],
            Statement::IncDec { target, increment: false, .. } if target == "times"
        ));
        assert!(matches!(&statements[1], Statement::IncDec { increment: true, .. }));
    }

    #[test]
    fn test_operator_precedence() {
        // a + b * c == d || e  =>  ((a + (b * c)) == d) || e
        match parse_expression_from_string("a + b * c == d || e") {
            Expression::BinaryOp {
                left,
                operator: BinaryOperator::Or,
                ..
            } => match *left {
                Expression::BinaryOp {
                    left,
                    operator: BinaryOperator::Equal,
                    ..
                } => match *left {
                    Expression::BinaryOp {
                        operator: BinaryOperator::Add,
                        right,
                        ..
                    } => assert!(matches!(
                        *right,
                        Expression::BinaryOp {
                            operator: BinaryOperator::Multiply,
                            ..
                        }
                    )),
                    other => panic!("Expected addition, got {:?}", other),
                },
                other => panic!("Expected comparison, got {:?}", other),
            },
            other => panic!("Expected ||, got {:?}", other),
        }
    }

    #[test]
    fn test_call_of_call_and_qualified_names() {
        match parse_expression_from_string("testcase.ReturnSwap()(1, 2)") {
            Expression::Call { callee, args, .. } => {
                assert_eq!(args.len(), 2);
                match *callee {
                    Expression::Call { callee, args, .. } => {
                        assert!(args.is_empty());
                        assert!(matches!(
                            *callee,
                            Expression::Qualified { ref package, ref name, .. }
                                if package == "testcase" && name == "ReturnSwap"
                        ));
                    }
                    other => panic!("Expected inner call, got {:?}", other),
                }
            }
            other => panic!("Expected call, got {:?}", other),
        }
    }

    #[test]
    fn test_function_literal_expression() {
        match parse_expression_from_string("func(a, b int) (int, int) { return b, a }") {
            Expression::FunctionLiteral(function) => {
                assert_eq!(function.signature.params.len(), 2);
                assert_eq!(function.signature.results.len(), 2);
                assert_eq!(function.body.statements.len(), 1);
            }
            other => panic!("Expected function literal, got {:?}", other),
        }
    }

    #[test]
    fn test_syntax_errors_report_position() {
        let err = parse_source("package p\nfunc f() {\nif x {\n}\n").unwrap_err();
        assert!(matches!(err, SyntaxError::UnexpectedEof { .. }));

        let err = parse_source("package p\nfunc f() {\nx := \n}\n").unwrap_err();
        match err {
            SyntaxError::UnexpectedToken {
                expected,
                found,
                location,
            } => {
                assert_eq!(expected, "expression");
                assert_eq!(found, "'}'");
                assert_eq!(location, SourceLocation::new(4, 1));
            }
            other => panic!("Expected unexpected token, got {:?}", other),
        }

        assert!(parse_source("package p\nfunc f() {\nx + 1\n}\n").is_err());
        assert!(parse_source("func f() {}").is_err());
    }

    #[test]
    fn test_deep_nesting_is_rejected() {
        let too_deep = |source: String| {
            matches!(
                parse_source(&source),
                Err(SyntaxError::InvalidSyntax { message, .. }) if message == "nesting exceeds 1000 levels"
            )
        };

        assert!(too_deep(format!(
            "package p\nvar x = {}1{}\n",
            "(".repeat(200_000),
            ")".repeat(200_000)
        )));
        assert!(too_deep(format!("package p\nvar x = {}1\n", "- ".repeat(5000))));
        assert!(too_deep(format!(
            "package p\nfunc f() {}{}\n",
            "{".repeat(5000),
            "}".repeat(5000)
        )));

        parse_source(&format!(
            "package p\nvar x = {}1{}\n",
            "(".repeat(200),
            ")".repeat(200)
        ))
        .unwrap();
    }

    #[test]
    fn test_smallest_int_literal() {
        assert_eq!(
            parse_expression_from_string("-9223372036854775808"),
            Expression::IntegerLiteral(i64::MIN)
        );
        assert!(matches!(
            parse_source("package p\nvar x = 9223372036854775808\n"),
            Err(SyntaxError::InvalidSyntax { message, .. })
                if message == "constant 9223372036854775808 overflows int"
        ));
    }

    #[test]
    fn test_post_statement_cannot_declare() {
        let err = parse_source("package p\nfunc f() {\nfor i := 0; i < 3; j := 1 {\n}\n}\n")
            .unwrap_err();
        assert!(matches!(err, SyntaxError::InvalidSyntax { .. }));
    }
}

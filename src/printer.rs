use crate::ast::{
    AssignOperator, Block, CaseLabel, ElseBranch, Expression, FunctionLiteral, Import, Program,
    Signature, Statement, SwitchCase, Type,
};

/// Renders a parsed program back to canonical source text.
///
/// Output uses tab indentation and one declaration per line. Parentheses are
/// emitted only where operator precedence requires them, so printing the
/// re-parsed output yields the same text again.
pub struct Printer {
    output: String,
    indent: usize,
}

impl Printer {
    pub fn new() -> Self {
        Self {
            output: String::new(),
            indent: 0,
        }
    }

    pub fn print_program(mut self, program: &Program) -> String {
        self.line(&format!("package {}", program.package));

        match program.imports.as_slice() {
            [] => {}
            [single] => {
                self.output.push('\n');
                self.line(&format!("import {}", import_spec(single)));
            }
            many => {
                self.output.push('\n');
                self.line("import (");
                self.indent += 1;
                for import in many {
                    self.line(&import_spec(import));
                }
                self.indent -= 1;
                self.line(")");
            }
        }

        for declaration in &program.declarations {
            self.output.push('\n');
            self.statement(declaration);
        }
        self.output
    }

    fn line(&mut self, text: &str) {
        for _ in 0..self.indent {
            self.output.push('\t');
        }
        self.output.push_str(text);
        self.output.push('\n');
    }

    /// Writes `header {`, the indented statements and the closing brace.
    fn braced(&mut self, header: &str, statements: &[Statement], closing: &str) {
        let opening = format!("{} {{", header);
        self.line(opening.trim_start());
        self.indent += 1;
        for statement in statements {
            self.statement(statement);
        }
        self.indent -= 1;
        self.line(closing);
    }

    fn statement(&mut self, statement: &Statement) {
        match statement {
            Statement::Block(block) => self.braced("", &block.statements, "}"),
            Statement::If { .. } => self.if_chain(statement, "if"),
            Statement::For {
                init,
                condition,
                post,
                body,
                ..
            } => {
                let header = match (init, condition, post) {
                    (None, None, None) => "for".to_string(),
                    (None, Some(condition), None) => format!("for {}", self.expression(condition)),
                    _ => format!(
                        "for {}; {}; {}",
                        init.as_deref().map(|s| self.simple(s)).unwrap_or_default(),
                        condition
                            .as_ref()
                            .map(|c| self.expression(c))
                            .unwrap_or_default(),
                        post.as_deref().map(|s| self.simple(s)).unwrap_or_default(),
                    )
                    .trim_end()
                    .to_string(),
                };
                self.braced(&header, &body.statements, "}");
            }
            Statement::Switch {
                init, tag, cases, ..
            } => {
                let mut header = "switch".to_string();
                if let Some(init) = init {
                    header.push(' ');
                    header.push_str(&self.simple(init));
                    header.push(';');
                }
                if let Some(tag) = tag {
                    header.push(' ');
                    header.push_str(&self.expression(tag));
                }
                self.line(&format!("{} {{", header));
                for case in cases {
                    self.switch_case(case);
                }
                self.line("}");
            }
            Statement::Function { name, function } => {
                let header = format!("func {}{}", name, signature(&function.signature));
                self.braced(&header, &function.body.statements, "}");
            }
            _ => {
                let text = self.simple(statement);
                self.line(&text);
            }
        }
    }

    fn if_chain(&mut self, statement: &Statement, keyword: &str) {
        if let Statement::If {
            init,
            condition,
            then_body,
            else_body,
            ..
        } = statement
        {
            let header = match init {
                Some(init) => format!(
                    "{} {}; {}",
                    keyword,
                    self.simple(init),
                    self.expression(condition)
                ),
                None => format!("{} {}", keyword, self.expression(condition)),
            };

            match else_body {
                None => self.braced(&header, &then_body.statements, "}"),
                Some(ElseBranch::Block(block)) => {
                    self.braced(&header, &then_body.statements, "} else {");
                    self.body(block);
                    self.line("}");
                }
                Some(ElseBranch::If(nested)) => {
                    self.line(&format!("{} {{", header));
                    self.body(then_body);
                    // The closing brace shares a line with the next `else if`.
                    let mut rest = Printer {
                        output: String::new(),
                        indent: self.indent,
                    };
                    rest.if_chain(nested, "} else if");
                    self.output.push_str(&rest.output);
                }
            }
        }
    }

    fn body(&mut self, block: &Block) {
        self.indent += 1;
        for statement in &block.statements {
            self.statement(statement);
        }
        self.indent -= 1;
    }

    fn switch_case(&mut self, case: &SwitchCase) {
        let label = match &case.label {
            CaseLabel::Default => "default:".to_string(),
            CaseLabel::Values(values) => format!("case {}:", self.expressions(values)),
        };
        self.line(&label);
        self.indent += 1;
        for statement in &case.body {
            self.statement(statement);
        }
        self.indent -= 1;
    }

    /// Statements that fit on one line, also used in `if`, `for` and `switch` headers.
    fn simple(&self, statement: &Statement) -> String {
        match statement {
            Statement::VarDecl {
                names,
                type_annotation,
                values,
                ..
            } => self.value_spec("var", names, type_annotation.as_ref(), values),
            Statement::ConstDecl {
                names,
                type_annotation,
                values,
                ..
            } => self.value_spec("const", names, type_annotation.as_ref(), values),
            Statement::ShortVarDecl { names, values, .. } => {
                format!("{} := {}", names.join(", "), self.expressions(values))
            }
            Statement::Assignment {
                targets,
                operator,
                values,
                ..
            } => {
                let operator = match operator {
                    AssignOperator::Assign => "=".to_string(),
                    AssignOperator::Compound(op) => format!("{}=", op.symbol()),
                };
                format!(
                    "{} {} {}",
                    targets.join(", "),
                    operator,
                    self.expressions(values)
                )
            }
            Statement::IncDec {
                target, increment, ..
            } => format!("{}{}", target, if *increment { "++" } else { "--" }),
            Statement::Return { values, .. } if values.is_empty() => "return".to_string(),
            Statement::Return { values, .. } => format!("return {}", self.expressions(values)),
            Statement::Break(_) => "break".to_string(),
            Statement::Continue(_) => "continue".to_string(),
            Statement::Expression(expr) => self.expression(expr),
            compound => {
                let mut nested = Printer {
                    output: String::new(),
                    indent: self.indent,
                };
                nested.statement(compound);
                nested.output.trim().to_string()
            }
        }
    }

    fn value_spec(
        &self,
        keyword: &str,
        names: &[String],
        type_annotation: Option<&Type>,
        values: &[Expression],
    ) -> String {
        let mut text = format!("{} {}", keyword, names.join(", "));
        if let Some(declared) = type_annotation {
            text.push(' ');
            text.push_str(&declared.to_string());
        }
        if !values.is_empty() {
            text.push_str(" = ");
            text.push_str(&self.expressions(values));
        }
        text
    }

    fn expressions(&self, exprs: &[Expression]) -> String {
        exprs
            .iter()
            .map(|expr| self.expression(expr))
            .collect::<Vec<_>>()
            .join(", ")
    }

    pub fn expression(&self, expr: &Expression) -> String {
        match expr {
            Expression::IntegerLiteral(n) => n.to_string(),
            Expression::FloatLiteral(x) => format!("{:?}", x),
            Expression::StringLiteral(s) => quote(s),
            Expression::Identifier { name, .. } => name.clone(),
            Expression::Qualified { package, name, .. } => format!("{}.{}", package, name),
            Expression::BinaryOp {
                left,
                operator,
                right,
                ..
            } => {
                let precedence = operator.precedence();
                // Operators are left-associative, so an equal-precedence right
                // operand needs parentheses.
                let left = self.operand(left, |inner| inner < precedence);
                let right = self.operand(right, |inner| inner <= precedence);
                format!("{} {} {}", left, operator.symbol(), right)
            }
            Expression::UnaryOp {
                operator, operand, ..
            } => {
                let inner = match operand.as_ref() {
                    Expression::BinaryOp { .. } | Expression::UnaryOp { .. } => {
                        format!("({})", self.expression(operand))
                    }
                    Expression::IntegerLiteral(n) if *n < 0 => format!("({})", n),
                    _ => self.expression(operand),
                };
                format!("{}{}", operator.symbol(), inner)
            }
            Expression::Call { callee, args, .. } => {
                let callee = match callee.as_ref() {
                    Expression::BinaryOp { .. } | Expression::UnaryOp { .. } => {
                        format!("({})", self.expression(callee))
                    }
                    _ => self.expression(callee),
                };
                format!("{}({})", callee, self.expressions(args))
            }
            Expression::FunctionLiteral(function) => self.function_literal(function),
        }
    }

    fn operand(&self, expr: &Expression, needs_parens: impl Fn(u8) -> bool) -> String {
        match expr {
            Expression::BinaryOp { operator, .. } if needs_parens(operator.precedence()) => {
                format!("({})", self.expression(expr))
            }
            _ => self.expression(expr),
        }
    }

    fn function_literal(&self, function: &FunctionLiteral) -> String {
        let mut nested = Printer {
            output: String::new(),
            indent: self.indent,
        };
        nested.braced(
            &format!("func{}", signature(&function.signature)),
            &function.body.statements,
            "}",
        );

        // The opening line continues the enclosing expression, so drop its indentation.
        let text = nested.output.trim_end_matches('\n');
        text.trim_start_matches('\t').to_string()
    }
}

impl Default for Printer {
    fn default() -> Self {
        Self::new()
    }
}

/// Canonical source for `program`.
pub fn print_program(program: &Program) -> String {
    Printer::new().print_program(program)
}

fn import_spec(import: &Import) -> String {
    match &import.alias {
        Some(alias) => format!("{} {}", alias, quote(&import.path)),
        None => quote(&import.path),
    }
}

fn signature(signature: &Signature) -> String {
    let params = signature
        .params
        .iter()
        .map(|param| format!("{} {}", param.name, param.param_type))
        .collect::<Vec<_>>()
        .join(", ");

    let results = if !signature.result_names.is_empty() {
        let named = signature
            .result_names
            .iter()
            .zip(&signature.results)
            .map(|(name, result)| format!("{} {}", name, result))
            .collect::<Vec<_>>()
            .join(", ");
        format!(" ({})", named)
    } else {
        match signature.results.as_slice() {
            [] => String::new(),
            [single] => format!(" {}", single),
            many => format!(
                " ({})",
                many.iter()
                    .map(|result| result.to_string())
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
        }
    };

    format!("({}){}", params, results)
}

fn quote(text: &str) -> String {
    let mut quoted = String::with_capacity(text.len() + 2);
    quoted.push('"');
    for ch in text.chars() {
        match ch {
            '"' => quoted.push_str("\\\""),
            '\\' => quoted.push_str("\\\\"),
            '\n' => quoted.push_str("\\n"),
            '\t' => quoted.push_str("\\t"),
            other => quoted.push(other),
        }
    }
    quoted.push('"');
    quoted
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::Lexer;
    use crate::parser::Parser;
    use pretty_assertions::assert_eq;

    fn parse(source: &str) -> Program {
        let tokens = Lexer::new(source).tokenize().unwrap();
        Parser::new(tokens).parse().unwrap()
    }

    /// Printing, re-parsing and printing again must reproduce the first output.
    fn assert_round_trip(source: &str) -> String {
        let printed = print_program(&parse(source));
        let reprinted = print_program(&parse(&printed));
        assert_eq!(printed, reprinted);
        printed
    }

    #[test]
    fn test_canonical_layout() {
        let printed = assert_round_trip(
            "package main\nimport \"fmt\"\nfunc main() {\nx := 1\nif x > 0 { fmt.Println(\"pos\") } else { x-- }\n}\n",
        );
        assert_eq!(
            printed,
            "package main\n\nimport \"fmt\"\n\nfunc main() {\n\tx := 1\n\tif x > 0 {\n\t\tfmt.Println(\"pos\")\n\t} else {\n\t\tx--\n\t}\n}\n"
        );
    }

    #[test]
    fn test_parentheses_follow_precedence() {
        let program = parse("package p\nvar a = (1 + 2) * 3 - (4 - 5) + -(-6)\n");
        let printed = print_program(&program);
        assert!(printed.contains("var a = (1 + 2) * 3 - (4 - 5) + -(-6)"), "{}", printed);
    }

    #[test]
    fn test_control_flow_round_trip() {
        assert_round_trip(
            "package testcase\n\
             import (\n\"fmt\"\nm \"mathutil\"\n)\n\
             func Loops() (sum int) {\n\
             for i := 0; i < 10; i += 1 {\nsum += i\n}\n\
             for sum < 100 {\nsum *= 2\n}\n\
             for {\nbreak\n}\n\
             return\n}\n\
             func Choose(x int) string {\n\
             switch y := x % 3; y {\ncase 0, 1:\nreturn \"low\"\ndefault:\nfmt.Println(m.Abs(x))\n}\n\
             switch {\ncase x < 0:\nreturn \"neg\"\n}\n\
             if x := 10; x < 0 {\nreturn \"a\"\n} else if x == 0 {\nreturn \"b\"\n} else {\nreturn \"c\"\n}\n}\n",
        );
    }

    #[test]
    fn test_function_literals_and_strings() {
        let printed = assert_round_trip(
            "package p\n\
             const greeting string = \"say \\\"hi\\\"\\n\"\n\
             func Swap() func(int, int) (int, int) {\nreturn func(a int, b int) (int, int) {\nreturn b, a\n}\n}\n\
             var f = 1.5e-7\n",
        );
        assert!(printed.contains("const greeting string = \"say \\\"hi\\\"\\n\""));
        assert!(printed.contains("\treturn func(a int, b int) (int, int) {\n\t\treturn b, a\n\t}\n"));
        assert!(printed.contains("var f = 1.5e-7"));
    }
}

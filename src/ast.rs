use crate::error::SourceLocation;
use serde::Serialize;
use std::fmt;
use std::rc::Rc;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Type {
    Int,
    Float,
    String,
    Bool,
    Func(FuncType),
    // Resolved by the checker; only the builtin names above exist.
    Named(String),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FuncType {
    pub params: Vec<Type>,
    pub results: Vec<Type>,
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Type::Int => write!(f, "int"),
            Type::Float => write!(f, "float64"),
            Type::String => write!(f, "string"),
            Type::Bool => write!(f, "bool"),
            Type::Named(name) => write!(f, "{}", name),
            Type::Func(func) => {
                write!(f, "func(")?;
                for (i, param) in func.params.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", param)?;
                }
                write!(f, ")")?;
                match func.results.as_slice() {
                    [] => Ok(()),
                    [single] => write!(f, " {}", single),
                    many => {
                        write!(f, " (")?;
                        for (i, result) in many.iter().enumerate() {
                            if i > 0 {
                                write!(f, ", ")?;
                            }
                            write!(f, "{}", result)?;
                        }
                        write!(f, ")")
                    }
                }
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Parameter {
    pub name: String,
    pub param_type: Type,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Signature {
    pub params: Vec<Parameter>,
    pub results: Vec<Type>,
    /// Names of named results; empty when the results are unnamed.
    pub result_names: Vec<String>,
}

impl Signature {
    pub fn func_type(&self) -> FuncType {
        FuncType {
            params: self.params.iter().map(|p| p.param_type.clone()).collect(),
            results: self.results.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Block {
    pub statements: Vec<Statement>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FunctionLiteral {
    pub signature: Signature,
    pub body: Rc<Block>,
    pub location: SourceLocation,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Import {
    pub alias: Option<String>,
    pub path: String,
    pub location: SourceLocation,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum AssignOperator {
    Assign,
    Compound(BinaryOperator),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum ElseBranch {
    Block(Block),
    If(Box<Statement>),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum CaseLabel {
    Values(Vec<Expression>),
    Default,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SwitchCase {
    pub label: CaseLabel,
    pub body: Vec<Statement>,
    pub location: SourceLocation,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Statement {
    VarDecl {
        names: Vec<String>,
        type_annotation: Option<Type>,
        values: Vec<Expression>,
        location: SourceLocation,
    },
    ConstDecl {
        names: Vec<String>,
        type_annotation: Option<Type>,
        values: Vec<Expression>,
        location: SourceLocation,
    },
    ShortVarDecl {
        names: Vec<String>,
        values: Vec<Expression>,
        location: SourceLocation,
    },
    Assignment {
        targets: Vec<String>,
        operator: AssignOperator,
        values: Vec<Expression>,
        location: SourceLocation,
    },
    IncDec {
        target: String,
        increment: bool,
        location: SourceLocation,
    },
    If {
        init: Option<Box<Statement>>,
        condition: Expression,
        then_body: Block,
        else_body: Option<ElseBranch>,
        location: SourceLocation,
    },
    For {
        init: Option<Box<Statement>>,
        condition: Option<Expression>,
        post: Option<Box<Statement>>,
        body: Block,
        location: SourceLocation,
    },
    Switch {
        init: Option<Box<Statement>>,
        tag: Option<Expression>,
        cases: Vec<SwitchCase>,
        location: SourceLocation,
    },
    Function {
        name: String,
        function: Rc<FunctionLiteral>,
    },
    Return {
        values: Vec<Expression>,
        location: SourceLocation,
    },
    Break(SourceLocation),
    Continue(SourceLocation),
    Block(Block),
    Expression(Expression),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Expression {
    IntegerLiteral(i64),
    FloatLiteral(f64),
    StringLiteral(String),
    Identifier {
        name: String,
        location: SourceLocation,
    },
    /// `package.Name`
    Qualified {
        package: String,
        name: String,
        location: SourceLocation,
    },
    BinaryOp {
        left: Box<Expression>,
        operator: BinaryOperator,
        right: Box<Expression>,
        location: SourceLocation,
    },
    UnaryOp {
        operator: UnaryOperator,
        operand: Box<Expression>,
        location: SourceLocation,
    },
    Call {
        callee: Box<Expression>,
        args: Vec<Expression>,
        location: SourceLocation,
    },
    FunctionLiteral(Rc<FunctionLiteral>),
}

impl Expression {
    pub fn location(&self) -> Option<SourceLocation> {
        match self {
            Expression::IntegerLiteral(_)
            | Expression::FloatLiteral(_)
            | Expression::StringLiteral(_) => None,
            Expression::Identifier { location, .. }
            | Expression::Qualified { location, .. }
            | Expression::BinaryOp { location, .. }
            | Expression::UnaryOp { location, .. }
            | Expression::Call { location, .. } => Some(*location),
            Expression::FunctionLiteral(function) => Some(function.location),
        }
    }

    pub fn is_call(&self) -> bool {
        matches!(self, Expression::Call { .. })
    }

    /// An integer constant expression with no declared type, such as `1` or `-(2 * 3)`.
    /// These take the float type when used where a float is expected.
    pub fn is_untyped_integer(&self) -> bool {
        match self {
            Expression::IntegerLiteral(_) => true,
            Expression::UnaryOp {
                operator: UnaryOperator::Negate | UnaryOperator::Plus,
                operand,
                ..
            } => operand.is_untyped_integer(),
            Expression::BinaryOp {
                left,
                operator,
                right,
                ..
            } => operator.is_arithmetic() && left.is_untyped_integer() && right.is_untyped_integer(),
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum UnaryOperator {
    Negate,
    Plus,
    Not,
    BitNot,
}

impl UnaryOperator {
    pub fn symbol(self) -> &'static str {
        match self {
            UnaryOperator::Negate => "-",
            UnaryOperator::Plus => "+",
            UnaryOperator::Not => "!",
            UnaryOperator::BitNot => "^",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BinaryOperator {
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
    BitAnd,
    BitOr,
    BitXor,
    BitClear,
    ShiftLeft,
    ShiftRight,
    Equal,
    NotEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    And,
    Or,
}

impl BinaryOperator {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOperator::Add => "+",
            BinaryOperator::Subtract => "-",
            BinaryOperator::Multiply => "*",
            BinaryOperator::Divide => "/",
            BinaryOperator::Modulo => "%",
            BinaryOperator::BitAnd => "&",
            BinaryOperator::BitOr => "|",
            BinaryOperator::BitXor => "^",
            BinaryOperator::BitClear => "&^",
            BinaryOperator::ShiftLeft => "<<",
            BinaryOperator::ShiftRight => ">>",
            BinaryOperator::Equal => "==",
            BinaryOperator::NotEqual => "!=",
            BinaryOperator::Less => "<",
            BinaryOperator::LessEqual => "<=",
            BinaryOperator::Greater => ">",
            BinaryOperator::GreaterEqual => ">=",
            BinaryOperator::And => "&&",
            BinaryOperator::Or => "||",
        }
    }

    /// Binding strength, 5 binds tightest.
    pub fn precedence(self) -> u8 {
        match self {
            BinaryOperator::Multiply
            | BinaryOperator::Divide
            | BinaryOperator::Modulo
            | BinaryOperator::ShiftLeft
            | BinaryOperator::ShiftRight
            | BinaryOperator::BitAnd
            | BinaryOperator::BitClear => 5,
            BinaryOperator::Add
            | BinaryOperator::Subtract
            | BinaryOperator::BitOr
            | BinaryOperator::BitXor => 4,
            BinaryOperator::Equal
            | BinaryOperator::NotEqual
            | BinaryOperator::Less
            | BinaryOperator::LessEqual
            | BinaryOperator::Greater
            | BinaryOperator::GreaterEqual => 3,
            BinaryOperator::And => 2,
            BinaryOperator::Or => 1,
        }
    }

    pub fn is_arithmetic(self) -> bool {
        self.precedence() >= 4
    }
}

/// A parsed source file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Program {
    pub package: String,
    pub imports: Vec<Import>,
    pub declarations: Vec<Statement>,
}

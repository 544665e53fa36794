use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceLocation {
    pub line: usize,
    pub column: usize,
}

impl SourceLocation {
    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

// Lexer Errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LexError {
    #[error("{location}: unexpected character '{character}'")]
    UnexpectedCharacter {
        character: char,
        location: SourceLocation,
    },
    #[error("{location}: unterminated string literal")]
    UnterminatedString { location: SourceLocation },
    #[error("{location}: unterminated comment")]
    UnterminatedComment { location: SourceLocation },
    #[error("{location}: invalid number '{value}'")]
    InvalidNumber {
        value: String,
        location: SourceLocation,
    },
}

// Parser Errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SyntaxError {
    #[error("{location}: expected {expected}, found {found}")]
    UnexpectedToken {
        expected: String,
        found: String,
        location: SourceLocation,
    },
    #[error("{location}: unexpected end of file, expected {expected}")]
    UnexpectedEof {
        expected: String,
        location: SourceLocation,
    },
    #[error("{location}: {message}")]
    InvalidSyntax {
        message: String,
        location: SourceLocation,
    },
}

impl SyntaxError {
    pub fn location(&self) -> SourceLocation {
        match self {
            SyntaxError::UnexpectedToken { location, .. }
            | SyntaxError::UnexpectedEof { location, .. }
            | SyntaxError::InvalidSyntax { location, .. } => *location,
        }
    }
}

/// Errors found while binding names, before any code runs.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ResolutionError {
    #[error("{location}: undefined: {name}")]
    Undefined {
        name: String,
        location: SourceLocation,
    },
    #[error("{location}: no new variables on left side of :=")]
    NoNewVariables { location: SourceLocation },
    #[error("{location}: {name} redeclared in this block")]
    Redeclared {
        name: String,
        location: SourceLocation,
    },
    #[error("{location}: {function} returns {expected} value(s), return statement has {found}")]
    ReturnCount {
        function: String,
        expected: usize,
        found: usize,
        location: SourceLocation,
    },
    #[error("{location}: multiple-value ({count} values) in single-value context")]
    MultiValue {
        count: usize,
        location: SourceLocation,
    },
    #[error("{location}: function call (no value) used as value")]
    NoValue { location: SourceLocation },
    #[error("{location}: initialization cycle: {path}")]
    InitializationCycle {
        path: String,
        location: SourceLocation,
    },
    #[error("{location}: missing return at end of {function}")]
    MissingReturn {
        function: String,
        location: SourceLocation,
    },
    #[error("{location}: assignment mismatch: {targets} variable(s) but {values} value(s)")]
    AssignmentCount {
        targets: usize,
        values: usize,
        location: SourceLocation,
    },
    #[error("{location}: undefined package: {name}")]
    UnknownPackage {
        name: String,
        location: SourceLocation,
    },
    #[error("{location}: use of package {name} without selector")]
    PackageAsValue {
        name: String,
        location: SourceLocation,
    },
    #[error("{location}: name {name} not exported by package {package}")]
    Unexported {
        package: String,
        name: String,
        location: SourceLocation,
    },
    #[error("{location}: undefined: {package}.{name}")]
    UndefinedInPackage {
        package: String,
        name: String,
        location: SourceLocation,
    },
    #[error("{location}: cannot assign to {name}")]
    NotAssignable {
        name: String,
        location: SourceLocation,
    },
    #[error("{location}: undefined type: {name}")]
    UnknownType {
        name: String,
        location: SourceLocation,
    },
    #[error("{location}: {keyword} is not in a loop{suffix}")]
    MisplacedControl {
        keyword: &'static str,
        suffix: &'static str,
        location: SourceLocation,
    },
    #[error("import cycle not allowed: {path}")]
    ImportCycle { path: String },
    #[error("cannot find package \"{path}\" in {searched}")]
    PackageNotFound { path: String, searched: String },
    #[error("found packages {expected} and {found} in {directory}")]
    PackageMismatch {
        expected: String,
        found: String,
        directory: String,
    },
    #[error("function {function} is undeclared in package {package}")]
    MissingEntry { package: String, function: String },
}

/// Errors raised while the program runs.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RuntimeError {
    #[error("{location}: {message}")]
    TypeMismatch {
        message: String,
        location: SourceLocation,
    },
    #[error("{location}: division by zero")]
    DivisionByZero { location: SourceLocation },
    #[error("{location}: stack overflow: call depth exceeded {limit}")]
    StackOverflow {
        limit: usize,
        location: SourceLocation,
    },
    #[error("{location}: cannot call non-function value of type {found}")]
    NotCallable {
        found: String,
        location: SourceLocation,
    },
    #[error("{location}: call of nil function")]
    NilFunction { location: SourceLocation },
    #[error("{location}: {function} expects {expected} argument(s), got {found}")]
    ArgumentCount {
        function: String,
        expected: usize,
        found: usize,
        location: SourceLocation,
    },
    #[error("{location}: multiple-value ({count} values) in single-value context")]
    MultiValue {
        count: usize,
        location: SourceLocation,
    },
    #[error("{location}: function call (no value) used as value")]
    NoValue { location: SourceLocation },
    #[error("{location}: {function} must return {expected} value(s), got {found}")]
    ReturnCount {
        function: String,
        expected: usize,
        found: usize,
        location: SourceLocation,
    },
    #[error("{location}: assignment mismatch: {targets} variable(s) but {values} value(s)")]
    AssignmentCount {
        targets: usize,
        values: usize,
        location: SourceLocation,
    },
    #[error("{location}: negative shift amount")]
    NegativeShift { location: SourceLocation },
    #[error("{location}: undefined: {name}")]
    Undefined {
        name: String,
        location: SourceLocation,
    },
}

impl RuntimeError {
    pub fn type_mismatch(message: impl Into<String>, location: SourceLocation) -> Self {
        RuntimeError::TypeMismatch {
            message: message.into(),
            location,
        }
    }
}

// Top-level errors
#[derive(Debug, Error)]
pub enum Error {
    #[error("lexical error: {0}")]
    Lex(#[from] LexError),
    #[error("syntax error: {0}")]
    Syntax(#[from] SyntaxError),
    #[error("resolution error: {0}")]
    Resolution(#[from] ResolutionError),
    #[error("runtime error: {0}")]
    Runtime(#[from] RuntimeError),
    #[error("{path}: {source}")]
    InFile {
        path: String,
        #[source]
        source: Box<Error>,
    },
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Attach the file the error came from.
    pub fn in_file(self, path: impl Into<String>) -> Self {
        Error::InFile {
            path: path.into(),
            source: Box::new(self),
        }
    }
}

// Result types
pub type LexResult<T> = std::result::Result<T, LexError>;
pub type ParseResult<T> = std::result::Result<T, SyntaxError>;
pub type ResolveResult<T> = std::result::Result<T, ResolutionError>;
pub type RuntimeResult<T> = std::result::Result<T, RuntimeError>;
pub type Result<T> = std::result::Result<T, Error>;

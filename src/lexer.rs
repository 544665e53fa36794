use crate::error::{LexError, LexResult, SourceLocation};
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum TokenType {
    // Keywords
    Break,
    Case,
    Const,
    Continue,
    Default,
    Else,
    For,
    Func,
    If,
    Import,
    Package,
    Return,
    Switch,
    Var,
    Identifier(String),
    /// Magnitude of an integer literal; a leading `-` is a separate token.
    Integer(u64),
    Float(f64),
    String(String),
    // Punctuation
    LeftParen,
    RightParen,
    LeftBrace,
    RightBrace,
    LeftBracket,
    RightBracket,
    Comma,
    Semicolon,
    Colon,
    Dot,
    // Operators
    Equal,
    ColonEqual,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Ampersand,
    Pipe,
    Caret,
    AndNot,
    ShiftLeft,
    ShiftRight,
    AndAnd,
    OrOr,
    Bang,
    EqualEqual,
    NotEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    PlusPlus,
    MinusMinus,
    PlusEqual,
    MinusEqual,
    StarEqual,
    SlashEqual,
    PercentEqual,
    AmpersandEqual,
    PipeEqual,
    CaretEqual,
    AndNotEqual,
    ShiftLeftEqual,
    ShiftRightEqual,
    Eof,
}

/// Coarse classification of a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TokenKind {
    Identifier,
    IntegerLiteral,
    FloatLiteral,
    StringLiteral,
    Keyword,
    Operator,
    Punctuation,
    EndOfInput,
}

impl TokenType {
    pub fn kind(&self) -> TokenKind {
        match self {
            TokenType::Break
            | TokenType::Case
            | TokenType::Const
            | TokenType::Continue
            | TokenType::Default
            | TokenType::Else
            | TokenType::For
            | TokenType::Func
            | TokenType::If
            | TokenType::Import
            | TokenType::Package
            | TokenType::Return
            | TokenType::Switch
            | TokenType::Var => TokenKind::Keyword,
            TokenType::Identifier(_) => TokenKind::Identifier,
            TokenType::Integer(_) => TokenKind::IntegerLiteral,
            TokenType::Float(_) => TokenKind::FloatLiteral,
            TokenType::String(_) => TokenKind::StringLiteral,
            TokenType::LeftParen
            | TokenType::RightParen
            | TokenType::LeftBrace
            | TokenType::RightBrace
            | TokenType::LeftBracket
            | TokenType::RightBracket
            | TokenType::Comma
            | TokenType::Semicolon
            | TokenType::Colon
            | TokenType::Dot => TokenKind::Punctuation,
            TokenType::Eof => TokenKind::EndOfInput,
            _ => TokenKind::Operator,
        }
    }

    /// Whether a newline directly after this token terminates the statement.
    fn ends_statement(&self) -> bool {
        matches!(
            self,
            TokenType::Identifier(_)
                | TokenType::Integer(_)
                | TokenType::Float(_)
                | TokenType::String(_)
                | TokenType::Return
                | TokenType::Break
                | TokenType::Continue
                | TokenType::PlusPlus
                | TokenType::MinusMinus
                | TokenType::RightParen
                | TokenType::RightBracket
                | TokenType::RightBrace
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Token {
    pub token_type: TokenType,
    pub lexeme: String,
    pub line: usize,
    pub column: usize,
}

impl Token {
    pub fn location(&self) -> SourceLocation {
        SourceLocation::new(self.line, self.column)
    }

    /// True for a `;` the lexer inserted at a line break.
    pub fn is_implicit(&self) -> bool {
        self.token_type == TokenType::Semicolon && self.lexeme == "\n"
    }

    /// Human-readable form used in diagnostics.
    pub fn describe(&self) -> String {
        match &self.token_type {
            TokenType::Eof => "end of file".to_string(),
            TokenType::Semicolon if self.is_implicit() => "newline".to_string(),
            TokenType::Identifier(name) => format!("name {}", name),
            TokenType::Integer(_) | TokenType::Float(_) => format!("literal {}", self.lexeme),
            TokenType::String(_) => format!("literal {}", self.lexeme),
            TokenType::Break
            | TokenType::Case
            | TokenType::Const
            | TokenType::Continue
            | TokenType::Default
            | TokenType::Else
            | TokenType::For
            | TokenType::Func
            | TokenType::If
            | TokenType::Import
            | TokenType::Package
            | TokenType::Return
            | TokenType::Switch
            | TokenType::Var => format!("keyword {}", self.lexeme),
            _ => format!("'{}'", self.lexeme),
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let lexeme = if self.is_implicit() { "\\n" } else { &self.lexeme };
        write!(
            f,
            "{}:{}\t{:?}\t{}",
            self.line,
            self.column,
            self.token_type.kind(),
            lexeme
        )
    }
}

/// Converts source text into tokens on demand.
///
/// The lexer is an iterator; `tokenize` drains it into a vector. Line
/// breaks after a token that can end a statement are reported as implicit
/// semicolons, which is how the grammar separates statements.
#[derive(Debug, Clone)]
pub struct Lexer {
    input: Vec<char>,
    position: usize,
    line: usize,
    column: usize,
    insert_semicolon: bool,
    finished: bool,
}

impl Lexer {
    pub fn new(input: impl AsRef<str>) -> Self {
        Self {
            input: input.as_ref().chars().collect(),
            position: 0,
            line: 1,
            column: 1,
            insert_semicolon: false,
            finished: false,
        }
    }

    /// Rewind to the start of the input.
    pub fn reset(&mut self) {
        self.position = 0;
        self.line = 1;
        self.column = 1;
        self.insert_semicolon = false;
        self.finished = false;
    }

    pub fn tokenize(&mut self) -> LexResult<Vec<Token>> {
        self.reset();
        self.by_ref().collect()
    }

    fn next_token(&mut self) -> LexResult<Token> {
        loop {
            self.skip_whitespace();

            if self.is_at_end() {
                if self.insert_semicolon {
                    return Ok(self.implicit_semicolon());
                }
                self.finished = true;
                return Ok(self.make_token(TokenType::Eof, String::new(), self.line, self.column));
            }

            match (self.current_char(), self.peek_char()) {
                ('\n', _) => {
                    if self.insert_semicolon {
                        let token = self.implicit_semicolon();
                        self.advance();
                        return Ok(token);
                    }
                    self.advance();
                }
                ('/', '/') => self.skip_line_comment(),
                ('/', '*') => {
                    let location = SourceLocation::new(self.line, self.column);
                    let spans_lines = self.skip_block_comment(location)?;
                    if spans_lines && self.insert_semicolon {
                        return Ok(self.implicit_semicolon());
                    }
                }
                _ => break,
            }
        }

        let line = self.line;
        let column = self.column;
        let start = self.position;
        let ch = self.current_char();

        let token_type = match ch {
            '"' => self.read_string()?,
            _ if ch.is_alphabetic() || ch == '_' => self.read_identifier(),
            _ if ch.is_ascii_digit() => self.read_number()?,
            '.' if self.peek_char().is_ascii_digit() => self.read_number()?,
            _ => self.read_operator()?,
        };

        let lexeme: String = self.input[start..self.position].iter().collect();
        self.insert_semicolon = token_type.ends_statement();
        Ok(self.make_token(token_type, lexeme, line, column))
    }

    fn make_token(&self, token_type: TokenType, lexeme: String, line: usize, column: usize) -> Token {
        Token {
            token_type,
            lexeme,
            line,
            column,
        }
    }

    fn implicit_semicolon(&mut self) -> Token {
        self.insert_semicolon = false;
        self.make_token(TokenType::Semicolon, "\n".to_string(), self.line, self.column)
    }

    fn read_operator(&mut self) -> LexResult<TokenType> {
        let ch = self.current_char();
        let location = SourceLocation::new(self.line, self.column);
        self.advance();

        let token_type = match ch {
            '(' => TokenType::LeftParen,
            ')' => TokenType::RightParen,
            '{' => TokenType::LeftBrace,
            '}' => TokenType::RightBrace,
            '[' => TokenType::LeftBracket,
            ']' => TokenType::RightBracket,
            ',' => TokenType::Comma,
            ';' => TokenType::Semicolon,
            '.' => TokenType::Dot,
            ':' => self.choose('=', TokenType::ColonEqual, TokenType::Colon),
            '=' => self.choose('=', TokenType::EqualEqual, TokenType::Equal),
            '!' => self.choose('=', TokenType::NotEqual, TokenType::Bang),
            '*' => self.choose('=', TokenType::StarEqual, TokenType::Star),
            '/' => self.choose('=', TokenType::SlashEqual, TokenType::Slash),
            '%' => self.choose('=', TokenType::PercentEqual, TokenType::Percent),
            '^' => self.choose('=', TokenType::CaretEqual, TokenType::Caret),
            '+' => match self.current_char() {
                '+' => {
                    self.advance();
                    TokenType::PlusPlus
                }
                _ => self.choose('=', TokenType::PlusEqual, TokenType::Plus),
            },
            '-' => match self.current_char() {
                '-' => {
                    self.advance();
                    TokenType::MinusMinus
                }
                _ => self.choose('=', TokenType::MinusEqual, TokenType::Minus),
            },
            '|' => match self.current_char() {
                '|' => {
                    self.advance();
                    TokenType::OrOr
                }
                _ => self.choose('=', TokenType::PipeEqual, TokenType::Pipe),
            },
            '&' => match self.current_char() {
                '&' => {
                    self.advance();
                    TokenType::AndAnd
                }
                '^' => {
                    self.advance();
                    self.choose('=', TokenType::AndNotEqual, TokenType::AndNot)
                }
                _ => self.choose('=', TokenType::AmpersandEqual, TokenType::Ampersand),
            },
            '<' => match self.current_char() {
                '<' => {
                    self.advance();
                    self.choose('=', TokenType::ShiftLeftEqual, TokenType::ShiftLeft)
                }
                _ => self.choose('=', TokenType::LessEqual, TokenType::Less),
            },
            '>' => match self.current_char() {
                '>' => {
                    self.advance();
                    self.choose('=', TokenType::ShiftRightEqual, TokenType::ShiftRight)
                }
                _ => self.choose('=', TokenType::GreaterEqual, TokenType::Greater),
            },
            _ => {
                return Err(LexError::UnexpectedCharacter {
                    character: ch,
                    location,
                })
            }
        };

        Ok(token_type)
    }

    /// Consume `next` if present and return `matched`, otherwise `single`.
    fn choose(&mut self, next: char, matched: TokenType, single: TokenType) -> TokenType {
        if !self.is_at_end() && self.current_char() == next {
            self.advance();
            matched
        } else {
            single
        }
    }

    fn read_string(&mut self) -> LexResult<TokenType> {
        let location = SourceLocation::new(self.line, self.column);
        self.advance(); // Skip opening quote
        let mut value = String::new();

        loop {
            if self.is_at_end() || self.current_char() == '\n' {
                return Err(LexError::UnterminatedString { location });
            }
            match self.current_char() {
                '"' => {
                    self.advance();
                    return Ok(TokenType::String(value));
                }
                '\\' => {
                    self.advance();
                    if self.is_at_end() {
                        return Err(LexError::UnterminatedString { location });
                    }
                    match self.current_char() {
                        'n' => value.push('\n'),
                        't' => value.push('\t'),
                        '\\' => value.push('\\'),
                        '"' => value.push('"'),
                        other => {
                            value.push('\\');
                            value.push(other);
                        }
                    }
                    self.advance();
                }
                ch => {
                    value.push(ch);
                    self.advance();
                }
            }
        }
    }

    fn read_identifier(&mut self) -> TokenType {
        let mut value = String::new();

        while !self.is_at_end()
            && (self.current_char().is_alphanumeric() || self.current_char() == '_')
        {
            value.push(self.current_char());
            self.advance();
        }

        match value.as_str() {
            "break" => TokenType::Break,
            "case" => TokenType::Case,
            "const" => TokenType::Const,
            "continue" => TokenType::Continue,
            "default" => TokenType::Default,
            "else" => TokenType::Else,
            "for" => TokenType::For,
            "func" => TokenType::Func,
            "if" => TokenType::If,
            "import" => TokenType::Import,
            "package" => TokenType::Package,
            "return" => TokenType::Return,
            "switch" => TokenType::Switch,
            "var" => TokenType::Var,
            _ => TokenType::Identifier(value),
        }
    }

    fn read_number(&mut self) -> LexResult<TokenType> {
        let location = SourceLocation::new(self.line, self.column);
        let mut value = String::new();
        let mut is_float = false;

        self.take_digits(&mut value);

        if !self.is_at_end() && self.current_char() == '.' {
            is_float = true;
            value.push('.');
            self.advance();
            self.take_digits(&mut value);
        }

        if matches!(self.current_char(), 'e' | 'E') {
            let signed = matches!(self.peek_char(), '+' | '-');
            let digit_at = if signed { 2 } else { 1 };
            if self.char_at(digit_at).is_ascii_digit() {
                is_float = true;
                for _ in 0..digit_at {
                    value.push(self.current_char());
                    self.advance();
                }
                self.take_digits(&mut value);
            }
        }

        if is_float {
            value
                .parse::<f64>()
                .map(TokenType::Float)
                .map_err(|_| LexError::InvalidNumber { value, location })
        } else {
            value
                .parse::<u64>()
                .map(TokenType::Integer)
                .map_err(|_| LexError::InvalidNumber { value, location })
        }
    }

    fn take_digits(&mut self, value: &mut String) {
        while !self.is_at_end() && self.current_char().is_ascii_digit() {
            value.push(self.current_char());
            self.advance();
        }
    }

    fn skip_whitespace(&mut self) {
        while !self.is_at_end() {
            match self.current_char() {
                ' ' | '\r' | '\t' => self.advance(),
                _ => break,
            }
        }
    }

    fn skip_line_comment(&mut self) {
        while !self.is_at_end() && self.current_char() != '\n' {
            self.advance();
        }
    }

    /// Skips `/* ... */`, reporting whether the comment contained a line break.
    fn skip_block_comment(&mut self, location: SourceLocation) -> LexResult<bool> {
        self.advance(); // '/'
        self.advance(); // '*'
        let mut spans_lines = false;

        while !self.is_at_end() {
            match (self.current_char(), self.peek_char()) {
                ('*', '/') => {
                    self.advance();
                    self.advance();
                    return Ok(spans_lines);
                }
                ('\n', _) => {
                    spans_lines = true;
                    self.advance();
                }
                _ => self.advance(),
            }
        }

        Err(LexError::UnterminatedComment { location })
    }

    fn current_char(&self) -> char {
        self.char_at(0)
    }

    fn peek_char(&self) -> char {
        self.char_at(1)
    }

    fn char_at(&self, offset: usize) -> char {
        self.input
            .get(self.position + offset)
            .copied()
            .unwrap_or('\0')
    }

    fn advance(&mut self) {
        if !self.is_at_end() {
            if self.current_char() == '\n' {
                self.line += 1;
                self.column = 1;
            } else {
                self.column += 1;
            }
            self.position += 1;
        }
    }

    fn is_at_end(&self) -> bool {
        self.position >= self.input.len()
    }
}

impl Iterator for Lexer {
    type Item = LexResult<Token>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        let token = self.next_token();
        if token.is_err() {
            self.finished = true;
        }
        Some(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn types(input: &str) -> Vec<TokenType> {
        Lexer::new(input)
            .tokenize()
            .unwrap()
            .into_iter()
            .map(|t| t.token_type)
            .collect()
    }

    #[test]
    fn test_keywords_and_identifiers() {
        assert_eq!(
            types("func main"),
            vec![
                TokenType::Func,
                TokenType::Identifier("main".to_string()),
                TokenType::Semicolon,
                TokenType::Eof,
            ]
        );
    }

    #[test]
    fn test_integer_and_float_literals() {
        assert_eq!(
            types("42 3.14 .5 1e3 2."),
            vec![
                TokenType::Integer(42),
                TokenType::Float(3.14),
                TokenType::Float(0.5),
                TokenType::Float(1000.0),
                TokenType::Float(2.0),
                TokenType::Semicolon,
                TokenType::Eof,
            ]
        );
    }

    #[test]
    fn test_integer_literal_range() {
        assert_eq!(
            types("9223372036854775808")[0],
            TokenType::Integer(9223372036854775808)
        );
        assert!(matches!(
            Lexer::new("99999999999999999999").tokenize(),
            Err(LexError::InvalidNumber { .. })
        ));
    }

    #[test]
    fn test_string_literal() {
        assert_eq!(
            types(r#""hello world""#)[0],
            TokenType::String("hello world".to_string())
        );
    }

    #[test]
    fn test_multi_char_operators() {
        assert_eq!(
            types("a += 1; b &^= c; i++; x := y << 2 >= 3 && z != w"),
            vec![
                TokenType::Identifier("a".to_string()),
                TokenType::PlusEqual,
                TokenType::Integer(1),
                TokenType::Semicolon,
                TokenType::Identifier("b".to_string()),
                TokenType::AndNotEqual,
                TokenType::Identifier("c".to_string()),
                TokenType::Semicolon,
                TokenType::Identifier("i".to_string()),
                TokenType::PlusPlus,
                TokenType::Semicolon,
                TokenType::Identifier("x".to_string()),
                TokenType::ColonEqual,
                TokenType::Identifier("y".to_string()),
                TokenType::ShiftLeft,
                TokenType::Integer(2),
                TokenType::GreaterEqual,
                TokenType::Integer(3),
                TokenType::AndAnd,
                TokenType::Identifier("z".to_string()),
                TokenType::NotEqual,
                TokenType::Identifier("w".to_string()),
                TokenType::Semicolon,
                TokenType::Eof,
            ]
        );
    }

    #[test]
    fn test_comments_produce_no_tokens() {
        let with = types("x := 1 // one\n/* block\ncomment */ y := 2");
        let without = types("x := 1\ny := 2");
        assert_eq!(with, without);
    }

    #[test]
    fn test_implicit_semicolons() {
        let tokens = Lexer::new("return x\n}\n").tokenize().unwrap();
        let implicit: Vec<_> = tokens.iter().filter(|t| t.is_implicit()).collect();
        assert_eq!(implicit.len(), 2);
        assert_eq!(implicit[0].line, 1);

        // No terminator after an opening brace or an operator.
        assert_eq!(
            types("{\n1 +\n2"),
            vec![
                TokenType::LeftBrace,
                TokenType::Integer(1),
                TokenType::Plus,
                TokenType::Integer(2),
                TokenType::Semicolon,
                TokenType::Eof,
            ]
        );
    }

    #[test]
    fn test_positions() {
        let tokens = Lexer::new("a\n  bb").tokenize().unwrap();
        assert_eq!((tokens[0].line, tokens[0].column), (1, 1));
        assert_eq!((tokens[2].line, tokens[2].column), (2, 3));
    }

    #[test]
    fn test_lexer_is_lazy_and_restartable() {
        let mut lexer = Lexer::new("a b");
        let first = lexer.next().unwrap().unwrap();
        assert_eq!(first.token_type, TokenType::Identifier("a".to_string()));
        lexer.reset();
        let all = lexer.tokenize().unwrap();
        assert_eq!(all.len(), 4);
        assert!(lexer.next().is_none());
    }

    #[test]
    fn test_errors() {
        assert!(matches!(
            Lexer::new("\"open").tokenize(),
            Err(LexError::UnterminatedString { .. })
        ));
        assert!(matches!(
            Lexer::new("/* open").tokenize(),
            Err(LexError::UnterminatedComment { .. })
        ));
        assert_eq!(
            Lexer::new("a @ b").tokenize(),
            Err(LexError::UnexpectedCharacter {
                character: '@',
                location: SourceLocation::new(1, 3),
            })
        );
        assert!(matches!(
            Lexer::new("99999999999999999999").tokenize(),
            Err(LexError::InvalidNumber { .. })
        ));
    }

    #[test]
    fn test_token_kinds() {
        let kinds: Vec<_> = Lexer::new("var x = \"s\"")
            .tokenize()
            .unwrap()
            .iter()
            .map(|t| t.token_type.kind())
            .collect();
        assert_eq!(
            kinds,
            vec![
                TokenKind::Keyword,
                TokenKind::Identifier,
                TokenKind::Operator,
                TokenKind::StringLiteral,
                TokenKind::Punctuation,
                TokenKind::EndOfInput,
            ]
        );
    }
}

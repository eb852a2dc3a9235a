//! Tokenizer for the trigger language

use crate::condition::CompareOp;
use crate::error::{CompileError, CompileResult};

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum TokenKind {
    Id(String),
    Str(String),
    Number(f64),
    Bool(bool),
    /// The explicit `unknown` presence literal
    Unknown,
    Or,
    And,
    Not,
    LParen,
    RParen,
    Op(CompareOp),
    Eof,
}

impl TokenKind {
    /// Short description used in diagnostics
    pub(crate) fn describe(&self) -> String {
        match self {
            TokenKind::Id(id) => format!("event id '{}'", id),
            TokenKind::Str(_) => "string literal".to_string(),
            TokenKind::Number(_) => "number literal".to_string(),
            TokenKind::Bool(_) => "boolean literal".to_string(),
            TokenKind::Unknown => "'unknown'".to_string(),
            TokenKind::Or => "'|'".to_string(),
            TokenKind::And => "'&'".to_string(),
            TokenKind::Not => "'!'".to_string(),
            TokenKind::LParen => "'('".to_string(),
            TokenKind::RParen => "')'".to_string(),
            TokenKind::Op(op) => format!("'{}'", op),
            TokenKind::Eof => "end of input".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Token {
    pub kind: TokenKind,
    pub line: usize,
    pub column: usize,
}

fn is_id_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_id_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.' | ':')
}

pub(crate) struct Lexer {
    chars: Vec<char>,
    pos: usize,
    line: usize,
    column: usize,
}

impl Lexer {
    pub(crate) fn new(source: &str) -> Self {
        Self {
            chars: source.chars().collect(),
            pos: 0,
            line: 1,
            column: 1,
        }
    }

    /// Tokenize the whole input; the last token is always `Eof`
    pub(crate) fn tokenize(mut self) -> CompileResult<Vec<Token>> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token()?;
            let done = token.kind == TokenKind::Eof;
            tokens.push(token);
            if done {
                return Ok(tokens);
            }
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.bump();
        }
    }

    fn next_token(&mut self) -> CompileResult<Token> {
        self.skip_whitespace();
        let (line, column) = (self.line, self.column);
        let token = |kind| Token { kind, line, column };

        let Some(c) = self.peek() else {
            return Ok(token(TokenKind::Eof));
        };

        let kind = match c {
            '|' => {
                self.bump();
                TokenKind::Or
            }
            '&' => {
                self.bump();
                TokenKind::And
            }
            '(' => {
                self.bump();
                TokenKind::LParen
            }
            ')' => {
                self.bump();
                TokenKind::RParen
            }
            '!' => {
                self.bump();
                if self.peek() == Some('=') {
                    self.bump();
                    TokenKind::Op(CompareOp::Ne)
                } else {
                    TokenKind::Not
                }
            }
            '=' => {
                self.bump();
                if self.peek() != Some('=') {
                    return Err(CompileError::new(line, column, "expected '=='"));
                }
                self.bump();
                TokenKind::Op(CompareOp::Eq)
            }
            '>' | '<' => {
                self.bump();
                let or_equal = self.peek() == Some('=');
                if or_equal {
                    self.bump();
                }
                TokenKind::Op(match (c, or_equal) {
                    ('>', false) => CompareOp::Gt,
                    ('>', true) => CompareOp::Ge,
                    ('<', false) => CompareOp::Lt,
                    _ => CompareOp::Le,
                })
            }
            '"' | '\'' => self.string(c, line, column)?,
            c if c.is_ascii_digit() || self.starts_signed_number(c) => {
                self.number(line, column)?
            }
            c if is_id_start(c) => self.identifier(line, column)?,
            other => {
                return Err(CompileError::new(
                    line,
                    column,
                    format!("unexpected character '{}'", other),
                ))
            }
        };

        Ok(token(kind))
    }

    fn starts_signed_number(&self, c: char) -> bool {
        if c != '-' && c != '+' && c != '.' {
            return false;
        }
        match (c, self.peek_at(1)) {
            ('.', Some(d)) => d.is_ascii_digit(),
            (_, Some('.')) => self.peek_at(2).is_some_and(|d| d.is_ascii_digit()),
            (_, Some(d)) => d.is_ascii_digit(),
            _ => false,
        }
    }

    fn number(&mut self, line: usize, column: usize) -> CompileResult<TokenKind> {
        let mut text = String::new();
        if let Some(sign @ ('-' | '+')) = self.peek() {
            text.push(sign);
            self.bump();
        }
        self.digits(&mut text);
        if self.peek() == Some('.') {
            text.push('.');
            self.bump();
            self.digits(&mut text);
        }
        if let Some(e @ ('e' | 'E')) = self.peek() {
            let signed = matches!(self.peek_at(1), Some('-' | '+'));
            let digit_at = if signed { 2 } else { 1 };
            if self.peek_at(digit_at).is_some_and(|d| d.is_ascii_digit()) {
                text.push(e);
                self.bump();
                if signed {
                    if let Some(sign) = self.bump() {
                        text.push(sign);
                    }
                }
                self.digits(&mut text);
            }
        }

        match text.parse::<f64>() {
            Ok(n) if n.is_finite() => Ok(TokenKind::Number(n)),
            Ok(_) => Err(CompileError::new(
                line,
                column,
                format!("number '{}' is out of range", text),
            )),
            Err(_) => Err(CompileError::new(line, column, format!("invalid number '{}'", text))),
        }
    }

    fn digits(&mut self, text: &mut String) {
        while let Some(d) = self.peek().filter(char::is_ascii_digit) {
            text.push(d);
            self.bump();
        }
    }

    fn string(&mut self, quote: char, line: usize, column: usize) -> CompileResult<TokenKind> {
        self.bump();
        let mut value = String::new();
        loop {
            match self.bump() {
                None => {
                    return Err(CompileError::new(line, column, "unterminated string literal"));
                }
                Some(c) if c == quote => return Ok(TokenKind::Str(value)),
                Some('\\') => {
                    let (esc_line, esc_column) = (self.line, self.column);
                    match self.bump() {
                        Some('n') => value.push('\n'),
                        Some('t') => value.push('\t'),
                        Some(c @ ('"' | '\'' | '\\')) => value.push(c),
                        Some(other) => {
                            return Err(CompileError::new(
                                esc_line,
                                esc_column,
                                format!("invalid escape sequence '\\{}'", other),
                            ))
                        }
                        None => {
                            return Err(CompileError::new(
                                line,
                                column,
                                "unterminated string literal",
                            ))
                        }
                    }
                }
                Some(c) => value.push(c),
            }
        }
    }

    /// Lex an event id, including attached parameter groups like `zone(2)`
    fn identifier(&mut self, line: usize, column: usize) -> CompileResult<TokenKind> {
        let mut id = String::new();
        loop {
            match self.peek() {
                Some(c) if is_id_char(c) => {
                    id.push(c);
                    self.bump();
                }
                Some('(') => self.parameters(&mut id, line, column)?,
                _ => break,
            }
        }

        Ok(match id.as_str() {
            "true" => TokenKind::Bool(true),
            "false" => TokenKind::Bool(false),
            "unknown" => TokenKind::Unknown,
            _ => TokenKind::Id(id),
        })
    }

    fn parameters(&mut self, id: &mut String, line: usize, column: usize) -> CompileResult<()> {
        let mut depth = 0usize;
        loop {
            let Some(c) = self.bump() else {
                return Err(CompileError::new(
                    line,
                    column,
                    format!("unclosed parameter list in '{}'", id),
                ));
            };
            id.push(c);
            match c {
                '(' => depth += 1,
                ')' => {
                    depth -= 1;
                    if depth == 0 {
                        return Ok(());
                    }
                }
                _ => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        Lexer::new(source)
            .tokenize()
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn test_parameterized_ids() {
        assert_eq!(
            kinds("zone(2).active == true"),
            vec![
                TokenKind::Id("zone(2).active".to_string()),
                TokenKind::Op(CompareOp::Eq),
                TokenKind::Bool(true),
                TokenKind::Eof,
            ]
        );
        assert_eq!(
            kinds("ui.set(light(1),level)"),
            vec![TokenKind::Id("ui.set(light(1),level)".to_string()), TokenKind::Eof]
        );
    }

    #[test]
    fn test_grouping_parens_are_not_parameters() {
        assert_eq!(
            kinds("!(a | b)"),
            vec![
                TokenKind::Not,
                TokenKind::LParen,
                TokenKind::Id("a".to_string()),
                TokenKind::Or,
                TokenKind::Id("b".to_string()),
                TokenKind::RParen,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_operators() {
        assert_eq!(
            kinds("a!=1&b>=2|c<=3"),
            vec![
                TokenKind::Id("a".to_string()),
                TokenKind::Op(CompareOp::Ne),
                TokenKind::Number(1.0),
                TokenKind::And,
                TokenKind::Id("b".to_string()),
                TokenKind::Op(CompareOp::Ge),
                TokenKind::Number(2.0),
                TokenKind::Or,
                TokenKind::Id("c".to_string()),
                TokenKind::Op(CompareOp::Le),
                TokenKind::Number(3.0),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_numbers() {
        assert_eq!(kinds("-4.5")[0], TokenKind::Number(-4.5));
        assert_eq!(kinds(".5")[0], TokenKind::Number(0.5));
        assert_eq!(kinds("1e3")[0], TokenKind::Number(1000.0));
        assert_eq!(kinds("2.5E-1")[0], TokenKind::Number(0.25));
    }

    #[test]
    fn test_string_escapes() {
        assert_eq!(
            kinds(r#""a \"quoted\" \\ word""#)[0],
            TokenKind::Str(r#"a "quoted" \ word"#.to_string())
        );
        assert_eq!(kinds("'single'")[0], TokenKind::Str("single".to_string()));
    }

    #[test]
    fn test_positions() {
        let tokens = Lexer::new("a == 1 &\n  b").tokenize().unwrap();
        let b = &tokens[4];
        assert_eq!(b.kind, TokenKind::Id("b".to_string()));
        assert_eq!((b.line, b.column), (2, 3));
    }

    #[test]
    fn test_errors() {
        let err = Lexer::new("a = 1").tokenize().unwrap_err();
        assert_eq!((err.line, err.column), (1, 3));

        let err = Lexer::new("a == \"open").tokenize().unwrap_err();
        assert_eq!(err.message, "unterminated string literal");

        let err = Lexer::new("\nzone(2.active").tokenize().unwrap_err();
        assert_eq!(err.line, 2);

        let err = Lexer::new("a == #").tokenize().unwrap_err();
        assert_eq!(err.message, "unexpected character '#'");

        let err = Lexer::new("temp > 1e999").tokenize().unwrap_err();
        assert_eq!((err.line, err.column), (1, 8));
        assert_eq!(err.message, "number '1e999' is out of range");
        assert!(Lexer::new("temp > -1e999").tokenize().is_err());
    }
}

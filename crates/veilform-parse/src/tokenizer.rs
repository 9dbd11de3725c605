use std::error::Error;
use std::fmt::{self, Display};

/// A tokenizer failure with the byte position where it occurred.
#[derive(Debug)]
pub struct TokenizerError {
    pub message: String,
    pub pos: usize,
}

impl Display for TokenizerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TokenizerError at {}: {}", self.pos, self.message)
    }
}

impl Error for TokenizerError {}

/// The type of a formula token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenType {
    /// Integer or decimal literal.
    Number,
    /// Single-quoted string literal (value holds the unquoted text).
    Text,
    /// `${name}` stored-value reference (value holds the inner name).
    VarRef,
    /// A lone `.`, the current element's value.
    Dot,
    /// The `..` path operator.
    DotDot,
    /// A function name (always directly followed by `(` in the source).
    Func,
    /// Operator, including the word operators `and`/`or`/`not`/`div`/`mod`.
    Op,
    OpenParen,
    CloseParen,
    /// Argument separator `,`.
    Sep,
}

/// A token with its source span.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub value: String,
    pub token_type: TokenType,
    pub start: usize,
    pub end: usize,
}

impl Token {
    fn new(value: impl Into<String>, token_type: TokenType, start: usize, end: usize) -> Self {
        Token {
            value: value.into(),
            token_type,
            start,
            end,
        }
    }
}

impl Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{:?} value: {}>", self.token_type, self.value)
    }
}

const WORD_OPERATORS: &[&str] = &["and", "or", "not", "div", "mod"];

/// Byte-walking tokenizer over one formula string.
pub struct Tokenizer<'a> {
    source: &'a str,
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Tokenizer<'a> {
    pub fn new(source: &'a str) -> Self {
        Tokenizer {
            source,
            bytes: source.as_bytes(),
            pos: 0,
        }
    }

    pub fn tokenize(mut self) -> Result<Vec<Token>, TokenizerError> {
        let mut tokens = Vec::new();
        while let Some(&c) = self.bytes.get(self.pos) {
            match c {
                b' ' | b'\t' | b'\r' | b'\n' => {
                    self.pos += 1;
                }
                b'\'' => tokens.push(self.read_text()?),
                b'$' => tokens.push(self.read_var_ref()?),
                b'0'..=b'9' => tokens.push(self.read_number()),
                b'.' => tokens.push(self.read_dot()),
                b'(' => tokens.push(self.single(TokenType::OpenParen)),
                b')' => tokens.push(self.single(TokenType::CloseParen)),
                b',' => tokens.push(self.single(TokenType::Sep)),
                b'+' | b'-' | b'*' | b'=' => tokens.push(self.single(TokenType::Op)),
                b'!' => {
                    if self.bytes.get(self.pos + 1) == Some(&b'=') {
                        tokens.push(self.double(TokenType::Op));
                    } else {
                        return Err(self.error("expected `!=`"));
                    }
                }
                b'>' | b'<' => {
                    if self.bytes.get(self.pos + 1) == Some(&b'=') {
                        tokens.push(self.double(TokenType::Op));
                    } else {
                        tokens.push(self.single(TokenType::Op));
                    }
                }
                b'a'..=b'z' => tokens.push(self.read_word()),
                _ => {
                    let found = self.source[self.pos..].chars().next().unwrap_or('?');
                    return Err(self.error(format!("unexpected character `{found}`")));
                }
            }
        }
        Ok(tokens)
    }

    fn error(&self, message: impl Into<String>) -> TokenizerError {
        TokenizerError {
            message: message.into(),
            pos: self.pos,
        }
    }

    fn single(&mut self, token_type: TokenType) -> Token {
        let start = self.pos;
        self.pos += 1;
        Token::new(&self.source[start..self.pos], token_type, start, self.pos)
    }

    fn double(&mut self, token_type: TokenType) -> Token {
        let start = self.pos;
        self.pos += 2;
        Token::new(&self.source[start..self.pos], token_type, start, self.pos)
    }

    fn read_text(&mut self) -> Result<Token, TokenizerError> {
        let start = self.pos;
        self.pos += 1;
        while let Some(&c) = self.bytes.get(self.pos) {
            if c == b'\'' {
                self.pos += 1;
                return Ok(Token::new(
                    &self.source[start + 1..self.pos - 1],
                    TokenType::Text,
                    start,
                    self.pos,
                ));
            }
            self.pos += 1;
        }
        Err(TokenizerError {
            message: "unterminated string literal".into(),
            pos: start,
        })
    }

    fn read_var_ref(&mut self) -> Result<Token, TokenizerError> {
        let start = self.pos;
        if self.bytes.get(self.pos + 1) != Some(&b'{') {
            return Err(self.error("expected `{` after `$`"));
        }
        self.pos += 2;
        while let Some(&c) = self.bytes.get(self.pos) {
            if c == b'}' {
                self.pos += 1;
                return Ok(Token::new(
                    &self.source[start + 2..self.pos - 1],
                    TokenType::VarRef,
                    start,
                    self.pos,
                ));
            }
            self.pos += 1;
        }
        Err(TokenizerError {
            message: "unterminated `${...}` reference".into(),
            pos: start,
        })
    }

    fn read_number(&mut self) -> Token {
        let start = self.pos;
        while matches!(self.bytes.get(self.pos), Some(b'0'..=b'9')) {
            self.pos += 1;
        }
        // Fractional part only when a digit follows the dot; `1.` stays `1`
        // followed by a Dot token
        if self.bytes.get(self.pos) == Some(&b'.')
            && matches!(self.bytes.get(self.pos + 1), Some(b'0'..=b'9'))
        {
            self.pos += 1;
            while matches!(self.bytes.get(self.pos), Some(b'0'..=b'9')) {
                self.pos += 1;
            }
        }
        Token::new(&self.source[start..self.pos], TokenType::Number, start, self.pos)
    }

    fn read_dot(&mut self) -> Token {
        // `.5` is a number; `..` is the path operator; anything else is the
        // current-value dot
        if matches!(self.bytes.get(self.pos + 1), Some(b'0'..=b'9')) {
            let start = self.pos;
            self.pos += 1;
            while matches!(self.bytes.get(self.pos), Some(b'0'..=b'9')) {
                self.pos += 1;
            }
            return Token::new(&self.source[start..self.pos], TokenType::Number, start, self.pos);
        }
        if self.bytes.get(self.pos + 1) == Some(&b'.') {
            self.double(TokenType::DotDot)
        } else {
            self.single(TokenType::Dot)
        }
    }

    fn read_word(&mut self) -> Token {
        let start = self.pos;
        while matches!(
            self.bytes.get(self.pos),
            Some(b'a'..=b'z' | b'A'..=b'Z' | b'0'..=b'9' | b':' | b'-' | b'_')
        ) {
            self.pos += 1;
        }
        let word = &self.source[start..self.pos];
        if WORD_OPERATORS.contains(&word) {
            Token::new(word, TokenType::Op, start, self.pos)
        } else {
            // Anything else is a function name; the parser requires the
            // following token to open a call
            Token::new(word, TokenType::Func, start, self.pos)
        }
    }
}

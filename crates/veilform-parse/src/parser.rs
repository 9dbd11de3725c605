use crate::tokenizer::{Token, TokenType, Tokenizer, TokenizerError};
use crate::types::XlsFunction;
use smallvec::SmallVec;
use std::error::Error;
use std::fmt::{self, Display};
use veilform_common::ResponseValue;

/// A parser failure with optional source position.
#[derive(Debug)]
pub struct ParserError {
    pub message: String,
    pub position: Option<usize>,
    /// Set when the failure is an unknown function name, so form validation
    /// can classify it separately from plain syntax errors.
    pub unsupported_function: Option<String>,
}

impl ParserError {
    fn new(message: impl Into<String>, position: Option<usize>) -> Self {
        ParserError {
            message: message.into(),
            position,
            unsupported_function: None,
        }
    }
}

impl Display for ParserError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(pos) = self.position {
            write!(f, "ParserError at position {}: {}", pos, self.message)
        } else {
            write!(f, "ParserError: {}", self.message)
        }
    }
}

impl Error for ParserError {}

impl From<TokenizerError> for ParserError {
    fn from(e: TokenizerError) -> Self {
        ParserError::new(e.message, Some(e.pos))
    }
}

/// A parsed formula expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(ResponseValue),
    /// The current element's value (`.` in source form).
    CurrentValue,
    /// A stored-value lookup (`${var}` in source form).
    VarRef(String),
    UnaryOp {
        op: String,
        expr: Box<Expr>,
    },
    BinaryOp {
        op: String,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Call {
        function: XlsFunction,
        // No supported function takes more than four arguments
        args: Box<SmallVec<[Expr; 4]>>,
    },
}

/// Left/right binding powers; the pairs encode left associativity.
fn binding_power(op: &str) -> Option<(u8, u8)> {
    match op {
        "or" => Some((1, 2)),
        "and" => Some((3, 4)),
        "=" | "!=" | "<" | "<=" | ">" | ">=" => Some((5, 6)),
        "+" | "-" => Some((7, 8)),
        "*" | "div" | "mod" => Some((9, 10)),
        _ => None,
    }
}

const PREFIX_BP: u8 = 11;

/// Recursive-descent (Pratt) parser over a token stream.
pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        Parser { tokens, pos: 0 }
    }

    pub fn from_source(source: &str) -> Result<Self, ParserError> {
        Ok(Parser::new(Tokenizer::new(source).tokenize()?))
    }

    pub fn parse(mut self) -> Result<Expr, ParserError> {
        let expr = self.parse_expr(0)?;
        if let Some(token) = self.peek() {
            return Err(ParserError::new(
                format!("unexpected token `{}`", token.value),
                Some(token.start),
            ));
        }
        Ok(expr)
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn expect(&mut self, token_type: TokenType, what: &str) -> Result<Token, ParserError> {
        match self.advance() {
            Some(token) if token.token_type == token_type => Ok(token),
            Some(token) => Err(ParserError::new(
                format!("expected {what}, found `{}`", token.value),
                Some(token.start),
            )),
            None => Err(ParserError::new(
                format!("expected {what}, found end of formula"),
                None,
            )),
        }
    }

    fn parse_expr(&mut self, min_bp: u8) -> Result<Expr, ParserError> {
        let mut lhs = self.parse_primary()?;
        loop {
            let Some(token) = self.peek() else { break };
            if token.token_type != TokenType::Op {
                break;
            }
            let Some((l_bp, r_bp)) = binding_power(&token.value) else {
                break;
            };
            if l_bp < min_bp {
                break;
            }
            let op = token.value.clone();
            self.pos += 1;
            let rhs = self.parse_expr(r_bp)?;
            lhs = Expr::BinaryOp {
                op,
                left: Box::new(lhs),
                right: Box::new(rhs),
            };
        }
        Ok(lhs)
    }

    fn parse_primary(&mut self) -> Result<Expr, ParserError> {
        let Some(token) = self.advance() else {
            return Err(ParserError::new("unexpected end of formula", None));
        };
        match token.token_type {
            TokenType::Number => parse_number_literal(&token),
            TokenType::Text => Ok(Expr::Literal(ResponseValue::Text(token.value))),
            TokenType::VarRef => Ok(Expr::VarRef(token.value)),
            TokenType::Dot => Ok(Expr::CurrentValue),
            TokenType::Func => self.parse_call(token),
            TokenType::OpenParen => {
                let inner = self.parse_expr(0)?;
                self.expect(TokenType::CloseParen, "`)`")?;
                Ok(inner)
            }
            TokenType::Op if token.value == "-" || token.value == "not" => {
                let expr = self.parse_expr(PREFIX_BP)?;
                Ok(Expr::UnaryOp {
                    op: token.value,
                    expr: Box::new(expr),
                })
            }
            TokenType::DotDot => Err(ParserError::new(
                "`..` is only valid as a function argument",
                Some(token.start),
            )),
            _ => Err(ParserError::new(
                format!("unexpected token `{}`", token.value),
                Some(token.start),
            )),
        }
    }

    fn parse_call(&mut self, name: Token) -> Result<Expr, ParserError> {
        let Some(function) = XlsFunction::resolve(&name.value) else {
            return Err(ParserError {
                message: format!("unsupported function: {}", name.value),
                position: Some(name.start),
                unsupported_function: Some(name.value),
            });
        };
        self.expect(TokenType::OpenParen, "`(` after function name")?;

        let mut args: SmallVec<[Expr; 4]> = SmallVec::new();
        match self.peek().map(|t| t.token_type) {
            Some(TokenType::CloseParen) => {
                self.advance();
            }
            // The `..` path operator strips to an argumentless call
            Some(TokenType::DotDot) => {
                self.advance();
                self.expect(TokenType::CloseParen, "`)`")?;
            }
            _ => loop {
                args.push(self.parse_expr(0)?);
                match self.advance() {
                    Some(token) if token.token_type == TokenType::Sep => continue,
                    Some(token) if token.token_type == TokenType::CloseParen => break,
                    Some(token) => {
                        return Err(ParserError::new(
                            format!("expected `,` or `)`, found `{}`", token.value),
                            Some(token.start),
                        ));
                    }
                    None => {
                        return Err(ParserError::new("unterminated argument list", None));
                    }
                }
            },
        }

        if args.len() != function.arity() {
            return Err(ParserError::new(
                format!(
                    "function `{}` expects {} argument(s), found {}",
                    function.canonical_name(),
                    function.arity(),
                    args.len()
                ),
                Some(name.start),
            ));
        }
        Ok(Expr::Call {
            function,
            args: Box::new(args),
        })
    }
}

fn parse_number_literal(token: &Token) -> Result<Expr, ParserError> {
    if token.value.contains('.') {
        token
            .value
            .parse::<f64>()
            .map(|n| Expr::Literal(ResponseValue::Number(n)))
            .map_err(|_| ParserError::new("invalid number literal", Some(token.start)))
    } else {
        token
            .value
            .parse::<i64>()
            .map(|i| Expr::Literal(ResponseValue::Int(i)))
            .map_err(|_| ParserError::new("invalid number literal", Some(token.start)))
    }
}

/// Parse one formula into its AST.
pub fn parse_formula(source: &str) -> Result<Expr, ParserError> {
    Parser::from_source(source)?.parse()
}

/// Render the canonical host-side form of a formula.
///
/// This is a pure function on strings: the output depends only on the
/// input text, so identical inputs always yield identical outputs.
pub fn translate_formula(source: &str) -> Result<String, ParserError> {
    Ok(parse_formula(source)?.to_string())
}

impl Expr {
    fn own_bp(&self) -> u8 {
        match self {
            Expr::BinaryOp { op, .. } => binding_power(op).map(|(l, _)| l).unwrap_or(u8::MAX),
            Expr::UnaryOp { .. } => PREFIX_BP,
            _ => u8::MAX,
        }
    }

    fn fmt_prec(&self, f: &mut fmt::Formatter<'_>, min_bp: u8) -> fmt::Result {
        let wrap = self.own_bp() < min_bp;
        if wrap {
            write!(f, "(")?;
        }
        match self {
            Expr::Literal(ResponseValue::Text(s)) => write!(f, "'{s}'")?,
            Expr::Literal(value) => write!(f, "{value}")?,
            Expr::CurrentValue => write!(f, "current_value()")?,
            Expr::VarRef(name) => write!(f, "get_value('{name}')")?,
            Expr::UnaryOp { op, expr } => {
                if op == "not" {
                    write!(f, "not ")?;
                } else {
                    write!(f, "{op}")?;
                }
                expr.fmt_prec(f, PREFIX_BP)?;
            }
            Expr::BinaryOp { op, left, right } => {
                // Comparison powers as the fallback for hand-built ASTs
                let (l_bp, r_bp) = binding_power(op).unwrap_or((5, 6));
                left.fmt_prec(f, l_bp)?;
                let shown = if op == "=" { "==" } else { op.as_str() };
                write!(f, " {shown} ")?;
                right.fmt_prec(f, r_bp)?;
            }
            Expr::Call { function, args } => {
                write!(f, "{}(", function.canonical_name())?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    arg.fmt_prec(f, 0)?;
                }
                write!(f, ")")?;
            }
        }
        if wrap {
            write!(f, ")")?;
        }
        Ok(())
    }
}

impl Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_prec(f, 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_equal_parses_as_comparison() {
        let expr = parse_formula("${a}=1").unwrap();
        assert_eq!(
            expr,
            Expr::BinaryOp {
                op: "=".into(),
                left: Box::new(Expr::VarRef("a".into())),
                right: Box::new(Expr::Literal(ResponseValue::Int(1))),
            }
        );
    }

    #[test]
    fn position_with_path_operator_is_argumentless() {
        let expr = parse_formula("position(..)").unwrap();
        assert_eq!(
            expr,
            Expr::Call {
                function: XlsFunction::Position,
                args: Box::new(SmallVec::new()),
            }
        );
    }

    #[test]
    fn unknown_functions_are_reported_by_name() {
        let err = parse_formula("between(12, 100)").unwrap_err();
        assert_eq!(err.unsupported_function.as_deref(), Some("between"));
        let err = parse_formula("count-selected(.) <= 3").unwrap_err();
        assert_eq!(err.unsupported_function.as_deref(), Some("count-selected"));
    }

    #[test]
    fn arity_is_enforced() {
        assert!(parse_formula("selected(${x})").unwrap_err().message.contains("expects 2"));
        assert!(parse_formula("if(${x}, 1)").is_err());
        assert!(parse_formula("position(1)").is_err());
    }

    #[test]
    fn precedence_nests_multiplication_under_addition() {
        let rendered = translate_formula("1 + 2 * 3").unwrap();
        assert_eq!(rendered, "1 + 2 * 3");
        let rendered = translate_formula("(1 + 2) * 3").unwrap();
        assert_eq!(rendered, "(1 + 2) * 3");
    }

    #[test]
    fn trailing_tokens_are_rejected() {
        assert!(parse_formula("1 1").is_err());
        assert!(parse_formula("..").is_err());
    }
}

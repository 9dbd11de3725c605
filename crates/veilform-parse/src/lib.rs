//! Parsing for the XLSForm formula subset.
//!
//! Survey binds (`relevant`, `constraint`, `calculate`, repeat `count`)
//! carry small XPath-flavored formulas. This crate tokenizes and parses them
//! into an AST the evaluator walks directly; no string rewriting happens at
//! evaluation time. The accepted grammar realizes the XLSForm conventions
//! structurally:
//!
//! 1. a single `=` (outside `!=`, `>=`, `<=`) is equality comparison;
//! 2. a lone `.` is the current element's value;
//! 3. the `..` path operator makes its enclosing call argumentless
//!    (`position(..)` → `position()`);
//! 4. function names may contain `:` and `-`, which normalize to `_`;
//! 5. `${var}` is a stored-value lookup.
//!
//! [`translate_formula`] renders the parsed AST back into canonical host
//! syntax; it is a pure function on strings, so identical inputs always
//! yield identical outputs.

pub mod parser;
pub mod tokenizer;
pub mod types;

pub use parser::{Expr, Parser, ParserError, parse_formula, translate_formula};
pub use tokenizer::{Token, TokenType, Tokenizer, TokenizerError};
pub use types::XlsFunction;

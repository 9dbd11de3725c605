//! Formula evaluation against session state.
//!
//! The evaluator walks the parsed AST directly. It resolves `${var}` lookups
//! and the current element's value from the session, and implements the
//! supported function set as a closed dispatch; validation has already
//! rejected anything else.

use crate::session::SurveySession;
use std::cmp::Ordering;
use veilform_common::{ResponseValue, SurveyError, SurveyResult};
use veilform_parse::{Expr, XlsFunction};

pub struct Evaluator<'a> {
    session: &'a SurveySession,
    current_name: &'a str,
}

impl<'a> Evaluator<'a> {
    pub fn new(session: &'a SurveySession, current_name: &'a str) -> Self {
        Evaluator {
            session,
            current_name,
        }
    }

    pub fn evaluate(&self, expr: &Expr) -> SurveyResult<ResponseValue> {
        match expr {
            Expr::Literal(value) => Ok(value.clone()),
            Expr::CurrentValue => self.get_value(self.current_name),
            Expr::VarRef(name) => self.get_value(name),
            Expr::UnaryOp { op, expr } => self.eval_unary(op, expr),
            Expr::BinaryOp { op, left, right } => self.eval_binary(op, left, right),
            Expr::Call { function, args } => self.eval_call(*function, args),
        }
    }

    /// Evaluate into a boolean slot (`relevant`, `constraint`).
    pub fn eval_bool(&self, expr: &Expr) -> SurveyResult<bool> {
        Ok(self.evaluate(expr)?.truthy())
    }

    /// Evaluate a repeat `count`: a non-negative integer.
    pub fn eval_count(&self, expr: &Expr) -> SurveyResult<i64> {
        let value = self.evaluate(expr)?;
        let count = value.as_int().ok_or_else(|| SurveyError::FormInvalid {
            reason: format!("repeat count evaluated to a non-integer: {value}"),
        })?;
        Ok(count.max(0))
    }

    fn get_value(&self, name: &str) -> SurveyResult<ResponseValue> {
        self.session
            .retrieve_response(name)
            .ok_or_else(|| SurveyError::ValueMissing {
                name: name.to_owned(),
            })
    }

    fn eval_unary(&self, op: &str, expr: &Expr) -> SurveyResult<ResponseValue> {
        let value = self.evaluate(expr)?;
        match op {
            "not" => Ok(ResponseValue::Boolean(!value.truthy())),
            "-" => match value {
                ResponseValue::Int(i) => Ok(ResponseValue::Int(-i)),
                ResponseValue::Number(n) => Ok(ResponseValue::Number(-n)),
                other => Err(type_error(format!("cannot negate {other:?}"))),
            },
            other => Err(type_error(format!("unknown unary operator `{other}`"))),
        }
    }

    fn eval_binary(&self, op: &str, left: &Expr, right: &Expr) -> SurveyResult<ResponseValue> {
        // Short-circuit logical operators
        match op {
            "and" => {
                if !self.eval_bool(left)? {
                    return Ok(ResponseValue::Boolean(false));
                }
                return Ok(ResponseValue::Boolean(self.eval_bool(right)?));
            }
            "or" => {
                if self.eval_bool(left)? {
                    return Ok(ResponseValue::Boolean(true));
                }
                return Ok(ResponseValue::Boolean(self.eval_bool(right)?));
            }
            _ => {}
        }

        let lhs = self.evaluate(left)?;
        let rhs = self.evaluate(right)?;
        match op {
            "=" => Ok(ResponseValue::Boolean(lhs.loose_eq(&rhs))),
            "!=" => Ok(ResponseValue::Boolean(!lhs.loose_eq(&rhs))),
            "<" | "<=" | ">" | ">=" => {
                let ordering = lhs.loose_cmp(&rhs).ok_or_else(|| {
                    type_error(format!("cannot compare {lhs:?} with {rhs:?}"))
                })?;
                let result = match op {
                    "<" => ordering == Ordering::Less,
                    "<=" => ordering != Ordering::Greater,
                    ">" => ordering == Ordering::Greater,
                    _ => ordering != Ordering::Less,
                };
                Ok(ResponseValue::Boolean(result))
            }
            "+" | "-" | "*" | "mod" => arithmetic(op, &lhs, &rhs),
            "div" => {
                let (a, b) = numeric_pair(&lhs, &rhs)?;
                Ok(ResponseValue::Number(a / b))
            }
            other => Err(type_error(format!("unknown operator `{other}`"))),
        }
    }

    fn eval_call(&self, function: XlsFunction, args: &[Expr]) -> SurveyResult<ResponseValue> {
        if args.len() != function.arity() {
            return Err(type_error(format!(
                "function `{}` expects {} argument(s)",
                function.canonical_name(),
                function.arity()
            )));
        }
        match function {
            XlsFunction::If => {
                if self.eval_bool(&args[0])? {
                    self.evaluate(&args[1])
                } else {
                    self.evaluate(&args[2])
                }
            }
            XlsFunction::Selected => {
                let array = self.evaluate(&args[0])?.as_choice_array();
                let choice = self.evaluate(&args[1])?.to_string();
                Ok(ResponseValue::Boolean(array.contains(&choice)))
            }
            XlsFunction::SelectedAt => {
                let array = self.evaluate(&args[0])?.as_choice_array();
                let index = self.evaluate(&args[1])?.as_int().unwrap_or(-1);
                let picked = usize::try_from(index)
                    .ok()
                    .and_then(|i| array.get(i).cloned())
                    .unwrap_or_default();
                Ok(ResponseValue::Text(picked))
            }
            XlsFunction::Position => Ok(ResponseValue::Int(
                self.session.count_visits(self.current_name) as i64,
            )),
        }
    }
}

fn type_error(message: String) -> SurveyError {
    SurveyError::FormInvalid { reason: message }
}

fn numeric_pair(lhs: &ResponseValue, rhs: &ResponseValue) -> SurveyResult<(f64, f64)> {
    match (lhs.as_number(), rhs.as_number()) {
        (Some(a), Some(b)) => Ok((a, b)),
        _ => Err(type_error(format!(
            "arithmetic on non-numeric values: {lhs:?}, {rhs:?}"
        ))),
    }
}

fn arithmetic(op: &str, lhs: &ResponseValue, rhs: &ResponseValue) -> SurveyResult<ResponseValue> {
    // Integer pairs stay integral; anything else goes through f64
    if let (ResponseValue::Int(a), ResponseValue::Int(b)) = (lhs, rhs) {
        let result = match op {
            "+" => a.checked_add(*b),
            "-" => a.checked_sub(*b),
            "*" => a.checked_mul(*b),
            _ => a.checked_rem(*b),
        };
        if let Some(result) = result {
            return Ok(ResponseValue::Int(result));
        }
    }
    let (a, b) = numeric_pair(lhs, rhs)?;
    let result = match op {
        "+" => a + b,
        "-" => a - b,
        "*" => a * b,
        _ => a % b,
    };
    Ok(ResponseValue::Number(result))
}

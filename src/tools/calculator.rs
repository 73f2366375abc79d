//! Calculator tool - arithmetic without evaluating arbitrary code
//!
//! Grammar, loosest binding first:
//!
//! ```text
//! expr   := term (('+' | '-') term)*
//! term   := unary (('*' | '/' | '%') unary)*
//! unary  := ('+' | '-') unary | power
//! power  := atom ('**' unary)?
//! atom   := number | '(' expr ')'
//! ```
//!
//! Integers stay integers until a true division or a negative exponent.

use super::{Tool, ToolContext, ToolOutput};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::fmt;
use thiserror::Error;

pub struct CalculatorTool;

#[derive(Debug, Deserialize)]
struct CalculatorInput {
    expression: String,
}

#[async_trait]
impl Tool for CalculatorTool {
    fn name(&self) -> &'static str {
        "calculator"
    }

    fn description(&self) -> String {
        "Performs basic arithmetic calculations. Supports + - * / % ** and parentheses.".to_string()
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "required": ["expression"],
            "properties": {
                "expression": {
                    "type": "string",
                    "description": "Arithmetic expression, e.g. \"(1200 + 850) * 2\""
                }
            }
        })
    }

    async fn run(&self, input: Value, _ctx: ToolContext) -> ToolOutput {
        let input: CalculatorInput = match serde_json::from_value(input) {
            Ok(i) => i,
            Err(e) => return ToolOutput::error(format!("Invalid input: {e}")),
        };

        // Errors are part of the answer, the model reads them like any result
        match evaluate(&input.expression) {
            Ok(n) => ToolOutput::success(format!("Result: {n}")),
            Err(e) => ToolOutput::success(format!("Calculation error: {e}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum CalcError {
    #[error("invalid syntax at position {0}")]
    Syntax(usize),
    #[error("unexpected end of expression")]
    UnexpectedEnd,
    #[error("division by zero")]
    DivisionByZero,
    #[error("integer overflow")]
    Overflow,
    #[error("result is not a real number")]
    NotReal,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Number {
    Int(i64),
    Float(f64),
}

impl Number {
    #[allow(clippy::cast_precision_loss)]
    fn as_f64(self) -> f64 {
        match self {
            Number::Int(i) => i as f64,
            Number::Float(f) => f,
        }
    }

    fn is_zero(self) -> bool {
        match self {
            Number::Int(i) => i == 0,
            Number::Float(f) => f == 0.0,
        }
    }
}

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Number::Int(i) => write!(f, "{i}"),
            // Debug keeps the trailing ".0" on whole floats
            Number::Float(x) => write!(f, "{x:?}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Token {
    Num(Number),
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Pow,
    LParen,
    RParen,
}

fn tokenize(expression: &str) -> Result<Vec<(usize, Token)>, CalcError> {
    let chars: Vec<char> = expression.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        let token = match c {
            c if c.is_whitespace() => {
                i += 1;
                continue;
            }
            '0'..='9' | '.' => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.' || chars[i] == '_') {
                    i += 1;
                }
                let literal: String = chars[start..i].iter().filter(|c| **c != '_').collect();
                let number = if literal.contains('.') {
                    literal
                        .parse::<f64>()
                        .map(Number::Float)
                        .map_err(|_| CalcError::Syntax(start))?
                } else {
                    literal
                        .parse::<i64>()
                        .map(Number::Int)
                        .map_err(|_| CalcError::Overflow)?
                };
                tokens.push((start, Token::Num(number)));
                continue;
            }
            '+' => Token::Plus,
            '-' => Token::Minus,
            '*' if chars.get(i + 1) == Some(&'*') => {
                tokens.push((i, Token::Pow));
                i += 2;
                continue;
            }
            '*' => Token::Star,
            '/' => Token::Slash,
            '%' => Token::Percent,
            '(' => Token::LParen,
            ')' => Token::RParen,
            _ => return Err(CalcError::Syntax(i)),
        };
        tokens.push((i, token));
        i += 1;
    }

    Ok(tokens)
}

struct Parser {
    tokens: Vec<(usize, Token)>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<Token> {
        self.tokens.get(self.pos).map(|(_, t)| *t)
    }

    fn next(&mut self) -> Option<(usize, Token)> {
        let token = self.tokens.get(self.pos).copied();
        self.pos += 1;
        token
    }

    fn expr(&mut self) -> Result<Number, CalcError> {
        let mut value = self.term()?;
        while let Some(op @ (Token::Plus | Token::Minus)) = self.peek() {
            self.pos += 1;
            let rhs = self.term()?;
            value = if op == Token::Plus {
                add(value, rhs)?
            } else {
                sub(value, rhs)?
            };
        }
        Ok(value)
    }

    fn term(&mut self) -> Result<Number, CalcError> {
        let mut value = self.unary()?;
        while let Some(op @ (Token::Star | Token::Slash | Token::Percent)) = self.peek() {
            self.pos += 1;
            let rhs = self.unary()?;
            value = match op {
                Token::Star => mul(value, rhs)?,
                Token::Slash => div(value, rhs)?,
                _ => rem(value, rhs)?,
            };
        }
        Ok(value)
    }

    fn unary(&mut self) -> Result<Number, CalcError> {
        match self.peek() {
            Some(Token::Minus) => {
                self.pos += 1;
                let value = self.unary()?;
                sub(Number::Int(0), value)
            }
            Some(Token::Plus) => {
                self.pos += 1;
                self.unary()
            }
            _ => self.power(),
        }
    }

    fn power(&mut self) -> Result<Number, CalcError> {
        let base = self.atom()?;
        if self.peek() == Some(Token::Pow) {
            self.pos += 1;
            // Right associative, and binds tighter than a unary minus on its left
            let exponent = self.unary()?;
            return pow(base, exponent);
        }
        Ok(base)
    }

    fn atom(&mut self) -> Result<Number, CalcError> {
        match self.next() {
            Some((_, Token::Num(n))) => Ok(n),
            Some((_, Token::LParen)) => {
                let value = self.expr()?;
                match self.next() {
                    Some((_, Token::RParen)) => Ok(value),
                    Some((at, _)) => Err(CalcError::Syntax(at)),
                    None => Err(CalcError::UnexpectedEnd),
                }
            }
            Some((at, _)) => Err(CalcError::Syntax(at)),
            None => Err(CalcError::UnexpectedEnd),
        }
    }
}

fn float(x: f64) -> Result<Number, CalcError> {
    if x.is_finite() {
        Ok(Number::Float(x))
    } else if x.is_nan() {
        Err(CalcError::NotReal)
    } else {
        Err(CalcError::Overflow)
    }
}

fn add(a: Number, b: Number) -> Result<Number, CalcError> {
    match (a, b) {
        (Number::Int(x), Number::Int(y)) => x.checked_add(y).map(Number::Int).ok_or(CalcError::Overflow),
        _ => float(a.as_f64() + b.as_f64()),
    }
}

fn sub(a: Number, b: Number) -> Result<Number, CalcError> {
    match (a, b) {
        (Number::Int(x), Number::Int(y)) => x.checked_sub(y).map(Number::Int).ok_or(CalcError::Overflow),
        _ => float(a.as_f64() - b.as_f64()),
    }
}

fn mul(a: Number, b: Number) -> Result<Number, CalcError> {
    match (a, b) {
        (Number::Int(x), Number::Int(y)) => x.checked_mul(y).map(Number::Int).ok_or(CalcError::Overflow),
        _ => float(a.as_f64() * b.as_f64()),
    }
}

fn div(a: Number, b: Number) -> Result<Number, CalcError> {
    if b.is_zero() {
        return Err(CalcError::DivisionByZero);
    }
    float(a.as_f64() / b.as_f64())
}

/// Modulo takes the sign of the divisor
fn rem(a: Number, b: Number) -> Result<Number, CalcError> {
    if b.is_zero() {
        return Err(CalcError::DivisionByZero);
    }
    match (a, b) {
        (Number::Int(x), Number::Int(y)) => {
            let r = x.checked_rem(y).ok_or(CalcError::Overflow)?;
            Ok(Number::Int(if r != 0 && (r < 0) != (y < 0) { r + y } else { r }))
        }
        _ => {
            let (x, y) = (a.as_f64(), b.as_f64());
            let r = x % y;
            float(if r != 0.0 && (r < 0.0) != (y < 0.0) { r + y } else { r })
        }
    }
}

fn pow(base: Number, exponent: Number) -> Result<Number, CalcError> {
    match (base, exponent) {
        (Number::Int(b), Number::Int(e)) if e >= 0 => {
            let e = u32::try_from(e).map_err(|_| CalcError::Overflow)?;
            b.checked_pow(e).map(Number::Int).ok_or(CalcError::Overflow)
        }
        _ => {
            if base.is_zero() && exponent.as_f64() < 0.0 {
                return Err(CalcError::DivisionByZero);
            }
            float(base.as_f64().powf(exponent.as_f64()))
        }
    }
}

/// Evaluate an arithmetic expression
pub fn evaluate(expression: &str) -> Result<Number, CalcError> {
    let tokens = tokenize(expression)?;
    if tokens.is_empty() {
        return Err(CalcError::UnexpectedEnd);
    }
    let mut parser = Parser { tokens, pos: 0 };
    let value = parser.expr()?;
    match parser.tokens.get(parser.pos) {
        None => Ok(value),
        Some((at, _)) => Err(CalcError::Syntax(*at)),
    }
}

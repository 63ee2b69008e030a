use async_trait::async_trait;
use colloquy_plugin::{Result, Tool, ToolError};
use serde_json::Value;
use std::iter::Peekable;
use std::str::CharIndices;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error, PartialEq)]
pub enum EvalError {
    #[error("unexpected character '{0}' at position {1}")]
    UnexpectedChar(char, usize),

    #[error("unexpected end of expression")]
    UnexpectedEnd,

    #[error("invalid number '{0}'")]
    InvalidNumber(String),

    #[error("division by zero")]
    DivisionByZero,

    #[error("result is not a finite number")]
    NotFinite,
}

/// Evaluates an arithmetic expression.
///
/// Supports `+ - * / % ^`, parentheses, unary minus and decimal numbers.
/// `^` binds tighter than unary minus and is right-associative, so
/// `-2^2` is `-4` and `2^3^2` is `512`.
///
/// ```
/// assert_eq!(colloquy_std::evaluate("7 * 10").unwrap(), 70.0);
/// assert_eq!(colloquy_std::evaluate("(1 + 2) ^ 2 / 4").unwrap(), 2.25);
/// ```
pub fn evaluate(expression: &str) -> std::result::Result<f64, EvalError> {
    let mut parser = Parser {
        chars: expression.char_indices().peekable(),
        source: expression,
    };
    let value = parser.expression()?;
    parser.skip_whitespace();
    if let Some((pos, c)) = parser.chars.next() {
        return Err(EvalError::UnexpectedChar(c, pos));
    }
    if !value.is_finite() {
        return Err(EvalError::NotFinite);
    }
    Ok(value)
}

struct Parser<'a> {
    chars: Peekable<CharIndices<'a>>,
    source: &'a str,
}

impl<'a> Parser<'a> {
    fn skip_whitespace(&mut self) {
        while self.chars.next_if(|(_, c)| c.is_whitespace()).is_some() {}
    }

    fn peek(&mut self) -> Option<char> {
        self.skip_whitespace();
        self.chars.peek().map(|&(_, c)| c)
    }

    fn expression(&mut self) -> std::result::Result<f64, EvalError> {
        let mut value = self.term()?;
        while let Some(op @ ('+' | '-')) = self.peek() {
            self.chars.next();
            let rhs = self.term()?;
            value = if op == '+' { value + rhs } else { value - rhs };
        }
        Ok(value)
    }

    fn term(&mut self) -> std::result::Result<f64, EvalError> {
        let mut value = self.unary()?;
        while let Some(op @ ('*' | '/' | '%')) = self.peek() {
            self.chars.next();
            let rhs = self.unary()?;
            value = match op {
                '*' => value * rhs,
                _ if rhs == 0.0 => return Err(EvalError::DivisionByZero),
                '/' => value / rhs,
                _ => value % rhs,
            };
        }
        Ok(value)
    }

    fn unary(&mut self) -> std::result::Result<f64, EvalError> {
        match self.peek() {
            Some('-') => {
                self.chars.next();
                Ok(-self.unary()?)
            }
            Some('+') => {
                self.chars.next();
                self.unary()
            }
            _ => self.power(),
        }
    }

    fn power(&mut self) -> std::result::Result<f64, EvalError> {
        let base = self.primary()?;
        if self.peek() == Some('^') {
            self.chars.next();
            let exponent = self.unary()?;
            return Ok(base.powf(exponent));
        }
        Ok(base)
    }

    fn primary(&mut self) -> std::result::Result<f64, EvalError> {
        match self.peek() {
            Some('(') => {
                self.chars.next();
                let value = self.expression()?;
                match self.peek() {
                    Some(')') => {
                        self.chars.next();
                        Ok(value)
                    }
                    Some(c) => Err(EvalError::UnexpectedChar(c, self.position())),
                    None => Err(EvalError::UnexpectedEnd),
                }
            }
            Some(c) if c.is_ascii_digit() || c == '.' => self.number(),
            Some(c) => Err(EvalError::UnexpectedChar(c, self.position())),
            None => Err(EvalError::UnexpectedEnd),
        }
    }

    fn number(&mut self) -> std::result::Result<f64, EvalError> {
        let start = self.position();
        let mut end = start;
        while let Some((pos, c)) = self.chars.next_if(|(_, c)| c.is_ascii_digit() || *c == '.') {
            end = pos + c.len_utf8();
        }
        let literal = &self.source[start..end];
        literal
            .parse()
            .map_err(|_| EvalError::InvalidNumber(literal.to_string()))
    }

    fn position(&mut self) -> usize {
        self.chars.peek().map(|&(pos, _)| pos).unwrap_or(self.source.len())
    }
}

fn format_number(value: f64) -> String {
    if value == 0.0 {
        // Avoid "-0"
        return "0".to_string();
    }
    value.to_string()
}

/// Arithmetic tool backed by [`evaluate`].
#[derive(Debug, Default)]
pub struct CalculatorTool;

impl CalculatorTool {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Tool for CalculatorTool {
    fn name(&self) -> &str {
        "calculator"
    }

    fn description(&self) -> &str {
        "Evaluates an arithmetic expression such as '7 * 10' or '(2 + 3) ^ 2'. \
         Supports + - * / % ^ and parentheses."
    }

    fn input_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "required": ["input"],
            "properties": {
                "input": {
                    "type": "string",
                    "description": "The arithmetic expression to evaluate"
                }
            }
        })
    }

    async fn call(&self, input: &str) -> Result<String> {
        let value = evaluate(input).map_err(|e| ToolError::InvalidInput(format!("{}: {}", input, e)))?;
        debug!(expression = input, value, "Evaluated expression");
        Ok(format_number(value))
    }
}

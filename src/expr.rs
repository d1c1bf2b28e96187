//! Integer expressions and conditions for advanced scripts.
//!
//! Expressions: integer literals, identifiers (integer variables, unset
//! reads as 0), parentheses, unary minus and binary `+ - * / %`.
//! Multiplicative operators bind tighter than additive ones and both are
//! left associative. Arithmetic wraps, and division or modulo by zero
//! gives 0.
//!
//! Conditions: `||` and `&&` (split at paren depth 0, both sides always
//! evaluated), then one comparison (`== != <= >= < >`), else the value of
//! the expression tested against 0.

use std::collections::HashMap;
use std::iter::Peekable;
use std::str::Chars;

use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExprError {
    #[error("unexpected character '{0}'")]
    UnexpectedChar(char),

    #[error("unexpected end of expression")]
    UnexpectedEnd,

    #[error("unexpected token {0:?}")]
    UnexpectedToken(Token),

    #[error("missing closing parenthesis")]
    UnclosedParen,
}

/// Source of integer variable values.
pub trait IntEnv {
    fn int_var(&self, name: &str) -> Option<i32>;
}

impl IntEnv for HashMap<String, i32> {
    fn int_var(&self, name: &str) -> Option<i32> {
        self.get(name).copied()
    }
}

/// Environment with no variables.
pub struct NoVars;

impl IntEnv for NoVars {
    fn int_var(&self, _name: &str) -> Option<i32> {
        None
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    Num(i32),
    Ident(String),
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    LParen,
    RParen,
}

/// Split an expression into tokens.
pub fn tokenize(expr: &str) -> Result<Vec<Token>, ExprError> {
    let mut tokens = Vec::new();
    let mut chars = expr.chars().peekable();
    while let Some(&ch) = chars.peek() {
        match ch {
            c if c.is_whitespace() => {
                chars.next();
            }
            '0'..='9' => tokens.push(Token::Num(read_number(&mut chars))),
            c if c.is_ascii_alphabetic() || c == '_' => {
                let mut name = String::new();
                while let Some(&c) = chars.peek() {
                    if c.is_ascii_alphanumeric() || c == '_' {
                        name.push(c);
                        chars.next();
                    } else {
                        break;
                    }
                }
                tokens.push(Token::Ident(name));
            }
            _ => {
                chars.next();
                tokens.push(match ch {
                    '+' => Token::Plus,
                    '-' => Token::Minus,
                    '*' => Token::Star,
                    '/' => Token::Slash,
                    '%' => Token::Percent,
                    '(' => Token::LParen,
                    ')' => Token::RParen,
                    other => return Err(ExprError::UnexpectedChar(other)),
                });
            }
        }
    }
    Ok(tokens)
}

fn read_number(chars: &mut Peekable<Chars<'_>>) -> i32 {
    let mut value: i32 = 0;
    while let Some(d) = chars.peek().and_then(|c| c.to_digit(10)) {
        value = value.wrapping_mul(10).wrapping_add(d as i32);
        chars.next();
    }
    value
}

struct Parser<'a, E: IntEnv + ?Sized> {
    tokens: &'a [Token],
    pos: usize,
    env: &'a E,
}

impl<'a, E: IntEnv + ?Sized> Parser<'a, E> {
    fn peek(&self) -> Option<&'a Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<&'a Token> {
        let token = self.tokens.get(self.pos);
        self.pos += 1;
        token
    }

    fn expr(&mut self) -> Result<i32, ExprError> {
        let mut value = self.term()?;
        loop {
            match self.peek() {
                Some(Token::Plus) => {
                    self.pos += 1;
                    value = value.wrapping_add(self.term()?);
                }
                Some(Token::Minus) => {
                    self.pos += 1;
                    value = value.wrapping_sub(self.term()?);
                }
                _ => return Ok(value),
            }
        }
    }

    fn term(&mut self) -> Result<i32, ExprError> {
        let mut value = self.unary()?;
        loop {
            let op = match self.peek() {
                Some(Token::Star) => Token::Star,
                Some(Token::Slash) => Token::Slash,
                Some(Token::Percent) => Token::Percent,
                _ => return Ok(value),
            };
            self.pos += 1;
            let rhs = self.unary()?;
            value = match op {
                Token::Star => value.wrapping_mul(rhs),
                Token::Slash if rhs == 0 => 0,
                Token::Slash => value.wrapping_div(rhs),
                Token::Percent if rhs == 0 => 0,
                _ => value.wrapping_rem(rhs),
            };
        }
    }

    fn unary(&mut self) -> Result<i32, ExprError> {
        match self.peek() {
            Some(Token::Minus) => {
                self.pos += 1;
                Ok(self.unary()?.wrapping_neg())
            }
            Some(Token::Plus) => {
                self.pos += 1;
                self.unary()
            }
            _ => self.primary(),
        }
    }

    fn primary(&mut self) -> Result<i32, ExprError> {
        match self.next() {
            Some(Token::Num(n)) => Ok(*n),
            Some(Token::Ident(name)) => Ok(self.env.int_var(name).unwrap_or(0)),
            Some(Token::LParen) => {
                let value = self.expr()?;
                match self.next() {
                    Some(Token::RParen) => Ok(value),
                    _ => Err(ExprError::UnclosedParen),
                }
            }
            Some(other) => Err(ExprError::UnexpectedToken(other.clone())),
            None => Err(ExprError::UnexpectedEnd),
        }
    }
}

/// Evaluate an expression, reporting parse errors.
pub fn try_evaluate<E: IntEnv + ?Sized>(expr: &str, env: &E) -> Result<i32, ExprError> {
    let tokens = tokenize(expr)?;
    let mut parser = Parser {
        tokens: &tokens,
        pos: 0,
        env,
    };
    let value = parser.expr()?;
    match parser.peek() {
        None => Ok(value),
        Some(extra) => Err(ExprError::UnexpectedToken(extra.clone())),
    }
}

/// Evaluate an expression. Anything unparseable is 0.
pub fn evaluate<E: IntEnv + ?Sized>(expr: &str, env: &E) -> i32 {
    try_evaluate(expr, env).unwrap_or_else(|e| {
        debug!("Expression \"{expr}\" evaluates to 0: {e}");
        0
    })
}

/// Byte offset of the first `pat` outside parentheses.
fn find_top_level(s: &str, pat: &str) -> Option<usize> {
    let bytes = s.as_bytes();
    let mut depth = 0i32;
    for i in 0..bytes.len() {
        match bytes[i] {
            b'(' => depth += 1,
            b')' => depth -= 1,
            _ if depth == 0 && bytes[i..].starts_with(pat.as_bytes()) => return Some(i),
            _ => {}
        }
    }
    None
}

/// Whether the whole string is one parenthesized group.
fn is_wrapped(s: &str) -> bool {
    if !(s.starts_with('(') && s.ends_with(')')) {
        return false;
    }
    let mut depth = 0i32;
    for (i, b) in s.bytes().enumerate() {
        match b {
            b'(' => depth += 1,
            b')' => {
                depth -= 1;
                if depth == 0 && i != s.len() - 1 {
                    return false;
                }
            }
            _ => {}
        }
    }
    depth == 0
}

const COMPARISONS: [&str; 6] = ["==", "!=", "<=", ">=", "<", ">"];

pub fn evaluate_condition<E: IntEnv + ?Sized>(cond: &str, env: &E) -> bool {
    let cond = cond.trim();

    for (op, is_or) in [("||", true), ("&&", false)] {
        if let Some(i) = find_top_level(cond, op) {
            let left = evaluate_condition(&cond[..i], env);
            let right = evaluate_condition(&cond[i + op.len()..], env);
            return if is_or { left || right } else { left && right };
        }
    }

    for op in COMPARISONS {
        if let Some(i) = find_top_level(cond, op) {
            let left = evaluate(&cond[..i], env);
            let right = evaluate(&cond[i + op.len()..], env);
            return match op {
                "==" => left == right,
                "!=" => left != right,
                "<=" => left <= right,
                ">=" => left >= right,
                "<" => left < right,
                _ => left > right,
            };
        }
    }

    if is_wrapped(cond) {
        return evaluate_condition(&cond[1..cond.len() - 1], env);
    }

    evaluate(cond, env) != 0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, i32)]) -> HashMap<String, i32> {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    // --- evaluate tests ---

    #[test]
    fn test_precedence() {
        assert_eq!(evaluate("2+3*4", &NoVars), 14);
        assert_eq!(evaluate("(2+3)*4", &NoVars), 20);
        assert_eq!(evaluate("10-4-3", &NoVars), 3);
        assert_eq!(evaluate("100/10/5", &NoVars), 2);
        assert_eq!(evaluate("7%4*2", &NoVars), 6);
    }

    #[test]
    fn test_divide_by_zero_is_zero() {
        for x in [-5, 0, 1, 42, i32::MAX] {
            let env = vars(&[("x", x)]);
            assert_eq!(evaluate("x/0", &env), 0);
            assert_eq!(evaluate("x%0", &env), 0);
        }
    }

    #[test]
    fn test_negative_numbers() {
        assert_eq!(evaluate("-5", &NoVars), -5);
        assert_eq!(evaluate("3*-2", &NoVars), -6);
        assert_eq!(evaluate("2--3", &NoVars), 5);
        assert_eq!(evaluate("-(1+2)", &NoVars), -3);
    }

    #[test]
    fn test_variables() {
        let env = vars(&[("count", 7), ("step_2", 3)]);
        assert_eq!(evaluate("count * step_2 + 1", &env), 22);
        assert_eq!(evaluate("missing + 1", &env), 1);
    }

    #[test]
    fn test_wrapping() {
        assert_eq!(evaluate("2147483647+1", &NoVars), i32::MIN);
        let env = vars(&[("m", i32::MIN)]);
        assert_eq!(evaluate("m/-1", &env), i32::MIN);
    }

    #[test]
    fn test_garbage_is_zero() {
        assert_eq!(evaluate("", &NoVars), 0);
        assert_eq!(evaluate("2 +", &NoVars), 0);
        assert_eq!(evaluate("(1+2", &NoVars), 0);
        assert_eq!(evaluate("\"text\"", &NoVars), 0);
        assert_eq!(evaluate("1 2", &NoVars), 0);
        assert!(matches!(
            try_evaluate("4 # 2", &NoVars),
            Err(ExprError::UnexpectedChar('#'))
        ));
    }

    // --- condition tests ---

    #[test]
    fn test_comparison_priority() {
        assert!(evaluate_condition("3>=3", &NoVars));
        assert!(evaluate_condition("3<=3", &NoVars));
        assert!(!evaluate_condition("3>3", &NoVars));
        assert!(evaluate_condition("2 < 3", &NoVars));
        assert!(evaluate_condition("1+1 == 2", &NoVars));
        assert!(evaluate_condition("1 != 2", &NoVars));
    }

    #[test]
    fn test_logical_operators() {
        let env = vars(&[("a", 1), ("b", 0)]);
        assert!(evaluate_condition("a == 1 && b == 0", &env));
        assert!(!evaluate_condition("a == 1 && b == 1", &env));
        assert!(evaluate_condition("b == 1 || a == 1", &env));
        // && binds tighter than ||
        assert!(evaluate_condition("a == 1 || b == 1 && b == 2", &env));
    }

    #[test]
    fn test_bare_expression_condition() {
        let env = vars(&[("x", 3)]);
        assert!(evaluate_condition("x", &env));
        assert!(!evaluate_condition("x - 3", &env));
        assert!(!evaluate_condition("y", &env));
    }

    #[test]
    fn test_parenthesized_condition() {
        let env = vars(&[("x", 5)]);
        assert!(evaluate_condition("(x > 3)", &env));
        assert!(evaluate_condition("(x > 3) && (x < 10)", &env));
        assert!(!evaluate_condition("((x == 4))", &env));
        assert!(evaluate_condition("(x + 1) * 2 == 12", &env));
    }
}

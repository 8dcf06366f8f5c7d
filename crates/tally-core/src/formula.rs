//! # Formula Evaluator
//!
//! A small sandboxed arithmetic language for dynamic (tiered) pricing rules.
//!
//! ## Grammar
//! ```text
//! expr    := term (('+' | '-') term)*
//! term    := power (('*' | '/') power)*
//! power   := unary ('^' power)?
//! unary   := '-' unary | primary
//! primary := NUMBER
//!          | IDENT
//!          | IDENT '(' expr (',' expr)* ')'
//!          | '(' expr ')'
//! ```
//!
//! ## Scope
//! ```text
//! ┌──────────────┬────────────────────────────────────────────┐
//! │ basePrice    │ product base price, in minor units         │
//! │ quantity     │ line quantity as a decimal (1.5 = 1.5 kg)  │
//! │ weight       │ same value as quantity                     │
//! └──────────────┴────────────────────────────────────────────┘
//! functions: min(a, b, ...)  max(a, b, ...)  round(x)  floor(x)  ceil(x)  abs(x)
//! ```
//!
//! There are no assignments, loops, strings or host calls. Source length and
//! nesting depth are bounded, so evaluation always terminates quickly.
//!
//! ## Example
//! ```rust
//! use tally_core::formula::{evaluate, Scope};
//!
//! let scope = Scope { base_price: 500.0, quantity: 12.0, weight: 12.0 };
//! // 10% off from 10 units up
//! let unit = evaluate("basePrice * (1 - 0.1 * min(1, floor(quantity / 10)))", &scope).unwrap();
//! assert_eq!(unit.round(), 450.0);
//! ```

use thiserror::Error;

/// Maximum formula length in bytes.
pub const MAX_FORMULA_LEN: usize = 256;

/// Maximum nesting of parentheses, unary minus and exponent chains.
pub const MAX_DEPTH: usize = 32;

/// Variables visible to a formula.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Scope {
    pub base_price: f64,
    pub quantity: f64,
    pub weight: f64,
}

/// Why a formula could not be evaluated.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FormulaError {
    #[error("formula is {len} bytes long (max {max})")]
    TooLong { len: usize, max: usize },

    #[error("unexpected character '{ch}' at {pos}")]
    UnexpectedChar { ch: char, pos: usize },

    #[error("unexpected '{found}' at {pos}")]
    UnexpectedToken { found: String, pos: usize },

    #[error("unexpected end of formula")]
    UnexpectedEnd,

    #[error("unknown variable '{0}'")]
    UnknownVariable(String),

    #[error("unknown function '{0}'")]
    UnknownFunction(String),

    #[error("{name}() expects {expected} argument(s), got {got}")]
    WrongArity {
        name: String,
        expected: &'static str,
        got: usize,
    },

    #[error("division by zero")]
    DivisionByZero,

    #[error("result is not a finite number")]
    NonFinite,

    #[error("formula nests deeper than {max}")]
    TooDeep { max: usize },
}

/// Evaluates `source` against `scope`.
///
/// Returns a finite number or a [`FormulaError`]. Never panics.
pub fn evaluate(source: &str, scope: &Scope) -> Result<f64, FormulaError> {
    if source.len() > MAX_FORMULA_LEN {
        return Err(FormulaError::TooLong {
            len: source.len(),
            max: MAX_FORMULA_LEN,
        });
    }

    let tokens = tokenize(source)?;
    let mut parser = Parser {
        tokens: &tokens,
        pos: 0,
        depth: 0,
        scope,
    };

    let value = parser.expr()?;
    if let Some((token, pos)) = parser.peek_with_pos() {
        return Err(FormulaError::UnexpectedToken {
            found: token.to_string(),
            pos,
        });
    }
    finite(value)
}

// =============================================================================
// Tokenizer
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    Ident(String),
    Plus,
    Minus,
    Star,
    Slash,
    Caret,
    LParen,
    RParen,
    Comma,
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Token::Number(n) => write!(f, "{}", n),
            Token::Ident(s) => f.write_str(s),
            Token::Plus => f.write_str("+"),
            Token::Minus => f.write_str("-"),
            Token::Star => f.write_str("*"),
            Token::Slash => f.write_str("/"),
            Token::Caret => f.write_str("^"),
            Token::LParen => f.write_str("("),
            Token::RParen => f.write_str(")"),
            Token::Comma => f.write_str(","),
        }
    }
}

fn tokenize(source: &str) -> Result<Vec<(Token, usize)>, FormulaError> {
    let mut tokens = Vec::new();
    let bytes = source.as_bytes();
    let mut i = 0;

    while i < bytes.len() {
        let c = bytes[i] as char;
        let start = i;

        let token = match c {
            ' ' | '\t' | '\n' | '\r' => {
                i += 1;
                continue;
            }
            '+' => Token::Plus,
            '-' => Token::Minus,
            '*' => Token::Star,
            '/' => Token::Slash,
            '^' => Token::Caret,
            '(' => Token::LParen,
            ')' => Token::RParen,
            ',' => Token::Comma,
            '0'..='9' | '.' => {
                while i < bytes.len() && (bytes[i].is_ascii_digit() || bytes[i] == b'.') {
                    i += 1;
                }
                let text = &source[start..i];
                let n = text
                    .parse::<f64>()
                    .map_err(|_| FormulaError::UnexpectedToken {
                        found: text.to_string(),
                        pos: start,
                    })?;
                tokens.push((Token::Number(n), start));
                continue;
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                while i < bytes.len() && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_') {
                    i += 1;
                }
                tokens.push((Token::Ident(source[start..i].to_string()), start));
                continue;
            }
            _ => {
                // report the full char, not the byte
                let ch = source[start..].chars().next().unwrap_or(c);
                return Err(FormulaError::UnexpectedChar { ch, pos: start });
            }
        };

        tokens.push((token, start));
        i += 1;
    }

    Ok(tokens)
}

// =============================================================================
// Parser / Evaluator
// =============================================================================

struct Parser<'a> {
    tokens: &'a [(Token, usize)],
    pos: usize,
    depth: usize,
    scope: &'a Scope,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<&'a Token> {
        self.tokens.get(self.pos).map(|(t, _)| t)
    }

    fn peek_with_pos(&self) -> Option<(&'a Token, usize)> {
        self.tokens.get(self.pos).map(|(t, p)| (t, *p))
    }

    fn next(&mut self) -> Option<(&'a Token, usize)> {
        let item = self.peek_with_pos();
        if item.is_some() {
            self.pos += 1;
        }
        item
    }

    fn expect(&mut self, expected: Token) -> Result<(), FormulaError> {
        match self.next() {
            Some((t, _)) if *t == expected => Ok(()),
            Some((t, pos)) => Err(FormulaError::UnexpectedToken {
                found: t.to_string(),
                pos,
            }),
            None => Err(FormulaError::UnexpectedEnd),
        }
    }

    fn descend(&mut self) -> Result<(), FormulaError> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(FormulaError::TooDeep { max: MAX_DEPTH });
        }
        Ok(())
    }

    fn ascend(&mut self) {
        self.depth -= 1;
    }

    fn expr(&mut self) -> Result<f64, FormulaError> {
        let mut value = self.term()?;
        loop {
            match self.peek() {
                Some(Token::Plus) => {
                    self.pos += 1;
                    value += self.term()?;
                }
                Some(Token::Minus) => {
                    self.pos += 1;
                    value -= self.term()?;
                }
                _ => return Ok(value),
            }
        }
    }

    fn term(&mut self) -> Result<f64, FormulaError> {
        let mut value = self.power()?;
        loop {
            match self.peek() {
                Some(Token::Star) => {
                    self.pos += 1;
                    value *= self.power()?;
                }
                Some(Token::Slash) => {
                    self.pos += 1;
                    let divisor = self.power()?;
                    if divisor == 0.0 {
                        return Err(FormulaError::DivisionByZero);
                    }
                    value /= divisor;
                }
                _ => return Ok(value),
            }
        }
    }

    fn power(&mut self) -> Result<f64, FormulaError> {
        let base = self.unary()?;
        if let Some(Token::Caret) = self.peek() {
            self.pos += 1;
            self.descend()?;
            let exponent = self.power()?;
            self.ascend();
            return finite(base.powf(exponent));
        }
        Ok(base)
    }

    fn unary(&mut self) -> Result<f64, FormulaError> {
        self.descend()?;
        let value = if let Some(Token::Minus) = self.peek() {
            self.pos += 1;
            -self.unary()?
        } else {
            self.primary()?
        };
        self.ascend();
        Ok(value)
    }

    fn primary(&mut self) -> Result<f64, FormulaError> {
        match self.next() {
            Some((Token::Number(n), _)) => Ok(*n),
            Some((Token::LParen, _)) => {
                let value = self.expr()?;
                self.expect(Token::RParen)?;
                Ok(value)
            }
            Some((Token::Ident(name), _)) => {
                if let Some(Token::LParen) = self.peek() {
                    self.pos += 1;
                    let args = self.arguments()?;
                    call(name, &args)
                } else {
                    self.variable(name)
                }
            }
            Some((t, pos)) => Err(FormulaError::UnexpectedToken {
                found: t.to_string(),
                pos,
            }),
            None => Err(FormulaError::UnexpectedEnd),
        }
    }

    /// Parses `expr (',' expr)* ')'`; the opening paren is already consumed.
    fn arguments(&mut self) -> Result<Vec<f64>, FormulaError> {
        let mut args = vec![self.expr()?];
        loop {
            match self.next() {
                Some((Token::Comma, _)) => args.push(self.expr()?),
                Some((Token::RParen, _)) => return Ok(args),
                Some((t, pos)) => {
                    return Err(FormulaError::UnexpectedToken {
                        found: t.to_string(),
                        pos,
                    })
                }
                None => return Err(FormulaError::UnexpectedEnd),
            }
        }
    }

    fn variable(&self, name: &str) -> Result<f64, FormulaError> {
        match name {
            "basePrice" => Ok(self.scope.base_price),
            "quantity" => Ok(self.scope.quantity),
            "weight" => Ok(self.scope.weight),
            _ => Err(FormulaError::UnknownVariable(name.to_string())),
        }
    }
}

fn call(name: &str, args: &[f64]) -> Result<f64, FormulaError> {
    let unary = |f: fn(f64) -> f64| -> Result<f64, FormulaError> {
        match args {
            [x] => Ok(f(*x)),
            _ => Err(FormulaError::WrongArity {
                name: name.to_string(),
                expected: "1",
                got: args.len(),
            }),
        }
    };

    match name {
        "min" | "max" => {
            if args.len() < 2 {
                return Err(FormulaError::WrongArity {
                    name: name.to_string(),
                    expected: "at least 2",
                    got: args.len(),
                });
            }
            let fold: fn(f64, f64) -> f64 = if name == "min" { f64::min } else { f64::max };
            Ok(args[1..].iter().fold(args[0], |acc, x| fold(acc, *x)))
        }
        "round" => unary(f64::round),
        "floor" => unary(f64::floor),
        "ceil" => unary(f64::ceil),
        "abs" => unary(f64::abs),
        _ => Err(FormulaError::UnknownFunction(name.to_string())),
    }
}

fn finite(value: f64) -> Result<f64, FormulaError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(FormulaError::NonFinite)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn scope() -> Scope {
        Scope {
            base_price: 200.0,
            quantity: 2.5,
            weight: 2.5,
        }
    }

    fn eval(src: &str) -> Result<f64, FormulaError> {
        evaluate(src, &scope())
    }

    #[test]
    fn test_precedence() {
        assert_eq!(eval("1 + 2 * 3").unwrap(), 7.0);
        assert_eq!(eval("(1 + 2) * 3").unwrap(), 9.0);
        assert_eq!(eval("2 ^ 3 ^ 2").unwrap(), 512.0);
        assert_eq!(eval("-2 ^ 2").unwrap(), 4.0);
        assert_eq!(eval("10 - 4 - 3").unwrap(), 3.0);
        assert_eq!(eval("12 / 4 / 3").unwrap(), 1.0);
    }

    #[test]
    fn test_variables() {
        assert_eq!(eval("basePrice").unwrap(), 200.0);
        assert!((eval("basePrice * 0.9").unwrap() - 180.0).abs() < 1e-9);
        assert_eq!(eval("weight + quantity").unwrap(), 5.0);
    }

    #[test]
    fn test_functions() {
        assert_eq!(eval("min(3, 1, 2)").unwrap(), 1.0);
        assert_eq!(eval("max(basePrice, 250)").unwrap(), 250.0);
        assert_eq!(eval("round(2.5)").unwrap(), 3.0);
        assert_eq!(eval("floor(quantity)").unwrap(), 2.0);
        assert_eq!(eval("ceil(quantity)").unwrap(), 3.0);
        assert_eq!(eval("abs(-4)").unwrap(), 4.0);
    }

    #[test]
    fn test_tiered_discount() {
        let s = Scope {
            base_price: 1000.0,
            quantity: 5.0,
            weight: 5.0,
        };
        let f = "basePrice * (1 - 0.05 * min(2, floor(weight / 5)))";
        assert!((evaluate(f, &s).unwrap() - 950.0).abs() < 1e-9);
    }

    #[test]
    fn test_errors() {
        assert_eq!(eval("1 / 0"), Err(FormulaError::DivisionByZero));
        assert_eq!(eval("price"), Err(FormulaError::UnknownVariable("price".into())));
        assert_eq!(eval("sqrt(4)"), Err(FormulaError::UnknownFunction("sqrt".into())));
        assert!(matches!(eval("min(1)"), Err(FormulaError::WrongArity { .. })));
        assert!(matches!(eval("abs(1, 2)"), Err(FormulaError::WrongArity { .. })));
        assert_eq!(eval("1 +"), Err(FormulaError::UnexpectedEnd));
        assert!(matches!(eval("1 2"), Err(FormulaError::UnexpectedToken { .. })));
        assert!(matches!(eval("(1"), Err(FormulaError::UnexpectedEnd)));
        assert!(matches!(
            eval("basePrice; drop"),
            Err(FormulaError::UnexpectedChar { ch: ';', .. })
        ));
        assert!(matches!(eval("1.2.3"), Err(FormulaError::UnexpectedToken { .. })));
        assert_eq!(eval("10 ^ 400"), Err(FormulaError::NonFinite));
    }

    #[test]
    fn test_limits() {
        let long = "1+".repeat(200) + "1";
        assert!(matches!(eval(&long), Err(FormulaError::TooLong { .. })));

        let deep = "(".repeat(40) + "1" + &")".repeat(40);
        assert_eq!(eval(&deep), Err(FormulaError::TooDeep { max: MAX_DEPTH }));

        let ok = "(".repeat(10) + "1" + &")".repeat(10);
        assert_eq!(eval(&ok).unwrap(), 1.0);
    }
}

//! The project expression evaluator.
//!
//! Data-node arguments are stored as text and interpreted lazily. This module evaluates
//! that text: numeric literals in the three source bases (`$` hexadecimal, `%` binary,
//! plain decimal), symbolic constants resolved through the project
//! [`crate::project::ConstantsMapping`], and arithmetic over them.
//!
//! # Grammar
//!
//! Binary operators in ascending precedence: `|`, `^`, `&`, `<<` `>>`, `+` `-`, `*` `/`;
//! unary `-` and `~`; parenthesized subexpressions. All arithmetic is wrapping 64-bit
//! signed; division by zero is an evaluation failure, not a panic.
//!
//! Every failure surfaces as [`crate::Error::Eval`] - malformed numeric text is an
//! evaluation failure, deliberately distinct from the label-lookup and structural
//! error categories.

use crate::{project::ConstantsMapping, Error, Result};

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(i64),
    Ident(String),
    Plus,
    Minus,
    Star,
    Slash,
    Amp,
    Pipe,
    Caret,
    Tilde,
    Shl,
    Shr,
    LParen,
    RParen,
}

fn eval_error(message: impl Into<String>) -> Error {
    Error::Eval(message.into())
}

fn lex(text: &str) -> Result<Vec<Token>> {
    let mut tokens = Vec::new();
    let bytes = text.as_bytes();
    let mut i = 0usize;
    while i < bytes.len() {
        let b = bytes[i];
        match b {
            b' ' | b'\t' | b'\r' | b'\n' => i += 1,
            b'$' => {
                let start = i + 1;
                let mut end = start;
                while end < bytes.len() && bytes[end].is_ascii_hexdigit() {
                    end += 1;
                }
                if end == start {
                    return Err(eval_error(format!("'{text}': '$' without hex digits")));
                }
                let value = i64::from_str_radix(&text[start..end], 16)
                    .map_err(|e| eval_error(format!("'{text}': {e}")))?;
                tokens.push(Token::Number(value));
                i = end;
            }
            b'%' => {
                let start = i + 1;
                let mut end = start;
                while end < bytes.len() && (bytes[end] == b'0' || bytes[end] == b'1') {
                    end += 1;
                }
                if end == start {
                    return Err(eval_error(format!("'{text}': '%' without binary digits")));
                }
                let value = i64::from_str_radix(&text[start..end], 2)
                    .map_err(|e| eval_error(format!("'{text}': {e}")))?;
                tokens.push(Token::Number(value));
                i = end;
            }
            b'0'..=b'9' => {
                let start = i;
                let mut end = i;
                while end < bytes.len() && bytes[end].is_ascii_digit() {
                    end += 1;
                }
                let value: i64 = text[start..end]
                    .parse()
                    .map_err(|e| eval_error(format!("'{text}': {e}")))?;
                tokens.push(Token::Number(value));
                i = end;
            }
            b'+' => {
                tokens.push(Token::Plus);
                i += 1;
            }
            b'-' => {
                tokens.push(Token::Minus);
                i += 1;
            }
            b'*' => {
                tokens.push(Token::Star);
                i += 1;
            }
            b'/' => {
                tokens.push(Token::Slash);
                i += 1;
            }
            b'&' => {
                tokens.push(Token::Amp);
                i += 1;
            }
            b'|' => {
                tokens.push(Token::Pipe);
                i += 1;
            }
            b'^' => {
                tokens.push(Token::Caret);
                i += 1;
            }
            b'~' => {
                tokens.push(Token::Tilde);
                i += 1;
            }
            b'(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            b')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            b'<' | b'>' => {
                if i + 1 < bytes.len() && bytes[i + 1] == b {
                    tokens.push(if b == b'<' { Token::Shl } else { Token::Shr });
                    i += 2;
                } else {
                    return Err(eval_error(format!("'{text}': single '{}'", b as char)));
                }
            }
            _ if b.is_ascii_alphabetic() || b == b'_' => {
                let start = i;
                let mut end = i;
                while end < bytes.len()
                    && (bytes[end].is_ascii_alphanumeric() || bytes[end] == b'_')
                {
                    end += 1;
                }
                tokens.push(Token::Ident(text[start..end].to_string()));
                i = end;
            }
            _ => {
                return Err(eval_error(format!(
                    "'{text}': unexpected character '{}'",
                    text[i..].chars().next().unwrap_or('?')
                )));
            }
        }
    }
    Ok(tokens)
}

struct Parser<'a> {
    text: &'a str,
    tokens: Vec<Token>,
    pos: usize,
    constants: &'a ConstantsMapping,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn bump(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn or_expr(&mut self) -> Result<i64> {
        let mut value = self.xor_expr()?;
        while matches!(self.peek(), Some(Token::Pipe)) {
            self.bump();
            value |= self.xor_expr()?;
        }
        Ok(value)
    }

    fn xor_expr(&mut self) -> Result<i64> {
        let mut value = self.and_expr()?;
        while matches!(self.peek(), Some(Token::Caret)) {
            self.bump();
            value ^= self.and_expr()?;
        }
        Ok(value)
    }

    fn and_expr(&mut self) -> Result<i64> {
        let mut value = self.shift_expr()?;
        while matches!(self.peek(), Some(Token::Amp)) {
            self.bump();
            value &= self.shift_expr()?;
        }
        Ok(value)
    }

    fn shift_expr(&mut self) -> Result<i64> {
        let mut value = self.add_expr()?;
        loop {
            match self.peek() {
                Some(Token::Shl) => {
                    self.bump();
                    let amount = self.add_expr()?;
                    value = value.wrapping_shl(amount as u32);
                }
                Some(Token::Shr) => {
                    self.bump();
                    let amount = self.add_expr()?;
                    value = value.wrapping_shr(amount as u32);
                }
                _ => return Ok(value),
            }
        }
    }

    fn add_expr(&mut self) -> Result<i64> {
        let mut value = self.mul_expr()?;
        loop {
            match self.peek() {
                Some(Token::Plus) => {
                    self.bump();
                    value = value.wrapping_add(self.mul_expr()?);
                }
                Some(Token::Minus) => {
                    self.bump();
                    value = value.wrapping_sub(self.mul_expr()?);
                }
                _ => return Ok(value),
            }
        }
    }

    fn mul_expr(&mut self) -> Result<i64> {
        let mut value = self.unary_expr()?;
        loop {
            match self.peek() {
                Some(Token::Star) => {
                    self.bump();
                    value = value.wrapping_mul(self.unary_expr()?);
                }
                Some(Token::Slash) => {
                    self.bump();
                    let divisor = self.unary_expr()?;
                    if divisor == 0 {
                        return Err(eval_error(format!("'{}': division by zero", self.text)));
                    }
                    value = value.wrapping_div(divisor);
                }
                _ => return Ok(value),
            }
        }
    }

    fn unary_expr(&mut self) -> Result<i64> {
        match self.peek() {
            Some(Token::Minus) => {
                self.bump();
                Ok(self.unary_expr()?.wrapping_neg())
            }
            Some(Token::Tilde) => {
                self.bump();
                Ok(!self.unary_expr()?)
            }
            _ => self.primary(),
        }
    }

    fn primary(&mut self) -> Result<i64> {
        match self.bump() {
            Some(Token::Number(value)) => Ok(value),
            Some(Token::Ident(name)) => self.constants.value_of(&name).ok_or_else(|| {
                eval_error(format!("'{}': unknown identifier '{name}'", self.text))
            }),
            Some(Token::LParen) => {
                let value = self.or_expr()?;
                match self.bump() {
                    Some(Token::RParen) => Ok(value),
                    _ => Err(eval_error(format!("'{}': missing ')'", self.text))),
                }
            }
            other => Err(eval_error(format!(
                "'{}': expected a value, found {other:?}",
                self.text
            ))),
        }
    }
}

/// Evaluates argument text to a numeric value.
pub(crate) fn evaluate(text: &str, constants: &ConstantsMapping) -> Result<i64> {
    let tokens = lex(text)?;
    if tokens.is_empty() {
        return Err(eval_error(format!("'{text}': empty expression")));
    }
    let mut parser = Parser {
        text,
        tokens,
        pos: 0,
        constants,
    };
    let value = parser.or_expr()?;
    if parser.pos != parser.tokens.len() {
        return Err(eval_error(format!("'{text}': trailing input")));
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eval(text: &str) -> Result<i64> {
        evaluate(text, &ConstantsMapping::new())
    }

    #[test]
    fn literals_in_all_bases() {
        assert_eq!(eval("$1a").unwrap(), 0x1a);
        assert_eq!(eval("%1010").unwrap(), 10);
        assert_eq!(eval("42").unwrap(), 42);
    }

    #[test]
    fn precedence_and_grouping() {
        assert_eq!(eval("2+3*4").unwrap(), 14);
        assert_eq!(eval("(2+3)*4").unwrap(), 20);
        assert_eq!(eval("$10|%0001").unwrap(), 0x11);
        assert_eq!(eval("1<<4 | 3").unwrap(), 19);
        assert_eq!(eval("$f0 & $1f").unwrap(), 0x10);
    }

    #[test]
    fn unary_operators() {
        assert_eq!(eval("-5").unwrap(), -5);
        assert_eq!(eval("~0").unwrap(), -1);
        assert_eq!(eval("- -3").unwrap(), 3);
    }

    #[test]
    fn constants_resolve() {
        let constants = ConstantsMapping::new();
        constants.define("TREASURE_SWORD", 0x05);
        assert_eq!(evaluate("TREASURE_SWORD+1", &constants).unwrap(), 6);
    }

    #[test]
    fn failures_are_eval_errors() {
        assert!(matches!(eval(""), Err(crate::Error::Eval(_))));
        assert!(matches!(eval("$"), Err(crate::Error::Eval(_))));
        assert!(matches!(eval("NO_SUCH_NAME"), Err(crate::Error::Eval(_))));
        assert!(matches!(eval("1/0"), Err(crate::Error::Eval(_))));
        assert!(matches!(eval("(1+2"), Err(crate::Error::Eval(_))));
        assert!(matches!(eval("1 2"), Err(crate::Error::Eval(_))));
    }
}

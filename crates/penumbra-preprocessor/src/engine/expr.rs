// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Integer constant expressions for `#if` and `#elif`.
//!
//! Operands are signed 64-bit integers. By the time an expression reaches
//! [`evaluate`], `defined` has been replaced and macros expanded; any
//! identifier still present evaluates to `0`.

use super::{Token, TokenKind};

/// Evaluates a conditional expression.
///
/// The error string is the diagnostic message to report.
pub(crate) fn evaluate(tokens: &[Token]) -> Result<i64, String> {
    let tokens: Vec<&Token> = tokens.iter().filter(|t| !t.is_whitespace()).collect();
    if tokens.is_empty() {
        return Err("#if with no expression".to_string());
    }

    let mut parser = Parser { tokens, pos: 0 };
    let value = parser.conditional()?;
    match parser.peek() {
        None => Ok(value),
        Some(t) => Err(format!("unexpected '{}' in #if expression", t.text())),
    }
}

struct Parser<'t> {
    tokens: Vec<&'t Token>,
    pos: usize,
}

fn precedence(op: &str) -> Option<u8> {
    Some(match op {
        "||" => 1,
        "&&" => 2,
        "|" => 3,
        "^" => 4,
        "&" => 5,
        "==" | "!=" => 6,
        "<" | ">" | "<=" | ">=" => 7,
        "<<" | ">>" => 8,
        "+" | "-" => 9,
        "*" | "/" | "%" => 10,
        _ => return None,
    })
}

impl<'t> Parser<'t> {
    fn peek(&self) -> Option<&'t Token> {
        self.tokens.get(self.pos).copied()
    }

    fn next(&mut self) -> Option<&'t Token> {
        let token = self.peek();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn eat(&mut self, punct: &str) -> bool {
        if self.peek().is_some_and(|t| t.is_punct(punct)) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn conditional(&mut self) -> Result<i64, String> {
        let cond = self.binary(1)?;
        if !self.eat("?") {
            return Ok(cond);
        }
        let then = self.conditional()?;
        if !self.eat(":") {
            return Err("expected ':' in conditional expression".to_string());
        }
        let otherwise = self.conditional()?;
        Ok(if cond != 0 { then } else { otherwise })
    }

    fn binary(&mut self, min: u8) -> Result<i64, String> {
        let mut lhs = self.unary()?;
        loop {
            let Some(op) = self
                .peek()
                .filter(|t| t.kind() == TokenKind::Punct)
                .map(Token::text)
            else {
                break;
            };
            let Some(prec) = precedence(op).filter(|p| *p >= min) else {
                break;
            };
            self.pos += 1;
            let rhs = self.binary(prec + 1)?;
            lhs = apply(op, lhs, rhs)?;
        }
        Ok(lhs)
    }

    fn unary(&mut self) -> Result<i64, String> {
        let Some(token) = self.next() else {
            return Err("unexpected end of #if expression".to_string());
        };
        match token.kind() {
            TokenKind::Number => parse_integer(token.text()),
            TokenKind::CharLiteral => parse_char(token.text()),
            TokenKind::Identifier => Ok(0),
            TokenKind::Punct => match token.text() {
                "!" => Ok((self.unary()? == 0) as i64),
                "~" => Ok(!self.unary()?),
                "-" => Ok(self.unary()?.wrapping_neg()),
                "+" => self.unary(),
                "(" => {
                    let value = self.conditional()?;
                    if self.eat(")") {
                        Ok(value)
                    } else {
                        Err("missing ')' in #if expression".to_string())
                    }
                }
                other => Err(format!("unexpected '{other}' in #if expression")),
            },
            _ => Err(format!("unexpected '{}' in #if expression", token.text())),
        }
    }
}

fn apply(op: &str, lhs: i64, rhs: i64) -> Result<i64, String> {
    let truth = |b: bool| b as i64;
    Ok(match op {
        "||" => truth(lhs != 0 || rhs != 0),
        "&&" => truth(lhs != 0 && rhs != 0),
        "|" => lhs | rhs,
        "^" => lhs ^ rhs,
        "&" => lhs & rhs,
        "==" => truth(lhs == rhs),
        "!=" => truth(lhs != rhs),
        "<" => truth(lhs < rhs),
        ">" => truth(lhs > rhs),
        "<=" => truth(lhs <= rhs),
        ">=" => truth(lhs >= rhs),
        "<<" => lhs.wrapping_shl(rhs as u32),
        ">>" => lhs.wrapping_shr(rhs as u32),
        "+" => lhs.wrapping_add(rhs),
        "-" => lhs.wrapping_sub(rhs),
        "*" => lhs.wrapping_mul(rhs),
        "/" | "%" if rhs == 0 => return Err("division by zero in #if expression".to_string()),
        "/" => lhs.wrapping_div(rhs),
        "%" => lhs.wrapping_rem(rhs),
        _ => return Err(format!("unsupported operator '{op}' in #if expression")),
    })
}

fn parse_integer(text: &str) -> Result<i64, String> {
    let digits = text.trim_end_matches(&['u', 'U', 'l', 'L'][..]);
    let parsed = if let Some(hex) = digits
        .strip_prefix("0x")
        .or_else(|| digits.strip_prefix("0X"))
    {
        i64::from_str_radix(hex, 16)
    } else if digits.len() > 1 && digits.starts_with('0') {
        i64::from_str_radix(&digits[1..], 8)
    } else {
        digits.parse()
    };
    parsed.map_err(|_| format!("invalid integer constant '{text}' in #if expression"))
}

fn parse_char(text: &str) -> Result<i64, String> {
    let inner = text
        .strip_prefix('\'')
        .and_then(|t| t.strip_suffix('\''))
        .unwrap_or_default();
    let mut chars = inner.chars();
    let value = match (chars.next(), chars.next()) {
        (Some('\\'), Some(escaped)) => match escaped {
            'n' => '\n',
            't' => '\t',
            'r' => '\r',
            '0' => '\0',
            other => other,
        },
        (Some(c), None) => c,
        _ => return Err(format!("invalid character constant {text} in #if expression")),
    };
    Ok(value as i64)
}

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

//! Line-oriented lexing for the built-in engine.

use super::{Token, TokenKind};

/// Multi-character punctuators, longest first.
const PUNCTUATORS: &[&str] = &[
    "<<=", ">>=", "...", "##", "<<", ">>", "<=", ">=", "==", "!=", "&&", "||", "++", "--", "->",
    "+=", "-=", "*=", "/=", "%=", "&=", "|=", "^=",
];

/// Replaces every comment in `line` with a single space.
///
/// `in_comment` carries an unterminated block comment from one line to the
/// next and is updated on return. The `<...>` header name of an `#include`
/// line is kept verbatim like a string literal.
pub(crate) fn strip_comments(line: &str, in_comment: &mut bool) -> String {
    let mut out = String::with_capacity(line.len());
    let mut chars = line.chars().peekable();
    // Holds the closing delimiter of the literal being copied.
    let mut quote: Option<char> = None;
    let mut header_name = !*in_comment && is_include_line(line);

    while let Some(c) = chars.next() {
        if *in_comment {
            if c == '*' && chars.peek() == Some(&'/') {
                chars.next();
                *in_comment = false;
            }
            continue;
        }

        if let Some(q) = quote {
            out.push(c);
            if c == '\\' && q != '>' {
                if let Some(escaped) = chars.next() {
                    out.push(escaped);
                }
            } else if c == q {
                quote = None;
            }
            continue;
        }

        match c {
            '"' | '\'' => {
                quote = Some(c);
                out.push(c);
            }
            '<' if header_name => {
                header_name = false;
                quote = Some('>');
                out.push(c);
            }
            '/' if chars.peek() == Some(&'/') => {
                out.push(' ');
                break;
            }
            '/' if chars.peek() == Some(&'*') => {
                chars.next();
                *in_comment = true;
                out.push(' ');
            }
            _ => out.push(c),
        }
    }

    out
}

fn is_include_line(line: &str) -> bool {
    line.trim_start()
        .strip_prefix('#')
        .is_some_and(|rest| rest.trim_start().starts_with("include"))
}

fn is_space(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\r' | '\x0b' | '\x0c')
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_ident_continue(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Splits a comment-free line into tokens. Concatenating the texts of the
/// result reproduces `text` exactly.
pub(crate) fn tokenize(text: &str) -> Vec<Token> {
    let chars: Vec<char> = text.chars().collect();
    let len = chars.len();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < len {
        let start = i;
        let c = chars[i];
        let kind = if is_space(c) {
            while i < len && is_space(chars[i]) {
                i += 1;
            }
            TokenKind::Whitespace
        } else if is_ident_start(c) {
            while i < len && is_ident_continue(chars[i]) {
                i += 1;
            }
            TokenKind::Identifier
        } else if c.is_ascii_digit()
            || (c == '.' && chars.get(i + 1).is_some_and(|d| d.is_ascii_digit()))
        {
            i += 1;
            while i < len {
                let d = chars[i];
                if is_ident_continue(d) || d == '.' {
                    i += 1;
                } else if matches!(d, '+' | '-') && matches!(chars[i - 1], 'e' | 'E' | 'p' | 'P') {
                    i += 1;
                } else {
                    break;
                }
            }
            TokenKind::Number
        } else if c == '"' || c == '\'' {
            i += 1;
            while i < len {
                let d = chars[i];
                i += 1;
                if d == '\\' {
                    i += 1;
                } else if d == c {
                    break;
                }
            }
            i = i.min(len);
            if c == '"' {
                TokenKind::StringLiteral
            } else {
                TokenKind::CharLiteral
            }
        } else {
            let matched = PUNCTUATORS.iter().find(|p| {
                p.chars()
                    .enumerate()
                    .all(|(k, pc)| chars.get(i + k) == Some(&pc))
            });
            i += matched.map_or(1, |p| p.len());
            TokenKind::Punct
        };

        tokens.push(Token::new(kind, chars[start..i].iter().collect::<String>()));
    }

    tokens
}

/// Removes leading and trailing whitespace tokens.
pub(crate) fn trim(tokens: &[Token]) -> &[Token] {
    let start = tokens
        .iter()
        .position(|t| !t.is_whitespace())
        .unwrap_or(tokens.len());
    let end = tokens
        .iter()
        .rposition(|t| !t.is_whitespace())
        .map_or(start, |p| p + 1);
    &tokens[start..end]
}

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

//! The built-in C-style macro engine.

use super::expr;
use super::lexer::{strip_comments, tokenize, trim};
use super::{
    EngineFactory, MacroEngine, PreprocessorListener, Source, Token, TokenKind, VirtualFileSystem,
};
use penumbra_core::{Diagnostic, DiagnosticKind, ShaderError, ShaderResult};
use std::collections::{HashMap, VecDeque};

/// The deepest include nesting [`CppEngine`] follows.
pub const MAX_INCLUDE_DEPTH: usize = 64;

/// GLSL directives that are copied to the output untouched.
const PASSTHROUGH: &[&str] = &["version", "extension", "pragma", "line"];

#[derive(Debug, Clone, PartialEq, Eq)]
enum Macro {
    Object(Vec<Token>),
    Function { params: Vec<String>, body: Vec<Token> },
}

#[derive(Debug)]
struct Line {
    number: u32,
    text: String,
}

#[derive(Debug, Clone, Copy)]
struct Conditional {
    line: u32,
    parent_active: bool,
    active: bool,
    /// Whether any branch of this group has been selected yet.
    taken: bool,
    seen_else: bool,
}

/// One source being read.
#[derive(Debug)]
struct Frame {
    path: String,
    lines: Vec<Line>,
    next: usize,
    in_comment: bool,
    conditionals: Vec<Conditional>,
    physical_lines: u32,
    missing_newline: bool,
}

impl Frame {
    fn new(source: Source) -> Self {
        let text = source.text();
        let mut lines: Vec<Line> = Vec::new();
        let mut spliced: Option<Line> = None;
        let mut physical_lines = 0;

        for (index, raw) in text.lines().enumerate() {
            physical_lines = index as u32 + 1;
            let mut line = spliced.take().unwrap_or(Line {
                number: physical_lines,
                text: String::new(),
            });
            match raw.strip_suffix('\\') {
                Some(head) => {
                    line.text.push_str(head);
                    spliced = Some(line);
                }
                None => {
                    line.text.push_str(raw);
                    lines.push(line);
                }
            }
        }
        lines.extend(spliced);

        Self {
            missing_newline: !text.is_empty() && !text.ends_with('\n'),
            path: source.path().to_string(),
            lines,
            next: 0,
            in_comment: false,
            conditionals: Vec::new(),
            physical_lines,
        }
    }

    /// Returns the next logical line with its comments removed.
    fn next_line(&mut self) -> Option<(u32, String)> {
        let line = self.lines.get(self.next)?;
        self.next += 1;
        Some((line.number, strip_comments(&line.text, &mut self.in_comment)))
    }
}

/// A C-style preprocessor for shader sources.
///
/// Supports object-like and function-like macros, conditional compilation,
/// `#include` through a [`VirtualFileSystem`], `#error` and `#warning`. The
/// GLSL directives `#version`, `#extension`, `#pragma` and `#line` are passed
/// through. A function-like macro invocation must fit on one logical line.
pub struct CppEngine<'a> {
    macros: HashMap<String, Macro>,
    include_path: Vec<String>,
    fs: Option<&'a dyn VirtualFileSystem>,
    listener: Option<&'a mut dyn PreprocessorListener>,
    inputs: VecDeque<Source>,
    frames: Vec<Frame>,
    pending: VecDeque<Token>,
}

impl Default for CppEngine<'_> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a> CppEngine<'a> {
    /// Creates an engine with no macros and no inputs.
    pub fn new() -> Self {
        Self {
            macros: HashMap::new(),
            include_path: Vec::new(),
            fs: None,
            listener: None,
            inputs: VecDeque::new(),
            frames: Vec::new(),
            pending: VecDeque::new(),
        }
    }

    /// Returns `true` if `name` is currently defined.
    pub fn is_defined(&self, name: &str) -> bool {
        matches!(name, "__FILE__" | "__LINE__") || self.macros.contains_key(name)
    }

    fn current_path(&self) -> String {
        self.frames
            .last()
            .map(|f| f.path.clone())
            .unwrap_or_default()
    }

    fn active(&self) -> bool {
        self.frames
            .last()
            .and_then(|f| f.conditionals.last())
            .map_or(true, |c| c.active)
    }

    fn push_frame(&mut self, source: Source) {
        log::trace!("enter: {}", source.path());
        self.frames.push(Frame::new(source));
    }

    fn report(
        &mut self,
        kind: DiagnosticKind,
        line: u32,
        column: u32,
        message: impl Into<String>,
    ) -> ShaderResult<()> {
        let diagnostic = Diagnostic::new(kind, self.current_path(), line, column, message);
        match self.listener.as_deref_mut() {
            Some(listener) => match kind {
                DiagnosticKind::Warning => listener.handle_warning(&diagnostic),
                DiagnosticKind::Error => listener.handle_error(&diagnostic),
            },
            None => {
                match kind {
                    DiagnosticKind::Warning => log::warn!("{diagnostic}"),
                    DiagnosticKind::Error => log::error!("{diagnostic}"),
                }
                Ok(())
            }
        }
    }

    fn warning(&mut self, line: u32, column: u32, message: impl Into<String>) -> ShaderResult<()> {
        self.report(DiagnosticKind::Warning, line, column, message)
    }

    fn error(&mut self, line: u32, column: u32, message: impl Into<String>) -> ShaderResult<()> {
        self.report(DiagnosticKind::Error, line, column, message)
    }

    fn step(&mut self) -> ShaderResult<()> {
        match self.frames.last_mut().map(Frame::next_line) {
            None => Ok(()),
            Some(None) => self.finish_frame(),
            Some(Some((number, text))) => self.process_line(number, &text),
        }
    }

    fn finish_frame(&mut self) -> ShaderResult<()> {
        let Some(frame) = self.frames.last() else {
            return Ok(());
        };
        let unterminated: Vec<u32> = frame.conditionals.iter().map(|c| c.line).collect();
        let (missing_newline, last_line) = (frame.missing_newline, frame.physical_lines);

        for line in unterminated {
            self.error(line, 0, "unterminated conditional directive")?;
        }
        if missing_newline {
            self.warning(last_line, 0, "no newline at end of file")?;
        }
        if let Some(frame) = self.frames.pop() {
            log::trace!("leave: {}", frame.path);
        }
        Ok(())
    }

    fn process_line(&mut self, number: u32, text: &str) -> ShaderResult<()> {
        let body = text.trim_start();
        if let Some(directive) = body.strip_prefix('#') {
            let column = (text.len() - body.len()) as u32 + 1;
            return self.directive(number, column, directive, text);
        }

        if self.active() {
            let tokens = tokenize(text);
            let expanded = self.expand_line(&tokens, number)?;
            self.pending.extend(expanded);
        }
        self.pending.push_back(Token::newline());
        Ok(())
    }

    fn directive(&mut self, line: u32, column: u32, body: &str, text: &str) -> ShaderResult<()> {
        let tokens = tokenize(body);
        let Some(start) = tokens.iter().position(|t| !t.is_whitespace()) else {
            // The null directive.
            self.pending.push_back(Token::newline());
            return Ok(());
        };
        let name_token = &tokens[start];
        let rest = &tokens[start + 1..];
        let name = name_token.text();

        match name {
            "if" | "ifdef" | "ifndef" | "elif" | "else" | "endif" => {
                self.conditional(name, line, column, rest)?;
            }
            _ if !self.active() => {}
            _ if name_token.kind() != TokenKind::Identifier => {
                self.error(line, column, format!("invalid preprocessing directive #{name}"))?;
            }
            "define" => self.define(line, column, rest)?,
            "undef" => self.undef(line, column, rest)?,
            "include" => {
                self.pending.push_back(Token::newline());
                return self.include(line, column, rest);
            }
            "error" => self.error(line, column, joined(trim(rest)))?,
            "warning" => self.warning(line, column, joined(trim(rest)))?,
            n if PASSTHROUGH.contains(&n) => {
                self.pending
                    .push_back(Token::new(TokenKind::Directive, text.trim()));
            }
            other => {
                self.error(line, column, format!("unknown preprocessor directive #{other}"))?;
            }
        }

        self.pending.push_back(Token::newline());
        Ok(())
    }

    fn top_conditional(&mut self) -> Option<&mut Conditional> {
        self.frames
            .last_mut()
            .and_then(|f| f.conditionals.last_mut())
    }

    fn conditional(
        &mut self,
        name: &str,
        line: u32,
        column: u32,
        rest: &[Token],
    ) -> ShaderResult<()> {
        let parent_active = self.active();
        match name {
            "ifdef" | "ifndef" => {
                let taken = if parent_active {
                    match macro_name(rest) {
                        Some(macro_name) => self.is_defined(macro_name) == (name == "ifdef"),
                        None => {
                            self.error(line, column, format!("#{name} expects a macro name"))?;
                            false
                        }
                    }
                } else {
                    false
                };
                self.open_conditional(line, parent_active, taken);
            }
            "if" => {
                let taken = parent_active && self.condition(line, column, rest)?;
                self.open_conditional(line, parent_active, taken);
            }
            "elif" => {
                let Some(top) = self.top_conditional().copied() else {
                    return self.error(line, column, "#elif without #if");
                };
                if top.seen_else {
                    return self.error(line, column, "#elif after #else");
                }
                let active =
                    !top.taken && top.parent_active && self.condition(line, column, rest)?;
                if let Some(top) = self.top_conditional() {
                    top.active = active;
                    top.taken |= active;
                }
            }
            "else" => {
                let Some(top) = self.top_conditional() else {
                    return self.error(line, column, "#else without #if");
                };
                if top.seen_else {
                    return self.error(line, column, "#else after #else");
                }
                top.active = top.parent_active && !top.taken;
                top.taken = true;
                top.seen_else = true;
            }
            _ => {
                let closed = self
                    .frames
                    .last_mut()
                    .and_then(|f| f.conditionals.pop())
                    .is_some();
                if !closed {
                    return self.error(line, column, "#endif without #if");
                }
            }
        }
        Ok(())
    }

    fn open_conditional(&mut self, line: u32, parent_active: bool, taken: bool) {
        if let Some(frame) = self.frames.last_mut() {
            frame.conditionals.push(Conditional {
                line,
                parent_active,
                active: parent_active && taken,
                taken,
                seen_else: false,
            });
        }
    }

    /// Evaluates an `#if`/`#elif` expression. Malformed expressions are
    /// reported and count as false.
    fn condition(&mut self, line: u32, column: u32, rest: &[Token]) -> ShaderResult<bool> {
        let resolved = match self.replace_defined(rest) {
            Ok(tokens) => tokens,
            Err(message) => {
                self.error(line, column, message)?;
                return Ok(false);
            }
        };
        let expanded = self.expand_line(&resolved, line)?;
        match expr::evaluate(&expanded) {
            Ok(value) => Ok(value != 0),
            Err(message) => {
                self.error(line, column, message)?;
                Ok(false)
            }
        }
    }

    /// Replaces `defined NAME` and `defined(NAME)` with `1` or `0`.
    fn replace_defined(&self, tokens: &[Token]) -> Result<Vec<Token>, String> {
        let mut out = Vec::with_capacity(tokens.len());
        let mut i = 0;
        while i < tokens.len() {
            let token = &tokens[i];
            i += 1;
            if token.kind() != TokenKind::Identifier || token.text() != "defined" {
                out.push(token.clone());
                continue;
            }

            i = skip_whitespace(tokens, i);
            let parenthesized = tokens.get(i).is_some_and(|t| t.is_punct("("));
            if parenthesized {
                i = skip_whitespace(tokens, i + 1);
            }
            let Some(name) = tokens.get(i).filter(|t| t.kind() == TokenKind::Identifier) else {
                return Err("operator 'defined' requires an identifier".to_string());
            };
            i += 1;
            if parenthesized {
                i = skip_whitespace(tokens, i);
                if !tokens.get(i).is_some_and(|t| t.is_punct(")")) {
                    return Err("missing ')' after 'defined'".to_string());
                }
                i += 1;
            }
            let value = if self.is_defined(name.text()) { "1" } else { "0" };
            out.push(Token::new(TokenKind::Number, value));
        }
        Ok(out)
    }

    fn define(&mut self, line: u32, column: u32, rest: &[Token]) -> ShaderResult<()> {
        let Some(start) = rest
            .iter()
            .position(|t| !t.is_whitespace())
            .filter(|&s| rest[s].kind() == TokenKind::Identifier)
        else {
            return self.error(line, column, "macro names must be identifiers");
        };
        let name = rest[start].text().to_string();
        if name == "defined" {
            return self.error(line, column, "'defined' cannot be used as a macro name");
        }

        let after = &rest[start + 1..];
        let definition = if after.first().is_some_and(|t| t.is_punct("(")) {
            match parse_parameters(&after[1..]) {
                Some((params, consumed)) => Macro::Function {
                    params,
                    body: trim(&after[1 + consumed..]).to_vec(),
                },
                None => {
                    return self.error(
                        line,
                        column,
                        format!("invalid parameter list for macro '{name}'"),
                    );
                }
            }
        } else {
            Macro::Object(trim(after).to_vec())
        };

        if self.macros.get(&name).is_some_and(|m| *m != definition) {
            self.warning(line, column, format!("'{name}' redefined"))?;
        }
        log::trace!("define: {name}");
        self.macros.insert(name, definition);
        Ok(())
    }

    fn undef(&mut self, line: u32, column: u32, rest: &[Token]) -> ShaderResult<()> {
        match macro_name(rest) {
            Some(name) => {
                self.macros.remove(name);
                Ok(())
            }
            None => self.error(line, column, "#undef expects a macro name"),
        }
    }

    fn include(&mut self, line: u32, column: u32, rest: &[Token]) -> ShaderResult<()> {
        let target = include_target(trim(rest)).or_else(|| {
            let expanded = self.expand(trim(rest), line, &mut Vec::new(), &mut Vec::new());
            include_target(trim(&expanded))
        });
        let Some((name, quoted)) = target else {
            return self.error(line, column, "#include expects \"FILENAME\" or <FILENAME>");
        };
        if self.frames.len() >= MAX_INCLUDE_DEPTH {
            return self.error(
                line,
                column,
                format!("#include nested too deeply (limit {MAX_INCLUDE_DEPTH})"),
            );
        }
        let Some(fs) = self.fs else {
            return self.error(line, column, "#include requires a file system");
        };

        // Quoted names resolve next to the includer only; angle names search
        // the system roots.
        let candidates = if quoted {
            let current = self.current_path();
            vec![match fs.get_parent(&current) {
                Some(dir) => fs.get_file_in(&dir, &name),
                None => fs.get_file(&name),
            }]
        } else {
            let mut candidates: Vec<String> = Vec::new();
            for root in &self.include_path {
                let candidate = fs.get_file_in(root, &name);
                if !candidates.contains(&candidate) {
                    candidates.push(candidate);
                }
            }
            candidates
        };

        let mut first_failure = None;
        for candidate in candidates {
            match fs.source(&candidate) {
                Ok(source) => {
                    log::debug!("include: {name} -> {candidate}");
                    self.push_frame(source);
                    return Ok(());
                }
                Err(e) if e.is_not_found() => {
                    first_failure.get_or_insert(e);
                }
                Err(e) => return Err(e),
            }
        }
        Err(first_failure.unwrap_or_else(|| ShaderError::no_such_file(name)))
    }

    fn expand_line(&mut self, tokens: &[Token], line: u32) -> ShaderResult<Vec<Token>> {
        let mut problems = Vec::new();
        let expanded = self.expand(tokens, line, &mut Vec::new(), &mut problems);
        for problem in problems {
            self.error(line, 0, problem)?;
        }
        Ok(expanded)
    }

    /// Expands macros in `tokens`. Names in `disabled` are being expanded
    /// already; they are painted and left alone.
    ///
    /// An expansion ending in a function-like macro name is rescanned
    /// together with the tokens after it, so `G(2)` expands through
    /// `#define G F` into a call of `F`.
    fn expand(
        &self,
        tokens: &[Token],
        line: u32,
        disabled: &mut Vec<String>,
        problems: &mut Vec<String>,
    ) -> Vec<Token> {
        let mut out = Vec::with_capacity(tokens.len());
        let mut i = 0;
        while i < tokens.len() {
            let token = &tokens[i];
            i += 1;
            let name = token.text();
            if token.kind() != TokenKind::Identifier || token.is_painted() {
                out.push(token.clone());
                continue;
            }
            if disabled.iter().any(|d| d == name) {
                out.push(token.paint());
                continue;
            }

            match name {
                "__LINE__" => {
                    out.push(Token::new(TokenKind::Number, line.to_string()));
                    continue;
                }
                "__FILE__" => {
                    let quoted = format!("\"{}\"", self.current_path());
                    out.push(Token::new(TokenKind::StringLiteral, quoted));
                    continue;
                }
                _ => {}
            }

            let expansion = match self.macros.get(name) {
                None => {
                    out.push(token.clone());
                    continue;
                }
                Some(Macro::Object(body)) => {
                    disabled.push(name.to_string());
                    let expansion = self.expand(body, line, disabled, problems);
                    disabled.pop();
                    expansion
                }
                Some(Macro::Function { params, body }) => {
                    let Some((mut args, end)) = collect_arguments(tokens, i) else {
                        out.push(token.clone());
                        continue;
                    };
                    if params.is_empty() && args.len() == 1 && trim(&args[0]).is_empty() {
                        args.clear();
                    }
                    if args.len() != params.len() {
                        problems.push(format!(
                            "macro '{name}' expects {} arguments, got {}",
                            params.len(),
                            args.len()
                        ));
                        out.push(token.clone());
                        continue;
                    }

                    let args: Vec<Vec<Token>> = args
                        .iter()
                        .map(|arg| self.expand(trim(arg), line, disabled, problems))
                        .collect();
                    let substituted = substitute(body, params, &args);
                    i = end;
                    disabled.push(name.to_string());
                    let expansion = self.expand(&substituted, line, disabled, problems);
                    disabled.pop();
                    expansion
                }
            };

            let call_follows = tokens
                .get(skip_whitespace(tokens, i))
                .is_some_and(|t| t.is_punct("("));
            if call_follows && self.ends_with_function_name(&expansion) {
                let mut rest = expansion;
                rest.extend_from_slice(&tokens[i..]);
                out.extend(self.expand(&rest, line, disabled, problems));
                return out;
            }
            out.extend(expansion);
        }
        out
    }

    fn ends_with_function_name(&self, tokens: &[Token]) -> bool {
        trim(tokens).last().is_some_and(|t| {
            t.kind() == TokenKind::Identifier
                && !t.is_painted()
                && matches!(self.macros.get(t.text()), Some(Macro::Function { .. }))
        })
    }
}

impl<'a> MacroEngine<'a> for CppEngine<'a> {
    fn add_macro(&mut self, name: &str, value: &str) -> ShaderResult<()> {
        match tokenize(name).as_slice() {
            [token] if token.kind() == TokenKind::Identifier => {}
            _ => {
                return Err(ShaderError::InvalidDefine {
                    name: name.to_string(),
                    reason: "macro names must be identifiers".to_string(),
                });
            }
        }
        let body = trim(&tokenize(value)).to_vec();
        self.macros.insert(name.to_string(), Macro::Object(body));
        Ok(())
    }

    fn set_system_include_path(&mut self, roots: Vec<String>) {
        self.include_path = roots;
    }

    fn set_file_system(&mut self, fs: &'a dyn VirtualFileSystem) {
        self.fs = Some(fs);
    }

    fn set_listener(&mut self, listener: &'a mut dyn PreprocessorListener) {
        self.listener = Some(listener);
    }

    fn add_input(&mut self, source: Source) {
        self.inputs.push_back(source);
    }

    fn token(&mut self) -> ShaderResult<Token> {
        loop {
            if let Some(token) = self.pending.pop_front() {
                return Ok(token);
            }
            if self.frames.is_empty() {
                match self.inputs.pop_front() {
                    Some(source) => self.push_frame(source),
                    None => return Ok(Token::eof()),
                }
                continue;
            }
            self.step()?;
        }
    }
}

/// Creates [`CppEngine`]s.
#[derive(Debug, Default, Clone, Copy)]
pub struct CppEngineFactory;

impl EngineFactory for CppEngineFactory {
    fn create<'a>(&self) -> Box<dyn MacroEngine<'a> + 'a> {
        Box::new(CppEngine::new())
    }
}

fn joined(tokens: &[Token]) -> String {
    tokens.iter().map(Token::text).collect()
}

fn skip_whitespace(tokens: &[Token], mut i: usize) -> usize {
    while tokens.get(i).is_some_and(Token::is_whitespace) {
        i += 1;
    }
    i
}

/// The single identifier making up `tokens`, ignoring whitespace.
fn macro_name(tokens: &[Token]) -> Option<&str> {
    match trim(tokens) {
        [token] if token.kind() == TokenKind::Identifier => Some(token.text()),
        _ => None,
    }
}

/// Parses `"name"` or `<name>`, returning the name and whether it was quoted.
fn include_target(tokens: &[Token]) -> Option<(String, bool)> {
    let text = joined(tokens);
    let (inner, quoted) =
        if let Some(inner) = text.strip_prefix('"').and_then(|t| t.strip_suffix('"')) {
            (inner, true)
        } else {
            let inner = text.strip_prefix('<').and_then(|t| t.strip_suffix('>'))?;
            (inner, false)
        };
    (!inner.is_empty()).then(|| (inner.to_string(), quoted))
}

/// Parses a parameter list following the opening parenthesis. Returns the
/// names and the number of tokens consumed, including the closing one.
fn parse_parameters(tokens: &[Token]) -> Option<(Vec<String>, usize)> {
    let mut params = Vec::new();
    let mut expect_name = true;
    for (i, token) in tokens.iter().enumerate() {
        if token.is_whitespace() {
            continue;
        }
        if token.is_punct(")") {
            let complete = !expect_name || params.is_empty();
            return complete.then_some((params, i + 1));
        }
        if expect_name && token.kind() == TokenKind::Identifier {
            params.push(token.text().to_string());
            expect_name = false;
        } else if !expect_name && token.is_punct(",") {
            expect_name = true;
        } else {
            return None;
        }
    }
    None
}

/// Collects the arguments of a function-like macro invocation whose name
/// ends just before `start`. Returns `None` if no `(` follows the name or the
/// list is not closed on this line.
fn collect_arguments(tokens: &[Token], start: usize) -> Option<(Vec<Vec<Token>>, usize)> {
    let mut i = skip_whitespace(tokens, start);
    if !tokens.get(i)?.is_punct("(") {
        return None;
    }
    i += 1;

    let mut depth = 0usize;
    let mut args = vec![Vec::new()];
    while let Some(token) = tokens.get(i) {
        i += 1;
        if depth == 0 && token.is_punct(")") {
            return Some((args, i));
        }
        if depth == 0 && token.is_punct(",") {
            args.push(Vec::new());
            continue;
        }
        if token.is_punct("(") {
            depth += 1;
        } else if token.is_punct(")") {
            depth -= 1;
        }
        if let Some(arg) = args.last_mut() {
            arg.push(token.clone());
        }
    }
    None
}

fn substitute(body: &[Token], params: &[String], args: &[Vec<Token>]) -> Vec<Token> {
    let mut out = Vec::with_capacity(body.len());
    for token in body {
        let param = (token.kind() == TokenKind::Identifier)
            .then(|| params.iter().position(|p| p == token.text()))
            .flatten();
        match param.and_then(|index| args.get(index)) {
            Some(arg) => out.extend(arg.iter().cloned()),
            None => out.push(token.clone()),
        }
    }
    out
}

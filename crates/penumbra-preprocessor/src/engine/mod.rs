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

//! The boundary between the preprocessing adapter and a macro engine.
//!
//! A [`MacroEngine`] knows how to expand macros and follow includes, but
//! nothing about modules: it reads files through the [`VirtualFileSystem`]
//! it is given and reports diagnostics to its [`PreprocessorListener`]. The
//! adapter in [`crate::preprocessor`] supplies both.
//!
//! [`CppEngine`] is the built-in implementation.

mod cpp;
mod expr;
mod lexer;

pub use cpp::{CppEngine, CppEngineFactory, MAX_INCLUDE_DEPTH};

use penumbra_core::{Diagnostic, ShaderError, ShaderResult};
use std::io::Read;

/// The lexical category of a [`Token`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    /// An identifier or keyword.
    Identifier,
    /// A numeric literal.
    Number,
    /// A double-quoted string literal.
    StringLiteral,
    /// A single-quoted character literal.
    CharLiteral,
    /// An operator or punctuation character sequence.
    Punct,
    /// A run of horizontal whitespace.
    Whitespace,
    /// A directive copied to the output unchanged, such as `#version`.
    Directive,
    /// A line terminator.
    Newline,
    /// The end of all input.
    Eof,
}

/// A unit of engine output.
#[derive(Debug, Clone)]
pub struct Token {
    kind: TokenKind,
    text: String,
    /// Set on a macro name met inside its own expansion; it never expands.
    painted: bool,
}

impl PartialEq for Token {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind && self.text == other.text
    }
}

impl Eq for Token {}

impl Token {
    /// Creates a token.
    pub fn new(kind: TokenKind, text: impl Into<String>) -> Self {
        Self {
            kind,
            text: text.into(),
            painted: false,
        }
    }

    /// The end-of-input token.
    pub fn eof() -> Self {
        Self::new(TokenKind::Eof, "")
    }

    /// A line terminator token.
    pub fn newline() -> Self {
        Self::new(TokenKind::Newline, "\n")
    }

    /// The token's category.
    pub fn kind(&self) -> TokenKind {
        self.kind
    }

    /// The token's text as it appears in the output.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Returns `true` for the end-of-input token.
    pub fn is_eof(&self) -> bool {
        self.kind == TokenKind::Eof
    }

    pub(crate) fn is_whitespace(&self) -> bool {
        self.kind == TokenKind::Whitespace
    }

    pub(crate) fn is_punct(&self, text: &str) -> bool {
        self.kind == TokenKind::Punct && self.text == text
    }

    pub(crate) fn is_painted(&self) -> bool {
        self.painted
    }

    pub(crate) fn paint(&self) -> Self {
        Self {
            painted: true,
            ..self.clone()
        }
    }
}

/// The text of one input file, tagged with the request path that produced it.
///
/// The path is the source's identity: diagnostics name it, and relative
/// includes are resolved against its parent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Source {
    path: String,
    text: String,
}

impl Source {
    /// Creates a source from text already in memory.
    pub fn new(path: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            text: text.into(),
        }
    }

    /// Reads a source from `reader` as UTF-8.
    ///
    /// # Errors
    /// Any read failure, including invalid UTF-8, is reported as
    /// [`ShaderError::Io`] on `path`.
    pub fn from_reader(path: impl Into<String>, mut reader: impl Read) -> ShaderResult<Self> {
        let path = path.into();
        let mut text = String::new();
        match reader.read_to_string(&mut text) {
            Ok(_) => Ok(Self { path, text }),
            Err(e) => Err(ShaderError::io(path, e)),
        }
    }

    /// The request path identifying this source.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// The full text.
    pub fn text(&self) -> &str {
        &self.text
    }
}

/// The file operations an engine may perform.
///
/// Files are identified by path strings only; there is no file object graph.
pub trait VirtualFileSystem {
    /// The file named by `path`, taken verbatim.
    fn get_file(&self, path: &str) -> String;

    /// The file `name` as seen from directory `dir`.
    fn get_file_in(&self, dir: &str, name: &str) -> String;

    /// The directory containing `path`, or `None` at a root.
    fn get_parent(&self, path: &str) -> Option<String>;

    /// The entry `name` inside directory `path`.
    fn get_child(&self, path: &str, name: &str) -> String;

    /// Opens and reads the file at `path`.
    ///
    /// # Errors
    /// A file that does not exist is reported with
    /// [`ShaderError::no_such_file`]; engines rely on
    /// [`ShaderError::is_not_found`] to try the next include candidate.
    fn source(&self, path: &str) -> ShaderResult<Source>;
}

/// Receives diagnostics raised while processing.
///
/// Returning an error aborts the run with that error; returning `Ok(())`
/// lets the engine continue.
pub trait PreprocessorListener {
    /// Called for each warning.
    fn handle_warning(&mut self, diagnostic: &Diagnostic) -> ShaderResult<()>;

    /// Called for each error.
    fn handle_error(&mut self, diagnostic: &Diagnostic) -> ShaderResult<()>;
}

/// A macro-expansion engine.
///
/// The adapter drives an engine through a fixed sequence: register defines,
/// set the system include roots, install the file system and listener, add
/// the root source, then pull tokens until [`TokenKind::Eof`].
pub trait MacroEngine<'a> {
    /// Defines an object-like macro `name` expanding to `value`.
    ///
    /// # Errors
    /// Returns [`ShaderError::InvalidDefine`] if `name` is not an identifier.
    fn add_macro(&mut self, name: &str, value: &str) -> ShaderResult<()>;

    /// Sets the directories searched for `<...>` includes, and for `"..."`
    /// includes not found next to the including file.
    fn set_system_include_path(&mut self, roots: Vec<String>);

    /// Installs the file system used to open includes.
    fn set_file_system(&mut self, fs: &'a dyn VirtualFileSystem);

    /// Installs the diagnostic listener.
    fn set_listener(&mut self, listener: &'a mut dyn PreprocessorListener);

    /// Queues a top-level input.
    fn add_input(&mut self, source: Source);

    /// Produces the next output token.
    ///
    /// # Errors
    /// Fails if an include cannot be opened or a listener aborts the run.
    fn token(&mut self) -> ShaderResult<Token>;
}

/// Creates a fresh engine for each preprocessing run.
pub trait EngineFactory: Send + Sync {
    /// Creates an engine with no macros, inputs, file system or listener.
    fn create<'a>(&self) -> Box<dyn MacroEngine<'a> + 'a>;
}

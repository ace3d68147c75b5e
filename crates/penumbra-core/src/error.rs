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

//! Defines the error taxonomy shared by the resolver and the preprocessor.
//!
//! A module or file that does not exist is *not* an error: resolution returns
//! `Ok(None)` for it. Errors are reserved for malformed requests, transport
//! failures on resolved files, and diagnostics that a caller chose to promote.

use crate::diagnostic::Diagnostic;
use std::io;
use thiserror::Error;

/// A specialized `Result` type for shader resolution and preprocessing.
pub type ShaderResult<T> = Result<T, ShaderError>;

/// An error raised while resolving or preprocessing shader sources.
#[derive(Debug, Error)]
pub enum ShaderError {
    /// The request did not contain the `/` separating a module from a file.
    #[error("Invalid path.\n  Expected: A path of the form module/file\n  Received: {received}")]
    BadPath {
        /// The path exactly as it was received.
        received: String,
    },

    /// Opening or reading a resolved file failed, or an include target did not
    /// resolve to any file.
    #[error("I/O error on '{path}': {source}")]
    Io {
        /// The request path of the file being opened.
        path: String,
        /// The underlying transport failure.
        #[source]
        source: io::Error,
    },

    /// An error diagnostic that the error callback chose to treat as fatal.
    #[error("{0}")]
    Diagnostic(Diagnostic),

    /// A warning diagnostic promoted to a failure by the default policy.
    #[error("{0}\nNote: treating warnings as fatal")]
    WarningAsError(Diagnostic),

    /// The macro engine refused to register a define.
    #[error("Invalid define '{name}': {reason}")]
    InvalidDefine {
        /// The name of the rejected define.
        name: String,
        /// Why the engine rejected it.
        reason: String,
    },
}

impl ShaderError {
    /// Builds the I/O failure reported when `path` does not resolve to a file.
    pub fn no_such_file(path: impl Into<String>) -> Self {
        let path = path.into();
        let source = io::Error::new(io::ErrorKind::NotFound, format!("no such file: {path}"));
        ShaderError::Io { path, source }
    }

    /// Wraps a transport failure that occurred while reading `path`.
    pub fn io(path: impl Into<String>, source: io::Error) -> Self {
        ShaderError::Io {
            path: path.into(),
            source,
        }
    }

    /// Returns `true` if this is the I/O failure of a file that does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, ShaderError::Io { source, .. } if source.kind() == io::ErrorKind::NotFound)
    }

    /// Returns the request path this error refers to, if any.
    pub fn path(&self) -> Option<&str> {
        match self {
            ShaderError::BadPath { received } => Some(received),
            ShaderError::Io { path, .. } => Some(path),
            ShaderError::Diagnostic(d) | ShaderError::WarningAsError(d) => Some(&d.path),
            ShaderError::InvalidDefine { .. } => None,
        }
    }
}

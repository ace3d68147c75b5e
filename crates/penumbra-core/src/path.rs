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

//! Parsing of `<module>/<relative-path>` requests.

use crate::error::{ShaderError, ShaderResult};

/// A request split into its module name and the path inside that module.
///
/// The split happens at the *first* `/`; the file part keeps that leading
/// slash, so `"module/sub/path"` yields module `"module"` and file
/// `"/sub/path"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShaderPath<'a> {
    module: &'a str,
    file: &'a str,
}

impl<'a> ShaderPath<'a> {
    /// Splits `path` into module and file.
    ///
    /// # Errors
    /// Returns [`ShaderError::BadPath`] if `path` contains no `/`.
    pub fn parse(path: &'a str) -> ShaderResult<Self> {
        match path.find('/') {
            Some(idx) => Ok(Self {
                module: &path[..idx],
                file: &path[idx..],
            }),
            None => Err(ShaderError::BadPath {
                received: path.to_string(),
            }),
        }
    }

    /// The module name (everything before the first `/`).
    pub fn module(&self) -> &'a str {
        self.module
    }

    /// The path inside the module, including its leading `/`.
    pub fn file(&self) -> &'a str {
        self.file
    }
}

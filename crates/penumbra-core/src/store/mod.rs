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

//! Shader stores: the lookup capability backing one module's files.
//!
//! Two variants are provided:
//!
//! - [`DirectoryStore`] resolves names against a base directory on disk and
//!   refuses anything that normalizes to a location outside of it.
//! - [`EmbeddedStore`] resolves names inside an embedded resource namespace,
//!   which has no notion of traversal at all.

mod directory;
mod embedded;

pub use directory::DirectoryStore;
pub use embedded::{EmbeddedResources, EmbeddedStore};

use std::fmt::Debug;
use std::io::{self, Read};

/// A handle to a resolved shader source.
///
/// A reference does not hold an open stream. Every call to
/// [`open`](FileReference::open) produces a new, independent stream, and
/// references may be opened concurrently from several threads.
pub trait FileReference: Debug + Send + Sync {
    /// Opens a fresh stream over the referenced file.
    fn open(&self) -> io::Result<Box<dyn Read + Send>>;

    /// A human-readable description of where the file lives, for logging.
    fn location(&self) -> String;

    /// Reads the whole file as UTF-8 text.
    fn read_to_string(&self) -> io::Result<String> {
        let mut text = String::new();
        self.open()?.read_to_string(&mut text)?;
        Ok(text)
    }
}

/// The lookup capability backing exactly one module.
///
/// Stores are stateless: lookups have no side effects besides logging and may
/// run concurrently without locking.
pub trait ShaderStore: Debug + Send + Sync {
    /// Looks up `name`, a path relative to the store's root.
    ///
    /// Returns `None` when the file does not exist, and also when the name
    /// would escape the store's sandbox; the two cases are deliberately
    /// indistinguishable to the caller.
    fn lookup(&self, name: &str) -> Option<Box<dyn FileReference>>;
}

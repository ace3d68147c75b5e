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

//! A shader store backed by resources embedded in the binary.

use super::{FileReference, ShaderStore};
use std::collections::HashMap;
use std::fmt;
use std::io::{self, Cursor, Read};
use std::sync::Arc;

/// Resolves a path inside an embedded resource namespace.
type Locator = dyn Fn(&str) -> Option<&'static [u8]> + Send + Sync;

/// A static namespace of embedded files, usually filled with `include_bytes!`.
///
/// Entry paths are normalized to start with a single `/` and contain no
/// repeated separators.
///
/// ```rust
/// use penumbra_core::EmbeddedResources;
///
/// let resources = EmbeddedResources::new([
///     ("shaders/common.glsl", b"float saturate(float x);\n".as_slice()),
/// ]);
/// assert!(resources.locate("/shaders/common.glsl").is_some());
/// assert!(resources.locate("/shaders/missing.glsl").is_none());
/// ```
#[derive(Debug, Default)]
pub struct EmbeddedResources {
    entries: HashMap<String, &'static [u8]>,
}

impl EmbeddedResources {
    /// Builds a namespace from `(path, bytes)` pairs.
    pub fn new(entries: impl IntoIterator<Item = (&'static str, &'static [u8])>) -> Self {
        let entries = entries
            .into_iter()
            .map(|(path, bytes)| (collapse_separators(&format!("/{path}")), bytes))
            .collect();
        Self { entries }
    }

    /// Looks up an absolute path inside the namespace.
    pub fn locate(&self, path: &str) -> Option<&'static [u8]> {
        self.entries.get(path).copied()
    }

    /// Returns the number of embedded files.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the namespace holds no files.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A store resolving names through a locator function into an embedded
/// namespace.
///
/// The target is `base + "/" + name` with runs of `/` collapsed. The locator
/// can only ever answer from its own namespace, so there is nothing to escape.
#[derive(Clone)]
pub struct EmbeddedStore {
    base: String,
    locator: Arc<Locator>,
}

impl EmbeddedStore {
    /// Creates a store that asks `locator` for paths under `base`.
    pub fn new<F>(base: impl Into<String>, locator: F) -> Self
    where
        F: Fn(&str) -> Option<&'static [u8]> + Send + Sync + 'static,
    {
        Self {
            base: base.into(),
            locator: Arc::new(locator),
        }
    }

    /// Creates a store over a static [`EmbeddedResources`] namespace.
    pub fn from_resources(base: impl Into<String>, resources: &'static EmbeddedResources) -> Self {
        Self::new(base, move |path| resources.locate(path))
    }

    /// The path prefix this store resolves under.
    pub fn base(&self) -> &str {
        &self.base
    }
}

impl fmt::Debug for EmbeddedStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EmbeddedStore")
            .field("base", &self.base)
            .finish_non_exhaustive()
    }
}

impl ShaderStore for EmbeddedStore {
    fn lookup(&self, name: &str) -> Option<Box<dyn FileReference>> {
        let target = collapse_separators(&format!("{}/{}", self.base, name));
        log::debug!("open: embedded:{target}");

        let bytes = (self.locator)(&target)?;
        Some(Box::new(EmbeddedFileReference { path: target, bytes }))
    }
}

#[derive(Debug)]
struct EmbeddedFileReference {
    path: String,
    bytes: &'static [u8],
}

impl FileReference for EmbeddedFileReference {
    fn open(&self) -> io::Result<Box<dyn Read + Send>> {
        Ok(Box::new(Cursor::new(self.bytes)))
    }

    fn location(&self) -> String {
        format!("embedded:{}", self.path)
    }
}

/// Collapses every run of `/` into a single `/`.
fn collapse_separators(path: &str) -> String {
    let mut out = String::with_capacity(path.len());
    let mut previous_slash = false;
    for c in path.chars() {
        if c == '/' {
            if !previous_slash {
                out.push(c);
            }
            previous_slash = true;
        } else {
            out.push(c);
            previous_slash = false;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::OnceLock;

    fn resources() -> &'static EmbeddedResources {
        static RESOURCES: OnceLock<EmbeddedResources> = OnceLock::new();
        RESOURCES.get_or_init(|| {
            EmbeddedResources::new([
                ("/penumbra/tests/example.txt", b"Hello.".as_slice()),
                ("penumbra//tests/nested/deep.h", b"int deep;\n".as_slice()),
            ])
        })
    }

    #[test]
    fn test_collapse_separators() {
        assert_eq!(collapse_separators("/a//b///c"), "/a/b/c");
        assert_eq!(collapse_separators("a"), "a");
        assert_eq!(collapse_separators("//"), "/");
    }

    #[test]
    fn test_entries_are_normalized() {
        let res = resources();
        assert_eq!(res.len(), 2);
        assert!(res.locate("/penumbra/tests/nested/deep.h").is_some());
    }

    #[test]
    fn test_lookup_relative_and_absolute() {
        let store = EmbeddedStore::from_resources("/penumbra/tests", resources());
        for name in ["example.txt", "/example.txt"] {
            let file = store.lookup(name).expect("file should resolve");
            assert_eq!(file.read_to_string().unwrap(), "Hello.");
        }
    }

    #[test]
    fn test_lookup_nonexistent() {
        let store = EmbeddedStore::from_resources("/penumbra/tests", resources());
        assert!(store.lookup("/file.txt").is_none());
    }

    #[test]
    fn test_reference_opens_independent_streams() {
        let store = EmbeddedStore::from_resources("/penumbra/tests", resources());
        let file = store.lookup("nested/deep.h").unwrap();

        let mut first = file.open().unwrap();
        let mut buf = [0u8; 3];
        first.read_exact(&mut buf).unwrap();

        // A second stream starts from the beginning regardless of the first.
        assert_eq!(file.read_to_string().unwrap(), "int deep;\n");
        assert_eq!(&buf, b"int");
    }

    #[test]
    fn test_locator_function() {
        let store = EmbeddedStore::new("", |path| {
            (path == "/only.h").then_some(b"x".as_slice())
        });
        assert!(store.lookup("only.h").is_some());
        assert!(store.lookup("other.h").is_none());
    }
}

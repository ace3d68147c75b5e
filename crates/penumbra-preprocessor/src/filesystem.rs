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

//! The virtual file system presented to the macro engine.
//!
//! Engine "files" are request path strings of the form `module/file`. The
//! path arithmetic is plain string manipulation; only [`ResolverFileSystem::source`]
//! touches the resolver.

use crate::engine::{Source, VirtualFileSystem};
use penumbra_core::{ShaderError, ShaderResolver, ShaderResult};

/// The file named by `path`, verbatim.
pub fn file(path: &str) -> String {
    path.to_string()
}

/// The file `name` relative to directory `dir`.
///
/// A `name` containing `/` already names a module and is returned unchanged,
/// so `#include "other/x.h"` reaches module `other` from anywhere.
pub fn file_in(dir: &str, name: &str) -> String {
    if name.contains('/') {
        name.to_string()
    } else {
        format!("{dir}/{name}")
    }
}

/// The part of `path` before its last `/`.
///
/// Returns `None` if there is no `/`, or if the only one is at the start.
pub fn parent(path: &str) -> Option<&str> {
    match path.rfind('/') {
        Some(index) if index >= 1 => Some(&path[..index]),
        _ => None,
    }
}

/// `path` and `name` joined by `/`.
pub fn child(path: &str, name: &str) -> String {
    format!("{path}/{name}")
}

/// A [`VirtualFileSystem`] whose files are opened through a [`ShaderResolver`].
pub struct ResolverFileSystem<'r> {
    resolver: &'r dyn ShaderResolver,
}

impl<'r> ResolverFileSystem<'r> {
    /// Creates a file system reading through `resolver`.
    pub fn new(resolver: &'r dyn ShaderResolver) -> Self {
        Self { resolver }
    }
}

impl VirtualFileSystem for ResolverFileSystem<'_> {
    fn get_file(&self, path: &str) -> String {
        file(path)
    }

    fn get_file_in(&self, dir: &str, name: &str) -> String {
        file_in(dir, name)
    }

    fn get_parent(&self, path: &str) -> Option<String> {
        parent(path).map(str::to_string)
    }

    fn get_child(&self, path: &str, name: &str) -> String {
        child(path, name)
    }

    fn source(&self, path: &str) -> ShaderResult<Source> {
        log::trace!("source: {path}");
        let Some(file) = self.resolver.resolve(path)? else {
            return Err(ShaderError::no_such_file(path));
        };
        let reader = file.open().map_err(|e| ShaderError::io(path, e))?;
        Source::from_reader(path, reader)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use penumbra_core::{EmbeddedStore, ModuleRegistry};
    use std::sync::Arc;

    #[test]
    fn test_file_is_verbatim() {
        assert_eq!(file("a/b.h"), "a/b.h");
        assert_eq!(file("../x"), "../x");
    }

    #[test]
    fn test_file_in() {
        assert_eq!(file_in("m", "x.h"), "m/x.h");
        assert_eq!(file_in("m", "other/x.h"), "other/x.h");
        assert_eq!(file_in("m", "/etc/passwd"), "/etc/passwd");
    }

    #[test]
    fn test_parent() {
        assert_eq!(parent("m/x.h"), Some("m"));
        assert_eq!(parent("m/sub/x.h"), Some("m/sub"));
        assert_eq!(parent("x.h"), None);
        assert_eq!(parent("/x.h"), None);
    }

    #[test]
    fn test_child() {
        assert_eq!(child("m", "x.h"), "m/x.h");
    }

    fn registry() -> ModuleRegistry {
        let registry = ModuleRegistry::new();
        let store = EmbeddedStore::new("/", |path: &str| match path {
            "/a.h" => Some(b"int a;\n".as_slice()),
            "/bad.h" => Some(b"\xff\xfe".as_slice()),
            _ => None,
        });
        registry.register("m", Arc::new(store));
        registry
    }

    #[test]
    fn test_source_reads_through_resolver() {
        let registry = registry();
        let fs = ResolverFileSystem::new(&registry);
        let source = fs.source("m/a.h").unwrap();
        assert_eq!(source.path(), "m/a.h");
        assert_eq!(source.text(), "int a;\n");
    }

    #[test]
    fn test_source_missing_is_not_found() {
        let registry = registry();
        let fs = ResolverFileSystem::new(&registry);
        for path in ["m/missing.h", "nope/a.h"] {
            let err = fs.source(path).unwrap_err();
            assert!(err.is_not_found());
            assert_eq!(err.path(), Some(path));
        }
    }

    #[test]
    fn test_source_bad_path() {
        let registry = registry();
        let fs = ResolverFileSystem::new(&registry);
        let err = fs.source("a.h").unwrap_err();
        assert!(matches!(err, ShaderError::BadPath { .. }));
    }

    #[test]
    fn test_source_invalid_utf8_is_io_failure() {
        let registry = registry();
        let fs = ResolverFileSystem::new(&registry);
        let err = fs.source("m/bad.h").unwrap_err();
        assert!(matches!(err, ShaderError::Io { .. }));
        assert!(!err.is_not_found());
    }
}

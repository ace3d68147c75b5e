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

//! A shader store backed by a directory on disk.

use super::{FileReference, ShaderStore};
use std::ffi::OsString;
use std::fs::File;
use std::io::{self, Read};
use std::path::{Component, Path, PathBuf};

/// A store whose files live under a base directory.
///
/// Requests are restricted to descendants of the base directory: the joined
/// path is normalized lexically, and anything that ends up outside the base
/// (through `..` segments) is refused. Refusals are logged and reported as
/// "not found", so a caller cannot probe for files outside the sandbox.
#[derive(Debug, Clone)]
pub struct DirectoryStore {
    base: PathBuf,
}

impl DirectoryStore {
    /// Creates a store rooted at `base`.
    ///
    /// A relative `base` is made absolute against the current directory first,
    /// so that a leading `..` in a request can never be mistaken for a
    /// descendant of the base.
    pub fn new(base: impl AsRef<Path>) -> Self {
        let base = base.as_ref();
        let absolute = std::path::absolute(base).unwrap_or_else(|_| base.to_path_buf());
        Self {
            base: normalize(&absolute),
        }
    }

    /// The normalized base directory.
    pub fn base(&self) -> &Path {
        &self.base
    }

    /// Computes the normalized target for `name` without touching the disk.
    ///
    /// Returns `None` if the target falls outside the base directory.
    pub fn target(&self, name: &str) -> Option<PathBuf> {
        let mut joined = OsString::from(self.base.as_os_str());
        joined.push("/");
        joined.push(name);

        let target = normalize(Path::new(&joined));
        target.starts_with(&self.base).then_some(target)
    }
}

impl ShaderStore for DirectoryStore {
    fn lookup(&self, name: &str) -> Option<Box<dyn FileReference>> {
        let Some(target) = self.target(name) else {
            log::warn!(
                "Refusing to allow access out of the base directory (base {}, request {})",
                self.base.display(),
                name
            );
            return None;
        };

        log::debug!("open: {}", target.display());
        if target.is_file() {
            Some(Box::new(DirectoryFileReference { path: target }))
        } else {
            None
        }
    }
}

/// A file inside a [`DirectoryStore`]. The stream is opened on demand.
#[derive(Debug)]
struct DirectoryFileReference {
    path: PathBuf,
}

impl FileReference for DirectoryFileReference {
    fn open(&self) -> io::Result<Box<dyn Read + Send>> {
        Ok(Box::new(File::open(&self.path)?))
    }

    fn location(&self) -> String {
        self.path.display().to_string()
    }
}

/// Lexically normalizes `path`: drops `.` segments, folds `..` into the
/// preceding segment and collapses repeated separators. `..` directly under
/// the root stays at the root. Symlinks are not resolved.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Prefix(_) | Component::RootDir => out.push(component.as_os_str()),
            Component::CurDir => {}
            Component::ParentDir => match out.components().next_back() {
                Some(Component::Normal(_)) => {
                    out.pop();
                }
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                _ => out.push(".."),
            },
            Component::Normal(segment) => out.push(segment),
        }
    }
    out
}

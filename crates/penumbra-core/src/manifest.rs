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

//! The `Shaders.toml` module manifest.
//!
//! ```toml
//! [modules]
//! "com.example.lighting" = "shaders/lighting"
//! "com.example.common" = "/opt/shaders/common"
//! ```
//!
//! Relative directories are resolved against the directory containing the
//! manifest.

use serde::Deserialize;
use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// An error raised while loading a module manifest.
#[derive(Debug, Error)]
pub enum ManifestError {
    /// The manifest file could not be read.
    #[error("Failed to read module manifest '{}': {source}", .path.display())]
    Read {
        /// The manifest path.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: io::Error,
    },
    /// The manifest is not valid TOML or does not match the expected layout.
    #[error("Failed to parse module manifest '{}': {source}", .path.display())]
    Parse {
        /// The manifest path.
        path: PathBuf,
        /// The underlying parse error.
        #[source]
        source: toml::de::Error,
    },
}

/// Maps module names to the directories holding their files.
#[derive(Deserialize, Debug, Default, Clone, PartialEq, Eq)]
pub struct ModuleManifest {
    #[serde(default)]
    modules: BTreeMap<String, PathBuf>,
}

impl ModuleManifest {
    /// Loads and parses the manifest at `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ManifestError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ManifestError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let root = path.parent().unwrap_or_else(|| Path::new(""));
        Self::parse(&text, root).map_err(|source| ManifestError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Parses manifest text, resolving relative directories against `root`.
    pub fn parse(text: &str, root: &Path) -> Result<Self, toml::de::Error> {
        let mut manifest: ModuleManifest = toml::from_str(text)?;
        for directory in manifest.modules.values_mut() {
            if directory.is_relative() {
                *directory = root.join(&*directory);
            }
        }
        Ok(manifest)
    }

    /// Adds or replaces a module entry.
    pub fn insert(&mut self, module: impl Into<String>, directory: impl Into<PathBuf>) {
        self.modules.insert(module.into(), directory.into());
    }

    /// Iterates over `(module, directory)` entries in name order.
    pub fn modules(&self) -> impl Iterator<Item = (&String, &PathBuf)> {
        self.modules.iter()
    }

    /// Returns the number of modules listed.
    pub fn len(&self) -> usize {
        self.modules.len()
    }

    /// Returns `true` if no modules are listed.
    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}

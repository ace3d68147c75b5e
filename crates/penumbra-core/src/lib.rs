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

//! # Penumbra Core
//!
//! Resolution of shader sources organized into named, non-overlapping modules.
//!
//! A request of the form `<module>/<relative-path>` is split at its first `/`,
//! the module name is looked up in a [`ModuleRegistry`], and the remainder is
//! handed to the module's [`ShaderStore`]. Stores are sandboxed: a store never
//! yields a reference to a file outside its configured root.
//!
//! ```rust
//! use penumbra_core::{EmbeddedStore, ModuleRegistry, ShaderResolver};
//! use std::sync::Arc;
//!
//! fn locate(path: &str) -> Option<&'static [u8]> {
//!     (path == "/lib/common.glsl").then_some(b"float saturate(float x);\n".as_slice())
//! }
//!
//! let registry = ModuleRegistry::new();
//! registry.register("com.example.lib", Arc::new(EmbeddedStore::new("/lib", locate)));
//!
//! let file = registry.resolve("com.example.lib/common.glsl").unwrap();
//! assert!(file.is_some());
//! ```

#![warn(missing_docs)]

pub mod diagnostic;
pub mod error;
pub mod manifest;
pub mod path;
pub mod provider;
pub mod registry;
pub mod store;

pub use diagnostic::{Diagnostic, DiagnosticKind};
pub use error::{ShaderError, ShaderResult};
pub use manifest::{ManifestError, ModuleManifest};
pub use path::ShaderPath;
pub use provider::{DirectoryModuleProvider, ModuleMap, ModuleProvider, ModuleProviderRegistration};
pub use registry::{ModuleRegistry, ShaderResolver};
pub use store::{
    DirectoryStore, EmbeddedResources, EmbeddedStore, FileReference, ShaderStore,
};

// Re-exported so downstream crates can submit providers without naming the dependency.
pub use inventory;

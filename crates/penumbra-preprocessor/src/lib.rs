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

//! # Penumbra Preprocessor
//!
//! Runs a C-style macro engine over shader sources addressed as
//! `module/file`. Includes are read through the same resolver: a quoted
//! include is looked up next to the including file first, then in every
//! registered module; an include naming another module (`other/x.h`)
//! reaches it directly.
//!
//! ```rust
//! use penumbra_core::{EmbeddedStore, ModuleRegistry};
//! use penumbra_preprocessor::{PreprocessorConfig, ShaderPreprocessor};
//! use std::sync::Arc;
//!
//! fn locate(path: &str) -> Option<&'static [u8]> {
//!     match path {
//!         "/lib/main.frag" => Some(b"#include \"common.glsl\"\nvec4 color = TINT;\n".as_slice()),
//!         "/lib/common.glsl" => Some(b"#define TINT vec4(1.0)\n".as_slice()),
//!         _ => None,
//!     }
//! }
//!
//! let registry = Arc::new(ModuleRegistry::new());
//! registry.register("com.example.lib", Arc::new(EmbeddedStore::new("/lib", locate)));
//!
//! let config = PreprocessorConfig::builder()
//!     .with_resolver(registry)
//!     .with_version(330)
//!     .build()?;
//! let preprocessor = ShaderPreprocessor::new(config);
//!
//! let lines = preprocessor.preprocess_file([("UNUSED", "0")], "com.example.lib/main.frag")?;
//! assert_eq!(lines, ["#version 330 core\n", "vec4 color = vec4(1.0);\n"]);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

#![warn(missing_docs)]

pub mod config;
pub mod engine;
pub mod filesystem;
pub mod preprocessor;

pub use config::{ConfigError, PreprocessorConfig, PreprocessorConfigBuilder};
pub use engine::{
    CppEngine, CppEngineFactory, EngineFactory, MacroEngine, PreprocessorListener, Source, Token,
    TokenKind, VirtualFileSystem,
};
pub use filesystem::ResolverFileSystem;
pub use preprocessor::{fail_on_error, fail_on_warning, ShaderPreprocessor};

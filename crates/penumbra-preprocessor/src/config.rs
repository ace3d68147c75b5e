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

//! Configuration shared by every run of a [`ShaderPreprocessor`](crate::ShaderPreprocessor).

use penumbra_core::ShaderResolver;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// An error raised while building a [`PreprocessorConfig`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// No resolver was supplied.
    #[error("A preprocessor configuration requires a resolver")]
    MissingResolver,
}

/// Immutable preprocessor configuration.
///
/// Built once and reused across many runs. Cloning is cheap: the resolver is
/// shared.
#[derive(Clone)]
pub struct PreprocessorConfig {
    resolver: Arc<dyn ShaderResolver>,
    version: Option<u32>,
}

impl PreprocessorConfig {
    /// Starts building a configuration.
    pub fn builder() -> PreprocessorConfigBuilder {
        PreprocessorConfigBuilder::new()
    }

    /// The resolver through which every source is read.
    pub fn resolver(&self) -> &Arc<dyn ShaderResolver> {
        &self.resolver
    }

    /// The GLSL version emitted as the first output line, if any.
    pub fn version(&self) -> Option<u32> {
        self.version
    }
}

impl fmt::Debug for PreprocessorConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PreprocessorConfig")
            .field("modules", &self.resolver.available().keys().collect::<Vec<_>>())
            .field("version", &self.version)
            .finish()
    }
}

/// A builder for [`PreprocessorConfig`].
#[derive(Default)]
pub struct PreprocessorConfigBuilder {
    resolver: Option<Arc<dyn ShaderResolver>>,
    version: Option<u32>,
}

impl PreprocessorConfigBuilder {
    /// Creates a builder with no resolver and no version.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the resolver. Required.
    pub fn with_resolver(mut self, resolver: Arc<dyn ShaderResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    /// Requests a `#version <version> core` line at the top of every output.
    pub fn with_version(mut self, version: u32) -> Self {
        self.version = Some(version);
        self
    }

    /// Builds the configuration.
    ///
    /// # Errors
    /// Returns [`ConfigError::MissingResolver`] if no resolver was set.
    pub fn build(self) -> Result<PreprocessorConfig, ConfigError> {
        let resolver = self.resolver.ok_or(ConfigError::MissingResolver)?;
        Ok(PreprocessorConfig {
            resolver,
            version: self.version,
        })
    }
}

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

//! Module providers: the units that contribute modules to a registry.
//!
//! Providers are discovered in two ways. Statically, a crate submits a
//! [`ModuleProviderRegistration`] through `inventory` and
//! [`ModuleRegistry::discover`](crate::ModuleRegistry::discover) picks it up.
//! Dynamically, a host calls
//! [`ModuleRegistry::on_register`](crate::ModuleRegistry::on_register) and
//! [`ModuleRegistry::on_unregister`](crate::ModuleRegistry::on_unregister) as
//! providers come and go.

use crate::manifest::ModuleManifest;
use crate::store::{DirectoryStore, ShaderStore};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

/// A set of modules, keyed by module name.
pub type ModuleMap = BTreeMap<String, Arc<dyn ShaderStore>>;

/// A source of named modules.
///
/// [`available`](ModuleProvider::available) must hand out the *same* store
/// `Arc`s on every call: unregistration compares stores by identity, so a
/// provider that rebuilt its stores could never be unregistered.
pub trait ModuleProvider: Send + Sync {
    /// A label identifying the provider in logs.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    /// The modules this provider exports.
    fn available(&self) -> ModuleMap;
}

/// A provider registered at link time for static discovery.
///
/// ```rust,ignore
/// penumbra_core::inventory::submit! {
///     ModuleProviderRegistration::new("lighting", || Box::new(LightingModules::new()))
/// }
/// ```
pub struct ModuleProviderRegistration {
    /// A label for logs.
    pub name: &'static str,
    /// Builds the provider.
    pub create: fn() -> Box<dyn ModuleProvider>,
}

impl ModuleProviderRegistration {
    /// Creates a registration usable in `inventory::submit!`.
    pub const fn new(name: &'static str, create: fn() -> Box<dyn ModuleProvider>) -> Self {
        Self { name, create }
    }
}

inventory::collect!(ModuleProviderRegistration);

/// A provider of directory-backed modules.
#[derive(Debug)]
pub struct DirectoryModuleProvider {
    name: String,
    modules: ModuleMap,
}

impl DirectoryModuleProvider {
    /// Creates an empty provider.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            modules: ModuleMap::new(),
        }
    }

    /// Adds a module whose files live under `directory`.
    pub fn with_module(mut self, module: impl Into<String>, directory: impl AsRef<Path>) -> Self {
        self.modules
            .insert(module.into(), Arc::new(DirectoryStore::new(directory)));
        self
    }

    /// Creates a provider exporting every module listed in `manifest`.
    pub fn from_manifest(name: impl Into<String>, manifest: &ModuleManifest) -> Self {
        manifest
            .modules()
            .fold(Self::new(name), |provider, (module, directory)| {
                provider.with_module(module, directory)
            })
    }

    /// Returns the number of modules this provider exports.
    pub fn len(&self) -> usize {
        self.modules.len()
    }

    /// Returns `true` if this provider exports no modules.
    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}

impl ModuleProvider for DirectoryModuleProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn available(&self) -> ModuleMap {
        self.modules.clone()
    }
}

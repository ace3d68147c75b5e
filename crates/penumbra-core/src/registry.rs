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

//! The module registry and the resolver interface built on top of it.

use crate::error::ShaderResult;
use crate::path::ShaderPath;
use crate::provider::{ModuleMap, ModuleProvider, ModuleProviderRegistration};
use crate::store::{FileReference, ShaderStore};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Resolves `<module>/<relative-path>` requests to file references.
pub trait ShaderResolver: Send + Sync {
    /// Resolves `path`.
    ///
    /// Returns `Ok(None)` if the module is unknown or the module's store has
    /// no such file.
    ///
    /// # Errors
    /// Returns [`ShaderError::BadPath`](crate::ShaderError::BadPath) if `path`
    /// does not contain a `/`.
    fn resolve(&self, path: &str) -> ShaderResult<Option<Box<dyn FileReference>>>;

    /// A snapshot of the modules currently available.
    fn available(&self) -> ModuleMap;
}

/// A thread-safe mapping from module names to stores.
///
/// Each operation takes the internal lock for the duration of a single map
/// operation only: a resolve clones the store `Arc` under a read lock and
/// performs the store lookup after releasing it, so readers never wait on a
/// slow store and writers never wait on a reader's I/O.
#[derive(Debug, Default)]
pub struct ModuleRegistry {
    modules: RwLock<HashMap<String, Arc<dyn ShaderStore>>>,
}

impl ModuleRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry holding the modules of every provider, in order.
    ///
    /// Name collisions between providers are logged; the later provider wins.
    pub fn from_providers<'a>(providers: impl IntoIterator<Item = &'a dyn ModuleProvider>) -> Self {
        let registry = Self::new();
        for provider in providers {
            registry.on_register(provider);
        }
        registry
    }

    /// Creates a registry from every provider submitted through
    /// [`inventory`] as a [`ModuleProviderRegistration`].
    pub fn discover() -> Self {
        let registry = Self::new();
        let mut count = 0;
        for registration in inventory::iter::<ModuleProviderRegistration> {
            log::debug!("discovered module provider {}", registration.name);
            let provider = (registration.create)();
            registry.on_register(provider.as_ref());
            count += 1;
        }
        log::info!(
            "ModuleRegistry: discovered {} provider(s), {} module(s)",
            count,
            registry.len()
        );
        registry
    }

    /// Registers `store` under `name`, replacing any previous registration.
    ///
    /// Replacing a *different* store is logged as a collision but is not an
    /// error: the last registration wins.
    pub fn register(&self, name: impl Into<String>, store: Arc<dyn ShaderStore>) {
        let name = name.into();
        let previous = self.write().insert(name.clone(), store.clone());
        match previous {
            Some(previous) if !Arc::ptr_eq(&previous, &store) => {
                log::warn!("multiple modules with the same name: {name}");
            }
            _ => {}
        }
        log::debug!("registered module {name}");
    }

    /// Removes the registration for `name`, but only if it is still `store`.
    ///
    /// A stale unregistration, issued after another provider has registered a
    /// different store under the same name, leaves that newer registration in
    /// place. Returns `true` if a mapping was removed.
    pub fn unregister(&self, name: &str, store: &Arc<dyn ShaderStore>) -> bool {
        let mut modules = self.write();
        let is_current = modules
            .get(name)
            .is_some_and(|current| Arc::ptr_eq(current, store));
        let removed = is_current && modules.remove(name).is_some();
        drop(modules);

        if removed {
            log::debug!("unregistered module {name}");
        } else {
            log::debug!("module {name} not unregistered: not the registered store");
        }
        removed
    }

    /// Registers every module exported by `provider`.
    pub fn on_register(&self, provider: &dyn ModuleProvider) {
        for (name, store) in provider.available() {
            log::debug!("registering module {} via provider {}", name, provider.name());
            self.register(name, store);
        }
    }

    /// Unregisters every module exported by `provider` that is still mapped to
    /// the provider's own store.
    pub fn on_unregister(&self, provider: &dyn ModuleProvider) {
        for (name, store) in provider.available() {
            log::debug!("unregistering module {} via provider {}", name, provider.name());
            self.unregister(&name, &store);
        }
    }

    /// Returns the store registered under `name`, if any.
    pub fn get(&self, name: &str) -> Option<Arc<dyn ShaderStore>> {
        self.read().get(name).cloned()
    }

    /// Returns `true` if a module named `name` is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.read().contains_key(name)
    }

    /// Returns the registered module names in sorted order.
    pub fn module_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Returns the number of registered modules.
    pub fn len(&self) -> usize {
        self.read().len()
    }

    /// Returns `true` if no modules are registered.
    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    // Writers hold no invariant across the lock that a panic could break, so a
    // poisoned lock is still consistent.
    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, Arc<dyn ShaderStore>>> {
        self.modules.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, Arc<dyn ShaderStore>>> {
        self.modules.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl ShaderResolver for ModuleRegistry {
    fn resolve(&self, path: &str) -> ShaderResult<Option<Box<dyn FileReference>>> {
        log::debug!("resolve: {path}");
        let request = ShaderPath::parse(path)?;

        match self.get(request.module()) {
            Some(store) => {
                log::debug!("lookup [{}]: {}", request.module(), request.file());
                Ok(store.lookup(request.file()))
            }
            None => {
                log::debug!("nonexistent module: {}", request.module());
                Ok(None)
            }
        }
    }

    fn available(&self) -> ModuleMap {
        self.read()
            .iter()
            .map(|(name, store)| (name.clone(), store.clone()))
            .collect()
    }
}

impl<R: ShaderResolver + ?Sized> ShaderResolver for Arc<R> {
    fn resolve(&self, path: &str) -> ShaderResult<Option<Box<dyn FileReference>>> {
        (**self).resolve(path)
    }

    fn available(&self) -> ModuleMap {
        (**self).available()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ShaderError;
    use std::io::{self, Cursor, Read};

    #[derive(Debug)]
    struct TextReference(&'static str);

    impl FileReference for TextReference {
        fn open(&self) -> io::Result<Box<dyn Read + Send>> {
            Ok(Box::new(Cursor::new(self.0.as_bytes())))
        }

        fn location(&self) -> String {
            "memory".to_string()
        }
    }

    /// A store holding a single file, answering for any name.
    #[derive(Debug)]
    struct SingleFileStore(&'static str);

    impl ShaderStore for SingleFileStore {
        fn lookup(&self, _name: &str) -> Option<Box<dyn FileReference>> {
            Some(Box::new(TextReference(self.0)))
        }
    }

    /// A store that records the names it was asked for.
    #[derive(Debug, Default)]
    struct RecordingStore {
        names: std::sync::Mutex<Vec<String>>,
    }

    impl ShaderStore for RecordingStore {
        fn lookup(&self, name: &str) -> Option<Box<dyn FileReference>> {
            self.names.lock().unwrap().push(name.to_string());
            None
        }
    }

    struct FixedProvider {
        modules: ModuleMap,
    }

    impl FixedProvider {
        fn new(names: &[&str], text: &'static str) -> Self {
            let modules = names
                .iter()
                .map(|n| {
                    let store: Arc<dyn ShaderStore> = Arc::new(SingleFileStore(text));
                    (n.to_string(), store)
                })
                .collect();
            Self { modules }
        }
    }

    impl ModuleProvider for FixedProvider {
        fn available(&self) -> ModuleMap {
            self.modules.clone()
        }
    }

    fn read(file: Box<dyn FileReference>) -> String {
        file.read_to_string().unwrap()
    }

    #[test]
    fn test_resolve_splits_at_first_slash() {
        let registry = ModuleRegistry::new();
        let store = Arc::new(RecordingStore::default());
        registry.register("module", store.clone());

        assert!(registry.resolve("module/sub/path").unwrap().is_none());
        assert_eq!(*store.names.lock().unwrap(), vec!["/sub/path".to_string()]);
    }

    #[test]
    fn test_resolve_without_slash_is_bad_path() {
        let registry = ModuleRegistry::new();
        registry.register("example.txt", Arc::new(SingleFileStore("x")));

        let err = registry.resolve("example.txt").unwrap_err();
        assert!(matches!(err, ShaderError::BadPath { .. }));
    }

    #[test]
    fn test_resolve_unknown_module_is_absent() {
        let registry = ModuleRegistry::new();
        registry.register("known", Arc::new(SingleFileStore("x")));
        assert!(registry.resolve("unknown-module/x").unwrap().is_none());
    }

    #[test]
    fn test_duplicate_names_keep_one_entry() {
        let p = FixedProvider::new(&["m"], "from p");
        let q = FixedProvider::new(&["m"], "from q");
        let registry = ModuleRegistry::from_providers([&p as &dyn ModuleProvider, &q]);

        let available = registry.available();
        assert_eq!(available.len(), 1);
        assert!(available.contains_key("m"));
        assert_eq!(read(registry.resolve("m/file.h").unwrap().unwrap()), "from q");
    }

    #[test]
    fn test_unregister_removes_own_modules() {
        let p = FixedProvider::new(&["a", "b"], "p");
        let registry = ModuleRegistry::new();
        registry.on_register(&p);
        assert_eq!(registry.len(), 2);

        registry.on_unregister(&p);
        assert!(registry.is_empty());
        assert!(registry.resolve("a/example.txt").unwrap().is_none());
    }

    #[test]
    fn test_stale_unregister_keeps_newer_registration() {
        let p = FixedProvider::new(&["m", "only-p"], "from p");
        let q = FixedProvider::new(&["m"], "from q");
        let registry = ModuleRegistry::new();

        registry.on_register(&p);
        registry.on_register(&q);
        registry.on_unregister(&p);

        assert_eq!(registry.module_names(), vec!["m".to_string()]);
        assert_eq!(read(registry.resolve("m/x.h").unwrap().unwrap()), "from q");
    }

    #[test]
    fn test_reregistering_same_store_is_not_a_collision() {
        let registry = ModuleRegistry::new();
        let store: Arc<dyn ShaderStore> = Arc::new(SingleFileStore("x"));
        registry.register("m", store.clone());
        registry.register("m", store.clone());
        assert_eq!(registry.len(), 1);
        assert!(registry.unregister("m", &store));
        assert!(!registry.unregister("m", &store));
    }

    #[test]
    fn test_available_is_a_snapshot() {
        let registry = ModuleRegistry::new();
        registry.register("a", Arc::new(SingleFileStore("x")));
        let snapshot = registry.available();
        registry.register("b", Arc::new(SingleFileStore("y")));

        assert_eq!(snapshot.len(), 1);
        assert_eq!(registry.available().len(), 2);
    }

    #[test]
    fn test_concurrent_resolve_during_registration() {
        let registry = Arc::new(ModuleRegistry::new());
        let stable: Arc<dyn ShaderStore> = Arc::new(SingleFileStore("stable"));
        registry.register("stable", stable);

        std::thread::scope(|scope| {
            let writer = registry.clone();
            scope.spawn(move || {
                for i in 0..500 {
                    let store: Arc<dyn ShaderStore> = Arc::new(SingleFileStore("churn"));
                    let name = format!("churn{}", i % 8);
                    writer.register(name.clone(), store.clone());
                    writer.unregister(&name, &store);
                }
            });

            for _ in 0..4 {
                let reader = registry.clone();
                scope.spawn(move || {
                    for _ in 0..500 {
                        let file = reader.resolve("stable/a.h").unwrap().unwrap();
                        assert_eq!(file.read_to_string().unwrap(), "stable");
                        for (_, store) in reader.available() {
                            let _ = store.lookup("/a.h");
                        }
                    }
                });
            }
        });

        assert_eq!(registry.module_names(), vec!["stable".to_string()]);
    }
}

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

use penumbra_core::{
    EmbeddedResources, EmbeddedStore, ModuleMap, ModuleProvider, ModuleProviderRegistration,
    ModuleRegistry, ShaderError, ShaderResolver, ShaderStore,
};
use std::sync::{Arc, OnceLock};

fn resources() -> &'static EmbeddedResources {
    static RESOURCES: OnceLock<EmbeddedResources> = OnceLock::new();
    RESOURCES.get_or_init(|| {
        EmbeddedResources::new([
            ("example0/example.txt", b"Hello.".as_slice()),
            ("example1/other.txt", b"Other.".as_slice()),
            ("shared/first.h", b"int first;\n".as_slice()),
            ("shared/second.h", b"int second;\n".as_slice()),
        ])
    })
}

struct ExampleModules {
    modules: ModuleMap,
}

impl ExampleModules {
    fn new() -> Self {
        let mut modules = ModuleMap::new();
        for (name, base) in [("com.example.example0", "/example0"), ("com.example.example1", "/example1")] {
            let store: Arc<dyn ShaderStore> = Arc::new(EmbeddedStore::from_resources(base, resources()));
            modules.insert(name.to_string(), store);
        }
        Self { modules }
    }
}

impl ModuleProvider for ExampleModules {
    fn name(&self) -> &str {
        "example-modules"
    }

    fn available(&self) -> ModuleMap {
        self.modules.clone()
    }
}

/// Exports `com.example.shared` from a different base than [`SecondShared`].
struct FirstShared;

impl ModuleProvider for FirstShared {
    fn available(&self) -> ModuleMap {
        static STORE: OnceLock<Arc<dyn ShaderStore>> = OnceLock::new();
        let store = STORE.get_or_init(|| {
            shared_store(|path| (path == "/shared/first.h").then(|| resources().locate(path)).flatten())
        });
        shared_module(store)
    }
}

struct SecondShared;

impl ModuleProvider for SecondShared {
    fn available(&self) -> ModuleMap {
        static STORE: OnceLock<Arc<dyn ShaderStore>> = OnceLock::new();
        let store = STORE.get_or_init(|| {
            shared_store(|path| (path == "/shared/second.h").then(|| resources().locate(path)).flatten())
        });
        shared_module(store)
    }
}

fn shared_store(locator: fn(&str) -> Option<&'static [u8]>) -> Arc<dyn ShaderStore> {
    Arc::new(EmbeddedStore::new("/shared", locator))
}

fn shared_module(store: &Arc<dyn ShaderStore>) -> ModuleMap {
    ModuleMap::from([("com.example.shared".to_string(), Arc::clone(store))])
}

fn create_example_modules() -> Box<dyn ModuleProvider> {
    Box::new(ExampleModules::new())
}

fn create_first_shared() -> Box<dyn ModuleProvider> {
    Box::new(FirstShared)
}

fn create_second_shared() -> Box<dyn ModuleProvider> {
    Box::new(SecondShared)
}

inventory::submit! {
    ModuleProviderRegistration::new("example-modules", create_example_modules)
}

inventory::submit! {
    ModuleProviderRegistration::new("first-shared", create_first_shared)
}

inventory::submit! {
    ModuleProviderRegistration::new("second-shared", create_second_shared)
}

#[test]
fn test_discover_registers_all_providers() {
    let _ = env_logger::builder().is_test(true).try_init();

    let registry = ModuleRegistry::discover();
    let available = registry.available();
    assert_eq!(available.len(), 3);
    assert!(available.contains_key("com.example.example0"));
    assert!(available.contains_key("com.example.example1"));
    assert!(available.contains_key("com.example.shared"));

    let file = registry
        .resolve("com.example.example0/example.txt")
        .unwrap()
        .expect("example.txt should resolve");
    let mut buf = [0u8; 6];
    std::io::Read::read_exact(&mut file.open().unwrap(), &mut buf).unwrap();
    assert_eq!(&buf, b"Hello.");
}

#[test]
fn test_discover_collision_keeps_exactly_one_module() {
    let registry = ModuleRegistry::discover();
    let shared = registry.available();
    assert_eq!(
        shared.keys().filter(|k| k.as_str() == "com.example.shared").count(),
        1
    );

    // Exactly one of the two colliding providers won.
    let first = registry.resolve("com.example.shared/first.h").unwrap().is_some();
    let second = registry.resolve("com.example.shared/second.h").unwrap().is_some();
    assert!(first ^ second);
}

#[test]
fn test_discovered_resolver_contract() {
    let registry = ModuleRegistry::discover();

    assert!(registry
        .resolve("com.example.nonexistent/example.txt")
        .unwrap()
        .is_none());
    assert!(registry
        .resolve("com.example.example1/example.txt")
        .unwrap()
        .is_none());
    assert!(matches!(
        registry.resolve("example.txt"),
        Err(ShaderError::BadPath { .. })
    ));
}

#[test]
fn test_shared_providers_keep_their_store_identity() {
    let first = FirstShared.available();
    let again = FirstShared.available();
    assert!(Arc::ptr_eq(
        &first["com.example.shared"],
        &again["com.example.shared"]
    ));
}

#[test]
fn test_unregister_only_removes_the_current_provider() {
    let registry = ModuleRegistry::new();
    registry.on_register(&FirstShared);
    registry.on_register(&SecondShared);

    // SecondShared registered last; removing FirstShared is stale.
    registry.on_unregister(&FirstShared);
    assert!(registry.contains("com.example.shared"));
    assert!(registry
        .resolve("com.example.shared/second.h")
        .unwrap()
        .is_some());

    registry.on_unregister(&SecondShared);
    assert!(!registry.contains("com.example.shared"));
}

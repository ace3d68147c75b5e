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

use anyhow::Result;
use penumbra_core::{DirectoryStore, ShaderStore};
use std::fs;
use tempfile::tempdir;

#[test]
fn test_lookup_nonexistent() {
    let base = tempdir().unwrap();
    let store = DirectoryStore::new(base.path());
    assert!(store.lookup("/file.txt").is_none());
}

#[test]
fn test_lookup_outside_base() {
    let base = tempdir().unwrap();
    let store = DirectoryStore::new(base.path());
    assert!(store.lookup("../../file.txt").is_none());
}

#[test]
fn test_lookup_outside_base_existing_file() {
    // The refusal must not depend on whether the escaped target exists.
    let root = tempdir().unwrap();
    let base = root.path().join("x");
    let sibling = root.path().join("x-other");
    fs::create_dir(&base).unwrap();
    fs::create_dir(&sibling).unwrap();
    fs::write(sibling.join("secret.h"), "int secret;").unwrap();
    fs::write(root.path().join("top.h"), "int top;").unwrap();

    let store = DirectoryStore::new(&base);
    assert!(store.lookup("../x-other/secret.h").is_none());
    assert!(store.lookup("/../top.h").is_none());
    assert!(store.lookup("a/../../top.h").is_none());
}

#[test]
fn test_lookup_exists() -> Result<()> {
    let base = tempdir()?;
    fs::write(base.path().join("file.txt"), "Hello")?;

    let store = DirectoryStore::new(base.path());
    for name in ["/file.txt", "file.txt", "./file.txt", "//file.txt"] {
        let file = store.lookup(name).expect("file should resolve");
        assert_eq!(file.read_to_string()?, "Hello");
    }
    Ok(())
}

#[test]
fn test_lookup_nested() -> Result<()> {
    let base = tempdir()?;
    fs::create_dir_all(base.path().join("lighting/brdf"))?;
    fs::write(base.path().join("lighting/brdf/ggx.h"), "float ggx();\n")?;

    let store = DirectoryStore::new(base.path());
    let file = store.lookup("/lighting/brdf/ggx.h").unwrap();
    assert_eq!(file.read_to_string()?, "float ggx();\n");
    assert!(file.location().ends_with("ggx.h"));
    Ok(())
}

#[test]
fn test_directories_are_not_files() {
    let base = tempdir().unwrap();
    fs::create_dir(base.path().join("sub")).unwrap();
    let store = DirectoryStore::new(base.path());
    assert!(store.lookup("/sub").is_none());
}

#[test]
fn test_reference_reopens_after_file_changes() -> Result<()> {
    let base = tempdir()?;
    let path = base.path().join("live.h");
    fs::write(&path, "int v1;")?;

    let store = DirectoryStore::new(base.path());
    let file = store.lookup("/live.h").unwrap();
    assert_eq!(file.read_to_string()?, "int v1;");

    fs::write(&path, "int v2;")?;
    assert_eq!(file.read_to_string()?, "int v2;");
    Ok(())
}

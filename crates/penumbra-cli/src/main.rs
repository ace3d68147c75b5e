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

// Command-line front end for penumbra.
// Run with: penumbra [--manifest Shaders.toml] [--module NAME=DIR]... <command>

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use env_logger::{Builder, Env};
use penumbra_core::{
    Diagnostic, DirectoryModuleProvider, ModuleManifest, ModuleRegistry, ShaderResult,
};
use penumbra_preprocessor::{fail_on_error, PreprocessorConfig, ShaderPreprocessor};
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Debug, Parser)]
#[command(name = "penumbra", about = "Resolve and preprocess modular shader sources")]
struct Cli {
    /// Module manifest (Shaders.toml) mapping module names to directories.
    #[arg(long, global = true, value_name = "FILE")]
    manifest: Option<PathBuf>,

    /// Registers an extra directory module. May be repeated.
    #[arg(long = "module", global = true, value_name = "NAME=DIR", value_parser = parse_module)]
    modules: Vec<(String, PathBuf)>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Preprocess one shader and print the resulting lines.
    Preprocess {
        /// Defines a macro. A bare NAME defines it as 1. May be repeated.
        #[arg(short = 'D', long = "define", value_name = "NAME=VALUE", value_parser = parse_define)]
        defines: Vec<(String, String)>,

        /// Emits `#version <N> core` as the first line.
        #[arg(long, value_name = "N")]
        version: Option<u32>,

        /// Logs warnings instead of failing on them.
        #[arg(long)]
        lenient: bool,

        /// The shader to preprocess, as module/file.
        file: String,
    },
    /// List the registered modules.
    Modules,
}

fn parse_module(arg: &str) -> Result<(String, PathBuf), String> {
    match arg.split_once('=') {
        Some((name, dir)) if !name.is_empty() && !dir.is_empty() => {
            Ok((name.to_string(), PathBuf::from(dir)))
        }
        _ => Err(format!("expected NAME=DIR, got '{arg}'")),
    }
}

fn parse_define(arg: &str) -> Result<(String, String), String> {
    match arg.split_once('=') {
        Some(("", _)) => Err(format!("expected NAME=VALUE, got '{arg}'")),
        Some((name, value)) => Ok((name.to_string(), value.to_string())),
        None if arg.is_empty() => Err("expected NAME=VALUE, got an empty define".to_string()),
        None => Ok((arg.to_string(), "1".to_string())),
    }
}

/// Builds the registry: statically discovered providers, then the manifest,
/// then `--module` arguments. Later sources win on name collisions.
fn build_registry(cli: &Cli) -> Result<ModuleRegistry> {
    let registry = ModuleRegistry::discover();

    if let Some(path) = &cli.manifest {
        let manifest = ModuleManifest::load(path)
            .with_context(|| format!("Failed to load manifest {}", path.display()))?;
        log::info!("Loaded {} module(s) from {}", manifest.len(), path.display());
        registry.on_register(&DirectoryModuleProvider::from_manifest("manifest", &manifest));
    }

    let extra = cli
        .modules
        .iter()
        .fold(DirectoryModuleProvider::new("command-line"), |provider, (name, dir)| {
            provider.with_module(name, dir)
        });
    registry.on_register(&extra);

    Ok(registry)
}

fn preprocess(
    registry: ModuleRegistry,
    defines: Vec<(String, String)>,
    version: Option<u32>,
    lenient: bool,
    file: &str,
) -> Result<Vec<String>> {
    let mut builder = PreprocessorConfig::builder().with_resolver(Arc::new(registry));
    if let Some(version) = version {
        builder = builder.with_version(version);
    }
    let preprocessor = ShaderPreprocessor::new(builder.build()?);

    let lines = if lenient {
        let log_warning = |d: &Diagnostic| -> ShaderResult<()> {
            log::warn!("{d}");
            Ok(())
        };
        preprocessor.preprocess_file_with_callbacks(defines, file, log_warning, fail_on_error)
    } else {
        preprocessor.preprocess_file(defines, file)
    };
    lines.with_context(|| format!("Failed to preprocess {file}"))
}

fn main() -> Result<()> {
    Builder::from_env(Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();
    let registry = build_registry(&cli)?;

    match cli.command {
        Command::Preprocess {
            defines,
            version,
            lenient,
            file,
        } => {
            let lines = preprocess(registry, defines, version, lenient, &file)?;
            let mut out = io::stdout().lock();
            for line in &lines {
                out.write_all(line.as_bytes())?;
            }
            out.flush()?;
        }
        Command::Modules => {
            for name in registry.module_names() {
                println!("{name}");
            }
        }
    }
    Ok(())
}

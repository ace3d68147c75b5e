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

//! The preprocessing adapter: runs a macro engine over module-qualified
//! shader sources.

use crate::config::PreprocessorConfig;
use crate::engine::{CppEngineFactory, EngineFactory, PreprocessorListener, VirtualFileSystem};
use crate::filesystem::ResolverFileSystem;
use penumbra_core::{Diagnostic, ShaderError, ShaderResolver, ShaderResult};
use std::sync::Arc;

/// The default warning policy: every warning aborts the run.
pub fn fail_on_warning(diagnostic: &Diagnostic) -> ShaderResult<()> {
    Err(ShaderError::WarningAsError(diagnostic.clone()))
}

/// The default error policy: every error aborts the run.
pub fn fail_on_error(diagnostic: &Diagnostic) -> ShaderResult<()> {
    Err(ShaderError::Diagnostic(diagnostic.clone()))
}

/// Forwards engine diagnostics to a pair of caller callbacks.
struct CallbackListener<W, E> {
    on_warning: W,
    on_error: E,
}

impl<W, E> PreprocessorListener for CallbackListener<W, E>
where
    W: FnMut(&Diagnostic) -> ShaderResult<()>,
    E: FnMut(&Diagnostic) -> ShaderResult<()>,
{
    fn handle_warning(&mut self, diagnostic: &Diagnostic) -> ShaderResult<()> {
        log::debug!("{diagnostic}");
        (self.on_warning)(diagnostic)
    }

    fn handle_error(&mut self, diagnostic: &Diagnostic) -> ShaderResult<()> {
        log::debug!("{diagnostic}");
        (self.on_error)(diagnostic)
    }
}

/// State belonging to a single run. Nothing here outlives the run.
struct RunContext<W, E> {
    defines: Vec<(String, String)>,
    include_roots: Vec<String>,
    listener: CallbackListener<W, E>,
}

/// Preprocesses shader files addressed as `module/file`.
///
/// A preprocessor is immutable and may be shared between threads; each call
/// creates its own engine and run state.
#[derive(Clone)]
pub struct ShaderPreprocessor {
    config: PreprocessorConfig,
    engines: Arc<dyn EngineFactory>,
}

impl ShaderPreprocessor {
    /// Creates a preprocessor backed by the built-in [`CppEngine`](crate::CppEngine).
    pub fn new(config: PreprocessorConfig) -> Self {
        Self::with_engine(config, Arc::new(CppEngineFactory))
    }

    /// Creates a preprocessor that runs engines produced by `engines`.
    pub fn with_engine(config: PreprocessorConfig, engines: Arc<dyn EngineFactory>) -> Self {
        Self { config, engines }
    }

    /// The configuration this preprocessor was built with.
    pub fn config(&self) -> &PreprocessorConfig {
        &self.config
    }

    /// Preprocesses `file` with every diagnostic treated as fatal.
    ///
    /// # Errors
    /// See [`preprocess_file_with_callbacks`](Self::preprocess_file_with_callbacks);
    /// additionally, the first warning fails the run with
    /// [`ShaderError::WarningAsError`] and the first error with
    /// [`ShaderError::Diagnostic`].
    pub fn preprocess_file<I, K, V>(&self, defines: I, file: &str) -> ShaderResult<Vec<String>>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        self.preprocess_file_with_callbacks(defines, file, fail_on_warning, fail_on_error)
    }

    /// Preprocesses `file`, passing each diagnostic to `on_warning` or
    /// `on_error`.
    ///
    /// A callback returning an error aborts the run with that error; returning
    /// `Ok(())` lets processing continue. The result is the output split into
    /// lines, each terminated by `\n`, with blank lines removed. When the
    /// configuration carries a version, the first line is
    /// `#version <version> core`.
    ///
    /// # Errors
    /// - [`ShaderError::BadPath`] if `file` has no module part. No engine
    ///   work happens in that case.
    /// - [`ShaderError::Io`] if the file, or an include, cannot be read.
    /// - [`ShaderError::InvalidDefine`] if the engine rejects a define.
    pub fn preprocess_file_with_callbacks<I, K, V, W, E>(
        &self,
        defines: I,
        file: &str,
        on_warning: W,
        on_error: E,
    ) -> ShaderResult<Vec<String>>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
        W: FnMut(&Diagnostic) -> ShaderResult<()>,
        E: FnMut(&Diagnostic) -> ShaderResult<()>,
    {
        let context = RunContext {
            defines: defines
                .into_iter()
                .map(|(name, value)| (name.as_ref().to_string(), value.as_ref().to_string()))
                .collect(),
            include_roots: self.config.resolver().available().into_keys().collect(),
            listener: CallbackListener {
                on_warning,
                on_error,
            },
        };
        self.run(context, file)
    }

    fn run<W, E>(&self, context: RunContext<W, E>, file: &str) -> ShaderResult<Vec<String>>
    where
        W: FnMut(&Diagnostic) -> ShaderResult<()>,
        E: FnMut(&Diagnostic) -> ShaderResult<()>,
    {
        let RunContext {
            defines,
            include_roots,
            mut listener,
        } = context;

        let fs = ResolverFileSystem::new(self.config.resolver().as_ref());
        let root = fs.source(&fs.get_file(file))?;
        log::debug!(
            "preprocess: {file} ({} defines, include roots {include_roots:?})",
            defines.len()
        );

        let mut engine = self.engines.create();
        for (name, value) in &defines {
            log::trace!("define: {name}={value}");
            engine.add_macro(name, value)?;
        }
        engine.set_system_include_path(include_roots);
        engine.set_file_system(&fs);
        engine.set_listener(&mut listener);
        engine.add_input(root);

        let mut output = String::new();
        if let Some(version) = self.config.version() {
            output.push_str(&format!("#version {version} core\n"));
        }
        loop {
            let token = engine.token()?;
            if token.is_eof() {
                break;
            }
            output.push_str(token.text());
        }

        Ok(split_lines(&output))
    }
}

/// Splits engine output into `\n`-terminated lines, dropping blank ones.
fn split_lines(output: &str) -> Vec<String> {
    output
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| format!("{line}\n"))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{MacroEngine, Source, Token, TokenKind};
    use penumbra_core::{DiagnosticKind, EmbeddedStore, ModuleRegistry};
    use std::collections::VecDeque;
    use std::sync::Mutex;

    type CallLog = Arc<Mutex<Vec<String>>>;

    /// Echoes its input and records every call made on it.
    struct EchoEngine<'a> {
        log: CallLog,
        listener: Option<&'a mut dyn PreprocessorListener>,
        tokens: VecDeque<Token>,
        warn: bool,
    }

    impl EchoEngine<'_> {
        fn record(&self, call: String) {
            self.log.lock().unwrap().push(call);
        }
    }

    impl<'a> MacroEngine<'a> for EchoEngine<'a> {
        fn add_macro(&mut self, name: &str, value: &str) -> ShaderResult<()> {
            self.record(format!("define {name}={value}"));
            Ok(())
        }

        fn set_system_include_path(&mut self, roots: Vec<String>) {
            self.record(format!("roots {}", roots.join(",")));
        }

        fn set_file_system(&mut self, _fs: &'a dyn VirtualFileSystem) {
            self.record("fs".to_string());
        }

        fn set_listener(&mut self, listener: &'a mut dyn PreprocessorListener) {
            self.record("listener".to_string());
            self.listener = Some(listener);
        }

        fn add_input(&mut self, source: Source) {
            self.record(format!("input {}", source.path()));
            self.warn = source.text().contains("WARN");
            self.tokens
                .push_back(Token::new(TokenKind::Identifier, source.text()));
        }

        fn token(&mut self) -> ShaderResult<Token> {
            if let Some(token) = self.tokens.pop_front() {
                return Ok(token);
            }
            if std::mem::take(&mut self.warn) {
                let diagnostic =
                    Diagnostic::new(DiagnosticKind::Warning, "m/w.h", 1, 0, "echo warning");
                if let Some(listener) = self.listener.as_deref_mut() {
                    listener.handle_warning(&diagnostic)?;
                }
            }
            Ok(Token::eof())
        }
    }

    struct EchoFactory {
        log: CallLog,
    }

    impl EngineFactory for EchoFactory {
        fn create<'a>(&self) -> Box<dyn MacroEngine<'a> + 'a> {
            self.log.lock().unwrap().push("create".to_string());
            Box::new(EchoEngine {
                log: self.log.clone(),
                listener: None,
                tokens: VecDeque::new(),
                warn: false,
            })
        }
    }

    fn preprocessor(version: Option<u32>) -> (ShaderPreprocessor, CallLog) {
        let registry = Arc::new(ModuleRegistry::new());
        let store = EmbeddedStore::new("/", |path: &str| match path {
            "/a.h" => Some(b"x\n\n   \ny\n".as_slice()),
            "/w.h" => Some(b"WARN\n".as_slice()),
            _ => None,
        });
        registry.register("m", Arc::new(store));

        let mut builder = PreprocessorConfig::builder().with_resolver(registry);
        if let Some(version) = version {
            builder = builder.with_version(version);
        }
        let log = CallLog::default();
        let factory = Arc::new(EchoFactory { log: log.clone() });
        (
            ShaderPreprocessor::with_engine(builder.build().unwrap(), factory),
            log,
        )
    }

    #[test]
    fn test_engine_call_order() {
        let (pp, log) = preprocessor(None);
        pp.preprocess_file([("A", "1")], "m/a.h").unwrap();
        assert_eq!(
            *log.lock().unwrap(),
            vec!["create", "define A=1", "roots m", "fs", "listener", "input m/a.h"]
        );
    }

    #[test]
    fn test_bad_path_fails_before_engine_is_created() {
        let (pp, log) = preprocessor(None);
        let err = pp.preprocess_file([("A", "1")], "a.h").unwrap_err();
        assert!(matches!(err, ShaderError::BadPath { .. }));
        assert!(log.lock().unwrap().is_empty());
    }

    #[test]
    fn test_missing_root_fails_before_engine_is_created() {
        let (pp, log) = preprocessor(None);
        let err = pp
            .preprocess_file(Vec::<(String, String)>::new(), "m/missing.h")
            .unwrap_err();
        assert!(err.is_not_found());
        assert!(log.lock().unwrap().is_empty());
    }

    #[test]
    fn test_output_lines_with_version() {
        let (pp, _) = preprocessor(Some(330));
        let lines = pp.preprocess_file([("A", "1")], "m/a.h").unwrap();
        assert_eq!(lines, vec!["#version 330 core\n", "x\n", "y\n"]);
    }

    #[test]
    fn test_default_policy_fails_on_warning() {
        let (pp, _) = preprocessor(None);
        let err = pp
            .preprocess_file(Vec::<(&str, &str)>::new(), "m/w.h")
            .unwrap_err();
        match err {
            ShaderError::WarningAsError(d) => assert_eq!(d.message, "echo warning"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_callbacks_receive_warnings() {
        let (pp, _) = preprocessor(None);
        let mut warnings = Vec::new();
        let lines = pp
            .preprocess_file_with_callbacks(
                Vec::<(&str, &str)>::new(),
                "m/w.h",
                |d: &Diagnostic| {
                    warnings.push(d.clone());
                    Ok(())
                },
                fail_on_error,
            )
            .unwrap();
        assert_eq!(lines, vec!["WARN\n"]);
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].path, "m/w.h");
    }

    #[test]
    fn test_split_lines() {
        assert_eq!(split_lines("a\n\n \t\nb"), vec!["a\n", "b\n"]);
        assert!(split_lines("").is_empty());
    }
}

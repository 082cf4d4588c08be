//! The javac compiler: configuration in, [`CompileOutcome`] out.

use crate::e_command_builder::JavacCommandBuilder;
use crate::e_config::CompilerConfiguration;
use crate::e_error::{CompilerError, Result};
use crate::e_instancepool::{CompilerInstancePool, EntryPointRegistry};
use crate::e_invoker::{InvocationExecutor, InvocationMode, ProcessOptions};
use crate::e_locate::javac_executable;
use crate::e_parser::parse_output;
use crate::e_types::CompileOutcome;
use crate::e_version::{probe_version, JavaVersion, VersionCache, VERSION_PER_EXECUTABLE};
use std::fs;
use std::sync::Arc;

pub const COMPILER_ID: &str = "javac";

pub struct JavacCompiler {
    executor: InvocationExecutor,
    versions: Arc<VersionCache>,
}

impl Default for JavacCompiler {
    /// A compiler without embedded entry points, for forked use. Compiling with
    /// `fork = false` fails with [`CompilerError::Environment`].
    fn default() -> Self {
        let registry = EntryPointRegistry::new(String::new());
        JavacCompiler::new(Arc::new(CompilerInstancePool::new(Arc::new(registry))))
    }
}

impl JavacCompiler {
    pub fn new(pool: Arc<CompilerInstancePool>) -> Self {
        JavacCompiler {
            executor: InvocationExecutor::new(pool),
            versions: Arc::clone(&VERSION_PER_EXECUTABLE),
        }
    }

    /// Replaces the process-wide version cache.
    pub fn with_version_cache(mut self, versions: Arc<VersionCache>) -> Self {
        self.versions = versions;
        self
    }

    pub fn compiler_id(&self) -> &'static str {
        COMPILER_ID
    }

    pub fn executor(&self) -> &InvocationExecutor {
        &self.executor
    }

    pub fn perform_compile(&self, config: &CompilerConfiguration) -> Result<CompileOutcome> {
        fs::create_dir_all(&config.output_location)?;

        let sources = config.collect_source_files();
        if sources.is_empty() {
            log::info!("Nothing to compile - no sources found");
            return Ok(CompileOutcome::empty());
        }
        log_compiling(&sources, config);

        let (version, mode) = self.resolve(config)?;
        if let Some(dir) = &config.generated_sources_directory {
            if JavaVersion::Java1_6.is_older_or_equal_to(&version) {
                fs::create_dir_all(dir)?;
            }
        }

        let args = JavacCommandBuilder::new(version)
            .with_config(config)
            .with_sources(&sources)
            .build();
        let raw = self.executor.invoke(&mode, &args)?;
        let diagnostics = parse_output(raw.exit_code, &raw.text);
        let outcome = CompileOutcome::from_exit_code(raw.exit_code, diagnostics);
        log::debug!("{}", outcome.summary());
        Ok(outcome)
    }

    /// The arguments [`perform_compile`](Self::perform_compile) would pass to javac.
    pub fn create_command_line(&self, config: &CompilerConfiguration) -> Result<Vec<String>> {
        let (version, _) = self.resolve(config)?;
        Ok(JavacCommandBuilder::new(version)
            .with_config(config)
            .with_sources(&config.collect_source_files())
            .build())
    }

    fn resolve(&self, config: &CompilerConfiguration) -> Result<(String, InvocationMode)> {
        if config.fork {
            let executable = javac_executable(config);
            let version = self.versions.get_or_probe(&executable, probe_version)?;
            log::debug!("{} is javac {}", executable, version);
            let options = ProcessOptions::from_config(config, executable);
            Ok((version, InvocationMode::OutOfProcess(options)))
        } else {
            let version = self.executor.pool().runtime_version();
            if version.is_empty() {
                return Err(CompilerError::Environment(
                    "No embedded javac is registered; set fork = true to run an external javac"
                        .to_string(),
                ));
            }
            Ok((version, InvocationMode::InProcess(config.compiler_reuse_strategy)))
        }
    }
}

fn log_compiling(sources: &[String], config: &CompilerConfiguration) {
    log::info!(
        "Compiling {} source file{} with javac [{}] to {}",
        sources.len(),
        if sources.len() == 1 { "" } else { "s" },
        if config.fork { "forked" } else { "in-process" },
        config.output_location.display()
    );
    for source in sources {
        log::trace!("  {}", source);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::e_error::EntryPointError;
    use crate::e_instancepool::{LoadingContext, ReusePolicy, Visibility, JAVAC_ENTRY_POINT};
    use crate::e_types::Severity;
    use std::io::Write;
    use std::path::PathBuf;
    use tempfile::tempdir;

    fn embedded(
        args: &[String],
        sink: &mut dyn Write,
        _ctx: &LoadingContext,
    ) -> std::result::Result<i32, EntryPointError> {
        let source = args.iter().find(|a| a.ends_with(".java")).cloned().unwrap_or_default();
        writeln!(sink, "{}:3: cannot find symbol", source)?;
        writeln!(sink, "    int x = y;")?;
        writeln!(sink, "            ^")?;
        writeln!(sink, "1 error")?;
        Ok(1)
    }

    fn compiler() -> JavacCompiler {
        let mut registry = EntryPointRegistry::new("17");
        registry.register(JAVAC_ENTRY_POINT, Visibility::Everywhere, |_ctx| embedded);
        JavacCompiler::new(Arc::new(CompilerInstancePool::new(Arc::new(registry))))
            .with_version_cache(Arc::new(VersionCache::new()))
    }

    #[test]
    fn test_no_sources_is_an_empty_success() {
        let dir = tempdir().unwrap();
        let cfg = CompilerConfiguration {
            output_location: dir.path().join("classes"),
            source_locations: vec![dir.path().join("missing")],
            ..Default::default()
        };
        let outcome = compiler().perform_compile(&cfg).unwrap();
        assert!(outcome.is_success());
        assert!(outcome.diagnostics().is_empty());
        assert!(dir.path().join("classes").is_dir());
    }

    #[test]
    fn test_in_process_compile_parses_output() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("A.java");
        fs::write(&src, "class A { int x = y; }").unwrap();
        let cfg = CompilerConfiguration {
            output_location: dir.path().join("classes"),
            generated_sources_directory: Some(dir.path().join("generated")),
            source_files: vec![src.clone()],
            compiler_reuse_strategy: ReusePolicy::ReuseSame,
            ..Default::default()
        };
        let javac = compiler();
        let outcome = javac.perform_compile(&cfg).unwrap();
        assert!(!outcome.is_success());
        let diags = outcome.diagnostics();
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].severity, Severity::Error);
        assert_eq!(diags[0].file.as_deref(), Some(&*src.to_string_lossy()));
        assert_eq!(diags[0].start_line, 3);
        assert_eq!(diags[0].start_column, 12);
        assert!(dir.path().join("generated").is_dir());
        assert_eq!(javac.executor().pool().created_count(), 1);
    }

    #[test]
    fn test_in_process_without_embedded_javac_asks_for_fork() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("A.java");
        fs::write(&src, "class A {}").unwrap();
        let cfg = CompilerConfiguration {
            output_location: dir.path().join("classes"),
            source_files: vec![src],
            ..Default::default()
        };
        let err = JavacCompiler::default().perform_compile(&cfg).unwrap_err();
        assert!(err.is_configuration());
        assert!(err.to_string().contains("fork = true"));
    }

    #[test]
    fn test_command_line_in_process() {
        let cfg = CompilerConfiguration {
            output_location: PathBuf::from("out"),
            source_files: vec![PathBuf::from("A.java")],
            ..Default::default()
        };
        let args = compiler().create_command_line(&cfg).unwrap();
        assert!(args.contains(&"A.java".to_string()));
        assert_eq!(args.last().map(String::as_str), Some("-XDuseUnsharedTable=true"));
        assert_eq!(compiler().compiler_id(), "javac");
    }
}

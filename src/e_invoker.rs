//! Running javac, either as a child process or through an in-process entry point.

use crate::e_argfile::{write_debug_script, ArgumentFile};
use crate::e_config::CompilerConfiguration;
use crate::e_error::{CompilerError, Result};
use crate::e_instancepool::{CompilerInstancePool, ReusePolicy};
use crate::e_types::RawOutput;
use std::any::Any;
use std::io::{BufRead, BufReader, Read};
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

/// Settings for a forked compiler.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessOptions {
    pub executable: String,
    pub working_directory: Option<PathBuf>,
    pub build_directory: PathBuf,
    /// `-J` flags, passed on the command line after the argument file.
    pub runtime_flags: Vec<String>,
    /// Keep the argument file in the build directory and write a debug script.
    pub debug: bool,
    pub debug_file_name: Option<String>,
}

impl ProcessOptions {
    pub fn from_config(config: &CompilerConfiguration, executable: impl Into<String>) -> Self {
        ProcessOptions {
            executable: executable.into(),
            working_directory: Some(absolute_or_given(&config.working_directory)),
            build_directory: absolute_or_given(&config.build_directory),
            runtime_flags: crate::e_command_builder::runtime_flags(config),
            debug: log::log_enabled!(log::Level::Debug) || config.debug_script,
            debug_file_name: config.debug_file_name.clone(),
        }
    }
}

fn absolute_or_given(path: &Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvocationMode {
    OutOfProcess(ProcessOptions),
    InProcess(ReusePolicy),
}

/// Runs compiler invocations and returns their raw output.
#[derive(Debug, Clone)]
pub struct InvocationExecutor {
    pool: Arc<CompilerInstancePool>,
}

impl InvocationExecutor {
    pub fn new(pool: Arc<CompilerInstancePool>) -> Self {
        InvocationExecutor { pool }
    }

    pub fn pool(&self) -> &CompilerInstancePool {
        &self.pool
    }

    pub fn invoke(&self, mode: &InvocationMode, args: &[String]) -> Result<RawOutput> {
        match mode {
            InvocationMode::OutOfProcess(options) => invoke_out_of_process(options, args),
            InvocationMode::InProcess(policy) => self.invoke_in_process(*policy, args),
        }
    }

    /// Runs the entry point on the calling thread with output captured in memory.
    /// The handle goes back to the pool even when the entry point fails or panics.
    pub fn invoke_in_process(&self, policy: ReusePolicy, args: &[String]) -> Result<RawOutput> {
        let handle = self.pool.checkout(policy)?;
        log::debug!(
            "compiling in-process with handle #{} ({:?})",
            handle.id(),
            policy
        );

        let mut sink: Vec<u8> = Vec::new();
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| handle.compile(args, &mut sink)));
        drop(handle);

        let exit_code = match outcome {
            Ok(Ok(code)) => code,
            Ok(Err(source)) => {
                return Err(CompilerError::Invocation {
                    message: source.to_string(),
                    source: Some(source),
                })
            }
            Err(payload) => {
                return Err(CompilerError::Invocation {
                    message: format!("entry point panicked: {}", panic_message(payload.as_ref())),
                    source: None,
                })
            }
        };

        Ok(RawOutput {
            exit_code,
            text: String::from_utf8_lossy(&sink).into_owned(),
        })
    }
}

/// Forks the compiler with all arguments in an `@file`, followed by the
/// runtime flags, and captures stdout and stderr together.
pub fn invoke_out_of_process(options: &ProcessOptions, args: &[String]) -> Result<RawOutput> {
    let keep_in = options.debug.then_some(options.build_directory.as_path());
    let argfile = ArgumentFile::create(args, keep_in)?;

    let mut argv = vec![argfile.at_argument()];
    argv.extend(options.runtime_flags.iter().cloned());

    if options.debug {
        write_debug_script(
            &options.build_directory,
            options.debug_file_name.as_deref(),
            &options.executable,
            &argv,
        );
    }

    let output = run_captured(
        &options.executable,
        &argv,
        options.working_directory.as_deref(),
    );
    drop(argfile);
    output
}

/// Spawns `executable` and collects stdout and stderr into one text, in the
/// order lines arrive. A process killed by a signal reports exit code -1.
pub fn run_captured(
    executable: &str,
    args: &[String],
    working_directory: Option<&Path>,
) -> Result<RawOutput> {
    let mut cmd = Command::new(executable);
    cmd.args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    if let Some(dir) = working_directory {
        cmd.current_dir(dir);
    }
    log::debug!("running {} {}", executable, args.join(" "));

    let mut child = cmd.spawn().map_err(|source| CompilerError::Spawn {
        executable: executable.to_string(),
        source,
    })?;

    let captured = Arc::new(Mutex::new(String::new()));
    let mut readers = Vec::with_capacity(2);
    if let Some(stdout) = child.stdout.take() {
        readers.push(pump(stdout, Arc::clone(&captured)));
    }
    if let Some(stderr) = child.stderr.take() {
        readers.push(pump(stderr, Arc::clone(&captured)));
    }

    let status = child.wait().map_err(|source| CompilerError::Wait {
        executable: executable.to_string(),
        source,
    })?;
    for reader in readers {
        if reader.join().is_err() {
            log::warn!("output reader for {} panicked", executable);
        }
    }

    let exit_code = status.code().unwrap_or_else(|| {
        log::warn!("{} was terminated by a signal", executable);
        -1
    });
    let text = captured
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
        .clone();
    log::trace!("{} exited with {}:\n{}", executable, exit_code, text);
    Ok(RawOutput { exit_code, text })
}

fn pump<R: Read + Send + 'static>(stream: R, captured: Arc<Mutex<String>>) -> JoinHandle<()> {
    thread::spawn(move || {
        let reader = BufReader::new(stream);
        for line in reader.split(b'\n') {
            let Ok(bytes) = line else { break };
            let text = String::from_utf8_lossy(&bytes);
            let mut buf = captured.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            buf.push_str(&text);
            buf.push('\n');
        }
    })
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::e_error::EntryPointError;
    use crate::e_instancepool::{EntryPointRegistry, LoadingContext, Visibility, JAVAC_ENTRY_POINT};
    use std::io::Write;

    fn executor_with<F>(entry: F) -> InvocationExecutor
    where
        F: Fn(&[String], &mut dyn Write, &LoadingContext) -> std::result::Result<i32, EntryPointError>
            + Send
            + Sync
            + Clone
            + 'static,
    {
        let mut registry = EntryPointRegistry::new("17");
        registry.register(JAVAC_ENTRY_POINT, Visibility::Everywhere, move |_ctx| entry.clone());
        InvocationExecutor::new(Arc::new(CompilerInstancePool::new(Arc::new(registry))))
    }

    #[test]
    fn test_in_process_captures_sink() {
        let executor = executor_with(|args: &[String], sink: &mut dyn Write, _: &LoadingContext| {
            writeln!(sink, "warning: {} args", args.len())?;
            Ok(0)
        });
        let out = executor
            .invoke(
                &InvocationMode::InProcess(ReusePolicy::ReuseCreated),
                &["-g".to_string(), "A.java".to_string()],
            )
            .unwrap();
        assert_eq!(out.exit_code, 0);
        assert_eq!(out.text, "warning: 2 args\n");
        assert_eq!(executor.pool().idle_count(), 1);
    }

    #[test]
    fn test_in_process_panic_is_an_invocation_error() {
        let executor = executor_with(|_: &[String], _: &mut dyn Write, _: &LoadingContext| {
            panic!("boom")
        });
        let err = executor
            .invoke_in_process(ReusePolicy::ReuseCreated, &[])
            .unwrap_err();
        match err {
            CompilerError::Invocation { message, .. } => assert!(message.contains("boom")),
            other => panic!("unexpected {other:?}"),
        }
        // the handle still goes back to the free list
        assert_eq!(executor.pool().idle_count(), 1);
    }

    #[test]
    fn test_in_process_error_keeps_source() {
        let executor = executor_with(|_: &[String], _: &mut dyn Write, _: &LoadingContext| {
            Err("class file has wrong version".into())
        });
        let err = executor.invoke_in_process(ReusePolicy::AlwaysNew, &[]).unwrap_err();
        assert!(matches!(err, CompilerError::Invocation { source: Some(_), .. }));
        assert_eq!(executor.pool().idle_count(), 0);
    }

    #[test]
    fn test_missing_executable_is_a_spawn_error() {
        let err = run_captured("/definitely/not/javac", &[], None).unwrap_err();
        assert!(matches!(err, CompilerError::Spawn { .. }));
    }

    #[test]
    fn test_panic_message_variants() {
        assert_eq!(panic_message(&"static"), "static");
        assert_eq!(panic_message(&String::from("owned")), "owned");
        assert_eq!(panic_message(&42u8), "unknown panic");
    }
}

//! Error type shared by every fallible operation in the crate.
//!
//! Parse problems are not represented here: the diagnostic parser never fails,
//! it degrades malformed blocks into unlocated diagnostics instead.

use std::io;
use std::path::PathBuf;

/// Errors returned by an entry point embedded in-process.
pub type EntryPointError = Box<dyn std::error::Error + Send + Sync + 'static>;

pub type Result<T> = std::result::Result<T, CompilerError>;

#[derive(Debug, thiserror::Error)]
pub enum CompilerError {
    #[error("tools.jar not found: {}", path.display())]
    ToolsArchiveNotFound { path: PathBuf },

    #[error(
        "Unable to locate the compiler entry point `{symbol}` in:\n  {}\n\
         Please ensure you are using a JDK and not a JRE. In most cases you can change\n\
         the location of your Java installation by setting the JAVA_HOME environment variable.",
        location.display()
    )]
    EntryPointNotFound { symbol: String, location: PathBuf },

    #[error("could not build a loading context for {}: {reason}", path.display())]
    LoadingContext { path: PathBuf, reason: String },

    #[error("{0}")]
    Environment(String),

    #[error("invalid configuration in {}: {message}", path.display())]
    Config { path: PathBuf, message: String },

    #[error("Error while executing the external compiler {executable}")]
    Spawn {
        executable: String,
        #[source]
        source: io::Error,
    },

    #[error("Error while waiting for the external compiler {executable}")]
    Wait {
        executable: String,
        #[source]
        source: io::Error,
    },

    #[error("Error creating file with javac arguments")]
    ArgumentFile(#[source] io::Error),

    #[error("Error while executing the compiler: {message}")]
    Invocation {
        message: String,
        #[source]
        source: Option<EntryPointError>,
    },

    #[error("Could not retrieve version from {executable}. Exit code {exit_code}, Output: {output}")]
    VersionProbe {
        executable: String,
        exit_code: i32,
        output: String,
    },

    #[error("Could not extract version from \"{0}\"")]
    VersionNotFound(String),

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl CompilerError {
    /// True for failures caused by the environment or configuration rather than
    /// by running the compiler itself.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            CompilerError::ToolsArchiveNotFound { .. }
                | CompilerError::EntryPointNotFound { .. }
                | CompilerError::LoadingContext { .. }
                | CompilerError::Environment(_)
                | CompilerError::Config { .. }
                | CompilerError::VersionProbe { .. }
                | CompilerError::VersionNotFound(_)
        )
    }
}

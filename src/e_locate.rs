use crate::e_config::CompilerConfiguration;
use crate::e_error::{CompilerError, Result};
use std::env;
use std::path::{Path, PathBuf};
use which::which;

#[cfg(windows)]
const JAVAC_COMMAND: &str = "javac.exe";
#[cfg(not(windows))]
const JAVAC_COMMAND: &str = "javac";

/// The installation pointed to by `JAVA_HOME`, if it is set.
pub fn runtime_home() -> Option<PathBuf> {
    env::var_os("JAVA_HOME")
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
}

/// Where older JDKs keep the compiler classes relative to the runtime directory.
pub fn tools_archive(runtime_home: &Path) -> PathBuf {
    runtime_home.join("..").join("lib").join("tools.jar")
}

/// Resolves the executable to fork: the configured one, then the JDK found
/// through `java_home`/`JAVA_HOME`, then `javac` on the `PATH`.
pub fn javac_executable(config: &CompilerConfiguration) -> String {
    if let Some(executable) = config.executable.as_deref().filter(|e| !e.trim().is_empty()) {
        return executable.to_string();
    }

    let home = config.java_home.clone().or_else(runtime_home);
    match home.as_deref().map(javac_in_home) {
        Some(Ok(path)) => return path.to_string_lossy().into_owned(),
        Some(Err(e)) => log::debug!("{}", e),
        None => log::debug!("no java home configured and JAVA_HOME is not set"),
    }

    match which(JAVAC_COMMAND) {
        Ok(path) => path.to_string_lossy().into_owned(),
        Err(_) => {
            log::warn!("Unable to autodetect 'javac' path, using 'javac' from the environment.");
            "javac".to_string()
        }
    }
}

/// `<home>/bin/javac`, or `<home>/../sh/javac` on AIX.
pub fn javac_in_home(home: &Path) -> Result<PathBuf> {
    if !home.is_dir() {
        return Err(CompilerError::Environment(format!(
            "The java home {} doesn't exist or is not a valid directory.",
            home.display()
        )));
    }

    let candidate = if cfg!(target_os = "aix") {
        home.join("..").join("sh").join(JAVAC_COMMAND)
    } else {
        home.join("bin").join(JAVAC_COMMAND)
    };

    if candidate.is_file() {
        Ok(candidate)
    } else {
        Err(CompilerError::Environment(format!(
            "The javac executable '{}' doesn't exist or is not a file. Verify the JAVA_HOME environment variable.",
            candidate.display()
        )))
    }
}

use crate::e_error::{CompilerError, Result};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf, MAIN_SEPARATOR};
use tempfile::{Builder, NamedTempFile};

const ARGFILE_PREFIX: &str = "e_javac";
const ARGFILE_SUFFIX: &str = "arguments";

/// A javac `@file` holding one quoted argument per line.
///
/// Temporary files are removed on drop. Files created in a keep directory
/// (debug runs) stay on disk next to the debug script.
#[derive(Debug)]
pub enum ArgumentFile {
    Temporary(NamedTempFile),
    Kept(PathBuf),
}

impl ArgumentFile {
    pub fn create(args: &[String], keep_in: Option<&Path>) -> Result<Self> {
        let mut builder = Builder::new();
        builder.prefix(ARGFILE_PREFIX).suffix(ARGFILE_SUFFIX);

        let mut file = match keep_in {
            Some(dir) => {
                fs::create_dir_all(dir).map_err(CompilerError::ArgumentFile)?;
                builder.tempfile_in(dir)
            }
            None => builder.tempfile(),
        }
        .map_err(CompilerError::ArgumentFile)?;

        file.write_all(render_arguments(args).as_bytes())
            .and_then(|_| file.flush())
            .map_err(CompilerError::ArgumentFile)?;

        if keep_in.is_some() {
            let (_, path) = file
                .keep()
                .map_err(|e| CompilerError::ArgumentFile(e.error))?;
            log::debug!("keeping argument file {}", path.display());
            Ok(ArgumentFile::Kept(path))
        } else {
            Ok(ArgumentFile::Temporary(file))
        }
    }

    pub fn path(&self) -> &Path {
        match self {
            ArgumentFile::Temporary(file) => file.path(),
            ArgumentFile::Kept(path) => path,
        }
    }

    /// `@<canonical path>` with forward slashes, ready for the command line.
    pub fn at_argument(&self) -> String {
        let path = fs::canonicalize(self.path()).unwrap_or_else(|_| self.path().to_path_buf());
        format!("@{}", forward_slashes(&path.to_string_lossy()))
    }
}

/// File contents: every argument double-quoted on its own line.
pub fn render_arguments(args: &[String]) -> String {
    let mut out = String::new();
    for arg in args {
        out.push('"');
        out.push_str(&forward_slashes(arg));
        out.push('"');
        out.push('\n');
    }
    out
}

fn forward_slashes(value: &str) -> String {
    if MAIN_SEPARATOR == '/' {
        value.to_string()
    } else {
        value.replace(MAIN_SEPARATOR, "/")
    }
}

/// Writes `<build_dir>/<name>.sh` (`.bat` on Windows) with the command line
/// that reproduces the invocation. Failures are logged and otherwise ignored.
pub fn write_debug_script(
    build_dir: &Path,
    name: Option<&str>,
    executable: &str,
    argv: &[String],
) -> Option<PathBuf> {
    let name = name.map(str::trim).filter(|n| !n.is_empty()).unwrap_or("javac");
    let extension = if cfg!(windows) { "bat" } else { "sh" };
    let script = build_dir.join(format!("{}.{}", name, extension));

    let mut line = String::from(executable);
    for arg in argv {
        line.push(' ');
        if arg.chars().any(char::is_whitespace) {
            line.push('"');
            line.push_str(arg);
            line.push('"');
        } else {
            line.push_str(arg);
        }
    }
    let line = line.replace('\'', "");

    let written = fs::create_dir_all(build_dir)
        .and_then(|_| fs::write(&script, line))
        .and_then(|_| make_executable(&script));
    match written {
        Ok(()) => {
            log::debug!("wrote debug script {}", script.display());
            Some(script)
        }
        Err(e) => {
            log::warn!(
                "Unable to write '{}' debug script file: {}",
                script.file_name().map(|n| n.to_string_lossy()).unwrap_or_default(),
                e
            );
            None
        }
    }
}

#[cfg(unix)]
fn make_executable(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    let mut perms = fs::metadata(path)?.permissions();
    perms.set_mode(perms.mode() | 0o111);
    fs::set_permissions(path, perms)
}

#[cfg(not(unix))]
fn make_executable(_path: &Path) -> std::io::Result<()> {
    Ok(())
}

#![allow(dead_code)]
use std::fs;
use std::io::Result as IoResult;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use tempfile::{tempdir, TempDir};

/// Serializes writing and running fake compiler scripts. A script written
/// while another thread forks can fail with "Text file busy".
static SCRIPT_LOCK: Mutex<()> = Mutex::new(());

pub fn script_lock() -> MutexGuard<'static, ()> {
    SCRIPT_LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// A wrapper around a temporary Java project directory.
pub struct TestProject {
    /// The temporary directory. When this is dropped, the directory and its contents are removed.
    pub temp_dir: TempDir,
    /// The root directory for the generated project.
    pub root: PathBuf,
}

impl TestProject {
    pub fn new(project_name: &str) -> IoResult<Self> {
        let temp_dir = tempdir()?;
        let root = temp_dir.path().join(project_name);
        fs::create_dir_all(&root)?;
        Ok(TestProject { temp_dir, root })
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    /// Writes `src/main/java/<relative>` and returns its path.
    pub fn add_source(&self, relative: &str, content: &str) -> IoResult<PathBuf> {
        let path = self.root.join("src/main/java").join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, content)?;
        Ok(path)
    }

    pub fn read(&self, relative: &str) -> String {
        fs::read_to_string(self.root.join(relative)).unwrap_or_default()
    }
}

/// A shell script standing in for javac. It answers `-version` with
/// `javac <version>` on stderr, records each compile invocation in
/// `invocations.txt`, copies the `@file` it was given to `argfile.txt`, then
/// prints `stdout.txt` and `stderr.txt` and exits with the configured code.
#[cfg(unix)]
pub struct FakeJavac {
    pub dir: PathBuf,
    pub executable: PathBuf,
}

#[cfg(unix)]
impl FakeJavac {
    pub fn create(dir: &Path, version: &str, exit_code: i32) -> IoResult<Self> {
        Self::with_version_exit(dir, version, 0, exit_code)
    }

    pub fn with_version_exit(
        dir: &Path,
        version: &str,
        version_exit: i32,
        exit_code: i32,
    ) -> IoResult<Self> {
        use std::os::unix::fs::PermissionsExt;

        let dir = dir.join("fake-jdk");
        fs::create_dir_all(&dir)?;
        let executable = dir.join("javac");
        let script = format!(
            r#"#!/bin/sh
dir=$(dirname "$0")
if [ "$1" = "-version" ]; then
  echo probe >> "$dir/probes.txt"
  echo "javac {version}" >&2
  exit {version_exit}
fi
echo "$@" >> "$dir/invocations.txt"
pwd > "$dir/cwd.txt"
case "$1" in
  @*) cat "${{1#@}}" > "$dir/argfile.txt" ;;
esac
[ -f "$dir/stdout.txt" ] && cat "$dir/stdout.txt"
[ -f "$dir/stderr.txt" ] && cat "$dir/stderr.txt" >&2
exit {exit_code}
"#
        );
        fs::write(&executable, script)?;
        let mut perms = fs::metadata(&executable)?.permissions();
        perms.set_mode(0o755);
        fs::set_permissions(&executable, perms)?;
        Ok(FakeJavac { dir, executable })
    }

    pub fn executable_str(&self) -> String {
        self.executable.to_string_lossy().into_owned()
    }

    pub fn set_stderr(&self, text: &str) -> IoResult<()> {
        fs::write(self.dir.join("stderr.txt"), text)
    }

    pub fn set_stdout(&self, text: &str) -> IoResult<()> {
        fs::write(self.dir.join("stdout.txt"), text)
    }

    pub fn read(&self, name: &str) -> String {
        fs::read_to_string(self.dir.join(name)).unwrap_or_default()
    }

    pub fn probe_count(&self) -> usize {
        self.read("probes.txt").lines().count()
    }

    pub fn invocations(&self) -> Vec<String> {
        self.read("invocations.txt")
            .lines()
            .map(str::to_string)
            .collect()
    }
}

use crate::e_error::{CompilerError, Result};
use crate::e_invoker::run_captured;
use dashmap::DashMap;
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

static JAVA_MAJOR_AND_MINOR_VERSION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\d+(\.\d+)?").expect("valid version regex"));

/// javac version per executable, for the lifetime of the process.
pub static VERSION_PER_EXECUTABLE: Lazy<Arc<VersionCache>> = Lazy::new(|| Arc::new(VersionCache::new()));

/// First `major[.minor]` found in `text`, e.g. `"javac 1.8.0_292"` gives `"1.8"`.
pub fn extract_major_and_minor_version(text: &str) -> Result<String> {
    JAVA_MAJOR_AND_MINOR_VERSION
        .find(text)
        .map(|m| m.as_str().to_string())
        .ok_or_else(|| CompilerError::VersionNotFound(text.to_string()))
}

/// Runs `<executable> -version` and extracts the version from its output.
///
/// `-version` is accepted by every javac from 1.6 through 21. An executable that
/// cannot be started is an environment problem, not a compiler failure.
pub fn probe_version(executable: &str) -> Result<String> {
    let output = run_captured(executable, &["-version".to_string()], None).map_err(|err| {
        match err {
            CompilerError::Spawn { executable, source } => {
                CompilerError::Environment(format!("Unable to run {} -version: {}", executable, source))
            }
            other => other,
        }
    })?;
    if output.exit_code != 0 {
        return Err(CompilerError::VersionProbe {
            executable: executable.to_string(),
            exit_code: output.exit_code,
            output: output.text,
        });
    }
    extract_major_and_minor_version(&output.text)
}

/// Cached [`probe_version`] through [`VERSION_PER_EXECUTABLE`].
pub fn out_of_process_version(executable: &str) -> Result<String> {
    VERSION_PER_EXECUTABLE.get_or_probe(executable, probe_version)
}

/// Version strings keyed by executable path. Entries are never invalidated.
#[derive(Debug, Default)]
pub struct VersionCache {
    versions: DashMap<String, String>,
    probes: AtomicUsize,
}

impl VersionCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, executable: &str) -> Option<String> {
        self.versions.get(executable).map(|v| v.value().clone())
    }

    /// Returns the cached version or runs `probe` once to fill it. Concurrent
    /// first callers for the same executable wait for a single probe.
    pub fn get_or_probe<F>(&self, executable: &str, probe: F) -> Result<String>
    where
        F: FnOnce(&str) -> Result<String>,
    {
        if let Some(version) = self.get(executable) {
            return Ok(version);
        }
        let entry = self
            .versions
            .entry(executable.to_string())
            .or_try_insert_with(|| {
                self.probes.fetch_add(1, Ordering::SeqCst);
                log::debug!("probing javac version of {}", executable);
                probe(executable)
            })?;
        Ok(entry.value().clone())
    }

    /// How many probes actually ran.
    pub fn probe_count(&self) -> usize {
        self.probes.load(Ordering::SeqCst)
    }
}

/// Java releases, oldest first, identified by their version prefixes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum JavaVersion {
    Java1_3OrOlder,
    Java1_4,
    Java1_5,
    Java1_6,
    Java1_7,
    Java1_8,
    /// The JEP 223 numbering scheme starts here.
    Java9,
}

impl JavaVersion {
    const ALL: [JavaVersion; 7] = [
        JavaVersion::Java1_3OrOlder,
        JavaVersion::Java1_4,
        JavaVersion::Java1_5,
        JavaVersion::Java1_6,
        JavaVersion::Java1_7,
        JavaVersion::Java1_8,
        JavaVersion::Java9,
    ];

    fn prefixes(&self) -> &'static [&'static str] {
        match self {
            JavaVersion::Java1_3OrOlder => &["1.3", "1.2", "1.1", "1.0"],
            JavaVersion::Java1_4 => &["1.4"],
            JavaVersion::Java1_5 => &["1.5"],
            JavaVersion::Java1_6 => &["1.6"],
            JavaVersion::Java1_7 => &["1.7"],
            JavaVersion::Java1_8 => &["1.8"],
            JavaVersion::Java9 => &["9"],
        }
    }

    /// True unless `version` starts with the prefix of a release older than `self`.
    pub fn is_older_or_equal_to(&self, version: &str) -> bool {
        !Self::ALL
            .iter()
            .take_while(|older| *older < self)
            .any(|older| older.prefixes().iter().any(|p| version.starts_with(p)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_version() {
        assert_eq!(extract_major_and_minor_version("javac 1.8.0_292").unwrap(), "1.8");
        assert_eq!(extract_major_and_minor_version("javac 17.0.2").unwrap(), "17.0");
        assert_eq!(extract_major_and_minor_version("javac 21").unwrap(), "21");
        assert!(matches!(
            extract_major_and_minor_version("javac"),
            Err(CompilerError::VersionNotFound(_))
        ));
    }

    #[test]
    fn test_older_or_equal() {
        assert!(JavaVersion::Java1_6.is_older_or_equal_to("1.8"));
        assert!(JavaVersion::Java1_8.is_older_or_equal_to("1.8"));
        assert!(!JavaVersion::Java1_8.is_older_or_equal_to("1.7"));
        assert!(JavaVersion::Java9.is_older_or_equal_to("17.0"));
        assert!(!JavaVersion::Java9.is_older_or_equal_to("1.8"));
        assert!(!JavaVersion::Java1_4.is_older_or_equal_to("1.3"));
        assert!(JavaVersion::Java1_3OrOlder.is_older_or_equal_to("1.1"));
    }

    #[test]
    fn test_unstartable_executable_is_an_environment_error() {
        let err = probe_version("/definitely/not/javac").unwrap_err();
        assert!(matches!(err, CompilerError::Environment(_)));
        assert!(err.is_configuration());
        assert!(err.to_string().contains("/definitely/not/javac"));
    }

    #[test]
    fn test_cache_probes_once() {
        let cache = VersionCache::new();
        let first = cache.get_or_probe("/jdk/bin/javac", |_| Ok("17".to_string()));
        let second = cache.get_or_probe("/jdk/bin/javac", |_| Ok("99".to_string()));
        assert_eq!(first.unwrap(), "17");
        assert_eq!(second.unwrap(), "17");
        assert_eq!(cache.probe_count(), 1);
    }

    #[test]
    fn test_failed_probe_is_not_cached() {
        let cache = VersionCache::new();
        let err = cache.get_or_probe("javac", |_| {
            Err(CompilerError::VersionNotFound("garbage".to_string()))
        });
        assert!(err.is_err());
        assert_eq!(cache.get("javac"), None);
        assert_eq!(cache.get_or_probe("javac", |_| Ok("11".to_string())).unwrap(), "11");
        assert_eq!(cache.probe_count(), 2);
    }
}

use crate::e_error::{CompilerError, Result};
use crate::e_instancepool::ReusePolicy;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// One free-form compiler argument. Keys starting with `-J` are runtime flags
/// and are passed outside the argument file.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CustomArgument {
    pub key: String,
    #[serde(default)]
    pub value: Option<String>,
}

impl CustomArgument {
    pub fn new(key: impl Into<String>, value: Option<&str>) -> Self {
        CustomArgument {
            key: key.into(),
            value: value.map(str::to_string),
        }
    }

    pub fn is_runtime_flag(&self) -> bool {
        self.key.starts_with("-J")
    }
}

/// Everything needed to compile one set of sources.
///
/// Usually read from a TOML file; every key is optional and unknown keys are
/// rejected.
///
/// ```toml
/// output_location = "target/classes"
/// source_locations = ["src/main/java"]
/// classpath_entries = ["lib/a.jar"]
/// release_version = "17"
/// fork = true
///
/// [[custom_compiler_arguments]]
/// key = "-Xmaxerrs"
/// value = "10"
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CompilerConfiguration {
    pub output_location: PathBuf,
    pub classpath_entries: Vec<String>,
    pub modulepath_entries: Vec<String>,
    pub source_locations: Vec<PathBuf>,
    /// Explicit sources; when empty, `*.java` files under `source_locations` are used.
    pub source_files: Vec<PathBuf>,
    pub generated_sources_directory: Option<PathBuf>,

    pub proc: Option<String>,
    pub annotation_processors: Option<Vec<String>>,
    pub processor_path_entries: Vec<String>,
    pub processor_module_path_entries: Vec<String>,

    pub optimize: bool,
    pub debug: bool,
    pub debug_level: Option<String>,
    pub verbose: bool,
    pub parameters: bool,
    pub enable_preview: bool,
    pub implicit_option: Option<String>,
    pub show_deprecation: bool,
    pub show_warnings: bool,
    pub show_lint: bool,
    pub warnings: Option<String>,
    pub fail_on_warning: bool,

    pub release_version: Option<String>,
    pub target_version: Option<String>,
    pub source_version: Option<String>,
    pub source_encoding: Option<String>,
    pub module_version: Option<String>,
    pub custom_compiler_arguments: Vec<CustomArgument>,

    pub fork: bool,
    pub executable: Option<String>,
    pub java_home: Option<PathBuf>,
    pub working_directory: PathBuf,
    pub build_directory: PathBuf,
    pub maxmem: Option<String>,
    pub meminitial: Option<String>,
    pub debug_file_name: Option<String>,
    /// Persist the equivalent shell script and keep the argument file.
    pub debug_script: bool,
    pub compiler_reuse_strategy: ReusePolicy,
}

impl Default for CompilerConfiguration {
    fn default() -> Self {
        CompilerConfiguration {
            output_location: PathBuf::from("target/classes"),
            classpath_entries: Vec::new(),
            modulepath_entries: Vec::new(),
            source_locations: Vec::new(),
            source_files: Vec::new(),
            generated_sources_directory: None,
            proc: None,
            annotation_processors: None,
            processor_path_entries: Vec::new(),
            processor_module_path_entries: Vec::new(),
            optimize: false,
            debug: false,
            debug_level: None,
            verbose: false,
            parameters: false,
            enable_preview: false,
            implicit_option: None,
            show_deprecation: false,
            show_warnings: true,
            show_lint: false,
            warnings: None,
            fail_on_warning: false,
            release_version: None,
            target_version: None,
            source_version: None,
            source_encoding: None,
            module_version: None,
            custom_compiler_arguments: Vec::new(),
            fork: false,
            executable: None,
            java_home: None,
            working_directory: PathBuf::from("."),
            build_directory: PathBuf::from("target"),
            maxmem: None,
            meminitial: None,
            debug_file_name: None,
            debug_script: false,
            compiler_reuse_strategy: ReusePolicy::default(),
        }
    }
}

impl CompilerConfiguration {
    pub fn from_toml_str(text: &str, origin: &Path) -> Result<Self> {
        toml::from_str(text).map_err(|e| CompilerError::Config {
            path: origin.to_path_buf(),
            message: e.to_string(),
        })
    }

    pub fn from_toml_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|e| CompilerError::Config {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        Self::from_toml_str(&text, path)
    }

    pub fn add_custom_argument(&mut self, key: impl Into<String>, value: Option<&str>) {
        self.custom_compiler_arguments
            .push(CustomArgument::new(key, value));
    }

    /// Sources to hand to the compiler, as strings in a stable order.
    pub fn collect_source_files(&self) -> Vec<String> {
        if !self.source_files.is_empty() {
            return self
                .source_files
                .iter()
                .map(|p| p.to_string_lossy().into_owned())
                .collect();
        }

        let mut found: Vec<PathBuf> = Vec::new();
        for location in &self.source_locations {
            if !location.is_dir() {
                log::debug!("skipping missing source location {}", location.display());
                continue;
            }
            for entry in WalkDir::new(location)
                .follow_links(true)
                .into_iter()
                .filter_map(|e| e.ok())
            {
                let path = entry.path();
                if entry.file_type().is_file()
                    && path.extension().map(|ext| ext == "java").unwrap_or(false)
                {
                    found.push(path.to_path_buf());
                }
            }
        }
        found.sort();
        found.dedup();
        found
            .into_iter()
            .map(|p| p.to_string_lossy().into_owned())
            .collect()
    }
}

/// `Some` only for non-blank strings.
pub(crate) fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.trim().is_empty())
}

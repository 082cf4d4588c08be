use crate::e_config::{non_empty, CompilerConfiguration};
use crate::e_version::JavaVersion;
use std::env;
use std::path::Path;

/// Turns a [`CompilerConfiguration`] into javac's argument vector for a given
/// compiler version. Options unknown to older compilers are left out.
#[derive(Debug, Clone)]
pub struct JavacCommandBuilder<'a> {
    version: String,
    config: Option<&'a CompilerConfiguration>,
    sources: Vec<String>,
}

impl<'a> JavacCommandBuilder<'a> {
    pub fn new(version: impl Into<String>) -> Self {
        JavacCommandBuilder {
            version: version.into(),
            config: None,
            sources: Vec::new(),
        }
    }

    pub fn with_config(mut self, config: &'a CompilerConfiguration) -> Self {
        self.config = Some(config);
        self
    }

    pub fn with_sources(mut self, sources: &[String]) -> Self {
        self.sources.extend(sources.iter().cloned());
        self
    }

    pub fn build(self) -> Vec<String> {
        let fallback;
        let cfg = match self.config {
            Some(cfg) => cfg,
            None => {
                fallback = CompilerConfiguration::default();
                &fallback
            }
        };
        let version = self.version.as_str();
        let mut args: Vec<String> = Vec::new();

        args.push("-d".into());
        args.push(absolute_string(&cfg.output_location));

        if !cfg.classpath_entries.is_empty() {
            args.push("-classpath".into());
            args.push(path_string(&cfg.classpath_entries));
        }
        if !cfg.modulepath_entries.is_empty() {
            args.push("--module-path".into());
            args.push(path_string(&cfg.modulepath_entries));
        }
        // Passed even with explicit sources so annotation processors can see it.
        if !cfg.source_locations.is_empty() {
            args.push("-sourcepath".into());
            args.push(path_string(&cfg.source_locations));
        }
        args.extend(self.sources);

        if JavaVersion::Java1_6.is_older_or_equal_to(version) {
            if let Some(dir) = &cfg.generated_sources_directory {
                args.push("-s".into());
                args.push(absolute_string(dir));
            }
            if let Some(proc) = &cfg.proc {
                args.push(format!("-proc:{}", proc));
            }
            if let Some(processors) = &cfg.annotation_processors {
                args.push("-processor".into());
                args.push(processors.join(","));
            }
            if !cfg.processor_path_entries.is_empty() {
                args.push("-processorpath".into());
                args.push(path_string(&cfg.processor_path_entries));
            }
            if !cfg.processor_module_path_entries.is_empty() {
                args.push("--processor-module-path".into());
                args.push(path_string(&cfg.processor_module_path_entries));
            }
        }

        if cfg.optimize {
            args.push("-O".into());
        }
        if cfg.debug {
            match non_empty(&cfg.debug_level) {
                Some(level) => args.push(format!("-g:{}", level)),
                None => args.push("-g".into()),
            }
        }
        if cfg.verbose {
            args.push("-verbose".into());
        }
        if cfg.parameters && JavaVersion::Java1_8.is_older_or_equal_to(version) {
            args.push("-parameters".into());
        }
        if cfg.enable_preview {
            args.push("--enable-preview".into());
        }
        if let Some(implicit) = &cfg.implicit_option {
            args.push(format!("-implicit:{}", implicit));
        }

        // deprecation messages are warnings and need them switched on
        let show_warnings = cfg.show_warnings || cfg.show_deprecation;
        if cfg.show_deprecation {
            args.push("-deprecation".into());
        }
        if !show_warnings {
            args.push("-nowarn".into());
        } else if cfg.show_lint {
            match non_empty(&cfg.warnings) {
                Some(warnings) => args.push(format!("-Xlint:{}", warnings)),
                None => args.push("-Xlint".into()),
            }
        }
        if cfg.fail_on_warning {
            args.push("-Werror".into());
        }

        let release = non_empty(&cfg.release_version);
        match release {
            Some(release) if JavaVersion::Java9.is_older_or_equal_to(version) => {
                args.push("--release".into());
                args.push(release.to_string());
            }
            _ => {
                args.push("-target".into());
                args.push(non_empty(&cfg.target_version).unwrap_or("1.1").to_string());
                if JavaVersion::Java1_4.is_older_or_equal_to(version) {
                    args.push("-source".into());
                    args.push(non_empty(&cfg.source_version).unwrap_or("1.3").to_string());
                }
            }
        }

        if let Some(encoding) = non_empty(&cfg.source_encoding) {
            if JavaVersion::Java1_4.is_older_or_equal_to(version) {
                args.push("-encoding".into());
                args.push(encoding.to_string());
            }
        }
        if let Some(module_version) = non_empty(&cfg.module_version) {
            args.push("--module-version".into());
            args.push(module_version.to_string());
        }

        for custom in &cfg.custom_compiler_arguments {
            if custom.key.is_empty() || custom.is_runtime_flag() {
                continue;
            }
            args.push(custom.key.clone());
            if let Some(value) = non_empty(&custom.value) {
                args.push(value.to_string());
            }
        }

        if !cfg.fork && !args.iter().any(|a| a == "-XDuseUnsharedTable=false") {
            args.push("-XDuseUnsharedTable=true".into());
        }

        args
    }
}

/// `-J` flags for a forked compiler: memory settings first, then custom `-J` keys.
pub fn runtime_flags(cfg: &CompilerConfiguration) -> Vec<String> {
    let mut flags = Vec::new();
    if let Some(maxmem) = non_empty(&cfg.maxmem) {
        flags.push(format!("-J-Xmx{}", maxmem));
    }
    if let Some(meminitial) = non_empty(&cfg.meminitial) {
        flags.push(format!("-J-Xms{}", meminitial));
    }
    flags.extend(
        cfg.custom_compiler_arguments
            .iter()
            .filter(|c| c.is_runtime_flag())
            .map(|c| c.key.clone()),
    );
    flags
}

/// Entries joined with the platform path separator (`:` or `;`).
pub fn path_string<P: AsRef<Path>>(entries: &[P]) -> String {
    match env::join_paths(entries.iter().map(|p| p.as_ref())) {
        Ok(joined) => joined.to_string_lossy().into_owned(),
        Err(_) => {
            let sep = if cfg!(windows) { ";" } else { ":" };
            entries
                .iter()
                .map(|p| p.as_ref().to_string_lossy().into_owned())
                .collect::<Vec<_>>()
                .join(sep)
        }
    }
}

fn absolute_string(path: &Path) -> String {
    std::path::absolute(path)
        .unwrap_or_else(|_| path.to_path_buf())
        .to_string_lossy()
        .into_owned()
}

use crate::e_config::CompilerConfiguration;
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about = "e_javac compiles Java sources with javac and reports structured diagnostics.", long_about = None)]
#[command(disable_version_flag = true)]
pub struct Cli {
    /// Print version and feature flags in JSON format.
    #[arg(long, short = 'v', help = "Print version and feature flags in JSON format.")]
    pub version: bool,

    #[arg(long, short = 'c', help = "Read the compiler configuration from a TOML file.")]
    pub config: Option<PathBuf>,

    #[arg(short = 'd', long = "output", help = "Directory for the generated class files.")]
    pub output: Option<PathBuf>,

    #[arg(long, help = "javac executable to run (default: JAVA_HOME, then PATH).")]
    pub executable: Option<String>,

    #[arg(long, help = "Compile for a specific Java release (--release N).")]
    pub release: Option<String>,

    #[arg(
        long = "classpath",
        visible_alias = "cp",
        value_delimiter = ',',
        help = "Classpath entries, comma separated or repeated."
    )]
    pub classpath: Vec<String>,

    #[arg(long = "sourcepath", help = "Directory searched for *.java when no sources are given.")]
    pub source_locations: Vec<PathBuf>,

    #[arg(short = 'g', long, help = "Generate debugging information.")]
    pub debug: bool,

    #[arg(long, help = "Enable lint warnings (-Xlint).")]
    pub lint: bool,

    #[arg(long = "Werror", help = "Treat warnings as errors.")]
    pub fail_on_warning: bool,

    #[arg(long, help = "Keep the argument file and write a javac.sh debug script to the build directory.")]
    pub debug_script: bool,

    #[arg(long, help = "Disable colored diagnostics.")]
    pub no_color: bool,

    #[arg(long, help = "Print the outcome as JSON.")]
    pub json: bool,

    #[arg(long, help = "Print the javac arguments instead of compiling.")]
    pub print_command_line: bool,

    #[arg(
        long,
        value_name = "FILE",
        help = "Parse previously captured javac output instead of compiling."
    )]
    pub parse: Option<PathBuf>,

    #[arg(
        long,
        default_value_t = 1,
        requires = "parse",
        allow_negative_numbers = true,
        help = "Exit code the captured output was produced with (default: 1)."
    )]
    pub exit_code: i32,

    #[arg(help = "Java source files to compile.")]
    pub sources: Vec<PathBuf>,

    #[arg(last = true, help = "Additional arguments passed to javac.")]
    pub extra: Vec<String>,
}

impl Cli {
    /// Overlays command-line flags on `config`. The binary always forks javac.
    pub fn apply_to(&self, config: &mut CompilerConfiguration) {
        config.fork = true;
        if let Some(output) = &self.output {
            config.output_location = output.clone();
        }
        if let Some(executable) = &self.executable {
            config.executable = Some(executable.clone());
        }
        if let Some(release) = &self.release {
            config.release_version = Some(release.clone());
        }
        config.classpath_entries.extend(self.classpath.iter().cloned());
        config
            .source_locations
            .extend(self.source_locations.iter().cloned());
        if !self.sources.is_empty() {
            config.source_files = self.sources.clone();
        }
        config.debug |= self.debug;
        config.show_lint |= self.lint;
        config.fail_on_warning |= self.fail_on_warning;
        config.debug_script |= self.debug_script;
        for extra in &self.extra {
            config.add_custom_argument(extra.clone(), None);
        }
    }
}

pub fn print_version_and_features() {
    let version = option_env!("CARGO_PKG_VERSION").unwrap_or("unknown");

    let mut features = Vec::new();
    if cfg!(feature = "uses_serde") {
        features.push("uses_serde");
    } else {
        features.push("!uses_serde");
    }

    let json_features = format!(
        "[{}]",
        features
            .iter()
            .map(|f| format!("\"{}\"", f))
            .collect::<Vec<String>>()
            .join(", ")
    );
    println!("e_javac {}", version);
    println!("{}", json_features);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_overlay_config() {
        let cli = Cli::parse_from([
            "e_javac",
            "-d",
            "out",
            "--release",
            "17",
            "--cp",
            "a.jar,b.jar",
            "-g",
            "A.java",
            "--",
            "-Xmaxerrs",
        ]);
        let mut cfg = CompilerConfiguration::default();
        cli.apply_to(&mut cfg);
        assert!(cfg.fork);
        assert_eq!(cfg.output_location, PathBuf::from("out"));
        assert_eq!(cfg.release_version.as_deref(), Some("17"));
        assert_eq!(cfg.classpath_entries, vec!["a.jar", "b.jar"]);
        assert!(cfg.debug);
        assert_eq!(cfg.source_files, vec![PathBuf::from("A.java")]);
        assert_eq!(cfg.custom_compiler_arguments[0].key, "-Xmaxerrs");
    }

    #[test]
    fn test_exit_code_requires_parse() {
        assert!(Cli::try_parse_from(["e_javac", "--exit-code", "0"]).is_err());
        let cli = Cli::try_parse_from(["e_javac", "--parse", "out.txt", "--exit-code", "-1"]).unwrap();
        assert_eq!(cli.exit_code, -1);
    }
}

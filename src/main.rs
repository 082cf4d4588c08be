//! # e_javac
//!
//! `e_javac` runs javac and turns its output into structured diagnostics.
//!
//! ## Quick Start
//! ```sh
//! e_javac -d target/classes src/main/java/com/example/App.java
//! e_javac --config javac.toml --json
//! e_javac --parse captured.txt --exit-code 1
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use e_javac::prelude::*;
use e_javac::{parse_stream, Cli, CompileOutcome, CompilerConfiguration, Diagnostic, JavacCompiler};
use std::io::BufReader;

pub fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();
    if cli.version {
        e_javac::e_cli::print_version_and_features();
        exit(0);
    }

    if let Some(captured) = &cli.parse {
        let file = fs::File::open(captured)
            .with_context(|| format!("failed to open {}", captured.display()))?;
        let diagnostics = parse_stream(cli.exit_code, BufReader::new(file))
            .with_context(|| format!("failed to read {}", captured.display()))?;
        let outcome = CompileOutcome::from_exit_code(cli.exit_code, diagnostics);
        report(&cli, &outcome)?;
        exit(if outcome.is_success() { 0 } else { 1 });
    }

    let mut config = match &cli.config {
        Some(path) => CompilerConfiguration::from_toml_file(path)?,
        None => CompilerConfiguration::default(),
    };
    cli.apply_to(&mut config);
    debug!("configuration: {:?}", config);

    let javac = JavacCompiler::default();
    if cli.print_command_line {
        let args = javac
            .create_command_line(&config)
            .context("failed to build the javac command line")?;
        for arg in args {
            println!("{}", arg);
        }
        return Ok(());
    }

    let outcome = javac
        .perform_compile(&config)
        .context("compilation could not be run")?;
    report(&cli, &outcome)?;
    if !outcome.is_success() {
        exit(1);
    }
    Ok(())
}

fn report(cli: &Cli, outcome: &CompileOutcome) -> Result<()> {
    if cli.json {
        #[cfg(feature = "uses_serde")]
        {
            println!("{}", serde_json::to_string_pretty(outcome)?);
            return Ok(());
        }
        #[cfg(not(feature = "uses_serde"))]
        error!("--json needs the uses_serde feature; printing text instead");
    }

    let uses_color = !cli.no_color && env::var_os("NO_COLOR").is_none();
    for diagnostic in outcome.diagnostics() {
        print_diagnostic(diagnostic, uses_color);
    }
    println!("{}", outcome.summary());
    Ok(())
}

fn print_diagnostic(diagnostic: &Diagnostic, uses_color: bool) {
    println!("{}", diagnostic.render(uses_color));
}

#![doc = include_str!("../README.md")]

// Re-export std common modules
pub mod prelude {
    pub use std::env;
    pub use std::fs;
    pub use std::io;
    pub use std::path::{Path, PathBuf};
    pub use std::process::exit;
    pub use std::sync::{Arc, Mutex};
    pub use log::{debug, error, info, log_enabled, trace, warn, Level};
}

pub mod e_argfile;
pub mod e_cli;
pub use e_cli::Cli;
pub mod e_command_builder;
pub use e_command_builder::JavacCommandBuilder;
pub mod e_compiler;
pub use e_compiler::JavacCompiler;
pub mod e_config;
pub use e_config::{CompilerConfiguration, CustomArgument};
pub mod e_error;
pub use e_error::{CompilerError, Result};
pub mod e_instancepool;
pub use e_instancepool::{
    CompilerEntryPoint, CompilerHandle, CompilerInstancePool, EntryPointProvider,
    EntryPointRegistry, LoadingContext, ReusePolicy, Visibility,
};
pub mod e_invoker;
pub use e_invoker::{InvocationExecutor, InvocationMode, ProcessOptions};
pub mod e_locate;
pub mod e_parser;
pub use e_parser::{parse_output, parse_stream, DiagnosticParser};
pub mod e_types;
pub use e_types::*;
pub mod e_version;
pub use e_version::{JavaVersion, VersionCache};

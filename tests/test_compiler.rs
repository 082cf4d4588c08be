#![cfg(unix)]

mod common {
    pub mod test_utils;
}

use common::test_utils::{script_lock, FakeJavac, TestProject};
use e_javac::{CompilerConfiguration, JavacCompiler, Severity, VersionCache};
use std::sync::Arc;

fn forked_config(project: &TestProject, fake: &FakeJavac) -> CompilerConfiguration {
    CompilerConfiguration {
        output_location: project.path().join("target/classes"),
        source_locations: vec![project.path().join("src/main/java")],
        working_directory: project.path().to_path_buf(),
        build_directory: project.path().join("target"),
        executable: Some(fake.executable_str()),
        release_version: Some("17".to_string()),
        maxmem: Some("256m".to_string()),
        fork: true,
        ..Default::default()
    }
}

fn javac() -> JavacCompiler {
    JavacCompiler::default().with_version_cache(Arc::new(VersionCache::new()))
}

#[test]
fn test_forked_compile_end_to_end() {
    let _lock = script_lock();
    let project = TestProject::new("forked").unwrap();
    let app = project
        .add_source("com/example/App.java", "class App { void run() { foo(); } }")
        .unwrap();
    project
        .add_source("com/example/Util.java", "class Util {}")
        .unwrap();
    let fake = FakeJavac::create(project.path(), "17.0.2", 1).unwrap();
    fake.set_stderr(&format!(
        "{}:1: error: cannot find symbol\n\
         class App {{ void run() {{ foo(); }} }}\n\
         \x20                        ^\n\
         \x20 symbol:   method foo()\n\
         Note: Some input files use unchecked or unsafe operations.\n\
         1 error\n",
        app.display()
    ))
    .unwrap();

    let compiler = javac();
    let cfg = forked_config(&project, &fake);
    let outcome = compiler.perform_compile(&cfg).unwrap();

    assert!(!outcome.is_success());
    let diags = outcome.diagnostics();
    assert_eq!(diags.len(), 2, "{diags:#?}");
    assert_eq!(diags[0].severity, Severity::Error);
    assert_eq!(diags[0].file.as_deref(), Some(&*app.to_string_lossy()));
    assert_eq!(diags[0].start_line, 1);
    assert_eq!(diags[0].start_column, 25);
    assert_eq!(diags[1].severity, Severity::Note);
    assert!(project.path().join("target/classes").is_dir());

    let argfile = fake.read("argfile.txt");
    assert!(argfile.contains("\"--release\"\n\"17\"\n"));
    assert!(argfile.contains("App.java\"\n"));
    assert!(argfile.contains("Util.java\"\n"));
    assert!(!argfile.contains("-XDuseUnsharedTable"));
    assert!(fake.invocations()[0].ends_with(" -J-Xmx256m"));
}

#[test]
fn test_version_is_probed_once_per_executable() {
    let _lock = script_lock();
    let project = TestProject::new("probed").unwrap();
    project.add_source("A.java", "class A {}").unwrap();
    let fake = FakeJavac::create(project.path(), "11.0.20", 0).unwrap();

    let compiler = javac();
    let cfg = forked_config(&project, &fake);
    assert!(compiler.perform_compile(&cfg).unwrap().is_success());
    assert!(compiler.perform_compile(&cfg).unwrap().is_success());
    assert!(!compiler.create_command_line(&cfg).unwrap().is_empty());

    assert_eq!(fake.probe_count(), 1);
    assert_eq!(fake.invocations().len(), 2);
}

#[test]
fn test_old_compiler_gets_target_and_source() {
    let _lock = script_lock();
    let project = TestProject::new("legacy").unwrap();
    project.add_source("A.java", "class A {}").unwrap();
    let fake = FakeJavac::create(project.path(), "1.8.0_292", 0).unwrap();

    let mut cfg = forked_config(&project, &fake);
    cfg.target_version = Some("1.8".to_string());
    cfg.source_version = Some("1.8".to_string());
    let args = javac().create_command_line(&cfg).unwrap();

    assert!(!args.contains(&"--release".to_string()));
    let target = args.iter().position(|a| a == "-target").unwrap();
    assert_eq!(args[target + 1], "1.8");
    let source = args.iter().position(|a| a == "-source").unwrap();
    assert_eq!(args[source + 1], "1.8");
}

#[test]
fn test_nothing_to_compile_skips_javac() {
    let _lock = script_lock();
    let project = TestProject::new("empty").unwrap();
    let fake = FakeJavac::create(project.path(), "17", 0).unwrap();

    let outcome = javac()
        .perform_compile(&forked_config(&project, &fake))
        .unwrap();
    assert!(outcome.is_success());
    assert!(outcome.diagnostics().is_empty());
    assert_eq!(fake.probe_count(), 0);
    assert!(fake.invocations().is_empty());
}

#[test]
fn test_missing_executable_is_reported() {
    let project = TestProject::new("missing").unwrap();
    project.add_source("A.java", "class A {}").unwrap();
    let cfg = CompilerConfiguration {
        output_location: project.path().join("out"),
        source_locations: vec![project.path().join("src/main/java")],
        executable: Some(project.path().join("no-javac").to_string_lossy().into_owned()),
        fork: true,
        ..Default::default()
    };
    let err = javac().perform_compile(&cfg).unwrap_err();
    assert!(err.to_string().contains("no-javac"));
}

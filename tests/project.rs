//! Project scaffolding tests: `create` lays out a buildable project whose
//! sample source compiles cleanly.

use fractal::diag::ErrorHandler;
use fractal::project::{create_project, read_project, Project, CONFIG_FILE};
use fractal::target::Platform;

#[test]
fn create_scaffolds_config_and_sources() {
    let dir = tempfile::tempdir().unwrap();
    let project = Project::new("demo");
    create_project(dir.path(), &project).unwrap();

    assert!(dir.path().join(CONFIG_FILE).exists());
    assert!(dir.path().join("src/demo.frc").exists());
    assert!(dir.path().join("build").is_dir());

    let read_back = read_project(dir.path()).unwrap();
    assert_eq!(read_back.name, "demo");
    assert_eq!(read_back.source_path, "src");
    assert_eq!(read_back.build_path, "build");
    assert_eq!(read_back.architecture, "x86_64-intel-win");
}

#[test]
fn scaffolded_sample_compiles() {
    let dir = tempfile::tempdir().unwrap();
    let project = Project::new("demo");
    create_project(dir.path(), &project).unwrap();

    let platform: Platform = read_back_platform(dir.path());
    let mut handler = ErrorHandler::new();
    let source = project.source_file(dir.path());
    let assembly = fractal::compile(&source, platform, &mut handler, false)
        .expect("sample project compiles");

    assert!(!handler.has_errors());
    assert!(assembly.contains("global sampleFunction"));
    assert!(assembly.contains("global main"));
    assert!(assembly.contains("call sampleFunction"));
}

fn read_back_platform(dir: &std::path::Path) -> Platform {
    read_project(dir).unwrap().architecture.parse().unwrap()
}

#[test]
fn config_rejects_unknown_architecture() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join(CONFIG_FILE),
        r#"{"Name":"x","SourcePath":"src","BuildPath":"build","Architecture":"riscv"}"#,
    )
    .unwrap();

    let project = read_project(dir.path()).unwrap();
    assert!(project.architecture.parse::<Platform>().is_err());
}

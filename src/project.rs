//! Project handling and the build sequence: read `build_config.json`, drive
//! the compiler, write the intermediate assembly, then hand it to `nasm` and
//! the system C compiler.

use std::path::{Path, PathBuf};
use std::process::Command;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::diag::ErrorHandler;
use crate::target::Platform;

pub const CONFIG_FILE: &str = "build_config.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Project {
    pub name: String,
    pub source_path: String,
    pub build_path: String,
    pub architecture: String,
}

impl Project {
    pub fn new(name: &str) -> Self {
        Self {
            name: String::from(name),
            source_path: String::from("src"),
            build_path: String::from("build"),
            architecture: String::from(Platform::Windows.architecture()),
        }
    }

    /// Main source file; it shares the project's name.
    pub fn source_file(&self, project_dir: &Path) -> PathBuf {
        project_dir
            .join(&self.source_path)
            .join(format!("{}.frc", self.name))
    }
}

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("there is no build_config.json file in the current directory")]
    MissingConfig,
    #[error("invalid architecture '{0}' specified in the build config")]
    InvalidArchitecture(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error("{tool} exited with {status}")]
    Toolchain {
        tool: &'static str,
        status: std::process::ExitStatus,
    },
    #[error("compilation failed")]
    Compilation,
}

const SAMPLE_CODE: &str = r#"/* Sample Fractal main file.
This file, which has the same name as the project, acts as the main function of the program.
Program execution starts from the first statement outside of the definitions header. */

<define>

fn sampleFunction(): i32 {
    return 0;
}

<!define>

sampleFunction();"#;

/// Scaffold a project: config file, source and build directories, and a
/// sample main file.
pub fn create_project(project_dir: &Path, project: &Project) -> Result<(), BuildError> {
    let config = serde_json::to_string_pretty(project)?;
    std::fs::write(project_dir.join(CONFIG_FILE), config)?;

    let source_dir = project_dir.join(&project.source_path);
    let build_dir = project_dir.join(&project.build_path);
    std::fs::create_dir_all(&source_dir)?;
    std::fs::create_dir_all(&build_dir)?;

    std::fs::write(project.source_file(project_dir), SAMPLE_CODE)?;

    Ok(())
}

pub fn read_project(project_dir: &Path) -> Result<Project, BuildError> {
    let config_path = project_dir.join(CONFIG_FILE);
    if !config_path.exists() {
        return Err(BuildError::MissingConfig);
    }
    let contents = std::fs::read_to_string(config_path)?;
    Ok(serde_json::from_str(&contents)?)
}

pub fn build_project(project_dir: &Path, verbose: bool) -> Result<(), BuildError> {
    let project = read_project(project_dir)?;
    let platform: Platform = project
        .architecture
        .parse()
        .map_err(|_| BuildError::InvalidArchitecture(project.architecture.clone()))?;

    let mut handler = ErrorHandler::new();
    let source = project.source_file(project_dir);
    let assembly = crate::compile(&source, platform, &mut handler, verbose);

    // warnings print before errors, and always before exit
    handler.output_warnings();
    let Some(assembly) = assembly else {
        handler.output_errors();
        return Err(BuildError::Compilation);
    };

    let intermediate = project_dir.join(&project.build_path).join("intermediate");
    std::fs::create_dir_all(&intermediate)?;
    let assembly_path = intermediate.join(format!("{}.asm", project.name));
    std::fs::write(&assembly_path, assembly)?;

    let object_path = intermediate.join(format!("{}.o", project.name));
    run_tool(
        "nasm",
        Command::new("nasm")
            .arg("-f")
            .arg(platform.object_format())
            .arg(&assembly_path)
            .arg("-o")
            .arg(&object_path),
    )?;

    match platform {
        Platform::Windows => {
            let executable = project_dir
                .join(&project.build_path)
                .join(format!("{}.exe", project.name));
            run_tool(
                "gcc",
                Command::new("gcc").arg(&object_path).arg("-o").arg(&executable),
            )?;
        }
        Platform::MacOs => {
            let executable = project_dir.join(&project.build_path).join(&project.name);
            run_tool(
                "gcc",
                Command::new("arch")
                    .args(["-x86_64", "gcc"])
                    .arg(&object_path)
                    .arg("-o")
                    .arg(&executable),
            )?;
        }
    }

    Ok(())
}

fn run_tool(tool: &'static str, command: &mut Command) -> Result<(), BuildError> {
    let status = command.status()?;
    if !status.success() {
        return Err(BuildError::Toolchain { tool, status });
    }
    Ok(())
}

use anyhow::Context;
use clap::Parser;

use fractal::cli::{Cli, Command};
use fractal::project;

fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let project_dir = std::env::current_dir().context("cannot determine the current directory")?;

    match cli.command {
        Command::Create { name } => {
            let project = project::Project::new(&name);
            project::create_project(&project_dir, &project)?;
            println!("Created project '{name}'");
        }
        Command::Build => {
            project::build_project(&project_dir, cli.verbose)?;
        }
    }

    Ok(())
}

fn main() -> std::process::ExitCode {
    if let Err(err) = run() {
        eprintln!("{err}");
        return std::process::ExitCode::FAILURE;
    }
    std::process::ExitCode::SUCCESS
}

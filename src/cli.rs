use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "fractal",
    version,
    about = "Compiler and build tool for the Fractal language"
)]
pub struct Cli {
    /// Print the token list, syntax tree and IR while compiling
    #[arg(long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create a Fractal project in the current directory
    Create { name: String },
    /// Build the project described by ./build_config.json
    Build,
}

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use anyhow::Result;

use routelens::Engine;

#[derive(Parser)]
#[command(name = "routelens")]
#[command(about = "Static HTTP route discovery for compiled Jooby applications")]
#[command(version)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List the routes an application registers
    Routes {
        /// Compiled class directory (repeatable; defaults to project.classpath)
        #[arg(long = "classpath", value_name = "DIR")]
        classpath: Vec<PathBuf>,

        /// Application class, dotted or internal name (detected when omitted)
        #[arg(short, long)]
        entry: Option<String>,

        /// Output format (json, table)
        #[arg(short, long)]
        format: Option<String>,

        /// Write to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Print the decoded model of one class
    Inspect {
        /// Class name, dotted or internal
        class: String,

        /// Compiled class directory (repeatable; defaults to project.classpath)
        #[arg(long = "classpath", value_name = "DIR")]
        classpath: Vec<PathBuf>,
    },

    /// Write a default routelens.toml
    Init {
        /// Target directory (defaults to current directory)
        #[arg(short, long)]
        path: Option<PathBuf>,
    },
}

impl Cli {
    pub fn execute(self, engine: Engine) -> Result<()> {
        match self.command {
            Commands::Routes { classpath, entry, format, output } => {
                engine.routes(classpath, entry, format, output)
            }
            Commands::Inspect { class, classpath } => {
                engine.inspect(classpath, &class)
            }
            Commands::Init { path } => {
                engine.init(path)
            }
        }
    }
}

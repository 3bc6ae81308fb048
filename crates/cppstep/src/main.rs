//! CppStep - C++ Step Debugger
//!
//! A step-by-step debugger for small C++ programs, built on source
//! instrumentation and a WebAssembly runtime.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use cppstep_common::BreakpointSet;
use cppstep_engine::EngineConfig;
use eyre::Result;

mod cmd;
mod utils;

/// Command-line interface for CppStep
#[derive(Debug, Parser)]
#[command(name = "cppstep")]
#[command(about = "CppStep - A step-by-step debugger for small C++ programs")]
#[command(version)]
pub struct Cli {
    /// Configuration file (default: ~/.cppstep.toml)
    #[arg(long, env = "CPPSTEP_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Also write logs to a rolling file in the temp directory
    #[arg(long, global = true)]
    pub log_file: bool,

    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Instrument a C++ source file
    Instrument {
        /// Source file to instrument
        file: PathBuf,

        /// Write the result here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Prepend the shim include so the result compiles on its own
        #[arg(long)]
        wrap: bool,

        /// Print the analysis as JSON instead of the rewritten source
        #[arg(long, conflicts_with = "wrap")]
        analysis: bool,
    },
    /// Debug a C++ program interactively
    Debug {
        /// Source file to debug
        file: PathBuf,

        /// Initial breakpoints, e.g. `4,9-11`
        #[arg(short, long, value_parser = parse_breakpoints)]
        breakpoints: Option<BreakpointSet>,

        /// Run to the first breakpoint instead of pausing at the first step
        #[arg(long)]
        run: bool,
    },
    /// Demultiplex a captured output log and print the final state as JSON
    Replay {
        /// Output log of an instrumented program
        log: PathBuf,
    },
    /// Write the runtime shim headers to a directory
    Shim {
        /// Target directory, created if missing
        dir: PathBuf,
    },
}

fn parse_breakpoints(s: &str) -> std::result::Result<BreakpointSet, String> {
    s.parse().map_err(|e: eyre::Report| e.to_string())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenv::dotenv().ok();

    let cli = Cli::parse();
    cppstep_common::logging::init_logging("cppstep", cli.log_file)?;

    match cli.command {
        Commands::Instrument { file, output, wrap, analysis } => {
            tracing::info!("Instrumenting {}", file.display());
            cmd::instrument_file(&file, output.as_deref(), wrap, analysis)
        }
        Commands::Debug { file, breakpoints, run } => {
            let config = EngineConfig::load(cli.config.as_deref())?;
            tracing::info!("Debugging {}", file.display());
            cmd::debug_program(&file, breakpoints.unwrap_or_default(), run, &config).await
        }
        Commands::Replay { log } => {
            tracing::info!("Replaying output log {}", log.display());
            cmd::replay_log(&log)
        }
        Commands::Shim { dir } => cmd::write_shim(&dir),
    }
}

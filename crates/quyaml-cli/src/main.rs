//! QuYAML Command-Line Interface
//!
//! Validates QuYAML documents and prints the builder call trace they lower to.

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};
use console::style;
use tracing_subscriber::EnvFilter;

mod commands;

use commands::{common, compile, validate};

/// QuYAML - safety-restricted quantum circuit compiler
#[derive(Debug, Parser)]
#[command(name = "quyaml")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Parser configuration file (YAML)
    #[arg(long, global = true, env = "QUYAML_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Check a document and print a summary
    Validate {
        /// Input document
        file: PathBuf,

        /// Print the parsed document as JSON
        #[arg(long)]
        json: bool,
    },

    /// Parse and lower a document, printing the builder call trace
    Compile {
        /// Input document
        file: PathBuf,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },
}

/// How command results are printed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

fn log_filter(verbose: u8) -> &'static str {
    match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let config = common::load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Validate { file, json } => validate::execute(&file, json, &config),
        Commands::Compile { file, format } => compile::execute(&file, format, &config),
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(log_filter(cli.verbose)))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            match e.downcast_ref::<quyaml::Error>() {
                Some(err) => eprintln!("{}: {err}", style(err.kind()).red().bold()),
                None => eprintln!("{} {e:#}", style("Error:").red().bold()),
            }
            ExitCode::FAILURE
        }
    }
}

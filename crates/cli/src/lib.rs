pub mod commands;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    name = "grantbot",
    about = "Grant report drafting assistant",
    long_about = "Draft quarterly grant reports through a guided conversation, inspect configuration, and check readiness.",
    after_help = "Examples:\n  grantbot chat\n  grantbot doctor --json\n  grantbot render --period 2 --answers answers.toml"
)]
pub struct Cli {
    #[arg(long, global = true, help = "Path to a grantbot.toml configuration file")]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Start an interactive report drafting conversation in the terminal")]
    Chat,
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
    #[command(about = "Validate config, output directory, and conversation templates")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(about = "Assemble a report body from a TOML answer file and print it")]
    Render {
        #[arg(long, help = "Reporting quarter number")]
        period: u32,
        #[arg(long, help = "TOML file mapping section keys to answers")]
        answers: PathBuf,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();
    let config_path = cli.config;

    let result = match cli.command {
        Command::Chat => commands::chat::run(config_path),
        Command::Config => commands::CommandResult {
            exit_code: 0,
            output: commands::config::run(config_path.as_deref()),
        },
        Command::Doctor { json } => commands::doctor::run(config_path, json),
        Command::Render { period, answers } => {
            commands::render::run(config_path, period, &answers)
        }
    };

    if !result.output.is_empty() {
        println!("{}", result.output);
    }
    ExitCode::from(result.exit_code)
}

pub mod commands;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tablechat_core::config::LoadOptions;

#[derive(Debug, Parser)]
#[command(
    name = "tablechat",
    about = "Tablechat operator CLI",
    long_about = "Inspect configuration, check store and model readiness, \
                  and talk to your base from the terminal.",
    after_help = "Examples:\n  tablechat doctor --json\n  tablechat tables\n  \
                  tablechat ask \"what tasks are overdue?\""
)]
pub struct Cli {
    #[arg(
        long,
        global = true,
        value_name = "PATH",
        help = "Read configuration from this TOML file"
    )]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
    #[command(about = "Validate config, store reachability, and model reachability")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(about = "List the tables in the configured base")]
    Tables,
    #[command(about = "Answer one message through the agent dispatcher")]
    Ask {
        #[arg(required = true, num_args = 1.., help = "The message to answer")]
        text: Vec<String>,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();
    let options = LoadOptions { config_path: cli.config, ..LoadOptions::default() };

    let result = match cli.command {
        Command::Config => commands::config::run(options),
        Command::Doctor { json } => commands::doctor::run(options, json),
        Command::Tables => commands::tables::run(options),
        Command::Ask { text } => commands::ask::run(options, &text.join(" ")),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}

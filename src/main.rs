//! Gridrace CLI - judge and client-bridge entry points.

// Allow print in the CLI binary
#![allow(clippy::print_stdout, clippy::print_stderr)]

mod cli;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

/// Gridrace - a networked judge for grid-race programming contests
#[derive(Parser, Debug)]
#[command(name = "gridrace")]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug)]
enum Commands {
    /// Host a match: accept bot connections and judge the race
    Judge {
        /// Path to the environment config file (JSON)
        config_file: PathBuf,

        /// Number of players; note that each track has a maximum
        num_players: usize,

        /// Path to save the replay file to (omitted: no replay is written)
        #[arg(long = "replay_file")]
        replay_file: Option<PathBuf>,

        /// Path to save the final scores to (JSON array)
        #[arg(long = "output_file")]
        output_file: Option<PathBuf>,

        /// Timeout (in seconds) for player responses
        #[arg(long, default_value_t = 1.0)]
        timeout: f64,

        /// Timeout (in seconds) for player connections
        #[arg(long = "connection_timeout", default_value_t = 10.0)]
        connection_timeout: f64,

        /// Expected client addresses, separated by ';' (one per player)
        #[arg(long = "client_addresses")]
        client_addresses: Option<String>,
    },

    /// Forward a bot's standard input/output to a judge over the network
    Bridge {
        /// Path to the bot program (.py, .mjs, or an executable)
        bot_exe: PathBuf,

        /// Address of the judge system
        #[arg(long = "judge_address", default_value = "localhost")]
        judge_address: String,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "gridrace=info".into()),
        )
        .init();

    let args = Args::parse();

    let result = match args.command {
        Commands::Judge {
            config_file,
            num_players,
            replay_file,
            output_file,
            timeout,
            connection_timeout,
            client_addresses,
        } => {
            cli::judge::execute(
                &config_file,
                num_players,
                replay_file.as_deref(),
                output_file.as_deref(),
                timeout,
                connection_timeout,
                client_addresses.as_deref(),
            )
            .await
        }

        Commands::Bridge {
            bot_exe,
            judge_address,
        } => cli::bridge::execute(&bot_exe, &judge_address).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

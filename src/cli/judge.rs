//! Judge command implementation.

use super::CliError;
use gridrace::race::RaceOptions;
use gridrace::{EnvironmentRunner, GridRaceEnv, RunnerConfig, Track};
use std::fs;
use std::net::IpAddr;
use std::path::Path;
use std::time::Duration;

/// Execute the judge command.
///
/// Exit is zero on normal completion regardless of the match outcome;
/// only configuration and startup problems are errors.
///
/// # Errors
///
/// Returns an error for an unreadable config or track, inconsistent
/// client addresses, or a failed accept phase.
#[allow(clippy::too_many_arguments)]
pub(crate) async fn execute(
    config_file: &Path,
    num_players: usize,
    replay_file: Option<&Path>,
    output_file: Option<&Path>,
    timeout: f64,
    connection_timeout: f64,
    client_addresses: Option<&str>,
) -> Result<(), CliError> {
    let text = fs::read_to_string(config_file)
        .map_err(|e| CliError::new(format!("Failed to read {}: {e}", config_file.display())))?;
    let options: RaceOptions = serde_json::from_str(&text)
        .map_err(|e| CliError::new(format!("Invalid config file: {e}")))?;

    if let Some(configured) = options.num_players {
        println!(
            "Warning: number of players specified in configuration file, replacing it \
             with command line argument value ({configured}->{num_players})."
        );
    }

    let addresses = client_addresses
        .map(|list| parse_addresses(list, num_players))
        .transpose()?;

    let track = Track::from_file(&options.track_file)?;
    let env = GridRaceEnv::new(track, num_players, options.visibility_radius, options.max_turns)?;

    let config = RunnerConfig {
        step_timeout: seconds(timeout, "timeout")?,
        connection_timeout: seconds(connection_timeout, "connection_timeout")?,
        client_addresses: addresses,
        ..RunnerConfig::default()
    };
    let mut runner = EnvironmentRunner::bind(env, config).await?;
    let scores = runner.run().await?;
    println!("Final scores: {scores:?}");

    let env = runner.into_env();
    if let Some(path) = replay_file {
        println!("Saving replays to {}.", path.display());
        env.replay().save_to_file(path)?;
    }
    if let Some(path) = output_file {
        println!("Saving final scores to {}.", path.display());
        let file = fs::File::create(path)?;
        serde_json::to_writer(file, &scores)
            .map_err(|e| CliError::new(format!("Failed to write scores: {e}")))?;
    }
    Ok(())
}

fn parse_addresses(list: &str, num_players: usize) -> Result<Vec<IpAddr>, CliError> {
    let addresses: Vec<IpAddr> = list
        .split(';')
        .map(|part| {
            part.trim()
                .parse()
                .map_err(|_| CliError::new(format!("Invalid client address: {part:?}")))
        })
        .collect::<Result<_, _>>()?;
    if addresses.len() != num_players {
        return Err(CliError::new(
            "Number of client addresses must equal the number of players.",
        ));
    }
    Ok(addresses)
}

fn seconds(value: f64, name: &str) -> Result<Duration, CliError> {
    if value.is_finite() && value > 0.0 {
        Ok(Duration::from_secs_f64(value))
    } else {
        Err(CliError::new(format!("{name} must be a positive number")))
    }
}

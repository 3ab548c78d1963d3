//! Bridge command implementation.

use super::CliError;
use gridrace::bridge::ClientBridge;
use std::path::Path;

/// Execute the bridge command.
///
/// # Errors
///
/// Returns an error if the bot cannot be started or the judge is
/// unreachable.
pub(crate) async fn execute(bot_exe: &Path, judge_address: &str) -> Result<(), CliError> {
    let bridge = ClientBridge::start(judge_address, bot_exe).await?;
    bridge.run().await;
    Ok(())
}

use colored::Colorize;

use crate::application::services::poller::PollerService;

/// One-shot poll of the whole fleet, printing the pass counts.
///
/// # Errors
///
/// Returns an error if the device list cannot be read.
pub async fn run_poll(poller: &PollerService) -> anyhow::Result<()> {
    let result = poller.run_cycle().await?;

    println!("{}", "printwatch — fleet poll".bold().cyan());
    println!(
        "  {} device(s) polled: {} online, {} offline",
        result.polled,
        result.online.to_string().green(),
        if result.offline > 0 {
            result.offline.to_string().red().to_string()
        } else {
            result.offline.to_string()
        }
    );
    if result.failed > 0 {
        println!("  {}", format!("{} reading(s) failed to ingest", result.failed).red());
    }
    Ok(())
}

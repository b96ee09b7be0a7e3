use colored::Colorize;

use crate::application::services::scheduler::Scheduler;

/// Run the full scheduler until a SIGINT (Ctrl+C) arrives, then shut
/// down. SIGTERM is not handled; add a
/// `tokio::signal::unix::signal(SignalKind::terminate())` handler if
/// systemd needs it.
///
/// # Errors
///
/// Returns an error if the shutdown signal handler cannot be installed.
pub async fn run_daemon(scheduler: Scheduler) -> anyhow::Result<()> {
    println!("{}", "printwatch daemon running, Ctrl+C to stop".dimmed());
    scheduler.run().await?;
    println!("\n{}", "printwatch stopped".dimmed());
    Ok(())
}

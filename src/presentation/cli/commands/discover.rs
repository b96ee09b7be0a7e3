use colored::Colorize;

use crate::application::services::discovery::DiscoveryService;
use crate::domain::ports::store::DeviceStore;

/// One-shot sweep of the configured network, printing any candidates
/// found so far (including earlier sweeps).
///
/// # Errors
///
/// Returns an error if the CIDR is invalid or the inventory cannot be
/// read.
pub async fn run_discover(
    discovery: &DiscoveryService,
    devices: &dyn DeviceStore,
) -> anyhow::Result<()> {
    println!("{}", "printwatch — network discovery".bold().cyan());
    let result = discovery.run_sweep().await?;
    println!(
        "  {} host(s) probed, {} printer(s) found, {} already registered",
        result.probed,
        result.found.to_string().green(),
        result.known_skipped
    );

    let candidates = devices.list_candidates()?;
    if candidates.is_empty() {
        println!("  {}", "no unregistered printers on record".dimmed());
        return Ok(());
    }
    println!("\n  Unregistered printers:");
    for candidate in candidates {
        println!(
            "  {:<16} {} {}",
            candidate.address.to_string().bold(),
            candidate.name,
            format!("({})", candidate.model).dimmed()
        );
    }
    Ok(())
}

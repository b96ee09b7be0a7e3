use colored::Colorize;
use serde_json::json;

use crate::domain::ports::store::{DeviceStore, SampleStore, SupplyStore};
use crate::presentation::cli::formatters::{device_status_label, supply_gauge};

/// Print the current state of every registered device: cached status,
/// last contact, latest sample highlights, and supply levels.
///
/// # Errors
///
/// Returns an error if the inventory cannot be read or JSON
/// serialization fails.
pub fn run_status(
    devices: &dyn DeviceStore,
    samples: &dyn SampleStore,
    supplies: &dyn SupplyStore,
    json: bool,
) -> anyhow::Result<()> {
    let fleet = devices.list_devices()?;

    if json {
        let mut entries = vec![];
        for device in &fleet {
            let sample = samples.latest_sample(device.id)?;
            let supplies = supplies.supplies_for_device(device.id)?;
            entries.push(json!({
                "device": device,
                "latest_sample": sample,
                "supplies": supplies,
            }));
        }
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    println!("{}", "printwatch — fleet status".bold().cyan());
    println!("{}", "━".repeat(50));
    if fleet.is_empty() {
        println!("{}", "no devices registered".dimmed());
        return Ok(());
    }

    for device in fleet {
        println!(
            "\n{} {} {}",
            device.name.bold(),
            format!("({})", device.address).dimmed(),
            device_status_label(device.status)
        );
        match device.last_seen {
            Some(at) => println!("  last seen {}", at.format("%Y-%m-%d %H:%M:%S UTC")),
            None => println!("  {}", "never seen".dimmed()),
        }

        if let Some(sample) = samples.latest_sample(device.id)? {
            println!(
                "  paper {} ({}), queue {}, {} pages total",
                supply_gauge(
                    sample.paper_level,
                    crate::domain::entities::supply::SupplyStatus::from_level(sample.paper_level)
                ),
                sample.paper_status,
                sample.queue_size,
                sample.total_pages
            );
            if let Some(code) = &sample.error_code {
                let detail = sample.error_message.as_deref().unwrap_or("");
                println!("  {} {code} {detail}", "error".red().bold());
            }
        }

        for supply in supplies.supplies_for_device(device.id)? {
            println!(
                "  {:<14} {}",
                supply.supply_type.as_str(),
                supply_gauge(supply.level, supply.status)
            );
        }
    }
    Ok(())
}

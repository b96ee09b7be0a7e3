use chrono::Utc;
use colored::Colorize;

use crate::application::services::alerts::AlertService;
use crate::domain::ports::store::AlertStore;
use crate::presentation::cli::formatters::severity_badge;

/// What `printwatch alerts` should do, parsed from the flags.
#[derive(Debug, Clone, Copy)]
pub enum AlertAction<'a> {
    List { limit: usize },
    Acknowledge(i64),
    Resolve(i64, Option<&'a str>),
    Close(i64),
}

/// The operator name stamped on transitions made from the CLI.
fn actor() -> String {
    std::env::var("USER").unwrap_or_else(|_| "operator".into())
}

/// List recent alerts or apply one lifecycle transition.
///
/// # Errors
///
/// Returns an error if the store cannot be read or the transition is
/// rejected for the alert's current state.
pub fn run_alerts(
    service: &AlertService,
    store: &dyn AlertStore,
    action: AlertAction<'_>,
) -> anyhow::Result<()> {
    match action {
        AlertAction::List { limit } => {
            let alerts = store.recent_alerts(limit)?;
            if alerts.is_empty() {
                println!("{}", "no alerts on record".green().bold());
                return Ok(());
            }
            println!("{}", "printwatch — recent alerts".bold().cyan());
            for alert in alerts {
                println!(
                    "\n{:>5}  {} {} [{}]",
                    alert.id.to_string().bold(),
                    severity_badge(alert.severity),
                    alert.title,
                    alert.status
                );
                println!(
                    "       {}",
                    alert.created_at.format("%Y-%m-%d %H:%M:%S UTC").to_string().dimmed()
                );
                if let Some(by) = &alert.acknowledged_by {
                    println!("       acknowledged by {by}");
                }
                if let Some(by) = &alert.resolved_by {
                    let notes = alert.resolution_notes.as_deref().unwrap_or("");
                    println!("       resolved by {by} {}", notes.dimmed());
                }
            }
        }
        AlertAction::Acknowledge(id) => {
            let alert = service.acknowledge(id, &actor(), Utc::now())?;
            println!("alert {} acknowledged: {}", alert.id, alert.title);
        }
        AlertAction::Resolve(id, notes) => {
            let alert = service.resolve(id, &actor(), notes, Utc::now())?;
            println!("alert {} resolved: {}", alert.id, alert.title);
        }
        AlertAction::Close(id) => {
            let alert = service.close(id, &actor(), Utc::now())?;
            println!("alert {} closed: {}", alert.id, alert.title);
        }
    }
    Ok(())
}

use colored::Colorize;

use crate::domain::entities::device::DeviceStatus;
use crate::domain::entities::supply::SupplyStatus;
use crate::domain::value_objects::Severity;

#[must_use]
pub fn severity_badge(severity: Severity) -> String {
    let label = format!(" {severity} ");
    match severity {
        Severity::Critical => format!("{}", label.on_red().white().bold()),
        Severity::High => format!("{}", label.on_yellow().black().bold()),
        Severity::Medium => format!("{}", label.on_bright_yellow().black()),
        Severity::Low => format!("{}", label.on_blue().white()),
    }
}

#[must_use]
pub fn device_status_label(status: DeviceStatus) -> String {
    let label = status.as_str();
    match status {
        DeviceStatus::Active => format!("{}", label.green()),
        DeviceStatus::Maintenance => format!("{}", label.yellow()),
        DeviceStatus::Inactive => format!("{}", label.dimmed()),
        DeviceStatus::Error | DeviceStatus::Offline => format!("{}", label.red().bold()),
    }
}

#[must_use]
pub fn supply_gauge(level: u8, status: SupplyStatus) -> String {
    let text = format!("{level:>3}%");
    match status {
        SupplyStatus::Ok => format!("{}", text.green()),
        SupplyStatus::Low => format!("{}", text.yellow()),
        SupplyStatus::VeryLow | SupplyStatus::Empty => format!("{}", text.red().bold()),
        SupplyStatus::Unknown => format!("{}", text.dimmed()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use colored::control;

    fn disable_colors() {
        control::set_override(false);
    }

    #[test]
    fn severity_badge_contains_level_name() {
        disable_colors();
        assert!(severity_badge(Severity::Critical).contains("CRITICAL"));
        assert!(severity_badge(Severity::Low).contains("LOW"));
    }

    #[test]
    fn device_status_label_uses_storage_form() {
        disable_colors();
        assert!(device_status_label(DeviceStatus::Offline).contains("offline"));
        assert!(device_status_label(DeviceStatus::Active).contains("active"));
    }

    #[test]
    fn supply_gauge_shows_the_percentage() {
        disable_colors();
        assert!(supply_gauge(4, SupplyStatus::Empty).contains("4%"));
        assert!(supply_gauge(100, SupplyStatus::Ok).contains("100%"));
    }
}

use serde::{Deserialize, Serialize};

/// The condition category an alert rule checks against a device.
///
/// A closed enum: every variant has exactly one evaluation predicate in the
/// rule evaluator, dispatched from a single `match`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TriggerType {
    SupplyLow,
    SupplyEmpty,
    PaperJam,
    DeviceOffline,
    ErrorCode,
    MaintenanceDue,
    HighTemperature,
    QueueFull,
}

impl TriggerType {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::SupplyLow => "supply_low",
            Self::SupplyEmpty => "supply_empty",
            Self::PaperJam => "paper_jam",
            Self::DeviceOffline => "device_offline",
            Self::ErrorCode => "error_code",
            Self::MaintenanceDue => "maintenance_due",
            Self::HighTemperature => "high_temperature",
            Self::QueueFull => "queue_full",
        }
    }

    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "supply_low" => Some(Self::SupplyLow),
            "supply_empty" => Some(Self::SupplyEmpty),
            "paper_jam" => Some(Self::PaperJam),
            "device_offline" => Some(Self::DeviceOffline),
            "error_code" => Some(Self::ErrorCode),
            "maintenance_due" => Some(Self::MaintenanceDue),
            "high_temperature" => Some(Self::HighTemperature),
            "queue_full" => Some(Self::QueueFull),
            _ => None,
        }
    }

    /// Default threshold applied when a rule leaves its threshold unset.
    ///
    /// Units depend on the trigger: percent for supplies, degrees Celsius
    /// for temperature, job count for the queue, days for maintenance.
    #[must_use]
    pub const fn default_threshold(&self) -> Option<f64> {
        match self {
            Self::SupplyLow => Some(25.0),
            Self::SupplyEmpty => Some(5.0),
            Self::HighTemperature => Some(60.0),
            Self::QueueFull => Some(10.0),
            Self::MaintenanceDue => Some(90.0),
            Self::PaperJam | Self::DeviceOffline | Self::ErrorCode => None,
        }
    }

    /// Comparison direction the trigger itself implies: supplies fire at
    /// or below their threshold, temperature, queue depth and elapsed
    /// maintenance days fire above it.
    #[must_use]
    pub const fn default_comparison(&self) -> Comparison {
        match self {
            Self::HighTemperature | Self::QueueFull | Self::MaintenanceDue => Comparison::Gt,
            Self::SupplyLow
            | Self::SupplyEmpty
            | Self::PaperJam
            | Self::DeviceOffline
            | Self::ErrorCode => Comparison::Lte,
        }
    }
}

impl std::fmt::Display for TriggerType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Comparison operator for threshold rules. Rules normally leave it
/// unset and inherit the trigger's direction; see
/// [`TriggerType::default_comparison`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Comparison {
    Lt,
    Lte,
    Gt,
    Gte,
    Eq,
    Ne,
}

impl Comparison {
    /// Apply the operator with `value` on the left-hand side.
    #[must_use]
    pub fn holds(&self, value: f64, threshold: f64) -> bool {
        match self {
            Self::Lt => value < threshold,
            Self::Lte => value <= threshold,
            Self::Gt => value > threshold,
            Self::Gte => value >= threshold,
            Self::Eq => (value - threshold).abs() < f64::EPSILON,
            Self::Ne => (value - threshold).abs() >= f64::EPSILON,
        }
    }

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Lt => "lt",
            Self::Lte => "lte",
            Self::Gt => "gt",
            Self::Gte => "gte",
            Self::Eq => "eq",
            Self::Ne => "ne",
        }
    }

    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "lt" => Some(Self::Lt),
            "lte" => Some(Self::Lte),
            "gt" => Some(Self::Gt),
            "gte" => Some(Self::Gte),
            "eq" => Some(Self::Eq),
            "ne" => Some(Self::Ne),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trigger_parse_round_trips() {
        for trigger in [
            TriggerType::SupplyLow,
            TriggerType::SupplyEmpty,
            TriggerType::PaperJam,
            TriggerType::DeviceOffline,
            TriggerType::ErrorCode,
            TriggerType::MaintenanceDue,
            TriggerType::HighTemperature,
            TriggerType::QueueFull,
        ] {
            assert_eq!(TriggerType::parse(trigger.as_str()), Some(trigger));
        }
        assert_eq!(TriggerType::parse("out_of_coffee"), None);
    }

    #[test]
    fn defaults_match_trigger_semantics() {
        assert_eq!(TriggerType::SupplyLow.default_threshold(), Some(25.0));
        assert_eq!(TriggerType::SupplyEmpty.default_threshold(), Some(5.0));
        assert_eq!(TriggerType::HighTemperature.default_threshold(), Some(60.0));
        assert_eq!(TriggerType::QueueFull.default_threshold(), Some(10.0));
        assert_eq!(TriggerType::MaintenanceDue.default_threshold(), Some(90.0));
        assert_eq!(TriggerType::PaperJam.default_threshold(), None);
    }

    #[test]
    fn comparison_operators() {
        assert!(Comparison::Lt.holds(4.0, 5.0));
        assert!(!Comparison::Lt.holds(5.0, 5.0));
        assert!(Comparison::Lte.holds(5.0, 5.0));
        assert!(Comparison::Gt.holds(6.0, 5.0));
        assert!(Comparison::Gte.holds(5.0, 5.0));
        assert!(Comparison::Eq.holds(5.0, 5.0));
        assert!(Comparison::Ne.holds(4.0, 5.0));
    }

    #[test]
    fn trigger_implies_the_comparison_direction() {
        assert_eq!(TriggerType::SupplyLow.default_comparison(), Comparison::Lte);
        assert_eq!(TriggerType::SupplyEmpty.default_comparison(), Comparison::Lte);
        assert_eq!(TriggerType::HighTemperature.default_comparison(), Comparison::Gt);
        assert_eq!(TriggerType::QueueFull.default_comparison(), Comparison::Gt);
    }
}

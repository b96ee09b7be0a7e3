use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Canonical consumable tag, one row per (device, supply type).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SupplyType {
    TonerBlack,
    TonerCyan,
    TonerMagenta,
    TonerYellow,
    InkBlack,
    InkCyan,
    InkMagenta,
    InkYellow,
    Paper,
    Drum,
    Fuser,
}

impl SupplyType {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::TonerBlack => "toner_black",
            Self::TonerCyan => "toner_cyan",
            Self::TonerMagenta => "toner_magenta",
            Self::TonerYellow => "toner_yellow",
            Self::InkBlack => "ink_black",
            Self::InkCyan => "ink_cyan",
            Self::InkMagenta => "ink_magenta",
            Self::InkYellow => "ink_yellow",
            Self::Paper => "paper",
            Self::Drum => "drum",
            Self::Fuser => "fuser",
        }
    }

    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "toner_black" => Some(Self::TonerBlack),
            "toner_cyan" => Some(Self::TonerCyan),
            "toner_magenta" => Some(Self::TonerMagenta),
            "toner_yellow" => Some(Self::TonerYellow),
            "ink_black" => Some(Self::InkBlack),
            "ink_cyan" => Some(Self::InkCyan),
            "ink_magenta" => Some(Self::InkMagenta),
            "ink_yellow" => Some(Self::InkYellow),
            "paper" => Some(Self::Paper),
            "drum" => Some(Self::Drum),
            "fuser" => Some(Self::Fuser),
            _ => None,
        }
    }
}

impl std::fmt::Display for SupplyType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Supply state derived purely from the level percentage.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SupplyStatus {
    Ok,
    Low,
    VeryLow,
    Empty,
    #[default]
    Unknown,
}

impl SupplyStatus {
    /// Level thresholds: <=0 empty, <=10 very low, <=25 low, else ok.
    #[must_use]
    pub const fn from_level(level: u8) -> Self {
        if level == 0 {
            Self::Empty
        } else if level <= 10 {
            Self::VeryLow
        } else if level <= 25 {
            Self::Low
        } else {
            Self::Ok
        }
    }

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Low => "low",
            Self::VeryLow => "very_low",
            Self::Empty => "empty",
            Self::Unknown => "unknown",
        }
    }

    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "ok" => Some(Self::Ok),
            "low" => Some(Self::Low),
            "very_low" => Some(Self::VeryLow),
            "empty" => Some(Self::Empty),
            "unknown" => Some(Self::Unknown),
            _ => None,
        }
    }
}

/// Current consumable state for one (device, supply type) pair.
/// Overwritten on every refresh; no history is kept.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupplyLevel {
    pub device_id: i64,
    pub supply_type: SupplyType,
    /// Percentage remaining, always within 0–100.
    pub level: u8,
    pub max_capacity: u32,
    pub current_capacity: u32,
    pub status: SupplyStatus,
    pub updated_at: DateTime<Utc>,
}

impl SupplyLevel {
    /// Build a row from a walked table entry, clamping the level into
    /// range and deriving status and current capacity from it.
    #[must_use]
    pub fn from_reading(
        device_id: i64,
        supply_type: SupplyType,
        level: i64,
        max_capacity: i64,
        updated_at: DateTime<Utc>,
    ) -> Self {
        let level = level.clamp(0, 100) as u8;
        let max_capacity = max_capacity.clamp(0, i64::from(u32::MAX)) as u32;
        let current_capacity = (u64::from(level) * u64::from(max_capacity) / 100) as u32;
        Self {
            device_id,
            supply_type,
            level,
            max_capacity,
            current_capacity,
            status: SupplyStatus::from_level(level),
            updated_at,
        }
    }
}

/// Map a device-reported free-text supply description to a canonical tag.
///
/// Matching is keyword-based (color plus medium). Entries that match no
/// known pattern are dropped by the caller rather than guessed.
#[must_use]
pub fn map_supply_description(description: &str) -> Option<SupplyType> {
    let desc = description.to_lowercase();
    let color = |black: SupplyType, ink: SupplyType| {
        if desc.contains("toner") {
            Some(black)
        } else if desc.contains("ink") {
            Some(ink)
        } else {
            None
        }
    };

    if desc.contains("black") {
        color(SupplyType::TonerBlack, SupplyType::InkBlack)
    } else if desc.contains("cyan") {
        color(SupplyType::TonerCyan, SupplyType::InkCyan)
    } else if desc.contains("magenta") {
        color(SupplyType::TonerMagenta, SupplyType::InkMagenta)
    } else if desc.contains("yellow") {
        color(SupplyType::TonerYellow, SupplyType::InkYellow)
    } else if desc.contains("drum") {
        Some(SupplyType::Drum)
    } else if desc.contains("fuser") {
        Some(SupplyType::Fuser)
    } else {
        None
    }
}

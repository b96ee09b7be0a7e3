//! Managed-object identifiers used when polling printers.
//!
//! Scalar objects from the standard MIB-II and Printer MIB; the supply
//! columns are table roots walked per device.

pub const SYSTEM_DESCRIPTION: &[u32] = &[1, 3, 6, 1, 2, 1, 1, 1, 0];
pub const SYSTEM_NAME: &[u32] = &[1, 3, 6, 1, 2, 1, 1, 5, 0];
pub const DEVICE_MODEL: &[u32] = &[1, 3, 6, 1, 2, 1, 25, 3, 2, 1, 3, 1];
pub const SERIAL_NUMBER: &[u32] = &[1, 3, 6, 1, 2, 1, 43, 5, 1, 1, 17, 1];

/// hrDeviceStatus: 1 unknown, 2 running, 3 warning, 4 testing, 5 down.
pub const DEVICE_STATUS: &[u32] = &[1, 3, 6, 1, 2, 1, 25, 3, 2, 1, 5, 1];
/// hrPrinterStatus: 1 other, 2 unknown, 3 idle, 4 printing, 5 warmup.
pub const PRINTER_STATUS: &[u32] = &[1, 3, 6, 1, 2, 1, 25, 3, 5, 1, 1, 1];

/// prtMarkerLifeCount for the mono and color marker units.
pub const TOTAL_PAGES: &[u32] = &[1, 3, 6, 1, 2, 1, 43, 10, 2, 1, 4, 1, 1];
pub const COLOR_PAGES: &[u32] = &[1, 3, 6, 1, 2, 1, 43, 10, 2, 1, 4, 1, 2];

/// prtMarkerSuppliesTable columns, walked per device.
pub const SUPPLY_DESCRIPTION: &[u32] = &[1, 3, 6, 1, 2, 1, 43, 11, 1, 1, 6, 1];
pub const SUPPLY_LEVEL: &[u32] = &[1, 3, 6, 1, 2, 1, 43, 11, 1, 1, 9, 1];
pub const SUPPLY_MAX_CAPACITY: &[u32] = &[1, 3, 6, 1, 2, 1, 43, 11, 1, 1, 8, 1];

/// prtInputStatus and level for the default input tray.
pub const PAPER_INPUT_STATUS: &[u32] = &[1, 3, 6, 1, 2, 1, 43, 8, 2, 1, 10, 1, 1];
pub const PAPER_INPUT_LEVEL: &[u32] = &[1, 3, 6, 1, 2, 1, 43, 8, 2, 1, 9, 1, 1];
pub const PAPER_INPUT_CAPACITY: &[u32] = &[1, 3, 6, 1, 2, 1, 43, 8, 2, 1, 8, 1, 1];

/// HP enterprise extension reporting fuser temperature in degrees
/// Celsius. Absent on most models; polled best-effort.
pub const TEMPERATURE: &[u32] = &[1, 3, 6, 1, 4, 1, 11, 2, 3, 9, 4, 2, 1, 2, 2, 1, 0];

/// prtAlertTable first entry: numeric code and free-text description.
pub const ERROR_CODE: &[u32] = &[1, 3, 6, 1, 2, 1, 43, 18, 1, 1, 1, 1, 1];
pub const ERROR_DESCRIPTION: &[u32] = &[1, 3, 6, 1, 2, 1, 43, 18, 1, 1, 2, 1, 1];

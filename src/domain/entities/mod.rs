pub mod alert;
pub mod attempt;
pub mod device;
pub mod maintenance;
pub mod rule;
pub mod sample;
pub mod summary;
pub mod supply;
pub mod user;

pub use alert::{Alert, AlertContext, AlertStatus};
pub use attempt::{AttemptStatus, NotificationAttempt};
pub use device::{Device, DeviceCandidate, DeviceStatus};
pub use maintenance::{MaintenanceKind, MaintenanceRecord};
pub use rule::AlertRule;
pub use sample::{PaperStatus, StatusSample};
pub use summary::{ConsumptionSummary, SummaryPeriod};
pub use supply::{map_supply_description, SupplyLevel, SupplyStatus, SupplyType};
pub use user::{Role, UserContact};

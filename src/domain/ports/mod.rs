pub mod channel;
pub mod directory;
pub mod protocol;
pub mod store;

pub use channel::{Delivery, NotificationChannel, NotificationError};
pub use directory::UserDirectory;
pub use protocol::{ProtocolClient, ProtocolError, ProtocolValue, SnmpTarget, WalkStep};
pub use store::{
    AlertStore, AttemptStore, DeviceStore, JobStore, MaintenanceStore, RuleStore, SampleStore,
    StoreError, SummaryStore, SupplyStore,
};

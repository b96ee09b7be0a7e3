pub mod channel;
pub mod severity;
pub mod trigger;

pub use channel::Channel;
pub use severity::Severity;
pub use trigger::{Comparison, TriggerType};

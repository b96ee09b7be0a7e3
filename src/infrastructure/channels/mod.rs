pub mod gateway;
pub mod system;

pub use gateway::HttpGatewayChannel;
pub use system::SystemFeedChannel;

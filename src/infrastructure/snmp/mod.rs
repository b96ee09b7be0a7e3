//! Minimal SNMP v2c support for polling printer agents.

pub mod client;
pub mod codec;
pub mod oids;

pub use client::UdpSnmpClient;

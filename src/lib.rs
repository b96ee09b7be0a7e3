//! printwatch — monitoring and alerting for fleets of HP network printers.
//!
//! The crate is organized hexagonally: `domain` holds entities, value
//! objects and the port traits; `application` holds the services driving
//! the monitoring pipeline and the scheduler; `infrastructure` provides
//! the concrete adapters (SNMP client, sqlite persistence, notification
//! channels); `presentation` is the CLI.

pub mod application;
pub mod domain;
pub mod infrastructure;
pub mod presentation;

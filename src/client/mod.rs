//! Connection manager and connection strings

mod connection_string;
mod listeners;
mod manager;

pub use connection_string::{ConnectionInfo, HostAddr, Scheme, DEFAULT_PORT};
pub use manager::{ConnectOutcome, ConnectionManager, ConnectionManagerBuilder};

//! Network resources of a universe
//!
//! Provides:
//! - IPv4/IPv6 address cursors
//! - The cancellable port number stream
//! - The virtual switch process the VMs attach to

pub mod ip;
pub mod ports;
pub mod switch;

pub use ip::{AddressCursors, Ipv4Cursor, Ipv6Cursor};
pub use ports::{PortProducer, PortStream, port_stream};
pub use switch::SwitchCommand;

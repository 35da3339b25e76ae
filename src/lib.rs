//! testverse - isolated virtual networks for VM test clusters
//!
//! A [`Universe`] owns a temporary workspace, a virtual switch process and
//! the address and port allocators VMs draw from. It is torn down exactly
//! once, whether by an explicit close, parent cancellation or the switch
//! dying.

pub mod config;
pub mod error;
pub mod network;
pub mod slots;
pub mod tools;
pub mod universe;

pub use config::UniverseConfig;
pub use error::{Error, Result};
pub use universe::{Universe, VmHandle};

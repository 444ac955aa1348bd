//! Address-range request routing.

#![forbid(unsafe_code)]

mod router;
mod table;

pub use router::{AddressRouter, RouterConfig, RouterStats, TargetConfig};
pub use table::{Route, RoutingTable};

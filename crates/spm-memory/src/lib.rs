//! Leaf storage for the scratchpad subsystem.
//!
//! [`MemoryRegion`] is passive: it answers reads and writes and reports how long each one takes.
//! [`TimedRegion`] adds a bandwidth gate and statistics for components that serve requests on a
//! port, and [`SimpleMemory`] is the port-facing wrapper used for main memory and plain SRAM.

#![forbid(unsafe_code)]

mod region;
mod simple;
mod stats;
mod storage;
mod timing;

pub use region::{MemoryConfig, MemoryRegion, TimedRegion};
pub use simple::SimpleMemory;
pub use stats::MemoryStats;
pub use timing::BandwidthGate;

//! Shared building blocks for the scratchpad memory subsystem model.
//!
//! Components exchange [`Request`]s and [`Response`]s through numbered ports. A requester port is
//! bound to exactly one responder port; a responder port may be bound to many requesters. Every
//! state change happens while handling an event delivered by [`System`], and every operation that
//! needs to know the current time or schedule a delivery receives an explicit [`SimContext`].
//!
//! Time is measured in [`Tick`]s of one picosecond.

#![forbid(unsafe_code)]

mod capability;
mod component;
mod context;
mod error;
mod packet;
mod queue;
mod range;
mod system;
mod time;

pub use capability::{DmaInitiator, MmrHost, Readable, Timed, TransferState, Writable};
pub use component::{Component, ComponentId, PortId, PortRef, PortRole};
pub use context::SimContext;
pub use error::{AccessError, ConfigError};
pub use packet::{Command, Request, RequestId, Response};
pub use range::AddressRange;
pub use system::{Completion, System};
pub use time::{gib_per_sec, ns, transfer_ticks, Tick, TICKS_PER_NS, TICKS_PER_SECOND};

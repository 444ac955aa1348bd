use thiserror::Error;

use crate::component::{ComponentId, PortId, PortRole};
use crate::range::AddressRange;

/// Request-level failures.
///
/// These are returned to the issuer inside a [`crate::Response`] and never stop the simulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AccessError {
    /// A CPU write hit a data region that only DMA may write.
    #[error("write to read-only data region at 0x{addr:x}")]
    AccessViolation { addr: u64 },

    /// The access is not fully inside any sub-region of the component.
    #[error("access out of range: addr=0x{addr:x} size={size}")]
    OutOfRange { addr: u64, size: u64 },

    /// No routing table entry contains the address.
    #[error("no route for address 0x{addr:x}")]
    UnroutableAddress { addr: u64 },

    /// A transfer was started while another one is in flight.
    #[error("transfer engine busy")]
    TransferBusy,

    #[error("invalid transfer descriptor: {reason}")]
    InvalidTransferDescriptor { reason: &'static str },

    /// The transfer would run past the end of the target serving its start address.
    #[error("transfer overflows target: addr=0x{addr:x} size={size}")]
    Overflow { addr: u64, size: u64 },

    /// A register was accessed with a width it does not support.
    #[error("invalid access size {size} at 0x{addr:x}")]
    InvalidAccessSize { addr: u64, size: u64 },
}

/// Setup-time failures. These abort system construction before any request is served.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("address range {index} is empty (start=0x{start:x})")]
    EmptyRange { index: usize, start: u64 },

    #[error("address range {index} wraps the address space: start=0x{start:x} size=0x{size:x}")]
    RangeOverflow { index: usize, start: u64, size: u64 },

    #[error("address ranges overlap: {first} and {second}")]
    Overlap {
        first: AddressRange,
        second: AddressRange,
    },

    #[error("invalid {what}: {reason}")]
    InvalidParameter { what: &'static str, reason: String },

    #[error("duplicate target name {0:?}")]
    DuplicateTarget(String),

    #[error("unknown component {0:?}")]
    UnknownComponent(ComponentId),

    #[error("component {component:?} has no port {port:?}")]
    UnknownPort {
        component: ComponentId,
        port: PortId,
    },

    #[error("port {port:?} of component {component:?} is not a {expected:?} port")]
    PortRole {
        component: ComponentId,
        port: PortId,
        expected: PortRole,
    },

    #[error("requester port {port:?} of component {component:?} is already connected")]
    AlreadyConnected {
        component: ComponentId,
        port: PortId,
    },
}

impl ConfigError {
    pub fn invalid(what: &'static str, reason: impl Into<String>) -> Self {
        ConfigError::InvalidParameter {
            what,
            reason: reason.into(),
        }
    }
}

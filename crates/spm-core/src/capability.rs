//! Narrow capability interfaces implemented by concrete components.

use crate::component::PortId;
use crate::context::SimContext;
use crate::error::AccessError;
use crate::range::AddressRange;
use crate::time::Tick;

/// A completed access and the simulated time it takes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Timed<T> {
    pub value: T,
    pub delay: Tick,
}

pub trait Readable {
    fn read(&self, addr: u64, size: u64) -> Result<Timed<Vec<u8>>, AccessError>;
}

pub trait Writable {
    fn write(&mut self, addr: u64, data: &[u8]) -> Result<Timed<()>, AccessError>;
}

/// A device exposing a memory-mapped register block.
///
/// Addresses are absolute; implementations reject accesses outside [`MmrHost::mmr_range`].
pub trait MmrHost {
    fn mmr_range(&self) -> AddressRange;

    fn mmr_read(&self, addr: u64, size: u64) -> Result<u64, AccessError>;

    fn mmr_write(
        &mut self,
        addr: u64,
        size: u64,
        value: u64,
        ctx: &mut SimContext<'_>,
    ) -> Result<(), AccessError>;
}

/// State of a DMA transfer engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransferState {
    #[default]
    Idle,
    Reading,
    Writing,
}

impl TransferState {
    /// Encoding used by the STATUS register.
    pub const fn status_word(self) -> u32 {
        match self {
            TransferState::Idle => 0,
            TransferState::Reading => 1,
            TransferState::Writing => 2,
        }
    }
}

/// A device that issues its own requests on a DMA port.
pub trait DmaInitiator {
    fn dma_port(&self) -> PortId;

    fn transfer_state(&self) -> TransferState;
}

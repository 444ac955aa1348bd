//! Register-programmed DMA for the scratchpad subsystem.
//!
//! Both devices here share one [`DmaController`]: an [`MmrBlock`] register file in front of a
//! [`TransferEngine`] that copies `SIZE` bytes from `SRC_ADDR` to `DST_ADDR` through its DMA port.
//!
//! - [`ScratchpadController`] embeds the controller behind the tail of a scratchpad's address range.
//! - [`Idma`] is the standalone variant, programmed through its own PIO window.

#![forbid(unsafe_code)]

mod controller;
mod engine;
mod idma;
pub mod mmr;
mod scratchpad;

pub use controller::{serve_mmr, DmaController};
pub use engine::{
    EngineConfig, EngineStats, InFlight, TransferDescriptor, TransferEngine, TransferOutcome,
};
pub use idma::{Idma, IdmaConfig};
pub use mmr::{MmrBlock, Register};
pub use scratchpad::{ScratchpadConfig, ScratchpadController};

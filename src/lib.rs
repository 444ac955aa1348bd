//! Scratchpad memory subsystem model.
//!
//! This crate re-exports the workspace crates so a topology can be assembled from one import:
//!
//! - [`spm_core`]: ports, packets, errors and the event kernel.
//! - [`spm_memory`]: memory regions.
//! - [`spm_dma`]: scratchpad controller, transfer engine and the standalone IDMA.
//! - [`spm_xbar`]: address router.

#![forbid(unsafe_code)]

pub use spm_core::*;
pub use spm_dma::*;
pub use spm_memory::*;
pub use spm_xbar::*;

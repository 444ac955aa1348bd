use std::any::Any;

use serde::{Deserialize, Serialize};
use tracing::trace;

use spm_core::{
    AccessError, AddressRange, Component, ConfigError, DmaInitiator, MmrHost, PortId, PortRef,
    PortRole, Request, Response, SimContext, Tick, TransferState,
};

use crate::controller::{serve_mmr, DmaController};
use crate::engine::{EngineConfig, TransferEngine};
use crate::mmr::{MmrBlock, DEFAULT_MMR_LATENCY, MMR_REGISTERS_LEN};

fn default_pio_range() -> AddressRange {
    IdmaConfig::DEFAULT_PIO_RANGE
}

fn default_mmr_latency() -> Tick {
    DEFAULT_MMR_LATENCY
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdmaConfig {
    /// Register window. The registers sit at its start; the rest reads as zero.
    #[serde(default = "default_pio_range")]
    pub pio_range: AddressRange,
    #[serde(default = "default_mmr_latency")]
    pub mmr_latency: Tick,
    #[serde(default)]
    pub engine: EngineConfig,
}

impl IdmaConfig {
    pub const DEFAULT_PIO_RANGE: AddressRange = AddressRange::new(0x9000_0000, 0x1000);

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.pio_range.validate(0)?;
        if self.pio_range.size < MMR_REGISTERS_LEN {
            return Err(ConfigError::invalid(
                "pio_range",
                format!("{} cannot hold the register map", self.pio_range),
            ));
        }
        self.engine.validate()
    }
}

impl Default for IdmaConfig {
    fn default() -> Self {
        Self {
            pio_range: Self::DEFAULT_PIO_RANGE,
            mmr_latency: DEFAULT_MMR_LATENCY,
            engine: EngineConfig::default(),
        }
    }
}

/// Standalone DMA device that copies between any two ranges reachable from its DMA port.
#[derive(Debug)]
pub struct Idma {
    name: String,
    dma: DmaController,
    mmr_latency: Tick,
}

impl Idma {
    pub const PIO_PORT: PortId = PortId(0);
    pub const DMA_PORT: PortId = PortId(1);

    pub fn new(name: impl Into<String>, config: &IdmaConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            name: name.into(),
            dma: DmaController::new(config.pio_range, config.engine, Self::DMA_PORT)?,
            mmr_latency: config.mmr_latency,
        })
    }

    pub fn pio_range(&self) -> AddressRange {
        self.dma.mmr().range()
    }

    pub fn mmr(&self) -> &MmrBlock {
        self.dma.mmr()
    }

    pub fn engine(&self) -> &TransferEngine {
        self.dma.engine()
    }
}

impl MmrHost for Idma {
    fn mmr_range(&self) -> AddressRange {
        self.dma.mmr().range()
    }

    fn mmr_read(&self, addr: u64, size: u64) -> Result<u64, AccessError> {
        self.dma.read_register(addr, size)
    }

    fn mmr_write(
        &mut self,
        addr: u64,
        size: u64,
        value: u64,
        ctx: &mut SimContext<'_>,
    ) -> Result<(), AccessError> {
        self.dma.write_register(addr, size, value, ctx)
    }
}

impl DmaInitiator for Idma {
    fn dma_port(&self) -> PortId {
        Self::DMA_PORT
    }

    fn transfer_state(&self) -> TransferState {
        self.dma.state()
    }
}

impl Component for Idma {
    fn name(&self) -> &str {
        &self.name
    }

    fn port_role(&self, port: PortId) -> Option<PortRole> {
        match port {
            Self::PIO_PORT => Some(PortRole::Responder),
            Self::DMA_PORT => Some(PortRole::Requester),
            _ => None,
        }
    }

    fn addr_ranges(&self, port: PortId) -> Vec<AddressRange> {
        if port == Self::PIO_PORT {
            vec![self.pio_range()]
        } else {
            Vec::new()
        }
    }

    fn recv_request(
        &mut self,
        _port: PortId,
        req: Request,
        reply_to: PortRef,
        ctx: &mut SimContext<'_>,
    ) {
        let resp = serve_mmr(self, &req, ctx);
        trace!(
            idma = %self.name,
            id = req.id.0,
            addr = req.addr,
            write = req.is_write(),
            ok = resp.is_ok(),
            "IDMA register access"
        );
        ctx.respond(reply_to, resp, self.mmr_latency);
    }

    fn recv_response(&mut self, _port: PortId, resp: Response, ctx: &mut SimContext<'_>) {
        self.dma.on_dma_response(resp, ctx);
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

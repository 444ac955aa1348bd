use std::any::Any;

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use spm_core::{
    AccessError, AddressRange, Component, ConfigError, DmaInitiator, MmrHost, PortId, PortRef,
    PortRole, Request, Response, SimContext, Tick, TransferState,
};
use spm_memory::{MemoryConfig, MemoryRegion, MemoryStats, TimedRegion};

use crate::controller::{serve_mmr, DmaController};
use crate::engine::{EngineConfig, TransferEngine};
use crate::mmr::{MmrBlock, DEFAULT_MMR_LATENCY, DEFAULT_MMR_SIZE, MMR_REGISTERS_LEN};

fn default_mmr_size() -> u64 {
    DEFAULT_MMR_SIZE
}

fn default_mmr_latency() -> Tick {
    DEFAULT_MMR_LATENCY
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScratchpadConfig {
    /// Whole address range: data region followed by the register block.
    pub range: AddressRange,
    /// Size of the register block at the end of `range`.
    #[serde(default = "default_mmr_size")]
    pub mmr_size: u64,
    /// Data region access latency.
    #[serde(default)]
    pub latency: Tick,
    /// Data region bandwidth in bytes per second; `0` is unlimited.
    #[serde(default)]
    pub bandwidth: u64,
    #[serde(default = "default_mmr_latency")]
    pub mmr_latency: Tick,
    #[serde(default)]
    pub engine: EngineConfig,
}

impl ScratchpadConfig {
    pub fn new(range: AddressRange) -> Self {
        Self {
            range,
            mmr_size: DEFAULT_MMR_SIZE,
            latency: 0,
            bandwidth: 0,
            mmr_latency: DEFAULT_MMR_LATENCY,
            engine: EngineConfig::default(),
        }
    }

    pub fn with_mmr_size(mut self, mmr_size: u64) -> Self {
        self.mmr_size = mmr_size;
        self
    }

    pub fn with_latency(mut self, latency: Tick) -> Self {
        self.latency = latency;
        self
    }

    pub fn with_bandwidth(mut self, bandwidth: u64) -> Self {
        self.bandwidth = bandwidth;
        self
    }

    pub fn with_engine(mut self, engine: EngineConfig) -> Self {
        self.engine = engine;
        self
    }

    pub fn data_range(&self) -> AddressRange {
        AddressRange::new(self.range.start, self.range.size.saturating_sub(self.mmr_size))
    }

    pub fn mmr_range(&self) -> AddressRange {
        AddressRange::new(self.range.end().saturating_sub(self.mmr_size), self.mmr_size)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.range.validate(0)?;
        if self.mmr_size < MMR_REGISTERS_LEN {
            return Err(ConfigError::invalid(
                "mmr_size",
                format!(
                    "0x{:x} is smaller than the register map (0x{MMR_REGISTERS_LEN:x})",
                    self.mmr_size
                ),
            ));
        }
        if self.mmr_size >= self.range.size {
            return Err(ConfigError::invalid(
                "mmr_size",
                format!(
                    "0x{:x} leaves no data region in {}",
                    self.mmr_size, self.range
                ),
            ));
        }
        self.engine.validate()
    }
}

/// A scratchpad: a data region the CPU may only read, plus a register block that drives an
/// embedded DMA engine.
///
/// Ports:
/// - [`Self::CPU_PORT`]: data region read-only, register block read/write.
/// - [`Self::DMA_PORT`]: requests issued by the embedded engine.
/// - [`Self::FILL_PORT`]: data region read/write. This is how DMA engines write the data region.
#[derive(Debug)]
pub struct ScratchpadController {
    name: String,
    range: AddressRange,
    data: TimedRegion,
    dma: DmaController,
    mmr_latency: Tick,
}

impl ScratchpadController {
    pub const CPU_PORT: PortId = PortId(0);
    pub const DMA_PORT: PortId = PortId(1);
    pub const FILL_PORT: PortId = PortId(2);

    pub fn new(name: impl Into<String>, config: &ScratchpadConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let data = MemoryConfig::new(config.data_range())
            .with_latency(config.latency)
            .with_bandwidth(config.bandwidth);
        Ok(Self {
            name: name.into(),
            range: config.range,
            data: TimedRegion::new(&data)?,
            dma: DmaController::new(config.mmr_range(), config.engine, Self::DMA_PORT)?,
            mmr_latency: config.mmr_latency,
        })
    }

    pub fn range(&self) -> AddressRange {
        self.range
    }

    pub fn data_range(&self) -> AddressRange {
        self.data.region().range()
    }

    pub fn region(&self) -> &MemoryRegion {
        self.data.region()
    }

    /// Direct access to the data region, bypassing timing and the CPU write restriction.
    pub fn region_mut(&mut self) -> &mut MemoryRegion {
        self.data.region_mut()
    }

    pub fn stats(&self) -> &MemoryStats {
        self.data.stats()
    }

    pub fn mmr(&self) -> &MmrBlock {
        self.dma.mmr()
    }

    pub fn engine(&self) -> &TransferEngine {
        self.dma.engine()
    }

    fn serve_cpu(&mut self, req: &Request, ctx: &mut SimContext<'_>) -> (Response, Tick) {
        if self.data_range().contains(req.addr) {
            if req.is_write() {
                debug!(
                    spm = %self.name,
                    addr = req.addr,
                    size = req.size,
                    "CPU write to scratchpad data region rejected"
                );
                let err = AccessError::AccessViolation { addr: req.addr };
                return (Response::error(req.id, err), self.region().latency());
            }
            return self.data.service(ctx.now(), req);
        }
        if self.mmr_range().contains(req.addr) {
            let resp = serve_mmr(self, req, ctx);
            return (resp, self.mmr_latency);
        }
        let err = AccessError::OutOfRange {
            addr: req.addr,
            size: req.size,
        };
        (Response::error(req.id, err), 0)
    }
}

impl MmrHost for ScratchpadController {
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

impl DmaInitiator for ScratchpadController {
    fn dma_port(&self) -> PortId {
        Self::DMA_PORT
    }

    fn transfer_state(&self) -> TransferState {
        self.dma.state()
    }
}

impl Component for ScratchpadController {
    fn name(&self) -> &str {
        &self.name
    }

    fn port_role(&self, port: PortId) -> Option<PortRole> {
        match port {
            Self::CPU_PORT | Self::FILL_PORT => Some(PortRole::Responder),
            Self::DMA_PORT => Some(PortRole::Requester),
            _ => None,
        }
    }

    fn addr_ranges(&self, port: PortId) -> Vec<AddressRange> {
        match port {
            Self::CPU_PORT => vec![self.range],
            Self::FILL_PORT => vec![self.data_range()],
            _ => Vec::new(),
        }
    }

    fn recv_request(
        &mut self,
        port: PortId,
        req: Request,
        reply_to: PortRef,
        ctx: &mut SimContext<'_>,
    ) {
        let (resp, delay) = match port {
            Self::FILL_PORT => self.data.service(ctx.now(), &req),
            _ => self.serve_cpu(&req, ctx),
        };
        trace!(
            spm = %self.name,
            port = port.0,
            id = req.id.0,
            addr = req.addr,
            write = req.is_write(),
            ok = resp.is_ok(),
            delay,
            "scratchpad access"
        );
        ctx.respond(reply_to, resp, delay);
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

use std::any::Any;

use tracing::trace;

use spm_core::{
    AddressRange, Component, ConfigError, PortId, PortRef, PortRole, Request, SimContext,
};

use crate::region::{MemoryConfig, MemoryRegion, TimedRegion};
use crate::stats::MemoryStats;

/// A plain memory behind a single responder port.
///
/// Stands in for main memory or for an SRAM without a register block.
#[derive(Debug)]
pub struct SimpleMemory {
    name: String,
    mem: TimedRegion,
}

impl SimpleMemory {
    pub const PORT: PortId = PortId(0);

    pub fn new(name: impl Into<String>, config: &MemoryConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            name: name.into(),
            mem: TimedRegion::new(config)?,
        })
    }

    pub fn region(&self) -> &MemoryRegion {
        self.mem.region()
    }

    /// Direct access to the contents, bypassing timing. Used to preload and inspect memory.
    pub fn region_mut(&mut self) -> &mut MemoryRegion {
        self.mem.region_mut()
    }

    pub fn stats(&self) -> &MemoryStats {
        self.mem.stats()
    }
}

impl Component for SimpleMemory {
    fn name(&self) -> &str {
        &self.name
    }

    fn port_role(&self, port: PortId) -> Option<PortRole> {
        (port == Self::PORT).then_some(PortRole::Responder)
    }

    fn addr_ranges(&self, port: PortId) -> Vec<AddressRange> {
        if port == Self::PORT {
            vec![self.mem.region().range()]
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
        let (resp, delay) = self.mem.service(ctx.now(), &req);
        trace!(
            memory = %self.name,
            id = req.id.0,
            addr = req.addr,
            size = req.size,
            write = req.is_write(),
            delay,
            "memory access"
        );
        ctx.respond(reply_to, resp, delay);
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

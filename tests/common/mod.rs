#![allow(dead_code)]

use std::sync::Once;

use anyhow::{anyhow, Context, Result};

use spm::mmr::{REG_CMD, REG_DST_ADDR, REG_SIZE, REG_SRC_ADDR, REG_STATUS};
use spm::{
    gib_per_sec, ns, AddressRange, AddressRouter, Completion, ComponentId, DmaInitiator,
    MemoryConfig, PortId, PortRef, RequestId, RouterConfig, ScratchpadConfig,
    ScratchpadController, SimpleMemory, System, Tick,
};

pub const L1_BASE: u64 = 0x8000_0000;
pub const L1_SIZE: u64 = 0x1_0000;
pub const L1_MMR: u64 = L1_BASE + L1_SIZE - 0x100;
pub const L1_DATA: AddressRange = AddressRange::new(L1_BASE, L1_SIZE - 0x100);

pub const L2_BASE: u64 = 0x9000_0000;
pub const L2_SIZE: u64 = 0x10_0000;
pub const L2_BANDWIDTH: u64 = gib_per_sec(16);

pub const DDR_SIZE: u64 = 0x100_0000;

static TRACING: Once = Once::new();

pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_test_writer()
            .try_init();
    });
}

/// Steps `sys` until `done` holds, failing after `max_steps` events.
pub fn wait_for(
    sys: &mut System,
    max_steps: usize,
    mut done: impl FnMut(&System) -> bool,
) -> Result<()> {
    for _ in 0..max_steps {
        if done(sys) {
            return Ok(());
        }
        if !sys.step() {
            break;
        }
    }
    if done(sys) {
        Ok(())
    } else {
        Err(anyhow!("condition not reached by tick {}", sys.now()))
    }
}

/// Runs to quiescence and returns the response to `id`.
pub fn complete(sys: &mut System, id: RequestId) -> Result<Completion> {
    sys.run();
    sys.take_response(id)
        .with_context(|| format!("no response for request {}", id.0))
}

/// A small SoC: the CPU reaches an L1 scratchpad, an L2 SRAM and DDR through `xbar`; the L1's
/// DMA engine reaches the L1 data region (through its fill port), L2 and DDR through `membus`.
pub struct Soc {
    pub sys: System,
    pub l1: ComponentId,
    pub l2: ComponentId,
    pub ddr: ComponentId,
    pub xbar: ComponentId,
    pub membus: ComponentId,
}

impl Soc {
    pub fn build() -> Result<Self> {
        Self::build_with_l1_dma_target(ScratchpadController::FILL_PORT)
    }

    /// Like [`Soc::build`], but `membus` reaches the L1 data region through `l1_port`.
    pub fn build_with_l1_dma_target(l1_port: PortId) -> Result<Self> {
        init_tracing();
        let mut sys = System::new();

        let l1_spm = ScratchpadController::new(
            "l1_spm",
            &ScratchpadConfig::new(AddressRange::new(L1_BASE, L1_SIZE))
                .with_latency(ns(2))
                .with_bandwidth(gib_per_sec(32)),
        )?;
        let l1_dma = l1_spm.dma_port();
        let l1 = sys.add(l1_spm);
        let l2 = sys.add(SimpleMemory::new(
            "l2_spm",
            &MemoryConfig::new(AddressRange::new(L2_BASE, L2_SIZE))
                .with_latency(ns(10))
                .with_bandwidth(L2_BANDWIDTH),
        )?);
        let ddr = sys.add(SimpleMemory::new(
            "ddr",
            &MemoryConfig::new(AddressRange::new(0, DDR_SIZE))
                .with_latency(ns(50))
                .with_bandwidth(gib_per_sec(8)),
        )?);

        let xbar = sys.add(AddressRouter::new(
            "l1_controller",
            &RouterConfig::new()
                .target("L1_SPM", AddressRange::new(L1_BASE, L1_SIZE))
                .target("L2", AddressRange::new(L2_BASE, L2_SIZE))
                .target("DDR", AddressRange::new(0, DDR_SIZE)),
        )?);
        let membus = sys.add(AddressRouter::new(
            "membus",
            &RouterConfig::new()
                .target("L1_DATA", L1_DATA)
                .target("L2", AddressRange::new(L2_BASE, L2_SIZE))
                .target("DDR", AddressRange::new(0, DDR_SIZE)),
        )?);

        sys.connect(
            xbar.port(AddressRouter::mem_side_port(0)),
            l1.port(ScratchpadController::CPU_PORT),
        )?;
        sys.connect(
            xbar.port(AddressRouter::mem_side_port(1)),
            l2.port(SimpleMemory::PORT),
        )?;
        sys.connect(
            xbar.port(AddressRouter::mem_side_port(2)),
            ddr.port(SimpleMemory::PORT),
        )?;
        sys.connect(
            membus.port(AddressRouter::mem_side_port(0)),
            l1.port(l1_port),
        )?;
        sys.connect(
            membus.port(AddressRouter::mem_side_port(1)),
            l2.port(SimpleMemory::PORT),
        )?;
        sys.connect(
            membus.port(AddressRouter::mem_side_port(2)),
            ddr.port(SimpleMemory::PORT),
        )?;
        sys.connect(l1.port(l1_dma), membus.port(AddressRouter::CPU_SIDE))?;

        Ok(Self {
            sys,
            l1,
            l2,
            ddr,
            xbar,
            membus,
        })
    }

    pub fn cpu(&self) -> PortRef {
        self.xbar.port(AddressRouter::CPU_SIDE)
    }

    pub fn l1(&self) -> &ScratchpadController {
        self.sys
            .component(self.l1)
            .expect("l1 is a scratchpad controller")
    }

    pub fn l1_mut(&mut self) -> &mut ScratchpadController {
        self.sys
            .component_mut(self.l1)
            .expect("l1 is a scratchpad controller")
    }

    pub fn memory(&self, id: ComponentId) -> &SimpleMemory {
        self.sys.component(id).expect("not a simple memory")
    }

    pub fn memory_mut(&mut self, id: ComponentId) -> &mut SimpleMemory {
        self.sys.component_mut(id).expect("not a simple memory")
    }

    pub fn status(&self) -> u32 {
        self.l1().mmr().status()
    }

    pub fn read(&mut self, addr: u64, size: u64) -> Result<Completion> {
        let id = self.sys.issue_read(self.cpu(), addr, size);
        complete(&mut self.sys, id)
    }

    pub fn write(&mut self, addr: u64, data: Vec<u8>) -> Result<Completion> {
        let id = self.sys.issue_write(self.cpu(), addr, data);
        complete(&mut self.sys, id)
    }

    pub fn write_reg_u32(&mut self, offset: u64, value: u32) -> Result<Completion> {
        self.write(L1_MMR + offset, value.to_le_bytes().to_vec())
    }

    pub fn write_reg_u64(&mut self, offset: u64, value: u64) -> Result<Completion> {
        self.write(L1_MMR + offset, value.to_le_bytes().to_vec())
    }

    pub fn read_reg_u32(&mut self, offset: u64) -> Result<u32> {
        let done = self.read(L1_MMR + offset, 4)?;
        let data = done
            .response
            .data
            .with_context(|| format!("register read failed: {:?}", done.response.status))?;
        Ok(u32::from_le_bytes(data.as_slice().try_into()?))
    }

    /// Writes `SRC_ADDR`, `DST_ADDR` and `SIZE` of the L1 engine, running each write to completion.
    pub fn program(&mut self, src: u64, dst: u64, size: u32) -> Result<()> {
        for done in [
            self.write_reg_u64(REG_SRC_ADDR, src)?,
            self.write_reg_u64(REG_DST_ADDR, dst)?,
            self.write_reg_u32(REG_SIZE, size)?,
        ] {
            done.response
                .status
                .map_err(|err| anyhow!("register write failed: {err}"))?;
        }
        Ok(())
    }

    /// Issues `CMD = start` without running the simulation.
    pub fn issue_start(&mut self) -> RequestId {
        self.sys
            .issue_write(self.cpu(), L1_MMR + REG_CMD, 1u32.to_le_bytes().to_vec())
    }

    /// Programs and runs a whole transfer, returning its duration.
    pub fn transfer(&mut self, src: u64, dst: u64, size: u32) -> Result<Tick> {
        self.program(src, dst, size)?;
        let id = self.issue_start();
        let done = complete(&mut self.sys, id)?;
        done.response
            .status
            .map_err(|err| anyhow!("start rejected: {err}"))?;
        let status = self.read_reg_u32(REG_STATUS)?;
        if status != 0 {
            return Err(anyhow!("transfer ended with STATUS 0x{status:x}"));
        }
        self.l1()
            .engine()
            .stats()
            .last_duration
            .context("no completed transfer")
    }
}

/// Deterministic test pattern.
pub fn pattern(len: usize, seed: u8) -> Vec<u8> {
    (0..len)
        .map(|i| (i as u8).wrapping_mul(31).wrapping_add(seed))
        .collect()
}

use tracing::{debug, warn};

use spm_core::{
    AccessError, AddressRange, Command, ConfigError, MmrHost, PortId, Request, Response,
    SimContext, TransferState,
};

use crate::engine::{EngineConfig, TransferEngine, TransferOutcome};
use crate::mmr::{status_error, MmrBlock, Register, CMD_START};

/// Register file and transfer engine of one DMA-capable device.
///
/// Register writes are applied one at a time. A rejected `CMD` write leaves the other registers as
/// they were, and `SRC_ADDR`/`DST_ADDR`/`SIZE` stay writable during a transfer because the engine
/// keeps its own copy of the descriptor.
#[derive(Debug)]
pub struct DmaController {
    mmr: MmrBlock,
    engine: TransferEngine,
}

impl DmaController {
    pub fn new(
        mmr_range: AddressRange,
        engine: EngineConfig,
        dma_port: PortId,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            mmr: MmrBlock::new(mmr_range),
            engine: TransferEngine::new(engine, dma_port)?,
        })
    }

    pub fn mmr(&self) -> &MmrBlock {
        &self.mmr
    }

    pub fn engine(&self) -> &TransferEngine {
        &self.engine
    }

    pub fn state(&self) -> TransferState {
        self.engine.state()
    }

    pub fn read_register(&self, addr: u64, size: u64) -> Result<u64, AccessError> {
        self.mmr.read(addr, size)
    }

    pub fn write_register(
        &mut self,
        addr: u64,
        size: u64,
        value: u64,
        ctx: &mut SimContext<'_>,
    ) -> Result<(), AccessError> {
        let Some(reg) = self.mmr.decode(addr, size)? else {
            warn!(
                offset = addr - self.mmr.range().start,
                size, value, "write to unknown DMA register ignored"
            );
            return Ok(());
        };

        match reg {
            Register::Cmd => self.write_cmd(value as u32, ctx),
            Register::Status if self.engine.is_busy() => Err(AccessError::TransferBusy),
            _ => {
                self.mmr.store(reg, size, value);
                Ok(())
            }
        }
    }

    fn write_cmd(&mut self, value: u32, ctx: &mut SimContext<'_>) -> Result<(), AccessError> {
        if value != CMD_START {
            self.mmr.store(Register::Cmd, 4, u64::from(value));
            return Ok(());
        }

        let (src, dst, size) = (
            self.mmr.src_addr(),
            self.mmr.dst_addr(),
            u64::from(self.mmr.size()),
        );
        match self.engine.start(src, dst, size, ctx) {
            Ok(()) => {
                self.mmr.store(Register::Cmd, 4, u64::from(CMD_START));
                self.mmr.set_status(self.engine.state().status_word());
                Ok(())
            }
            Err(AccessError::TransferBusy) => {
                debug!(src, dst, size, "DMA start rejected: engine busy");
                Err(AccessError::TransferBusy)
            }
            Err(err) => {
                debug!(src, dst, size, %err, "DMA start rejected");
                self.mmr.set_status(status_error(&err));
                Err(err)
            }
        }
    }

    /// Feeds a response received on the DMA port to the engine and mirrors the result in `STATUS`.
    pub fn on_dma_response(&mut self, resp: Response, ctx: &mut SimContext<'_>) {
        match self.engine.on_response(resp, ctx) {
            TransferOutcome::Progress => self.mmr.set_status(self.engine.state().status_word()),
            TransferOutcome::Completed { .. } => {
                self.mmr.set_status(TransferState::Idle.status_word())
            }
            TransferOutcome::Aborted(err) => self.mmr.set_status(status_error(&err)),
            TransferOutcome::Ignored => {}
        }
    }
}

/// Services a register access arriving on a port of `host`.
///
/// Register values travel little-endian in the request payload.
pub fn serve_mmr<H: MmrHost>(host: &mut H, req: &Request, ctx: &mut SimContext<'_>) -> Response {
    let outcome = match req.cmd {
        Command::Read => host.mmr_read(req.addr, req.size).and_then(|value| {
            let bytes = value.to_le_bytes();
            usize::try_from(req.size)
                .ok()
                .and_then(|len| bytes.get(..len))
                .map(|b| Some(b.to_vec()))
                .ok_or(AccessError::InvalidAccessSize {
                    addr: req.addr,
                    size: req.size,
                })
        }),
        Command::Write => req.write_payload().and_then(|payload| {
            let mut bytes = [0u8; 8];
            bytes
                .get_mut(..payload.len())
                .ok_or(AccessError::InvalidAccessSize {
                    addr: req.addr,
                    size: req.size,
                })?
                .copy_from_slice(payload);
            host.mmr_write(req.addr, req.size, u64::from_le_bytes(bytes), ctx)
                .map(|()| None)
        }),
    };
    Response::for_request(req, outcome)
}

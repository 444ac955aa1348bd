use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use spm_core::{
    AccessError, AddressRange, ConfigError, PortId, Request, RequestId, Response, SimContext,
    Tick, TransferState,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Largest transfer the staging buffer can hold.
    pub buffer_capacity: u64,
    /// Bytes per DMA request.
    pub chunk_size: u64,
}

impl EngineConfig {
    pub const DEFAULT_BUFFER_CAPACITY: u64 = 1024 * 1024;
    pub const DEFAULT_CHUNK_SIZE: u64 = 64;

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.chunk_size == 0 {
            return Err(ConfigError::invalid("chunk_size", "must be nonzero"));
        }
        if self.chunk_size > self.buffer_capacity {
            return Err(ConfigError::invalid(
                "chunk_size",
                format!(
                    "{} exceeds buffer capacity {}",
                    self.chunk_size, self.buffer_capacity
                ),
            ));
        }
        if usize::try_from(self.buffer_capacity).is_err() {
            return Err(ConfigError::invalid(
                "buffer_capacity",
                format!("{} does not fit in memory", self.buffer_capacity),
            ));
        }
        Ok(())
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            buffer_capacity: Self::DEFAULT_BUFFER_CAPACITY,
            chunk_size: Self::DEFAULT_CHUNK_SIZE,
        }
    }
}

/// The chunk request the engine is waiting on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InFlight {
    pub id: RequestId,
    /// Offset of the chunk within the transfer.
    pub offset: u64,
    pub len: u64,
}

/// A transfer in progress. Exists only while the engine is not idle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferDescriptor {
    pub src: u64,
    pub dst: u64,
    pub total_size: u64,
    /// Bytes completed in the current phase.
    pub bytes_moved: u64,
    pub state: TransferState,
    pub started_at: Tick,
    pub in_flight: Option<InFlight>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngineStats {
    pub completed: u64,
    pub aborted: u64,
    pub bytes_moved: u64,
    pub last_duration: Option<Tick>,
}

/// Result of feeding a DMA response to the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferOutcome {
    /// The chunk was accepted and the next one issued.
    Progress,
    Completed { duration: Tick },
    /// The transfer was dropped. The engine is idle again.
    Aborted(AccessError),
    /// The response did not belong to the in-flight chunk.
    Ignored,
}

/// Copies `SIZE` bytes from `src` to `dst` by reading everything into a staging buffer and then
/// writing it back out, one chunk at a time on a single DMA port.
#[derive(Debug)]
pub struct TransferEngine {
    config: EngineConfig,
    port: PortId,
    buffer: Vec<u8>,
    descriptor: Option<TransferDescriptor>,
    stats: EngineStats,
}

impl TransferEngine {
    pub fn new(config: EngineConfig, port: PortId) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            port,
            buffer: Vec::new(),
            descriptor: None,
            stats: EngineStats::default(),
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn port(&self) -> PortId {
        self.port
    }

    pub fn state(&self) -> TransferState {
        self.descriptor
            .as_ref()
            .map_or(TransferState::Idle, |d| d.state)
    }

    pub fn is_busy(&self) -> bool {
        self.descriptor.is_some()
    }

    pub fn descriptor(&self) -> Option<&TransferDescriptor> {
        self.descriptor.as_ref()
    }

    pub fn stats(&self) -> &EngineStats {
        &self.stats
    }

    /// Checks a transfer against the ranges reachable from the DMA port.
    pub fn validate(
        &self,
        src: u64,
        dst: u64,
        size: u64,
        reachable: &[AddressRange],
    ) -> Result<(), AccessError> {
        if size == 0 {
            return Err(AccessError::InvalidTransferDescriptor {
                reason: "transfer size is zero",
            });
        }
        if size > self.config.buffer_capacity {
            return Err(AccessError::InvalidTransferDescriptor {
                reason: "transfer size exceeds the staging buffer",
            });
        }
        check_target(src, size, reachable)?;
        check_target(dst, size, reachable)
    }

    /// Starts a transfer and issues its first read.
    pub fn start(
        &mut self,
        src: u64,
        dst: u64,
        size: u64,
        ctx: &mut SimContext<'_>,
    ) -> Result<(), AccessError> {
        if self.is_busy() {
            return Err(AccessError::TransferBusy);
        }
        self.validate(src, dst, size, ctx.reachable(self.port))?;
        let len = usize::try_from(size).map_err(|_| AccessError::InvalidTransferDescriptor {
            reason: "transfer size exceeds the staging buffer",
        })?;

        self.buffer.clear();
        self.buffer.resize(len, 0);
        self.descriptor = Some(TransferDescriptor {
            src,
            dst,
            total_size: size,
            bytes_moved: 0,
            state: TransferState::Reading,
            started_at: ctx.now(),
            in_flight: None,
        });
        debug!(src, dst, size, now = ctx.now(), "DMA transfer started");
        self.issue_next(ctx);
        Ok(())
    }

    fn issue_next(&mut self, ctx: &mut SimContext<'_>) {
        let Some(desc) = self.descriptor.as_mut() else {
            return;
        };
        let offset = desc.bytes_moved;
        let len = (desc.total_size - offset).min(self.config.chunk_size);
        let id = ctx.next_request_id();
        let req = match desc.state {
            TransferState::Reading => Request::read(id, desc.src.wrapping_add(offset), len),
            TransferState::Writing => {
                let chunk = &self.buffer[offset as usize..(offset + len) as usize];
                Request::write(id, desc.dst.wrapping_add(offset), chunk.to_vec())
            }
            TransferState::Idle => return,
        };
        desc.in_flight = Some(InFlight { id, offset, len });
        ctx.send_request(self.port, req, 0);
    }

    /// Consumes the response to a chunk request and issues the next chunk.
    pub fn on_response(&mut self, resp: Response, ctx: &mut SimContext<'_>) -> TransferOutcome {
        let Some(desc) = self.descriptor.as_mut() else {
            warn!(id = resp.id.0, "DMA response with no transfer in progress");
            return TransferOutcome::Ignored;
        };
        let Some(chunk) = desc.in_flight.filter(|c| c.id == resp.id) else {
            warn!(id = resp.id.0, "stray DMA response");
            return TransferOutcome::Ignored;
        };
        desc.in_flight = None;

        if let Err(err) = resp.status {
            return self.abort(err);
        }

        match desc.state {
            TransferState::Reading => {
                let data = resp.data.unwrap_or_default();
                if data.len() as u64 != chunk.len {
                    let err = AccessError::InvalidAccessSize {
                        addr: desc.src.wrapping_add(chunk.offset),
                        size: chunk.len,
                    };
                    return self.abort(err);
                }
                let start = chunk.offset as usize;
                self.buffer[start..start + data.len()].copy_from_slice(&data);
                desc.bytes_moved += chunk.len;
                if desc.bytes_moved == desc.total_size {
                    debug!(size = desc.total_size, now = ctx.now(), "DMA read phase done");
                    desc.state = TransferState::Writing;
                    desc.bytes_moved = 0;
                }
            }
            TransferState::Writing => {
                desc.bytes_moved += chunk.len;
                if desc.bytes_moved == desc.total_size {
                    let duration = ctx.now() - desc.started_at;
                    let size = desc.total_size;
                    self.descriptor = None;
                    self.buffer.clear();
                    self.stats.completed += 1;
                    self.stats.bytes_moved += size;
                    self.stats.last_duration = Some(duration);
                    debug!(size, duration, "DMA transfer complete");
                    return TransferOutcome::Completed { duration };
                }
            }
            TransferState::Idle => return TransferOutcome::Ignored,
        }

        self.issue_next(ctx);
        TransferOutcome::Progress
    }

    fn abort(&mut self, err: AccessError) -> TransferOutcome {
        if let Some(desc) = self.descriptor.take() {
            warn!(
                src = desc.src,
                dst = desc.dst,
                size = desc.total_size,
                phase = ?desc.state,
                %err,
                "DMA transfer aborted"
            );
        }
        self.buffer.clear();
        self.stats.aborted += 1;
        TransferOutcome::Aborted(err)
    }
}

fn check_target(addr: u64, size: u64, reachable: &[AddressRange]) -> Result<(), AccessError> {
    match reachable.iter().find(|r| r.contains(addr)) {
        None => Err(AccessError::InvalidTransferDescriptor {
            reason: "address not reachable from the DMA port",
        }),
        Some(range) if !range.contains_span(addr, size) => {
            Err(AccessError::Overflow { addr, size })
        }
        Some(_) => Ok(()),
    }
}

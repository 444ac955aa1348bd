use serde::{Deserialize, Serialize};
use tracing::trace;

use spm_core::{
    transfer_ticks, AccessError, AddressRange, Command, ConfigError, Readable, Request, Response,
    Tick, Timed, Writable,
};

use crate::stats::MemoryStats;
use crate::storage::SparseStorage;
use crate::timing::BandwidthGate;

/// Static parameters of a memory region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryConfig {
    pub range: AddressRange,
    /// Fixed access latency in ticks.
    #[serde(default)]
    pub latency: Tick,
    /// Bytes per second; `0` is unlimited.
    #[serde(default)]
    pub bandwidth: u64,
}

impl MemoryConfig {
    pub const fn new(range: AddressRange) -> Self {
        Self {
            range,
            latency: 0,
            bandwidth: 0,
        }
    }

    pub const fn with_latency(mut self, latency: Tick) -> Self {
        self.latency = latency;
        self
    }

    pub const fn with_bandwidth(mut self, bandwidth: u64) -> Self {
        self.bandwidth = bandwidth;
        self
    }
}

/// Fixed-size byte-addressable storage covering one [`AddressRange`].
///
/// Every access must lie entirely inside the range. The region performs no scheduling: it only
/// reports the delay `latency + size / bandwidth` and leaves it to the caller to apply.
#[derive(Debug, Clone)]
pub struct MemoryRegion {
    range: AddressRange,
    latency: Tick,
    bandwidth: u64,
    storage: SparseStorage,
}

impl MemoryRegion {
    pub fn new(config: &MemoryConfig) -> Result<Self, ConfigError> {
        config.range.validate(0)?;
        Ok(Self {
            range: config.range,
            latency: config.latency,
            bandwidth: config.bandwidth,
            storage: SparseStorage::new(config.range.size)?,
        })
    }

    pub fn range(&self) -> AddressRange {
        self.range
    }

    pub fn latency(&self) -> Tick {
        self.latency
    }

    pub fn bandwidth(&self) -> u64 {
        self.bandwidth
    }

    /// Completion delay for an access of `size` bytes.
    pub fn access_delay(&self, size: u64) -> Tick {
        self.latency
            .saturating_add(transfer_ticks(size, self.bandwidth))
    }

    fn offset_of_span(&self, addr: u64, size: u64) -> Result<u64, AccessError> {
        if !self.range.contains_span(addr, size) {
            return Err(AccessError::OutOfRange { addr, size });
        }
        Ok(addr - self.range.start)
    }

    /// Reads without computing a delay. Used for loading and inspecting contents.
    pub fn read_functional(&self, addr: u64, size: u64) -> Result<Vec<u8>, AccessError> {
        let offset = self.offset_of_span(addr, size)?;
        let len = usize::try_from(size).map_err(|_| AccessError::OutOfRange { addr, size })?;
        let mut buf = vec![0u8; len];
        self.storage
            .read_into(offset, &mut buf)
            .map_err(|_| AccessError::OutOfRange { addr, size })?;
        Ok(buf)
    }

    /// Writes without computing a delay. Used for loading and inspecting contents.
    pub fn write_functional(&mut self, addr: u64, data: &[u8]) -> Result<(), AccessError> {
        let size = data.len() as u64;
        let offset = self.offset_of_span(addr, size)?;
        self.storage
            .write_from(offset, data)
            .map_err(|_| AccessError::OutOfRange { addr, size })
    }
}

impl Readable for MemoryRegion {
    fn read(&self, addr: u64, size: u64) -> Result<Timed<Vec<u8>>, AccessError> {
        let value = self.read_functional(addr, size)?;
        Ok(Timed {
            value,
            delay: self.access_delay(size),
        })
    }
}

impl Writable for MemoryRegion {
    fn write(&mut self, addr: u64, data: &[u8]) -> Result<Timed<()>, AccessError> {
        self.write_functional(addr, data)?;
        Ok(Timed {
            value: (),
            delay: self.access_delay(data.len() as u64),
        })
    }
}

/// A [`MemoryRegion`] serving requests from a port.
///
/// Data transfers are serialised through a [`BandwidthGate`], so the response delay is the queueing
/// time plus the region's own access delay. Failed requests are answered after the fixed latency.
#[derive(Debug, Clone)]
pub struct TimedRegion {
    region: MemoryRegion,
    gate: BandwidthGate,
    stats: MemoryStats,
}

impl TimedRegion {
    pub fn new(config: &MemoryConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            region: MemoryRegion::new(config)?,
            gate: BandwidthGate::new(),
            stats: MemoryStats::default(),
        })
    }

    pub fn region(&self) -> &MemoryRegion {
        &self.region
    }

    pub fn region_mut(&mut self) -> &mut MemoryRegion {
        &mut self.region
    }

    pub fn stats(&self) -> &MemoryStats {
        &self.stats
    }

    pub fn gate(&self) -> &BandwidthGate {
        &self.gate
    }

    /// Performs `req` against the region and returns the response with its delay from `now`.
    pub fn service(&mut self, now: Tick, req: &Request) -> (Response, Tick) {
        let result = match req.cmd {
            Command::Read => self
                .region
                .read(req.addr, req.size)
                .map(|t| (Some(t.value), t.delay)),
            Command::Write => req
                .write_payload()
                .and_then(|data| self.region.write(req.addr, data))
                .map(|t| (None, t.delay)),
        };
        self.stats.record(req, result.is_ok());

        match result {
            Ok((data, access)) => {
                let occupancy = transfer_ticks(req.size, self.region.bandwidth);
                let wait = self.gate.reserve(now, occupancy);
                (Response::for_request(req, Ok(data)), wait.saturating_add(access))
            }
            Err(err) => {
                trace!(id = req.id.0, addr = req.addr, %err, "memory access failed");
                (Response::error(req.id, err), self.region.latency)
            }
        }
    }
}

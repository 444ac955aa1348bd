//! DMA register file.
//!
//! | Offset | Register   | Width        |
//! |--------|------------|--------------|
//! | 0x00   | `SRC_ADDR` | 8 (or low 4) |
//! | 0x08   | `DST_ADDR` | 8 (or low 4) |
//! | 0x10   | `SIZE`     | 4            |
//! | 0x18   | `CMD`      | 4            |
//! | 0x20   | `STATUS`   | 4            |
//!
//! `STATUS` holds the engine state (`0` idle, `1` reading, `2` writing), or [`STATUS_ERROR`] ORed
//! with an error code after a failed start or an aborted transfer.

use tracing::warn;

use spm_core::{AccessError, AddressRange, Tick};

pub const REG_SRC_ADDR: u64 = 0x00;
pub const REG_DST_ADDR: u64 = 0x08;
pub const REG_SIZE: u64 = 0x10;
pub const REG_CMD: u64 = 0x18;
pub const REG_STATUS: u64 = 0x20;

/// Bytes covered by the registers above.
pub const MMR_REGISTERS_LEN: u64 = 0x24;
pub const DEFAULT_MMR_SIZE: u64 = 0x100;
/// Register access latency.
pub const DEFAULT_MMR_LATENCY: Tick = 10;

pub const CMD_START: u32 = 1;
pub const STATUS_ERROR: u32 = 0x8000_0000;

/// Code stored in the low bits of `STATUS` for `err`.
pub const fn error_code(err: &AccessError) -> u32 {
    match err {
        AccessError::OutOfRange { .. } => 1,
        AccessError::AccessViolation { .. } => 2,
        AccessError::UnroutableAddress { .. } => 3,
        AccessError::TransferBusy => 4,
        AccessError::InvalidTransferDescriptor { .. } => 5,
        AccessError::Overflow { .. } => 6,
        AccessError::InvalidAccessSize { .. } => 7,
    }
}

pub const fn status_error(err: &AccessError) -> u32 {
    STATUS_ERROR | error_code(err)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Register {
    SrcAddr,
    DstAddr,
    Size,
    Cmd,
    Status,
}

impl Register {
    pub const fn at(offset: u64) -> Option<Register> {
        match offset {
            REG_SRC_ADDR => Some(Register::SrcAddr),
            REG_DST_ADDR => Some(Register::DstAddr),
            REG_SIZE => Some(Register::Size),
            REG_CMD => Some(Register::Cmd),
            REG_STATUS => Some(Register::Status),
            _ => None,
        }
    }

    pub const fn offset(self) -> u64 {
        match self {
            Register::SrcAddr => REG_SRC_ADDR,
            Register::DstAddr => REG_DST_ADDR,
            Register::Size => REG_SIZE,
            Register::Cmd => REG_CMD,
            Register::Status => REG_STATUS,
        }
    }

    /// Address registers also take 4-byte accesses to their low half.
    pub const fn accepts(self, size: u64) -> bool {
        match self {
            Register::SrcAddr | Register::DstAddr => size == 4 || size == 8,
            Register::Size | Register::Cmd | Register::Status => size == 4,
        }
    }
}

/// Register values of one DMA controller, mapped at `range`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MmrBlock {
    range: AddressRange,
    src_addr: u64,
    dst_addr: u64,
    size: u32,
    cmd: u32,
    status: u32,
}

impl MmrBlock {
    pub fn new(range: AddressRange) -> Self {
        Self {
            range,
            src_addr: 0,
            dst_addr: 0,
            size: 0,
            cmd: 0,
            status: 0,
        }
    }

    pub fn range(&self) -> AddressRange {
        self.range
    }

    pub fn src_addr(&self) -> u64 {
        self.src_addr
    }

    pub fn dst_addr(&self) -> u64 {
        self.dst_addr
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    pub fn cmd(&self) -> u32 {
        self.cmd
    }

    pub fn status(&self) -> u32 {
        self.status
    }

    pub(crate) fn set_status(&mut self, status: u32) {
        self.status = status;
    }

    /// Resolves an access to the register it names.
    ///
    /// `Ok(None)` is an offset inside the block that names no register.
    pub fn decode(&self, addr: u64, size: u64) -> Result<Option<Register>, AccessError> {
        if !self.range.contains_span(addr, size) {
            return Err(AccessError::OutOfRange { addr, size });
        }
        let offset = addr - self.range.start;
        match Register::at(offset) {
            Some(reg) if reg.accepts(size) => Ok(Some(reg)),
            Some(_) => Err(AccessError::InvalidAccessSize { addr, size }),
            None if matches!(size, 1 | 2 | 4 | 8) => Ok(None),
            None => Err(AccessError::InvalidAccessSize { addr, size }),
        }
    }

    pub fn get(&self, reg: Register) -> u64 {
        match reg {
            Register::SrcAddr => self.src_addr,
            Register::DstAddr => self.dst_addr,
            Register::Size => u64::from(self.size),
            Register::Cmd => u64::from(self.cmd),
            Register::Status => u64::from(self.status),
        }
    }

    pub fn read(&self, addr: u64, size: u64) -> Result<u64, AccessError> {
        match self.decode(addr, size)? {
            Some(reg) if size == 4 => Ok(self.get(reg) & 0xFFFF_FFFF),
            Some(reg) => Ok(self.get(reg)),
            None => {
                warn!(offset = addr - self.range.start, size, "read from unknown DMA register");
                Ok(0)
            }
        }
    }

    /// Stores `value` without any side effects. A 4-byte store to an address register replaces its
    /// low half.
    pub(crate) fn store(&mut self, reg: Register, size: u64, value: u64) {
        let merge = |old: u64| {
            if size == 4 {
                (old & 0xFFFF_FFFF_0000_0000) | (value & 0xFFFF_FFFF)
            } else {
                value
            }
        };
        match reg {
            Register::SrcAddr => self.src_addr = merge(self.src_addr),
            Register::DstAddr => self.dst_addr = merge(self.dst_addr),
            Register::Size => self.size = value as u32,
            Register::Cmd => self.cmd = value as u32,
            Register::Status => self.status = value as u32,
        }
    }
}

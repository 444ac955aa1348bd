/// Simulated time. One tick is one picosecond.
pub type Tick = u64;

pub const TICKS_PER_SECOND: u64 = 1_000_000_000_000;
pub const TICKS_PER_NS: Tick = 1_000;

/// Converts nanoseconds to ticks, saturating on overflow.
pub const fn ns(n: u64) -> Tick {
    n.saturating_mul(TICKS_PER_NS)
}

/// Bandwidth in bytes per second for `n` GiB/s.
pub const fn gib_per_sec(n: u64) -> u64 {
    n.saturating_mul(1 << 30)
}

/// Ticks needed to move `bytes` at `bytes_per_second`, rounded up.
///
/// A bandwidth of zero means the link is unlimited and the transfer takes no time.
pub fn transfer_ticks(bytes: u64, bytes_per_second: u64) -> Tick {
    if bytes == 0 || bytes_per_second == 0 {
        return 0;
    }
    let num = u128::from(bytes) * u128::from(TICKS_PER_SECOND);
    let ticks = num.div_ceil(u128::from(bytes_per_second));
    u64::try_from(ticks).unwrap_or(u64::MAX)
}

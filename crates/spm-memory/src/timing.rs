use spm_core::Tick;

/// Serialises data transfers through a single bandwidth-limited resource.
///
/// A transfer that arrives while the resource is busy starts when the previous one ends.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BandwidthGate {
    busy_until: Tick,
}

impl BandwidthGate {
    pub const fn new() -> Self {
        Self { busy_until: 0 }
    }

    /// Books `occupancy` ticks of the resource for a transfer arriving at `now`.
    ///
    /// Returns how long the transfer waits before it starts.
    pub fn reserve(&mut self, now: Tick, occupancy: Tick) -> Tick {
        let start = self.busy_until.max(now);
        self.busy_until = start.saturating_add(occupancy);
        start - now
    }

    pub fn busy_until(&self) -> Tick {
        self.busy_until
    }
}

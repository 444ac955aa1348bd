use spm_core::{AddressRange, ConfigError};

/// One routing table entry: addresses in `range` go to target `target`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Route {
    pub range: AddressRange,
    pub target: usize,
}

/// Immutable set of disjoint address ranges, each mapped to one target.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoutingTable {
    routes: Vec<Route>,
}

impl RoutingTable {
    /// Builds the table, rejecting empty, wrapping and overlapping ranges.
    pub fn new(mut routes: Vec<Route>) -> Result<Self, ConfigError> {
        for (index, route) in routes.iter().enumerate() {
            route.range.validate(index)?;
        }

        routes.sort_by_key(|r| r.range.start);
        if let Some(pair) = routes
            .windows(2)
            .find(|pair| pair[1].range.start < pair[0].range.end())
        {
            return Err(ConfigError::Overlap {
                first: pair[0].range,
                second: pair[1].range,
            });
        }

        Ok(Self { routes })
    }

    /// The route whose range contains `addr`.
    pub fn lookup(&self, addr: u64) -> Option<&Route> {
        // Ranges are sorted and disjoint, so their ends are strictly increasing.
        let idx = self.routes.partition_point(|r| r.range.end() <= addr);
        self.routes.get(idx).filter(|r| r.range.contains(addr))
    }

    /// Routes sorted by start address.
    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    pub fn ranges(&self) -> Vec<AddressRange> {
        self.routes.iter().map(|r| r.range).collect()
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

use std::any::Any;
use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use spm_core::{
    AccessError, AddressRange, Component, ConfigError, PortId, PortRef, PortRole, Request,
    RequestId, Response, SimContext, Tick,
};

use crate::table::{Route, RoutingTable};

/// A downstream target and the address ranges it serves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetConfig {
    pub name: String,
    pub ranges: Vec<AddressRange>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouterConfig {
    /// Targets in port order: target `i` is reached through `AddressRouter::mem_side_port(i)`.
    pub targets: Vec<TargetConfig>,
    #[serde(default)]
    pub forward_latency: Tick,
    #[serde(default)]
    pub response_latency: Tick,
}

impl RouterConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Maps `range` to the target called `name`, adding the target if it is new.
    pub fn target(mut self, name: &str, range: AddressRange) -> Self {
        match self.targets.iter_mut().find(|t| t.name == name) {
            Some(target) => target.ranges.push(range),
            None => self.targets.push(TargetConfig {
                name: name.to_owned(),
                ranges: vec![range],
            }),
        }
        self
    }

    pub fn with_forward_latency(mut self, latency: Tick) -> Self {
        self.forward_latency = latency;
        self
    }

    pub fn with_response_latency(mut self, latency: Tick) -> Self {
        self.response_latency = latency;
        self
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RouterStats {
    pub forwarded: u64,
    /// Requests answered with `UnroutableAddress`.
    pub unroutable: u64,
    pub relayed: u64,
    /// Responses that matched no outstanding request.
    pub stray: u64,
}

#[derive(Debug, Clone, Copy)]
struct Pending {
    reply_to: PortRef,
    target: usize,
    /// Id the requester chose, restored on the relayed response.
    id: RequestId,
}

/// Forwards each request to the single target whose range contains its address and relays the
/// response back to whoever sent the request.
///
/// Any number of requests may be outstanding and responses may come back in any order. Each
/// forwarded request carries a fresh downstream [`RequestId`], so requesters that pick the same id
/// never collide; the relayed response carries the requester's id again.
#[derive(Debug)]
pub struct AddressRouter {
    name: String,
    targets: Vec<String>,
    table: RoutingTable,
    forward_latency: Tick,
    response_latency: Tick,
    pending: HashMap<RequestId, Pending>,
    stats: RouterStats,
}

impl AddressRouter {
    pub const CPU_SIDE: PortId = PortId(0);

    /// Requester port for the `index`-th configured target.
    pub const fn mem_side_port(index: usize) -> PortId {
        PortId(1 + index as u16)
    }

    pub fn new(name: impl Into<String>, config: &RouterConfig) -> Result<Self, ConfigError> {
        if config.targets.len() >= usize::from(u16::MAX) {
            return Err(ConfigError::invalid(
                "targets",
                format!("{} targets exceed the port space", config.targets.len()),
            ));
        }

        let mut seen = HashSet::new();
        let mut routes = Vec::new();
        for (index, target) in config.targets.iter().enumerate() {
            if !seen.insert(target.name.as_str()) {
                return Err(ConfigError::DuplicateTarget(target.name.clone()));
            }
            if target.ranges.is_empty() {
                return Err(ConfigError::invalid(
                    "targets",
                    format!("target {:?} has no address ranges", target.name),
                ));
            }
            routes.extend(target.ranges.iter().map(|&range| Route {
                range,
                target: index,
            }));
        }

        let name = name.into();
        let table = RoutingTable::new(routes)?;
        for route in table.routes() {
            debug!(
                router = %name,
                range = %route.range,
                target = %config.targets[route.target].name,
                "route"
            );
        }

        Ok(Self {
            name,
            targets: config.targets.iter().map(|t| t.name.clone()).collect(),
            table,
            forward_latency: config.forward_latency,
            response_latency: config.response_latency,
            pending: HashMap::new(),
            stats: RouterStats::default(),
        })
    }

    /// Requester port for the target called `name`.
    pub fn port_for(&self, name: &str) -> Option<PortId> {
        self.targets
            .iter()
            .position(|t| t == name)
            .map(Self::mem_side_port)
    }

    /// Name of the target `addr` routes to.
    pub fn route(&self, addr: u64) -> Option<&str> {
        self.table
            .lookup(addr)
            .map(|r| self.targets[r.target].as_str())
    }

    pub fn table(&self) -> &RoutingTable {
        &self.table
    }

    pub fn targets(&self) -> &[String] {
        &self.targets
    }

    pub fn stats(&self) -> &RouterStats {
        &self.stats
    }

    /// Requests forwarded and not yet answered, keyed by downstream id.
    pub fn outstanding(&self) -> usize {
        self.pending.len()
    }
}

impl Component for AddressRouter {
    fn name(&self) -> &str {
        &self.name
    }

    fn port_role(&self, port: PortId) -> Option<PortRole> {
        match usize::from(port.0) {
            0 => Some(PortRole::Responder),
            n if n <= self.targets.len() => Some(PortRole::Requester),
            _ => None,
        }
    }

    fn addr_ranges(&self, port: PortId) -> Vec<AddressRange> {
        if port == Self::CPU_SIDE {
            self.table.ranges()
        } else {
            Vec::new()
        }
    }

    fn recv_request(
        &mut self,
        _port: PortId,
        mut req: Request,
        reply_to: PortRef,
        ctx: &mut SimContext<'_>,
    ) {
        let Some(target) = self.table.lookup(req.addr).map(|r| r.target) else {
            self.stats.unroutable += 1;
            debug!(router = %self.name, id = req.id.0, addr = req.addr, "unroutable request");
            let resp = Response::error(req.id, AccessError::UnroutableAddress { addr: req.addr });
            ctx.respond(reply_to, resp, 0);
            return;
        };

        let downstream = ctx.next_request_id();
        debug!(
            router = %self.name,
            id = req.id.0,
            downstream = downstream.0,
            addr = req.addr,
            target = %self.targets[target],
            "forwarding request"
        );
        self.pending.insert(
            downstream,
            Pending {
                reply_to,
                target,
                id: req.id,
            },
        );
        req.id = downstream;
        self.stats.forwarded += 1;
        ctx.send_request(Self::mem_side_port(target), req, self.forward_latency);
    }

    fn recv_response(&mut self, port: PortId, mut resp: Response, ctx: &mut SimContext<'_>) {
        let Some(pending) = self.pending.remove(&resp.id) else {
            self.stats.stray += 1;
            warn!(router = %self.name, id = resp.id.0, port = port.0, "stray response dropped");
            return;
        };
        if Self::mem_side_port(pending.target) != port {
            warn!(
                router = %self.name,
                id = resp.id.0,
                port = port.0,
                "response arrived from a different target than the request went to"
            );
        }
        self.stats.relayed += 1;
        resp.id = pending.id;
        ctx.respond(pending.reply_to, resp, self.response_latency);
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use spm_core::{ns, System};
    use spm_memory::{MemoryConfig, SimpleMemory};

    fn three_way() -> RouterConfig {
        RouterConfig::new()
            .target("L1_SPM", AddressRange::new(0x8000_0000, 0x1_0000))
            .target("IDMA", AddressRange::new(0x9000_0000, 0x1000))
            .target("DDR", AddressRange::new(0, 0x2000_0000))
    }

    #[test]
    fn routes_by_address() {
        let router = AddressRouter::new("xbar", &three_way()).unwrap();
        assert_eq!(router.route(0x8000_0000), Some("L1_SPM"));
        assert_eq!(router.route(0x9000_0000), Some("IDMA"));
        assert_eq!(router.route(0x1FFF_FFFF), Some("DDR"));
        assert_eq!(router.route(0x2000_0000), None);
        assert_eq!(router.port_for("DDR"), Some(AddressRouter::mem_side_port(2)));
        assert_eq!(router.port_for("L2"), None);
    }

    #[test]
    fn ports_follow_target_order() {
        let router = AddressRouter::new("xbar", &three_way()).unwrap();
        assert_eq!(router.port_role(PortId(0)), Some(PortRole::Responder));
        assert_eq!(router.port_role(PortId(3)), Some(PortRole::Requester));
        assert_eq!(router.port_role(PortId(4)), None);
        assert_eq!(router.addr_ranges(AddressRouter::CPU_SIDE).len(), 3);
    }

    #[test]
    fn overlapping_targets_fail_at_construction() {
        let cfg = three_way().target("ALIAS", AddressRange::new(0x1000_0000, 0x1000));
        assert!(matches!(
            AddressRouter::new("xbar", &cfg),
            Err(ConfigError::Overlap { .. })
        ));
    }

    #[test]
    fn bad_target_lists_are_rejected() {
        let dup = RouterConfig {
            targets: vec![
                TargetConfig {
                    name: "a".into(),
                    ranges: vec![AddressRange::new(0, 0x10)],
                },
                TargetConfig {
                    name: "a".into(),
                    ranges: vec![AddressRange::new(0x10, 0x10)],
                },
            ],
            ..RouterConfig::default()
        };
        assert_eq!(
            AddressRouter::new("xbar", &dup).unwrap_err(),
            ConfigError::DuplicateTarget("a".into())
        );

        let empty = RouterConfig {
            targets: vec![TargetConfig {
                name: "a".into(),
                ranges: vec![],
            }],
            ..RouterConfig::default()
        };
        assert!(matches!(
            AddressRouter::new("xbar", &empty),
            Err(ConfigError::InvalidParameter { .. })
        ));
    }

    #[test]
    fn builder_merges_ranges_per_target() {
        let cfg = RouterConfig::new()
            .target("ddr", AddressRange::new(0, 0x1000))
            .target("ddr", AddressRange::new(0x4000, 0x1000));
        assert_eq!(cfg.targets.len(), 1);
        let router = AddressRouter::new("xbar", &cfg).unwrap();
        assert_eq!(router.route(0x4800), Some("ddr"));
        assert_eq!(router.route(0x2000), None);
    }

    #[test]
    fn relays_out_of_order_responses() {
        let mut sys = System::new();
        let cfg = RouterConfig::new()
            .target("slow", AddressRange::new(0, 0x1000))
            .target("fast", AddressRange::new(0x1000, 0x1000))
            .with_forward_latency(ns(1))
            .with_response_latency(ns(1));
        let router = sys.add(AddressRouter::new("xbar", &cfg).unwrap());
        let slow = sys.add(
            SimpleMemory::new(
                "slow",
                &MemoryConfig::new(AddressRange::new(0, 0x1000)).with_latency(ns(100)),
            )
            .unwrap(),
        );
        let fast = sys.add(
            SimpleMemory::new(
                "fast",
                &MemoryConfig::new(AddressRange::new(0x1000, 0x1000)).with_latency(ns(10)),
            )
            .unwrap(),
        );
        sys.connect(
            router.port(AddressRouter::mem_side_port(0)),
            slow.port(SimpleMemory::PORT),
        )
        .unwrap();
        sys.connect(
            router.port(AddressRouter::mem_side_port(1)),
            fast.port(SimpleMemory::PORT),
        )
        .unwrap();

        let cpu = router.port(AddressRouter::CPU_SIDE);
        sys.component_mut::<SimpleMemory>(slow)
            .unwrap()
            .region_mut()
            .write_functional(0x10, &[1; 4])
            .unwrap();
        sys.component_mut::<SimpleMemory>(fast)
            .unwrap()
            .region_mut()
            .write_functional(0x1010, &[2; 4])
            .unwrap();

        let a = sys.issue_read(cpu, 0x10, 4);
        let b = sys.issue_read(cpu, 0x1010, 4);
        sys.run_until(ns(1));
        assert_eq!(
            sys.component::<AddressRouter>(router).unwrap().outstanding(),
            2
        );
        sys.run();

        let a = sys.take_response(a).unwrap();
        let b = sys.take_response(b).unwrap();
        assert_eq!(a.response.data, Some(vec![1; 4]));
        assert_eq!(b.response.data, Some(vec![2; 4]));
        assert_eq!(a.at, ns(102));
        assert_eq!(b.at, ns(12));

        let stats = *sys.component::<AddressRouter>(router).unwrap().stats();
        assert_eq!(stats.forwarded, 2);
        assert_eq!(stats.relayed, 2);
        assert_eq!(
            sys.component::<AddressRouter>(router).unwrap().outstanding(),
            0
        );
    }

    /// Forwards each request it receives on port 0 out of port 1 under a fixed id, then answers
    /// the original with whatever came back.
    #[derive(Debug)]
    struct FixedIdClient {
        name: &'static str,
        waiting: Option<(RequestId, PortRef)>,
        seen: Vec<RequestId>,
    }

    impl FixedIdClient {
        const ID: RequestId = RequestId(42);

        fn new(name: &'static str) -> Self {
            Self {
                name,
                waiting: None,
                seen: Vec::new(),
            }
        }
    }

    impl Component for FixedIdClient {
        fn name(&self) -> &str {
            self.name
        }

        fn port_role(&self, port: PortId) -> Option<PortRole> {
            match port.0 {
                0 => Some(PortRole::Responder),
                1 => Some(PortRole::Requester),
                _ => None,
            }
        }

        fn recv_request(
            &mut self,
            _port: PortId,
            req: Request,
            reply_to: PortRef,
            ctx: &mut SimContext<'_>,
        ) {
            self.waiting = Some((req.id, reply_to));
            ctx.send_request(PortId(1), Request::read(Self::ID, req.addr, req.size), 0);
        }

        fn recv_response(&mut self, _port: PortId, mut resp: Response, ctx: &mut SimContext<'_>) {
            self.seen.push(resp.id);
            let (id, reply_to) = self.waiting.take().unwrap();
            resp.id = id;
            ctx.respond(reply_to, resp, 0);
        }

        fn as_any(&self) -> &dyn Any {
            self
        }

        fn as_any_mut(&mut self) -> &mut dyn Any {
            self
        }
    }

    #[test]
    fn requesters_may_reuse_each_others_ids() {
        let mut sys = System::new();
        let cfg = RouterConfig::new()
            .target("slow", AddressRange::new(0, 0x1000))
            .target("fast", AddressRange::new(0x1000, 0x1000));
        let router = sys.add(AddressRouter::new("xbar", &cfg).unwrap());
        let slow = sys.add(
            SimpleMemory::new(
                "slow",
                &MemoryConfig::new(AddressRange::new(0, 0x1000)).with_latency(ns(100)),
            )
            .unwrap(),
        );
        let fast = sys.add(
            SimpleMemory::new(
                "fast",
                &MemoryConfig::new(AddressRange::new(0x1000, 0x1000)).with_latency(ns(10)),
            )
            .unwrap(),
        );
        let a = sys.add(FixedIdClient::new("a"));
        let b = sys.add(FixedIdClient::new("b"));
        for (index, mem) in [slow, fast].into_iter().enumerate() {
            sys.connect(
                router.port(AddressRouter::mem_side_port(index)),
                mem.port(SimpleMemory::PORT),
            )
            .unwrap();
        }
        sys.connect(a.port(PortId(1)), router.port(AddressRouter::CPU_SIDE))
            .unwrap();
        sys.connect(b.port(PortId(1)), router.port(AddressRouter::CPU_SIDE))
            .unwrap();

        sys.component_mut::<SimpleMemory>(slow)
            .unwrap()
            .region_mut()
            .write_functional(0x20, &[0xA1; 4])
            .unwrap();
        sys.component_mut::<SimpleMemory>(fast)
            .unwrap()
            .region_mut()
            .write_functional(0x1020, &[0xB2; 4])
            .unwrap();

        // Both clients send id 42 through the router at the same tick.
        let from_a = sys.issue_read(a.port(PortId(0)), 0x20, 4);
        let from_b = sys.issue_read(b.port(PortId(0)), 0x1020, 4);
        sys.run_until(0);
        assert_eq!(
            sys.component::<AddressRouter>(router).unwrap().outstanding(),
            2
        );
        sys.run();

        let from_a = sys.take_response(from_a).unwrap();
        let from_b = sys.take_response(from_b).unwrap();
        assert_eq!(from_a.response.data, Some(vec![0xA1; 4]));
        assert_eq!(from_b.response.data, Some(vec![0xB2; 4]));
        assert_eq!(from_a.at, ns(100));
        assert_eq!(from_b.at, ns(10));

        // Each client got its own id back.
        for client in [a, b] {
            let client = sys.component::<FixedIdClient>(client).unwrap();
            assert_eq!(client.seen, vec![FixedIdClient::ID]);
        }
        let router = sys.component::<AddressRouter>(router).unwrap();
        assert_eq!(router.stats().relayed, 2);
        assert_eq!(router.stats().stray, 0);
        assert_eq!(router.outstanding(), 0);
    }

    #[test]
    fn unroutable_requests_are_answered_immediately() {
        let mut sys = System::new();
        let router = sys.add(
            AddressRouter::new("xbar", &three_way().with_forward_latency(ns(5))).unwrap(),
        );
        let id = sys.issue_write(router.port(AddressRouter::CPU_SIDE), 0x2000_0000, vec![0; 4]);
        sys.run();

        let done = sys.take_response(id).unwrap();
        assert_eq!(done.at, 0);
        assert_eq!(
            done.response.error_kind(),
            Some(AccessError::UnroutableAddress { addr: 0x2000_0000 })
        );
        assert_eq!(
            sys.component::<AddressRouter>(router).unwrap().stats().unroutable,
            1
        );
    }

    #[test]
    fn config_from_json() {
        let cfg: RouterConfig = serde_json::from_str(
            r#"{
                "targets": [
                    { "name": "spm", "ranges": [{ "start": 2147483648, "size": 65536 }] },
                    { "name": "ddr", "ranges": [{ "start": 0, "size": 536870912 }] }
                ],
                "forward_latency": 500
            }"#,
        )
        .unwrap();
        assert_eq!(cfg.response_latency, 0);
        let router = AddressRouter::new("xbar", &cfg).unwrap();
        assert_eq!(router.route(0x8000_0010), Some("spm"));
    }
}

use std::collections::HashMap;

use tracing::{debug, trace, warn};

use crate::component::{Component, ComponentId, PortId, PortRef, PortRole};
use crate::context::SimContext;
use crate::error::ConfigError;
use crate::packet::{Request, RequestId, Response};
use crate::queue::{Delivery, EventQueue};
use crate::range::AddressRange;
use crate::time::Tick;

/// Requester → responder bindings, fixed once the system is assembled.
#[derive(Debug, Default)]
pub(crate) struct Links {
    peers: HashMap<PortRef, PortRef>,
    reachable: HashMap<PortRef, Vec<AddressRange>>,
}

impl Links {
    pub(crate) fn peer(&self, requester: PortRef) -> Option<PortRef> {
        self.peers.get(&requester).copied()
    }

    pub(crate) fn reachable(&self, requester: PortRef) -> &[AddressRange] {
        self.reachable
            .get(&requester)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

/// A response delivered to the host requester.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    pub at: Tick,
    pub response: Response,
}

/// Minimal discrete-event kernel: owns the components, their port bindings and the event queue.
///
/// Requests injected with [`System::issue`] come from the host requester; their responses are
/// collected and can be picked up with [`System::take_response`].
pub struct System {
    components: Vec<Box<dyn Component>>,
    links: Links,
    queue: EventQueue,
    now: Tick,
    next_id: u64,
    completed: HashMap<RequestId, Completion>,
}

impl System {
    pub fn new() -> Self {
        Self {
            components: Vec::new(),
            links: Links::default(),
            queue: EventQueue::default(),
            now: 0,
            next_id: 1,
            completed: HashMap::new(),
        }
    }

    pub fn add<C: Component>(&mut self, component: C) -> ComponentId {
        let id = ComponentId(self.components.len());
        debug!(name = component.name(), index = id.0, "adding component");
        self.components.push(Box::new(component));
        id
    }

    /// Binds requester port `requester` to responder port `responder`.
    ///
    /// The responder's address ranges become the ranges reachable from `requester`.
    pub fn connect(&mut self, requester: PortRef, responder: PortRef) -> Result<(), ConfigError> {
        self.expect_role(requester, PortRole::Requester)?;
        self.expect_role(responder, PortRole::Responder)?;
        if self.links.peers.contains_key(&requester) {
            return Err(ConfigError::AlreadyConnected {
                component: requester.component,
                port: requester.port,
            });
        }

        let ranges = self.components[responder.component.0].addr_ranges(responder.port);
        debug!(
            from = self.components[requester.component.0].name(),
            to = self.components[responder.component.0].name(),
            ranges = ranges.len(),
            "connecting ports"
        );
        self.links.peers.insert(requester, responder);
        self.links.reachable.insert(requester, ranges);
        Ok(())
    }

    fn expect_role(&self, port: PortRef, expected: PortRole) -> Result<(), ConfigError> {
        let component = self
            .components
            .get(port.component.0)
            .ok_or(ConfigError::UnknownComponent(port.component))?;
        match component.port_role(port.port) {
            Some(role) if role == expected => Ok(()),
            Some(_) => Err(ConfigError::PortRole {
                component: port.component,
                port: port.port,
                expected,
            }),
            None => Err(ConfigError::UnknownPort {
                component: port.component,
                port: port.port,
            }),
        }
    }

    pub fn now(&self) -> Tick {
        self.now
    }

    pub fn next_request_id(&mut self) -> RequestId {
        let id = RequestId(self.next_id);
        self.next_id += 1;
        id
    }

    /// Injects `req` from the host requester into responder port `target` at the current tick.
    pub fn issue(&mut self, target: PortRef, req: Request) -> RequestId {
        let id = req.id;
        self.queue.push(
            self.now,
            Delivery::Request {
                to: target,
                req,
                reply_to: PortRef::HOST,
            },
        );
        id
    }

    pub fn issue_read(&mut self, target: PortRef, addr: u64, size: u64) -> RequestId {
        let id = self.next_request_id();
        self.issue(target, Request::read(id, addr, size))
    }

    pub fn issue_write(&mut self, target: PortRef, addr: u64, data: Vec<u8>) -> RequestId {
        let id = self.next_request_id();
        self.issue(target, Request::write(id, addr, data))
    }

    /// Dispatches the next event. Returns `false` once the queue is empty.
    pub fn step(&mut self) -> bool {
        let Some((when, delivery)) = self.queue.pop() else {
            return false;
        };
        debug_assert!(when >= self.now, "event scheduled in the past");
        self.now = when;
        self.dispatch(delivery);
        true
    }

    /// Runs until no events remain and returns the final time.
    pub fn run(&mut self) -> Tick {
        while self.step() {}
        self.now
    }

    /// Runs every event scheduled at or before `deadline`, then advances time to `deadline`.
    pub fn run_until(&mut self, deadline: Tick) {
        while self.queue.peek_time().is_some_and(|t| t <= deadline) {
            self.step();
        }
        self.now = self.now.max(deadline);
    }

    pub fn pending_events(&self) -> usize {
        self.queue.len()
    }

    pub fn take_response(&mut self, id: RequestId) -> Option<Completion> {
        self.completed.remove(&id)
    }

    pub fn name(&self, id: ComponentId) -> Option<&str> {
        self.components.get(id.0).map(|c| c.name())
    }

    pub fn component<C: Component>(&self, id: ComponentId) -> Option<&C> {
        self.components.get(id.0)?.as_any().downcast_ref()
    }

    pub fn component_mut<C: Component>(&mut self, id: ComponentId) -> Option<&mut C> {
        self.components.get_mut(id.0)?.as_any_mut().downcast_mut()
    }

    fn dispatch(&mut self, delivery: Delivery) {
        let (to, is_request) = match &delivery {
            Delivery::Request { to, .. } => (*to, true),
            Delivery::Response { to, .. } => (*to, false),
        };

        if to.component == ComponentId::HOST {
            match delivery {
                Delivery::Response { resp, .. } => {
                    trace!(now = self.now, id = resp.id.0, ok = resp.is_ok(), "host response");
                    self.completed.insert(
                        resp.id,
                        Completion {
                            at: self.now,
                            response: resp,
                        },
                    );
                }
                Delivery::Request { req, .. } => {
                    warn!(id = req.id.0, "request addressed to the host dropped");
                }
            }
            return;
        }

        let Some(component) = self.components.get_mut(to.component.0) else {
            warn!(?to, "delivery to unknown component dropped");
            return;
        };
        trace!(
            now = self.now,
            component = component.name(),
            port = to.port.0,
            is_request,
            "dispatch"
        );

        let mut ctx = SimContext::new(
            self.now,
            to.component,
            &mut self.queue,
            &self.links,
            &mut self.next_id,
        );
        match delivery {
            Delivery::Request { req, reply_to, .. } => {
                component.recv_request(to.port, req, reply_to, &mut ctx)
            }
            Delivery::Response { resp, .. } => component.recv_response(to.port, resp, &mut ctx),
        }
    }
}

impl Default for System {
    fn default() -> Self {
        Self::new()
    }
}

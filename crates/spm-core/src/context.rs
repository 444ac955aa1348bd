use crate::component::{ComponentId, PortId, PortRef};
use crate::error::AccessError;
use crate::packet::{Request, RequestId, Response};
use crate::queue::{Delivery, EventQueue};
use crate::range::AddressRange;
use crate::system::Links;
use crate::time::Tick;

/// Scheduling context handed to a component while it handles an event.
///
/// Carries the current time and the handle used to schedule future deliveries. Components never
/// read time from anywhere else.
pub struct SimContext<'a> {
    now: Tick,
    component: ComponentId,
    queue: &'a mut EventQueue,
    links: &'a Links,
    next_id: &'a mut u64,
}

impl<'a> SimContext<'a> {
    pub(crate) fn new(
        now: Tick,
        component: ComponentId,
        queue: &'a mut EventQueue,
        links: &'a Links,
        next_id: &'a mut u64,
    ) -> Self {
        Self {
            now,
            component,
            queue,
            links,
            next_id,
        }
    }

    pub fn now(&self) -> Tick {
        self.now
    }

    /// The component currently handling the event.
    pub fn component(&self) -> ComponentId {
        self.component
    }

    pub fn next_request_id(&mut self) -> RequestId {
        let id = RequestId(*self.next_id);
        *self.next_id += 1;
        id
    }

    /// Sends `req` out of requester `port`, arriving at the bound responder after `delay`.
    ///
    /// If the port is not bound, the request bounces back as `UnroutableAddress`.
    pub fn send_request(&mut self, port: PortId, req: Request, delay: Tick) {
        let from = PortRef::new(self.component, port);
        let when = self.now.saturating_add(delay);
        match self.links.peer(from) {
            Some(to) => self.queue.push(
                when,
                Delivery::Request {
                    to,
                    req,
                    reply_to: from,
                },
            ),
            None => {
                tracing::warn!(?from, addr = req.addr, "request sent on unbound port");
                let resp = Response::error(req.id, AccessError::UnroutableAddress { addr: req.addr });
                self.queue.push(when, Delivery::Response { to: from, resp });
            }
        }
    }

    /// Delivers `resp` to the requester port `reply_to` after `delay`.
    pub fn respond(&mut self, reply_to: PortRef, resp: Response, delay: Tick) {
        self.queue.push(
            self.now.saturating_add(delay),
            Delivery::Response { to: reply_to, resp },
        );
    }

    /// Address ranges served by whatever is bound to requester `port`.
    pub fn reachable(&self, port: PortId) -> &[AddressRange] {
        self.links.reachable(PortRef::new(self.component, port))
    }
}

use std::any::Any;

use crate::context::SimContext;
use crate::packet::{Request, Response};
use crate::range::AddressRange;

/// Handle to a component owned by a [`crate::System`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ComponentId(pub(crate) usize);

impl ComponentId {
    /// The external requester that injects requests with [`crate::System::issue`].
    pub const HOST: ComponentId = ComponentId(usize::MAX);

    pub const fn index(self) -> usize {
        self.0
    }

    pub const fn port(self, port: PortId) -> PortRef {
        PortRef {
            component: self,
            port,
        }
    }
}

/// Component-local port number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PortId(pub u16);

/// A port on a specific component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PortRef {
    pub component: ComponentId,
    pub port: PortId,
}

impl PortRef {
    pub const HOST: PortRef = PortRef {
        component: ComponentId::HOST,
        port: PortId(0),
    };

    pub const fn new(component: ComponentId, port: PortId) -> Self {
        Self { component, port }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortRole {
    /// Issues requests and receives responses.
    Requester,
    /// Receives requests and sends responses.
    Responder,
}

/// A simulated device attached to the [`crate::System`].
///
/// Handlers run to completion; anything that takes simulated time is expressed by scheduling a
/// delivery through the [`SimContext`].
pub trait Component: Any {
    fn name(&self) -> &str;

    /// Role of `port`, or `None` if the component has no such port.
    fn port_role(&self, port: PortId) -> Option<PortRole>;

    /// Address ranges served on responder `port`.
    fn addr_ranges(&self, _port: PortId) -> Vec<AddressRange> {
        Vec::new()
    }

    /// Handles a request arriving on responder `port`. The response must be sent to `reply_to`.
    fn recv_request(
        &mut self,
        port: PortId,
        req: Request,
        reply_to: PortRef,
        ctx: &mut SimContext<'_>,
    );

    /// Handles a response arriving on requester `port`.
    fn recv_response(&mut self, port: PortId, resp: Response, _ctx: &mut SimContext<'_>) {
        tracing::warn!(
            component = self.name(),
            ?port,
            id = resp.id.0,
            "dropping response on component without requester ports"
        );
    }

    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

pub mod abx;
pub mod dhcp_proxy;
pub mod hairpin;
pub mod hairpin_xconnect;
pub mod isisx;
pub mod socket;
pub mod span;

use std::collections::HashMap;
use std::sync::Arc;

use crate::api::InterfaceIndex;
use crate::error::{Error, Result};
use crate::link::InterconnectReq;
use crate::punt::{
    Interconnect, InterconnectInterface, PuntId, PuntRequest, PuntType,
    find_interconnect,
};
use crate::southbound::{ChangeRequest, ConfigItem, Dependency};

// Translation of one type of punt requests into dataplane configuration.
pub trait PuntHandler: std::fmt::Debug + Send {
    // Returns the interconnects required between VPP and the CNF.
    fn interconnect_reqs(&self, request: &PuntRequest) -> Vec<InterconnectReq>;

    // Returns the dependencies that must be satisfied before the punt can be
    // realized.
    fn punt_dependencies(&self, request: &PuntRequest) -> Vec<Dependency>;

    // Whether the interconnects of this punt type may be shared by several
    // punts.
    fn can_multiplex(&self) -> bool;

    // Adds (or retracts) the VPP-side configuration of the punt.
    //
    // Retracting the same punt twice is harmless.
    fn configure_punt(
        &mut self,
        txn: &mut ChangeRequest,
        id: &PuntId,
        request: &PuntRequest,
        interconnects: &[Interconnect],
        remove: bool,
    ) -> Result<()>;
}

pub type Handlers = HashMap<PuntType, Box<dyn PuntHandler>>;

// ===== global functions =====

// Builds the handlers of all supported punt types.
pub fn handlers(if_index: Arc<dyn InterfaceIndex>) -> Handlers {
    let mut handlers: Handlers = HashMap::new();
    handlers.insert(PuntType::Hairpin, Box::new(hairpin::HairpinHandler));
    handlers.insert(
        PuntType::HairpinXConnect,
        Box::new(hairpin_xconnect::HairpinXConnectHandler),
    );
    handlers.insert(PuntType::Span, Box::new(span::SpanHandler));
    handlers.insert(PuntType::Abx, Box::new(abx::AbxHandler::new(if_index)));
    handlers.insert(PuntType::Isisx, Box::new(isisx::IsisxHandler::default()));
    handlers.insert(PuntType::DhcpProxy, Box::new(dhcp_proxy::DhcpProxyHandler));
    handlers.insert(PuntType::PuntToSocket, Box::new(socket::SocketHandler));
    handlers
}

// ===== helper functions =====

// Returns the VPP end of the interconnect requested with the given selector.
fn vpp_end<'a>(
    interconnects: &'a [Interconnect],
    vpp_selector: &str,
) -> Result<&'a InterconnectInterface> {
    find_interconnect(interconnects, vpp_selector)
        .and_then(Interconnect::vpp_interface)
        .ok_or_else(|| Error::MissingInterconnect(vpp_selector.to_owned()))
}

// Adds or retracts the given items.
fn apply(
    txn: &mut ChangeRequest,
    items: impl IntoIterator<Item = ConfigItem>,
    remove: bool,
) {
    for item in items {
        if remove {
            txn.delete(item);
        } else {
            txn.update(item);
        }
    }
}

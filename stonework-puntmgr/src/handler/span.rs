//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use crate::error::{Error, Result};
use crate::handler::{PuntHandler, apply, vpp_end};
use crate::link::{InterconnectReq, InterfaceLink, Link, span_interface_selector};
use crate::punt::{Interconnect, PuntConfig, PuntId, PuntRequest};
use crate::southbound::{
    ChangeRequest, Dependency, Span, SpanDirection, vpp_interface_key,
};

// Mirrors the traffic of a VPP interface into the CNF.
#[derive(Debug)]
pub struct SpanHandler;

// ===== impl SpanHandler =====

impl PuntHandler for SpanHandler {
    fn interconnect_reqs(&self, request: &PuntRequest) -> Vec<InterconnectReq> {
        let PuntConfig::Span { vpp_interface } = &request.config else {
            return vec![];
        };

        vec![InterconnectReq::new(
            Link::Interface(InterfaceLink::default()),
            span_interface_selector(vpp_interface),
        )]
    }

    fn punt_dependencies(&self, request: &PuntRequest) -> Vec<Dependency> {
        let PuntConfig::Span { vpp_interface } = &request.config else {
            return vec![];
        };

        vec![Dependency::key(
            format!("{}-span-{}", request.label, vpp_interface),
            vpp_interface_key(vpp_interface),
        )]
    }

    fn can_multiplex(&self) -> bool {
        true
    }

    fn configure_punt(
        &mut self,
        txn: &mut ChangeRequest,
        _id: &PuntId,
        request: &PuntRequest,
        interconnects: &[Interconnect],
        remove: bool,
    ) -> Result<()> {
        let PuntConfig::Span { vpp_interface } = &request.config else {
            return Err(Error::UnsupportedPuntType(request.punt_type()));
        };
        let selector = span_interface_selector(vpp_interface);
        let ic_iface = vpp_end(interconnects, &selector)?;

        // The mirror is owned by whichever SPAN punt uses the interconnect
        // alone.
        if interconnects
            .iter()
            .any(|ic| ic.id.vpp_selector == selector && ic.shared)
        {
            return Ok(());
        }

        let span = Span {
            interface_from: vpp_interface.clone(),
            interface_to: ic_iface.name.clone(),
            direction: SpanDirection::Both,
        };
        apply(txn, [span.into()], remove);

        Ok(())
    }
}

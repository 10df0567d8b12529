//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use stonework_utils::ip::AddressFamily;

use crate::error::{Error, Result};
use crate::handler::{PuntHandler, apply};
use crate::link::{InterconnectReq, InterfaceLink, Link, vrf_selector};
use crate::punt::{
    Interconnect, InterconnectInterface, PuntConfig, PuntId, PuntRequest,
    find_interconnect,
};
use crate::southbound::{
    ChangeRequest, Dependency, DhcpProxy, DhcpServer, vrf_table_key,
};

// Relays the DHCP requests received in a VRF to a server running in the CNF.
#[derive(Debug)]
pub struct DhcpProxyHandler;

// ===== impl DhcpProxyHandler =====

impl PuntHandler for DhcpProxyHandler {
    fn interconnect_reqs(&self, request: &PuntRequest) -> Vec<InterconnectReq> {
        let PuntConfig::DhcpProxy {
            vrf,
            without_cnf_vrf,
        } = &request.config
        else {
            return vec![];
        };

        vec![InterconnectReq::new(
            Link::Interface(InterfaceLink {
                vrf: *vrf,
                without_cnf_vrf: *without_cnf_vrf,
                allocate_subnet: true,
                ..Default::default()
            }),
            vrf_selector(*vrf),
        )]
    }

    fn punt_dependencies(&self, request: &PuntRequest) -> Vec<Dependency> {
        let PuntConfig::DhcpProxy { vrf, .. } = &request.config else {
            return vec![];
        };

        if *vrf == 0 {
            return vec![];
        }
        vec![Dependency::key(
            format!("{}-dhcp-proxy-vrf-{}", request.label, vrf),
            vrf_table_key(*vrf, AddressFamily::Ipv4),
        )]
    }

    fn can_multiplex(&self) -> bool {
        false
    }

    fn configure_punt(
        &mut self,
        txn: &mut ChangeRequest,
        _id: &PuntId,
        request: &PuntRequest,
        interconnects: &[Interconnect],
        remove: bool,
    ) -> Result<()> {
        let PuntConfig::DhcpProxy { vrf, .. } = &request.config else {
            return Err(Error::UnsupportedPuntType(request.punt_type()));
        };
        let selector = vrf_selector(*vrf);
        let ic = find_interconnect(interconnects, &selector)
            .ok_or_else(|| Error::MissingInterconnect(selector.clone()))?;
        let (Some(vpp), Some(cnf)) = (ic.vpp_interface(), ic.cnf_interface())
        else {
            return Err(Error::MissingInterconnect(selector));
        };

        let proxy = DhcpProxy {
            rx_vrf_id: *vrf,
            source_ip_address: first_address(vpp)?,
            servers: vec![DhcpServer {
                vrf_id: *vrf,
                ip_address: first_address(cnf)?,
            }],
        };
        apply(txn, [proxy.into()], remove);

        Ok(())
    }
}

// ===== helper functions =====

fn first_address(iface: &InterconnectInterface) -> Result<std::net::IpAddr> {
    iface
        .ip_addresses
        .first()
        .map(|addr| addr.ip())
        .ok_or_else(|| Error::InterfaceWithoutAddress(iface.name.clone()))
}

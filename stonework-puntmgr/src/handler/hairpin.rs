//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use stonework_utils::ip::{AddressFamily, IpNetworkExt};

use crate::error::{Error, Result};
use crate::handler::{PuntHandler, apply, vpp_end};
use crate::link::{
    InterconnectReq, InterfaceLink, Link, hairpin_interface_selector,
    vpp_interface_selector,
};
use crate::punt::{Interconnect, PuntConfig, PuntId, PuntRequest};
use crate::southbound::{
    ChangeRequest, Dependency, L2XConnect, vpp_interface_key, vrf_table_key,
};

// Routes the traffic of a VPP interface through the CNF, which sends it back
// to VPP over an L3 hairpin interface.
#[derive(Debug)]
pub struct HairpinHandler;

// ===== impl HairpinHandler =====

impl PuntHandler for HairpinHandler {
    fn interconnect_reqs(&self, request: &PuntRequest) -> Vec<InterconnectReq> {
        let PuntConfig::Hairpin {
            vpp_interface,
            hairpin_interface,
        } = &request.config
        else {
            return vec![];
        };

        vec![
            InterconnectReq::new(
                Link::Interface(InterfaceLink::default()),
                vpp_interface_selector(vpp_interface),
            ),
            InterconnectReq::new(
                Link::Interface(InterfaceLink {
                    interface_name: Some(hairpin_interface.name.clone()),
                    phys_address: hairpin_interface.phys_address,
                    ip_addresses: hairpin_interface.ip_addresses.clone(),
                    vrf: hairpin_interface.vrf,
                    with_dhcp_client: hairpin_interface.with_dhcp_client,
                    mtu: hairpin_interface.mtu,
                    ..Default::default()
                }),
                hairpin_interface_selector(&hairpin_interface.name),
            ),
        ]
    }

    fn punt_dependencies(&self, request: &PuntRequest) -> Vec<Dependency> {
        let PuntConfig::Hairpin {
            vpp_interface,
            hairpin_interface,
        } = &request.config
        else {
            return vec![];
        };

        let mut deps = vec![Dependency::key(
            format!("{}-hairpin-{}", request.label, vpp_interface),
            vpp_interface_key(vpp_interface),
        )];
        let vrf = hairpin_interface.vrf;
        if vrf != 0 {
            for af in [AddressFamily::Ipv4, AddressFamily::Ipv6] {
                if hairpin_interface
                    .ip_addresses
                    .iter()
                    .any(|addr| addr.address_family() == af)
                {
                    let af_str = match af {
                        AddressFamily::Ipv4 => "v4",
                        AddressFamily::Ipv6 => "v6",
                    };
                    deps.push(Dependency::key(
                        format!("{}-hairpin-vrf-{}-{}", request.label, af_str, vrf),
                        vrf_table_key(vrf, af),
                    ));
                }
            }
        }
        deps
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
        let PuntConfig::Hairpin { vpp_interface, .. } = &request.config else {
            return Err(Error::UnsupportedPuntType(request.punt_type()));
        };
        let ic_iface =
            vpp_end(interconnects, &vpp_interface_selector(vpp_interface))?;

        let items = [
            L2XConnect {
                receive_interface: vpp_interface.clone(),
                transmit_interface: ic_iface.name.clone(),
            },
            L2XConnect {
                receive_interface: ic_iface.name.clone(),
                transmit_interface: vpp_interface.clone(),
            },
        ];
        apply(txn, items.map(Into::into), remove);

        Ok(())
    }
}

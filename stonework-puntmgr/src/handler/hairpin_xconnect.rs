//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use crate::error::{Error, Result};
use crate::handler::{PuntHandler, apply, vpp_end};
use crate::link::{InterconnectReq, InterfaceLink, Link, vpp_interface_selector};
use crate::punt::{Interconnect, PuntConfig, PuntId, PuntRequest};
use crate::southbound::{ChangeRequest, Dependency, L2XConnect, vpp_interface_key};

// Cross-connects two VPP interfaces through the CNF.
#[derive(Debug)]
pub struct HairpinXConnectHandler;

// ===== impl HairpinXConnectHandler =====

impl PuntHandler for HairpinXConnectHandler {
    fn interconnect_reqs(&self, request: &PuntRequest) -> Vec<InterconnectReq> {
        let PuntConfig::HairpinXConnect {
            vpp_interface1,
            vpp_interface2,
        } = &request.config
        else {
            return vec![];
        };

        [vpp_interface1, vpp_interface2]
            .into_iter()
            .map(|vpp_interface| {
                InterconnectReq::new(
                    Link::Interface(InterfaceLink::default()),
                    vpp_interface_selector(vpp_interface),
                )
            })
            .collect()
    }

    fn punt_dependencies(&self, request: &PuntRequest) -> Vec<Dependency> {
        let PuntConfig::HairpinXConnect {
            vpp_interface1,
            vpp_interface2,
        } = &request.config
        else {
            return vec![];
        };

        [vpp_interface1, vpp_interface2]
            .into_iter()
            .map(|vpp_interface| {
                Dependency::key(
                    format!("{}-hairpin-xconnect-{}", request.label, vpp_interface),
                    vpp_interface_key(vpp_interface),
                )
            })
            .collect()
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
        let PuntConfig::HairpinXConnect {
            vpp_interface1,
            vpp_interface2,
        } = &request.config
        else {
            return Err(Error::UnsupportedPuntType(request.punt_type()));
        };

        for vpp_interface in [vpp_interface1, vpp_interface2] {
            // Interconnects are matched by selector, never by position.
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
        }

        Ok(())
    }
}

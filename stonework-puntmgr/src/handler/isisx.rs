//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::collections::{BTreeSet, HashMap};

use crate::error::{Error, Result};
use crate::handler::{PuntHandler, apply, vpp_end};
use crate::link::{InterconnectReq, InterfaceLink, Link, vpp_interface_selector};
use crate::punt::{Interconnect, PuntConfig, PuntId, PuntRequest};
use crate::southbound::{
    ChangeRequest, Dependency, IsisXConnect, vpp_interface_address_prefix,
    vpp_interface_vrf_prefix,
};

// Cross-connects the IS-IS traffic of a VPP interface into the CNF.
#[derive(Debug, Default)]
pub struct IsisxHandler {
    // Punts using each (VPP interface, interconnect) cross-connect.
    users: HashMap<(String, String), BTreeSet<PuntId>>,
}

// ===== impl IsisxHandler =====

impl PuntHandler for IsisxHandler {
    fn interconnect_reqs(&self, request: &PuntRequest) -> Vec<InterconnectReq> {
        let PuntConfig::Isisx {
            vpp_interface,
            vrf,
            without_cnf_vrf,
        } = &request.config
        else {
            return vec![];
        };

        vec![InterconnectReq::new(
            Link::Interface(InterfaceLink::unnumbered(
                vpp_interface,
                *vrf,
                *without_cnf_vrf,
            )),
            vpp_interface_selector(vpp_interface),
        )]
    }

    fn punt_dependencies(&self, request: &PuntRequest) -> Vec<Dependency> {
        let PuntConfig::Isisx {
            vpp_interface, vrf, ..
        } = &request.config
        else {
            return vec![];
        };

        let mut deps = vec![Dependency::any_of(
            format!("{}-isisx-{}", request.label, vpp_interface),
            vec![vpp_interface_address_prefix(vpp_interface)],
        )];
        if *vrf != 0 {
            deps.push(Dependency::any_of(
                format!("{}-isisx-vrf-{}", request.label, vrf),
                vec![format!("{}{}", vpp_interface_vrf_prefix(vpp_interface), vrf)],
            ));
        }
        deps
    }

    fn can_multiplex(&self) -> bool {
        true
    }

    fn configure_punt(
        &mut self,
        txn: &mut ChangeRequest,
        id: &PuntId,
        request: &PuntRequest,
        interconnects: &[Interconnect],
        remove: bool,
    ) -> Result<()> {
        let PuntConfig::Isisx { vpp_interface, .. } = &request.config else {
            return Err(Error::UnsupportedPuntType(request.punt_type()));
        };
        let ic_iface =
            vpp_end(interconnects, &vpp_interface_selector(vpp_interface))?;

        let key = (vpp_interface.clone(), ic_iface.name.clone());
        if remove {
            if let Some(users) = self.users.get_mut(&key) {
                users.remove(id);
                if !users.is_empty() {
                    return Ok(());
                }
                self.users.remove(&key);
            }
        } else {
            self.users.entry(key).or_default().insert(id.clone());
        }

        let items = [
            IsisXConnect {
                input_interface: vpp_interface.clone(),
                output_interface: ic_iface.name.clone(),
            },
            IsisXConnect {
                input_interface: ic_iface.name.clone(),
                output_interface: vpp_interface.clone(),
            },
        ];
        apply(txn, items.map(Into::into), remove);

        Ok(())
    }
}

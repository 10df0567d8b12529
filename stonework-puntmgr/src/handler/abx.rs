//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::collections::HashMap;
use std::sync::Arc;

use ipnetwork::IpNetwork;
use itertools::Itertools;
use stonework_utils::ip::{AddressFamily, IpAddrExt, IpNetworkExt};

use crate::api::InterfaceIndex;
use crate::error::{AbxRuleError, Error, Result};
use crate::handler::PuntHandler;
use crate::link::{InterconnectReq, InterfaceLink, Link, vpp_interface_selector};
use crate::punt::{
    AclProtocol, AclRule, Interconnect, PuntConfig, PuntId, PuntRequest,
    find_interconnect,
};
use crate::southbound::{
    Abx, AbxAttachedInterface, Acl, AclAction, AclIpProtocol, AclIpRule,
    ChangeRequest, Dependency, vpp_interface_address_prefix,
    vpp_interface_vrf_prefix,
};

// Most significant byte of the ABX indexes allocated for punts.
const ABX_INDEX_PREFIX: u32 = 111;

// 32-bit FNV-1a parameters.
const FNV32_OFFSET_BASIS: u32 = 0x811c9dc5;
const FNV32_PRIME: u32 = 0x01000193;

// Aliases accepted in place of ACL rule networks.
const ANY_ADDR_ALIAS: &str = "any";
const LOCAL_ADDR_ALIAS: &str = "local";

// Forwards the traffic matched by ACL rules into the CNF.
//
// Several ABX punts may ride the same interconnect, in which case their rules
// are merged into a single pair of ACLs.
#[derive(Debug)]
pub struct AbxHandler {
    if_index: Arc<dyn InterfaceIndex>,
    // Policies attached to each VPP interface, in insertion order.
    policies: HashMap<String, Vec<AbxPolicy>>,
}

#[derive(Clone, Debug)]
struct AbxPolicy {
    id: PuntId,
    ingress_rules: Vec<AclRule>,
    egress_rules: Vec<AclRule>,
    // VPP end of the interconnect.
    ic_interface: String,
    // Priority of the attachment to the VPP interface.
    priority: u32,
}

// Network of an ACL rule, before alias expansion.
#[derive(Clone, Copy, Debug)]
enum RuleNetwork {
    Any,
    Local,
    Explicit(IpNetwork),
}

// ===== impl AbxHandler =====

impl AbxHandler {
    pub fn new(if_index: Arc<dyn InterfaceIndex>) -> AbxHandler {
        AbxHandler {
            if_index,
            policies: Default::default(),
        }
    }

    // Returns the priority of the attachment of the given interconnect to
    // the VPP interface.
    fn attachment_priority(policies: &[AbxPolicy], ic_interface: &str) -> u32 {
        if let Some(policy) = policies
            .iter()
            .find(|policy| policy.ic_interface == ic_interface)
        {
            return policy.priority;
        }

        // First free priority.
        (1..)
            .find(|priority| {
                !policies.iter().any(|policy| policy.priority == *priority)
            })
            .unwrap_or(1)
    }

    // Translates address aliases into the addresses of the VPP interface.
    fn expand_rules(
        &self,
        vpp_interface: &str,
        rules: &[AclRule],
    ) -> Result<Vec<AclIpRule>> {
        let addrs = self
            .if_index
            .interface_addresses(vpp_interface)
            .ok_or_else(|| Error::InterfaceNotFound(vpp_interface.to_owned()))?;
        if addrs.is_empty() {
            return Err(Error::InterfaceWithoutAddress(vpp_interface.to_owned()));
        }
        let local_addrs = |af: AddressFamily| {
            addrs
                .iter()
                .filter(|addr| addr.address_family() == af)
                .map(|addr| addr.ip().to_host_prefix())
                .collect::<Vec<_>>()
        };

        let mut expanded = vec![];
        for rule in rules {
            let src = RuleNetwork::parse(&rule.source_network)?;
            let dst = RuleNetwork::parse(&rule.destination_network)?;
            let rule_af = match (src.address_family(), dst.address_family()) {
                (Some(src_af), Some(dst_af)) if src_af != dst_af => {
                    return Err(AbxRuleError::MixedAddressFamilies {
                        source: rule.source_network.clone(),
                        destination: rule.destination_network.clone(),
                    }
                    .into());
                }
                (src_af, dst_af) => src_af.or(dst_af),
            };

            for af in [AddressFamily::Ipv4, AddressFamily::Ipv6] {
                let local_addrs = local_addrs(af);
                match rule_af {
                    Some(rule_af) if rule_af != af => continue,
                    Some(_) if local_addrs.is_empty() => {
                        let network = match src {
                            RuleNetwork::Explicit(_) => &rule.source_network,
                            _ => &rule.destination_network,
                        };
                        return Err(AbxRuleError::MissingAddressFamily {
                            network: network.clone(),
                            af,
                            interface: vpp_interface.to_owned(),
                        }
                        .into());
                    }
                    None if local_addrs.is_empty() => continue,
                    _ => (),
                }

                let srcs = src.expand(af, &local_addrs);
                let dsts = dst.expand(af, &local_addrs);
                expanded.extend(srcs.iter().cartesian_product(&dsts).map(
                    |(src, dst)| AclIpRule {
                        action: AclAction::Permit,
                        source_network: *src,
                        destination_network: *dst,
                        protocol: rule.protocol.clone().into(),
                    },
                ));
            }
        }

        Ok(expanded)
    }
}

impl PuntHandler for AbxHandler {
    fn interconnect_reqs(&self, request: &PuntRequest) -> Vec<InterconnectReq> {
        let PuntConfig::Abx {
            vpp_interface,
            vrf,
            without_cnf_vrf,
            ..
        } = &request.config
        else {
            return vec![];
        };

        // Same selector as Hairpin and Hairpin XConnect, both of which are
        // mutually exclusive with ABX.
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
        let PuntConfig::Abx {
            vpp_interface, vrf, ..
        } = &request.config
        else {
            return vec![];
        };

        let mut deps = vec![Dependency::any_of(
            format!("{}-abx-{}", request.label, vpp_interface),
            vec![vpp_interface_address_prefix(vpp_interface)],
        )];
        if *vrf != 0 {
            // Either IP version of the VRF will do.
            deps.push(Dependency::any_of(
                format!("{}-abx-vrf-{}", request.label, vrf),
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
        let PuntConfig::Abx {
            vpp_interface,
            ingress_acl_rules,
            egress_acl_rules,
            ..
        } = &request.config
        else {
            return Err(Error::UnsupportedPuntType(request.punt_type()));
        };
        let selector = vpp_interface_selector(vpp_interface);
        let ic = find_interconnect(interconnects, &selector)
            .ok_or_else(|| Error::MissingInterconnect(selector.clone()))?;
        let (Some(ic_vpp), Some(ic_cnf)) = (ic.vpp_interface(), ic.cnf_interface())
        else {
            return Err(Error::MissingInterconnect(selector));
        };
        let ic_interface = &ic_vpp.name;

        // Work on a copy so that a failure leaves the policies untouched.
        let mut policies = self
            .policies
            .get(vpp_interface)
            .cloned()
            .unwrap_or_default();
        let priority = Self::attachment_priority(&policies, ic_interface);
        policies.retain(|policy| policy.id != *id);
        if !remove {
            policies.push(AbxPolicy {
                id: id.clone(),
                ingress_rules: ingress_acl_rules.clone(),
                egress_rules: egress_acl_rules.clone(),
                ic_interface: ic_interface.clone(),
                priority,
            });
        }

        // Merge the rules of every policy riding the interconnect.
        let ingress_label = abx_label(vpp_interface, ic_interface);
        let egress_label = abx_label(ic_interface, vpp_interface);
        let mut ingress_acl = Acl {
            name: ingress_label.clone(),
            rules: vec![],
        };
        let mut egress_acl = Acl {
            name: egress_label.clone(),
            rules: vec![],
        };
        for policy in policies
            .iter()
            .filter(|policy| policy.ic_interface == *ic_interface)
        {
            ingress_acl
                .rules
                .extend(self.expand_rules(vpp_interface, &policy.ingress_rules)?);
            egress_acl
                .rules
                .extend(self.expand_rules(vpp_interface, &policy.egress_rules)?);
        }

        let ingress_abx = Abx {
            index: abx_index(&ingress_label),
            acl_name: ingress_label,
            output_interface: ic_interface.clone(),
            dst_mac: Some(ic_cnf.phys_address),
            attached_interfaces: vec![AbxAttachedInterface {
                input_interface: vpp_interface.clone(),
                priority,
            }],
        };
        let egress_abx = Abx {
            index: abx_index(&egress_label),
            acl_name: egress_label,
            output_interface: vpp_interface.clone(),
            dst_mac: None,
            attached_interfaces: vec![AbxAttachedInterface {
                input_interface: ic_interface.clone(),
                priority: 0,
            }],
        };

        for (acl, abx, is_ingress) in
            [(ingress_acl, ingress_abx, true), (egress_acl, egress_abx, false)]
        {
            if !acl.rules.is_empty() || (is_ingress && !remove) {
                txn.update(acl).update(abx);
            } else if remove {
                txn.delete(acl).delete(abx);
            }
        }

        // Commit.
        if policies.is_empty() {
            self.policies.remove(vpp_interface);
        } else {
            self.policies.insert(vpp_interface.clone(), policies);
        }

        Ok(())
    }
}

// ===== impl RuleNetwork =====

impl RuleNetwork {
    fn parse(network: &str) -> std::result::Result<RuleNetwork, AbxRuleError> {
        match network {
            "" | ANY_ADDR_ALIAS => Ok(RuleNetwork::Any),
            LOCAL_ADDR_ALIAS => Ok(RuleNetwork::Local),
            _ => network
                .parse()
                .map(RuleNetwork::Explicit)
                .map_err(|_| AbxRuleError::InvalidNetwork(network.to_owned())),
        }
    }

    fn address_family(&self) -> Option<AddressFamily> {
        match self {
            RuleNetwork::Explicit(network) => Some(network.address_family()),
            _ => None,
        }
    }

    fn expand(
        &self,
        af: AddressFamily,
        local_addrs: &[IpNetwork],
    ) -> Vec<IpNetwork> {
        match self {
            RuleNetwork::Any => vec![IpNetwork::default(af)],
            RuleNetwork::Local => local_addrs.to_vec(),
            RuleNetwork::Explicit(network) => vec![*network],
        }
    }
}

// ===== impl AclIpProtocol =====

impl From<AclProtocol> for AclIpProtocol {
    fn from(protocol: AclProtocol) -> AclIpProtocol {
        match protocol {
            AclProtocol::Any => AclIpProtocol::Any,
            AclProtocol::Icmp { icmpv6 } => AclIpProtocol::Icmp { icmpv6 },
            AclProtocol::Tcp(ports) => AclIpProtocol::Tcp(ports),
            AclProtocol::Udp(ports) => AclIpProtocol::Udp(ports),
        }
    }
}

// ===== global functions =====

// Returns the label of the ABX (and its ACL) forwarding traffic from the
// input interface to the output interface.
pub fn abx_label(input_interface: &str, output_interface: &str) -> String {
    format!("abx/from/{input_interface}/to/{output_interface}")
}

// Returns the index of the ABX with the given label.
//
// The lower 24 bits are taken from the 32-bit FNV-1a hash of the label.
pub fn abx_index(label: &str) -> u32 {
    (ABX_INDEX_PREFIX << 24) | (fnv1a32(label.as_bytes()) & 0xffffff)
}

// ===== helper functions =====

fn fnv1a32(data: &[u8]) -> u32 {
    data.iter().fold(FNV32_OFFSET_BASIS, |hash, byte| {
        (hash ^ *byte as u32).wrapping_mul(FNV32_PRIME)
    })
}

// ===== unit tests =====

//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::collections::BTreeSet;

use ipnetwork::IpNetwork;
use stonework_utils::mac_addr::MacAddr;

// Link requested between VPP and a CNF.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Link {
    Interface(InterfaceLink),
    AfUnix(AfUnixLink),
}

// Interface-based link (either memif or TAP).
//
// All parameters apply to the VPP side of the link.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct InterfaceLink {
    // If empty, a name is generated.
    pub interface_name: Option<String>,
    // If empty, a MAC address is generated.
    pub phys_address: Option<MacAddr>,
    // Not to be combined with `unnumbered_to` or `allocate_subnet`.
    pub ip_addresses: Vec<IpNetwork>,
    pub vrf: u32,
    // Don't create the VRF device on the CNF side.
    pub without_cnf_vrf: bool,
    pub with_dhcp_client: bool,
    pub mtu: u32,
    // VPP interface whose addresses are borrowed by the VPP side and copied
    // to the CNF side.
    pub unnumbered_to: Option<String>,
    // Allocate a /30 subnet for both sides.
    pub allocate_subnet: bool,
}

// Socket-based link.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct AfUnixLink {
    pub socket_path: String,
}

// Interconnect required by a punt.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct InterconnectReq {
    pub link: Link,
    // Selects what is punted on the VPP side.
    pub vpp_selector: String,
}

// ===== impl Link =====

impl Link {
    // Checks whether both links would be realized the same way.
    pub fn equivalent(&self, other: &Link) -> bool {
        match (self, other) {
            (Link::Interface(link1), Link::Interface(link2)) => {
                link1.equivalent(link2)
            }
            (Link::AfUnix(link1), Link::AfUnix(link2)) => {
                link1.socket_path == link2.socket_path
            }
            _ => false,
        }
    }
}

// ===== impl InterfaceLink =====

impl InterfaceLink {
    pub fn unnumbered(
        vpp_interface: &str,
        vrf: u32,
        without_cnf_vrf: bool,
    ) -> InterfaceLink {
        InterfaceLink {
            vrf,
            without_cnf_vrf,
            unnumbered_to: Some(vpp_interface.to_owned()),
            ..Default::default()
        }
    }

    fn equivalent(&self, other: &InterfaceLink) -> bool {
        // Address order is irrelevant.
        let addrs1 = self.ip_addresses.iter().collect::<BTreeSet<_>>();
        let addrs2 = other.ip_addresses.iter().collect::<BTreeSet<_>>();

        self.interface_name == other.interface_name
            && self.phys_address == other.phys_address
            && self.vrf == other.vrf
            && self.without_cnf_vrf == other.without_cnf_vrf
            && self.with_dhcp_client == other.with_dhcp_client
            && self.mtu == other.mtu
            && self.unnumbered_to == other.unnumbered_to
            && self.allocate_subnet == other.allocate_subnet
            && addrs1 == addrs2
    }
}

// ===== impl InterconnectReq =====

impl InterconnectReq {
    pub fn new(link: Link, vpp_selector: String) -> InterconnectReq {
        InterconnectReq { link, vpp_selector }
    }
}

// ===== global functions =====

// Selects all packets received or sent through the given VPP interface.
//
// Shared by Hairpin, Hairpin XConnect, ABX and ISISX, which are mutually
// exclusive unless they multiplex.
pub fn vpp_interface_selector(name: &str) -> String {
    format!("vpp/interface/{name}")
}

// Selects the L3 hairpin interface created inside VPP.
pub fn hairpin_interface_selector(name: &str) -> String {
    format!("vpp/hairpin/interface/{name}")
}

// Selects mirrored traffic of the given VPP interface.
pub fn span_interface_selector(name: &str) -> String {
    format!("vpp/span/interface/{name}")
}

// Selects packets of the given VRF.
pub fn vrf_selector(vrf: u32) -> String {
    format!("vpp/vrf/{vrf}")
}

// Selects packets punted to a socket.
pub fn socket_selector(key: &str) -> String {
    format!("vpp/punt-to-socket/{key}")
}

// ===== unit tests =====

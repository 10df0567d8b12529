//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use derive_new::new;
use ipnetwork::IpNetwork;
use serde::{Deserialize, Serialize};
use stonework_utils::mac_addr::MacAddr;

// Identity of a punt.
//
// An empty CNF label is normalized to the label of the local agent before the
// identity is used as a map key.
#[derive(Clone, Debug, Eq, Hash, new, Ord, PartialEq, PartialOrd)]
#[derive(Deserialize, Serialize)]
pub struct PuntId {
    pub cnf_ms_label: String,
    pub key: String,
    pub label: String,
}

// Lifecycle state of a punt.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
#[derive(Deserialize, Serialize)]
pub enum PuntState {
    #[default]
    Unknown,
    Init,
    Created,
    Deleted,
}

// Runtime record of a punt.
//
// Records learned from the central orchestrator don't carry the original
// request.
#[derive(Clone, Debug)]
pub struct Punt {
    pub state: PuntState,
    pub request: Option<PuntRequest>,
    pub metadata: PuntMetadata,
    // Distinguishes successive incarnations of the same punt ID.
    pub generation: u64,
}

// Externally visible result of a successful punt creation.
#[derive(Clone, Debug, Eq, new, PartialEq)]
#[derive(Deserialize, Serialize)]
pub struct PuntMetadata {
    pub id: PuntId,
    pub interconnects: Vec<Interconnect>,
}

#[derive(Clone, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub struct PuntRequest {
    pub label: String,
    pub interconnect_type: InterconnectType,
    pub enable_gso: bool,
    pub config: PuntConfig,
}

#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
#[derive(Deserialize, Serialize)]
pub enum InterconnectType {
    #[default]
    Tap,
    Memif,
}

#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[derive(Deserialize, Serialize)]
pub enum PuntType {
    Hairpin,
    HairpinXConnect,
    Span,
    Abx,
    Isisx,
    DhcpProxy,
    PuntToSocket,
}

// Type-specific punt parameters.
#[derive(Clone, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub enum PuntConfig {
    // Traffic from/to a VPP interface is routed through the CNF back into
    // VPP via an L3 hairpin interface.
    Hairpin {
        vpp_interface: String,
        hairpin_interface: HairpinInterface,
    },
    // Traffic between two VPP interfaces is cross-connected through the CNF.
    HairpinXConnect {
        vpp_interface1: String,
        vpp_interface2: String,
    },
    // Traffic of a VPP interface is mirrored into the CNF.
    Span {
        vpp_interface: String,
    },
    // Traffic matched by ACL rules is forwarded into the CNF.
    Abx {
        vpp_interface: String,
        vrf: u32,
        without_cnf_vrf: bool,
        ingress_acl_rules: Vec<AclRule>,
        egress_acl_rules: Vec<AclRule>,
    },
    // ISIS traffic of a VPP interface is cross-connected into the CNF.
    Isisx {
        vpp_interface: String,
        vrf: u32,
        without_cnf_vrf: bool,
    },
    // DHCP requests received in a VRF are relayed to the CNF.
    DhcpProxy {
        vrf: u32,
        without_cnf_vrf: bool,
    },
    PuntToSocket(SocketPunt),
}

#[derive(Clone, Debug, Default, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub struct HairpinInterface {
    pub name: String,
    pub phys_address: Option<MacAddr>,
    pub ip_addresses: Vec<IpNetwork>,
    pub vrf: u32,
    pub with_dhcp_client: bool,
    pub mtu: u32,
}

// ACL rule as requested by a punt.
//
// Source and destination networks may use the "any" and "local" aliases (an
// empty string means "any"). They're expanded into concrete networks when
// the ACL is built.
#[derive(Clone, Debug, Default, Eq, new, PartialEq)]
#[derive(Deserialize, Serialize)]
pub struct AclRule {
    pub source_network: String,
    pub destination_network: String,
    pub protocol: AclProtocol,
}

#[derive(Clone, Debug, Default, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub enum AclProtocol {
    #[default]
    Any,
    Icmp {
        icmpv6: bool,
    },
    Tcp(PortRanges),
    Udp(PortRanges),
}

#[derive(Clone, Copy, Debug, Default, Eq, new, PartialEq)]
#[derive(Deserialize, Serialize)]
pub struct PortRanges {
    pub source: PortRange,
    pub destination: PortRange,
}

#[derive(Clone, Copy, Debug, Eq, new, PartialEq)]
#[derive(Deserialize, Serialize)]
pub struct PortRange {
    pub lower: u16,
    pub upper: u16,
}

#[derive(Clone, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub enum SocketPunt {
    // Packets dropped by VPP for the given reason.
    Exception { reason: String, socket_path: String },
    // Packets destined to the local L4 port.
    ToHost {
        l3_protocol: L3Protocol,
        l4_protocol: L4Protocol,
        port: u16,
        socket_path: String,
    },
}

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
#[derive(Deserialize, Serialize)]
pub enum L3Protocol {
    Ipv4,
    Ipv6,
    All,
}

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
#[derive(Deserialize, Serialize)]
pub enum L4Protocol {
    Tcp,
    Udp,
}

// Realized interconnect between VPP and a CNF.
#[derive(Clone, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub struct Interconnect {
    pub id: InterconnectId,
    pub endpoints: Endpoints,
    // True if the interconnect is used by more than one punt.
    pub shared: bool,
}

#[derive(Clone, Debug, Eq, Hash, new, Ord, PartialEq, PartialOrd)]
#[derive(Deserialize, Serialize)]
pub struct InterconnectId {
    pub vpp_selector: String,
    pub cnf_selector: String,
}

#[derive(Clone, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub enum Endpoints {
    Interfaces {
        vpp: InterconnectInterface,
        cnf: InterconnectInterface,
    },
    Socket {
        path: String,
    },
}

// One end of an interface-based interconnect.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub struct InterconnectInterface {
    // Logical name used in configuration items.
    pub name: String,
    // Name of the interface in the Linux network namespace (CNF side of TAP
    // interconnects only).
    pub host_name: String,
    pub phys_address: MacAddr,
    pub ip_addresses: Vec<IpNetwork>,
    pub vrf: u32,
    // Linux VRF device the interface is enslaved to (CNF side only).
    pub vrf_device: Option<String>,
}

// ===== impl PuntId =====

impl std::fmt::Display for PuntId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}|{}|{}", self.cnf_ms_label, self.key, self.label)
    }
}

// ===== impl PuntState =====

impl std::fmt::Display for PuntState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PuntState::Unknown => write!(f, "UNKNOWN"),
            PuntState::Init => write!(f, "INIT"),
            PuntState::Created => write!(f, "CREATED"),
            PuntState::Deleted => write!(f, "DELETED"),
        }
    }
}

// ===== impl PuntRequest =====

impl PuntRequest {
    pub fn new(label: impl Into<String>, config: PuntConfig) -> PuntRequest {
        PuntRequest {
            label: label.into(),
            interconnect_type: InterconnectType::default(),
            enable_gso: false,
            config,
        }
    }

    pub fn punt_type(&self) -> PuntType {
        match self.config {
            PuntConfig::Hairpin { .. } => PuntType::Hairpin,
            PuntConfig::HairpinXConnect { .. } => PuntType::HairpinXConnect,
            PuntConfig::Span { .. } => PuntType::Span,
            PuntConfig::Abx { .. } => PuntType::Abx,
            PuntConfig::Isisx { .. } => PuntType::Isisx,
            PuntConfig::DhcpProxy { .. } => PuntType::DhcpProxy,
            PuntConfig::PuntToSocket(..) => PuntType::PuntToSocket,
        }
    }
}

// ===== impl PuntType =====

impl std::fmt::Display for PuntType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PuntType::Hairpin => write!(f, "hairpin"),
            PuntType::HairpinXConnect => write!(f, "hairpin-xconnect"),
            PuntType::Span => write!(f, "span"),
            PuntType::Abx => write!(f, "abx"),
            PuntType::Isisx => write!(f, "isisx"),
            PuntType::DhcpProxy => write!(f, "dhcp-proxy"),
            PuntType::PuntToSocket => write!(f, "punt-to-socket"),
        }
    }
}

// ===== impl InterconnectType =====

impl std::fmt::Display for InterconnectType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InterconnectType::Tap => write!(f, "tap"),
            InterconnectType::Memif => write!(f, "memif"),
        }
    }
}

// ===== impl PortRange =====

impl Default for PortRange {
    fn default() -> PortRange {
        PortRange {
            lower: 0,
            upper: u16::MAX,
        }
    }
}

// ===== impl Interconnect =====

impl Interconnect {
    pub fn vpp_interface(&self) -> Option<&InterconnectInterface> {
        match &self.endpoints {
            Endpoints::Interfaces { vpp, .. } => Some(vpp),
            Endpoints::Socket { .. } => None,
        }
    }

    pub fn cnf_interface(&self) -> Option<&InterconnectInterface> {
        match &self.endpoints {
            Endpoints::Interfaces { cnf, .. } => Some(cnf),
            Endpoints::Socket { .. } => None,
        }
    }

    pub fn socket_path(&self) -> Option<&str> {
        match &self.endpoints {
            Endpoints::Interfaces { .. } => None,
            Endpoints::Socket { path } => Some(path),
        }
    }
}

// ===== impl InterconnectId =====

impl std::fmt::Display for InterconnectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}<->{}", self.vpp_selector, self.cnf_selector)
    }
}

// ===== global functions =====

// Returns the interconnect requested with the given VPP selector.
pub fn find_interconnect<'a>(
    interconnects: &'a [Interconnect],
    vpp_selector: &str,
) -> Option<&'a Interconnect> {
    interconnects
        .iter()
        .find(|ic| ic.id.vpp_selector == vpp_selector)
}

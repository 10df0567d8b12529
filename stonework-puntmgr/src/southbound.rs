//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::collections::BTreeMap;
use std::net::IpAddr;

use ipnetwork::IpNetwork;
use serde::{Deserialize, Serialize};
use stonework_utils::ip::AddressFamily;
use stonework_utils::mac_addr::MacAddr;

use crate::punt::{L3Protocol, L4Protocol, PortRanges};

// Label attached to configuration items created on behalf of punts.
pub const INTERNAL_CONFIG_LABEL_KEY: &str = "io.ligato.from-client";
pub const INTERNAL_CONFIG_LABEL_VALUE: &str = "stonework";

// Configuration item applied by the dataplane (or Linux) config client.
#[derive(Clone, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub enum ConfigItem {
    VppInterface(VppInterface),
    LinuxInterface(LinuxInterface),
    LinuxVrfDevice(LinuxVrfDevice),
    L2XConnect(L2XConnect),
    Span(Span),
    Acl(Acl),
    Abx(Abx),
    IsisXConnect(IsisXConnect),
    DhcpProxy(DhcpProxy),
    PuntException(PuntException),
    PuntToHost(PuntToHost),
}

#[derive(Clone, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub struct VppInterface {
    pub name: String,
    pub kind: VppInterfaceKind,
    pub phys_address: Option<MacAddr>,
    pub ip_addresses: Vec<IpNetwork>,
    pub vrf: u32,
    pub unnumbered_to: Option<String>,
    pub with_dhcp_client: bool,
    pub mtu: u32,
}

#[derive(Clone, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub enum VppInterfaceKind {
    Tap {
        // Network namespace of the Linux side, referenced by microservice
        // label.
        to_microservice: String,
        enable_gso: bool,
    },
    Memif {
        socket_path: String,
        id: u32,
        master: bool,
    },
}

#[derive(Clone, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub struct LinuxInterface {
    pub name: String,
    pub host_if_name: String,
    pub namespace: String,
    // VPP side of the TAP.
    pub tap_vpp_interface: String,
    pub phys_address: MacAddr,
    pub ip_addresses: Vec<IpNetwork>,
    pub vrf_master: Option<String>,
    pub mtu: u32,
}

#[derive(Clone, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub struct LinuxVrfDevice {
    pub name: String,
    pub host_if_name: String,
    pub namespace: String,
    pub routing_table: u32,
}

#[derive(Clone, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub struct L2XConnect {
    pub receive_interface: String,
    pub transmit_interface: String,
}

#[derive(Clone, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub struct Span {
    pub interface_from: String,
    pub interface_to: String,
    pub direction: SpanDirection,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub enum SpanDirection {
    Rx,
    Tx,
    Both,
}

#[derive(Clone, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub struct Acl {
    pub name: String,
    pub rules: Vec<AclIpRule>,
}

// Fully expanded ACL rule (no address aliases).
#[derive(Clone, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub struct AclIpRule {
    pub action: AclAction,
    pub source_network: IpNetwork,
    pub destination_network: IpNetwork,
    pub protocol: AclIpProtocol,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub enum AclAction {
    Deny,
    Permit,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub enum AclIpProtocol {
    Any,
    Icmp { icmpv6: bool },
    Tcp(PortRanges),
    Udp(PortRanges),
}

// ACL-based cross-connect.
#[derive(Clone, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub struct Abx {
    pub index: u32,
    pub acl_name: String,
    pub output_interface: String,
    pub dst_mac: Option<MacAddr>,
    pub attached_interfaces: Vec<AbxAttachedInterface>,
}

#[derive(Clone, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub struct AbxAttachedInterface {
    pub input_interface: String,
    pub priority: u32,
}

#[derive(Clone, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub struct IsisXConnect {
    pub input_interface: String,
    pub output_interface: String,
}

#[derive(Clone, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub struct DhcpProxy {
    pub rx_vrf_id: u32,
    pub source_ip_address: IpAddr,
    pub servers: Vec<DhcpServer>,
}

#[derive(Clone, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub struct DhcpServer {
    pub vrf_id: u32,
    pub ip_address: IpAddr,
}

#[derive(Clone, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub struct PuntException {
    pub reason: String,
    pub socket_path: String,
}

#[derive(Clone, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub struct PuntToHost {
    pub l3_protocol: L3Protocol,
    pub l4_protocol: L4Protocol,
    pub port: u16,
    pub socket_path: String,
}

// Batch of configuration changes.
//
// Operations are keyed by the item key: a later operation on the same key
// replaces the earlier one.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
#[derive(Serialize)]
pub struct ChangeRequest {
    labels: BTreeMap<String, String>,
    ops: Vec<(String, ChangeOp)>,
}

#[derive(Clone, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub enum ChangeOp {
    Update(ConfigItem),
    Delete(ConfigItem),
}

// Dependency that must be satisfied by the reconciler before a punt is
// realized.
#[derive(Clone, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub struct Dependency {
    pub label: String,
    pub target: DependencyTarget,
}

#[derive(Clone, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub enum DependencyTarget {
    Key(String),
    AnyOfPrefixes(Vec<String>),
}

// ===== impl ConfigItem =====

impl ConfigItem {
    pub fn key(&self) -> String {
        match self {
            ConfigItem::VppInterface(iface) => vpp_interface_key(&iface.name),
            ConfigItem::LinuxInterface(iface) => {
                linux_interface_key(&iface.name)
            }
            ConfigItem::LinuxVrfDevice(vrf) => linux_interface_key(&vrf.name),
            ConfigItem::L2XConnect(xc) => {
                format!("config/vpp/l2/v2/xconnect/{}", xc.receive_interface)
            }
            ConfigItem::Span(span) => format!(
                "config/vpp/v2/span/{}/to/{}",
                span.interface_from, span.interface_to
            ),
            ConfigItem::Acl(acl) => {
                format!("config/vpp/acls/v2/acl/{}", acl.name)
            }
            ConfigItem::Abx(abx) => {
                format!("config/vpp/abxs/v2/abx/{}", abx.index)
            }
            ConfigItem::IsisXConnect(xc) => {
                format!("config/vpp/isisx/v2/xconnect/{}", xc.input_interface)
            }
            ConfigItem::DhcpProxy(proxy) => format!(
                "config/vpp/v2/dhcp-proxy/{}",
                proxy.source_ip_address
            ),
            ConfigItem::PuntException(punt) => {
                format!("config/vpp/v2/exception/{}", punt.reason)
            }
            ConfigItem::PuntToHost(punt) => format!(
                "config/vpp/v2/tohost/l3/{}/l4/{}/port/{}",
                l3_protocol_str(punt.l3_protocol),
                l4_protocol_str(punt.l4_protocol),
                punt.port
            ),
        }
    }
}

// ===== impl ChangeRequest =====

impl ChangeRequest {
    pub fn with_labels<'a>(
        labels: impl IntoIterator<Item = (&'a str, &'a str)>,
    ) -> ChangeRequest {
        ChangeRequest {
            labels: labels
                .into_iter()
                .map(|(key, value)| (key.to_owned(), value.to_owned()))
                .collect(),
            ops: Default::default(),
        }
    }

    // Creates a change request for items owned by the punt manager.
    pub(crate) fn internal() -> ChangeRequest {
        ChangeRequest::with_labels([(
            INTERNAL_CONFIG_LABEL_KEY,
            INTERNAL_CONFIG_LABEL_VALUE,
        )])
    }

    pub fn update(&mut self, item: impl Into<ConfigItem>) -> &mut Self {
        let item = item.into();
        self.push(item.key(), ChangeOp::Update(item));
        self
    }

    pub fn delete(&mut self, item: impl Into<ConfigItem>) -> &mut Self {
        let item = item.into();
        self.push(item.key(), ChangeOp::Delete(item));
        self
    }

    fn push(&mut self, key: String, op: ChangeOp) {
        self.ops.retain(|(op_key, _)| *op_key != key);
        self.ops.push((key, op));
    }

    pub fn labels(&self) -> &BTreeMap<String, String> {
        &self.labels
    }

    pub fn ops(&self) -> impl Iterator<Item = (&str, &ChangeOp)> {
        self.ops.iter().map(|(key, op)| (key.as_str(), op))
    }

    pub fn get(&self, key: &str) -> Option<&ChangeOp> {
        self.ops
            .iter()
            .find(|(op_key, _)| op_key == key)
            .map(|(_, op)| op)
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}

// ===== impl ChangeOp =====

impl ChangeOp {
    pub fn item(&self) -> &ConfigItem {
        match self {
            ChangeOp::Update(item) | ChangeOp::Delete(item) => item,
        }
    }

    pub fn is_delete(&self) -> bool {
        matches!(self, ChangeOp::Delete(..))
    }
}

// ===== impl Dependency =====

impl Dependency {
    pub fn key(label: String, key: String) -> Dependency {
        Dependency {
            label,
            target: DependencyTarget::Key(key),
        }
    }

    pub fn any_of(label: String, prefixes: Vec<String>) -> Dependency {
        Dependency {
            label,
            target: DependencyTarget::AnyOfPrefixes(prefixes),
        }
    }
}

// ===== conversions into ConfigItem =====

macro_rules! impl_into_config_item {
    ($($variant:ident),*) => {
        $(
            impl From<$variant> for ConfigItem {
                fn from(item: $variant) -> ConfigItem {
                    ConfigItem::$variant(item)
                }
            }
        )*
    };
}

impl_into_config_item!(
    VppInterface,
    LinuxInterface,
    LinuxVrfDevice,
    L2XConnect,
    Span,
    Acl,
    Abx,
    IsisXConnect,
    DhcpProxy,
    PuntException,
    PuntToHost
);

// ===== global functions =====

pub fn vpp_interface_key(name: &str) -> String {
    format!("config/vpp/v2/interfaces/{name}")
}

pub fn linux_interface_key(name: &str) -> String {
    format!("config/linux/interfaces/v2/interface/{name}")
}

// Prefix of the keys derived for the addresses of a VPP interface.
pub fn vpp_interface_address_prefix(name: &str) -> String {
    format!("vpp/interface/{name}/address/")
}

// Prefix of the keys derived for the VRF of a VPP interface.
pub fn vpp_interface_vrf_prefix(name: &str) -> String {
    format!("vpp/interface/{name}/vrf/")
}

pub fn vrf_table_key(vrf: u32, af: AddressFamily) -> String {
    let protocol = match af {
        AddressFamily::Ipv4 => "IPV4",
        AddressFamily::Ipv6 => "IPV6",
    };
    format!("config/vpp/v2/vrf-table/id/{vrf}/protocol/{protocol}")
}

pub fn microservice_key(label: &str) -> String {
    format!("linux/microservice/{label}")
}

fn l3_protocol_str(protocol: L3Protocol) -> &'static str {
    match protocol {
        L3Protocol::Ipv4 => "IPV4",
        L3Protocol::Ipv6 => "IPV6",
        L3Protocol::All => "ALL",
    }
}

fn l4_protocol_str(protocol: L4Protocol) -> &'static str {
    match protocol {
        L4Protocol::Tcp => "TCP",
        L4Protocol::Udp => "UDP",
    }
}

// ===== unit tests =====

//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::Arc;

use ipnetwork::{IpNetwork, Ipv4Network};
use stonework_utils::ip::Ipv4NetworkExt;
use stonework_utils::mac_addr::MacAddr;

use crate::api::{InterfaceIndex, NsPlugin};
use crate::config::Config;
use crate::debug::Debug;
use crate::error::{Error, Result};
use crate::link::{InterconnectReq, InterfaceLink, Link};
use crate::netns::NetNsRegistry;
use crate::punt::{
    Endpoints, Interconnect, InterconnectId, InterconnectInterface,
    InterconnectType, PuntId,
};
use crate::southbound::{
    ChangeRequest, ConfigItem, LinuxInterface, LinuxVrfDevice, VppInterface,
    VppInterfaceKind,
};

// Length of the subnets allocated for interconnects.
const SUBNET_PLEN: u8 = 30;
// Maximum number of memif interfaces per socket.
const MEMIF_MAX_IDS: u32 = u16::MAX as u32;

// Broker of the links between VPP and CNF network namespaces.
//
// Only ever invoked with the punt manager lock held.
#[derive(Debug)]
pub struct InterconnectManager {
    alloc_cidr: Ipv4Network,
    memif_socket_dir: String,
    if_index: Arc<dyn InterfaceIndex>,
    netns: NetNsRegistry,
    // Live interconnects.
    entries: BTreeMap<InterconnectId, Entry>,
    // Interconnects used by each punt, in request order.
    punts: HashMap<PuntId, Vec<InterconnectId>>,
    // Indexes of the allocated subnets.
    subnets: BTreeSet<u32>,
    // Allocated memif IDs, per socket.
    memif_ids: HashMap<String, BTreeSet<u32>>,
    // Linux VRF devices, keyed by namespace ID and VRF.
    vrf_devices: HashMap<(u32, u32), VrfDevice>,
    // Generated interface names.
    names: HashSet<String>,
}

#[derive(Debug)]
struct Entry {
    interconnect: Interconnect,
    link: Link,
    // Interconnect type (interface links only).
    kind: Option<InterconnectType>,
    multiplex: bool,
    users: BTreeSet<PuntId>,
    resources: Resources,
    vpp_items: Vec<ConfigItem>,
    cnf_items: Vec<ConfigItem>,
}

#[derive(Debug, Default)]
struct Resources {
    names: Vec<String>,
    subnet: Option<u32>,
    memif: Option<(String, u32)>,
    vrf_device: Option<(u32, u32)>,
}

#[derive(Debug)]
struct VrfDevice {
    refcount: usize,
    item: LinuxVrfDevice,
}

// Change requests receiving the configuration of both sides.
struct Txns<'a> {
    local: &'a mut ChangeRequest,
    remote: Option<&'a mut ChangeRequest>,
}

// Addresses of both sides of an interface link.
#[derive(Default)]
struct Addressing {
    vpp: Vec<IpNetwork>,
    cnf: Vec<IpNetwork>,
    subnet: Option<u32>,
}

// ===== impl InterconnectManager =====

impl InterconnectManager {
    pub fn new(
        config: &Config,
        agent_label: String,
        if_index: Arc<dyn InterfaceIndex>,
        ns_plugin: Arc<dyn NsPlugin>,
    ) -> Self {
        InterconnectManager {
            alloc_cidr: config.interconnect_alloc_cidr,
            memif_socket_dir: config.memif_socket_dir.clone(),
            if_index,
            netns: NetNsRegistry::new(agent_label, ns_plugin),
            entries: Default::default(),
            punts: Default::default(),
            subnets: Default::default(),
            memif_ids: Default::default(),
            vrf_devices: Default::default(),
            names: Default::default(),
        }
    }

    // Realizes the interconnects required by a punt, sharing existing ones
    // where allowed.
    //
    // Configuration of the VPP side goes to the local change request. The
    // CNF side goes to the remote change request when present, otherwise to
    // the local one. On error, nothing is appended and the bookkeeping of
    // this call is undone.
    pub fn add_interconnects(
        &mut self,
        local_txn: &mut ChangeRequest,
        remote_txn: Option<&mut ChangeRequest>,
        id: &PuntId,
        reqs: &[InterconnectReq],
        kind: InterconnectType,
        enable_gso: bool,
        allow_multiplex: bool,
    ) -> Result<Vec<Interconnect>> {
        let mut interconnects = vec![];
        let mut created = vec![];
        let mut new_vrf_devices = vec![];

        let result = (|| -> Result<()> {
            let ns_id = self.netns.net_ns_id(&id.cnf_ms_label)?;
            let cnf_selector = format!("cnf/netns/{ns_id}");

            let mut selectors = HashSet::new();
            for req in reqs {
                // Each selector may be requested only once per punt.
                if !selectors.insert(req.vpp_selector.as_str()) {
                    return Err(Error::InterconnectConflict(
                        req.vpp_selector.clone(),
                    ));
                }

                let ic_id = InterconnectId::new(
                    req.vpp_selector.clone(),
                    cnf_selector.clone(),
                );
                let req_kind = match req.link {
                    Link::Interface(_) => Some(kind),
                    Link::AfUnix(_) => None,
                };

                // Check for conflicts and sharing opportunities.
                let share =
                    self.can_share(&ic_id, req, req_kind, allow_multiplex)?;
                if share && let Some(entry) = self.entries.get_mut(&ic_id) {
                    entry.users.insert(id.clone());
                    Debug::InterconnectShare(&ic_id, id, entry.users.len())
                        .log();
                    let mut interconnect = entry.interconnect.clone();
                    interconnect.shared = true;
                    interconnects.push(interconnect);
                } else {
                    let entry = self.create_entry(
                        id,
                        ic_id.clone(),
                        req,
                        req_kind,
                        ns_id,
                        enable_gso,
                        allow_multiplex,
                        &mut new_vrf_devices,
                    )?;
                    Debug::InterconnectCreate(&ic_id, id).log();
                    interconnects.push(entry.interconnect.clone());
                    self.entries.insert(ic_id.clone(), entry);
                    created.push(ic_id.clone());
                }
                self.punts.entry(id.clone()).or_default().push(ic_id);
            }

            Ok(())
        })();
        if let Err(error) = result {
            self.release(id, None);
            return Err(error);
        }

        // Emit the configuration of the new interconnects.
        let mut txns = Txns {
            local: local_txn,
            remote: remote_txn,
        };
        for key in &new_vrf_devices {
            if let Some(device) = self.vrf_devices.get(key) {
                txns.cnf().update(device.item.clone());
            }
        }
        for ic_id in &created {
            let entry = &self.entries[ic_id];
            for item in &entry.vpp_items {
                txns.local.update(item.clone());
            }
            for item in &entry.cnf_items {
                txns.cnf().update(item.clone());
            }
        }

        Ok(interconnects)
    }

    // Releases the interconnects used by a punt. Interconnects are deleted
    // only once their last user is gone.
    pub fn del_interconnects(
        &mut self,
        local_txn: &mut ChangeRequest,
        remote_txn: Option<&mut ChangeRequest>,
        id: &PuntId,
    ) {
        let txns = Txns {
            local: local_txn,
            remote: remote_txn,
        };
        self.release(id, Some(txns));
    }

    // Undoes the bookkeeping of a punt without emitting any configuration.
    pub fn rollback(&mut self, id: &PuntId) {
        self.release(id, None);
    }

    // Returns the interconnects currently used by a punt, in request order.
    pub fn interconnects(&self, id: &PuntId) -> Vec<Interconnect> {
        let Some(ic_ids) = self.punts.get(id) else {
            return vec![];
        };
        ic_ids
            .iter()
            .filter_map(|ic_id| self.entries.get(ic_id))
            .map(|entry| {
                let mut interconnect = entry.interconnect.clone();
                interconnect.shared = entry.users.len() > 1;
                interconnect
            })
            .collect()
    }

    // Returns the number of punts using an interconnect.
    pub fn users(&self, ic_id: &InterconnectId) -> usize {
        self.entries
            .get(ic_id)
            .map(|entry| entry.users.len())
            .unwrap_or(0)
    }

    // Returns the name of the Linux VRF device corresponding to the given
    // VPP VRF.
    pub fn linux_vrf_name(vrf: u32) -> String {
        format!("vrf-{vrf}")
    }

    fn can_share(
        &self,
        ic_id: &InterconnectId,
        req: &InterconnectReq,
        req_kind: Option<InterconnectType>,
        allow_multiplex: bool,
    ) -> Result<bool> {
        let conflict = || Error::InterconnectConflict(req.vpp_selector.clone());
        let mut share = false;

        for (id, entry) in self
            .entries
            .iter()
            .filter(|(id, _)| id.vpp_selector == ic_id.vpp_selector)
        {
            if !allow_multiplex || !entry.multiplex {
                return Err(conflict());
            }
            if id == ic_id {
                if entry.kind != req_kind || !entry.link.equivalent(&req.link)
                {
                    return Err(conflict());
                }
                share = true;
            }
        }

        Ok(share)
    }

    fn create_entry(
        &mut self,
        id: &PuntId,
        ic_id: InterconnectId,
        req: &InterconnectReq,
        kind: Option<InterconnectType>,
        ns_id: u32,
        enable_gso: bool,
        multiplex: bool,
        new_vrf_devices: &mut Vec<(u32, u32)>,
    ) -> Result<Entry> {
        let mut entry = Entry {
            interconnect: Interconnect {
                id: ic_id,
                endpoints: Endpoints::Socket {
                    path: String::new(),
                },
                shared: false,
            },
            link: req.link.clone(),
            kind,
            multiplex,
            users: [id.clone()].into(),
            resources: Default::default(),
            vpp_items: vec![],
            cnf_items: vec![],
        };

        match (&req.link, kind) {
            (Link::AfUnix(link), _) => {
                entry.interconnect.endpoints = Endpoints::Socket {
                    path: link.socket_path.clone(),
                };
            }
            (Link::Interface(link), Some(kind)) => {
                if let Err(error) = self.realize_interface_link(
                    &mut entry,
                    id,
                    link,
                    kind,
                    ns_id,
                    enable_gso,
                    new_vrf_devices,
                ) {
                    self.free_resources(&entry.resources);
                    return Err(error);
                }
            }
            (Link::Interface(_), None) => unreachable!(),
        }

        Ok(entry)
    }

    fn realize_interface_link(
        &mut self,
        entry: &mut Entry,
        id: &PuntId,
        link: &InterfaceLink,
        kind: InterconnectType,
        ns_id: u32,
        enable_gso: bool,
        new_vrf_devices: &mut Vec<(u32, u32)>,
    ) -> Result<()> {
        let selector = entry.interconnect.id.vpp_selector.clone();
        let ns_label = self.netns.net_ns_label(ns_id)?.to_owned();

        // Addressing.
        let addressing = self.interface_link_addressing(link)?;
        entry.resources.subnet = addressing.subnet;

        // Names and MAC addresses.
        let vpp_prefix = match kind {
            InterconnectType::Tap => "tap",
            InterconnectType::Memif => "memif",
        };
        let (vpp_name, vpp_hash) = match &link.interface_name {
            Some(name) => (name.clone(), self.hash(id, &selector, name, 0)),
            None => {
                let (name, hash) = self.generate_name(vpp_prefix, id, &selector);
                entry.resources.names.push(name.clone());
                self.names.insert(name.clone());
                (name, hash)
            }
        };
        let (cnf_name, cnf_hash) = self.generate_name("cnf", id, &selector);
        entry.resources.names.push(cnf_name.clone());
        self.names.insert(cnf_name.clone());
        let vpp_mac = link.phys_address.unwrap_or(MacAddr::local(vpp_hash));
        let cnf_mac = MacAddr::local(cnf_hash);

        // Memif socket and ID.
        let memif = match kind {
            InterconnectType::Memif => {
                let socket_path =
                    format!("{}/memif-{}.sock", self.memif_socket_dir, ns_label);
                let memif_id = self.alloc_memif_id(&socket_path)?;
                entry.resources.memif = Some((socket_path.clone(), memif_id));
                Some((socket_path, memif_id))
            }
            InterconnectType::Tap => None,
        };

        // Linux VRF device on the CNF side (TAP only).
        let mut vrf_master = None;
        if kind == InterconnectType::Tap && link.vrf != 0 && !link.without_cnf_vrf
        {
            let key = (ns_id, link.vrf);
            let device = self.vrf_devices.entry(key).or_insert_with(|| {
                new_vrf_devices.push(key);
                VrfDevice {
                    refcount: 0,
                    item: LinuxVrfDevice {
                        name: format!("{}-ns{}", Self::linux_vrf_name(link.vrf), ns_id),
                        host_if_name: Self::linux_vrf_name(link.vrf),
                        namespace: ns_label.clone(),
                        routing_table: link.vrf,
                    },
                }
            });
            device.refcount += 1;
            entry.resources.vrf_device = Some(key);
            vrf_master = Some(device.item.host_if_name.clone());
        }

        // VPP side.
        let vpp_kind = match &memif {
            Some((socket_path, memif_id)) => VppInterfaceKind::Memif {
                socket_path: socket_path.clone(),
                id: *memif_id,
                master: true,
            },
            None => VppInterfaceKind::Tap {
                to_microservice: ns_label.clone(),
                enable_gso,
            },
        };
        entry.vpp_items.push(
            VppInterface {
                name: vpp_name.clone(),
                kind: vpp_kind,
                phys_address: Some(vpp_mac),
                ip_addresses: match link.unnumbered_to {
                    Some(_) => vec![],
                    None => addressing.vpp.clone(),
                },
                vrf: link.vrf,
                unnumbered_to: link.unnumbered_to.clone(),
                with_dhcp_client: link.with_dhcp_client,
                mtu: link.mtu,
            }
            .into(),
        );

        // CNF side.
        let cnf_item: ConfigItem = match &memif {
            Some((socket_path, memif_id)) => VppInterface {
                name: cnf_name.clone(),
                kind: VppInterfaceKind::Memif {
                    socket_path: socket_path.clone(),
                    id: *memif_id,
                    master: false,
                },
                phys_address: Some(cnf_mac),
                ip_addresses: addressing.cnf.clone(),
                vrf: if link.without_cnf_vrf { 0 } else { link.vrf },
                unnumbered_to: None,
                with_dhcp_client: false,
                mtu: link.mtu,
            }
            .into(),
            None => LinuxInterface {
                name: cnf_name.clone(),
                host_if_name: cnf_name.clone(),
                namespace: ns_label.clone(),
                tap_vpp_interface: vpp_name.clone(),
                phys_address: cnf_mac,
                ip_addresses: addressing.cnf.clone(),
                vrf_master: vrf_master.clone(),
                mtu: link.mtu,
            }
            .into(),
        };
        entry.cnf_items.push(cnf_item);

        entry.interconnect.endpoints = Endpoints::Interfaces {
            vpp: InterconnectInterface {
                name: vpp_name,
                host_name: String::new(),
                phys_address: vpp_mac,
                ip_addresses: addressing.vpp,
                vrf: link.vrf,
                vrf_device: None,
            },
            cnf: InterconnectInterface {
                name: cnf_name.clone(),
                host_name: cnf_name,
                phys_address: cnf_mac,
                ip_addresses: addressing.cnf,
                vrf: link.vrf,
                vrf_device: vrf_master,
            },
        };

        Ok(())
    }

    fn interface_link_addressing(
        &mut self,
        link: &InterfaceLink,
    ) -> Result<Addressing> {
        if link.allocate_subnet {
            let count = self.alloc_cidr.subnet_count(SUBNET_PLEN);
            let exhausted = Error::SubnetPoolExhausted(self.alloc_cidr);
            let Some(index) =
                (0..count).find(|index| !self.subnets.contains(index))
            else {
                return Err(exhausted);
            };
            let subnet = self.alloc_cidr.subnet(SUBNET_PLEN, index);
            let vpp_addr = subnet.and_then(|subnet| subnet.nth_addr(1));
            let cnf_addr = subnet.and_then(|subnet| subnet.nth_addr(2));
            let (Some(vpp_addr), Some(cnf_addr)) = (vpp_addr, cnf_addr) else {
                return Err(exhausted);
            };
            self.subnets.insert(index);
            return Ok(Addressing {
                vpp: vec![vpp_addr.into()],
                cnf: vec![cnf_addr.into()],
                subnet: Some(index),
            });
        }

        if let Some(vpp_interface) = &link.unnumbered_to {
            // The CNF side owns the same addresses as the VPP interface.
            let addrs = self
                .if_index
                .interface_addresses(vpp_interface)
                .ok_or_else(|| Error::InterfaceNotFound(vpp_interface.clone()))?;
            return Ok(Addressing {
                vpp: addrs.clone(),
                cnf: addrs,
                subnet: None,
            });
        }

        Ok(Addressing {
            vpp: link.ip_addresses.clone(),
            ..Default::default()
        })
    }

    fn alloc_memif_id(&mut self, socket_path: &str) -> Result<u32> {
        let ids = self.memif_ids.entry(socket_path.to_owned()).or_default();
        let memif_id = (1..=MEMIF_MAX_IDS)
            .find(|memif_id| !ids.contains(memif_id))
            .ok_or_else(|| Error::MemifIdsExhausted(socket_path.to_owned()))?;
        ids.insert(memif_id);
        Ok(memif_id)
    }

    // Generates a unique interface name derived from the punt identity.
    fn generate_name(
        &self,
        prefix: &str,
        id: &PuntId,
        selector: &str,
    ) -> (String, u32) {
        let mut salt = 0;
        loop {
            let hash = self.hash(id, selector, prefix, salt);
            let name = format!("{prefix}{hash:08x}");
            if !self.names.contains(&name) {
                return (name, hash);
            }
            salt += 1;
        }
    }

    fn hash(&self, id: &PuntId, selector: &str, tag: &str, salt: u32) -> u32 {
        let mut hasher = crc32fast::Hasher::new();
        hasher.update(id.to_string().as_bytes());
        hasher.update(selector.as_bytes());
        hasher.update(tag.as_bytes());
        hasher.update(&salt.to_be_bytes());
        hasher.finalize()
    }

    fn release(&mut self, id: &PuntId, mut txns: Option<Txns<'_>>) {
        let Some(ic_ids) = self.punts.remove(id) else {
            return;
        };

        for ic_id in ic_ids {
            let Some(entry) = self.entries.get_mut(&ic_id) else {
                continue;
            };
            entry.users.remove(id);
            if !entry.users.is_empty() {
                Debug::InterconnectRelease(&ic_id, id, entry.users.len()).log();
                continue;
            }

            // Last user is gone.
            let Some(entry) = self.entries.remove(&ic_id) else {
                continue;
            };
            let freed_vrf_device = self.free_resources(&entry.resources);
            if let Some(txns) = &mut txns {
                for item in entry.cnf_items {
                    txns.cnf().delete(item);
                }
                for item in entry.vpp_items {
                    txns.local.delete(item);
                }
                if let Some(device) = freed_vrf_device {
                    txns.cnf().delete(device);
                }
            }
            Debug::InterconnectDelete(&ic_id).log();
        }
    }

    // Returns allocated resources to their pools. Returns the Linux VRF
    // device when its last reference is gone.
    fn free_resources(
        &mut self,
        resources: &Resources,
    ) -> Option<LinuxVrfDevice> {
        for name in &resources.names {
            self.names.remove(name);
        }
        if let Some(index) = resources.subnet {
            self.subnets.remove(&index);
        }
        if let Some((socket_path, memif_id)) = &resources.memif
            && let Some(ids) = self.memif_ids.get_mut(socket_path)
        {
            ids.remove(memif_id);
            if ids.is_empty() {
                self.memif_ids.remove(socket_path);
            }
        }
        if let Some(key) = resources.vrf_device
            && let Some(device) = self.vrf_devices.get_mut(&key)
        {
            device.refcount -= 1;
            if device.refcount == 0 {
                return self.vrf_devices.remove(&key).map(|device| device.item);
            }
        }
        None
    }
}

// ===== impl Txns =====

impl Txns<'_> {
    // Returns the change request receiving the CNF side configuration.
    fn cnf(&mut self) -> &mut ChangeRequest {
        match self.remote.as_deref_mut() {
            Some(txn) => txn,
            None => &mut *self.local,
        }
    }
}

// ===== unit tests =====

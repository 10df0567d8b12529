//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use ipnetwork::{IpNetwork, Ipv4Network, Ipv6Network};
use serde::{Deserialize, Serialize};

// Address Family identifier.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[derive(Deserialize, Serialize)]
pub enum AddressFamily {
    Ipv4,
    Ipv6,
}

// Extension methods for IpAddr.
pub trait IpAddrExt {
    // Returns the address family of this address.
    fn address_family(&self) -> AddressFamily;

    // Converts this IP address into a host prefix network.
    fn to_host_prefix(&self) -> IpNetwork;

    // Returns an unspecified address of the given address family.
    fn unspecified(af: AddressFamily) -> IpAddr;
}

// Extension methods for IpNetwork.
pub trait IpNetworkExt {
    // Returns the address family of this network.
    fn address_family(&self) -> AddressFamily;

    // Returns the default route of the given address family.
    fn default(af: AddressFamily) -> IpNetwork;
}

// Extension methods for Ipv4Network.
pub trait Ipv4NetworkExt {
    const MAX_PREFIXLEN: u8;

    // Returns the number of subnets of the given length contained in this
    // network.
    fn subnet_count(&self, prefix: u8) -> u32;

    // Returns the n-th subnet of the given length contained in this network.
    fn subnet(&self, prefix: u8, index: u32) -> Option<Ipv4Network>;

    // Returns the n-th address of this network, keeping its prefix length.
    fn nth_addr(&self, index: u32) -> Option<Ipv4Network>;
}

// Extension methods for Ipv6Network.
pub trait Ipv6NetworkExt {
    const MAX_PREFIXLEN: u8;
}

// ===== impl AddressFamily =====

impl AddressFamily {
    pub fn max_prefixlen(&self) -> u8 {
        match self {
            AddressFamily::Ipv4 => Ipv4Network::MAX_PREFIXLEN,
            AddressFamily::Ipv6 => Ipv6Network::MAX_PREFIXLEN,
        }
    }
}

impl std::fmt::Display for AddressFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AddressFamily::Ipv4 => write!(f, "IPv4"),
            AddressFamily::Ipv6 => write!(f, "IPv6"),
        }
    }
}

// ===== impl IpAddr =====

impl IpAddrExt for IpAddr {
    fn address_family(&self) -> AddressFamily {
        match self {
            IpAddr::V4(_) => AddressFamily::Ipv4,
            IpAddr::V6(_) => AddressFamily::Ipv6,
        }
    }

    fn to_host_prefix(&self) -> IpNetwork {
        let plen = self.address_family().max_prefixlen();
        // A full-length prefix is always valid.
        IpNetwork::new(*self, plen).unwrap()
    }

    fn unspecified(af: AddressFamily) -> IpAddr {
        match af {
            AddressFamily::Ipv4 => IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            AddressFamily::Ipv6 => IpAddr::V6(Ipv6Addr::UNSPECIFIED),
        }
    }
}

// ===== impl IpNetwork =====

impl IpNetworkExt for IpNetwork {
    fn address_family(&self) -> AddressFamily {
        self.ip().address_family()
    }

    fn default(af: AddressFamily) -> IpNetwork {
        // A zero-length prefix is always valid.
        IpNetwork::new(IpAddr::unspecified(af), 0).unwrap()
    }
}

// ===== impl Ipv4Network =====

impl Ipv4NetworkExt for Ipv4Network {
    const MAX_PREFIXLEN: u8 = 32;

    fn subnet_count(&self, prefix: u8) -> u32 {
        if prefix < self.prefix() || prefix > Ipv4Network::MAX_PREFIXLEN {
            return 0;
        }
        1u64.checked_shl((prefix - self.prefix()) as u32)
            .map(|count| count.min(u32::MAX as u64) as u32)
            .unwrap_or(u32::MAX)
    }

    fn subnet(&self, prefix: u8, index: u32) -> Option<Ipv4Network> {
        if index >= self.subnet_count(prefix) {
            return None;
        }
        let size = 1u64 << (Ipv4Network::MAX_PREFIXLEN - prefix);
        let base = u32::from(self.network()) as u64;
        let addr = base + index as u64 * size;
        Ipv4Network::new(Ipv4Addr::from(addr as u32), prefix).ok()
    }

    fn nth_addr(&self, index: u32) -> Option<Ipv4Network> {
        if index as u64 >= self.size() as u64 {
            return None;
        }
        let addr = u32::from(self.network()) + index;
        Ipv4Network::new(Ipv4Addr::from(addr), self.prefix()).ok()
    }
}

// ===== impl Ipv6Network =====

impl Ipv6NetworkExt for Ipv6Network {
    const MAX_PREFIXLEN: u8 = 128;
}

// ===== unit tests =====

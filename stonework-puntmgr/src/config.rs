//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::net::Ipv4Addr;
use std::time::Duration;

use ipnetwork::Ipv4Network;
use serde::Deserialize;

// Punt manager configuration.
#[derive(Clone, Debug, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "kebab-case")]
pub struct Config {
    // Network from which /30 subnets are allocated for interconnects.
    pub interconnect_alloc_cidr: Ipv4Network,
    // Directory holding the memif sockets of the interconnects.
    pub memif_socket_dir: String,
    // Timeout of punt state updates sent to remote CNFs.
    pub rpc_timeout_secs: u64,
}

// ===== impl Config =====

impl Config {
    pub fn rpc_timeout(&self) -> Duration {
        Duration::from_secs(self.rpc_timeout_secs)
    }
}

impl Default for Config {
    fn default() -> Config {
        Config {
            interconnect_alloc_cidr: Ipv4Network::new(
                Ipv4Addr::new(192, 168, 111, 0),
                24,
            )
            .unwrap(),
            memif_socket_dir: "/run/stonework/memif".to_owned(),
            rpc_timeout_secs: 5,
        }
    }
}

// ===== unit tests =====

//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use crate::api::{NsHandle, NsPlugin};
use crate::debug::Debug;
use crate::error::{Error, Result};

// Registry of the network namespaces used by CNFs.
//
// Each namespace gets a small ID that stays the same regardless of which of
// the microservices sharing it is used to query it. ID 0 is reserved for the
// namespace of the local agent.
pub struct NetNsRegistry {
    agent_label: String,
    ns_plugin: Arc<dyn NsPlugin>,
    // Learned namespaces, keyed by microservice label.
    by_label: HashMap<String, NetNs>,
    // Label designated to represent each namespace.
    by_id: BTreeMap<u32, String>,
}

#[derive(Clone, Copy, Debug)]
struct NetNs {
    id: u32,
    handle: NsHandle,
}

// ===== impl NetNsRegistry =====

impl NetNsRegistry {
    pub fn new(agent_label: String, ns_plugin: Arc<dyn NsPlugin>) -> Self {
        NetNsRegistry {
            agent_label,
            ns_plugin,
            by_label: Default::default(),
            by_id: Default::default(),
        }
    }

    // Returns the ID of the namespace referenced by the given label.
    pub fn net_ns_id(&mut self, label: &str) -> Result<u32> {
        if label.is_empty() || label == self.agent_label {
            return Ok(0);
        }
        if let Some(ns) = self.by_label.get(label) {
            return Ok(ns.id);
        }

        let handle = self
            .ns_plugin
            .namespace_handle(label)
            .map_err(|error| Error::NetNsResolve(label.to_owned(), error))?;

        // Another label may already reference the same namespace.
        let id = match self.by_label.values().find(|ns| ns.handle == handle) {
            Some(ns) => ns.id,
            None => {
                let id = self.by_id.keys().next_back().copied().unwrap_or(0) + 1;
                self.by_id.insert(id, label.to_owned());
                Debug::NetNsCreate(label, id).log();
                id
            }
        };
        self.by_label.insert(label.to_owned(), NetNs { id, handle });

        Ok(id)
    }

    // Returns the label representing the namespace with the given ID.
    pub fn net_ns_label(&self, id: u32) -> Result<&str> {
        if id == 0 {
            return Ok(&self.agent_label);
        }
        self.by_id
            .get(&id)
            .map(String::as_str)
            .ok_or(Error::UnknownNetNsId(id))
    }
}

impl std::fmt::Debug for NetNsRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NetNsRegistry")
            .field("agent_label", &self.agent_label)
            .field("by_label", &self.by_label)
            .field("by_id", &self.by_id)
            .finish()
    }
}

// ===== unit tests =====

//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

//! Collaborators that record what would be applied to the dataplane.

use std::collections::HashMap;

use async_trait::async_trait;
use ipnetwork::IpNetwork;
use stonework_puntmgr::api::{BoxError, ConfigClient, InterfaceIndex, Reconciler};
use stonework_puntmgr::southbound::ChangeRequest;
use tracing::{debug_span, info};

use crate::config;

// Reconciler logging the punt notifications.
#[derive(Debug, Default)]
pub struct JournalReconciler;

// Config client logging change requests as JSON.
#[derive(Debug)]
pub struct JournalConfigClient {
    target: String,
}

// Interface index built from the configuration file.
#[derive(Debug, Default)]
pub struct ConfigInterfaceIndex {
    interfaces: HashMap<String, Vec<IpNetwork>>,
}

// ===== impl JournalReconciler =====

impl Reconciler for JournalReconciler {
    fn push_sb_notification(
        &self,
        key: String,
        value: Option<()>,
    ) -> Result<(), BoxError> {
        let created = value.is_some();
        debug_span!("reconciler").in_scope(|| {
            info!(%key, %created, "punt notification");
        });
        Ok(())
    }
}

// ===== impl JournalConfigClient =====

impl JournalConfigClient {
    pub fn new(target: impl Into<String>) -> Self {
        JournalConfigClient {
            target: target.into(),
        }
    }
}

#[async_trait]
impl ConfigClient for JournalConfigClient {
    async fn commit(&self, txn: ChangeRequest) -> Result<(), BoxError> {
        let data = serde_json::to_string(&txn)?;
        debug_span!("config-client", target = %self.target).in_scope(|| {
            info!(ops = %txn.len(), %data, "change request");
        });
        Ok(())
    }
}

// ===== impl ConfigInterfaceIndex =====

impl ConfigInterfaceIndex {
    pub fn new(interfaces: &[config::Interface]) -> Self {
        ConfigInterfaceIndex {
            interfaces: interfaces
                .iter()
                .map(|iface| (iface.name.clone(), iface.addresses.clone()))
                .collect(),
        }
    }
}

impl InterfaceIndex for ConfigInterfaceIndex {
    fn interface_addresses(&self, name: &str) -> Option<Vec<IpNetwork>> {
        self.interfaces.get(name).cloned()
    }
}

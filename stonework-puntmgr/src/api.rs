//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

//! Interfaces of the collaborators the punt manager depends on.

use std::sync::Arc;

use async_trait::async_trait;
use ipnetwork::IpNetwork;
use serde::{Deserialize, Serialize};

use crate::punt::{PuntMetadata, PuntState};
use crate::southbound::ChangeRequest;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

// Mode of operation of the CNF running the punt manager.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum CnfMode {
    // CNF with its own dataplane.
    #[default]
    Standalone,
    // Central orchestrator owning the shared dataplane.
    Stonework,
    // CNF running without a dataplane of its own.
    StoneworkModule,
}

// Handle of an OS network namespace.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct NsHandle {
    pub dev: u64,
    pub ino: u64,
}

// Declarative reconciler receiving south-bound notifications.
pub trait Reconciler: std::fmt::Debug + Send + Sync {
    // Publishes a notification. A `None` value retracts it.
    fn push_sb_notification(
        &self,
        key: String,
        value: Option<()>,
    ) -> Result<(), BoxError>;
}

// Client applying change requests.
#[async_trait]
pub trait ConfigClient: std::fmt::Debug + Send + Sync {
    async fn commit(&self, txn: ChangeRequest) -> Result<(), BoxError>;
}

// Client of the punt manager of a remote CNF.
#[async_trait]
pub trait PuntStateClient: std::fmt::Debug + Send + Sync {
    async fn update_punt_state(
        &self,
        metadata: PuntMetadata,
        state: PuntState,
    ) -> Result<(), BoxError>;
}

// Registry of known CNFs.
#[async_trait]
pub trait CnfRegistry: std::fmt::Debug + Send + Sync {
    fn cnf_mode(&self) -> CnfMode;

    // Returns the config client of a remote CNF.
    async fn cnf_cfg_client(
        &self,
        label: &str,
    ) -> Result<Arc<dyn ConfigClient>, BoxError>;

    // Returns the punt manager client of a remote CNF.
    async fn cnf_punt_client(
        &self,
        label: &str,
    ) -> Result<Arc<dyn PuntStateClient>, BoxError>;
}

// Index of VPP interfaces.
pub trait InterfaceIndex: std::fmt::Debug + Send + Sync {
    // Returns the addresses configured on the given interface, or `None` if
    // the interface doesn't exist.
    fn interface_addresses(&self, name: &str) -> Option<Vec<IpNetwork>>;
}

// Resolver of network namespaces referenced by microservice labels.
pub trait NsPlugin: std::fmt::Debug + Send + Sync {
    fn namespace_handle(&self, label: &str) -> Result<NsHandle, BoxError>;
}

// ===== impl CnfMode =====

impl std::fmt::Display for CnfMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CnfMode::Standalone => write!(f, "standalone"),
            CnfMode::Stonework => write!(f, "stonework"),
            CnfMode::StoneworkModule => write!(f, "stonework-module"),
        }
    }
}

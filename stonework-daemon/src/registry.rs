//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use stonework_puntmgr::api::{
    BoxError, CnfMode, CnfRegistry, ConfigClient, PuntStateClient,
};
use tokio::sync::Mutex;
use tonic::transport::{Channel, Endpoint};
use tracing::{debug, debug_span};

use crate::config;
use crate::grpc::GrpcPuntStateClient;
use crate::journal::JournalConfigClient;

// Registry of the StoneWork modules listed in the configuration.
//
// Connections to the modules are established on first use and kept for the
// lifetime of the agent.
#[derive(Debug)]
pub struct StaticCnfRegistry {
    mode: CnfMode,
    connect_timeout: Duration,
    addresses: HashMap<String, String>,
    channels: Mutex<HashMap<String, Channel>>,
}

// ===== impl StaticCnfRegistry =====

impl StaticCnfRegistry {
    pub fn new(mode: CnfMode, grpc: &config::Grpc, cnfs: &[config::Cnf]) -> Self {
        StaticCnfRegistry {
            mode,
            connect_timeout: Duration::from_secs(grpc.connect_timeout_secs),
            addresses: cnfs
                .iter()
                .map(|cnf| (cnf.label.clone(), cnf.address.clone()))
                .collect(),
            channels: Default::default(),
        }
    }

    fn address(&self, label: &str) -> Result<&str, BoxError> {
        self.addresses
            .get(label)
            .map(String::as_str)
            .ok_or_else(|| format!("unknown CNF {label}").into())
    }

    async fn channel(&self, label: &str) -> Result<Channel, BoxError> {
        let address = self.address(label)?;
        let mut channels = self.channels.lock().await;
        if let Some(channel) = channels.get(label) {
            return Ok(channel.clone());
        }

        debug_span!("cnf-registry").in_scope(|| {
            debug!(%label, %address, "connecting to CNF");
        });
        let channel = Endpoint::from_shared(address.to_owned())?
            .connect_timeout(self.connect_timeout)
            .connect()
            .await?;
        channels.insert(label.to_owned(), channel.clone());
        Ok(channel)
    }
}

#[async_trait]
impl CnfRegistry for StaticCnfRegistry {
    fn cnf_mode(&self) -> CnfMode {
        self.mode
    }

    async fn cnf_cfg_client(
        &self,
        label: &str,
    ) -> Result<Arc<dyn ConfigClient>, BoxError> {
        self.address(label)?;
        Ok(Arc::new(JournalConfigClient::new(label)))
    }

    async fn cnf_punt_client(
        &self,
        label: &str,
    ) -> Result<Arc<dyn PuntStateClient>, BoxError> {
        let channel = self.channel(label).await?;
        Ok(Arc::new(GrpcPuntStateClient::new(channel)))
    }
}

// ===== unit tests =====

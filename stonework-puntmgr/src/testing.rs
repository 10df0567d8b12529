//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

//! In-memory collaborators recording everything the punt manager does.

use std::collections::HashMap;
use std::sync::atomic::{self, AtomicBool};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use ipnetwork::IpNetwork;

use crate::api::{
    BoxError, CnfMode, CnfRegistry, ConfigClient, InterfaceIndex, NsHandle,
    NsPlugin, PuntStateClient, Reconciler,
};
use crate::config::Config;
use crate::manager::{Deps, PuntManager};
use crate::punt::{PuntMetadata, PuntState};
use crate::southbound::{ChangeOp, ChangeRequest, ConfigItem};

// Target name used by the config client of the local dataplane.
pub const LOCAL_TARGET: &str = "local";
// Label of the local agent.
pub const AGENT_LABEL: &str = "stonework";

// Punt manager wired to recording collaborators.
//
// Interfaces: eth0 (10.0.0.1/24), eth1 (10.0.1.1/24, 2001:db8:1::1/64),
// eth2 (no address) and eth3 (10.0.3.1/24).
// CNFs: cnf1 and cnf2, each in its own network namespace.
#[derive(Debug)]
pub struct TestEnv {
    pub manager: PuntManager,
    pub log: EventLog,
    pub registry: Arc<MockCnfRegistry>,
    pub cfg_client: Arc<RecordingConfigClient>,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Event {
    Commit(String, ChangeRequest),
    PuntStateUpdate(String, PuntMetadata, PuntState),
    Notification(String, Option<()>),
}

// Ordered log of events shared by the mocks.
#[derive(Clone, Debug, Default)]
pub struct EventLog(Arc<Mutex<Vec<Event>>>);

#[derive(Debug, Default)]
pub struct StaticNsPlugin {
    handles: HashMap<String, u64>,
}

#[derive(Debug, Default)]
pub struct StaticInterfaceIndex {
    interfaces: HashMap<String, Vec<IpNetwork>>,
}

#[derive(Debug, Default)]
pub struct RecordingReconciler {
    log: EventLog,
}

#[derive(Debug)]
pub struct RecordingConfigClient {
    target: String,
    log: EventLog,
    fail: AtomicBool,
}

#[derive(Debug)]
pub struct RecordingPuntStateClient {
    target: String,
    log: EventLog,
    fail: AtomicBool,
    delay: Mutex<Option<Duration>>,
}

#[derive(Debug)]
pub struct MockCnfRegistry {
    mode: CnfMode,
    log: EventLog,
    cnfs: HashMap<String, MockCnf>,
}

#[derive(Debug)]
struct MockCnf {
    cfg_client: Arc<RecordingConfigClient>,
    punt_client: Arc<RecordingPuntStateClient>,
}

// ===== impl TestEnv =====

impl TestEnv {
    pub fn new(mode: CnfMode) -> TestEnv {
        TestEnv::with_config(mode, Config::default())
    }

    pub fn with_config(mode: CnfMode, config: Config) -> TestEnv {
        let log = EventLog::default();
        let registry = Arc::new(
            MockCnfRegistry::new(mode, log.clone())
                .with_cnf("cnf1")
                .with_cnf("cnf2"),
        );
        let cfg_client =
            Arc::new(RecordingConfigClient::new(LOCAL_TARGET, log.clone()));
        let if_index = StaticInterfaceIndex::default()
            .with("eth0", &["10.0.0.1/24"])
            .with("eth1", &["10.0.1.1/24", "2001:db8:1::1/64"])
            .with("eth2", &[])
            .with("eth3", &["10.0.3.1/24"]);
        let ns_plugin = StaticNsPlugin::default().with("cnf1", 1).with("cnf2", 2);
        let deps = Deps {
            agent_label: AGENT_LABEL.to_owned(),
            cnf_registry: registry.clone(),
            cfg_client: cfg_client.clone(),
            reconciler: Arc::new(RecordingReconciler::new(log.clone())),
            if_index: Arc::new(if_index),
            ns_plugin: Arc::new(ns_plugin),
        };

        TestEnv {
            manager: PuntManager::new(config, deps),
            log,
            registry,
            cfg_client,
        }
    }

    // Returns the change requests committed to the local dataplane.
    pub fn local_commits(&self) -> Vec<ChangeRequest> {
        self.log.commits(LOCAL_TARGET)
    }

    pub fn notifications(&self) -> Vec<(String, Option<()>)> {
        self.log.notifications()
    }
}

// ===== impl EventLog =====

impl EventLog {
    pub fn push(&self, event: Event) {
        self.0.lock().unwrap().push(event);
    }

    pub fn events(&self) -> Vec<Event> {
        self.0.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.0.lock().unwrap().clear();
    }

    // Returns the change requests committed to the given target.
    pub fn commits(&self, target: &str) -> Vec<ChangeRequest> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                Event::Commit(event_target, txn) if event_target == target => {
                    Some(txn)
                }
                _ => None,
            })
            .collect()
    }

    // Returns the punt states sent to the given target.
    pub fn punt_states(&self, target: &str) -> Vec<(PuntMetadata, PuntState)> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                Event::PuntStateUpdate(event_target, metadata, state)
                    if event_target == target =>
                {
                    Some((metadata, state))
                }
                _ => None,
            })
            .collect()
    }

    pub fn notifications(&self) -> Vec<(String, Option<()>)> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                Event::Notification(key, value) => Some((key, value)),
                _ => None,
            })
            .collect()
    }
}

// ===== impl StaticNsPlugin =====

impl StaticNsPlugin {
    // Places the given microservice in the namespace with the given inode.
    pub fn with(mut self, label: &str, ino: u64) -> Self {
        self.handles.insert(label.to_owned(), ino);
        self
    }
}

impl NsPlugin for StaticNsPlugin {
    fn namespace_handle(&self, label: &str) -> Result<NsHandle, BoxError> {
        self.handles
            .get(label)
            .map(|ino| NsHandle { dev: 4, ino: *ino })
            .ok_or_else(|| format!("microservice {label} not found").into())
    }
}

// ===== impl StaticInterfaceIndex =====

impl StaticInterfaceIndex {
    pub fn with(mut self, name: &str, addrs: &[&str]) -> Self {
        let addrs = addrs.iter().map(|addr| addr.parse().unwrap()).collect();
        self.interfaces.insert(name.to_owned(), addrs);
        self
    }
}

impl InterfaceIndex for StaticInterfaceIndex {
    fn interface_addresses(&self, name: &str) -> Option<Vec<IpNetwork>> {
        self.interfaces.get(name).cloned()
    }
}

// ===== impl RecordingReconciler =====

impl RecordingReconciler {
    pub fn new(log: EventLog) -> Self {
        RecordingReconciler { log }
    }

    pub fn notifications(&self) -> Vec<(String, Option<()>)> {
        self.log.notifications()
    }
}

impl Reconciler for RecordingReconciler {
    fn push_sb_notification(
        &self,
        key: String,
        value: Option<()>,
    ) -> Result<(), BoxError> {
        self.log.push(Event::Notification(key, value));
        Ok(())
    }
}

// ===== impl RecordingConfigClient =====

impl RecordingConfigClient {
    pub fn new(target: &str, log: EventLog) -> Self {
        RecordingConfigClient {
            target: target.to_owned(),
            log,
            fail: AtomicBool::new(false),
        }
    }

    pub fn set_fail(&self, fail: bool) {
        self.fail.store(fail, atomic::Ordering::Relaxed);
    }

    pub fn commits(&self) -> Vec<ChangeRequest> {
        self.log.commits(&self.target)
    }
}

#[async_trait]
impl ConfigClient for RecordingConfigClient {
    async fn commit(&self, txn: ChangeRequest) -> Result<(), BoxError> {
        if self.fail.load(atomic::Ordering::Relaxed) {
            return Err("commit rejected".into());
        }
        self.log.push(Event::Commit(self.target.clone(), txn));
        Ok(())
    }
}

// ===== impl RecordingPuntStateClient =====

impl RecordingPuntStateClient {
    pub fn new(target: &str, log: EventLog) -> Self {
        RecordingPuntStateClient {
            target: target.to_owned(),
            log,
            fail: AtomicBool::new(false),
            delay: Mutex::new(None),
        }
    }

    pub fn set_fail(&self, fail: bool) {
        self.fail.store(fail, atomic::Ordering::Relaxed);
    }

    // Delays every subsequent update by the given duration.
    pub fn set_delay(&self, delay: Option<Duration>) {
        *self.delay.lock().unwrap() = delay;
    }

    pub fn punt_states(&self) -> Vec<(PuntMetadata, PuntState)> {
        self.log.punt_states(&self.target)
    }
}

#[async_trait]
impl PuntStateClient for RecordingPuntStateClient {
    async fn update_punt_state(
        &self,
        metadata: PuntMetadata,
        state: PuntState,
    ) -> Result<(), BoxError> {
        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail.load(atomic::Ordering::Relaxed) {
            return Err("punt state update rejected".into());
        }
        self.log
            .push(Event::PuntStateUpdate(self.target.clone(), metadata, state));
        Ok(())
    }
}

// ===== impl MockCnfRegistry =====

impl MockCnfRegistry {
    pub fn new(mode: CnfMode, log: EventLog) -> Self {
        MockCnfRegistry {
            mode,
            log,
            cnfs: Default::default(),
        }
    }

    // Registers a remote CNF.
    pub fn with_cnf(mut self, label: &str) -> Self {
        let cnf = MockCnf {
            cfg_client: Arc::new(RecordingConfigClient::new(
                label,
                self.log.clone(),
            )),
            punt_client: Arc::new(RecordingPuntStateClient::new(
                label,
                self.log.clone(),
            )),
        };
        self.cnfs.insert(label.to_owned(), cnf);
        self
    }

    pub fn cfg_client(&self, label: &str) -> Arc<RecordingConfigClient> {
        self.cnfs[label].cfg_client.clone()
    }

    pub fn punt_client(&self, label: &str) -> Arc<RecordingPuntStateClient> {
        self.cnfs[label].punt_client.clone()
    }
}

#[async_trait]
impl CnfRegistry for MockCnfRegistry {
    fn cnf_mode(&self) -> CnfMode {
        self.mode
    }

    async fn cnf_cfg_client(
        &self,
        label: &str,
    ) -> Result<Arc<dyn ConfigClient>, BoxError> {
        match self.cnfs.get(label) {
            Some(cnf) => Ok(cnf.cfg_client.clone()),
            None => Err(format!("unknown CNF {label}").into()),
        }
    }

    async fn cnf_punt_client(
        &self,
        label: &str,
    ) -> Result<Arc<dyn PuntStateClient>, BoxError> {
        match self.cnfs.get(label) {
            Some(cnf) => Ok(cnf.punt_client.clone()),
            None => Err(format!("unknown CNF {label}").into()),
        }
    }
}

// ===== global functions =====

// Returns the items updated by a change request.
pub fn updated_items(txn: &ChangeRequest) -> Vec<&ConfigItem> {
    txn.ops()
        .filter_map(|(_, op)| match op {
            ChangeOp::Update(item) => Some(item),
            ChangeOp::Delete(_) => None,
        })
        .collect()
}

// Returns the items deleted by a change request.
pub fn deleted_items(txn: &ChangeRequest) -> Vec<&ConfigItem> {
    txn.ops()
        .filter_map(|(_, op)| match op {
            ChangeOp::Delete(item) => Some(item),
            ChangeOp::Update(_) => None,
        })
        .collect()
}

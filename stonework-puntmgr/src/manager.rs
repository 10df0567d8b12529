//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use stonework_utils::task::TaskGroup;
use tokio::sync::{Mutex, oneshot};

use crate::api::{
    CnfMode, CnfRegistry, ConfigClient, InterfaceIndex, NsPlugin,
    PuntStateClient, Reconciler,
};
use crate::config::Config;
use crate::debug::Debug;
use crate::error::{Error, Result};
use crate::handler::{self, Handlers};
use crate::interconnect::InterconnectManager;
use crate::notification;
use crate::punt::{
    InterconnectType, Punt, PuntId, PuntMetadata, PuntRequest, PuntState,
};
use crate::southbound::{ChangeRequest, Dependency, microservice_key};

// Collaborators of the punt manager.
#[derive(Clone, Debug)]
pub struct Deps {
    pub agent_label: String,
    pub cnf_registry: Arc<dyn CnfRegistry>,
    pub cfg_client: Arc<dyn ConfigClient>,
    pub reconciler: Arc<dyn Reconciler>,
    pub if_index: Arc<dyn InterfaceIndex>,
    pub ns_plugin: Arc<dyn NsPlugin>,
}

// Orchestrator of the punt lifecycle.
//
// Cloning yields another handle to the same manager.
#[derive(Clone, Debug)]
pub struct PuntManager {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    agent_label: String,
    rpc_timeout: Duration,
    cnf_registry: Arc<dyn CnfRegistry>,
    cfg_client: Arc<dyn ConfigClient>,
    reconciler: Arc<dyn Reconciler>,
    state: Mutex<State>,
    // Change requests and state updates being sent in the background.
    pushes: TaskGroup,
}

#[derive(Debug)]
struct State {
    punts: BTreeMap<PuntId, Punt>,
    handlers: Handlers,
    ic_manager: InterconnectManager,
    // Last background push of each punt. Pushes of the same punt are chained
    // so that they're sent in order.
    last_push: HashMap<PuntId, (u64, oneshot::Receiver<()>)>,
    push_seq: u64,
    // Generation of the last punt added locally.
    punt_generation: u64,
}

// Clients of a remote CNF.
#[derive(Clone, Debug)]
struct Remote {
    cfg_client: Arc<dyn ConfigClient>,
    punt_client: Arc<dyn PuntStateClient>,
}

// ===== impl PuntManager =====

impl PuntManager {
    pub fn new(config: Config, deps: Deps) -> PuntManager {
        let ic_manager = InterconnectManager::new(
            &config,
            deps.agent_label.clone(),
            deps.if_index.clone(),
            deps.ns_plugin,
        );
        let state = State {
            punts: Default::default(),
            handlers: handler::handlers(deps.if_index),
            ic_manager,
            last_push: Default::default(),
            push_seq: 0,
            punt_generation: 0,
        };

        PuntManager {
            inner: Arc::new(Inner {
                agent_label: deps.agent_label,
                rpc_timeout: config.rpc_timeout(),
                cnf_registry: deps.cnf_registry,
                cfg_client: deps.cfg_client,
                reconciler: deps.reconciler,
                state: Mutex::new(state),
                pushes: Default::default(),
            }),
        }
    }

    // Realizes a punt requested by the given CNF.
    //
    // The interconnects and dataplane configuration are prepared
    // synchronously, then sent in the background. The punt becomes CREATED
    // once they're sent.
    //
    // # Panics
    //
    // Panics when running as a StoneWork module, where punts are created by
    // the central orchestrator only.
    pub async fn add_punt(
        &self,
        cnf_ms_label: &str,
        key: &str,
        request: PuntRequest,
    ) -> Result<()> {
        let mode = self.inner.cnf_registry.cnf_mode();
        if mode == CnfMode::StoneworkModule {
            panic!("punts can't be added in the CNF mode {mode}");
        }
        if mode == CnfMode::Standalone
            && request.interconnect_type == InterconnectType::Memif
        {
            return Err(Error::MemifInStandalone);
        }

        let id = self.punt_id(cnf_ms_label, key, &request.label);
        let punt_type = request.punt_type();
        let mut state = self.inner.state.lock().await;
        if state.punts.contains_key(&id) {
            return Err(Error::PuntExists(id));
        }
        Debug::PuntAdd(&id, punt_type).log();

        let remote = self.inner.remote(mode, &id).await?;
        let State {
            punts,
            handlers,
            ic_manager,
            punt_generation,
            ..
        } = &mut *state;
        let handler = handlers
            .get_mut(&punt_type)
            .ok_or(Error::UnsupportedPuntType(punt_type))?;

        // Realize the interconnects and the VPP-side configuration.
        let reqs = handler.interconnect_reqs(&request);
        let mut local_txn = ChangeRequest::internal();
        let mut remote_txn = remote.as_ref().map(|_| ChangeRequest::internal());
        let interconnects = ic_manager.add_interconnects(
            &mut local_txn,
            remote_txn.as_mut(),
            &id,
            &reqs,
            request.interconnect_type,
            request.enable_gso,
            handler.can_multiplex(),
        )?;
        if let Err(error) = handler.configure_punt(
            &mut local_txn,
            &id,
            &request,
            &interconnects,
            false,
        ) {
            ic_manager.rollback(&id);
            return Err(error);
        }

        // Store the punt.
        let metadata = PuntMetadata::new(id.clone(), interconnects);
        *punt_generation += 1;
        let generation = *punt_generation;
        punts.insert(
            id.clone(),
            Punt {
                state: PuntState::Init,
                request: Some(request),
                metadata: metadata.clone(),
                generation,
            },
        );
        Debug::PuntStateChange(&id, PuntState::Init).log();
        if let Some(remote) = &remote {
            self.inner
                .send_punt_state(&remote.punt_client, metadata, PuntState::Init)
                .await;
        }

        // Send the configuration in the background.
        let inner = self.inner.clone();
        let push_id = id.clone();
        self.spawn_push(&mut state, &id, async move {
            inner.commit(None, local_txn).await;
            if let (Some(remote), Some(txn)) = (&remote, remote_txn) {
                inner.commit(Some(remote), txn).await;
            }
            inner
                .punt_created(&push_id, generation, remote.as_ref())
                .await;
        });

        Ok(())
    }

    // Removes a punt.
    //
    // The "punt gone" notification is published right away, while the
    // configuration is retracted in the background.
    //
    // # Panics
    //
    // Panics when running as a StoneWork module, where punts are removed by
    // the central orchestrator only.
    pub async fn del_punt(
        &self,
        cnf_ms_label: &str,
        key: &str,
        label: &str,
    ) -> Result<()> {
        let mode = self.inner.cnf_registry.cnf_mode();
        if mode == CnfMode::StoneworkModule {
            panic!("punts can't be deleted in the CNF mode {mode}");
        }

        let id = self.punt_id(cnf_ms_label, key, label);
        let mut state = self.inner.state.lock().await;
        let Some(punt) = state.punts.get(&id) else {
            return Err(Error::UnknownPunt(id));
        };
        let Some(request) = punt.request.clone() else {
            return Err(Error::UnknownPunt(id));
        };
        let metadata = punt.metadata.clone();
        Debug::PuntDelete(&id).log();

        let remote = self.inner.remote(mode, &id).await?;
        let State {
            punts,
            handlers,
            ic_manager,
            ..
        } = &mut *state;
        let punt_type = request.punt_type();
        let handler = handlers
            .get_mut(&punt_type)
            .ok_or(Error::UnsupportedPuntType(punt_type))?;

        // Retract the VPP-side configuration and release the interconnects.
        let mut local_txn = ChangeRequest::internal();
        let mut remote_txn = remote.as_ref().map(|_| ChangeRequest::internal());
        let interconnects = ic_manager.interconnects(&id);
        handler.configure_punt(
            &mut local_txn,
            &id,
            &request,
            &interconnects,
            true,
        )?;
        ic_manager.del_interconnects(&mut local_txn, remote_txn.as_mut(), &id);

        punts.remove(&id);
        Debug::PuntStateChange(&id, PuntState::Deleted).log();
        if let Some(remote) = &remote {
            self.inner
                .send_punt_state(&remote.punt_client, metadata, PuntState::Deleted)
                .await;
        }
        notification::notify(self.inner.reconciler.as_ref(), &id, true);

        // Retract the configuration in the background, CNF side first.
        let inner = self.inner.clone();
        self.spawn_push(&mut state, &id, async move {
            if let (Some(remote), Some(txn)) = (&remote, remote_txn) {
                inner.commit(Some(remote), txn).await;
            }
            inner.commit(None, local_txn).await;
        });

        Ok(())
    }

    // Processes a punt state update received from the central orchestrator.
    pub async fn update_punt_state(
        &self,
        metadata: PuntMetadata,
        new_state: PuntState,
    ) -> Result<()> {
        let id = metadata.id.clone();
        let mut state = self.inner.state.lock().await;
        let reconciler = self.inner.reconciler.as_ref();

        match new_state {
            PuntState::Unknown => {
                let current = state.punts.get(&id).map(|punt| punt.state);
                Debug::PuntStateIgnored(&id, current, new_state).log();
            }
            PuntState::Init => {
                if state.punts.contains_key(&id) {
                    return Err(Error::PuntAlreadyKnown(id));
                }
                state.punts.insert(
                    id.clone(),
                    Punt {
                        state: new_state,
                        request: None,
                        metadata,
                        generation: 0,
                    },
                );
                Debug::PuntStateChange(&id, new_state).log();
            }
            PuntState::Created => {
                let Some(punt) = state.punts.get_mut(&id) else {
                    return Err(Error::MissingInitState(id));
                };
                if punt.state != PuntState::Init {
                    Debug::PuntStateIgnored(&id, Some(punt.state), new_state)
                        .log();
                    return Ok(());
                }
                punt.state = new_state;
                Debug::PuntStateChange(&id, new_state).log();
                notification::notify(reconciler, &id, false);
            }
            PuntState::Deleted => {
                let Some(punt) = state.punts.remove(&id) else {
                    Debug::PuntStateIgnored(&id, None, new_state).log();
                    return Ok(());
                };
                Debug::PuntStateChange(&id, new_state).log();
                if punt.state == PuntState::Created {
                    notification::notify(reconciler, &id, true);
                }
            }
        }

        Ok(())
    }

    // Returns the metadata of the given punt.
    pub async fn punt_metadata(
        &self,
        cnf_ms_label: &str,
        key: &str,
        label: &str,
    ) -> Option<PuntMetadata> {
        let id = self.punt_id(cnf_ms_label, key, label);
        let state = self.inner.state.lock().await;
        state.punts.get(&id).map(|punt| punt.metadata.clone())
    }

    // Returns the metadata of all punts of the given CNF.
    pub async fn all_cnf_punts(&self, cnf_ms_label: &str) -> Vec<PuntMetadata> {
        let cnf_ms_label = self.normalize_label(cnf_ms_label);
        let state = self.inner.state.lock().await;
        state
            .punts
            .iter()
            .filter(|(id, _)| id.cnf_ms_label == cnf_ms_label)
            .map(|(_, punt)| punt.metadata.clone())
            .collect()
    }

    // Returns the dependencies that must be satisfied before the punt can be
    // added.
    pub async fn punt_dependencies(
        &self,
        cnf_ms_label: &str,
        request: &PuntRequest,
    ) -> Vec<Dependency> {
        let mut deps = vec![];
        if !cnf_ms_label.is_empty() && cnf_ms_label != self.inner.agent_label {
            deps.push(Dependency::key(
                format!("{}-cnf-microservice", request.label),
                microservice_key(cnf_ms_label),
            ));
        }

        let state = self.inner.state.lock().await;
        if let Some(handler) = state.handlers.get(&request.punt_type()) {
            deps.extend(handler.punt_dependencies(request));
        }
        deps
    }

    // Returns the name of the Linux VRF device corresponding to the given
    // VPP VRF.
    pub fn linux_vrf_name(&self, vrf: u32) -> String {
        InterconnectManager::linux_vrf_name(vrf)
    }

    // Waits for all background pushes to complete.
    pub async fn flush(&self) {
        self.inner.pushes.drain().await;
    }

    fn normalize_label<'a>(&'a self, cnf_ms_label: &'a str) -> &'a str {
        if cnf_ms_label.is_empty() {
            &self.inner.agent_label
        } else {
            cnf_ms_label
        }
    }

    fn punt_id(&self, cnf_ms_label: &str, key: &str, label: &str) -> PuntId {
        PuntId::new(
            self.normalize_label(cnf_ms_label).to_owned(),
            key.to_owned(),
            label.to_owned(),
        )
    }

    // Spawns a background push, to be run after the previous pushes of the
    // same punt.
    fn spawn_push<F>(&self, state: &mut State, id: &PuntId, push: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let (done_tx, done_rx) = oneshot::channel::<()>();
        state.push_seq += 1;
        let seq = state.push_seq;
        let prev = state
            .last_push
            .insert(id.clone(), (seq, done_rx))
            .map(|(_, prev)| prev);

        let inner = self.inner.clone();
        let id = id.clone();
        self.inner.pushes.spawn(async move {
            if let Some(prev) = prev {
                // Dropped sender means done.
                let _ = prev.await;
            }
            push.await;
            drop(done_tx);

            let mut state = inner.state.lock().await;
            if state
                .last_push
                .get(&id)
                .is_some_and(|(last_seq, _)| *last_seq == seq)
            {
                state.last_push.remove(&id);
            }
        });
    }
}

// ===== impl Inner =====

impl Inner {
    // Returns the clients of the CNF owning the punt, unless it's handled
    // locally.
    async fn remote(&self, mode: CnfMode, id: &PuntId) -> Result<Option<Remote>> {
        if mode != CnfMode::Stonework || id.cnf_ms_label == self.agent_label {
            return Ok(None);
        }

        let label = &id.cnf_ms_label;
        let cfg_client = self
            .cnf_registry
            .cnf_cfg_client(label)
            .await
            .map_err(|error| Error::CnfRegistry(label.clone(), error))?;
        let punt_client = self
            .cnf_registry
            .cnf_punt_client(label)
            .await
            .map_err(|error| Error::CnfRegistry(label.clone(), error))?;

        Ok(Some(Remote {
            cfg_client,
            punt_client,
        }))
    }

    // Sends a change request to the local dataplane or to a remote CNF.
    async fn commit(&self, remote: Option<&Remote>, txn: ChangeRequest) {
        if txn.is_empty() {
            return;
        }

        let (target, client) = match remote {
            Some(remote) => ("remote", &remote.cfg_client),
            None => ("local", &self.cfg_client),
        };
        Debug::ChangeRequestSend(target, &txn).log();
        if let Err(error) = client.commit(txn).await {
            Error::CommitError(target, error).log();
        }
    }

    // Informs the punt manager of a remote CNF about a punt state change.
    async fn send_punt_state(
        &self,
        client: &Arc<dyn PuntStateClient>,
        metadata: PuntMetadata,
        state: PuntState,
    ) {
        let id = metadata.id.clone();
        match tokio::time::timeout(
            self.rpc_timeout,
            client.update_punt_state(metadata, state),
        )
        .await
        {
            Ok(Ok(())) => (),
            Ok(Err(error)) => Error::RpcError(id, error).log(),
            Err(_) => Error::RpcTimeout(id).log(),
        }
    }

    // Marks a punt as CREATED once its configuration was sent.
    //
    // A punt deleted and added again in the meantime is left alone: the
    // push of the new incarnation takes care of it.
    async fn punt_created(
        &self,
        id: &PuntId,
        generation: u64,
        remote: Option<&Remote>,
    ) {
        let mut state = self.state.lock().await;
        let Some(punt) = state
            .punts
            .get_mut(id)
            .filter(|punt| punt.generation == generation)
        else {
            Debug::PuntRemovedBeforeCreated(id).log();
            return;
        };
        if punt.state != PuntState::Init {
            Debug::PuntStateIgnored(id, Some(punt.state), PuntState::Created)
                .log();
            return;
        }
        punt.state = PuntState::Created;
        let metadata = punt.metadata.clone();
        Debug::PuntStateChange(id, PuntState::Created).log();

        if let Some(remote) = remote {
            self.send_punt_state(&remote.punt_client, metadata, PuntState::Created)
                .await;
        }
        notification::notify(self.reconciler.as_ref(), id, false);
    }
}

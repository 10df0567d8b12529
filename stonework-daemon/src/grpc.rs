//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use async_trait::async_trait;
use stonework_puntmgr::PuntManager;
use stonework_puntmgr::api::{BoxError, PuntStateClient};
use stonework_puntmgr::error::Error;
use stonework_puntmgr::punt::{
    Endpoints, Interconnect, InterconnectId, InterconnectInterface, PuntId,
    PuntMetadata, PuntState,
};
use stonework_utils::task::Task;
use tonic::transport::{Channel, Server};
use tonic::{Request, Response, Status};
use tracing::{debug, debug_span, trace};

use crate::config;

mod proto {
    #![allow(clippy::all)]
    tonic::include_proto!("stonework.puntmgr");
    pub use punt_manager_client::PuntManagerClient;
    pub use punt_manager_server::{PuntManager, PuntManagerServer};
}

struct PuntManagerService {
    manager: PuntManager,
}

// Punt manager client of a StoneWork module.
#[derive(Debug)]
pub struct GrpcPuntStateClient {
    client: proto::PuntManagerClient<Channel>,
}

// ===== impl proto::PuntManager =====

#[tonic::async_trait]
impl proto::PuntManager for PuntManagerService {
    async fn update_punt_state(
        &self,
        grpc_request: Request<proto::UpdatePuntStateReq>,
    ) -> Result<Response<proto::UpdatePuntStateResp>, Status> {
        let grpc_request = grpc_request.into_inner();
        debug_span!("grpc").in_scope(|| {
            debug!("received UpdatePuntState() request");
            trace!("{:?}", grpc_request);
        });

        let metadata = grpc_request.metadata.ok_or_else(|| {
            Status::invalid_argument("Missing 'metadata' field")
        })?;
        let metadata = PuntMetadata::try_from(metadata)?;
        let state = proto::PuntState::try_from(grpc_request.state)
            .map_err(|_| Status::invalid_argument("Invalid punt state"))?;

        self.manager
            .update_punt_state(metadata, state.into())
            .await
            .map_err(error_status)?;

        Ok(Response::new(proto::UpdatePuntStateResp {}))
    }
}

// ===== impl GrpcPuntStateClient =====

impl GrpcPuntStateClient {
    pub fn new(channel: Channel) -> Self {
        GrpcPuntStateClient {
            client: proto::PuntManagerClient::new(channel),
        }
    }
}

#[async_trait]
impl PuntStateClient for GrpcPuntStateClient {
    async fn update_punt_state(
        &self,
        metadata: PuntMetadata,
        state: PuntState,
    ) -> Result<(), BoxError> {
        let request = proto::UpdatePuntStateReq {
            metadata: Some((&metadata).into()),
            state: proto::PuntState::from(state) as i32,
        };
        let mut client = self.client.clone();
        client.update_punt_state(request).await?;
        Ok(())
    }
}

// ===== From/TryFrom conversion methods =====

impl From<PuntState> for proto::PuntState {
    fn from(state: PuntState) -> proto::PuntState {
        match state {
            PuntState::Unknown => proto::PuntState::Unknown,
            PuntState::Init => proto::PuntState::Init,
            PuntState::Created => proto::PuntState::Created,
            PuntState::Deleted => proto::PuntState::Deleted,
        }
    }
}

impl From<proto::PuntState> for PuntState {
    fn from(state: proto::PuntState) -> PuntState {
        match state {
            proto::PuntState::Unknown => PuntState::Unknown,
            proto::PuntState::Init => PuntState::Init,
            proto::PuntState::Created => PuntState::Created,
            proto::PuntState::Deleted => PuntState::Deleted,
        }
    }
}

impl From<&PuntMetadata> for proto::PuntMetadata {
    fn from(metadata: &PuntMetadata) -> proto::PuntMetadata {
        proto::PuntMetadata {
            id: Some(proto::PuntId {
                cnf_ms_label: metadata.id.cnf_ms_label.clone(),
                key: metadata.id.key.clone(),
                label: metadata.id.label.clone(),
            }),
            interconnects: metadata
                .interconnects
                .iter()
                .map(proto::Interconnect::from)
                .collect(),
        }
    }
}

impl TryFrom<proto::PuntMetadata> for PuntMetadata {
    type Error = Status;

    fn try_from(metadata: proto::PuntMetadata) -> Result<Self, Self::Error> {
        let id = metadata
            .id
            .ok_or_else(|| Status::invalid_argument("Missing punt ID"))?;
        let interconnects = metadata
            .interconnects
            .into_iter()
            .map(Interconnect::try_from)
            .collect::<Result<_, _>>()?;

        Ok(PuntMetadata {
            id: PuntId::new(id.cnf_ms_label, id.key, id.label),
            interconnects,
        })
    }
}

impl From<&Interconnect> for proto::Interconnect {
    fn from(ic: &Interconnect) -> proto::Interconnect {
        let endpoints = match &ic.endpoints {
            Endpoints::Interfaces { vpp, cnf } => {
                proto::interconnect::Endpoints::Interfaces(
                    proto::InterfacePair {
                        vpp: Some(vpp.into()),
                        cnf: Some(cnf.into()),
                    },
                )
            }
            Endpoints::Socket { path } => {
                proto::interconnect::Endpoints::SocketPath(path.clone())
            }
        };

        proto::Interconnect {
            vpp_selector: ic.id.vpp_selector.clone(),
            cnf_selector: ic.id.cnf_selector.clone(),
            shared: ic.shared,
            endpoints: Some(endpoints),
        }
    }
}

impl TryFrom<proto::Interconnect> for Interconnect {
    type Error = Status;

    fn try_from(ic: proto::Interconnect) -> Result<Self, Self::Error> {
        let endpoints = match ic.endpoints {
            Some(proto::interconnect::Endpoints::Interfaces(pair)) => {
                let (Some(vpp), Some(cnf)) = (pair.vpp, pair.cnf) else {
                    return Err(Status::invalid_argument(
                        "Incomplete interconnect interfaces",
                    ));
                };
                Endpoints::Interfaces {
                    vpp: vpp.try_into()?,
                    cnf: cnf.try_into()?,
                }
            }
            Some(proto::interconnect::Endpoints::SocketPath(path)) => {
                Endpoints::Socket { path }
            }
            None => {
                return Err(Status::invalid_argument(
                    "Missing interconnect endpoints",
                ));
            }
        };

        Ok(Interconnect {
            id: InterconnectId::new(ic.vpp_selector, ic.cnf_selector),
            endpoints,
            shared: ic.shared,
        })
    }
}

impl From<&InterconnectInterface> for proto::Interface {
    fn from(iface: &InterconnectInterface) -> proto::Interface {
        proto::Interface {
            name: iface.name.clone(),
            host_name: iface.host_name.clone(),
            phys_address: iface.phys_address.to_string(),
            ip_addresses: iface
                .ip_addresses
                .iter()
                .map(ToString::to_string)
                .collect(),
            vrf: iface.vrf,
            vrf_device: iface.vrf_device.clone().unwrap_or_default(),
        }
    }
}

impl TryFrom<proto::Interface> for InterconnectInterface {
    type Error = Status;

    fn try_from(iface: proto::Interface) -> Result<Self, Self::Error> {
        let phys_address = iface
            .phys_address
            .parse()
            .map_err(|_| Status::invalid_argument("Invalid MAC address"))?;
        let ip_addresses = iface
            .ip_addresses
            .iter()
            .map(|addr| addr.parse())
            .collect::<Result<_, _>>()
            .map_err(|_| Status::invalid_argument("Invalid IP address"))?;

        Ok(InterconnectInterface {
            name: iface.name,
            host_name: iface.host_name,
            phys_address,
            ip_addresses,
            vrf: iface.vrf,
            vrf_device: (!iface.vrf_device.is_empty())
                .then_some(iface.vrf_device),
        })
    }
}

// ===== global functions =====

// Starts the punt manager service of a StoneWork module.
pub(crate) fn start(config: &config::Grpc, manager: PuntManager) -> Task<()> {
    let address = config
        .address
        .parse()
        .expect("Failed to parse gRPC server address");
    let service = PuntManagerService { manager };

    Task::spawn(async move {
        Server::builder()
            .add_service(proto::PuntManagerServer::new(service))
            .serve(address)
            .await
            .expect("Failed to start gRPC service");
    })
}

// ===== helper functions =====

fn error_status(error: Error) -> Status {
    error.log();
    match error {
        Error::PuntAlreadyKnown(..) => Status::already_exists(error.to_string()),
        Error::MissingInitState(..) | Error::UnknownPunt(..) => {
            Status::failed_precondition(error.to_string())
        }
        _ => Status::internal(error.to_string()),
    }
}

// ===== unit tests =====

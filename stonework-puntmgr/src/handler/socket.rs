//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use crate::error::{Error, Result};
use crate::handler::{PuntHandler, apply};
use crate::link::{AfUnixLink, InterconnectReq, Link, socket_selector};
use crate::punt::{Interconnect, PuntConfig, PuntId, PuntRequest, SocketPunt};
use crate::southbound::{
    ChangeRequest, ConfigItem, Dependency, PuntException, PuntToHost,
};

// Punts packets to a Unix socket opened by the CNF.
#[derive(Debug)]
pub struct SocketHandler;

// ===== impl SocketHandler =====

impl PuntHandler for SocketHandler {
    fn interconnect_reqs(&self, request: &PuntRequest) -> Vec<InterconnectReq> {
        let PuntConfig::PuntToSocket(punt) = &request.config else {
            return vec![];
        };

        let item = registration(punt);
        let socket_path = match punt {
            SocketPunt::Exception { socket_path, .. }
            | SocketPunt::ToHost { socket_path, .. } => socket_path.clone(),
        };
        vec![InterconnectReq::new(
            Link::AfUnix(AfUnixLink { socket_path }),
            socket_selector(&item.key()),
        )]
    }

    fn punt_dependencies(&self, _request: &PuntRequest) -> Vec<Dependency> {
        vec![]
    }

    fn can_multiplex(&self) -> bool {
        false
    }

    fn configure_punt(
        &mut self,
        txn: &mut ChangeRequest,
        _id: &PuntId,
        request: &PuntRequest,
        _interconnects: &[Interconnect],
        remove: bool,
    ) -> Result<()> {
        let PuntConfig::PuntToSocket(punt) = &request.config else {
            return Err(Error::UnsupportedPuntType(request.punt_type()));
        };

        apply(txn, [registration(punt)], remove);

        Ok(())
    }
}

// ===== helper functions =====

// Returns the dataplane registration of the punt.
fn registration(punt: &SocketPunt) -> ConfigItem {
    match punt {
        SocketPunt::Exception {
            reason,
            socket_path,
        } => PuntException {
            reason: reason.clone(),
            socket_path: socket_path.clone(),
        }
        .into(),
        SocketPunt::ToHost {
            l3_protocol,
            l4_protocol,
            port,
            socket_path,
        } => PuntToHost {
            l3_protocol: *l3_protocol,
            l4_protocol: *l4_protocol,
            port: *port,
            socket_path: socket_path.clone(),
        }
        .into(),
    }
}

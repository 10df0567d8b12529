//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use ipnetwork::Ipv4Network;
use stonework_utils::ip::AddressFamily;
use tracing::{error, warn};

use crate::api::BoxError;
use crate::punt::{PuntId, PuntType};

pub type Result<T> = std::result::Result<T, Error>;

// Punt manager errors.
#[derive(Debug)]
pub enum Error {
    // Request validation
    PuntExists(PuntId),
    UnknownPunt(PuntId),
    UnsupportedPuntType(PuntType),
    MemifInStandalone,
    // Resource allocation
    InterconnectConflict(String),
    MissingInterconnect(String),
    SubnetPoolExhausted(Ipv4Network),
    MemifIdsExhausted(String),
    NetNsResolve(String, BoxError),
    UnknownNetNsId(u32),
    InterfaceNotFound(String),
    InterfaceWithoutAddress(String),
    AbxRule(AbxRuleError),
    // Remote CNF lookup
    CnfRegistry(String, BoxError),
    // Punt state updates
    PuntAlreadyKnown(PuntId),
    MissingInitState(PuntId),
    // Transport
    RpcError(PuntId, BoxError),
    RpcTimeout(PuntId),
    CommitError(&'static str, BoxError),
    NotificationError(String, BoxError),
}

// ABX rule errors.
#[derive(Debug)]
pub enum AbxRuleError {
    InvalidNetwork(String),
    MixedAddressFamilies {
        source: String,
        destination: String,
    },
    MissingAddressFamily {
        network: String,
        af: AddressFamily,
        interface: String,
    },
}

// ===== impl Error =====

impl Error {
    pub fn log(&self) {
        match self {
            Error::PuntExists(id)
            | Error::UnknownPunt(id)
            | Error::PuntAlreadyKnown(id)
            | Error::MissingInitState(id)
            | Error::RpcTimeout(id) => {
                warn!(%id, "{}", self);
            }
            Error::UnsupportedPuntType(punt_type) => {
                warn!(%punt_type, "{}", self);
            }
            Error::MemifInStandalone => {
                warn!("{}", self);
            }
            Error::InterconnectConflict(selector)
            | Error::MissingInterconnect(selector) => {
                warn!(%selector, "{}", self);
            }
            Error::SubnetPoolExhausted(pool) => {
                error!(%pool, "{}", self);
            }
            Error::MemifIdsExhausted(socket) => {
                error!(%socket, "{}", self);
            }
            Error::NetNsResolve(label, error)
            | Error::CnfRegistry(label, error) => {
                warn!(%label, error = %with_source(error.as_ref()), "{}", self);
            }
            Error::UnknownNetNsId(ns_id) => {
                warn!(%ns_id, "{}", self);
            }
            Error::InterfaceNotFound(name)
            | Error::InterfaceWithoutAddress(name) => {
                warn!(%name, "{}", self);
            }
            Error::AbxRule(error) => {
                warn!(error = %with_source(error), "{}", self);
            }
            Error::RpcError(id, error) => {
                warn!(%id, error = %with_source(error.as_ref()), "{}", self);
            }
            Error::CommitError(target, error) => {
                error!(%target, error = %with_source(error.as_ref()), "{}", self);
            }
            Error::NotificationError(key, error) => {
                warn!(%key, error = %with_source(error.as_ref()), "{}", self);
            }
        }
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::PuntExists(id) => {
                write!(f, "punt already exists: {id}")
            }
            Error::UnknownPunt(id) => {
                write!(f, "unknown punt: {id}")
            }
            Error::UnsupportedPuntType(punt_type) => {
                write!(f, "punt type {punt_type} is not supported")
            }
            Error::MemifInStandalone => {
                write!(f, "memif interconnects are not supported by standalone CNFs")
            }
            Error::InterconnectConflict(selector) => {
                write!(f, "interconnect conflict for selector {selector}")
            }
            Error::MissingInterconnect(selector) => {
                write!(f, "interconnect for selector {selector} was not realized")
            }
            Error::SubnetPoolExhausted(..) => {
                write!(f, "no free subnet left for interconnects")
            }
            Error::MemifIdsExhausted(..) => {
                write!(f, "no free memif ID left")
            }
            Error::NetNsResolve(label, ..) => {
                write!(f, "failed to resolve network namespace of {label}")
            }
            Error::UnknownNetNsId(ns_id) => {
                write!(f, "network namespace with ID {ns_id} was not found")
            }
            Error::InterfaceNotFound(name) => {
                write!(f, "required VPP interface {name} was not found")
            }
            Error::InterfaceWithoutAddress(name) => {
                write!(f, "VPP interface {name} does not have any IP address assigned")
            }
            Error::AbxRule(..) => {
                write!(f, "invalid ABX ACL rule")
            }
            Error::CnfRegistry(label, ..) => {
                write!(f, "failed to obtain client of CNF {label}")
            }
            Error::PuntAlreadyKnown(id) => {
                write!(f, "punt {id} is already known")
            }
            Error::MissingInitState(id) => {
                write!(f, "missing INIT state update for punt {id}")
            }
            Error::RpcError(..) => {
                write!(f, "failed to update punt state of remote CNF")
            }
            Error::RpcTimeout(..) => {
                write!(f, "timed out updating punt state of remote CNF")
            }
            Error::CommitError(..) => {
                write!(f, "failed to send change request")
            }
            Error::NotificationError(..) => {
                write!(f, "failed to push punt notification")
            }
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::NetNsResolve(_, error)
            | Error::CnfRegistry(_, error)
            | Error::RpcError(_, error)
            | Error::CommitError(_, error)
            | Error::NotificationError(_, error) => Some(error.as_ref()),
            Error::AbxRule(error) => Some(error),
            _ => None,
        }
    }
}

impl From<AbxRuleError> for Error {
    fn from(error: AbxRuleError) -> Error {
        Error::AbxRule(error)
    }
}

// ===== impl AbxRuleError =====

impl std::fmt::Display for AbxRuleError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AbxRuleError::InvalidNetwork(network) => {
                write!(f, "failed to parse IP network {network}")
            }
            AbxRuleError::MixedAddressFamilies {
                source,
                destination,
            } => {
                write!(
                    f,
                    "rule networks {source} and {destination} are of different address families"
                )
            }
            AbxRuleError::MissingAddressFamily {
                network,
                af,
                interface,
            } => {
                write!(
                    f,
                    "rule network {network} is {af} but interface {interface} has no {af} address assigned"
                )
            }
        }
    }
}

impl std::error::Error for AbxRuleError {}

// ===== global functions =====

fn with_source<E: std::error::Error + ?Sized>(error: &E) -> String {
    if let Some(source) = error.source() {
        format!("{} ({})", error, with_source(source))
    } else {
        error.to_string()
    }
}

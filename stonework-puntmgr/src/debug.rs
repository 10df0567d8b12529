//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use tracing::{debug, debug_span, trace};

use crate::punt::{InterconnectId, PuntId, PuntState, PuntType};
use crate::southbound::ChangeRequest;

// Punt manager debug messages.
#[derive(Debug)]
pub enum Debug<'a> {
    PuntAdd(&'a PuntId, PuntType),
    PuntDelete(&'a PuntId),
    PuntStateChange(&'a PuntId, PuntState),
    PuntStateIgnored(&'a PuntId, Option<PuntState>, PuntState),
    PuntRemovedBeforeCreated(&'a PuntId),
    InterconnectCreate(&'a InterconnectId, &'a PuntId),
    InterconnectShare(&'a InterconnectId, &'a PuntId, usize),
    InterconnectRelease(&'a InterconnectId, &'a PuntId, usize),
    InterconnectDelete(&'a InterconnectId),
    NetNsCreate(&'a str, u32),
    NotificationPush(&'a str, bool),
    ChangeRequestSend(&'static str, &'a ChangeRequest),
}

// ===== impl Debug =====

impl Debug<'_> {
    // Log debug message using the tracing API.
    pub(crate) fn log(&self) {
        match self {
            Debug::PuntAdd(id, punt_type) => {
                debug_span!("punt", %id).in_scope(|| {
                    debug!(%punt_type, "{}", self);
                })
            }
            Debug::PuntDelete(id) | Debug::PuntRemovedBeforeCreated(id) => {
                debug_span!("punt", %id).in_scope(|| {
                    debug!("{}", self);
                })
            }
            Debug::PuntStateChange(id, state) => {
                debug_span!("punt", %id).in_scope(|| {
                    debug!(%state, "{}", self);
                })
            }
            Debug::PuntStateIgnored(id, current, update) => {
                debug_span!("punt", %id).in_scope(|| {
                    let current = current
                        .map(|state| state.to_string())
                        .unwrap_or_else(|| "none".to_owned());
                    debug!(%current, %update, "{}", self);
                })
            }
            Debug::InterconnectCreate(ic_id, punt_id) => {
                debug_span!("interconnect", id = %ic_id).in_scope(|| {
                    debug!(punt = %punt_id, "{}", self);
                })
            }
            Debug::InterconnectShare(ic_id, punt_id, users)
            | Debug::InterconnectRelease(ic_id, punt_id, users) => {
                debug_span!("interconnect", id = %ic_id).in_scope(|| {
                    debug!(punt = %punt_id, %users, "{}", self);
                })
            }
            Debug::InterconnectDelete(ic_id) => {
                debug_span!("interconnect", id = %ic_id).in_scope(|| {
                    debug!("{}", self);
                })
            }
            Debug::NetNsCreate(label, ns_id) => {
                debug!(%label, %ns_id, "{}", self);
            }
            Debug::NotificationPush(key, created) => {
                debug!(%key, %created, "{}", self);
            }
            Debug::ChangeRequestSend(target, txn) => {
                debug!(%target, ops = %txn.len(), "{}", self);
                if let Ok(data) = serde_json::to_string(txn) {
                    trace!(%target, %data, "change request contents");
                }
            }
        }
    }
}

impl std::fmt::Display for Debug<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Debug::PuntAdd(..) => {
                write!(f, "adding punt")
            }
            Debug::PuntDelete(..) => {
                write!(f, "deleting punt")
            }
            Debug::PuntStateChange(..) => {
                write!(f, "punt state change")
            }
            Debug::PuntStateIgnored(..) => {
                write!(f, "ignoring punt state update")
            }
            Debug::PuntRemovedBeforeCreated(..) => {
                write!(f, "punt removed before it was fully configured")
            }
            Debug::InterconnectCreate(..) => {
                write!(f, "interconnect created")
            }
            Debug::InterconnectShare(..) => {
                write!(f, "interconnect shared")
            }
            Debug::InterconnectRelease(..) => {
                write!(f, "interconnect released")
            }
            Debug::InterconnectDelete(..) => {
                write!(f, "interconnect deleted")
            }
            Debug::NetNsCreate(..) => {
                write!(f, "new network namespace learned")
            }
            Debug::NotificationPush(..) => {
                write!(f, "pushing punt notification")
            }
            Debug::ChangeRequestSend(..) => {
                write!(f, "sending change request")
            }
        }
    }
}

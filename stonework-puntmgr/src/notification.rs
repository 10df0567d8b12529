//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use crate::api::Reconciler;
use crate::debug::Debug;
use crate::error::Error;
use crate::punt::PuntId;

// Returns the key of the notification published once the given punt is fully
// created.
pub fn notification_key(cnf_name: &str, item_key: &str, label: &str) -> String {
    format!("punt/cnf-name/{cnf_name}/item/{item_key}/punt-label/{label}")
}

// Returns the prefix of notification keys, with the punt label and
// potentially a suffix of the item key trimmed.
pub fn notification_key_prefix(cnf_name: &str, item_key_or_prefix: &str) -> String {
    format!("punt/cnf-name/{cnf_name}/item/{item_key_or_prefix}")
}

// Checks whether the given key is a punt notification key.
pub fn is_notification_key(key: &str) -> bool {
    key.starts_with("punt/cnf-name/") && key.contains("/punt-label/")
}

// Publishes the notification of a created punt, or retracts it when the punt
// is removed.
pub(crate) fn notify(reconciler: &dyn Reconciler, id: &PuntId, removed: bool) {
    let key = notification_key(&id.cnf_ms_label, &id.key, &id.label);
    Debug::NotificationPush(&key, !removed).log();

    // Empty value means created, no value means removed.
    let value = (!removed).then_some(());
    if let Err(error) = reconciler.push_sb_notification(key.clone(), value) {
        Error::NotificationError(key, error).log();
    }
}

// ===== unit tests =====

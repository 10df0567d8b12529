//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::path::PathBuf;

use stonework_puntmgr::api::{BoxError, NsHandle, NsPlugin};

// Resolves microservices to the named network namespaces created for them.
#[derive(Debug)]
pub struct NamedNsPlugin {
    dir: PathBuf,
}

// ===== impl NamedNsPlugin =====

impl NamedNsPlugin {
    const DFLT_DIR: &'static str = "/run/netns";
}

impl Default for NamedNsPlugin {
    fn default() -> NamedNsPlugin {
        NamedNsPlugin {
            dir: PathBuf::from(Self::DFLT_DIR),
        }
    }
}

impl NsPlugin for NamedNsPlugin {
    fn namespace_handle(&self, label: &str) -> Result<NsHandle, BoxError> {
        let path = self.dir.join(label);
        let stat = nix::sys::stat::stat(&path)?;
        Ok(NsHandle {
            dev: stat.st_dev as u64,
            ino: stat.st_ino as u64,
        })
    }
}

// ===== unit tests =====

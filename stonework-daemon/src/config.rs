//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

#![allow(clippy::derivable_impls)]

use ipnetwork::IpNetwork;
use serde::Deserialize;
use stonework_puntmgr::api::CnfMode;
use stonework_puntmgr::punt::PuntRequest;

#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "kebab-case")]
pub struct Config {
    pub agent_label: String,
    pub mode: CnfMode,
    pub logging: Logging,
    pub grpc: Grpc,
    pub puntmgr: stonework_puntmgr::config::Config,
    pub cnfs: Vec<Cnf>,
    pub interfaces: Vec<Interface>,
    pub punts: Vec<Punt>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Logging {
    pub journald: LoggingJournald,
    pub file: LoggingFile,
    pub stdout: LoggingStdout,
}

#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingJournald {
    pub enabled: bool,
}

#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingFile {
    pub enabled: bool,
    pub dir: String,
    pub name: String,
    pub rotation: LoggingFileRotation,
    #[serde(flatten)]
    pub fmt: LoggingFmt,
}

#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingStdout {
    pub enabled: bool,
    #[serde(flatten)]
    pub fmt: LoggingFmt,
}

#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingFmt {
    pub style: LoggingFmtStyle,
    pub colors: bool,
    pub show_thread_id: bool,
    pub show_source: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoggingFileRotation {
    #[default]
    Never,
    Hourly,
    Daily,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoggingFmtStyle {
    Compact,
    Full,
    Json,
    Pretty,
}

#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "kebab-case")]
pub struct Grpc {
    // Address of the punt manager service (StoneWork modules only).
    pub address: String,
    // Timeout of connections to StoneWork modules.
    pub connect_timeout_secs: u64,
}

// StoneWork module known to the central agent.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Cnf {
    pub label: String,
    // gRPC endpoint of the module, e.g. "http://cnf1:9111".
    pub address: String,
}

// VPP interface available for punting.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Interface {
    pub name: String,
    #[serde(default)]
    pub addresses: Vec<IpNetwork>,
}

// Punt requested by configuration.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct Punt {
    // Requesting microservice (the agent itself if empty).
    #[serde(default)]
    pub cnf: String,
    pub key: String,
    pub request: PuntRequest,
}

// ===== impl Config =====

impl Config {
    const DFLT_FILEPATH: &'static str = "/etc/stonework.toml";

    pub(crate) fn load(config_file: Option<&str>) -> Config {
        let config_file = config_file.unwrap_or(Config::DFLT_FILEPATH);

        match std::fs::read_to_string(config_file) {
            Ok(config_str) => toml::from_str(&config_str)
                .expect("Failed to parse configuration file"),
            Err(err) => {
                eprintln!("Failed to load configuration file: {err}");
                eprintln!("Falling back to default configuration...");
                Config::default()
            }
        }
    }
}

impl Default for Config {
    fn default() -> Config {
        Config {
            agent_label: "stonework".to_owned(),
            mode: CnfMode::default(),
            logging: Default::default(),
            grpc: Default::default(),
            puntmgr: Default::default(),
            cnfs: Default::default(),
            interfaces: Default::default(),
            punts: Default::default(),
        }
    }
}

// ===== impl LoggingJournald =====

impl Default for LoggingJournald {
    fn default() -> LoggingJournald {
        LoggingJournald { enabled: false }
    }
}

// ===== impl LoggingFile =====

impl Default for LoggingFile {
    fn default() -> LoggingFile {
        LoggingFile {
            enabled: true,
            dir: "/var/log".to_owned(),
            name: "stonework-agent.log".to_owned(),
            rotation: Default::default(),
            fmt: Default::default(),
        }
    }
}

// ===== impl LoggingStdout =====

impl Default for LoggingStdout {
    fn default() -> LoggingStdout {
        LoggingStdout {
            enabled: false,
            fmt: Default::default(),
        }
    }
}

// ===== impl LoggingFmt =====

impl Default for LoggingFmt {
    fn default() -> LoggingFmt {
        LoggingFmt {
            style: LoggingFmtStyle::Full,
            colors: false,
            show_thread_id: false,
            show_source: false,
        }
    }
}

// ===== impl Grpc =====

impl Default for Grpc {
    fn default() -> Grpc {
        Grpc {
            address: "[::]:9111".to_owned(),
            connect_timeout_secs: 3,
        }
    }
}

// ===== unit tests =====

//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

mod config;
mod grpc;
mod journal;
mod netns;
mod registry;

use std::sync::Arc;

use clap::{App, Arg};
use config::{Config, LoggingFileRotation, LoggingFmtStyle};
use journal::{ConfigInterfaceIndex, JournalConfigClient, JournalReconciler};
use netns::NamedNsPlugin;
use registry::StaticCnfRegistry;
use stonework_puntmgr::api::CnfMode;
use stonework_puntmgr::{Deps, PuntManager};
use tokio::signal::unix::{SignalKind, signal};
use tokio::sync::mpsc;
use tracing::level_filters::LevelFilter;
use tracing::{error, info};
use tracing_appender::rolling;
use tracing_subscriber::Layer;
use tracing_subscriber::prelude::*;

fn init_tracing(config: &config::Logging) {
    // Enable logging to journald.
    let journald = config.journald.enabled.then(|| {
        tracing_journald::layer().expect("couldn't connect to journald")
    });

    // Enable logging to a file.
    let file = config.file.enabled.then(|| {
        let file_appender = match config.file.rotation {
            LoggingFileRotation::Never => {
                rolling::never(&config.file.dir, &config.file.name)
            }
            LoggingFileRotation::Hourly => {
                rolling::hourly(&config.file.dir, &config.file.name)
            }
            LoggingFileRotation::Daily => {
                rolling::daily(&config.file.dir, &config.file.name)
            }
        };

        let log_level_filter = LevelFilter::from_level(tracing::Level::TRACE);
        let layer = tracing_subscriber::fmt::layer()
            .with_writer(file_appender)
            .with_target(false)
            .with_thread_ids(config.file.fmt.show_thread_id)
            .with_file(config.file.fmt.show_source)
            .with_line_number(config.file.fmt.show_source)
            .with_ansi(config.file.fmt.colors);
        let layer = match config.file.fmt.style {
            LoggingFmtStyle::Compact => layer.compact().boxed(),
            LoggingFmtStyle::Full => layer.boxed(),
            LoggingFmtStyle::Json => layer.json().boxed(),
            LoggingFmtStyle::Pretty => layer.pretty().boxed(),
        };
        layer.with_filter(log_level_filter)
    });

    // Enable logging to stdout.
    let stdout = config.stdout.enabled.then(|| {
        let log_level_filter = LevelFilter::from_level(tracing::Level::TRACE);
        let layer = tracing_subscriber::fmt::layer()
            .with_target(false)
            .with_thread_ids(config.stdout.fmt.show_thread_id)
            .with_file(config.stdout.fmt.show_source)
            .with_line_number(config.stdout.fmt.show_source)
            .with_ansi(config.stdout.fmt.colors);
        let layer = match config.stdout.fmt.style {
            LoggingFmtStyle::Compact => layer.compact().boxed(),
            LoggingFmtStyle::Full => layer.boxed(),
            LoggingFmtStyle::Json => layer.json().boxed(),
            LoggingFmtStyle::Pretty => layer.pretty().boxed(),
        };
        layer.with_filter(log_level_filter)
    });

    let env_filter = tracing_subscriber::EnvFilter::builder()
        .with_default_directive("stonework=debug".parse().unwrap())
        .from_env_lossy();
    tracing_subscriber::registry()
        .with(env_filter)
        .with(journald)
        .with(file)
        .with(stdout)
        .init();
}

fn signal_listener() -> mpsc::Receiver<()> {
    let (signal_tx, signal_rx) = mpsc::channel(1);

    tokio::task::spawn(async move {
        let mut sigint = signal(SignalKind::interrupt()).unwrap();
        let mut sigterm = signal(SignalKind::terminate()).unwrap();

        tokio::select! {
            _ = sigint.recv() => {
                info!("received SIGINT");
                let _ = signal_tx.send(()).await;
            },
            _ = sigterm.recv() => {
                info!("received SIGTERM");
                let _ = signal_tx.send(()).await;
            }
        }
    });

    signal_rx
}

fn punt_manager(config: &Config) -> PuntManager {
    let deps = Deps {
        agent_label: config.agent_label.clone(),
        cnf_registry: Arc::new(StaticCnfRegistry::new(
            config.mode,
            &config.grpc,
            &config.cnfs,
        )),
        cfg_client: Arc::new(JournalConfigClient::new(&config.agent_label)),
        reconciler: Arc::new(JournalReconciler),
        if_index: Arc::new(ConfigInterfaceIndex::new(&config.interfaces)),
        ns_plugin: Arc::new(NamedNsPlugin::default()),
    };
    PuntManager::new(config.puntmgr.clone(), deps)
}

// Adds the punts listed in the configuration file.
async fn add_punts(config: &Config, manager: &PuntManager) {
    for punt in &config.punts {
        let label = punt.request.label.clone();
        if let Err(error) = manager
            .add_punt(&punt.cnf, &punt.key, punt.request.clone())
            .await
        {
            error!(cnf = %punt.cnf, key = %punt.key, %label, %error, "failed to add punt");
        }
    }
}

// Removes the punts listed in the configuration file, in reverse order.
async fn del_punts(config: &Config, manager: &PuntManager) {
    for punt in config.punts.iter().rev() {
        let label = &punt.request.label;
        if let Err(error) = manager.del_punt(&punt.cnf, &punt.key, label).await
        {
            error!(cnf = %punt.cnf, key = %punt.key, %label, %error, "failed to delete punt");
        }
    }
}

// ===== main =====

fn main() {
    // Parse command-line parameters.
    let matches = App::new("StoneWork agent")
        .version(env!("CARGO_PKG_VERSION"))
        .arg(
            Arg::with_name("config")
                .short("c")
                .long("config")
                .value_name("file")
                .help("Specify an alternative configuration file."),
        )
        .get_matches();

    // Read configuration file.
    let config_file = matches.value_of("config");
    let config = Config::load(config_file);

    // Initialize tracing.
    init_tracing(&config.logging);

    // We're ready to go!
    info!(label = %config.agent_label, mode = %config.mode, "starting up");

    // Main loop.
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .expect("failed to create async runtime")
        .block_on(async {
            // Spawn signal listener.
            let mut signal_rx = signal_listener();

            let manager = punt_manager(&config);
            match config.mode {
                // Punts are realized by the central agent.
                CnfMode::StoneworkModule => {
                    let server = grpc::start(&config.grpc, manager.clone());
                    tokio::select! {
                        _ = signal_rx.recv() => (),
                        result = server => {
                            if let Err(error) = result {
                                error!(%error, "gRPC server task failed");
                            }
                        }
                    }
                }
                CnfMode::Standalone | CnfMode::Stonework => {
                    add_punts(&config, &manager).await;
                    let _ = signal_rx.recv().await;

                    // Retract the configured punts.
                    del_punts(&config, &manager).await;
                }
            }

            // Wait for the dataplane to catch up.
            manager.flush().await;
        });

    info!("exiting");
}

// SPDX-FileCopyrightText: 2026 TableTalk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `tabletalk serve`: assemble the adapter stack and run the gateway until
//! SIGINT/SIGTERM.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use tabletalk_catalog::AgentCatalog;
use tabletalk_config::TableTalkConfig;
use tabletalk_core::{
    CompletionAdapter, RealtimeAdapter, StorageAdapter, TableTalkError,
};
use tabletalk_gateway::{GatewayState, Orchestrator, start_server};
use tabletalk_llm::CompletionClient;
use tabletalk_realtime::RealtimeIssuer;
use tabletalk_session::SessionRegistry;
use tabletalk_speech::build_speech_adapter;
use tabletalk_storage::SqliteStorage;

/// Installs signal handlers for SIGTERM and SIGINT.
///
/// Returns a [`CancellationToken`] that is cancelled when either signal is
/// received.
fn install_signal_handler() -> CancellationToken {
    let token = CancellationToken::new();
    let token_clone = token.clone();

    tokio::spawn(async move {
        let ctrl_c = tokio::signal::ctrl_c();

        #[cfg(unix)]
        {
            use tokio::signal::unix::{SignalKind, signal};
            let mut sigterm =
                signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");

            tokio::select! {
                _ = ctrl_c => {
                    info!("received SIGINT (Ctrl+C), initiating shutdown");
                }
                _ = sigterm.recv() => {
                    info!("received SIGTERM, initiating shutdown");
                }
            }
        }

        #[cfg(not(unix))]
        {
            let _ = ctrl_c.await;
            info!("received Ctrl+C, initiating shutdown");
        }

        token_clone.cancel();
        debug!("shutdown signal handler completed");
    });

    token
}

/// Run the dialogue server until shutdown.
pub async fn run_serve(config: TableTalkConfig) -> Result<(), TableTalkError> {
    let storage = Arc::new(SqliteStorage::new(config.storage.clone()));
    storage.initialize().await?;
    let storage: Arc<dyn StorageAdapter + Send + Sync> = storage;

    let completion: Arc<dyn CompletionAdapter + Send + Sync> =
        Arc::new(CompletionClient::new(config.llm.clone())?);
    let speech = build_speech_adapter(&config.speech)?;
    let realtime: Arc<dyn RealtimeAdapter + Send + Sync> =
        Arc::new(RealtimeIssuer::new(config.realtime.clone())?);
    if !realtime.is_enabled() {
        info!("realtime voice disabled; credential requests will be refused");
    }

    let catalog = Arc::new(AgentCatalog::new(storage.clone()));
    let registry = Arc::new(SessionRegistry::new(
        Duration::from_secs(config.session.idle_timeout_secs),
        Duration::from_secs(config.session.greeting_interval_secs),
    ));

    let shutdown = install_signal_handler();
    let sweeper = registry.clone().spawn_sweeper(
        storage.clone(),
        Duration::from_secs(config.session.sweep_interval_secs),
        shutdown.clone(),
    );

    let orchestrator = Arc::new(Orchestrator::new(
        storage.clone(),
        completion,
        speech,
        realtime,
        catalog,
        registry,
        config.agent.performance_mode,
        config.agent.system_prompt.clone(),
    ));

    let state = GatewayState {
        orchestrator: orchestrator.clone(),
        heartbeat_interval: Duration::from_secs(config.session.heartbeat_interval_secs),
        start_time: std::time::Instant::now(),
    };

    info!(agent = %config.agent.name, "starting TableTalk server");
    start_server(&config.server, state, shutdown.clone()).await?;

    // Graceful drain: background tasks, sweeper, WAL checkpoint.
    orchestrator.drain().await;
    let _ = sweeper.await;
    storage.close().await?;
    info!("shutdown complete");
    Ok(())
}

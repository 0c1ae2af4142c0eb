// SPDX-FileCopyrightText: 2026 Betasign Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `betasign serve`, `betasign refresh`, and `betasign lookup`.

use std::sync::Arc;

use betasign_config::BetasignConfig;
use betasign_core::{BetasignError, RecordStore};
use betasign_gateway::{GatewayState, HealthState, ServerConfig};
use betasign_prometheus::PrometheusAdapter;
use tracing::{debug, error, info, warn};

use crate::app;
use crate::shutdown;

/// Runs the refresh loop and, when enabled, the lookup service until a
/// shutdown signal arrives.
pub async fn run_serve(config: BetasignConfig) -> Result<(), BetasignError> {
    info!(name = %config.service.name, "starting betasign serve");

    let prometheus = if config.prometheus.enabled {
        match PrometheusAdapter::new() {
            Ok(adapter) => {
                info!("prometheus metrics enabled");
                Some(Arc::new(adapter))
            }
            Err(e) => {
                warn!(error = %e, "prometheus initialization failed, continuing without metrics");
                None
            }
        }
    } else {
        debug!("prometheus metrics disabled by configuration");
        None
    };
    let prometheus_render = prometheus.clone().map(
        |adapter| -> Arc<dyn Fn() -> String + Send + Sync> { Arc::new(move || adapter.render()) },
    );

    let store = app::open_store(&config).await?;
    let app::RefreshApp {
        refresh,
        limiter,
        mut adapters,
    } = app::build_refresh(&config, store.clone())?;
    if let Some(adapter) = prometheus {
        adapters.push(adapter);
    }
    let refresh = Arc::new(refresh);

    let cancel = shutdown::install_signal_handler();

    let gateway = if config.gateway.enabled {
        let state = GatewayState {
            store: store.clone(),
            health: HealthState {
                prometheus_render,
                refresh: Some(refresh.handle()),
                limiter: Some(limiter),
                adapters: adapters.clone(),
                ..HealthState::new()
            },
        };
        let server_config = ServerConfig {
            host: config.gateway.host.clone(),
            port: config.gateway.port,
        };
        let cancel = cancel.clone();
        Some(tokio::spawn(async move {
            let result = betasign_gateway::start_server(&server_config, state, cancel.clone()).await;
            if result.is_err() {
                cancel.cancel();
            }
            result
        }))
    } else {
        debug!("lookup service disabled by configuration");
        None
    };

    refresh.run(cancel.clone()).await;

    let mut outcome = Ok(());
    if let Some(handle) = gateway {
        match handle.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                error!(error = %e, "lookup service failed");
                outcome = Err(e);
            }
            Err(e) => error!(error = %e, "lookup service task panicked"),
        }
    }

    app::shutdown_adapters(store.as_ref(), &adapters).await?;
    info!("betasign stopped");
    outcome
}

/// Runs a single refresh cycle and prints its report as JSON.
pub async fn run_refresh(config: BetasignConfig) -> Result<(), BetasignError> {
    let store = app::open_store(&config).await?;
    let app::RefreshApp {
        refresh,
        limiter,
        adapters,
    } = app::build_refresh(&config, store.clone())?;

    let report = refresh.run_cycle().await;
    info!(peak_in_flight = limiter.peak(), "refresh finished");
    app::shutdown_adapters(store.as_ref(), &adapters).await?;

    let report = report?;
    println!("{}", to_pretty_json(&report)?);
    Ok(())
}

/// Prints every stored record for `identifier` as JSON.
pub async fn run_lookup(config: BetasignConfig, identifier: &str) -> Result<(), BetasignError> {
    let store = app::open_store(&config).await?;
    let records = store.query(identifier).await;
    app::shutdown_adapters(store.as_ref(), &[]).await?;

    let records = records?;
    if records.is_empty() {
        return Err(BetasignError::not_found(format!("betas for {identifier}")));
    }
    println!("{}", to_pretty_json(&records)?);
    Ok(())
}

fn to_pretty_json(value: &impl serde::Serialize) -> Result<String, BetasignError> {
    serde_json::to_string_pretty(value)
        .map_err(|e| BetasignError::Internal(format!("failed to serialize output: {e}")))
}

/// Initializes the tracing subscriber. `RUST_LOG` overrides the configured level.
///
/// Logs go to stderr so command output on stdout stays machine-readable.
pub fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("betasign={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .with_writer(std::io::stderr)
        .init();
}

//! otlp-relay: a single-process telemetry router.
//!
//! Telemetry arrives over OTLP (gRPC and HTTP), flows through per-kind
//! pipelines of ordered processors, and fans out to push exporters (OTLP/gRPC,
//! OTLP/HTTP) or a pull exporter (a Prometheus scrape endpoint). Everything is
//! wired from a collector-style YAML document; see [`config`].

pub mod cli;
pub mod config;
pub mod error;
pub mod exporters;
pub mod otlp;
pub mod pipeline;
pub mod processors;
pub mod receivers;
pub mod signal;
pub mod telemetry;

use anyhow::Context;
use config::{Config, ReceiverConfig};
use exporters::{build_exporter, ExporterHandle};
use futures::future::join_all;
use indexmap::IndexMap;
use pipeline::{Pipeline, PipelineEngine};
use processors::build_processor;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info, warn};

/// Assembles the engine from validated config: one shared handle per
/// referenced exporter, fresh processor instances per pipeline.
fn build_engine(config: &Config) -> anyhow::Result<Arc<PipelineEngine>> {
    let referenced: HashSet<&String> = config
        .pipelines
        .values()
        .flat_map(|p| p.exporters.iter())
        .collect();
    let mut handles: IndexMap<String, Arc<ExporterHandle>> = IndexMap::new();
    for (name, exporter_config) in &config.exporters {
        if referenced.contains(name) {
            handles.insert(name.clone(), build_exporter(name, exporter_config));
        }
    }

    let mut pipelines = Vec::new();
    for (name, pipeline_config) in &config.pipelines {
        let processors = pipeline_config
            .processors
            .iter()
            .map(|p| build_processor(p, &config.processors[p]))
            .collect();
        let exporters = pipeline_config
            .exporters
            .iter()
            .map(|e| handles[e].clone())
            .collect();
        pipelines.push(Arc::new(Pipeline::new(
            name,
            pipeline_config.kind,
            processors,
            exporters,
        )));
    }

    Ok(Arc::new(PipelineEngine::new(
        pipelines,
        handles.into_values().collect(),
    )))
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = match signal(SignalKind::terminate()) {
            Ok(stream) => stream,
            Err(err) => {
                error!(error = %err, "failed to install SIGTERM handler");
                let _ = tokio::signal::ctrl_c().await;
                return;
            }
        };
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = sigterm.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}

/// Runs the relay until SIGINT/SIGTERM, then shuts down in order: receivers
/// stop accepting, processor buffers flush, exporters drain under the
/// configured deadline.
pub async fn run(config: Config) -> anyhow::Result<()> {
    let engine = build_engine(&config)?;

    // Start exporters before receivers so a pull exporter that cannot bind
    // fails startup before any telemetry is accepted.
    for pipeline in engine.pipelines() {
        info!(pipeline = pipeline.name(), kind = %pipeline.kind(), "pipeline configured");
    }
    for handle in engine.exporters() {
        handle
            .start()
            .await
            .with_context(|| format!("failed to start exporter {:?}", handle.name()))?;
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut servers = Vec::new();

    let referenced_receivers: HashSet<&String> = config
        .pipelines
        .values()
        .flat_map(|p| p.receivers.iter())
        .collect();
    for (name, receiver) in &config.receivers {
        if !referenced_receivers.contains(name) {
            continue;
        }
        let ReceiverConfig::Otlp { grpc, http } = receiver;
        if let Some(addr) = grpc {
            let listener = receivers::bind_grpc(*addr)
                .await
                .with_context(|| format!("receiver {name:?}"))?;
            let engine = engine.clone();
            let shutdown = shutdown_rx.clone();
            servers.push(tokio::spawn(async move {
                if let Err(err) = receivers::serve_grpc(listener, engine, shutdown).await {
                    error!(error = %err, "grpc receiver terminated");
                }
            }));
        }
        if let Some(addr) = http {
            let listener = receivers::bind_http(*addr)
                .await
                .with_context(|| format!("receiver {name:?}"))?;
            let engine = engine.clone();
            let shutdown = shutdown_rx.clone();
            servers.push(tokio::spawn(async move {
                if let Err(err) = receivers::serve_http(listener, engine, shutdown).await {
                    error!(error = %err, "http receiver terminated");
                }
            }));
        }
    }

    engine.start_ticker(shutdown_rx.clone());
    info!("relay started");

    shutdown_signal().await;
    info!("shutdown signal received, draining");
    let _ = shutdown_tx.send(true);

    // Receivers finish their in-flight requests before buffers flush, so
    // nothing dispatched after the signal lands in an already-drained
    // pipeline. The wait, the flush and the exporter drains share one
    // deadline budget.
    let started = std::time::Instant::now();
    if tokio::time::timeout(config.shutdown_timeout, join_all(servers.iter_mut()))
        .await
        .is_err()
    {
        warn!("receivers did not stop within the shutdown deadline, aborting them");
        for server in &servers {
            server.abort();
        }
    }

    let remaining = config.shutdown_timeout.saturating_sub(started.elapsed());
    engine.shutdown(remaining).await;
    info!("relay stopped");
    Ok(())
}

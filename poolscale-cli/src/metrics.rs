// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Prometheus metrics for the autoscaler loop.

use lazy_static::lazy_static;
use prometheus::{register_int_counter_vec, register_int_gauge_vec, IntCounterVec, IntGaugeVec};
use tokio::io::AsyncWriteExt;
use tokio::net::TcpListener;

use poolscale_core::{InMemoryPoolRegistry, ProvisioningError, TickReport};

lazy_static! {
    pub static ref WORKERS_REQUESTED: IntCounterVec = register_int_counter_vec!(
        "poolscale_workers_requested_total",
        "Total number of accepted worker requests",
        &["kind"]
    )
    .unwrap();
    pub static ref WORKERS_DESTROYED: IntCounterVec = register_int_counter_vec!(
        "poolscale_workers_destroyed_total",
        "Total number of workers destroyed after their grace period",
        &["kind"]
    )
    .unwrap();
    pub static ref PROVISIONING_FAILURES: IntCounterVec = register_int_counter_vec!(
        "poolscale_provisioning_failures_total",
        "Total number of failed worker requests and destructions",
        &["operation"]
    )
    .unwrap();
    pub static ref POOL_SIZE: IntGaugeVec = register_int_gauge_vec!(
        "poolscale_pool_size",
        "Number of workers in the pool at the start of the tick",
        &["kind"]
    )
    .unwrap();
    pub static ref POOL_TARGET: IntGaugeVec = register_int_gauge_vec!(
        "poolscale_pool_target",
        "Tracked target pool size",
        &["kind"]
    )
    .unwrap();
}

/// Fold one tick report into the exported metrics.
pub fn record_tick(report: &TickReport, registry: &InMemoryPoolRegistry) {
    for kind_report in &report.kinds {
        let kind = kind_report.kind.as_str();
        WORKERS_REQUESTED
            .with_label_values(&[kind])
            .inc_by(kind_report.requested as u64);
        WORKERS_DESTROYED
            .with_label_values(&[kind])
            .inc_by(kind_report.destroyed as u64);
        POOL_SIZE
            .with_label_values(&[kind])
            .set(kind_report.pool_size as i64);
        if let Some(target) = kind_report.target {
            POOL_TARGET.with_label_values(&[kind]).set(target as i64);
        }
    }

    for kind in &report.forgotten {
        if !registry.contains(kind) {
            let _ = POOL_SIZE.remove_label_values(&[kind.as_str()]);
            let _ = POOL_TARGET.remove_label_values(&[kind.as_str()]);
        }
    }

    for failure in &report.failures {
        let operation = match failure {
            ProvisioningError::ProvisioningFailure { .. } => "request",
            ProvisioningError::DestructionFailure { .. } => "destroy",
        };
        PROVISIONING_FAILURES.with_label_values(&[operation]).inc();
    }
}

/// Start the metrics server in a background task.
pub fn start_metrics_server(port: u16) {
    // Force initialization of metrics
    lazy_static::initialize(&WORKERS_REQUESTED);
    lazy_static::initialize(&WORKERS_DESTROYED);
    lazy_static::initialize(&PROVISIONING_FAILURES);
    lazy_static::initialize(&POOL_SIZE);
    lazy_static::initialize(&POOL_TARGET);

    tokio::spawn(async move {
        let addr = format!("0.0.0.0:{}", port);
        match TcpListener::bind(&addr).await {
            Ok(listener) => {
                tracing::info!("Metrics server starting on {}", addr);
                loop {
                    if let Ok((mut socket, _)) = listener.accept().await {
                        tokio::spawn(async move {
                            let body = metrics_handler();
                            let response = format!(
                                "HTTP/1.0 200 OK\r\nConnection: close\r\nContent-Length: {}\r\nContent-Type: text/plain\r\n\r\n{}",
                                body.len(),
                                body
                            );
                            let _ = socket.write_all(response.as_bytes()).await;
                            let _ = socket.flush().await;
                        });
                    }
                }
            }
            Err(e) => {
                tracing::error!("Failed to bind metrics server: {}", e);
            }
        }
    });
}

fn metrics_handler() -> String {
    use prometheus::Encoder;
    let encoder = prometheus::TextEncoder::new();

    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&prometheus::gather(), &mut buffer) {
        tracing::error!("Failed to encode metrics: {}", e);
    }

    String::from_utf8(buffer).unwrap_or_else(|_| String::from("Encoding error"))
}

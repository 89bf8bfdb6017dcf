//! Metrics for import runs.
//!
//! Counters are always recorded through the `metrics` facade; they only leave
//! the process once a Prometheus recorder has been installed with
//! [`init_metrics`].

pub mod importer;

pub use importer::ImporterMetrics;

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::net::SocketAddr;
use std::sync::{Once, OnceLock};
use tracing::{info, warn};

static INIT: Once = Once::new();
static HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Install the global Prometheus recorder.
///
/// With `listen` set, the HTTP exporter is spawned on the current Tokio
/// runtime and serves `/metrics`. Without it, only an in-process recorder is
/// installed so [`render`] can print a snapshot at the end of a batch job.
/// Idempotent.
pub fn init_metrics(listen: Option<SocketAddr>) {
    INIT.call_once(|| {
        let builder = PrometheusBuilder::new();
        match listen {
            Some(addr) => match builder.with_http_listener(addr).install() {
                Ok(()) => info!("Prometheus HTTP exporter started at http://{}/metrics", addr),
                Err(e) => warn!("Failed to start Prometheus exporter on {}: {}", addr, e),
            },
            None => match builder.install_recorder() {
                Ok(handle) => {
                    let _ = HANDLE.set(handle);
                }
                Err(e) => warn!("Failed to install Prometheus recorder: {}", e),
            },
        }
        ImporterMetrics::describe();
    });
}

/// Current metric values in Prometheus text format, when the in-process
/// recorder is installed.
pub fn render() -> Option<String> {
    HANDLE.get().map(|h| h.render())
}

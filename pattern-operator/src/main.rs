#[macro_use]
extern crate log;

use kube::{Api, Client};
use pattern_operator_apis::Pattern;
use prometheus_exporter::{init_meter_provider, start_prometheus_metrics_server};
use std::{collections::HashSet, time::Duration};

mod pattern_controller;
use pattern_controller::*;
mod application;
mod cluster;
mod defaults;
mod errors;
mod finalization;
mod ownership;
mod prometheus_exporter;
mod reconciler;
mod status;
mod store;
mod subscription;
#[cfg(test)]
mod testing;
mod utils;
mod validation;

/// The K8s field manager name, also used as `app.kubernetes.io/managed-by` label.
const MANAGER: &'static str = "pattern-operator";

/// The K8s finalizer name.
///
/// Note, changing the finalizer name is a breaking change and needs
/// additional code to remove the old finalizer (name) from all affected
/// Patterns. So, think twice before you rename it, otherwise users might
/// be stuck with Patterns which cannot be deleted as they have a finalizer
/// set which is not automatically removed.
const FINALIZER: &'static str = "gitops.hybrid-cloud-patterns.io/finalizer";

/// Set by the API server on objects deleted with `propagationPolicy=Orphan`.
const ORPHAN_FINALIZER: &'static str = "orphan";

const DEFAULT_RESYNC_INTERVAL_SECONDS: u64 = 3600;

#[derive(Clone)]
struct Configuration {
    client: Client,
    patterns: Api<Pattern>,
    watch_namespaces: Option<HashSet<String>>,
    /// Interval at which converged Patterns are checked again.
    resync_interval: Duration,
}

impl Configuration {
    pub fn new(client: Client) -> anyhow::Result<Self> {
        let watch_namespaces = env_var("WATCH_NAMESPACES")
            .map(|v| normalize(v.split(",").map(|v| v.trim().to_string()).collect()))
            .flatten();
        let resync_interval = match env_var("RESYNC_INTERVAL_SECONDS") {
            Some(v) => Duration::from_secs(v.parse()?),
            None => Duration::from_secs(DEFAULT_RESYNC_INTERVAL_SECONDS),
        };
        let mut tmp = watch_namespaces.iter().flatten();
        let patterns = if let (Some(ns), None) = (tmp.next(), tmp.next()) {
            // Optimize for the use-case where exactly one watch-namespace is provided.
            info!("Controller is only watching Patterns in namespace {}", ns);
            Api::<Pattern>::namespaced(client.clone(), ns.as_str())
        } else {
            if let Some(namespaces) = &watch_namespaces {
                let namespaces: Vec<&str> = namespaces.iter().map(|v| v.as_str()).collect();
                info!(
                    "Controller is watching Patterns in namespaces: {}",
                    namespaces.join(",")
                );
            } else {
                info!("Controller is watching Patterns in all namespaces");
            }
            Api::<Pattern>::all(client.clone())
        };
        Ok(Configuration {
            client,
            patterns,
            watch_namespaces,
            resync_interval,
        })
    }
}

/// `None` stands for all namespaces.
fn normalize(hs: HashSet<String>) -> Option<HashSet<String>> {
    if hs.is_empty() || hs.contains("*") || hs.contains("") {
        None
    } else {
        Some(hs)
    }
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("failed to install the rustls crypto provider"))?;
    let metrics_addr = env_var("METRICS_LISTEN_ADDR").unwrap_or_else(|| "0.0.0.0".to_string());
    let metrics_port = env_var("METRICS_LISTEN_PORT").unwrap_or_else(|| "9000".to_string());
    let metrics_addr = format!("{}:{}", metrics_addr, metrics_port).parse()?;
    let registry = prometheus::Registry::new();
    let _meter_provider = init_meter_provider(&registry)?;
    let prometheus_metrics_exporter = start_prometheus_metrics_server(metrics_addr, registry);
    let client = Client::try_default().await?;
    let configuration = Configuration::new(client)?;
    let controller = PatternController::new(configuration).start();
    info!("start controllers ...");
    tokio::select! {
       _ = controller => (),
       r = prometheus_metrics_exporter => r?,
    };
    Ok(())
}

use crate::{errors::ControllerError, reconciler::PatternReconciler, utils::metric_name, Configuration};

use futures::StreamExt;
use kube::ResourceExt;
use kube_runtime::{
    controller::{Action, Controller},
    watcher::Config,
};
use opentelemetry::{
    global,
    metrics::{Counter, Histogram, Meter},
    KeyValue,
};
use pattern_operator_apis::Pattern;
use std::{future::Future, sync::Arc, time::Instant};
use tokio::time::{sleep, Duration};

const PATTERN_CONTROLLER: &'static str = "pattern_controller";

/// Runs the [`PatternReconciler`] for every Pattern in the watched namespaces.
pub(crate) struct PatternController {
    configuration: Configuration,
    reconciler: PatternReconciler,
    reconcile_count: Counter<u64>,
    reconcile_duration: Histogram<u64>,
}

impl PatternController {
    pub fn new(configuration: Configuration) -> Self {
        let meter: Meter = global::meter(PATTERN_CONTROLLER);
        let reconcile_count = meter
            .u64_counter(metric_name("reconcile_count"))
            .with_description("Count of Pattern reconcile invocations")
            .build();
        let reconcile_duration = meter
            .u64_histogram(metric_name("reconcile_duration_ms"))
            .with_description("Reconcile duration of Pattern objects in milliseconds")
            .with_unit("ms")
            .with_boundaries(vec![
                25.0, 50.0, 100.0, 200.0, 400.0, 800.0, 1600.0, 3200.0, 6400.0, 12800.0,
            ])
            .build();
        let reconciler = PatternReconciler::from_client(configuration.client.clone());
        Self {
            configuration,
            reconciler,
            reconcile_count,
            reconcile_duration,
        }
    }

    fn is_watched(&self, namespace: &str) -> bool {
        self.configuration
            .watch_namespaces
            .as_ref()
            .map_or(true, |v| v.is_empty() || v.contains(namespace))
    }

    /// Controller triggers this whenever a Pattern changed
    async fn reconcile(object: Arc<Pattern>, ctx: Arc<Self>) -> Result<Action, ControllerError> {
        let me = ctx.as_ref();
        let namespace = object.namespace().unwrap_or_default();
        if !me.is_watched(namespace.as_str()) {
            debug!(
                "Ignore {} as its namespace is not in the set of namespaces to watch",
                object.id()
            );
            return Ok(Action::await_change());
        }
        let start = Instant::now();
        let result = me
            .reconciler
            .reconcile(namespace.as_str(), object.name_any().as_str())
            .await;
        let duration = Instant::now() - start;
        let labels = &[
            KeyValue::new("object_name", object.name_any()),
            KeyValue::new("object_namespace", namespace),
        ];
        me.reconcile_count.add(1, labels);
        me.reconcile_duration
            .record(duration.as_millis() as u64, labels);
        Ok(result?.into_action(me.configuration.resync_interval))
    }

    /// The controller triggers this on reconcile errors
    fn error_policy(_object: Arc<Pattern>, error: &ControllerError, _ctx: Arc<Self>) -> Action {
        Action::requeue(error.requeue_after())
    }

    pub fn start(self) -> impl Future<Output = ()> {
        let reconcile_errors = global::meter(PATTERN_CONTROLLER)
            .u64_counter(metric_name("reconcile_errors"))
            .with_description("Count of reconcile invocation errors for Pattern resources")
            .build();
        let controller = Controller::new(self.configuration.patterns.clone(), Config::default());
        controller
            .run(Self::reconcile, Self::error_policy, Arc::new(self))
            .for_each(move |res| {
                let reconcile_errors = reconcile_errors.clone();
                async move {
                    match res {
                        Ok(o) => {
                            debug!("reconciled {:?}", o);
                        }
                        Err(e) => {
                            let labels = &[];
                            match e {
                                a @ kube_runtime::controller::Error::QueueError { .. } => {
                                    debug!("reconcile failed: {:?}", a);
                                    reconcile_errors.add(1, labels);
                                    // Slow down on errors caused by missing CRDs or permissions.
                                    sleep(Duration::from_secs(30)).await;
                                }
                                a @ kube_runtime::controller::Error::ObjectNotFound { .. } => {
                                    debug!("reconcile failed: {:?}", a);
                                }
                                kube_runtime::controller::Error::ReconcilerFailed(e, o) => {
                                    if e.is_pending() {
                                        debug!("{} pending: {}", o.name, e);
                                    } else {
                                        warn!("reconcile of {} failed: {}", o.name, e);
                                        reconcile_errors.add(1, labels);
                                    }
                                }
                                e => {
                                    warn!("reconcile failed: {:?}", e);
                                    reconcile_errors.add(1, labels);
                                }
                            };
                        }
                    }
                }
            })
    }
}

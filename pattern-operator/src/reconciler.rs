use kube::Client;
use pattern_operator_apis::{Application, Pattern, Subscription};
use std::sync::Arc;

use crate::{
    application::{reconcile_application, APPLICATION_NAMESPACE},
    cluster::{ClusterInfo, KubeClusterInfo},
    defaults::apply_defaults,
    errors::ControllerError,
    finalization::finalize,
    status::{report_step, Requeue},
    store::{KubeStore, ObjectStore},
    subscription::reconcile_subscription,
    utils::{with_finalizer, without_finalizer},
    validation::{post_validation, pre_validation},
    FINALIZER, ORPHAN_FINALIZER,
};

/// Outcome of one step of the convergence pipeline.
#[derive(Debug)]
pub(crate) enum Progress {
    /// Nothing to do, continue with the next step.
    Proceed,
    /// The step acted (or failed), the invocation ends here.
    Performed {
        step: &'static str,
        error: Option<ControllerError>,
    },
}

impl Progress {
    pub(crate) fn performed(step: &'static str, error: Option<ControllerError>) -> Self {
        Progress::Performed { step, error }
    }
}

/// Drives a single Pattern towards its desired state, taking at most one
/// state-advancing action per invocation.
pub(crate) struct PatternReconciler {
    patterns: Arc<dyn ObjectStore<Pattern>>,
    subscriptions: Arc<dyn ObjectStore<Subscription>>,
    applications: Arc<dyn ObjectStore<Application>>,
    cluster: Arc<dyn ClusterInfo>,
}

impl PatternReconciler {
    pub(crate) fn new(
        patterns: Arc<dyn ObjectStore<Pattern>>,
        subscriptions: Arc<dyn ObjectStore<Subscription>>,
        applications: Arc<dyn ObjectStore<Application>>,
        cluster: Arc<dyn ClusterInfo>,
    ) -> Self {
        Self {
            patterns,
            subscriptions,
            applications,
            cluster,
        }
    }

    pub(crate) fn from_client(client: Client) -> Self {
        Self::new(
            Arc::new(KubeStore::<Pattern>::new(client.clone())),
            Arc::new(KubeStore::<Subscription>::new(client.clone())),
            Arc::new(KubeStore::<Application>::new(client.clone())),
            Arc::new(KubeClusterInfo::new(client)),
        )
    }

    pub(crate) async fn reconcile(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Requeue, ControllerError> {
        let pattern = match self.patterns.get(namespace, name).await? {
            Some(pattern) => pattern,
            None => {
                debug!("Pattern {}/{} is gone", namespace, name);
                return Ok(Requeue::Done);
            }
        };
        if pattern.is_deleted() {
            return self.reconcile_deletion(pattern).await;
        }
        // No downstream object is created before the finalizer is in place.
        if let Some(modified) = with_finalizer(&pattern, FINALIZER) {
            let patterns = self.patterns.as_ref();
            return match patterns.update(&pattern, &modified).await {
                Ok(updated) => report_step(patterns, updated, "updated finalizer", None).await,
                Err(e) => report_step(patterns, pattern, "updated finalizer", Some(e)).await,
            };
        }
        self.converge(pattern).await
    }

    async fn reconcile_deletion(&self, pattern: Pattern) -> Result<Requeue, ControllerError> {
        if !(pattern.has_finalizer(FINALIZER) || pattern.has_finalizer(ORPHAN_FINALIZER)) {
            return Ok(Requeue::Done);
        }
        if let Err(e) = finalize(
            self.applications.as_ref(),
            self.cluster.as_ref(),
            &pattern,
        )
        .await
        {
            return report_step(self.patterns.as_ref(), pattern, "finalize", Some(e)).await;
        }
        if let Some(modified) = without_finalizer(&pattern, FINALIZER) {
            info!("Removing finalizer from {}", pattern.id());
            self.patterns.update(&pattern, &modified).await?;
        }
        Ok(Requeue::Done)
    }

    async fn converge(&self, pattern: Pattern) -> Result<Requeue, ControllerError> {
        let patterns = self.patterns.as_ref();
        let mut qualified = match apply_defaults(&pattern, self.cluster.as_ref()).await {
            Ok(qualified) => qualified,
            Err(e) => return report_step(patterns, pattern, "applying defaults", Some(e)).await,
        };
        if let Err(e) = pre_validation(&qualified) {
            return report_step(patterns, qualified, "prerequisite validation", Some(e)).await;
        }
        if let Progress::Performed { step, error } =
            reconcile_subscription(self.subscriptions.as_ref(), &qualified).await
        {
            return report_step(patterns, qualified, step, error).await;
        }
        match self.cluster.namespace_exists(APPLICATION_NAMESPACE).await {
            Ok(true) => (),
            Ok(false) => {
                let e = ControllerError::Pending("waiting for creation".to_string());
                return report_step(patterns, qualified, "check application namespace", Some(e))
                    .await;
            }
            Err(e) => {
                return report_step(patterns, qualified, "check application namespace", Some(e))
                    .await;
            }
        }
        if let Progress::Performed { step, error } =
            reconcile_application(self.applications.as_ref(), &mut qualified).await
        {
            return report_step(patterns, qualified, step, error).await;
        }
        if let Err(e) = post_validation(&qualified) {
            return report_step(patterns, qualified, "validation", Some(e)).await;
        }
        debug!("{} is up to date", qualified.id());
        Ok(Requeue::Done)
    }
}

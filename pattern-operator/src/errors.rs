use std::time::Duration;

use crate::status::ERROR_REQUEUE_DELAY;

/// Extension methods for Kubernetes API errors.
pub(crate) trait ExtKubeApiError {
    fn is_not_found(&self) -> bool;
    fn is_conflict(&self) -> bool;
}

impl ExtKubeApiError for kube::Error {
    fn is_not_found(&self) -> bool {
        match self {
            kube::Error::Api(e) if e.code == 404 || e.code == 410 => true,
            _ => false,
        }
    }

    fn is_conflict(&self) -> bool {
        match self {
            kube::Error::Api(e) if e.code == 409 => true,
            _ => false,
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub(crate) enum ControllerError {
    /// Cluster metadata (identity, platform or ingress domain) could not be
    /// read or has an unexpected shape.
    #[error("{0}")]
    ClusterMetadata(String),
    /// The Pattern cannot be converged without a change of its spec.
    #[error("{0}")]
    InvalidPattern(String),
    /// A downstream object exists but is owned by something else.
    #[error("{0}")]
    OwnershipConflict(String),
    /// Expected, recoverable waiting state (e.g. waiting for a namespace or for
    /// the Application to be removed).
    #[error("{0}")]
    Pending(String),
    /// A reconciliation step failed, the outcome has been persisted in the
    /// Pattern's status.
    #[error("reconcile step {step:?} failed: {source}")]
    Step {
        step: &'static str,
        requeue_after: Duration,
        #[source]
        source: Box<ControllerError>,
    },
    /// Kubernetes API error
    #[error("{0}")]
    KubeApi(#[from] kube::Error),
    /// Serialization errors
    #[error("{0}")]
    Serde(#[from] serde_json::Error),
    /// Any other kind of errors
    #[error("{0}")]
    Any(#[from] anyhow::Error),
}

impl ControllerError {
    /// Delay before the next reconciliation of the affected Pattern.
    pub(crate) fn requeue_after(&self) -> Duration {
        match self {
            ControllerError::Step { requeue_after, .. } => *requeue_after,
            _ => ERROR_REQUEUE_DELAY,
        }
    }

    pub(crate) fn is_pending(&self) -> bool {
        match self {
            ControllerError::Pending(_) => true,
            ControllerError::Step { source, .. } => source.is_pending(),
            _ => false,
        }
    }

    pub(crate) fn is_conflict(&self) -> bool {
        match self {
            ControllerError::KubeApi(e) => e.is_conflict(),
            ControllerError::Step { source, .. } => source.is_conflict(),
            _ => false,
        }
    }
}

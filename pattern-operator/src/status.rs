use kube_runtime::controller::Action;
use pattern_operator_apis::{Pattern, PatternStatus};
use std::time::Duration;

use crate::{errors::ControllerError, store::ObjectStore};

/// Delay after a failed step.
pub(crate) const ERROR_REQUEUE_DELAY: Duration = Duration::from_secs(60);
/// Delay after any step taken while the Pattern is being deleted.
pub(crate) const DELETION_REQUEUE_DELAY: Duration = Duration::from_secs(120);

/// What the scheduler should do after a successful invocation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Requeue {
    /// Converged, nothing left to do until something changes.
    Done,
    /// A step was taken, continue with the next one right away.
    Immediately,
    /// Check again after the given delay.
    After(Duration),
}

impl Requeue {
    pub(crate) fn into_action(self, resync_interval: Duration) -> Action {
        match self {
            Requeue::Done => Action::requeue(resync_interval),
            Requeue::Immediately => Action::requeue(Duration::ZERO),
            Requeue::After(delay) => Action::requeue(delay),
        }
    }
}

/// Fixed delays: slow down while deleting, retry failures after a minute and
/// continue immediately otherwise.
pub(crate) fn next_delay(deleting: bool, failed: bool) -> Option<Duration> {
    if deleting {
        Some(DELETION_REQUEUE_DELAY)
    } else if failed {
        Some(ERROR_REQUEUE_DELAY)
    } else {
        None
    }
}

pub(crate) fn record_step(status: &mut PatternStatus, step: &str, error: Option<&ControllerError>) {
    status.last_step = step.to_string();
    status.last_error = error.map(|e| e.to_string()).unwrap_or_default();
}

/// Persists the outcome of `step` in the status of `pattern` and computes when
/// the Pattern is reconciled next. A failed step is returned as
/// [`ControllerError::Step`] carrying its requeue delay.
pub(crate) async fn report_step(
    patterns: &dyn ObjectStore<Pattern>,
    mut pattern: Pattern,
    step: &'static str,
    error: Option<ControllerError>,
) -> Result<Requeue, ControllerError> {
    let delay = next_delay(pattern.is_deleted(), error.is_some());
    record_step(pattern.status_mut(), step, error.as_ref());
    match &error {
        Some(e) if e.is_pending() => info!("Reconcile step {:?} of {} pending: {}", step, pattern.id(), e),
        Some(e) => warn!("Reconcile step {:?} of {} failed: {}", step, pattern.id(), e),
        None => info!("Reconcile step {:?} of {} complete", step, pattern.id()),
    }
    if let Err(e) = patterns.replace_status(&pattern).await {
        if e.is_conflict() {
            debug!("status of {} changed concurrently: {}", pattern.id(), e);
        } else {
            error!("failed to update status of {}: {}", pattern.id(), e);
        }
        return Err(ControllerError::Step {
            step,
            requeue_after: delay.unwrap_or(ERROR_REQUEUE_DELAY),
            source: Box::new(e),
        });
    }
    match (error, delay) {
        (Some(source), delay) => Err(ControllerError::Step {
            step,
            requeue_after: delay.unwrap_or(ERROR_REQUEUE_DELAY),
            source: Box::new(source),
        }),
        (None, Some(delay)) => Ok(Requeue::After(delay)),
        (None, None) => Ok(Requeue::Immediately),
    }
}

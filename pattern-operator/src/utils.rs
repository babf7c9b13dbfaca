use kube::{Resource, ResourceExt};

/// Returns a copy of `source` carrying `finalizer`, or `None` if it is already present.
pub(crate) fn with_finalizer<T>(source: &T, finalizer: &str) -> Option<T>
where
    T: Clone + Resource,
{
    if source.finalizers().iter().any(|f| f.as_str() == finalizer) {
        None
    } else {
        let mut modified = source.clone();
        modified.finalizers_mut().push(finalizer.to_string());
        Some(modified)
    }
}

/// Returns a copy of `source` without `finalizer`, or `None` if it was not present.
pub(crate) fn without_finalizer<T>(source: &T, finalizer: &str) -> Option<T>
where
    T: Clone + Resource,
{
    let mut modified = source.clone();
    let finalizers = modified.finalizers_mut();
    let len = finalizers.len();
    finalizers.retain(|f| f != finalizer);
    if finalizers.len() != len {
        Some(modified)
    } else {
        None
    }
}

pub(crate) fn metric_name(name: &str) -> String {
    format!("pattern_operator_{}", name)
}

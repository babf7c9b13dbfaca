//! Ownership and drift detection shared by all downstream kinds a Pattern owns.

use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use kube::{Resource, ResourceExt};
use pattern_operator_apis::Pattern;

use crate::errors::ControllerError;

/// A downstream kind owned by a Pattern.
pub(crate) trait OwnedResource: Resource + Clone {
    /// The part of the object managed by this controller.
    type Managed: Clone + PartialEq;

    fn managed(&self) -> Self::Managed;

    fn set_managed(&mut self, managed: Self::Managed);
}

/// Relation between a locally computed target and the live object of the same kind.
#[derive(Debug, PartialEq)]
pub(crate) enum Classification<'a, K> {
    Missing,
    OwnedAndSynced(&'a K),
    OwnedAndDrifted(&'a K),
    NotOwned(&'a K),
}

pub(crate) fn classify<'a, K: OwnedResource>(
    target: &K,
    observed: Option<&'a K>,
) -> Classification<'a, K> {
    match observed {
        None => Classification::Missing,
        Some(observed) if !is_owned_by_same(target, observed) => {
            Classification::NotOwned(observed)
        }
        Some(observed) if target.managed() != observed.managed() => {
            Classification::OwnedAndDrifted(observed)
        }
        Some(observed) => Classification::OwnedAndSynced(observed),
    }
}

/// Annotation naming the owning Pattern of objects outside the Pattern's
/// namespace, where owner references are not allowed.
pub(crate) const OWNER_ANNOTATION: &'static str = "gitops.hybrid-cloud-patterns.io/owner";

/// `true` if every owner of `target` is also an owner of `observed`.
pub(crate) fn is_owned_by_same<K: Resource>(target: &K, observed: &K) -> bool {
    let expected = target.owner_references();
    let marker = target.annotations().get(OWNER_ANNOTATION);
    if expected.is_empty() && marker.is_none() {
        return false;
    }
    let references_match = expected.iter().all(|t| {
        observed
            .owner_references()
            .iter()
            .any(|o| o.kind == t.kind && o.name == t.name && o.uid == t.uid)
    });
    references_match
        && marker.map_or(true, |m| observed.annotations().get(OWNER_ANNOTATION) == Some(m))
}

/// The observed object with all managed fields taken from `target`, everything
/// else (metadata, resourceVersion, status) is kept.
pub(crate) fn corrected<K: OwnedResource>(target: &K, observed: &K) -> K {
    let mut updated = observed.clone();
    updated.set_managed(target.managed());
    updated
}

pub(crate) fn owner_reference(pattern: &Pattern) -> Result<OwnerReference, ControllerError> {
    let uid = pattern.uid().ok_or_else(|| {
        ControllerError::InvalidPattern(format!("Pattern {} has no uid", pattern.id()))
    })?;
    Ok(OwnerReference {
        api_version: Pattern::api_version(&()).to_string(),
        kind: Pattern::kind(&()).to_string(),
        name: pattern.name_any(),
        uid,
        ..Default::default()
    })
}

/// `<kind>/<namespace>/<name>/<uid>` of `pattern`.
pub(crate) fn owner_marker(pattern: &Pattern) -> Result<String, ControllerError> {
    let reference = owner_reference(pattern)?;
    Ok(format!(
        "{}/{}/{}/{}",
        reference.kind,
        pattern.namespace().unwrap_or_default(),
        reference.name,
        reference.uid
    ))
}

/// Marks `pattern` as owner of `object`: an owner reference if both share a
/// namespace, the [`OWNER_ANNOTATION`] otherwise. The garbage collector only
/// resolves owners in the dependent's namespace and would delete `object`
/// right away.
pub(crate) fn set_owner<K: Resource>(object: &mut K, pattern: &Pattern) -> Result<(), ControllerError> {
    if object.namespace() == pattern.namespace() {
        object.meta_mut().owner_references = Some(vec![owner_reference(pattern)?]);
    } else {
        object
            .annotations_mut()
            .insert(OWNER_ANNOTATION.to_string(), owner_marker(pattern)?);
    }
    Ok(())
}

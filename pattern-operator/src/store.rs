use async_trait::async_trait;
use json_patch::diff;
use kube::{
    api::{DeleteParams, Patch, PatchParams, PostParams},
    core::NamespaceResourceScope,
    Api, Client, Resource, ResourceExt,
};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::json;
use std::{fmt::Debug, marker::PhantomData};

use crate::{
    errors::{ControllerError, ExtKubeApiError},
    MANAGER,
};

/// Namespaced object storage as used by the reconciler, for Patterns and for the
/// downstream objects they own.
#[async_trait]
pub(crate) trait ObjectStore<K: Send + Sync>: Send + Sync {
    /// Returns `None` if the object does not exist.
    async fn get(&self, namespace: &str, name: &str) -> Result<Option<K>, ControllerError>;

    async fn create(&self, object: &K) -> Result<K, ControllerError>;

    /// Turns `current` into `desired`; fails if `current` is no longer the latest
    /// revision of the object.
    async fn update(&self, current: &K, desired: &K) -> Result<K, ControllerError>;

    /// Persists the status of `object`, guarded by its resourceVersion.
    async fn replace_status(&self, object: &K) -> Result<K, ControllerError>;

    /// Deletes the object and its dependents; deleting a missing object succeeds.
    async fn delete(&self, namespace: &str, name: &str) -> Result<(), ControllerError>;
}

/// [`ObjectStore`] backed by the Kubernetes API server.
pub(crate) struct KubeStore<K> {
    client: Client,
    _kind: PhantomData<fn() -> K>,
}

impl<K> KubeStore<K> {
    pub(crate) fn new(client: Client) -> Self {
        Self {
            client,
            _kind: PhantomData,
        }
    }
}

impl<K> KubeStore<K>
where
    K: Resource<Scope = NamespaceResourceScope>,
    <K as Resource>::DynamicType: Default,
{
    fn api(&self, namespace: &str) -> Api<K> {
        Api::namespaced(self.client.clone(), namespace)
    }
}

fn patch_params() -> PatchParams {
    PatchParams {
        field_manager: Some(MANAGER.to_string()),
        ..Default::default()
    }
}

fn post_params() -> PostParams {
    let mut pp = PostParams::default();
    pp.field_manager = Some(MANAGER.to_string());
    pp
}

/// JSON patch turning `current` into `desired`, preceded by a test of the
/// resourceVersion. Fields not modelled by `K` are not touched.
pub(crate) fn update_patch<K: Resource + Serialize>(
    current: &K,
    desired: &K,
) -> Result<Option<json_patch::Patch>, ControllerError> {
    let changes = diff(
        &serde_json::to_value(current)?,
        &serde_json::to_value(desired)?,
    );
    if changes.0.is_empty() {
        return Ok(None);
    }
    let mut ops = match current.resource_version() {
        Some(rv) => {
            serde_json::from_value::<json_patch::Patch>(json!([
                { "op": "test", "path": "/metadata/resourceVersion", "value": rv }
            ]))?
            .0
        }
        None => vec![],
    };
    ops.extend(changes.0);
    Ok(Some(json_patch::Patch(ops)))
}

#[async_trait]
impl<K> ObjectStore<K> for KubeStore<K>
where
    K: Resource<Scope = NamespaceResourceScope>
        + Clone
        + Debug
        + Serialize
        + DeserializeOwned
        + Send
        + Sync
        + 'static,
    <K as Resource>::DynamicType: Default,
{
    async fn get(&self, namespace: &str, name: &str) -> Result<Option<K>, ControllerError> {
        Ok(self.api(namespace).get_opt(name).await?)
    }

    async fn create(&self, object: &K) -> Result<K, ControllerError> {
        let namespace = object.namespace().unwrap_or_default();
        Ok(self.api(&namespace).create(&post_params(), object).await?)
    }

    async fn update(&self, current: &K, desired: &K) -> Result<K, ControllerError> {
        let namespace = current.namespace().unwrap_or_default();
        let name = current.name_any();
        match update_patch(current, desired)? {
            Some(patch) => {
                debug!(
                    "patch {} {}/{} with {}",
                    K::kind(&Default::default()),
                    namespace,
                    name,
                    serde_json::to_string(&patch)?
                );
                Ok(self
                    .api(&namespace)
                    .patch(&name, &patch_params(), &Patch::<K>::Json(patch))
                    .await?)
            }
            None => Ok(current.clone()),
        }
    }

    async fn replace_status(&self, object: &K) -> Result<K, ControllerError> {
        let namespace = object.namespace().unwrap_or_default();
        let value = serde_json::to_value(object)?;
        // A resourceVersion in a merge patch makes the API server reject stale writes.
        let patch = json!({
            "metadata": { "resourceVersion": object.resource_version() },
            "status": value.get("status").cloned().unwrap_or_default(),
        });
        Ok(self
            .api(&namespace)
            .patch_status(&object.name_any(), &patch_params(), &Patch::Merge(patch))
            .await?)
    }

    async fn delete(&self, namespace: &str, name: &str) -> Result<(), ControllerError> {
        match self
            .api(namespace)
            .delete(name, &DeleteParams::foreground())
            .await
        {
            Ok(_) => Ok(()),
            Err(e) if e.is_not_found() => Ok(()),
            Err(e) => Err(e)?,
        }
    }
}

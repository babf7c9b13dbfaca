//! In-memory stand-ins for the Kubernetes API used by the unit tests.

use anyhow::anyhow;
use async_trait::async_trait;
use kube::{core::ErrorResponse, Resource, ResourceExt};
use pattern_operator_apis::{GitConfig, Pattern, PatternSpec};
use serde::{de::DeserializeOwned, Serialize};
use std::{
    collections::{BTreeMap, HashSet},
    sync::Mutex,
};

use crate::{cluster::ClusterInfo, defaults::ClusterFacts, errors::ControllerError, store::ObjectStore};

pub(crate) fn pattern(repo: &str) -> Pattern {
    let mut p = Pattern::new(
        "multicloud-gitops",
        PatternSpec {
            git_spec: GitConfig {
                target_repo: repo.to_string(),
                ..Default::default()
            },
            ..Default::default()
        },
    );
    p.metadata.namespace = Some("patterns".to_string());
    p.metadata.uid = Some("2f6c1c4e-pattern".to_string());
    p
}

pub(crate) fn mark_deleted<K: Resource>(mut object: K) -> K {
    object.meta_mut().deletion_timestamp =
        Some(serde_json::from_value(serde_json::json!("2024-01-01T00:00:00Z")).unwrap());
    object
}

fn api_error(code: u16, reason: &str, message: String) -> ControllerError {
    ControllerError::KubeApi(kube::Error::Api(ErrorResponse {
        status: "Failure".to_string(),
        message,
        reason: reason.to_string(),
        code,
    }))
}

struct State<K> {
    objects: BTreeMap<(String, String), K>,
    calls: Vec<String>,
    revision: u64,
    /// Verbs answered with an error.
    failing: HashSet<&'static str>,
}

/// [`ObjectStore`] keeping objects in memory and recording every mutating call
/// as `"<verb> <namespace>/<name>"`.
pub(crate) struct MemoryStore<K> {
    state: Mutex<State<K>>,
}

impl<K> Default for MemoryStore<K> {
    fn default() -> Self {
        Self {
            state: Mutex::new(State {
                objects: BTreeMap::new(),
                calls: vec![],
                revision: 0,
                failing: HashSet::new(),
            }),
        }
    }
}

fn key<K: Resource>(object: &K) -> (String, String) {
    (object.namespace().unwrap_or_default(), object.name_any())
}

impl<K> MemoryStore<K>
where
    K: Resource + Clone + Serialize + DeserializeOwned,
{
    /// Stores `object` as if it had been created by someone else.
    pub(crate) fn insert(&self, mut object: K) {
        let mut state = self.state.lock().unwrap();
        state.revision += 1;
        object.meta_mut().resource_version = Some(state.revision.to_string());
        if object.meta().uid.is_none() {
            object.meta_mut().uid = Some(format!("uid-{}", state.revision));
        }
        state.objects.insert(key(&object), object);
    }

    pub(crate) fn object(&self, namespace: &str, name: &str) -> Option<K> {
        let state = self.state.lock().unwrap();
        state
            .objects
            .get(&(namespace.to_string(), name.to_string()))
            .cloned()
    }

    /// Changes a stored object behind the back of the controller.
    pub(crate) fn modify(&self, namespace: &str, name: &str, f: impl FnOnce(&mut K)) {
        let mut state = self.state.lock().unwrap();
        state.revision += 1;
        let revision = state.revision.to_string();
        let object = state
            .objects
            .get_mut(&(namespace.to_string(), name.to_string()))
            .unwrap();
        f(object);
        object.meta_mut().resource_version = Some(revision);
    }

    pub(crate) fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    pub(crate) fn fail_updates(&self) {
        self.state.lock().unwrap().failing.insert("update");
    }

    pub(crate) fn fail_creates(&self) {
        self.state.lock().unwrap().failing.insert("create");
    }

    pub(crate) fn fail_gets(&self) {
        self.state.lock().unwrap().failing.insert("get");
    }
}

impl<K: Resource> State<K> {
    fn record(&mut self, verb: &'static str, namespace: &str, name: &str) -> Result<(), ControllerError> {
        self.calls.push(format!("{} {}/{}", verb, namespace, name));
        if self.failing.contains(verb) {
            return Err(ControllerError::Any(anyhow!(
                "{} of {}/{} rejected",
                verb,
                namespace,
                name
            )));
        }
        Ok(())
    }

    /// The stored revision of `object`, failing like the API server on stale writes.
    fn check_revision(&self, object: &K) -> Result<(), ControllerError> {
        let (namespace, name) = key(object);
        let stored = self
            .objects
            .get(&(namespace.clone(), name.clone()))
            .ok_or_else(|| api_error(404, "NotFound", format!("{}/{} not found", namespace, name)))?;
        if stored.resource_version() != object.resource_version() {
            return Err(api_error(
                409,
                "Conflict",
                format!("{}/{} has been modified", namespace, name),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl<K> ObjectStore<K> for MemoryStore<K>
where
    K: Resource + Clone + Serialize + DeserializeOwned + Send + Sync + 'static,
{
    async fn get(&self, namespace: &str, name: &str) -> Result<Option<K>, ControllerError> {
        if self.state.lock().unwrap().failing.contains("get") {
            return Err(ControllerError::Any(anyhow!("get of {}/{} timed out", namespace, name)));
        }
        Ok(self.object(namespace, name))
    }

    async fn create(&self, object: &K) -> Result<K, ControllerError> {
        let mut state = self.state.lock().unwrap();
        let (namespace, name) = key(object);
        state.record("create", &namespace, &name)?;
        if state.objects.contains_key(&(namespace.clone(), name.clone())) {
            return Err(api_error(
                409,
                "AlreadyExists",
                format!("{}/{} already exists", namespace, name),
            ));
        }
        state.revision += 1;
        let mut created = object.clone();
        created.meta_mut().resource_version = Some(state.revision.to_string());
        created.meta_mut().uid = Some(format!("uid-{}", state.revision));
        state.objects.insert((namespace, name), created.clone());
        Ok(created)
    }

    async fn update(&self, current: &K, desired: &K) -> Result<K, ControllerError> {
        let mut state = self.state.lock().unwrap();
        let (namespace, name) = key(current);
        state.record("update", &namespace, &name)?;
        state.check_revision(current)?;
        let k = (namespace, name);
        if desired.meta().deletion_timestamp.is_some() && desired.finalizers().is_empty() {
            state.objects.remove(&k);
            return Ok(desired.clone());
        }
        state.revision += 1;
        let mut updated = desired.clone();
        updated.meta_mut().resource_version = Some(state.revision.to_string());
        state.objects.insert(k, updated.clone());
        Ok(updated)
    }

    async fn replace_status(&self, object: &K) -> Result<K, ControllerError> {
        let mut state = self.state.lock().unwrap();
        let (namespace, name) = key(object);
        state.record("status", &namespace, &name)?;
        state.check_revision(object)?;
        let k = (namespace, name);
        let mut stored = serde_json::to_value(&state.objects[&k])?;
        stored["status"] = serde_json::to_value(object)?["status"].clone();
        let mut updated: K = serde_json::from_value(stored)?;
        state.revision += 1;
        updated.meta_mut().resource_version = Some(state.revision.to_string());
        state.objects.insert(k, updated.clone());
        Ok(updated)
    }

    async fn delete(&self, namespace: &str, name: &str) -> Result<(), ControllerError> {
        let mut state = self.state.lock().unwrap();
        state.record("delete", namespace, name)?;
        state
            .objects
            .remove(&(namespace.to_string(), name.to_string()));
        Ok(())
    }
}

struct ClusterState {
    facts: ClusterFacts,
    metadata_available: bool,
    namespaces: HashSet<String>,
    hub: bool,
    lookups_fail: bool,
}

/// [`ClusterInfo`] of an AWS cluster named `mycluster`.
pub(crate) struct FakeCluster {
    state: Mutex<ClusterState>,
}

impl Default for FakeCluster {
    fn default() -> Self {
        Self {
            state: Mutex::new(ClusterState {
                facts: ClusterFacts {
                    cluster_id: "0d2b5e1c".to_string(),
                    platform: "AWS".to_string(),
                    domain: "apps.mycluster.blueprints.example.com".to_string(),
                },
                metadata_available: true,
                namespaces: HashSet::new(),
                hub: false,
                lookups_fail: false,
            }),
        }
    }
}

impl FakeCluster {
    pub(crate) fn facts(&self) -> ClusterFacts {
        self.state.lock().unwrap().facts.clone()
    }

    pub(crate) fn make_metadata_unavailable(&self) {
        self.state.lock().unwrap().metadata_available = false;
    }

    pub(crate) fn add_namespace(&self, name: &str) {
        self.state.lock().unwrap().namespaces.insert(name.to_string());
    }

    pub(crate) fn set_hub(&self, present: bool) {
        self.state.lock().unwrap().hub = present;
    }

    /// Namespace and hub lookups fail from now on.
    pub(crate) fn make_lookups_fail(&self) {
        self.state.lock().unwrap().lookups_fail = true;
    }

    fn lookup(&self, f: impl FnOnce(&ClusterState) -> bool) -> Result<bool, ControllerError> {
        let state = self.state.lock().unwrap();
        if state.lookups_fail {
            Err(ControllerError::Any(anyhow!("the server is currently unable to handle the request")))
        } else {
            Ok(f(&state))
        }
    }

    fn fact(&self, f: impl FnOnce(&ClusterFacts) -> &String) -> Result<String, ControllerError> {
        let state = self.state.lock().unwrap();
        if state.metadata_available {
            Ok(f(&state.facts).clone())
        } else {
            Err(ControllerError::ClusterMetadata(
                "config.openshift.io is not available".to_string(),
            ))
        }
    }
}

#[async_trait]
impl ClusterInfo for FakeCluster {
    async fn cluster_id(&self) -> Result<String, ControllerError> {
        self.fact(|f| &f.cluster_id)
    }

    async fn cluster_platform(&self) -> Result<String, ControllerError> {
        self.fact(|f| &f.platform)
    }

    async fn ingress_domain(&self) -> Result<String, ControllerError> {
        self.fact(|f| &f.domain)
    }

    async fn namespace_exists(&self, name: &str) -> Result<bool, ControllerError> {
        self.lookup(|s| s.namespaces.contains(name))
    }

    async fn hub_present(&self) -> Result<bool, ControllerError> {
        self.lookup(|s| s.hub)
    }
}

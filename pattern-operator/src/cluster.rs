use async_trait::async_trait;
use k8s_openapi::api::core::v1::{ConfigMap, Namespace};
use kube::{
    api::{ApiResource, DynamicObject, GroupVersionKind, ListParams},
    Api, Client, ResourceExt,
};

use crate::errors::ControllerError;

/// Label of the ConfigMaps the cluster management hub installs next to its operator.
const HUB_CONFIGMAP_SELECTOR: &'static str = "ocm-configmap-type=image-manifest";
const HUB_DEFAULT_NAMESPACE: &'static str = "open-cluster-management";
const HUB_NAME: &'static str = "multiclusterhub";

/// Read-only view of the cluster the controller runs in.
#[async_trait]
pub(crate) trait ClusterInfo: Send + Sync {
    async fn cluster_id(&self) -> Result<String, ControllerError>;

    /// Infrastructure platform type, e.g. `AWS`.
    async fn cluster_platform(&self) -> Result<String, ControllerError>;

    /// Ingress domain, e.g. `apps.mycluster.example.com`.
    async fn ingress_domain(&self) -> Result<String, ControllerError>;

    async fn namespace_exists(&self, name: &str) -> Result<bool, ControllerError>;

    /// Whether a cluster management hub, which might still reference the
    /// Application, is installed.
    async fn hub_present(&self) -> Result<bool, ControllerError>;
}

/// [`ClusterInfo`] backed by the OpenShift config API.
pub(crate) struct KubeClusterInfo {
    client: Client,
}

impl KubeClusterInfo {
    pub(crate) fn new(client: Client) -> Self {
        Self { client }
    }

    /// Reads a string field (JSON pointer) of a cluster scoped `config.openshift.io` object.
    async fn config_field(
        &self,
        kind: &str,
        plural: &str,
        name: &str,
        pointer: &str,
    ) -> Result<String, ControllerError> {
        let gvk = GroupVersionKind::gvk("config.openshift.io", "v1", kind);
        let api_resource = ApiResource::from_gvk_with_plural(&gvk, plural);
        let api: Api<DynamicObject> = Api::all_with(self.client.clone(), &api_resource);
        let object = api.get(name).await?;
        object
            .data
            .pointer(pointer)
            .and_then(|v| v.as_str())
            .filter(|v| !v.is_empty())
            .map(|v| v.to_string())
            .ok_or_else(|| {
                ControllerError::ClusterMetadata(format!(
                    "{}/{} does not define {}",
                    kind, name, pointer
                ))
            })
    }

    async fn hub_namespace(&self) -> Result<String, ControllerError> {
        let configmaps: Api<ConfigMap> = Api::all(self.client.clone());
        let lp = ListParams::default().labels(HUB_CONFIGMAP_SELECTOR);
        Ok(hub_namespace_of(&configmaps.list(&lp).await?.items))
    }
}

/// Namespace of the first hub ConfigMap, the hub's default namespace if there is none.
fn hub_namespace_of(configmaps: &[ConfigMap]) -> String {
    configmaps
        .first()
        .and_then(|cm| cm.namespace())
        .unwrap_or_else(|| HUB_DEFAULT_NAMESPACE.to_string())
}

#[async_trait]
impl ClusterInfo for KubeClusterInfo {
    async fn cluster_id(&self) -> Result<String, ControllerError> {
        self.config_field("ClusterVersion", "clusterversions", "version", "/spec/clusterID")
            .await
    }

    async fn cluster_platform(&self) -> Result<String, ControllerError> {
        self.config_field(
            "Infrastructure",
            "infrastructures",
            "cluster",
            "/spec/platformSpec/type",
        )
        .await
    }

    async fn ingress_domain(&self) -> Result<String, ControllerError> {
        self.config_field("Ingress", "ingresses", "cluster", "/spec/domain")
            .await
    }

    async fn namespace_exists(&self, name: &str) -> Result<bool, ControllerError> {
        let api: Api<Namespace> = Api::all(self.client.clone());
        Ok(api.get_opt(name).await?.is_some())
    }

    async fn hub_present(&self) -> Result<bool, ControllerError> {
        let namespace = self.hub_namespace().await?;
        let gvk = GroupVersionKind::gvk("operator.open-cluster-management.io", "v1", "MultiClusterHub");
        let api_resource = ApiResource::from_gvk_with_plural(&gvk, "multiclusterhubs");
        let api: Api<DynamicObject> =
            Api::namespaced_with(self.client.clone(), namespace.as_str(), &api_resource);
        // Also `None` if the hub's CRD is not installed.
        Ok(api.get_opt(HUB_NAME).await?.is_some())
    }
}

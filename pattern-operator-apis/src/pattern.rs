use kube::{CustomResource, ResourceExt};

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// A GitOps managed deployment of a "pattern" repository: the controller installs the
/// GitOps engine via an operator subscription and points an Application at the
/// repository's cluster group chart.
#[derive(CustomResource, Debug, Clone, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "gitops.hybrid-cloud-patterns.io",
    version = "v1alpha1",
    kind = "Pattern",
    derive = "PartialEq",
    status = "PatternStatus",
    namespaced,
    printcolumn = r#"{
        "name":"Step",
        "type": "string",
        "jsonPath": ".status.lastStep",
        "description": "Last reconciliation step performed by the controller."
    }"#,
    printcolumn = r#"{
        "name":"Error",
        "type": "string",
        "jsonPath": ".status.lastError",
        "description": "Error reported by the last reconciliation step, empty on success."
    }"#
)]
#[serde(rename_all = "camelCase")]
pub struct PatternSpec {
    /// Name of the cluster group chart values to deploy, defaults to `default`.
    #[serde(default)]
    pub cluster_group_name: String,
    pub git_spec: GitConfig,
    /// GitOps engine installation settings, defaults are filled in by the controller.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub git_ops_spec: Option<GitOpsConfig>,
    /// Extra Helm parameters passed on to the cluster group chart.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extra_parameters: Vec<PatternParameter>,
    /// Extra values files, relative to the repository root.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extra_value_files: Vec<String>,
}

#[derive(Serialize, Deserialize, Debug, Default, PartialEq, Clone, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct GitConfig {
    /// The http(s) URL of the pattern repository.
    pub target_repo: String,
    /// Branch, tag or commit to deploy, defaults to `main`.
    #[serde(default)]
    pub target_revision: String,
    /// Git server hostname, derived from `targetRepo` when empty.
    #[serde(default)]
    pub hostname: String,
    /// Optional location of values files outside the repository.
    #[serde(default, rename = "valuesDirectoryURL")]
    pub values_directory_url: String,
}

#[derive(Serialize, Deserialize, Debug, Default, PartialEq, Clone, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct GitOpsConfig {
    /// Subscription channel of the GitOps operator.
    #[serde(default)]
    pub operator_channel: String,
    /// Catalog source providing the GitOps operator.
    #[serde(default)]
    pub operator_source: String,
    /// Operator version pin, e.g. `v1.4.0`.
    #[serde(default, rename = "operatorCSV")]
    pub operator_csv: String,
}

#[derive(Serialize, Deserialize, Debug, Default, PartialEq, Eq, Clone, JsonSchema)]
pub struct PatternParameter {
    pub name: String,
    pub value: String,
}

#[derive(Serialize, Deserialize, Debug, Default, PartialEq, Clone, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PatternStatus {
    #[serde(default)]
    pub last_step: String,
    #[serde(default)]
    pub last_error: String,
    /// Incremented every time an update of the Application failed.
    #[serde(default)]
    pub version: i64,
    #[serde(default, rename = "clusterID")]
    pub cluster_id: String,
    #[serde(default)]
    pub cluster_name: String,
    #[serde(default)]
    pub cluster_platform: String,
    #[serde(default)]
    pub cluster_domain: String,
}

impl Pattern {
    pub fn id(&self) -> String {
        format!(
            "{}/{}",
            self.metadata.namespace.as_deref().unwrap_or(""),
            self.metadata.name.as_deref().unwrap_or(""),
        )
    }

    pub fn is_deleted(&self) -> bool {
        self.metadata.deletion_timestamp.is_some()
    }

    pub fn has_finalizer(&self, finalizer: &str) -> bool {
        self.finalizers().iter().any(|f| f.as_str() == finalizer)
    }

    pub fn status_mut(&mut self) -> &mut PatternStatus {
        self.status.get_or_insert_with(PatternStatus::default)
    }

    pub fn cluster_group_name(&self) -> &str {
        self.spec.cluster_group_name.as_str()
    }
}

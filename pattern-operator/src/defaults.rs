//! Computes the qualified (fully defaulted) copy of a Pattern.

use pattern_operator_apis::Pattern;

use crate::{cluster::ClusterInfo, errors::ControllerError};

pub(crate) const DEFAULT_TARGET_REVISION: &'static str = "main";
pub(crate) const DEFAULT_OPERATOR_CHANNEL: &'static str = "stable";
pub(crate) const DEFAULT_OPERATOR_SOURCE: &'static str = "redhat-operators";
pub(crate) const DEFAULT_OPERATOR_CSV: &'static str = "v1.4.0";
pub(crate) const DEFAULT_CLUSTER_GROUP: &'static str = "default";

/// Cluster metadata the qualified Pattern is derived from.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct ClusterFacts {
    pub cluster_id: String,
    pub platform: String,
    pub domain: String,
}

impl ClusterFacts {
    pub(crate) async fn read(cluster: &dyn ClusterInfo) -> Result<Self, ControllerError> {
        Ok(Self {
            cluster_id: cluster.cluster_id().await?,
            platform: cluster.cluster_platform().await?,
            domain: cluster.ingress_domain().await?,
        })
    }

    /// The cluster name is the second label of an `apps.<cluster>.<base domain>`
    /// ingress domain.
    pub(crate) fn cluster_name(&self) -> Result<&str, ControllerError> {
        let labels: Vec<&str> = self.domain.split('.').collect();
        match labels.as_slice() {
            [apps, name, ..] if !apps.is_empty() && !name.is_empty() => Ok(*name),
            _ => Err(ControllerError::ClusterMetadata(format!(
                "ingress domain {:?} is not of the form apps.<cluster>.<domain>",
                self.domain
            ))),
        }
    }
}

/// Reads the cluster metadata and qualifies `pattern` with it.
pub(crate) async fn apply_defaults(
    pattern: &Pattern,
    cluster: &dyn ClusterInfo,
) -> Result<Pattern, ControllerError> {
    let facts = ClusterFacts::read(cluster).await?;
    qualify(pattern, &facts)
}

/// Returns a deep copy of `pattern` with cluster facts in its status and every
/// unset spec field defaulted. The input is never modified.
pub(crate) fn qualify(pattern: &Pattern, facts: &ClusterFacts) -> Result<Pattern, ControllerError> {
    let cluster_name = facts.cluster_name()?.to_string();
    let mut output = pattern.clone();

    let status = output.status_mut();
    status.cluster_id = facts.cluster_id.clone();
    status.cluster_platform = facts.platform.clone();
    status.cluster_name = cluster_name;
    status.cluster_domain = facts.domain.clone();

    let spec = &mut output.spec;
    default_if_empty(&mut spec.git_spec.target_revision, DEFAULT_TARGET_REVISION);
    if spec.git_spec.hostname.is_empty() {
        // Left empty for URLs without a host; pre-validation reports those.
        if let Some(hostname) = git_hostname(&spec.git_spec.target_repo) {
            spec.git_spec.hostname = hostname.to_string();
        }
    }
    let gitops = spec.git_ops_spec.get_or_insert_with(Default::default);
    default_if_empty(&mut gitops.operator_channel, DEFAULT_OPERATOR_CHANNEL);
    default_if_empty(&mut gitops.operator_source, DEFAULT_OPERATOR_SOURCE);
    default_if_empty(&mut gitops.operator_csv, DEFAULT_OPERATOR_CSV);
    default_if_empty(&mut spec.cluster_group_name, DEFAULT_CLUSTER_GROUP);

    Ok(output)
}

fn default_if_empty(field: &mut String, default: &str) {
    if field.is_empty() {
        *field = default.to_string();
    }
}

/// Host part of a `scheme://host/...` URL.
pub(crate) fn git_hostname(url: &str) -> Option<&str> {
    url.split('/').nth(2).filter(|h| !h.is_empty())
}

use kube::ResourceExt;
use pattern_operator_apis::{
    Application, ApplicationDestination, ApplicationSource, ApplicationSourceHelm, ApplicationSpec,
    HelmParameter, Pattern, SyncPolicy, SyncPolicyAutomated,
};
use std::collections::BTreeMap;

use crate::{
    errors::ControllerError,
    ownership::{classify, corrected, set_owner, Classification, OwnedResource},
    reconciler::Progress,
    store::ObjectStore,
    MANAGER,
};

/// Namespace provisioned by the GitOps operator, Applications live there.
pub(crate) const APPLICATION_NAMESPACE: &'static str = "openshift-gitops";
const CLUSTER_GROUP_CHART: &'static str = "common/clustergroup";
const IN_CLUSTER_SERVER: &'static str = "https://kubernetes.default.svc";
const DEFAULT_PROJECT: &'static str = "default";
/// Makes the GitOps engine remove everything it synced before the Application goes away.
const RESOURCES_FINALIZER: &'static str = "resources-finalizer.argocd.argoproj.io";

impl OwnedResource for Application {
    type Managed = ApplicationSpec;

    fn managed(&self) -> ApplicationSpec {
        self.spec.clone()
    }

    fn set_managed(&mut self, managed: ApplicationSpec) {
        self.spec = managed;
    }
}

pub(crate) fn application_name(pattern: &Pattern) -> String {
    format!("{}-{}", pattern.name_any(), pattern.cluster_group_name())
}

fn value_files(pattern: &Pattern) -> Vec<String> {
    let status = pattern.status.clone().unwrap_or_default();
    let group = pattern.cluster_group_name();
    let platform = status.cluster_platform.as_str();
    let mut files = vec![
        "/values-global.yaml".to_string(),
        format!("/values-{}.yaml", group),
        format!("/values-{}.yaml", platform),
        format!("/values-{}-{}.yaml", platform, group),
    ];
    files.extend(pattern.spec.extra_value_files.iter().cloned());
    files
}

fn parameters(pattern: &Pattern) -> Vec<HelmParameter> {
    let status = pattern.status.clone().unwrap_or_default();
    let git = &pattern.spec.git_spec;
    let mut parameters = vec![
        HelmParameter::new("global.repoURL", git.target_repo.as_str()),
        HelmParameter::new("global.targetRevision", git.target_revision.as_str()),
        HelmParameter::new("global.hostname", git.hostname.as_str()),
        HelmParameter::new("global.namespace", pattern.namespace().unwrap_or_default()),
        HelmParameter::new("global.pattern", pattern.name_any()),
        HelmParameter::new("global.clusterPlatform", status.cluster_platform.as_str()),
        HelmParameter::new("global.hubClusterDomain", status.cluster_domain.as_str()),
        HelmParameter::new("global.localClusterDomain", status.cluster_domain.as_str()),
    ];
    if !git.values_directory_url.is_empty() {
        parameters.push(HelmParameter::new(
            "global.valuesDirectoryURL",
            git.values_directory_url.as_str(),
        ));
    }
    parameters.extend(
        pattern
            .spec
            .extra_parameters
            .iter()
            .map(|p| HelmParameter::new(&p.name, p.value.as_str())),
    );
    parameters
}

/// The Application syncing the cluster group chart of a qualified Pattern. Once
/// the Pattern is being deleted, pruning is switched on so that removing the
/// Application also removes what it deployed.
pub(crate) fn new_application(pattern: &Pattern) -> Result<Application, ControllerError> {
    let spec = ApplicationSpec {
        source: ApplicationSource {
            repo_url: pattern.spec.git_spec.target_repo.clone(),
            path: CLUSTER_GROUP_CHART.to_string(),
            target_revision: pattern.spec.git_spec.target_revision.clone(),
            helm: Some(ApplicationSourceHelm {
                value_files: value_files(pattern),
                parameters: parameters(pattern),
                ignore_missing_value_files: true,
            }),
        },
        destination: ApplicationDestination {
            server: Some(IN_CLUSTER_SERVER.to_string()),
            name: None,
            namespace: pattern.namespace(),
        },
        project: DEFAULT_PROJECT.to_string(),
        sync_policy: Some(SyncPolicy {
            automated: Some(SyncPolicyAutomated {
                prune: pattern.is_deleted(),
                self_heal: false,
            }),
            sync_options: vec![],
        }),
    };
    let mut app = Application::new(&application_name(pattern), spec);
    app.metadata.namespace = Some(APPLICATION_NAMESPACE.to_string());
    app.metadata.labels = Some(BTreeMap::from([
        (
            "app.kubernetes.io/managed-by".to_string(),
            MANAGER.to_string(),
        ),
        ("app.kubernetes.io/instance".to_string(), pattern.name_any()),
    ]));
    app.metadata.finalizers = Some(vec![RESOURCES_FINALIZER.to_string()]);
    set_owner(&mut app, pattern)?;
    Ok(app)
}

/// Makes sure the Application exists and matches the qualified Pattern. Unlike
/// the subscription, an Application owned by someone else blocks convergence.
/// A failed update bumps the status version of `pattern`.
pub(crate) async fn reconcile_application(
    applications: &dyn ObjectStore<Application>,
    pattern: &mut Pattern,
) -> Progress {
    let target = match new_application(pattern) {
        Ok(target) => target,
        Err(e) => return Progress::performed("create application", Some(e)),
    };
    let observed = match applications
        .get(APPLICATION_NAMESPACE, &target.name_any())
        .await
    {
        Ok(observed) => observed,
        Err(e) => return Progress::performed("get application", Some(e)),
    };
    match classify(&target, observed.as_ref()) {
        Classification::Missing => {
            debug!("application {} not found", target.name_any());
            Progress::performed(
                "create application",
                applications.create(&target).await.err(),
            )
        }
        Classification::OwnedAndDrifted(current) => {
            let result = applications
                .update(current, &corrected(&target, current))
                .await;
            if result.is_err() {
                pattern.status_mut().version += 1;
            }
            Progress::performed("updated application", result.err())
        }
        Classification::OwnedAndSynced(_) => Progress::Proceed,
        // Someone removed our owner annotation, or another Pattern claims the name.
        Classification::NotOwned(current) => Progress::performed(
            "create application",
            Some(ControllerError::OwnershipConflict(format!(
                "we no longer own Application {:?}",
                current.name_any()
            ))),
        ),
    }
}

use kube::ResourceExt;
use pattern_operator_apis::{Pattern, Subscription, SubscriptionSpec};

use crate::{
    errors::ControllerError,
    ownership::{classify, corrected, set_owner, Classification, OwnedResource},
    reconciler::Progress,
    store::ObjectStore,
};

pub(crate) const SUBSCRIPTION_NAME: &'static str = "openshift-gitops-operator";
pub(crate) const SUBSCRIPTION_NAMESPACE: &'static str = "openshift-operators";
const OPERATOR_PACKAGE: &'static str = "openshift-gitops-operator";
const CATALOG_SOURCE_NAMESPACE: &'static str = "openshift-marketplace";
const INSTALL_PLAN_APPROVAL: &'static str = "Automatic";

impl OwnedResource for Subscription {
    type Managed = SubscriptionSpec;

    fn managed(&self) -> SubscriptionSpec {
        self.spec.clone()
    }

    fn set_managed(&mut self, managed: SubscriptionSpec) {
        self.spec = managed;
    }
}

/// The GitOps operator subscription for a qualified Pattern.
pub(crate) fn new_subscription(pattern: &Pattern) -> Result<Subscription, ControllerError> {
    let gitops = pattern.spec.git_ops_spec.clone().unwrap_or_default();
    let mut subscription = Subscription::new(
        SUBSCRIPTION_NAME,
        SubscriptionSpec {
            channel: Some(gitops.operator_channel),
            name: OPERATOR_PACKAGE.to_string(),
            source: gitops.operator_source,
            source_namespace: CATALOG_SOURCE_NAMESPACE.to_string(),
            install_plan_approval: Some(INSTALL_PLAN_APPROVAL.to_string()),
            starting_csv: Some(format!("{}.{}", OPERATOR_PACKAGE, gitops.operator_csv)),
        },
    );
    subscription.metadata.namespace = Some(SUBSCRIPTION_NAMESPACE.to_string());
    set_owner(&mut subscription, pattern)?;
    Ok(subscription)
}

/// Makes sure the GitOps operator subscription exists and matches the qualified
/// Pattern. Subscriptions owned by someone else are left untouched, the GitOps
/// engine might be shared with another Pattern.
pub(crate) async fn reconcile_subscription(
    subscriptions: &dyn ObjectStore<Subscription>,
    pattern: &Pattern,
) -> Progress {
    let target = match new_subscription(pattern) {
        Ok(target) => target,
        Err(e) => return Progress::performed("create gitops subscription", Some(e)),
    };
    let observed = match subscriptions
        .get(SUBSCRIPTION_NAMESPACE, SUBSCRIPTION_NAME)
        .await
    {
        Ok(observed) => observed,
        Err(e) => return Progress::performed("get gitops subscription", Some(e)),
    };
    match classify(&target, observed.as_ref()) {
        Classification::Missing => Progress::performed(
            "create gitops subscription",
            subscriptions.create(&target).await.err(),
        ),
        Classification::OwnedAndDrifted(current) => Progress::performed(
            "update gitops subscription",
            subscriptions
                .update(current, &corrected(&target, current))
                .await
                .err(),
        ),
        Classification::OwnedAndSynced(_) => {
            debug!("subscription found");
            Progress::Proceed
        }
        Classification::NotOwned(current) => {
            info!(
                "The gitops subscription {}/{} is not owned by {}, leaving untouched",
                SUBSCRIPTION_NAMESPACE,
                current.name_any(),
                pattern.id()
            );
            Progress::Proceed
        }
    }
}

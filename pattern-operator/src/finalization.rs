use kube::ResourceExt;
use pattern_operator_apis::{Application, Pattern};

use crate::{
    application::{new_application, APPLICATION_NAMESPACE},
    cluster::ClusterInfo,
    defaults::apply_defaults,
    errors::ControllerError,
    ownership::{classify, corrected, Classification},
    store::ObjectStore,
};

/// Removes the Application of a deleting Pattern, one step per call. Returns
/// `Ok` once nothing is left to clean up and a [`ControllerError::Pending`]
/// while the removal is in progress.
pub(crate) async fn finalize(
    applications: &dyn ObjectStore<Application>,
    cluster: &dyn ClusterInfo,
    pattern: &Pattern,
) -> Result<(), ControllerError> {
    let qualified = match apply_defaults(pattern, cluster).await {
        Ok(qualified) => qualified,
        Err(e) => {
            warn!(
                "Cannot compute the application of {}, skipping its removal: {}",
                pattern.id(),
                e
            );
            return Ok(());
        }
    };
    let target = new_application(&qualified)?;
    let name = target.name_any();
    let observed = applications.get(APPLICATION_NAMESPACE, &name).await?;
    match classify(&target, observed.as_ref()) {
        Classification::Missing => {
            debug!("application {} already removed", name);
            Ok(())
        }
        Classification::NotOwned(_) => {
            info!(
                "Application {} is not owned by {}, nothing to remove",
                name,
                pattern.id()
            );
            Ok(())
        }
        Classification::OwnedAndDrifted(current) => {
            applications
                .update(current, &corrected(&target, current))
                .await?;
            Err(ControllerError::Pending(format!(
                "updated application {:?} for removal",
                name
            )))
        }
        Classification::OwnedAndSynced(current) => {
            if cluster.hub_present().await? {
                return Err(ControllerError::Pending(
                    "waiting for the cluster management hub to be removed".to_string(),
                ));
            }
            if current.is_out_of_sync() {
                return Err(ControllerError::Pending(format!(
                    "application {:?} is still syncing",
                    name
                )));
            }
            applications.delete(APPLICATION_NAMESPACE, &name).await?;
            Err(ControllerError::Pending(format!(
                "waiting for application {:?} to be removed",
                name
            )))
        }
    }
}

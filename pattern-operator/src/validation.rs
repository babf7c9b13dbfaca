use pattern_operator_apis::Pattern;

use crate::errors::ControllerError;

/// Checks run on the qualified Pattern before anything is created or updated.
pub(crate) fn pre_validation(pattern: &Pattern) -> Result<(), ControllerError> {
    let git = &pattern.spec.git_spec;
    let repo = git.target_repo.as_str();
    if repo.starts_with("git@") || repo.starts_with("ssh://") {
        // The GitOps engine is only given http(s) access to the repository.
        return Err(ControllerError::InvalidPattern(format!(
            "invalid TargetRepo: {} (use the https:// form of the repository URL)",
            repo
        )));
    }
    if !(repo.starts_with("https://") || repo.starts_with("http://")) {
        return Err(ControllerError::InvalidPattern(format!(
            "TargetRepo must be either http/https: {}",
            repo
        )));
    }
    if git.hostname.is_empty() {
        return Err(ControllerError::InvalidPattern(format!(
            "TargetRepo has no host: {}",
            repo
        )));
    }
    Ok(())
}

/// Checks run once everything converged. Nothing is checked yet, values files
/// validation belongs here.
pub(crate) fn post_validation(_pattern: &Pattern) -> Result<(), ControllerError> {
    Ok(())
}

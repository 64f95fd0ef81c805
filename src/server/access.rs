use super::identity::Identity;
use super::response::ApiError;
use super::router::AppState;
use crate::types::Permission;

/// Gates a handler on the evaluator: every requested permission must resolve
/// to granted on `resource_name` or one of its ancestors. Insufficient
/// permission is 401; the evaluator itself never errors for "denied".
pub fn require_permission(
    state: &AppState,
    identity: &Identity,
    resource_name: &str,
    required: Permission,
) -> Result<(), ApiError> {
    let grants = state.evaluator.evaluate(
        identity.principal,
        &identity.groups,
        resource_name,
        required,
    )?;
    if !grants.all_granted() {
        return Err(ApiError::unauthorized("Insufficient permissions"));
    }
    Ok(())
}

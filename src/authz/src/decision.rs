//! Authorization decision point

use crate::error::{AuthzError, Result};
use crate::hierarchy::RoleHierarchy;
use std::collections::{HashSet, VecDeque};
use tracing::debug;

/// Reject required-role names the caller should never pass
pub fn ensure_required_role(required: &str, hierarchy: &RoleHierarchy) -> Result<()> {
    if required.trim().is_empty() {
        return Err(AuthzError::InvalidInput(
            "Required role name cannot be empty".to_string(),
        ));
    }
    if !hierarchy.contains_role(required) {
        return Err(AuthzError::UnknownRole(required.to_string()));
    }
    Ok(())
}

/// Does a principal holding `principal` satisfy a `required` role?
///
/// True when the names are equal or `required` is reachable from `principal`
/// along hierarchy edges. Not being authorized is `Ok(false)`; errors are
/// reserved for an empty or unknown required role. The walk keeps a visited
/// set, so it ends even if the edges ever contain a cycle.
pub fn is_authorized(principal: &str, required: &str, hierarchy: &RoleHierarchy) -> Result<bool> {
    ensure_required_role(required, hierarchy)?;

    if principal == required {
        return Ok(true);
    }

    let mut visited: HashSet<&str> = HashSet::new();
    let mut queue: VecDeque<&str> = VecDeque::from([principal]);

    while let Some(current) = queue.pop_front() {
        if !visited.insert(current) {
            continue;
        }
        for child in hierarchy.children_of(current) {
            if child == required {
                debug!("Role '{}' implies '{}' via '{}'", principal, required, current);
                return Ok(true);
            }
            queue.push_back(child);
        }
    }

    Ok(false)
}

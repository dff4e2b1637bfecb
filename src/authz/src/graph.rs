//! Arena snapshot of the role graph
//!
//! Roles are indexed by id and parents are followed by key lookup. Every walk
//! is bounded by the number of nodes, so a malformed graph (a cycle written
//! past the validators) ends the walk instead of looping forever.

use crate::collation::NameKey;
use crate::types::{Role, RoleId};
use std::collections::{BTreeMap, HashMap};

/// Immutable snapshot of all roles
#[derive(Debug, Clone, Default)]
pub struct RoleGraph {
    roles: BTreeMap<RoleId, Role>,
    by_name: HashMap<NameKey, RoleId>,
}

impl RoleGraph {
    pub fn from_roles(roles: impl IntoIterator<Item = Role>) -> Self {
        let mut graph = Self::default();
        for role in roles {
            graph.by_name.insert(NameKey::new(&role.name), role.id);
            graph.roles.insert(role.id, role);
        }
        graph
    }

    pub fn len(&self) -> usize {
        self.roles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.roles.is_empty()
    }

    pub fn get(&self, id: RoleId) -> Option<&Role> {
        self.roles.get(&id)
    }

    /// Primary-strength lookup by name
    pub fn find_by_name(&self, name: &str) -> Option<&Role> {
        self.by_name
            .get(&NameKey::new(name))
            .and_then(|id| self.roles.get(id))
    }

    /// Roles in id order
    pub fn roles(&self) -> impl Iterator<Item = &Role> {
        self.roles.values()
    }

    pub fn parent_of(&self, role: &Role) -> Option<&Role> {
        role.parent.and_then(|id| self.roles.get(&id))
    }

    /// Direct children of a role, in id order
    pub fn children_of(&self, id: RoleId) -> Vec<&Role> {
        self.roles
            .values()
            .filter(|role| role.parent == Some(id))
            .collect()
    }

    /// Walk from `start` (inclusive) up through parent links
    pub fn ancestors(&self, start: RoleId) -> Ancestors<'_> {
        Ancestors {
            graph: self,
            next: Some(start),
            remaining: self.roles.len(),
            exceeded: false,
        }
    }

    /// Length of the parent chain above `start`, or `None` if the walk
    /// does not terminate within the node count
    pub fn depth(&self, start: RoleId) -> Option<usize> {
        let mut walk = self.ancestors(start);
        let visited = walk.by_ref().count();
        if walk.exceeded_bound() {
            None
        } else {
            Some(visited.saturating_sub(1))
        }
    }

    /// True when every parent chain terminates
    pub fn is_acyclic(&self) -> bool {
        self.roles.keys().all(|id| self.depth(*id).is_some())
    }
}

/// Bounded parent-chain iterator returned by [`RoleGraph::ancestors`]
pub struct Ancestors<'a> {
    graph: &'a RoleGraph,
    next: Option<RoleId>,
    remaining: usize,
    exceeded: bool,
}

impl Ancestors<'_> {
    /// True if the walk stopped because it visited more nodes than the
    /// graph holds, which only happens on a cycle
    pub fn exceeded_bound(&self) -> bool {
        self.exceeded
    }
}

impl<'a> Iterator for Ancestors<'a> {
    type Item = &'a Role;

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.next?;
        let role = match self.graph.get(id) {
            Some(role) => role,
            None => {
                self.next = None;
                return None;
            }
        };

        if self.remaining == 0 {
            self.exceeded = true;
            self.next = None;
            return None;
        }

        self.remaining -= 1;
        self.next = role.parent;
        Some(role)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chain() -> RoleGraph {
        RoleGraph::from_roles(vec![
            Role::new(RoleId(1), "ADMIN"),
            Role::new(RoleId(2), "EMPLOYEE").with_parent(RoleId(1)),
            Role::new(RoleId(3), "USER").with_parent(RoleId(2)),
            Role::new(RoleId(4), "GUEST").with_parent(RoleId(3)),
        ])
    }

    #[test]
    fn test_ancestors_walk() {
        let graph = chain();
        let names: Vec<&str> = graph
            .ancestors(RoleId(4))
            .map(|r| r.name.as_str())
            .collect();
        assert_eq!(names, vec!["GUEST", "USER", "EMPLOYEE", "ADMIN"]);
        assert_eq!(graph.depth(RoleId(4)), Some(3));
        assert_eq!(graph.depth(RoleId(1)), Some(0));
    }

    #[test]
    fn test_find_by_name_is_primary_strength() {
        let graph = chain();
        assert_eq!(graph.find_by_name("employee").map(|r| r.id), Some(RoleId(2)));
        assert!(graph.find_by_name("MANAGER").is_none());
    }

    #[test]
    fn test_children() {
        let graph = chain();
        let children: Vec<RoleId> = graph.children_of(RoleId(1)).iter().map(|r| r.id).collect();
        assert_eq!(children, vec![RoleId(2)]);
        assert!(graph.children_of(RoleId(4)).is_empty());
    }

    #[test]
    fn test_walk_terminates_on_malformed_graph() {
        let graph = RoleGraph::from_roles(vec![
            Role::new(RoleId(1), "A").with_parent(RoleId(2)),
            Role::new(RoleId(2), "B").with_parent(RoleId(1)),
            Role::new(RoleId(3), "C").with_parent(RoleId(3)),
        ]);

        let mut walk = graph.ancestors(RoleId(1));
        assert_eq!(walk.by_ref().count(), 3);
        assert!(walk.exceeded_bound());

        assert_eq!(graph.depth(RoleId(3)), None);
        assert!(!graph.is_acyclic());
        assert!(chain().is_acyclic());
    }

    #[test]
    fn test_dangling_parent_ends_walk() {
        let graph = RoleGraph::from_roles(vec![Role::new(RoleId(1), "A").with_parent(RoleId(9))]);
        assert_eq!(graph.depth(RoleId(1)), Some(0));
        assert!(graph.is_acyclic());
    }
}

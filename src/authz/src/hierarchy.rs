//! Role hierarchy compiler
//!
//! Flattens the role graph into `(ancestor, descendant)` edges. A principal
//! holding an ancestor role implicitly holds every role reachable from it.

use crate::graph::RoleGraph;
use crate::types::Role;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};
use std::fmt;
use tracing::{debug, warn};

/// One `ancestor > descendant` implication
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct HierarchyEdge {
    pub ancestor: String,
    pub descendant: String,
}

impl fmt::Display for HierarchyEdge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} > {}", self.ancestor, self.descendant)
    }
}

/// Compiled authority hierarchy
#[derive(Debug, Clone, Default)]
pub struct RoleHierarchy {
    edges: Vec<HierarchyEdge>,
    children: HashMap<String, Vec<String>>,
    known: HashSet<String>,
}

impl RoleHierarchy {
    /// Compile from the full role list
    ///
    /// One edge per role with a parent. A parent id that does not resolve is
    /// skipped; the role itself is still known.
    pub fn compile(roles: &[Role]) -> Self {
        let graph = RoleGraph::from_roles(roles.iter().cloned());
        Self::compile_graph(&graph)
    }

    pub fn compile_graph(graph: &RoleGraph) -> Self {
        let mut hierarchy = Self::default();

        for role in graph.roles() {
            hierarchy.known.insert(role.name.clone());

            let Some(parent_id) = role.parent else {
                continue;
            };

            match graph.get(parent_id) {
                Some(parent) => hierarchy.push_edge(&parent.name, &role.name),
                None => warn!(
                    "Role '{}' references missing parent id {}; edge skipped",
                    role.name, parent_id
                ),
            }
        }

        debug!(
            "Compiled role hierarchy: {} roles, {} edges",
            hierarchy.known.len(),
            hierarchy.edges.len()
        );
        hierarchy
    }

    /// Build directly from `(ancestor, descendant)` pairs
    pub fn from_edges<A, D>(edges: impl IntoIterator<Item = (A, D)>) -> Self
    where
        A: Into<String>,
        D: Into<String>,
    {
        let mut hierarchy = Self::default();
        for (ancestor, descendant) in edges {
            let (ancestor, descendant) = (ancestor.into(), descendant.into());
            hierarchy.known.insert(ancestor.clone());
            hierarchy.known.insert(descendant.clone());
            hierarchy.push_edge(&ancestor, &descendant);
        }
        hierarchy
    }

    fn push_edge(&mut self, ancestor: &str, descendant: &str) {
        self.children
            .entry(ancestor.to_string())
            .or_default()
            .push(descendant.to_string());
        self.edges.push(HierarchyEdge {
            ancestor: ancestor.to_string(),
            descendant: descendant.to_string(),
        });
    }

    pub fn edges(&self) -> &[HierarchyEdge] {
        &self.edges
    }

    pub fn contains_role(&self, name: &str) -> bool {
        self.known.contains(name)
    }

    pub fn role_count(&self) -> usize {
        self.known.len()
    }

    /// Direct descendants of a role
    pub fn children_of(&self, name: &str) -> &[String] {
        self.children.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    /// The role itself plus every role it implies, breadth-first
    pub fn reachable_roles(&self, name: &str) -> Vec<String> {
        let mut visited: HashSet<&str> = HashSet::new();
        let mut order = Vec::new();
        let mut queue = VecDeque::from([name]);

        while let Some(current) = queue.pop_front() {
            if !visited.insert(current) {
                continue;
            }
            order.push(current.to_string());
            for child in self.children_of(current) {
                queue.push_back(child.as_str());
            }
        }

        order
    }

    /// Textual declaration, one `PARENT > CHILD` line per edge, sorted
    pub fn declaration(&self) -> String {
        let lines: BTreeSet<String> = self.edges.iter().map(ToString::to_string).collect();
        lines.into_iter().collect::<Vec<_>>().join("\n")
    }
}

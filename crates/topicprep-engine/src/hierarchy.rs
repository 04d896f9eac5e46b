use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use topicprep_core::{HierarchyViolation, TopicId};

/// Parent→child topic edges accumulated from leaf-to-root topic paths.
///
/// The edge set stays acyclic: an edge whose reverse is present, a self edge,
/// or an edge that would close a longer cycle is rejected.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TopicHierarchy {
    edges: BTreeSet<(TopicId, TopicId)>,
    #[serde(skip)]
    children: BTreeMap<TopicId, BTreeSet<TopicId>>,
}

impl TopicHierarchy {
    pub fn new() -> Self { Self::default() }

    /// Add the edges implied by one path, given leaf first.
    pub fn add_path(&mut self, path: &[TopicId]) -> Result<(), HierarchyViolation> {
        for pair in path.windows(2) {
            self.add_edge(pair[1], pair[0], path)?;
        }
        Ok(())
    }

    fn add_edge(&mut self, parent: TopicId, child: TopicId, path: &[TopicId]) -> Result<(), HierarchyViolation> {
        if self.edges.contains(&(parent, child)) {
            return Ok(());
        }
        if parent == child {
            return Err(HierarchyViolation::SelfEdge { topic: parent, path: path.to_vec() });
        }
        if self.edges.contains(&(child, parent)) {
            return Err(HierarchyViolation::ReverseEdge { parent, child, path: path.to_vec() });
        }
        if self.is_descendant(parent, child) {
            return Err(HierarchyViolation::Cycle { parent, child, path: path.to_vec() });
        }
        self.edges.insert((parent, child));
        self.children.entry(parent).or_default().insert(child);
        Ok(())
    }

    /// Whether `node` can be reached from `ancestor` by following edges.
    fn is_descendant(&self, node: TopicId, ancestor: TopicId) -> bool {
        let mut stack = vec![ancestor];
        let mut seen = BTreeSet::new();
        while let Some(current) = stack.pop() {
            if current == node {
                return true;
            }
            if seen.insert(current) {
                if let Some(kids) = self.children.get(&current) {
                    stack.extend(kids.iter().copied());
                }
            }
        }
        false
    }

    pub fn contains(&self, parent: TopicId, child: TopicId) -> bool { self.edges.contains(&(parent, child)) }

    /// `(parent, child)` pairs in ascending order.
    pub fn edges(&self) -> impl Iterator<Item = (TopicId, TopicId)> + '_ { self.edges.iter().copied() }

    pub fn children_of(&self, parent: TopicId) -> impl Iterator<Item = TopicId> + '_ {
        self.children.get(&parent).into_iter().flatten().copied()
    }

    pub fn len(&self) -> usize { self.edges.len() }
    pub fn is_empty(&self) -> bool { self.edges.is_empty() }
}

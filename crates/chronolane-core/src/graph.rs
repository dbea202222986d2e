//! Entity arena and cycle-guarded traversal.
//!
//! Entities live in a flat table and refer to each other by [`EntityId`].
//! Child lists may form cycles (a sub-tree shared at several points, or an
//! entity that eventually contains itself), so every walk keeps a visited
//! set keyed on the id and silently skips entities it has already seen.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::constraint::Constraint;
use crate::error::{GraphError, Result};
use crate::interval::Interval;

/// Index of an entity in an [`EntityGraph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(pub u32);

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A node of the component tree.
#[derive(Debug, Clone)]
pub struct Entity {
    pub id: EntityId,
    /// Stable component identifier; survives rebuilds and reloads.
    pub key: String,
    pub name: String,
    pub children: Vec<EntityId>,
    /// `None` for non-temporal entities (folders, collections).
    pub interval: Option<Interval>,
    pub constraint: Option<Constraint>,
}

/// Read access the layout engine needs from a component tree.
pub trait ComponentSource {
    /// Ordered child ids. Empty for unknown ids.
    fn components(&self, id: EntityId) -> &[EntityId];

    /// Current interval, `None` for non-temporal or unknown entities.
    fn interval(&self, id: EntityId) -> Option<Interval>;

    fn constraint(&self, id: EntityId) -> Option<&Constraint>;

    fn key(&self, id: EntityId) -> Option<&str>;
}

/// Receives the entities a resolve or rebuild pass changed.
///
/// Implemented by hosts; the engine itself never persists anything.
pub trait Persist {
    fn persist(&mut self, graph: &EntityGraph, changed: &BTreeSet<EntityId>) -> Result<()>;
}

/// Flat table of entities.
#[derive(Debug, Clone, Default)]
pub struct EntityGraph {
    slots: Vec<Option<Entity>>,
    by_key: HashMap<String, EntityId>,
}

impl EntityGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new entity with no children, interval or constraint.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::DuplicateKey`] if `key` is already taken.
    pub fn add_entity(&mut self, key: impl Into<String>) -> Result<EntityId, GraphError> {
        let key = key.into();
        if self.by_key.contains_key(&key) {
            return Err(GraphError::DuplicateKey(key));
        }
        let id = EntityId(self.slots.len() as u32);
        self.by_key.insert(key.clone(), id);
        self.slots.push(Some(Entity {
            id,
            name: key.clone(),
            key,
            children: Vec::new(),
            interval: None,
            constraint: None,
        }));
        Ok(id)
    }

    /// Convenience for tests and hosts: add a temporal entity in one call.
    pub fn add_temporal(
        &mut self,
        key: impl Into<String>,
        interval: Interval,
    ) -> Result<EntityId, GraphError> {
        let id = self.add_entity(key)?;
        self.entity_mut(id)?.interval = Some(interval);
        Ok(id)
    }

    pub fn get(&self, id: EntityId) -> Option<&Entity> {
        self.slots.get(id.0 as usize).and_then(Option::as_ref)
    }

    fn entity_mut(&mut self, id: EntityId) -> Result<&mut Entity, GraphError> {
        self.slots
            .get_mut(id.0 as usize)
            .and_then(Option::as_mut)
            .ok_or(GraphError::UnknownEntity(id))
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.get(id).is_some()
    }

    pub fn id_of(&self, key: &str) -> Option<EntityId> {
        self.by_key.get(key).copied()
    }

    /// Look up by key, failing with [`GraphError::UnknownKey`].
    pub fn require(&self, key: &str) -> Result<EntityId, GraphError> {
        self.id_of(key)
            .ok_or_else(|| GraphError::UnknownKey(key.to_string()))
    }

    /// Live entities in id order.
    pub fn entities(&self) -> impl Iterator<Item = &Entity> {
        self.slots.iter().filter_map(Option::as_ref)
    }

    pub fn len(&self) -> usize {
        self.by_key.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_key.is_empty()
    }

    pub fn set_name(&mut self, id: EntityId, name: impl Into<String>) -> Result<(), GraphError> {
        self.entity_mut(id)?.name = name.into();
        Ok(())
    }

    /// Overwrite the authoritative interval of an entity.
    ///
    /// Used for external edits and by the resolver; returns whether the
    /// stored value actually changed.
    pub fn set_interval(
        &mut self,
        id: EntityId,
        interval: Option<Interval>,
    ) -> Result<bool, GraphError> {
        let entity = self.entity_mut(id)?;
        let changed = entity.interval != interval;
        entity.interval = interval;
        Ok(changed)
    }

    pub fn set_constraint(
        &mut self,
        id: EntityId,
        constraint: Option<Constraint>,
    ) -> Result<(), GraphError> {
        self.entity_mut(id)?.constraint = constraint;
        Ok(())
    }

    /// Append `child` to the child list of `parent`.
    ///
    /// Cycles are allowed; the same child may appear under many parents.
    pub fn add_child(&mut self, parent: EntityId, child: EntityId) -> Result<(), GraphError> {
        if !self.contains(child) {
            return Err(GraphError::UnknownEntity(child));
        }
        self.entity_mut(parent)?.children.push(child);
        Ok(())
    }

    /// Remove an entity and unlink it from every child list.
    ///
    /// The slot is left empty so other ids stay valid.
    pub fn remove(&mut self, id: EntityId) -> Result<Entity, GraphError> {
        let entity = self
            .slots
            .get_mut(id.0 as usize)
            .and_then(Option::take)
            .ok_or(GraphError::UnknownEntity(id))?;
        self.by_key.remove(&entity.key);
        for other in self.slots.iter_mut().flatten() {
            other.children.retain(|c| *c != id);
        }
        Ok(entity)
    }
}

impl ComponentSource for EntityGraph {
    fn components(&self, id: EntityId) -> &[EntityId] {
        self.get(id).map(|e| e.children.as_slice()).unwrap_or(&[])
    }

    fn interval(&self, id: EntityId) -> Option<Interval> {
        self.get(id).and_then(|e| e.interval)
    }

    fn constraint(&self, id: EntityId) -> Option<&Constraint> {
        self.get(id).and_then(|e| e.constraint.as_ref())
    }

    fn key(&self, id: EntityId) -> Option<&str> {
        self.get(id).map(|e| e.key.as_str())
    }
}

/// Visit every descendant of `root` depth-first, children in order.
///
/// `visit` receives the descendant and its depth (direct children are depth
/// 1). `root` itself is not visited but counts as seen, so a child list that
/// leads back to it stops there. Returns the set of ids reached, root included.
pub fn for_each_child<S, F>(source: &S, root: EntityId, mut visit: F) -> HashSet<EntityId>
where
    S: ComponentSource + ?Sized,
    F: FnMut(EntityId, usize),
{
    let mut visited = HashSet::new();
    visited.insert(root);

    // Explicit stack so deep trees cannot overflow the call stack.
    let mut stack: Vec<(EntityId, usize)> = source
        .components(root)
        .iter()
        .rev()
        .map(|c| (*c, 1))
        .collect();

    while let Some((id, depth)) = stack.pop() {
        if !visited.insert(id) {
            tracing::trace!(entity = %id, "already visited, skipping");
            continue;
        }
        visit(id, depth);
        stack.extend(
            source
                .components(id)
                .iter()
                .rev()
                .map(|c| (*c, depth + 1)),
        );
    }

    visited
}

/// `root` followed by its descendants, depth-first, each id once.
pub fn walk_depth_first<S>(source: &S, root: EntityId) -> Vec<EntityId>
where
    S: ComponentSource + ?Sized,
{
    let mut order = vec![root];
    for_each_child(source, root, |id, _| order.push(id));
    order
}

#[cfg(test)]
mod tests {
    use super::*;

    fn iv(start: i64, end: i64) -> Interval {
        Interval::new(start, end).unwrap()
    }

    #[test]
    fn test_duplicate_key_rejected() {
        let mut graph = EntityGraph::new();
        graph.add_entity("a").unwrap();
        assert_eq!(
            graph.add_entity("a"),
            Err(GraphError::DuplicateKey("a".into()))
        );
    }

    #[test]
    fn test_cycle_terminates_with_finite_visited_set() {
        let mut graph = EntityGraph::new();
        let a = graph.add_entity("a").unwrap();
        let b = graph.add_entity("b").unwrap();
        graph.add_child(a, b).unwrap();
        graph.add_child(b, a).unwrap();

        let mut seen = Vec::new();
        let visited = for_each_child(&graph, a, |id, _| seen.push(id));

        assert_eq!(seen, vec![b]);
        assert_eq!(visited, HashSet::from([a, b]));
    }

    #[test]
    fn test_depth_first_preserves_child_order() {
        let mut graph = EntityGraph::new();
        let root = graph.add_entity("root").unwrap();
        let x = graph.add_entity("x").unwrap();
        let x1 = graph.add_entity("x1").unwrap();
        let y = graph.add_entity("y").unwrap();
        graph.add_child(root, x).unwrap();
        graph.add_child(root, y).unwrap();
        graph.add_child(x, x1).unwrap();

        let mut depths = Vec::new();
        for_each_child(&graph, root, |id, depth| depths.push((id, depth)));
        assert_eq!(depths, vec![(x, 1), (x1, 2), (y, 1)]);
        assert_eq!(walk_depth_first(&graph, root), vec![root, x, x1, y]);
    }

    #[test]
    fn test_shared_subtree_visited_once() {
        let mut graph = EntityGraph::new();
        let root = graph.add_entity("root").unwrap();
        let left = graph.add_entity("left").unwrap();
        let right = graph.add_entity("right").unwrap();
        let shared = graph.add_entity("shared").unwrap();
        graph.add_child(root, left).unwrap();
        graph.add_child(root, right).unwrap();
        graph.add_child(left, shared).unwrap();
        graph.add_child(right, shared).unwrap();

        let order = walk_depth_first(&graph, root);
        assert_eq!(order, vec![root, left, shared, right]);
    }

    #[test]
    fn test_remove_unlinks_children() {
        let mut graph = EntityGraph::new();
        let root = graph.add_entity("root").unwrap();
        let child = graph.add_temporal("child", iv(0, 5)).unwrap();
        graph.add_child(root, child).unwrap();

        let removed = graph.remove(child).unwrap();
        assert_eq!(removed.key, "child");
        assert!(graph.components(root).is_empty());
        assert_eq!(graph.id_of("child"), None);
        assert_eq!(graph.interval(child), None);
        assert_eq!(graph.len(), 1);
    }

    #[test]
    fn test_set_interval_reports_change() {
        let mut graph = EntityGraph::new();
        let a = graph.add_temporal("a", iv(0, 5)).unwrap();
        assert!(!graph.set_interval(a, Some(iv(0, 5))).unwrap());
        assert!(graph.set_interval(a, Some(iv(1, 5))).unwrap());
        assert_eq!(
            graph.set_interval(EntityId(99), None),
            Err(GraphError::UnknownEntity(EntityId(99)))
        );
    }
}

//! Duration constraints and the resolver that propagates them.
//!
//! A [`Constraint`] declares how one entity's interval follows from the
//! intervals of related entities. [`ConstraintSystem::resolve_all`] walks
//! everything that transitively depends on a changed entity, recomputes it,
//! writes the new interval back to the graph and reports what moved.
//!
//! ## Ordering
//!
//! Dependents are recomputed in dependency order, so an acyclic system is
//! settled after one pass and an immediate second pass changes nothing.
//! Entities that depend on each other in a loop are still visited once each,
//! in discovery order. The values that come out of such a loop depend on
//! that order; no attempt is made to iterate them to a fixed point.

use std::collections::{BTreeSet, HashMap, HashSet};

use crate::graph::{ComponentSource, EntityGraph, EntityId};
use crate::interval::Interval;

/// How an entity's interval is derived.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Constraint {
    /// Starts when the anchor starts; own duration kept.
    StartsWith(EntityId),
    /// Starts when the anchor ends (end-to-start chain); own duration kept.
    StartsAfter(EntityId),
    /// Ends when the anchor ends; own duration kept.
    EndsWith(EntityId),
    /// Moved inside the anchor's span, truncated to it when longer.
    Within(EntityId),
    /// Widened to cover every temporal child.
    SpansChildren,
}

impl Constraint {
    /// Entities this constraint reads, without duplicates.
    pub fn anchors<S>(&self, source: &S, owner: EntityId) -> Vec<EntityId>
    where
        S: ComponentSource + ?Sized,
    {
        match self {
            Constraint::StartsWith(a)
            | Constraint::StartsAfter(a)
            | Constraint::EndsWith(a)
            | Constraint::Within(a) => vec![*a],
            Constraint::SpansChildren => {
                let mut out: Vec<EntityId> = Vec::new();
                for child in source.components(owner) {
                    if !out.contains(child) {
                        out.push(*child);
                    }
                }
                out
            }
        }
    }

    /// Interval `owner` should have given the current state of its anchors.
    ///
    /// `None` when an anchor is missing or non-temporal.
    pub fn apply<S>(&self, source: &S, owner: EntityId, current: Interval) -> Option<Interval>
    where
        S: ComponentSource + ?Sized,
    {
        match self {
            Constraint::StartsWith(a) => Some(current.starting_at(source.interval(*a)?.start())),
            Constraint::StartsAfter(a) => Some(current.starting_at(source.interval(*a)?.end())),
            Constraint::EndsWith(a) => Some(current.ending_at(source.interval(*a)?.end())),
            Constraint::Within(a) => {
                let bounds = source.interval(*a)?;
                Some(if current.duration() >= bounds.duration() {
                    bounds
                } else if current.start() < bounds.start() {
                    current.starting_at(bounds.start())
                } else if current.end() > bounds.end() {
                    current.ending_at(bounds.end())
                } else {
                    current
                })
            }
            Constraint::SpansChildren => source
                .components(owner)
                .iter()
                .filter_map(|c| source.interval(*c))
                .reduce(|acc, iv| acc.union(&iv))
                .map(|children| current.union(&children)),
        }
    }
}

/// Reverse index from an entity to the entities whose constraints read it.
#[derive(Debug, Clone, Default)]
pub struct ConstraintSystem {
    dependents: HashMap<EntityId, Vec<EntityId>>,
}

impl ConstraintSystem {
    /// Index the constraints currently declared in `graph`.
    pub fn new(graph: &EntityGraph) -> Self {
        let mut dependents: HashMap<EntityId, Vec<EntityId>> = HashMap::new();
        for entity in graph.entities() {
            let Some(constraint) = &entity.constraint else {
                continue;
            };
            for anchor in constraint.anchors(graph, entity.id) {
                dependents.entry(anchor).or_default().push(entity.id);
            }
        }
        Self { dependents }
    }

    /// Entities whose constraints read `id`.
    pub fn dependents_of(&self, id: EntityId) -> &[EntityId] {
        self.dependents.get(&id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Recompute everything that transitively depends on `root`.
    ///
    /// Each entity is recomputed at most once; `root` itself is never
    /// recomputed. Returns the entities whose interval changed, which have
    /// already been written back to `graph`.
    pub fn resolve_all(&self, graph: &mut EntityGraph, root: EntityId) -> BTreeSet<EntityId> {
        let mut visited = HashSet::from([root]);
        let mut discovered = Vec::new();
        self.collect_dependents(root, &mut visited, &mut discovered);

        let changed = self.recompute_in_order(graph, &discovered);
        tracing::debug!(
            root = %root,
            visited = discovered.len(),
            changed = changed.len(),
            "constraints resolved"
        );
        changed
    }

    /// Recompute every constrained entity in `members`, then everything
    /// that transitively depends on any of them.
    ///
    /// Unlike [`resolve_all`](Self::resolve_all) the members themselves are
    /// recomputed, so a sub-tree read from storage is brought in line with
    /// its own constraints. Still a single pass.
    pub fn settle(&self, graph: &mut EntityGraph, members: &[EntityId]) -> BTreeSet<EntityId> {
        let mut visited = HashSet::new();
        let mut discovered = Vec::new();
        for id in members {
            if graph.constraint(*id).is_some() && visited.insert(*id) {
                discovered.push(*id);
            }
        }
        for id in members {
            self.collect_dependents(*id, &mut visited, &mut discovered);
        }

        let changed = self.recompute_in_order(graph, &discovered);
        tracing::debug!(
            members = members.len(),
            visited = discovered.len(),
            changed = changed.len(),
            "sub-tree settled"
        );
        changed
    }

    /// Recompute `discovered` in dependency order, falling back to the
    /// given order inside a cycle.
    fn recompute_in_order(&self, graph: &mut EntityGraph, discovered: &[EntityId]) -> BTreeSet<EntityId> {
        let position: HashMap<EntityId, usize> = discovered
            .iter()
            .enumerate()
            .map(|(i, id)| (*id, i))
            .collect();

        // In-degree counts only anchors that are themselves being recomputed.
        let mut pending = vec![0usize; discovered.len()];
        for id in discovered {
            for dep in self.dependents_of(*id) {
                if let Some(&p) = position.get(dep) {
                    pending[p] += 1;
                }
            }
        }

        let mut ready: BTreeSet<usize> = (0..discovered.len()).filter(|p| pending[*p] == 0).collect();
        let mut remaining: BTreeSet<usize> = (0..discovered.len()).collect();
        let mut changed = BTreeSet::new();

        while let Some(&first) = remaining.first() {
            let next = match ready.pop_first() {
                Some(p) => p,
                None => {
                    tracing::debug!(
                        entity = %discovered[first],
                        "dependency cycle, recomputing in visit order"
                    );
                    first
                }
            };
            remaining.remove(&next);

            let id = discovered[next];
            if self.recompute(graph, id) {
                changed.insert(id);
            }

            for dep in self.dependents_of(id) {
                if let Some(&p) = position.get(dep) {
                    if remaining.contains(&p) {
                        pending[p] = pending[p].saturating_sub(1);
                        if pending[p] == 0 {
                            ready.insert(p);
                        }
                    }
                }
            }
        }
        changed
    }

    /// Append the transitive dependents of `root` not yet in `visited`, in
    /// depth-first discovery order.
    fn collect_dependents(
        &self,
        root: EntityId,
        visited: &mut HashSet<EntityId>,
        order: &mut Vec<EntityId>,
    ) {
        let mut stack: Vec<EntityId> = self.dependents_of(root).iter().rev().copied().collect();
        while let Some(id) = stack.pop() {
            if !visited.insert(id) {
                continue;
            }
            order.push(id);
            stack.extend(self.dependents_of(id).iter().rev().copied());
        }
    }

    fn recompute(&self, graph: &mut EntityGraph, id: EntityId) -> bool {
        let Some(constraint) = graph.constraint(id) else {
            return false;
        };
        let Some(current) = graph.interval(id) else {
            tracing::warn!(entity = %id, "constrained entity has no interval, skipping");
            return false;
        };
        let Some(next) = constraint.apply(&*graph, id, current) else {
            tracing::warn!(entity = %id, ?constraint, "constraint references a missing or non-temporal entity, skipping");
            return false;
        };
        if next == current {
            return false;
        }
        tracing::trace!(
            entity = %id,
            from = ?current,
            to = ?next,
            "interval recomputed"
        );
        graph.set_interval(id, Some(next)).unwrap_or(false)
    }
}

/// Build a [`ConstraintSystem`] for `graph` and resolve from `root`.
pub fn resolve_all(graph: &mut EntityGraph, root: EntityId) -> BTreeSet<EntityId> {
    ConstraintSystem::new(graph).resolve_all(graph, root)
}

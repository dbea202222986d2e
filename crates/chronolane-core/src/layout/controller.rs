//! Rebuild controller.
//!
//! Owns the transient lane/row structure derived from an entity graph and
//! decides when it has to be thrown away.
//!
//! ## State Transitions
//!
//! ```text
//! Clean -> Dirty -> Rebuilding -> Clean
//! Clean -> Clean            (incremental addition without overlap)
//! ```
//!
//! Nothing re-lays itself out implicitly: hosts report mutations
//! (`duration_edited`, `entity_added`, `entity_removed`) and then call
//! [`RebuildController::refresh`] or [`RebuildController::rebuild`].

use std::collections::{BTreeSet, HashSet};

use serde::{Deserialize, Serialize};

use crate::constraint::ConstraintSystem;
use crate::graph::{walk_depth_first, ComponentSource, EntityGraph, EntityId};
use crate::interval::Interval;

use super::lane::{Lane, LanePacker};
use super::row::RowPacker;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LayoutState {
    Clean,
    Dirty,
    Rebuilding,
}

/// Why the structure went stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirtyReason {
    DurationEdited(EntityId),
    EntityAdded(EntityId),
    EntityRemoved(EntityId),
    /// Two depth-0 entities of a lane overlap.
    Overlap {
        lane: usize,
        first: EntityId,
        second: EntityId,
    },
}

/// Outcome of a rebuild or incremental update.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RebuildReport {
    /// Entities whose interval was rewritten; the caller persists these.
    pub changed: BTreeSet<EntityId>,
    pub lanes: usize,
    pub placements: usize,
    /// Selection after the pass, if it survived.
    pub selection: Option<EntityId>,
    /// True when the incremental path was enough.
    pub incremental: bool,
}

/// One placed entity, with its interval copied at the time of the call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayoutEntry {
    pub lane: usize,
    pub row: usize,
    pub entity: EntityId,
    pub interval: Interval,
}

#[derive(Debug, Clone)]
pub struct RebuildController {
    state: LayoutState,
    lanes: Vec<Lane>,
    roots: Vec<EntityId>,
    selection: Option<EntityId>,
    pending: Vec<DirtyReason>,
}

impl Default for RebuildController {
    fn default() -> Self {
        Self::new()
    }
}

impl RebuildController {
    /// A controller with no structure yet. It starts `Dirty` so the first
    /// `refresh` builds everything.
    pub fn new() -> Self {
        Self {
            state: LayoutState::Dirty,
            lanes: Vec::new(),
            roots: Vec::new(),
            selection: None,
            pending: Vec::new(),
        }
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn state(&self) -> LayoutState {
        self.state
    }

    pub fn lanes(&self) -> &[Lane] {
        &self.lanes
    }

    pub fn roots(&self) -> &[EntityId] {
        &self.roots
    }

    pub fn selection(&self) -> Option<EntityId> {
        self.selection
    }

    /// Reasons reported since the last rebuild.
    pub fn pending(&self) -> &[DirtyReason] {
        &self.pending
    }

    /// Whether `id` is placed anywhere in the current structure.
    pub fn is_placed(&self, id: EntityId) -> bool {
        self.lanes
            .iter()
            .any(|lane| lane.rows().iter().any(|row| row.contains(id)))
    }

    /// Every placement, ordered by lane, then row, then placement order.
    ///
    /// Intervals are read from `source` now, so they reflect the latest
    /// resolved durations. Entities that lost their interval are skipped.
    pub fn layout<S>(&self, source: &S) -> Vec<LayoutEntry>
    where
        S: ComponentSource + ?Sized,
    {
        let mut entries = Vec::new();
        for lane in &self.lanes {
            for row in lane.rows() {
                for id in row.entities() {
                    if let Some(interval) = source.interval(*id) {
                        entries.push(LayoutEntry {
                            lane: lane.index(),
                            row: row.depth(),
                            entity: *id,
                            interval,
                        });
                    }
                }
            }
        }
        entries
    }

    /// First depth-0 overlap in any lane, by current intervals.
    pub fn find_overlap<S>(&self, source: &S) -> Option<DirtyReason>
    where
        S: ComponentSource + ?Sized,
    {
        self.lanes.iter().find_map(|lane| {
            RowPacker::root_overlap(lane, source).map(|(first, second)| DirtyReason::Overlap {
                lane: lane.index(),
                first,
                second,
            })
        })
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Select an entity. Only placed entities can be selected.
    pub fn select(&mut self, id: Option<EntityId>) -> Option<EntityId> {
        self.selection = id.filter(|id| self.is_placed(*id));
        self.selection
    }

    pub fn mark_dirty(&mut self, reason: DirtyReason) {
        if self.state == LayoutState::Clean {
            tracing::debug!(?reason, "layout marked dirty");
        }
        self.state = LayoutState::Dirty;
        self.pending.push(reason);
    }

    pub fn duration_edited(&mut self, id: EntityId) {
        self.mark_dirty(DirtyReason::DurationEdited(id));
    }

    pub fn entity_added(&mut self, id: EntityId) {
        self.mark_dirty(DirtyReason::EntityAdded(id));
    }

    pub fn entity_removed(&mut self, id: EntityId) {
        if self.selection == Some(id) {
            self.selection = None;
        }
        self.mark_dirty(DirtyReason::EntityRemoved(id));
    }

    /// Bring the structure up to date with the graph.
    ///
    /// Rebuilds when dirty, or when a depth-0 overlap shows up among the
    /// current intervals. Returns `None` when nothing had to be done.
    pub fn refresh(&mut self, graph: &mut EntityGraph) -> Option<RebuildReport> {
        if self.state == LayoutState::Clean {
            let overlap = self.find_overlap(&*graph)?;
            self.mark_dirty(overlap);
        }
        let roots = self.roots.clone();
        Some(self.rebuild(graph, &roots))
    }

    /// Throw the structure away and derive it again from `roots`.
    ///
    /// Non-temporal roots are searched (cycle-guarded) for temporal
    /// descendants; every temporal entity found that way is a top-level
    /// activity. Every constraint inside the top-level sub-trees is
    /// settled first, then each activity is placed in a lane with its
    /// temporal sub-tree in the rows below it. The selection is restored by key if the entity
    /// is still placed afterwards.
    pub fn rebuild(&mut self, graph: &mut EntityGraph, roots: &[EntityId]) -> RebuildReport {
        self.state = LayoutState::Rebuilding;
        self.pending.clear();
        self.roots = roots.to_vec();
        self.lanes.clear();

        let selected_key = self
            .selection
            .take()
            .and_then(|id| graph.key(id).map(str::to_owned));

        let mut report = RebuildReport::default();

        let top_level: Vec<EntityId> = roots
            .iter()
            .flat_map(|root| top_level_activities(&*graph, *root))
            .collect();

        // Resolve everything before placing anything, so the lane bounds
        // see final intervals.
        let mut members = Vec::new();
        let mut seen = HashSet::new();
        for id in &top_level {
            members.extend(
                walk_depth_first(&*graph, *id)
                    .into_iter()
                    .filter(|member| seen.insert(*member)),
            );
        }
        report.changed = ConstraintSystem::new(graph).settle(graph, &members);

        for id in &top_level {
            report.placements += self.place_top_level(graph, *id);
        }

        self.selection = selected_key
            .and_then(|key| graph.id_of(&key))
            .filter(|id| self.is_placed(*id));

        self.state = LayoutState::Clean;
        report.lanes = self.lanes.len();
        report.selection = self.selection;

        tracing::info!(
            lanes = report.lanes,
            placements = report.placements,
            changed = report.changed.len(),
            "layout rebuilt"
        );
        report
    }

    /// Add one new top-level activity without a full rebuild when possible.
    ///
    /// Entities not reachable from the current roots become roots
    /// themselves. Falls back to [`rebuild`](Self::rebuild) when the
    /// structure is already dirty, when `id` is not a top-level activity
    /// (for instance a child of a temporal parent), or when an overlap
    /// appears.
    pub fn add_incremental(&mut self, graph: &mut EntityGraph, id: EntityId) -> RebuildReport {
        let reachable = self
            .roots
            .iter()
            .any(|root| walk_depth_first(&*graph, *root).contains(&id));
        if !reachable {
            self.roots.push(id);
        }

        if self.state != LayoutState::Clean || !self.is_top_level_only(&*graph, id) {
            self.entity_added(id);
            let roots = self.roots.clone();
            return self.rebuild(graph, &roots);
        }

        let members = walk_depth_first(&*graph, id);
        let changed = ConstraintSystem::new(graph).settle(graph, &members);
        let placements = self.place_top_level(graph, id);

        if let Some(overlap) = self.find_overlap(&*graph) {
            self.mark_dirty(overlap);
            let roots = self.roots.clone();
            let mut report = self.rebuild(graph, &roots);
            report.changed.extend(changed);
            return report;
        }

        tracing::debug!(entity = %id, placements, "incremental placement");
        RebuildReport {
            changed,
            lanes: self.lanes.len(),
            placements,
            selection: self.selection,
            incremental: true,
        }
    }

    /// True when `id` is a top-level activity of the current roots and
    /// does not also sit inside another activity's sub-tree.
    fn is_top_level_only<S>(&self, source: &S, id: EntityId) -> bool
    where
        S: ComponentSource + ?Sized,
    {
        let top_level: Vec<EntityId> = self
            .roots
            .iter()
            .flat_map(|root| top_level_activities(source, *root))
            .collect();
        top_level.iter().filter(|t| **t == id).count() == 1
            && !top_level
                .iter()
                .filter(|other| **other != id)
                .any(|other| walk_depth_first(source, *other).contains(&id))
    }

    /// Pack a top-level activity into a lane and lay out its temporal
    /// sub-tree, one row per depth. Each entity is placed at most once per
    /// top-level activity. Returns how many entities were placed.
    fn place_top_level(&mut self, graph: &EntityGraph, id: EntityId) -> usize {
        let Some(interval) = graph.interval(id) else {
            return 0;
        };
        let lane_index = LanePacker::pack(&mut self.lanes, &interval);
        let lane = &mut self.lanes[lane_index];

        let mut placed = 0;
        let mut seen = HashSet::new();
        let mut stack = vec![(id, 0usize)];
        while let Some((current, depth)) = stack.pop() {
            if !seen.insert(current) {
                continue;
            }
            // Non-temporal entities are transparent: their children take
            // the depth they would have had.
            let child_depth = if graph.interval(current).is_some() {
                RowPacker::place(current, depth, lane);
                placed += 1;
                depth + 1
            } else {
                depth
            };
            stack.extend(
                graph
                    .components(current)
                    .iter()
                    .rev()
                    .map(|c| (*c, child_depth)),
            );
        }
        placed
    }
}

/// Temporal entities found by descending from `root` through non-temporal
/// entities only, depth-first. A temporal `root` is its own answer.
fn top_level_activities<S>(source: &S, root: EntityId) -> Vec<EntityId>
where
    S: ComponentSource + ?Sized,
{
    let mut found = Vec::new();
    let mut ignore = HashSet::new();
    let mut stack = vec![root];
    while let Some(id) = stack.pop() {
        if source.interval(id).is_some() {
            found.push(id);
        } else if ignore.insert(id) {
            stack.extend(source.components(id).iter().rev().copied());
        } else {
            tracing::trace!(entity = %id, "cycle among non-temporal entities");
        }
    }
    found
}

/// Lay out `roots` from scratch and return the placements.
pub fn layout(graph: &mut EntityGraph, roots: &[EntityId]) -> Vec<LayoutEntry> {
    let mut controller = RebuildController::new();
    controller.rebuild(graph, roots);
    controller.layout(graph)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constraint::Constraint;

    fn iv(start: i64, end: i64) -> Interval {
        Interval::new(start, end).unwrap()
    }

    /// `timeline` folder holding three activities, the first with children.
    fn sample() -> (EntityGraph, EntityId, [EntityId; 5]) {
        let mut graph = EntityGraph::new();
        let timeline = graph.add_entity("timeline").unwrap();
        let a = graph.add_temporal("a", iv(0, 10)).unwrap();
        let b = graph.add_temporal("b", iv(10, 20)).unwrap();
        let c = graph.add_temporal("c", iv(5, 15)).unwrap();
        let a1 = graph.add_temporal("a1", iv(0, 4)).unwrap();
        let a2 = graph.add_temporal("a2", iv(4, 10)).unwrap();
        for id in [a, b, c] {
            graph.add_child(timeline, id).unwrap();
        }
        graph.add_child(a, a1).unwrap();
        graph.add_child(a, a2).unwrap();
        (graph, timeline, [a, b, c, a1, a2])
    }

    #[test]
    fn test_rebuild_packs_lanes_and_rows() {
        let (mut graph, timeline, [a, b, c, a1, a2]) = sample();
        let mut controller = RebuildController::new();
        let report = controller.rebuild(&mut graph, &[timeline]);

        assert_eq!(controller.state(), LayoutState::Clean);
        assert_eq!(report.lanes, 2);
        assert_eq!(report.placements, 5);

        let placed: Vec<(usize, usize, EntityId)> = controller
            .layout(&graph)
            .into_iter()
            .map(|e| (e.lane, e.row, e.entity))
            .collect();
        assert_eq!(
            placed,
            vec![(0, 0, a), (0, 0, b), (0, 1, a1), (0, 1, a2), (1, 0, c)]
        );
    }

    #[test]
    fn test_selection_restored_or_dropped() {
        let (mut graph, timeline, [_, b, c, _, _]) = sample();
        let mut controller = RebuildController::new();
        controller.rebuild(&mut graph, &[timeline]);

        assert_eq!(controller.select(Some(b)), Some(b));
        let report = controller.rebuild(&mut graph, &[timeline]);
        assert_eq!(report.selection, Some(b));

        controller.select(Some(c));
        graph.remove(c).unwrap();
        let report = controller.rebuild(&mut graph, &[timeline]);
        assert_eq!(report.selection, None);
        assert_eq!(controller.selection(), None);
    }

    #[test]
    fn test_edit_causing_overlap_forces_rebuild() {
        let (mut graph, timeline, [a, b, _, _, _]) = sample();
        let mut controller = RebuildController::new();
        controller.rebuild(&mut graph, &[timeline]);
        assert!(controller.refresh(&mut graph).is_none());

        // Stretch `a` into `b` behind the controller's back.
        graph.set_interval(a, Some(iv(0, 12))).unwrap();
        assert!(matches!(
            controller.find_overlap(&graph),
            Some(DirtyReason::Overlap { lane: 0, .. })
        ));

        let report = controller.refresh(&mut graph).unwrap();
        assert!(!report.incremental);
        assert_eq!(controller.find_overlap(&graph), None);
        let lane_of = |id| {
            controller
                .layout(&graph)
                .into_iter()
                .find(|e| e.entity == id && e.row == 0)
                .map(|e| e.lane)
        };
        assert_ne!(lane_of(a), lane_of(b));
    }

    #[test]
    fn test_incremental_addition_stays_clean() {
        let (mut graph, timeline, _) = sample();
        let mut controller = RebuildController::new();
        controller.rebuild(&mut graph, &[timeline]);

        let d = graph.add_temporal("d", iv(30, 40)).unwrap();
        graph.add_child(timeline, d).unwrap();
        let report = controller.add_incremental(&mut graph, d);

        assert!(report.incremental);
        assert_eq!(controller.state(), LayoutState::Clean);
        assert_eq!(controller.lanes()[0].bounds(), Some(iv(0, 40)));
        assert_eq!(controller.roots(), &[timeline]);
    }

    #[test]
    fn test_incremental_addition_when_dirty_rebuilds() {
        let (mut graph, timeline, [a, ..]) = sample();
        let mut controller = RebuildController::new();
        controller.rebuild(&mut graph, &[timeline]);
        controller.duration_edited(a);

        let d = graph.add_temporal("d", iv(30, 40)).unwrap();
        let report = controller.add_incremental(&mut graph, d);
        assert!(!report.incremental);
        assert_eq!(controller.roots(), &[timeline, d]);
        assert!(controller.is_placed(d));
    }

    #[test]
    fn test_child_of_temporal_parent_goes_below_it() {
        let (mut graph, timeline, [a, b, c, a1, a2]) = sample();
        let mut controller = RebuildController::new();
        controller.rebuild(&mut graph, &[timeline]);

        let a3 = graph.add_temporal("a3", iv(2, 4)).unwrap();
        graph.add_child(a, a3).unwrap();
        let report = controller.add_incremental(&mut graph, a3);

        assert!(!report.incremental);
        assert_eq!(controller.roots(), &[timeline]);
        let placed: Vec<(usize, usize, EntityId)> = controller
            .layout(&graph)
            .into_iter()
            .map(|e| (e.lane, e.row, e.entity))
            .collect();
        assert_eq!(
            placed,
            vec![(0, 0, a), (0, 0, b), (0, 1, a1), (0, 1, a2), (0, 1, a3), (1, 0, c)]
        );
    }

    #[test]
    fn test_rebuild_applies_constraints_inside_subtrees() {
        let mut graph = EntityGraph::new();
        let p = graph.add_temporal("p", iv(0, 10)).unwrap();
        let c = graph.add_temporal("c", iv(5, 50)).unwrap();
        let d = graph.add_temporal("d", iv(0, 5)).unwrap();
        graph.add_child(p, c).unwrap();
        graph.add_child(c, d).unwrap();
        graph.set_constraint(p, Some(Constraint::SpansChildren)).unwrap();
        graph.set_constraint(d, Some(Constraint::EndsWith(c))).unwrap();

        let mut controller = RebuildController::new();
        let report = controller.rebuild(&mut graph, &[p]);

        assert_eq!(report.changed, BTreeSet::from([p, d]));
        assert_eq!(graph.interval(p), Some(iv(0, 50)));
        assert_eq!(graph.interval(d), Some(iv(45, 50)));
        assert!(controller.rebuild(&mut graph, &[p]).changed.is_empty());
    }

    #[test]
    fn test_constraints_resolved_before_placement() {
        let mut graph = EntityGraph::new();
        let a = graph.add_temporal("a", iv(0, 10)).unwrap();
        let b = graph.add_temporal("b", iv(3, 8)).unwrap();
        graph.set_constraint(b, Some(Constraint::StartsAfter(a))).unwrap();

        let mut controller = RebuildController::new();
        let report = controller.rebuild(&mut graph, &[a, b]);

        assert_eq!(report.changed, BTreeSet::from([b]));
        assert_eq!(report.lanes, 1);
        assert_eq!(graph.interval(b), Some(iv(10, 15)));
    }

    #[test]
    fn test_cyclic_children_terminate() {
        let mut graph = EntityGraph::new();
        let folder = graph.add_entity("folder").unwrap();
        let a = graph.add_temporal("a", iv(0, 10)).unwrap();
        let b = graph.add_temporal("b", iv(0, 5)).unwrap();
        graph.add_child(folder, a).unwrap();
        graph.add_child(folder, folder).unwrap();
        graph.add_child(a, b).unwrap();
        graph.add_child(b, a).unwrap();

        let entries = layout(&mut graph, &[folder]);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].row, 1);
    }

    #[test]
    fn test_empty_input_is_empty_layout() {
        let mut graph = EntityGraph::new();
        assert!(layout(&mut graph, &[]).is_empty());

        let folder = graph.add_entity("folder").unwrap();
        let mut controller = RebuildController::new();
        let report = controller.rebuild(&mut graph, &[folder]);
        assert_eq!(report, RebuildReport::default());
    }
}

//! Depth rows inside a lane and the depth-0 overlap check.

use crate::graph::{ComponentSource, EntityId};
use crate::interval::Interval;

use super::lane::Lane;

/// Entities at one nesting depth of a lane.
///
/// Only ids are stored; positions come from the entity's current interval
/// whenever the row is mapped to pixels.
#[derive(Debug, Clone, Default)]
pub struct Row {
    depth: usize,
    entities: Vec<EntityId>,
}

impl Row {
    pub fn new(depth: usize) -> Self {
        Self {
            depth,
            entities: Vec::new(),
        }
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn entities(&self) -> &[EntityId] {
        &self.entities
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.entities.contains(&id)
    }
}

/// Stateless row placement.
pub struct RowPacker;

impl RowPacker {
    /// Put `entity` in the row for `depth`, creating rows `0..=depth` as needed.
    pub fn place(entity: EntityId, depth: usize, lane: &mut Lane) {
        while lane.rows.len() <= depth {
            let next = lane.rows.len();
            lane.rows.push(Row::new(next));
        }
        lane.rows[depth].entities.push(entity);
    }

    /// Depth-0 intervals of a lane sorted by start, then end.
    ///
    /// Ordering an empty interval before a longer one starting at the same
    /// instant keeps the adjacent-pair check from flagging it. The sort is
    /// stable, so full ties keep placement order. Entities that no longer
    /// have an interval are left out.
    pub fn sorted_root_intervals<S>(lane: &Lane, source: &S) -> Vec<(EntityId, Interval)>
    where
        S: ComponentSource + ?Sized,
    {
        let mut roots: Vec<(EntityId, Interval)> = lane
            .rows
            .first()
            .map(|row| {
                row.entities
                    .iter()
                    .filter_map(|id| source.interval(*id).map(|iv| (*id, iv)))
                    .collect()
            })
            .unwrap_or_default();
        roots.sort_by_key(|(_, iv)| (iv.start(), iv.end()));
        roots
    }

    /// First adjacent pair of depth-0 entities that overlap, by current intervals.
    pub fn root_overlap<S>(lane: &Lane, source: &S) -> Option<(EntityId, EntityId)>
    where
        S: ComponentSource + ?Sized,
    {
        Self::sorted_root_intervals(lane, source)
            .windows(2)
            .find(|pair| pair[0].1.end() > pair[1].1.start())
            .map(|pair| (pair[0].0, pair[1].0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::EntityGraph;

    fn iv(start: i64, end: i64) -> Interval {
        Interval::new(start, end).unwrap()
    }

    #[test]
    fn test_rows_created_contiguously() {
        let mut lane = Lane::new(0);
        RowPacker::place(EntityId(7), 3, &mut lane);

        assert_eq!(lane.rows().len(), 4);
        assert!(lane.rows()[..3].iter().all(Row::is_empty));
        assert_eq!(lane.rows()[3].entities(), &[EntityId(7)]);
        assert_eq!(lane.rows()[2].depth(), 2);
    }

    #[test]
    fn test_root_overlap_detected_after_edit() {
        let mut graph = EntityGraph::new();
        let a = graph.add_temporal("a", iv(0, 10)).unwrap();
        let b = graph.add_temporal("b", iv(10, 20)).unwrap();
        let mut lane = Lane::new(0);
        RowPacker::place(b, 0, &mut lane);
        RowPacker::place(a, 0, &mut lane);

        assert_eq!(RowPacker::root_overlap(&lane, &graph), None);

        graph.set_interval(a, Some(iv(0, 12))).unwrap();
        assert_eq!(RowPacker::root_overlap(&lane, &graph), Some((a, b)));
    }

    #[test]
    fn test_deeper_rows_ignored_by_overlap_check() {
        let mut graph = EntityGraph::new();
        let a = graph.add_temporal("a", iv(0, 10)).unwrap();
        let c1 = graph.add_temporal("c1", iv(0, 8)).unwrap();
        let c2 = graph.add_temporal("c2", iv(4, 10)).unwrap();
        let mut lane = Lane::new(0);
        RowPacker::place(a, 0, &mut lane);
        RowPacker::place(c1, 1, &mut lane);
        RowPacker::place(c2, 1, &mut lane);

        assert_eq!(RowPacker::root_overlap(&lane, &graph), None);
    }

    #[test]
    fn test_sort_is_stable_for_equal_starts() {
        let mut graph = EntityGraph::new();
        let a = graph.add_temporal("a", iv(5, 5)).unwrap();
        let b = graph.add_temporal("b", iv(5, 5)).unwrap();
        let mut lane = Lane::new(0);
        RowPacker::place(b, 0, &mut lane);
        RowPacker::place(a, 0, &mut lane);

        let sorted: Vec<EntityId> = RowPacker::sorted_root_intervals(&lane, &graph)
            .into_iter()
            .map(|(id, _)| id)
            .collect();
        assert_eq!(sorted, vec![b, a]);
    }

    #[test]
    fn test_empty_interval_at_shared_start_is_not_overlap() {
        let mut graph = EntityGraph::new();
        let long = graph.add_temporal("long", iv(5, 10)).unwrap();
        let point = graph.add_temporal("point", iv(5, 5)).unwrap();
        let mut lane = Lane::new(0);
        RowPacker::place(long, 0, &mut lane);
        RowPacker::place(point, 0, &mut lane);

        assert_eq!(RowPacker::root_overlap(&lane, &graph), None);
    }
}

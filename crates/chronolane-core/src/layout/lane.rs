//! First-fit lane packing by bounding box.
//!
//! A lane remembers only the union of everything placed in it. A candidate
//! interval goes into the first lane whose bounds it does not overlap,
//! otherwise a new lane is opened. This is coarser than checking every
//! occupant (an interval that would fit in a hole between two occupants is
//! still rejected) but placement costs O(lanes) instead of O(occupants).

use crate::interval::Interval;

use super::row::Row;

/// A group of rows whose depth-0 entities never overlap.
#[derive(Debug, Clone)]
pub struct Lane {
    index: usize,
    min_time: i64,
    max_time: i64,
    pub(crate) rows: Vec<Row>,
}

impl Lane {
    /// Empty lane. Its bounds are inverted so any interval fits.
    pub fn new(index: usize) -> Self {
        Self {
            index,
            min_time: i64::MAX,
            max_time: i64::MIN,
            rows: Vec::new(),
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn min_time(&self) -> i64 {
        self.min_time
    }

    pub fn max_time(&self) -> i64 {
        self.max_time
    }

    /// Union of everything placed so far, `None` while empty.
    pub fn bounds(&self) -> Option<Interval> {
        Interval::new(self.min_time, self.max_time).ok()
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn is_empty(&self) -> bool {
        self.rows.iter().all(Row::is_empty)
    }

    /// Bounding-box test: the interval lies entirely before or after.
    pub fn fits(&self, interval: &Interval) -> bool {
        self.max_time <= interval.start() || self.min_time >= interval.end()
    }

    /// Widen the bounds to include `interval`. Bounds never shrink.
    pub fn extend_bounds(&mut self, interval: &Interval) {
        self.min_time = self.min_time.min(interval.start());
        self.max_time = self.max_time.max(interval.end());
    }
}

/// Where an interval should go.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaneChoice {
    Existing(usize),
    New,
}

/// Stateless lane placement.
pub struct LanePacker;

impl LanePacker {
    /// Pick the first lane, in creation order, that the interval fits in.
    pub fn assign(interval: &Interval, lanes: &[Lane]) -> LaneChoice {
        lanes
            .iter()
            .position(|lane| lane.fits(interval))
            .map(LaneChoice::Existing)
            .unwrap_or(LaneChoice::New)
    }

    pub fn extend_bounds(lane: &mut Lane, interval: &Interval) {
        lane.extend_bounds(interval);
    }

    /// Assign, creating the lane if needed, and widen its bounds.
    ///
    /// Returns the index of the chosen lane.
    pub fn pack(lanes: &mut Vec<Lane>, interval: &Interval) -> usize {
        let index = match Self::assign(interval, lanes) {
            LaneChoice::Existing(index) => index,
            LaneChoice::New => {
                lanes.push(Lane::new(lanes.len()));
                lanes.len() - 1
            }
        };
        Self::extend_bounds(&mut lanes[index], interval);
        tracing::trace!(lane = index, ?interval, "interval packed");
        index
    }
}

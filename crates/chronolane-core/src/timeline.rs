//! Timeline facade tying the graph, the resolver and the layout together.
//!
//! ## Usage
//!
//! ```ignore
//! let mut timeline = Timeline::new(graph, vec![root], &LayoutConfig::default());
//! timeline.rebuild();
//! let report = timeline.edit_duration(id, Interval::new(0, 30)?)?;
//! persistence.persist(timeline.graph(), &report.changed)?;
//! for span in timeline.spans()? { /* paint */ }
//! ```

use serde::{Deserialize, Serialize};

use crate::config::LayoutConfig;
use crate::constraint::ConstraintSystem;
use crate::coords::{PixelSpan, RowMetrics, ViewWindow};
use crate::error::{GraphError, Result};
use crate::graph::{EntityGraph, EntityId};
use crate::interval::Interval;
use crate::layout::{LayoutEntry, RebuildController, RebuildReport};

/// A placed entity with its screen geometry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpanEntry {
    #[serde(flatten)]
    pub entry: LayoutEntry,
    pub span: PixelSpan,
    /// Top edge of the row, counted across all lanes.
    pub y: i64,
}

pub struct Timeline {
    graph: EntityGraph,
    roots: Vec<EntityId>,
    controller: RebuildController,
    view: ViewWindow,
    rows: RowMetrics,
}

impl Timeline {
    pub fn new(graph: EntityGraph, roots: Vec<EntityId>, config: &LayoutConfig) -> Self {
        Self {
            graph,
            roots,
            controller: RebuildController::new(),
            view: config.view_window(),
            rows: config.row_metrics(),
        }
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn graph(&self) -> &EntityGraph {
        &self.graph
    }

    pub fn roots(&self) -> &[EntityId] {
        &self.roots
    }

    pub fn controller(&self) -> &RebuildController {
        &self.controller
    }

    pub fn view(&self) -> &ViewWindow {
        &self.view
    }

    pub fn layout(&self) -> Vec<LayoutEntry> {
        self.controller.layout(&self.graph)
    }

    /// Layout entries with pixel spans and row offsets.
    ///
    /// Rows are stacked lane after lane, so a lane's first row sits right
    /// below the previous lane's last row.
    ///
    /// # Errors
    ///
    /// Fails only if the view window carries an invalid scale.
    pub fn spans(&self) -> Result<Vec<SpanEntry>> {
        let mut lane_base = Vec::with_capacity(self.controller.lanes().len());
        let mut next = 0;
        for lane in self.controller.lanes() {
            lane_base.push(next);
            next += lane.rows().len();
        }

        self.layout()
            .into_iter()
            .map(|entry| -> Result<SpanEntry> {
                Ok(SpanEntry {
                    span: self.view.span(&entry.interval)?,
                    y: self.rows.row_top(lane_base[entry.lane] + entry.row),
                    entry,
                })
            })
            .collect()
    }

    // ── Commands ─────────────────────────────────────────────────────

    pub fn set_view(&mut self, view: ViewWindow) {
        self.view = view;
    }

    /// Full rebuild from the configured roots.
    pub fn rebuild(&mut self) -> RebuildReport {
        self.controller.rebuild(&mut self.graph, &self.roots)
    }

    /// Rebuild only if something made the structure stale.
    pub fn refresh(&mut self) -> Option<RebuildReport> {
        self.controller.refresh(&mut self.graph)
    }

    /// Apply an external duration edit and propagate it.
    ///
    /// The edited entity is part of the returned changed set whenever its
    /// stored interval actually moved, alongside everything the resolver
    /// rewrote.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::UnknownEntity`] if `id` is not in the graph.
    pub fn edit_duration(&mut self, id: EntityId, interval: Interval) -> Result<RebuildReport> {
        let edited = self.graph.set_interval(id, Some(interval))?;
        let mut changed = ConstraintSystem::new(&self.graph).resolve_all(&mut self.graph, id);
        if edited {
            changed.insert(id);
        }
        self.controller.duration_edited(id);
        let mut report = self.rebuild();
        report.changed.extend(changed);
        Ok(report)
    }

    /// Add a temporal entity under `parent` (or as a new root).
    ///
    /// # Errors
    ///
    /// Fails on a duplicate key or an unknown parent; the graph is left
    /// unchanged in both cases.
    pub fn add_activity(
        &mut self,
        parent: Option<EntityId>,
        key: &str,
        interval: Interval,
    ) -> Result<(EntityId, RebuildReport)> {
        if let Some(parent) = parent {
            if !self.graph.contains(parent) {
                return Err(GraphError::UnknownEntity(parent).into());
            }
        }
        let id = self.graph.add_temporal(key, interval)?;
        if let Some(parent) = parent {
            self.graph.add_child(parent, id)?;
        }
        let report = self.controller.add_incremental(&mut self.graph, id);
        self.roots = self.controller.roots().to_vec();
        Ok((id, report))
    }

    /// Remove an entity and rebuild.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::UnknownEntity`] if `id` is not in the graph.
    pub fn remove_entity(&mut self, id: EntityId) -> Result<RebuildReport> {
        self.graph.remove(id)?;
        self.roots.retain(|r| *r != id);
        self.controller.entity_removed(id);
        Ok(self.rebuild())
    }

    /// Select by key; unknown or unplaced keys clear the selection.
    pub fn select(&mut self, key: Option<&str>) -> Option<EntityId> {
        let id = key.and_then(|k| self.graph.id_of(k));
        self.controller.select(id)
    }

    pub fn selection(&self) -> Option<EntityId> {
        self.controller.selection()
    }
}

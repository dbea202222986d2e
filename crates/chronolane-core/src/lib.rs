//! # Chronolane Core Library
//!
//! Lays out a hierarchy of time-bounded activities as non-overlapping lanes
//! and rows on a timeline, and keeps them consistent as durations change.
//!
//! ## Architecture
//!
//! - **Entity graph**: flat table of entities addressed by [`EntityId`], with
//!   child lists that may contain cycles and cycle-guarded traversal
//! - **Constraints**: declared relationships between intervals and a
//!   single-pass resolver that reports which entities it changed
//! - **Layout**: first-fit lane packing by bounding box, one row per depth
//!   inside each lane, and a rebuild controller with a dirty flag
//! - **Coordinates**: linear time → pixel mapping for renderers
//!
//! Everything is synchronous and single-threaded. The engine never persists
//! anything; callers receive the changed set and store it themselves.
//!
//! ## Key Components
//!
//! - [`Interval`]: validated `[start, end)` span
//! - [`EntityGraph`]: the component tree
//! - [`ConstraintSystem`]: resolver behind [`resolve_all`]
//! - [`RebuildController`]: lane/row structure and its state machine
//! - [`Timeline`]: facade combining all of the above
//! - [`LayoutConfig`]: TOML configuration of view and row metrics

pub mod config;
pub mod constraint;
pub mod coords;
pub mod error;
pub mod graph;
pub mod interval;
pub mod layout;
pub mod timeline;

pub use config::LayoutConfig;
pub use constraint::{resolve_all, Constraint, ConstraintSystem};
pub use coords::{to_instant, to_pixel_span, PixelSpan, RowMetrics, ViewWindow};
pub use error::{ConfigError, CoreError, GraphError, ValidationError};
pub use graph::{
    for_each_child, walk_depth_first, ComponentSource, Entity, EntityGraph, EntityId, Persist,
};
pub use interval::Interval;
pub use layout::{
    layout, DirtyReason, Lane, LaneChoice, LanePacker, LayoutEntry, LayoutState,
    RebuildController, RebuildReport, Row, RowPacker,
};
pub use timeline::{SpanEntry, Timeline};

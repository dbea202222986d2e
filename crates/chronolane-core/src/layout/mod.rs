//! Lane and row layout of temporal entities.
//!
//! This module provides:
//! - First-fit lane packing by bounding box
//! - Depth rows within a lane and the depth-0 overlap check
//! - The rebuild controller deciding between full and incremental updates

mod controller;
mod lane;
mod row;

pub use controller::{
    layout, DirtyReason, LayoutEntry, LayoutState, RebuildController, RebuildReport,
};
pub use lane::{Lane, LaneChoice, LanePacker};
pub use row::{Row, RowPacker};

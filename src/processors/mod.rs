//! Image processors used by the pipeline stages.
//!
//! This module contains the low level building blocks of page preprocessing:
//! - Geometry: convex hull and minimum area rectangle for skew estimation
//! - Morphology: rectangular erosion, dilation, opening and closing on gray images
//! - Projection: row ink profiles and their statistics

pub mod geometry;
pub mod morphology;
pub mod projection;

pub use geometry::{MinAreaRect, Point, PointSet};
pub use morphology::{
    blank_border, close_rect, dilate_rect, erode_rect, invert, open_rect, subtract,
};
pub use projection::{count_foreground, positive_mean, row_projection, variance};

//! Page geometry shared by the preview shell, the scale controller and export.

pub mod geometry;

pub use geometry::{PageGeometry, PAGE_GEOMETRY};

//! Scale controller: fit the fixed-width sheet into whatever container it is shown in.

pub mod controller;
pub mod factor;

pub use controller::{LayoutSignals, Presentation, ScaleController, ScaleState, SheetSize};
pub use factor::ScaleFactor;

// Glyph module
// Foreground pixel sets, musical shapes and shape-specific plausibility checks

pub mod checker;
pub mod shape;
pub mod types;

pub use checker::{CheckFailure, ShapeChecker, StaffContext};
pub use shape::{Shape, SHAPE_COUNT};
pub use types::{Bounds, Glyph, GlyphError};

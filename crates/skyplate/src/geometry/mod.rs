//! Constellation overlay compilation from solved annotations.

pub mod catalog;
pub mod compiler;
pub mod names;
pub mod overlay;

pub use catalog::{Catalog, CatalogStar, Constellation};
pub use compiler::{physical_separation, CompiledOverlay, ConstellationEdge, GeometryCompiler};
pub use names::{matches_pattern, normalize_name};
pub use overlay::{Color, DrawPrimitive, MarkerShape, Point};

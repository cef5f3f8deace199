//! Raster data structures and cell addressing

mod cell;
mod element;
mod grid;
mod metadata;
mod neighborhood;

pub use cell::Cell;
pub use element::RasterElement;
pub use grid::Raster;
pub use metadata::RasterMetadata;
pub use neighborhood::{diagonal_neighbours, neighbours, orthogonal_neighbours, Connectivity, D8_NEIGHBOURS};

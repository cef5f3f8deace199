//! Grid metadata shared between rasters of different element types

use serde::{Deserialize, Serialize};

/// Dimensions, cell size and nodata sentinel of a raster.
///
/// The nodata value is stored as `f64` so metadata can be carried over
/// between rasters of different element types.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RasterMetadata {
    pub rows: usize,
    pub cols: usize,
    pub cell_size: f64,
    #[serde(default)]
    pub nodata: Option<f64>,
}

impl RasterMetadata {
    pub fn new(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            cell_size: 1.0,
            nodata: None,
        }
    }

    pub fn with_cell_size(mut self, cell_size: f64) -> Self {
        self.cell_size = cell_size;
        self
    }

    pub fn with_nodata(mut self, nodata: Option<f64>) -> Self {
        self.nodata = nodata;
        self
    }

    /// Total number of cells
    pub fn len(&self) -> usize {
        self.rows * self.cols
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether two grids cover the same rows and columns
    pub fn same_shape(&self, other: &RasterMetadata) -> bool {
        self.rows == other.rows && self.cols == other.cols
    }
}

impl Default for RasterMetadata {
    fn default() -> Self {
        Self::new(0, 0)
    }
}

//! Error types for flowgrid

use thiserror::Error;

use crate::raster::Cell;

/// The ways a local drain direction map can be unsound.
///
/// The four categories are kept apart so that a full-map validator can
/// report each of them independently.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LddFault {
    #[error("ldd contains a loop at cell {0}")]
    Loop(Cell),

    #[error("ldd value outside the valid direction codes at cell {0}")]
    InvalidCode(Cell),

    #[error("ldd flows into nodata cells at {0}")]
    FlowsIntoNodata(Cell),

    #[error("ldd flows out of the map at {0}")]
    OutsideOfMap(Cell),
}

impl LddFault {
    /// The cell the fault was detected on
    pub fn cell(&self) -> Cell {
        match *self {
            LddFault::Loop(cell)
            | LddFault::InvalidCode(cell)
            | LddFault::FlowsIntoNodata(cell)
            | LddFault::OutsideOfMap(cell) => cell,
        }
    }
}

/// Main error type for flowgrid operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid raster dimensions: {width}x{height}")]
    InvalidDimensions { width: usize, height: usize },

    #[error("Index out of bounds: ({row}, {col}) in raster of size ({rows}, {cols})")]
    IndexOutOfBounds {
        row: usize,
        col: usize,
        rows: usize,
        cols: usize,
    },

    #[error("Raster size mismatch: expected ({er}, {ec}), got ({ar}, {ac})")]
    SizeMismatch { er: usize, ec: usize, ar: usize, ac: usize },

    #[error("Invalid parameter: {name} = {value} ({reason})")]
    InvalidParameter {
        name: &'static str,
        value: String,
        reason: String,
    },

    #[error("ldd map is unsound: {0}")]
    UnsoundLdd(#[from] LddFault),

    #[error("Frontier queue overflow (capacity {capacity})")]
    QueueOverflow { capacity: usize },

    #[error("Ldd cannot be fixed: {0}")]
    Unfixable(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Shorthand for a rejected non-positive numeric parameter
    pub fn not_positive(name: &'static str, value: impl ToString) -> Self {
        Error::InvalidParameter {
            name,
            value: value.to_string(),
            reason: "must be positive".into(),
        }
    }
}

/// Result type alias for flowgrid operations
pub type Result<T> = std::result::Result<T, Error>;

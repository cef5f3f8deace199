//! Cell addressing within a raster grid

use std::fmt;

/// A (row, col) position in a raster.
///
/// Coordinates are signed so that neighbour arithmetic can step off the
/// grid; use [`Cell::is_on_grid`] before indexing with a derived cell.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Cell {
    pub row: isize,
    pub col: isize,
}

impl Cell {
    pub const fn new(row: isize, col: isize) -> Self {
        Self { row, col }
    }

    /// Cell at an unsigned grid position
    pub fn at(row: usize, col: usize) -> Self {
        Self::new(row as isize, col as isize)
    }

    /// Cell for a row-major linear index
    pub fn from_index(index: usize, cols: usize) -> Self {
        Self::at(index / cols, index % cols)
    }

    /// Row-major linear index. Only meaningful for on-grid cells.
    pub fn index(&self, cols: usize) -> usize {
        self.row as usize * cols + self.col as usize
    }

    /// The cell displaced by (dr, dc)
    pub const fn offset(&self, dr: isize, dc: isize) -> Self {
        Self::new(self.row + dr, self.col + dc)
    }

    pub const fn left(&self) -> Self {
        self.offset(0, -1)
    }

    pub const fn right(&self) -> Self {
        self.offset(0, 1)
    }

    pub const fn top(&self) -> Self {
        self.offset(-1, 0)
    }

    pub const fn bottom(&self) -> Self {
        self.offset(1, 0)
    }

    pub const fn top_left(&self) -> Self {
        self.offset(-1, -1)
    }

    pub const fn top_right(&self) -> Self {
        self.offset(-1, 1)
    }

    pub const fn bottom_left(&self) -> Self {
        self.offset(1, -1)
    }

    pub const fn bottom_right(&self) -> Self {
        self.offset(1, 1)
    }

    /// Whether the cell lies inside a grid of the given dimensions
    pub fn is_on_grid(&self, rows: usize, cols: usize) -> bool {
        self.row >= 0 && self.col >= 0 && (self.row as usize) < rows && (self.col as usize) < cols
    }

    /// Whether `other` is one of the 8 cells surrounding this one
    pub fn is_neighbour_of(&self, other: Cell) -> bool {
        let dr = (self.row - other.row).abs();
        let dc = (self.col - other.col).abs();
        dr <= 1 && dc <= 1 && (dr + dc) > 0
    }

    /// Euclidean distance in cell units
    pub fn distance(&self, other: Cell) -> f64 {
        let dr = (other.row - self.row) as f64;
        let dc = (other.col - self.col) as f64;
        (dr * dr + dc * dc).sqrt()
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.row, self.col)
    }
}

impl From<(usize, usize)> for Cell {
    fn from((row, col): (usize, usize)) -> Self {
        Cell::at(row, col)
    }
}

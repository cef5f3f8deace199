//! D8 neighbourhood model
//!
//! Neighbour visiting order is fixed: orthogonal neighbours are visited
//! right, left, bottom, top and diagonal neighbours bottom-right, top-right,
//! bottom-left, top-left. Frontier algorithms depend on this order for
//! deterministic tie-breaking between equally distant sources.

use serde::{Deserialize, Serialize};

use super::Cell;

/// Which neighbours count as connected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Connectivity {
    /// 4 orthogonal neighbours (rook)
    #[default]
    Four,
    /// 4 orthogonal and 4 diagonal neighbours (queen, D8)
    Eight,
}

impl Connectivity {
    pub fn includes_diagonals(&self) -> bool {
        matches!(self, Connectivity::Eight)
    }
}

/// Orthogonal offsets: (row_offset, col_offset)
const ORTHOGONAL: [(isize, isize); 4] = [
    (0, 1),  // right
    (0, -1), // left
    (1, 0),  // bottom
    (-1, 0), // top
];

/// Diagonal offsets: (row_offset, col_offset)
const DIAGONAL: [(isize, isize); 4] = [
    (1, 1),   // bottom right
    (-1, 1),  // top right
    (1, -1),  // bottom left
    (-1, -1), // top left
];

/// All 8 neighbour offsets in raster order, with their step length factor
pub const D8_NEIGHBOURS: [(isize, isize, f64); 8] = [
    (-1, -1, std::f64::consts::SQRT_2),
    (-1, 0, 1.0),
    (-1, 1, std::f64::consts::SQRT_2),
    (0, -1, 1.0),
    (0, 1, 1.0),
    (1, -1, std::f64::consts::SQRT_2),
    (1, 0, 1.0),
    (1, 1, std::f64::consts::SQRT_2),
];

fn on_grid(
    cell: Cell,
    rows: usize,
    cols: usize,
    offsets: &'static [(isize, isize); 4],
) -> impl Iterator<Item = Cell> {
    offsets
        .iter()
        .map(move |&(dr, dc)| cell.offset(dr, dc))
        .filter(move |n| n.is_on_grid(rows, cols))
}

/// The on-grid orthogonal neighbours of `cell`
pub fn orthogonal_neighbours(cell: Cell, rows: usize, cols: usize) -> impl Iterator<Item = Cell> {
    on_grid(cell, rows, cols, &ORTHOGONAL)
}

/// The on-grid diagonal neighbours of `cell`
pub fn diagonal_neighbours(cell: Cell, rows: usize, cols: usize) -> impl Iterator<Item = Cell> {
    on_grid(cell, rows, cols, &DIAGONAL)
}

/// The on-grid neighbours of `cell` under `connectivity`, orthogonal ones first
pub fn neighbours(cell: Cell, rows: usize, cols: usize, connectivity: Connectivity) -> impl Iterator<Item = Cell> {
    let diagonals = connectivity.includes_diagonals();
    orthogonal_neighbours(cell, rows, cols).chain(diagonal_neighbours(cell, rows, cols).filter(move |_| diagonals))
}

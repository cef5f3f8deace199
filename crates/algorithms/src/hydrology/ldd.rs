//! Local drain direction (LDD) maps
//!
//! An LDD stores one keypad-style direction code per cell:
//!
//! ```text
//! 7 8 9
//! 4 5 6
//! 1 2 3
//! ```
//!
//! Code 5 is a pit (the cell drains nowhere); every other code points to the
//! neighbour in that keypad position. The map forms an implicit forest of
//! single-successor chains that must end in a pit. Maps that loop, leave the
//! grid, flow into nodata cells or hold codes outside 1..=9 are unsound.

use std::collections::{BTreeSet, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use flowgrid_core::raster::Raster;
use flowgrid_core::{Cell, Error, LddFault, Result};
use tracing::debug;

use crate::maybe_rayon::*;

/// Code of a pit cell
pub const PIT: u8 = 5;

/// Flow direction of a non-pit cell, valued as its keypad code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum Direction {
    SouthWest = 1,
    South = 2,
    SouthEast = 3,
    West = 4,
    East = 6,
    NorthWest = 7,
    North = 8,
    NorthEast = 9,
}

impl Direction {
    /// All directions in code order
    pub const ALL: [Direction; 8] = [
        Direction::SouthWest,
        Direction::South,
        Direction::SouthEast,
        Direction::West,
        Direction::East,
        Direction::NorthWest,
        Direction::North,
        Direction::NorthEast,
    ];

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(Direction::SouthWest),
            2 => Some(Direction::South),
            3 => Some(Direction::SouthEast),
            4 => Some(Direction::West),
            6 => Some(Direction::East),
            7 => Some(Direction::NorthWest),
            8 => Some(Direction::North),
            9 => Some(Direction::NorthEast),
            _ => None,
        }
    }

    pub fn code(self) -> u8 {
        self as u8
    }

    /// (row, col) offset of the receiving neighbour
    pub fn offset(self) -> (isize, isize) {
        match self {
            Direction::SouthWest => (1, -1),
            Direction::South => (1, 0),
            Direction::SouthEast => (1, 1),
            Direction::West => (0, -1),
            Direction::East => (0, 1),
            Direction::NorthWest => (-1, -1),
            Direction::North => (-1, 0),
            Direction::NorthEast => (-1, 1),
        }
    }

    /// The direction pointing back
    pub fn opposite(self) -> Direction {
        match self {
            Direction::SouthWest => Direction::NorthEast,
            Direction::South => Direction::North,
            Direction::SouthEast => Direction::NorthWest,
            Direction::West => Direction::East,
            Direction::East => Direction::West,
            Direction::NorthWest => Direction::SouthEast,
            Direction::North => Direction::South,
            Direction::NorthEast => Direction::SouthWest,
        }
    }

    pub fn is_diagonal(self) -> bool {
        matches!(
            self,
            Direction::SouthWest | Direction::SouthEast | Direction::NorthWest | Direction::NorthEast
        )
    }

    /// Map distance covered by one step in this direction
    pub fn step_length(self, cell_size: f64) -> f64 {
        if self.is_diagonal() {
            cell_size * std::f64::consts::SQRT_2
        } else {
            cell_size
        }
    }

    /// The neighbour of `cell` this direction points to (may be off-grid)
    pub fn neighbour(self, cell: Cell) -> Cell {
        let (dr, dc) = self.offset();
        cell.offset(dr, dc)
    }

    /// Direction leading from `from` to the adjacent cell `to`
    pub fn between(from: Cell, to: Cell) -> Option<Direction> {
        if !from.is_neighbour_of(to) {
            return None;
        }
        let offset = (to.row - from.row, to.col - from.col);
        Direction::ALL.into_iter().find(|d| d.offset() == offset)
    }
}

/// Decoded content of one LDD cell
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowCode {
    Flow(Direction),
    Pit,
    NoData,
}

impl FlowCode {
    /// Decode a raw cell value, returning the raw value back when it is
    /// not a valid code. Zero is invalid unless it is the nodata value.
    pub fn decode(raw: u8, nodata: Option<u8>) -> std::result::Result<FlowCode, u8> {
        if nodata == Some(raw) {
            return Ok(FlowCode::NoData);
        }
        match raw {
            PIT => Ok(FlowCode::Pit),
            code => Direction::from_code(code).map(FlowCode::Flow).ok_or(raw),
        }
    }
}

/// Upstream neighbours in visiting order, with the direction a neighbour at
/// that position must hold to drain into the centre cell.
const UPSTREAM_ORDER: [(isize, isize, Direction); 8] = [
    (-1, -1, Direction::SouthEast),
    (-1, 0, Direction::South),
    (-1, 1, Direction::SouthWest),
    (0, -1, Direction::East),
    (0, 1, Direction::West),
    (1, -1, Direction::NorthEast),
    (1, 0, Direction::North),
    (1, 1, Direction::NorthWest),
];

/// Read-only view of a raster as a flow direction map
#[derive(Debug, Clone, Copy)]
pub struct Ldd<'a> {
    raster: &'a Raster<u8>,
}

impl<'a> Ldd<'a> {
    pub fn new(raster: &'a Raster<u8>) -> Self {
        Self { raster }
    }

    pub fn raster(&self) -> &'a Raster<u8> {
        self.raster
    }

    pub fn rows(&self) -> usize {
        self.raster.rows()
    }

    pub fn cols(&self) -> usize {
        self.raster.cols()
    }

    pub fn contains(&self, cell: Cell) -> bool {
        self.raster.contains(cell)
    }

    pub fn is_nodata(&self, cell: Cell) -> bool {
        self.raster.is_nodata_cell(cell)
    }

    /// Decoded code of an on-grid cell
    pub fn code(&self, cell: Cell) -> std::result::Result<FlowCode, u8> {
        FlowCode::decode(self.raster[cell], self.raster.nodata())
    }

    /// Direction of an on-grid cell, `None` for pits, nodata and invalid codes
    pub fn direction(&self, cell: Cell) -> Option<Direction> {
        match self.code(cell) {
            Ok(FlowCode::Flow(dir)) => Some(dir),
            _ => None,
        }
    }

    /// The cell `cell` drains into. The result may lie off the grid.
    pub fn downstream(&self, cell: Cell) -> Option<Cell> {
        self.direction(cell).map(|dir| dir.neighbour(cell))
    }

    /// Whether the on-grid cell `from` drains directly into `to`
    pub fn flows_into(&self, from: Cell, to: Cell) -> bool {
        self.downstream(from) == Some(to)
    }

    /// Call `visit` for every on-grid neighbour draining into `cell`,
    /// in the order top-left, top, top-right, left, right, bottom-left,
    /// bottom, bottom-right.
    pub fn visit_upstream<F: FnMut(Cell)>(&self, cell: Cell, mut visit: F) {
        for &(dr, dc, dir) in &UPSTREAM_ORDER {
            let neighbour = cell.offset(dr, dc);
            if self.contains(neighbour) && self.direction(neighbour) == Some(dir) {
                visit(neighbour);
            }
        }
    }

    pub fn upstream_count(&self, cell: Cell) -> usize {
        let mut count = 0;
        self.visit_upstream(cell, |_| count += 1);
        count
    }

    pub fn has_upstream_cells(&self, cell: Cell) -> bool {
        self.upstream_count(cell) > 0
    }
}

/// Follow the flow path downstream from `start`.
///
/// `visit(from, to)` is called for every hop and may return `false` to stop
/// the walk early. The walk ends without error at a pit. A nodata start cell
/// is not traversed.
///
/// Faults are detected in this order at every hop: invalid code on the
/// current cell, destination off the grid, then (after visiting)
/// destination nodata and destination already walked.
pub fn traverse_ldd<F>(start: Cell, ldd: &Ldd<'_>, mut visit: F) -> std::result::Result<(), LddFault>
where
    F: FnMut(Cell, Cell) -> bool,
{
    let mut walked = HashSet::new();
    let mut cur = start;

    loop {
        let dir = match ldd.code(cur) {
            Ok(FlowCode::Flow(dir)) => dir,
            Ok(FlowCode::Pit) | Ok(FlowCode::NoData) => return Ok(()),
            Err(_) => return Err(LddFault::InvalidCode(cur)),
        };
        walked.insert(cur);

        let dest = dir.neighbour(cur);
        if !ldd.contains(dest) {
            return Err(LddFault::OutsideOfMap(cur));
        }

        if !visit(cur, dest) {
            return Ok(());
        }

        if ldd.is_nodata(dest) {
            return Err(LddFault::FlowsIntoNodata(cur));
        }

        if walked.contains(&dest) {
            return Err(LddFault::Loop(dest));
        }
        cur = dest;
    }
}

/// Walk upstream from `start` depth-first.
///
/// Every upstream cell is visited once with the state handed down by the
/// cell it drains into; the value returned by `visit` is passed on to that
/// cell's own upstream neighbours.
pub fn traverse_ldd_upstream<S, F>(start: Cell, ldd: &Ldd<'_>, initial: S, mut visit: F)
where
    S: Clone,
    F: FnMut(Cell, S) -> S,
{
    let mut stack = Vec::new();
    ldd.visit_upstream(start, |n| stack.push((n, initial.clone())));

    while let Some((cell, state)) = stack.pop() {
        let state = visit(cell, state);
        ldd.visit_upstream(cell, |n| stack.push((n, state.clone())));
    }
}

/// First fault on the flow path from `start`, if any
pub fn trace_flow_path(ldd: &Ldd<'_>, start: Cell) -> Option<LddFault> {
    traverse_ldd(start, ldd, |_, _| true).err()
}

/// Receivers for the faults found by [`validate_ldd`]
#[derive(Default, Clone, Copy)]
pub struct LddDiagnostics<'a> {
    pub on_loop: Option<&'a (dyn Fn(Cell) + Sync)>,
    pub on_invalid_code: Option<&'a (dyn Fn(Cell) + Sync)>,
    /// Receives the cell whose direction points at a nodata cell
    pub on_flows_into_nodata: Option<&'a (dyn Fn(Cell) + Sync)>,
    /// Receives the last on-grid cell of a path, the one pointing off the map
    pub on_outside_of_map: Option<&'a (dyn Fn(Cell) + Sync)>,
}

impl<'a> LddDiagnostics<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_loop(mut self, cb: &'a (dyn Fn(Cell) + Sync)) -> Self {
        self.on_loop = Some(cb);
        self
    }

    pub fn on_invalid_code(mut self, cb: &'a (dyn Fn(Cell) + Sync)) -> Self {
        self.on_invalid_code = Some(cb);
        self
    }

    pub fn on_flows_into_nodata(mut self, cb: &'a (dyn Fn(Cell) + Sync)) -> Self {
        self.on_flows_into_nodata = Some(cb);
        self
    }

    /// Called with the on-grid cell that drains off the map, not with the
    /// off-grid destination
    pub fn on_outside_of_map(mut self, cb: &'a (dyn Fn(Cell) + Sync)) -> Self {
        self.on_outside_of_map = Some(cb);
        self
    }

    fn report(&self, fault: LddFault) {
        let cb = match fault {
            LddFault::Loop(_) => self.on_loop,
            LddFault::InvalidCode(_) => self.on_invalid_code,
            LddFault::FlowsIntoNodata(_) => self.on_flows_into_nodata,
            LddFault::OutsideOfMap(_) => self.on_outside_of_map,
        };
        if let Some(cb) = cb {
            cb(fault.cell());
        }
    }
}

/// Check a flow direction map for soundness.
///
/// Flow paths are only followed from cells nothing drains into. Every fault
/// is passed to the matching callback; loop cells are reported once even
/// when several paths run into the same loop. Closed rings that no path
/// runs into are reported at their first cell in raster order.
///
/// Returns `true` when no fault was found.
pub fn validate_ldd(ldd: &Raster<u8>, diagnostics: &LddDiagnostics<'_>) -> bool {
    let view = Ldd::new(ldd);
    let (rows, cols) = ldd.shape();

    let valid = AtomicBool::new(true);
    let faults = AtomicUsize::new(0);
    let loops: Mutex<BTreeSet<Cell>> = Mutex::new(BTreeSet::new());

    (0..rows).into_par_iter().for_each(|row| {
        for col in 0..cols {
            let cell = Cell::at(row, col);
            if view.is_nodata(cell) || view.has_upstream_cells(cell) {
                continue;
            }

            let Some(fault) = trace_flow_path(&view, cell) else {
                continue;
            };
            valid.store(false, Ordering::Relaxed);
            faults.fetch_add(1, Ordering::Relaxed);

            if let LddFault::Loop(at) = fault {
                let first_report = match loops.lock() {
                    Ok(mut seen) => seen.insert(at),
                    Err(poisoned) => poisoned.into_inner().insert(at),
                };
                if !first_report {
                    continue;
                }
            }
            diagnostics.report(fault);
        }
    });

    for ring in closed_rings(&view) {
        valid.store(false, Ordering::Relaxed);
        faults.fetch_add(1, Ordering::Relaxed);
        diagnostics.report(LddFault::Loop(ring));
    }

    let valid = valid.into_inner();
    debug!(rows, cols, faults = faults.into_inner(), valid, "validated ldd");
    valid
}

/// First cell (raster order) of every cycle that no outside cell drains into.
///
/// Peels cells off in topological order; cells left over sit on cycles,
/// since nothing leaves a cycle.
fn closed_rings(ldd: &Ldd<'_>) -> Vec<Cell> {
    let (rows, cols) = (ldd.rows(), ldd.cols());
    let receiver = |cell: Cell| {
        ldd.downstream(cell)
            .filter(|&dest| ldd.contains(dest) && !ldd.is_nodata(dest))
    };

    let mut inflow = vec![0u8; rows * cols];
    for i in 0..rows * cols {
        if let Some(dest) = receiver(Cell::from_index(i, cols)) {
            inflow[dest.index(cols)] += 1;
        }
    }

    let mut stack: Vec<Cell> = (0..rows * cols)
        .filter(|&i| inflow[i] == 0)
        .map(|i| Cell::from_index(i, cols))
        .collect();
    let mut peeled = vec![false; rows * cols];
    while let Some(cell) = stack.pop() {
        peeled[cell.index(cols)] = true;
        if let Some(dest) = receiver(cell) {
            let count = &mut inflow[dest.index(cols)];
            *count -= 1;
            if *count == 0 {
                stack.push(dest);
            }
        }
    }

    let mut on_ring_done = vec![false; rows * cols];
    let mut rings = Vec::new();
    for i in 0..rows * cols {
        if peeled[i] || on_ring_done[i] {
            continue;
        }
        let first = Cell::from_index(i, cols);
        let mut fed_from_outside = false;
        let mut cur = first;
        loop {
            on_ring_done[cur.index(cols)] = true;
            // a ring cell has its ring predecessor plus any outside feeders
            if ldd.upstream_count(cur) > 1 {
                fed_from_outside = true;
            }
            match receiver(cur) {
                Some(next) if next != first => cur = next,
                _ => break,
            }
        }
        if !fed_from_outside {
            rings.push(first);
        }
    }
    rings
}

/// Outcome of [`fix_ldd`]
#[derive(Debug, Clone)]
pub struct LddRepair {
    /// The repaired map
    pub ldd: Raster<u8>,
    /// Loop cells that could not be redirected
    pub unfixed: BTreeSet<Cell>,
    /// Number of loop cells that were redirected
    pub fixes: usize,
}

/// Repair the common faults of a flow direction map.
///
/// - invalid codes become nodata
/// - a path running into nodata ends in a pit placed on the nodata cell
/// - a loop cell with exactly one inward neighbour is redirected to the
///   first neighbour of that inward cell (scanning codes 1..=9) that is
///   also adjacent to the loop cell, does not drain into the inward cell
///   and holds a flow direction
/// - loop cells with several inward neighbours, or without a candidate,
///   are left alone and listed in [`LddRepair::unfixed`]
///
/// A path leaving the grid cannot be repaired and fails with
/// [`Error::Unfixable`].
pub fn fix_ldd(ldd: &Raster<u8>) -> Result<LddRepair> {
    let original = Ldd::new(ldd);
    let mut result = ldd.clone();
    let mut unfixed = BTreeSet::new();
    let mut fixes = 0;

    for cell in ldd.cells() {
        if original.is_nodata(cell) {
            continue;
        }

        let fault = {
            let current = Ldd::new(&result);
            if current.is_nodata(cell) || current.has_upstream_cells(cell) {
                continue;
            }
            trace_flow_path(&current, cell)
        };

        match fault {
            None => {}
            Some(LddFault::Loop(at)) => match redirect_loop_cell(&original, at) {
                Some(dir) => {
                    result[at] = dir.code();
                    fixes += 1;
                }
                None => {
                    unfixed.insert(at);
                }
            },
            Some(LddFault::InvalidCode(at)) => result.mark_as_nodata(at),
            Some(LddFault::FlowsIntoNodata(at)) => {
                if let Some(dest) = Ldd::new(&result).downstream(at) {
                    result[dest] = PIT;
                }
            }
            Some(LddFault::OutsideOfMap(at)) => {
                return Err(Error::Unfixable(format!(
                    "flow leaves the map at cell {}",
                    at
                )));
            }
        }
    }

    let rings = closed_rings(&Ldd::new(&result));
    for at in rings {
        match redirect_loop_cell(&original, at) {
            Some(dir) => {
                result[at] = dir.code();
                fixes += 1;
            }
            None => {
                unfixed.insert(at);
            }
        }
    }

    debug!(fixes, unfixed = unfixed.len(), "fixed ldd");
    Ok(LddRepair {
        ldd: result,
        unfixed,
        fixes,
    })
}

/// New direction for a loop cell, looked up on the unrepaired map
fn redirect_loop_cell(ldd: &Ldd<'_>, cell: Cell) -> Option<Direction> {
    let mut inward = None;
    let mut inward_count = 0;
    for dir in Direction::ALL {
        let neighbour = dir.neighbour(cell);
        if ldd.contains(neighbour) && ldd.direction(neighbour) == Some(dir.opposite()) {
            inward = Some(neighbour);
            inward_count += 1;
        }
    }
    if inward_count != 1 {
        return None;
    }
    let inward = inward?;

    Direction::ALL
        .into_iter()
        .map(|dir| dir.neighbour(inward))
        .filter(|&candidate| {
            candidate != cell && candidate.is_neighbour_of(cell) && ldd.contains(candidate)
        })
        .find(|&candidate| {
            !ldd.flows_into(candidate, inward) && ldd.direction(candidate).is_some()
        })
        .and_then(|target| Direction::between(cell, target))
}

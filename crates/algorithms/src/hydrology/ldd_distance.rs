//! Friction-weighted path lengths along a flow direction map
//!
//! A hop between two cells costs its length (cell size, times sqrt 2 on
//! diagonals) multiplied by the mean friction of both cells.

use flowgrid_core::raster::Raster;
use flowgrid_core::{Cell, LddFault, Result};

use super::ldd::{traverse_ldd, Ldd};
use crate::frontier::{Mark, MarkGrid};

fn hop_length(from: Cell, to: Cell, cell_size: f64) -> f64 {
    if from.row != to.row && from.col != to.col {
        cell_size * std::f64::consts::SQRT_2
    } else {
        cell_size
    }
}

/// Friction distance downstream to the nearest point.
///
/// Points are the nonzero cells of `points`; they get distance 0. Every other
/// cell gets the friction-weighted length of its flow path up to the first
/// point. Cells whose path ends in a pit before reaching a point, crosses a
/// nodata point or nodata friction, and cells that are nodata in any input
/// are nodata (NaN).
pub fn ldd_dist(ldd: &Raster<u8>, points: &Raster<f32>, friction: &Raster<f32>) -> Result<Raster<f32>> {
    ldd.ensure_same_shape(points)?;
    ldd.ensure_same_shape(friction)?;

    let view = Ldd::new(ldd);
    let cell_size = ldd.cell_size();
    let mut result = ldd.with_same_meta::<f32>().with_nodata(Some(f32::NAN));

    for cell in ldd.cells() {
        if points.is_nodata_cell(cell) || view.is_nodata(cell) {
            result.mark_as_nodata(cell);
            continue;
        }
        if points[cell] != 0.0 {
            continue;
        }
        if friction.is_nodata_cell(cell) {
            result.mark_as_nodata(cell);
            continue;
        }

        let mut total = 0.0f64;
        let mut reached_point = false;
        traverse_ldd(cell, &view, |from, dest| {
            if points.is_nodata_cell(dest) {
                return false;
            }

            let mean_friction = (friction[from] as f64 + friction[dest] as f64) / 2.0;
            total += hop_length(from, dest, cell_size) * mean_friction;

            if points[dest] != 0.0 {
                reached_point = true;
                return false;
            }
            true
        })?;

        if reached_point && !total.is_nan() {
            result[cell] = total as f32;
        } else {
            result.mark_as_nodata(cell);
        }
    }

    Ok(result)
}

/// Longest friction-weighted flow path arriving at every cell.
///
/// Headwater cells are 0. Cells with nodata friction or no flow direction
/// are nodata (NaN); a cell whose every upstream path is nodata is nodata
/// too. Fails when the map contains a loop.
pub fn slope_length(ldd: &Raster<u8>, friction: &Raster<f32>) -> Result<Raster<f32>> {
    ldd.ensure_same_shape(friction)?;

    let view = Ldd::new(ldd);
    let (rows, cols) = ldd.shape();
    let cell_size = ldd.cell_size();

    let mut lengths = vec![0.0f64; rows * cols];
    let mut state = MarkGrid::new(rows, cols);
    let mut stack = Vec::new();

    for start in ldd.cells() {
        if state.get(start) == Mark::Done {
            continue;
        }
        state.set(start, Mark::Border);
        stack.push(start);

        // post-order walk: a cell is evaluated once all its upstream cells are
        while let Some(&cell) = stack.last() {
            if friction.is_nodata_cell(cell) || view.is_nodata(cell) {
                lengths[cell.index(cols)] = f64::NAN;
                state.set(cell, Mark::Done);
                stack.pop();
                continue;
            }

            let mut pending = None;
            let mut cycle = None;
            view.visit_upstream(cell, |up| match state.get(up) {
                Mark::Todo if pending.is_none() => pending = Some(up),
                Mark::Border => cycle = Some(up),
                _ => {}
            });
            if let Some(at) = cycle {
                return Err(LddFault::Loop(at).into());
            }
            if let Some(up) = pending {
                state.set(up, Mark::Border);
                stack.push(up);
                continue;
            }

            let mut longest = 0.0f64;
            let mut any_valid = false;
            let mut any_nan = false;
            view.visit_upstream(cell, |up| {
                let step = view
                    .direction(up)
                    .map_or(cell_size, |dir| dir.step_length(cell_size));
                let length = lengths[up.index(cols)]
                    + step * (friction[up] as f64 + friction[cell] as f64) / 2.0;
                if length.is_nan() {
                    any_nan = true;
                } else {
                    longest = longest.max(length);
                    any_valid = true;
                }
            });
            if any_nan && !any_valid {
                longest = f64::NAN;
            }

            lengths[cell.index(cols)] = longest;
            state.set(cell, Mark::Done);
            stack.pop();
        }
    }

    let mut result = ldd.with_same_meta::<f32>().with_nodata(Some(f32::NAN));
    for (value, length) in result.data_mut().iter_mut().zip(&lengths) {
        *value = *length as f32;
    }
    Ok(result)
}

/// Longest flow distance from any headwater cell, see
/// [`max_upstream_dist_with_progress`]
pub fn max_upstream_dist(ldd: &Raster<u8>) -> Result<Raster<f32>> {
    max_upstream_dist_with_progress(ldd, |_, _| {})
}

/// Longest flow distance (in map units) from any headwater cell to every cell.
///
/// Walks downstream from each cell nothing drains into, keeping the largest
/// distance seen per cell; a walk stops as soon as it no longer improves the
/// next cell. `progress` receives (processed, total) cell counts.
pub fn max_upstream_dist_with_progress<P>(ldd: &Raster<u8>, mut progress: P) -> Result<Raster<f32>>
where
    P: FnMut(usize, usize),
{
    let view = Ldd::new(ldd);
    let total = ldd.len();
    let cell_size = ldd.cell_size() as f32;
    let diagonal = cell_size * std::f32::consts::SQRT_2;

    let mut result = ldd.with_same_meta::<f32>();
    if ldd.nodata().is_some() {
        result.set_nodata(Some(f32::NAN));
    }

    for (processed, cell) in ldd.cells().enumerate() {
        progress(processed + 1, total);

        if view.is_nodata(cell) {
            result.mark_as_nodata(cell);
            continue;
        }
        if view.has_upstream_cells(cell) {
            continue;
        }

        let mut walked = 0.0f32;
        traverse_ldd(cell, &view, |from, dest| {
            walked += if from.row != dest.row && from.col != dest.col {
                diagonal
            } else {
                cell_size
            };

            let recorded = &mut result[dest];
            if *recorded < walked {
                *recorded = walked;
                true
            } else {
                false
            }
        })?;
    }

    Ok(result)
}

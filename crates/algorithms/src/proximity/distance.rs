//! Distance, travel distance and closest-target fields

use flowgrid_core::raster::Raster;
use flowgrid_core::{Algorithm, Cell, Error, RasterElement, Result};

use super::travel_cost;
use crate::frontier::Wavefront;

/// Euclidean cell distance algorithm
#[derive(Debug, Clone, Default)]
pub struct Distance;

impl Algorithm for Distance {
    type Input = Raster<u8>;
    type Output = Raster<f32>;
    type Params = ();
    type Error = Error;

    fn name(&self) -> &'static str {
        "Distance"
    }

    fn description(&self) -> &'static str {
        "Distance from every cell to the nearest target cell"
    }

    fn execute(&self, input: Self::Input, _params: Self::Params) -> Result<Self::Output> {
        distance(&input)
    }
}

/// Relax `to` from `from`, true when its distance improved
#[inline]
fn improve(dist: &mut [f32], cols: usize, from: Cell, to: Cell, cost: f32) -> bool {
    let alt = dist[from.index(cols)] + cost;
    let current = &mut dist[to.index(cols)];
    if *current > alt {
        *current = alt;
        true
    } else {
        false
    }
}

/// Distance in map units from every cell to the nearest nonzero target.
///
/// Paths move between 8-connected cells, a step costs 1 orthogonally and
/// sqrt 2 diagonally before scaling by the cell size. Nodata targets are
/// nodata (NaN) in the result and are never crossed. Without any target
/// every cell holds a large finite value. The cell size must be positive.
pub fn distance(target: &Raster<u8>) -> Result<Raster<f32>> {
    let (rows, cols) = target.shape();
    let cell_size = target.cell_size() as f32;
    if !cell_size.is_finite() || cell_size <= 0.0 {
        return Err(Error::not_positive("cell_size", target.cell_size()));
    }
    // stays finite once scaled by the cell size
    let unreachable = (f32::MAX / 2.0) / cell_size.max(1.0);

    let mut dist = vec![unreachable; rows * cols];
    let mut wave = Wavefront::new(rows, cols);

    for cell in target.cells() {
        if target.is_nodata_cell(cell) {
            dist[cell.index(cols)] = f32::NAN;
        } else if target[cell] != 0 {
            dist[cell.index(cols)] = 0.0;
            wave.seed(cell)?;
        }
    }

    wave.drain(|from, to, step| improve(&mut dist, cols, from, to, step), None)?;

    let mut result = target.with_same_meta::<f32>().with_nodata(Some(f32::NAN));
    for (out, d) in result.data_mut().iter_mut().zip(&dist) {
        *out = d * cell_size;
    }
    Ok(result)
}

/// Accumulated travel time from every cell to the nearest nonzero target.
///
/// Entering a cell costs its travel time, times sqrt 2 for a diagonal step.
/// Cells where the target or the travel time is nodata are nodata (NaN) and
/// block paths; cells no target can reach hold `f32::MAX`.
pub fn travel_distance<T: RasterElement>(target: &Raster<u8>, travel_time: &Raster<T>) -> Result<Raster<f32>> {
    target.ensure_same_shape(travel_time)?;

    let mut result = target.with_same_meta::<f32>().with_nodata(Some(f32::NAN));
    result.fill(f32::MAX);
    let mut wave = Wavefront::new(target.rows(), target.cols());

    for cell in target.cells() {
        if target.is_nodata_cell(cell) || travel_time.is_nodata_cell(cell) {
            result.mark_as_nodata(cell);
        } else if target[cell] != 0 {
            result[cell] = 0.0;
            wave.seed(cell)?;
        }
    }

    wave.drain(
        |from, to, step| {
            if result[from].is_nan() || result[to].is_nan() {
                return false;
            }
            let Some(cost) = travel_cost(travel_time, to) else {
                return false;
            };
            let alt = result[from] + step * cost;
            if result[to] > alt {
                result[to] = alt;
                true
            } else {
                false
            }
        },
        None,
    )?;

    Ok(result)
}

/// Value of the nearest nonzero target for every cell.
///
/// Nodata targets are ignored. Equally near targets resolve to the one whose
/// wavefront arrives first, in raster scan order of the targets. The result
/// has no nodata value; cells no target reaches are 0.
pub fn closest_target<T: RasterElement>(target: &Raster<T>) -> Result<Raster<T>> {
    let (rows, cols) = target.shape();

    let mut dist = vec![f32::MAX; rows * cols];
    let mut result = target.like(T::zero()).with_nodata(None);
    let mut wave = Wavefront::new(rows, cols);

    for cell in target.cells() {
        if target.is_nodata_cell(cell) {
            continue;
        }
        if target[cell].is_nonzero() {
            dist[cell.index(cols)] = 0.0;
            result[cell] = target[cell];
            wave.seed(cell)?;
        }
    }

    wave.drain(
        |from, to, step| {
            if improve(&mut dist, cols, from, to, step) {
                result[to] = result[from];
                true
            } else {
                false
            }
        },
        None,
    )?;

    Ok(result)
}

/// `value` at the nearest nonzero target, for every cell.
///
/// The result carries the metadata of `value`. A target whose value is
/// nodata spreads nodata to the cells it is nearest to. Cells no target
/// reaches are 0.
pub fn value_at_closest_target<T, V>(target: &Raster<T>, value: &Raster<V>) -> Result<Raster<V>>
where
    T: RasterElement,
    V: RasterElement,
{
    target.ensure_same_shape(value)?;

    let (rows, cols) = target.shape();
    let unreachable = (rows * cols + 1) as f32;

    let mut dist = vec![unreachable; rows * cols];
    let mut result = value.like(V::zero());
    let mut wave = Wavefront::new(rows, cols);

    for cell in target.cells() {
        if target.is_nodata_cell(cell) || !target[cell].is_nonzero() {
            continue;
        }

        dist[cell.index(cols)] = 0.0;
        if value.is_nodata_cell(cell) {
            result.mark_as_nodata(cell);
        } else {
            result[cell] = value[cell];
        }
        wave.seed(cell)?;
    }

    wave.drain(
        |from, to, step| {
            if improve(&mut dist, cols, from, to, step) {
                result[to] = result[from];
                true
            } else {
                false
            }
        },
        None,
    )?;

    Ok(result)
}

/// `value` at the target with the lowest travel time, for every cell.
///
/// Entering a cell costs its travel time, times sqrt 2 for a diagonal step.
/// Cells where `value` is nodata keep it and block paths, as do cells with
/// nodata travel time. Cells no target reaches are 0.
pub fn value_at_closest_travel_target<T, R, V>(
    target: &Raster<T>,
    travel_time: &Raster<R>,
    value: &Raster<V>,
) -> Result<Raster<V>>
where
    T: RasterElement,
    R: RasterElement,
    V: RasterElement,
{
    closest_travel_target(target, travel_time, value, f32::MAX)
}

/// Like [`value_at_closest_travel_target`], but only targets reachable within
/// `max_travel_time` count; cells farther from every target are 0.
pub fn value_at_closest_travel_target_within<T, R, V>(
    target: &Raster<T>,
    travel_time: &Raster<R>,
    max_travel_time: f32,
    value: &Raster<V>,
) -> Result<Raster<V>>
where
    T: RasterElement,
    R: RasterElement,
    V: RasterElement,
{
    if max_travel_time.is_nan() || max_travel_time <= 0.0 {
        return Err(Error::not_positive("max_travel_time", max_travel_time));
    }
    closest_travel_target(target, travel_time, value, max_travel_time)
}

fn closest_travel_target<T, R, V>(
    target: &Raster<T>,
    travel_time: &Raster<R>,
    value: &Raster<V>,
    unreachable: f32,
) -> Result<Raster<V>>
where
    T: RasterElement,
    R: RasterElement,
    V: RasterElement,
{
    target.ensure_same_shape(travel_time)?;
    target.ensure_same_shape(value)?;

    let (rows, cols) = target.shape();

    let mut dist = vec![unreachable; rows * cols];
    let mut result = value.like(V::zero());
    let mut wave = Wavefront::new(rows, cols);

    for cell in target.cells() {
        if value.is_nodata_cell(cell) {
            result[cell] = value[cell];
            dist[cell.index(cols)] = f32::NAN;
        } else if !target.is_nodata_cell(cell) && target[cell].is_nonzero() {
            dist[cell.index(cols)] = 0.0;
            result[cell] = value[cell];
            wave.seed(cell)?;
        }
    }

    wave.drain(
        |from, to, step| {
            let Some(cost) = travel_cost(travel_time, to) else {
                return false;
            };
            // NaN distances never compare greater, so nodata cells stay put
            if improve(&mut dist, cols, from, to, step * cost) {
                result[to] = result[from];
                true
            } else {
                false
            }
        },
        None,
    )?;

    Ok(result)
}

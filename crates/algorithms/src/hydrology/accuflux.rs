//! Material transport along a flow direction map
//!
//! Every cell releases an amount of material that is carried downstream to
//! the pit at the end of its flow path:
//! - [`accuflux`]: the full amount arrives everywhere downstream
//! - [`accufraction_flux`]: each cell passes on only a fraction of what it receives
//! - [`flux_origin`]: how much of each cell's material reaches the first station downstream

use flowgrid_core::raster::Raster;
use flowgrid_core::{Algorithm, Cell, Error, Result};

use super::ldd::{traverse_ldd, Ldd};

/// Accumulated flux algorithm
#[derive(Debug, Clone, Default)]
pub struct Accuflux;

impl Algorithm for Accuflux {
    type Input = (Raster<u8>, Raster<f32>);
    type Output = Raster<f32>;
    type Params = ();
    type Error = Error;

    fn name(&self) -> &'static str {
        "Accuflux"
    }

    fn description(&self) -> &'static str {
        "Accumulate material downstream along a local drain direction map"
    }

    fn execute(&self, input: Self::Input, _params: Self::Params) -> Result<Self::Output> {
        let (ldd, amount) = input;
        accuflux(&ldd, &amount)
    }
}

/// Accumulate `amount` downstream.
///
/// Each output cell holds its own amount plus the amounts of every cell
/// whose flow path runs through it. Cells without a flow direction are
/// nodata. Fails on the first fault found on any flow path.
pub fn accuflux(ldd: &Raster<u8>, amount: &Raster<f32>) -> Result<Raster<f32>> {
    ldd.ensure_same_shape(amount)?;

    let view = Ldd::new(ldd);
    let mut result = amount.clone();

    for cell in ldd.cells() {
        if view.is_nodata(cell) {
            result.mark_as_nodata(cell);
            continue;
        }

        let freight = amount[cell];
        traverse_ldd(cell, &view, |_, dest| {
            result[dest] += freight;
            true
        })?;
    }

    Ok(result)
}

fn freight_at(amount: &Raster<f32>, fraction: &Raster<f32>, cell: Cell) -> f64 {
    if amount.is_nodata_cell(cell) || fraction.is_nodata_cell(cell) {
        return f64::NAN;
    }
    amount[cell] as f64 * fraction[cell] as f64
}

/// Accumulate `amount` downstream, attenuated by `fraction`.
///
/// A cell keeps `amount * fraction` of its own material and at every hop
/// downstream the carried material is multiplied by the fraction of the
/// receiving cell. Once a path crosses a nodata amount or fraction, every
/// cell further downstream on it becomes nodata (NaN).
pub fn accufraction_flux(
    ldd: &Raster<u8>,
    amount: &Raster<f32>,
    fraction: &Raster<f32>,
) -> Result<Raster<f32>> {
    ldd.ensure_same_shape(amount)?;
    ldd.ensure_same_shape(fraction)?;

    let view = Ldd::new(ldd);
    let mut result = ldd.with_same_meta::<f32>().with_nodata(Some(f32::NAN));
    for cell in ldd.cells() {
        result[cell] = amount[cell] * fraction[cell];
    }

    for cell in ldd.cells() {
        if view.is_nodata(cell) {
            result.mark_as_nodata(cell);
            continue;
        }

        let mut freight = freight_at(amount, fraction, cell);
        if freight.is_nan() {
            result.mark_as_nodata(cell);
        }

        traverse_ldd(cell, &view, |_, dest| {
            freight = if fraction.is_nodata_cell(dest) {
                f64::NAN
            } else {
                freight * fraction[dest] as f64
            };

            if freight.is_nan() {
                result.mark_as_nodata(dest);
            } else {
                result[dest] += freight as f32;
            }
            true
        })?;
    }

    Ok(result)
}

/// For every cell, the part of its own `amount * fraction` that survives
/// the trip to the first station downstream.
///
/// Stations are the nonzero cells of `station`. A station cell yields its
/// own `amount * fraction`; cells whose path never meets a station yield 0;
/// a nodata amount or fraction on the way yields nodata (NaN).
pub fn flux_origin(
    ldd: &Raster<u8>,
    amount: &Raster<f32>,
    fraction: &Raster<f32>,
    station: &Raster<i32>,
) -> Result<Raster<f32>> {
    ldd.ensure_same_shape(amount)?;
    ldd.ensure_same_shape(fraction)?;
    ldd.ensure_same_shape(station)?;

    let view = Ldd::new(ldd);
    let is_station = |cell: Cell| !station.is_nodata_cell(cell) && station[cell] != 0;
    let mut result = ldd.with_same_meta::<f32>().with_nodata(Some(f32::NAN));

    for cell in ldd.cells() {
        if view.is_nodata(cell) {
            result.mark_as_nodata(cell);
            continue;
        }

        let mut freight = freight_at(amount, fraction, cell);
        if is_station(cell) {
            result[cell] = freight as f32;
            continue;
        }

        let mut arrived = None;
        traverse_ldd(cell, &view, |_, dest| {
            if is_station(dest) {
                arrived = Some(freight);
                return false;
            }
            freight = if fraction.is_nodata_cell(dest) {
                f64::NAN
            } else {
                freight * fraction[dest] as f64
            };
            true
        })?;

        if let Some(freight) = arrived {
            result[cell] = freight as f32;
        }
    }

    Ok(result)
}

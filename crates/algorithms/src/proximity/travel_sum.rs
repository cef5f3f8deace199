//! Sums of values within a travel-time radius of every mask cell
//!
//! Each mask cell runs its own bounded wavefront. The distance field, marks
//! and frontier of those runs live in a [`TravelScratch`] that is allocated
//! once and handed back in pristine state after every query, so a query only
//! costs the cells it actually reaches.

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::info;

use flowgrid_core::raster::{orthogonal_neighbours, Raster};
use flowgrid_core::{Algorithm, Cell, Error, RasterElement, Result};

use super::travel_cost;
use crate::frontier::{Mark, MarkGrid, Wavefront};

const PROGRESS_INTERVAL: Duration = Duration::from_secs(3);

/// Parameters for [`sum_within_travel_distance`]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SumWithinTravelDistanceParams {
    /// Travel time radius around every mask cell, must be positive
    pub max_resistance: f32,
    /// Also count cells orthogonally adjacent to the reached area
    #[serde(default)]
    pub include_adjacent: bool,
}

impl Default for SumWithinTravelDistanceParams {
    fn default() -> Self {
        Self {
            max_resistance: 1.0,
            include_adjacent: false,
        }
    }
}

/// Travel-time radius sum algorithm
#[derive(Debug, Clone, Default)]
pub struct SumWithinTravelDistance;

impl Algorithm for SumWithinTravelDistance {
    type Input = (Raster<u8>, Raster<f32>, Raster<f32>);
    type Output = Raster<f32>;
    type Params = SumWithinTravelDistanceParams;
    type Error = Error;

    fn name(&self) -> &'static str {
        "SumWithinTravelDistance"
    }

    fn description(&self) -> &'static str {
        "Sum of values reachable within a travel time from every mask cell"
    }

    fn execute(&self, input: Self::Input, params: Self::Params) -> Result<Self::Output> {
        let (mask, travel, values) = input;
        sum_within_travel_distance(&mask, &travel, &values, params)
    }
}

/// Smallest f32 strictly greater than a positive finite `x`
fn next_up(x: f32) -> f32 {
    debug_assert!(x.is_finite() && x > 0.0);
    f32::from_bits(x.to_bits() + 1)
}

/// Reusable state of bounded travel-time queries.
///
/// Between queries every distance equals [`TravelScratch::unreachable`],
/// every mark is [`Mark::Todo`] and the frontier is empty.
#[derive(Debug)]
pub struct TravelScratch {
    rows: usize,
    cols: usize,
    max_resistance: f32,
    unreachable: f32,
    dist: Vec<f32>,
    wave: Wavefront,
    reached: Vec<Cell>,
    adjacent: Vec<Cell>,
}

impl TravelScratch {
    /// Scratch for queries of radius `max_resistance` on a `rows` x `cols` grid
    pub fn new(rows: usize, cols: usize, max_resistance: f32) -> Result<Self> {
        if !max_resistance.is_finite() || max_resistance <= 0.0 {
            return Err(Error::not_positive("max_resistance", max_resistance));
        }

        // one ulp above the radius so that a cost exactly on it still counts
        let unreachable = next_up(max_resistance);
        Ok(Self {
            rows,
            cols,
            max_resistance,
            unreachable,
            dist: vec![unreachable; rows * cols],
            wave: Wavefront::new(rows, cols),
            reached: Vec::new(),
            adjacent: Vec::new(),
        })
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    pub fn max_resistance(&self) -> f32 {
        self.max_resistance
    }

    /// Distance of cells no query has reached
    pub fn unreachable(&self) -> f32 {
        self.unreachable
    }

    pub fn distances(&self) -> &[f32] {
        &self.dist
    }

    pub fn marks(&self) -> &MarkGrid {
        &self.wave.marks
    }

    /// Whether the scratch is in its between-queries state
    pub fn is_pristine(&self) -> bool {
        let unreachable = self.unreachable.to_bits();
        self.dist.iter().all(|d| d.to_bits() == unreachable)
            && self.wave.marks.all_todo()
            && self.wave.queue.is_empty()
            && self.reached.is_empty()
            && self.adjacent.is_empty()
    }

    fn ensure_fits<T: RasterElement>(&self, raster: &Raster<T>) -> Result<()> {
        let (ar, ac) = raster.shape();
        if (ar, ac) != (self.rows, self.cols) {
            return Err(Error::SizeMismatch {
                er: self.rows,
                ec: self.cols,
                ar,
                ac,
            });
        }
        Ok(())
    }

    /// Bounded wavefront from `origin`, filling `reached` with every cell
    /// within the radius (the origin included)
    fn expand<R: RasterElement>(&mut self, origin: Cell, travel: &Raster<R>) -> Result<()> {
        let Self {
            cols,
            dist,
            wave,
            reached,
            ..
        } = self;
        let cols = *cols;

        dist[origin.index(cols)] = 0.0;
        if travel.is_nodata_cell(origin) {
            wave.marks.set(origin, Mark::Done);
        } else {
            wave.seed(origin)?;
        }
        reached.push(origin);

        wave.drain(
            |from, to, step| {
                let (Some(cost_from), Some(cost_to)) = (travel_cost(travel, from), travel_cost(travel, to)) else {
                    return false;
                };
                let alt = dist[from.index(cols)] + step / 2.0 * (cost_from + cost_to);
                let current = &mut dist[to.index(cols)];
                if *current > alt {
                    *current = alt;
                    true
                } else {
                    false
                }
            },
            Some(reached),
        )
    }

    /// Put every cell the last query touched back into its pristine state
    fn restore(&mut self) {
        let cols = self.cols;
        for &cell in &self.reached {
            self.dist[cell.index(cols)] = self.unreachable;
        }
        for &cell in &self.adjacent {
            self.wave.marks.set(cell, Mark::Todo);
        }
        self.reached.clear();
        self.adjacent.clear();
    }
}

/// Sum of `values` over the cells reachable from `origin` within the
/// scratch's travel time radius.
///
/// A step between two cells costs the mean of their travel times, times
/// sqrt 2 for a diagonal step; cells with nodata travel time are never
/// entered. Nodata values do not count. With `include_adjacent`, cells
/// orthogonally adjacent to the reached area are added as well.
///
/// The scratch must be pristine on entry and is pristine again on return.
pub fn sum_within_travel_distance_at<R, V>(
    origin: Cell,
    travel: &Raster<R>,
    values: &Raster<V>,
    include_adjacent: bool,
    scratch: &mut TravelScratch,
) -> Result<V>
where
    R: RasterElement,
    V: RasterElement,
{
    scratch.ensure_fits(travel)?;
    scratch.ensure_fits(values)?;
    if !travel.contains(origin) {
        return Err(Error::IndexOutOfBounds {
            row: origin.row.max(0) as usize,
            col: origin.col.max(0) as usize,
            rows: scratch.rows,
            cols: scratch.cols,
        });
    }

    let value_at = |cell: Cell| {
        let v = values[cell];
        (!values.is_nodata(v)).then_some(v)
    };

    scratch.expand(origin, travel)?;

    let mut sum = V::zero();
    for &cell in &scratch.reached {
        debug_assert!(scratch.dist[cell.index(scratch.cols)] <= scratch.max_resistance);
        debug_assert_eq!(scratch.wave.marks.get(cell), Mark::Done);
        if let Some(v) = value_at(cell) {
            sum = sum + v;
        }
        scratch.wave.marks.set(cell, Mark::Todo);
    }

    if include_adjacent {
        let (rows, cols) = (scratch.rows, scratch.cols);
        for i in 0..scratch.reached.len() {
            for n in orthogonal_neighbours(scratch.reached[i], rows, cols) {
                if scratch.dist[n.index(cols)] > scratch.max_resistance && scratch.wave.marks.get(n) == Mark::Todo {
                    if let Some(v) = value_at(n) {
                        sum = sum + v;
                    }
                    scratch.wave.marks.set(n, Mark::Done);
                    scratch.adjacent.push(n);
                }
            }
        }
    }

    scratch.restore();
    Ok(sum)
}

/// For every nonzero cell of `mask`, the sum of `values` reachable within
/// `params.max_resistance` travel time, see [`sum_within_travel_distance_at`].
///
/// The result carries the metadata of `values`; cells outside the mask are 0.
pub fn sum_within_travel_distance<M, R, V>(
    mask: &Raster<M>,
    travel: &Raster<R>,
    values: &Raster<V>,
    params: SumWithinTravelDistanceParams,
) -> Result<Raster<V>>
where
    M: RasterElement,
    R: RasterElement,
    V: RasterElement,
{
    mask.ensure_same_shape(travel)?;
    mask.ensure_same_shape(values)?;

    let (rows, cols) = mask.shape();
    let mut scratch = TravelScratch::new(rows, cols, params.max_resistance)?;
    let mut result = values.like(V::zero());

    let start = Instant::now();
    let mut last_report = start;

    for row in 0..rows {
        for col in 0..cols {
            let cell = Cell::at(row, col);
            if mask.is_nodata_cell(cell) || !mask[cell].is_nonzero() {
                continue;
            }
            result[cell] =
                sum_within_travel_distance_at(cell, travel, values, params.include_adjacent, &mut scratch)?;
        }

        let now = Instant::now();
        if now.duration_since(last_report) > PROGRESS_INTERVAL {
            last_report = now;
            let elapsed = now.duration_since(start);
            let expected = elapsed.mul_f64(rows as f64 / (row + 1) as f64);
            info!(
                "sum_within_travel_distance processed {:.1}%, elapsed {}, expected total runtime {}",
                100.0 * (row + 1) as f64 / rows as f64,
                hms(elapsed),
                hms(expected),
            );
        }
    }

    Ok(result)
}

fn hms(duration: Duration) -> String {
    let secs = duration.as_secs();
    format!("{:02}:{:02}:{:02}", secs / 3600, secs / 60 % 60, secs % 60)
}

#[cfg(test)]
mod tests {
    use super::*;

    const NAN: f32 = f32::NAN;

    fn grid<T: RasterElement>(values: &[T], rows: usize, cols: usize) -> Raster<T> {
        Raster::from_vec(values.to_vec(), rows, cols)
            .unwrap()
            .with_cell_size(100.0)
    }

    fn params(max_resistance: f32, include_adjacent: bool) -> SumWithinTravelDistanceParams {
        SumWithinTravelDistanceParams {
            max_resistance,
            include_adjacent,
        }
    }

    fn full_mask() -> Raster<u8> {
        Raster::filled(5, 4, 1u8).with_cell_size(100.0)
    }

    fn resistance(middle: f32) -> Raster<f32> {
        grid(
            &[
                1.0, 1.0, 1.0, 1.0, //
                1.0, 1.0, middle, 1.0, //
                0.5, 0.5, 0.5, 0.5, //
                1.0, 1.0, 1.0, 1.0, //
                1.0, 1.0, 1.0, 1.0,
            ],
            5,
            4,
        )
        .with_nodata(Some(NAN))
    }

    fn values(hole: f32) -> Raster<f32> {
        grid(
            &[
                1.0, 10.0, 1.0, 1.0, //
                1.0, 10.0, 1.0, 1.0, //
                1.0, 10.0, 1.0, 1.0, //
                1.0, 10.0, hole, 1.0, //
                1.0, 10.0, 1.0, 1.0,
            ],
            5,
            4,
        )
        .with_nodata(Some(NAN))
    }

    const WITHOUT_ADJACENT: [f32; 20] = [
        12.0, 22.0, 12.0, 3.0, //
        13.0, 31.0, 1.0, 3.0, //
        14.0, 33.0, 13.0, 14.0, //
        13.0, 31.0, 13.0, 3.0, //
        12.0, 22.0, 12.0, 3.0,
    ];

    const WITH_ADJACENT: [f32; 20] = [
        24.0, 35.0, 25.0, 15.0, //
        35.0, 46.0, 14.0, 7.0, //
        38.0, 58.0, 39.0, 38.0, //
        34.0, 46.0, 37.0, 16.0, //
        24.0, 34.0, 25.0, 14.0,
    ];

    fn collect(raster: &Raster<f32>) -> Vec<f32> {
        raster.iter().copied().collect()
    }

    #[test]
    fn test_sum_within_travel_distance() {
        let result =
            sum_within_travel_distance(&full_mask(), &resistance(9.0), &values(0.0), params(1.01, false)).unwrap();
        assert_eq!(collect(&result), WITHOUT_ADJACENT);
        assert_eq!(result.cell_size(), 100.0);
    }

    #[test]
    fn test_sum_within_travel_distance_nodata() {
        let result =
            sum_within_travel_distance(&full_mask(), &resistance(NAN), &values(NAN), params(1.01, false)).unwrap();
        assert_eq!(collect(&result), WITHOUT_ADJACENT);
    }

    #[test]
    fn test_sum_within_travel_distance_with_adjacent() {
        let result =
            sum_within_travel_distance(&full_mask(), &resistance(9.0), &values(0.0), params(1.01, true)).unwrap();
        assert_eq!(collect(&result), WITH_ADJACENT);
    }

    #[test]
    fn test_sum_within_travel_distance_with_adjacent_nodata() {
        let result =
            sum_within_travel_distance(&full_mask(), &resistance(NAN), &values(NAN), params(1.01, true)).unwrap();
        assert_eq!(collect(&result), WITH_ADJACENT);
    }

    #[test]
    fn test_sum_within_travel_distance_sparse_mask() {
        let mut mask_values = vec![0u8; 50];
        for i in [20, 21, 30, 33] {
            mask_values[i] = 1;
        }
        let mask = grid(&mask_values, 5, 10);
        let travel = grid(
            &[
                9.0f32, 9.0, 9.0, 9.0, 9.0, 9.0, 9.0, 9.0, 1.0, 1.0, //
                9.0, 9.0, 9.0, 9.0, 9.0, 9.0, 9.0, 1.0, 9.0, 1.0, //
                1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 9.0, 9.0, 1.0, //
                9.0, 9.0, 9.0, 9.0, 9.0, 9.0, 9.0, 9.0, 9.0, 1.0, //
                9.0, 9.0, 9.0, 9.0, 9.0, 9.0, 9.0, 9.0, 9.0, 1.0,
            ],
            5,
            10,
        )
        .with_nodata(Some(NAN));
        let value: Vec<f32> = (0..50).map(|i| (10 + i) as f32).collect();
        let value = grid(&value, 5, 10).with_nodata(Some(NAN));

        let result = sum_within_travel_distance(&mask, &travel, &value, params(10.0001, false)).unwrap();
        let mut expected = vec![0.0f32; 50];
        expected[20] = 685.0;
        expected[21] = 823.0;
        expected[30] = 346.0;
        expected[33] = 463.0;
        assert_eq!(collect(&result), expected);
    }

    #[test]
    fn test_scratch_stays_pristine() {
        let travel = resistance(NAN);
        let value = values(NAN);
        let mut scratch = TravelScratch::new(5, 4, 1.01).unwrap();
        assert!(scratch.is_pristine());
        let before = scratch.distances().to_vec();

        for include_adjacent in [false, true] {
            for cell in travel.cells() {
                sum_within_travel_distance_at(cell, &travel, &value, include_adjacent, &mut scratch).unwrap();
                assert!(scratch.is_pristine(), "scratch dirty after {cell}");
            }
        }
        assert_eq!(scratch.distances(), before.as_slice());
        assert!(scratch.marks().all_todo());
    }

    #[test]
    fn test_single_query() {
        let mut scratch = TravelScratch::new(5, 4, 1.01).unwrap();
        let sum = sum_within_travel_distance_at(Cell::new(1, 2), &resistance(9.0), &values(0.0), false, &mut scratch)
            .unwrap();
        // the expensive cell reaches nothing but itself
        assert_eq!(sum, 1.0);
    }

    #[test]
    fn test_unreachable_is_next_float() {
        let scratch = TravelScratch::new(1, 1, 10.0).unwrap();
        assert!(scratch.unreachable() > 10.0);
        assert_eq!(scratch.unreachable().to_bits(), 10.0f32.to_bits() + 1);
    }

    #[test]
    fn test_rejects_bad_radius() {
        for radius in [0.0, -1.0, NAN] {
            let err = sum_within_travel_distance(&full_mask(), &resistance(1.0), &values(0.0), params(radius, false))
                .unwrap_err();
            assert!(matches!(err, Error::InvalidParameter { .. }));
        }
    }

    #[test]
    fn test_rejects_size_mismatch() {
        let err = sum_within_travel_distance(
            &full_mask(),
            &Raster::<f32>::new(4, 5),
            &values(0.0),
            params(1.0, false),
        )
        .unwrap_err();
        assert!(matches!(err, Error::SizeMismatch { .. }));

        let mut scratch = TravelScratch::new(2, 2, 1.0).unwrap();
        let err = sum_within_travel_distance_at(Cell::new(0, 0), &resistance(1.0), &values(0.0), false, &mut scratch)
            .unwrap_err();
        assert!(matches!(err, Error::SizeMismatch { .. }));
    }

    #[test]
    fn test_algorithm_trait() {
        let result = SumWithinTravelDistance
            .execute((full_mask(), resistance(9.0), values(0.0)), params(1.01, true))
            .unwrap();
        assert_eq!(collect(&result), WITH_ADJACENT);
    }
}

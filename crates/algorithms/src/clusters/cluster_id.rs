//! Cluster labelling by flood fill
//!
//! A cluster is a maximal set of connected cells sharing the same nonzero
//! value. Clusters are numbered from 1 in the raster scan order of their
//! first cell.

use serde::{Deserialize, Serialize};

use flowgrid_core::raster::{neighbours, Raster};
use flowgrid_core::{Algorithm, Cell, Connectivity, Error, RasterElement, Result};

use super::{id_raster, warn_on_float};
use crate::frontier::{FrontierQueue, Mark, MarkGrid};

/// Cluster labelling algorithm
#[derive(Debug, Clone, Default)]
pub struct ClusterId;

impl Algorithm for ClusterId {
    type Input = Raster<i32>;
    type Output = Raster<i32>;
    type Params = Connectivity;
    type Error = Error;

    fn name(&self) -> &'static str {
        "ClusterId"
    }

    fn description(&self) -> &'static str {
        "Label connected cells of equal value with sequential cluster ids"
    }

    fn execute(&self, input: Self::Input, params: Self::Params) -> Result<Self::Output> {
        cluster_id(&input, params)
    }
}

/// Parameters for [`fuzzy_cluster_id`]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FuzzyClusterParams {
    /// Linking distance in map units
    pub radius: f64,
}

impl Default for FuzzyClusterParams {
    fn default() -> Self {
        Self { radius: 1.0 }
    }
}

/// Visit every cluster of equal nonzero values in raster scan order
fn for_each_cluster<T, F>(raster: &Raster<T>, connectivity: Connectivity, mut visit: F) -> Result<()>
where
    T: RasterElement,
    F: FnMut(&[Cell]),
{
    let (rows, cols) = raster.shape();
    let mut marks = MarkGrid::new(rows, cols);
    let mut queue = FrontierQueue::for_grid(rows, cols);
    let mut members = Vec::new();

    for start in raster.cells() {
        if raster.is_nodata_cell(start) || !raster[start].is_nonzero() || marks.get(start) != Mark::Todo {
            continue;
        }

        let value = raster[start];
        members.clear();
        queue.clear();

        marks.set(start, Mark::Border);
        queue.push_back(start)?;
        members.push(start);

        while let Some(cell) = queue.pop_head() {
            marks.set(cell, Mark::Done);
            for n in neighbours(cell, rows, cols, connectivity) {
                if marks.get(n) == Mark::Todo && !raster.is_nodata_cell(n) && raster[n] == value {
                    marks.set(n, Mark::Border);
                    queue.push_back(n)?;
                    members.push(n);
                }
            }
        }

        visit(&members);
    }

    Ok(())
}

/// Label clusters of connected cells with equal nonzero values.
///
/// Zero cells are 0, nodata cells are nodata (-9999). With
/// [`Connectivity::Eight`] diagonal neighbours are connected too.
pub fn cluster_id<T: RasterElement>(raster: &Raster<T>, connectivity: Connectivity) -> Result<Raster<i32>> {
    warn_on_float(raster);

    let mut result = id_raster(raster);
    let mut next_id = 0;
    for_each_cluster(raster, connectivity, |members| {
        next_id += 1;
        for &cell in members {
            result[cell] = next_id;
        }
    })?;

    Ok(result)
}

/// Label every cell with the number of cells of its cluster.
///
/// Clusters are those of [`cluster_id`]; zero cells are 0, nodata cells
/// are nodata (-9999).
pub fn cluster_size<T: RasterElement>(raster: &Raster<T>, connectivity: Connectivity) -> Result<Raster<i32>> {
    warn_on_float(raster);

    let mut result = id_raster(raster);
    for_each_cluster(raster, connectivity, |members| {
        let size = members.len() as i32;
        for &cell in members {
            result[cell] = size;
        }
    })?;

    Ok(result)
}

/// Label clusters of equal nonzero values linked within a radius.
///
/// A cell joins a cluster when it has the cluster's value and lies next to,
/// or within `params.radius` map units of, any cell already in it.
pub fn fuzzy_cluster_id<T: RasterElement>(raster: &Raster<T>, params: FuzzyClusterParams) -> Result<Raster<i32>> {
    if !params.radius.is_finite() || params.radius <= 0.0 {
        return Err(Error::not_positive("radius", params.radius));
    }
    warn_on_float(raster);

    let (rows, cols) = raster.shape();
    let radius = (params.radius / raster.cell_size()) as f32;
    // no offset on the grid is longer than the grid diagonal
    let diagonal2 = (rows * rows + cols * cols) as f32;
    let radius_cells = (radius.min(rows.max(cols) as f32) as isize).max(1);
    let radius2 = (radius * radius).min(diagonal2) as isize;
    let (last_row, last_col) = (rows as isize - 1, cols as isize - 1);

    let mut result = id_raster(raster);
    let mut marks = MarkGrid::new(rows, cols);
    let mut queue = FrontierQueue::for_grid(rows, cols);
    let mut next_id = 0;

    for start in raster.cells() {
        if raster.is_nodata_cell(start) || !raster[start].is_nonzero() || marks.get(start) != Mark::Todo {
            continue;
        }

        next_id += 1;
        let value = raster[start];
        queue.clear();
        marks.set(start, Mark::Border);
        queue.push_back(start)?;

        while let Some(cell) = queue.pop_head() {
            marks.set(cell, Mark::Done);
            result[cell] = next_id;

            for row in (cell.row - radius_cells).max(0)..=(cell.row + radius_cells).min(last_row) {
                for col in (cell.col - radius_cells).max(0)..=(cell.col + radius_cells).min(last_col) {
                    let (dr, dc) = (row - cell.row, col - cell.col);
                    let adjacent = dr.abs() <= 1 && dc.abs() <= 1;
                    if !adjacent && dr * dr + dc * dc > radius2 {
                        continue;
                    }
                    let n = Cell::new(row, col);
                    if marks.get(n) != Mark::Todo {
                        continue;
                    }
                    if !raster.is_nodata_cell(n) && raster[n] == value {
                        marks.set(n, Mark::Border);
                        queue.push_back(n)?;
                    }
                }
            }
        }
    }

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid<T: RasterElement>(values: &[T], rows: usize, cols: usize) -> Raster<T> {
        Raster::from_vec(values.to_vec(), rows, cols).unwrap()
    }

    fn collect(raster: &Raster<i32>) -> Vec<i32> {
        raster.iter().copied().collect()
    }

    fn blocks() -> Raster<i32> {
        grid(&[1, 1, 1, 1, 1, 1, 2, 3, 3, 3, 3, 3, 1, 1, 5, 5, 1, 1, 5, 1], 5, 4)
    }

    fn ring() -> Raster<i32> {
        grid(&[1, 2, 3, 4, 2, 9, 9, 5, 3, 9, 9, 6, 4, 9, 9, 7, 5, 6, 7, 8], 5, 4)
    }

    #[test]
    fn test_cluster_id() {
        let result = cluster_id(&blocks(), Connectivity::Four).unwrap();
        assert_eq!(
            collect(&result),
            vec![
                1, 1, 1, 1, //
                1, 1, 2, 3, //
                3, 3, 3, 3, //
                4, 4, 5, 5, //
                4, 4, 5, 6,
            ]
        );
        assert_eq!(result.nodata(), None);
    }

    #[test]
    fn test_cluster_id_border_values() {
        let result = cluster_id(&ring(), Connectivity::Four).unwrap();
        assert_eq!(
            collect(&result),
            vec![
                1, 2, 3, 4, //
                5, 6, 6, 7, //
                8, 6, 6, 9, //
                10, 6, 6, 11, //
                12, 13, 14, 15,
            ]
        );
    }

    #[test]
    fn test_cluster_id_diagonals() {
        let raster = grid(&[1u8, 0, 1, 0, 1, 0, 1, 0, 1], 3, 3);
        let four = cluster_id(&raster, Connectivity::Four).unwrap();
        assert_eq!(collect(&four), vec![1, 0, 2, 0, 3, 0, 4, 0, 5]);
        let eight = cluster_id(&raster, Connectivity::Eight).unwrap();
        assert_eq!(collect(&eight), vec![1, 0, 1, 0, 1, 0, 1, 0, 1]);
    }

    #[test]
    fn test_cluster_id_nodata() {
        let raster = grid(&[1i32, -1, 1, 1], 2, 2).with_nodata(Some(-1));
        let result = cluster_id(&raster, Connectivity::Four).unwrap();
        assert_eq!(result.nodata(), Some(-9999));
        assert_eq!(collect(&result), vec![1, -9999, 1, 1]);
    }

    #[test]
    fn test_cluster_id_trait() {
        let result = ClusterId.execute_default(blocks()).unwrap();
        assert_eq!(result.get(4, 3).unwrap(), 6);
    }

    #[test]
    fn test_cluster_size() {
        let result = cluster_size(&blocks(), Connectivity::Four).unwrap();
        assert_eq!(
            collect(&result),
            vec![
                6, 6, 6, 6, //
                6, 6, 1, 5, //
                5, 5, 5, 5, //
                4, 4, 3, 3, //
                4, 4, 3, 1,
            ]
        );
    }

    #[test]
    fn test_cluster_size_border_values() {
        let result = cluster_size(&ring(), Connectivity::Four).unwrap();
        assert_eq!(
            collect(&result),
            vec![
                1, 1, 1, 1, //
                1, 6, 6, 1, //
                1, 6, 6, 1, //
                1, 6, 6, 1, //
                1, 1, 1, 1,
            ]
        );
    }

    #[test]
    fn test_cluster_size_equal_to_input_nodata() {
        let raster = grid(
            &[
                1u8, 1, 1, 2, //
                1, 1, 1, 2, //
                1, 1, 1, 2, //
                4, 4, 5, 2, //
                2, 2, 2, 2,
            ],
            5,
            4,
        )
        .with_nodata(Some(9));

        let result = cluster_size(&raster, Connectivity::Four).unwrap();
        assert_eq!(
            collect(&result),
            vec![
                9, 9, 9, 8, //
                9, 9, 9, 8, //
                9, 9, 9, 8, //
                2, 2, 1, 8, //
                8, 8, 8, 8,
            ]
        );
        // a size of 9 is data, the result uses its own nodata value
        assert!(!result.is_nodata_at(0, 0).unwrap());
    }

    #[test]
    fn test_fuzzy_cluster_id() {
        let raster = grid(
            &[
                1.0f32, 1.0, 1.0, 1.0, 1.0, 0.0, 0.0, 0.0, 0.0, 0.0, //
                1.0, 1.0, 0.0, 1.0, 0.0, 0.0, 1.0, 0.0, 1.0, 0.0, //
                1.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, //
                1.0, 0.0, 1.0, 1.0, 0.0, 0.0, 1.0, 0.0, 1.0, 0.0, //
                1.0, 1.0, 1.0, 1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, //
                0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 1.0, //
                0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, //
                0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0, //
                1.0, 0.0, 1.0, 0.0, 1.0, 0.0, 1.0, 0.0, 0.0, 0.0, //
                0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0,
            ],
            10,
            10,
        )
        .with_cell_size(100.0);

        let result = fuzzy_cluster_id(&raster, FuzzyClusterParams { radius: 142.0 }).unwrap();
        assert_eq!(
            collect(&result),
            vec![
                1, 1, 1, 1, 1, 0, 0, 0, 0, 0, //
                1, 1, 0, 1, 0, 0, 2, 0, 2, 0, //
                1, 0, 0, 1, 0, 0, 0, 2, 0, 0, //
                1, 0, 1, 1, 0, 0, 2, 0, 2, 0, //
                1, 1, 1, 1, 0, 0, 0, 0, 0, 0, //
                0, 0, 0, 0, 0, 0, 0, 0, 0, 3, //
                0, 0, 0, 0, 0, 0, 0, 0, 0, 0, //
                0, 0, 0, 0, 0, 0, 0, 0, 4, 0, //
                5, 0, 6, 0, 7, 0, 8, 0, 0, 0, //
                0, 0, 0, 0, 0, 0, 0, 0, 0, 0,
            ]
        );
    }

    #[test]
    fn test_fuzzy_cluster_id_wider_radius_links_gaps() {
        let raster = grid(&[1i32, 0, 1, 0, 0, 1], 1, 6).with_cell_size(10.0);
        let near = fuzzy_cluster_id(&raster, FuzzyClusterParams { radius: 15.0 }).unwrap();
        assert_eq!(collect(&near), vec![1, 0, 2, 0, 0, 3]);
        let far = fuzzy_cluster_id(&raster, FuzzyClusterParams { radius: 20.0 }).unwrap();
        assert_eq!(collect(&far), vec![1, 0, 1, 0, 0, 2]);
        let farther = fuzzy_cluster_id(&raster, FuzzyClusterParams { radius: 30.0 }).unwrap();
        assert_eq!(collect(&farther), vec![1, 0, 1, 0, 0, 1]);
    }

    #[test]
    fn test_fuzzy_cluster_id_radius_beyond_grid() {
        let raster = grid(&[1i32, 0, 0, 1], 2, 2);
        for radius in [3000.0, 1e30] {
            let result = fuzzy_cluster_id(&raster, FuzzyClusterParams { radius }).unwrap();
            assert_eq!(collect(&result), vec![1, 0, 0, 1]);
        }

        let strip = grid(&[2i32, 0, 0, 0, 0, 0, 0, 2], 1, 8).with_cell_size(0.5);
        let result = fuzzy_cluster_id(&strip, FuzzyClusterParams { radius: 1e6 }).unwrap();
        assert_eq!(collect(&result), vec![1, 0, 0, 0, 0, 0, 0, 1]);
    }

    #[test]
    fn test_fuzzy_cluster_id_requires_equal_values() {
        let raster = grid(&[1i32, 2, 2], 1, 3);
        let result = fuzzy_cluster_id(&raster, FuzzyClusterParams { radius: 1.0 }).unwrap();
        assert_eq!(collect(&result), vec![1, 2, 2]);
    }

    #[test]
    fn test_fuzzy_cluster_id_rejects_bad_radius() {
        let raster = grid(&[1i32], 1, 1);
        for radius in [0.0, -5.0, f64::NAN] {
            let err = fuzzy_cluster_id(&raster, FuzzyClusterParams { radius }).unwrap_err();
            assert!(matches!(err, Error::InvalidParameter { name: "radius", .. }));
        }
    }
}

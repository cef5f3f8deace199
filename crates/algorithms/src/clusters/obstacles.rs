//! Cluster labelling across obstacle cells

use std::collections::BTreeMap;

use flowgrid_core::raster::{diagonal_neighbours, orthogonal_neighbours, Raster, D8_NEIGHBOURS};
use flowgrid_core::{Cell, Result};

use super::id_raster;
use crate::frontier::{FrontierQueue, Mark, MarkGrid};

/// Label 8-connected clusters of equal nonzero categories that obstacles
/// cannot cross.
///
/// Obstacles are the nonzero and nodata cells of `obstacles`. A diagonal step
/// needs at least one of the two cells it cuts past to be free, so a
/// one-cell-wide diagonal wall seals off both sides.
///
/// Afterwards, in raster scan order, every obstacle cell with a category
/// joins the cluster holding most of its free neighbours; ties go to the
/// cluster with fewer cells at that point, then to the lowest id. Zero
/// categories and obstacle cells without labelled neighbours are 0, nodata
/// categories are nodata (-9999).
pub fn cluster_id_with_obstacles(categories: &Raster<i32>, obstacles: &Raster<u8>) -> Result<Raster<i32>> {
    categories.ensure_same_shape(obstacles)?;

    let (rows, cols) = categories.shape();
    let blocked = |cell: Cell| obstacles.is_nodata_cell(cell) || obstacles[cell] != 0;
    let has_category = |cell: Cell| !categories.is_nodata_cell(cell) && categories[cell] != 0;

    let mut result = id_raster(categories);
    let mut marks = MarkGrid::new(rows, cols);
    let mut queue = FrontierQueue::for_grid(rows, cols);
    // sizes[id] is the cell count of cluster `id`
    let mut sizes = vec![0usize];

    for start in categories.cells() {
        if !has_category(start) || blocked(start) || marks.get(start) != Mark::Todo {
            continue;
        }

        let id = sizes.len() as i32;
        let value = categories[start];
        let mut size = 0;

        queue.clear();
        marks.set(start, Mark::Border);
        queue.push_back(start)?;

        while let Some(cell) = queue.pop_head() {
            marks.set(cell, Mark::Done);
            result[cell] = id;
            size += 1;

            let joins = |n: Cell| {
                marks.get(n) == Mark::Todo && has_category(n) && categories[n] == value && !blocked(n)
            };

            let mut next = Vec::with_capacity(8);
            next.extend(orthogonal_neighbours(cell, rows, cols).filter(|&n| joins(n)));
            next.extend(
                diagonal_neighbours(cell, rows, cols)
                    .filter(|&n| joins(n))
                    .filter(|&n| !blocked(Cell::new(cell.row, n.col)) || !blocked(Cell::new(n.row, cell.col))),
            );
            for n in next {
                marks.set(n, Mark::Border);
                queue.push_back(n)?;
            }
        }

        sizes.push(size);
    }

    for cell in categories.cells() {
        if !has_category(cell) || !blocked(cell) {
            continue;
        }

        let mut counts = BTreeMap::new();
        for &(dr, dc, _) in &D8_NEIGHBOURS {
            let n = cell.offset(dr, dc);
            if n.is_on_grid(rows, cols) && !blocked(n) && result[n] > 0 {
                *counts.entry(result[n]).or_insert(0usize) += 1;
            }
        }

        let mut best: Option<(i32, usize)> = None;
        for (id, count) in counts {
            best = match best {
                Some((best_id, best_count))
                    if count < best_count
                        || (count == best_count && sizes[id as usize] >= sizes[best_id as usize]) =>
                {
                    Some((best_id, best_count))
                }
                _ => Some((id, count)),
            };
        }

        if let Some((id, _)) = best {
            result[cell] = id;
            sizes[id as usize] += 1;
        }
    }

    Ok(result)
}

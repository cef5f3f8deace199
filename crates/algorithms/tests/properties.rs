//! Property-based tests for flow routing, wavefronts and cluster labelling.
//!
//! Random grids are kept small so every property runs over many cases.

use flowgrid_algorithms::clusters::{cluster_id, fuzzy_cluster_id, FuzzyClusterParams};
use flowgrid_algorithms::hydrology::{accuflux, validate_ldd, LddDiagnostics, PIT};
use flowgrid_algorithms::proximity::{distance, sum_within_travel_distance_at, TravelScratch};
use flowgrid_core::{Cell, Connectivity, Error, LddFault, Raster};
use proptest::prelude::*;

/// Loop-free ldd: every cell drains south-ish or east, the bottom right
/// corner is a pit, and `choices` picks among the codes that stay on the grid
fn draining_ldd(rows: usize, cols: usize, choices: &[u8]) -> Raster<u8> {
    let mut codes = Vec::with_capacity(rows * cols);
    for row in 0..rows {
        for col in 0..cols {
            let mut options = vec![PIT];
            if row + 1 < rows {
                options.push(2);
                if col > 0 {
                    options.push(1);
                }
                if col + 1 < cols {
                    options.push(3);
                }
            }
            if col + 1 < cols {
                options.push(6);
            }
            let choice = choices[row * cols + col] as usize;
            codes.push(options[choice % options.len()]);
        }
    }
    Raster::from_vec(codes, rows, cols).unwrap()
}

fn ldd_strategy() -> impl Strategy<Value = Raster<u8>> {
    (1usize..8, 1usize..8).prop_flat_map(|(rows, cols)| {
        prop::collection::vec(any::<u8>(), rows * cols).prop_map(move |choices| draining_ldd(rows, cols, &choices))
    })
}

fn binary_grid(max_side: usize) -> impl Strategy<Value = Raster<i32>> {
    (1..max_side, 1..max_side).prop_flat_map(|(rows, cols)| {
        prop::collection::vec(prop::bool::weighted(0.3), rows * cols).prop_map(move |cells| {
            let values = cells.into_iter().map(i32::from).collect();
            Raster::from_vec(values, rows, cols).unwrap()
        })
    })
}

proptest! {
    /// All material released on a draining map ends up in its pits
    #[test]
    fn prop_accuflux_conserves_material(ldd in ldd_strategy()) {
        prop_assert!(validate_ldd(&ldd, &LddDiagnostics::new()));

        let ones = Raster::filled(ldd.rows(), ldd.cols(), 1.0f32);
        let flux = accuflux(&ldd, &ones).unwrap();

        let mut at_pits = 0.0f64;
        for cell in ldd.cells() {
            if ldd[cell] == PIT {
                at_pits += flux[cell] as f64;
            }
            prop_assert!(flux[cell] >= 1.0);
        }
        prop_assert_eq!(at_pits, ldd.len() as f64);
    }

    /// A two-cell cycle planted anywhere is caught by both validation and accuflux
    #[test]
    fn prop_planted_loop_is_detected(ldd in ldd_strategy(), at in any::<prop::sample::Index>()) {
        prop_assume!(ldd.cols() >= 2);
        let mut ldd = ldd;
        let row = at.index(ldd.rows());
        let col = at.index(ldd.cols() - 1);
        ldd.set(row, col, 6).unwrap();
        ldd.set(row, col + 1, 4).unwrap();

        prop_assert!(!validate_ldd(&ldd, &LddDiagnostics::new()));

        let err = accuflux(&ldd, &Raster::filled(ldd.rows(), ldd.cols(), 1.0)).unwrap_err();
        prop_assert!(matches!(err, Error::UnsoundLdd(LddFault::Loop(_))));
    }

    /// On an open grid the wavefront finds the exact octile distance
    #[test]
    fn prop_distance_is_octile(
        rows in 1usize..12,
        cols in 1usize..12,
        picks in prop::collection::vec(any::<prop::sample::Index>(), 1..4),
    ) {
        let mut target = Raster::<u8>::new(rows, cols);
        let targets: Vec<Cell> = picks
            .iter()
            .map(|p| Cell::from_index(p.index(rows * cols), cols))
            .collect();
        for t in &targets {
            target[*t] = 1;
        }

        let result = distance(&target).unwrap();
        for cell in target.cells() {
            let expected = targets
                .iter()
                .map(|t| {
                    let dr = (cell.row - t.row).unsigned_abs() as f32;
                    let dc = (cell.col - t.col).unsigned_abs() as f32;
                    dr.max(dc) - dr.min(dc) + std::f32::consts::SQRT_2 * dr.min(dc)
                })
                .fold(f32::MAX, f32::min);
            prop_assert!((result[cell] - expected).abs() < 1e-4, "cell {}: {} != {}", cell, result[cell], expected);
        }
    }

    /// Bounded queries leave the scratch exactly as they found it
    #[test]
    fn prop_travel_scratch_stays_pristine(
        rows in 1usize..8,
        cols in 1usize..8,
        radius in 0.1f32..6.0,
        include_adjacent in any::<bool>(),
        seed in prop::collection::vec((0.1f32..3.0, prop::bool::weighted(0.15), 0i32..10), 64),
    ) {
        let travel: Vec<f32> = seed[..rows * cols]
            .iter()
            .map(|&(t, hole, _)| if hole { f32::NAN } else { t })
            .collect();
        let values: Vec<i32> = seed[..rows * cols].iter().map(|&(_, _, v)| v).collect();
        let travel = Raster::from_vec(travel, rows, cols).unwrap().with_nodata(Some(f32::NAN));
        let values = Raster::from_vec(values, rows, cols).unwrap();

        let mut scratch = TravelScratch::new(rows, cols, radius).unwrap();
        let pristine = scratch.distances().to_vec();
        for cell in travel.cells() {
            let sum = sum_within_travel_distance_at(cell, &travel, &values, include_adjacent, &mut scratch).unwrap();
            prop_assert!(sum >= 0);
            prop_assert!(scratch.is_pristine());
        }
        prop_assert_eq!(scratch.distances(), pristine.as_slice());
    }

    /// Labels appear in raster order as 1, 2, 3, ...
    #[test]
    fn prop_cluster_labels_in_scan_order(raster in binary_grid(12), eight in any::<bool>()) {
        let connectivity = if eight { Connectivity::Eight } else { Connectivity::Four };
        let labels = cluster_id(&raster, connectivity).unwrap();

        let mut highest = 0;
        for cell in raster.cells() {
            let label = labels[cell];
            prop_assert_eq!(label == 0, raster[cell] == 0);
            prop_assert!(label <= highest + 1);
            highest = highest.max(label);
        }
    }

    /// Equal cells within the radius always share a cluster
    #[test]
    fn prop_fuzzy_clusters_link_within_radius(raster in binary_grid(10), half_cells in 1u32..5) {
        let radius = half_cells as f64 + 0.5;
        let labels = fuzzy_cluster_id(&raster, FuzzyClusterParams { radius }).unwrap();

        let members: Vec<Cell> = raster.cells().filter(|&c| raster[c] != 0).collect();
        for (i, a) in members.iter().enumerate() {
            for b in &members[i + 1..] {
                if a.distance(*b) <= radius {
                    prop_assert_eq!(labels[*a], labels[*b], "{} and {} are within {}", a, b, radius);
                }
            }
        }
    }
}

#[test]
fn fuzzy_clusters_stay_apart_beyond_radius() {
    let raster = Raster::from_vec(vec![1i32, 0, 0, 1], 1, 4).unwrap();
    let labels = fuzzy_cluster_id(&raster, FuzzyClusterParams { radius: 2.5 }).unwrap();
    assert_ne!(labels[Cell::new(0, 0)], labels[Cell::new(0, 3)]);
}

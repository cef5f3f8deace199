//! Connected component labelling
//!
//! - Strict clusters of equal values under 4- or 8-connectivity
//! - Cluster sizes
//! - Radius-linked (fuzzy) clusters
//! - Clusters separated by obstacle cells

mod cluster_id;
mod obstacles;

pub use cluster_id::{cluster_id, cluster_size, fuzzy_cluster_id, ClusterId, FuzzyClusterParams};
pub use obstacles::cluster_id_with_obstacles;

use flowgrid_core::raster::Raster;
use flowgrid_core::RasterElement;
use tracing::warn;

use crate::hydrology::NODATA_ID;

/// Zero-filled label raster shaped like `raster`; cells that are nodata in
/// `raster` are [`NODATA_ID`]
fn id_raster<T: RasterElement>(raster: &Raster<T>) -> Raster<i32> {
    let mut result = raster.with_same_meta::<i32>();
    if raster.nodata().is_some() {
        result.set_nodata(Some(NODATA_ID));
        for cell in raster.cells() {
            if raster.is_nodata_cell(cell) {
                result[cell] = NODATA_ID;
            }
        }
    }
    result
}

fn warn_on_float<T: RasterElement>(_raster: &Raster<T>) {
    if T::is_float() {
        warn!("Performing cluster operation on floating point raster");
    }
}

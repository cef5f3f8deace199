//! Multi-source wavefront propagation
//!
//! Distance, travel cost and attribute fields grown from target cells:
//! - Cell distance and travel-time distance
//! - Closest target id and value at the closest target
//! - Bounded per-cell travel sums over a reusable scratch arena

mod distance;
mod travel_sum;

pub use distance::{
    closest_target, distance, travel_distance, value_at_closest_target, value_at_closest_travel_target,
    value_at_closest_travel_target_within, Distance,
};
pub use travel_sum::{
    sum_within_travel_distance, sum_within_travel_distance_at, SumWithinTravelDistance,
    SumWithinTravelDistanceParams, TravelScratch,
};

use flowgrid_core::raster::Raster;
use flowgrid_core::{Cell, RasterElement};

/// Travel cost of entering `cell`, `None` when it is nodata
#[inline]
pub(crate) fn travel_cost<T: RasterElement>(travel: &Raster<T>, cell: Cell) -> Option<f32> {
    let value = travel[cell];
    if travel.is_nodata(value) {
        return None;
    }
    value.to_f64().map(|v| v as f32)
}

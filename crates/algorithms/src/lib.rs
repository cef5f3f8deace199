//! # flowgrid Algorithms
//!
//! Flow routing and proximity analysis on raster grids.
//!
//! ## Available Algorithm Categories
//!
//! - **hydrology**: LDD traversal, validation and repair, accuflux family,
//!   station clusters, catchments, flow path distances
//! - **proximity**: Wavefront distances, closest targets, travel-time sums
//! - **clusters**: Cluster ids, cluster sizes, fuzzy and obstacle-aware clusters
//! - **frontier**: The queue and mark state shared by all propagations

pub mod clusters;
pub mod frontier;
pub mod hydrology;
pub(crate) mod maybe_rayon;
pub mod proximity;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::clusters::{
        cluster_id, cluster_id_with_obstacles, cluster_size, fuzzy_cluster_id, ClusterId, FuzzyClusterParams,
    };
    pub use crate::hydrology::{
        accufraction_flux, accuflux, catchment, fix_ldd, flux_origin, ldd_cluster, ldd_dist, max_upstream_dist,
        slope_length, traverse_ldd, validate_ldd, Accuflux, CatchmentMode, CatchmentParams, Ldd,
        LddDiagnostics, LddRepair,
    };
    pub use crate::proximity::{
        closest_target, distance, sum_within_travel_distance, travel_distance, value_at_closest_target,
        value_at_closest_travel_target, value_at_closest_travel_target_within, Distance, SumWithinTravelDistance,
        SumWithinTravelDistanceParams, TravelScratch,
    };
    pub use flowgrid_core::prelude::*;
}

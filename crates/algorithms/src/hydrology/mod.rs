//! Flow routing over local drain direction maps
//!
//! - LDD decoding, traversal, validation and repair
//! - Accuflux family: material transport downstream
//! - Station clusters and catchments
//! - Friction distances along flow paths

mod accuflux;
mod catchment;
pub(crate) mod ldd;
mod ldd_distance;

pub use accuflux::{accufraction_flux, accuflux, flux_origin, Accuflux};
pub use catchment::{
    catchment, catchment_with_progress, ldd_cluster, CatchmentMode, CatchmentParams, NODATA_ID,
};
pub use ldd::{
    fix_ldd, trace_flow_path, traverse_ldd, traverse_ldd_upstream, validate_ldd, Direction, FlowCode, Ldd,
    LddDiagnostics, LddRepair, PIT,
};
pub use ldd_distance::{ldd_dist, max_upstream_dist, max_upstream_dist_with_progress, slope_length};

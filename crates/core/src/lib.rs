//! # flowgrid Core
//!
//! Core types and traits for the flowgrid raster flow-routing library.
//!
//! This crate provides:
//! - `Raster<T>`: Generic row-major raster grid with an optional nodata value
//! - `RasterMetadata`: Dimensions, cell size and nodata of a grid
//! - `Cell`: (row, col) address with D8 neighbour arithmetic
//! - Error types shared by all algorithms
//! - Algorithm traits for consistent API

pub mod error;
pub mod raster;

pub use error::{Error, LddFault, Result};
pub use raster::{Cell, Connectivity, Raster, RasterElement, RasterMetadata};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::error::{Error, LddFault, Result};
    pub use crate::raster::{Cell, Connectivity, Raster, RasterElement, RasterMetadata};
    pub use crate::Algorithm;
}

/// Core trait for all algorithms in flowgrid.
///
/// Algorithms are pure functions that transform input data according to parameters.
pub trait Algorithm {
    /// Input type for the algorithm
    type Input;
    /// Output type for the algorithm
    type Output;
    /// Parameters controlling algorithm behavior
    type Params: Default;
    /// Error type for algorithm execution
    type Error: std::error::Error;

    /// Returns the algorithm name
    fn name(&self) -> &'static str;

    /// Returns a description of what the algorithm does
    fn description(&self) -> &'static str;

    /// Execute the algorithm
    fn execute(&self, input: Self::Input, params: Self::Params) -> std::result::Result<Self::Output, Self::Error>;

    /// Execute with default parameters
    fn execute_default(&self, input: Self::Input) -> std::result::Result<Self::Output, Self::Error> {
        self.execute(input, Self::Params::default())
    }
}

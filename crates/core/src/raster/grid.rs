//! Main Raster type

use std::ops::{Index, IndexMut};

use ndarray::{Array2, ArrayView2, ArrayViewMut2};

use crate::error::{Error, Result};
use crate::raster::{Cell, RasterElement, RasterMetadata};

/// A 2D raster grid with an optional nodata sentinel.
///
/// `Raster<T>` stores values of type `T` in row-major order together with the
/// cell size (assumed square) used to convert cell steps into map distances.
///
/// # Type Parameters
///
/// - `T`: The cell value type, must implement [`RasterElement`]
///
/// # Example
///
/// ```
/// use flowgrid_core::{Cell, Raster};
///
/// let mut raster: Raster<f32> = Raster::new(100, 100);
/// raster.set(10, 20, 42.0).unwrap();
/// assert_eq!(raster[Cell::at(10, 20)], 42.0);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Raster<T: RasterElement> {
    /// Raster data stored in row-major order (row, col)
    data: Array2<T>,
    /// Width of a (square) cell in map units
    cell_size: f64,
    /// No-data value
    nodata: Option<T>,
}

impl<T: RasterElement> Raster<T> {
    /// Create a new raster filled with zeros
    pub fn new(rows: usize, cols: usize) -> Self {
        Self::from_array(Array2::zeros((rows, cols)))
    }

    /// Create a new raster filled with a specific value
    pub fn filled(rows: usize, cols: usize, value: T) -> Self {
        Self::from_array(Array2::from_elem((rows, cols), value))
    }

    /// Create a raster from row-major data
    pub fn from_vec(data: Vec<T>, rows: usize, cols: usize) -> Result<Self> {
        if data.len() != rows * cols {
            return Err(Error::InvalidDimensions {
                width: cols,
                height: rows,
            });
        }

        let array = Array2::from_shape_vec((rows, cols), data)
            .map_err(|e| Error::Other(e.to_string()))?;

        Ok(Self::from_array(array))
    }

    /// Create a raster from an ndarray
    pub fn from_array(data: Array2<T>) -> Self {
        Self {
            data,
            cell_size: 1.0,
            nodata: None,
        }
    }

    /// Create a raster from metadata, every cell set to `fill`.
    ///
    /// A metadata nodata value that cannot be represented in `T` is dropped.
    pub fn from_metadata(meta: &RasterMetadata, fill: T) -> Self {
        Self {
            data: Array2::from_elem((meta.rows, meta.cols), fill),
            cell_size: meta.cell_size,
            nodata: meta.nodata.and_then(T::from_f64),
        }
    }

    /// Builder: set the cell size
    pub fn with_cell_size(mut self, cell_size: f64) -> Self {
        self.cell_size = cell_size;
        self
    }

    /// Builder: set the nodata value
    pub fn with_nodata(mut self, nodata: Option<T>) -> Self {
        self.nodata = nodata;
        self
    }

    /// Create a zero-filled raster of another element type with the same
    /// dimensions and cell size. The new raster has no nodata value.
    pub fn with_same_meta<U: RasterElement>(&self) -> Raster<U> {
        Raster {
            data: Array2::zeros(self.data.dim()),
            cell_size: self.cell_size,
            nodata: None,
        }
    }

    /// Create a raster with the same dimensions and metadata, filled with a value
    pub fn like(&self, fill_value: T) -> Self {
        Self {
            data: Array2::from_elem(self.data.dim(), fill_value),
            cell_size: self.cell_size,
            nodata: self.nodata,
        }
    }

    // Dimensions

    /// Number of rows
    pub fn rows(&self) -> usize {
        self.data.nrows()
    }

    /// Number of columns
    pub fn cols(&self) -> usize {
        self.data.ncols()
    }

    /// Dimensions as (rows, cols)
    pub fn shape(&self) -> (usize, usize) {
        self.data.dim()
    }

    /// Total number of cells
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the raster is empty
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Whether `cell` lies inside the grid
    pub fn contains(&self, cell: Cell) -> bool {
        cell.is_on_grid(self.rows(), self.cols())
    }

    /// Fail with [`Error::SizeMismatch`] unless `other` has the same shape
    pub fn ensure_same_shape<U: RasterElement>(&self, other: &Raster<U>) -> Result<()> {
        let (er, ec) = self.shape();
        let (ar, ac) = other.shape();
        if (er, ec) != (ar, ac) {
            return Err(Error::SizeMismatch { er, ec, ar, ac });
        }
        Ok(())
    }

    // Data access

    /// Get value at (row, col)
    pub fn get(&self, row: usize, col: usize) -> Result<T> {
        self.data
            .get((row, col))
            .copied()
            .ok_or(Error::IndexOutOfBounds {
                row,
                col,
                rows: self.rows(),
                cols: self.cols(),
            })
    }

    /// Set value at (row, col)
    pub fn set(&mut self, row: usize, col: usize, value: T) -> Result<()> {
        if row >= self.rows() || col >= self.cols() {
            return Err(Error::IndexOutOfBounds {
                row,
                col,
                rows: self.rows(),
                cols: self.cols(),
            });
        }
        self.data[(row, col)] = value;
        Ok(())
    }

    /// Value at a row-major linear index
    pub fn get_linear(&self, index: usize) -> Option<T> {
        let cols = self.cols();
        if cols == 0 || index >= self.len() {
            return None;
        }
        self.data.get((index / cols, index % cols)).copied()
    }

    /// Iterate values in row-major order
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.data.iter()
    }

    /// Iterate every cell address in row-major order
    pub fn cells(&self) -> impl Iterator<Item = Cell> {
        let cols = self.cols();
        (0..self.len()).map(move |i| Cell::from_index(i, cols))
    }

    /// Get a view of the underlying data
    pub fn view(&self) -> ArrayView2<'_, T> {
        self.data.view()
    }

    /// Get a mutable view of the underlying data
    pub fn view_mut(&mut self) -> ArrayViewMut2<'_, T> {
        self.data.view_mut()
    }

    /// Get a reference to the underlying array
    pub fn data(&self) -> &Array2<T> {
        &self.data
    }

    /// Get a mutable reference to the underlying array
    pub fn data_mut(&mut self) -> &mut Array2<T> {
        &mut self.data
    }

    /// Consume the raster and return the underlying array
    pub fn into_array(self) -> Array2<T> {
        self.data
    }

    /// Fill every cell with `value`, keeping the metadata
    pub fn fill(&mut self, value: T) {
        self.data.fill(value);
    }

    // Metadata

    /// Get the no-data value
    pub fn nodata(&self) -> Option<T> {
        self.nodata
    }

    /// Set the no-data value
    pub fn set_nodata(&mut self, nodata: Option<T>) {
        self.nodata = nodata;
    }

    /// Cell size (assumes square cells)
    pub fn cell_size(&self) -> f64 {
        self.cell_size
    }

    pub fn set_cell_size(&mut self, cell_size: f64) {
        self.cell_size = cell_size;
    }

    /// Dimensions, cell size and nodata as a type-erased description
    pub fn metadata(&self) -> RasterMetadata {
        RasterMetadata {
            rows: self.rows(),
            cols: self.cols(),
            cell_size: self.cell_size,
            nodata: self.nodata.and_then(RasterElement::to_f64),
        }
    }

    // Value checks

    /// Check if a value is no-data
    pub fn is_nodata(&self, value: T) -> bool {
        value.is_nodata(self.nodata)
    }

    /// Check if cell at (row, col) contains no-data
    pub fn is_nodata_at(&self, row: usize, col: usize) -> Result<bool> {
        let value = self.get(row, col)?;
        Ok(self.is_nodata(value))
    }

    /// Check if an on-grid cell contains no-data
    ///
    /// # Panics
    /// If `cell` lies outside the grid
    pub fn is_nodata_cell(&self, cell: Cell) -> bool {
        self.is_nodata(self[cell])
    }

    /// Overwrite `cell` with the nodata value.
    ///
    /// When the raster has no nodata value yet, the element type's default
    /// (NaN for floats, the maximum for integers) is installed first.
    pub fn mark_as_nodata(&mut self, cell: Cell) {
        let nodata = match self.nodata {
            Some(nd) => nd,
            None => {
                let nd = T::default_nodata();
                self.nodata = Some(nd);
                nd
            }
        };
        self[cell] = nodata;
    }
}

impl<T: RasterElement> Index<Cell> for Raster<T> {
    type Output = T;

    fn index(&self, cell: Cell) -> &T {
        &self.data[(cell.row as usize, cell.col as usize)]
    }
}

impl<T: RasterElement> IndexMut<Cell> for Raster<T> {
    fn index_mut(&mut self, cell: Cell) -> &mut T {
        &mut self.data[(cell.row as usize, cell.col as usize)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raster_creation() {
        let raster: Raster<f32> = Raster::new(100, 200);
        assert_eq!(raster.rows(), 100);
        assert_eq!(raster.cols(), 200);
        assert_eq!(raster.shape(), (100, 200));
    }

    #[test]
    fn test_raster_access() {
        let mut raster: Raster<f32> = Raster::new(10, 10);
        raster.set(5, 5, 42.0).unwrap();
        assert_eq!(raster.get(5, 5).unwrap(), 42.0);
        assert_eq!(raster[Cell::at(5, 5)], 42.0);
        assert_eq!(raster.get_linear(55), Some(42.0));
        assert!(raster.get(10, 0).is_err());
        assert_eq!(raster.get_linear(100), None);
    }

    #[test]
    fn test_from_vec_rejects_bad_length() {
        assert!(Raster::from_vec(vec![1u8, 2, 3], 2, 2).is_err());
    }

    #[test]
    fn test_mark_as_nodata_installs_default() {
        let mut raster: Raster<f32> = Raster::new(2, 2);
        assert!(raster.nodata().is_none());
        raster.mark_as_nodata(Cell::at(1, 0));
        assert!(raster.is_nodata_cell(Cell::at(1, 0)));
        assert!(!raster.is_nodata_cell(Cell::at(0, 0)));

        let mut ids: Raster<i32> = Raster::new(2, 2).with_nodata(Some(-9999));
        ids.mark_as_nodata(Cell::at(0, 1));
        assert_eq!(ids[Cell::at(0, 1)], -9999);
    }

    #[test]
    fn test_metadata_roundtrip() {
        let raster: Raster<u8> = Raster::new(3, 4).with_cell_size(50.0).with_nodata(Some(255));
        let meta = raster.metadata();
        assert_eq!(meta.nodata, Some(255.0));

        let other: Raster<f32> = Raster::from_metadata(&meta, 0.0);
        assert_eq!(other.shape(), (3, 4));
        assert_eq!(other.cell_size(), 50.0);
        assert_eq!(other.nodata(), Some(255.0));

        let ids: Raster<i32> = raster.with_same_meta();
        assert_eq!(ids.shape(), (3, 4));
        assert!(ids.nodata().is_none());
    }

    #[test]
    fn test_ensure_same_shape() {
        let a: Raster<u8> = Raster::new(3, 4);
        let b: Raster<f32> = Raster::new(4, 3);
        let err = a.ensure_same_shape(&b).unwrap_err();
        assert!(matches!(err, Error::SizeMismatch { er: 3, ec: 4, ar: 4, ac: 3 }));
        assert!(a.ensure_same_shape(&a.like(1)).is_ok());
    }
}

//! Parallel iteration when the `parallel` feature is on, plain iteration otherwise.
//!
//! Callers write `(0..rows).into_par_iter()` either way; without rayon the
//! call resolves to `into_iter()` and the chain continues on `Iterator`.

#[cfg(feature = "parallel")]
pub use rayon::prelude::*;

#[cfg(not(feature = "parallel"))]
pub trait IntoParallelIterator: IntoIterator + Sized {
    fn into_par_iter(self) -> Self::IntoIter {
        self.into_iter()
    }
}

#[cfg(not(feature = "parallel"))]
impl<I: IntoIterator> IntoParallelIterator for I {}

//! Selecting a subset of separation bins from a measurement using a distance range.
//!
//! A [`DistanceMask`] is computed once from the native separations of a bin. The same mask is
//! then applied to the separations, to each observable vector and, row-and-column, to the
//! covariance matrix. When the covariance also covers the quadrupole, the mask is repeated over
//! the second block so both multipoles keep the same separations.
//!
//! # Examples
//!
//! ```rust
//! use barry::{ndarray::array, selection::DistanceMask};
//!
//! let dist = array![20., 30., 40., 50.];
//! let mask = DistanceMask::new(dist.view(), 30., 40.);
//! assert_eq!(mask.indices(), &[1, 2]);
//! assert_eq!(mask.cov_indices(false), vec![1, 2, 5, 6]);
//! ```

use crate::ndarray::{Array1, Array2, ArrayView1, ArrayView2};

/// The separation bins kept from a native measurement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DistanceMask {
    native_len: usize,
    idxs: Vec<usize>,
}

impl DistanceMask {
    /// Keep every bin with `min_dist <= dist <= max_dist`, in original order.
    pub fn new(dist: ArrayView1<f64>, min_dist: f64, max_dist: f64) -> Self {
        Self {
            native_len: dist.len(),
            idxs: dist
                .iter()
                .enumerate()
                .filter_map(|(idx, &d)| (min_dist..=max_dist).contains(&d).then_some(idx))
                .collect(),
        }
    }

    /// The number of bins in the untrimmed measurement.
    pub fn native_len(&self) -> usize {
        self.native_len
    }

    /// The number of bins kept.
    pub fn len(&self) -> usize {
        self.idxs.len()
    }

    /// Whether no bins fall inside the range.
    pub fn is_empty(&self) -> bool {
        self.idxs.is_empty()
    }

    /// Native indices of the kept bins.
    pub fn indices(&self) -> &[usize] {
        &self.idxs
    }

    /// Row / column indices of the covariance to keep. For `isotropic` only the monopole block
    /// is addressed, otherwise each index is repeated offset by `native_len` for the quadrupole
    /// block.
    pub fn cov_indices(&self, isotropic: bool) -> Vec<usize> {
        if isotropic {
            self.idxs.clone()
        } else {
            self.idxs
                .iter()
                .copied()
                .chain(self.idxs.iter().map(|&idx| idx + self.native_len))
                .collect()
        }
    }

    /// Select the kept bins from a vector sampled on the native separations.
    pub fn trim(&self, values: ArrayView1<f64>) -> Array1<f64> {
        trim_vector(values, &self.idxs)
    }
}

/// Select `idxs` out of `values`.
pub fn trim_vector(values: ArrayView1<f64>, idxs: &[usize]) -> Array1<f64> {
    idxs.iter().map(|&idx| values[idx]).collect()
}

/// The square submatrix of `cov` with rows and columns `idxs`.
pub fn trim_covariance(cov: ArrayView2<f64>, idxs: &[usize]) -> Array2<f64> {
    Array2::from_shape_fn((idxs.len(), idxs.len()), |(row, col)| {
        cov[[idxs[row], idxs[col]]]
    })
}

//! Covariance scaling and inversion.

use log::{debug, warn};
use nalgebra::{Cholesky, DMatrix};

use crate::{
    error::DatasetError,
    ndarray::{Array2, ArrayView1, ArrayView2},
};

/// Divide every element of `cov` by `factor`.
pub fn reduce(cov: ArrayView2<f64>, factor: f64) -> Array2<f64> {
    cov.mapv(|v| v / factor)
}

/// The Hartlap et al. (2007) correction for the inverse of a covariance estimated from
/// `num_mocks` realisations of a data vector of length `dim`.
///
/// # Errors
///
/// [`DatasetError::TooFewMocks`] if there are not enough mocks for the factor to be positive.
pub fn hartlap_factor(num_mocks: usize, dim: usize) -> Result<f64, DatasetError> {
    if num_mocks < dim + 3 {
        return Err(DatasetError::TooFewMocks { num_mocks, dim });
    }
    Ok((num_mocks - dim - 2) as f64 / (num_mocks - 1) as f64)
}

fn to_nalgebra(cov: ArrayView2<f64>) -> DMatrix<f64> {
    let (rows, cols) = cov.dim();
    DMatrix::from_fn(rows, cols, |row, col| cov[[row, col]])
}

fn from_nalgebra(matrix: &DMatrix<f64>) -> Array2<f64> {
    Array2::from_shape_fn(matrix.shape(), |(row, col)| matrix[(row, col)])
}

/// Invert a covariance matrix.
///
/// A Cholesky decomposition is tried first, falling back to LU for matrices that are not
/// numerically positive definite.
///
/// # Errors
///
/// [`DatasetError::SingularCovariance`] if the matrix has no inverse.
pub fn invert(cov: ArrayView2<f64>) -> Result<Array2<f64>, DatasetError> {
    let (rows, cols) = cov.dim();
    if rows != cols {
        return Err(DatasetError::BadShape {
            argument: "cov".into(),
            expected: "a square matrix".into(),
            received: format!("{:?}", cov.dim()),
        });
    }
    let matrix = to_nalgebra(cov);
    let inverse = match Cholesky::new(matrix.clone()) {
        Some(cholesky) => cholesky.inverse(),
        None => {
            warn!("covariance is not positive definite, inverting with LU");
            matrix
                .try_inverse()
                .ok_or(DatasetError::SingularCovariance { dim: rows })?
        }
    };
    if inverse.iter().any(|v| !v.is_finite()) {
        return Err(DatasetError::SingularCovariance { dim: rows });
    }
    Ok(from_nalgebra(&inverse))
}

/// The precision matrix used in a χ² against `cov`: its inverse, Hartlap corrected when the
/// covariance came from `num_mocks` mock realisations.
///
/// The Hartlap factor is sized on the length of `cov` as passed in, which for a dataset is the
/// trimmed covariance, not the native one.
///
/// # Errors
///
/// see [`invert`] and [`hartlap_factor`]
pub fn precision(
    cov: ArrayView2<f64>,
    num_mocks: Option<usize>,
) -> Result<Array2<f64>, DatasetError> {
    let icov = invert(cov)?;
    match num_mocks {
        Some(num_mocks) => {
            let hartlap = hartlap_factor(num_mocks, cov.nrows())?;
            debug!(
                "applying hartlap factor {:.4} for {} mocks, dim {}",
                hartlap,
                num_mocks,
                cov.nrows()
            );
            Ok(icov * hartlap)
        }
        None => Ok(icov),
    }
}

/// `diff^T icov diff`
pub fn chi_squared(diff: ArrayView1<f64>, icov: ArrayView2<f64>) -> f64 {
    diff.dot(&icov.dot(&diff))
}

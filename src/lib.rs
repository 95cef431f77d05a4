#![warn(missing_docs)]
#![warn(clippy::missing_safety_doc)]
#![warn(clippy::missing_errors_doc)]

//! Barry is a library for preparing galaxy correlation function measurements for baryon acoustic
//! oscillation (BAO) fits.
//!
//! # Examples
//!
//! Here's an example of how to load one of the published Ross et al. (2017) measurements and
//! iterate over its mock realisations.
//!
//! ```rust,no_run
//! use barry::{io::PickleStore, variants::correlation_function_ross_dr12_z038, DatasetConfig};
//!
//! // the pickled measurements live in a data directory
//! let store = PickleStore::new("data");
//!
//! // fit both multipoles
//! let config = DatasetConfig {
//!     isotropic: false,
//!     ..DatasetConfig::default()
//! };
//! let mut dataset = correlation_function_ross_dr12_z038(&store, config).unwrap();
//!
//! for realisation in 0..dataset.num_mocks() {
//!     dataset.set_realisation(Some(realisation)).unwrap();
//!     for bin in dataset.get_data() {
//!         assert_eq!(bin.cov.nrows(), 2 * bin.dist.len());
//!     }
//! }
//! ```
//!
//! # Details
//!
//! Measurements are read through a [`io::MeasurementStore`]. The dataset core,
//! [`CorrelationFunction`], trims each redshift bin to a separation range and scales the
//! covariance. Published measurements are registered in [`variants`].

pub use ndarray;

pub mod constants;
pub mod covariance;
pub mod dataset;
pub mod error;
pub mod io;
pub mod selection;
pub mod types;
pub mod variants;

#[cfg(feature = "cli")]
pub mod cli;

#[cfg(test)]
pub(crate) mod test_common;

pub use dataset::{
    BinData, CorrelationFunction, CovReduction, DatasetConfig, DatasetConfigBuilder,
};
pub use error::{BarryError, DatasetError};
pub use io::{MeasurementStore, MemoryStore, PickleStore, StoreError};
pub use types::{BinMeasurement, Cosmology, DatasetBundle, Multipoles, Realisation};
pub use variants::{variant, DatasetVariant, VARIANTS};

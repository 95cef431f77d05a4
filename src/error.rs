//! Errors that can occur in Barry

use thiserror::Error;

use crate::io::error::StoreError;

#[derive(Error, Debug)]
/// All the errors that can occur while constructing or using a dataset
pub enum DatasetError {
    /// The distance range is empty or inverted
    #[error("Invalid distance range: min_dist={min_dist} must be less than max_dist={max_dist}")]
    InvalidDistanceRange {
        /// The lower bound that was asked for
        min_dist: f64,
        /// The upper bound that was asked for
        max_dist: f64,
    },

    /// No separation bins fall inside the distance range
    #[error("No separation bins of {source_name} redshift bin {bin_idx} in [{min_dist}, {max_dist}]")]
    EmptyDistanceRange {
        /// The bundle being trimmed
        source_name: String,
        /// The redshift bin that came up empty
        bin_idx: usize,
        /// The lower bound that was asked for
        min_dist: f64,
        /// The upper bound that was asked for
        max_dist: f64,
    },

    /// The covariance reduction factor can't be used
    #[error("Invalid covariance reduction factor {factor}, expected a finite positive number")]
    InvalidCovReduction {
        /// The factor that was received
        factor: f64,
    },

    /// A named dataset doesn't support the requested configuration
    #[error("Unsupported configuration for {variant}: {reason}")]
    UnsupportedConfiguration {
        /// The name of the dataset variant
        variant: String,
        /// What about the configuration is unsupported
        reason: String,
    },

    /// The bundle has no measurements for the requested reconstruction state
    #[error("{source_name} has no {dataname} measurements")]
    MissingReconstruction {
        /// The bundle that was loaded
        source_name: String,
        /// `pre-recon` or `post-recon`
        dataname: &'static str,
    },

    /// Anisotropic mode was requested on a monopole-only measurement
    #[error("{source_name} redshift bin {bin_idx} has no quadrupole, only isotropic fits are possible")]
    MissingQuadrupole {
        /// The bundle that was loaded
        source_name: String,
        /// The redshift bin without a quadrupole
        bin_idx: usize,
    },

    /// Error for bad array shape in a measurement
    #[error("bad array shape for {argument}. expected {expected}, received {received}")]
    BadShape {
        /// The array that has the wrong shape
        argument: String,
        /// The expected shape
        expected: String,
        /// The shape that was received instead
        received: String,
    },

    /// There are too few mocks for a Hartlap correction of this dimension
    #[error("{num_mocks} mocks are too few to invert a covariance of dimension {dim}")]
    TooFewMocks {
        /// The number of mocks the covariance was estimated from
        num_mocks: usize,
        /// The dimension of the trimmed covariance
        dim: usize,
    },

    /// The trimmed covariance has no inverse
    #[error("The covariance matrix of dimension {dim} is singular")]
    SingularCovariance {
        /// The dimension of the trimmed covariance
        dim: usize,
    },

    /// No dataset variant with this name is registered
    #[error("Unknown dataset {0}")]
    UnknownVariant(String),

    /// The requested mock realisation doesn't exist
    #[error("Realisation {index} out of range, there are {num_mocks} mocks")]
    RealisationOutOfRange {
        /// The index that was asked for
        index: usize,
        /// The number of mocks available
        num_mocks: usize,
    },

    /// Error derived from [`StoreError`]
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Errors from the command line interface.
#[derive(Error, Debug)]
pub enum CLIError {
    #[error("Invalid Command Line Argument {option}. Expected {expected}. Received {received}")]
    /// When a bad CLI argument is provided
    InvalidCommandLineArgument {
        /// The argument that was bad
        option: String,
        /// What was expected
        expected: String,
        /// What was received instead
        received: String,
    },
}

#[derive(Error, Debug)]
/// Errors from the `barry` binary
pub enum BarryError {
    #[error(transparent)]
    /// Error derived from [`DatasetError`]
    DatasetError(#[from] DatasetError),

    #[error(transparent)]
    /// Error derived from [`CLIError`]
    CLIError(#[from] CLIError),

    #[cfg(feature = "cli")]
    #[error(transparent)]
    /// Error derived from [`clap::Error`]
    ClapError(#[from] clap::Error),

    #[error("Dry run")]
    /// The summary was printed and nothing else should happen
    DryRun {},
}

//! Useful constants.

/// Smallest separation kept by default [Mpc/h]
pub const DEFAULT_MIN_DIST: f64 = 30.0;
/// Largest separation kept by default [Mpc/h]
pub const DEFAULT_MAX_DIST: f64 = 200.0;

/// The number of mocks behind the Ross et al. (2017) DR12 covariances
pub const ROSS_DR12_NUM_MOCKS: usize = 1000;

/// Environment variable pointing at the directory holding the pickled bundles
pub const DATA_DIR_ENV: &str = "BARRY_DATA_DIR";
/// Directory used when [`DATA_DIR_ENV`] is unset
pub const DEFAULT_DATA_DIR: &str = "data";

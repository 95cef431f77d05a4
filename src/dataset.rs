//! Correlation function datasets.
//!
//! A [`CorrelationFunction`] loads a bundle from a [`MeasurementStore`], picks the pre or post
//! reconstruction measurements, trims every redshift bin to a separation range and scales,
//! trims and inverts the covariance. The result is handed to a fitter one redshift bin at a time
//! through [`CorrelationFunction::get_data`].
//!
//! # Examples
//!
//! ```rust
//! use barry::{
//!     io::MemoryStore,
//!     ndarray::{array, Array2},
//!     BinMeasurement, CorrelationFunction, Cosmology, DatasetBundle, DatasetConfigBuilder,
//!     Multipoles,
//! };
//!
//! let bin = BinMeasurement {
//!     dist: array![20., 30., 40., 50.],
//!     data: Multipoles { xi0: array![0.5, 0.3, 0.2, 0.1], xi2: None },
//!     cov: Array2::eye(4) * 1e-4,
//!     mocks: vec![Multipoles { xi0: array![0.4, 0.2, 0.1, 0.0], xi2: None }],
//! };
//! let bundle = DatasetBundle {
//!     name: "Toy".into(),
//!     cosmology: Cosmology::default(),
//!     post_recon: vec![bin],
//!     pre_recon: None,
//! };
//! let store = MemoryStore::new().with("toy.pkl", bundle);
//!
//! let config = DatasetConfigBuilder::default()
//!     .min_dist(25.)
//!     .max_dist(45.)
//!     .build()
//!     .unwrap();
//! let mut dataset = CorrelationFunction::new(&store, "toy.pkl", config).unwrap();
//! assert_eq!(dataset.name(), "Toy Recon");
//!
//! let data = dataset.get_data();
//! assert_eq!(data[0].dist, array![30., 40.]);
//! assert_eq!(data[0].cov.dim(), (2, 2));
//!
//! dataset.set_realisation(Some(0)).unwrap();
//! assert_eq!(dataset.get_data()[0].xi0, array![0.2, 0.1]);
//! ```

use std::{
    cmp::Ordering,
    fmt::{Display, Formatter},
};

use derive_builder::Builder;
use log::{debug, info, trace};

use crate::{
    constants::{DEFAULT_MAX_DIST, DEFAULT_MIN_DIST},
    covariance,
    error::DatasetError,
    io::MeasurementStore,
    ndarray::{Array1, Array2},
    selection::{trim_covariance, DistanceMask},
    types::{BinMeasurement, Cosmology, Multipoles, Realisation},
};

/// How the native covariance is scaled before it is trimmed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CovReduction {
    /// Divide the covariance by a fixed, positive factor
    Factor(f64),
    /// Divide the covariance by the number of mock realisations in each bin. This turns the
    /// covariance of a single realisation into the covariance of the mock mean.
    MockCount,
}

impl Default for CovReduction {
    fn default() -> Self {
        CovReduction::Factor(1.0)
    }
}

impl Display for CovReduction {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            CovReduction::Factor(factor) => write!(f, "{factor}"),
            CovReduction::MockCount => write!(f, "number of mocks"),
        }
    }
}

/// Options for constructing a [`CorrelationFunction`]
#[derive(Builder, Debug, Clone, PartialEq)]
pub struct DatasetConfig {
    /// Override the dataset name derived from the bundle
    #[builder(default, setter(into, strip_option))]
    pub name: Option<String>,
    /// Smallest separation to keep [Mpc/h], inclusive
    #[builder(default = "DEFAULT_MIN_DIST")]
    pub min_dist: f64,
    /// Largest separation to keep [Mpc/h], inclusive
    #[builder(default = "DEFAULT_MAX_DIST")]
    pub max_dist: f64,
    /// Whether to use the post-reconstruction measurements
    #[builder(default = "true")]
    pub recon: bool,
    /// Scaling applied to the covariance before trimming
    #[builder(default)]
    pub reduce_cov_factor: CovReduction,
    /// The number of mocks the covariance was estimated from, enables the Hartlap correction
    #[builder(default, setter(strip_option))]
    pub num_mocks: Option<usize>,
    /// Which observables to start with
    #[builder(default, setter(into))]
    pub realisation: Realisation,
    /// Whether to drop the quadrupole and fit the monopole only
    #[builder(default = "true")]
    pub isotropic: bool,
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            name: None,
            min_dist: DEFAULT_MIN_DIST,
            max_dist: DEFAULT_MAX_DIST,
            recon: true,
            reduce_cov_factor: CovReduction::default(),
            num_mocks: None,
            realisation: Realisation::Data,
            isotropic: true,
        }
    }
}

/// The data for one redshift bin, ready for a fitter.
#[derive(Debug, Clone, PartialEq)]
pub struct BinData {
    /// kept separations [Mpc/h]
    pub dist: Array1<f64>,
    /// monopole at `dist`
    pub xi0: Array1<f64>,
    /// quadrupole at `dist`, only when not isotropic
    pub xi2: Option<Array1<f64>>,
    /// reduced and trimmed covariance, `[N][N]` or `[2N][2N]`
    pub cov: Array2<f64>,
    /// inverse of `cov`, Hartlap corrected if `num_mocks` is known
    pub icov: Array2<f64>,
    /// name of the dataset
    pub name: String,
    /// fiducial cosmology of the measurement
    pub cosmology: Cosmology,
    /// number of mocks the covariance came from
    pub num_mocks: Option<usize>,
    /// whether only the monopole is present
    pub isotropic: bool,
    /// which observables these are
    pub realisation: Realisation,
}

impl BinData {
    /// The monopole followed by the quadrupole (if any), matching the layout of `cov`.
    pub fn data_vector(&self) -> Array1<f64> {
        self.xi0
            .iter()
            .chain(self.xi2.iter().flatten())
            .copied()
            .collect()
    }

    /// The square root of the monopole block's diagonal.
    pub fn sigma0(&self) -> Array1<f64> {
        let n = self.dist.len();
        self.cov.diag().iter().take(n).map(|v| v.sqrt()).collect()
    }

    /// The square root of the quadrupole block's diagonal, if there is one.
    pub fn sigma2(&self) -> Option<Array1<f64>> {
        let n = self.dist.len();
        self.xi2
            .as_ref()
            .map(|_| self.cov.diag().iter().skip(n).map(|v| v.sqrt()).collect())
    }
}

/// A redshift bin after trimming. The observables are kept at their native length so that the
/// realisation can be swapped without going back to the store.
#[derive(Debug, Clone)]
struct PreparedBin {
    mask: DistanceMask,
    dist: Array1<f64>,
    cov: Array2<f64>,
    icov: Array2<f64>,
    data: Multipoles,
    mocks: Vec<Multipoles>,
}

impl PreparedBin {
    fn multipoles(&self, realisation: Realisation) -> &Multipoles {
        match realisation {
            Realisation::Data => &self.data,
            // checked by `CorrelationFunction::select`
            Realisation::Mock(idx) => &self.mocks[idx],
        }
    }
}

fn bad_shape(argument: String, expected: usize, received: usize) -> DatasetError {
    DatasetError::BadShape {
        argument,
        expected: format!("length {expected}"),
        received: format!("length {received}"),
    }
}

/// Check the internal consistency of a bin before it is trimmed.
fn validate_bin(
    source_name: &str,
    bin_idx: usize,
    bin: &BinMeasurement,
    isotropic: bool,
) -> Result<(), DatasetError> {
    let n = bin.len();
    if bin.dist.windows(2).into_iter().any(|w| w[1] <= w[0]) {
        return Err(DatasetError::BadShape {
            argument: format!("bin {bin_idx} dist"),
            expected: "strictly increasing separations".into(),
            received: format!("{}", bin.dist),
        });
    }
    if bin.data.xi0.len() != n {
        return Err(bad_shape(format!("bin {bin_idx} xi0"), n, bin.data.xi0.len()));
    }
    if let Some(xi2) = &bin.data.xi2 {
        if xi2.len() != n {
            return Err(bad_shape(format!("bin {bin_idx} xi2"), n, xi2.len()));
        }
    }
    let cov_dims = bin.cov.dim();
    if cov_dims.0 != cov_dims.1 || (cov_dims.0 != n && cov_dims.0 != 2 * n) {
        return Err(DatasetError::BadShape {
            argument: format!("bin {bin_idx} cov"),
            expected: format!("({n}, {n}) or ({0}, {0})", 2 * n),
            received: format!("{cov_dims:?}"),
        });
    }
    if !isotropic && !bin.has_quadrupole() {
        return Err(DatasetError::MissingQuadrupole {
            source_name: source_name.to_string(),
            bin_idx,
        });
    }
    for (mock_idx, mock) in bin.mocks.iter().enumerate() {
        if mock.xi0.len() != n {
            return Err(bad_shape(
                format!("bin {bin_idx} mock {mock_idx} xi0"),
                n,
                mock.xi0.len(),
            ));
        }
        match (&mock.xi2, isotropic) {
            (Some(xi2), _) if xi2.len() != n => {
                return Err(bad_shape(
                    format!("bin {bin_idx} mock {mock_idx} xi2"),
                    n,
                    xi2.len(),
                ))
            }
            (None, false) => {
                return Err(DatasetError::MissingQuadrupole {
                    source_name: format!("{source_name} mock {mock_idx}"),
                    bin_idx,
                })
            }
            _ => {}
        }
    }
    Ok(())
}

/// A correlation function measurement in one or more redshift bins.
#[derive(Debug, Clone)]
pub struct CorrelationFunction {
    name: String,
    source_name: String,
    cosmology: Cosmology,
    config: DatasetConfig,
    bins: Vec<PreparedBin>,
    num_mocks_available: usize,
    realisation: Realisation,
}

impl CorrelationFunction {
    /// Load `source_name` from `store` and prepare it according to `config`.
    ///
    /// The covariance of each bin is divided by the reduction factor at its native size, then
    /// trimmed to the separations inside `[min_dist, max_dist]`. In anisotropic mode the trim
    /// covers the monopole and quadrupole blocks alike.
    ///
    /// # Errors
    ///
    /// - [`DatasetError::InvalidDistanceRange`] if `min_dist >= max_dist`
    /// - [`DatasetError::InvalidCovReduction`] if the reduction factor is not positive
    /// - [`DatasetError::Store`] if the bundle can't be loaded
    /// - [`DatasetError::MissingReconstruction`] if the bundle lacks the requested measurements
    /// - [`DatasetError::EmptyDistanceRange`] if a redshift bin has no separations in range
    /// - [`DatasetError::MissingQuadrupole`] if anisotropic mode is requested without a quadrupole
    /// - [`DatasetError::BadShape`] for inconsistent array lengths
    /// - [`DatasetError::SingularCovariance`] if a trimmed covariance can't be inverted. The
    ///   precision matrix is built here, so a positive semi-definite but singular covariance is
    ///   rejected at construction.
    /// - [`DatasetError::TooFewMocks`] if `num_mocks` is too small for the trimmed covariance
    /// - [`DatasetError::RealisationOutOfRange`] if the initial realisation doesn't exist
    pub fn new<S: MeasurementStore>(
        store: S,
        source_name: &str,
        config: DatasetConfig,
    ) -> Result<Self, DatasetError> {
        if config.min_dist.partial_cmp(&config.max_dist) != Some(Ordering::Less) {
            return Err(DatasetError::InvalidDistanceRange {
                min_dist: config.min_dist,
                max_dist: config.max_dist,
            });
        }
        if let CovReduction::Factor(factor) = config.reduce_cov_factor {
            if !factor.is_finite() || factor <= 0. {
                return Err(DatasetError::InvalidCovReduction { factor });
            }
        }

        info!("Loading dataset {}", source_name);
        let bundle = store.load(source_name)?;
        let dataname = if config.recon { "post-recon" } else { "pre-recon" };
        let native_bins = match bundle.bins(config.recon) {
            Some(bins) if !bins.is_empty() => bins,
            _ => {
                return Err(DatasetError::MissingReconstruction {
                    source_name: source_name.to_string(),
                    dataname,
                })
            }
        };

        let mut bins = Vec::with_capacity(native_bins.len());
        for (bin_idx, bin) in native_bins.iter().enumerate() {
            validate_bin(source_name, bin_idx, bin, config.isotropic)?;

            let factor = match config.reduce_cov_factor {
                CovReduction::Factor(factor) => factor,
                CovReduction::MockCount if bin.mocks.is_empty() => {
                    return Err(DatasetError::InvalidCovReduction { factor: 0. })
                }
                CovReduction::MockCount => {
                    let factor = bin.mocks.len() as f64;
                    info!("Setting reduce_cov_factor to {} for bin {}", factor, bin_idx);
                    factor
                }
            };
            let cov = covariance::reduce(bin.cov.view(), factor);

            let mask = DistanceMask::new(bin.dist.view(), config.min_dist, config.max_dist);
            if mask.is_empty() {
                return Err(DatasetError::EmptyDistanceRange {
                    source_name: source_name.to_string(),
                    bin_idx,
                    min_dist: config.min_dist,
                    max_dist: config.max_dist,
                });
            }
            debug!(
                "bin {}: keeping {} of {} separations in [{}, {}]",
                bin_idx,
                mask.len(),
                mask.native_len(),
                config.min_dist,
                config.max_dist
            );
            let cov = trim_covariance(cov.view(), &mask.cov_indices(config.isotropic));
            let icov = covariance::precision(cov.view(), config.num_mocks)?;

            bins.push(PreparedBin {
                dist: mask.trim(bin.dist.view()),
                mask,
                cov,
                icov,
                data: bin.data.clone(),
                mocks: bin.mocks.clone(),
            });
        }

        let name = match &config.name {
            Some(name) => name.clone(),
            None => format!(
                "{} {}",
                bundle.name,
                if config.recon { "Recon" } else { "Prerecon" }
            ),
        };
        let num_mocks_available = bins.iter().map(|bin| bin.mocks.len()).min().unwrap_or(0);
        let mut result = Self {
            name,
            source_name: source_name.to_string(),
            cosmology: bundle.cosmology,
            config,
            bins,
            num_mocks_available,
            realisation: Realisation::Data,
        };
        result.select(result.config.realisation)?;
        Ok(result)
    }

    /// Select the observables subsequent [`CorrelationFunction::get_data`] calls return:
    /// `None` for the nominal measurement, `Some(index)` for a mock realisation.
    ///
    /// Only the observables change, the separations and covariance stay as they are.
    ///
    /// # Errors
    ///
    /// [`DatasetError::RealisationOutOfRange`] if there is no such mock. The selection is left
    /// unchanged.
    pub fn set_realisation(&mut self, realisation: Option<usize>) -> Result<(), DatasetError> {
        self.select(Realisation::from(realisation))
    }

    /// [`CorrelationFunction::set_realisation`] with a [`Realisation`].
    ///
    /// # Errors
    ///
    /// see [`CorrelationFunction::set_realisation`]
    pub fn select(&mut self, realisation: Realisation) -> Result<(), DatasetError> {
        match realisation {
            Realisation::Mock(index) if index >= self.num_mocks_available => {
                return Err(DatasetError::RealisationOutOfRange {
                    index,
                    num_mocks: self.num_mocks_available,
                })
            }
            Realisation::Mock(index) => info!("Loading mock {}", index),
            Realisation::Data => info!("Loading data"),
        }
        self.realisation = realisation;
        Ok(())
    }

    /// The data in each redshift bin for the current realisation.
    pub fn get_data(&self) -> Vec<BinData> {
        trace!("get_data {} ({})", self.name, self.realisation);
        self.bins
            .iter()
            .map(|bin| {
                let multipoles = bin.multipoles(self.realisation);
                BinData {
                    dist: bin.dist.clone(),
                    xi0: bin.mask.trim(multipoles.xi0.view()),
                    xi2: if self.config.isotropic {
                        None
                    } else {
                        multipoles.xi2.as_ref().map(|xi2| bin.mask.trim(xi2.view()))
                    },
                    cov: bin.cov.clone(),
                    icov: bin.icov.clone(),
                    name: self.name.clone(),
                    cosmology: self.cosmology,
                    num_mocks: self.config.num_mocks,
                    isotropic: self.config.isotropic,
                    realisation: self.realisation,
                }
            })
            .collect()
    }

    /// The display name of the dataset.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The name the bundle was loaded with.
    pub fn source_name(&self) -> &str {
        &self.source_name
    }

    /// The configuration this dataset was built with.
    pub fn config(&self) -> &DatasetConfig {
        &self.config
    }

    /// The fiducial cosmology of the measurement.
    pub fn cosmology(&self) -> Cosmology {
        self.cosmology
    }

    /// The currently selected realisation.
    pub fn realisation(&self) -> Realisation {
        self.realisation
    }

    /// The number of redshift bins.
    pub fn num_bins(&self) -> usize {
        self.bins.len()
    }

    /// The number of mock realisations available in every redshift bin.
    pub fn num_mocks(&self) -> usize {
        self.num_mocks_available
    }

    /// Whether only the monopole is used.
    pub fn is_isotropic(&self) -> bool {
        self.config.isotropic
    }

    /// Whether the post-reconstruction measurements are used.
    pub fn is_recon(&self) -> bool {
        self.config.recon
    }
}

impl Display for CorrelationFunction {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "dataset:              {}", self.name)?;
        writeln!(f, "source:               {}", self.source_name)?;
        writeln!(f, "cosmology:            {}", self.cosmology)?;
        writeln!(
            f,
            "separations:          [{}, {}] Mpc/h",
            self.config.min_dist, self.config.max_dist
        )?;
        writeln!(
            f,
            "{} use reconstructed data.",
            if self.config.recon {
                "Will"
            } else {
                "Will not"
            }
        )?;
        writeln!(
            f,
            "{} fit the quadrupole.",
            if self.config.isotropic {
                "Will not"
            } else {
                "Will"
            }
        )?;
        writeln!(
            f,
            "covariance reduced by: {}",
            self.config.reduce_cov_factor
        )?;
        match self.config.num_mocks {
            Some(num_mocks) => writeln!(f, "hartlap correction:   {num_mocks} mocks")?,
            None => writeln!(f, "hartlap correction:   none")?,
        }
        writeln!(f, "realisation:          {}", self.realisation)?;
        for (bin_idx, bin) in self.bins.iter().enumerate() {
            writeln!(
                f,
                "bin {}: {} of {} separations, cov {:?}, {} mocks",
                bin_idx,
                bin.mask.len(),
                bin.mask.native_len(),
                bin.cov.dim(),
                bin.mocks.len()
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use super::*;
    use crate::{
        io::{MemoryStore, StoreError},
        types::DatasetBundle,
        ndarray::{array, s, Array2},
        test_common::{synthetic_bin, synthetic_bundle, synthetic_store, SYNTHETIC_SOURCE},
    };

    fn config() -> DatasetConfigBuilder {
        DatasetConfigBuilder::default()
    }

    #[test]
    fn test_dist_is_subsequence_in_range() {
        let store = synthetic_store(1, 20, true, 5);
        // synthetic separations are 20, 30, ..., 210
        let dataset = CorrelationFunction::new(
            &store,
            SYNTHETIC_SOURCE,
            config().min_dist(45.).max_dist(100.).build().unwrap(),
        )
        .unwrap();
        let data = dataset.get_data();
        assert_eq!(data.len(), 1);
        assert_eq!(data[0].dist, array![50., 60., 70., 80., 90., 100.]);
        assert_eq!(data[0].xi0.len(), 6);
        assert_eq!(data[0].cov.dim(), (6, 6));
        assert!(data[0].xi2.is_none());
    }

    #[test]
    fn test_default_range_is_inclusive() {
        let store = synthetic_store(1, 20, false, 0);
        let dataset =
            CorrelationFunction::new(&store, SYNTHETIC_SOURCE, DatasetConfig::default()).unwrap();
        let dist = &dataset.get_data()[0].dist;
        assert_abs_diff_eq!(dist[0], 30.);
        assert_abs_diff_eq!(dist[dist.len() - 1], 200.);
        assert_eq!(dist.len(), 18);
    }

    #[test]
    fn test_cov_is_submatrix_of_native() {
        let bundle = synthetic_bundle(1, 10, false, 0);
        let native = bundle.post_recon[0].cov.clone();
        let store = MemoryStore::new().with(SYNTHETIC_SOURCE, bundle);
        let dataset = CorrelationFunction::new(
            &store,
            SYNTHETIC_SOURCE,
            config()
                .min_dist(40.)
                .max_dist(60.)
                .isotropic(false)
                .build()
                .unwrap(),
        )
        .unwrap();
        let data = &dataset.get_data()[0];
        // native separations 20..110, kept 40, 50, 60 -> native indices 2, 3, 4
        let idxs = [2, 3, 4, 12, 13, 14];
        assert_eq!(data.cov.dim(), (6, 6));
        for (row, &i) in idxs.iter().enumerate() {
            for (col, &j) in idxs.iter().enumerate() {
                assert_abs_diff_eq!(data.cov[[row, col]], native[[i, j]]);
            }
        }
        assert_eq!(data.xi2.as_ref().map(Array1::len), Some(3));
    }

    #[test]
    fn test_reduce_cov_factor_halves() {
        let store = synthetic_store(2, 12, true, 3);
        let full = CorrelationFunction::new(&store, SYNTHETIC_SOURCE, DatasetConfig::default())
            .unwrap()
            .get_data();
        let reduced = CorrelationFunction::new(
            &store,
            SYNTHETIC_SOURCE,
            config()
                .reduce_cov_factor(CovReduction::Factor(2.))
                .build()
                .unwrap(),
        )
        .unwrap()
        .get_data();
        for (full, reduced) in full.iter().zip(reduced.iter()) {
            assert_abs_diff_eq!(reduced.cov, &full.cov / 2.);
            assert_abs_diff_eq!(reduced.icov, &full.icov * 2., epsilon = 1e-6);
        }
    }

    #[test]
    fn test_reduce_cov_by_mock_count() {
        let store = synthetic_store(1, 12, true, 4);
        let full = CorrelationFunction::new(&store, SYNTHETIC_SOURCE, DatasetConfig::default())
            .unwrap()
            .get_data();
        let reduced = CorrelationFunction::new(
            &store,
            SYNTHETIC_SOURCE,
            config()
                .reduce_cov_factor(CovReduction::MockCount)
                .build()
                .unwrap(),
        )
        .unwrap()
        .get_data();
        assert_abs_diff_eq!(reduced[0].cov, &full[0].cov / 4.);
    }

    #[test]
    fn test_reduce_cov_invalid() {
        let store = synthetic_store(1, 12, true, 0);
        for reduction in [
            CovReduction::Factor(0.),
            CovReduction::Factor(-1.),
            CovReduction::Factor(f64::NAN),
            CovReduction::MockCount,
        ] {
            assert!(matches!(
                CorrelationFunction::new(
                    &store,
                    SYNTHETIC_SOURCE,
                    config().reduce_cov_factor(reduction).build().unwrap(),
                ),
                Err(DatasetError::InvalidCovReduction { .. })
            ));
        }
    }

    #[test]
    fn test_set_realisation_swaps_observables_only() {
        let bundle = synthetic_bundle(1, 20, false, 5);
        let mock = bundle.post_recon[0].mocks[3].clone();
        let store = MemoryStore::new().with(SYNTHETIC_SOURCE, bundle);
        let mut dataset = CorrelationFunction::new(
            &store,
            SYNTHETIC_SOURCE,
            config().isotropic(false).build().unwrap(),
        )
        .unwrap();
        let nominal = dataset.get_data();

        dataset.set_realisation(Some(3)).unwrap();
        let swapped = dataset.get_data();
        // separations 30..200 are native indices 1..=18
        assert_eq!(swapped[0].xi0, mock.xi0.slice(s![1..19]));
        assert_eq!(
            swapped[0].xi2,
            mock.xi2.as_ref().map(|xi2| xi2.slice(s![1..19]).to_owned())
        );
        assert_eq!(swapped[0].cov, nominal[0].cov);
        assert_eq!(swapped[0].dist, nominal[0].dist);
        assert_ne!(swapped[0].xi0, nominal[0].xi0);
        assert_eq!(swapped[0].realisation, Realisation::Mock(3));

        dataset.set_realisation(None).unwrap();
        assert_eq!(dataset.get_data(), nominal);
    }

    #[test]
    fn test_get_data_idempotent() {
        let store = synthetic_store(2, 20, false, 2);
        let mut dataset =
            CorrelationFunction::new(&store, SYNTHETIC_SOURCE, DatasetConfig::default()).unwrap();
        dataset.set_realisation(Some(1)).unwrap();
        assert_eq!(dataset.get_data(), dataset.get_data());
    }

    #[test]
    fn test_set_realisation_out_of_range() {
        let store = synthetic_store(1, 20, false, 5);
        let mut dataset =
            CorrelationFunction::new(&store, SYNTHETIC_SOURCE, DatasetConfig::default()).unwrap();
        dataset.set_realisation(Some(2)).unwrap();
        assert!(matches!(
            dataset.set_realisation(Some(5)),
            Err(DatasetError::RealisationOutOfRange {
                index: 5,
                num_mocks: 5
            })
        ));
        assert_eq!(dataset.realisation(), Realisation::Mock(2));
    }

    #[test]
    fn test_initial_realisation() {
        let store = synthetic_store(1, 20, false, 5);
        let dataset = CorrelationFunction::new(
            &store,
            SYNTHETIC_SOURCE,
            config().realisation(Realisation::Mock(4)).build().unwrap(),
        )
        .unwrap();
        assert_eq!(dataset.get_data()[0].realisation, Realisation::Mock(4));

        assert!(matches!(
            CorrelationFunction::new(
                &store,
                SYNTHETIC_SOURCE,
                config().realisation(Some(9_usize)).build().unwrap(),
            ),
            Err(DatasetError::RealisationOutOfRange { index: 9, .. })
        ));
    }

    #[test]
    fn test_inverted_range() {
        let store = synthetic_store(1, 20, false, 0);
        assert!(matches!(
            CorrelationFunction::new(
                &store,
                SYNTHETIC_SOURCE,
                config().min_dist(200.).max_dist(30.).build().unwrap(),
            ),
            Err(DatasetError::InvalidDistanceRange { .. })
        ));
        assert!(matches!(
            CorrelationFunction::new(
                &store,
                SYNTHETIC_SOURCE,
                config().min_dist(50.).max_dist(50.).build().unwrap(),
            ),
            Err(DatasetError::InvalidDistanceRange { .. })
        ));
    }

    #[test]
    fn test_empty_range() {
        let store = synthetic_store(1, 20, false, 0);
        assert!(matches!(
            CorrelationFunction::new(
                &store,
                SYNTHETIC_SOURCE,
                config().min_dist(31.).max_dist(39.).build().unwrap(),
            ),
            Err(DatasetError::EmptyDistanceRange { bin_idx: 0, .. })
        ));
    }

    #[test]
    fn test_missing_pre_recon() {
        let bundle = DatasetBundle {
            pre_recon: None,
            ..synthetic_bundle(1, 20, false, 0)
        };
        let store = MemoryStore::new().with(SYNTHETIC_SOURCE, bundle);
        assert!(matches!(
            CorrelationFunction::new(
                &store,
                SYNTHETIC_SOURCE,
                config().recon(false).build().unwrap(),
            ),
            Err(DatasetError::MissingReconstruction {
                dataname: "pre-recon",
                ..
            })
        ));
    }

    #[test]
    fn test_pre_recon_name() {
        let store = synthetic_store(1, 20, true, 0);
        let dataset = CorrelationFunction::new(
            &store,
            SYNTHETIC_SOURCE,
            config().recon(false).build().unwrap(),
        )
        .unwrap();
        assert_eq!(dataset.name(), "Synthetic Prerecon");
        assert!(!dataset.is_recon());

        let dataset = CorrelationFunction::new(
            &store,
            SYNTHETIC_SOURCE,
            config().name("Custom").build().unwrap(),
        )
        .unwrap();
        assert_eq!(dataset.get_data()[0].name, "Custom");
    }

    #[test]
    fn test_missing_source() {
        let store = MemoryStore::new();
        assert!(matches!(
            CorrelationFunction::new(&store, "nope.pkl", DatasetConfig::default()),
            Err(DatasetError::Store(StoreError::NotFound { .. }))
        ));
    }

    #[test]
    fn test_anisotropic_needs_quadrupole() {
        let mut bin = synthetic_bin(20, false, 0);
        bin.data.xi2 = None;
        let bundle = DatasetBundle {
            post_recon: vec![bin],
            ..synthetic_bundle(1, 20, false, 0)
        };
        let store = MemoryStore::new().with(SYNTHETIC_SOURCE, bundle);
        assert!(matches!(
            CorrelationFunction::new(
                &store,
                SYNTHETIC_SOURCE,
                config().isotropic(false).build().unwrap(),
            ),
            Err(DatasetError::MissingQuadrupole { bin_idx: 0, .. })
        ));
        // but an isotropic fit only needs the monopole block
        let dataset =
            CorrelationFunction::new(&store, SYNTHETIC_SOURCE, DatasetConfig::default()).unwrap();
        assert_eq!(dataset.get_data()[0].cov.dim(), (18, 18));
    }

    #[test]
    fn test_isotropic_truncates_to_monopole_block() {
        let bundle = synthetic_bundle(1, 20, false, 2);
        let native = bundle.post_recon[0].cov.clone();
        assert_eq!(native.dim(), (40, 40));
        let store = MemoryStore::new().with(SYNTHETIC_SOURCE, bundle);
        let data = &CorrelationFunction::new(&store, SYNTHETIC_SOURCE, DatasetConfig::default())
            .unwrap()
            .get_data()[0];
        assert!(data.xi2.is_none());
        assert_eq!(data.cov.dim(), (data.dist.len(), data.dist.len()));
        assert_abs_diff_eq!(data.cov[[0, 0]], native[[1, 1]]);
        assert!(data.sigma2().is_none());
    }

    #[test]
    fn test_bad_shapes() {
        let mut bin = synthetic_bin(20, false, 0);
        bin.data.xi0 = array![1., 2.];
        let bundle = DatasetBundle {
            post_recon: vec![bin],
            ..synthetic_bundle(1, 20, false, 0)
        };
        let store = MemoryStore::new().with(SYNTHETIC_SOURCE, bundle);
        assert!(matches!(
            CorrelationFunction::new(&store, SYNTHETIC_SOURCE, DatasetConfig::default()),
            Err(DatasetError::BadShape { .. })
        ));

        let mut bin = synthetic_bin(20, false, 0);
        bin.cov = Array2::eye(7);
        let store = MemoryStore::new().with(
            SYNTHETIC_SOURCE,
            DatasetBundle {
                post_recon: vec![bin],
                ..synthetic_bundle(1, 20, false, 0)
            },
        );
        assert!(matches!(
            CorrelationFunction::new(&store, SYNTHETIC_SOURCE, DatasetConfig::default()),
            Err(DatasetError::BadShape { .. })
        ));

        let mut bin = synthetic_bin(4, false, 0);
        bin.dist = array![10., 30., 20., 40.];
        let store = MemoryStore::new().with(
            SYNTHETIC_SOURCE,
            DatasetBundle {
                post_recon: vec![bin],
                ..synthetic_bundle(1, 4, false, 0)
            },
        );
        assert!(matches!(
            CorrelationFunction::new(&store, SYNTHETIC_SOURCE, DatasetConfig::default()),
            Err(DatasetError::BadShape { .. })
        ));

        // mock monopole of the wrong length
        let mut bin = synthetic_bin(20, false, 3);
        bin.mocks[1].xi0 = array![1., 2., 3.];
        let store = MemoryStore::new().with(
            SYNTHETIC_SOURCE,
            DatasetBundle {
                post_recon: vec![bin],
                ..synthetic_bundle(1, 20, false, 3)
            },
        );
        match CorrelationFunction::new(&store, SYNTHETIC_SOURCE, DatasetConfig::default()) {
            Err(DatasetError::BadShape { argument, .. }) => {
                assert_eq!(argument, "bin 0 mock 1 xi0");
            }
            Err(e) => panic!("expected bad shape error, not {}", e),
            Ok(_) => panic!("expected error, but got Ok(_)"),
        }

        // mock quadrupole of the wrong length
        let mut bin = synthetic_bin(20, false, 3);
        bin.mocks[2].xi2 = Some(array![1.]);
        let store = MemoryStore::new().with(
            SYNTHETIC_SOURCE,
            DatasetBundle {
                post_recon: vec![bin],
                ..synthetic_bundle(1, 20, false, 3)
            },
        );
        assert!(matches!(
            CorrelationFunction::new(&store, SYNTHETIC_SOURCE, DatasetConfig::default()),
            Err(DatasetError::BadShape { .. })
        ));
    }

    #[test]
    fn test_mock_without_quadrupole() {
        let mut bin = synthetic_bin(20, false, 3);
        bin.mocks[0].xi2 = None;
        let store = MemoryStore::new().with(
            SYNTHETIC_SOURCE,
            DatasetBundle {
                post_recon: vec![bin],
                ..synthetic_bundle(1, 20, false, 3)
            },
        );
        // fine as long as the quadrupole isn't needed
        assert!(CorrelationFunction::new(&store, SYNTHETIC_SOURCE, DatasetConfig::default()).is_ok());
        assert!(matches!(
            CorrelationFunction::new(
                &store,
                SYNTHETIC_SOURCE,
                config().isotropic(false).build().unwrap()
            ),
            Err(DatasetError::MissingQuadrupole { bin_idx: 0, .. })
        ));
    }

    #[test]
    fn test_singular_covariance() {
        // rank 1, positive semi-definite
        let mut bin = synthetic_bin(3, true, 0);
        bin.cov = Array2::from_elem((3, 3), 1e-4);
        let bundle = DatasetBundle {
            post_recon: vec![bin],
            ..synthetic_bundle(1, 3, false, 0)
        };
        let store = MemoryStore::new().with(SYNTHETIC_SOURCE, bundle);
        assert!(matches!(
            CorrelationFunction::new(
                &store,
                SYNTHETIC_SOURCE,
                config().min_dist(10.).build().unwrap()
            ),
            Err(DatasetError::SingularCovariance { dim: 3 })
        ));

        // a zero variance separation is fine once it has been trimmed away
        let mut bin = synthetic_bin(3, true, 0);
        bin.cov[[0, 0]] = 0.;
        bin.cov[[0, 1]] = 0.;
        bin.cov[[1, 0]] = 0.;
        bin.cov[[0, 2]] = 0.;
        bin.cov[[2, 0]] = 0.;
        let bundle = DatasetBundle {
            post_recon: vec![bin],
            ..synthetic_bundle(1, 3, false, 0)
        };
        let store = MemoryStore::new().with(SYNTHETIC_SOURCE, bundle);
        let dataset = CorrelationFunction::new(&store, SYNTHETIC_SOURCE, DatasetConfig::default())
            .unwrap();
        assert_eq!(dataset.get_data()[0].dist, array![30., 40.]);
    }

    #[test]
    fn test_hartlap_sized_on_trimmed_length() {
        // 3 native separations, 2 kept. 4 mocks pass for dim 1 only.
        let store = MemoryStore::new().with(
            SYNTHETIC_SOURCE,
            DatasetBundle {
                post_recon: vec![synthetic_bin(3, true, 0)],
                ..synthetic_bundle(1, 3, false, 0)
            },
        );
        assert!(matches!(
            CorrelationFunction::new(
                &store,
                SYNTHETIC_SOURCE,
                config().num_mocks(4_usize).build().unwrap()
            ),
            Err(DatasetError::TooFewMocks { num_mocks: 4, dim: 2 })
        ));
        let dataset = CorrelationFunction::new(
            &store,
            SYNTHETIC_SOURCE,
            config().min_dist(35.).num_mocks(4_usize).build().unwrap(),
        )
        .unwrap();
        let data = &dataset.get_data()[0];
        assert_eq!(data.cov.dim(), (1, 1));
        assert_abs_diff_eq!(data.icov[[0, 0]] * data.cov[[0, 0]], 1. / 3., epsilon = 1e-12);
    }

    #[test]
    fn test_hartlap_applied_to_icov() {
        let store = synthetic_store(1, 20, false, 2);
        let dataset = CorrelationFunction::new(
            &store,
            SYNTHETIC_SOURCE,
            config().num_mocks(1000_usize).build().unwrap(),
        )
        .unwrap();
        let data = &dataset.get_data()[0];
        // 18 separations kept
        let hartlap = (1000. - 18. - 2.) / 999.;
        assert_abs_diff_eq!(
            data.cov.dot(&data.icov),
            Array2::<f64>::eye(18) * hartlap,
            epsilon = 1e-8
        );
        assert_eq!(data.num_mocks, Some(1000));

        assert!(matches!(
            CorrelationFunction::new(
                &store,
                SYNTHETIC_SOURCE,
                config().num_mocks(19_usize).build().unwrap(),
            ),
            Err(DatasetError::TooFewMocks { dim: 18, .. })
        ));
    }

    #[test]
    fn test_num_mocks_is_smallest_across_bins() {
        let bundle = DatasetBundle {
            post_recon: vec![synthetic_bin(20, false, 5), synthetic_bin(20, false, 3)],
            ..synthetic_bundle(1, 20, false, 0)
        };
        let store = MemoryStore::new().with(SYNTHETIC_SOURCE, bundle);
        let mut dataset =
            CorrelationFunction::new(&store, SYNTHETIC_SOURCE, DatasetConfig::default()).unwrap();
        assert_eq!(dataset.num_bins(), 2);
        assert_eq!(dataset.num_mocks(), 3);
        assert!(dataset.set_realisation(Some(3)).is_err());
        assert!(dataset.set_realisation(Some(2)).is_ok());
    }

    #[test]
    fn test_data_vector_and_sigmas() {
        let store = synthetic_store(1, 20, false, 0);
        let dataset = CorrelationFunction::new(
            &store,
            SYNTHETIC_SOURCE,
            config().isotropic(false).build().unwrap(),
        )
        .unwrap();
        let data = &dataset.get_data()[0];
        let vector = data.data_vector();
        assert_eq!(vector.len(), 36);
        assert_abs_diff_eq!(vector[18], data.xi2.as_ref().unwrap()[0]);
        let sigma2 = data.sigma2().unwrap();
        assert_abs_diff_eq!(sigma2[0], data.cov[[18, 18]].sqrt());
        assert_abs_diff_eq!(data.sigma0()[0], data.cov[[0, 0]].sqrt());
    }

    #[test]
    fn test_display_doesnt_crash() {
        let store = synthetic_store(2, 20, true, 1);
        let dataset =
            CorrelationFunction::new(&store, SYNTHETIC_SOURCE, DatasetConfig::default()).unwrap();
        let display = format!("{}", &dataset);
        assert!(display.contains("Synthetic Recon"));
        assert!(display.contains("Will use reconstructed data"));
        assert!(display.contains("Will not fit the quadrupole"));
        assert!(display.contains("bin 1"));
    }
}

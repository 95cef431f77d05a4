//! Named correlation function datasets.
//!
//! Each published measurement is a [`DatasetVariant`] record: the file it lives in, the number
//! of mocks its covariance was built from and whether a pre-reconstruction measurement exists.
//! [`DatasetVariant::build`] enforces the record's constraints and forwards everything else to
//! [`CorrelationFunction::new`].
//!
//! # Examples
//!
//! ```rust
//! use barry::{io::MemoryStore, variants::variant, DatasetConfig, DatasetError};
//!
//! let ross = variant("ROSS_DR12_Z038").unwrap();
//! let config = DatasetConfig {
//!     recon: false,
//!     ..DatasetConfig::default()
//! };
//! // rejected before the store is even asked for the file
//! assert!(matches!(
//!     ross.build(MemoryStore::new(), config),
//!     Err(DatasetError::UnsupportedConfiguration { .. })
//! ));
//! ```

use std::collections::BTreeMap;

use lazy_static::lazy_static;
use log::debug;

use crate::{
    constants::ROSS_DR12_NUM_MOCKS,
    dataset::{CorrelationFunction, DatasetConfig},
    error::DatasetError,
    io::MeasurementStore,
};

/// A published correlation function measurement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DatasetVariant {
    /// registry name
    pub name: &'static str,
    /// file name within the measurement store
    pub source_name: &'static str,
    /// one line description of the sample
    pub description: &'static str,
    /// number of mocks the covariance was estimated from, if known
    pub num_mocks: Option<usize>,
    /// whether the file has pre-reconstruction measurements
    pub pre_recon_available: bool,
}

/// All known correlation function datasets.
pub const VARIANTS: &[DatasetVariant] = &[
    DatasetVariant {
        name: "SDSS_DR12_Z061_NGC",
        source_name: "sdss_dr12_z061_corr_ngc.pkl",
        description: "Correlation function for SDSS BOSS DR12 sample for the NGC with mean redshift z = 0.61",
        num_mocks: None,
        pre_recon_available: true,
    },
    DatasetVariant {
        name: "ROSS_DR12_Z038",
        source_name: "ross_2016_dr12_combined_corr_zbin0p38.pkl",
        description: "Anisotropic Correlation function for SDSS BOSS DR12 sample from Ross 2017 with mean redshift z = 0.38",
        num_mocks: Some(ROSS_DR12_NUM_MOCKS),
        pre_recon_available: false,
    },
    DatasetVariant {
        name: "ROSS_DR12_Z051",
        source_name: "ross_2016_dr12_combined_corr_zbin0p51.pkl",
        description: "Anisotropic Correlation function for SDSS BOSS DR12 sample from Ross 2017 with mean redshift z = 0.51",
        num_mocks: Some(ROSS_DR12_NUM_MOCKS),
        pre_recon_available: false,
    },
    DatasetVariant {
        name: "ROSS_DR12_Z061",
        source_name: "ross_2016_dr12_combined_corr_zbin0p61.pkl",
        description: "Anisotropic Correlation function for SDSS BOSS DR12 sample from Ross 2017 with mean redshift z = 0.61",
        num_mocks: Some(ROSS_DR12_NUM_MOCKS),
        pre_recon_available: false,
    },
];

lazy_static! {
    static ref REGISTRY: BTreeMap<&'static str, &'static DatasetVariant> =
        VARIANTS.iter().map(|variant| (variant.name, variant)).collect();
}

/// Look up a dataset by registry name.
///
/// # Errors
///
/// [`DatasetError::UnknownVariant`] if no dataset has that name.
pub fn variant(name: &str) -> Result<&'static DatasetVariant, DatasetError> {
    REGISTRY
        .get(name)
        .copied()
        .ok_or_else(|| DatasetError::UnknownVariant(name.to_string()))
}

/// The registry names of all known datasets, sorted.
pub fn variant_names() -> Vec<&'static str> {
    REGISTRY.keys().copied().collect()
}

impl DatasetVariant {
    /// Check `config` against this dataset's constraints.
    ///
    /// # Errors
    ///
    /// [`DatasetError::UnsupportedConfiguration`] when pre-reconstruction data is requested but
    /// the dataset only has post-reconstruction measurements.
    pub fn validate(&self, config: &DatasetConfig) -> Result<(), DatasetError> {
        if !config.recon && !self.pre_recon_available {
            return Err(DatasetError::UnsupportedConfiguration {
                variant: self.name.to_string(),
                reason: format!("Pre-recon data not available for {}", self.name),
            });
        }
        Ok(())
    }

    /// Construct the dataset from `store`. The variant's mock count is used for the Hartlap
    /// correction unless `config` already sets one.
    ///
    /// # Errors
    ///
    /// see [`DatasetVariant::validate`] and [`CorrelationFunction::new`]
    pub fn build<S: MeasurementStore>(
        &self,
        store: S,
        mut config: DatasetConfig,
    ) -> Result<CorrelationFunction, DatasetError> {
        self.validate(&config)?;
        if config.num_mocks.is_none() {
            config.num_mocks = self.num_mocks;
        }
        debug!("building {} from {}", self.name, self.source_name);
        CorrelationFunction::new(store, self.source_name, config)
    }
}

macro_rules! variant_constructor {
    ($fn_name:ident, $variant_name:literal) => {
        #[doc = concat!("Construct the `", $variant_name, "` dataset.")]
        ///
        /// # Errors
        ///
        /// see [`DatasetVariant::build`]
        pub fn $fn_name<S: MeasurementStore>(
            store: S,
            config: DatasetConfig,
        ) -> Result<CorrelationFunction, DatasetError> {
            variant($variant_name)?.build(store, config)
        }
    };
}

variant_constructor!(correlation_function_sdss_dr12_z061_ngc, "SDSS_DR12_Z061_NGC");
variant_constructor!(correlation_function_ross_dr12_z038, "ROSS_DR12_Z038");
variant_constructor!(correlation_function_ross_dr12_z051, "ROSS_DR12_Z051");
variant_constructor!(correlation_function_ross_dr12_z061, "ROSS_DR12_Z061");

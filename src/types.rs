//! Measurement bundles as they come out of a [`crate::io::MeasurementStore`].

use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::ndarray::{Array1, Array2};

/// The fiducial cosmology a measurement was made in.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Cosmology {
    /// Matter density parameter
    pub om: f64,
    /// Reduced Hubble constant, `H0 / 100`
    pub h0: f64,
    /// Effective redshift of the sample
    pub z: f64,
    /// Baryon density parameter
    pub ob: f64,
    /// Scalar spectral index
    pub ns: f64,
    /// Sum of neutrino masses [eV]
    pub mnu: f64,
    /// Gaussian smoothing scale used by reconstruction [Mpc/h]
    pub reconsmoothscale: f64,
}

impl Default for Cosmology {
    fn default() -> Self {
        Self {
            om: 0.31,
            h0: 0.676,
            z: 0.61,
            ob: 0.04814,
            ns: 0.97,
            mnu: 0.0,
            reconsmoothscale: 15.0,
        }
    }
}

impl Display for Cosmology {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "om={} h0={} z={} ob={} ns={} mnu={} smooth={}",
            self.om, self.h0, self.z, self.ob, self.ns, self.mnu, self.reconsmoothscale
        )
    }
}

/// A pair of correlation function multipoles sampled on a shared set of
/// separations.
#[derive(Debug, Clone, PartialEq)]
pub struct Multipoles {
    /// The monopole, ξ₀(s)
    pub xi0: Array1<f64>,
    /// The quadrupole, ξ₂(s), when the measurement has one
    pub xi2: Option<Array1<f64>>,
}

/// Everything measured in a single redshift bin.
#[derive(Debug, Clone, PartialEq)]
pub struct BinMeasurement {
    /// separation bin centres [Mpc/h], strictly increasing
    pub dist: Array1<f64>,
    /// the nominal (survey or mock-mean) multipoles
    pub data: Multipoles,
    /// covariance of the data vector, with dimensions `[N][N]` for a monopole only
    /// measurement or `[2N][2N]` ordered monopole block then quadrupole block.
    pub cov: Array2<f64>,
    /// mock realisations, each with the same layout as `data`
    pub mocks: Vec<Multipoles>,
}

impl BinMeasurement {
    /// The number of separation bins, `N`.
    pub fn len(&self) -> usize {
        self.dist.len()
    }

    /// Whether there are no separation bins at all.
    pub fn is_empty(&self) -> bool {
        self.dist.is_empty()
    }

    /// Whether the nominal data and the covariance both carry a quadrupole.
    pub fn has_quadrupole(&self) -> bool {
        self.data.xi2.is_some() && self.cov.nrows() == 2 * self.len()
    }
}

/// A complete dataset file: pre and post reconstruction measurements in one or more redshift
/// bins.
#[derive(Debug, Clone, PartialEq)]
pub struct DatasetBundle {
    /// human readable name of the sample
    pub name: String,
    /// fiducial cosmology
    pub cosmology: Cosmology,
    /// post-reconstruction measurements, one per redshift bin
    pub post_recon: Vec<BinMeasurement>,
    /// pre-reconstruction measurements, if the file has them
    pub pre_recon: Option<Vec<BinMeasurement>>,
}

impl DatasetBundle {
    /// The measurements for the requested reconstruction state, if present.
    pub fn bins(&self, recon: bool) -> Option<&[BinMeasurement]> {
        if recon {
            Some(&self.post_recon)
        } else {
            self.pre_recon.as_deref()
        }
    }
}

/// Which observable vector [`crate::CorrelationFunction::get_data`] hands out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Realisation {
    /// The nominal measurement stored in the bundle
    #[default]
    Data,
    /// A mock realisation, by index
    Mock(usize),
}

impl From<Option<usize>> for Realisation {
    fn from(realisation: Option<usize>) -> Self {
        match realisation {
            Some(idx) => Realisation::Mock(idx),
            None => Realisation::Data,
        }
    }
}

impl From<usize> for Realisation {
    fn from(idx: usize) -> Self {
        Realisation::Mock(idx)
    }
}

impl Display for Realisation {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Realisation::Data => write!(f, "data"),
            Realisation::Mock(idx) => write!(f, "mock {idx}"),
        }
    }
}

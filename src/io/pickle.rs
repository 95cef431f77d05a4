//! IO for pickled measurement bundles.
//!
//! A bundle file is a pickled dictionary of plain python lists and floats:
//!
//! ```text
//! {
//!     "name": str,
//!     "cosmology": {"om": float, "h0": float, "z": float, ...},
//!     "post-recon": [bin, ...],
//!     "pre-recon": [bin, ...] | None,
//! }
//! bin = {
//!     "dist": [float; N],
//!     "xi0": [float; N],
//!     "xi2": [float; N] | None,
//!     "cov": [[float; M]; M],          # M = N or 2N
//!     "mocks": [{"xi0": [...], "xi2": [...] | None}, ...],
//! }
//! ```

use std::{
    fs::File,
    io::{BufReader, BufWriter, Write},
    path::{Path, PathBuf},
};

use log::{debug, trace};
use serde::{Deserialize, Serialize};
use serde_pickle::{DeOptions, SerOptions};

use super::{error::StoreError, MeasurementStore};
use crate::{
    ndarray::{Array1, Array2},
    types::{BinMeasurement, Cosmology, DatasetBundle, Multipoles},
};

#[derive(Serialize, Deserialize)]
struct PickledMultipoles {
    xi0: Vec<f64>,
    #[serde(default)]
    xi2: Option<Vec<f64>>,
}

#[derive(Serialize, Deserialize)]
struct PickledBin {
    dist: Vec<f64>,
    xi0: Vec<f64>,
    #[serde(default)]
    xi2: Option<Vec<f64>>,
    cov: Vec<Vec<f64>>,
    #[serde(default)]
    mocks: Vec<PickledMultipoles>,
}

#[derive(Serialize, Deserialize)]
struct PickledBundle {
    name: String,
    #[serde(default)]
    cosmology: Cosmology,
    #[serde(rename = "post-recon")]
    post_recon: Vec<PickledBin>,
    #[serde(rename = "pre-recon", default)]
    pre_recon: Option<Vec<PickledBin>>,
}

impl From<PickledMultipoles> for Multipoles {
    fn from(pickled: PickledMultipoles) -> Self {
        Self {
            xi0: Array1::from(pickled.xi0),
            xi2: pickled.xi2.map(Array1::from),
        }
    }
}

impl From<&Multipoles> for PickledMultipoles {
    fn from(multipoles: &Multipoles) -> Self {
        Self {
            xi0: multipoles.xi0.to_vec(),
            xi2: multipoles.xi2.as_ref().map(Array1::to_vec),
        }
    }
}

impl PickledBin {
    fn into_measurement(self, filename: &str) -> Result<BinMeasurement, StoreError> {
        let dim = self.cov.len();
        if let Some(row) = self.cov.iter().find(|row| row.len() != dim) {
            return Err(StoreError::BadArrayShape {
                filename: filename.to_string(),
                argument: "cov".into(),
                expected: format!("[{dim}][{dim}]"),
                received: format!("a row of length {}", row.len()),
            });
        }
        let cov = Array2::from_shape_vec((dim, dim), self.cov.into_iter().flatten().collect())
            .map_err(|e| StoreError::BadArrayShape {
                filename: filename.to_string(),
                argument: "cov".into(),
                expected: format!("[{dim}][{dim}]"),
                received: e.to_string(),
            })?;
        Ok(BinMeasurement {
            dist: Array1::from(self.dist),
            data: Multipoles {
                xi0: Array1::from(self.xi0),
                xi2: self.xi2.map(Array1::from),
            },
            cov,
            mocks: self.mocks.into_iter().map(Multipoles::from).collect(),
        })
    }
}

impl From<&BinMeasurement> for PickledBin {
    fn from(bin: &BinMeasurement) -> Self {
        Self {
            dist: bin.dist.to_vec(),
            xi0: bin.data.xi0.to_vec(),
            xi2: bin.data.xi2.as_ref().map(Array1::to_vec),
            cov: bin.cov.rows().into_iter().map(|row| row.to_vec()).collect(),
            mocks: bin.mocks.iter().map(PickledMultipoles::from).collect(),
        }
    }
}

/// Reads pickled bundles out of a data directory.
#[derive(Debug, Clone)]
pub struct PickleStore {
    data_dir: PathBuf,
}

impl PickleStore {
    /// A store rooted at `data_dir`. Nothing is read until [`MeasurementStore::load`].
    pub fn new<T: AsRef<Path>>(data_dir: T) -> Self {
        Self {
            data_dir: data_dir.as_ref().to_path_buf(),
        }
    }

    /// The directory bundles are read from.
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// The full path of the bundle named `source_name`.
    pub fn path_of(&self, source_name: &str) -> PathBuf {
        self.data_dir.join(source_name)
    }

    /// Pickle `bundle` into the data directory under `source_name`, in the same layout
    /// [`MeasurementStore::load`] reads.
    ///
    /// # Errors
    ///
    /// Can throw [`StoreError::Io`] if the file can't be created, or [`StoreError::Pickle`] if
    /// serialization fails.
    pub fn save(&self, source_name: &str, bundle: &DatasetBundle) -> Result<(), StoreError> {
        let path = self.path_of(source_name);
        let filename = path.display().to_string();
        debug!("writing bundle {} to {}", bundle.name, filename);
        let pickled = PickledBundle {
            name: bundle.name.clone(),
            cosmology: bundle.cosmology,
            post_recon: bundle.post_recon.iter().map(PickledBin::from).collect(),
            pre_recon: bundle
                .pre_recon
                .as_ref()
                .map(|bins| bins.iter().map(PickledBin::from).collect()),
        };
        let file = File::create(&path).map_err(|source| StoreError::Io {
            filename: filename.clone(),
            source,
        })?;
        let mut writer = BufWriter::new(file);
        serde_pickle::to_writer(&mut writer, &pickled, SerOptions::new()).map_err(|source| {
            StoreError::Pickle {
                filename: filename.clone(),
                source,
            }
        })?;
        writer
            .flush()
            .map_err(|source| StoreError::Io { filename, source })
    }
}

impl MeasurementStore for PickleStore {
    fn load(&self, source_name: &str) -> Result<DatasetBundle, StoreError> {
        let path = self.path_of(source_name);
        let filename = path.display().to_string();
        if !path.is_file() {
            return Err(StoreError::NotFound {
                source_name: source_name.to_string(),
                location: self.data_dir.display().to_string(),
            });
        }
        trace!("unpickling {}", filename);
        let file = File::open(&path).map_err(|source| StoreError::Io {
            filename: filename.clone(),
            source,
        })?;
        let pickled: PickledBundle =
            serde_pickle::from_reader(BufReader::new(file), DeOptions::new()).map_err(
                |source| StoreError::Pickle {
                    filename: filename.clone(),
                    source,
                },
            )?;

        let post_recon = pickled
            .post_recon
            .into_iter()
            .map(|bin| bin.into_measurement(&filename))
            .collect::<Result<Vec<_>, _>>()?;
        let pre_recon = match pickled.pre_recon {
            Some(bins) => Some(
                bins.into_iter()
                    .map(|bin| bin.into_measurement(&filename))
                    .collect::<Result<Vec<_>, _>>()?,
            ),
            None => None,
        };
        debug!(
            "loaded {} from {}: {} post-recon bins, pre-recon {}",
            pickled.name,
            filename,
            post_recon.len(),
            if pre_recon.is_some() {
                "available"
            } else {
                "unavailable"
            }
        );
        Ok(DatasetBundle {
            name: pickled.name,
            cosmology: pickled.cosmology,
            post_recon,
            pre_recon,
        })
    }
}

//! Where measurement bundles come from.
//!
//! The dataset core never touches the filesystem itself, it asks a [`MeasurementStore`] for a
//! [`DatasetBundle`] by name. [`PickleStore`] reads the pickled files the measurements are
//! distributed as, [`MemoryStore`] serves bundles that are already in memory.

pub mod error;
pub mod pickle;

use std::collections::HashMap;

use log::trace;

pub use self::{error::StoreError, pickle::PickleStore};
use crate::types::DatasetBundle;

/// A read-only source of measurement bundles, keyed by file name.
pub trait MeasurementStore {
    /// Load the bundle stored under `source_name`.
    ///
    /// # Errors
    ///
    /// Can throw [`StoreError`] if the bundle doesn't exist or can't be decoded.
    fn load(&self, source_name: &str) -> Result<DatasetBundle, StoreError>;
}

impl<S: MeasurementStore + ?Sized> MeasurementStore for &S {
    fn load(&self, source_name: &str) -> Result<DatasetBundle, StoreError> {
        (**self).load(source_name)
    }
}

/// Bundles held in memory.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    bundles: HashMap<String, DatasetBundle>,
}

impl MemoryStore {
    /// An empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add (or replace) a bundle under `source_name`.
    pub fn insert(&mut self, source_name: impl Into<String>, bundle: DatasetBundle) {
        self.bundles.insert(source_name.into(), bundle);
    }

    /// Builder-style [`MemoryStore::insert`].
    #[must_use]
    pub fn with(mut self, source_name: impl Into<String>, bundle: DatasetBundle) -> Self {
        self.insert(source_name, bundle);
        self
    }
}

impl MeasurementStore for MemoryStore {
    fn load(&self, source_name: &str) -> Result<DatasetBundle, StoreError> {
        trace!("loading {} from memory", source_name);
        self.bundles
            .get(source_name)
            .cloned()
            .ok_or_else(|| StoreError::NotFound {
                source_name: source_name.to_string(),
                location: "memory".into(),
            })
    }
}

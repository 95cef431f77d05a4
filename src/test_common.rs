//! Synthetic measurements for unit tests.

use crate::{
    io::MemoryStore,
    ndarray::{Array1, Array2},
    types::{BinMeasurement, Cosmology, DatasetBundle, Multipoles},
};

pub const SYNTHETIC_SOURCE: &str = "synthetic.pkl";

/// A bin with separations 20, 30, 40, ... and a positive definite covariance. Unless
/// `monopole_only`, there's a quadrupole and the covariance is `[2n][2n]`.
pub fn synthetic_bin(n: usize, monopole_only: bool, num_mocks: usize) -> BinMeasurement {
    let dist = Array1::from_shape_fn(n, |i| 20.0 + 10.0 * i as f64);
    let xi0 = dist.mapv(|s| 10.0 / s);
    let xi2 = dist.mapv(|s| -5.0 / s);
    let dim = if monopole_only { n } else { 2 * n };
    // scaled Kac-Murdock-Szego matrix
    let sigma = |i: usize| 0.01 * (1 + i % n) as f64;
    let cov = Array2::from_shape_fn((dim, dim), |(i, j)| {
        sigma(i) * sigma(j) * 0.5_f64.powi((i as i32 - j as i32).abs())
    });
    let mocks = (0..num_mocks)
        .map(|k| {
            let offset = 1e-3 * (k + 1) as f64;
            Multipoles {
                xi0: xi0.mapv(|v| v + offset),
                xi2: (!monopole_only).then(|| xi2.mapv(|v| v - offset)),
            }
        })
        .collect();
    BinMeasurement {
        dist,
        data: Multipoles {
            xi0,
            xi2: (!monopole_only).then_some(xi2),
        },
        cov,
        mocks,
    }
}

pub fn synthetic_bundle(
    num_bins: usize,
    n: usize,
    with_pre_recon: bool,
    num_mocks: usize,
) -> DatasetBundle {
    let bins = || {
        (0..num_bins)
            .map(|_| synthetic_bin(n, false, num_mocks))
            .collect::<Vec<_>>()
    };
    DatasetBundle {
        name: "Synthetic".into(),
        cosmology: Cosmology::default(),
        post_recon: bins(),
        pre_recon: with_pre_recon.then(bins),
    }
}

pub fn synthetic_store(
    num_bins: usize,
    n: usize,
    with_pre_recon: bool,
    num_mocks: usize,
) -> MemoryStore {
    MemoryStore::new().with(
        SYNTHETIC_SOURCE,
        synthetic_bundle(num_bins, n, with_pre_recon, num_mocks),
    )
}

use barry::{
    ndarray::{Array1, Array2},
    BinMeasurement, Cosmology, DatasetBundle, Multipoles, PickleStore, VARIANTS,
};
use tempfile::{tempdir, TempDir};

/// A redshift bin with separations 20, 30, 40, ... Mpc/h and both multipoles.
pub fn toy_bin(n: usize, num_mocks: usize) -> BinMeasurement {
    let dist = Array1::from_shape_fn(n, |i| 20.0 + 10.0 * i as f64);
    let xi0 = dist.mapv(|s| 20.0 / (s * s));
    let xi2 = dist.mapv(|s| -8.0 / (s * s));
    let cov = Array2::from_shape_fn((2 * n, 2 * n), |(i, j)| {
        let sigma = |k: usize| 1e-3 * (1.0 + (k % n) as f64 / n as f64);
        sigma(i) * sigma(j) * 0.3_f64.powi((i as i32 - j as i32).abs())
    });
    let mocks = (0..num_mocks)
        .map(|k| {
            let shift = 1e-4 * (k + 1) as f64;
            Multipoles {
                xi0: xi0.mapv(|v| v + shift),
                xi2: Some(xi2.mapv(|v| v - shift)),
            }
        })
        .collect();
    BinMeasurement {
        dist,
        data: Multipoles {
            xi0,
            xi2: Some(xi2),
        },
        cov,
        mocks,
    }
}

pub fn toy_bundle(name: &str, num_bins: usize, with_pre_recon: bool, num_mocks: usize) -> DatasetBundle {
    let bins = || (0..num_bins).map(|_| toy_bin(25, num_mocks)).collect::<Vec<_>>();
    DatasetBundle {
        name: name.into(),
        cosmology: Cosmology {
            z: 0.51,
            ..Cosmology::default()
        },
        post_recon: bins(),
        pre_recon: with_pre_recon.then(bins),
    }
}

/// A data directory with a pickled toy bundle for every registered dataset.
pub fn toy_data_dir(num_mocks: usize) -> TempDir {
    let tmp_dir = tempdir().unwrap();
    let store = PickleStore::new(tmp_dir.path());
    for variant in VARIANTS {
        store
            .save(
                variant.source_name,
                &toy_bundle(variant.name, 1, variant.pre_recon_available, num_mocks),
            )
            .unwrap();
    }
    tmp_dir
}

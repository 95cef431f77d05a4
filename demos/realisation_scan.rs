//! Print the first few points of every mock realisation of a registered dataset.
//!
//! ```bash
//! cargo run --example realisation_scan -- data ROSS_DR12_Z061
//! ```

use barry::{variants::variant, BarryError, DatasetConfig, PickleStore};
use log::info;
use std::env;

fn main() -> Result<(), BarryError> {
    env_logger::init_from_env(
        env_logger::Env::default().filter_or(env_logger::DEFAULT_FILTER_ENV, "info"),
    );
    let mut args = env::args().skip(1);
    let data_dir = args.next().unwrap_or_else(|| "data".into());
    let name = args.next().unwrap_or_else(|| "ROSS_DR12_Z061".into());

    let store = PickleStore::new(&data_dir);
    let config = DatasetConfig {
        isotropic: false,
        ..DatasetConfig::default()
    };
    let mut dataset = variant(&name)?.build(&store, config)?;
    info!("{}", dataset);

    for idx in 0..dataset.num_mocks() {
        dataset.set_realisation(Some(idx))?;
        for (bin_idx, bin) in dataset.get_data().iter().enumerate() {
            let s = bin.dist[0];
            info!(
                "{} bin {}: s={:.1} s^2 xi0={:+.3}",
                bin.realisation,
                bin_idx,
                s,
                s * s * bin.xi0[0]
            );
        }
    }
    Ok(())
}

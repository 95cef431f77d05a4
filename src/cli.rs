//! Command Line Interface helpers for Barry

use crate::{
    constants::{DATA_DIR_ENV, DEFAULT_DATA_DIR},
    covariance::chi_squared,
    error::{BarryError, BarryError::DryRun, CLIError::InvalidCommandLineArgument},
    io::PickleStore,
    variants::{variant, variant_names, DatasetVariant, VARIANTS},
    BinData, CorrelationFunction, CovReduction, DatasetConfig, Realisation,
};
use clap::{arg, command, ErrorKind::ArgumentNotFound, ValueHint::DirPath};
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use itertools::izip;
use log::{debug, info, trace, warn};
use prettytable::{format as prettyformat, row, table, Table};
use std::{
    env,
    ffi::OsString,
    fmt::{Debug, Display},
    path::PathBuf,
    str::FromStr,
};

/// Args for inspecting a correlation function dataset.
pub struct BarryContext {
    /// Where the pickled bundles are read from
    pub store: PickleStore,
    /// The registered dataset being inspected
    pub variant: &'static DatasetVariant,
    /// The loaded dataset
    pub dataset: CorrelationFunction,
    /// Whether to compute a χ² for every mock realisation
    pub scan_realisations: bool,
    /// Whether to draw progress bars
    pub draw_progress: bool,
}

#[allow(dead_code)]
mod built_info {
    // Add build-time information from the "built" crate.
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

/// Write many info-level log lines of how this executable was compiled.
///
/// # Errors
///
/// propagates writeln! fails
pub fn fmt_build_info(f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match built_info::GIT_HEAD_REF {
        Some(hr) => {
            let dirty = built_info::GIT_DIRTY.unwrap_or(false);
            writeln!(
                f,
                "Compiled on git commit hash: {}{}",
                built_info::GIT_COMMIT_HASH.unwrap_or("<unknown>"),
                if dirty { " (dirty)" } else { "" }
            )?;
            writeln!(f, "            git head ref: {}", hr)?;
        }
        None => writeln!(f, "Compiled on git commit hash: <no git info>")?,
    }
    writeln!(f, "            {}", built_info::BUILT_TIME_UTC)?;
    writeln!(f, "         with compiler {}", built_info::RUSTC_VERSION)?;
    writeln!(f)?;
    Ok(())
}

/// A table of the separations, multipoles and errors in one redshift bin.
pub fn bin_table(bin: &BinData) -> Table {
    let mut bin_table = if bin.xi2.is_some() {
        table!(["s", "xi0", "sigma0", "s^2 xi0", "xi2", "sigma2", "s^2 xi2"])
    } else {
        table!(["s", "xi0", "sigma0", "s^2 xi0"])
    };
    bin_table.set_format(*prettyformat::consts::FORMAT_CLEAN);
    let sigma0 = bin.sigma0();
    match (&bin.xi2, bin.sigma2()) {
        (Some(xi2), Some(sigma2)) => {
            for (&s, &xi0, &sig0, &xi2, &sig2) in
                izip!(&bin.dist, &bin.xi0, &sigma0, xi2, &sigma2)
            {
                bin_table.add_row(row![r =>
                    format!("{:.2}", s),
                    format!("{:+.5e}", xi0),
                    format!("{:.5e}", sig0),
                    format!("{:+.3}", s * s * xi0),
                    format!("{:+.5e}", xi2),
                    format!("{:.5e}", sig2),
                    format!("{:+.3}", s * s * xi2)
                ]);
            }
        }
        _ => {
            for (&s, &xi0, &sig0) in izip!(&bin.dist, &bin.xi0, &sigma0) {
                bin_table.add_row(row![r =>
                    format!("{:.2}", s),
                    format!("{:+.5e}", xi0),
                    format!("{:.5e}", sig0),
                    format!("{:+.3}", s * s * xi0)
                ]);
            }
        }
    }
    bin_table
}

/// A table of every registered dataset.
pub fn variants_table() -> Table {
    let mut variants_table = table!(["name", "file", "mocks", "pre-recon", "description"]);
    variants_table.set_format(*prettyformat::consts::FORMAT_CLEAN);
    for variant in VARIANTS {
        variants_table.add_row(row![
            variant.name,
            variant.source_name,
            variant
                .num_mocks
                .map_or_else(|| "-".to_string(), |n| n.to_string()),
            if variant.pre_recon_available { "yes" } else { "no" },
            variant.description
        ]);
    }
    variants_table
}

/// The result of comparing every mock realisation to the nominal data.
#[derive(Debug, Clone, PartialEq)]
pub struct RealisationScan {
    /// χ² of each mock against the nominal data, summed over redshift bins
    pub chi2: Vec<f64>,
    /// length of the data vector, summed over redshift bins
    pub dof: usize,
}

impl RealisationScan {
    /// The mean χ² over all mocks.
    pub fn mean_chi2(&self) -> f64 {
        if self.chi2.is_empty() {
            return 0.;
        }
        self.chi2.iter().sum::<f64>() / self.chi2.len() as f64
    }
}

impl Display for BarryContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(
            f,
            "{} version {}",
            env!("CARGO_PKG_NAME"),
            env!("CARGO_PKG_VERSION"),
        )?;

        fmt_build_info(f)?;

        writeln!(f, "data directory:       {}", self.store.data_dir().display())?;
        writeln!(f, "registered dataset:   {}", self.variant.name)?;
        write!(f, "{}", self.dataset)?;
        writeln!(
            f,
            "{} scan mock realisations.",
            if self.scan_realisations {
                "Will"
            } else {
                "Will not"
            }
        )?;
        Ok(())
    }
}

/// Parse an optional value, treating a missing argument as `None`.
fn value_of_opt<T>(matches: &clap::ArgMatches, name: &str) -> Result<Option<T>, BarryError>
where
    T: FromStr,
    <T as FromStr>::Err: Display,
{
    match matches.value_of_t::<T>(name) {
        Ok(value) => Ok(Some(value)),
        Err(err) if err.kind() == ArgumentNotFound => Ok(None),
        Err(err) => Err(err.into()),
    }
}

impl BarryContext {
    fn get_matches<I, T>(args: I) -> Result<clap::ArgMatches, BarryError>
    where
        I: IntoIterator<Item = T> + Debug,
        T: Into<OsString> + Clone,
    {
        let mut app = command!()
            .arg_required_else_help(true)
            .next_line_help(false)
            .about("Inspect the correlation function datasets used for BAO fits.")
            .args(&[
                // input options
                arg!(-d --"data-dir" [DIR] "Directory holding the pickled datasets")
                    .value_hint(DirPath)
                    .help_heading("INPUT"),
                arg!(-D --dataset [NAME] "Registered dataset to load")
                    .possible_values(variant_names())
                    .required_unless_present("list")
                    .help_heading("INPUT"),
                arg!(--list "List the registered datasets and exit")
                    .help_heading("INPUT"),
                arg!(--name [NAME] "Override the dataset name"),

                // selection options
                arg!(--"min-dist" [DIST] "Smallest separation to keep [Mpc/h]")
                    .allow_hyphen_values(true)
                    .help_heading("SELECTION"),
                arg!(--"max-dist" [DIST] "Largest separation to keep [Mpc/h]")
                    .allow_hyphen_values(true)
                    .help_heading("SELECTION"),
                arg!(--"pre-recon" "Use the pre-reconstruction measurements")
                    .help_heading("SELECTION"),
                arg!(--anisotropic "Keep the quadrupole as well as the monopole")
                    .help_heading("SELECTION"),
                arg!(--realisation [INDEX] "Mock realisation to use instead of the data")
                    .help_heading("SELECTION"),

                // covariance options
                arg!(--"reduce-cov-factor" [FACTOR] "Divide the covariance by <FACTOR>, -1 for the number of mocks")
                    .allow_hyphen_values(true)
                    .help_heading("COVARIANCE"),
                arg!(--"reduce-cov-mocks" "Divide the covariance by the number of mocks")
                    .conflicts_with("reduce-cov-factor")
                    .help_heading("COVARIANCE"),
                arg!(--"num-mocks" [COUNT] "Mocks behind the covariance, for the Hartlap correction")
                    .help_heading("COVARIANCE"),

                // output options
                arg!(--"scan-realisations" "Compute the chi-squared of every mock against the data")
                    .help_heading("OUTPUT"),
                arg!(--"dry-run" "Just print the summary and exit")
                    .help_heading("OUTPUT"),
                arg!(--"no-draw-progress" "do not show progress bars")
                    .help_heading("OUTPUT"),
            ]);
        let matches = app.try_get_matches_from_mut(args)?;
        Ok(matches)
    }

    fn parse_data_dir(matches: &clap::ArgMatches) -> PathBuf {
        match matches.value_of("data-dir") {
            Some(dir) => PathBuf::from(dir),
            None => env::var_os(DATA_DIR_ENV)
                .map_or_else(|| PathBuf::from(DEFAULT_DATA_DIR), PathBuf::from),
        }
    }

    fn parse_config_matches(matches: &clap::ArgMatches) -> Result<DatasetConfig, BarryError> {
        let mut config = DatasetConfig {
            name: matches.value_of("name").map(Into::into),
            recon: !matches.is_present("pre-recon"),
            isotropic: !matches.is_present("anisotropic"),
            ..DatasetConfig::default()
        };
        if let Some(min_dist) = value_of_opt::<f64>(matches, "min-dist")? {
            config.min_dist = min_dist;
        }
        if let Some(max_dist) = value_of_opt::<f64>(matches, "max-dist")? {
            config.max_dist = max_dist;
        }
        // range and factor are checked by `CorrelationFunction::new`
        if let Some(factor) = value_of_opt::<f64>(matches, "reduce-cov-factor")? {
            config.reduce_cov_factor = if factor == -1. {
                CovReduction::MockCount
            } else {
                CovReduction::Factor(factor)
            };
        }
        if matches.is_present("reduce-cov-mocks") {
            config.reduce_cov_factor = CovReduction::MockCount;
        }
        config.num_mocks = value_of_opt::<usize>(matches, "num-mocks")?;
        config.realisation = value_of_opt::<usize>(matches, "realisation")?.into();
        Ok(config)
    }

    /// Parse the command line and load the requested dataset.
    ///
    /// # Errors
    ///
    /// - [`BarryError::ClapError`] for unparseable arguments, `--help` and `--version`
    /// - [`BarryError::CLIError`] for a realisation scan of a dataset without mocks
    /// - [`BarryError::DatasetError`] if the dataset can't be loaded, including an inverted
    ///   distance range or a bad reduction factor
    /// - [`BarryError::DryRun`] after `--list` or `--dry-run`
    pub fn from_args<I, T>(args: I) -> Result<Self, BarryError>
    where
        I: IntoIterator<Item = T> + Debug,
        T: Into<OsString> + Clone,
    {
        debug!("args:\n{:?}", &args);

        let matches = Self::get_matches(args)?;
        trace!("arg matches:\n{:?}", &matches);

        if matches.is_present("list") {
            info!("Registered datasets:\n{}", variants_table());
            return Err(DryRun {});
        }

        // clap requires --dataset unless --list is present
        let variant = variant(matches.value_of("dataset").unwrap_or_default())?;
        let config = Self::parse_config_matches(&matches)?;
        if config.num_mocks.is_some() && variant.num_mocks.is_some() {
            warn!(
                "overriding the {} mocks registered for {}",
                variant.num_mocks.unwrap_or_default(),
                variant.name
            );
        }
        let store = PickleStore::new(Self::parse_data_dir(&matches));
        let dataset = variant.build(&store, config)?;

        if matches.is_present("scan-realisations") && dataset.num_mocks() == 0 {
            return Err(BarryError::CLIError(InvalidCommandLineArgument {
                option: "--scan-realisations".into(),
                expected: "a dataset with mock realisations".into(),
                received: format!("{} with no mocks", dataset.name()),
            }));
        }

        let result = Self {
            store,
            variant,
            dataset,
            scan_realisations: matches.is_present("scan-realisations"),
            draw_progress: !matches.is_present("no-draw-progress"),
        };

        info!("{}", &result);

        if matches.is_present("dry-run") {
            return Err(DryRun {});
        }

        Ok(result)
    }

    /// χ² of every mock realisation against the nominal data, using each bin's `icov`.
    ///
    /// The dataset's selected realisation is restored afterwards.
    ///
    /// # Errors
    ///
    /// can raise [`BarryError::DatasetError`] if a realisation can't be selected.
    pub fn scan_realisations(&mut self) -> Result<RealisationScan, BarryError> {
        let initial = self.dataset.realisation();
        self.dataset.select(Realisation::Data)?;
        let nominal = self.dataset.get_data();
        let dof = nominal.iter().map(|bin| bin.cov.nrows()).sum();
        let nominal_vectors: Vec<_> = nominal.iter().map(BinData::data_vector).collect();

        let draw_target = if self.draw_progress {
            ProgressDrawTarget::stderr()
        } else {
            ProgressDrawTarget::hidden()
        };
        let num_mocks = self.dataset.num_mocks();
        let scan_progress = ProgressBar::with_draw_target(Some(num_mocks as u64), draw_target);
        if let Ok(style) = ProgressStyle::with_template(
            "{msg:16}: [{elapsed_precise}] [{wide_bar:.cyan/blue}] {percent:3}% ({eta:5})",
        ) {
            scan_progress.set_style(style.progress_chars("=> "));
        }
        scan_progress.set_message("realisations");

        let mut chi2 = Vec::with_capacity(num_mocks);
        for mock_idx in 0..num_mocks {
            self.dataset.select(Realisation::Mock(mock_idx))?;
            let total = izip!(self.dataset.get_data(), &nominal_vectors)
                .map(|(bin, nominal)| {
                    let diff = bin.data_vector() - nominal;
                    chi_squared(diff.view(), bin.icov.view())
                })
                .sum();
            chi2.push(total);
            scan_progress.inc(1);
        }
        scan_progress.finish();
        self.dataset.select(initial)?;

        Ok(RealisationScan { chi2, dof })
    }

    /// Print the data tables, and scan the realisations if asked to.
    ///
    /// # Errors
    ///
    /// see [`BarryContext::scan_realisations`]
    pub fn run(mut self) -> Result<Option<RealisationScan>, BarryError> {
        for (bin_idx, bin) in self.dataset.get_data().iter().enumerate() {
            info!(
                "{} redshift bin {} ({}):\n{}",
                bin.name,
                bin_idx,
                bin.realisation,
                bin_table(bin)
            );
        }
        if !self.scan_realisations {
            return Ok(None);
        }
        let scan = self.scan_realisations()?;
        info!(
            "mean chi2 of {} mocks against the data: {:.3} for {} data points",
            scan.chi2.len(),
            scan.mean_chi2(),
            scan.dof
        );
        Ok(Some(scan))
    }
}

/// Run the command line interface, returning an exit code.
pub fn main_with_args<I, T>(args: I) -> i32
where
    I: IntoIterator<Item = T> + Debug,
    T: Into<OsString> + Clone,
{
    let barry_ctx = match BarryContext::from_args(args) {
        Ok(barry_ctx) => barry_ctx,
        Err(DryRun {}) => {
            info!("Dry run. Nothing else to do.");
            return 0;
        }
        Err(BarryError::ClapError(inner)) => {
            // Swallow broken pipe errors
            trace!("clap error: {:?}", inner.kind());
            let _ = inner.print();
            match inner.kind() {
                clap::ErrorKind::DisplayHelp | clap::ErrorKind::DisplayVersion => return 0,
                _ => return 1,
            }
        }
        Err(e) => {
            eprintln!("error parsing args: {e}");
            return 1;
        }
    };

    match barry_ctx.run() {
        Ok(_) => 0,
        Err(e) => {
            eprintln!("barry error: {e}");
            1
        }
    }
}

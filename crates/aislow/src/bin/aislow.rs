//! aislow CLI: explain a page's predicted SpeedIndex.
//!
//! # Examples
//!
//! ```text
//! # The page closest to the median SpeedIndex of the training data
//! aislow --model model.txt --background pages1.csv pages2.csv
//!
//! # A random page from another crawl, reproducible
//! aislow --model model.txt --background pages.csv --mode random --pages test.csv --seed 7
//!
//! # A specific row, as JSON
//! aislow --model model.txt --background pages.csv --mode row --row 42 --json
//! ```
//!
//! Logging goes to stderr and is controlled by `RUST_LOG` (default `warn`).

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, ValueEnum};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing_subscriber::EnvFilter;

use aislow::compat::lightgbm::LgbModel;
use aislow::data::io::CsvLoader;
use aislow::data::{DataError, Instance, Population};
use aislow::report::{FeatureNames, JsonReport, PageContext, PopulationSummary, TextReport};
use aislow::{run_with_threads, Diagnoser, DiagnosisConfig, Error};

/// Explain why a page is predicted to load slowly.
#[derive(Parser, Debug)]
#[command(name = "aislow")]
#[command(version, about, long_about = None)]
struct Cli {
    /// LightGBM text model file
    #[arg(short, long, value_name = "FILE")]
    model: PathBuf,

    /// Training-data CSVs forming the reference population
    #[arg(short, long, value_name = "CSV", num_args = 1.., required = true)]
    background: Vec<PathBuf>,

    /// How to pick the page to analyze
    #[arg(long, value_enum, default_value_t = Mode::Median)]
    mode: Mode,

    /// CSV to pick the page from (random and row modes)
    #[arg(short, long, value_name = "CSV")]
    pages: Option<PathBuf>,

    /// Row index for row mode
    #[arg(short, long)]
    row: Option<usize>,

    /// Seed for random mode (entropy if omitted)
    #[arg(long)]
    seed: Option<u64>,

    /// JSON configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// JSON object overriding feature display names
    #[arg(long, value_name = "FILE")]
    names: Option<PathBuf>,

    /// Override the problem threshold (target units)
    #[arg(short, long)]
    threshold: Option<f64>,

    /// Drop repeated pages from the reference population
    #[arg(long)]
    dedup: bool,

    /// Emit JSON instead of the text report
    #[arg(long)]
    json: bool,

    /// Worker threads (0 = all cores, 1 = sequential)
    #[arg(long)]
    threads: Option<usize>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Mode {
    /// Reference page whose target is closest to the median target
    Median,
    /// Random page from --pages
    Random,
    /// Page at --row of --pages (or of the reference population)
    Row,
}

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Aislow(#[from] Error),

    #[error("failed to write JSON report: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Usage(&'static str),
}

impl From<DataError> for CliError {
    fn from(err: DataError) -> Self {
        CliError::Aislow(err.into())
    }
}

/// The page chosen for analysis.
struct Selected {
    instance: Instance,
    actual: Option<f64>,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match run(&cli) {
        Ok(output) => {
            print!("{output}");
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("ERROR: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<String, CliError> {
    let mut config = match &cli.config {
        Some(path) => DiagnosisConfig::from_json_file(path).map_err(Error::from)?,
        None => DiagnosisConfig::default(),
    };
    if let Some(threshold) = cli.threshold {
        config.impact_threshold = threshold;
    }
    if let Some(threads) = cli.threads {
        config.n_threads = threads;
    }
    config.validate().map_err(Error::from)?;

    let names = match &cli.names {
        Some(path) => FeatureNames::from_json_file(path).map_err(Error::from)?,
        None => FeatureNames::builtin(),
    };

    let forest = LgbModel::from_file(&cli.model)
        .map_err(Error::from)?
        .to_forest()
        .map_err(Error::from)?;

    let loader = CsvLoader::from_config(&config);
    let population = loader.clone().with_dedup(cli.dedup).load_many(&cli.background)?;
    let selected = select(cli, &loader, &population)?;

    let context = PageContext::default()
        .with_target_name(config.target_column.clone())
        .with_population(PopulationSummary::from_population(&population));
    let context = match selected.instance.id() {
        Some(id) => context.with_page(id),
        None => context,
    };
    let context = match selected.actual {
        Some(actual) => context.with_actual(actual),
        None => context,
    };

    run_with_threads(config.n_threads, |parallelism| -> Result<String, CliError> {
        let diagnoser = Diagnoser::with_parallelism(&forest, &population, &config, parallelism)?;
        let diagnosis = diagnoser.diagnose(&selected.instance)?;
        let output = if cli.json {
            let mut json = JsonReport::new(&diagnosis, &names, &context)
                .with_benchmarks(diagnoser.benchmarks())
                .to_string_pretty()?;
            json.push('\n');
            json
        } else {
            TextReport::new(&diagnosis, &names, &context)
                .with_benchmarks(diagnoser.benchmarks())
                .to_string()
        };
        Ok(output)
    })
}

fn select(cli: &Cli, loader: &CsvLoader, population: &Population) -> Result<Selected, CliError> {
    match cli.mode {
        Mode::Median => {
            let row = population.median_target_row().ok_or(Error::MissingTargets)?;
            tracing::info!(row, "selected median page");
            from_row(population, row)
        }
        Mode::Random => {
            let path = cli.pages.as_ref().ok_or(CliError::Usage("--mode random requires --pages"))?;
            let pages = loader.load(path)?;
            if pages.is_empty() {
                return Err(Error::EmptyPopulation.into());
            }
            let mut rng = match cli.seed {
                Some(seed) => StdRng::seed_from_u64(seed),
                None => StdRng::from_entropy(),
            };
            let row = rng.gen_range(0..pages.n_samples());
            tracing::info!(row, path = %path.display(), "selected random page");
            from_row(&pages, row)
        }
        Mode::Row => {
            let row = cli.row.ok_or(CliError::Usage("--mode row requires --row"))?;
            match &cli.pages {
                Some(path) => from_row(&loader.load(path)?, row),
                None => from_row(population, row),
            }
        }
    }
}

fn from_row(population: &Population, row: usize) -> Result<Selected, CliError> {
    Ok(Selected {
        instance: population.get(row)?,
        actual: population.target(row),
    })
}

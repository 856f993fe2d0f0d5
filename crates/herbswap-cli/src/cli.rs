// CLI Interface
//
// Subcommands for the search engine, the registry converter, database
// listings, and the web server.

use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result as AnyhowResult};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::info;

use herbswap_convert::{LicenseConverter, LoadOptions};
use herbswap_core::{parse_target, FormulaDatabase};
use herbswap_search::{find_best_matches, SearchContext, Strategy};
use herbswap_serve::{HerbswapServer, ServerConfig};

use crate::report::format_matches;

/// herbswap - Herbal formula substitute search
#[derive(Parser, Debug)]
#[command(name = "herbswap")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Search combinations of stocked formulas that substitute a target mixture", long_about = None)]
pub struct Cli {
    /// Enable verbose logging
    #[arg(global = true, long = "verbose", short = 'v')]
    pub verbose: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Search strategy selection on the command line
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum StrategyArg {
    /// Enumerate every compound subset
    Exhaustive,
    /// Depth-wise expansion with heuristic pruning
    Beam,
}

impl From<StrategyArg> for Strategy {
    fn from(arg: StrategyArg) -> Self {
        match arg {
            StrategyArg::Exhaustive => Strategy::Exhaustive,
            StrategyArg::Beam => Strategy::Beam,
        }
    }
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Search substitute combinations for a target composition
    Search {
        /// Target items as name:amount (formula keys expand to their
        /// composition)
        #[arg(value_name = "ITEM", required = true)]
        items: Vec<String>,

        /// Path to the YAML formula database
        #[arg(long = "database", short = 'd', default_value = "database.yaml")]
        database: PathBuf,

        /// Treat every item name as a raw herb, without formula expansion
        #[arg(long = "raw")]
        raw: bool,

        /// Formula keys to exclude (repeatable)
        #[arg(long = "exclude", short = 'x', value_name = "KEY")]
        excludes: Vec<String>,

        /// Number of results to show
        #[arg(long = "top-n", short = 'n', default_value = "5")]
        top_n: usize,

        /// Maximum compound formulas per combination
        #[arg(long = "max-cformulas", default_value = "2")]
        max_cformulas: usize,

        /// Maximum simple formulas per combination
        #[arg(long = "max-sformulas", default_value = "3")]
        max_sformulas: usize,

        /// Smallest useful compound-formula dosage
        #[arg(long = "min-cformula-dose", default_value = "0.0")]
        min_cformula_dose: f64,

        /// Smallest useful simple-formula dosage
        #[arg(long = "min-sformula-dose", default_value = "0.0")]
        min_sformula_dose: f64,

        /// Upper dosage bound for compound formulas
        #[arg(long = "max-cformula-dose", default_value = "50.0")]
        max_cformula_dose: f64,

        /// Upper dosage bound for simple formulas
        #[arg(long = "max-sformula-dose", default_value = "50.0")]
        max_sformula_dose: f64,

        /// Weight on herbs the target does not ask for
        #[arg(long = "penalty-factor", default_value = "2.0")]
        penalty_factor: f64,

        /// Search strategy
        #[arg(long = "strategy", value_enum, default_value = "exhaustive")]
        strategy: StrategyArg,
    },

    /// Convert a license-registry CSV export into a database file
    Convert {
        /// Registry CSV export
        #[arg(value_name = "CSV")]
        input: PathBuf,

        /// Output database file; omit to print to stdout
        #[arg(long = "output", short = 'o')]
        output: Option<PathBuf>,

        /// Converter correction config (YAML)
        #[arg(long = "config", short = 'c')]
        config: Option<PathBuf>,

        /// Normalize compositions per gram and drop unit_dosage
        #[arg(long = "use-unit-dosage")]
        use_unit_dosage: bool,

        /// Keep only rows whose vendor matches this pattern
        #[arg(long = "filter-vendor")]
        filter_vendor: Option<String>,
    },

    /// List every formula key in the database
    Formulas {
        /// Path to the YAML formula database
        #[arg(long = "database", short = 'd', default_value = "database.yaml")]
        database: PathBuf,
    },

    /// List every herb appearing in the database
    Herbs {
        /// Path to the YAML formula database
        #[arg(long = "database", short = 'd', default_value = "database.yaml")]
        database: PathBuf,
    },

    /// Start the HTTP server and web form
    Serve {
        /// Server config file (TOML); defaults come from the environment
        #[arg(long = "config", short = 'c')]
        config: Option<PathBuf>,

        /// Host address to bind to
        #[arg(long = "host")]
        host: Option<String>,

        /// Port to listen on
        #[arg(long = "port")]
        port: Option<u16>,

        /// Path to the YAML formula database
        #[arg(long = "database", short = 'd')]
        database: Option<PathBuf>,
    },
}

impl Cli {
    /// Run the CLI
    pub async fn run(self) -> AnyhowResult<()> {
        init_logging(self.verbose);

        match self.command {
            Commands::Search {
                items,
                database,
                raw,
                excludes,
                top_n,
                max_cformulas,
                max_sformulas,
                min_cformula_dose,
                min_sformula_dose,
                max_cformula_dose,
                max_sformula_dose,
                penalty_factor,
                strategy,
            } => {
                let database = load_database(&database)?;
                let target = parse_target(&database, &items.join(" "), raw)
                    .context("Invalid target composition")?;
                let defaults = SearchContext::default();
                let context = SearchContext::new(target.clone())
                    .with_excludes(excludes)
                    .with_limits(max_cformulas, max_sformulas)
                    .with_penalty_factor(penalty_factor)
                    .with_dose_bounds(
                        min_cformula_dose,
                        min_sformula_dose,
                        max_cformula_dose,
                        max_sformula_dose,
                    )
                    .with_beam(top_n, defaults.beam_width_factor, defaults.beam_multiplier);
                cmd_search(database, context, target, strategy.into()).await
            }
            Commands::Convert {
                input,
                output,
                config,
                use_unit_dosage,
                filter_vendor,
            } => cmd_convert(input, output, config, use_unit_dosage, filter_vendor),
            Commands::Formulas { database } => {
                let database = load_database(&database)?;
                let mut keys: Vec<&str> = database.keys().collect();
                keys.sort_unstable();
                for key in keys {
                    println!("{key}");
                }
                Ok(())
            }
            Commands::Herbs { database } => {
                let database = load_database(&database)?;
                for herb in database.herbs() {
                    println!("{herb}");
                }
                Ok(())
            }
            Commands::Serve {
                config,
                host,
                port,
                database,
            } => cmd_serve(config, host, port, database).await,
        }
    }
}

/// Initialize stderr logging, honoring `RUST_LOG` when set.
fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();

    let _ = tracing::subscriber::set_global_default(subscriber);
}

fn load_database(path: &PathBuf) -> AnyhowResult<FormulaDatabase> {
    let database = FormulaDatabase::from_file(path)
        .with_context(|| format!("Failed to load database {}", path.display()))?;
    info!("Loaded {} formulas from {}", database.len(), path.display());
    Ok(database)
}

/// Search command implementation
async fn cmd_search(
    database: FormulaDatabase,
    context: SearchContext,
    target: herbswap_core::Composition,
    strategy: Strategy,
) -> AnyhowResult<()> {
    println!("方劑數量: {}", database.len());

    let started = Instant::now();
    let (database, matches) = tokio::task::spawn_blocking(move || {
        let matches = find_best_matches(&database, &context, strategy);
        (database, matches)
    })
    .await
    .context("Search task failed")?;
    let matches = matches.context("Search failed")?;

    println!("計算匹配度用時: {:.2?}", started.elapsed());
    println!();
    println!("{}", format_matches(&matches, &database, &target));
    Ok(())
}

/// Convert command implementation
fn cmd_convert(
    input: PathBuf,
    output: Option<PathBuf>,
    config: Option<PathBuf>,
    use_unit_dosage: bool,
    filter_vendor: Option<String>,
) -> AnyhowResult<()> {
    let converter = match config {
        Some(path) => LicenseConverter::from_config_file(&path)
            .with_context(|| format!("Failed to load converter config {}", path.display()))?,
        None => LicenseConverter::default(),
    };

    let options = LoadOptions {
        use_unit_dosage,
        filter_vendor,
    };
    let records = converter
        .load(&input, &options)
        .with_context(|| format!("Failed to convert {}", input.display()))?;
    info!("Converted {} records", records.len());

    match output {
        Some(path) => converter
            .dump(&records, &path)
            .with_context(|| format!("Failed to write {}", path.display()))?,
        None => print!("{}", converter.dump_to_string(&records)?),
    }
    Ok(())
}

/// Serve command implementation
async fn cmd_serve(
    config: Option<PathBuf>,
    host: Option<String>,
    port: Option<u16>,
    database: Option<PathBuf>,
) -> AnyhowResult<()> {
    let mut config = match config {
        Some(path) => ServerConfig::from_file(&path)
            .map_err(|e| anyhow::anyhow!("{e}"))
            .with_context(|| format!("Failed to load server config {}", path.display()))?,
        None => ServerConfig::from_env(),
    };
    if let Some(host) = host {
        config.host = host;
    }
    if let Some(port) = port {
        config.port = port;
    }
    if let Some(database) = database {
        config.database_path = database.display().to_string();
    }

    let server = HerbswapServer::new(config).map_err(|e| anyhow::anyhow!("{e}"))?;
    info!("Starting server at {}", server.server_url());
    server.start().await.map_err(|e| anyhow::anyhow!("{e}"))
}

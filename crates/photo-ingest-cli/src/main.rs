use clap::{Args, Parser, Subcommand};
use log::{info, warn};
use photo_ingest_core::config::LogLevel;
use photo_ingest_core::inspect::{inspect_tree, MISMATCH_TOLERANCE_HOURS};
use photo_ingest_core::{logging, Config, DuplicatePolicy, PhotoIngester};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "photo-ingest")]
#[command(about = "Ingest photos into a dated library, recycling duplicates")]
#[command(version)]
struct Cli {
    /// Verbosity level
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Write logs to rolling files in this directory instead of stderr
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct RootArgs {
    /// Directory holding the files to ingest
    #[arg(long)]
    source: Option<PathBuf>,

    /// Organized library that receives renamed files
    #[arg(long)]
    target: Option<PathBuf>,

    /// Where duplicates are moved
    #[arg(long)]
    recycle: Option<PathBuf>,

    /// Catalog database (defaults to <target>/catalog.db)
    #[arg(long)]
    database: Option<PathBuf>,

    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Reconcile the catalog, then ingest the source directory
    Run {
        #[command(flatten)]
        roots: RootArgs,

        /// Treat hashes within this Hamming distance as duplicates
        #[arg(long)]
        threshold: Option<u32>,

        /// Also recycle copies of images first seen in this run
        #[arg(long)]
        detect_run_duplicates: bool,

        /// Hide progress bars
        #[arg(long)]
        no_progress: bool,
    },

    /// Sync the catalog with the target directory only
    Reconcile {
        #[command(flatten)]
        roots: RootArgs,
    },

    /// Print one JSON document per media file and flag timestamp mismatches
    Inspect {
        /// Directory to inspect
        directory: PathBuf,

        /// Allowed gap between capture time and last write, in hours
        #[arg(long, default_value_t = MISMATCH_TOLERANCE_HOURS)]
        tolerance_hours: i64,
    },

    /// List catalogued files that share a hash
    Duplicates {
        #[command(flatten)]
        roots: RootArgs,

        /// Move every copy but the first (by path) to the recycle directory
        #[arg(long)]
        recycle_extras: bool,
    },

    /// Generate default configuration file
    GenerateConfig {
        /// Path to save configuration file
        #[arg(default_value = "photo-ingest.json")]
        path: PathBuf,
    },
}

impl RootArgs {
    /// Load the config file (if any) and override it with flags
    fn load(&self, verbose: u8) -> anyhow::Result<Config> {
        let mut config = match &self.config {
            Some(path) => Config::from_file(path)?,
            None => Config::default(),
        };

        if let Some(source) = &self.source {
            config.source_dir = source.clone();
        }
        if let Some(target) = &self.target {
            config.target_dir = target.clone();
        }
        if let Some(recycle) = &self.recycle {
            config.recycle_dir = recycle.clone();
        }
        if self.database.is_some() {
            config.database_path = self.database.clone();
        }

        if verbose > 0 {
            config.log_level = level_for(verbose);
        }
        Ok(config)
    }
}

fn level_for(verbose: u8) -> LogLevel {
    match verbose {
        0 => LogLevel::Info,
        1 => LogLevel::Debug,
        _ => LogLevel::Trace,
    }
}

impl Commands {
    fn roots(&self) -> Option<&RootArgs> {
        match self {
            Commands::Run { roots, .. }
            | Commands::Reconcile { roots }
            | Commands::Duplicates { roots, .. } => Some(roots),
            Commands::Inspect { .. } | Commands::GenerateConfig { .. } => None,
        }
    }
}

fn init_logging(log_dir: Option<&Path>, level: LogLevel) -> anyhow::Result<()> {
    let level = level.to_level_filter();
    match log_dir {
        Some(dir) => logging::init_logger(dir, level)
            .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e)),
        None => {
            env_logger::Builder::from_env(
                env_logger::Env::default()
                    .filter_or(logging::LOG_ENV, level.to_string().to_lowercase()),
            )
            .init();
            Ok(())
        }
    }
}

fn main() -> Result<(), anyhow::Error> {
    // Parse command line arguments
    let cli = Cli::parse();

    // Roots and log level come from the config file, overridden by flags
    let config = cli
        .command
        .roots()
        .map(|roots| roots.load(cli.verbose))
        .transpose()?;
    let level = config
        .as_ref()
        .map_or(level_for(cli.verbose), |c| c.log_level);
    init_logging(cli.log_dir.as_deref(), level)?;
    let config = config.unwrap_or_default();

    match &cli.command {
        Commands::Run {
            threshold,
            detect_run_duplicates,
            no_progress,
            ..
        } => {
            let mut config = config;
            if let Some(max) = threshold {
                config.duplicate_policy = DuplicatePolicy::DistanceThreshold(*max);
            }
            config.detect_run_duplicates |= *detect_run_duplicates;
            config.show_progress &= !*no_progress;

            let ingester = PhotoIngester::new(config);
            let token = ingester.cancellation_token();
            ctrlc::set_handler(move || {
                warn!("Interrupt received, finishing in-flight work");
                token.cancel();
            })?;

            info!("Starting photo ingest...");
            let report = ingester.run()?;
            info!("Ingest complete");
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(())
        }

        Commands::Reconcile { .. } => {
            let ingester = PhotoIngester::new(config);
            let summary = ingester.reconcile()?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
            Ok(())
        }

        Commands::Inspect {
            directory,
            tolerance_hours,
        } => {
            let tolerance = chrono::Duration::hours(*tolerance_hours);
            let mut mismatches = 0;
            for (doc, mismatch) in inspect_tree(directory, tolerance)? {
                if mismatch.is_some() {
                    mismatches += 1;
                }
                println!("{}", serde_json::to_string(&doc)?);
            }
            info!("{} timestamp mismatches", mismatches);
            Ok(())
        }

        Commands::Duplicates {
            recycle_extras: true,
            ..
        } => {
            let ingester = PhotoIngester::new(config);
            let summary = ingester.recycle_duplicates()?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
            Ok(())
        }

        Commands::Duplicates { .. } => {
            let ingester = PhotoIngester::new(config);
            let groups = ingester.duplicate_report()?;
            for group in &groups {
                println!("{}", group.hash);
                for record in &group.records {
                    println!("  {}", record.path.display());
                }
            }
            let stats = ingester.catalog_stats()?;
            println!(
                "{} duplicate groups | {} active records | {} deleted",
                groups.len(),
                stats.active,
                stats.deleted
            );
            Ok(())
        }

        Commands::GenerateConfig { path } => {
            let config = Config::default();
            config.save_to_file(path)?;
            println!("Configuration file generated at: {}", path.display());
            Ok(())
        }
    }
}

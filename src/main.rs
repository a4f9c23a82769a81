use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rusqlite::Connection;
use serde::de::DeserializeOwned;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, Level};
use tracing_subscriber::fmt::time::ChronoLocal;

use fee_reconcile::{
    run_import, run_import_into, verify_count, AppConfig, BankParser, Child, CsvExportParser,
    FeeObligation, Roster,
};

#[derive(Parser)]
#[command(name = "fee-reconcile")]
#[command(about = "Match bank statement credits to membership fees")]
#[command(version)]
struct Cli {
    /// More log output (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Decode a statement export and print transactions plus the import audit
    Inspect {
        /// Semicolon-separated bank export (Windows-1252)
        statement: PathBuf,

        /// Currency for rows with a blank currency column
        #[arg(long, env = "FEE_HOME_CURRENCY")]
        currency: Option<String>,
    },

    /// Decode a statement and reconcile its credits against open fees
    Import {
        /// Semicolon-separated bank export (Windows-1252)
        statement: PathBuf,

        /// JSON array of children with parents and member numbers
        #[arg(long)]
        roster: PathBuf,

        /// JSON array of fee obligations
        #[arg(long)]
        obligations: PathBuf,

        /// SQLite database; only transactions not seen before are reconciled
        #[arg(long, env = "FEE_DATABASE_PATH")]
        db: Option<PathBuf>,

        /// Write the JSON outcome here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Currency for rows with a blank currency column
        #[arg(long, env = "FEE_HOME_CURRENCY")]
        currency: Option<String>,

        /// Minimum name-match confidence (0.0 - 1.0)
        #[arg(long, env = "FEE_MATCH_THRESHOLD")]
        threshold: Option<f64>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_timer(ChronoLocal::new("%Y-%m-%d %H:%M:%S".to_string()))
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    let mut config = AppConfig::from_env();

    match cli.command {
        Commands::Inspect { statement, currency } => {
            if let Some(currency) = currency {
                config.home_currency = currency;
            }
            run_inspect(&statement, &config)
        }
        Commands::Import {
            statement,
            roster,
            obligations,
            db,
            output,
            currency,
            threshold,
        } => {
            if let Some(currency) = currency {
                config.home_currency = currency;
            }
            if let Some(threshold) = threshold.filter(|t| t.is_finite()) {
                config.match_threshold = threshold.clamp(0.0, 1.0);
            }
            if db.is_some() {
                config.database_path = db;
            }
            run_import_command(&statement, &roster, &obligations, output.as_deref(), &config)
        }
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let raw = fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("Invalid JSON in {}", path.display()))
}

fn write_output<T: serde::Serialize>(value: &T, output: Option<&Path>) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    match output {
        Some(path) => {
            fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))?;
            info!("Wrote outcome to {}", path.display());
        }
        None => println!("{}", json),
    }
    Ok(())
}

fn run_inspect(statement: &Path, config: &AppConfig) -> Result<()> {
    let parser = CsvExportParser::new(&config.home_currency);
    let decoded = parser
        .parse(statement)
        .with_context(|| format!("Failed to decode {}", statement.display()))?;

    info!("{}", decoded.quality.summary());
    write_output(&decoded, None)
}

fn run_import_command(
    statement: &Path,
    roster_path: &Path,
    obligations_path: &Path,
    output: Option<&Path>,
    config: &AppConfig,
) -> Result<()> {
    let children: Vec<Child> = read_json(roster_path)?;
    let obligations: Vec<FeeObligation> = read_json(obligations_path)?;
    let roster = Roster::new(children);
    info!(
        children = roster.len(),
        obligations = obligations.len(),
        "Loaded roster and fees"
    );

    let bytes = fs::read(statement).with_context(|| format!("Failed to read {}", statement.display()))?;

    let outcome = match &config.database_path {
        None => run_import(&bytes, &roster, obligations, config)?,
        Some(db_path) => {
            let mut conn = Connection::open(db_path)
                .with_context(|| format!("Failed to open database {}", db_path.display()))?;
            let outcome = run_import_into(&mut conn, &bytes, &roster, obligations, config)?;
            info!("Database contains {} transactions", verify_count(&conn)?);
            outcome
        }
    };

    info!("{}", outcome.report.summary());
    write_output(&outcome, output)
}

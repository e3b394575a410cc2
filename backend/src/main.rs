//! Schoolmix CLI - school demographics by year and by school
//!
//! # Main Commands
//!
//! ```bash
//! schoolmix serve                     # Start HTTP server (port 3000)
//! schoolmix report data.csv           # Full dashboard JSON (years + schools)
//! schoolmix fetch                     # Dashboard from the remote schools API
//! ```
//!
//! # Single Views
//!
//! ```bash
//! schoolmix parse data.csv            # Just parse CSV to JSON rows
//! schoolmix aggregate data.csv        # Stacked totals per academic year
//! schoolmix join data.csv --latest    # Before/after summary per school
//! ```

use clap::{Args, Parser, Subcommand};
use schoolmix::api::logs::{log_info, log_success, LOG_BROADCASTER};
use schoolmix::config::comparison_year_from_env;
use schoolmix::{
    aggregate_by_year, build_dashboard, fetch_dashboard, join_schools, load_csv_bytes, load_path,
    parse_bytes_auto, parse_bytes_with_delimiter, BeforePolicy, ComparisonYear, DashboardOptions,
    DuplicatePolicy, Ingested, JoinOptions, SchoolApiClient, Settings,
};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "schoolmix")]
#[command(about = "Aggregate school race/ethnicity counts by year and compare schools over time", long_about = None)]
struct Cli {
    /// Only print errors
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse a CSV file and output JSON rows
    Parse {
        /// Input CSV file
        input: PathBuf,

        /// CSV delimiter (auto-detect if not specified)
        #[arg(short, long)]
        delimiter: Option<char>,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Stacked totals per academic year
    Aggregate {
        /// Input CSV or JSON file
        input: PathBuf,

        /// CSV delimiter (auto-detect if not specified)
        #[arg(short, long)]
        delimiter: Option<char>,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// One before/after summary per school
    Join {
        /// Input CSV or JSON file
        input: PathBuf,

        /// CSV delimiter (auto-detect if not specified)
        #[arg(short, long)]
        delimiter: Option<char>,

        #[command(flatten)]
        join: JoinArgs,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Full dashboard: yearly aggregates, school summaries and warnings
    Report {
        /// Input CSV or JSON file
        input: PathBuf,

        /// CSV delimiter (auto-detect if not specified)
        #[arg(short, long)]
        delimiter: Option<char>,

        #[command(flatten)]
        join: JoinArgs,

        /// Skip consistency checks
        #[arg(long)]
        no_validate: bool,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Build the dashboard from the remote schools API
    Fetch {
        #[command(flatten)]
        join: JoinArgs,

        /// Skip consistency checks
        #[arg(long)]
        no_validate: bool,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Start HTTP server
    Serve {
        /// Port to listen on (default: SCHOOLMIX_PORT or 3000)
        #[arg(short, long)]
        port: Option<u16>,

        /// Directory served for any non-API path
        #[arg(long)]
        static_dir: Option<PathBuf>,
    },
}

/// How schools are joined.
#[derive(Args)]
struct JoinArgs {
    /// Year label of the "after" snapshot (default: SCHOOLMIX_COMPARISON_YEAR or 14-15)
    #[arg(short = 'y', long, conflicts_with = "latest")]
    comparison_year: Option<String>,

    /// Use each school's latest year as "after"
    #[arg(long)]
    latest: bool,

    /// Use each school's first row as "before" instead of its earliest year
    #[arg(long)]
    first_seen: bool,

    /// Keep the first row when a school repeats the comparison year
    #[arg(long)]
    first_wins: bool,
}

impl JoinArgs {
    fn to_options(&self, default_year: &str) -> JoinOptions {
        let comparison_year = if self.latest {
            ComparisonYear::Latest
        } else {
            ComparisonYear::parse(self.comparison_year.as_deref().unwrap_or(default_year))
        };

        JoinOptions {
            comparison_year,
            before: if self.first_seen {
                BeforePolicy::FirstSeen
            } else {
                BeforePolicy::EarliestYear
            },
            duplicates: if self.first_wins {
                DuplicatePolicy::FirstWins
            } else {
                DuplicatePolicy::LastWins
            },
        }
    }
}

#[tokio::main]
async fn main() {
    // Load .env file (if present)
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    LOG_BROADCASTER.set_quiet(cli.quiet);

    if let Err(e) = run(cli.command).await {
        eprintln!("✗ Error: {}", e);
        std::process::exit(1);
    }
}

/// Only `fetch` and `serve` need the full settings; other commands read at
/// most the comparison year, so a bad port or API variable never stops them.
async fn run(command: Commands) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        Commands::Parse {
            input,
            delimiter,
            output,
        } => cmd_parse(&input, delimiter, output.as_deref()),

        Commands::Aggregate {
            input,
            delimiter,
            output,
        } => cmd_aggregate(&input, delimiter, output.as_deref()),

        Commands::Join {
            input,
            delimiter,
            join,
            output,
        } => cmd_join(&input, delimiter, &join.to_options(&comparison_year_from_env()), output.as_deref()),

        Commands::Report {
            input,
            delimiter,
            join,
            no_validate,
            output,
        } => {
            let options = DashboardOptions {
                join: join.to_options(&comparison_year_from_env()),
                skip_validation: no_validate,
            };
            cmd_report(&input, delimiter, &options, output.as_deref())
        }

        Commands::Fetch {
            join,
            no_validate,
            output,
        } => {
            let settings = Settings::from_env()?;
            let options = DashboardOptions {
                join: join.to_options(&settings.comparison_year),
                skip_validation: no_validate,
            };
            cmd_fetch(&settings, &options, output.as_deref()).await
        }

        Commands::Serve { port, static_dir } => {
            let settings = Settings::from_env()?;
            let settings = Settings {
                port: port.unwrap_or(settings.port),
                ..settings
            };
            schoolmix::server::start_server(settings, static_dir).await
        }
    }
}

fn cmd_parse(input: &Path, delimiter: Option<char>, output: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    log_info(format!("Parsing CSV: {}", input.display()));

    let bytes = fs::read(input)?;
    let result = match delimiter {
        Some(d) => parse_bytes_with_delimiter(&bytes, d)?,
        None => parse_bytes_auto(&bytes)?,
    };

    log_info(format!("Encoding: {}", result.encoding));
    log_info(format!(
        "Delimiter: '{}'{}",
        format_delimiter(result.delimiter),
        if delimiter.is_none() { " (auto-detected)" } else { "" }
    ));
    log_info(format!("Columns: {}", result.headers.join(", ")));
    log_success(format!("Parsed {} rows", result.records.len()));

    let json = serde_json::to_string_pretty(&result.records)?;
    write_output(&json, output)
}

fn cmd_aggregate(input: &Path, delimiter: Option<char>, output: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let ingested = load(input, delimiter)?;
    let years = aggregate_by_year(&ingested.records);
    log_success(format!("{} academic years", years.len()));

    let json = serde_json::to_string_pretty(&years)?;
    write_output(&json, output)
}

fn cmd_join(
    input: &Path,
    delimiter: Option<char>,
    options: &JoinOptions,
    output: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let ingested = load(input, delimiter)?;
    let schools = join_schools(&ingested.records, options);
    let compared = schools.iter().filter(|s| s.has_comparison()).count();
    log_success(format!(
        "{} schools, {} with {} data",
        schools.len(),
        compared,
        options.comparison_year
    ));

    let json = serde_json::to_string_pretty(&schools)?;
    write_output(&json, output)
}

fn cmd_report(
    input: &Path,
    delimiter: Option<char>,
    options: &DashboardOptions,
    output: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let dashboard = build_dashboard(load(input, delimiter)?, options);

    let json = serde_json::to_string_pretty(&dashboard)?;
    write_output(&json, output)
}

async fn cmd_fetch(
    settings: &Settings,
    options: &DashboardOptions,
    output: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let client = SchoolApiClient::from_settings(settings)?;
    let dashboard = fetch_dashboard(&client, options).await?;

    let json = serde_json::to_string_pretty(&dashboard)?;
    write_output(&json, output)
}

fn load(input: &Path, delimiter: Option<char>) -> Result<Ingested, Box<dyn std::error::Error>> {
    let ingested = match delimiter {
        Some(d) => {
            log_info(format!("Reading {}", input.display()));
            load_csv_bytes(&fs::read(input)?, Some(d))?
        }
        None => load_path(input)?,
    };
    Ok(ingested)
}

fn format_delimiter(d: char) -> String {
    match d {
        '\t' => "\\t".to_string(),
        c => c.to_string(),
    }
}

fn write_output(content: &str, path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    match path {
        Some(p) => {
            fs::write(p, content)?;
            log_success(format!("Output written to: {}", p.display()));
        }
        None => {
            println!("{}", content);
        }
    }
    Ok(())
}

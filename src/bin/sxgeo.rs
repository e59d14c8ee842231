mod cli_utils;
mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use cli_utils::{BatchFormat, ModeArg};
use commands::{cmd_batch, cmd_inspect, cmd_query, cmd_validate};

#[derive(Parser)]
#[command(name = "sxgeo")]
#[command(
    about = "Look up IPv4 addresses in Sypex Geo (SxGeo) databases",
    long_about = "sxgeo - Read-only reader for Sypex Geo city and country databases\n\n\
    Resolves IPv4 addresses to city, region and country records. Databases are\n\
    memory-mapped; files ending in .gz are decompressed into memory.\n\n\
    Examples:\n\
      sxgeo query SxGeoCity.dat 8.8.8.8\n\
      sxgeo query SxGeoCity.dat 8.8.8.8 --mode country\n\
      sxgeo batch SxGeoCity.dat addresses.txt --format csv\n\
      sxgeo inspect SxGeoCity.dat --json\n\
      sxgeo validate SxGeoCity.dat.gz"
)]
#[command(version)]
struct Cli {
    /// Verbose output: debug logging and detailed reports
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Look up one address
    Query {
        /// Path to the SxGeo database (.dat or .dat.gz)
        #[arg(value_name = "DATABASE")]
        database: PathBuf,

        /// IPv4 address in dotted-quad form
        #[arg(value_name = "IP")]
        ip: String,

        /// Which records to return
        #[arg(short, long, value_enum, default_value = "full")]
        mode: ModeArg,

        /// Quiet mode - no output, only exit code (0 = found, 1 = not found)
        #[arg(short, long)]
        quiet: bool,
    },

    /// Look up every address in one or more files (one per line), or stdin
    Batch {
        /// Path to the SxGeo database (.dat or .dat.gz)
        #[arg(value_name = "DATABASE")]
        database: PathBuf,

        /// Input files (one address per line), or "-" for stdin
        #[arg(value_name = "INPUT", required = true)]
        inputs: Vec<PathBuf>,

        /// Output format: json (NDJSON) or csv
        #[arg(short, long, value_enum, default_value = "json")]
        format: BatchFormat,

        /// Which records to return
        #[arg(short, long, value_enum, default_value = "full")]
        mode: ModeArg,

        /// Read the database into memory instead of mapping it
        #[arg(long)]
        in_memory: bool,

        /// Show throughput statistics on stderr
        #[arg(short, long)]
        stats: bool,
    },

    /// Show header and table layout of a database
    Inspect {
        /// Path to the SxGeo database (.dat or .dat.gz)
        #[arg(value_name = "DATABASE")]
        database: PathBuf,

        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Check index ordering and every record linkage
    Validate {
        /// Path to the SxGeo database (.dat or .dat.gz)
        #[arg(value_name = "DATABASE")]
        database: PathBuf,

        /// Output results as JSON
        #[arg(short, long)]
        json: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    match cli.command {
        Commands::Query {
            database,
            ip,
            mode,
            quiet,
        } => cmd_query(database, ip, mode, quiet),
        Commands::Batch {
            database,
            inputs,
            format,
            mode,
            in_memory,
            stats,
        } => cmd_batch(database, inputs, format, mode, in_memory, stats),
        Commands::Inspect { database, json } => cmd_inspect(database, json, cli.verbose),
        Commands::Validate { database, json } => cmd_validate(database, json, cli.verbose),
    }
}

use std::fs;
use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand, ValueEnum};
use discoship::provider::{self, PROVIDERS};
use discoship::types::UspsService;
use discoship::{FetchClient, FetchOptions, IngestConfig, IngestContext, ParsedRecords, Store};
use log::LevelFilter;

const DEFAULT_DB_PATH: &str = "data/discoship.db";

#[derive(Parser)]
#[command(name = "discoship")]
#[command(version)]
#[command(
    about = "Utility for creating international discogs.com shipping policies",
    long_about = None,
    after_help = "For help with subcommands, run `discoship <subcommand> --help`"
)]
struct Cli {
    #[arg(
        short = 'l',
        long = "log-level",
        value_enum,
        default_value = "info",
        global = true,
        help = "Set the logging level"
    )]
    log_level: LogLevel,

    #[arg(
        long = "database",
        env = "DISCOSHIP_DB",
        default_value = DEFAULT_DB_PATH,
        global = true,
        help = "Path to the SQLite database"
    )]
    database: PathBuf,

    #[arg(
        long = "config",
        value_name = "JSON",
        global = true,
        help = "Load ingest settings from a JSON file"
    )]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, ValueEnum)]
enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Off => LevelFilter::Off,
            LogLevel::Error => LevelFilter::Error,
            LogLevel::Warn => LevelFilter::Warn,
            LogLevel::Info => LevelFilter::Info,
            LogLevel::Debug => LevelFilter::Debug,
            LogLevel::Trace => LevelFilter::Trace,
        }
    }
}

#[derive(Debug, Clone, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch external data sources and ingest them into the database
    Fetch {
        #[arg(long, default_value = "usps", help = "Shipping provider")]
        provider: String,

        #[arg(
            long,
            value_parser = parse_service,
            help = "Shipping service (default FCPIS)"
        )]
        service: Option<UspsService>,

        #[arg(long, help = "Fetch all data")]
        all: bool,

        #[arg(long, help = "Country price groups")]
        cpg: bool,

        #[arg(long, help = "Rates for price group by weight")]
        rates: bool,

        #[arg(
            long,
            value_name = "PATH",
            help = "Read a local HTML file instead of the provider's default source \
                    (discogs needs one unless data/discogs-shipping-destinations.htm exists)"
        )]
        source: Option<PathBuf>,

        #[arg(long, help = "Parse and print records without writing to the database")]
        dry_run: bool,

        #[arg(
            short = 'o',
            long = "output",
            value_enum,
            default_value = "text",
            help = "Output format"
        )]
        format: OutputFormat,
    },
    /// Initialize the database
    Init {
        #[arg(long, help = "Recreate the database from scratch [WARNING: DESTROYS ALL DATA]")]
        db: bool,

        #[arg(long, help = "Recreate ingest tables only, keeping config")]
        ingest: bool,
    },
    /// Inspect or reset stored settings and ingest timestamps
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
    /// List registered providers
    Providers,
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print every config entry
    Dump {
        #[arg(
            short = 'o',
            long = "output",
            value_enum,
            default_value = "text",
            help = "Output format"
        )]
        format: OutputFormat,
    },
    /// Drop and recreate the config table
    Reset,
}

fn print_parsed(parsed: &ParsedRecords) {
    if parsed.is_empty() {
        println!("Nothing parsed.");
    }
    if !parsed.price_groups.is_empty() {
        println!("Country price groups ({}):", parsed.price_groups.len());
        for record in &parsed.price_groups {
            println!("  {}", record);
        }
    }
    if !parsed.rates.is_empty() {
        println!("Rates by price group ({}):", parsed.rates.len());
        for record in &parsed.rates {
            println!("  {}", record);
        }
    }
    if !parsed.destinations.is_empty() {
        println!("Destinations ({}):", parsed.destinations.len());
        for record in &parsed.destinations {
            println!("  {}", record);
        }
    }
}

fn parse_service(s: &str) -> Result<UspsService, String> {
    s.parse::<UspsService>().map_err(|e| e.to_string())
}

fn serialize_json<T: serde::Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(e) => {
            log::error!("Error serializing to JSON: {}", e);
            process::exit(1);
        }
    }
}

fn open_store(path: &Path) -> Store {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).unwrap_or_else(|e| {
            log::error!("Error creating {}: {}", parent.display(), e);
            process::exit(1);
        });
    }
    Store::open(path).unwrap_or_else(|e| {
        log::error!("Error opening database {}: {}", path.display(), e);
        process::exit(1);
    })
}

fn main() {
    let cli = Cli::parse();

    env_logger::Builder::new()
        .filter_level(cli.log_level.clone().into())
        .init();

    let config = match &cli.config {
        Some(path) => IngestConfig::from_json_file(path).unwrap_or_else(|e| {
            log::error!("Error loading config: {}", e);
            process::exit(1);
        }),
        None => IngestConfig::default(),
    };

    match cli.command {
        Commands::Fetch {
            provider,
            service,
            all,
            cpg,
            rates,
            source,
            dry_run,
            format,
        } => {
            let options = FetchOptions {
                all,
                cpg,
                rates,
                service: service.map(|s| s.code().to_string()),
                source,
            };

            let fetcher = provider::lookup(&provider).unwrap_or_else(|e| {
                log::error!("{}", e);
                process::exit(1);
            });

            let mut client = FetchClient::new(&config).unwrap_or_else(|e| {
                log::error!("Error creating HTTP client: {}", e);
                process::exit(1);
            });

            if dry_run {
                let parsed = fetcher
                    .parse(&mut client, &config, &options)
                    .unwrap_or_else(|e| {
                        log::error!("Error parsing {}: {}", fetcher.name(), e);
                        process::exit(1);
                    });
                match format {
                    OutputFormat::Json => serialize_json(&parsed),
                    OutputFormat::Text => print_parsed(&parsed),
                }
                return;
            }

            let mut store = open_store(&cli.database);
            store.ensure_schema().unwrap_or_else(|e| {
                log::error!("Error preparing database: {}", e);
                process::exit(1);
            });

            let mut ctx = IngestContext {
                client: &mut client,
                store: &mut store,
                config: &config,
            };
            let summaries = fetcher.fetch(&mut ctx, &options).unwrap_or_else(|e| {
                log::error!("Error fetching {}: {}", fetcher.name(), e);
                process::exit(1);
            });

            match format {
                OutputFormat::Json => serialize_json(&summaries),
                OutputFormat::Text => {
                    if summaries.is_empty() {
                        println!("Nothing ingested.");
                    }
                    for summary in &summaries {
                        println!("{}", summary);
                    }
                }
            }
        }

        Commands::Init { db, ingest } => {
            if !db && !ingest {
                log::warn!("Nothing to initialize; pass --db or --ingest");
                return;
            }
            let mut store = open_store(&cli.database);
            let result = if db {
                store.init_schema()
            } else {
                store
                    .recreate_ingest_tables()
                    .and_then(|_| store.ensure_schema())
            };
            result.unwrap_or_else(|e| {
                log::error!("Error initializing database: {}", e);
                process::exit(1);
            });
            println!("Initialized {}", cli.database.display());
        }

        Commands::Config { action } => {
            let mut store = open_store(&cli.database);
            store.ensure_schema().unwrap_or_else(|e| {
                log::error!("Error preparing database: {}", e);
                process::exit(1);
            });
            match action {
                ConfigAction::Dump { format } => {
                    let entries = store.dump_config().unwrap_or_else(|e| {
                        log::error!("Error reading config: {}", e);
                        process::exit(1);
                    });
                    match format {
                        OutputFormat::Json => serialize_json(&entries),
                        OutputFormat::Text => {
                            if entries.is_empty() {
                                println!("No config entries.");
                            }
                            for (name, value) in &entries {
                                println!("{:<32} {}", name, value.as_deref().unwrap_or("-"));
                            }
                        }
                    }
                }
                ConfigAction::Reset => {
                    store.reset_config().unwrap_or_else(|e| {
                        log::error!("Error resetting config: {}", e);
                        process::exit(1);
                    });
                    println!("Config reset.");
                }
            }
        }

        Commands::Providers => {
            for fetcher in PROVIDERS {
                println!("{}", fetcher.name());
            }
        }
    }
}

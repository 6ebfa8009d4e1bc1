use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use fare_master::config::{default_config_path, find_config_file, load_config, write_default_config, Config};
use fare_master::models::{CabinClass, MaxStops, Passengers, SortBy};
use fare_master::ui::{self, SearchSpinner, Status};
use fare_master::{FlightAggregator, PipelineResult, SearchRequest};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Fare Master - Aggregate flight fares, including hidden-city routes, into one AI-written report
#[derive(Parser, Debug)]
#[command(name = "fare-master")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(author = "hongkongkiwi")]
#[command(about = "Aggregate flight fares from multiple search backends into one report", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose logging (can be used multiple times for more verbosity: -v, -vv)
    #[arg(long, short, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(long, short, global = true)]
    quiet: bool,

    /// Output format
    #[arg(long, short, value_enum, global = true, default_value_t = OutputFormat::Auto)]
    output: OutputFormat,

    /// Configuration file path
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Output format for results
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum OutputFormat {
    /// Markdown with a colored summary on a TTY, JSON otherwise
    Auto,
    /// The markdown report only
    Markdown,
    /// The full pipeline result as JSON
    Json,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum Cabin {
    Economy,
    PremiumEconomy,
    Business,
    First,
}

impl From<Cabin> for CabinClass {
    fn from(cabin: Cabin) -> Self {
        match cabin {
            Cabin::Economy => CabinClass::Economy,
            Cabin::PremiumEconomy => CabinClass::PremiumEconomy,
            Cabin::Business => CabinClass::Business,
            Cabin::First => CabinClass::First,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum Stops {
    Any,
    Nonstop,
    One,
    Two,
}

impl From<Stops> for MaxStops {
    fn from(stops: Stops) -> Self {
        match stops {
            Stops::Any => MaxStops::Any,
            Stops::Nonstop => MaxStops::NonStop,
            Stops::One => MaxStops::OneStop,
            Stops::Two => MaxStops::TwoStops,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum Sort {
    Best,
    Price,
    Duration,
    Departure,
    Arrival,
}

impl From<Sort> for SortBy {
    fn from(sort: Sort) -> Self {
        match sort {
            Sort::Best => SortBy::Best,
            Sort::Price => SortBy::Price,
            Sort::Duration => SortBy::Duration,
            Sort::Departure => SortBy::DepartureTime,
            Sort::Arrival => SortBy::ArrivalTime,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Search flights and write a report
    #[command(alias = "s")]
    Search {
        /// Origin airport or city code (e.g. PEK)
        origin: String,

        /// Destination airport or city code (e.g. SHA)
        destination: String,

        /// Departure date (YYYY-MM-DD)
        #[arg(long, short)]
        date: NaiveDate,

        /// Return date for round trips (YYYY-MM-DD)
        #[arg(long, short)]
        return_date: Option<NaiveDate>,

        #[arg(long, default_value_t = 1)]
        adults: u32,

        #[arg(long, default_value_t = 0)]
        children: u32,

        #[arg(long, default_value_t = 0)]
        infants_seat: u32,

        #[arg(long, default_value_t = 0)]
        infants_lap: u32,

        /// Cabin class
        #[arg(long, value_enum, default_value_t = Cabin::Economy)]
        cabin: Cabin,

        /// Maximum number of stops
        #[arg(long, value_enum, default_value_t = Stops::Any)]
        max_stops: Stops,

        /// Result ordering
        #[arg(long, value_enum, default_value_t = Sort::Best)]
        sort: Sort,

        /// Report locale (e.g. en-US, zh-CN)
        #[arg(long)]
        locale: Option<String>,

        /// Price currency (e.g. USD, CNY)
        #[arg(long)]
        currency: Option<String>,

        /// Free-text traveller preferences
        #[arg(long)]
        prefs: Option<String>,

        /// Override the report model
        #[arg(long, short)]
        model: Option<String>,
    },

    /// Manage the configuration file
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },

    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigCommands {
    /// Write the default configuration file
    Init {
        /// Where to write (default: the per-user config path)
        path: Option<PathBuf>,

        /// Overwrite an existing file
        #[arg(long, short)]
        force: bool,
    },

    /// Print the effective configuration
    Show,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing based on verbosity
    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let env_filter = if cli.quiet { "error" } else { log_level };

    let json_layer = cli
        .log_json
        .then(|| tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr));
    let text_layer = (!cli.log_json).then(|| tracing_subscriber::fmt::layer().with_writer(std::io::stderr));

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| format!("fare_master={}", env_filter)),
        ))
        .with(json_layer)
        .with(text_layer)
        .init();

    // Load configuration from file if specified or found in default locations
    let config_path = cli.config.clone().or_else(find_config_file);
    if let Some(path) = &config_path {
        tracing::info!("Using config file: {}", path.display());
    }
    let config = load_config(config_path.as_deref()).context("failed to load configuration")?;

    match cli.command {
        Some(Commands::Search {
            origin,
            destination,
            date,
            return_date,
            adults,
            children,
            infants_seat,
            infants_lap,
            cabin,
            max_stops,
            sort,
            locale,
            currency,
            prefs,
            model,
        }) => {
            if adults == 0 {
                anyhow::bail!("at least one adult passenger is required");
            }
            if return_date.is_some_and(|back| back < date) {
                anyhow::bail!("return date must not be before the departure date");
            }

            let mut request = SearchRequest::new(&origin, &destination, date)
                .passengers(Passengers {
                    adults,
                    children,
                    infants_in_seat: infants_seat,
                    infants_on_lap: infants_lap,
                })
                .cabin(cabin.into())
                .max_stops(max_stops.into())
                .sort_by(sort.into())
                .locale(locale.unwrap_or_else(|| config.report.default_locale.clone()))
                .currency(currency.unwrap_or_else(|| config.report.default_currency.clone()))
                .preferences(prefs.unwrap_or_default());
            if let Some(back) = return_date {
                request = request.return_date(back);
            }

            let mut aggregator = FlightAggregator::from_config(&config)?;
            if let Some(model) = model {
                aggregator = aggregator.primary_model(model);
            }

            let spinner = if ui::stderr_is_terminal() && !cli.quiet {
                SearchSpinner::new(&format!("Searching {} → {}", request.origin, request.destination))
            } else {
                SearchSpinner::hidden()
            };
            let result = aggregator.run(&request).await;
            spinner.finish();

            output_result(&result, cli.output, cli.quiet)?;
            if !result.success {
                std::process::exit(2);
            }
        }

        Some(Commands::Config { command }) => match command {
            ConfigCommands::Init { path, force } => {
                let path = path
                    .or_else(default_config_path)
                    .context("cannot determine a configuration directory; pass a path")?;
                if path.exists() && !force {
                    anyhow::bail!("{} already exists (use --force to overwrite)", path.display());
                }
                write_default_config(&path)?;
                println!("{}", ui::status_line(Status::Success, &format!("Wrote {}", path.display())));
            }
            ConfigCommands::Show => {
                println!("{}", render_config(&config)?);
            }
        },

        Some(Commands::Completions { shell }) => {
            clap_complete::generate(shell, &mut Cli::command(), "fare-master", &mut std::io::stdout());
        }

        None => {
            println!("Fare Master v{}", env!("CARGO_PKG_VERSION"));
            println!();
            println!("Commands:");
            println!("  search <ORIGIN> <DEST> --date YYYY-MM-DD   - Search flights and write a report");
            println!("  config init|show                           - Manage configuration");
            println!("  completions <SHELL>                        - Generate shell completions");
        }
    }

    Ok(())
}

fn output_result(result: &PipelineResult, format: OutputFormat, quiet: bool) -> Result<()> {
    let actual_format = if format == OutputFormat::Auto {
        if ui::is_terminal() {
            OutputFormat::Markdown
        } else {
            OutputFormat::Json
        }
    } else {
        format
    };

    match actual_format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(result)?);
        }
        OutputFormat::Markdown => {
            if format == OutputFormat::Auto && !quiet {
                println!("{}", ui::summary(result));
                println!();
            }
            println!("{}", result.report);
        }
        OutputFormat::Auto => unreachable!(),
    }
    Ok(())
}

/// The effective configuration as TOML, with secrets reduced to whether they are set
fn render_config(config: &Config) -> Result<String> {
    let mut out = toml::to_string_pretty(config)?;
    out.push_str(&format!(
        "\n# models.api_key: {}\n# providers.api_key: {}\n",
        if config.models.api_key.is_some() { "set" } else { "not set" },
        if config.providers.api_key.is_some() { "set" } else { "not set" },
    ));
    Ok(out)
}

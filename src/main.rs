//! # Price Scout CLI (`scout`)
//!
//! Streams one product search across every configured store and renders the
//! per-store status panel and the projected result page.
//!
//! ## Usage
//!
//! ```bash
//! scout --config ./config/scout.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `scout search "<query>"` | Stream a live search and print the result page |
//! | `scout replay <file> "<query>"` | Run a recorded NDJSON stream through the same pipeline |
//! | `scout sources` | List the configured store universe |
//! | `scout subscribe ...` | Register a price-drop alert |
//!
//! ## Examples
//!
//! ```bash
//! # Cheapest first, second page, only Ripley under S/ 300
//! scout search "zapatillas" --sort priceAsc --source ripley --max-price 300 --page 2
//!
//! # Give up after 20 seconds, machine-readable output
//! scout search "televisor 55" --deadline-secs 20 --json
//!
//! # Alert on WhatsApp when a 30% discount appears
//! scout subscribe --product "Laptop" --channel whatsapp --identifier "+51987654321" --discount 30
//! ```

use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use price_scout::progress::ProgressMode;
use price_scout::search::SearchOptions;
use price_scout::{config, search, sources, subscribe};
use price_scout_core::SortOrder;

/// Price Scout CLI: incremental multi-store price search.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. Built-in defaults apply when the file does not exist.
#[derive(Parser)]
#[command(
    name = "scout",
    about = "Price Scout: stream a product search across many stores",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/scout.toml")]
    config: PathBuf,

    /// Log at debug level unless `RUST_LOG` says otherwise.
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Stream a live search and print the projected result page.
    ///
    /// Progress lines go to stderr; the status panel and results go to
    /// stdout. Ctrl-C cancels the search.
    Search {
        /// Product to search for.
        query: String,

        #[command(flatten)]
        view: ViewArgs,

        /// Cancel the search after this many seconds.
        #[arg(long)]
        deadline_secs: Option<u64>,
    },

    /// Replay a recorded NDJSON stream through the full session pipeline.
    Replay {
        /// File holding the raw response body.
        file: PathBuf,

        /// Query text used for recommended ordering.
        query: String,

        #[command(flatten)]
        view: ViewArgs,

        /// Deliver the body in reads of this many bytes.
        #[arg(long, default_value_t = 512)]
        chunk_size: usize,
    },

    /// List the configured stores.
    Sources {
        /// Print JSON instead of a table.
        #[arg(long)]
        json: bool,
    },

    /// Subscribe to a price-drop alert.
    Subscribe {
        /// Product name to watch.
        #[arg(long)]
        product: String,

        /// `whatsapp` or `telegram`.
        #[arg(long)]
        channel: String,

        /// Phone number in international format, or Telegram chat id.
        #[arg(long)]
        identifier: String,

        /// Desired discount, strictly between 0 and 100.
        #[arg(long)]
        discount: f64,
    },
}

/// View flags shared by `search` and `replay`.
#[derive(Args)]
struct ViewArgs {
    /// Ordering: `priceAsc`, `priceDesc`, `discountDesc`, `recommended`, or `none`.
    #[arg(long, default_value = "none")]
    sort: SortOrder,

    /// Only show results from this store.
    #[arg(long)]
    source: Option<String>,

    #[arg(long)]
    min_price: Option<f64>,

    #[arg(long)]
    max_price: Option<f64>,

    /// 1-based result page.
    #[arg(long, default_value_t = 1)]
    page: usize,

    /// Progress output on stderr: `off`, `human`, or `json`.
    /// Defaults to human when stderr is a terminal.
    #[arg(long)]
    progress: Option<ProgressMode>,

    /// Print the session summary and view as JSON.
    #[arg(long)]
    json: bool,
}

impl ViewArgs {
    fn into_options(self, deadline: Option<Duration>) -> SearchOptions {
        SearchOptions {
            sort: self.sort,
            source: self.source,
            min_price: self.min_price,
            max_price: self.max_price,
            page: self.page,
            deadline,
            progress: self.progress.unwrap_or_else(ProgressMode::default_for_tty),
            json: self.json,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose {
        "price_scout=debug,price_scout_core=debug"
    } else {
        "price_scout=info,price_scout_core=info"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cfg = config::load_or_default(&cli.config)?;

    match cli.command {
        Commands::Search {
            query,
            view,
            deadline_secs,
        } => {
            let opts = view.into_options(deadline_secs.map(Duration::from_secs));
            search::run_search(&cfg, &query, &opts).await?;
        }
        Commands::Replay {
            file,
            query,
            view,
            chunk_size,
        } => {
            let opts = view.into_options(None);
            search::run_replay(&cfg, &file, &query, chunk_size, &opts).await?;
        }
        Commands::Sources { json } => {
            sources::list_sources(&cfg, json)?;
        }
        Commands::Subscribe {
            product,
            channel,
            identifier,
            discount,
        } => {
            subscribe::run_subscribe(&cfg, &product, &channel, &identifier, discount).await?;
        }
    }

    Ok(())
}

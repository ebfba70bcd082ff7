//! cartsync CLI - Drive a guest cart on disk and sync it with a cart service.
//!
//! # Usage
//!
//! ```bash
//! # Add two of a product to the guest cart
//! cartsync add 64f0c2a9e1 --quantity 2 --name "Pineapple Soap"
//!
//! # Show the visible cart (server cart when a remote is configured)
//! cartsync show --json
//!
//! # Copy the server cart into the guest cart
//! cartsync pull
//!
//! # Fold the guest cart into the server cart and clear it locally
//! cartsync merge --strategy sum
//! ```
//!
//! # Commands
//!
//! - `show` - Print the visible cart and total quantity
//! - `add` - Add an item to the guest cart
//! - `replace` - Replace the guest cart with items from a JSON file
//! - `clear` - Empty the guest cart
//! - `pull` - Copy the server cart into the guest cart
//! - `merge` - Reconcile the guest cart with the server cart
//!
//! Configuration comes from the environment; see `cartsync_cart::config`.

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::path::PathBuf;

use cartsync_cart::CartConfig;
use clap::{Parser, Subcommand};
use sentry::integrations::tracing as sentry_tracing;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

#[derive(Parser)]
#[command(name = "cartsync")]
#[command(author, version, about = "Guest and server cart tools")]
struct Cli {
    /// Print machine-readable JSON instead of text
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the visible cart
    Show,
    /// Add an item to the guest cart
    Add {
        /// Product identifier
        product_id: String,

        /// Number of units to add
        #[arg(short, long, default_value_t = 1)]
        quantity: u32,

        /// Display name stored with the product
        #[arg(short, long)]
        name: Option<String>,
    },
    /// Replace the guest cart with the line items in a JSON file
    Replace {
        /// File holding a JSON array of line items
        file: PathBuf,
    },
    /// Empty the guest cart
    Clear,
    /// Copy the server cart into the guest cart
    Pull,
    /// Reconcile the guest cart with the server cart
    Merge {
        /// `sum` to add guest quantities to the server cart, `discard` to drop them
        #[arg(short, long, default_value = "sum")]
        strategy: String,
    },
}

/// Initialize Sentry error tracking and return guard that must be kept alive.
fn init_sentry() -> Option<sentry::ClientInitGuard> {
    let dsn = std::env::var("SENTRY_DSN").ok()?;

    let guard = sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            attach_stacktrace: true,
            ..Default::default()
        },
    ));

    tracing::info!("Sentry initialized");
    Some(guard)
}

/// Filter tracing events to Sentry event types.
fn sentry_event_filter(metadata: &tracing::Metadata<'_>) -> sentry_tracing::EventFilter {
    match *metadata.level() {
        tracing::Level::ERROR | tracing::Level::WARN => sentry_tracing::EventFilter::Event,
        tracing::Level::INFO | tracing::Level::DEBUG => sentry_tracing::EventFilter::Breadcrumb,
        _ => sentry_tracing::EventFilter::Ignore,
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();

    // Initialize Sentry (must be done before tracing subscriber)
    let _sentry_guard = init_sentry();

    // Logs go to stderr so command output on stdout stays clean
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "cartsync_cart=info,cartsync_cli=info".into());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(sentry_tracing::layer().event_filter(sentry_event_filter))
        .init();

    let result = match CartConfig::from_env() {
        Ok(config) => run(cli, &config).await,
        Err(e) => Err(e.into()),
    };

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli, config: &CartConfig) -> Result<(), commands::CommandError> {
    let mut cart = commands::open(config)?;
    let json = cli.json;

    match cli.command {
        Commands::Show => commands::cart::show(&cart, json).await?,
        Commands::Add {
            product_id,
            quantity,
            name,
        } => commands::cart::add(&mut cart, &product_id, quantity, name.as_deref(), json)?,
        Commands::Replace { file } => commands::cart::replace(&mut cart, &file, json)?,
        Commands::Clear => commands::cart::clear(&mut cart, json)?,
        Commands::Pull => commands::sync::pull(&mut cart, json).await?,
        Commands::Merge { strategy } => commands::sync::merge(&mut cart, &strategy, json).await?,
    }
    Ok(())
}

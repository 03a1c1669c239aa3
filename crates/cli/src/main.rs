//! Basket CLI - drive the cart engine from a terminal.
//!
//! # Usage
//!
//! ```bash
//! # Show the guest cart
//! basket show
//!
//! # Add two units of product 1
//! basket add 1 --name "Sencha" --price 10.00 -q 2 --stock 5
//!
//! # Sign in (merges the guest cart) and show the server cart
//! basket login
//!
//! # Change a line on the server cart
//! basket --auth set 1 4
//! ```
//!
//! # Environment Variables
//!
//! - `BASKET_API_URL` - Cart API base URL (required)
//! - `BASKET_API_TOKEN` - Bearer token, required for `--auth` and `login`
//! - `BASKET_STORAGE_DIR` - Guest cart directory (default `.basket`)
//! - `SENTRY_DSN` - Sentry DSN (optional)

#![cfg_attr(not(test), forbid(unsafe_code))]

use basket_storefront::BasketConfig;
use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use sentry::integrations::tracing as sentry_tracing;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

#[derive(Parser)]
#[command(name = "basket")]
#[command(author, version, about = "Basket cart client")]
struct Cli {
    /// Operate on the signed-in server cart (needs `BASKET_API_TOKEN`)
    #[arg(long, global = true)]
    auth: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the cart
    Show,
    /// Add a product
    Add {
        /// Product ID
        id: i32,

        /// Product display name
        #[arg(short, long)]
        name: String,

        /// Unit price
        #[arg(short, long)]
        price: Decimal,

        /// Units to add
        #[arg(short, long, default_value_t = 1)]
        quantity: i32,

        /// Known stock level
        #[arg(short, long)]
        stock: Option<i32>,
    },
    /// Set a line to an exact quantity (text as typed)
    Set {
        /// Product ID
        id: i32,
        /// New quantity
        quantity: String,
    },
    /// Change a line by a signed amount
    Bump {
        /// Product ID
        id: i32,
        /// Units to add (negative to take away)
        #[arg(allow_hyphen_values = true)]
        delta: i32,
    },
    /// Remove a line
    Remove {
        /// Product ID
        id: i32,
    },
    /// Empty the cart
    Clear,
    /// Sign in, merging the guest cart into the server cart
    Login,
    /// Show the guest cart kept for signed-out use
    Logout,
    /// Re-run the guest cart merge
    Sync,
}

/// Initialize Sentry error tracking and return guard that must be kept alive.
fn init_sentry(config: &BasketConfig) -> Option<sentry::ClientInitGuard> {
    let dsn = config.sentry_dsn.as_ref()?;

    let guard = sentry::init((
        dsn.as_str(),
        sentry::ClientOptions {
            release: sentry::release_name!(),
            environment: config
                .sentry_environment
                .clone()
                .map(std::borrow::Cow::Owned),
            attach_stacktrace: true,
            ..Default::default()
        },
    ));

    Some(guard)
}

/// Route tracing levels to Sentry: warnings and errors become events,
/// info and debug become breadcrumbs.
fn sentry_event_filter(metadata: &tracing::Metadata<'_>) -> sentry_tracing::EventFilter {
    match *metadata.level() {
        tracing::Level::ERROR | tracing::Level::WARN => sentry_tracing::EventFilter::Event,
        tracing::Level::INFO | tracing::Level::DEBUG => sentry_tracing::EventFilter::Breadcrumb,
        tracing::Level::TRACE => sentry_tracing::EventFilter::Ignore,
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match BasketConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing_subscriber::fmt::init();
            tracing::error!("Configuration error: {e}");
            std::process::exit(2);
        }
    };

    let _sentry_guard = init_sentry(&config);

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "basket_storefront=info,basket_cli=info".into());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(sentry_tracing::layer().event_filter(sentry_event_filter))
        .init();

    if let Err(e) = run(cli, config).await {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli, config: BasketConfig) -> Result<(), commands::CommandError> {
    let signed_in = cli.auth || matches!(cli.command, Commands::Login);
    let session = commands::Session::open(&config, signed_in).await?;

    let mut notices = session.engine().notices();

    let result = match cli.command {
        Commands::Show | Commands::Login | Commands::Logout => Ok(()),
        Commands::Add {
            id,
            name,
            price,
            quantity,
            stock,
        } => commands::cart::add(&session, id, name, price, quantity, stock).await,
        Commands::Set { id, quantity } => commands::cart::set(&session, id, &quantity).await,
        Commands::Bump { id, delta } => commands::cart::bump(&session, id, delta).await,
        Commands::Remove { id } => commands::cart::remove(&session, id).await,
        Commands::Clear => commands::cart::clear(&session).await,
        Commands::Sync => commands::cart::sync(&session).await,
    };

    commands::print_notices(&mut notices);
    result?;

    commands::cart::show(&session)
}

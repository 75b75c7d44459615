//! Dislion CLI - storefront and back-office client.
//!
//! # Usage
//!
//! ```bash
//! # Sign in (password from DISLION_PASSWORD or --password)
//! dislion login -i admin@dislion.co
//!
//! # Browse the catalog
//! dislion products --category Ropa --search camisa
//!
//! # Build a wishlist and hand it off to WhatsApp
//! dislion wishlist add 12 --size 3
//! dislion wishlist quantity 12-3 2
//! dislion contact
//!
//! # Back-office
//! dislion settings set whatsapp_number 573001112233
//! dislion export
//! ```
//!
//! # Commands
//!
//! - `login` / `logout` / `whoami` / `password` - Session management
//! - `products` / `categories` - Catalog listing
//! - `wishlist` - Local wishlist (`list`, `add`, `remove`, `quantity`, `clear`)
//! - `contact` - WhatsApp link for the current wishlist
//! - `settings` - Read and write site settings
//! - `export` - Regenerate the static data export

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use dislion_client::ClientConfig;
use sentry::integrations::tracing as sentry_tracing;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

use commands::{CliError, Context};

#[derive(Parser)]
#[command(name = "dislion")]
#[command(author, version, about = "Dislion storefront client")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign in to the back-office
    Login {
        /// Email or username
        #[arg(short, long)]
        identifier: String,

        /// Password
        #[arg(short, long, env = "DISLION_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Sign out and revoke the stored session
    Logout,
    /// Show the signed-in user
    Whoami,
    /// Change the signed-in user's password
    Password {
        /// Current password
        #[arg(long, env = "DISLION_PASSWORD", hide_env_values = true)]
        current: String,

        /// New password
        #[arg(long, env = "DISLION_NEW_PASSWORD", hide_env_values = true)]
        new: String,
    },
    /// List products
    Products {
        /// Category name ("Todos" for every category)
        #[arg(short, long, default_value = "Todos")]
        category: String,

        /// Case-insensitive name search
        #[arg(short, long, default_value = "")]
        search: String,
    },
    /// List categories
    Categories,
    /// Manage the local wishlist
    Wishlist {
        #[command(subcommand)]
        action: WishlistAction,
    },
    /// Print the WhatsApp link for the current wishlist
    Contact,
    /// Read or write site settings
    Settings {
        #[command(subcommand)]
        action: SettingsAction,
    },
    /// Regenerate the static data export
    Export,
}

#[derive(Subcommand)]
enum WishlistAction {
    /// Show wishlist entries
    List,
    /// Add a product, optionally in one of its sizes
    Add {
        /// Product ID
        product: i32,

        /// Size (variant) ID
        #[arg(short, long)]
        size: Option<i32>,
    },
    /// Remove an entry by key (`12` or `12-3`)
    Remove { key: String },
    /// Set an entry's quantity (values below 1 become 1)
    Quantity {
        key: String,
        #[arg(allow_negative_numbers = true)]
        quantity: i64,
    },
    /// Remove every entry
    Clear,
}

#[derive(Subcommand)]
enum SettingsAction {
    /// Print a setting
    Get { key: String },
    /// Set a setting
    Set { key: String, value: String },
}

/// Initialize Sentry error tracking and return guard that must be kept alive.
fn init_sentry(config: &ClientConfig) -> Option<sentry::ClientInitGuard> {
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

/// Map tracing levels to Sentry: warnings and errors become events, the rest
/// breadcrumbs.
fn sentry_event_filter(metadata: &tracing::Metadata<'_>) -> sentry_tracing::EventFilter {
    match *metadata.level() {
        tracing::Level::ERROR | tracing::Level::WARN => sentry_tracing::EventFilter::Event,
        tracing::Level::INFO | tracing::Level::DEBUG => sentry_tracing::EventFilter::Breadcrumb,
        tracing::Level::TRACE => sentry_tracing::EventFilter::Ignore,
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let config = ClientConfig::from_env();
    let _sentry_guard = config.as_ref().ok().and_then(init_sentry);

    // Defaults to info level for our crates if RUST_LOG is not set
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "dislion_cli=info,dislion_client=info".into());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(sentry_tracing::layer().event_filter(sentry_event_filter))
        .init();

    let cli = Cli::parse();

    let result = match config {
        Ok(config) => run(cli, config).await,
        Err(e) => Err(e.into()),
    };

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}

async fn run(cli: Cli, config: ClientConfig) -> Result<(), CliError> {
    let ctx = Context::open(config)?;

    match cli.command {
        Commands::Login {
            identifier,
            password,
        } => commands::session::login(&ctx, &identifier, password.into()).await?,
        Commands::Logout => commands::session::logout(&ctx).await,
        Commands::Whoami => commands::session::whoami(&ctx),
        Commands::Password { current, new } => {
            commands::session::change_password(&ctx, current.into(), new.into()).await?;
        }
        Commands::Products { category, search } => {
            commands::catalog::products(&ctx, &category, &search).await?;
        }
        Commands::Categories => commands::catalog::categories(&ctx).await?,
        Commands::Wishlist { action } => match action {
            WishlistAction::List => commands::wishlist::list(&ctx),
            WishlistAction::Add { product, size } => {
                commands::wishlist::add(&ctx, product, size).await?;
            }
            WishlistAction::Remove { key } => commands::wishlist::remove(&ctx, &key)?,
            WishlistAction::Quantity { key, quantity } => {
                commands::wishlist::quantity(&ctx, &key, quantity)?;
            }
            WishlistAction::Clear => commands::wishlist::clear(&ctx),
        },
        Commands::Contact => commands::wishlist::contact(&ctx).await,
        Commands::Settings { action } => match action {
            SettingsAction::Get { key } => commands::catalog::get_setting(&ctx, &key).await?,
            SettingsAction::Set { key, value } => {
                commands::catalog::set_setting(&ctx, &key, &value).await?;
            }
        },
        Commands::Export => commands::catalog::export(&ctx).await?,
    }

    ctx.session.dispose();
    Ok(())
}

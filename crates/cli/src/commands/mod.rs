//! CLI command implementations.
//!
//! Each command works on a [`Context`] holding the session, catalog client
//! and wishlist, all persisting into the configured state file.

pub mod catalog;
pub mod session;
pub mod wishlist;

use std::sync::Arc;

use dislion_client::{
    CatalogClient, CatalogError, ClientConfig, ConfigError, FileStore, KeyValueStore,
    ReqwestTransport, SessionError, SessionManager, StorageError, TransportError, WishlistStore,
};
use dislion_core::WishlistKeyError;
use thiserror::Error;

/// Errors surfaced to the user.
#[derive(Debug, Error)]
pub enum CliError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("HTTP client error: {0}")]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    InvalidKey(#[from] WishlistKeyError),

    /// A quantity too large to store.
    #[error("Invalid quantity: {0}")]
    InvalidQuantity(i64),

    /// A referenced product, size or entry does not exist.
    #[error("Not found: {0}")]
    NotFound(String),
}

/// Everything a command needs.
pub struct Context {
    pub config: ClientConfig,
    pub session: SessionManager<ReqwestTransport>,
    pub catalog: CatalogClient<ReqwestTransport>,
    pub wishlist: WishlistStore,
}

impl Context {
    /// Open the state file and build the clients on top of it.
    ///
    /// # Errors
    ///
    /// Returns `CliError` if the state file cannot be read or the HTTP client
    /// cannot be built.
    pub fn open(config: ClientConfig) -> Result<Self, CliError> {
        let storage: Arc<dyn KeyValueStore> = Arc::new(FileStore::open(&config.state_file)?);
        let transport = ReqwestTransport::new(&config)?;

        let session = SessionManager::init(transport, Arc::clone(&storage), &config);
        session.set_expiry_callback(|| {
            tracing::warn!("Session expired, run `dislion login` to sign in again");
        });

        let catalog = CatalogClient::new(session.clone(), &config);
        let wishlist = WishlistStore::load(storage);

        Ok(Self {
            config,
            session,
            catalog,
            wishlist,
        })
    }
}

/// Write a line of command output to stdout.
#[allow(clippy::print_stdout)]
pub fn output(line: impl std::fmt::Display) {
    println!("{line}");
}

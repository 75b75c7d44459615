//! Dislion storefront client library.
//!
//! Client-side state and persistence for the Dislion storefront:
//!
//! - [`session`] - Access/refresh token lifecycle with single-flight refresh
//! - [`wishlist`] - Deduplicated, persisted, observable wishlist
//! - [`catalog`] - Products, categories, settings and export
//! - [`contact`] - WhatsApp hand-off link for the wishlist
//! - [`storage`] - Durable key-value storage port
//! - [`transport`] - HTTP transport port and its `reqwest` implementation
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use dislion_client::{ClientConfig, FileStore, ReqwestTransport, SessionManager, WishlistStore};
//!
//! let config = ClientConfig::from_env()?;
//! let storage = Arc::new(FileStore::open(&config.state_file)?);
//! let session = SessionManager::init(ReqwestTransport::new(&config)?, storage.clone(), &config);
//! let wishlist = WishlistStore::load(storage);
//!
//! session.sign_in("admin@dislion.co", &password).await?;
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod catalog;
pub mod config;
pub mod contact;
pub mod session;
pub mod storage;
pub mod transport;
pub mod wishlist;

pub use catalog::{CatalogClient, CatalogError, StorefrontSettings};
pub use config::{ClientConfig, ConfigError};
pub use contact::whatsapp_link;
pub use session::{SessionError, SessionManager, TokenPair};
pub use storage::{FileStore, KeyValueStore, MemoryStore, StorageError};
pub use transport::{ApiRequest, ApiResponse, HttpTransport, ReqwestTransport, TransportError};
pub use wishlist::WishlistStore;

//! Dislion Core - Shared domain types.
//!
//! This crate provides the types shared by the Dislion storefront client
//! components:
//! - `client` - Session, wishlist and catalog client library
//! - `cli` - Command-line front end
//!
//! # Architecture
//!
//! The core crate contains only types and pure functions - no I/O, no
//! storage access, no HTTP clients. This keeps it lightweight and allows it
//! to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype IDs, prices, users, wishlist entries and catalog records

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;

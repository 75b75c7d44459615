//! Core types for Dislion.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod catalog;
pub mod id;
pub mod price;
pub mod user;
pub mod wishlist;

pub use catalog::{
    CATEGORY_ALL_LABEL, Category, CategoryFilter, CategoryRef, Product, ProductSize,
    filter_products,
};
pub use id::*;
pub use price::{Price, PriceError};
pub use user::{Role, UserRecord};
pub use wishlist::{SelectedVariant, WishlistItem, WishlistItemInput, WishlistKey, WishlistKeyError};

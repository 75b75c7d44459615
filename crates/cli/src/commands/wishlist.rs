//! Wishlist and contact commands.
//!
//! The wishlist lives in the local state file; only `add` and `contact`
//! reach the backend.

use dislion_client::whatsapp_link;
use dislion_core::{ProductId, VariantId, WishlistKey};

use super::{CliError, Context, output};

pub fn list(ctx: &Context) {
    let items = ctx.wishlist.snapshot();
    if items.is_empty() {
        output("Wishlist is empty");
        return;
    }
    for item in &items {
        output(format_args!(
            "{:<8} {:<40} x{:<3} {}",
            item.unique_key.as_str(),
            item.label(),
            item.quantity,
            item.price.format_cop()
        ));
    }
    output(format_args!(
        "{} entries, {} units",
        items.len(),
        ctx.wishlist.total_quantity()
    ));
}

/// Add a catalog product, optionally in one of its sizes.
pub async fn add(ctx: &Context, product: i32, size: Option<i32>) -> Result<(), CliError> {
    let product_id = ProductId::new(product);
    let variant_id = size.map(VariantId::new);

    let products = ctx.catalog.list_products().await?;
    let product = products
        .iter()
        .find(|p| p.id == product_id)
        .ok_or_else(|| CliError::NotFound(format!("product {product_id}")))?;
    let input = product.wishlist_input(variant_id).ok_or_else(|| {
        CliError::NotFound(format!(
            "size {} of product {product_id}",
            size.unwrap_or_default()
        ))
    })?;

    let key = input.unique_key();
    if ctx.wishlist.add(input) {
        output(format_args!("Added {key}"));
    } else {
        output(format_args!("{key} is already in the wishlist"));
    }
    Ok(())
}

pub fn remove(ctx: &Context, key: &str) -> Result<(), CliError> {
    let key: WishlistKey = key.parse()?;
    if !ctx.wishlist.remove(&key) {
        return Err(CliError::NotFound(format!("wishlist entry {key}")));
    }
    output(format_args!("Removed {key}"));
    Ok(())
}

pub fn quantity(ctx: &Context, key: &str, quantity: i64) -> Result<(), CliError> {
    let key: WishlistKey = key.parse()?;
    let quantity = quantity_floor(quantity)?;
    if !ctx.wishlist.update_quantity(&key, quantity) {
        return Err(CliError::NotFound(format!("wishlist entry {key}")));
    }
    output(format_args!("{key} quantity set to {quantity}"));
    Ok(())
}

/// Values below 1 become 1; values past `u32::MAX` are refused.
fn quantity_floor(quantity: i64) -> Result<u32, CliError> {
    u32::try_from(quantity.max(1)).map_err(|_| CliError::InvalidQuantity(quantity))
}

pub fn clear(ctx: &Context) {
    ctx.wishlist.clear();
    output("Wishlist cleared");
}

/// Print the WhatsApp link for the current wishlist.
pub async fn contact(ctx: &Context) {
    let settings = ctx.catalog.storefront_settings().await;
    output(whatsapp_link(
        &settings.whatsapp_number,
        &ctx.wishlist.snapshot(),
    ));
}

//! WhatsApp hand-off for the wishlist.
//!
//! The storefront has no checkout. The visitor sends the wishlist to the shop
//! through a `wa.me` link with a prefilled message.

use dislion_core::WishlistItem;

const WHATSAPP_BASE_URL: &str = "https://wa.me/";
const GREETING: &str = "Hola, me interesan estos productos:";

/// Strip the formatting characters people type into phone numbers.
#[must_use]
pub fn clean_number(number: &str) -> String {
    number
        .chars()
        .filter(|c| !c.is_whitespace() && !matches!(c, '-' | '(' | ')'))
        .collect()
}

/// The prefilled message: a greeting, then the item labels separated by commas.
///
/// Quantities are not part of the message.
#[must_use]
pub fn contact_message(items: &[WishlistItem]) -> String {
    if items.is_empty() {
        return GREETING.to_string();
    }
    let labels: Vec<String> = items.iter().map(WishlistItem::label).collect();
    format!("{GREETING}\n{}", labels.join(", "))
}

/// `https://wa.me/<number>?text=<message>` for the given wishlist.
#[must_use]
pub fn whatsapp_link(number: &str, items: &[WishlistItem]) -> String {
    format!(
        "{WHATSAPP_BASE_URL}{}?text={}",
        clean_number(number),
        urlencoding::encode(&contact_message(items))
    )
}

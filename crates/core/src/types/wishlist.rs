//! Wishlist entries.
//!
//! A visitor can mark a product, or a specific size of a product, as
//! interesting. Entries are identified by a [`WishlistKey`] so that the same
//! product picked in two sizes yields two distinct entries.
//!
//! The JSON shape here is the durable `wishlist` format: camelCase, with the
//! product ID stored as `id` and the chosen variant as `selectedSize`.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::id::{ProductId, VariantId};
use super::price::Price;

/// Error parsing a wishlist key.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid wishlist key: {0:?}")]
pub struct WishlistKeyError(String);

/// Composite identity of a wishlist entry.
///
/// `"{productId}"` when no variant is selected, `"{productId}-{variantId}"`
/// otherwise.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WishlistKey(String);

impl WishlistKey {
    /// Derive the key for a product and optional variant.
    #[must_use]
    pub fn derive(product_id: ProductId, variant_id: Option<VariantId>) -> Self {
        match variant_id {
            Some(variant_id) => Self(format!("{product_id}-{variant_id}")),
            None => Self(product_id.to_string()),
        }
    }

    /// Split the key back into its product and optional variant.
    ///
    /// # Errors
    ///
    /// Returns `WishlistKeyError` if either part is not an integer.
    pub fn parts(&self) -> Result<(ProductId, Option<VariantId>), WishlistKeyError> {
        split_key(&self.0).ok_or_else(|| WishlistKeyError(self.0.clone()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for WishlistKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for WishlistKey {
    type Err = WishlistKeyError;

    /// Parse either key form. The result is rebuilt from its IDs, so `"012"`
    /// and `"+12"` both become `"12"` and match the stored entry.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = s.trim();
        let (product_id, variant_id) =
            split_key(raw).ok_or_else(|| WishlistKeyError(raw.to_string()))?;
        Ok(Self::derive(product_id, variant_id))
    }
}

fn split_key(raw: &str) -> Option<(ProductId, Option<VariantId>)> {
    // Each part is a non-empty, non-negative integer
    fn part<I: FromStr>(text: &str) -> Option<I> {
        if text.is_empty() || text.starts_with('-') || text.trim() != text {
            return None;
        }
        text.parse().ok()
    }

    match raw.split_once('-') {
        Some((product, variant)) => Some((part(product)?, Some(part(variant)?))),
        None => Some((part(raw)?, None)),
    }
}

/// The size/variant chosen when the entry was added.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectedVariant {
    pub id: VariantId,
    pub size: String,
    pub price: Price,
    #[serde(default)]
    pub image: Option<String>,
}

/// What a UI surface hands to the wishlist store on "add to wishlist".
#[derive(Debug, Clone, PartialEq)]
pub struct WishlistItemInput {
    pub product_id: ProductId,
    pub name: String,
    pub image: Option<String>,
    pub category: String,
    /// Base product price.
    pub price: Price,
    pub selected_variant: Option<SelectedVariant>,
}

impl WishlistItemInput {
    /// The key this input will be stored under.
    #[must_use]
    pub fn unique_key(&self) -> WishlistKey {
        WishlistKey::derive(
            self.product_id,
            self.selected_variant.as_ref().map(|v| v.id),
        )
    }

    /// Variant price if a variant was selected, else the base price.
    #[must_use]
    pub fn effective_price(&self) -> Price {
        self.selected_variant
            .as_ref()
            .map_or(self.price, |variant| variant.price)
    }

    /// Snapshot this input into a new wishlist entry with quantity 1.
    #[must_use]
    pub fn into_item(self) -> WishlistItem {
        WishlistItem {
            unique_key: self.unique_key(),
            price: self.effective_price(),
            product_id: self.product_id,
            name: self.name,
            image: self.image,
            category: self.category,
            selected_size: self.selected_variant,
            quantity: 1,
        }
    }
}

/// A stored wishlist entry.
///
/// Display fields are a snapshot taken at add-time and are never refreshed
/// from the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "StoredWishlistItem")]
pub struct WishlistItem {
    #[serde(rename = "id")]
    pub product_id: ProductId,
    pub name: String,
    pub image: Option<String>,
    pub category: String,
    pub price: Price,
    pub selected_size: Option<SelectedVariant>,
    pub unique_key: WishlistKey,
    pub quantity: u32,
}

impl WishlistItem {
    #[must_use]
    pub fn variant_id(&self) -> Option<VariantId> {
        self.selected_size.as_ref().map(|v| v.id)
    }

    /// Name shown in the contact message: `"Name"` or `"Name (size)"`.
    #[must_use]
    pub fn label(&self) -> String {
        match &self.selected_size {
            Some(variant) if !variant.size.trim().is_empty() => {
                format!("{} ({})", self.name, variant.size.trim())
            }
            _ => self.name.clone(),
        }
    }
}

/// Accepts both stored generations: entries written before quantities
/// existed, and entries written before keys included the variant.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredWishlistItem {
    id: ProductId,
    #[serde(default)]
    name: String,
    #[serde(default)]
    image: Option<String>,
    #[serde(default)]
    category: String,
    #[serde(default)]
    price: Price,
    #[serde(default)]
    selected_size: Option<SelectedVariant>,
    #[serde(default)]
    unique_key: Option<WishlistKey>,
    #[serde(default)]
    quantity: Option<u32>,
}

impl From<StoredWishlistItem> for WishlistItem {
    fn from(stored: StoredWishlistItem) -> Self {
        let unique_key = stored.unique_key.unwrap_or_else(|| {
            WishlistKey::derive(stored.id, stored.selected_size.as_ref().map(|v| v.id))
        });

        Self {
            product_id: stored.id,
            name: stored.name,
            image: stored.image,
            category: stored.category,
            price: stored.price,
            selected_size: stored.selected_size,
            unique_key,
            quantity: stored.quantity.unwrap_or(1).max(1),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn shirt(variant: Option<SelectedVariant>) -> WishlistItemInput {
        WishlistItemInput {
            product_id: ProductId::new(12),
            name: "Camisa".to_string(),
            image: Some("/images/camisa.jpg".to_string()),
            category: "Ropa".to_string(),
            price: Price::from_pesos(50_000),
            selected_variant: variant,
        }
    }

    fn large() -> SelectedVariant {
        SelectedVariant {
            id: VariantId::new(3),
            size: "L".to_string(),
            price: Price::from_pesos(55_000),
            image: None,
        }
    }

    #[test]
    fn test_key_derivation() {
        assert_eq!(shirt(None).unique_key().as_str(), "12");
        assert_eq!(shirt(Some(large())).unique_key().as_str(), "12-3");
        assert_ne!(shirt(None).unique_key(), shirt(Some(large())).unique_key());
    }

    #[test]
    fn test_key_parts() {
        let key: WishlistKey = "12-3".parse().unwrap();
        assert_eq!(
            key.parts().unwrap(),
            (ProductId::new(12), Some(VariantId::new(3)))
        );

        let key: WishlistKey = "12".parse().unwrap();
        assert_eq!(key.parts().unwrap(), (ProductId::new(12), None));

        assert!("12-x".parse::<WishlistKey>().is_err());
        assert!("".parse::<WishlistKey>().is_err());
    }

    #[test]
    fn test_parsed_key_is_canonical() {
        for (raw, canonical) in [("+12", "12"), ("012", "12"), (" 12-+3 ", "12-3"), ("12-03", "12-3")] {
            let key: WishlistKey = raw.parse().unwrap();
            assert_eq!(key.as_str(), canonical);
        }
        assert_eq!("+12".parse::<WishlistKey>().unwrap(), shirt(None).unique_key());

        for raw in ["12--3", "-12", "12-", "-", "12-3-4", "12 -3"] {
            assert!(raw.parse::<WishlistKey>().is_err(), "{raw} should be rejected");
        }
    }

    #[test]
    fn test_effective_price_uses_variant() {
        assert_eq!(shirt(None).into_item().price, Price::from_pesos(50_000));
        assert_eq!(
            shirt(Some(large())).into_item().price,
            Price::from_pesos(55_000)
        );
    }

    #[test]
    fn test_item_json_shape() {
        let item = shirt(Some(large())).into_item();
        let json = serde_json::to_value(&item).unwrap();

        assert_eq!(json["id"], 12);
        assert_eq!(json["uniqueKey"], "12-3");
        assert_eq!(json["selectedSize"]["size"], "L");
        assert_eq!(json["quantity"], 1);
    }

    #[test]
    fn test_legacy_item_without_quantity_or_key() {
        let raw = r#"{"id":5,"name":"Gorra","image":null,"price":20000,"category":"Accesorios"}"#;
        let item: WishlistItem = serde_json::from_str(raw).unwrap();

        assert_eq!(item.quantity, 1);
        assert_eq!(item.unique_key.as_str(), "5");
        assert_eq!(item.price, Price::from_pesos(20_000));
    }

    #[test]
    fn test_zero_quantity_is_lifted_to_one() {
        let raw = r#"{"id":5,"name":"Gorra","price":1,"category":"","uniqueKey":"5","quantity":0}"#;
        let item: WishlistItem = serde_json::from_str(raw).unwrap();
        assert_eq!(item.quantity, 1);
    }

    #[test]
    fn test_label_includes_size() {
        assert_eq!(shirt(Some(large())).into_item().label(), "Camisa (L)");
        assert_eq!(shirt(None).into_item().label(), "Camisa");
    }
}

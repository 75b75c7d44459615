//! Catalog records and storefront filtering.

use serde::{Deserialize, Serialize};

use super::id::{CategoryId, ProductId, VariantId};
use super::price::Price;
use super::wishlist::{SelectedVariant, WishlistItemInput};

/// Label of the pseudo-category that matches every product.
pub const CATEGORY_ALL_LABEL: &str = "Todos";

/// A product category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// The category a product belongs to, as embedded in product payloads.
///
/// Depending on the endpoint the backend sends either the bare category name
/// or the category object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CategoryRef {
    Named(String),
    Detailed { id: CategoryId, name: String },
}

impl CategoryRef {
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Named(name) | Self::Detailed { name, .. } => name,
        }
    }
}

/// A purchasable size of a product with its own price.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductSize {
    pub id: VariantId,
    pub size: String,
    pub price: Price,
    #[serde(default)]
    pub image: Option<String>,
}

/// A catalog product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub price: Price,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub category_id: Option<CategoryId>,
    #[serde(default)]
    pub category: Option<CategoryRef>,
    #[serde(default)]
    pub sizes: Vec<ProductSize>,
    #[serde(default)]
    pub display_order: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active: Option<bool>,
}

impl Product {
    /// Category name, or an empty string for uncategorized products.
    #[must_use]
    pub fn category_name(&self) -> &str {
        self.category.as_ref().map_or("", CategoryRef::name)
    }

    #[must_use]
    pub fn size(&self, variant_id: VariantId) -> Option<&ProductSize> {
        self.sizes.iter().find(|s| s.id == variant_id)
    }

    /// Build the wishlist input for this product, optionally in one of its sizes.
    ///
    /// Returns `None` if `variant_id` does not name one of this product's sizes.
    #[must_use]
    pub fn wishlist_input(&self, variant_id: Option<VariantId>) -> Option<WishlistItemInput> {
        let selected_variant = match variant_id {
            Some(id) => {
                let size = self.size(id)?;
                Some(SelectedVariant {
                    id: size.id,
                    size: size.size.clone(),
                    price: size.price,
                    image: size.image.clone(),
                })
            }
            None => None,
        };

        Some(WishlistItemInput {
            product_id: self.id,
            name: self.name.clone(),
            image: selected_variant
                .as_ref()
                .and_then(|v| v.image.clone())
                .or_else(|| self.image.clone()),
            category: self.category_name().to_string(),
            price: self.price,
            selected_variant,
        })
    }
}

/// Category selection on the storefront.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum CategoryFilter {
    #[default]
    All,
    Named(String),
}

impl CategoryFilter {
    /// Parse a UI label; `"Todos"` (any case) selects every category.
    #[must_use]
    pub fn from_label(label: &str) -> Self {
        if label.trim().eq_ignore_ascii_case(CATEGORY_ALL_LABEL) || label.trim().is_empty() {
            Self::All
        } else {
            Self::Named(label.trim().to_string())
        }
    }

    #[must_use]
    pub fn matches(&self, product: &Product) -> bool {
        match self {
            Self::All => true,
            Self::Named(name) => product.category_name() == name,
        }
    }
}

/// Products matching both the category filter and the name search, in order.
///
/// The search is a case-insensitive substring match on the product name; an
/// empty search matches everything.
#[must_use]
pub fn filter_products<'a>(
    products: &'a [Product],
    filter: &CategoryFilter,
    search: &str,
) -> Vec<&'a Product> {
    let needle = search.to_lowercase();
    products
        .iter()
        .filter(|p| filter.matches(p) && p.name.to_lowercase().contains(&needle))
        .collect()
}

//! Catalog and back-office API client.
//!
//! Every call goes through [`SessionManager::request`], so admin operations
//! get the same refresh-and-retry handling as any other call.
//!
//! Product and category lists are cached with `moka` for the configured TTL.
//! Any successful mutation invalidates the whole cache.

use std::sync::Arc;

use moka::future::Cache;
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use dislion_core::{Category, CategoryId, Price, Product, ProductId, VariantId};

use crate::config::ClientConfig;
use crate::session::{SessionError, SessionManager};
use crate::transport::{ApiRequest, ApiResponse, HttpTransport, StatusCode};

/// Setting holding the shop's WhatsApp number.
pub const WHATSAPP_NUMBER_SETTING: &str = "whatsapp_number";

/// Setting controlling whether prices are shown on the storefront.
pub const SHOW_PRICES_SETTING: &str = "show_prices";

/// Errors from catalog calls.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error(transparent)]
    Session(SessionError),

    /// The backend answered with a non-2xx status.
    #[error("API error ({status}): {message}")]
    Api { status: StatusCode, message: String },

    #[error("Unexpected response body: {0}")]
    Decode(#[from] serde_json::Error),
}

impl From<SessionError> for CatalogError {
    fn from(error: SessionError) -> Self {
        match error {
            SessionError::Api { status, message } => Self::Api { status, message },
            SessionError::Decode(e) => Self::Decode(e),
            other => Self::Session(other),
        }
    }
}

// =============================================================================
// Request bodies
// =============================================================================

/// A new product.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewProduct {
    pub name: String,
    pub description: String,
    pub price: Price,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category_id: Option<CategoryId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

/// Partial product update; only the fields that are set are sent.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductChanges {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<Price>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category_id: Option<CategoryId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_order: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active: Option<bool>,
}

/// A new size for an existing product.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewProductSize {
    pub product_id: ProductId,
    pub size: String,
    pub price: Price,
    pub image: Option<String>,
}

/// Category fields for create and update.
#[derive(Debug, Clone, Serialize)]
pub struct CategoryDraft {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Deserialize)]
struct Created<I> {
    id: I,
}

#[derive(Deserialize)]
struct SettingBody {
    #[serde(default)]
    value: serde_json::Value,
}

/// Public storefront settings with their fallbacks applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorefrontSettings {
    pub whatsapp_number: String,
    pub show_prices: bool,
}

// =============================================================================
// Cache
// =============================================================================

#[derive(Debug, Clone, Hash, PartialEq, Eq)]
enum CacheKey {
    Products,
    Categories,
}

#[derive(Debug, Clone)]
enum CacheValue {
    Products(Arc<Vec<Product>>),
    Categories(Arc<Vec<Category>>),
}

// =============================================================================
// CatalogClient
// =============================================================================

/// Client for products, categories, settings and export.
pub struct CatalogClient<T> {
    inner: Arc<CatalogClientInner<T>>,
}

struct CatalogClientInner<T> {
    session: SessionManager<T>,
    cache: Cache<CacheKey, CacheValue>,
    whatsapp_fallback: String,
}

impl<T> Clone for CatalogClient<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: HttpTransport> CatalogClient<T> {
    #[must_use]
    pub fn new(session: SessionManager<T>, config: &ClientConfig) -> Self {
        let cache = Cache::builder()
            .max_capacity(16)
            .time_to_live(config.catalog_cache_ttl)
            .build();

        Self {
            inner: Arc::new(CatalogClientInner {
                session,
                cache,
                whatsapp_fallback: config.whatsapp_fallback.clone(),
            }),
        }
    }

    /// The session every call is issued through.
    #[must_use]
    pub fn session(&self) -> &SessionManager<T> {
        &self.inner.session
    }

    async fn call(&self, request: ApiRequest) -> Result<ApiResponse, CatalogError> {
        Ok(self.inner.session.send(request).await?)
    }

    /// Run a mutation and drop every cached read if it succeeded.
    async fn mutate(&self, request: ApiRequest) -> Result<ApiResponse, CatalogError> {
        let response = self.call(request).await?;
        self.invalidate_cache().await;
        Ok(response)
    }

    // =========================================================================
    // Products
    // =========================================================================

    /// All products, in backend order.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError` if the call fails or the body is not a product list.
    #[instrument(skip(self))]
    pub async fn list_products(&self) -> Result<Arc<Vec<Product>>, CatalogError> {
        if let Some(CacheValue::Products(products)) = self.inner.cache.get(&CacheKey::Products).await
        {
            debug!("Cache hit for products");
            return Ok(products);
        }

        let products: Arc<Vec<Product>> =
            Arc::new(self.inner.session.get_json("/api/products").await?);
        self.inner
            .cache
            .insert(CacheKey::Products, CacheValue::Products(Arc::clone(&products)))
            .await;
        Ok(products)
    }

    /// Create a product and return its ID.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::Api` with the backend's message if it refuses.
    #[instrument(skip_all, fields(name = %product.name))]
    pub async fn create_product(&self, product: &NewProduct) -> Result<ProductId, CatalogError> {
        let request = ApiRequest::post("/api/products").json(serde_json::to_value(product)?);
        let created: Created<ProductId> = self.mutate(request).await?.json()?;
        info!(product_id = %created.id, "Product created");
        Ok(created.id)
    }

    /// Apply `changes` to a product.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::Api` with the backend's message if it refuses.
    #[instrument(skip(self, changes))]
    pub async fn update_product(
        &self,
        id: ProductId,
        changes: &ProductChanges,
    ) -> Result<(), CatalogError> {
        let request =
            ApiRequest::put(format!("/api/products/{id}")).json(serde_json::to_value(changes)?);
        self.mutate(request).await?;
        Ok(())
    }

    /// Delete a product.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::Api` with the backend's message if it refuses.
    #[instrument(skip(self))]
    pub async fn delete_product(&self, id: ProductId) -> Result<(), CatalogError> {
        self.mutate(ApiRequest::delete(format!("/api/products/{id}")))
            .await?;
        info!("Product deleted");
        Ok(())
    }

    /// Add a size to a product and return the new size's ID.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::Api` with the backend's message if it refuses.
    #[instrument(skip_all, fields(product_id = %size.product_id, size = %size.size))]
    pub async fn create_product_size(
        &self,
        size: &NewProductSize,
    ) -> Result<VariantId, CatalogError> {
        let request = ApiRequest::post("/api/product-sizes").json(serde_json::to_value(size)?);
        let created: Created<VariantId> = self.mutate(request).await?.json()?;
        Ok(created.id)
    }

    /// Persist a new display order: each product's `displayOrder` becomes its
    /// index in `ids`.
    ///
    /// Updates are sent one at a time and stop at the first failure; the
    /// cache is invalidated either way.
    ///
    /// # Errors
    ///
    /// Returns the first failing update's error.
    #[instrument(skip_all, fields(count = ids.len()))]
    pub async fn reorder_products(&self, ids: &[ProductId]) -> Result<(), CatalogError> {
        let mut result = Ok(());
        for (index, id) in ids.iter().enumerate() {
            let request = ApiRequest::put(format!("/api/products/{id}"))
                .json(json!({ "displayOrder": index }));
            if let Err(e) = self.call(request).await {
                warn!(product_id = %id, error = %e, "Reorder stopped");
                result = Err(e);
                break;
            }
        }
        self.invalidate_cache().await;
        result
    }

    // =========================================================================
    // Categories
    // =========================================================================

    /// All categories.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError` if the call fails or the body is not a category list.
    #[instrument(skip(self))]
    pub async fn list_categories(&self) -> Result<Arc<Vec<Category>>, CatalogError> {
        if let Some(CacheValue::Categories(categories)) =
            self.inner.cache.get(&CacheKey::Categories).await
        {
            debug!("Cache hit for categories");
            return Ok(categories);
        }

        let categories: Arc<Vec<Category>> =
            Arc::new(self.inner.session.get_json("/api/categories").await?);
        self.inner
            .cache
            .insert(
                CacheKey::Categories,
                CacheValue::Categories(Arc::clone(&categories)),
            )
            .await;
        Ok(categories)
    }

    /// Create a category.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::Api` with the backend's message if it refuses.
    #[instrument(skip_all, fields(name = %category.name))]
    pub async fn create_category(&self, category: &CategoryDraft) -> Result<Category, CatalogError> {
        let draft = CategoryDraft {
            name: category.name.trim().to_string(),
            description: category.description.clone(),
        };
        let request = ApiRequest::post("/api/categories").json(serde_json::to_value(&draft)?);
        Ok(self.mutate(request).await?.json()?)
    }

    /// Rename or re-describe a category.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::Api` with the backend's message if it refuses.
    #[instrument(skip(self, category))]
    pub async fn update_category(
        &self,
        id: CategoryId,
        category: &CategoryDraft,
    ) -> Result<(), CatalogError> {
        let request = ApiRequest::put(format!("/api/categories/{id}"))
            .json(serde_json::to_value(category)?);
        self.mutate(request).await?;
        Ok(())
    }

    // =========================================================================
    // Settings & export
    // =========================================================================

    /// Read a site setting. `None` if it is unset.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError` for failures other than 404.
    #[instrument(skip(self))]
    pub async fn get_setting(&self, key: &str) -> Result<Option<String>, CatalogError> {
        let path = format!("/api/settings/{key}");
        match self.inner.session.get_json::<SettingBody>(&path).await {
            Ok(body) => Ok(setting_text(body.value)),
            Err(SessionError::Api { status, .. }) if status == StatusCode::NOT_FOUND => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Write a site setting.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::Api` with the backend's message if it refuses.
    #[instrument(skip(self, value))]
    pub async fn set_setting(&self, key: &str, value: &str) -> Result<(), CatalogError> {
        let request =
            ApiRequest::put(format!("/api/settings/{key}")).json(json!({ "value": value }));
        self.mutate(request).await?;
        info!("Setting saved");
        Ok(())
    }

    /// Contact number and price visibility, falling back to defaults when the
    /// backend has no value or cannot be reached.
    pub async fn storefront_settings(&self) -> StorefrontSettings {
        let whatsapp_number = match self.get_setting(WHATSAPP_NUMBER_SETTING).await {
            Ok(Some(number)) if !number.trim().is_empty() => number,
            Ok(_) => self.inner.whatsapp_fallback.clone(),
            Err(e) => {
                warn!(error = %e, "Failed to load WhatsApp number, using fallback");
                self.inner.whatsapp_fallback.clone()
            }
        };

        let show_prices = match self.get_setting(SHOW_PRICES_SETTING).await {
            Ok(Some(value)) => value == "true",
            Ok(None) => true,
            Err(e) => {
                warn!(error = %e, "Failed to load price visibility, showing prices");
                true
            }
        };

        StorefrontSettings {
            whatsapp_number,
            show_prices,
        }
    }

    /// Ask the backend to regenerate the static data export.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::Api` with the backend's message if it refuses.
    #[instrument(skip(self))]
    pub async fn export(&self) -> Result<serde_json::Value, CatalogError> {
        let response = self.call(ApiRequest::post("/api/export")).await?;
        info!("Data exported");
        if response.text().trim().is_empty() {
            return Ok(serde_json::Value::Null);
        }
        Ok(response.json()?)
    }

    /// Drop every cached read.
    pub async fn invalidate_cache(&self) {
        self.inner.cache.invalidate_all();
        self.inner.cache.run_pending_tasks().await;
    }
}

/// Settings arrive as strings or as bare JSON scalars.
fn setting_text(value: serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::Null => None,
        serde_json::Value::String(text) => Some(text),
        other => Some(other.to_string()),
    }
}

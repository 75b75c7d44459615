//! Integration tests for the catalog client.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use dislion_client::catalog::{CategoryDraft, NewProduct, NewProductSize, ProductChanges};
use dislion_client::session::endpoints;
use dislion_client::transport::{Method, StatusCode};
use dislion_client::{CatalogClient, CatalogError, MemoryStore, TokenPair};
use dislion_core::{
    CategoryFilter, CategoryId, Price, ProductId, Role, UserId, UserRecord, VariantId,
    filter_products,
};
use dislion_integration_tests::{Reply, ScriptedTransport, session, test_config};
use secrecy::ExposeSecret;
use serde_json::json;

fn products_body() -> serde_json::Value {
    json!([
        { "id": 1, "name": "Camisa Azul", "price": 50000, "category": { "id": 1, "name": "Ropa" }, "displayOrder": 0 },
        { "id": 2, "name": "Gorra Negra", "price": 20000, "category": { "id": 2, "name": "Accesorios" }, "displayOrder": 1 },
        { "id": 3, "name": "Camiseta Blanca", "price": 30000, "category": { "id": 1, "name": "Ropa" }, "displayOrder": 2 }
    ])
}

/// A backend with a product list, a category list and a few settings.
fn backend() -> ScriptedTransport {
    ScriptedTransport::new(|request| match (request.method().as_str(), request.path()) {
        ("GET", "/api/products") => Reply::ok(products_body()),
        ("GET", "/api/categories") => {
            Reply::ok(json!([{ "id": 1, "name": "Ropa" }, { "id": 2, "name": "Accesorios" }]))
        }
        ("POST", "/api/products") => Reply::ok(json!({ "id": 9, "name": "Nuevo" })),
        ("POST", "/api/product-sizes") => Reply::ok(json!({ "id": 40 })),
        ("POST", "/api/categories") => {
            if request.body().unwrap()["name"] == "" {
                Reply::error(StatusCode::BAD_REQUEST, "El nombre es requerido")
            } else {
                Reply::ok(json!({ "id": 3, "name": request.body().unwrap()["name"] }))
            }
        }
        ("GET", "/api/settings/whatsapp_number") => {
            Reply::ok(json!({ "key": "whatsapp_number", "value": "573001112233" }))
        }
        ("GET", "/api/settings/show_prices") => Reply::ok(json!({ "value": false })),
        ("GET", _) => Reply::error(StatusCode::NOT_FOUND, "Setting not found"),
        ("POST", "/api/export") => Reply::ok(json!({ "products": 3 })),
        _ => Reply::ok(json!({})),
    })
}

fn client(transport: &ScriptedTransport) -> CatalogClient<ScriptedTransport> {
    let session = session(transport, Arc::new(MemoryStore::new()));
    session.login(
        TokenPair::new("A1", "R1"),
        UserRecord::new(UserId::new(1), Role::Admin),
    );
    CatalogClient::new(session, &test_config())
}

// =============================================================================
// Caching
// =============================================================================

#[tokio::test]
async fn test_product_list_is_cached_until_mutation() {
    let transport = backend();
    let catalog = client(&transport);

    let first = catalog.list_products().await.unwrap();
    let second = catalog.list_products().await.unwrap();
    assert_eq!(first.len(), 3);
    assert_eq!(first, second);
    assert_eq!(transport.count("/api/products"), 1);

    let id = catalog
        .create_product(&NewProduct {
            name: "Nuevo".to_string(),
            description: "Producto nuevo".to_string(),
            price: Price::from_pesos(10_000),
            category_id: Some(CategoryId::new(1)),
            image: None,
        })
        .await
        .unwrap();
    assert_eq!(id, ProductId::new(9));

    catalog.list_products().await.unwrap();
    // One GET, one POST, one GET again
    assert_eq!(transport.count("/api/products"), 3);
}

#[tokio::test]
async fn test_failed_mutation_keeps_cache() {
    let transport = backend();
    let catalog = client(&transport);

    catalog.list_categories().await.unwrap();
    let result = catalog
        .create_category(&CategoryDraft {
            name: "  ".to_string(),
            description: None,
        })
        .await;

    assert!(
        matches!(result, Err(CatalogError::Api { status, message })
            if status == StatusCode::BAD_REQUEST && message == "El nombre es requerido")
    );
    catalog.list_categories().await.unwrap();
    assert_eq!(transport.count("/api/categories"), 2);
}

#[tokio::test]
async fn test_listing_filters_by_category_and_search() {
    let transport = backend();
    let catalog = client(&transport);
    let products = catalog.list_products().await.unwrap();

    let ropa = filter_products(&products, &CategoryFilter::from_label("Ropa"), "cami");
    let names: Vec<&str> = ropa.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, vec!["Camisa Azul", "Camiseta Blanca"]);

    let all = filter_products(&products, &CategoryFilter::from_label("todos"), "");
    assert_eq!(all.len(), 3);
}

// =============================================================================
// Mutations
// =============================================================================

#[tokio::test]
async fn test_reorder_sends_sequential_display_orders() {
    let transport = backend();
    let catalog = client(&transport);

    catalog
        .reorder_products(&[ProductId::new(3), ProductId::new(1), ProductId::new(2)])
        .await
        .unwrap();

    let updates: Vec<(String, serde_json::Value)> = transport
        .requests()
        .into_iter()
        .filter(|r| *r.method() == Method::PUT)
        .map(|r| (r.path().to_string(), r.body().unwrap()["displayOrder"].clone()))
        .collect();
    assert_eq!(
        updates,
        vec![
            ("/api/products/3".to_string(), json!(0)),
            ("/api/products/1".to_string(), json!(1)),
            ("/api/products/2".to_string(), json!(2)),
        ]
    );
}

#[tokio::test]
async fn test_update_sends_only_changed_fields() {
    let transport = backend();
    let catalog = client(&transport);

    catalog
        .update_product(
            ProductId::new(2),
            &ProductChanges {
                price: Some(Price::from_pesos(22_000)),
                ..ProductChanges::default()
            },
        )
        .await
        .unwrap();

    let request = transport.requests().pop().unwrap();
    assert_eq!(request.path(), "/api/products/2");
    assert_eq!(request.body().unwrap(), &json!({ "price": 22000.0 }));
    assert_eq!(request.bearer().unwrap().expose_secret(), "A1");
}

#[tokio::test]
async fn test_create_product_size_posts_to_sizes() {
    let transport = backend();
    let catalog = client(&transport);

    let id = catalog
        .create_product_size(&NewProductSize {
            product_id: ProductId::new(2),
            size: "XL".to_string(),
            price: Price::from_pesos(25_000),
            image: None,
        })
        .await
        .unwrap();

    assert_eq!(id, VariantId::new(40));
    let request = transport.requests().pop().unwrap();
    assert_eq!(*request.method(), Method::POST);
    assert_eq!(request.path(), "/api/product-sizes");
    assert_eq!(
        request.body().unwrap(),
        &json!({ "productId": 2, "size": "XL", "price": 25000.0, "image": null })
    );
}

#[tokio::test]
async fn test_update_category_puts_and_invalidates() {
    let transport = backend();
    let catalog = client(&transport);
    catalog.list_categories().await.unwrap();

    catalog
        .update_category(
            CategoryId::new(2),
            &CategoryDraft {
                name: "Complementos".to_string(),
                description: Some("Gorras y bolsos".to_string()),
            },
        )
        .await
        .unwrap();

    let request = transport.requests().pop().unwrap();
    assert_eq!(*request.method(), Method::PUT);
    assert_eq!(request.path(), "/api/categories/2");
    assert_eq!(
        request.body().unwrap(),
        &json!({ "name": "Complementos", "description": "Gorras y bolsos" })
    );

    catalog.list_categories().await.unwrap();
    assert_eq!(transport.count("/api/categories"), 2);
}

#[tokio::test]
async fn test_admin_call_survives_token_expiry() {
    let refreshed = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&refreshed);
    let transport = ScriptedTransport::new(move |request| {
        if request.path() == endpoints::REFRESH {
            flag.store(true, Ordering::SeqCst);
            return Reply::ok(json!({ "accessToken": "A2", "refreshToken": "R2" }));
        }
        if request.bearer().map(|t| t.expose_secret().to_string()).as_deref() == Some("A2") {
            Reply::ok(json!({ "ok": true }))
        } else {
            Reply::error(StatusCode::UNAUTHORIZED, "jwt expired")
        }
    });
    let catalog = client(&transport);

    catalog.delete_product(ProductId::new(2)).await.unwrap();

    assert!(refreshed.load(Ordering::SeqCst));
    assert_eq!(transport.count("/api/products/2"), 2);
}

// =============================================================================
// Settings & Export
// =============================================================================

#[tokio::test]
async fn test_storefront_settings_from_backend() {
    let transport = backend();
    let catalog = client(&transport);

    let settings = catalog.storefront_settings().await;

    assert_eq!(settings.whatsapp_number, "573001112233");
    assert!(!settings.show_prices);
}

#[tokio::test]
async fn test_storefront_settings_fall_back() {
    let transport = ScriptedTransport::new(|_| Reply::Fail);
    let catalog = client(&transport);

    let settings = catalog.storefront_settings().await;

    assert_eq!(settings.whatsapp_number, "573007571199");
    assert!(settings.show_prices);
}

#[tokio::test]
async fn test_missing_setting_is_none() {
    let transport = backend();
    let catalog = client(&transport);

    assert_eq!(catalog.get_setting("contact_email").await.unwrap(), None);
}

#[tokio::test]
async fn test_set_setting_and_export() {
    let transport = backend();
    let catalog = client(&transport);

    catalog.set_setting("show_prices", "true").await.unwrap();
    let export = catalog.export().await.unwrap();

    let put = transport
        .requests()
        .into_iter()
        .find(|r| *r.method() == Method::PUT)
        .unwrap();
    assert_eq!(put.path(), "/api/settings/show_prices");
    assert_eq!(put.body().unwrap(), &json!({ "value": "true" }));
    assert_eq!(export["products"], 3);
}

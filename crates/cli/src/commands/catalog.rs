//! Catalog and back-office commands.

use dislion_core::{CategoryFilter, filter_products};

use super::{CliError, Context, output};

/// List products matching a category label and a name search.
pub async fn products(ctx: &Context, category: &str, search: &str) -> Result<(), CliError> {
    let products = ctx.catalog.list_products().await?;
    let settings = ctx.catalog.storefront_settings().await;
    let filter = CategoryFilter::from_label(category);

    let matches = filter_products(&products, &filter, search);
    if matches.is_empty() {
        output("No products found");
        return Ok(());
    }

    for product in matches {
        let price = if settings.show_prices {
            product.price.format_cop()
        } else {
            String::new()
        };
        output(format_args!(
            "{:>5}  {:<32} {:>12}  {}",
            product.id.as_i32(),
            product.name,
            price,
            product.category_name()
        ));
        for size in &product.sizes {
            let price = if settings.show_prices {
                size.price.format_cop()
            } else {
                String::new()
            };
            output(format_args!(
                "{:>5}-{:<4} {:<24} {:>12}",
                product.id.as_i32(),
                size.id.as_i32(),
                size.size,
                price
            ));
        }
    }
    Ok(())
}

pub async fn categories(ctx: &Context) -> Result<(), CliError> {
    for category in ctx.catalog.list_categories().await?.iter() {
        output(format_args!(
            "{:>5}  {:<24} {}",
            category.id.as_i32(),
            category.name,
            category.description.as_deref().unwrap_or("")
        ));
    }
    Ok(())
}

pub async fn get_setting(ctx: &Context, key: &str) -> Result<(), CliError> {
    match ctx.catalog.get_setting(key).await? {
        Some(value) => output(value),
        None => output(format_args!("{key} is not set")),
    }
    Ok(())
}

/// Save a setting and regenerate the export so the storefront picks it up.
pub async fn set_setting(ctx: &Context, key: &str, value: &str) -> Result<(), CliError> {
    ctx.catalog.set_setting(key, value).await?;
    output(format_args!("{key} saved"));
    if let Err(e) = ctx.catalog.export().await {
        tracing::warn!(error = %e, "Setting saved but export failed");
    }
    Ok(())
}

pub async fn export(ctx: &Context) -> Result<(), CliError> {
    ctx.catalog.export().await?;
    output("Export regenerated");
    Ok(())
}

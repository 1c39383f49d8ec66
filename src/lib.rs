//! Shelf storefront application library
//!
//! Catalog aggregation, currency conversion, the session cart and hosted
//! checkout, packaged as modules for the shelf kernel.

pub mod modules;
pub mod services;
pub mod session;
pub mod utils;

#[cfg(test)]
mod test_support;

use std::sync::Arc;

use shelf_kernel::{settings::Settings, InitCtx, ModuleRegistry};

pub use services::AppServices;

/// Registry with every storefront module registered against `services`
pub fn build_registry(services: &Arc<AppServices>) -> ModuleRegistry {
    let mut registry = ModuleRegistry::new();
    modules::register_all(&mut registry, services);
    registry
}

/// Build services and modules, run the HTTP server until shutdown, then stop modules
pub async fn serve(settings: &Settings) -> anyhow::Result<()> {
    let services = AppServices::from_settings(settings)?;
    let registry = build_registry(&services);
    let ctx = InitCtx { settings };

    registry.init_modules(&ctx).await?;
    registry.start_modules(&ctx).await?;
    tracing::info!(modules = registry.module_count(), "storefront modules started");

    let served = shelf_http::start_server(&registry, settings).await;
    registry.stop_modules().await?;
    served
}

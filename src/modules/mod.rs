pub mod auth;
pub mod cart;
pub mod catalog;
pub mod checkout;
pub mod currency;

use std::sync::Arc;

use shelf_kernel::ModuleRegistry;

use crate::services::AppServices;

/// Register every storefront module with the registry, in mount order
pub fn register_all(registry: &mut ModuleRegistry, services: &Arc<AppServices>) {
    registry.register(Arc::new(catalog::CatalogModule::new(services.clone())));
    registry.register(Arc::new(currency::CurrencyModule::new(services.clone())));
    registry.register(Arc::new(cart::CartModule::new(services.clone())));
    registry.register(Arc::new(checkout::CheckoutModule::new(services.clone())));
    registry.register(Arc::new(auth::AuthModule::new(services.clone())));
}

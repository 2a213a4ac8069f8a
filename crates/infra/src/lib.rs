//! Infrastructure layer: stores, collaborator ports, checkout orchestration
//! and configuration.

pub mod checkout;
pub mod config;
pub mod error;
pub mod ledger;
pub mod ports;
pub mod shipping;
pub mod stock_service;
pub mod store;


pub use checkout::{
    CheckoutDeps, CheckoutError, CouponValidator, ErrorBody, ErrorKind, OrderOrchestrator, PhysicalSaleOrchestrator,
};
pub use config::{CheckoutConfig, CommerceConfig, ConfigError, DatabaseConfig};
pub use error::{CommitError, StoreError};
pub use ledger::StockLedger;
pub use ports::{CartStore, CouponStore, PickupPointDirectory, ProductCatalog, StoreSettingsDirectory};
pub use shipping::{ShippingCostResolver, ShippingError, StaticShippingResolver};
pub use stock_service::StockService;
pub use store::{InMemoryCommerceStore, OrderCommit, OrderStore, PostgresCommerceStore};

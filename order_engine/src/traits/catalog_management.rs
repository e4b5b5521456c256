use thiserror::Error;

use crate::{
    db_types::{CartLine, CatalogItem, Sku, StockLevel, StockMovement},
    helpers::is_transient,
};

/// The most of one SKU that a single cart line can hold.
pub const MAX_CART_QUANTITY: i64 = 10_000;

#[derive(Debug, Clone, Error)]
pub enum CatalogError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    /// The database is busy or unreachable. Retrying later may succeed.
    #[error("The database is temporarily unavailable: {0}")]
    StoreUnavailable(String),
    #[error("SKU {0} is not in the catalog")]
    SkuNotFound(Sku),
    #[error("Quantity must be between 0 and {MAX_CART_QUANTITY}, but was {0}")]
    InvalidQuantity(i64),
    #[error("Stock for {sku} cannot go below zero. Available: {available}, requested change: {delta}")]
    NegativeStock { sku: Sku, available: i64, delta: i64 },
}

impl From<sqlx::Error> for CatalogError {
    fn from(e: sqlx::Error) -> Self {
        if is_transient(&e) {
            CatalogError::StoreUnavailable(e.to_string())
        } else {
            CatalogError::DatabaseError(e.to_string())
        }
    }
}

/// Catalog reads, cart maintenance and manual stock control.
///
/// Catalog rows belong to the catalog service. [`Self::upsert_catalog_item`] exists so that the catalog feed (and test
/// fixtures) can publish prices into the engine's store.
#[allow(async_fn_in_trait)]
pub trait CatalogManagement {
    async fn upsert_catalog_item(&self, item: CatalogItem) -> Result<CatalogItem, CatalogError>;

    /// Fetches the catalog rows for the given SKUs. Unknown SKUs are simply absent from the result.
    async fn fetch_catalog_items(&self, skus: &[Sku]) -> Result<Vec<CatalogItem>, CatalogError>;

    async fn fetch_cart(&self, owner_id: &str) -> Result<Vec<CartLine>, CatalogError>;

    /// Sets the quantity of `sku` in the owner's cart. A quantity of zero removes the line.
    /// Returns the updated cart.
    async fn set_cart_quantity(&self, owner_id: &str, sku: &Sku, quantity: i64)
        -> Result<Vec<CartLine>, CatalogError>;

    /// Fetches the live stock levels for the given SKUs. SKUs without a ledger entry are absent from the result.
    async fn fetch_stock_levels(&self, skus: &[Sku]) -> Result<Vec<StockLevel>, CatalogError>;

    /// Applies a signed manual correction to the ledger. The change is journalled as an `Adjustment`.
    /// The ledger can never go negative; such a change is rejected with [`CatalogError::NegativeStock`].
    async fn adjust_stock(&self, sku: &Sku, delta: i64, note: Option<String>) -> Result<StockLevel, CatalogError>;

    async fn fetch_stock_movements(&self, sku: &Sku) -> Result<Vec<StockMovement>, CatalogError>;
}

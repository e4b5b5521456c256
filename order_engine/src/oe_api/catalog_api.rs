use std::fmt::Debug;

use log::*;

use crate::{
    db_types::{CartLine, CatalogItem, Sku, StockLevel, StockMovement},
    traits::{CatalogError, CatalogManagement, MAX_CART_QUANTITY},
};

/// Cart maintenance and stock administration.
pub struct CatalogApi<B> {
    db: B,
}

impl<B> Debug for CatalogApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "CatalogApi")
    }
}

impl<B> CatalogApi<B> {
    pub fn new(db: B) -> Self {
        Self { db }
    }
}

impl<B> CatalogApi<B>
where B: CatalogManagement
{
    pub async fn publish_item(&self, item: CatalogItem) -> Result<CatalogItem, CatalogError> {
        debug!("🛒 Publishing {} at {} {}", item.sku, item.unit_price, item.currency);
        self.db.upsert_catalog_item(item).await
    }

    pub async fn fetch_cart(&self, owner_id: &str) -> Result<Vec<CartLine>, CatalogError> {
        self.db.fetch_cart(owner_id).await
    }

    /// Sets the quantity of `sku` in the owner's cart, returning the whole cart. Zero removes the line.
    ///
    /// Only catalog items can be added. Stock is not checked here; that happens at checkout.
    pub async fn set_cart_quantity(
        &self,
        owner_id: &str,
        sku: &Sku,
        quantity: i64,
    ) -> Result<Vec<CartLine>, CatalogError> {
        if !(0..=MAX_CART_QUANTITY).contains(&quantity) {
            return Err(CatalogError::InvalidQuantity(quantity));
        }
        if quantity > 0 && self.db.fetch_catalog_items(std::slice::from_ref(sku)).await?.is_empty() {
            return Err(CatalogError::SkuNotFound(sku.clone()));
        }
        self.db.set_cart_quantity(owner_id, sku, quantity).await
    }

    /// The live level for `sku`. A SKU that is in the catalog but has never been stocked reports zero.
    pub async fn stock_level(&self, sku: &Sku) -> Result<StockLevel, CatalogError> {
        let skus = std::slice::from_ref(sku);
        if let Some(level) = self.db.fetch_stock_levels(skus).await?.pop() {
            return Ok(level);
        }
        match self.db.fetch_catalog_items(skus).await?.pop() {
            Some(_) => Ok(StockLevel { sku: sku.clone(), available: 0, updated_at: chrono::Utc::now() }),
            None => Err(CatalogError::SkuNotFound(sku.clone())),
        }
    }

    pub async fn adjust_stock(&self, sku: &Sku, delta: i64, note: Option<String>) -> Result<StockLevel, CatalogError> {
        if self.db.fetch_catalog_items(std::slice::from_ref(sku)).await?.is_empty() {
            return Err(CatalogError::SkuNotFound(sku.clone()));
        }
        self.db.adjust_stock(sku, delta, note).await
    }

    pub async fn stock_movements(&self, sku: &Sku) -> Result<Vec<StockMovement>, CatalogError> {
        self.db.fetch_stock_movements(sku).await
    }
}

use std::path::Path;

use log::*;
use sqlx::{migrate::MigrateDatabase, Sqlite};

use crate::{
    db_types::{CatalogItem, Money, Sku},
    traits::CatalogManagement,
    SqliteDatabase,
};

pub async fn prepare_test_env(url: &str) {
    dotenvy::from_filename(".env.test").ok();
    let _ = env_logger::try_init();
    debug!("🚀️ Logging initialised");
    create_database(url).await;
    run_migrations(url).await;
}

pub fn random_db_path() -> String {
    format!("sqlite://../data/test_store_{}.db", rand::random::<u64>())
}

pub async fn run_migrations(url: &str) {
    let db = SqliteDatabase::new_with_url(url, 1).await.expect("Error creating connection to database");
    db.migrate().await.expect("Error running DB migrations");
    db.close().await;
    info!("🚀️ Migrations complete");
}

pub async fn create_database<P: AsRef<Path>>(path: P) {
    let p = path.as_ref().as_os_str().to_str().expect("Database path is not valid UTF-8");
    if let Some(dir) = p.strip_prefix("sqlite://").and_then(|f| Path::new(f).parent()) {
        let _ = std::fs::create_dir_all(dir);
    }
    if let Err(e) = Sqlite::drop_database(p).await {
        warn!("Error dropping database {p}: {e:?}");
    }
    Sqlite::create_database(p).await.expect("Error creating database");
    info!("Created Sqlite database {p}");
}

pub async fn drop_database(url: &str) {
    if let Err(e) = Sqlite::drop_database(url).await {
        warn!("Error dropping database {url}: {e:?}");
    }
}

/// Publishes a catalog item and sets its stock level.
pub async fn seed_item(db: &SqliteDatabase, product_id: &str, vendor_id: &str, price: i64, stock: i64) -> Sku {
    let item = CatalogItem::new(product_id, None, vendor_id, &format!("Product {product_id}"), Money::from(price));
    let item = db.upsert_catalog_item(item).await.expect("Error seeding catalog");
    if stock != 0 {
        db.adjust_stock(&item.sku, stock, Some("seed".into())).await.expect("Error seeding stock");
    }
    item.sku
}

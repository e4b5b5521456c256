use std::{collections::HashMap, fmt::Debug};

use cucumber::World;
use order_engine::db_types::{Order, Payment, Sku};

use crate::support::TestSystem;

#[derive(Default, World)]
pub struct MarketWorld {
    pub system: Option<TestSystem>,
    /// SKUs by product name
    pub skus: HashMap<String, Sku>,
    /// The most recent order of each customer
    pub orders: HashMap<String, Order>,
    /// The most recent payment of each customer
    pub payments: HashMap<String, Payment>,
    pub last_error: Option<String>,
}

impl Debug for MarketWorld {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MarketWorld")
            .field("db", &self.system.as_ref().map(|s| s.url.as_str()))
            .field("skus", &self.skus)
            .field("orders", &self.orders.len())
            .field("last_error", &self.last_error)
            .finish()
    }
}

impl MarketWorld {
    pub fn system(&self) -> &TestSystem {
        self.system.as_ref().expect("Marketplace not initialised")
    }

    pub fn sku(&self, product: &str) -> Sku {
        self.skus.get(product).cloned().unwrap_or_else(|| panic!("No product called {product}"))
    }

    pub fn order(&self, customer: &str) -> &Order {
        self.orders.get(customer).unwrap_or_else(|| panic!("{customer} has not placed an order"))
    }

    pub fn payment(&self, customer: &str) -> &Payment {
        self.payments.get(customer).unwrap_or_else(|| panic!("{customer} has not started a payment"))
    }
}

//! Shared fixtures for integration tests.

#![allow(dead_code)]

use serde::{Deserialize, Serialize};
use serde_json::json;

use dataaccess::prelude::*;

/// Customer row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Customer {
    pub id: i64,
    pub name: String,
    pub city: Option<String>,
    pub credit: f64,
}

impl Entity for Customer {
    type Key = i64;
    const NAME: &'static str = "Customer";
    const TABLE: &'static str = "customers";
    const KEY_COLUMN: &'static str = "id";

    fn key(&self) -> i64 {
        self.id
    }
}

/// Row of the `CustomerOrders` procedure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomerOrdersResult {
    pub order_id: i64,
    pub customer_id: i64,
    pub total: f64,
}

impl Entity for CustomerOrdersResult {
    type Key = i64;
    const NAME: &'static str = "CustomerOrders_Result";
    const TABLE: &'static str = "customer_orders";
    const KEY_COLUMN: &'static str = "order_id";

    fn key(&self) -> i64 {
        self.order_id
    }
}

pub fn customer(id: i64, name: &str, city: Option<&str>, credit: f64) -> Customer {
    Customer {
        id,
        name: name.to_string(),
        city: city.map(str::to_string),
        credit,
    }
}

/// Five customers, one without a city.
pub fn customers() -> Vec<Customer> {
    vec![
        customer(1, "Ada", Some("London"), 120.0),
        customer(2, "Grace", Some("New York"), 80.5),
        customer(3, "Alan", Some("London"), 42.0),
        customer(4, "Edsger", None, 300.0),
        customer(5, "Barbara", Some("Boston"), 75.0),
    ]
}

/// A store holding [`customers`] and a few orders.
pub async fn seeded_store() -> MemoryStore {
    let store = MemoryStore::new();
    store
        .insert_rows(
            Customer::TABLE,
            customers()
                .iter()
                .map(|c| serde_json::to_value(c).expect("customer row")),
        )
        .await;
    store
        .insert_rows(
            CustomerOrdersResult::TABLE,
            [
                json!({ "order_id": 10, "customer_id": 1, "total": 19.5 }),
                json!({ "order_id": 11, "customer_id": 1, "total": 5.0 }),
                json!({ "order_id": 12, "customer_id": 3, "total": 99.0 }),
            ],
        )
        .await;
    store
}

pub fn customer_repository(store: &MemoryStore) -> GenericRepository<Customer, MemoryContext> {
    GenericRepository::new(MemoryContext::new(store))
}

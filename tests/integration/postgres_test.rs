//! Repository behavior against a live PostgreSQL database.
//!
//! Run with `--features integration` and `DATAACCESS_TEST_DATABASE_URL`
//! pointing at a database the tests may create schemas in. Every test works
//! in its own throwaway schema.

#![cfg(feature = "integration")]

mod helpers;

use sqlx::PgPool;
use uuid::Uuid;

use dataaccess::prelude::*;
use helpers::{Customer, CustomerOrdersResult, customer, customers};

struct TestDatabase {
    pool: DatabasePool,
    schema: String,
}

impl TestDatabase {
    async fn new() -> Self {
        let url = std::env::var("DATAACCESS_TEST_DATABASE_URL")
            .expect("DATAACCESS_TEST_DATABASE_URL must be set");
        let mut config = DatabaseConfig::new(url);
        config.min_connections = 0;
        config.max_connections = 4;

        let pool = DatabasePool::connect(&config)
            .await
            .expect("Failed to connect to test database");
        let schema = format!("dataaccess_test_{}", Uuid::new_v4().simple());

        let db = Self { pool, schema };
        db.setup().await;
        db
    }

    fn raw(&self) -> &PgPool {
        self.pool.pool()
    }

    async fn execute(&self, statement: &str) {
        sqlx::query(statement)
            .execute(self.raw())
            .await
            .unwrap_or_else(|e| panic!("Failed to run '{statement}': {e}"));
    }

    async fn setup(&self) {
        let s = &self.schema;
        self.execute(&format!("CREATE SCHEMA {s}")).await;
        self.execute(&format!(
            "CREATE TABLE {s}.customers (
                id BIGINT PRIMARY KEY,
                name TEXT NOT NULL,
                city TEXT,
                credit DOUBLE PRECISION NOT NULL
            )"
        ))
        .await;
        self.execute(&format!(
            "CREATE TABLE {s}.customer_orders (
                order_id BIGINT PRIMARY KEY,
                customer_id BIGINT NOT NULL REFERENCES {s}.customers (id),
                total DOUBLE PRECISION NOT NULL
            )"
        ))
        .await;
        self.execute(&format!(
            "CREATE FUNCTION {s}.customer_orders_for(p_customer BIGINT)
             RETURNS SETOF {s}.customer_orders
             LANGUAGE sql AS $$
                SELECT * FROM {s}.customer_orders WHERE customer_id = p_customer ORDER BY order_id
             $$"
        ))
        .await;
        self.execute(&format!(
            "CREATE PROCEDURE {s}.purge_orders(p_customer BIGINT)
             LANGUAGE sql AS $$
                DELETE FROM {s}.customer_orders WHERE customer_id = p_customer
             $$"
        ))
        .await;

        for c in customers() {
            sqlx::query(&format!(
                "INSERT INTO {s}.customers (id, name, city, credit) VALUES ($1, $2, $3, $4)"
            ))
            .bind(c.id)
            .bind(&c.name)
            .bind(&c.city)
            .bind(c.credit)
            .execute(self.raw())
            .await
            .expect("seed customer");
        }
        self.execute(&format!(
            "INSERT INTO {s}.customer_orders VALUES (10, 1, 19.5), (11, 1, 5.0), (12, 3, 99.0)"
        ))
        .await;
    }

    fn context(&self) -> PgContext {
        PgContext::new(&self.pool).with_schema(self.schema.clone())
    }

    fn customers(&self) -> GenericRepository<Customer, PgContext> {
        GenericRepository::new(self.context())
    }

    async fn teardown(self) {
        self.execute(&format!("DROP SCHEMA {} CASCADE", self.schema))
            .await;
        self.pool.close().await;
    }
}

#[tokio::test]
async fn test_health_check() {
    let db = TestDatabase::new().await;
    assert!(db.pool.health_check().await.unwrap());
    db.teardown().await;
}

#[tokio::test]
async fn test_insert_save_and_get_by_id() {
    let db = TestDatabase::new().await;
    let mut repo = db.customers();

    let linus = customer(6, "Linus", Some("Helsinki"), 10.25);
    repo.insert(linus.clone()).unwrap();
    assert_eq!(repo.save_async().await.unwrap(), 1);

    let mut fresh = db.customers();
    assert_eq!(fresh.get_by_id(&6).await.unwrap(), Some(linus));
    assert_eq!(fresh.get_by_id(&404).await.unwrap(), None);

    drop((repo, fresh));
    db.teardown().await;
}

#[tokio::test]
async fn test_count_matches_get_for_filters() {
    let db = TestDatabase::new().await;
    let repo = db.customers();

    let filters = [
        None,
        Some(Filter::eq("city", "London")),
        Some(Filter::eq("city", "London").not()),
        Some(Filter::ilike("name", "a%")),
        Some(Filter::is_in("city", ["Boston", "New York"])),
        Some(Filter::is_null("city").or(Filter::gte("credit", 100))),
    ];
    for filter in filters {
        let options = match filter.clone() {
            Some(f) => QueryOptions::new().filter(f),
            None => QueryOptions::new(),
        };
        let rows: Vec<Customer> = repo.get(Projection::all(), options).await.unwrap();
        assert_eq!(
            repo.get_count(filter.as_ref()).await.unwrap(),
            rows.len() as u64,
            "{filter:?}"
        );
    }

    drop(repo);
    db.teardown().await;
}

#[tokio::test]
async fn test_projection_ordering_and_paging() {
    #[derive(Debug, PartialEq, serde::Deserialize)]
    struct Label {
        id: i64,
        label: String,
    }

    let db = TestDatabase::new().await;
    let repo = db.customers();

    let page: Vec<Label> = repo
        .get(
            Projection::all().column("id").column_as("name", "label"),
            QueryOptions::new()
                .order_by(SortField::asc("label"))
                .page(2, 2),
        )
        .await
        .unwrap();
    let labels: Vec<&str> = page.iter().map(|l| l.label.as_str()).collect();
    assert_eq!(labels, vec!["Barbara", "Edsger"]);

    let first: Vec<Label> = repo
        .get(
            Projection::all().column("id").column_as("name", "label"),
            QueryOptions::new()
                .order_by(SortField::asc("label"))
                .page_size(2),
        )
        .await
        .unwrap();
    assert_eq!(first[0].label, "Ada");
    assert_eq!(first.len(), 2);

    drop(repo);
    db.teardown().await;
}

#[tokio::test]
async fn test_update_and_delete_commit_atomically() {
    let db = TestDatabase::new().await;
    let mut repo = db.customers();

    let mut ada = repo.get_by_id(&1).await.unwrap().unwrap();
    ada.credit = 1.0;
    repo.update(ada.clone()).unwrap();
    repo.delete(customer(99, "Ghost", None, 0.0)).unwrap();

    // The ghost delete matches nothing, so the whole commit rolls back.
    let err = repo.save_async().await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::Conflict);

    let mut fresh = db.customers();
    assert_eq!(fresh.get_by_id(&1).await.unwrap().unwrap().credit, 120.0);

    drop((repo, fresh));
    db.teardown().await;
}

#[tokio::test]
async fn test_constraint_violation_is_database_error() {
    let db = TestDatabase::new().await;
    let mut repo = db.customers();

    repo.delete_by_id(&1).await.unwrap();
    let err = repo.save_async().await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::Database);

    drop(repo);
    db.teardown().await;
}

#[tokio::test]
async fn test_stored_procedures() {
    let db = TestDatabase::new().await;

    let mut procedures = ProcedureRegistry::new();
    procedures
        .register_for::<CustomerOrdersResult>(
            set_returning_function(format!("{}.customer_orders_for", db.schema)).unwrap(),
        )
        .unwrap();
    procedures
        .register("PurgeOrders", stored_procedure(format!("{}.purge_orders", db.schema)).unwrap())
        .unwrap();
    procedures
        .register("Missing", set_returning_function(format!("{}.nope", db.schema)).unwrap())
        .unwrap();

    let context = db.context().with_procedures(procedures);
    let repo: GenericRepository<CustomerOrdersResult, PgContext> = GenericRepository::new(context);

    let totals = repo
        .execute_stored_proc(
            |orders| orders.into_iter().map(|o| o.total),
            vec![SqlValue::Integer(1)],
        )
        .await
        .unwrap();
    assert_eq!(totals, ProcedureOutcome::Rows(vec![19.5, 5.0]));

    let empty = repo
        .execute_stored_proc(|orders| orders, vec![SqlValue::Integer(2)])
        .await
        .unwrap();
    assert_eq!(empty, ProcedureOutcome::Rows(vec![]));

    let context = repo.context().unwrap();
    let purged = context
        .call_procedure("PurgeOrders", vec![SqlValue::Integer(1)])
        .await
        .unwrap();
    assert!(purged.is_no_result());

    let missing = context
        .call_procedure("Missing", vec![])
        .await
        .unwrap_err();
    assert_eq!(missing.kind, ErrorKind::ProcedureDispatch);

    drop(repo);
    db.teardown().await;
}

#[tokio::test]
async fn test_owned_pool_is_closed_on_dispose() {
    let db = TestDatabase::new().await;
    let url = std::env::var("DATAACCESS_TEST_DATABASE_URL").unwrap();
    let mut config = DatabaseConfig::new(url);
    config.min_connections = 0;
    config.schema = Some(db.schema.clone());

    let context = PgContext::connect(&config).await.unwrap();
    let mut repo: GenericRepository<Customer, PgContext> = GenericRepository::new(context);
    assert_eq!(repo.get_count(None).await.unwrap(), 5);

    repo.dispose_async().await;
    repo.dispose_async().await;
    assert_eq!(
        repo.get_count(None).await.unwrap_err().kind,
        ErrorKind::Disposed
    );

    db.teardown().await;
}

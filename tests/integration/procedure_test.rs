//! Stored-procedure dispatch through the repository.

mod helpers;

use serde_json::Value;

use dataaccess::prelude::*;
use helpers::{CustomerOrdersResult, seeded_store};

fn registry() -> ProcedureRegistry<MemoryStore> {
    let mut procedures = ProcedureRegistry::new();

    procedures
        .register_fn("CustomerOrders", |store: MemoryStore, params| async move {
            let customer_id = match params.first() {
                Some(SqlValue::Integer(id)) => *id,
                _ => return Err(AppError::validation("CustomerOrders expects a customer id")),
            };
            let rows: Vec<Value> = store
                .rows(CustomerOrdersResult::TABLE)
                .await?
                .into_iter()
                .filter(|row| row.get("customer_id") == Some(&Value::from(customer_id)))
                .collect();
            Ok(ProcedureOutcome::Rows(rows))
        })
        .expect("register CustomerOrders");

    procedures
        .register_fn("ArchiveOrders", |_: MemoryStore, _| async move {
            Ok::<_, AppError>(ProcedureOutcome::<Value>::NoResult)
        })
        .expect("register ArchiveOrders");

    procedures
}

/// Result entity whose procedure only ever signals "no result".
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
struct ArchiveOrdersResult {
    order_id: i64,
}

impl Entity for ArchiveOrdersResult {
    type Key = i64;
    const NAME: &'static str = "ArchiveOrders_Result";
    const TABLE: &'static str = "customer_orders";
    const KEY_COLUMN: &'static str = "order_id";

    fn key(&self) -> i64 {
        self.order_id
    }
}

async fn orders_repository() -> GenericRepository<CustomerOrdersResult, MemoryContext> {
    let store = seeded_store().await;
    GenericRepository::new(MemoryContext::new(&store).with_procedures(registry()))
}

#[tokio::test]
async fn test_rows_are_decoded_and_transformed() {
    let repo = orders_repository().await;

    let totals = repo
        .execute_stored_proc(
            |orders| orders.into_iter().map(|o| o.total),
            vec![SqlValue::Integer(1)],
        )
        .await
        .unwrap();

    assert_eq!(totals, ProcedureOutcome::Rows(vec![19.5, 5.0]));
}

#[tokio::test]
async fn test_empty_result_set_is_not_no_result() {
    let repo = orders_repository().await;

    let outcome = repo
        .execute_stored_proc(|orders| orders, vec![SqlValue::Integer(2)])
        .await
        .unwrap();

    assert!(!outcome.is_no_result());
    assert_eq!(outcome.into_rows(), Some(vec![]));
}

#[tokio::test]
async fn test_no_result_passes_through_without_transform() {
    let store = seeded_store().await;
    let repo: GenericRepository<ArchiveOrdersResult, MemoryContext> =
        GenericRepository::new(MemoryContext::new(&store).with_procedures(registry()));

    let outcome = repo
        .execute_stored_proc(
            |_: Vec<ArchiveOrdersResult>| -> Vec<i64> { panic!("transform must not run") },
            vec![],
        )
        .await
        .unwrap();

    assert_eq!(outcome, ProcedureOutcome::NoResult);
}

#[tokio::test]
async fn test_handler_errors_propagate_unchanged() {
    let repo = orders_repository().await;

    let err = repo
        .execute_stored_proc(|orders| orders, vec![SqlValue::from("not an id")])
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::Validation);
}

#[tokio::test]
async fn test_unregistered_procedure_is_dispatch_error() {
    let store = seeded_store().await;
    let repo: GenericRepository<CustomerOrdersResult, MemoryContext> =
        GenericRepository::new(MemoryContext::new(&store));

    let err = repo
        .execute_stored_proc(|orders| orders, vec![SqlValue::Integer(1)])
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::ProcedureDispatch);
}

#[test]
fn test_duplicate_registration_is_rejected() {
    let mut procedures = registry();
    let err = procedures
        .register_fn("CustomerOrders", |_: MemoryStore, _| async move {
            Ok::<_, AppError>(ProcedureOutcome::<Value>::NoResult)
        })
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::ProcedureDispatch);
}

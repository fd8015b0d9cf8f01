//! Repository behavior against the in-memory context.

mod helpers;

use serde::Deserialize;

use dataaccess::prelude::*;
use helpers::{Customer, customer, customer_repository, customers, seeded_store};

#[tokio::test]
async fn test_inserted_entity_is_found_after_save() {
    let store = seeded_store().await;
    let mut repo = customer_repository(&store);

    let linus = customer(6, "Linus", Some("Helsinki"), 10.0);
    repo.insert(linus.clone()).unwrap();
    assert_eq!(repo.save_async().await.unwrap(), 1);
    assert_eq!(repo.get_by_id(&6).await.unwrap(), Some(linus.clone()));

    // A fresh unit of work reads it back from the store.
    let mut other = customer_repository(&store);
    assert_eq!(other.get_by_id(&6).await.unwrap(), Some(linus));
}

#[tokio::test]
async fn test_get_by_id_missing_key_is_none() {
    let store = seeded_store().await;
    let mut repo = customer_repository(&store);
    assert_eq!(repo.get_by_id(&404).await.unwrap(), None);
}

#[tokio::test]
async fn test_delete_by_id_unknown_key_is_not_found() {
    let store = seeded_store().await;
    let mut repo = customer_repository(&store);

    let err = repo.delete_by_id(&404).await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::NotFound);
    assert_eq!(repo.save_async().await.unwrap(), 0);
}

#[tokio::test]
async fn test_delete_by_id_removes_row_on_save() {
    let store = seeded_store().await;
    let mut repo = customer_repository(&store);

    repo.delete_by_id(&2).await.unwrap();
    assert_eq!(repo.get_by_id(&2).await.unwrap(), None);
    repo.save_async().await.unwrap();

    assert_eq!(repo.get_count(None).await.unwrap(), 4);
    let mut other = customer_repository(&store);
    assert_eq!(other.get_by_id(&2).await.unwrap(), None);
}

#[tokio::test]
async fn test_delete_detached_entity_attaches_first() {
    let store = seeded_store().await;
    let mut repo = customer_repository(&store);

    let detached = customer(3, "Alan", Some("London"), 42.0);
    assert_eq!(repo.entry_state(&detached).unwrap(), EntityState::Detached);

    repo.delete(detached.clone()).unwrap();
    assert_eq!(repo.entry_state(&detached).unwrap(), EntityState::Deleted);
    assert_eq!(repo.save_async().await.unwrap(), 1);
    assert_eq!(repo.get_count(Some(&Filter::eq("id", 3))).await.unwrap(), 0);
}

#[tokio::test]
async fn test_delete_of_missing_detached_entity_fails_on_save() {
    let store = seeded_store().await;
    let mut repo = customer_repository(&store);

    repo.delete(customer(99, "Ghost", None, 0.0)).unwrap();
    let err = repo.save_async().await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::Conflict);
    assert_eq!(store.rows("customers").await.unwrap().len(), 5);
}

#[tokio::test]
async fn test_delete_loaded_entity_removes_row_on_save() {
    let store = seeded_store().await;
    let mut repo = customer_repository(&store);

    let grace = repo.get_by_id(&2).await.unwrap().unwrap();
    assert_eq!(repo.entry_state(&grace).unwrap(), EntityState::Unchanged);

    repo.delete(grace.clone()).unwrap();
    assert_eq!(repo.entry_state(&grace).unwrap(), EntityState::Deleted);
    assert_eq!(repo.save_async().await.unwrap(), 1);

    let mut fresh = customer_repository(&store);
    assert_eq!(fresh.get_by_id(&2).await.unwrap(), None);
    assert_eq!(store.rows("customers").await.unwrap().len(), 4);
}

#[tokio::test]
async fn test_delete_of_pending_insert_writes_nothing() {
    let store = seeded_store().await;
    let mut repo = customer_repository(&store);

    let linus = customer(6, "Linus", Some("Helsinki"), 10.0);
    repo.insert(linus.clone()).unwrap();
    repo.delete(linus.clone()).unwrap();
    assert_eq!(repo.entry_state(&linus).unwrap(), EntityState::Detached);

    assert_eq!(repo.save_async().await.unwrap(), 0);
    assert_eq!(store.rows("customers").await.unwrap().len(), 5);
    let mut fresh = customer_repository(&store);
    assert_eq!(fresh.get_by_id(&6).await.unwrap(), None);
}

#[tokio::test]
async fn test_update_without_changes_still_writes() {
    let store = seeded_store().await;
    let mut repo = customer_repository(&store);
    let loaded = repo.get_by_id(&1).await.unwrap().unwrap();

    // Someone else changes the row in the meantime.
    let mut other = customer_repository(&store);
    let mut renamed = other.get_by_id(&1).await.unwrap().unwrap();
    renamed.name = "Countess".to_string();
    other.update(renamed).unwrap();
    other.save_async().await.unwrap();

    repo.update(loaded.clone()).unwrap();
    assert_eq!(repo.entry_state(&loaded).unwrap(), EntityState::Modified);
    assert_eq!(repo.save_async().await.unwrap(), 1);

    let mut fresh = customer_repository(&store);
    assert_eq!(fresh.get_by_id(&1).await.unwrap(), Some(loaded));
}

#[tokio::test]
async fn test_update_of_pending_insert_keeps_insert() {
    let store = seeded_store().await;
    let mut repo = customer_repository(&store);

    let mut linus = customer(6, "Linus", None, 1.0);
    repo.insert(linus.clone()).unwrap();
    linus.city = Some("Portland".to_string());
    repo.update(linus.clone()).unwrap();
    assert_eq!(repo.entry_state(&linus).unwrap(), EntityState::Added);

    repo.save_async().await.unwrap();
    let mut fresh = customer_repository(&store);
    assert_eq!(fresh.get_by_id(&6).await.unwrap(), Some(linus));
}

#[tokio::test]
async fn test_count_matches_materialized_get() {
    let store = seeded_store().await;
    let repo = customer_repository(&store);

    let filters = [
        None,
        Some(Filter::eq("city", "London")),
        Some(Filter::eq("city", "London").not()),
        Some(Filter::gt("credit", 80)),
        Some(Filter::ilike("name", "a%")),
        Some(Filter::is_null("city").or(Filter::lt("credit", 50))),
        Some(Filter::is_in("city", ["Boston", "New York"])),
        Some(Filter::eq("name", "Nobody")),
    ];

    for filter in filters {
        let mut options = QueryOptions::new();
        if let Some(f) = filter.clone() {
            options = options.filter(f);
        }
        let rows: Vec<Customer> = repo.get(Projection::all(), options).await.unwrap();
        let count = repo.get_count(filter.as_ref()).await.unwrap();
        assert_eq!(count, rows.len() as u64, "{filter:?}");
    }
}

#[tokio::test]
async fn test_paging_slices_sorted_sequence() {
    let store = seeded_store().await;
    let repo = customer_repository(&store);

    let sorted: Vec<i64> = {
        let mut all = customers();
        all.sort_by(|a, b| a.name.cmp(&b.name));
        all.into_iter().map(|c| c.id).collect()
    };

    for page_size in 1..=3u64 {
        for page in 1..=3u64 {
            let rows: Vec<Customer> = repo
                .get(
                    Projection::all(),
                    QueryOptions::new()
                        .order_by(SortField::asc("name"))
                        .page(page_size, page),
                )
                .await
                .unwrap();

            let start = ((page - 1) * page_size) as usize;
            let end = (page * page_size) as usize;
            let expected: Vec<i64> = sorted
                .iter()
                .copied()
                .skip(start)
                .take(end - start)
                .collect();
            assert_eq!(
                rows.iter().map(|c| c.id).collect::<Vec<_>>(),
                expected,
                "page {page} of size {page_size}"
            );
        }
    }
}

#[tokio::test]
async fn test_default_page_zero_clamps_to_first_page() {
    let store = seeded_store().await;
    let repo = customer_repository(&store);
    let order = || QueryOptions::new().order_by(SortField::asc("id"));

    let default_page: Vec<Customer> = repo
        .get(Projection::all(), order().page_size(2))
        .await
        .unwrap();
    let first_page: Vec<Customer> = repo
        .get(Projection::all(), order().page(2, 1))
        .await
        .unwrap();

    assert_eq!(default_page, first_page);
    assert_eq!(
        default_page.iter().map(|c| c.id).collect::<Vec<_>>(),
        vec![1, 2]
    );
}

#[tokio::test]
async fn test_zero_page_size_is_empty() {
    let store = seeded_store().await;
    let repo = customer_repository(&store);

    let rows: Vec<Customer> = repo
        .get(Projection::all(), QueryOptions::new().page(0, 1))
        .await
        .unwrap();
    assert!(rows.is_empty());
}

#[derive(Debug, PartialEq, Deserialize)]
struct CustomerLabel {
    id: i64,
    label: String,
}

#[tokio::test]
async fn test_projection_orders_on_projected_columns() {
    let store = seeded_store().await;
    let repo = customer_repository(&store);

    let labels: Vec<CustomerLabel> = repo
        .get(
            Projection::all().column("id").column_as("name", "label"),
            QueryOptions::new()
                .filter(Filter::eq("city", "London"))
                .order_by(SortField::desc("label")),
        )
        .await
        .unwrap();

    assert_eq!(
        labels,
        vec![
            CustomerLabel {
                id: 3,
                label: "Alan".to_string()
            },
            CustomerLabel {
                id: 1,
                label: "Ada".to_string()
            },
        ]
    );
}

#[tokio::test]
async fn test_ordering_on_unprojected_column_is_rejected() {
    let store = seeded_store().await;
    let repo = customer_repository(&store);

    let err = repo
        .get::<CustomerLabel>(
            Projection::columns(["id"]),
            QueryOptions::new().order_by(SortField::asc("name")),
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::Validation);
}

#[tokio::test]
async fn test_get_page_totals() {
    let store = seeded_store().await;
    let repo = customer_repository(&store);

    let page: PageResponse<Customer> = repo
        .get_page(
            Projection::all(),
            QueryOptions::new()
                .filter(Filter::eq("city", "London").or(Filter::is_null("city")))
                .order_by(SortField::asc("id")),
            PageRequest::new(2, 2),
        )
        .await
        .unwrap();

    assert_eq!(page.total_items, 3);
    assert_eq!(page.total_pages, 2);
    assert_eq!(page.items.iter().map(|c| c.id).collect::<Vec<_>>(), vec![4]);
    assert!(!page.has_next);
}

#[tokio::test]
async fn test_dispose_releases_context_once() {
    let store = seeded_store().await;
    let mut repo = customer_repository(&store);
    repo.insert(customer(7, "Unsaved", None, 0.0)).unwrap();
    assert_eq!(store.open_contexts(), 1);

    repo.dispose_async().await;
    repo.dispose();
    assert_eq!(store.open_contexts(), 0);

    assert_eq!(
        repo.get_count(None).await.unwrap_err().kind,
        ErrorKind::Disposed
    );
    assert_eq!(
        repo.delete_by_id(&1).await.unwrap_err().kind,
        ErrorKind::Disposed
    );
    assert_eq!(repo.save_async().await.unwrap_err().kind, ErrorKind::Disposed);

    // Unsaved changes were discarded.
    let mut fresh = customer_repository(&store);
    assert_eq!(fresh.get_by_id(&7).await.unwrap(), None);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_blocking_save_inside_multi_thread_runtime() {
    let store = seeded_store().await;
    let mut repo = customer_repository(&store);

    repo.insert(customer(8, "Blocking", None, 0.0)).unwrap();
    assert_eq!(repo.save().unwrap(), 1);
    assert_eq!(repo.get_count(None).await.unwrap(), 6);
}

#[test]
fn test_blocking_save_without_runtime() {
    let store = futures::executor::block_on(seeded_store());
    let mut repo = customer_repository(&store);

    repo.insert(customer(9, "Sync", None, 0.0)).unwrap();
    assert_eq!(repo.save().unwrap(), 1);

    let rows = futures::executor::block_on(store.rows("customers")).unwrap();
    assert_eq!(rows.len(), 6);
}

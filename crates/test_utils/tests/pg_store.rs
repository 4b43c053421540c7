//! End-to-end store tests against containerized PostgreSQL
//!
//! These need a running Docker daemon, so every test is `#[ignore]`; run
//! them with `cargo test -p test_utils -- --ignored`.

use core_query::{Condition, Filter, Pager, QuerySpec, Sorter, Value};
use infra_store::{execute_raw, execute_raw_scalar, EvalMode, Repository, StoreError};
use test_utils::database::create_isolated_test_database;
use test_utils::fixtures::{sample_devices, Device};
use test_utils::memory::MemoryTable;

#[tokio::test]
#[ignore]
async fn paged_reads_agree_across_modes_and_with_the_oracle() {
    let db = create_isolated_test_database().await.expect("test database");
    let mut repo = Repository::<Device>::new(db.pool().clone());

    let devices = sample_devices(25);
    let saved = repo.add_range(devices.clone(), true).await.unwrap();
    assert_eq!(saved, 25);

    let spec = QuerySpec::<Device>::new(Pager::new(2, 10).unwrap())
        .with_condition(Condition::ge("rating", 2i64))
        .with_sorter(Sorter::by_column("name"));

    let store = repo.query_page(&spec, EvalMode::Store, None).await.unwrap();
    let memory = repo.query_page(&spec, EvalMode::InMemory, None).await.unwrap();
    let oracle = MemoryTable::new(devices.clone()).evaluate(&spec).unwrap();

    assert_eq!(store, memory);
    assert_eq!(store, oracle);
    assert_eq!(store.page_count, oracle.page_count);

    // Sort on a mostly-NULL column: null placement must agree between the
    // rendered ORDER BY and the in-memory comparator, in both directions.
    for sorter in [
        Sorter::by_column("label").then_by_column("id"),
        Sorter::by_column("label").then_by_column("id").descending(),
    ] {
        let nullable = QuerySpec::<Device>::new(Pager::new(1, 25).unwrap()).with_sorter(sorter);
        let store = repo.query_page(&nullable, EvalMode::Store, None).await.unwrap();
        let memory = repo.query_page(&nullable, EvalMode::InMemory, None).await.unwrap();
        let oracle = MemoryTable::new(devices.clone()).evaluate(&nullable).unwrap();
        assert_eq!(store, memory);
        assert_eq!(store, oracle);
    }
}

#[tokio::test]
#[ignore]
async fn updates_bump_the_version_token() {
    let db = create_isolated_test_database().await.expect("test database");
    let mut repo = Repository::<Device>::new(db.pool().clone());

    let device = repo.add(Device::new(1, "probe", 3), true).await.unwrap();
    assert_eq!(device.version, 1);

    let mut changed = device;
    changed.rating = 9;
    repo.update(changed, true).await.unwrap();

    let filter = Filter::from(Condition::eq("id", 1i64));
    let reloaded = repo.get(&filter, None).await.unwrap().expect("row exists");
    assert_eq!(reloaded.rating, 9);
    assert_eq!(reloaded.version, 2);
}

#[tokio::test]
#[ignore]
async fn concurrent_savers_reconcile_and_both_land() {
    let db = create_isolated_test_database().await.expect("test database");
    let mut first = Repository::<Device>::new(db.pool().clone());
    let mut second = Repository::<Device>::new(db.pool().clone());

    first.add(Device::new(1, "shared", 0), true).await.unwrap();

    let filter = Filter::from(Condition::eq("id", 1i64));
    let row_a = first.get(&filter, None).await.unwrap().unwrap();
    let row_b = second.get(&filter, None).await.unwrap().unwrap();
    assert_eq!(row_a.version, row_b.version);

    let mut row_a = row_a;
    row_a.rating = 5;
    first.update(row_a, true).await.unwrap();

    // The second saver holds a stale version; its save must reconcile
    // against the stored row and still apply its own values.
    let mut row_b = row_b;
    row_b.label = Some("late".to_string());
    let affected = second.update(row_b, true).await.unwrap();
    assert_eq!(affected, 1);

    let final_row = first.get(&filter, None).await.unwrap().unwrap();
    assert_eq!(final_row.label.as_deref(), Some("late"));
    assert_eq!(final_row.version, 3);
}

#[tokio::test]
#[ignore]
async fn included_relations_attach_children_to_their_parents() {
    let db = create_isolated_test_database().await.expect("test database");
    let mut repo = Repository::<Device>::new(db.pool().clone());

    repo.add_range(sample_devices(3), true).await.unwrap();
    sqlx::raw_sql(
        "INSERT INTO readings (id, device_id, value) VALUES \
         (1, 1, 10), (2, 1, 20), (3, 3, 30)",
    )
    .execute(db.pool())
    .await
    .unwrap();

    let spec = QuerySpec::<Device>::new(Pager::new(1, 10).unwrap())
        .with_sorter(Sorter::by_column("id"))
        .include("readings");
    let page = repo.query_page(&spec, EvalMode::Store, None).await.unwrap();

    let counts: Vec<usize> = page.items.iter().map(|d| d.readings.len()).collect();
    assert_eq!(counts, vec![2, 0, 1]);
    assert_eq!(page.items[0].readings[1].value, 20);

    let missing = repo
        .query_page(
            &QuerySpec::<Device>::new(Pager::new(1, 10).unwrap()).include("bogus"),
            EvalMode::Store,
            None,
        )
        .await
        .unwrap_err();
    assert!(matches!(missing, StoreError::InvalidRelation(_)));
}

#[tokio::test]
#[ignore]
async fn predicate_scoped_operations_bypass_the_change_set() {
    let db = create_isolated_test_database().await.expect("test database");
    let mut repo = Repository::<Device>::new(db.pool().clone());

    repo.add_range(sample_devices(25), true).await.unwrap();

    let dropped = repo.delete_where(&Condition::lt("rating", 2i64)).await.unwrap();
    let expected_drop = sample_devices(25).iter().filter(|d| d.rating < 2).count() as u64;
    assert_eq!(dropped, expected_drop);

    let relabelled = repo
        .bulk_update_where(
            &Condition::ge("rating", 5i64),
            &[("label", Value::Text("hot".to_string()))],
        )
        .await
        .unwrap();
    assert!(relabelled > 0);

    let hot = repo
        .query_page(
            &QuerySpec::<Device>::new(Pager::new(1, 50).unwrap())
                .with_condition(Condition::eq("label", "hot")),
            EvalMode::Store,
            None,
        )
        .await
        .unwrap();
    assert_eq!(hot.total_items, relabelled);
    assert!(hot.items.iter().all(|d| d.rating >= 5));
}

#[tokio::test]
#[ignore]
async fn bulk_upsert_inserts_new_rows_and_replaces_existing() {
    let db = create_isolated_test_database().await.expect("test database");
    let mut repo = Repository::<Device>::new(db.pool().clone());

    repo.add_range(sample_devices(3), true).await.unwrap();

    let mut batch = sample_devices(5);
    batch[0].name = "renamed".to_string();
    let affected = repo.bulk_upsert(&batch).await.unwrap();
    assert_eq!(affected, 5);

    let all = repo
        .query_page(
            &QuerySpec::<Device>::new(Pager::new(1, 50).unwrap())
                .with_sorter(Sorter::by_column("id")),
            EvalMode::Store,
            None,
        )
        .await
        .unwrap();
    assert_eq!(all.total_items, 5);
    assert_eq!(all.items[0].name, "renamed");
}

#[tokio::test]
#[ignore]
async fn raw_queries_map_rows_and_scalars() {
    let db = create_isolated_test_database().await.expect("test database");
    let mut repo = Repository::<Device>::new(db.pool().clone());

    repo.add_range(sample_devices(10), true).await.unwrap();

    let rows: Vec<Device> = execute_raw(
        db.pool(),
        "SELECT * FROM devices WHERE rating >= $1 ORDER BY id",
        &[Value::Int(4)],
    )
    .await
    .unwrap();
    assert!(rows.iter().all(|d| d.rating >= 4));

    let counts: Vec<i64> = execute_raw_scalar(
        db.pool(),
        "SELECT COUNT(*) FROM devices WHERE rating >= $1",
        &[Value::Int(4)],
    )
    .await
    .unwrap();
    assert_eq!(counts, vec![rows.len() as i64]);
}

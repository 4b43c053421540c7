//! Equivalence between the production paging pipeline and the oracle
//!
//! The in-memory pipeline and [`MemoryTable`] implement the same
//! operation order independently. Any divergence on a translatable
//! specification is a bug in one of them.

use proptest::prelude::*;

use core_query::{pipeline, Condition, Pager, QuerySpec, Sorter};
use test_utils::fixtures::{sample_devices, Device};
use test_utils::generators::{
    device_table_strategy, pager_strategy, rating_condition_strategy, sorter_strategy,
};
use test_utils::memory::MemoryTable;

proptest! {
    #[test]
    fn pipeline_matches_oracle_on_translatable_specs(
        devices in device_table_strategy(40),
        pager in pager_strategy(),
        condition in rating_condition_strategy(),
        sorter in sorter_strategy(),
    ) {
        let spec = QuerySpec::<Device>::new(pager)
            .with_condition(condition)
            .with_sorter(sorter);

        let oracle = MemoryTable::new(devices.clone()).evaluate(&spec).unwrap();
        let pipeline = pipeline::paginate(devices, &spec).unwrap();

        prop_assert_eq!(oracle, pipeline);
    }

    #[test]
    fn pages_partition_the_filtered_set(
        devices in device_table_strategy(40),
        size in 1u64..10,
        condition in rating_condition_strategy(),
        sorter in sorter_strategy(),
    ) {
        let table = MemoryTable::new(devices);
        let first = table
            .evaluate(
                &QuerySpec::<Device>::new(Pager::new(1, size).unwrap())
                    .with_condition(condition.clone())
                    .with_sorter(sorter.clone()),
            )
            .unwrap();

        let mut collected = Vec::new();
        for index in 1..=first.page_count {
            let spec = QuerySpec::<Device>::new(Pager::new(index, size).unwrap())
                .with_condition(condition.clone())
                .with_sorter(sorter.clone());
            let page = table.evaluate(&spec).unwrap();
            prop_assert_eq!(page.total_items, first.total_items);
            prop_assert_eq!(page.page_count, first.page_count);
            prop_assert!(page.items.len() as u64 <= size);
            collected.extend(page.items);
        }

        // Every filtered row appears exactly once across the pages.
        prop_assert_eq!(collected.len() as u64, first.total_items);
        let mut ids: Vec<i64> = collected.iter().map(|d| d.id).collect();
        ids.sort_unstable();
        ids.dedup();
        prop_assert_eq!(ids.len(), collected.len());
    }
}

#[test]
fn second_page_of_name_sorted_devices() {
    let spec = QuerySpec::<Device>::new(Pager::new(2, 10).unwrap())
        .with_sorter(Sorter::by_column("name"));
    let page = pipeline::paginate(sample_devices(25), &spec).unwrap();

    assert_eq!(page.total_items, 25);
    assert_eq!(page.page_count, 3);
    let ids: Vec<i64> = page.items.iter().map(|d| d.id).collect();
    assert_eq!(ids, (11..=20).collect::<Vec<i64>>());
}

#[test]
fn filtered_totals_count_matches_not_rows() {
    let devices = sample_devices(25);
    let expected = devices.iter().filter(|d| d.rating >= 4).count() as u64;
    let spec = QuerySpec::<Device>::new(Pager::new(1, 5).unwrap())
        .with_condition(Condition::ge("rating", 4i64));
    let page = pipeline::paginate(devices, &spec).unwrap();

    assert_eq!(page.total_items, expected);
    assert_eq!(page.items.len(), 5.min(expected as usize));
}

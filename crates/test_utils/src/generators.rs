//! Property-Based Test Generators
//!
//! Proptest strategies for fixture devices and query shapes. The
//! strategies keep values inside the ranges the fixtures use, so
//! generated specifications always validate.

use proptest::prelude::*;

use core_query::{Condition, Pager, Sorter};

use crate::fixtures::Device;

/// Strategy for generating a single device with a given id
pub fn device_strategy(id: i64) -> impl Strategy<Value = Device> {
    ("[a-z]{3,12}", 0i64..10, proptest::option::of("[a-z]{1,6}")).prop_map(
        move |(name, rating, label)| {
            let mut device = Device::new(id, name, rating);
            device.label = label;
            device
        },
    )
}

/// Strategy for generating a table of devices with distinct ids
pub fn device_table_strategy(max_rows: usize) -> impl Strategy<Value = Vec<Device>> {
    proptest::collection::vec(any::<()>(), 0..=max_rows).prop_flat_map(|slots| {
        let rows: Vec<_> = (1..=slots.len() as i64).map(device_strategy).collect();
        rows
    })
}

/// Strategy for generating valid pagers
pub fn pager_strategy() -> impl Strategy<Value = Pager> {
    (1u64..6, 1u64..20).prop_map(|(index, size)| Pager::new(index, size).unwrap())
}

/// Strategy for generating translatable rating conditions
pub fn rating_condition_strategy() -> impl Strategy<Value = Condition> {
    (0i64..10).prop_flat_map(|bound| {
        prop_oneof![
            Just(Condition::ge("rating", bound)),
            Just(Condition::lt("rating", bound)),
            Just(Condition::eq("rating", bound)),
            Just(Condition::is_not_null("label")),
        ]
    })
}

/// Strategy for generating translatable sorters over fixture columns
pub fn sorter_strategy() -> impl Strategy<Value = Sorter<Device>> {
    let column = prop_oneof![Just("name"), Just("rating"), Just("label")];
    (column, any::<bool>()).prop_map(|(column, ascending)| {
        let sorter = Sorter::by_column(column).then_by_column("id");
        if ascending {
            sorter
        } else {
            sorter.descending()
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_query::{Entity, QuerySpec};

    proptest! {
        #[test]
        fn generated_devices_have_distinct_ids(devices in device_table_strategy(30)) {
            let mut ids: Vec<i64> = devices.iter().map(|d| d.id).collect();
            ids.sort_unstable();
            ids.dedup();
            prop_assert_eq!(ids.len(), devices.len());
        }

        #[test]
        fn generated_specs_validate(
            pager in pager_strategy(),
            condition in rating_condition_strategy(),
            sorter in sorter_strategy(),
        ) {
            let spec = QuerySpec::<Device>::new(pager)
                .with_condition(condition)
                .with_sorter(sorter);
            prop_assert!(spec.is_translatable());
            prop_assert!(spec.validate_for_store().is_ok());
        }

        #[test]
        fn generated_devices_cover_declared_columns(device in device_strategy(1)) {
            for column in Device::columns() {
                prop_assert!(device.field(column).is_some());
            }
        }
    }
}

//! In-memory evaluation of a query specification
//!
//! This is the fallback strategy for specifications the store cannot
//! evaluate, typically because the filter or sort key is a caller closure.
//! The whole candidate set is materialized first, so cost scales with the
//! number of matching rows, not the page size. Callers with large tables
//! and translatable specifications should prefer the store-evaluated path.
//!
//! The operation order is identical to the store-evaluated mode: filter,
//! sort, count, then slice. For a fixed snapshot and a translatable
//! specification the two modes return identical pages and totals.

use tracing::debug;

use crate::entity::Entity;
use crate::error::QueryError;
use crate::page::TableInfo;
use crate::sort::Sorter;
use crate::spec::QuerySpec;

/// Filters, sorts, counts and pages an already-materialized row set
///
/// Rows equal on every sort key keep their input order (the sort is
/// stable), which is what makes page concatenation deterministic.
pub fn paginate<T: Entity>(rows: Vec<T>, spec: &QuerySpec<T>) -> Result<TableInfo<T>, QueryError> {
    spec.validate()?;

    let mut matched = Vec::with_capacity(rows.len());
    for row in rows {
        if spec.filter.accepts(&row)? {
            matched.push(row);
        }
    }

    let sorted = match &spec.sorter {
        Some(sorter) => sort_rows(matched, sorter)?,
        None => matched,
    };

    let total_items = sorted.len() as u64;
    let page_count = spec.pager.page_count(total_items);
    let items: Vec<T> = sorted
        .into_iter()
        .skip(spec.pager.skip() as usize)
        .take(spec.pager.size() as usize)
        .collect();

    debug!(
        table = T::table_name(),
        total_items,
        page_count,
        page = spec.pager.index(),
        returned = items.len(),
        "evaluated query in memory"
    );

    Ok(TableInfo {
        items,
        total_items,
        page_count,
    })
}

/// Stable sort with keys extracted once per row
fn sort_rows<T: Entity>(rows: Vec<T>, sorter: &Sorter<T>) -> Result<Vec<T>, QueryError> {
    let ascending = sorter.is_ascending();
    let mut keyed = rows
        .into_iter()
        .map(|row| sorter.sort_keys(&row).map(|keys| (keys, row)))
        .collect::<Result<Vec<_>, _>>()?;
    keyed.sort_by(|(a, _), (b, _)| Sorter::<T>::compare_keys(a, b, ascending));
    Ok(keyed.into_iter().map(|(_, row)| row).collect())
}

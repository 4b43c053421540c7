//! In-Memory Store Oracle
//!
//! [`MemoryTable`] evaluates translatable specifications over a plain
//! `Vec`, applying the same operation order a SQL backend does: filter,
//! sort, count, then page. It shares no evaluation code with the
//! production pipeline, so equivalence tests comparing the two are a real
//! check rather than a tautology.

use std::cmp::Ordering;

use core_query::{Condition, Entity, Filter, QueryError, QuerySpec, TableInfo, Value};

/// A table of rows evaluated without a database
#[derive(Debug, Clone)]
pub struct MemoryTable<T> {
    rows: Vec<T>,
}

impl<T> Default for MemoryTable<T> {
    fn default() -> Self {
        Self { rows: Vec::new() }
    }
}

impl<T: Entity> MemoryTable<T> {
    pub fn new(rows: Vec<T>) -> Self {
        Self { rows }
    }

    pub fn insert(&mut self, row: T) {
        self.rows.push(row);
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Evaluates a translatable specification over the table
    ///
    /// Closure filters and extractor sort keys are refused, exactly as a
    /// store-evaluated query refuses them.
    pub fn evaluate(&self, spec: &QuerySpec<T>) -> Result<TableInfo<T>, QueryError> {
        spec.validate_for_store()?;

        let mut rows: Vec<&T> = Vec::new();
        for row in &self.rows {
            let keep = match &spec.filter {
                Filter::All => true,
                Filter::Where(condition) => condition.matches(row)?,
                Filter::Predicate(_) => unreachable!("rejected by store validation"),
            };
            if keep {
                rows.push(row);
            }
        }

        if let Some(sorter) = &spec.sorter {
            let (primary, secondary) = sorter
                .columns()
                .ok_or(QueryError::NotTranslatable("a closure sort key"))?;
            let primary = primary.to_string();
            let secondary = secondary.map(str::to_string);
            let ascending = sorter.is_ascending();
            rows.sort_by(|a, b| {
                let ordering = compare_column(*a, *b, &primary).then_with(|| {
                    secondary
                        .as_deref()
                        .map_or(Ordering::Equal, |column| compare_column(*a, *b, column))
                });
                if ascending {
                    ordering
                } else {
                    ordering.reverse()
                }
            });
        }

        let total_items = rows.len() as u64;
        let page_count = (total_items.max(1) + spec.pager.size() - 1) / spec.pager.size();
        let items: Vec<T> = rows
            .into_iter()
            .skip(spec.pager.skip() as usize)
            .take(spec.pager.size() as usize)
            .cloned()
            .collect();

        Ok(TableInfo { items, total_items, page_count: page_count.max(1) })
    }

    /// Rows matching a bare condition, in insertion order
    pub fn matching(&self, condition: &Condition) -> Result<Vec<T>, QueryError> {
        let mut out = Vec::new();
        for row in &self.rows {
            if condition.matches(row)? {
                out.push(row.clone());
            }
        }
        Ok(out)
    }
}

fn compare_column<T: Entity>(a: &T, b: &T, column: &str) -> Ordering {
    let left = a.field(column).unwrap_or(Value::Null);
    let right = b.field(column).unwrap_or(Value::Null);
    left.compare(&right)
}

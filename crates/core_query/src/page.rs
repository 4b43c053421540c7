//! Paging arithmetic and the paged result container

use serde::{Deserialize, Serialize};

use crate::error::QueryError;

/// A 1-based page request
///
/// Both fields are validated at construction, so downstream arithmetic
/// never has to guard against a zero divisor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pager {
    index: u64,
    size: u64,
}

impl Pager {
    /// Creates a pager for page `index` (1-based) of `size` rows
    ///
    /// The resulting offset (`(index - 1) * size`) must fit in an `i64`,
    /// matching the widest slice a SQL `LIMIT`/`OFFSET` can express.
    pub fn new(index: u64, size: u64) -> Result<Self, QueryError> {
        if index == 0 {
            return Err(QueryError::InvalidPageIndex(index));
        }
        if size == 0 || size > i64::MAX as u64 {
            return Err(QueryError::InvalidPageSize(size));
        }
        let fits = (index - 1)
            .checked_mul(size)
            .is_some_and(|skip| skip <= i64::MAX as u64);
        if !fits {
            return Err(QueryError::InvalidPageIndex(index));
        }
        Ok(Self { index, size })
    }

    /// The first page with the given size
    pub fn first(size: u64) -> Result<Self, QueryError> {
        Self::new(1, size)
    }

    pub fn index(&self) -> u64 {
        self.index
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    /// Rows skipped before this page starts
    pub fn skip(&self) -> u64 {
        (self.index - 1) * self.size
    }

    /// Total pages needed for `total_items` rows
    ///
    /// Always at least 1: an empty result set still has one (empty) page.
    pub fn page_count(&self, total_items: u64) -> u64 {
        if total_items == 0 {
            1
        } else {
            total_items.div_ceil(self.size)
        }
    }
}

/// One page of results plus the totals describing the full filtered set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableInfo<T> {
    /// Rows of the requested page, at most `Pager::size` of them
    pub items: Vec<T>,
    /// Matching rows across all pages, counted after filtering
    pub total_items: u64,
    /// `max(1, ceil(total_items / size))`
    pub page_count: u64,
}

impl<T> TableInfo<T> {
    /// An empty single-page result
    pub fn empty() -> Self {
        Self {
            items: Vec::new(),
            total_items: 0,
            page_count: 1,
        }
    }
}

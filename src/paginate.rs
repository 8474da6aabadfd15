use crate::error::{QuoteDocError, Result};
use serde::Deserialize;

/// How many item rows fit on the first, middle and last pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct PageCapacity {
    pub first: usize,
    pub middle: usize,
    pub last: usize,
}

impl PageCapacity {
    pub fn new(first: usize, middle: usize, last: usize) -> Result<Self> {
        let capacity = Self {
            first,
            middle,
            last,
        };
        capacity.validate()?;
        Ok(capacity)
    }

    pub fn validate(&self) -> Result<()> {
        if self.first == 0 || self.middle == 0 || self.last == 0 {
            return Err(QuoteDocError::InvalidConfiguration(format!(
                "page capacities must be at least 1 (first={}, middle={}, last={})",
                self.first, self.middle, self.last
            )));
        }
        Ok(())
    }
}

impl Default for PageCapacity {
    fn default() -> Self {
        Self {
            first: 8,
            middle: 12,
            last: 8,
        }
    }
}

/// When a page counts as the last one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LastPageRule {
    /// A page is last when the remaining items fit the current page's
    /// threshold (first capacity on page one, middle capacity after), even
    /// if the last-page slice then leaves items for another page. The
    /// trailing page is marked last as well.
    #[default]
    Legacy,
    /// A page is last only when the remaining items fit the last-page
    /// capacity. If a regular page happens to take every item, an empty
    /// last page is appended so the summary still renders once.
    Strict,
}

/// An ordered slice of items rendered on one page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<'a, T> {
    pub index: usize,
    pub items: &'a [T],
    pub is_first: bool,
    pub is_last: bool,
}

pub fn plan_pages<T>(items: &[T], capacity: PageCapacity, rule: LastPageRule) -> Vec<Page<'_, T>> {
    if items.is_empty() {
        return vec![Page {
            index: 0,
            items,
            is_first: true,
            is_last: true,
        }];
    }

    let mut pages = Vec::new();
    let mut start = 0usize;
    while start < items.len() {
        let remaining = items.len() - start;
        let is_first = pages.is_empty();
        let (is_last, take) = match rule {
            LastPageRule::Legacy => {
                let threshold = if is_first {
                    capacity.first
                } else {
                    capacity.middle
                };
                let is_last = remaining <= threshold;
                let take = match (is_first, is_last) {
                    (_, true) => capacity.last,
                    (true, false) => capacity.first,
                    (false, false) => capacity.middle,
                };
                (is_last, take)
            }
            LastPageRule::Strict => {
                let is_last = remaining <= capacity.last;
                let take = if is_last {
                    remaining
                } else if is_first {
                    capacity.first
                } else {
                    capacity.middle
                };
                (is_last, take)
            }
        };
        let end = start + take.max(1).min(remaining);
        pages.push(Page {
            index: pages.len(),
            items: &items[start..end],
            is_first,
            is_last,
        });
        start = end;
    }

    if rule == LastPageRule::Strict && !pages.iter().any(|page| page.is_last) {
        pages.push(Page {
            index: pages.len(),
            items: &items[items.len()..],
            is_first: false,
            is_last: true,
        });
    }

    tracing::debug!(
        items = items.len(),
        pages = pages.len(),
        ?rule,
        "planned item pages"
    );
    pages
}

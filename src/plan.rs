//! Executable query plans.
//!
//! A [`QueryPlan`] is the compiled form of one query: an optional predicate,
//! an optional composite comparator, and optional pagination. It is built
//! once per parsed query and can be applied to any number of collections.

use std::cmp::Ordering;
use std::fmt;

/// Boolean test over items of type `T`.
pub type Predicate<T> = Box<dyn Fn(&T) -> bool + Send + Sync>;

/// Ordering over items of type `T`.
pub type Comparator<T> = Box<dyn Fn(&T, &T) -> Ordering + Send + Sync>;

/// The compiled combination of predicate, sort, offset and limit.
///
/// [`apply`](QueryPlan::apply) always runs the four stages in the same
/// order: filter, stable sort, skip `offset`, take `limit`. Sorting before
/// paging is what makes paging meaningful, so the order is not
/// configurable. `limit` is a count and `offset` a start index — the
/// `limit(count, offset)` calling convention, count first.
pub struct QueryPlan<T> {
    pub(crate) predicate: Option<Predicate<T>>,
    pub(crate) sort: Option<Comparator<T>>,
    pub(crate) limit: Option<u64>,
    pub(crate) offset: Option<u64>,
}

impl<T> QueryPlan<T> {
    /// A plan with no constraints; applying it returns input unchanged.
    pub fn unconstrained() -> Self {
        QueryPlan {
            predicate: None,
            sort: None,
            limit: None,
            offset: None,
        }
    }

    pub fn limit(&self) -> Option<u64> {
        self.limit
    }

    pub fn offset(&self) -> Option<u64> {
        self.offset
    }

    pub fn has_predicate(&self) -> bool {
        self.predicate.is_some()
    }

    pub fn has_sort(&self) -> bool {
        self.sort.is_some()
    }

    /// Runs filter, sort, skip and take over `items`.
    ///
    /// An offset past the end yields an empty result rather than an error.
    pub fn apply<I>(&self, items: I) -> Vec<T>
    where
        I: IntoIterator<Item = T>,
    {
        let items = items.into_iter();
        let mut result: Vec<T> = match &self.predicate {
            Some(predicate) => items.filter(|item| predicate(item)).collect(),
            None => items.collect(),
        };

        if let Some(sort) = &self.sort {
            // sort_by is stable, equal items keep their input order
            result.sort_by(|a, b| sort(a, b));
        }

        let offset = usize::try_from(self.offset.unwrap_or(0)).unwrap_or(usize::MAX);
        let taken = result.into_iter().skip(offset);
        match self.limit {
            Some(limit) => taken
                .take(usize::try_from(limit).unwrap_or(usize::MAX))
                .collect(),
            None => taken.collect(),
        }
    }
}

impl<T> fmt::Debug for QueryPlan<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryPlan")
            .field("predicate", &self.predicate.as_ref().map(|_| ".."))
            .field("sort", &self.sort.as_ref().map(|_| ".."))
            .field("limit", &self.limit)
            .field("offset", &self.offset)
            .finish()
    }
}

impl<T> Default for QueryPlan<T> {
    fn default() -> Self {
        QueryPlan::unconstrained()
    }
}

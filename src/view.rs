//! Per-page table view-models.
//!
//! Each list page owns one [`TableView`]: independent typed filters, one
//! active sort, and pagination state, composed into the render payload.
//! Fetching is server-paginated (skip/limit); sorting is applied client-side
//! to the already-fetched page only and never triggers a refetch.
//!
//! Responses are applied through a generation guard: a fetch superseded by a
//! newer filter or page change has its late result discarded instead of
//! clobbering the view ("last response wins" races are rejected up front).

use std::collections::HashMap;

use chrono::NaiveDate;
use log::debug;

use crate::error::{LogbookError, Result};
use crate::sort::{field_comparator, stable_sort, DerivedRecord, SortState, TableRecord};

// ============================================================================
// Filters
// ============================================================================

/// Expected value type of a filter key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterKind {
    Id,
    Date,
    Flag,
    Text,
}

impl FilterKind {
    fn name(self) -> &'static str {
        match self {
            FilterKind::Id => "id",
            FilterKind::Date => "date",
            FilterKind::Flag => "flag",
            FilterKind::Text => "text",
        }
    }
}

/// A filter value of one of the recognized kinds.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterValue {
    Id(i64),
    Date(NaiveDate),
    Flag(bool),
    Text(String),
}

impl FilterValue {
    pub fn kind(&self) -> FilterKind {
        match self {
            FilterValue::Id(_) => FilterKind::Id,
            FilterValue::Date(_) => FilterKind::Date,
            FilterValue::Flag(_) => FilterKind::Flag,
            FilterValue::Text(_) => FilterKind::Text,
        }
    }

    /// Render the value as a query-parameter string.
    pub fn to_query_value(&self) -> String {
        match self {
            FilterValue::Id(id) => id.to_string(),
            FilterValue::Date(date) => date.to_string(),
            FilterValue::Flag(flag) => flag.to_string(),
            FilterValue::Text(text) => text.clone(),
        }
    }
}

/// Typed enumeration of the filter keys one page recognizes.
///
/// Assignments are validated at the view-model boundary: an unknown key or a
/// value of the wrong kind is a typed error, not a silently ignored lookup.
#[derive(Debug, Clone)]
pub struct FilterSchema {
    keys: Vec<(&'static str, FilterKind)>,
}

impl FilterSchema {
    pub fn new(keys: &[(&'static str, FilterKind)]) -> Self {
        Self {
            keys: keys.to_vec(),
        }
    }

    /// Filters accepted by the flights listing.
    pub fn flights() -> Self {
        Self::new(&[
            ("location_id", FilterKind::Id),
            ("drone_id", FilterKind::Id),
            ("start_date", FilterKind::Date),
            ("end_date", FilterKind::Date),
            ("include_invalid", FilterKind::Flag),
        ])
    }

    /// Filters accepted by the flight-locations listing.
    pub fn flight_locations() -> Self {
        Self::new(&[("include_invalid", FilterKind::Flag)])
    }

    fn kind_of(&self, key: &str) -> Option<FilterKind> {
        self.keys
            .iter()
            .find(|(name, _)| *name == key)
            .map(|(_, kind)| *kind)
    }
}

// ============================================================================
// Pagination
// ============================================================================

/// Pagination state. `page_index * page_size` may exceed the total count
/// (an empty page), which every consumer must tolerate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageState {
    pub page_index: u64,
    pub page_size: u64,
}

impl PageState {
    pub fn new(page_size: u64) -> Self {
        Self {
            page_index: 0,
            page_size: page_size.max(1),
        }
    }

    /// Server offset for this page: `skip = page_index * page_size`.
    pub fn skip(&self) -> u64 {
        self.page_index * self.page_size
    }
}

// ============================================================================
// Table View-Model
// ============================================================================

/// Composition of filters, sort, pagination, and the currently applied page
/// of derived records for one list page.
#[derive(Debug)]
pub struct TableView {
    schema: FilterSchema,
    filters: HashMap<String, FilterValue>,
    sort: Option<SortState>,
    page: PageState,
    rows: Vec<DerivedRecord>,
    total: u64,
    issued_generation: u64,
}

impl TableView {
    pub fn new(schema: FilterSchema, page_size: u64) -> Self {
        Self {
            schema,
            filters: HashMap::new(),
            sort: None,
            page: PageState::new(page_size),
            rows: Vec::new(),
            total: 0,
            issued_generation: 0,
        }
    }

    // ========================================================================
    // Filters
    // ========================================================================

    /// Set a filter value. Any filter change resets the page index to 0.
    pub fn set_filter(&mut self, key: &str, value: FilterValue) -> Result<()> {
        match self.schema.kind_of(key) {
            None => Err(LogbookError::UnknownFilter(key.to_string())),
            Some(expected) if expected != value.kind() => Err(LogbookError::FilterKind {
                key: key.to_string(),
                expected: expected.name(),
                got: value.kind().name(),
            }),
            Some(_) => {
                self.filters.insert(key.to_string(), value);
                self.page.page_index = 0;
                Ok(())
            }
        }
    }

    /// Remove a filter. Counts as a filter change: page index resets to 0.
    pub fn clear_filter(&mut self, key: &str) -> Result<()> {
        if self.schema.kind_of(key).is_none() {
            return Err(LogbookError::UnknownFilter(key.to_string()));
        }
        self.filters.remove(key);
        self.page.page_index = 0;
        Ok(())
    }

    pub fn filter(&self, key: &str) -> Option<&FilterValue> {
        self.filters.get(key)
    }

    // ========================================================================
    // Pagination
    // ========================================================================

    pub fn page(&self) -> PageState {
        self.page
    }

    /// Change the page size, resetting the page index to 0.
    pub fn set_page_size(&mut self, page_size: u64) {
        self.page.page_size = page_size.max(1);
        self.page.page_index = 0;
    }

    pub fn set_page_index(&mut self, page_index: u64) {
        self.page.page_index = page_index;
    }

    /// Whether another page exists beyond the current one.
    pub fn has_next_page(&self) -> bool {
        (self.page.page_index + 1) * self.page.page_size < self.total
    }

    /// Advance to the next page; a no-op when the current page already covers
    /// the total.
    pub fn next_page(&mut self) {
        if self.has_next_page() {
            self.page.page_index += 1;
        }
    }

    pub fn prev_page(&mut self) {
        self.page.page_index = self.page.page_index.saturating_sub(1);
    }

    /// Query parameters for the next fetch: skip/limit plus every active
    /// filter, in deterministic order.
    pub fn query_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = vec![
            ("skip".to_string(), self.page.skip().to_string()),
            ("limit".to_string(), self.page.page_size.to_string()),
        ];
        let mut keys: Vec<&String> = self.filters.keys().collect();
        keys.sort();
        for key in keys {
            pairs.push((key.clone(), self.filters[key].to_query_value()));
        }
        pairs
    }

    // ========================================================================
    // Fetch Generations
    // ========================================================================

    /// Mark the start of a fetch and return its generation token.
    ///
    /// Only the payload of the most recently issued generation is accepted;
    /// anything older is discarded on arrival.
    pub fn begin_fetch(&mut self) -> u64 {
        self.issued_generation += 1;
        self.issued_generation
    }

    /// Apply a fetched page. Returns `false` (leaving current rows in place)
    /// when the payload belongs to a superseded fetch.
    pub fn apply_page(&mut self, generation: u64, rows: Vec<DerivedRecord>, total: u64) -> bool {
        if generation != self.issued_generation {
            debug!(
                "[TableView] Discarding stale page (generation {} < {})",
                generation, self.issued_generation
            );
            return false;
        }
        self.rows = rows;
        self.total = total;
        self.resort();
        true
    }

    /// Enrich raw records into their sortable projections and apply them.
    pub fn apply_records<T: TableRecord>(
        &mut self,
        generation: u64,
        records: &[T],
        total: u64,
    ) -> bool {
        let rows = records.iter().map(TableRecord::derived).collect();
        self.apply_page(generation, rows, total)
    }

    // ========================================================================
    // Sorting
    // ========================================================================

    /// Set the active sort and reorder the current page locally. Sorting
    /// never refetches: it is scoped to the rows already applied.
    pub fn set_sort(&mut self, sort: SortState) {
        self.sort = Some(sort);
        self.resort();
    }

    pub fn clear_sort(&mut self) {
        self.sort = None;
    }

    pub fn sort(&self) -> Option<&SortState> {
        self.sort.as_ref()
    }

    fn resort(&mut self) {
        if let Some(sort) = &self.sort {
            self.rows = stable_sort(&self.rows, field_comparator(&sort.field, sort.direction));
        }
    }

    // ========================================================================
    // Render Payload
    // ========================================================================

    /// The rows of the current page, enriched and sorted.
    pub fn rows(&self) -> &[DerivedRecord] {
        &self.rows
    }

    pub fn total(&self) -> u64 {
        self.total
    }
}

// ============================================================================
// Debounced Writes
// ============================================================================

#[cfg(feature = "http")]
pub use debounce::Debouncer;

#[cfg(feature = "http")]
mod debounce {
    use std::future::Future;
    use std::time::Duration;

    use tokio::task::JoinHandle;

    /// A cancellable delayed task, reset on every reschedule.
    ///
    /// Models the "save once the input goes quiet" pattern (the location
    /// altitude-offset editor): schedule the write on every change; only the
    /// schedule that survives the delay runs. Dropping the debouncer aborts
    /// a pending task, so teardown never fires a write.
    #[derive(Debug, Default)]
    pub struct Debouncer {
        handle: Option<JoinHandle<()>>,
    }

    impl Debouncer {
        pub fn new() -> Self {
            Self { handle: None }
        }

        /// Schedule `task` to run after `delay`, aborting any pending task.
        pub fn schedule<F>(&mut self, delay: Duration, task: F)
        where
            F: Future<Output = ()> + Send + 'static,
        {
            self.cancel();
            self.handle = Some(tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                task.await;
            }));
        }

        /// Abort the pending task, if any.
        pub fn cancel(&mut self) {
            if let Some(handle) = self.handle.take() {
                handle.abort();
            }
        }

        /// Whether a scheduled task has not yet run to completion.
        pub fn is_pending(&self) -> bool {
            self.handle.as_ref().is_some_and(|h| !h.is_finished())
        }
    }

    impl Drop for Debouncer {
        fn drop(&mut self) {
            self.cancel();
        }
    }
}


#[cfg(all(test, feature = "http"))]
mod debounce_tests {
    use super::Debouncer;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn test_only_last_schedule_fires() {
        let fired = Arc::new(AtomicU32::new(0));
        let mut debouncer = Debouncer::new();

        for _ in 0..3 {
            let fired = Arc::clone(&fired);
            debouncer.schedule(Duration::from_millis(40), async move {
                fired.fetch_add(1, Ordering::SeqCst);
            });
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert!(!debouncer.is_pending());
    }

    #[tokio::test]
    async fn test_cancel_prevents_run() {
        let fired = Arc::new(AtomicU32::new(0));
        let mut debouncer = Debouncer::new();

        let counter = Arc::clone(&fired);
        debouncer.schedule(Duration::from_millis(20), async move {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        debouncer.cancel();

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_drop_aborts_pending_task() {
        let fired = Arc::new(AtomicU32::new(0));
        {
            let mut debouncer = Debouncer::new();
            let counter = Arc::clone(&fired);
            debouncer.schedule(Duration::from_millis(20), async move {
                counter.fetch_add(1, Ordering::SeqCst);
            });
        }

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }
}

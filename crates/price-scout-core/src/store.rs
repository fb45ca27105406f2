//! Authoritative result set and view parameters for one session.
//!
//! Results arrive once, in the final results frame, and replace whatever was
//! there wholesale. The list lives behind an `Arc<[ResultItem]>` that is
//! swapped in a single assignment: a reader holding a snapshot from
//! [`ResultStore::current_results`] keeps a complete list no matter when the
//! replacement happens.

use std::sync::Arc;

use tracing::debug;

use crate::models::{ResultItem, SortOrder};
use crate::view::{project, ProjectedView, ViewParameters, ViewUpdate};

#[derive(Debug, Clone)]
pub struct ResultStore {
    results: Arc<[ResultItem]>,
    received: bool,
    params: ViewParameters,
    query_text: String,
}

impl ResultStore {
    /// Empty store for a query; the initial sort follows the query's preference.
    pub fn new(query_text: impl Into<String>, sort: SortOrder) -> Self {
        Self {
            results: Arc::from(Vec::new()),
            received: false,
            params: ViewParameters::sorted_by(sort),
            query_text: query_text.into(),
        }
    }

    pub fn replace_results(&mut self, items: Vec<ResultItem>) {
        debug!(count = items.len(), "replacing result set");
        self.results = Arc::from(items);
        self.received = true;
    }

    /// Unfiltered backing list.
    pub fn current_results(&self) -> Arc<[ResultItem]> {
        Arc::clone(&self.results)
    }

    /// `true` once a results frame has been stored, even an empty one.
    pub fn has_results(&self) -> bool {
        self.received
    }

    pub fn view_parameters(&self) -> &ViewParameters {
        &self.params
    }

    pub fn set_view_parameters(&mut self, update: &ViewUpdate) -> &ViewParameters {
        update.apply_to(&mut self.params);
        &self.params
    }

    /// Project with the stored parameters.
    pub fn view(&self) -> ProjectedView {
        self.project_with(&self.params)
    }

    /// Project with caller-owned parameters; the stored ones are untouched.
    pub fn project_with(&self, params: &ViewParameters) -> ProjectedView {
        project(&self.results, params, &self.query_text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SourceId;

    fn item(name: &str, price: f64) -> ResultItem {
        ResultItem {
            name: name.to_string(),
            price,
            source: SourceId::new("metro"),
            discount_percent: None,
            image_url: None,
            detail_url: String::new(),
        }
    }

    #[test]
    fn replace_is_wholesale() {
        let mut store = ResultStore::new("tv", SortOrder::None);
        assert!(!store.has_results());
        store.replace_results(vec![item("a", 1.0), item("b", 2.0)]);
        store.replace_results(vec![item("c", 3.0)]);
        assert_eq!(store.current_results().len(), 1);
        assert_eq!(store.current_results()[0].name, "c");
    }

    #[test]
    fn earlier_snapshot_survives_replacement() {
        let mut store = ResultStore::new("tv", SortOrder::None);
        store.replace_results(vec![item("a", 1.0), item("b", 2.0)]);
        let snapshot = store.current_results();
        store.replace_results(Vec::new());
        assert_eq!(snapshot.len(), 2);
        assert!(store.current_results().is_empty());
        assert!(store.has_results());
    }

    #[test]
    fn initial_sort_follows_query_and_updates_reset_page() {
        let mut store = ResultStore::new("tv", SortOrder::PriceDesc);
        assert_eq!(store.view_parameters().sort, SortOrder::PriceDesc);

        store.set_view_parameters(&ViewUpdate::page(3));
        assert_eq!(store.view_parameters().page, 3);
        let params = store.set_view_parameters(&ViewUpdate::sort(SortOrder::PriceAsc));
        assert_eq!(params.page, 1);
        assert_eq!(params.sort, SortOrder::PriceAsc);
    }

    #[test]
    fn view_uses_stored_parameters() {
        let mut store = ResultStore::new("tv", SortOrder::PriceAsc);
        store.replace_results(vec![item("b", 2.0), item("a", 1.0)]);
        let view = store.view();
        assert_eq!(view.page_items[0].name, "a");

        let params = ViewParameters::sorted_by(SortOrder::PriceDesc);
        assert_eq!(store.project_with(&params).page_items[0].name, "b");
        assert_eq!(store.view_parameters().sort, SortOrder::PriceAsc);
    }
}

//! View projection: filter → sort → paginate over the full result set.
//!
//! [`project`] is a pure function of its inputs. It is recomputed on every
//! parameter change or result replacement and never re-queries the backend.
//!
//! # Recommended score
//!
//! ```text
//! score = discount(or 0) × 5 + keyword_matches × 2 − price / 100
//! ```
//!
//! `keyword_matches` counts the whitespace-separated tokens of the lower-cased
//! query (duplicates included) that occur as substrings of the lower-cased
//! item name. The price penalty applies unconditionally, so very expensive
//! items can rank below cheap irrelevant ones.

use serde::Serialize;

use crate::models::{ResultItem, SortOrder, SourceId};

/// Items per page.
pub const PAGE_SIZE: usize = 16;

/// Pages shown on each side of the current one in a [`PageWindow`].
const WINDOW_RADIUS: usize = 2;

/// Filter, sort, and page selection owned by the presentation layer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ViewParameters {
    pub source_filter: Option<SourceId>,
    pub price_min: f64,
    pub price_max: f64,
    pub sort: SortOrder,
    pub page: usize,
}

impl Default for ViewParameters {
    fn default() -> Self {
        Self {
            source_filter: None,
            price_min: 0.0,
            price_max: f64::INFINITY,
            sort: SortOrder::None,
            page: 1,
        }
    }
}

impl ViewParameters {
    pub fn sorted_by(sort: SortOrder) -> Self {
        Self {
            sort,
            ..Self::default()
        }
    }

    fn accepts(&self, item: &ResultItem) -> bool {
        let source_ok = self
            .source_filter
            .as_ref()
            .map_or(true, |source| &item.source == source);
        source_ok && self.price_min <= item.price && item.price <= self.price_max
    }
}

/// A partial change to [`ViewParameters`].
///
/// `source_filter: Some(None)` clears the filter; `None` leaves it alone.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ViewUpdate {
    pub source_filter: Option<Option<SourceId>>,
    pub price_min: Option<f64>,
    pub price_max: Option<f64>,
    pub sort: Option<SortOrder>,
    pub page: Option<usize>,
}

impl ViewUpdate {
    pub fn page(page: usize) -> Self {
        Self {
            page: Some(page),
            ..Self::default()
        }
    }

    pub fn sort(sort: SortOrder) -> Self {
        Self {
            sort: Some(sort),
            ..Self::default()
        }
    }

    pub fn source(source: Option<SourceId>) -> Self {
        Self {
            source_filter: Some(source),
            ..Self::default()
        }
    }

    pub fn price_range(min: Option<f64>, max: Option<f64>) -> Self {
        Self {
            price_min: min,
            price_max: max,
            ..Self::default()
        }
    }

    /// Whether the update touches anything besides the page.
    pub fn changes_selection(&self) -> bool {
        self.source_filter.is_some()
            || self.price_min.is_some()
            || self.price_max.is_some()
            || self.sort.is_some()
    }

    /// Merge into `params`. Any selection change sends the view back to
    /// page 1, overriding a page carried by the same update.
    pub fn apply_to(&self, params: &mut ViewParameters) {
        if let Some(source) = &self.source_filter {
            params.source_filter = source.clone();
        }
        if let Some(min) = self.price_min {
            params.price_min = min;
        }
        if let Some(max) = self.price_max {
            params.price_max = max;
        }
        if let Some(sort) = self.sort {
            params.sort = sort;
        }
        if self.changes_selection() {
            params.page = 1;
        } else if let Some(page) = self.page {
            params.page = page.max(1);
        }
    }
}

/// The derived view handed to the presentation layer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProjectedView {
    pub page_items: Vec<ResultItem>,
    pub total_matching: usize,
    pub total_pages: usize,
    /// Effective page after clamping the requested one into range.
    pub page: usize,
}

impl ProjectedView {
    pub fn window(&self) -> PageWindow {
        page_window(self.page, self.total_pages)
    }
}

/// Compute the filtered, sorted, paginated view.
///
/// `query_text` feeds the keyword component of the recommended score and is
/// ignored by every other sort order.
pub fn project(items: &[ResultItem], params: &ViewParameters, query_text: &str) -> ProjectedView {
    let mut matching: Vec<&ResultItem> = items.iter().filter(|i| params.accepts(i)).collect();

    match params.sort {
        SortOrder::PriceAsc => matching.sort_by(|a, b| a.price.total_cmp(&b.price)),
        SortOrder::PriceDesc => matching.sort_by(|a, b| b.price.total_cmp(&a.price)),
        SortOrder::DiscountDesc => {
            matching.sort_by_key(|i| std::cmp::Reverse(i.discount_percent.unwrap_or(-1)))
        }
        SortOrder::Recommended => {
            let tokens = query_tokens(query_text);
            let mut scored: Vec<(f64, &ResultItem)> = matching
                .into_iter()
                .map(|i| (recommended_score(i, &tokens), i))
                .collect();
            scored.sort_by(|a, b| b.0.total_cmp(&a.0));
            matching = scored.into_iter().map(|(_, i)| i).collect();
        }
        SortOrder::None => {}
    }

    let total_matching = matching.len();
    let total_pages = total_matching.div_ceil(PAGE_SIZE);
    let page = params.page.clamp(1, total_pages.max(1));
    let start = (page - 1) * PAGE_SIZE;
    let end = (start + PAGE_SIZE).min(total_matching);

    ProjectedView {
        page_items: matching[start.min(end)..end]
            .iter()
            .map(|i| (*i).clone())
            .collect(),
        total_matching,
        total_pages,
        page,
    }
}

/// Lower-cased whitespace-separated query tokens.
pub fn query_tokens(query_text: &str) -> Vec<String> {
    query_text
        .to_lowercase()
        .split_whitespace()
        .map(str::to_string)
        .collect()
}

/// Number of query tokens that occur in the item name.
pub fn keyword_matches(name: &str, tokens: &[String]) -> usize {
    let name = name.to_lowercase();
    tokens.iter().filter(|t| name.contains(t.as_str())).count()
}

pub fn recommended_score(item: &ResultItem, tokens: &[String]) -> f64 {
    let discount = item.discount_percent.unwrap_or(0) as f64;
    discount * 5.0 + keyword_matches(&item.name, tokens) as f64 * 2.0 - item.price / 100.0
}

/// One entry of a pagination control.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "page", rename_all = "lowercase")]
pub enum PageLink {
    Page(usize),
    Current(usize),
    Ellipsis,
}

/// Pagination control layout: previous/next targets plus the page links
/// around the current page, with the first and last page always reachable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageWindow {
    pub prev: Option<usize>,
    pub next: Option<usize>,
    pub links: Vec<PageLink>,
}

pub fn page_window(current: usize, total_pages: usize) -> PageWindow {
    let mut links = Vec::new();
    if total_pages == 0 {
        return PageWindow {
            prev: None,
            next: None,
            links,
        };
    }

    let current = current.clamp(1, total_pages);
    let start = current.saturating_sub(WINDOW_RADIUS).max(1);
    let end = (current + WINDOW_RADIUS).min(total_pages);

    if start > 1 {
        links.push(PageLink::Page(1));
        if start > 2 {
            links.push(PageLink::Ellipsis);
        }
    }
    for n in start..=end {
        links.push(if n == current {
            PageLink::Current(n)
        } else {
            PageLink::Page(n)
        });
    }
    if end < total_pages {
        if end + 1 < total_pages {
            links.push(PageLink::Ellipsis);
        }
        links.push(PageLink::Page(total_pages));
    }

    PageWindow {
        prev: (current > 1).then(|| current - 1),
        next: (current < total_pages).then(|| current + 1),
        links,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(name: &str, price: f64, source: &str, discount: Option<i64>) -> ResultItem {
        ResultItem {
            name: name.to_string(),
            price,
            source: SourceId::new(source),
            discount_percent: discount,
            image_url: None,
            detail_url: format!("https://example.test/{}", name.replace(' ', "-")),
        }
    }

    fn names(view: &ProjectedView) -> Vec<&str> {
        view.page_items.iter().map(|i| i.name.as_str()).collect()
    }

    fn catalog(n: usize) -> Vec<ResultItem> {
        (0..n)
            .map(|i| item(&format!("item {}", i), 10.0 + i as f64, "ripley", None))
            .collect()
    }

    #[test]
    fn recommended_scenario_from_zapatillas_query() {
        let items = vec![
            item("casaca", 50.0, "ripley", None),
            item("zapatillas nike", 200.0, "falabella", Some(10)),
        ];
        let tokens = query_tokens("zapatillas");
        assert!((recommended_score(&items[1], &tokens) - 50.0).abs() < 1e-9);
        assert!((recommended_score(&items[0], &tokens) + 0.5).abs() < 1e-9);

        let view = project(
            &items,
            &ViewParameters::sorted_by(SortOrder::Recommended),
            "zapatillas",
        );
        assert_eq!(names(&view), vec!["zapatillas nike", "casaca"]);
    }

    #[test]
    fn duplicate_query_tokens_count_twice() {
        let tokens = query_tokens("Nike  nike");
        assert_eq!(tokens.len(), 2);
        assert_eq!(keyword_matches("Zapatillas NIKE Air", &tokens), 2);
        assert_eq!(keyword_matches("Casaca", &tokens), 0);
    }

    #[test]
    fn second_page_of_twenty() {
        let items = catalog(20);
        let params = ViewParameters {
            page: 2,
            ..ViewParameters::default()
        };
        let view = project(&items, &params, "");
        assert_eq!(view.total_matching, 20);
        assert_eq!(view.total_pages, 2);
        assert_eq!(view.page, 2);
        assert_eq!(view.page_items, items[16..20].to_vec());
    }

    #[test]
    fn page_is_bounded_and_empty_only_without_matches() {
        let items = catalog(40);
        for page in [1, 2, 3, 4, 99] {
            let params = ViewParameters {
                page,
                ..ViewParameters::default()
            };
            let view = project(&items, &params, "");
            assert!(view.page_items.len() <= PAGE_SIZE);
            assert!(!view.page_items.is_empty());
        }

        let params = ViewParameters {
            price_min: 1000.0,
            page: 3,
            ..ViewParameters::default()
        };
        let view = project(&items, &params, "");
        assert_eq!(view.total_matching, 0);
        assert_eq!(view.total_pages, 0);
        assert!(view.page_items.is_empty());
        assert_eq!(view.page, 1);
    }

    #[test]
    fn filters_by_source_and_inclusive_price_range() {
        let items = vec![
            item("a", 10.0, "ripley", None),
            item("b", 20.0, "metro", None),
            item("c", 30.0, "ripley", None),
            item("d", 40.0, "ripley", None),
        ];
        let params = ViewParameters {
            source_filter: Some(SourceId::new("Ripley")),
            price_min: 10.0,
            price_max: 30.0,
            ..ViewParameters::default()
        };
        let view = project(&items, &params, "");
        assert_eq!(names(&view), vec!["a", "c"]);
    }

    #[test]
    fn price_desc_reverses_price_asc() {
        let items = vec![
            item("a", 30.0, "ripley", None),
            item("b", 10.0, "metro", None),
            item("c", 20.0, "oechsle", None),
            item("d", 5.5, "metro", None),
        ];
        let asc = project(&items, &ViewParameters::sorted_by(SortOrder::PriceAsc), "");
        let desc = project(&items, &ViewParameters::sorted_by(SortOrder::PriceDesc), "");
        let mut reversed = names(&asc);
        reversed.reverse();
        assert_eq!(names(&desc), reversed);
        assert_eq!(names(&asc), vec!["d", "b", "c", "a"]);
    }

    #[test]
    fn discount_desc_puts_discounted_items_first() {
        let items = vec![
            item("cheap plain", 1.0, "metro", None),
            item("zero off", 500.0, "metro", Some(0)),
            item("half off", 900.0, "metro", Some(50)),
            item("other plain", 2.0, "metro", None),
        ];
        let view = project(&items, &ViewParameters::sorted_by(SortOrder::DiscountDesc), "");
        assert_eq!(
            names(&view),
            vec!["half off", "zero off", "cheap plain", "other plain"]
        );
    }

    #[test]
    fn none_preserves_arrival_order() {
        let items = vec![
            item("z", 3.0, "metro", None),
            item("a", 1.0, "metro", Some(20)),
        ];
        let view = project(&items, &ViewParameters::default(), "a");
        assert_eq!(names(&view), vec!["z", "a"]);
    }

    #[test]
    fn projection_is_deterministic() {
        let items = catalog(37);
        let params = ViewParameters {
            sort: SortOrder::Recommended,
            page: 2,
            ..ViewParameters::default()
        };
        assert_eq!(
            project(&items, &params, "item 3"),
            project(&items, &params, "item 3")
        );
    }

    #[test]
    fn selection_changes_reset_page() {
        let updates = [
            ViewUpdate::source(Some(SourceId::new("metro"))),
            ViewUpdate::source(None),
            ViewUpdate::price_range(Some(5.0), None),
            ViewUpdate::price_range(None, Some(50.0)),
            ViewUpdate::sort(SortOrder::PriceAsc),
        ];
        for update in updates {
            let mut params = ViewParameters {
                page: 4,
                ..ViewParameters::default()
            };
            update.apply_to(&mut params);
            assert_eq!(params.page, 1, "{:?} did not reset the page", update);
        }

        let mut params = ViewParameters::default();
        ViewUpdate::page(3).apply_to(&mut params);
        assert_eq!(params.page, 3);
        ViewUpdate::page(0).apply_to(&mut params);
        assert_eq!(params.page, 1);
    }

    #[test]
    fn window_around_middle_page() {
        let w = page_window(6, 12);
        assert_eq!(w.prev, Some(5));
        assert_eq!(w.next, Some(7));
        assert_eq!(
            w.links,
            vec![
                PageLink::Page(1),
                PageLink::Ellipsis,
                PageLink::Page(4),
                PageLink::Page(5),
                PageLink::Current(6),
                PageLink::Page(7),
                PageLink::Page(8),
                PageLink::Ellipsis,
                PageLink::Page(12),
            ]
        );
    }

    #[test]
    fn window_edges() {
        let first = page_window(1, 4);
        assert_eq!(first.prev, None);
        assert_eq!(
            first.links,
            vec![
                PageLink::Current(1),
                PageLink::Page(2),
                PageLink::Page(3),
                PageLink::Page(4),
            ]
        );

        let near_start = page_window(4, 6);
        assert_eq!(near_start.links[0], PageLink::Page(1));
        assert_eq!(near_start.links[1], PageLink::Page(2));
        assert_eq!(near_start.next, Some(5));

        let last = page_window(6, 6);
        assert_eq!(last.next, None);
        assert_eq!(page_window(1, 0).links, Vec::new());
    }
}

//! Page slicing and navigation metadata for list endpoints.

use serde::Serialize;
use std::num::IntErrorKind;

pub const DEFAULT_PAGE: usize = 1;
pub const DEFAULT_PER_PAGE: usize = 10;
pub const MAX_PER_PAGE: usize = 100;

/// A clamped `(page, per_page)` pair. Never invalid once constructed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    page: usize,
    per_page: usize,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: DEFAULT_PAGE,
            per_page: DEFAULT_PER_PAGE,
        }
    }
}

impl PageRequest {
    pub fn new(page: usize, per_page: usize) -> Self {
        Self {
            page: page.max(1),
            per_page: per_page.clamp(1, MAX_PER_PAGE),
        }
    }

    /// Builds a request from raw query-string values.
    ///
    /// Missing or non-numeric values fall back to the defaults; numeric values
    /// outside the allowed range are clamped. This never fails.
    pub fn from_query(page: Option<&str>, per_page: Option<&str>) -> Self {
        let page = parse_number(page)
            .map(|p| usize::try_from(p.max(1)).unwrap_or(usize::MAX))
            .unwrap_or(DEFAULT_PAGE);
        let per_page = parse_number(per_page)
            .map(|p| p.clamp(1, MAX_PER_PAGE as i64) as usize)
            .unwrap_or(DEFAULT_PER_PAGE);
        Self { page, per_page }
    }

    pub fn page(&self) -> usize {
        self.page
    }

    pub fn per_page(&self) -> usize {
        self.per_page
    }
}

/// Integers too large for `i64` saturate so they still clamp to a bound.
fn parse_number(raw: Option<&str>) -> Option<i64> {
    match raw?.trim().parse::<i64>() {
        Ok(value) => Some(value),
        Err(e) => match e.kind() {
            IntErrorKind::PosOverflow => Some(i64::MAX),
            IntErrorKind::NegOverflow => Some(i64::MIN),
            _ => None,
        },
    }
}

/// Navigation metadata of a page envelope.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct PageMetadata {
    pub total_items: usize,
    pub total_pages: usize,
    pub current_page: usize,
    pub per_page: usize,
    pub first_page: String,
    pub last_page: String,
    pub next_page: Option<String>,
    pub prev_page: Option<String>,
}

/// The `{data, metadata}` envelope returned by list endpoints.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub data: Vec<T>,
    pub metadata: PageMetadata,
}

/// Slices `items` for `request` and computes the navigation links.
///
/// `total_pages` is at least 1 even for an empty collection. A page past the
/// end yields an empty `data` slice; its navigation links are computed as if
/// the last page had been requested.
pub fn paginate<T: Clone>(items: &[T], request: PageRequest, base_url: &str) -> Page<T> {
    let per_page = request.per_page();
    let total_items = items.len();
    let total_pages = total_items.div_ceil(per_page).max(1);

    let start = (request.page() - 1).saturating_mul(per_page);
    let data = if start >= total_items {
        Vec::new()
    } else {
        let end = start.saturating_add(per_page).min(total_items);
        items[start..end].to_vec()
    };

    let current_page = request.page().min(total_pages);
    let page_url = |page: usize| format!("{}?page={}&per_page={}", base_url, page, per_page);

    Page {
        data,
        metadata: PageMetadata {
            total_items,
            total_pages,
            current_page,
            per_page,
            first_page: page_url(1),
            last_page: page_url(total_pages),
            next_page: (current_page < total_pages).then(|| page_url(current_page + 1)),
            prev_page: (current_page > 1).then(|| page_url(current_page - 1)),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = "http://localhost:3000/users";

    fn items(n: usize) -> Vec<usize> {
        (1..=n).collect()
    }

    #[test]
    fn query_parsing_clamps_and_defaults() {
        assert_eq!(PageRequest::from_query(None, None), PageRequest::default());
        let req = PageRequest::from_query(Some("3"), Some("25"));
        assert_eq!((req.page(), req.per_page()), (3, 25));

        let req = PageRequest::from_query(Some("0"), Some("1000"));
        assert_eq!((req.page(), req.per_page()), (1, MAX_PER_PAGE));

        let req = PageRequest::from_query(Some("-4"), Some("0"));
        assert_eq!((req.page(), req.per_page()), (1, 1));

        let req = PageRequest::from_query(
            Some("-99999999999999999999"),
            Some("99999999999999999999"),
        );
        assert_eq!((req.page(), req.per_page()), (1, MAX_PER_PAGE));

        let req = PageRequest::from_query(Some("99999999999999999999"), None);
        assert_eq!(req.page(), usize::try_from(i64::MAX).unwrap_or(usize::MAX));

        let req = PageRequest::from_query(Some("two"), Some("lots"));
        assert_eq!((req.page(), req.per_page()), (DEFAULT_PAGE, DEFAULT_PER_PAGE));
    }

    #[test]
    fn last_partial_page() {
        let page = paginate(&items(25), PageRequest::new(3, 10), BASE);
        assert_eq!(page.data, vec![21, 22, 23, 24, 25]);
        assert_eq!(page.metadata.total_items, 25);
        assert_eq!(page.metadata.total_pages, 3);
        assert_eq!(page.metadata.current_page, 3);
        assert_eq!(page.metadata.next_page, None);
        assert_eq!(
            page.metadata.prev_page.as_deref(),
            Some("http://localhost:3000/users?page=2&per_page=10")
        );
        assert_eq!(
            page.metadata.first_page,
            "http://localhost:3000/users?page=1&per_page=10"
        );
        assert_eq!(
            page.metadata.last_page,
            "http://localhost:3000/users?page=3&per_page=10"
        );
    }

    #[test]
    fn page_past_the_end_is_empty_not_an_error() {
        let page = paginate(&items(25), PageRequest::new(4, 10), BASE);
        assert!(page.data.is_empty());
        assert_eq!(page.metadata.total_pages, 3);
        assert_eq!(page.metadata.next_page, None);

        let page = paginate(&items(25), PageRequest::new(usize::MAX, 10), BASE);
        assert!(page.data.is_empty());
    }

    #[test]
    fn first_page_links() {
        let page = paginate(&items(25), PageRequest::default(), BASE);
        assert_eq!(page.data.len(), 10);
        assert_eq!(page.metadata.prev_page, None);
        assert_eq!(
            page.metadata.next_page.as_deref(),
            Some("http://localhost:3000/users?page=2&per_page=10")
        );
    }

    #[test]
    fn empty_collection_has_one_page() {
        let page = paginate::<usize>(&[], PageRequest::default(), "/devices");
        assert!(page.data.is_empty());
        assert_eq!(page.metadata.total_items, 0);
        assert_eq!(page.metadata.total_pages, 1);
        assert_eq!(page.metadata.last_page, "/devices?page=1&per_page=10");
        assert_eq!(page.metadata.next_page, None);
        assert_eq!(page.metadata.prev_page, None);
    }

    #[test]
    fn paginate_is_idempotent() {
        let all = items(37);
        for page in 1..6 {
            for per_page in [1, 7, 10, 100] {
                let req = PageRequest::new(page, per_page);
                assert_eq!(paginate(&all, req, BASE), paginate(&all, req, BASE));
            }
        }
    }
}

//! # Page-Number Pagination
//!
//! List endpoints accept `?page=N&page_size=M` and answer with
//! `{count, next, previous, results}`. Page 1 always exists, even for an
//! empty collection; any other page past the end is a 404.

use serde::{Deserialize, Serialize};
use utoipa::IntoParams;

use crate::error::AppError;

/// Default page size.
pub const DEFAULT_PAGE_SIZE: usize = 5;
/// Largest page size a client may request.
pub const MAX_PAGE_SIZE: usize = 100;

/// Pagination query parameters.
#[derive(Debug, Clone, Copy, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PageQuery {
    /// 1-based page number (default 1).
    pub page: Option<usize>,
    /// Items per page (default 5, max 100).
    pub page_size: Option<usize>,
}

/// One page of results.
#[derive(Debug, Serialize, Deserialize)]
pub struct Page<T> {
    /// Total number of items across all pages.
    pub count: usize,
    /// Next page number, if any.
    pub next: Option<usize>,
    /// Previous page number, if any.
    pub previous: Option<usize>,
    /// Items on this page.
    pub results: Vec<T>,
}

impl<T> Page<T> {
    /// Convert every item on the page, keeping the page metadata.
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            count: self.count,
            next: self.next,
            previous: self.previous,
            results: self.results.into_iter().map(f).collect(),
        }
    }
}

impl PageQuery {
    fn page_size(&self) -> usize {
        match self.page_size {
            None | Some(0) => DEFAULT_PAGE_SIZE,
            Some(n) => n.min(MAX_PAGE_SIZE),
        }
    }

    /// Slice `items` (already ordered) to the requested page.
    pub fn paginate<T>(&self, items: Vec<T>) -> Result<Page<T>, AppError> {
        let page = self.page.unwrap_or(1);
        let size = self.page_size();
        let count = items.len();
        let pages = count.div_ceil(size).max(1);

        if page == 0 || page > pages {
            return Err(AppError::NotFound("Invalid page.".into()));
        }

        let results = items.into_iter().skip((page - 1) * size).take(size).collect();
        Ok(Page {
            count,
            next: (page < pages).then_some(page + 1),
            previous: (page > 1).then(|| page - 1),
            results,
        })
    }
}

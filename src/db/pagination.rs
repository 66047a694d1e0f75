//! Shared pagination types for list queries.

use crate::config::PaginationConfig;
use serde::Serialize;

/// Normalized page request: 1-based page, size clamped to configured bounds.
#[derive(Debug, Clone, Copy)]
pub struct PageParams {
    pub page: u32,
    pub page_size: u32,
}

impl PageParams {
    pub fn clamped(page: Option<u32>, page_size: Option<u32>, config: &PaginationConfig) -> Self {
        let page = page.unwrap_or(1).max(1);
        let page_size = page_size
            .unwrap_or(config.default_page_size)
            .clamp(config.min_page_size, config.max_page_size);
        Self { page, page_size }
    }

    pub fn offset(&self) -> i64 {
        (self.page as i64 - 1) * self.page_size as i64
    }

    pub fn limit(&self) -> i64 {
        self.page_size as i64
    }
}

/// One page of results plus totals.
#[derive(Debug, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub total_pages: i64,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, total: i64, page_size: u32) -> Self {
        Self {
            items,
            total,
            total_pages: total_pages(total, page_size),
        }
    }
}

/// `ceil(total / page_size)`.
pub fn total_pages(total: i64, page_size: u32) -> i64 {
    if page_size == 0 {
        return 0;
    }
    (total + page_size as i64 - 1) / page_size as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> PaginationConfig {
        PaginationConfig {
            default_page_size: 10,
            min_page_size: 1,
            max_page_size: 100,
        }
    }

    #[test]
    fn test_clamped_defaults() {
        let params = PageParams::clamped(None, None, &config());
        assert_eq!(params.page, 1);
        assert_eq!(params.page_size, 10);
        assert_eq!(params.offset(), 0);
    }

    #[test]
    fn test_clamped_bounds() {
        let params = PageParams::clamped(Some(0), Some(5000), &config());
        assert_eq!(params.page, 1);
        assert_eq!(params.page_size, 100);

        let params = PageParams::clamped(Some(3), Some(0), &config());
        assert_eq!(params.page, 3);
        assert_eq!(params.page_size, 1);
        assert_eq!(params.offset(), 2);
    }

    #[test]
    fn test_total_pages_ceiling() {
        assert_eq!(total_pages(0, 10), 0);
        assert_eq!(total_pages(1, 10), 1);
        assert_eq!(total_pages(10, 10), 1);
        assert_eq!(total_pages(11, 10), 2);
        assert_eq!(total_pages(101, 10), 11);
    }
}

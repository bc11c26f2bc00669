//! Shared pagination contract for list endpoints

use serde::Serialize;
use utoipa::ToSchema;

pub const DEFAULT_PAGE_INDEX: i64 = 1;
pub const DEFAULT_PAGE_SIZE: i64 = 10;
pub const MAX_PAGE_SIZE: i64 = 100;

/// Normalized 1-based page request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub page_index: i64,
    pub page_size: i64,
}

impl Pagination {
    /// Apply defaults and clamp out-of-range values
    pub fn new(page_index: Option<i64>, page_size: Option<i64>) -> Self {
        Self {
            page_index: page_index.unwrap_or(DEFAULT_PAGE_INDEX).max(1),
            page_size: page_size.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE),
        }
    }

    /// Rows to skip; saturates instead of overflowing on huge page numbers
    pub fn offset(&self) -> i64 {
        (self.page_index - 1).saturating_mul(self.page_size)
    }

    pub fn limit(&self) -> i64 {
        self.page_size
    }

    pub fn into_response<T>(self, items: Vec<T>, total_count: i64) -> PaginatedResponse<T>
    where
        T: for<'a> ToSchema<'a>,
    {
        PaginatedResponse {
            items,
            total_count,
            page_index: self.page_index,
            page_size: self.page_size,
        }
    }
}

impl Default for Pagination {
    fn default() -> Self {
        Self::new(None, None)
    }
}

/// Paginated response wrapper
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PaginatedResponse<T>
where
    T: for<'a> ToSchema<'a>,
{
    /// Items of the requested page
    pub items: Vec<T>,
    /// Number of matching rows before paging
    pub total_count: i64,
    /// Current page number (1-based)
    pub page_index: i64,
    /// Items per page
    pub page_size: i64,
}

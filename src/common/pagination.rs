//! Page/size query parameters shared by list endpoints.

use serde::{Deserialize, Serialize};

/// Raw pagination query; missing values fall back to per-endpoint defaults.
#[derive(Clone, Copy, Debug, Default, Deserialize)]
pub struct PageQuery {
    /// 1-based page number.
    pub page: Option<i64>,
    /// Items per page.
    pub size: Option<i64>,
}

/// Bounds applied to a [`PageQuery`].
#[derive(Clone, Copy, Debug)]
pub struct PageLimits {
    /// Size used when the query omits it.
    pub default_size: usize,
    /// Largest accepted size.
    pub max_size: usize,
}

impl PageLimits {
    /// Limits for the conversation list.
    pub const CONVERSATIONS: Self = Self {
        default_size: 20,
        max_size: 100,
    };

    /// Limits for messages inside one conversation.
    pub const MESSAGES: Self = Self {
        default_size: 100,
        max_size: 500,
    };
}

/// Validation failure for pagination input.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PageError {
    /// Page below 1.
    #[error("page must be >= 1, got {0}")]
    Page(i64),
    /// Size outside `1..=max`.
    #[error("size must be between 1 and {max}, got {got}")]
    Size {
        /// Largest accepted size.
        max: usize,
        /// Size received.
        got: i64,
    },
}

/// Validated pagination parameters.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct PageParams {
    /// 1-based page number.
    pub page: usize,
    /// Items per page.
    pub size: usize,
}

impl PageParams {
    /// Validate a query against the given limits.
    ///
    /// # Errors
    /// Returns `PageError` if page is below 1 or size falls outside the limits.
    pub fn from_query(query: PageQuery, limits: PageLimits) -> Result<Self, PageError> {
        let page = query.page.unwrap_or(1);
        let page = usize::try_from(page)
            .ok()
            .filter(|p| *p >= 1)
            .ok_or(PageError::Page(page))?;

        let raw_size = query
            .size
            .unwrap_or_else(|| i64::try_from(limits.default_size).unwrap_or(i64::MAX));
        let size = usize::try_from(raw_size)
            .ok()
            .filter(|s| (1..=limits.max_size).contains(s))
            .ok_or(PageError::Size {
                max: limits.max_size,
                got: raw_size,
            })?;

        Ok(Self { page, size })
    }

    /// Select this page out of `items`, clamped to the slice bounds.
    #[must_use]
    pub fn slice<'a, T>(&self, items: &'a [T]) -> &'a [T] {
        let start = (self.page - 1).saturating_mul(self.size).min(items.len());
        let end = start.saturating_add(self.size).min(items.len());
        &items[start..end]
    }

    /// Build the metadata block for a collection of `total` items.
    #[must_use]
    pub const fn meta(&self, total: usize) -> PageMeta {
        PageMeta {
            page: self.page,
            size: self.size,
            total,
        }
    }
}

/// Pagination metadata returned alongside a page.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageMeta {
    /// 1-based page number.
    pub page: usize,
    /// Items per page.
    pub size: usize,
    /// Total number of items across all pages.
    pub total: usize,
}

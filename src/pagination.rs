//! Page window resolution and navigation link offsets.

/// Largest offset a backend is handed; SQL backends bind `OFFSET` as a signed 64-bit value
pub const MAX_OFFSET: u64 = i64::MAX.unsigned_abs();

/// Effective `limit` and `offset` of one page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    pub limit: u64,
    pub offset: u64,
}

impl PageWindow {
    /// Resolve the page window from the already validated request parameters.
    ///
    /// # Arguments
    ///
    /// * `limit` - Explicit page size; takes precedence over `page_size`.
    /// * `offset` - Explicit number of items to skip; takes precedence over `page`.
    /// * `page` - Zero-based page number, multiplied by the effective limit.
    /// * `page_size` - Page size in the `page`/`page_size` vocabulary.
    /// * `default_limit` - Page size when neither `limit` nor `page_size` is given.
    ///
    /// The offset is capped at [`MAX_OFFSET`]; a page that far out is empty anyway.
    #[must_use]
    pub fn resolve(
        limit: Option<u64>,
        offset: Option<u64>,
        page: Option<u64>,
        page_size: Option<u64>,
        default_limit: u64,
    ) -> Self {
        let limit = limit.or(page_size).unwrap_or(default_limit).max(1);
        let offset = offset
            .or_else(|| page.map(|page| page.saturating_mul(limit)))
            .unwrap_or(0)
            .min(MAX_OFFSET);

        Self { limit, offset }
    }
}

/// Offsets of the navigation links for one page. `None` means the link is omitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PageOffsets {
    pub first: Option<u64>,
    pub prev: Option<u64>,
    pub next: Option<u64>,
    pub last: Option<u64>,
}

impl PageOffsets {
    /// Calculate which navigation links a page gets, and where they point.
    ///
    /// - `first` and `last` only when the collection spans more than one page
    /// - `prev` whenever `offset > 0`, clamped to 0
    /// - `next` while items remain after this page
    ///
    /// `last` is the offset of the last page on the `limit` grid counted from 0, so it
    /// can differ from `offset + k * limit` when `offset` is not a multiple of `limit`.
    #[must_use]
    pub fn calculate(total: u64, limit: u64, offset: u64) -> Self {
        let limit = limit.max(1);
        let total_pages = total.div_ceil(limit);
        let multiple_pages = total_pages > 1;

        Self {
            first: multiple_pages.then_some(0),
            prev: (offset > 0).then(|| offset.saturating_sub(limit)),
            next: (offset.saturating_add(limit) < total).then(|| offset + limit),
            last: multiple_pages.then(|| (total - 1) / limit * limit),
        }
    }
}

//! Scroll-based reading progress and approximate pagination.
//!
//! A chapter is one continuously scrollable document; a "page" is one
//! viewport of it. Page boundaries may fall mid-paragraph.
//!
//! Snapshots are pull-based: recompute whenever the rendering surface
//! reports new scroll, content or viewport measurements (scroll, resize,
//! font size or line height changes).

/// Raw measurements reported by the rendering surface.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ScrollMetrics {
    /// Current scroll offset from the top.
    pub scroll_offset: u64,
    /// Total scrollable content extent.
    pub content_extent: u64,
    /// Visible viewport extent.
    pub viewport_extent: u64,
}

impl ScrollMetrics {
    /// Bundle raw measurements.
    pub fn new(scroll_offset: u64, content_extent: u64, viewport_extent: u64) -> Self {
        Self {
            scroll_offset,
            content_extent,
            viewport_extent,
        }
    }
}

/// Derived progress for one set of measurements.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ProgressSnapshot {
    /// Scroll offset the snapshot was computed from.
    pub scroll_offset: u64,
    /// Largest reachable scroll offset.
    pub max_scroll: u64,
    /// Viewport extent the snapshot was computed from.
    pub viewport_extent: u64,
    /// Percent complete in `[0, 100]`.
    pub percent: f32,
    /// 1-based page index in `[1, total_pages]`.
    pub current_page: u64,
    /// Number of viewport-sized pages, at least 1.
    pub total_pages: u64,
}

impl Default for ProgressSnapshot {
    fn default() -> Self {
        Self::compute(ScrollMetrics::default())
    }
}

impl ProgressSnapshot {
    /// Derive progress from scroll measurements.
    ///
    /// A zero viewport yields a single page at 0%.
    ///
    /// # Example
    /// ```
    /// use bionic_reader::progress::{ProgressSnapshot, ScrollMetrics};
    ///
    /// let snap = ProgressSnapshot::compute(ScrollMetrics::new(850, 2400, 800));
    /// assert_eq!(snap.total_pages, 3);
    /// assert_eq!(snap.current_page, 2);
    /// assert_eq!(snap.percent, 53.125);
    /// ```
    pub fn compute(metrics: ScrollMetrics) -> Self {
        let ScrollMetrics {
            scroll_offset,
            content_extent,
            viewport_extent,
        } = metrics;
        let max_scroll = content_extent.saturating_sub(viewport_extent);

        if viewport_extent == 0 {
            return Self {
                scroll_offset,
                max_scroll,
                viewport_extent,
                percent: 0.0,
                current_page: 1,
                total_pages: 1,
            };
        }

        let percent = if max_scroll > 0 {
            ((scroll_offset as f64 / max_scroll as f64) * 100.0).clamp(0.0, 100.0) as f32
        } else {
            0.0
        };
        let total_pages = content_extent.div_ceil(viewport_extent).max(1);
        let current_page = (scroll_offset / viewport_extent)
            .saturating_add(1)
            .clamp(1, total_pages);

        Self {
            scroll_offset,
            max_scroll,
            viewport_extent,
            percent,
            current_page,
            total_pages,
        }
    }

    /// Fraction of the chapter's pages already passed, `(current_page - 1) / total_pages`.
    pub fn page_fraction(&self) -> f32 {
        (self.current_page - 1) as f32 / self.total_pages as f32
    }

    /// Scroll offset of the top of a 1-based page, clamped to `max_scroll`.
    pub fn page_offset(&self, page: u64) -> u64 {
        let page = page.clamp(1, self.total_pages);
        ((page - 1).saturating_mul(self.viewport_extent)).min(self.max_scroll)
    }

    /// Scroll offset for the next page, if there is one.
    pub fn next_page_offset(&self) -> Option<u64> {
        (self.current_page < self.total_pages).then(|| self.page_offset(self.current_page + 1))
    }

    /// Scroll offset for the previous page, if there is one.
    pub fn previous_page_offset(&self) -> Option<u64> {
        (self.current_page > 1).then(|| self.page_offset(self.current_page - 1))
    }

    /// Scroll offset corresponding to a percent complete.
    pub fn offset_for_percent(&self, percent: f32) -> u64 {
        if !percent.is_finite() {
            return 0;
        }
        let ratio = f64::from(percent.clamp(0.0, 100.0)) / 100.0;
        let offset = (ratio * self.max_scroll as f64 + 0.5) as u64;
        offset.min(self.max_scroll)
    }
}

/// Whole-book percent for a book loaded one chapter at a time.
///
/// `(chapters before the current one + current page fraction) / chapter_count * 100`,
/// clamped to `[0, 100]`. An empty book reports 0.
pub fn book_percent(chapter_index: usize, chapter_count: usize, current: &ProgressSnapshot) -> f32 {
    if chapter_count == 0 {
        return 0.0;
    }
    let completed = chapter_index.min(chapter_count - 1) as f32;
    ((completed + current.page_fraction()) / chapter_count as f32 * 100.0).clamp(0.0, 100.0)
}

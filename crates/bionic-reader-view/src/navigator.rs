use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use bionic_reader::{book_percent, ProgressSnapshot, ScrollMetrics};

use crate::reader_view::ViewError;

/// Cooperative cancellation signal for chapter loads.
pub trait CancelToken {
    fn is_cancelled(&self) -> bool;
}

/// Never-cancel token for default call paths.
#[derive(Clone, Copy, Debug, Default)]
pub struct NeverCancel;

impl CancelToken for NeverCancel {
    fn is_cancelled(&self) -> bool {
        false
    }
}

/// Receipt for one in-flight chapter load.
///
/// A ticket is superseded as soon as another load begins; it then reports
/// cancelled, and its result is rejected by [`ChapterNavigator::accept`].
#[derive(Clone, Debug)]
pub struct LoadTicket {
    chapter_index: usize,
    generation: u64,
    latest: Arc<AtomicU64>,
}

impl LoadTicket {
    /// Chapter this load was started for.
    pub fn chapter_index(&self) -> usize {
        self.chapter_index
    }
}

impl CancelToken for LoadTicket {
    fn is_cancelled(&self) -> bool {
        self.latest.load(Ordering::Acquire) != self.generation
    }
}

/// Result of handing a finished load back to the navigator.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LoadOutcome<T> {
    /// The load was current; the navigator moved to its chapter.
    Applied { chapter_index: usize, value: T },
    /// A newer navigation superseded this load; the value was dropped.
    Stale { chapter_index: usize },
}

/// Active chapter, in-flight load tracking and whole-book progress.
#[derive(Debug)]
pub struct ChapterNavigator {
    chapter_count: usize,
    current: usize,
    pending: Option<usize>,
    latest: Arc<AtomicU64>,
    snapshot: ProgressSnapshot,
}

impl ChapterNavigator {
    /// Navigator positioned on the first chapter, with nothing in flight.
    pub fn new(chapter_count: usize) -> Self {
        Self {
            chapter_count,
            current: 0,
            pending: None,
            latest: Arc::new(AtomicU64::new(0)),
            snapshot: ProgressSnapshot::default(),
        }
    }

    /// Number of chapters in the book.
    pub fn chapter_count(&self) -> usize {
        self.chapter_count
    }

    /// Chapter whose content is currently applied.
    pub fn current_chapter(&self) -> usize {
        self.current
    }

    /// Chapter of the newest unfinished load, if any.
    pub fn pending_chapter(&self) -> Option<usize> {
        self.pending
    }

    /// Start loading `index`, superseding any load still in flight.
    pub fn begin_load(&mut self, index: usize) -> Result<LoadTicket, ViewError> {
        if index >= self.chapter_count {
            return Err(ViewError::ChapterOutOfBounds {
                index,
                chapter_count: self.chapter_count,
            });
        }
        let generation = self.latest.fetch_add(1, Ordering::AcqRel) + 1;
        self.pending = Some(index);
        Ok(LoadTicket {
            chapter_index: index,
            generation,
            latest: Arc::clone(&self.latest),
        })
    }

    /// Start loading the chapter after the current one, if any.
    pub fn next_chapter(&mut self) -> Option<LoadTicket> {
        self.begin_load(self.current + 1).ok()
    }

    /// Start loading the chapter before the current one, if any.
    pub fn previous_chapter(&mut self) -> Option<LoadTicket> {
        let index = self.current.checked_sub(1)?;
        self.begin_load(index).ok()
    }

    /// Hand back a finished load.
    ///
    /// Only the newest ticket is applied; anything older is discarded so a
    /// slow response never overwrites a later navigation.
    pub fn accept<T>(&mut self, ticket: &LoadTicket, value: T) -> LoadOutcome<T> {
        self.accept_with_cancel(ticket, value, &NeverCancel)
    }

    /// Hand back a finished load unless `cancel` was triggered meanwhile.
    ///
    /// A cancelled load that is still the newest one clears the pending
    /// chapter and leaves the current chapter in place.
    pub fn accept_with_cancel<T, C>(
        &mut self,
        ticket: &LoadTicket,
        value: T,
        cancel: &C,
    ) -> LoadOutcome<T>
    where
        C: CancelToken + ?Sized,
    {
        let is_ours = Arc::ptr_eq(&ticket.latest, &self.latest);
        if !is_ours || ticket.is_cancelled() {
            log::debug!(
                "Discarding stale load for chapter {} (generation {})",
                ticket.chapter_index,
                ticket.generation
            );
            return LoadOutcome::Stale {
                chapter_index: ticket.chapter_index,
            };
        }
        if cancel.is_cancelled() {
            log::debug!("Load for chapter {} cancelled", ticket.chapter_index);
            self.pending = None;
            return LoadOutcome::Stale {
                chapter_index: ticket.chapter_index,
            };
        }
        self.current = ticket.chapter_index;
        self.pending = None;
        self.snapshot = ProgressSnapshot::default();
        LoadOutcome::Applied {
            chapter_index: ticket.chapter_index,
            value,
        }
    }

    /// Record fresh scroll measurements for the current chapter.
    pub fn update_progress(&mut self, metrics: ScrollMetrics) -> ProgressSnapshot {
        self.snapshot = ProgressSnapshot::compute(metrics);
        self.snapshot
    }

    /// Latest progress snapshot for the current chapter.
    pub fn chapter_progress(&self) -> ProgressSnapshot {
        self.snapshot
    }

    /// Whole-book percent from chapter position and page fraction.
    pub fn book_percent(&self) -> f32 {
        book_percent(self.current, self.chapter_count, &self.snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn newest_load_wins() {
        let mut nav = ChapterNavigator::new(5);
        let slow = nav.begin_load(1).unwrap();
        let fast = nav.begin_load(3).unwrap();
        assert!(slow.is_cancelled());
        assert!(!fast.is_cancelled());

        assert_eq!(
            nav.accept(&fast, "three"),
            LoadOutcome::Applied {
                chapter_index: 3,
                value: "three"
            }
        );
        assert_eq!(nav.accept(&slow, "one"), LoadOutcome::Stale { chapter_index: 1 });
        assert_eq!(nav.current_chapter(), 3);
        assert_eq!(nav.pending_chapter(), None);
    }

    #[test]
    fn stale_result_arriving_first_is_still_discarded() {
        let mut nav = ChapterNavigator::new(5);
        let slow = nav.begin_load(1).unwrap();
        let fast = nav.begin_load(2).unwrap();
        assert!(matches!(nav.accept(&slow, ()), LoadOutcome::Stale { .. }));
        assert_eq!(nav.current_chapter(), 0);
        assert_eq!(nav.pending_chapter(), Some(2));
        assert!(matches!(nav.accept(&fast, ()), LoadOutcome::Applied { .. }));
    }

    #[test]
    fn ticket_from_other_navigator_is_rejected() {
        let mut a = ChapterNavigator::new(3);
        let mut b = ChapterNavigator::new(3);
        let ticket = a.begin_load(1).unwrap();
        let _ = b.begin_load(2).unwrap();
        let _ = b.begin_load(0).unwrap();
        assert!(matches!(b.accept(&ticket, ()), LoadOutcome::Stale { .. }));
    }

    #[test]
    fn out_of_bounds_load_is_an_error() {
        let mut nav = ChapterNavigator::new(2);
        assert_eq!(
            nav.begin_load(2).unwrap_err(),
            ViewError::ChapterOutOfBounds {
                index: 2,
                chapter_count: 2
            }
        );
    }

    #[test]
    fn next_and_previous_respect_bounds() {
        let mut nav = ChapterNavigator::new(2);
        assert!(nav.previous_chapter().is_none());
        let next = nav.next_chapter().unwrap();
        nav.accept(&next, ());
        assert_eq!(nav.current_chapter(), 1);
        assert!(nav.next_chapter().is_none());
        assert_eq!(nav.previous_chapter().unwrap().chapter_index(), 0);
    }

    #[test]
    fn book_percent_combines_chapters_and_pages() {
        let mut nav = ChapterNavigator::new(4);
        let ticket = nav.begin_load(2).unwrap();
        nav.accept(&ticket, ());
        assert_eq!(nav.book_percent(), 50.0);
        nav.update_progress(ScrollMetrics::new(1600, 2400, 800));
        // (2 + 2/3) / 4
        assert!((nav.book_percent() - 66.666_67).abs() < 1e-3);
    }

    #[test]
    fn new_chapter_resets_progress() {
        let mut nav = ChapterNavigator::new(2);
        nav.update_progress(ScrollMetrics::new(800, 2400, 800));
        assert_eq!(nav.chapter_progress().current_page, 2);
        let ticket = nav.next_chapter().unwrap();
        nav.accept(&ticket, ());
        assert_eq!(nav.chapter_progress().current_page, 1);
    }

    struct Cancelled;

    impl CancelToken for Cancelled {
        fn is_cancelled(&self) -> bool {
            true
        }
    }

    #[test]
    fn cancelled_load_is_not_applied() {
        let mut nav = ChapterNavigator::new(3);
        let ticket = nav.begin_load(2).unwrap();
        assert_eq!(
            nav.accept_with_cancel(&ticket, "two", &Cancelled),
            LoadOutcome::Stale { chapter_index: 2 }
        );
        assert_eq!(nav.current_chapter(), 0);
        assert_eq!(nav.pending_chapter(), None);
    }

    #[test]
    fn never_cancel_applies_current_load() {
        let mut nav = ChapterNavigator::new(3);
        let ticket = nav.begin_load(1).unwrap();
        assert!(matches!(
            nav.accept_with_cancel(&ticket, (), &NeverCancel),
            LoadOutcome::Applied { chapter_index: 1, .. }
        ));
        assert_eq!(nav.current_chapter(), 1);
    }

    #[test]
    fn dyn_token_is_accepted() {
        let mut nav = ChapterNavigator::new(3);
        let ticket = nav.begin_load(1).unwrap();
        let token: &dyn CancelToken = &ticket.clone();
        assert!(matches!(
            nav.accept_with_cancel(&ticket, (), token),
            LoadOutcome::Applied { .. }
        ));
    }
}

//! Reader view state and chapter navigation for `bionic-reader`.

mod navigator;
mod reader_view;

pub use navigator::{CancelToken, ChapterNavigator, LoadOutcome, LoadTicket, NeverCancel};
pub use reader_view::{PreferenceChange, ReaderView, ViewError};

//! bionic-reader -- Bionic reading annotation and reading-position tracking
//!
//! Augments e-book markup with "bionic formatting" (partial emphasis of the
//! leading letters of each word), derives page/percent progress from scroll
//! metrics, and persists the reader's position per book.
//!
//! # Features
//!
//! - `std` (default) -- enables the JSON position store and logging
//! - `async` -- periodic auto-save task and async document loading (tokio)
//! - `cli` -- the `bionic-reader` command-line tool
//!
//! # Pipeline
//!
//! ```
//! use bionic_reader::{annotate_document, parse_markup, strip_document, to_markup};
//!
//! let doc = parse_markup("<p>Reading faster</p>").unwrap();
//! let bionic = annotate_document(&doc, 0.5);
//! assert_eq!(
//!     to_markup(&bionic),
//!     r#"<p><b class="bionic">Rea</b>ding <b class="bionic">fas</b>ter</p>"#
//! );
//! assert_eq!(strip_document(&bionic), doc);
//! ```

#![cfg_attr(not(feature = "std"), no_std)]
#![warn(missing_docs)]
#![deny(clippy::large_enum_variant, clippy::redundant_clone)]
#![warn(
    clippy::needless_collect,
    clippy::map_clone,
    clippy::implicit_clone,
    clippy::inefficient_to_string
)]

extern crate alloc;

pub mod bionic;
pub mod error;
pub mod markup;
pub mod preferences;
pub mod progress;
pub mod word;

#[cfg(feature = "std")]
pub mod store;

#[cfg(feature = "async")]
pub mod async_api;

#[cfg(feature = "async")]
pub mod autosave;

// Re-export key types for convenience
#[cfg(feature = "async")]
pub use async_api::read_document_async;
#[cfg(feature = "async")]
pub use autosave::{AutoSaver, PositionSample, DEFAULT_AUTOSAVE_INTERVAL};
pub use bionic::{
    annotate, annotate_document, emphasis_boundary, emphasis_element, format_text, is_emphasis,
    strip, strip_document, BionicSpan, EMPHASIS_CLASS, EMPHASIS_TAG,
};
pub use error::ReaderError;
pub use markup::{
    document_text, parse_markup, parse_markup_limited, text_content, to_markup, Element,
    MarkupError, MarkupNode, ParseLimits,
};
pub use preferences::ReadingPreferences;
pub use progress::{book_percent, ProgressSnapshot, ScrollMetrics};
#[cfg(feature = "std")]
pub use store::{
    normalize_key, BookPosition, JsonFileBackend, MemoryBackend, PositionBackend, PositionMap,
    PositionStore, PositionStoreOptions, RestoreOutcome,
};
pub use word::{split_token, Word};

use bionic_reader::{
    annotate_document, parse_markup, strip_document, to_markup, MarkupError, MarkupNode,
    ReadingPreferences,
};

/// Errors surfaced by view and navigation state.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ViewError {
    /// Chapter markup could not be parsed.
    Markup(MarkupError),
    /// Requested chapter does not exist.
    ChapterOutOfBounds { index: usize, chapter_count: usize },
}

impl core::fmt::Display for ViewError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Markup(err) => write!(f, "chapter markup invalid: {}", err),
            Self::ChapterOutOfBounds {
                index,
                chapter_count,
            } => write!(
                f,
                "chapter index {} out of bounds (chapter count: {})",
                index, chapter_count
            ),
        }
    }
}

impl std::error::Error for ViewError {}

impl From<MarkupError> for ViewError {
    fn from(err: MarkupError) -> Self {
        Self::Markup(err)
    }
}

/// What a preference update changed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PreferenceChange {
    /// Displayed markup was rebuilt from the pristine document.
    pub reannotated: bool,
    /// Font size or line height changed; scroll metrics must be re-read
    /// and progress recomputed.
    pub relayout: bool,
}

/// Displayed state for the active chapter.
///
/// Holds the pristine document next to its rendering. Every rendering is
/// derived from the pristine copy, never from a previous rendering, because
/// annotation is not idempotent.
#[derive(Clone, Debug)]
pub struct ReaderView {
    pristine: Vec<MarkupNode>,
    prefs: ReadingPreferences,
    displayed: Vec<MarkupNode>,
    rendered: String,
    content_length: u64,
}

impl ReaderView {
    /// Build a view over an unannotated document.
    pub fn new(pristine: Vec<MarkupNode>, prefs: ReadingPreferences) -> Self {
        let prefs = prefs.clamped();
        let content_length = to_markup(&pristine).len() as u64;
        let displayed = render(&pristine, &prefs);
        let rendered = to_markup(&displayed);
        Self {
            pristine,
            prefs,
            displayed,
            rendered,
            content_length,
        }
    }

    /// Parse chapter markup and build a view over it.
    pub fn from_markup(html: &str, prefs: ReadingPreferences) -> Result<Self, ViewError> {
        Ok(Self::new(parse_markup(html)?, prefs))
    }

    /// Build a view when only annotated markup was retained.
    ///
    /// The baseline is recovered with `strip`, which removes only the
    /// emphasis wrappers this crate inserts.
    pub fn from_annotated(annotated: &[MarkupNode], prefs: ReadingPreferences) -> Self {
        Self::new(strip_document(annotated), prefs)
    }

    /// Swap in a newly loaded chapter, keeping the current preferences.
    pub fn replace_document(&mut self, pristine: Vec<MarkupNode>) {
        *self = Self::new(pristine, self.prefs);
    }

    /// Apply new preferences, re-annotating only when the markup changes.
    pub fn set_preferences(&mut self, prefs: ReadingPreferences) -> PreferenceChange {
        let prefs = prefs.clamped();
        let change = PreferenceChange {
            reannotated: self.prefs.annotation_differs(&prefs),
            relayout: self.prefs.layout_differs(&prefs),
        };
        self.prefs = prefs;
        if change.reannotated {
            self.displayed = render(&self.pristine, &self.prefs);
            self.rendered = to_markup(&self.displayed);
            log::debug!(
                "Re-annotated chapter (enabled={}, percentage={:.2})",
                self.prefs.bionic_enabled,
                self.prefs.bold_percentage
            );
        }
        change
    }

    /// Active (clamped) preferences.
    pub fn preferences(&self) -> ReadingPreferences {
        self.prefs
    }

    /// Unannotated document.
    pub fn pristine(&self) -> &[MarkupNode] {
        &self.pristine
    }

    /// Document as currently displayed.
    pub fn displayed(&self) -> &[MarkupNode] {
        &self.displayed
    }

    /// Serialized markup for the rendering surface.
    pub fn rendered_markup(&self) -> &str {
        &self.rendered
    }

    /// Byte length of the pristine serialized markup.
    ///
    /// This is the length persisted with saved positions; it does not change
    /// with preferences, so toggling emphasis never invalidates a position.
    pub fn content_length(&self) -> u64 {
        self.content_length
    }
}

fn render(pristine: &[MarkupNode], prefs: &ReadingPreferences) -> Vec<MarkupNode> {
    if prefs.bionic_enabled {
        annotate_document(pristine, prefs.effective_percentage())
    } else {
        pristine.to_vec()
    }
}

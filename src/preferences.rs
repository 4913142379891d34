//! Reader display preferences.
//!
//! Pure configuration: the only rules are range clamps. Values are clamped
//! on use, so a hand-edited or stale persisted preference never reaches the
//! annotator out of range.

/// Lowest bold percentage offered to readers.
pub const MIN_BOLD_PERCENTAGE: f64 = 0.3;
/// Highest bold percentage offered to readers.
pub const MAX_BOLD_PERCENTAGE: f64 = 0.7;
/// Slider step for the bold percentage.
pub const BOLD_PERCENTAGE_STEP: f64 = 0.05;
/// Smallest font size in px.
pub const MIN_FONT_SIZE: u32 = 12;
/// Largest font size in px.
pub const MAX_FONT_SIZE: u32 = 32;
/// Smallest line height multiplier.
pub const MIN_LINE_HEIGHT: f32 = 1.2;
/// Largest line height multiplier.
pub const MAX_LINE_HEIGHT: f32 = 2.4;

/// Reader-facing display settings.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "std", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "std", serde(rename_all = "camelCase", default))]
pub struct ReadingPreferences {
    /// Whether bionic emphasis is applied at all.
    pub bionic_enabled: bool,
    /// Fraction of long words to emphasize.
    pub bold_percentage: f64,
    /// Body font size in px.
    pub font_size: u32,
    /// Line height multiplier.
    pub line_height: f32,
}

impl Default for ReadingPreferences {
    fn default() -> Self {
        Self {
            bionic_enabled: true,
            bold_percentage: 0.5,
            font_size: 18,
            line_height: 1.6,
        }
    }
}

impl ReadingPreferences {
    /// Enable or disable bionic emphasis.
    pub fn with_bionic_enabled(mut self, enabled: bool) -> Self {
        self.bionic_enabled = enabled;
        self
    }

    /// Set the bold percentage (clamped on use).
    pub fn with_bold_percentage(mut self, percentage: f64) -> Self {
        self.bold_percentage = percentage;
        self
    }

    /// Set the font size (clamped on use).
    pub fn with_font_size(mut self, font_size: u32) -> Self {
        self.font_size = font_size;
        self
    }

    /// Set the line height (clamped on use).
    pub fn with_line_height(mut self, line_height: f32) -> Self {
        self.line_height = line_height;
        self
    }

    /// Copy with every field snapped into its configured range.
    ///
    /// Non-finite numbers fall back to the defaults.
    pub fn clamped(self) -> Self {
        let defaults = Self::default();
        let bold_percentage = if self.bold_percentage.is_finite() {
            self.bold_percentage
                .clamp(MIN_BOLD_PERCENTAGE, MAX_BOLD_PERCENTAGE)
        } else {
            defaults.bold_percentage
        };
        let line_height = if self.line_height.is_finite() {
            self.line_height.clamp(MIN_LINE_HEIGHT, MAX_LINE_HEIGHT)
        } else {
            defaults.line_height
        };
        Self {
            bionic_enabled: self.bionic_enabled,
            bold_percentage,
            font_size: self.font_size.clamp(MIN_FONT_SIZE, MAX_FONT_SIZE),
            line_height,
        }
    }

    /// Bold percentage handed to the annotator.
    pub fn effective_percentage(&self) -> f64 {
        self.clamped().bold_percentage
    }

    /// True when a change from `self` to `next` requires re-annotation.
    ///
    /// Font size and line height only affect layout, not the markup.
    pub fn annotation_differs(&self, next: &Self) -> bool {
        let a = self.clamped();
        let b = next.clamped();
        a.bionic_enabled != b.bionic_enabled
            || (a.bionic_enabled && a.bold_percentage != b.bold_percentage)
    }

    /// True when a change from `self` to `next` changes layout metrics.
    pub fn layout_differs(&self, next: &Self) -> bool {
        let a = self.clamped();
        let b = next.clamped();
        a.font_size != b.font_size || a.line_height != b.line_height
    }

    /// Move the bold percentage by `steps` slider steps, staying in range.
    pub fn step_bold_percentage(self, steps: i32) -> Self {
        let current = self.effective_percentage();
        let raw = current + f64::from(steps) * BOLD_PERCENTAGE_STEP;
        // Snap to the step grid so repeated nudges do not accumulate drift
        let snapped = (raw / BOLD_PERCENTAGE_STEP + 0.5) as i64 as f64 * BOLD_PERCENTAGE_STEP;
        self.with_bold_percentage(snapped).clamped()
    }
}

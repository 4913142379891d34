//! Persisted reading positions keyed by book identity.
//!
//! One JSON object maps a normalized `title_author` key to the last saved
//! scroll offset for that book. Positions are validated against the current
//! document's content length on restore, so a re-exported copy of the same
//! title still resumes while a substantially different edition starts over.
//!
//! Persistence never fails the caller: backend errors are logged and turn
//! into "no saved position" or "save skipped".
//!
//! Saves are last-write-wins; two writers on the same store (e.g. two
//! windows) are not coordinated.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::error::ReaderError;

/// Saved position for one book.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookPosition {
    /// Title as given on save.
    pub title: String,
    /// Author as given on save.
    pub author: String,
    /// Scroll offset at save time.
    pub scroll_position: u64,
    /// Document content length at save time.
    pub content_length: u64,
    /// Save time in milliseconds since the Unix epoch.
    pub last_read: u64,
}

/// Persisted layout: normalized book key -> position.
pub type PositionMap = BTreeMap<String, BookPosition>;

/// Storage for the whole position map.
pub trait PositionBackend {
    /// Read the persisted map. A missing store is an empty map.
    fn load_map(&self) -> Result<PositionMap, ReaderError>;
    /// Replace the persisted map.
    fn save_map(&mut self, map: &PositionMap) -> Result<(), ReaderError>;
    /// Move undecodable stored content aside before it is overwritten.
    fn set_aside_corrupt(&mut self) -> Result<(), ReaderError> {
        Ok(())
    }
}

/// JSON file on local disk.
#[derive(Clone, Debug)]
pub struct JsonFileBackend {
    path: PathBuf,
}

impl JsonFileBackend {
    /// Use `path` as the store file. Nothing is touched until the first access.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Location of the store file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl PositionBackend for JsonFileBackend {
    fn load_map(&self) -> Result<PositionMap, ReaderError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Ok(PositionMap::new())
            }
            Err(err) => return Err(err.into()),
        };
        if raw.trim().is_empty() {
            return Ok(PositionMap::new());
        }
        Ok(serde_json::from_str(&raw)?)
    }

    fn save_map(&mut self, map: &PositionMap) -> Result<(), ReaderError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let json = serde_json::to_string(map)?;
        // Write-then-rename so a crash mid-write never leaves a truncated store
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    /// Keeps the damaged file as `<name>.json.corrupt` for manual recovery.
    fn set_aside_corrupt(&mut self) -> Result<(), ReaderError> {
        let aside = self.path.with_extension("json.corrupt");
        fs::rename(&self.path, &aside)?;
        log::warn!("Moved corrupt position store to {}", aside.display());
        Ok(())
    }
}

/// In-process map, for tests and embedders with their own persistence.
#[derive(Clone, Debug, Default)]
pub struct MemoryBackend {
    map: PositionMap,
}

impl MemoryBackend {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Borrow the stored map.
    pub fn map(&self) -> &PositionMap {
        &self.map
    }
}

impl PositionBackend for MemoryBackend {
    fn load_map(&self) -> Result<PositionMap, ReaderError> {
        Ok(self.map.clone())
    }

    fn save_map(&mut self, map: &PositionMap) -> Result<(), ReaderError> {
        self.map = map.clone();
        Ok(())
    }
}

/// Default accepted relative content-length difference (5%).
pub const DEFAULT_TOLERANCE: f64 = 0.05;

/// Store behavior knobs.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PositionStoreOptions {
    /// Largest accepted relative difference between saved and current
    /// content length.
    pub tolerance: f64,
}

impl Default for PositionStoreOptions {
    fn default() -> Self {
        Self {
            tolerance: DEFAULT_TOLERANCE,
        }
    }
}

impl PositionStoreOptions {
    /// Override the content-length tolerance.
    ///
    /// Negative values become 0; NaN and infinities fall back to
    /// [`DEFAULT_TOLERANCE`].
    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = sanitize_tolerance(tolerance);
        self
    }
}

fn sanitize_tolerance(tolerance: f64) -> f64 {
    if tolerance.is_finite() {
        tolerance.max(0.0)
    } else {
        DEFAULT_TOLERANCE
    }
}

/// Result of looking up a saved position for the current document.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum RestoreOutcome {
    /// A matching position exists; resume at this offset.
    Restored(u64),
    /// Nothing saved for this book.
    NotFound,
    /// A position exists but the content length differs too much.
    Stale {
        /// `|saved - current| / saved`; infinite when nothing was saved.
        relative_diff: f64,
    },
}

impl RestoreOutcome {
    /// Offset to resume at, if any.
    pub fn offset(self) -> Option<u64> {
        match self {
            RestoreOutcome::Restored(offset) => Some(offset),
            RestoreOutcome::NotFound | RestoreOutcome::Stale { .. } => None,
        }
    }
}

/// Normalized identity key for a book.
///
/// Lowercases and trims both parts, joins them with `_`, then replaces
/// every character outside `[a-z0-9_]` with `_`. Casing and surrounding
/// whitespace do not matter; any edit to the title or author does.
///
/// # Example
/// ```
/// use bionic_reader::store::normalize_key;
///
/// assert_eq!(normalize_key("  Dune ", "Frank Herbert"), "dune_frank_herbert");
/// ```
pub fn normalize_key(title: &str, author: &str) -> String {
    let joined = format!(
        "{}_{}",
        title.trim().to_lowercase(),
        author.trim().to_lowercase()
    );
    joined
        .chars()
        .map(|ch| {
            if ch.is_ascii_lowercase() || ch.is_ascii_digit() || ch == '_' {
                ch
            } else {
                '_'
            }
        })
        .collect()
}

fn relative_diff(saved: u64, current: u64) -> f64 {
    if saved == 0 {
        return f64::INFINITY;
    }
    saved.abs_diff(current) as f64 / saved as f64
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Reading-position persistence over a [`PositionBackend`].
#[derive(Debug)]
pub struct PositionStore<B: PositionBackend> {
    backend: B,
    options: PositionStoreOptions,
}

impl<B: PositionBackend> PositionStore<B> {
    /// Store with default options.
    pub fn new(backend: B) -> Self {
        Self::with_options(backend, PositionStoreOptions::default())
    }

    /// Store with explicit options.
    pub fn with_options(backend: B, options: PositionStoreOptions) -> Self {
        Self { backend, options }
    }

    /// Active options.
    pub fn options(&self) -> PositionStoreOptions {
        self.options
    }

    /// Borrow the backend.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Save a position stamped with the current time.
    pub fn save(&mut self, title: &str, author: &str, scroll_offset: u64, content_length: u64) {
        self.save_at(title, author, scroll_offset, content_length, now_millis());
    }

    /// Save a position with an explicit `last_read` timestamp (ms since epoch).
    pub fn save_at(
        &mut self,
        title: &str,
        author: &str,
        scroll_offset: u64,
        content_length: u64,
        last_read: u64,
    ) {
        let Some(mut map) = self.map_for_write() else {
            return;
        };
        let key = normalize_key(title, author);
        map.insert(
            key.clone(),
            BookPosition {
                title: title.to_string(),
                author: author.to_string(),
                scroll_position: scroll_offset,
                content_length,
                last_read,
            },
        );
        match self.backend.save_map(&map) {
            Ok(()) => log::debug!("Saved position {} for '{}'", scroll_offset, key),
            Err(err) => log::warn!("Skipping position save for '{}': {}", key, err),
        }
    }

    /// Raw saved entry for a book, without content-length validation.
    pub fn get(&self, title: &str, author: &str) -> Option<BookPosition> {
        let mut map = self.map_for_read()?;
        map.remove(&normalize_key(title, author))
    }

    /// Look up a position and validate it against `content_length`.
    pub fn restore(&self, title: &str, author: &str, content_length: u64) -> RestoreOutcome {
        let Some(saved) = self.get(title, author) else {
            return RestoreOutcome::NotFound;
        };
        let diff = relative_diff(saved.content_length, content_length);
        // The field is public; re-check in case it was set directly
        if diff > sanitize_tolerance(self.options.tolerance) {
            log::debug!(
                "Discarding saved position for '{}': content length {} vs {} ({:.3})",
                saved.title,
                saved.content_length,
                content_length,
                diff
            );
            return RestoreOutcome::Stale {
                relative_diff: diff,
            };
        }
        RestoreOutcome::Restored(saved.scroll_position)
    }

    /// Saved offset for a book, or `None` when absent or stale.
    pub fn load(&self, title: &str, author: &str, content_length: u64) -> Option<u64> {
        self.restore(title, author, content_length).offset()
    }

    /// Forget one book.
    pub fn clear(&mut self, title: &str, author: &str) {
        let Some(mut map) = self.map_for_write() else {
            return;
        };
        let key = normalize_key(title, author);
        if map.remove(&key).is_none() {
            return;
        }
        if let Err(err) = self.backend.save_map(&map) {
            log::warn!("Failed to clear position for '{}': {}", key, err);
        }
    }

    /// Forget every book.
    pub fn clear_all(&mut self) {
        if let Err(err) = self.backend.save_map(&PositionMap::new()) {
            log::warn!("Failed to clear saved positions: {}", err);
        }
    }

    /// Saved books, most recently read first, at most `limit` entries.
    pub fn list_recents(&self, limit: usize) -> Vec<BookPosition> {
        let Some(map) = self.map_for_read() else {
            return Vec::new();
        };
        let mut recents: Vec<BookPosition> = map.into_values().collect();
        recents.sort_by(|a, b| {
            b.last_read
                .cmp(&a.last_read)
                .then_with(|| a.title.cmp(&b.title))
        });
        recents.truncate(limit);
        recents
    }

    fn map_for_read(&self) -> Option<PositionMap> {
        match self.backend.load_map() {
            Ok(map) => Some(map),
            Err(err) => {
                log::warn!("Saved positions unavailable: {}", err);
                None
            }
        }
    }

    fn map_for_write(&mut self) -> Option<PositionMap> {
        match self.backend.load_map() {
            Ok(map) => Some(map),
            // Undecodable content would block every future save; keep a copy and start over
            Err(ReaderError::Serialize(msg)) => {
                log::warn!("Replacing corrupt position store: {}", msg);
                match self.backend.set_aside_corrupt() {
                    Ok(()) => Some(PositionMap::new()),
                    Err(err) => {
                        log::warn!("Could not set aside corrupt position store: {}", err);
                        None
                    }
                }
            }
            Err(err) => {
                log::warn!("Saved positions unavailable: {}", err);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn memory_store() -> PositionStore<MemoryBackend> {
        PositionStore::new(MemoryBackend::new())
    }

    /// Backend that fails every call and counts attempts.
    #[derive(Default)]
    struct BrokenBackend {
        loads: Cell<usize>,
        saves: usize,
    }

    impl PositionBackend for BrokenBackend {
        fn load_map(&self) -> Result<PositionMap, ReaderError> {
            self.loads.set(self.loads.get() + 1);
            Err(ReaderError::Io("storage unavailable".into()))
        }

        fn save_map(&mut self, _map: &PositionMap) -> Result<(), ReaderError> {
            self.saves += 1;
            Err(ReaderError::Io("quota exceeded".into()))
        }
    }

    #[test]
    fn test_normalize_key_ignores_case_and_padding() {
        assert_eq!(
            normalize_key("  Dune ", "Frank Herbert"),
            normalize_key("dune", "frank herbert")
        );
        assert_eq!(normalize_key("Dune", "Herbert"), "dune_herbert");
        assert_eq!(normalize_key("Caf\u{00e9}!", "A.B."), "caf___a_b_");
        assert_ne!(normalize_key("Dune", "Herbert"), normalize_key("Dune II", "Herbert"));
    }

    #[test]
    fn test_load_within_tolerance() {
        let mut store = memory_store();
        store.save("Dune", "Herbert", 500, 10_000);
        assert_eq!(store.load("Dune", "Herbert", 10_300), Some(500));
        assert_eq!(store.load("Dune", "Herbert", 9_700), Some(500));
        assert_eq!(store.load("Dune", "Herbert", 10_500), Some(500));
    }

    #[test]
    fn test_load_outside_tolerance() {
        let mut store = memory_store();
        store.save("Dune", "Herbert", 500, 10_000);
        assert_eq!(store.load("Dune", "Herbert", 11_000), None);
        match store.restore("Dune", "Herbert", 11_000) {
            RestoreOutcome::Stale { relative_diff } => {
                assert!((relative_diff - 0.1).abs() < 1e-12)
            }
            other => panic!("expected stale, got {:?}", other),
        }
    }

    #[test]
    fn test_load_missing_book() {
        let store = memory_store();
        assert_eq!(store.restore("Dune", "Herbert", 100), RestoreOutcome::NotFound);
        assert_eq!(store.load("Dune", "Herbert", 100), None);
    }

    #[test]
    fn test_zero_saved_length_never_matches() {
        let mut store = memory_store();
        store.save("Empty", "Nobody", 0, 0);
        assert_eq!(store.load("Empty", "Nobody", 0), None);
    }

    #[test]
    fn test_custom_tolerance() {
        let options = PositionStoreOptions::default().with_tolerance(0.2);
        let mut store = PositionStore::with_options(MemoryBackend::new(), options);
        store.save("Dune", "Herbert", 42, 10_000);
        assert_eq!(store.load("Dune", "Herbert", 11_500), Some(42));
    }

    #[test]
    fn test_save_overwrites_and_matches_normalized_identity() {
        let mut store = memory_store();
        store.save_at("Dune", "Frank Herbert", 100, 5_000, 1);
        store.save_at("  DUNE", "frank herbert ", 250, 5_000, 2);
        assert_eq!(store.backend().map().len(), 1);
        let saved = store.get("dune", "Frank Herbert").unwrap();
        assert_eq!(saved.scroll_position, 250);
        assert_eq!(saved.last_read, 2);
    }

    #[test]
    fn test_clear_and_clear_all() {
        let mut store = memory_store();
        store.save("A", "X", 1, 100);
        store.save("B", "Y", 2, 100);
        store.clear("a", "x");
        assert!(store.get("A", "X").is_none());
        assert!(store.get("B", "Y").is_some());
        store.clear("missing", "book");
        store.clear_all();
        assert!(store.list_recents(10).is_empty());
    }

    #[test]
    fn test_list_recents_most_recent_first() {
        let mut store = memory_store();
        store.save_at("First", "A", 1, 100, 1_000);
        store.save_at("Third", "C", 3, 100, 3_000);
        store.save_at("Second", "B", 2, 100, 2_000);
        let titles: Vec<String> = store.list_recents(10).into_iter().map(|p| p.title).collect();
        assert_eq!(titles, vec!["Third", "Second", "First"]);
        assert_eq!(store.list_recents(2).len(), 2);
        assert!(store.list_recents(0).is_empty());
    }

    #[test]
    fn test_backend_errors_are_swallowed() {
        let mut store = PositionStore::new(BrokenBackend::default());
        store.save("Dune", "Herbert", 500, 10_000);
        assert_eq!(store.load("Dune", "Herbert", 10_000), None);
        assert!(store.list_recents(5).is_empty());
        store.clear_all();
        // Unreadable storage skips the write entirely; clear_all still tries
        assert_eq!(store.backend().saves, 1);
        assert!(store.backend().loads.get() >= 2);
    }

    #[test]
    fn test_persisted_layout_is_camel_case() {
        let mut store = memory_store();
        store.save_at("Dune", "Herbert", 500, 10_000, 7);
        let json = serde_json::to_value(store.backend().map()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "dune_herbert": {
                    "title": "Dune",
                    "author": "Herbert",
                    "scrollPosition": 500,
                    "contentLength": 10000,
                    "lastRead": 7
                }
            })
        );
    }

    #[test]
    fn test_json_file_backend_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("positions.json");
        let mut store = PositionStore::new(JsonFileBackend::new(&path));
        assert!(store.list_recents(10).is_empty());
        store.save_at("Dune", "Herbert", 500, 10_000, 10);

        let reopened = PositionStore::new(JsonFileBackend::new(&path));
        assert_eq!(reopened.load("Dune", "Herbert", 10_300), Some(500));
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[test]
    fn test_json_file_backend_recovers_from_corruption() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("positions.json");
        fs::write(&path, "{not json").unwrap();

        let mut store = PositionStore::new(JsonFileBackend::new(&path));
        assert_eq!(store.load("Dune", "Herbert", 10_000), None);
        store.save("Dune", "Herbert", 500, 10_000);
        assert_eq!(store.load("Dune", "Herbert", 10_000), Some(500));

        let aside = path.with_extension("json.corrupt");
        assert_eq!(fs::read_to_string(aside).unwrap(), "{not json");
    }

    #[test]
    fn test_non_finite_tolerance_falls_back_to_default() {
        for bad in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            let options = PositionStoreOptions::default().with_tolerance(bad);
            assert_eq!(options.tolerance, DEFAULT_TOLERANCE);
        }
        assert_eq!(
            PositionStoreOptions::default().with_tolerance(-0.5).tolerance,
            0.0
        );
    }

    #[test]
    fn test_nan_tolerance_set_directly_does_not_restore_stale() {
        let options = PositionStoreOptions {
            tolerance: f64::NAN,
        };
        let mut store = PositionStore::with_options(MemoryBackend::new(), options);
        store.save("Dune", "Herbert", 500, 10_000);
        assert!(matches!(
            store.restore("Dune", "Herbert", 20_000),
            RestoreOutcome::Stale { .. }
        ));
        assert_eq!(store.load("Dune", "Herbert", 10_200), Some(500));
    }
}

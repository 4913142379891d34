//! Periodic position auto-save.
//!
//! The saver is a task handle owned by whoever opened the book. It samples
//! the current position on a fixed interval and writes it to the shared
//! store. `shutdown` performs one last save and waits for it, so the
//! teardown save lands before the caller drops the store.
//!
//! This module is available with the `async` feature.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::store::{PositionBackend, PositionStore};

/// Default interval between automatic saves.
pub const DEFAULT_AUTOSAVE_INTERVAL: Duration = Duration::from_secs(5);

/// Position to persist on the next save.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PositionSample {
    /// Book title.
    pub title: String,
    /// Book author.
    pub author: String,
    /// Current scroll offset.
    pub scroll_offset: u64,
    /// Current document content length.
    pub content_length: u64,
}

/// Store shared between the reader and its auto-save task.
pub type SharedStore<B> = Arc<Mutex<PositionStore<B>>>;

/// Handle to a running auto-save task.
///
/// Dropping the handle without calling [`AutoSaver::shutdown`] aborts the
/// task without a final save.
#[derive(Debug)]
pub struct AutoSaver {
    stop: Option<oneshot::Sender<()>>,
    handle: JoinHandle<()>,
}

impl AutoSaver {
    /// Spawn a task that calls `sample` every `period` and saves the result.
    ///
    /// `sample` returns `None` when there is nothing worth saving (no book
    /// open, content not laid out yet). Must be called within a tokio runtime.
    pub fn spawn<B, F>(store: SharedStore<B>, mut sample: F, period: Duration) -> Self
    where
        B: PositionBackend + Send + 'static,
        F: FnMut() -> Option<PositionSample> + Send + 'static,
    {
        let (stop_tx, mut stop_rx) = oneshot::channel::<()>();
        // A zero period would make `interval` panic
        let period = period.max(Duration::from_millis(1));

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately; nothing has been read yet
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = ticker.tick() => save_sample(&store, sample()),
                    _ = &mut stop_rx => {
                        save_sample(&store, sample());
                        break;
                    }
                }
            }
            log::debug!("Auto-save task finished");
        });

        Self {
            stop: Some(stop_tx),
            handle,
        }
    }

    /// Spawn with [`DEFAULT_AUTOSAVE_INTERVAL`].
    pub fn spawn_default<B, F>(store: SharedStore<B>, sample: F) -> Self
    where
        B: PositionBackend + Send + 'static,
        F: FnMut() -> Option<PositionSample> + Send + 'static,
    {
        Self::spawn(store, sample, DEFAULT_AUTOSAVE_INTERVAL)
    }

    /// Stop the task after one final save, waiting for that save to finish.
    pub async fn shutdown(mut self) {
        if let Some(stop) = self.stop.take() {
            // Send only fails if the task already exited
            let _ = stop.send(());
        }
        if let Err(err) = (&mut self.handle).await {
            log::warn!("Auto-save task ended abnormally: {}", err);
        }
    }
}

impl Drop for AutoSaver {
    fn drop(&mut self) {
        if self.stop.is_some() {
            self.handle.abort();
        }
    }
}

fn save_sample<B: PositionBackend>(store: &SharedStore<B>, sample: Option<PositionSample>) {
    let Some(sample) = sample else {
        return;
    };
    let mut guard = match store.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    };
    guard.save(
        &sample.title,
        &sample.author,
        sample.scroll_offset,
        sample.content_length,
    );
}

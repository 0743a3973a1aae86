use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;

/// Single-slot debounce timer.
///
/// Each [`schedule`](Autosave::schedule) supersedes the pending save, if
/// any, and starts a new one that runs after the quiet period. A save that
/// has started writing is never interrupted; [`settle`](Autosave::settle)
/// waits for it instead.
#[derive(Debug)]
pub struct Autosave {
    delay: Duration,
    /// Bumped on every schedule or cancel; a timer only writes if it still
    /// holds the latest value.
    generation: Arc<AtomicU64>,
    /// Held from the generation check until the write completes.
    writing: Arc<Mutex<()>>,
    pending: Option<JoinHandle<()>>,
}

impl Autosave {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            generation: Arc::new(AtomicU64::new(0)),
            writing: Arc::new(Mutex::new(())),
            pending: None,
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    pub fn schedule<F>(&mut self, save: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let ticket = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let generation = self.generation.clone();
        let writing = self.writing.clone();
        let delay = self.delay;

        self.pending = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _guard = writing.lock().await;
            if generation.load(Ordering::SeqCst) != ticket {
                return;
            }
            save.await;
        }));
    }

    /// Drops the pending save without running it. A write already in
    /// progress still completes.
    pub fn cancel(&mut self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.pending = None;
    }

    /// Cancels the pending save and waits for any write in progress, so no
    /// autosave lands after this returns.
    pub async fn settle(&mut self) {
        self.cancel();
        let _guard = self.writing.lock().await;
    }

    pub fn is_pending(&self) -> bool {
        self.pending.as_ref().is_some_and(|h| !h.is_finished())
    }
}

impl Drop for Autosave {
    fn drop(&mut self) {
        self.cancel();
    }
}

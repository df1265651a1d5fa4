use std::collections::BTreeSet;
use std::io::{Seek, Write};
use std::sync::{Arc, Mutex, PoisonError, TryLockError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use arc_swap::ArcSwap;
use tracing::{debug, error, info};

use crate::domain::SampleKey;
use crate::error::CardLiveError;
use crate::loader::RecordLoader;
use crate::snapshot::Snapshot;
use crate::store::RecordStore;

pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(600);

#[derive(Debug)]
pub enum RefreshOutcome {
    /// No new records; the published snapshot was kept as is.
    Unchanged,
    Updated { samples: usize },
    /// Another refresh was already running.
    Skipped,
    /// The previous snapshot stays published.
    Failed(CardLiveError),
}

/// Owns the loader and publishes snapshots; share it as `Arc<DataManager<S>>`.
pub struct DataManager<S> {
    loader: RecordLoader<S>,
    published: ArcSwap<Snapshot>,
    reload: Mutex<()>,
    refreshing: AtomicBool,
}

impl<S: RecordStore + 'static> DataManager<S> {
    /// Performs the initial full load. Failure here is returned, not logged.
    pub fn new(loader: RecordLoader<S>) -> Result<Self, CardLiveError> {
        let snapshot = loader.read_all()?;
        info!(samples = snapshot.samples_count(), "initial load complete");
        Ok(Self {
            loader,
            published: ArcSwap::from_pointee(snapshot),
            reload: Mutex::new(()),
            refreshing: AtomicBool::new(false),
        })
    }

    pub fn loader(&self) -> &RecordLoader<S> {
        &self.loader
    }

    /// Never blocks; the returned snapshot stays valid after later refreshes.
    pub fn current_snapshot(&self) -> Arc<Snapshot> {
        self.published.load_full()
    }

    /// Reloads everything when the store lists keys missing from the published
    /// snapshot, otherwise returns the published snapshot itself. Waits for a
    /// refresh already in progress.
    pub fn refresh(&self) -> Result<Arc<Snapshot>, CardLiveError> {
        let _reload = self.reload.lock().unwrap_or_else(PoisonError::into_inner);
        self.reload_new_records()
    }

    /// Scheduled entry point: never fails and never overlaps with itself.
    pub fn refresh_job(&self) -> RefreshOutcome {
        let _reload = match self.reload.try_lock() {
            Ok(guard) => guard,
            Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
            Err(TryLockError::WouldBlock) => {
                debug!("refresh already running, skipping tick");
                return RefreshOutcome::Skipped;
            }
        };
        self.refreshing.store(true, Ordering::Release);
        let _running = RunningGuard(&self.refreshing);

        let before = self.current_snapshot();
        match self.reload_new_records() {
            Ok(after) if Arc::ptr_eq(&before, &after) => RefreshOutcome::Unchanged,
            Ok(after) => {
                info!(
                    before = before.samples_count(),
                    after = after.samples_count(),
                    "published new snapshot"
                );
                RefreshOutcome::Updated {
                    samples: after.samples_count(),
                }
            }
            Err(err) => {
                error!(error = %err, "refresh failed, keeping previous snapshot");
                RefreshOutcome::Failed(CardLiveError::RefreshFailure(err.to_string()))
            }
        }
    }

    /// Caller must hold `reload`.
    fn reload_new_records(&self) -> Result<Arc<Snapshot>, CardLiveError> {
        let keys = self.loader.list_keys()?;
        let published = self.current_snapshot();
        let new_keys = keys
            .iter()
            .filter(|key| !published.files().contains(*key))
            .count();
        if new_keys == 0 {
            debug!(samples = published.samples_count(), "no new records");
            return Ok(published);
        }

        info!(new_keys, "new records found, reloading");
        let snapshot = Arc::new(self.loader.read_data(&keys)?);
        self.published.store(Arc::clone(&snapshot));
        Ok(snapshot)
    }

    pub fn is_refreshing(&self) -> bool {
        self.refreshing.load(Ordering::Acquire)
    }

    /// Archive of the given records, or of every sample in the published snapshot.
    pub fn write_archive<W: Write + Seek>(
        &self,
        keys: Option<&BTreeSet<SampleKey>>,
        writer: W,
    ) -> Result<usize, CardLiveError> {
        match keys {
            Some(keys) => self.loader.write_archive(keys, writer),
            None => {
                let snapshot = self.current_snapshot();
                self.loader.write_archive(snapshot.files(), writer)
            }
        }
    }
}

impl<S: RecordStore + 'static> DataManager<S> {
    /// Runs [`DataManager::refresh_job`] every `interval` on a background thread.
    pub fn spawn_refresh(self: &Arc<Self>, interval: Duration) -> Result<RefreshHandle, CardLiveError> {
        let (stop, stopped) = mpsc::channel::<()>();
        let manager = Arc::clone(self);
        let thread = thread::Builder::new()
            .name("cardlive-refresh".to_string())
            .spawn(move || {
                loop {
                    match stopped.recv_timeout(interval) {
                        Err(RecvTimeoutError::Timeout) => {
                            let outcome = manager.refresh_job();
                            debug!(?outcome, "refresh tick");
                        }
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
                debug!("refresh thread stopped");
            })
            .map_err(|err| CardLiveError::RefreshFailure(err.to_string()))?;
        Ok(RefreshHandle {
            stop: Some(stop),
            thread: Some(thread),
        })
    }
}

/// Stops the refresh thread when stopped or dropped.
pub struct RefreshHandle {
    stop: Option<Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl RefreshHandle {
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                error!("refresh thread panicked");
            }
        }
    }
}

impl Drop for RefreshHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

struct RunningGuard<'a>(&'a AtomicBool);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

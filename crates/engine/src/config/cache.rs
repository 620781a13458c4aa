//! Lazily-populated, concurrency-safe configuration cache.
//!
//! Revisions load on first access. Each revision moves through an
//! explicit `NotLoaded -> Loading -> Loaded | Failed` state machine
//! guarded by its own mutex and condvar: exactly one caller performs the
//! load while the rest block and then observe its outcome. The backing
//! source is behind a single mutex because re-establishing its connection
//! must never happen from two threads at once.

use std::collections::HashMap;
use std::sync::{Arc, Condvar, Mutex, PoisonError};

use chrono::{Days, NaiveDate};
use tracing::{info, warn};

use crate::identifiers::ServiceIdentifier;
use crate::model::{EngineError, Result, ServiceContext};

use super::snapshot::{ConfigData, ConfigRevision, RouteConfig};

/// Failure reported by a [`BlockSource`].
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("Connection lost: {0}")]
    ConnectionLost(String),

    #[error("{0}")]
    Other(String),
}

/// External supplier of configuration data and calendar validity.
///
/// Implementations are typically backed by a database or an API session
/// whose connection can drop mid-load; `reconnect` must leave the source
/// usable again after such a drop.
pub trait BlockSource: Send {
    fn load_blocks(
        &mut self,
        revision: ConfigRevision,
    ) -> std::result::Result<ConfigData, SourceError>;

    fn service_ids_for_day(
        &mut self,
        date: NaiveDate,
    ) -> std::result::Result<Vec<ServiceIdentifier>, SourceError>;

    fn reconnect(&mut self) -> std::result::Result<(), SourceError>;
}

enum LoadState {
    NotLoaded,
    Loading,
    Loaded(Arc<RouteConfig>),
    // Kept only until the next fresh caller retries the load
    Failed(String),
}

struct RevisionCell {
    state: Mutex<LoadState>,
    ready: Condvar,
}

impl RevisionCell {
    fn new() -> Self {
        Self {
            state: Mutex::new(LoadState::NotLoaded),
            ready: Condvar::new(),
        }
    }
}

/// Thread-safe cache of [`RouteConfig`] snapshots keyed by revision.
pub struct ConfigCache {
    source: Mutex<Box<dyn BlockSource>>,
    revisions: Mutex<HashMap<ConfigRevision, Arc<RevisionCell>>>,
}

impl ConfigCache {
    pub fn new(source: Box<dyn BlockSource>) -> Self {
        Self {
            source: Mutex::new(source),
            revisions: Mutex::new(HashMap::new()),
        }
    }

    /// The snapshot for `revision`, loading it on first access.
    ///
    /// Callers arriving while another thread is loading block until that
    /// load (including its one retry) finishes and observe its result. A
    /// failed load leaves the revision temporarily unavailable: the next
    /// caller that finds the `Failed` state starts a fresh load.
    pub fn config(&self, revision: ConfigRevision) -> Result<Arc<RouteConfig>> {
        let cell = {
            let mut revisions = lock(&self.revisions);
            revisions
                .entry(revision)
                .or_insert_with(|| Arc::new(RevisionCell::new()))
                .clone()
        };

        let mut state = lock(&cell.state);
        let mut waited = false;
        loop {
            match &*state {
                LoadState::Loaded(config) => return Ok(config.clone()),
                LoadState::Failed(message) if waited => {
                    return Err(EngineError::ConfigUnavailable {
                        revision: revision.0,
                        message: message.clone(),
                    });
                }
                LoadState::Failed(_) | LoadState::NotLoaded => {
                    *state = LoadState::Loading;
                    break;
                }
                LoadState::Loading => {
                    waited = true;
                    state = cell
                        .ready
                        .wait(state)
                        .unwrap_or_else(PoisonError::into_inner);
                }
            }
        }
        drop(state);

        info!(%revision, "loading route configuration");
        let outcome = self
            .with_source_retry(|source| source.load_blocks(revision))
            .map_err(|e| EngineError::ConfigUnavailable {
                revision: revision.0,
                message: e.to_string(),
            })
            .and_then(|data| RouteConfig::from_data(revision, data));

        let mut state = lock(&cell.state);
        match outcome {
            Ok(config) => {
                let config = Arc::new(config);
                *state = LoadState::Loaded(config.clone());
                cell.ready.notify_all();
                Ok(config)
            }
            Err(e) => {
                warn!(%revision, error = %e, "route configuration load failed");
                *state = LoadState::Failed(e.to_string());
                cell.ready.notify_all();
                Err(e)
            }
        }
    }

    /// Service validity for the three days around `today`, fetched from
    /// the source with the same bounded-retry policy as block loads.
    pub fn service_context(&self, today: NaiveDate) -> Result<ServiceContext> {
        let (yesterday, today_ids, tomorrow) = self
            .with_source_retry(|source| {
                let yesterday = source.service_ids_for_day(today - Days::new(1))?;
                let today_ids = source.service_ids_for_day(today)?;
                let tomorrow = source.service_ids_for_day(today + Days::new(1))?;
                Ok((yesterday, today_ids, tomorrow))
            })
            .map_err(|e| EngineError::ConfigUnavailable {
                revision: -1,
                message: format!("service calendar: {}", e),
            })?;
        Ok(ServiceContext::new(yesterday, today_ids, tomorrow))
    }

    // One attempt, then reconnect and exactly one more. Holding the source
    // mutex across both attempts keeps reconnects single-threaded.
    fn with_source_retry<T>(
        &self,
        op: impl Fn(&mut dyn BlockSource) -> std::result::Result<T, SourceError>,
    ) -> std::result::Result<T, SourceError> {
        let mut source = lock(&self.source);
        match op(source.as_mut()) {
            Ok(value) => Ok(value),
            Err(first) => {
                warn!(error = %first, "source operation failed, reconnecting");
                source.reconnect()?;
                op(source.as_mut())
            }
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct ScriptedSource {
        // How many load attempts fail before one succeeds
        failures_left: usize,
        loads: Arc<AtomicUsize>,
        reconnects: Arc<AtomicUsize>,
        load_delay: Duration,
    }

    impl ScriptedSource {
        fn new(failures: usize) -> (Self, Arc<AtomicUsize>, Arc<AtomicUsize>) {
            let loads = Arc::new(AtomicUsize::new(0));
            let reconnects = Arc::new(AtomicUsize::new(0));
            (
                Self {
                    failures_left: failures,
                    loads: loads.clone(),
                    reconnects: reconnects.clone(),
                    load_delay: Duration::ZERO,
                },
                loads,
                reconnects,
            )
        }
    }

    impl BlockSource for ScriptedSource {
        fn load_blocks(
            &mut self,
            _revision: ConfigRevision,
        ) -> std::result::Result<ConfigData, SourceError> {
            std::thread::sleep(self.load_delay);
            self.loads.fetch_add(1, Ordering::SeqCst);
            if self.failures_left > 0 {
                self.failures_left -= 1;
                return Err(SourceError::ConnectionLost("socket reset".into()));
            }
            Ok(ConfigData {
                stops: vec![],
                routes: vec![],
                blocks: vec![],
            })
        }

        fn service_ids_for_day(
            &mut self,
            _date: NaiveDate,
        ) -> std::result::Result<Vec<ServiceIdentifier>, SourceError> {
            Ok(vec![ServiceIdentifier::new("svc")])
        }

        fn reconnect(&mut self) -> std::result::Result<(), SourceError> {
            self.reconnects.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[test]
    fn test_load_once_then_cached() {
        let (source, loads, _) = ScriptedSource::new(0);
        let cache = ConfigCache::new(Box::new(source));

        let a = cache.config(ConfigRevision(1)).unwrap();
        let b = cache.config(ConfigRevision(1)).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(loads.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_transient_failure_retried_once() {
        let (source, loads, reconnects) = ScriptedSource::new(1);
        let cache = ConfigCache::new(Box::new(source));

        assert!(cache.config(ConfigRevision(1)).is_ok());
        assert_eq!(loads.load(Ordering::SeqCst), 2);
        assert_eq!(reconnects.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_double_failure_is_temporary() {
        let (source, loads, _) = ScriptedSource::new(2);
        let cache = ConfigCache::new(Box::new(source));

        let err = cache.config(ConfigRevision(1)).unwrap_err();
        assert!(matches!(err, EngineError::ConfigUnavailable { .. }));
        assert_eq!(loads.load(Ordering::SeqCst), 2);

        // A later caller retries the load and succeeds
        assert!(cache.config(ConfigRevision(1)).is_ok());
        assert_eq!(loads.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_concurrent_callers_share_one_load() {
        let (mut source, loads, _) = ScriptedSource::new(0);
        source.load_delay = Duration::from_millis(50);
        let cache = Arc::new(ConfigCache::new(Box::new(source)));

        std::thread::scope(|scope| {
            for _ in 0..8 {
                let cache = cache.clone();
                scope.spawn(move || {
                    cache.config(ConfigRevision(7)).unwrap();
                });
            }
        });
        assert_eq!(loads.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_service_context_built_from_source() {
        let (source, _, _) = ScriptedSource::new(0);
        let cache = ConfigCache::new(Box::new(source));
        let ctx = cache
            .service_context(NaiveDate::from_ymd_opt(2024, 3, 1).unwrap())
            .unwrap();
        assert!(ctx.is_valid(
            crate::model::DayOffset::Today,
            &ServiceIdentifier::new("svc")
        ));
    }
}

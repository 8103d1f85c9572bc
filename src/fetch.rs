use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::{join_all, BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::Serialize;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::backend::SpotBackend;
use crate::cache::CellCache;
use crate::errors::AppResult;
use crate::grid::GridCellId;
use crate::spots::{CellRecord, Spot};

const BASE_BACKOFF_MS: u64 = 250;

type InFlight = Shared<BoxFuture<'static, ()>>;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FetchReport {
    pub requested: usize,
    pub already_cached: usize,
    pub joined_in_flight: usize,
    pub fetched: usize,
}

/// Fills cache gaps for a set of cells, one backend request per missing cell.
///
/// Each request runs on its own task and is shared by every caller that asks for
/// the same cell while it is pending, so a cell is never fetched twice at once.
/// Dropping an `ensure_loaded` future does not cancel the requests it started.
pub struct FetchCoordinator {
    backend: Arc<dyn SpotBackend>,
    cache: Arc<CellCache>,
    in_flight: Arc<Mutex<HashMap<GridCellId, InFlight>>>,
    retry: Arc<RetryPolicy>,
    issued: Arc<AtomicU64>,
}

impl FetchCoordinator {
    pub fn new(backend: Arc<dyn SpotBackend>, cache: Arc<CellCache>, max_attempts: u32) -> Self {
        Self {
            backend,
            cache,
            in_flight: Arc::new(Mutex::new(HashMap::new())),
            retry: Arc::new(RetryPolicy::new(max_attempts, StdRng::from_entropy())),
            issued: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn cache(&self) -> &Arc<CellCache> {
        &self.cache
    }

    /// Backend requests issued so far, retries included.
    pub fn fetches_issued(&self) -> u64 {
        self.issued.load(Ordering::SeqCst)
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.lock().len()
    }

    /// Resolves once every id in `ids` has a record in the cache.
    pub async fn ensure_loaded(&self, ids: &BTreeSet<GridCellId>) -> FetchReport {
        let mut report = FetchReport {
            requested: ids.len(),
            ..FetchReport::default()
        };
        let mut pending = Vec::new();
        {
            let mut in_flight = self.in_flight.lock();
            for id in ids {
                if self.cache.has(id) {
                    report.already_cached += 1;
                    continue;
                }
                if let Some(task) = in_flight.get(id) {
                    report.joined_in_flight += 1;
                    pending.push(task.clone());
                    continue;
                }
                let task = self.spawn_fetch(*id);
                in_flight.insert(*id, task.clone());
                report.fetched += 1;
                pending.push(task);
            }
        }

        if !pending.is_empty() {
            debug!(
                fetching = report.fetched,
                joined = report.joined_in_flight,
                "waiting for cells"
            );
            join_all(pending).await;
        }
        report
    }

    fn spawn_fetch(&self, id: GridCellId) -> InFlight {
        let backend = Arc::clone(&self.backend);
        let retry = Arc::clone(&self.retry);
        let issued = Arc::clone(&self.issued);
        let cache = Arc::clone(&self.cache);
        let in_flight = Arc::clone(&self.in_flight);

        let handle = tokio::spawn(async move {
            let record = match fetch_with_retry(backend.as_ref(), id, &retry, &issued).await {
                Ok(spots) => {
                    debug!(cell = %id, spots = spots.len(), "cell loaded");
                    CellRecord::Loaded(spots)
                }
                Err(err) => {
                    warn!(cell = %id, ?err, "cell fetch failed; treating cell as empty");
                    CellRecord::Failed
                }
            };
            cache.put(id, record);
            in_flight.lock().remove(&id);
        });

        let cache = Arc::clone(&self.cache);
        let in_flight = Arc::clone(&self.in_flight);
        async move {
            if let Err(err) = handle.await {
                warn!(cell = %id, ?err, "cell fetch task did not finish");
                cache.put(id, CellRecord::Failed);
                in_flight.lock().remove(&id);
            }
        }
        .boxed()
        .shared()
    }
}

struct RetryPolicy {
    max_attempts: u32,
    jitter_rng: Mutex<StdRng>,
}

impl RetryPolicy {
    fn new(max_attempts: u32, rng: StdRng) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            jitter_rng: Mutex::new(rng),
        }
    }

    fn backoff_delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(6);
        let base = Duration::from_millis(BASE_BACKOFF_MS * (1 << exponent));
        let jitter = {
            let mut rng = self.jitter_rng.lock();
            Duration::from_millis(rng.gen_range(0..BASE_BACKOFF_MS))
        };
        base + jitter
    }
}

async fn fetch_with_retry(
    backend: &dyn SpotBackend,
    id: GridCellId,
    retry: &RetryPolicy,
    issued: &AtomicU64,
) -> AppResult<Vec<Spot>> {
    let mut attempt = 0;
    loop {
        attempt += 1;
        issued.fetch_add(1, Ordering::SeqCst);
        match backend.fetch_cell(id).await {
            Ok(spots) => return Ok(spots),
            Err(err) if attempt < retry.max_attempts => {
                let delay = retry.backoff_delay(attempt);
                warn!(
                    cell = %id,
                    ?err,
                    attempt, "cell fetch failed; retrying after {:?}", delay
                );
                sleep(delay).await;
            }
            Err(err) => return Err(err),
        }
    }
}

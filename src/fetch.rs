//! A module for resolving monster IDs into records, cache first.

use std::{
    panic,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Mutex, MutexGuard, PoisonError,
    },
    thread,
    time::Duration,
};

use reqwest::{blocking::Client, StatusCode};
use tracing::{debug, warn};

use crate::{
    builder::Progress,
    cache::Store,
    config::ApiConfig,
    error::Result,
    graph::{MAX_NUM_THREADS, MIN_NUM_THREADS},
    record::{MonsterId, MonsterRecord},
};

/// The outcome of a single upstream request that reached the server.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Response {
    /// A `200 OK` reply and its body.
    Body(String),
    /// Any other status.
    Status(u16),
}

/// An upstream source of monster payloads.
///
/// Transport failures, timeouts included, are returned as errors.
pub trait Source: Send + Sync {
    fn request(&self, id: MonsterId) -> Result<Response>;
}

/// Fetches monsters from `{base_url}/monsters/{id}`.
#[derive(Clone, Debug)]
pub struct HttpSource {
    client: Client,
    base_url: String,
}

impl HttpSource {
    pub fn new(config: &ApiConfig) -> Result<Self> {
        let client = Client::builder().timeout(config.timeout()).build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_owned(),
        })
    }

    /// The endpoint for a monster ID.
    ///
    /// # Examples
    ///
    /// ```
    /// use dropnet::config::ApiConfig;
    /// use dropnet::fetch::HttpSource;
    ///
    /// let config = ApiConfig {
    ///     base_url: "http://localhost:8080/api/".to_owned(),
    ///     ..Default::default()
    /// };
    /// let source = HttpSource::new(&config).unwrap();
    ///
    /// assert_eq!(source.url(1002), "http://localhost:8080/api/monsters/1002");
    /// ```
    pub fn url(&self, id: MonsterId) -> String {
        format!("{}/monsters/{id}", self.base_url)
    }
}

impl Source for HttpSource {
    fn request(&self, id: MonsterId) -> Result<Response> {
        let response = self.client.get(self.url(id)).send()?;

        if response.status() != StatusCode::OK {
            return Ok(Response::Status(response.status().as_u16()));
        }

        Ok(Response::Body(response.text()?))
    }
}

/// How often, and how patiently, transient upstream failures are retried.
///
/// Transport errors, `429` and `5xx` replies are transient; any other status is final.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts made after the first one.
    pub retries: u32,
    /// Delay before the first retry, doubled for each further one.
    pub backoff: Duration,
}

impl RetryPolicy {
    /// A single best-effort attempt.
    pub fn none() -> Self {
        Self::default()
    }

    /// The delay before retry number `attempt` (zero-based).
    ///
    /// # Examples
    ///
    /// ```
    /// use std::time::Duration;
    ///
    /// use dropnet::fetch::RetryPolicy;
    ///
    /// let policy = RetryPolicy { retries: 3, backoff: Duration::from_millis(100) };
    ///
    /// assert_eq!(policy.delay(0), Duration::from_millis(100));
    /// assert_eq!(policy.delay(2), Duration::from_millis(400));
    /// ```
    pub fn delay(&self, attempt: u32) -> Duration {
        self.backoff
            .saturating_mul(2u32.saturating_pow(attempt))
    }
}

fn is_transient(status: u16) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS.as_u16() || (500..600).contains(&status)
}

/// Resolves monster IDs into records, consulting the store before the source.
///
/// Records are written back to the store on a miss; IDs that can't be resolved are never cached
/// so later calls try again.
pub struct Fetcher<S, C> {
    source: S,
    store: Mutex<C>,
    retry: RetryPolicy,
    concurrency: usize,
}

impl<S: Source, C: Store + Send> Fetcher<S, C> {
    /// Creates a fetcher making one attempt per miss, one ID at a time.
    pub fn new(source: S, store: C) -> Self {
        Self {
            source,
            store: Mutex::new(store),
            retry: RetryPolicy::none(),
            concurrency: MIN_NUM_THREADS,
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Sets the number of IDs fetched in parallel by [`fetch_all`](Self::fetch_all).
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.clamp(MIN_NUM_THREADS, MAX_NUM_THREADS);
        self
    }

    /// Returns the number of records currently cached.
    pub fn cached(&self) -> usize {
        self.lock_store().len()
    }

    /// Consumes the fetcher, returning its store.
    pub fn into_store(self) -> C {
        self.store
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns the record for `id`, or `None` if upstream doesn't know it or replied with
    /// something that isn't a monster.
    pub fn fetch(&self, id: MonsterId) -> Option<MonsterRecord> {
        if let Some(record) = self.lock_store().get(id) {
            debug!(id, "cache hit");
            return Some(record);
        }

        debug!(id, "cache miss");
        let body = self.request(id)?;

        let record = match MonsterRecord::decode(id, &body) {
            Ok(record) => record,
            Err(e) => {
                warn!(id, error = %e, "discarding undecodable monster");
                return None;
            }
        };

        // The store lock is only held for the write, never across a request.
        if let Err(e) = self.lock_store().put(id, record.clone()) {
            warn!(id, error = %e, "failed to persist monster record");
        }

        Some(record)
    }

    /// Fetches every ID on a pool of worker threads, returning the results in the order of
    /// `ids`.
    ///
    /// `on_progress` is invoked after each ID completes, from whichever worker completed it.
    pub fn fetch_all<F>(
        &self,
        ids: &[MonsterId],
        on_progress: F,
    ) -> Vec<(MonsterId, Option<MonsterRecord>)>
    where
        F: Fn(Progress) + Sync,
    {
        let num_threads = self.concurrency.min(ids.len()).max(MIN_NUM_THREADS);
        let cursor = AtomicUsize::new(0);
        let processed = AtomicUsize::new(0);

        let mut results: Vec<(usize, Option<MonsterRecord>)> = thread::scope(|scope| {
            let handles: Vec<_> = (0..num_threads)
                .map(|_| scope.spawn(|| self.fetch_task(ids, &cursor, &processed, &on_progress)))
                .collect();

            handles
                .into_iter()
                .flat_map(|handle| match handle.join() {
                    Ok(results) => results,
                    Err(payload) => panic::resume_unwind(payload),
                })
                .collect()
        });

        results.sort_unstable_by_key(|(position, _)| *position);

        results
            .into_iter()
            .map(|(position, record)| (ids[position], record))
            .collect()
    }

    //
    // Private
    //

    /// The worker task, grabbing the next unprocessed ID until there are none left.
    ///
    /// Each worker keeps its own results, tagged with the position of the ID, and the caller
    /// merges them.
    fn fetch_task<F>(
        &self,
        ids: &[MonsterId],
        cursor: &AtomicUsize,
        processed: &AtomicUsize,
        on_progress: &F,
    ) -> Vec<(usize, Option<MonsterRecord>)>
    where
        F: Fn(Progress) + Sync,
    {
        let mut results = Vec::new();

        loop {
            let position = cursor.fetch_add(1, Ordering::Relaxed);
            if position >= ids.len() {
                break;
            }

            results.push((position, self.fetch(ids[position])));

            let done = processed.fetch_add(1, Ordering::Relaxed) + 1;
            on_progress(Progress {
                processed: done,
                total: ids.len(),
            });
        }

        results
    }

    /// Requests the body for `id`, retrying transient failures as the policy allows.
    fn request(&self, id: MonsterId) -> Option<String> {
        let mut attempt = 0;

        loop {
            let transient = match self.source.request(id) {
                Ok(Response::Body(body)) => return Some(body),
                Ok(Response::Status(status)) => {
                    debug!(id, status, attempt, "upstream replied without a monster");
                    is_transient(status)
                }
                Err(e) => {
                    debug!(id, attempt, error = %e, "upstream request failed");
                    true
                }
            };

            if !transient || attempt >= self.retry.retries {
                return None;
            }

            thread::sleep(self.retry.delay(attempt));
            attempt += 1;
        }
    }

    fn lock_store(&self) -> MutexGuard<'_, C> {
        self.store.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<C: Store + Send> Fetcher<HttpSource, C> {
    /// Creates a fetcher against the configured upstream API.
    pub fn from_config(config: &ApiConfig, store: C) -> Result<Self> {
        Ok(Self::new(HttpSource::new(config)?, store)
            .with_retry_policy(config.retry_policy())
            .with_concurrency(config.concurrency))
    }
}

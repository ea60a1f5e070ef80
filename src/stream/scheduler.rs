//! Bounded-concurrency extraction fan-out.
//!
//! One task per classified server, at most `workers` running at once. Each
//! task appends its streams to a shared accumulator under a short lock; a
//! task that fails or panics contributes nothing and never affects its
//! siblings.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::http_client::HttpContext;
use crate::stream::extractors::Extractors;
use crate::stream::provider::ClassifiedServer;
use crate::stream::ranking::Candidate;

/// Default number of concurrent extraction tasks.
pub const DEFAULT_WORKERS: usize = 3;

/// Lifecycle of one [`ExtractionRun`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Pending,
    Dispatched,
    Aggregating,
    Done,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Pending => "pending",
            Self::Dispatched => "dispatched",
            Self::Aggregating => "aggregating",
            Self::Done => "done",
        };
        f.write_str(name)
    }
}

type Accumulator = Arc<Mutex<Vec<(usize, Vec<Candidate>)>>>;

/// Extraction over one resolution call's servers.
pub struct ExtractionRun {
    phase: Phase,
    servers: Vec<ClassifiedServer>,
    handles: Vec<JoinHandle<()>>,
    results: Accumulator,
}

impl ExtractionRun {
    pub fn new(servers: Vec<ClassifiedServer>) -> Self {
        Self {
            phase: Phase::Pending,
            servers,
            handles: Vec::new(),
            results: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Spawn one task per server. Only acts in [`Phase::Pending`].
    pub fn dispatch(&mut self, extractors: &Extractors, ctx: &HttpContext, workers: usize) {
        if self.phase != Phase::Pending {
            debug!(phase = %self.phase, "dispatch ignored");
            return;
        }

        let semaphore = Arc::new(Semaphore::new(workers.max(1)));

        for (index, server) in std::mem::take(&mut self.servers).into_iter().enumerate() {
            let Some(extractor) = extractors.for_category(server.category) else {
                debug!(url = %server.decoded_url, "no extractor for category, skipping");
                continue;
            };

            let sem = semaphore.clone();
            let ctx = ctx.clone();
            let results = self.results.clone();

            self.handles.push(tokio::spawn(async move {
                let Ok(_permit) = sem.acquire_owned().await else {
                    return;
                };

                debug!(extractor = extractor.name(), url = %server.decoded_url, "extracting");
                let streams = extractor.extract(&server, &ctx).await;
                let candidates: Vec<Candidate> = streams
                    .into_iter()
                    .map(|stream| Candidate::new(stream, server.priority))
                    .collect();

                results.lock().push((index, candidates));
            }));
        }

        self.phase = Phase::Dispatched;
    }

    /// Wait for every task, then merge results in dispatch order.
    pub async fn aggregate(&mut self) -> Vec<Candidate> {
        if self.phase != Phase::Dispatched {
            debug!(phase = %self.phase, "aggregate ignored");
            return Vec::new();
        }

        let tasks = self.handles.len();
        for handle in std::mem::take(&mut self.handles) {
            if let Err(e) = handle.await {
                warn!(error = %e, "extraction task aborted");
            }
        }

        self.phase = Phase::Aggregating;
        let mut parts = std::mem::take(&mut *self.results.lock());
        parts.sort_by_key(|(index, _)| *index);
        let merged: Vec<Candidate> = parts.into_iter().flat_map(|(_, c)| c).collect();

        self.phase = Phase::Done;
        info!(tasks, streams = merged.len(), "extraction finished");
        merged
    }
}

/// Runs [`ExtractionRun`]s with a fixed worker count.
#[derive(Debug, Clone, Copy)]
pub struct Scheduler {
    workers: usize,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new(DEFAULT_WORKERS)
    }
}

impl Scheduler {
    pub fn new(workers: usize) -> Self {
        Self {
            workers: workers.max(1),
        }
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Extract every server and return the merged candidates.
    pub async fn run(
        &self,
        servers: Vec<ClassifiedServer>,
        extractors: &Extractors,
        ctx: &HttpContext,
    ) -> Vec<Candidate> {
        let mut run = ExtractionRun::new(servers);
        run.dispatch(extractors, ctx, self.workers);
        run.aggregate().await
    }
}

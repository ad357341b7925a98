//! Batching datapoint processor
//!
//! Single drain loop pulls datapoints off a bounded queue and cuts batches by
//! size or by an idle flush timer. Batches are processed on worker tasks
//! behind a semaphore sized to the core count, so ingestion keeps accepting
//! while at most that many batches are in flight.

use std::sync::Arc;
use std::thread;
use std::time::Instant;

use lru::LruCache;
use parking_lot::{Mutex, RwLock};
use rustc_hash::FxHashMap;
use std::num::NonZeroUsize;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{Semaphore, watch};
use tokio_util::task::TaskTracker;

use crate::core::config::MetricsConfig;
use crate::core::constants::{
    DEFAULT_BUCKET_SECS, FLUSH_INTERVAL, METRIC_REFRESH_INTERVAL, PROM_BUCKET_SECS,
};
use crate::core::shutdown::ShutdownService;
use crate::data::traits::{ProjectDirectory, TelemetryStore};
use crate::data::types::{
    CumPoint, Datapoint, ExpHistogramPoint, HistogramPoint, Metric, MetricKey, NumberPoint,
    Project,
};
use crate::utils::time::truncate_to_secs;

use super::convert::{CumToDeltaConv, build_summary_histogram, delta_counts};
use super::fingerprint::Fingerprinter;
use super::stats::ProcessorStats;

/// Front of the metrics pipeline
///
/// `submit` never blocks: when the queue is full the datapoint is dropped and
/// counted. `start` spawns the drain loop; `stop` waits for the loop and all
/// in-flight batch workers to finish.
pub struct DatapointProcessor {
    tx: mpsc::Sender<Datapoint>,
    rx: Mutex<Option<mpsc::Receiver<Datapoint>>>,
    worker: Arc<Worker>,
    tracker: TaskTracker,
}

impl DatapointProcessor {
    pub fn new(
        config: &MetricsConfig,
        store: Arc<dyn TelemetryStore>,
        projects: Arc<dyn ProjectDirectory>,
    ) -> Self {
        let (tx, rx) = mpsc::channel(config.buffer_size);
        let parallelism = thread::available_parallelism().map_or(1, |n| n.get());

        tracing::info!(
            workers = parallelism,
            batch_size = config.batch_size,
            buffer_size = config.buffer_size,
            cum_to_delta_size = config.cum_to_delta_size,
            "Starting datapoint processor"
        );

        Self {
            tx,
            rx: Mutex::new(Some(rx)),
            worker: Arc::new(Worker {
                batch_size: config.batch_size,
                fingerprinter: Fingerprinter::new(&config.drop_attrs),
                converter: CumToDeltaConv::new(config.cum_to_delta_size),
                metric_cache: RwLock::new(LruCache::new(
                    NonZeroUsize::new(config.cum_to_delta_size).unwrap_or(NonZeroUsize::MIN),
                )),
                stats: ProcessorStats::new(),
                gate: Arc::new(Semaphore::new(parallelism)),
                store,
                projects,
            }),
            tracker: TaskTracker::new(),
        }
    }

    /// Spawn the drain loop. Idempotent; a second call is a no-op.
    pub fn start(&self, shutdown: &ShutdownService) {
        let Some(rx) = self.rx.lock().take() else {
            tracing::warn!("Datapoint processor already started");
            return;
        };

        let worker = Arc::clone(&self.worker);
        let shutdown_rx = shutdown.subscribe();
        let tracker = self.tracker.clone();
        self.tracker.spawn(async move {
            worker.run(rx, shutdown_rx, tracker).await;
        });
    }

    /// Enqueue a datapoint without blocking. Returns false when the queue is
    /// full or the processor has stopped; the datapoint is counted as dropped.
    pub fn submit(&self, datapoint: Datapoint) -> bool {
        match self.tx.try_send(datapoint) {
            Ok(()) => true,
            Err(TrySendError::Full(dp)) => {
                tracing::error!(
                    queue_depth = self.queue_depth(),
                    "Datapoint buffer is full (consider increasing metrics.buffer_size)"
                );
                self.worker.stats.record_dropped(dp.project_id, 1);
                false
            }
            Err(TrySendError::Closed(dp)) => {
                self.worker.stats.record_dropped(dp.project_id, 1);
                false
            }
        }
    }

    /// Wait for the drain loop and all in-flight batches to finish.
    ///
    /// The loop itself exits on the shutdown signal, so trigger shutdown
    /// before calling this.
    pub async fn stop(&self) {
        self.tracker.close();
        self.tracker.wait().await;
        tracing::debug!("Datapoint processor stopped");
    }

    /// Number of datapoints currently queued
    pub fn queue_depth(&self) -> usize {
        self.tx.max_capacity() - self.tx.capacity()
    }

    pub fn stats(&self) -> &ProcessorStats {
        &self.worker.stats
    }

    /// Number of cumulative series currently tracked
    pub fn tracked_series(&self) -> usize {
        self.worker.converter.len()
    }
}

/// Per-batch scratch state: resolved projects and catalog entries to flush
#[derive(Default)]
struct BatchContext {
    projects: FxHashMap<u32, Option<Project>>,
    metrics: Vec<Metric>,
}

impl BatchContext {
    async fn resolve_project(
        &mut self,
        directory: &dyn ProjectDirectory,
        project_id: u32,
    ) -> Option<Project> {
        if let Some(cached) = self.projects.get(&project_id) {
            return cached.clone();
        }

        match directory.resolve_project(project_id).await {
            Ok(project) => {
                self.projects.insert(project_id, project.clone());
                project
            }
            Err(e) => {
                tracing::error!(error = %e, project_id, "Project lookup failed");
                None
            }
        }
    }
}

struct Worker {
    batch_size: usize,
    fingerprinter: Fingerprinter,
    converter: CumToDeltaConv,
    /// Last catalog refresh per metric; read path takes the shared lock
    metric_cache: RwLock<LruCache<MetricKey, Instant>>,
    stats: ProcessorStats,
    gate: Arc<Semaphore>,
    store: Arc<dyn TelemetryStore>,
    projects: Arc<dyn ProjectDirectory>,
}

impl Worker {
    async fn run(
        self: Arc<Self>,
        mut rx: mpsc::Receiver<Datapoint>,
        mut shutdown_rx: watch::Receiver<bool>,
        tracker: TaskTracker,
    ) {
        let mut batch: Vec<Datapoint> = Vec::with_capacity(self.batch_size);

        let timer = tokio::time::sleep(FLUSH_INTERVAL);
        tokio::pin!(timer);

        loop {
            tokio::select! {
                biased;
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        tracing::debug!("Drain loop received shutdown signal");
                        break;
                    }
                }
                maybe = rx.recv() => {
                    match maybe {
                        Some(datapoint) => {
                            batch.push(datapoint);
                            if batch.len() >= self.batch_size {
                                self.dispatch(&mut batch, &tracker).await;
                                timer.as_mut().reset(tokio::time::Instant::now() + FLUSH_INTERVAL);
                            }
                        }
                        None => break,
                    }
                }
                _ = &mut timer => {
                    if !batch.is_empty() {
                        self.dispatch(&mut batch, &tracker).await;
                    }
                    timer.as_mut().reset(tokio::time::Instant::now() + FLUSH_INTERVAL);
                }
            }
        }

        // flush what is already batched; anything still queued is abandoned
        if !batch.is_empty() {
            self.process_batch(batch).await;
        }
    }

    /// Hand a full batch to a worker task, waiting for a free slot first so
    /// the number of in-flight batches stays bounded.
    async fn dispatch(self: &Arc<Self>, batch: &mut Vec<Datapoint>, tracker: &TaskTracker) {
        let datapoints = std::mem::replace(batch, Vec::with_capacity(self.batch_size));

        let Ok(permit) = Arc::clone(&self.gate).acquire_owned().await else {
            return;
        };

        let worker = Arc::clone(self);
        tracker.spawn(async move {
            let _permit = permit;
            worker.process_batch(datapoints).await;
        });
    }

    async fn process_batch(&self, mut batch: Vec<Datapoint>) {
        let mut ctx = BatchContext::default();

        // walk backwards so dropped points can be removed in place
        let mut i = batch.len();
        while i > 0 {
            i -= 1;

            self.fingerprinter.fingerprint(&mut batch[i]);

            if !self.cum_to_delta(&mut batch[i]) {
                let dp = batch.remove(i);
                self.stats.record_dropped(dp.project_id, 1);
                continue;
            }

            let project_id = batch[i].project_id;
            let Some(project) = ctx.resolve_project(&*self.projects, project_id).await else {
                batch.remove(i);
                self.stats.record_dropped(project_id, 1);
                continue;
            };

            self.stats.record_inserted(project_id, 1);
            self.upsert_metric(&mut ctx, &batch[i]);

            let bucket_secs = if project.prom_compat {
                PROM_BUCKET_SECS
            } else {
                DEFAULT_BUCKET_SECS
            };
            batch[i].time = truncate_to_secs(batch[i].time, bucket_secs);
        }

        if !batch.is_empty()
            && let Err(e) = self.store.insert_datapoints(&batch).await
        {
            tracing::error!(error = %e, count = batch.len(), "Datapoint insert failed");
        }

        if !ctx.metrics.is_empty()
            && let Err(e) = self.store.upsert_metrics(&ctx.metrics).await
        {
            tracing::error!(error = %e, count = ctx.metrics.len(), "Metric upsert failed");
        }
    }

    /// Convert a cumulative snapshot to a delta in place. Returns false when
    /// the point must be dropped (no baseline, reset, shape mismatch, or
    /// out-of-order delivery).
    fn cum_to_delta(&self, dp: &mut Datapoint) -> bool {
        match dp.cum_point.take() {
            None => true,
            Some(CumPoint::Number(point)) => self.convert_number(dp, point),
            Some(CumPoint::Histogram(point)) => self.convert_histogram(dp, point),
            Some(CumPoint::ExpHistogram(point)) => self.convert_exp_histogram(dp, point),
        }
    }

    fn convert_number(&self, dp: &mut Datapoint, point: NumberPoint) -> bool {
        let key = dp.series_key();
        let prev = match self.converter.swap(&key, CumPoint::Number(point), dp.time) {
            Some(CumPoint::Number(prev)) => prev,
            _ => return false,
        };

        let int_delta = point.int - prev.int;
        if int_delta > 0 {
            dp.sum = int_delta as f64;
        } else {
            let double_delta = point.double - prev.double;
            if double_delta > 0.0 {
                dp.sum = double_delta;
            }
        }
        true
    }

    fn convert_histogram(&self, dp: &mut Datapoint, point: HistogramPoint) -> bool {
        let key = dp.series_key();
        let prev = match self
            .converter
            .swap(&key, CumPoint::Histogram(point.clone()), dp.time)
        {
            Some(CumPoint::Histogram(prev)) => prev,
            _ => return false,
        };

        if point.bucket_counts.len() != prev.bucket_counts.len() {
            tracing::error!(
                metric = %dp.metric,
                buckets = point.bucket_counts.len(),
                prev_buckets = prev.bucket_counts.len(),
                "Histogram bucket count mismatch"
            );
            return false;
        }
        if point.count < prev.count {
            // counter reset; the new snapshot is already the baseline
            return false;
        }

        dp.sum = point.sum - prev.sum;
        dp.count = point.count - prev.count;

        let counts = delta_counts(&point.bucket_counts, &prev.bucket_counts);
        let avg = dp.sum / dp.count as f64;
        let (histogram, min, max) = build_summary_histogram(&point.bounds, &counts, avg, dp.count);
        dp.histogram = histogram;
        dp.min = min;
        dp.max = max;
        true
    }

    fn convert_exp_histogram(&self, dp: &mut Datapoint, point: ExpHistogramPoint) -> bool {
        let key = dp.series_key();
        let prev = match self
            .converter
            .swap(&key, CumPoint::ExpHistogram(point.clone()), dp.time)
        {
            Some(CumPoint::ExpHistogram(prev)) => prev,
            _ => return false,
        };

        if point.count < prev.count {
            return false;
        }

        dp.sum = point.sum - prev.sum;
        dp.count = point.count - prev.count;

        let mut histogram = FxHashMap::default();
        for (&mean, &count) in &point.histogram {
            let prev_count = prev.histogram.get(&mean).copied().unwrap_or(0);
            let delta = count.saturating_sub(prev_count);
            if delta > 0 {
                histogram.insert(mean, delta);
            }
        }
        dp.histogram = histogram;
        true
    }

    /// Queue a catalog refresh for this metric unless one happened recently.
    /// Double-checked so concurrent batches refresh a metric at most once.
    fn upsert_metric(&self, ctx: &mut BatchContext, dp: &Datapoint) {
        let key = MetricKey {
            project_id: dp.project_id,
            metric: dp.metric.clone(),
        };

        {
            let cache = self.metric_cache.read();
            if let Some(at) = cache.peek(&key)
                && at.elapsed() < METRIC_REFRESH_INTERVAL
            {
                return;
            }
        }

        let mut cache = self.metric_cache.write();
        if let Some(at) = cache.peek(&key)
            && at.elapsed() < METRIC_REFRESH_INTERVAL
        {
            return;
        }
        cache.push(key, Instant::now());

        ctx.metrics.push(Metric {
            project_id: dp.project_id,
            name: dp.metric.clone(),
            description: dp.description.clone(),
            unit: dp.unit.clone(),
            instrument: dp.instrument,
            attr_keys: dp.string_keys.clone(),
        });
    }
}

use curtail_core::{
    AccessContext, AccessOutcome, AnalyticsSink, InvalidationReason, ShortCode, UrlCache, UrlStore,
};
use jiff::Timestamp;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use typed_builder::TypedBuilder;

/// One access observed at the redirect boundary, waiting to be recorded.
#[derive(Debug, Clone)]
struct AccessJob {
    code: ShortCode,
    context: AccessContext,
    observed_at: Timestamp,
}

/// Tunables for the access-recording worker.
#[derive(Debug, Clone, TypedBuilder)]
pub struct RecorderSettings {
    /// Queued jobs beyond this are dropped rather than blocking redirects.
    #[builder(default = 1024)]
    pub queue_capacity: usize,
    /// Reload-and-retry rounds when a save races another writer.
    #[builder(default = 3)]
    pub max_save_retries: u32,
}

impl Default for RecorderSettings {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Queues access recordings without blocking the redirect path.
///
/// Delivery is best-effort: a full queue or a crashed worker drops the
/// job with a warning, and a process exit between redirect and recording
/// loses whatever was still queued. The worker drains the queue and exits
/// once every `AccessRecorder` clone has been dropped.
#[derive(Debug, Clone)]
pub struct AccessRecorder {
    tx: mpsc::Sender<AccessJob>,
}

impl AccessRecorder {
    /// Spawns the recording worker and returns the handle used to feed it.
    ///
    /// The returned [`JoinHandle`] completes after the queue has drained,
    /// which is what shutdown (and tests) wait on.
    pub fn spawn<S, C, K>(
        store: S,
        cache: C,
        sink: K,
        settings: RecorderSettings,
    ) -> (Self, JoinHandle<()>)
    where
        S: UrlStore,
        C: UrlCache,
        K: AnalyticsSink,
    {
        let (tx, rx) = mpsc::channel(settings.queue_capacity);
        let worker = Worker {
            store,
            cache,
            sink,
            max_save_retries: settings.max_save_retries,
        };
        let handle = tokio::spawn(worker.run(rx));
        (Self { tx }, handle)
    }

    /// Queues one access for recording. Never blocks and never fails the
    /// caller; an unqueueable job is dropped with a warning.
    pub fn dispatch(&self, code: &ShortCode, context: AccessContext, observed_at: Timestamp) {
        let job = AccessJob {
            code: code.clone(),
            context,
            observed_at,
        };
        if let Err(e) = self.tx.try_send(job) {
            warn!(error = %e, "failed to enqueue access recording");
        }
    }
}

struct Worker<S, C, K> {
    store: S,
    cache: C,
    sink: K,
    max_save_retries: u32,
}

impl<S, C, K> Worker<S, C, K>
where
    S: UrlStore,
    C: UrlCache,
    K: AnalyticsSink,
{
    async fn run(self, mut rx: mpsc::Receiver<AccessJob>) {
        while let Some(job) = rx.recv().await {
            self.process(job).await;
        }
        debug!("access recorder drained, shutting down");
    }

    /// Records one access. Every failure ends here; nothing propagates
    /// back to the redirect that queued the job.
    async fn process(&self, job: AccessJob) {
        for attempt in 0..=self.max_save_retries {
            let loaded = match self.store.load(&job.code).await {
                Ok(loaded) => loaded,
                Err(e) => {
                    warn!(code = %job.code, error = %e, "could not load for access recording");
                    return;
                }
            };
            let Some(mut aggregate) = loaded else {
                debug!(code = %job.code, "code vanished before recording");
                return;
            };

            let outcome = match aggregate.record_access(job.context.clone(), job.observed_at) {
                Ok(outcome) => outcome,
                Err(e) => {
                    debug!(code = %job.code, error = %e, "record no longer accepts accesses");
                    return;
                }
            };

            match self.store.save(&mut aggregate).await {
                Ok(()) => {
                    self.finish(&job, outcome).await;
                    return;
                }
                Err(e) if e.is_retryable_conflict() => {
                    debug!(code = %job.code, attempt, "conflicting write while recording, reloading");
                }
                Err(e) => {
                    warn!(code = %job.code, error = %e, "failed to persist access");
                    return;
                }
            }
        }
        warn!(code = %job.code, "gave up recording access after repeated conflicts");
    }

    async fn finish(&self, job: &AccessJob, outcome: AccessOutcome) {
        match outcome {
            AccessOutcome::Recorded => {
                if let Err(e) = self.sink.record_access(&job.code, &job.context).await {
                    warn!(code = %job.code, error = %e, "analytics sink rejected access detail");
                }
            }
            AccessOutcome::Expired => {
                // The access discovered the expiry; evict the stale entry.
                if let Err(e) = self
                    .cache
                    .invalidate(&job.code, InvalidationReason::Expired)
                    .await
                {
                    warn!(code = %job.code, error = %e, "failed to invalidate expired entry");
                }
            }
        }
    }
}

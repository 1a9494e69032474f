use crate::{
    cancel::CancelToken,
    config::Config,
    error::PrepError,
    exec::Runner,
    filter::{ImageFilter, PageOutcome},
};
use crossbeam_channel::{Receiver, SendTimeoutError, Sender, bounded, unbounded};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;
use tracing::{debug, info, warn};

const DISPATCH_POLL: Duration = Duration::from_millis(50);

/// One page waiting for a worker. `index` is its position in the batch.
struct SplitJob<'a> {
    index: usize,
    input: &'a Path,
}

type JobResult = (usize, Result<PageOutcome, PrepError>);

/// Fans the image filter out over a fixed pool of worker threads.
///
/// Every batch gets a fresh pool that is joined before `split` returns,
/// whether the batch finished, had failing pages, or was cancelled.
pub struct SplitCoordinator<R: Runner> {
    filter: ImageFilter<R>,
    workers: usize,
}

impl<R: Runner> SplitCoordinator<R> {
    pub fn new(filter: ImageFilter<R>, workers: usize) -> Self {
        Self {
            filter,
            workers: workers.max(1),
        }
    }

    pub fn from_config(cfg: &Config, runner: R) -> Self {
        Self::new(ImageFilter::new(&cfg.filter, runner), cfg.threads())
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Output path for every input, in input order. Pages whose filter run
    /// failed come back unchanged.
    pub fn split(&self, inputs: &[PathBuf], cancel: &CancelToken) -> Result<Vec<PathBuf>, PrepError> {
        Ok(self
            .run_batch(inputs, cancel)?
            .into_iter()
            .map(|o| o.output)
            .collect())
    }

    /// Like [`split`](Self::split) but keeps the per-page status.
    pub fn run_batch(
        &self,
        inputs: &[PathBuf],
        cancel: &CancelToken,
    ) -> Result<Vec<PageOutcome>, PrepError> {
        if inputs.is_empty() {
            return Ok(Vec::new());
        }
        if cancel.is_cancelled() {
            return Err(PrepError::BatchCancelled);
        }

        let workers = self.workers.min(inputs.len());
        info!(
            "starting splitting parallel execution: {} pages, {} workers",
            inputs.len(),
            workers
        );

        let mut slots: Vec<Option<PageOutcome>> = vec![None; inputs.len()];
        let filter = &self.filter;

        thread::scope(|s| {
            let (job_tx, job_rx) = bounded::<SplitJob>(workers);
            let (result_tx, result_rx) = unbounded::<JobResult>();

            for id in 0..workers {
                let jobs = job_rx.clone();
                let results = result_tx.clone();
                s.spawn(move || work(id, filter, jobs, results, cancel));
            }
            drop(job_rx);
            drop(result_tx);

            dispatch(inputs, &job_tx, cancel);
            drop(job_tx);

            for (index, res) in result_rx.iter() {
                match res {
                    Ok(outcome) => slots[index] = Some(outcome),
                    Err(err) => {
                        debug!("page {index} stopped: {err}");
                        cancel.cancel();
                    }
                }
            }
        });
        info!("completed splitting");

        if cancel.is_cancelled() {
            warn!("caught cancellation, worker pool terminated");
            return Err(PrepError::BatchCancelled);
        }

        Ok(slots
            .into_iter()
            .zip(inputs)
            .map(|(slot, input)| {
                slot.unwrap_or_else(|| PageOutcome::fallback(input, "no result collected"))
            })
            .collect())
    }
}

/// Feeds jobs to the pool until done or cancelled. Never blocks longer than
/// `DISPATCH_POLL` without rechecking the token.
fn dispatch<'a>(inputs: &'a [PathBuf], jobs: &Sender<SplitJob<'a>>, cancel: &CancelToken) {
    for (index, input) in inputs.iter().enumerate() {
        let mut job = SplitJob { index, input };
        loop {
            if cancel.is_cancelled() {
                debug!("dispatch stopped at page {index}");
                return;
            }
            match jobs.send_timeout(job, DISPATCH_POLL) {
                Ok(()) => break,
                Err(SendTimeoutError::Timeout(j)) => job = j,
                Err(SendTimeoutError::Disconnected(_)) => return,
            }
        }
    }
}

fn work<R: Runner>(
    id: usize,
    filter: &ImageFilter<R>,
    jobs: Receiver<SplitJob<'_>>,
    results: Sender<JobResult>,
    cancel: &CancelToken,
) {
    for job in jobs.iter() {
        let outcome = if cancel.is_cancelled() {
            Err(PrepError::BatchCancelled)
        } else {
            filter.filter(job.input, cancel)
        };
        if results.send((job.index, outcome)).is_err() {
            break;
        }
    }
    debug!("split worker {id} exiting");
}

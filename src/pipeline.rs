use crate::{
    cancel::CancelToken,
    config::Config,
    engine::{self, EngineReport},
    error::PrepError,
    exec::Runner,
    report::{BatchCounts, BatchReport},
    split::SplitCoordinator,
    util::{now_rfc3339, sha256_hex},
};
use std::path::PathBuf;
use std::time::Instant;
use tracing::info;

/// Gate the engine, then preprocess every page.
pub struct Pipeline<R: Runner + Clone> {
    cfg: Config,
    runner: R,
    coordinator: SplitCoordinator<R>,
}

impl<R: Runner + Clone> Pipeline<R> {
    pub fn new(cfg: &Config, runner: R) -> Self {
        Self {
            cfg: cfg.clone(),
            coordinator: SplitCoordinator::from_config(cfg, runner.clone()),
            runner,
        }
    }

    /// Fails with `EngineNotInvocable`/`EngineTooOld` before any page is
    /// touched.
    pub fn check_engine(&self, cancel: &CancelToken) -> Result<EngineReport, PrepError> {
        let report = engine::probe(&self.cfg, &self.runner, cancel)?;
        report.require()?;
        Ok(report)
    }

    pub fn batch_id(&self, inputs: &[PathBuf]) -> String {
        let mut key = self.cfg.normalized_for_hash();
        for input in inputs {
            key.push('\n');
            key.push_str(&input.display().to_string());
        }
        sha256_hex(key.as_bytes())
    }

    pub fn run(&self, inputs: &[PathBuf], cancel: &CancelToken) -> Result<BatchReport, PrepError> {
        let started_at = Instant::now();
        let started = now_rfc3339();
        let batch_id = self.batch_id(inputs);
        info!("batch_id={batch_id} pages={}", inputs.len());

        let engine = self.check_engine(cancel)?;
        let pages = self.coordinator.run_batch(inputs, cancel)?;
        let counts = BatchCounts::from_pages(&pages);

        info!(
            "batch done in {:.1}s: {} filtered, {} unchanged",
            started_at.elapsed().as_secs_f64(),
            counts.filtered,
            counts.fallback
        );

        Ok(BatchReport {
            batch_id,
            started,
            finished: now_rfc3339(),
            workers: self.coordinator.workers(),
            engine,
            counts,
            pages,
        })
    }
}

use crate::{
    cancel::CancelToken,
    config::Config,
    error::PrepError,
    exec::{RunError, Runner, ToolCommand},
    version::{GateOutcome, VersionGate, VersionRequirement},
};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

const VERSION_PROBE_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineReport {
    pub binary: String,
    pub gate: GateOutcome,
}

impl EngineReport {
    /// Turns a failed gate into the fatal `EngineTooOld` error.
    pub fn require(&self) -> Result<(), PrepError> {
        if self.gate.passed {
            Ok(())
        } else {
            Err(PrepError::EngineTooOld {
                found: self.gate.reported.clone(),
                required: self.gate.required.to_string(),
            })
        }
    }
}

/// Runs the OCR engine's version report and evaluates it against the
/// configured minimum. Only invocation problems are errors here; a too-old
/// engine is reported through `EngineReport::gate`.
pub fn probe<R: Runner + ?Sized>(
    cfg: &Config,
    runner: &R,
    cancel: &CancelToken,
) -> Result<EngineReport, PrepError> {
    let platform = cfg.platform();
    let binary = cfg.engine.resolve_binary(platform);
    if !cfg.engine.binary.trim().is_empty() {
        info!("setting location for tesseract executable to {binary}");
    }

    info!("checking tesseract version");
    let cmd = ToolCommand::new(binary.as_str())
        .arg(cfg.engine.version_flag.as_str())
        .timeout(Some(VERSION_PROBE_TIMEOUT));

    let out = match runner.run(&cmd, cancel) {
        Ok(out) if out.success => out,
        Ok(out) => {
            return Err(PrepError::EngineNotInvocable {
                binary,
                reason: format!(
                    "exited with {}: {}",
                    out.code
                        .map(|c| format!("code {c}"))
                        .unwrap_or_else(|| "signal".into()),
                    out.combined_text().trim()
                ),
            });
        }
        Err(RunError::Cancelled { .. }) => return Err(PrepError::BatchCancelled),
        Err(err) => {
            return Err(PrepError::EngineNotInvocable {
                binary,
                reason: err.to_string(),
            });
        }
    };

    let text = out.combined_text();
    debug!("version output: {}", text.trim());

    let requirement = VersionRequirement::parse(&cfg.engine.required_version);
    let gate = VersionGate::new(cfg.engine.name_token.as_str()).check(&text, &requirement, platform);
    info!(
        "tesseract version {} (parsed {}), required {} on {}: {}",
        gate.reported,
        gate.version,
        gate.required,
        gate.platform,
        if gate.passed { "ok" } else { "too old" }
    );

    Ok(EngineReport { binary, gate })
}

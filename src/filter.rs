use crate::{
    cancel::CancelToken,
    config,
    error::PrepError,
    exec::{RunError, Runner, ToolCommand},
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

/// First (and only) split produced per page.
const SPLIT_SEQUENCE: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PageStatus {
    Filtered,
    Fallback { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageOutcome {
    pub input: PathBuf,
    pub output: PathBuf,
    #[serde(flatten)]
    pub status: PageStatus,
}

impl PageOutcome {
    pub fn is_filtered(&self) -> bool {
        matches!(self.status, PageStatus::Filtered)
    }

    /// Ships the unmodified page.
    pub fn fallback(input: &Path, reason: impl Into<String>) -> Self {
        Self {
            input: input.to_path_buf(),
            output: input.to_path_buf(),
            status: PageStatus::Fallback {
                reason: reason.into(),
            },
        }
    }
}

/// `page.png` -> `page_split1.png`, next to the input.
pub fn split_output_path(input: &Path, marker: &str, seq: u32) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = match input.extension() {
        Some(ext) => format!("{stem}{marker}{seq}.{}", ext.to_string_lossy()),
        None => format!("{stem}{marker}{seq}"),
    };
    input.with_file_name(name)
}

/// Runs the OCR enhancement chain on single page images.
pub struct ImageFilter<R: Runner> {
    params: config::Filter,
    runner: R,
}

impl<R: Runner> ImageFilter<R> {
    pub fn new(params: &config::Filter, runner: R) -> Self {
        Self {
            params: params.clone(),
            runner,
        }
    }

    pub fn output_path(&self, input: &Path) -> PathBuf {
        split_output_path(input, &self.params.split_marker, SPLIT_SEQUENCE)
    }

    /// The full tool invocation for one page:
    /// 1. grayscale clone with local adaptive threshold and contrast stretch,
    /// 2. composited back onto the original as an opacity mask,
    /// 3. mild blur,
    /// 4. adaptive sharpen,
    /// 5. thinning of long horizontal/vertical rules.
    pub fn command(&self, input: &Path, output: &Path) -> ToolCommand {
        let p = &self.params;
        let input = tool_path_arg(input);
        let output = tool_path_arg(output);
        let timeout = (p.timeout_seconds > 0).then(|| Duration::from_secs(p.timeout_seconds));

        ToolCommand::new(p.binary.as_str())
            .args([input.as_str(), "-respect-parentheses"])
            .args(["(", "-clone", "0", "-colorspace", "gray", "-negate"])
            .args(["-lat", p.local_threshold.as_str()])
            .args(["-contrast-stretch", p.contrast_stretch.as_str(), ")"])
            .args(["-compose", "copy_opacity", "-composite"])
            .args(["-opaque", "none", "-alpha", "off", "-modulate", "100,100"])
            .args(["-blur", p.blur.as_str()])
            .args(["-adaptive-sharpen", p.adaptive_sharpen.as_str()])
            .args(["-negate", "-define", "morphology:compose=darken"])
            .args(["-morphology", "Thinning", p.thinning_kernel.as_str(), "-negate"])
            .arg(output)
            .timeout(timeout)
    }

    /// Filters one page. Tool failures degrade to the input path; only
    /// cancellation is returned as an error.
    pub fn filter(&self, input: &Path, cancel: &CancelToken) -> Result<PageOutcome, PrepError> {
        let output = self.output_path(input);
        let cmd = self.command(input, &output);
        info!("preprocessing image {} for better OCR", input.display());

        let failure = match self.runner.run(&cmd, cancel) {
            Ok(out) if out.success => {
                if self.params.keep_tool_output {
                    let text = out.combined_text();
                    if !text.trim().is_empty() {
                        debug!("{} output: {}", self.params.binary, text.trim());
                    }
                }
                return Ok(PageOutcome {
                    input: input.to_path_buf(),
                    output,
                    status: PageStatus::Filtered,
                });
            }
            Ok(out) => {
                let code = out
                    .code
                    .map(|c| c.to_string())
                    .unwrap_or_else(|| "none".into());
                format!("exit code {code}: {}", out.combined_text().trim())
            }
            Err(RunError::Cancelled { .. }) => {
                discard_partial(&output);
                return Err(PrepError::BatchCancelled);
            }
            Err(err) => err.to_string(),
        };

        discard_partial(&output);
        let err = PrepError::FilterToolFailed {
            input: input.to_path_buf(),
            reason: failure,
        };
        warn!("{err}; using original page");
        Ok(PageOutcome::fallback(input, err.to_string()))
    }
}

/// Path as the tool should see it. A relative name starting with `-` would
/// be parsed as an option, so it gets a `./` prefix.
pub fn tool_path_arg(path: &Path) -> String {
    let raw = path.to_string_lossy();
    if path.is_relative() && raw.starts_with('-') {
        format!("./{raw}")
    } else {
        raw.into_owned()
    }
}

fn discard_partial(output: &Path) {
    if output.exists() {
        if let Err(err) = std::fs::remove_file(output) {
            debug!("could not remove partial output {}: {err}", output.display());
        }
    }
}

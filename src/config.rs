use crate::version::Platform;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const DEFAULT_THREADS: usize = 4;

const UNIX_ENGINE_BINARY: &str = "tesseract";
const WINDOWS_ENGINE_BINARY: &str = r"C:\Program Files (x86)\Tesseract-OCR\tesseract.exe";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub global: Global,
    #[serde(default)]
    pub paths: Paths,
    #[serde(default)]
    pub engine: Engine,
    #[serde(default)]
    pub filter: Filter,
    #[serde(default)]
    pub output: Output,
    #[serde(default)]
    pub logging: Logging,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config: {}", path.display()))?;
        let cfg: Config = toml::from_str(&raw).with_context(|| "parsing TOML")?;
        Ok(cfg)
    }

    /// A stable, normalization-friendly string for hashing.
    pub fn normalized_for_hash(&self) -> String {
        toml::to_string(self).unwrap_or_default()
    }

    /// Platform the gate should assume: the configured override, else the host.
    pub fn platform(&self) -> Platform {
        self.global.platform.unwrap_or_else(Platform::current)
    }

    /// Worker count, never below one.
    pub fn threads(&self) -> usize {
        self.global.threads.max(1)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Global {
    pub threads: usize,
    /// Omit to detect from the host.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform: Option<Platform>,
    pub print_summary: bool,
}
impl Default for Global {
    fn default() -> Self {
        Self {
            threads: DEFAULT_THREADS,
            platform: None,
            print_summary: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Paths {
    pub out_dir: String,
}
impl Default for Paths {
    fn default() -> Self {
        Self {
            out_dir: "out".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Engine {
    /// Empty selects the platform default location.
    pub binary: String,
    pub name_token: String,
    pub version_flag: String,
    pub required_version: String,
}
impl Default for Engine {
    fn default() -> Self {
        Self {
            binary: "".into(),
            name_token: "tesseract".into(),
            version_flag: "-v".into(),
            required_version: "3.02.02".into(),
        }
    }
}

impl Engine {
    pub fn resolve_binary(&self, platform: Platform) -> String {
        let raw = self.binary.trim();
        if !raw.is_empty() {
            return raw.to_string();
        }
        match platform {
            Platform::Windows => WINDOWS_ENGINE_BINARY.into(),
            Platform::Unix => UNIX_ENGINE_BINARY.into(),
        }
    }
}

/// Parameters of the enhancement chain. Stage order is fixed in
/// `filter::ImageFilter::command`; only the values are tunable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Filter {
    pub binary: String,
    pub split_marker: String,
    pub local_threshold: String,
    pub contrast_stretch: String,
    pub blur: String,
    pub adaptive_sharpen: String,
    pub thinning_kernel: String,
    pub timeout_seconds: u64,
    pub keep_tool_output: bool,
}
impl Default for Filter {
    fn default() -> Self {
        Self {
            binary: "convert".into(),
            split_marker: "_split".into(),
            local_threshold: "15x15+5%".into(),
            contrast_stretch: "0".into(),
            blur: "1x1".into(),
            adaptive_sharpen: "0x2".into(),
            // Removes vertical rules >= 60px and thins those > 30px; older
            // tesseract drops text that sits next to table lines.
            thinning_kernel: "Rectangle:1x30+0+0".into(),
            timeout_seconds: 0,
            keep_tool_output: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Output {
    pub write_report_json: bool,
    pub report_filename: String,
}
impl Default for Output {
    fn default() -> Self {
        Self {
            write_report_json: true,
            report_filename: "report.json".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Logging {
    pub level: String,
    pub json: bool,
    pub write_to_file: bool,
    pub file_path: String,
}
impl Default for Logging {
    fn default() -> Self {
        Self {
            level: "info".into(),
            json: false,
            write_to_file: false,
            file_path: "".into(),
        }
    }
}

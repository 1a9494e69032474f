use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;

/// Version assumed when the engine output has no recognisable version line.
pub const UNKNOWN_VERSION: &str = "0.0.0";

/// OS family the engine runs on. Windows builds of tesseract report
/// `3.02` for what is `3.02.02` elsewhere, so requirements are truncated there.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Windows,
    Unix,
}

impl Platform {
    pub fn current() -> Self {
        if cfg!(windows) {
            Platform::Windows
        } else {
            Platform::Unix
        }
    }

    pub fn truncates_patch(self) -> bool {
        matches!(self, Platform::Windows)
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Platform::Windows => f.write_str("windows"),
            Platform::Unix => f.write_str("unix"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VersionCmp {
    Older,
    Equal,
    Newer,
}

/// Dot-separated numeric version, e.g. `3.02.02` -> `[3, 2, 2]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineVersion(Vec<u32>);

fn numeric_core() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[vV]?(\d+(?:\.\d+)*)").expect("static version regex"))
}

impl EngineVersion {
    /// Parses the leading numeric part of `raw`; trailing suffixes such as
    /// `dev` or `-rc2` are dropped. Unparseable input yields an empty version.
    pub fn parse(raw: &str) -> Self {
        let Some(caps) = numeric_core().captures(raw.trim()) else {
            return Self(Vec::new());
        };
        let parts = caps[1]
            .split('.')
            .map(|c| c.parse::<u32>().unwrap_or(u32::MAX))
            .collect();
        Self(parts)
    }

    pub fn components(&self) -> &[u32] {
        &self.0
    }

    /// Three-way comparison against `required`, walking the required
    /// components left to right and stopping at the first difference.
    ///
    /// Missing components count as older (`3.02` < `3.02.02`). A fully equal
    /// prefix is only `Equal` when both have the same length; a longer found
    /// version (`3.02.02.1`, or `3.02.02` against a truncated `3.02`) does not
    /// satisfy the requirement and is reported as `Older`.
    pub fn compare(&self, required: &EngineVersion) -> VersionCmp {
        let mut found = self.0.iter();
        for req in &required.0 {
            let Some(have) = found.next() else {
                return VersionCmp::Older;
            };
            match have.cmp(req) {
                std::cmp::Ordering::Greater => return VersionCmp::Newer,
                std::cmp::Ordering::Less => return VersionCmp::Older,
                std::cmp::Ordering::Equal => {}
            }
        }
        if self.0.len() == required.0.len() {
            VersionCmp::Equal
        } else {
            VersionCmp::Older
        }
    }
}

impl From<Vec<u32>> for EngineVersion {
    fn from(parts: Vec<u32>) -> Self {
        Self(parts)
    }
}

impl fmt::Display for EngineVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(|c| c.to_string()).collect();
        f.write_str(&parts.join("."))
    }
}

/// Minimum acceptable engine version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionRequirement {
    pub minimum: EngineVersion,
}

impl VersionRequirement {
    pub fn parse(raw: &str) -> Self {
        Self {
            minimum: EngineVersion::parse(raw),
        }
    }

    /// The requirement actually compared on `platform`.
    pub fn for_platform(&self, platform: Platform) -> VersionRequirement {
        if platform.truncates_patch() {
            let parts = self.minimum.components().iter().take(2).copied().collect();
            VersionRequirement {
                minimum: EngineVersion(parts),
            }
        } else {
            self.clone()
        }
    }
}

impl fmt::Display for VersionRequirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.minimum, f)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GateOutcome {
    pub passed: bool,
    pub reported: String,
    pub version: EngineVersion,
    pub required: VersionRequirement,
    pub platform: Platform,
    pub comparison: VersionCmp,
}

/// Decides whether the installed engine is new enough. Pure.
#[derive(Debug, Clone)]
pub struct VersionGate {
    token: String,
}

impl Default for VersionGate {
    fn default() -> Self {
        Self::new("tesseract")
    }
}

impl VersionGate {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }

    /// Pulls the version token out of the engine's `-v` output: the second
    /// whitespace-separated word of the first line naming the engine.
    pub fn extract_version<'a>(&self, output: &'a str) -> &'a str {
        output
            .lines()
            .filter(|line| line.contains(self.token.as_str()))
            .find_map(|line| line.split_whitespace().nth(1))
            .unwrap_or(UNKNOWN_VERSION)
    }

    pub fn check(
        &self,
        output: &str,
        requirement: &VersionRequirement,
        platform: Platform,
    ) -> GateOutcome {
        let reported = self.extract_version(output);
        let version = EngineVersion::parse(reported);
        let required = requirement.for_platform(platform);
        let comparison = version.compare(&required.minimum);
        GateOutcome {
            passed: comparison != VersionCmp::Older,
            reported: reported.to_string(),
            version,
            required,
            platform,
            comparison,
        }
    }
}

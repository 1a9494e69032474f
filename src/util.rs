use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use time::format_description::well_known::Rfc3339;

const IMAGE_EXTENSIONS: &[&str] = &[
    "png", "tif", "tiff", "jpg", "jpeg", "pnm", "ppm", "pgm", "pbm", "bmp",
];

pub fn ensure_dir(p: &Path) -> Result<()> {
    std::fs::create_dir_all(p).with_context(|| format!("create_dir_all {}", p.display()))
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut h = Sha256::new();
    h.update(bytes);
    format!("{:x}", h.finalize())
}

pub fn now_rfc3339() -> String {
    time::OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_else(|_| "1970-01-01T00:00:00Z".to_string())
}

pub fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

/// Files are taken as given; directories contribute their image files in
/// name order. Order of `inputs` is preserved.
pub fn expand_inputs(inputs: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut out = Vec::new();
    for input in inputs {
        if input.is_dir() {
            let mut pages: Vec<PathBuf> = std::fs::read_dir(input)
                .with_context(|| format!("read_dir {}", input.display()))?
                .filter_map(|e| e.ok().map(|e| e.path()))
                .filter(|p| p.is_file() && is_image(p))
                .collect();
            pages.sort();
            out.extend(pages);
        } else if input.exists() {
            out.push(input.clone());
        } else {
            anyhow::bail!("input does not exist: {}", input.display());
        }
    }
    Ok(out)
}

use crate::{engine::EngineReport, filter::PageOutcome};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchReport {
    pub batch_id: String,
    pub started: String,
    pub finished: String,
    pub workers: usize,
    pub engine: EngineReport,
    pub counts: BatchCounts,
    pub pages: Vec<PageOutcome>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchCounts {
    pub total: usize,
    pub filtered: usize,
    pub fallback: usize,
}

impl BatchCounts {
    pub fn from_pages(pages: &[PageOutcome]) -> Self {
        let filtered = pages.iter().filter(|p| p.is_filtered()).count();
        Self {
            total: pages.len(),
            filtered,
            fallback: pages.len() - filtered,
        }
    }
}

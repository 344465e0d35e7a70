mod cache;
mod gemini;
mod prompt;
mod traits;

pub use cache::{AnalysisKey, CachedAnalyzer};
pub use gemini::{GeminiAnalyzer, parse_items};
pub use prompt::build_prompt;
pub use traits::{AnalysisRequest, AnalysisResult, Analyzer, AnalyzerInfo};

use crate::config::AnalyzerConfig;
use crate::error::Result;
use std::sync::Arc;

/// Create an analyzer from configuration
pub fn create_analyzer(config: &AnalyzerConfig) -> Result<Arc<dyn Analyzer>> {
    let gemini: Arc<dyn Analyzer> = Arc::new(GeminiAnalyzer::new(config)?);

    if !config.cache_enabled {
        return Ok(gemini);
    }

    Ok(Arc::new(CachedAnalyzer::new(
        gemini,
        config.cache_max_entries,
        config.cache_ttl_seconds,
    )))
}

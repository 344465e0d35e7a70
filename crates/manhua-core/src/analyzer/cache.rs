use async_trait::async_trait;
use moka::future::Cache;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use super::traits::{AnalysisRequest, AnalysisResult, Analyzer, AnalyzerInfo};
use crate::model::TranslationItem;

/// Cache key for analysis results.
///
/// An MD5 over the image bytes and every setting that shapes the prompt,
/// so a genre or glossary change misses the cache.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AnalysisKey {
    hash: String,
}

impl AnalysisKey {
    pub fn from_request(request: &AnalysisRequest) -> Self {
        let mut ctx = md5::Context::new();
        ctx.consume(&request.image);
        ctx.consume(b"\0");
        ctx.consume(request.mime_type.as_bytes());
        ctx.consume(b"\0");
        ctx.consume(request.settings.genre.as_str().as_bytes());
        ctx.consume(b"\0");
        ctx.consume(request.settings.model.as_bytes());
        for entry in &request.settings.glossary {
            // Null bytes keep ("a", "bc") and ("ab", "c") apart
            ctx.consume(b"\0");
            ctx.consume(entry.term.as_bytes());
            ctx.consume(b"\0");
            ctx.consume(entry.translation.as_bytes());
        }

        Self {
            hash: format!("{:x}", ctx.compute()),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.hash
    }
}

impl std::fmt::Display for AnalysisKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.hash)
    }
}

/// Wraps another analyzer and remembers successful results in memory.
///
/// Failures are never cached.
pub struct CachedAnalyzer {
    inner: Arc<dyn Analyzer>,
    cache: Cache<String, Vec<TranslationItem>>,
}

impl CachedAnalyzer {
    pub fn new(inner: Arc<dyn Analyzer>, max_entries: u64, ttl_seconds: u64) -> Self {
        let mut builder = Cache::builder().max_capacity(max_entries);
        if ttl_seconds > 0 {
            builder = builder.time_to_live(Duration::from_secs(ttl_seconds));
        }

        Self {
            inner,
            cache: builder.build(),
        }
    }

    pub fn clear(&self) {
        self.cache.invalidate_all();
    }
}

#[async_trait]
impl Analyzer for CachedAnalyzer {
    fn info(&self) -> AnalyzerInfo {
        self.inner.info()
    }

    async fn analyze(&self, request: &AnalysisRequest) -> AnalysisResult {
        let key = AnalysisKey::from_request(request);

        if let Some(items) = self.cache.get(key.as_str()).await {
            debug!("Analysis cache hit {}", key);
            return Ok(items);
        }

        let items = self.inner.analyze(request).await?;
        self.cache.insert(key.to_string(), items.clone()).await;
        Ok(items)
    }
}

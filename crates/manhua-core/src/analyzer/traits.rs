use async_trait::async_trait;
use bytes::Bytes;

use crate::error::AnalysisError;
use crate::model::TranslationItem;
use crate::settings::ProjectSettings;

pub type AnalysisResult = std::result::Result<Vec<TranslationItem>, AnalysisError>;

/// Information about an analyzer backend
#[derive(Debug, Clone)]
pub struct AnalyzerInfo {
    /// Human-readable name
    pub name: &'static str,
    /// Whether this analyzer refuses to run without an API key
    pub requires_api_key: bool,
}

/// Everything one analysis call needs, captured when the page is uploaded.
#[derive(Debug, Clone)]
pub struct AnalysisRequest {
    pub image: Bytes,
    pub mime_type: String,
    pub settings: ProjectSettings,
    pub api_key: Option<String>,
}

/// Turns a page image into translation items.
#[async_trait]
pub trait Analyzer: Send + Sync {
    /// Get information about this analyzer
    fn info(&self) -> AnalyzerInfo;

    /// Get the analyzer name (convenience method)
    fn name(&self) -> &'static str {
        self.info().name
    }

    /// Detect the text on the page and translate it
    async fn analyze(&self, request: &AnalysisRequest) -> AnalysisResult;
}

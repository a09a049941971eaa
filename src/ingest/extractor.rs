//! 콘텐츠 추출기
//!
//! 완료된 업로드 작업에서 자료 텍스트를 얻습니다.
//! 기본 구현은 고정된 자리표시 내용을 돌려주며, 실제 OCR/파서는
//! `ContentExtractor`를 구현해 교체합니다.

use async_trait::async_trait;
use thiserror::Error;

use super::task::UploadTask;

/// 수집 오류
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum IngestError {
    /// 추출 실패: 작업은 완료되지만 청크는 기록되지 않음
    #[error("Failed to parse {file}: {reason}")]
    ParseFailed { file: String, reason: String },

    #[error("Invalid ingest config: {0}")]
    InvalidConfig(String),
}

/// 콘텐츠 추출기 트레이트
#[async_trait]
pub trait ContentExtractor: Send + Sync {
    /// 작업의 자료 텍스트 추출
    async fn extract(&self, task: &UploadTask) -> Result<String, IngestError>;

    /// 추출기 이름
    fn name(&self) -> &str;
}

/// 자리표시 추출기 (모의 수집)
#[derive(Debug, Clone)]
pub struct PlaceholderExtractor {
    content: String,
}

impl PlaceholderExtractor {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
        }
    }
}

#[async_trait]
impl ContentExtractor for PlaceholderExtractor {
    async fn extract(&self, _task: &UploadTask) -> Result<String, IngestError> {
        Ok(self.content.clone())
    }

    fn name(&self) -> &str {
        "placeholder"
    }
}

// ============================================================================
// Tests
// ============================================================================

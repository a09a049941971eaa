//! 생성 프로바이더 모듈
//!
//! 답변 텍스트 스트림과 인포그래픽 이미지를 만드는 외부 생성 기능의 추상화입니다.
//!
//! ## 사용법
//! ```rust,ignore
//! let provider = GeminiProvider::from_env()?;
//! let mut stream = provider.stream_text(request).await?;
//! while let Some(fragment) = stream.next().await { ... }
//! ```

mod gemini;
pub mod prompt;

use std::time::Duration;

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use gemini::{GeminiProvider, SseDecoder};

// ============================================================================
// Types
// ============================================================================

/// base64로 인코딩된 인라인 미디어
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InlineMedia {
    pub mime_type: String,
    /// base64 데이터 (data URL 접두사 없음)
    pub data: String,
}

impl InlineMedia {
    pub fn new(mime_type: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            mime_type: mime_type.into(),
            data: data.into(),
        }
    }

    /// `data:{mime};base64,{data}` 형식
    pub fn data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.data)
    }
}

/// 답변 스트림 요청
#[derive(Debug, Clone, Default)]
pub struct TextRequest {
    /// 실제로 보낼 질문 (빈 질문은 대체 프롬프트로 치환된 상태)
    pub question: String,
    /// 검색된 근거 자료 (없으면 빈 문자열)
    pub context: String,
    /// 수집 진행률 (진행 중 작업이 없으면 `None`)
    pub progress: Option<u8>,
    /// 지식 저장소에 청크가 있는지
    pub knowledge_loaded: bool,
    pub image: Option<InlineMedia>,
    pub files: Vec<InlineMedia>,
}

/// 텍스트 조각 스트림 (유한, 단일 소비자, 재시작 불가)
pub type TextStream = BoxStream<'static, Result<String, GenerationError>>;

/// 생성 오류
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GenerationError {
    #[error("API request failed: {message} (status: {status})")]
    Api { status: u16, message: String },

    #[error("Rate limited by provider")]
    RateLimited,

    #[error("Network error: {0}")]
    Network(String),

    #[error("Stream interrupted: {0}")]
    StreamInterrupted(String),

    #[error("API key not found. Set GEMINI_API_KEY or GOOGLE_AI_API_KEY")]
    MissingApiKey,

    #[error("Failed to parse provider response: {0}")]
    Parse(String),
}

// ============================================================================
// GenerationProvider Trait
// ============================================================================

/// 생성 프로바이더 트레이트
///
/// 두 호출 모두 실패할 수 있으며, 실패는 호출한 쪽에서만 처리됩니다.
#[async_trait]
pub trait GenerationProvider: Send + Sync {
    /// 질문 + 근거 자료 + 첨부 미디어로 답변 텍스트 스트림 생성
    async fn stream_text(&self, request: TextRequest) -> Result<TextStream, GenerationError>;

    /// 프롬프트 + 자료로 이미지 하나 생성 (없으면 `None`)
    async fn generate_image(
        &self,
        prompt: &str,
        context: &str,
    ) -> Result<Option<InlineMedia>, GenerationError>;

    /// 프로바이더 이름
    fn name(&self) -> &str;
}

// ============================================================================
// Config
// ============================================================================

/// 기본 텍스트 모델
pub const DEFAULT_TEXT_MODEL: &str = "gemini-3-flash-preview";
/// 기본 이미지 모델
pub const DEFAULT_IMAGE_MODEL: &str = "gemini-3-pro-image-preview";
/// 기본 시험지 생성 모델
pub const DEFAULT_EXAM_MODEL: &str = "gemini-3-pro-preview";

/// 프로바이더 설정
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub text_model: String,
    pub image_model: String,
    /// 시험지 생성 모델 (매트릭스 요청은 `text_model` 사용)
    pub exam_model: String,
    /// 연결 타임아웃 (스트림 본문에는 적용하지 않음)
    pub connect_timeout: Duration,
    /// 이미지 생성 요청 타임아웃
    pub image_timeout: Duration,
    /// 단일 `generateContent` 요청 타임아웃
    pub generate_timeout: Duration,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            text_model: DEFAULT_TEXT_MODEL.to_string(),
            image_model: DEFAULT_IMAGE_MODEL.to_string(),
            exam_model: DEFAULT_EXAM_MODEL.to_string(),
            connect_timeout: Duration::from_secs(30),
            image_timeout: Duration::from_secs(120),
            generate_timeout: Duration::from_secs(180),
        }
    }
}

impl ProviderConfig {
    /// 환경변수로 모델 재지정
    ///
    /// - `DIA_AI_TEXT_MODEL`
    /// - `DIA_AI_IMAGE_MODEL`
    /// - `DIA_AI_EXAM_MODEL`
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(model) = non_empty_env("DIA_AI_TEXT_MODEL") {
            config.text_model = model;
        }
        if let Some(model) = non_empty_env("DIA_AI_IMAGE_MODEL") {
            config.image_model = model;
        }
        if let Some(model) = non_empty_env("DIA_AI_EXAM_MODEL") {
            config.exam_model = model;
        }

        config
    }
}

// ============================================================================
// API Key Management
// ============================================================================

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// API 키 로드 (환경변수에서)
///
/// 우선순위:
/// 1. `GEMINI_API_KEY` 환경변수
/// 2. `GOOGLE_AI_API_KEY` 환경변수
pub fn get_api_key() -> Result<String, GenerationError> {
    if let Some(key) = non_empty_env("GEMINI_API_KEY") {
        tracing::debug!("Using API key from GEMINI_API_KEY");
        return Ok(key);
    }

    if let Some(key) = non_empty_env("GOOGLE_AI_API_KEY") {
        tracing::debug!("Using API key from GOOGLE_AI_API_KEY");
        return Ok(key);
    }

    Err(GenerationError::MissingApiKey)
}

/// API 키 존재 여부 확인
pub fn has_api_key() -> bool {
    get_api_key().is_ok()
}

// ============================================================================
// Tests
// ============================================================================

//! 시험 출제 모듈
//!
//! 주제와 학년으로 출제 매트릭스를 만들거나, 텍스트/이미지/PDF에서 매트릭스를
//! 추출하고, 매트릭스로 시험지를 생성합니다.
//!
//! ## 사용법
//! ```rust,ignore
//! let provider = GeminiProvider::from_env()?;
//! let source = MatrixSource::Topic { topic: "Dân cư".into(), grade: DEFAULT_GRADE.into() };
//! let matrix = load_matrix(&provider, &source).await?;
//! let exam = provider.generate_exam_sets(&matrix, "Dân cư", DEFAULT_GRADE).await?;
//! ```

mod matrix;

use async_trait::async_trait;

use crate::provider::{GenerationError, InlineMedia};

pub use matrix::{matrix_schema, parse_matrix, summarize, Levels, MatrixSummary, MatrixTopic};

/// 기본 학년
pub const DEFAULT_GRADE: &str = "Lớp 9";

/// 시험지 생성 시 사고 토큰 예산
pub const EXAM_THINKING_BUDGET: u32 = 8000;

/// 이미지/문서에서 매트릭스 추출 지시문
pub const EXTRACT_MEDIA_PROMPT: &str = "Trích xuất ma trận sang JSON.";

// ============================================================================
// Prompts
// ============================================================================

/// 주제 + 학년 매트릭스 요청
pub fn matrix_prompt(topic: &str, grade: &str) -> String {
    format!("Ma trận đề thi Địa lí: \"{}\", {}. Trả về JSON.", topic, grade)
}

/// 텍스트에서 매트릭스 추출 요청
pub fn extract_text_prompt(text: &str) -> String {
    format!("Trích xuất ma trận sang JSON: \n\n {}", text)
}

/// 매트릭스로 시험지 생성 요청
pub fn exam_sets_prompt(
    topics: &[MatrixTopic],
    topic_input: &str,
    grade: &str,
) -> Result<String, GenerationError> {
    let matrix = serde_json::to_string(topics).map_err(|e| GenerationError::Parse(e.to_string()))?;
    Ok(format!(
        "Soạn đề thi cho {}, chủ đề \"{}\". Ma trận: {}.",
        grade, topic_input, matrix
    ))
}

// ============================================================================
// ExamProvider
// ============================================================================

/// 출제 기능 트레이트
#[async_trait]
pub trait ExamProvider: Send + Sync {
    /// 주제와 학년으로 매트릭스 생성
    async fn exam_matrix(&self, topic: &str, grade: &str)
        -> Result<Vec<MatrixTopic>, GenerationError>;

    /// 붙여넣은 텍스트에서 매트릭스 추출
    async fn extract_matrix_from_text(&self, text: &str)
        -> Result<Vec<MatrixTopic>, GenerationError>;

    /// 이미지/PDF에서 매트릭스 추출
    async fn extract_matrix_from_media(
        &self,
        media: &InlineMedia,
    ) -> Result<Vec<MatrixTopic>, GenerationError>;

    /// 매트릭스로 시험지 본문 생성 (빈 응답이면 빈 문자열)
    async fn generate_exam_sets(
        &self,
        topics: &[MatrixTopic],
        topic_input: &str,
        grade: &str,
    ) -> Result<String, GenerationError>;
}

/// 매트릭스 출처
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatrixSource {
    Topic { topic: String, grade: String },
    Text(String),
    Media(InlineMedia),
}

/// 출처에 맞는 방식으로 매트릭스 생성
pub async fn load_matrix(
    provider: &dyn ExamProvider,
    source: &MatrixSource,
) -> Result<Vec<MatrixTopic>, GenerationError> {
    let topics = match source {
        MatrixSource::Topic { topic, grade } => provider.exam_matrix(topic, grade).await?,
        MatrixSource::Text(text) => provider.extract_matrix_from_text(text).await?,
        MatrixSource::Media(media) => provider.extract_matrix_from_media(media).await?,
    };

    let summary = summarize(&topics);
    if summary.inconsistent > 0 {
        tracing::warn!(
            "{} matrix rows have level totals different from quantity",
            summary.inconsistent
        );
    }
    tracing::info!(
        topics = summary.topics,
        questions = summary.quantity,
        "Exam matrix loaded"
    );

    Ok(topics)
}

// ============================================================================
// Tests
// ============================================================================

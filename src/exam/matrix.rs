//! 출제 매트릭스 모델
//!
//! 주제별 문항 유형, 문항 수, 인지 수준(nhận biết / thông hiểu / vận dụng / vận dụng cao)
//! 분포를 담는 행 목록입니다. JSON 필드명은 camelCase입니다.

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::provider::GenerationError;

/// 인지 수준별 문항 수
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Levels {
    pub remember: u32,
    pub understand: u32,
    pub apply: u32,
    pub high_apply: u32,
}

impl Levels {
    pub fn total(&self) -> u32 {
        self.remember + self.understand + self.apply + self.high_apply
    }

    fn add(&mut self, other: &Levels) {
        self.remember += other.remember;
        self.understand += other.understand;
        self.apply += other.apply;
        self.high_apply += other.high_apply;
    }
}

/// 매트릭스 한 행
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatrixTopic {
    pub name: String,
    pub subject: String,
    pub question_type: String,
    pub quantity: u32,
    pub levels: Levels,
}

impl MatrixTopic {
    /// 수준별 합계가 문항 수와 같은지
    pub fn is_consistent(&self) -> bool {
        self.levels.total() == self.quantity
    }
}

/// 매트릭스 합계
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MatrixSummary {
    pub topics: usize,
    pub quantity: u32,
    pub levels: Levels,
    /// 수준별 합계가 문항 수와 다른 행 수
    pub inconsistent: usize,
}

pub fn summarize(topics: &[MatrixTopic]) -> MatrixSummary {
    let mut summary = MatrixSummary {
        topics: topics.len(),
        ..Default::default()
    };

    for topic in topics {
        summary.quantity += topic.quantity;
        summary.levels.add(&topic.levels);
        if !topic.is_consistent() {
            summary.inconsistent += 1;
        }
    }
    summary
}

/// Gemini `responseSchema` (OpenAPI 부분집합)
pub fn matrix_schema() -> serde_json::Value {
    json!({
        "type": "ARRAY",
        "items": {
            "type": "OBJECT",
            "properties": {
                "name": { "type": "STRING" },
                "subject": { "type": "STRING" },
                "questionType": { "type": "STRING" },
                "quantity": { "type": "INTEGER" },
                "levels": {
                    "type": "OBJECT",
                    "properties": {
                        "remember": { "type": "INTEGER" },
                        "understand": { "type": "INTEGER" },
                        "apply": { "type": "INTEGER" },
                        "highApply": { "type": "INTEGER" }
                    },
                    "required": ["remember", "understand", "apply", "highApply"]
                }
            },
            "required": ["name", "subject", "questionType", "quantity", "levels"]
        }
    })
}

/// 모델 응답 텍스트를 매트릭스로 해석
///
/// 빈 응답은 빈 매트릭스입니다. 코드 펜스로 감싼 JSON도 허용합니다.
pub fn parse_matrix(text: &str) -> Result<Vec<MatrixTopic>, GenerationError> {
    let trimmed = strip_code_fence(text.trim());
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }

    serde_json::from_str(trimmed)
        .map_err(|e| GenerationError::Parse(format!("Invalid exam matrix: {}", e)))
}

fn strip_code_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    // 언어 표시 줄 건너뜀
    let body = rest.split_once('\n').map(|(_, b)| b).unwrap_or("");
    body.trim_end().trim_end_matches("```").trim()
}

// ============================================================================
// Tests
// ============================================================================

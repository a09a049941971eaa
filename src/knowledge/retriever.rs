//! 검색기 - 부분 문자열 기반 근거 자료 검색
//!
//! 질문 문자열이 청크 본문 또는 주제에 (대소문자 무시) 포함되면 선택합니다.
//! 색인, 순위, 형태소 분석은 없습니다. 세션 단위의 작은 지식베이스를 전제로
//! 매 질의마다 전체를 선형 탐색합니다.

use anyhow::Result;

use super::store::{KnowledgeChunk, KnowledgeStore};

/// 선택된 청크 사이 구분자
pub const CONTEXT_SEPARATOR: &str = "\n\n";

/// 검색기
#[derive(Debug, Clone)]
pub struct Retriever {
    store: KnowledgeStore,
}

impl Retriever {
    pub fn new(store: KnowledgeStore) -> Self {
        Self { store }
    }

    /// 질문에 맞는 근거 자료 텍스트
    ///
    /// 빈 질문이면 빈 문자열을 반환합니다.
    pub fn retrieve(&self, query: &str) -> Result<String> {
        let matches = self.matching_chunks(query)?;

        Ok(matches
            .iter()
            .map(|c| c.content.as_str())
            .collect::<Vec<_>>()
            .join(CONTEXT_SEPARATOR))
    }

    /// 질문에 맞는 청크 목록 (저장 순서)
    pub fn matching_chunks(&self, query: &str) -> Result<Vec<KnowledgeChunk>> {
        if query.is_empty() {
            return Ok(vec![]);
        }

        let needle = query.to_lowercase();
        let matches: Vec<KnowledgeChunk> = self
            .store
            .all()?
            .into_iter()
            .filter(|c| {
                c.content.to_lowercase().contains(&needle)
                    || c.metadata.topic.to_lowercase().contains(&needle)
            })
            .collect();

        tracing::debug!("Retrieved {} chunks for query {:?}", matches.len(), query);
        Ok(matches)
    }

    /// 내부 저장소 접근
    pub fn store(&self) -> &KnowledgeStore {
        &self.store
    }
}

// ============================================================================
// Tests
// ============================================================================

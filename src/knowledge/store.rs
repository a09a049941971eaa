//! Knowledge Store - 인메모리 추가 전용 지식 저장소
//!
//! 수집된 학습 자료 청크를 세션 단위로 보관합니다.
//! 쓰기는 수집 파이프라인의 완료 시점에서만 일어나고, 검색기는 읽기만 합니다.

use std::collections::{BTreeSet, HashSet};
use std::sync::{Arc, RwLock};

use anyhow::Result;
use serde::{Deserialize, Serialize};

// ============================================================================
// Types
// ============================================================================

/// 청크 메타데이터
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    /// 주제 레이블 (검색 대상)
    pub topic: String,
    /// 키워드 집합
    pub keywords: BTreeSet<String>,
}

/// 지식 청크 (생성 후 불변)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnowledgeChunk {
    pub id: String,
    /// 같은 수집 작업에서 나온 청크를 묶는 ID
    pub file_id: String,
    pub content: String,
    pub metadata: ChunkMetadata,
}

/// 저장소 통계
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StoreStats {
    pub chunk_count: usize,
    pub file_count: usize,
    pub total_content_bytes: usize,
}

// ============================================================================
// KnowledgeStore
// ============================================================================

/// Knowledge Store
///
/// 세션마다 하나씩 생성하여 수집 파이프라인과 검색기에 넘겨줍니다.
/// `Clone`은 같은 저장소를 가리키는 핸들을 복제합니다.
#[derive(Debug, Clone, Default)]
pub struct KnowledgeStore {
    chunks: Arc<RwLock<Vec<KnowledgeChunk>>>,
}

impl KnowledgeStore {
    /// 빈 저장소 생성
    pub fn new() -> Self {
        Self::default()
    }

    /// 청크 배치 추가
    ///
    /// 이미 존재하는 ID가 하나라도 있으면 배치 전체를 거부합니다.
    pub fn append(&self, chunks: Vec<KnowledgeChunk>) -> Result<usize> {
        let mut guard = self
            .chunks
            .write()
            .map_err(|e| anyhow::anyhow!("Lock error: {}", e))?;

        let mut seen: HashSet<&str> = guard.iter().map(|c| c.id.as_str()).collect();
        for chunk in &chunks {
            if !seen.insert(chunk.id.as_str()) {
                anyhow::bail!("Duplicate chunk id: {}", chunk.id);
            }
        }

        let count = chunks.len();
        guard.extend(chunks);
        tracing::debug!("Appended {} chunks (total={})", count, guard.len());

        Ok(count)
    }

    /// 전체 청크 (삽입 순서 유지)
    pub fn all(&self) -> Result<Vec<KnowledgeChunk>> {
        let guard = self
            .chunks
            .read()
            .map_err(|e| anyhow::anyhow!("Lock error: {}", e))?;
        Ok(guard.clone())
    }

    /// 특정 파일에서 나온 청크
    pub fn chunks_for_file(&self, file_id: &str) -> Result<Vec<KnowledgeChunk>> {
        let guard = self
            .chunks
            .read()
            .map_err(|e| anyhow::anyhow!("Lock error: {}", e))?;
        Ok(guard.iter().filter(|c| c.file_id == file_id).cloned().collect())
    }

    pub fn len(&self) -> usize {
        // 청크는 배치 단위로만 추가되므로 poison 이후에도 목록은 일관됨
        self.chunks
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 저장소 초기화 (청크가 사라지는 유일한 경로)
    pub fn reset(&self) -> Result<usize> {
        let mut guard = self
            .chunks
            .write()
            .map_err(|e| anyhow::anyhow!("Lock error: {}", e))?;
        let removed = guard.len();
        guard.clear();
        tracing::info!("Knowledge store reset ({} chunks removed)", removed);
        Ok(removed)
    }

    /// 저장소 통계
    pub fn stats(&self) -> Result<StoreStats> {
        let guard = self
            .chunks
            .read()
            .map_err(|e| anyhow::anyhow!("Lock error: {}", e))?;

        let files: HashSet<&str> = guard.iter().map(|c| c.file_id.as_str()).collect();

        Ok(StoreStats {
            chunk_count: guard.len(),
            file_count: files.len(),
            total_content_bytes: guard.iter().map(|c| c.content.len()).sum(),
        })
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(id: &str, file_id: &str, content: &str) -> KnowledgeChunk {
        KnowledgeChunk {
            id: id.to_string(),
            file_id: file_id.to_string(),
            content: content.to_string(),
            metadata: ChunkMetadata {
                topic: "Tài liệu học tập".to_string(),
                keywords: BTreeSet::new(),
            },
        }
    }

    #[test]
    fn test_append_preserves_order() {
        let store = KnowledgeStore::new();
        store.append(vec![chunk("a-1", "a", "first")]).unwrap();
        store
            .append(vec![chunk("b-1", "b", "second"), chunk("b-2", "b", "third")])
            .unwrap();

        let all = store.all().unwrap();
        let contents: Vec<&str> = all.iter().map(|c| c.content.as_str()).collect();
        assert_eq!(contents, vec!["first", "second", "third"]);
    }

    #[test]
    fn test_duplicate_id_rejects_batch() {
        let store = KnowledgeStore::new();
        store.append(vec![chunk("a-1", "a", "first")]).unwrap();

        let result = store.append(vec![chunk("a-2", "a", "x"), chunk("a-1", "a", "y")]);
        assert!(result.is_err());
        assert_eq!(store.len(), 1);

        let result = store.append(vec![chunk("c-1", "c", "x"), chunk("c-1", "c", "y")]);
        assert!(result.is_err());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_clone_shares_chunks() {
        let store = KnowledgeStore::new();
        let handle = store.clone();
        store.append(vec![chunk("a-1", "a", "shared")]).unwrap();
        assert_eq!(handle.len(), 1);
    }

    #[test]
    fn test_chunks_for_file_and_stats() {
        let store = KnowledgeStore::new();
        store
            .append(vec![
                chunk("a-1", "a", "12345"),
                chunk("a-2", "a", "67890"),
                chunk("b-1", "b", "xyz"),
            ])
            .unwrap();

        assert_eq!(store.chunks_for_file("a").unwrap().len(), 2);
        assert!(store.chunks_for_file("zzz").unwrap().is_empty());

        let stats = store.stats().unwrap();
        assert_eq!(stats.chunk_count, 3);
        assert_eq!(stats.file_count, 2);
        assert_eq!(stats.total_content_bytes, 13);
    }

    #[test]
    fn test_reset() {
        let store = KnowledgeStore::new();
        store.append(vec![chunk("a-1", "a", "x")]).unwrap();
        assert_eq!(store.reset().unwrap(), 1);
        assert!(store.is_empty());
    }

    #[test]
    fn test_len_survives_poisoned_lock() {
        let store = KnowledgeStore::new();
        store.append(vec![chunk("a-1", "a", "x")]).unwrap();

        let handle = store.clone();
        let _ = std::thread::spawn(move || {
            let _guard = handle.chunks.write().unwrap();
            panic!("poison");
        })
        .join();

        assert!(store.chunks.is_poisoned());
        assert_eq!(store.len(), 1);
        assert!(!store.is_empty());
        assert!(store.all().is_err());
    }
}

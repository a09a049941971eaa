//! Knowledge 모듈 - 세션 지식 저장소와 검색
//!
//! - Store: 추가 전용 인메모리 청크 저장소
//! - Chunker: 문단 인식 분할 + 청크 생성
//! - Retriever: 대소문자 무시 부분 문자열 검색

mod chunker;
mod retriever;
mod store;

// Re-exports
pub use chunker::{
    default_chunker, synthesize_chunks, ChunkConfig, Chunker, ParagraphChunker, DEFAULT_TOPIC,
};
pub use retriever::{Retriever, CONTEXT_SEPARATOR};
pub use store::{ChunkMetadata, KnowledgeChunk, KnowledgeStore, StoreStats};

//! dia-ai - 지리 학습 자료 기반 질의응답 도우미
//!
//! 업로드된 학습 자료를 진행률 틱으로 수집해 지식 청크로 저장하고,
//! 질문마다 관련 청크를 검색하여 텍스트 답변 스트림과 인포그래픽 생성을
//! 동시에 실행합니다. 출제 매트릭스와 시험지 생성도 제공합니다.

pub mod chat;
pub mod cli;
pub mod exam;
pub mod ingest;
pub mod knowledge;
pub mod provider;

// Re-exports
pub use chat::{
    AnswerOutcome, Archive, BranchOutcome, Conversation, MemoryArchive, Message, Orchestrator,
    OrchestratorError, Role, SharedConversation, UserTurn, VaultEntry,
};
pub use exam::{ExamProvider, Levels, MatrixSource, MatrixTopic};
pub use ingest::{
    ContentExtractor, IngestConfig, IngestError, IngestionPipeline, UploadDescriptor, UploadTask,
};
pub use knowledge::{
    default_chunker, synthesize_chunks, ChunkConfig, Chunker, KnowledgeChunk, KnowledgeStore,
    Retriever, StoreStats,
};
pub use provider::{
    get_api_key, has_api_key, GeminiProvider, GenerationError, GenerationProvider, InlineMedia,
    ProviderConfig, TextRequest, TextStream,
};

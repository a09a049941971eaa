//! 대화 모듈
//!
//! 대화 상태, 보관함, 답변 오케스트레이터를 제공합니다.

pub mod archive;
pub mod conversation;
pub mod orchestrator;

pub use archive::{truncate_title, Archive, MemoryArchive, VaultEntry, MAX_TITLE_CHARS};
pub use conversation::{
    Conversation, ConversationError, FileRef, Message, Role, SharedConversation, GREETING,
};
pub use orchestrator::{
    AnswerOutcome, BranchOutcome, NamedMedia, Orchestrator, OrchestratorError, UserTurn,
    TEXT_ERROR_MESSAGE,
};

//! 대화 상태
//!
//! 사용자 턴은 추가 후 불변이고, 어시스턴트 싱크 턴만 열려 있는 동안
//! 명시적인 추가/교체 연산으로 갱신됩니다. 턴 순서는 추가 순서로 고정됩니다.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::watch;
use uuid::Uuid;

use super::archive::VaultEntry;

/// 첫 인사 메시지
pub const GREETING: &str = "Hãy hỏi **AI** dựa trên tài liệu đã tải.";

// ============================================================================
// Types
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// 첨부 파일 표시 정보
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRef {
    pub name: String,
    pub mime_type: String,
}

/// 대화 턴
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    /// data URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub files: Vec<FileRef>,
    #[serde(default)]
    pub is_retrieved: bool,
}

impl Message {
    fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role,
            content: content.into(),
            timestamp: Utc::now(),
            image: None,
            files: Vec::new(),
            is_retrieved: false,
        }
    }
}

/// 대화 갱신 오류 (거부된 갱신은 적용되지 않음)
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConversationError {
    #[error("Turn not found: {0}")]
    NotFound(String),

    #[error("Turn is not open for updates: {0}")]
    NotOpen(String),

    #[error("Image already set on turn: {0}")]
    ImageAlreadySet(String),
}

// ============================================================================
// Conversation
// ============================================================================

/// 대화 기록
#[derive(Debug, Clone, Default)]
pub struct Conversation {
    messages: Vec<Message>,
    open: HashSet<String>,
    version: u64,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    /// 인사 턴으로 시작
    pub fn with_greeting() -> Self {
        let mut conversation = Self::new();
        conversation.push_assistant(GREETING, false);
        conversation
    }

    /// 보관 항목으로 복원된 세션
    pub fn restore(entry: &VaultEntry) -> Self {
        let mut conversation = Self::new();
        conversation.push_assistant("Phiên cũ đã khôi phục.", false);

        let mut user = Message::new(Role::User, entry.title.clone());
        user.id = format!("restored-user-{}", entry.id);
        user.timestamp = entry.timestamp;
        conversation.push(user);

        let mut assistant = Message::new(
            Role::Assistant,
            format!("🕒 **[ĐÃ KHÔI PHỤC]**\n\n{}", entry.content),
        );
        assistant.id = format!("restored-assistant-{}", entry.id);
        assistant.timestamp = entry.timestamp;
        assistant.is_retrieved = true;
        conversation.push(assistant);

        conversation
    }

    fn push(&mut self, message: Message) -> String {
        let id = message.id.clone();
        self.messages.push(message);
        self.version += 1;
        id
    }

    /// 사용자 턴 추가
    pub fn push_user(
        &mut self,
        content: impl Into<String>,
        image: Option<String>,
        files: Vec<FileRef>,
    ) -> String {
        let mut message = Message::new(Role::User, content);
        message.image = image;
        message.files = files;
        self.push(message)
    }

    /// 닫힌 어시스턴트 턴 추가
    pub fn push_assistant(&mut self, content: impl Into<String>, is_retrieved: bool) -> String {
        let mut message = Message::new(Role::Assistant, content);
        message.is_retrieved = is_retrieved;
        self.push(message)
    }

    /// 빈 싱크 턴 열기
    pub fn open_assistant(&mut self, is_retrieved: bool) -> String {
        let id = self.push_assistant(String::new(), is_retrieved);
        self.open.insert(id.clone());
        id
    }

    fn open_turn_mut(&mut self, id: &str) -> Result<&mut Message, ConversationError> {
        if !self.open.contains(id) {
            return if self.messages.iter().any(|m| m.id == id) {
                Err(ConversationError::NotOpen(id.to_string()))
            } else {
                Err(ConversationError::NotFound(id.to_string()))
            };
        }

        self.messages
            .iter_mut()
            .find(|m| m.id == id)
            .ok_or_else(|| ConversationError::NotFound(id.to_string()))
    }

    /// 열린 턴 본문 끝에 조각 추가
    pub fn append_content(&mut self, id: &str, fragment: &str) -> Result<(), ConversationError> {
        self.open_turn_mut(id)?.content.push_str(fragment);
        self.version += 1;
        Ok(())
    }

    /// 열린 턴 본문 교체
    pub fn replace_content(&mut self, id: &str, text: &str) -> Result<(), ConversationError> {
        let message = self.open_turn_mut(id)?;
        message.content.clear();
        message.content.push_str(text);
        self.version += 1;
        Ok(())
    }

    /// 열린 턴 이미지 설정 (한 번만)
    pub fn set_image(&mut self, id: &str, image: String) -> Result<(), ConversationError> {
        let message = self.open_turn_mut(id)?;
        if message.image.is_some() {
            return Err(ConversationError::ImageAlreadySet(id.to_string()));
        }
        message.image = Some(image);
        self.version += 1;
        Ok(())
    }

    /// 턴 닫기 (이후 갱신 거부)
    pub fn close(&mut self, id: &str) -> bool {
        self.open.remove(id)
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn get(&self, id: &str) -> Option<&Message> {
        self.messages.iter().find(|m| m.id == id)
    }

    pub fn is_open(&self, id: &str) -> bool {
        self.open.contains(id)
    }

    pub fn open_turns(&self) -> usize {
        self.open.len()
    }

    /// 적용된 갱신마다 증가
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

// ============================================================================
// SharedConversation
// ============================================================================

/// 오케스트레이터와 렌더러가 공유하는 대화
///
/// 잠금은 await 지점을 넘어 유지되지 않습니다.
/// 갱신마다 버전이 `watch` 채널로 알려집니다.
#[derive(Debug, Clone)]
pub struct SharedConversation {
    inner: Arc<Mutex<Conversation>>,
    version_tx: Arc<watch::Sender<u64>>,
}

impl SharedConversation {
    pub fn new(conversation: Conversation) -> Self {
        let (version_tx, _) = watch::channel(conversation.version());
        Self {
            inner: Arc::new(Mutex::new(conversation)),
            version_tx: Arc::new(version_tx),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Conversation> {
        // 갱신은 검증 후 한 번에 적용되므로 poison 이후에도 상태는 일관됨
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// 대화를 갱신하고 버전 변경을 알림
    pub fn update<T>(&self, f: impl FnOnce(&mut Conversation) -> T) -> T {
        let (result, version) = {
            let mut guard = self.lock();
            let result = f(&mut guard);
            (result, guard.version())
        };
        self.version_tx.send_replace(version);
        result
    }

    /// 읽기 전용 접근
    pub fn read<T>(&self, f: impl FnOnce(&Conversation) -> T) -> T {
        f(&self.lock())
    }

    /// 현재 대화 복사본
    pub fn snapshot(&self) -> Conversation {
        self.lock().clone()
    }

    pub fn message(&self, id: &str) -> Option<Message> {
        self.read(|c| c.get(id).cloned())
    }

    /// 버전 변경 구독
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.version_tx.subscribe()
    }

    /// 대화 전체 교체 (복원 등)
    pub fn replace(&self, conversation: Conversation) {
        self.update(|c| {
            // 버전은 계속 증가해야 구독자가 변경을 감지함
            let version = c.version() + 1;
            *c = conversation;
            c.version = version;
        });
    }
}

impl Default for SharedConversation {
    fn default() -> Self {
        Self::new(Conversation::with_greeting())
    }
}

// ============================================================================
// Tests
// ============================================================================

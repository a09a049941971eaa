//! 답변 생성 오케스트레이터
//!
//! 사용자 턴 하나에 대해 근거 자료를 검색하고, 텍스트 스트림 브랜치와
//! 이미지 브랜치를 동시에 실행해 하나의 싱크 턴에 결과를 합칩니다.
//!
//! 1. 사용자 턴 추가
//! 2. 근거 자료 검색
//! 3. 빈 싱크 턴 열기 (`is_retrieved` = 자료 존재 여부)
//! 4. 텍스트 / 이미지 브랜치 동시 실행 (`tokio::join!`, 취소 없음)
//! 5. 두 브랜치가 모두 끝난 뒤 싱크 턴을 닫고, 추적 중이면 한 번 저장
//! 6. 진행 중 표시는 항상 해제
//!
//! 브랜치 실패는 턴 내용으로만 드러나며 호출자에게 오류로 전파되지 않습니다.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures::StreamExt;
use thiserror::Error;

use crate::knowledge::Retriever;
use crate::provider::prompt::{effective_question, IMAGE_CONTEXT_FALLBACK, IMAGE_PROMPT_FALLBACK};
use crate::provider::{GenerationError, GenerationProvider, InlineMedia, TextRequest};

use super::archive::Archive;
use super::conversation::{FileRef, SharedConversation};

/// 텍스트 브랜치 실패 시 싱크 턴에 표시되는 문구
pub const TEXT_ERROR_MESSAGE: &str = "Có lỗi xảy ra khi phân tích.";

// ============================================================================
// Types
// ============================================================================

/// 이름이 있는 첨부 파일
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedMedia {
    pub name: String,
    pub media: InlineMedia,
}

/// 사용자 요청 하나
#[derive(Debug, Clone, Default)]
pub struct UserTurn {
    pub query: String,
    pub image: Option<InlineMedia>,
    pub files: Vec<NamedMedia>,
}

impl UserTurn {
    pub fn text(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Default::default()
        }
    }

    pub fn with_image(mut self, image: InlineMedia) -> Self {
        self.image = Some(image);
        self
    }

    pub fn with_file(mut self, name: impl Into<String>, media: InlineMedia) -> Self {
        self.files.push(NamedMedia {
            name: name.into(),
            media,
        });
        self
    }

    /// 질문, 이미지, 파일이 모두 없음
    pub fn is_empty(&self) -> bool {
        self.query.trim().is_empty() && self.image.is_none() && self.files.is_empty()
    }

    /// 대화에 표시할 사용자 턴 내용
    fn display_content(&self) -> String {
        if !self.query.is_empty() {
            self.query.clone()
        } else if !self.files.is_empty() {
            format!("Đã đính kèm {} tệp", self.files.len())
        } else if self.image.is_some() {
            "Phân tích ảnh chụp".to_string()
        } else {
            String::new()
        }
    }

    /// 보관함 제목
    fn archive_title(&self) -> String {
        if !self.query.is_empty() {
            self.query.clone()
        } else if self.files.len() > 1 {
            format!("Học từ {} tệp", self.files.len())
        } else {
            "Học từ học liệu".to_string()
        }
    }
}

/// 브랜치 결과
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BranchOutcome {
    /// 결과가 싱크 턴에 반영됨
    Completed,
    /// 정상 종료했지만 결과 없음
    Empty,
    /// 실패 (텍스트는 오류 문구로 대체, 이미지는 생략)
    Failed,
}

/// 요청 하나의 최종 결과
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnswerOutcome {
    pub user_turn_id: String,
    pub assistant_turn_id: String,
    pub text: BranchOutcome,
    pub image: BranchOutcome,
    /// 싱크 턴의 최종 내용
    pub content: String,
    /// 보관함 저장 여부
    pub saved: bool,
}

/// 요청 시작 전에 거부되는 경우 (대화는 변경되지 않음)
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum OrchestratorError {
    #[error("Another request is already in progress")]
    Busy,

    #[error("Nothing to send: query, image and files are all empty")]
    EmptyTurn,
}

/// 진행 중 표시 해제 가드
struct BusyGuard<'a>(&'a AtomicBool);

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

// ============================================================================
// Orchestrator
// ============================================================================

/// 답변 생성 오케스트레이터
pub struct Orchestrator {
    provider: Arc<dyn GenerationProvider>,
    retriever: Retriever,
    conversation: SharedConversation,
    archive: Option<Arc<dyn Archive>>,
    tracking: AtomicBool,
    busy: AtomicBool,
}

impl Orchestrator {
    pub fn new(
        provider: Arc<dyn GenerationProvider>,
        retriever: Retriever,
        conversation: SharedConversation,
    ) -> Self {
        Self {
            provider,
            retriever,
            conversation,
            archive: None,
            tracking: AtomicBool::new(false),
            busy: AtomicBool::new(false),
        }
    }

    /// 보관 협력자 지정
    pub fn with_archive(mut self, archive: Arc<dyn Archive>) -> Self {
        self.archive = Some(archive);
        self
    }

    /// 보관 추적 켜기/끄기
    pub fn set_tracking(&self, enabled: bool) {
        self.tracking.store(enabled, Ordering::SeqCst);
    }

    pub fn is_tracking(&self) -> bool {
        self.tracking.load(Ordering::SeqCst)
    }

    /// 진행 중인 요청이 있는지
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::SeqCst)
    }

    pub fn conversation(&self) -> &SharedConversation {
        &self.conversation
    }

    /// 사용자 턴 하나에 답변
    ///
    /// `progress`는 수집 진행률입니다 (진행 중 작업이 없으면 `None`).
    pub async fn answer(
        &self,
        turn: UserTurn,
        progress: Option<u8>,
    ) -> Result<AnswerOutcome, OrchestratorError> {
        if turn.is_empty() {
            return Err(OrchestratorError::EmptyTurn);
        }
        if self
            .busy
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(OrchestratorError::Busy);
        }
        let _busy = BusyGuard(&self.busy);

        // 1. 사용자 턴
        let files: Vec<FileRef> = turn
            .files
            .iter()
            .map(|f| FileRef {
                name: f.name.clone(),
                mime_type: f.media.mime_type.clone(),
            })
            .collect();
        let image_url = turn.image.as_ref().map(InlineMedia::data_url);
        let display = turn.display_content();
        let user_turn_id = self
            .conversation
            .update(|c| c.push_user(display, image_url, files));

        // 2. 근거 자료
        let context = self.retriever.retrieve(&turn.query).unwrap_or_else(|e| {
            tracing::warn!("Retrieval failed, continuing without context: {}", e);
            String::new()
        });

        // 3. 싱크 턴
        let is_retrieved = !context.is_empty();
        let sink = self.conversation.update(|c| c.open_assistant(is_retrieved));

        tracing::info!(
            query = %turn.query,
            context_bytes = context.len(),
            images = turn.image.is_some() as u8,
            files = turn.files.len(),
            "Answering request"
        );

        // 4. 두 브랜치 동시 실행
        let request = TextRequest {
            question: effective_question(&turn.query, turn.image.is_some(), turn.files.len()),
            context: context.clone(),
            progress,
            knowledge_loaded: !self.retriever.store().is_empty(),
            image: turn.image.clone(),
            files: turn.files.iter().map(|f| f.media.clone()).collect(),
        };
        let image_prompt = if turn.query.is_empty() {
            IMAGE_PROMPT_FALLBACK.to_string()
        } else {
            turn.query.clone()
        };
        let image_context = if context.is_empty() {
            IMAGE_CONTEXT_FALLBACK.to_string()
        } else {
            context
        };

        let ((text_outcome, accumulated), image_outcome) = tokio::join!(
            self.run_text_branch(&sink, request),
            self.run_image_branch(&sink, &image_prompt, &image_context),
        );

        // 5. 합류 이후: 싱크 닫기, 저장
        let content = self.conversation.update(|c| {
            c.close(&sink);
            c.get(&sink).map(|m| m.content.clone()).unwrap_or_default()
        });

        let saved = match (&self.archive, self.is_tracking()) {
            (Some(archive), true) => {
                archive.save(&turn.archive_title(), &accumulated);
                true
            }
            _ => false,
        };

        tracing::info!(
            text = ?text_outcome,
            image = ?image_outcome,
            saved,
            "Request completed"
        );

        Ok(AnswerOutcome {
            user_turn_id,
            assistant_turn_id: sink,
            text: text_outcome,
            image: image_outcome,
            content,
            saved,
        })
    }

    /// 텍스트 브랜치: 조각을 도착 순서대로 싱크 턴에 추가
    ///
    /// 실패 시 내용을 오류 문구로 교체하고 소비를 멈춥니다.
    /// 반환값의 문자열은 실패 여부와 상관없이 받은 조각의 연결입니다.
    async fn run_text_branch(&self, sink: &str, request: TextRequest) -> (BranchOutcome, String) {
        let mut accumulated = String::new();

        match self.consume_text_stream(sink, request, &mut accumulated).await {
            Ok(()) if accumulated.is_empty() => (BranchOutcome::Empty, accumulated),
            Ok(()) => (BranchOutcome::Completed, accumulated),
            Err(e) => {
                tracing::warn!("Text generation failed: {}", e);
                let replaced = self
                    .conversation
                    .update(|c| c.replace_content(sink, TEXT_ERROR_MESSAGE));
                if let Err(e) = replaced {
                    tracing::warn!("Failed to record text error on turn: {}", e);
                }
                (BranchOutcome::Failed, accumulated)
            }
        }
    }

    async fn consume_text_stream(
        &self,
        sink: &str,
        request: TextRequest,
        accumulated: &mut String,
    ) -> Result<(), GenerationError> {
        let mut stream = self.provider.stream_text(request).await?;

        while let Some(fragment) = stream.next().await {
            let fragment = fragment?;
            if fragment.is_empty() {
                continue;
            }

            accumulated.push_str(&fragment);
            if let Err(e) = self
                .conversation
                .update(|c| c.append_content(sink, &fragment))
            {
                tracing::warn!("Dropped fragment for closed turn: {}", e);
            }
            tracing::debug!("Applied fragment ({} bytes)", fragment.len());
        }

        Ok(())
    }

    /// 이미지 브랜치: 성공하면 싱크 턴 이미지를 한 번 설정
    async fn run_image_branch(&self, sink: &str, prompt: &str, context: &str) -> BranchOutcome {
        match self.provider.generate_image(prompt, context).await {
            Ok(Some(image)) => {
                match self
                    .conversation
                    .update(|c| c.set_image(sink, image.data_url()))
                {
                    Ok(()) => BranchOutcome::Completed,
                    Err(e) => {
                        tracing::warn!("Failed to attach generated image: {}", e);
                        BranchOutcome::Failed
                    }
                }
            }
            Ok(None) => {
                tracing::debug!("Image generation returned no image");
                BranchOutcome::Empty
            }
            Err(e) => {
                tracing::warn!("Image generation failed: {}", e);
                BranchOutcome::Failed
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;
    use futures::stream;

    use super::*;
    use crate::chat::archive::MemoryArchive;
    use crate::chat::conversation::{Conversation, ConversationError, Role};
    use crate::knowledge::{ChunkMetadata, KnowledgeChunk, KnowledgeStore};
    use crate::provider::prompt::{FILES_FALLBACK_QUESTION, IMAGE_FALLBACK_QUESTION};
    use crate::provider::TextStream;

    /// 스트림 결과 스크립트
    #[derive(Clone)]
    enum ImageScript {
        Image,
        Nothing,
        Fail,
    }

    /// 조각과 이미지를 정해진 지연으로 돌려주는 프로바이더
    struct ScriptedProvider {
        fragments: Vec<Result<String, GenerationError>>,
        fragment_delay: Duration,
        open_error: Option<GenerationError>,
        image: ImageScript,
        image_delay: Duration,
        text_requests: Mutex<Vec<TextRequest>>,
        image_requests: Mutex<Vec<(String, String)>>,
    }

    impl ScriptedProvider {
        fn new(fragments: &[&str]) -> Self {
            Self {
                fragments: fragments.iter().map(|f| Ok(f.to_string())).collect(),
                fragment_delay: Duration::from_millis(10),
                open_error: None,
                image: ImageScript::Image,
                image_delay: Duration::from_millis(5),
                text_requests: Mutex::new(Vec::new()),
                image_requests: Mutex::new(Vec::new()),
            }
        }

        fn image(mut self, image: ImageScript, delay_ms: u64) -> Self {
            self.image = image;
            self.image_delay = Duration::from_millis(delay_ms);
            self
        }

        fn fail_after(mut self, error: GenerationError) -> Self {
            self.fragments.push(Err(error));
            self
        }

        fn last_text_request(&self) -> TextRequest {
            self.text_requests.lock().unwrap().last().cloned().unwrap()
        }

        fn last_image_request(&self) -> (String, String) {
            self.image_requests.lock().unwrap().last().cloned().unwrap()
        }
    }

    #[async_trait]
    impl GenerationProvider for ScriptedProvider {
        async fn stream_text(&self, request: TextRequest) -> Result<TextStream, GenerationError> {
            self.text_requests.lock().unwrap().push(request);
            if let Some(ref e) = self.open_error {
                return Err(e.clone());
            }

            let delay = self.fragment_delay;
            let items = self.fragments.clone();
            Ok(stream::iter(items)
                .then(move |item| async move {
                    tokio::time::sleep(delay).await;
                    item
                })
                .boxed())
        }

        async fn generate_image(
            &self,
            prompt: &str,
            context: &str,
        ) -> Result<Option<InlineMedia>, GenerationError> {
            self.image_requests
                .lock()
                .unwrap()
                .push((prompt.to_string(), context.to_string()));
            tokio::time::sleep(self.image_delay).await;

            match self.image {
                ImageScript::Image => Ok(Some(InlineMedia::new("image/png", "SU1H"))),
                ImageScript::Nothing => Ok(None),
                ImageScript::Fail => Err(GenerationError::Network("offline".to_string())),
            }
        }

        fn name(&self) -> &str {
            "scripted"
        }
    }

    /// 저장 시점의 싱크 턴 상태를 기록하는 보관함
    struct RecordingArchive {
        conversation: SharedConversation,
        saves: Mutex<Vec<(String, String, usize)>>,
    }

    impl Archive for RecordingArchive {
        fn save(&self, title: &str, content: &str) {
            let open = self.conversation.read(|c| c.open_turns());
            self.saves
                .lock()
                .unwrap()
                .push((title.to_string(), content.to_string(), open));
        }
    }

    fn setup(provider: ScriptedProvider) -> (Arc<ScriptedProvider>, Orchestrator, KnowledgeStore) {
        let provider = Arc::new(provider);
        let store = KnowledgeStore::new();
        let orchestrator = Orchestrator::new(
            provider.clone(),
            Retriever::new(store.clone()),
            SharedConversation::new(Conversation::new()),
        );
        (provider, orchestrator, store)
    }

    #[tokio::test(start_paused = true)]
    async fn test_fragments_concatenate_in_order_regardless_of_image_timing() {
        let fragments = ["Sông ", "Mê Kông ", "chảy qua ", "sáu quốc gia."];
        for image_delay in [0, 25, 500] {
            let (_, orchestrator, _) =
                setup(ScriptedProvider::new(&fragments).image(ImageScript::Image, image_delay));

            let outcome = orchestrator
                .answer(UserTurn::text("sông Mê Kông"), None)
                .await
                .unwrap();

            assert_eq!(outcome.content, fragments.concat());
            assert_eq!(outcome.text, BranchOutcome::Completed);
            assert_eq!(outcome.image, BranchOutcome::Completed);

            let sink = orchestrator
                .conversation()
                .message(&outcome.assistant_turn_id)
                .unwrap();
            assert_eq!(sink.image.as_deref(), Some("data:image/png;base64,SU1H"));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_sink_content_grows_while_streaming() {
        let (_, orchestrator, _) = setup(ScriptedProvider::new(&["a", "b", "c"]));
        let conversation = orchestrator.conversation().clone();
        let mut rx = conversation.subscribe();

        let observer = async {
            let mut seen = Vec::new();
            while rx.changed().await.is_ok() {
                let last = conversation.read(|c| c.messages().last().cloned());
                if let Some(m) = last {
                    if m.role == Role::Assistant && !seen.contains(&m.content) {
                        seen.push(m.content.clone());
                    }
                    if m.content == "abc" && m.image.is_some() {
                        break;
                    }
                }
            }
            seen
        };

        let (outcome, seen) = tokio::join!(
            orchestrator.answer(UserTurn::text("q"), None),
            observer
        );

        assert_eq!(outcome.unwrap().content, "abc");
        assert!(seen.contains(&"a".to_string()));
        assert!(seen.contains(&"ab".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_mid_stream_failure_replaces_content() {
        let provider = ScriptedProvider::new(&["Sông ", "Mê Kông là..."])
            .fail_after(GenerationError::StreamInterrupted("reset".to_string()));
        let (_, orchestrator, _) = setup(provider);

        let outcome = orchestrator
            .answer(UserTurn::text("sông Mê Kông"), None)
            .await
            .unwrap();

        assert_eq!(outcome.text, BranchOutcome::Failed);
        assert_eq!(outcome.content, TEXT_ERROR_MESSAGE);
        // 이미지 브랜치는 영향 받지 않음
        assert_eq!(outcome.image, BranchOutcome::Completed);
        assert!(!orchestrator.is_busy());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stream_open_failure_and_image_failure() {
        let mut provider = ScriptedProvider::new(&[]).image(ImageScript::Fail, 10);
        provider.open_error = Some(GenerationError::RateLimited);
        let (_, orchestrator, _) = setup(provider);

        let outcome = orchestrator
            .answer(UserTurn::text("khí hậu"), None)
            .await
            .unwrap();

        assert_eq!(outcome.text, BranchOutcome::Failed);
        assert_eq!(outcome.image, BranchOutcome::Failed);
        assert_eq!(outcome.content, TEXT_ERROR_MESSAGE);
        let sink = orchestrator
            .conversation()
            .message(&outcome.assistant_turn_id)
            .unwrap();
        assert!(sink.image.is_none());
        assert!(!orchestrator.is_busy());
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_output_leaves_sink_empty() {
        let (_, orchestrator, _) =
            setup(ScriptedProvider::new(&[]).image(ImageScript::Nothing, 0));

        let outcome = orchestrator.answer(UserTurn::text("q"), None).await.unwrap();
        assert_eq!(outcome.text, BranchOutcome::Empty);
        assert_eq!(outcome.image, BranchOutcome::Empty);
        assert_eq!(outcome.content, "");
    }

    #[tokio::test(start_paused = true)]
    async fn test_query_without_context_still_runs_both_branches() {
        let (provider, orchestrator, _) = setup(ScriptedProvider::new(&["Mê Kông"]));

        let outcome = orchestrator
            .answer(UserTurn::text("sông Mê Kông"), None)
            .await
            .unwrap();

        let request = provider.last_text_request();
        assert_eq!(request.question, "sông Mê Kông");
        assert_eq!(request.context, "");
        assert!(!request.knowledge_loaded);

        let (prompt, context) = provider.last_image_request();
        assert_eq!(prompt, "sông Mê Kông");
        assert_eq!(context, IMAGE_CONTEXT_FALLBACK);

        let sink = orchestrator
            .conversation()
            .message(&outcome.assistant_turn_id)
            .unwrap();
        assert!(!sink.is_retrieved);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retrieved_context_is_passed_to_both_branches() {
        let (provider, orchestrator, store) = setup(ScriptedProvider::new(&["ok"]));
        store
            .append(vec![KnowledgeChunk {
                id: "f-1".to_string(),
                file_id: "f".to_string(),
                content: "Sông Mê Kông dài 4.350 km.".to_string(),
                metadata: ChunkMetadata::default(),
            }])
            .unwrap();

        let outcome = orchestrator
            .answer(UserTurn::text("mê kông"), Some(60))
            .await
            .unwrap();

        let request = provider.last_text_request();
        assert_eq!(request.context, "Sông Mê Kông dài 4.350 km.");
        assert_eq!(request.progress, Some(60));
        assert!(request.knowledge_loaded);
        assert_eq!(provider.last_image_request().1, "Sông Mê Kông dài 4.350 km.");

        let sink = orchestrator
            .conversation()
            .message(&outcome.assistant_turn_id)
            .unwrap();
        assert!(sink.is_retrieved);
    }

    #[tokio::test(start_paused = true)]
    async fn test_image_only_turn_uses_fallback_prompts() {
        let (provider, orchestrator, _) = setup(ScriptedProvider::new(&["x"]));
        let turn = UserTurn::default().with_image(InlineMedia::new("image/jpeg", "QUJD"));

        let outcome = orchestrator.answer(turn, None).await.unwrap();

        let request = provider.last_text_request();
        assert_eq!(request.question, IMAGE_FALLBACK_QUESTION);
        assert_eq!(request.image, Some(InlineMedia::new("image/jpeg", "QUJD")));
        assert_eq!(provider.last_image_request().0, IMAGE_PROMPT_FALLBACK);

        let user = orchestrator
            .conversation()
            .message(&outcome.user_turn_id)
            .unwrap();
        assert_eq!(user.content, "Phân tích ảnh chụp");
        assert_eq!(user.image.as_deref(), Some("data:image/jpeg;base64,QUJD"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_files_only_turn() {
        let (provider, orchestrator, _) = setup(ScriptedProvider::new(&["x"]));
        let turn = UserTurn::default()
            .with_file("bai1.pdf", InlineMedia::new("application/pdf", "UERG"))
            .with_file("bai2.pdf", InlineMedia::new("application/pdf", "UERH"));

        let outcome = orchestrator.answer(turn, None).await.unwrap();

        let request = provider.last_text_request();
        assert_eq!(request.question, FILES_FALLBACK_QUESTION);
        assert_eq!(request.files.len(), 2);

        let user = orchestrator
            .conversation()
            .message(&outcome.user_turn_id)
            .unwrap();
        assert_eq!(user.content, "Đã đính kèm 2 tệp");
        assert_eq!(user.files[1].name, "bai2.pdf");
    }

    #[tokio::test(start_paused = true)]
    async fn test_save_once_after_both_branches_settle() {
        let (_, orchestrator, _) =
            setup(ScriptedProvider::new(&["Sông ", "Hồng"]).image(ImageScript::Image, 300));
        let archive = Arc::new(RecordingArchive {
            conversation: orchestrator.conversation().clone(),
            saves: Mutex::new(Vec::new()),
        });
        let orchestrator = orchestrator.with_archive(archive.clone());
        orchestrator.set_tracking(true);

        let outcome = orchestrator
            .answer(UserTurn::text("sông Hồng"), None)
            .await
            .unwrap();
        assert!(outcome.saved);

        let saves = archive.saves.lock().unwrap().clone();
        assert_eq!(saves.len(), 1);
        assert_eq!(saves[0].0, "sông Hồng");
        assert_eq!(saves[0].1, "Sông Hồng");
        // 저장 시점에 싱크 턴은 이미 닫힘
        assert_eq!(saves[0].2, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_save_when_tracking_disabled() {
        let (_, orchestrator, _) = setup(ScriptedProvider::new(&["x"]));
        let archive = Arc::new(MemoryArchive::new());
        let orchestrator = orchestrator.with_archive(archive.clone());

        let outcome = orchestrator.answer(UserTurn::text("q"), None).await.unwrap();
        assert!(!outcome.saved);
        assert!(archive.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_archive_titles_for_attachments() {
        let (_, orchestrator, _) = setup(ScriptedProvider::new(&["x"]));
        let archive = Arc::new(MemoryArchive::new());
        let orchestrator = orchestrator.with_archive(archive.clone());
        orchestrator.set_tracking(true);

        let pdf = InlineMedia::new("application/pdf", "UERG");
        orchestrator
            .answer(UserTurn::default().with_file("a.pdf", pdf.clone()), None)
            .await
            .unwrap();
        orchestrator
            .answer(
                UserTurn::default()
                    .with_file("a.pdf", pdf.clone())
                    .with_file("b.pdf", pdf),
                None,
            )
            .await
            .unwrap();

        let entries = archive.entries();
        assert_eq!(entries[0].title, "Học từ 2 tệp");
        assert_eq!(entries[1].title, "Học từ học liệu");
    }

    #[tokio::test(start_paused = true)]
    async fn test_sink_is_closed_after_join() {
        let (_, orchestrator, _) = setup(ScriptedProvider::new(&["done"]));
        let outcome = orchestrator.answer(UserTurn::text("q"), None).await.unwrap();

        let result = orchestrator
            .conversation()
            .update(|c| c.append_content(&outcome.assistant_turn_id, "late"));
        assert_eq!(
            result,
            Err(ConversationError::NotOpen(outcome.assistant_turn_id.clone()))
        );
        assert_eq!(orchestrator.conversation().read(|c| c.open_turns()), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_overlapping_request_is_rejected() {
        let (_, orchestrator, _) = setup(ScriptedProvider::new(&["a", "b"]));

        let (first, second) = tokio::join!(
            orchestrator.answer(UserTurn::text("first"), None),
            orchestrator.answer(UserTurn::text("second"), None)
        );

        assert!(first.is_ok());
        assert_eq!(second, Err(OrchestratorError::Busy));
        // 거부된 요청은 대화를 바꾸지 않음
        assert_eq!(orchestrator.conversation().read(|c| c.len()), 2);
        assert!(!orchestrator.is_busy());
    }

    #[tokio::test]
    async fn test_empty_turn_is_rejected() {
        let (_, orchestrator, _) = setup(ScriptedProvider::new(&[]));
        let result = orchestrator.answer(UserTurn::text("   "), None).await;
        assert_eq!(result, Err(OrchestratorError::EmptyTurn));
        assert!(orchestrator.conversation().read(|c| c.is_empty()));
    }
}

//! CLI 모듈
//!
//! dia-ai CLI 명령어 정의 및 구현

use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::chat::{
    AnswerOutcome, BranchOutcome, Conversation, MemoryArchive, Message, NamedMedia, Orchestrator,
    Role, SharedConversation, UserTurn,
};
use crate::exam::{self, load_matrix, ExamProvider, MatrixSource, MatrixTopic};
use crate::ingest::{
    spawn_driver, FileKind, IngestConfig, IngestionPipeline, SharedPipeline, UploadDescriptor,
    UploadStatus,
};
use crate::knowledge::{KnowledgeStore, Retriever};
use crate::provider::{has_api_key, GeminiProvider, InlineMedia, ProviderConfig};

// ============================================================================
// CLI Definition
// ============================================================================

#[derive(Parser)]
#[command(name = "dia-ai")]
#[command(version, about = "Địa AI - 지리 학습 자료 기반 질의응답 도우미", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// 질문 하나에 답변 (텍스트 스트림 + 인포그래픽)
    Ask {
        /// 질문 (이미지/파일만 보낼 때는 생략)
        query: Option<String>,

        /// 함께 보낼 이미지
        #[arg(short, long)]
        image: Option<PathBuf>,

        /// 함께 보낼 파일 (여러 번 지정 가능)
        #[arg(short, long)]
        file: Vec<PathBuf>,

        /// 질문 전에 학습 자료로 수집할 파일
        #[arg(long)]
        ingest: Vec<PathBuf>,

        /// 답변을 보관함에 저장
        #[arg(long)]
        track: bool,

        /// 생성된 인포그래픽 저장 경로
        #[arg(long)]
        image_out: Option<PathBuf>,
    },

    /// 대화형 세션
    Chat {
        /// 시작 시 수집할 파일
        #[arg(long)]
        ingest: Vec<PathBuf>,

        /// 답변을 보관함에 저장
        #[arg(long)]
        track: bool,
    },

    /// 학습 자료 검색 (생성 없음)
    Query {
        /// 검색어
        text: String,

        /// 검색 전에 수집할 파일
        #[arg(long)]
        ingest: Vec<PathBuf>,
    },

    /// 출제 매트릭스 생성 / 추출, 시험지 생성
    Exam {
        /// 출제 주제
        topic: Option<String>,

        /// 학년
        #[arg(short, long, default_value = exam::DEFAULT_GRADE)]
        grade: String,

        /// 매트릭스를 추출할 텍스트 파일
        #[arg(long, conflicts_with = "from_file")]
        from_text: Option<PathBuf>,

        /// 매트릭스를 추출할 이미지/PDF
        #[arg(long)]
        from_file: Option<PathBuf>,

        /// 매트릭스로 시험지까지 생성
        #[arg(long)]
        sets: bool,

        /// 매트릭스 JSON 저장 경로
        #[arg(long)]
        json: Option<PathBuf>,
    },

    /// 상태 확인
    Status,
}

// ============================================================================
// CLI Runner
// ============================================================================

/// CLI 명령어 실행
pub async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Ask {
            query,
            image,
            file,
            ingest,
            track,
            image_out,
        } => cmd_ask(query.unwrap_or_default(), image, file, ingest, track, image_out).await,
        Commands::Chat { ingest, track } => cmd_chat(ingest, track).await,
        Commands::Query { text, ingest } => cmd_query(&text, ingest).await,
        Commands::Exam {
            topic,
            grade,
            from_text,
            from_file,
            sets,
            json,
        } => cmd_exam(topic, grade, from_text, from_file, sets, json).await,
        Commands::Status => cmd_status().await,
    }
}

// ============================================================================
// Session
// ============================================================================

/// 명령 하나가 사용하는 세션 구성요소
struct Session {
    store: KnowledgeStore,
    pipeline: SharedPipeline,
    orchestrator: Orchestrator,
    archive: Arc<MemoryArchive>,
}

impl Session {
    fn new(conversation: SharedConversation, track: bool) -> Result<Self> {
        ensure_api_key()?;

        let provider = GeminiProvider::from_env().context("GeminiProvider 생성 실패")?;
        let store = KnowledgeStore::new();
        let pipeline = IngestionPipeline::new(store.clone(), IngestConfig::default())
            .context("IngestionPipeline 생성 실패")?
            .into_shared();
        let archive = Arc::new(MemoryArchive::new());

        let orchestrator = Orchestrator::new(
            Arc::new(provider),
            Retriever::new(store.clone()),
            conversation,
        )
        .with_archive(archive.clone());
        orchestrator.set_tracking(track);

        Ok(Self {
            store,
            pipeline,
            orchestrator,
            archive,
        })
    }

    async fn progress(&self) -> Option<u8> {
        self.pipeline.lock().await.global_progress()
    }
}

fn ensure_api_key() -> Result<()> {
    if !has_api_key() {
        bail!(
            "API 키가 설정되지 않았습니다.\n\n\
             설정 방법:\n  \
             export GEMINI_API_KEY=your-api-key\n  \
             또는\n  \
             export GOOGLE_AI_API_KEY=your-api-key\n\n\
             API 키 발급: https://aistudio.google.com/app/apikey"
        );
    }
    Ok(())
}

// ============================================================================
// Command Implementations
// ============================================================================

/// 질문 명령어 (ask)
async fn cmd_ask(
    query: String,
    image: Option<PathBuf>,
    files: Vec<PathBuf>,
    ingest: Vec<PathBuf>,
    track: bool,
    image_out: Option<PathBuf>,
) -> Result<()> {
    let session = Session::new(SharedConversation::new(Conversation::new()), track)?;

    if !ingest.is_empty() {
        let mut pipeline = session.pipeline.lock().await;
        ingest_paths(&mut pipeline, &ingest).await?;
    }

    let mut turn = UserTurn::text(query);
    if let Some(ref path) = image {
        turn = turn.with_image(load_media(path).await?);
    }
    for path in &files {
        turn = turn.with_file(file_name(path), load_media(path).await?);
    }

    let outcome = answer_with_render(&session.orchestrator, turn, session.progress().await).await?;
    print_outcome(&session, &outcome, image_out.as_deref()).await?;

    Ok(())
}

/// 대화형 세션 명령어 (chat)
async fn cmd_chat(ingest: Vec<PathBuf>, track: bool) -> Result<()> {
    let conversation = SharedConversation::default();
    let session = Session::new(conversation.clone(), track)?;

    println!("Địa AI v{}", env!("CARGO_PKG_VERSION"));
    if let Some(greeting) = conversation.read(|c| c.messages().first().cloned()) {
        println!("{}", greeting.content);
    }
    println!("명령: /upload PATH, /attach PATH, /track on|off, /vault, /restore N, /status, /quit");
    println!();

    if !ingest.is_empty() {
        let mut pipeline = session.pipeline.lock().await;
        enqueue_paths(&mut pipeline, &ingest).await?;
    }

    let driver = spawn_driver(session.pipeline.clone());
    let result = chat_loop(&session, &conversation).await;
    driver.abort();

    result
}

async fn chat_loop(session: &Session, conversation: &SharedConversation) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut pending = UserTurn::default();

    loop {
        print!("> ");
        std::io::stdout().flush().ok();

        let Some(line) = lines.next_line().await.context("입력 읽기 실패")? else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        if let Some(command) = line.strip_prefix('/') {
            let (name, arg) = command
                .split_once(' ')
                .map(|(n, a)| (n, a.trim()))
                .unwrap_or((command, ""));

            match name {
                "quit" | "exit" => break,
                "upload" => {
                    let paths: Vec<PathBuf> = arg.split_whitespace().map(PathBuf::from).collect();
                    if paths.is_empty() {
                        println!("[!] 사용법: /upload PATH...");
                        continue;
                    }
                    let mut pipeline = session.pipeline.lock().await;
                    if let Err(e) = enqueue_paths(&mut pipeline, &paths).await {
                        println!("[!] 업로드 실패: {:#}", e);
                    }
                }
                "attach" => match attach(&mut pending, Path::new(arg)).await {
                    Ok(kind) => println!("[OK] 다음 질문에 첨부됨 ({})", kind.label()),
                    Err(e) => println!("[!] 첨부 실패: {:#}", e),
                },
                "track" => {
                    let enabled = matches!(arg, "on" | "");
                    session.orchestrator.set_tracking(enabled);
                    println!("[OK] 보관 추적: {}", if enabled { "켜짐" } else { "꺼짐" });
                }
                "vault" => print_vault(&session.archive),
                "restore" => restore(session, conversation, arg),
                "status" => print_session_status(session).await?,
                other => println!("[!] 알 수 없는 명령: /{}", other),
            }
            continue;
        }

        let mut turn = std::mem::take(&mut pending);
        turn.query = line.to_string();

        let progress = session.progress().await;
        match answer_with_render(&session.orchestrator, turn, progress).await {
            Ok(outcome) => {
                if let Err(e) = print_outcome(session, &outcome, None).await {
                    println!("[!] {:#}", e);
                }
            }
            Err(e) => println!("[!] {:#}", e),
        }
        println!();
    }

    Ok(())
}

/// 검색 명령어 (query)
///
/// 수집된 학습 자료에서 검색어를 포함한 청크를 출력합니다.
async fn cmd_query(text: &str, ingest: Vec<PathBuf>) -> Result<()> {
    let store = KnowledgeStore::new();
    let mut pipeline = IngestionPipeline::new(store.clone(), IngestConfig::default())
        .context("IngestionPipeline 생성 실패")?;
    ingest_paths(&mut pipeline, &ingest).await?;

    println!("[*] 검색 중: \"{}\"", text);

    let retriever = Retriever::new(store);
    let chunks = retriever.matching_chunks(text).context("검색 실패")?;

    if chunks.is_empty() {
        println!("\n[!] 검색 결과가 없습니다.");
        return Ok(());
    }

    println!("\n[OK] 검색 결과 ({} 건):\n", chunks.len());

    for (i, chunk) in chunks.iter().enumerate() {
        println!("{}. [{}] {}", i + 1, chunk.metadata.topic, chunk.id);
        println!("   내용: {}", truncate_text(&chunk.content, 200));
        println!();
    }

    Ok(())
}

/// 출제 명령어 (exam)
///
/// 주제 또는 텍스트/파일에서 매트릭스를 만들고, `--sets`이면 시험지까지 생성합니다.
async fn cmd_exam(
    topic: Option<String>,
    grade: String,
    from_text: Option<PathBuf>,
    from_file: Option<PathBuf>,
    sets: bool,
    json: Option<PathBuf>,
) -> Result<()> {
    ensure_api_key()?;
    let provider = GeminiProvider::from_env().context("GeminiProvider 생성 실패")?;

    let source = matrix_source(topic.as_deref(), &grade, from_text.as_deref(), from_file.as_deref())
        .await?;

    println!("[*] 출제 매트릭스 생성 중...");
    let matrix = load_matrix(&provider, &source)
        .await
        .context("매트릭스 생성 실패")?;

    if matrix.is_empty() {
        println!("[!] 매트릭스가 비어 있습니다.");
        return Ok(());
    }
    print_matrix(&matrix);

    if let Some(path) = json {
        let body = serde_json::to_string_pretty(&matrix).context("매트릭스 직렬화 실패")?;
        tokio::fs::write(&path, body)
            .await
            .with_context(|| format!("매트릭스 저장 실패: {}", path.display()))?;
        println!("[OK] 매트릭스 저장: {}", path.display());
    }

    if sets {
        let label = exam_topic_label(topic.as_deref(), &matrix);
        println!("\n[*] 시험지 생성 중: {} ({})", label, grade);

        let exam_text = provider
            .generate_exam_sets(&matrix, &label, &grade)
            .await
            .context("시험지 생성 실패")?;
        if exam_text.is_empty() {
            println!("[!] 생성된 시험지가 없습니다.");
        } else {
            println!("\n{}", exam_text);
        }
    }

    Ok(())
}

/// 상태 명령어 (status)
async fn cmd_status() -> Result<()> {
    println!("dia-ai v{}", env!("CARGO_PKG_VERSION"));
    println!();

    if has_api_key() {
        println!("[OK] API 키: 설정됨");
    } else {
        println!("[!] API 키: 미설정");
        println!("    설정: export GEMINI_API_KEY=your-key");
    }

    let config = ProviderConfig::from_env();
    println!("[*] 텍스트 모델: {}", config.text_model);
    println!("[*] 이미지 모델: {}", config.image_model);
    println!("[*] 출제 모델: {}", config.exam_model);

    let ingest = IngestConfig::default();
    println!(
        "[*] 수집 틱: {}% / {} ms",
        ingest.progress_step,
        ingest.tick_interval.as_millis()
    );

    Ok(())
}

// ============================================================================
// Ingestion Helpers
// ============================================================================

/// 파일 경로로 업로드 정보 생성
async fn describe_upload(path: &Path) -> Result<UploadDescriptor> {
    let metadata = tokio::fs::metadata(path)
        .await
        .with_context(|| format!("파일 정보 읽기 실패: {}", path.display()))?;

    if !metadata.is_file() {
        bail!("파일이 아닙니다: {}", path.display());
    }

    Ok(UploadDescriptor::new(
        file_name(path),
        metadata.len(),
        mime_for_path(path),
    ))
}

/// 업로드 등록 (진행은 백그라운드 드라이버가 담당)
async fn enqueue_paths(pipeline: &mut IngestionPipeline, paths: &[PathBuf]) -> Result<()> {
    let mut descriptors = Vec::with_capacity(paths.len());
    for path in paths {
        descriptors.push(describe_upload(path).await?);
    }

    let ids = pipeline.enqueue(&descriptors);
    for (id, descriptor) in ids.iter().zip(&descriptors) {
        println!("[*] 업로드 등록: {} (ID: {})", descriptor.name, id);
    }
    Ok(())
}

/// 업로드 등록 후 모두 완료될 때까지 진행
async fn ingest_paths(pipeline: &mut IngestionPipeline, paths: &[PathBuf]) -> Result<()> {
    if paths.is_empty() {
        return Ok(());
    }

    enqueue_paths(pipeline, paths).await?;
    println!("[*] 학습 자료 처리 중: {} 파일", paths.len());

    let reports = pipeline.run_to_completion().await;
    let committed: usize = reports.iter().map(|r| r.committed_chunks).sum();

    for task in pipeline.tasks() {
        println!(
            "    [{}] {} ({}) - {} 청크",
            task.kind.label(),
            task.display_name,
            task.size_label,
            task.chunk_count
        );
    }
    println!("[OK] 수집 완료: {} 청크 ({} 틱)", committed, reports.len());
    println!();

    Ok(())
}

/// 다음 질문에 첨부 (이미지는 하나만, 나머지는 파일)
async fn attach(turn: &mut UserTurn, path: &Path) -> Result<FileKind> {
    if path.as_os_str().is_empty() {
        bail!("사용법: /attach PATH");
    }

    let media = load_media(path).await?;
    let name = file_name(path);
    let kind = FileKind::from_name(&name);

    if kind == FileKind::Image && turn.image.is_none() {
        turn.image = Some(media);
    } else {
        turn.files.push(NamedMedia { name, media });
    }
    Ok(kind)
}

/// 첨부 파일 읽기 (base64)
async fn load_media(path: &Path) -> Result<InlineMedia> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("파일 읽기 실패: {}", path.display()))?;

    Ok(InlineMedia::new(mime_for_path(path), STANDARD.encode(bytes)))
}

/// 확장자로 MIME 타입 추정
fn mime_for_path(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        "pdf" => "application/pdf",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "webp" => "image/webp",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "txt" | "md" => "text/plain",
        _ => "application/octet-stream",
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("unknown")
        .to_string()
}

// ============================================================================
// Exam Helpers
// ============================================================================

/// 옵션에서 매트릭스 출처 결정 (파일 > 주제)
async fn matrix_source(
    topic: Option<&str>,
    grade: &str,
    from_text: Option<&Path>,
    from_file: Option<&Path>,
) -> Result<MatrixSource> {
    if let Some(path) = from_text {
        let text = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("파일 읽기 실패: {}", path.display()))?;
        return Ok(MatrixSource::Text(text));
    }
    if let Some(path) = from_file {
        return Ok(MatrixSource::Media(load_media(path).await?));
    }

    match topic.map(str::trim).filter(|t| !t.is_empty()) {
        Some(topic) => Ok(MatrixSource::Topic {
            topic: topic.to_string(),
            grade: grade.to_string(),
        }),
        None => bail!("주제, --from-text, --from-file 중 하나를 지정해야 합니다"),
    }
}

/// 시험지 요청에 쓸 주제 (미지정 시 매트릭스 주제 이름)
fn exam_topic_label(topic: Option<&str>, matrix: &[MatrixTopic]) -> String {
    match topic.map(str::trim).filter(|t| !t.is_empty()) {
        Some(topic) => topic.to_string(),
        None => matrix
            .iter()
            .map(|t| t.name.as_str())
            .collect::<Vec<_>>()
            .join(", "),
    }
}

fn format_matrix_row(index: usize, topic: &MatrixTopic) -> String {
    let levels = &topic.levels;
    format!(
        "{:>2}. {} [{}] {} - {} câu (NB {} / TH {} / VD {} / VDC {}){}",
        index + 1,
        truncate_text(&topic.name, 40),
        topic.subject,
        topic.question_type,
        topic.quantity,
        levels.remember,
        levels.understand,
        levels.apply,
        levels.high_apply,
        if topic.is_consistent() { "" } else { " [!]" }
    )
}

fn print_matrix(matrix: &[MatrixTopic]) {
    let summary = exam::summarize(matrix);

    println!("\n[OK] 출제 매트릭스 ({} 주제):\n", summary.topics);
    for (i, topic) in matrix.iter().enumerate() {
        println!("  {}", format_matrix_row(i, topic));
    }
    println!();
    println!(
        "    합계: {} câu (NB {} / TH {} / VD {} / VDC {})",
        summary.quantity,
        summary.levels.remember,
        summary.levels.understand,
        summary.levels.apply,
        summary.levels.high_apply
    );
    if summary.inconsistent > 0 {
        println!(
            "[!] 수준별 합계가 문항 수와 다른 행: {} 건",
            summary.inconsistent
        );
    }
}

// ============================================================================
// Rendering
// ============================================================================

/// 싱크 턴이 자라는 만큼만 출력
#[derive(Debug, Default)]
struct TurnRenderer {
    turn_id: Option<String>,
    printed: String,
}

impl TurnRenderer {
    /// 이전 출력 이후 새로 보여줄 부분
    ///
    /// 내용이 교체된 경우(오류 문구) 줄을 바꿔 전체를 다시 출력합니다.
    fn delta(&mut self, message: &Message) -> Option<String> {
        if message.role != Role::Assistant {
            return None;
        }
        if self.turn_id.as_deref() != Some(message.id.as_str()) {
            self.turn_id = Some(message.id.clone());
            self.printed.clear();
        }
        if message.content == self.printed {
            return None;
        }

        let output = match message.content.strip_prefix(self.printed.as_str()) {
            Some(rest) => rest.to_string(),
            None => format!("\n{}", message.content),
        };
        self.printed = message.content.clone();
        Some(output)
    }
}

/// 답변을 생성하면서 싱크 턴을 표준 출력으로 스트리밍
async fn answer_with_render(
    orchestrator: &Orchestrator,
    turn: UserTurn,
    progress: Option<u8>,
) -> Result<AnswerOutcome> {
    let conversation = orchestrator.conversation().clone();
    let mut changes = conversation.subscribe();
    let mut renderer = TurnRenderer::default();

    let answer = orchestrator.answer(turn, progress);
    tokio::pin!(answer);

    let result = loop {
        tokio::select! {
            result = &mut answer => break result,
            Ok(()) = changes.changed() => {
                let delta = conversation.read(|c| {
                    c.messages()
                        .last()
                        .filter(|m| c.is_open(&m.id))
                        .and_then(|m| renderer.delta(m))
                });
                if let Some(text) = delta {
                    print!("{}", text);
                    std::io::stdout().flush().ok();
                }
            }
        }
    };
    let outcome = result?;

    // 합류 직전에 도착한 조각
    if let Some(message) = conversation.message(&outcome.assistant_turn_id) {
        if let Some(text) = renderer.delta(&message) {
            print!("{}", text);
        }
    }
    println!();

    Ok(outcome)
}

/// 이미지 / 보관 결과 출력
async fn print_outcome(
    session: &Session,
    outcome: &AnswerOutcome,
    image_out: Option<&Path>,
) -> Result<()> {
    let message = session
        .orchestrator
        .conversation()
        .message(&outcome.assistant_turn_id);

    if message.as_ref().is_some_and(|m| m.is_retrieved) {
        println!("[*] 학습 자료 근거 사용");
    }

    match outcome.image {
        BranchOutcome::Completed => {
            let data_url = message.and_then(|m| m.image).unwrap_or_default();
            let (mime_type, bytes) = decode_data_url(&data_url)?;
            println!("[OK] 인포그래픽 생성됨 ({}, {})", mime_type, format_bytes(bytes.len()));

            if let Some(path) = image_out {
                tokio::fs::write(path, &bytes)
                    .await
                    .with_context(|| format!("이미지 저장 실패: {}", path.display()))?;
                println!("     저장: {}", path.display());
            }
        }
        BranchOutcome::Empty => println!("[!] 인포그래픽 없음"),
        BranchOutcome::Failed => println!("[!] 인포그래픽 생성 실패"),
    }

    if outcome.saved {
        if let Some(entry) = session.archive.entries().first() {
            println!("[OK] 보관함에 저장: {} ({})", entry.title, entry.size_label);
        }
    }

    Ok(())
}

fn print_vault(archive: &MemoryArchive) {
    let entries = archive.entries();
    if entries.is_empty() {
        println!("[!] 보관함이 비어 있습니다.");
        return;
    }

    println!("[OK] 보관함 ({} 건):\n", entries.len());
    for (i, entry) in entries.iter().enumerate() {
        println!("  {:>2}. {}", i + 1, truncate_text(&entry.title, 40));
        println!(
            "      {} | {}",
            entry.timestamp.format("%Y-%m-%d %H:%M"),
            entry.size_label
        );
    }
}

fn restore(session: &Session, conversation: &SharedConversation, arg: &str) {
    let entries = session.archive.entries();
    let entry = arg
        .parse::<usize>()
        .ok()
        .and_then(|n| n.checked_sub(1))
        .and_then(|i| entries.get(i));

    match entry {
        Some(entry) => {
            conversation.replace(Conversation::restore(entry));
            if let Some(last) = conversation.read(|c| c.messages().last().cloned()) {
                println!("{}", last.content);
            }
        }
        None => println!("[!] 사용법: /restore N (1..={})", entries.len()),
    }
}

async fn print_session_status(session: &Session) -> Result<()> {
    let pipeline = session.pipeline.lock().await;

    if pipeline.tasks().is_empty() {
        println!("[*] 업로드 없음");
    }
    for task in pipeline.tasks() {
        let status = match task.status {
            UploadStatus::Processing => format!("{}%", task.progress),
            UploadStatus::Completed => format!("완료, {} 청크", task.chunk_count),
        };
        println!(
            "  [{}] {} ({}) - {}",
            task.kind.label(),
            task.display_name,
            task.size_label,
            status
        );
    }
    if let Some(progress) = pipeline.global_progress() {
        println!("[*] 전체 진행률: {}%", progress);
    }

    let stats = session.store.stats().context("통계 조회 실패")?;
    println!(
        "[OK] 지식 청크: {} 건 ({} 파일, {})",
        stats.chunk_count,
        stats.file_count,
        format_bytes(stats.total_content_bytes)
    );
    println!(
        "[*] 보관 추적: {}",
        if session.orchestrator.is_tracking() { "켜짐" } else { "꺼짐" }
    );

    Ok(())
}

// ============================================================================
// Helper Functions
// ============================================================================

/// `data:{mime};base64,{data}` 해석
fn decode_data_url(url: &str) -> Result<(String, Vec<u8>)> {
    let rest = url
        .strip_prefix("data:")
        .context("data URL 형식이 아닙니다")?;
    let (mime_type, data) = rest
        .split_once(";base64,")
        .context("base64 data URL이 아닙니다")?;
    let bytes = STANDARD.decode(data).context("base64 디코딩 실패")?;

    Ok((mime_type.to_string(), bytes))
}

/// 텍스트 자르기 (UTF-8 안전)
fn truncate_text(text: &str, max_chars: usize) -> String {
    let cleaned = text.replace('\n', " ").replace('\r', "");
    let cleaned = cleaned.trim();

    if cleaned.chars().count() <= max_chars {
        cleaned.to_string()
    } else {
        let truncated: String = cleaned.chars().take(max_chars).collect();
        format!("{}...", truncated)
    }
}

/// 바이트 크기 포맷팅
fn format_bytes(bytes: usize) -> String {
    const KB: usize = 1024;
    const MB: usize = KB * 1024;

    if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

// ============================================================================
// Tests
// ============================================================================

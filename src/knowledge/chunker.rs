//! 청크 생성 모듈
//!
//! 추출된 자료 텍스트를 문단 경계에서 분할하고,
//! 파일 ID가 붙은 `KnowledgeChunk`로 변환합니다.

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;

use super::store::{ChunkMetadata, KnowledgeChunk};

/// 수집된 자료의 기본 주제 레이블
pub const DEFAULT_TOPIC: &str = "Tài liệu học tập";

/// 기본 키워드
const DEFAULT_KEYWORDS: [&str; 2] = ["địa lí", "kiến thức"];

// ============================================================================
// Chunk Configuration
// ============================================================================

/// 청킹 설정
#[derive(Debug, Clone)]
pub struct ChunkConfig {
    /// 최소 청크 크기 (문자 수), 이보다 작은 조각은 이웃과 병합
    pub min_characters: usize,
    /// 최대 청크 크기 (문자 수)
    pub max_characters: usize,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            min_characters: 200,
            max_characters: 1200,
        }
    }
}

impl ChunkConfig {
    /// 교과서 한 단원 단위 설정
    pub fn for_chapters() -> Self {
        Self {
            min_characters: 400,
            max_characters: 2000,
        }
    }
}

// ============================================================================
// Chunker Trait
// ============================================================================

/// 텍스트 청킹 전략 트레이트
pub trait Chunker: Send + Sync {
    /// 텍스트를 청크로 분할
    fn chunk(&self, text: &str) -> Vec<String>;

    /// 청커 이름
    fn name(&self) -> &'static str;
}

// ============================================================================
// ParagraphChunker
// ============================================================================

/// 문단 인식 청커
///
/// 헤더에서 섹션을 나누고, 긴 섹션은 빈 줄 경계에서 자른 뒤
/// 너무 작은 조각을 병합합니다.
pub struct ParagraphChunker {
    config: ChunkConfig,
}

fn header_regex() -> &'static Regex {
    static HEADER_RE: OnceLock<Regex> = OnceLock::new();
    HEADER_RE.get_or_init(|| Regex::new(r"^#{1,6}\s+").expect("Invalid regex"))
}

impl ParagraphChunker {
    pub fn new(config: ChunkConfig) -> Self {
        Self { config }
    }

    pub fn with_defaults() -> Self {
        Self::new(ChunkConfig::default())
    }

    fn split_sections(&self, text: &str) -> Vec<String> {
        let mut sections = Vec::new();
        let mut current = String::new();

        for line in text.lines() {
            if header_regex().is_match(line) && !current.trim().is_empty() {
                sections.push(current.trim().to_string());
                current.clear();
            }
            current.push_str(line);
            current.push('\n');
        }

        if !current.trim().is_empty() {
            sections.push(current.trim().to_string());
        }

        sections
    }

    fn split_long_section(&self, section: &str) -> Vec<String> {
        if section.chars().count() <= self.config.max_characters {
            return vec![section.to_string()];
        }

        let mut pieces = Vec::new();
        let mut current = String::new();

        for para in section.split("\n\n").map(str::trim).filter(|p| !p.is_empty()) {
            let projected = current.chars().count() + para.chars().count() + 2;
            if !current.is_empty() && projected > self.config.max_characters {
                pieces.push(std::mem::take(&mut current));
            }

            if para.chars().count() > self.config.max_characters {
                // 문단 하나가 최대 크기를 넘으면 문자 단위로 자름
                let chars: Vec<char> = para.chars().collect();
                for window in chars.chunks(self.config.max_characters) {
                    pieces.push(window.iter().collect());
                }
                continue;
            }

            if !current.is_empty() {
                current.push_str("\n\n");
            }
            current.push_str(para);
        }

        if !current.is_empty() {
            pieces.push(current);
        }

        pieces
    }

    fn merge_small_chunks(&self, chunks: Vec<String>) -> Vec<String> {
        let mut result: Vec<String> = Vec::new();

        for chunk in chunks {
            if let Some(last) = result.last_mut() {
                let last_len = last.chars().count();
                if last_len < self.config.min_characters
                    && last_len + chunk.chars().count() + 2 <= self.config.max_characters
                {
                    last.push_str("\n\n");
                    last.push_str(&chunk);
                    continue;
                }
            }
            result.push(chunk);
        }

        result
    }
}

impl Chunker for ParagraphChunker {
    fn chunk(&self, text: &str) -> Vec<String> {
        if text.trim().is_empty() {
            return vec![];
        }

        let pieces: Vec<String> = self
            .split_sections(text)
            .into_iter()
            .flat_map(|s| self.split_long_section(&s))
            .filter(|c| !c.trim().is_empty())
            .collect();

        self.merge_small_chunks(pieces)
    }

    fn name(&self) -> &'static str {
        "ParagraphChunker"
    }
}

/// 기본 청커 생성
pub fn default_chunker() -> Box<dyn Chunker> {
    Box::new(ParagraphChunker::with_defaults())
}

// ============================================================================
// Chunk Synthesis
// ============================================================================

/// 파일 하나의 내용으로 지식 청크 생성
///
/// 결과는 항상 비어있지 않으며, ID는 `{file_id}-{n}` (n은 1부터) 형식입니다.
pub fn synthesize_chunks(
    file_name: &str,
    content: &str,
    file_id: &str,
    chunker: &dyn Chunker,
) -> Vec<KnowledgeChunk> {
    let mut pieces = chunker.chunk(content);
    if pieces.is_empty() {
        pieces.push(content.trim().to_string());
    }

    let keywords = chunk_keywords(file_name);

    pieces
        .into_iter()
        .enumerate()
        .map(|(i, piece)| KnowledgeChunk {
            id: format!("{}-{}", file_id, i + 1),
            file_id: file_id.to_string(),
            content: format!("Nội dung từ {}: {}", file_name, piece),
            metadata: ChunkMetadata {
                topic: DEFAULT_TOPIC.to_string(),
                keywords: keywords.clone(),
            },
        })
        .collect()
}

fn chunk_keywords(file_name: &str) -> BTreeSet<String> {
    let mut keywords: BTreeSet<String> = DEFAULT_KEYWORDS.iter().map(|k| k.to_string()).collect();

    if let Some(stem) = Path::new(file_name).file_stem().and_then(|s| s.to_str()) {
        let stem = stem.trim().to_lowercase();
        if !stem.is_empty() {
            keywords.insert(stem);
        }
    }

    keywords
}

// ============================================================================
// Tests
// ============================================================================

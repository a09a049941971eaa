//! 업로드 작업 타입
//!
//! 파일 선택 시 생성되어 0%에서 100%까지 진행되는 수집 작업입니다.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============================================================================
// File Kind
// ============================================================================

/// 업로드 파일 종류
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileKind {
    Pdf,
    Image,
    Docx,
}

impl FileKind {
    /// 파일 이름 접미사로 종류 결정
    ///
    /// 내용 검사는 하지 않습니다. `.pdf`와 이미지 확장자 외에는 모두 `Docx`입니다.
    /// `.pdf`는 대소문자를 구분하고, 이미지 확장자는 구분하지 않습니다.
    pub fn from_name(name: &str) -> Self {
        let lower = name.to_lowercase();
        if name.ends_with(".pdf") {
            FileKind::Pdf
        } else if [".jpg", ".jpeg", ".png"].iter().any(|ext| lower.ends_with(ext)) {
            FileKind::Image
        } else {
            FileKind::Docx
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            FileKind::Pdf => "PDF",
            FileKind::Image => "IMG",
            FileKind::Docx => "DOC",
        }
    }
}

// ============================================================================
// Upload Descriptor / Task
// ============================================================================

/// 업로드 소스가 넘겨주는 파일 정보
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadDescriptor {
    pub name: String,
    pub byte_size: u64,
    pub mime_type: String,
}

impl UploadDescriptor {
    pub fn new(name: impl Into<String>, byte_size: u64, mime_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            byte_size,
            mime_type: mime_type.into(),
        }
    }
}

/// 작업 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadStatus {
    Processing,
    /// 종료 상태
    Completed,
}

/// 업로드 작업
#[derive(Debug, Clone, Serialize)]
pub struct UploadTask {
    pub id: String,
    pub display_name: String,
    pub size_label: String,
    /// 0..=100
    pub progress: u8,
    pub status: UploadStatus,
    pub kind: FileKind,
    pub mime_type: String,
    /// 완료 시 저장소에 기록된 청크 수
    pub chunk_count: usize,
}

impl UploadTask {
    pub fn from_descriptor(descriptor: &UploadDescriptor) -> Self {
        Self {
            id: new_task_id(),
            display_name: descriptor.name.clone(),
            size_label: format_megabytes(descriptor.byte_size),
            progress: 0,
            status: UploadStatus::Processing,
            kind: FileKind::from_name(&descriptor.name),
            mime_type: descriptor.mime_type.clone(),
            chunk_count: 0,
        }
    }

    pub fn is_processing(&self) -> bool {
        self.status == UploadStatus::Processing
    }
}

/// 짧은 작업 ID (9자)
fn new_task_id() -> String {
    Uuid::new_v4().simple().to_string().chars().take(9).collect()
}

/// 바이트 크기를 MB 레이블로
fn format_megabytes(bytes: u64) -> String {
    format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
}

// ============================================================================
// Config
// ============================================================================

/// 수집 파이프라인 설정
#[derive(Debug, Clone)]
pub struct IngestConfig {
    /// 틱마다 증가하는 진행률 (0이면 종료하지 않으므로 거부됨)
    pub progress_step: u8,
    /// 틱 간격
    pub tick_interval: Duration,
    /// 모의 추출기가 돌려주는 자료 내용
    pub placeholder_content: String,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            progress_step: 10,
            tick_interval: Duration::from_millis(300),
            placeholder_content: "Nội dung tài liệu.".to_string(),
        }
    }
}

impl IngestConfig {
    /// 테스트/데모용 빠른 설정
    pub fn fast() -> Self {
        Self {
            progress_step: 25,
            tick_interval: Duration::from_millis(20),
            ..Default::default()
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_kind_from_name() {
        assert_eq!(FileKind::from_name("Chapter1.pdf"), FileKind::Pdf);
        assert_eq!(FileKind::from_name("map.PNG"), FileKind::Image);
        assert_eq!(FileKind::from_name("MAP.JPG"), FileKind::Image);
        // 대문자 PDF 접미사는 pdf로 보지 않음
        assert_eq!(FileKind::from_name("SCAN.PDF"), FileKind::Docx);
        assert_eq!(FileKind::from_name("Chapter1.Pdf"), FileKind::Docx);
        assert_eq!(FileKind::from_name("photo.jpeg"), FileKind::Image);
        assert_eq!(FileKind::from_name("notes.docx"), FileKind::Docx);
        // 접미사만 보므로 기타 형식은 docx로 분류
        assert_eq!(FileKind::from_name("scan.webp"), FileKind::Docx);
        assert_eq!(FileKind::from_name("README"), FileKind::Docx);
    }

    #[test]
    fn test_task_from_descriptor() {
        let task = UploadTask::from_descriptor(&UploadDescriptor::new(
            "Chapter1.pdf",
            1_572_864,
            "application/pdf",
        ));

        assert_eq!(task.id.len(), 9);
        assert_eq!(task.size_label, "1.5 MB");
        assert_eq!(task.progress, 0);
        assert_eq!(task.status, UploadStatus::Processing);
        assert_eq!(task.kind, FileKind::Pdf);
        assert!(task.is_processing());
    }

    #[test]
    fn test_task_ids_are_distinct() {
        let d = UploadDescriptor::new("a.pdf", 1, "application/pdf");
        let a = UploadTask::from_descriptor(&d);
        let b = UploadTask::from_descriptor(&d);
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_config_presets() {
        assert_eq!(IngestConfig::default().progress_step, 10);
        assert_eq!(IngestConfig::default().tick_interval, Duration::from_millis(300));
        assert_eq!(IngestConfig::fast().progress_step, 25);
    }
}

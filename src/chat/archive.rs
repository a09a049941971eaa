//! 보관함 (vault)
//!
//! 추적이 켜져 있으면 요청마다 최종 답변이 한 번 저장됩니다.
//! 영속 저장은 외부 협력자의 몫이고, 여기서는 프로세스 내 목록만 제공합니다.

use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 제목 최대 길이 (문자 수)
pub const MAX_TITLE_CHARS: usize = 100;

/// 보관 협력자 트레이트
pub trait Archive: Send + Sync {
    /// 제목과 본문 저장
    fn save(&self, title: &str, content: &str);
}

/// 100자를 넘는 제목은 잘라서 `...`를 붙임
pub fn truncate_title(title: &str) -> String {
    if title.chars().count() > MAX_TITLE_CHARS {
        let truncated: String = title.chars().take(MAX_TITLE_CHARS).collect();
        format!("{}...", truncated)
    } else {
        title.to_string()
    }
}

/// 보관 항목
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VaultEntry {
    pub id: String,
    pub title: String,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    /// 예: `"1.2 KB"`
    pub size_label: String,
}

impl VaultEntry {
    pub fn new(title: &str, content: &str) -> Self {
        Self {
            id: Uuid::new_v4().simple().to_string(),
            title: truncate_title(title),
            content: content.to_string(),
            timestamp: Utc::now(),
            size_label: format!("{:.1} KB", content.len() as f64 / 1024.0),
        }
    }
}

/// 인메모리 보관함 (최신 항목이 앞)
#[derive(Debug, Default)]
pub struct MemoryArchive {
    entries: Mutex<Vec<VaultEntry>>,
}

impl MemoryArchive {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<VaultEntry> {
        self.entries
            .lock()
            .map(|g| g.clone())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|g| g.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Archive for MemoryArchive {
    fn save(&self, title: &str, content: &str) {
        let entry = VaultEntry::new(title, content);
        tracing::info!("Saved vault entry: {} ({})", entry.title, entry.size_label);

        match self.entries.lock() {
            Ok(mut guard) => guard.insert(0, entry),
            Err(e) => tracing::warn!("Failed to save vault entry: {}", e),
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
    fn test_truncate_title() {
        assert_eq!(truncate_title("sông Mê Kông"), "sông Mê Kông");

        let exact = "ô".repeat(100);
        assert_eq!(truncate_title(&exact), exact);

        let long = "ô".repeat(101);
        let truncated = truncate_title(&long);
        assert!(truncated.ends_with("..."));
        assert_eq!(truncated.chars().count(), 103);
    }

    #[test]
    fn test_vault_entry_size_label() {
        let entry = VaultEntry::new("t", &"a".repeat(1536));
        assert_eq!(entry.size_label, "1.5 KB");
    }

    #[test]
    fn test_memory_archive_newest_first() {
        let archive = MemoryArchive::new();
        archive.save("first", "a");
        archive.save("second", "b");

        let entries = archive.entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].title, "second");
        assert_eq!(entries[1].content, "a");
    }
}

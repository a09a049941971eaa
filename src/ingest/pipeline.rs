//! 수집 파이프라인
//!
//! 업로드 작업을 고정 간격 틱으로 진행시키고, 진행률이 100에 도달하는
//! 순간 한 번만 청크를 생성해 지식 저장소에 기록합니다.
//!
//! 상태 전이:
//! - `Processing --(tick, +step)--> Processing`
//! - `Processing --(progress >= 100)--> Completed` (종료, 수집 1회 실행)

use std::sync::Arc;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use crate::knowledge::{default_chunker, synthesize_chunks, Chunker, KnowledgeStore};

use super::extractor::{ContentExtractor, IngestError, PlaceholderExtractor};
use super::task::{IngestConfig, UploadDescriptor, UploadStatus, UploadTask};

/// 백그라운드 구동용 공유 파이프라인
pub type SharedPipeline = Arc<Mutex<IngestionPipeline>>;

/// 틱 한 번의 결과
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    /// (작업 ID, 틱 이후 진행률)
    pub advanced: Vec<(String, u8)>,
    /// 이번 틱에서 완료된 작업 ID
    pub completed: Vec<String>,
    /// 이번 틱에서 저장소에 기록된 청크 수
    pub committed_chunks: usize,
}

impl TickReport {
    pub fn is_idle(&self) -> bool {
        self.advanced.is_empty()
    }
}

/// 수집 파이프라인
pub struct IngestionPipeline {
    config: IngestConfig,
    store: KnowledgeStore,
    extractor: Box<dyn ContentExtractor>,
    chunker: Box<dyn Chunker>,
    /// 최신 작업이 앞
    tasks: Vec<UploadTask>,
}

impl IngestionPipeline {
    /// 자리표시 추출기로 생성
    pub fn new(store: KnowledgeStore, config: IngestConfig) -> Result<Self, IngestError> {
        let extractor = PlaceholderExtractor::new(config.placeholder_content.clone());
        Self::with_extractor(store, config, Box::new(extractor))
    }

    /// 추출기를 지정하여 생성
    pub fn with_extractor(
        store: KnowledgeStore,
        config: IngestConfig,
        extractor: Box<dyn ContentExtractor>,
    ) -> Result<Self, IngestError> {
        if config.progress_step == 0 {
            return Err(IngestError::InvalidConfig(
                "progress_step must be greater than zero".to_string(),
            ));
        }
        if config.tick_interval.is_zero() {
            return Err(IngestError::InvalidConfig(
                "tick_interval must be greater than zero".to_string(),
            ));
        }

        Ok(Self {
            config,
            store,
            extractor,
            chunker: default_chunker(),
            tasks: Vec::new(),
        })
    }

    /// 업로드 작업 등록 (0%, Processing)
    pub fn enqueue(&mut self, descriptors: &[UploadDescriptor]) -> Vec<String> {
        let new_tasks: Vec<UploadTask> = descriptors.iter().map(UploadTask::from_descriptor).collect();
        let ids: Vec<String> = new_tasks.iter().map(|t| t.id.clone()).collect();

        for task in &new_tasks {
            tracing::info!(
                "Queued upload: {} [{}] ({}, id={})",
                task.display_name,
                task.kind.label(),
                task.size_label,
                task.id
            );
        }

        // 최신 작업이 앞에 오도록
        let mut tasks = new_tasks;
        tasks.append(&mut self.tasks);
        self.tasks = tasks;

        ids
    }

    /// 모든 진행 중 작업을 한 단계 진행
    ///
    /// 100에 도달한 작업은 이 틱에서 완료되고 수집이 정확히 한 번 실행됩니다.
    pub async fn tick(&mut self) -> TickReport {
        let mut report = TickReport::default();
        let step = self.config.progress_step;
        let mut finished: Vec<usize> = Vec::new();

        for (index, task) in self.tasks.iter_mut().enumerate() {
            if !task.is_processing() {
                continue;
            }

            let next = task.progress.saturating_add(step);
            if next >= 100 {
                task.progress = 100;
                task.status = UploadStatus::Completed;
                finished.push(index);
            } else {
                task.progress = next;
            }
            report.advanced.push((task.id.clone(), task.progress));
            tracing::debug!("Upload {} progress {}%", task.id, task.progress);
        }

        // 완료 전이가 일어난 작업만 수집
        for index in finished {
            let committed = self.ingest_completed(index).await;
            report.completed.push(self.tasks[index].id.clone());
            report.committed_chunks += committed;
        }

        report
    }

    /// 완료된 작업의 내용을 추출하고 청크를 기록
    async fn ingest_completed(&mut self, index: usize) -> usize {
        let task = self.tasks[index].clone();

        let content = match self.extractor.extract(&task).await {
            Ok(content) => content,
            Err(e) => {
                tracing::warn!("Ingestion of {} recorded no chunks: {}", task.display_name, e);
                return 0;
            }
        };

        let chunks = synthesize_chunks(&task.display_name, &content, &task.id, self.chunker.as_ref());
        match self.store.append(chunks) {
            Ok(count) => {
                self.tasks[index].chunk_count = count;
                tracing::info!(
                    "Ingested {} (id={}, chunks={})",
                    task.display_name,
                    task.id,
                    count
                );
                count
            }
            Err(e) => {
                tracing::warn!("Failed to commit chunks for {}: {}", task.display_name, e);
                0
            }
        }
    }

    /// 진행 중 작업이 없을 때까지 고정 간격으로 틱 실행
    pub async fn run_to_completion(&mut self) -> Vec<TickReport> {
        let period = self.config.tick_interval;
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut reports = Vec::new();
        while self.has_processing() {
            ticker.tick().await;
            reports.push(self.tick().await);
        }
        reports
    }

    /// 진행 중 작업의 평균 진행률 (반올림), 진행 중 작업이 없으면 `None`
    pub fn global_progress(&self) -> Option<u8> {
        let processing: Vec<u32> = self
            .tasks
            .iter()
            .filter(|t| t.is_processing())
            .map(|t| u32::from(t.progress))
            .collect();

        if processing.is_empty() {
            return None;
        }

        let sum: u32 = processing.iter().sum();
        let mean = (f64::from(sum) / processing.len() as f64).round();
        Some(mean as u8)
    }

    pub fn has_processing(&self) -> bool {
        self.tasks.iter().any(UploadTask::is_processing)
    }

    pub fn tasks(&self) -> &[UploadTask] {
        &self.tasks
    }

    pub fn task(&self, id: &str) -> Option<&UploadTask> {
        self.tasks.iter().find(|t| t.id == id)
    }

    /// 작업 목록에서 제거 (저장된 청크는 유지)
    pub fn remove(&mut self, id: &str) -> Option<UploadTask> {
        let index = self.tasks.iter().position(|t| t.id == id)?;
        Some(self.tasks.remove(index))
    }

    pub fn store(&self) -> &KnowledgeStore {
        &self.store
    }

    pub fn config(&self) -> &IngestConfig {
        &self.config
    }

    /// 공유 파이프라인으로 변환
    pub fn into_shared(self) -> SharedPipeline {
        Arc::new(Mutex::new(self))
    }
}

/// 공유 파이프라인을 백그라운드에서 계속 틱
///
/// 진행 중 작업이 없으면 틱을 건너뜁니다. 반환된 핸들을 abort하여 중지합니다.
pub fn spawn_driver(pipeline: SharedPipeline) -> JoinHandle<()> {
    tokio::spawn(async move {
        let period = pipeline.lock().await.config().tick_interval;
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            let mut guard = pipeline.lock().await;
            if guard.has_processing() {
                let report = guard.tick().await;
                if !report.completed.is_empty() {
                    tracing::debug!("Driver completed uploads: {:?}", report.completed);
                }
            }
        }
    })
}

// ============================================================================
// Tests
// ============================================================================

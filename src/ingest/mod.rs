//! 수집 모듈
//!
//! 업로드된 파일을 진행률 틱으로 처리하고, 완료 시점에 지식 청크를 생성합니다.
//! 실제 문서 파싱은 하지 않고 자리표시 내용을 사용합니다.

mod extractor;
mod pipeline;
mod task;

pub use extractor::{ContentExtractor, IngestError, PlaceholderExtractor};
pub use pipeline::{spawn_driver, IngestionPipeline, SharedPipeline, TickReport};
pub use task::{FileKind, IngestConfig, UploadDescriptor, UploadStatus, UploadTask};

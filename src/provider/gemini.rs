//! Gemini 생성 프로바이더
//!
//! source: https://ai.google.dev/gemini-api/docs/text-generation
//!
//! - 답변: `streamGenerateContent?alt=sse` SSE 스트림
//! - 인포그래픽: 이미지 모델 `generateContent`의 첫 `inlineData` 파트
//! - 출제 매트릭스: `responseMimeType: application/json` + `responseSchema`

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Context;
use async_trait::async_trait;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, Mutex};

use super::prompt;
use super::{
    get_api_key, GenerationError, GenerationProvider, InlineMedia, ProviderConfig, TextRequest,
    TextStream,
};
use crate::exam::{self, ExamProvider, MatrixTopic};

/// Gemini 모델 엔드포인트
const GEMINI_MODELS_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models";

/// Rate Limiter 설정
const RATE_LIMIT_RPM: u32 = 60;
const RATE_LIMIT_WINDOW: Duration = Duration::from_secs(60);
/// 호출 간 최소 딜레이
const MIN_DELAY_MS: u64 = 200;
/// 429 / 전송 오류 시 최대 재시도 횟수
const MAX_RETRIES: u32 = 3;
/// 재시도 시 초기 백오프 (ms)
const INITIAL_BACKOFF_MS: u64 = 2000;
/// 스트림 조각 채널 크기
const STREAM_BUFFER: usize = 64;
/// JSON 응답 MIME 타입
const JSON_MIME_TYPE: &str = "application/json";

// ============================================================================
// Rate Limiter
// ============================================================================

/// 최소 간격 + 분당 요청 수 제한
#[derive(Debug)]
struct RateLimiter {
    requests: Vec<Instant>,
    max_requests: u32,
    window: Duration,
    min_delay: Duration,
    last_request: Option<Instant>,
}

impl RateLimiter {
    fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            requests: Vec::new(),
            max_requests,
            window,
            min_delay: Duration::from_millis(MIN_DELAY_MS),
            last_request: None,
        }
    }

    async fn acquire(&mut self) {
        if let Some(last) = self.last_request {
            let elapsed = last.elapsed();
            if elapsed < self.min_delay {
                tokio::time::sleep(self.min_delay - elapsed).await;
            }
        }

        let now = Instant::now();
        self.requests.retain(|&t| now.duration_since(t) < self.window);

        if self.requests.len() >= self.max_requests as usize {
            if let Some(&oldest) = self.requests.first() {
                let wait_time = self.window.saturating_sub(now.duration_since(oldest));
                if !wait_time.is_zero() {
                    tracing::debug!("Rate limit reached, waiting {:?}", wait_time);
                    tokio::time::sleep(wait_time).await;
                }
                let now = Instant::now();
                self.requests.retain(|&t| now.duration_since(t) < self.window);
            }
        }

        let now = Instant::now();
        self.requests.push(now);
        self.last_request = Some(now);
    }
}

// ============================================================================
// GeminiProvider
// ============================================================================

/// Gemini 생성 프로바이더
#[derive(Debug)]
pub struct GeminiProvider {
    api_key: String,
    client: reqwest::Client,
    config: ProviderConfig,
    rate_limiter: Arc<Mutex<RateLimiter>>,
}

impl GeminiProvider {
    pub fn new(api_key: String, config: ProviderConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            api_key,
            client,
            config,
            rate_limiter: Arc::new(Mutex::new(RateLimiter::new(
                RATE_LIMIT_RPM,
                RATE_LIMIT_WINDOW,
            ))),
        })
    }

    /// 환경변수에서 API 키와 모델 설정 로드
    pub fn from_env() -> anyhow::Result<Self> {
        let api_key = get_api_key()?;
        Self::new(api_key, ProviderConfig::from_env())
    }

    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }

    /// 요청 전송 (429 / 전송 오류 시 지수 백오프 재시도)
    async fn send_with_retry(
        &self,
        url: &str,
        body: &GenerateRequest,
        timeout: Option<Duration>,
    ) -> Result<reqwest::Response, GenerationError> {
        let mut last_error = GenerationError::Network("no attempt made".to_string());

        for attempt in 0..=MAX_RETRIES {
            {
                let mut limiter = self.rate_limiter.lock().await;
                limiter.acquire().await;
            }

            let mut builder = self
                .client
                .post(url)
                .header("x-goog-api-key", &self.api_key)
                .json(body);
            if let Some(timeout) = timeout {
                builder = builder.timeout(timeout);
            }

            let backoff = Duration::from_millis(INITIAL_BACKOFF_MS * 2u64.pow(attempt));

            let response = match builder.send().await {
                Ok(resp) => resp,
                Err(e) => {
                    last_error = GenerationError::Network(e.to_string());
                    if attempt < MAX_RETRIES {
                        tracing::warn!(
                            "Request failed, retrying in {:?} (attempt {}/{})",
                            backoff,
                            attempt + 1,
                            MAX_RETRIES
                        );
                        tokio::time::sleep(backoff).await;
                        continue;
                    }
                    break;
                }
            };

            let status = response.status();
            if status.is_success() {
                return Ok(response);
            }

            if status.as_u16() == 429 {
                last_error = GenerationError::RateLimited;
                if attempt < MAX_RETRIES {
                    tracing::warn!(
                        "Rate limit hit (429), backing off {:?} (attempt {}/{})",
                        backoff,
                        attempt + 1,
                        MAX_RETRIES
                    );
                    tokio::time::sleep(backoff).await;
                    continue;
                }
                break;
            }

            let body = response.text().await.unwrap_or_default();
            return Err(api_error(status.as_u16(), &body));
        }

        Err(last_error)
    }

    fn text_request_body(request: &TextRequest) -> GenerateRequest {
        let mut parts = Vec::new();

        if let Some(block) = prompt::context_block(&request.context) {
            parts.push(Part::Text { text: block });
        }
        if let Some(ref image) = request.image {
            parts.push(Part::inline(image));
        }
        for file in &request.files {
            parts.push(Part::inline(file));
        }
        parts.push(Part::Text {
            text: prompt::question_block(&request.question),
        });

        GenerateRequest {
            contents: vec![Content { parts }],
            system_instruction: Some(Content {
                parts: vec![Part::Text {
                    text: prompt::system_prompt(request.progress, request.knowledge_loaded),
                }],
            }),
            generation_config: None,
        }
    }

    fn image_request_body(prompt_text: &str, context: &str) -> GenerateRequest {
        GenerateRequest {
            contents: vec![Content {
                parts: vec![Part::Text {
                    text: prompt::infographic_prompt(prompt_text, context),
                }],
            }],
            system_instruction: None,
            generation_config: Some(GenerationConfig {
                response_modalities: Some(vec!["TEXT".to_string(), "IMAGE".to_string()]),
                image_config: Some(ImageConfig {
                    aspect_ratio: "16:9".to_string(),
                    image_size: "1K".to_string(),
                }),
                ..Default::default()
            }),
        }
    }

    /// 매트릭스 JSON 응답 요청 (스키마 고정)
    fn matrix_request_body(parts: Vec<Part>) -> GenerateRequest {
        GenerateRequest {
            contents: vec![Content { parts }],
            system_instruction: None,
            generation_config: Some(GenerationConfig {
                response_mime_type: Some(JSON_MIME_TYPE.to_string()),
                response_schema: Some(exam::matrix_schema()),
                ..Default::default()
            }),
        }
    }

    fn exam_sets_request_body(prompt_text: String) -> GenerateRequest {
        GenerateRequest {
            contents: vec![Content {
                parts: vec![Part::Text { text: prompt_text }],
            }],
            system_instruction: None,
            generation_config: Some(GenerationConfig {
                thinking_config: Some(ThinkingConfig {
                    thinking_budget: exam::EXAM_THINKING_BUDGET,
                }),
                ..Default::default()
            }),
        }
    }

    /// 단일 `generateContent` 호출 후 첫 후보의 텍스트 반환
    async fn generate_text(
        &self,
        model: &str,
        body: &GenerateRequest,
    ) -> Result<String, GenerationError> {
        let url = format!("{}/{}:generateContent", GEMINI_MODELS_URL, model);

        tracing::debug!(model = %model, "Sending generateContent request");
        let response = self
            .send_with_retry(&url, body, Some(self.config.generate_timeout))
            .await?;

        let text = response
            .text()
            .await
            .map_err(|e| GenerationError::Network(e.to_string()))?;
        let parsed: GenerateResponse =
            serde_json::from_str(&text).map_err(|e| GenerationError::Parse(e.to_string()))?;

        Ok(response_text(parsed))
    }

    async fn generate_matrix(&self, parts: Vec<Part>) -> Result<Vec<MatrixTopic>, GenerationError> {
        let body = Self::matrix_request_body(parts);
        let text = self.generate_text(&self.config.text_model, &body).await?;
        exam::parse_matrix(&text)
    }
}

#[async_trait]
impl GenerationProvider for GeminiProvider {
    async fn stream_text(&self, request: TextRequest) -> Result<TextStream, GenerationError> {
        let url = format!(
            "{}/{}:streamGenerateContent?alt=sse",
            GEMINI_MODELS_URL, self.config.text_model
        );
        let body = Self::text_request_body(&request);

        tracing::debug!(model = %self.config.text_model, "Sending streaming request");
        let response = self.send_with_retry(&url, &body, None).await?;

        let (tx, rx) = mpsc::channel(STREAM_BUFFER);

        // SSE 바이트 스트림을 읽어 텍스트 조각으로 변환
        tokio::spawn(async move {
            let mut byte_stream = response.bytes_stream();
            let mut decoder = SseDecoder::default();

            while let Some(chunk) = byte_stream.next().await {
                let bytes = match chunk {
                    Ok(b) => b,
                    Err(e) => {
                        let _ = tx
                            .send(Err(GenerationError::StreamInterrupted(e.to_string())))
                            .await;
                        return;
                    }
                };

                for payload in decoder.push(&bytes) {
                    if !forward_payload(&tx, &payload).await {
                        return;
                    }
                }
            }

            // 줄바꿈 없이 끝난 마지막 이벤트
            if let Some(payload) = decoder.finish() {
                forward_payload(&tx, &payload).await;
            }
        });

        let stream = futures::stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|item| (item, rx))
        });

        Ok(stream.boxed())
    }

    async fn generate_image(
        &self,
        prompt_text: &str,
        context: &str,
    ) -> Result<Option<InlineMedia>, GenerationError> {
        let url = format!(
            "{}/{}:generateContent",
            GEMINI_MODELS_URL, self.config.image_model
        );
        let body = Self::image_request_body(prompt_text, context);

        tracing::debug!(model = %self.config.image_model, "Sending image request");
        let response = self
            .send_with_retry(&url, &body, Some(self.config.image_timeout))
            .await?;

        let text = response
            .text()
            .await
            .map_err(|e| GenerationError::Network(e.to_string()))?;
        let parsed: GenerateResponse =
            serde_json::from_str(&text).map_err(|e| GenerationError::Parse(e.to_string()))?;

        Ok(first_inline_image(parsed))
    }

    fn name(&self) -> &str {
        "gemini"
    }
}

#[async_trait]
impl ExamProvider for GeminiProvider {
    async fn exam_matrix(
        &self,
        topic: &str,
        grade: &str,
    ) -> Result<Vec<MatrixTopic>, GenerationError> {
        self.generate_matrix(vec![Part::Text {
            text: exam::matrix_prompt(topic, grade),
        }])
        .await
    }

    async fn extract_matrix_from_text(
        &self,
        text: &str,
    ) -> Result<Vec<MatrixTopic>, GenerationError> {
        self.generate_matrix(vec![Part::Text {
            text: exam::extract_text_prompt(text),
        }])
        .await
    }

    async fn extract_matrix_from_media(
        &self,
        media: &InlineMedia,
    ) -> Result<Vec<MatrixTopic>, GenerationError> {
        self.generate_matrix(vec![
            Part::inline(media),
            Part::Text {
                text: exam::EXTRACT_MEDIA_PROMPT.to_string(),
            },
        ])
        .await
    }

    async fn generate_exam_sets(
        &self,
        topics: &[MatrixTopic],
        topic_input: &str,
        grade: &str,
    ) -> Result<String, GenerationError> {
        let body = Self::exam_sets_request_body(exam::exam_sets_prompt(topics, topic_input, grade)?);
        self.generate_text(&self.config.exam_model, &body).await
    }
}

// ============================================================================
// SSE Decoding
// ============================================================================

/// SSE `data:` 줄 디코더
///
/// UTF-8 문자가 네트워크 청크 경계에서 잘려도 줄 단위로 모아서 디코딩합니다.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
}

impl SseDecoder {
    /// 바이트를 추가하고 완성된 `data:` 페이로드를 반환
    pub fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(bytes);

        let mut payloads = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            payloads.extend(data_payload(&line));
        }
        payloads
    }

    /// 스트림 종료 시 남은 줄 처리
    pub fn finish(&mut self) -> Option<String> {
        let line = std::mem::take(&mut self.buffer);
        data_payload(&line)
    }
}

fn data_payload(line: &[u8]) -> Option<String> {
    let line = String::from_utf8_lossy(line);
    let data = line.trim_end_matches(['\r', '\n']).strip_prefix("data:")?.trim();

    if data.is_empty() || data == "[DONE]" {
        None
    } else {
        Some(data.to_string())
    }
}

/// 페이로드 하나를 채널로 전달 (계속 읽어도 되면 `true`)
async fn forward_payload(
    tx: &mpsc::Sender<Result<String, GenerationError>>,
    payload: &str,
) -> bool {
    match parse_stream_payload(payload) {
        // 소비자가 스트림을 버리면 send 실패
        Ok(Some(fragment)) => tx.send(Ok(fragment)).await.is_ok(),
        Ok(None) => true,
        Err(e) => {
            let _ = tx.send(Err(e)).await;
            false
        }
    }
}

/// SSE 페이로드 하나에서 텍스트 조각 추출
fn parse_stream_payload(payload: &str) -> Result<Option<String>, GenerationError> {
    if let Ok(error) = serde_json::from_str::<GeminiError>(payload) {
        return Err(GenerationError::StreamInterrupted(format!(
            "{} {}",
            error.error.status, error.error.message
        )));
    }

    let response: GenerateResponse =
        serde_json::from_str(payload).map_err(|e| GenerationError::Parse(e.to_string()))?;

    let text = response_text(response);
    Ok(if text.is_empty() { None } else { Some(text) })
}

/// 첫 후보의 텍스트 파트 연결
fn response_text(response: GenerateResponse) -> String {
    response
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .map(|content| {
            content
                .parts
                .into_iter()
                .filter_map(|p| p.text)
                .collect::<String>()
        })
        .unwrap_or_default()
}

fn first_inline_image(response: GenerateResponse) -> Option<InlineMedia> {
    response
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .and_then(|content| content.parts.into_iter().find_map(|p| p.inline_data))
        .map(|d| InlineMedia::new(d.mime_type.unwrap_or_else(|| "image/png".to_string()), d.data))
}

fn api_error(status: u16, body: &str) -> GenerationError {
    match serde_json::from_str::<GeminiError>(body) {
        Ok(error) => GenerationError::Api {
            status,
            message: format!("{} {}", error.error.status, error.error.message)
                .trim()
                .to_string(),
        },
        Err(_) => GenerationError::Api {
            status,
            message: body.to_string(),
        },
    }
}

// ============================================================================
// API Types
// ============================================================================

#[derive(Debug, Serialize)]
struct GenerateRequest {
    contents: Vec<Content>,
    #[serde(rename = "systemInstruction", skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content>,
    #[serde(rename = "generationConfig", skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
}

#[derive(Debug, Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum Part {
    Text {
        text: String,
    },
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: InlineData,
    },
}

impl Part {
    fn inline(media: &InlineMedia) -> Self {
        Part::InlineData {
            inline_data: InlineData {
                mime_type: media.mime_type.clone(),
                data: media.data.clone(),
            },
        }
    }
}

#[derive(Debug, Serialize)]
struct InlineData {
    #[serde(rename = "mimeType")]
    mime_type: String,
    data: String,
}

#[derive(Debug, Default, Serialize)]
struct GenerationConfig {
    #[serde(rename = "responseModalities", skip_serializing_if = "Option::is_none")]
    response_modalities: Option<Vec<String>>,
    #[serde(rename = "imageConfig", skip_serializing_if = "Option::is_none")]
    image_config: Option<ImageConfig>,
    #[serde(rename = "responseMimeType", skip_serializing_if = "Option::is_none")]
    response_mime_type: Option<String>,
    #[serde(rename = "responseSchema", skip_serializing_if = "Option::is_none")]
    response_schema: Option<serde_json::Value>,
    #[serde(rename = "thinkingConfig", skip_serializing_if = "Option::is_none")]
    thinking_config: Option<ThinkingConfig>,
}

#[derive(Debug, Serialize)]
struct ThinkingConfig {
    #[serde(rename = "thinkingBudget")]
    thinking_budget: u32,
}

#[derive(Debug, Serialize)]
struct ImageConfig {
    #[serde(rename = "aspectRatio")]
    aspect_ratio: String,
    #[serde(rename = "imageSize")]
    image_size: String,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: Option<String>,
    #[serde(rename = "inlineData", default)]
    inline_data: Option<ResponseInlineData>,
}

#[derive(Debug, Deserialize)]
struct ResponseInlineData {
    #[serde(rename = "mimeType", default)]
    mime_type: Option<String>,
    data: String,
}

/// Gemini API 에러 응답
#[derive(Debug, Deserialize)]
struct GeminiError {
    error: GeminiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorDetail {
    message: String,
    #[serde(default)]
    status: String,
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sse_decoder_splits_lines() {
        let mut decoder = SseDecoder::default();
        let payloads = decoder.push(b"data: {\"a\":1}\n\ndata: {\"b\":2}\n");
        assert_eq!(payloads, vec!["{\"a\":1}", "{\"b\":2}"]);
    }

    #[test]
    fn test_sse_decoder_flushes_unterminated_tail() {
        let mut decoder = SseDecoder::default();
        let payloads = decoder.push(b"data: {\"a\":1}\n\ndata: {\"tail\":2}");
        assert_eq!(payloads, vec!["{\"a\":1}"]);

        assert_eq!(decoder.finish().as_deref(), Some("{\"tail\":2}"));
        // 버퍼가 비었으므로 다시 호출해도 없음
        assert_eq!(decoder.finish(), None);

        let mut decoder = SseDecoder::default();
        decoder.push(b"data: [DONE]");
        assert_eq!(decoder.finish(), None);
    }

    #[tokio::test]
    async fn test_forward_payload_stops_on_error() {
        let (tx, mut rx) = mpsc::channel(4);
        let ok = r#"{"candidates":[{"content":{"parts":[{"text":"Sông"}]}}]}"#;

        assert!(forward_payload(&tx, ok).await);
        assert!(!forward_payload(&tx, "not json").await);
        drop(tx);

        assert_eq!(rx.recv().await, Some(Ok("Sông".to_string())));
        assert!(matches!(rx.recv().await, Some(Err(GenerationError::Parse(_)))));
        assert_eq!(rx.recv().await, None);
    }

    #[test]
    fn test_sse_decoder_handles_split_utf8() {
        let line = "data: {\"text\":\"Sông Mê Kông\"}\n".as_bytes();
        // 'ô' 바이트 중간에서 자름
        let split = line.iter().position(|&b| b == 0xC3).unwrap() + 1;

        let mut decoder = SseDecoder::default();
        assert!(decoder.push(&line[..split]).is_empty());
        let payloads = decoder.push(&line[split..]);
        assert_eq!(payloads, vec!["{\"text\":\"Sông Mê Kông\"}"]);
    }

    #[test]
    fn test_parse_stream_payload_text() {
        let payload = r#"{"candidates":[{"content":{"parts":[{"text":"Sông "},{"text":"Mê Kông"}]}}]}"#;
        assert_eq!(
            parse_stream_payload(payload).unwrap().as_deref(),
            Some("Sông Mê Kông")
        );
    }

    #[test]
    fn test_parse_stream_payload_empty_and_error() {
        let payload = r#"{"candidates":[{"finishReason":"STOP"}]}"#;
        assert_eq!(parse_stream_payload(payload).unwrap(), None);

        let payload = r#"{"error":{"code":500,"message":"boom","status":"INTERNAL"}}"#;
        assert!(matches!(
            parse_stream_payload(payload),
            Err(GenerationError::StreamInterrupted(_))
        ));

        assert!(matches!(
            parse_stream_payload("not json"),
            Err(GenerationError::Parse(_))
        ));
    }

    #[test]
    fn test_first_inline_image() {
        let body = r#"{"candidates":[{"content":{"parts":[
            {"text":"Đây là infographic"},
            {"inlineData":{"mimeType":"image/png","data":"AAAA"}}
        ]}}]}"#;
        let parsed: GenerateResponse = serde_json::from_str(body).unwrap();
        assert_eq!(
            first_inline_image(parsed),
            Some(InlineMedia::new("image/png", "AAAA"))
        );

        let parsed: GenerateResponse =
            serde_json::from_str(r#"{"candidates":[{"content":{"parts":[{"text":"x"}]}}]}"#)
                .unwrap();
        assert_eq!(first_inline_image(parsed), None);
    }

    #[test]
    fn test_text_request_body_part_order() {
        let request = TextRequest {
            question: "sông Mê Kông".to_string(),
            context: "ngữ cảnh".to_string(),
            progress: None,
            knowledge_loaded: true,
            image: Some(InlineMedia::new("image/jpeg", "IMG")),
            files: vec![InlineMedia::new("application/pdf", "PDF")],
        };

        let body = serde_json::to_value(GeminiProvider::text_request_body(&request)).unwrap();
        let parts = body["contents"][0]["parts"].as_array().unwrap();

        assert_eq!(parts.len(), 4);
        assert_eq!(parts[0]["text"], "Ngữ cảnh học liệu bổ trợ:\nngữ cảnh");
        assert_eq!(parts[1]["inlineData"]["mimeType"], "image/jpeg");
        assert_eq!(parts[2]["inlineData"]["data"], "PDF");
        assert_eq!(parts[3]["text"], "Câu hỏi: sông Mê Kông");
        assert!(body["systemInstruction"]["parts"][0]["text"]
            .as_str()
            .unwrap()
            .contains("Đã sẵn sàng"));
        assert!(body.get("generationConfig").is_none());
    }

    #[test]
    fn test_text_request_body_without_context() {
        let request = TextRequest {
            question: "sông Mê Kông".to_string(),
            ..Default::default()
        };
        let body = serde_json::to_value(GeminiProvider::text_request_body(&request)).unwrap();
        let parts = body["contents"][0]["parts"].as_array().unwrap();
        assert_eq!(parts.len(), 1);
    }

    #[test]
    fn test_api_error_parsing() {
        let err = api_error(
            403,
            r#"{"error":{"code":403,"message":"denied","status":"PERMISSION_DENIED"}}"#,
        );
        assert_eq!(
            err,
            GenerationError::Api {
                status: 403,
                message: "PERMISSION_DENIED denied".to_string()
            }
        );

        let err = api_error(502, "gateway");
        assert_eq!(
            err,
            GenerationError::Api {
                status: 502,
                message: "gateway".to_string()
            }
        );
    }

    #[test]
    fn test_matrix_response_parses_into_topics() {
        // responseMimeType이 JSON이면 텍스트 파트 자체가 JSON 문자열
        let body = r#"{"candidates":[{"content":{"role":"model","parts":[{"text":"[{\"name\":\"Dân cư Việt Nam\",\"subject\":\"Địa lí\",\"questionType\":\"Trắc nghiệm\",\"quantity\":4,\"levels\":{\"remember\":2,\"understand\":1,\"apply\":1,\"highApply\":0}}]"}]},"finishReason":"STOP"}]}"#;
        let parsed: GenerateResponse = serde_json::from_str(body).unwrap();

        let topics = exam::parse_matrix(&response_text(parsed)).unwrap();
        assert_eq!(topics.len(), 1);
        assert_eq!(topics[0].name, "Dân cư Việt Nam");
        assert_eq!(topics[0].question_type, "Trắc nghiệm");
        assert_eq!(topics[0].levels.remember, 2);
        assert_eq!(topics[0].levels.total(), topics[0].quantity);
    }

    #[test]
    fn test_matrix_request_body_requests_json_schema() {
        let body = GeminiProvider::matrix_request_body(vec![Part::Text {
            text: exam::matrix_prompt("Dân cư", "Lớp 9"),
        }]);
        let body = serde_json::to_value(body).unwrap();

        let config = &body["generationConfig"];
        assert_eq!(config["responseMimeType"], "application/json");
        assert_eq!(config["responseSchema"]["type"], "ARRAY");
        assert!(config.get("imageConfig").is_none());
        assert!(body.get("systemInstruction").is_none());
        assert_eq!(
            body["contents"][0]["parts"][0]["text"],
            "Ma trận đề thi Địa lí: \"Dân cư\", Lớp 9. Trả về JSON."
        );
    }

    #[test]
    fn test_exam_sets_request_body_sets_thinking_budget() {
        let body = serde_json::to_value(GeminiProvider::exam_sets_request_body("đề".to_string()))
            .unwrap();
        assert_eq!(
            body["generationConfig"]["thinkingConfig"]["thinkingBudget"],
            exam::EXAM_THINKING_BUDGET
        );
        assert!(body["generationConfig"].get("responseMimeType").is_none());
    }

    #[test]
    fn test_image_request_body_config() {
        let body = serde_json::to_value(GeminiProvider::image_request_body("q", "ctx")).unwrap();
        let config = &body["generationConfig"];
        assert_eq!(config["imageConfig"]["aspectRatio"], "16:9");
        assert_eq!(config["responseModalities"][1], "IMAGE");
        assert!(config.get("responseSchema").is_none());
    }

    #[tokio::test]
    async fn test_rate_limiter_min_delay() {
        let mut limiter = RateLimiter::new(100, Duration::from_secs(60));
        let start = Instant::now();
        limiter.acquire().await;
        limiter.acquire().await;
        assert!(start.elapsed() >= Duration::from_millis(MIN_DELAY_MS));
    }
}

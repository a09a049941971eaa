//! 프롬프트 구성
//!
//! 프로바이더와 무관한 프롬프트 문구와 대체 규칙입니다.

/// 학습 도우미 시스템 지시문
pub const ASSISTANT_INSTRUCTION: &str = r#"VAI TRÒ:
Bạn là "Địa AI" – trợ lý học liệu số thông minh chuyên biệt về Địa lí THCS.

KHẢ NĂNG THỊ GIÁC & OCR:
- Khi người dùng chụp ảnh hoặc tải tệp (bản đồ, biểu đồ, trang sách):
  1. Trích xuất toàn bộ văn bản, số liệu.
  2. Nhận diện ký hiệu, màu sắc trên bản đồ, xu hướng của các đường biểu đồ.
  3. Kết hợp dữ liệu hình ảnh với nội dung học liệu đã nạp để trả lời chính xác nhất.

QUY TẮC PHẢN HỒI:
1. Ưu tiên giải thích dữ liệu từ hình ảnh nếu có.
2. Ngôn ngữ: Ngắn gọn, trực quan, phù hợp trình độ học sinh.
3. Nếu hình ảnh mờ hoặc thiếu thông tin, hãy yêu cầu người dùng chụp lại góc gần hơn.
4. Trình bày: Sử dụng bảng dữ liệu hoặc danh sách để làm rõ các con số."#;

/// 질문 없이 이미지만 첨부된 경우의 질문
pub const IMAGE_FALLBACK_QUESTION: &str = "Hãy phân tích hình ảnh này dựa trên kiến thức địa lí.";

/// 질문 없이 파일만 첨부된 경우의 질문
pub const FILES_FALLBACK_QUESTION: &str = "Phân tích nội dung các tệp này.";

/// 이미지 생성 시 질문이 비었을 때의 프롬프트
pub const IMAGE_PROMPT_FALLBACK: &str = "Giải thích ảnh chụp địa lí này.";

/// 이미지 생성 시 근거 자료가 비었을 때의 자료
pub const IMAGE_CONTEXT_FALLBACK: &str = "Dữ liệu bản đồ học.";

/// 인포그래픽 모서리에 넣는 저자 서명
pub const AUTHOR_SIGNATURE: &str = "Th.s PVT THCS Hồng Hà, Ô Diên, Hà Nội";

/// 수집 진행 상황 안내 문구
///
/// - 진행률 < 100: 적재 중 안내
/// - 진행률 100, 또는 진행 중 작업 없이 지식이 있으면: 준비 완료 안내
pub fn background_line(progress: Option<u8>, knowledge_loaded: bool) -> Option<String> {
    match progress {
        Some(p) if p < 100 => Some(format!("[Hệ thống]: Đang nạp học liệu ({}%).", p)),
        Some(_) => Some(ready_line()),
        None if knowledge_loaded => Some(ready_line()),
        None => None,
    }
}

fn ready_line() -> String {
    "[Hệ thống]: Đã sẵn sàng nạp tri thức từ ảnh/tài liệu.".to_string()
}

/// 시스템 지시문 + 진행 상황 안내
pub fn system_prompt(progress: Option<u8>, knowledge_loaded: bool) -> String {
    match background_line(progress, knowledge_loaded) {
        Some(line) => format!("{}\n{}", ASSISTANT_INSTRUCTION, line),
        None => ASSISTANT_INSTRUCTION.to_string(),
    }
}

/// 실제로 보낼 질문
///
/// 질문이 비어 있으면 이미지 → 파일 순서로 대체 질문을 사용합니다.
/// 첨부도 없으면 빈 질문 그대로 돌려줍니다.
pub fn effective_question(query: &str, has_image: bool, file_count: usize) -> String {
    if !query.is_empty() {
        query.to_string()
    } else if has_image {
        IMAGE_FALLBACK_QUESTION.to_string()
    } else if file_count > 0 {
        FILES_FALLBACK_QUESTION.to_string()
    } else {
        String::new()
    }
}

/// 근거 자료 블록 (자료가 없으면 `None`)
pub fn context_block(context: &str) -> Option<String> {
    if context.is_empty() {
        None
    } else {
        Some(format!("Ngữ cảnh học liệu bổ trợ:\n{}", context))
    }
}

/// 질문 블록
pub fn question_block(question: &str) -> String {
    format!("Câu hỏi: {}", question)
}

/// 인포그래픽 생성 프롬프트
pub fn infographic_prompt(query: &str, knowledge: &str) -> String {
    format!(
        r#"Bạn là một chuyên gia đồ họa bản đồ học (Cartographic Architect).
Hãy tạo một infographic chất lượng cao giải thích về: "{}".
Dữ liệu nền tảng: "{}".

YÊU CẦU BẢN ĐỒ & THIẾT KẾ:
- Thể hiện ĐẦY ĐỦ và CHÍNH XÁC chủ quyền biển đảo Việt Nam.
- Nhãn quần đảo: "Đặc khu Hoàng Sa" và "Đặc khu Trường Sa".
- QUY TẮC NHÃN: TUYỆT ĐỐI KHÔNG vẽ khung nền hay box bao quanh các dòng chữ nhãn đảo. Chữ viết trực tiếp lên nền bản đồ một cách thanh thoát.
- MÀU SẮC: Màu chữ của "Đặc khu Hoàng Sa" và "Đặc khu Trường Sa" phải CÙNG MÀU với màu chữ tiêu đề chính của infographic để đảm bảo sự đồng nhất.
- CHỮ KÝ TÁC GIẢ: Ghi rõ dòng chữ "{}" ở một góc trang trọng và tinh tế (thay thế cho bất kỳ chữ ký kỹ thuật nào khác).
- PHONG CÁCH: Khoa học, nét vẽ hài hòa, không phô trương, bố cục rõ ràng, chuyên nghiệp.
- Ngôn ngữ: Tiếng Việt."#,
        query, knowledge, AUTHOR_SIGNATURE
    )
}

// ============================================================================
// Tests
// ============================================================================

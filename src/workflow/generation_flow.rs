//! 出题流程 - 流程层
//!
//! 每个方法选择一组提示词和 schema，交给 `LlmService`，
//! 再把解析出的 JSON 转成题目类型。流程之间不共享状态。
//!
//! 图片识别不经过结构化输出，直接单次调用视觉模型。

use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::Deserialize;
use serde_json::Value as JsonValue;
use tracing::{error, info};

use crate::clients::{ChatBackend, ChatRequest};
use crate::config::Config;
use crate::error::{AppResult, LlmError, ValidationError};
use crate::logger::truncate_text;
use crate::models::{QuestionKind, QuestionSpec, RefineOutcome, RefinementContext};
use crate::services::llm_service::{GenerationRequest, LlmService, WorkflowKind};
use crate::services::{prompts, SchemaKind};

/// PDF 出题数量上限
pub const MAX_PDF_COUNT: u32 = 20;
/// 相似题数量上限
pub const MAX_SIMILAR_COUNT: u32 = 10;

const DEFAULT_CHANGES_MADE: &str = "Question refined successfully";

#[derive(Debug, Deserialize)]
struct QuestionBatch {
    /// 缺失或为 null 时视为空列表
    #[serde(default)]
    questions: Option<Vec<QuestionSpec>>,
}

#[derive(Debug, Deserialize)]
struct RefinementReply {
    refined_question: QuestionSpec,
    #[serde(default)]
    changes_made: Option<String>,
}

/// 出题流程
pub struct GenerationFlow {
    llm_service: LlmService,
    backend: Arc<dyn ChatBackend>,
    vision_model_name: String,
    vision_max_tokens: u32,
    max_retries: u32,
    similarity_language: Option<String>,
}

impl GenerationFlow {
    /// 创建新的出题流程
    pub fn new(config: &Config, backend: Arc<dyn ChatBackend>) -> Self {
        Self {
            llm_service: LlmService::new(config, backend.clone()),
            backend,
            vision_model_name: config.vision_model_name.clone(),
            vision_max_tokens: config.vision_max_tokens,
            max_retries: config.max_retries,
            similarity_language: config.similarity_language.clone(),
        }
    }

    /// 替换结构化输出服务（用于切换校验模式）
    pub fn with_llm_service(mut self, llm_service: LlmService) -> Self {
        self.llm_service = llm_service;
        self
    }

    /// 根据文本（PDF 提取结果）出题
    ///
    /// 模型没有返回 `questions` 时得到空列表。
    pub async fn generate_from_text(
        &self,
        text: &str,
        kind: QuestionKind,
        count: u32,
    ) -> AppResult<Vec<QuestionSpec>> {
        if text.trim().is_empty() {
            return Err(ValidationError::Empty { field: "text" }.into());
        }
        check_count(count, MAX_PDF_COUNT)?;

        info!("📄 根据文本生成 {} 道 {} 题 (原文 {} 字符)", count, kind, text.chars().count());

        let request = GenerationRequest::new(
            WorkflowKind::PdfGeneration,
            prompts::pdf_generation(count, kind),
            prompts::pdf_user_message(count, kind, text),
            SchemaKind::for_question_kind(kind),
        )
        .with_max_retries(self.max_retries);

        let value = self.llm_service.call(&request).await?;
        decode_questions(value)
    }

    /// 生成相似题，始终为选择题
    pub async fn generate_similar(&self, original: &str, count: u32) -> AppResult<Vec<QuestionSpec>> {
        if original.trim().is_empty() {
            return Err(ValidationError::Empty {
                field: "question_text",
            }
            .into());
        }
        check_count(count, MAX_SIMILAR_COUNT)?;

        info!("🔁 生成 {} 道相似题，原题: {}", count, truncate_text(original, 80));

        let request = GenerationRequest::new(
            WorkflowKind::SimilarGeneration,
            prompts::similarity_generation(count),
            prompts::similarity_user_message(original, count, self.similarity_language.as_deref()),
            SchemaKind::Mcq,
        )
        .with_max_retries(self.max_retries);

        let value = self.llm_service.call(&request).await?;
        decode_questions(value)
    }

    /// 按自然语言指令修改题目
    ///
    /// 缺少 `refined_question` 直接报错，不重试。
    pub async fn refine(&self, ctx: &RefinementContext) -> AppResult<RefineOutcome> {
        if ctx.instruction.trim().is_empty() {
            return Err(ValidationError::Empty {
                field: "refinement_prompt",
            }
            .into());
        }
        if is_empty_question(&ctx.current_question) {
            return Err(ValidationError::Empty {
                field: "current_question",
            }
            .into());
        }

        info!("✏️ 修改题目，指令: {}", truncate_text(&ctx.instruction, 80));

        let current = serde_json::to_string_pretty(&ctx.current_question).unwrap_or_default();
        let request = GenerationRequest::new(
            WorkflowKind::Refinement,
            prompts::refinement(&current, &ctx.instruction, &prompts::render_history(&ctx.history)),
            prompts::refinement_user_message(&ctx.instruction),
            SchemaKind::Refinement,
        )
        .with_max_retries(self.max_retries);

        let value = self.llm_service.call(&request).await?;
        decode_refinement(value)
    }

    /// 从图片中提取题目文本
    ///
    /// 单次调用，不重试，返回模型的原始文本。
    pub async fn extract_question_from_image(&self, image: &[u8]) -> AppResult<String> {
        if image.is_empty() {
            return Err(ValidationError::Empty { field: "image" }.into());
        }

        info!("🖼️ 从图片中提取题目 ({} 字节)", image.len());

        let request = ChatRequest {
            model: self.vision_model_name.clone(),
            system_message: None,
            user_message: prompts::OCR_ANALYSIS_PROMPT.to_string(),
            images: vec![image_data_url(image)],
            temperature: None,
            max_tokens: self.vision_max_tokens,
        };

        match self.backend.complete(request).await {
            Ok(text) => {
                info!("✓ 图片识别完成，得到 {} 字符", text.chars().count());
                Ok(text)
            }
            Err(e) => {
                error!("❌ 图片识别失败: {}", e);
                Err(LlmError::ExtractionFailed {
                    source: Box::new(e),
                }
                .into())
            }
        }
    }
}

fn check_count(count: u32, max: u32) -> Result<(), ValidationError> {
    if count == 0 || count > max {
        return Err(ValidationError::CountOutOfRange {
            count: i64::from(count),
            min: 1,
            max,
        });
    }
    Ok(())
}

fn is_empty_question(question: &JsonValue) -> bool {
    match question {
        JsonValue::Null => true,
        JsonValue::Object(map) => map.is_empty(),
        _ => false,
    }
}

fn decode_questions(value: JsonValue) -> AppResult<Vec<QuestionSpec>> {
    let batch: QuestionBatch = serde_json::from_value(value).map_err(|source| LlmError::Decode {
        target: "题目列表",
        source,
    })?;
    let questions = batch.questions.unwrap_or_default();
    info!("✓ 解析得到 {} 道题目", questions.len());
    Ok(questions)
}

fn decode_refinement(value: JsonValue) -> AppResult<RefineOutcome> {
    if value.get("refined_question").map_or(true, JsonValue::is_null) {
        return Err(LlmError::MissingField {
            field: "refined_question",
        }
        .into());
    }
    let reply: RefinementReply = serde_json::from_value(value).map_err(|source| LlmError::Decode {
        target: "修改后的题目",
        source,
    })?;
    Ok(RefineOutcome {
        refined_question: reply.refined_question,
        changes_made: reply
            .changes_made
            .unwrap_or_else(|| DEFAULT_CHANGES_MADE.to_string()),
    })
}

/// 图片转 data URL（PNG 按文件头识别，其余按 JPEG）
fn image_data_url(image: &[u8]) -> String {
    const PNG_MAGIC: &[u8] = b"\x89PNG\r\n\x1a\n";
    let mime = if image.starts_with(PNG_MAGIC) {
        "image/png"
    } else {
        "image/jpeg"
    };
    format!("data:{};base64,{}", mime, STANDARD.encode(image))
}

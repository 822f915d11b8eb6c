//! LLM 服务 - 结构化输出
//!
//! 只负责"拿到一个合法 JSON"这一件事：
//! - 把 schema 拼进系统提示词
//! - 解析回复为 JSON
//! - 解析失败或调用失败时立即重发同一请求，最多 `max_retries` 次
//!
//! 默认不校验字段是否符合 schema，严格模式见 [`ValidationMode::Strict`]。

use std::fmt;
use std::sync::Arc;

use serde_json::Value as JsonValue;
use tracing::{debug, error, info, warn};

use crate::clients::{ChatBackend, ChatRequest};
use crate::config::Config;
use crate::error::{AppResult, LlmError, ValidationError};
use crate::services::schemas::SchemaKind;

/// 默认最大尝试次数
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// 流程类型（仅用于日志）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkflowKind {
    PdfGeneration,
    SimilarGeneration,
    Refinement,
    /// 直接调用，不经过具体流程
    Direct,
}

impl fmt::Display for WorkflowKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            WorkflowKind::PdfGeneration => "pdf",
            WorkflowKind::SimilarGeneration => "similar",
            WorkflowKind::Refinement => "refine",
            WorkflowKind::Direct => "direct",
        };
        f.write_str(name)
    }
}

/// 一次结构化调用的描述，调用结束即丢弃
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub workflow: WorkflowKind,
    pub system_prompt: String,
    pub user_message: String,
    pub schema: SchemaKind,
    pub max_retries: u32,
}

impl GenerationRequest {
    pub fn new(
        workflow: WorkflowKind,
        system_prompt: impl Into<String>,
        user_message: impl Into<String>,
        schema: SchemaKind,
    ) -> Self {
        Self {
            workflow,
            system_prompt: system_prompt.into(),
            user_message: user_message.into(),
            schema,
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    fn validate(&self) -> Result<(), ValidationError> {
        if self.system_prompt.trim().is_empty() {
            return Err(ValidationError::Empty {
                field: "system_prompt",
            });
        }
        if self.user_message.trim().is_empty() {
            return Err(ValidationError::Empty {
                field: "user_message",
            });
        }
        if self.max_retries == 0 {
            return Err(ValidationError::InvalidRetryBudget(self.max_retries));
        }
        Ok(())
    }
}

/// 输出校验模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ValidationMode {
    /// 只要求是合法 JSON
    #[default]
    SyntaxOnly,
    /// 额外按 schema 校验，并要求选择题答案出现在选项中
    Strict,
}

/// 结构化输出服务
///
/// 只持有构造时读取的只读配置，可在并发请求间共享。
pub struct LlmService {
    backend: Arc<dyn ChatBackend>,
    model_name: String,
    temperature: f32,
    max_tokens: u32,
    validation: ValidationMode,
}

impl LlmService {
    /// 创建新的 LLM 服务
    pub fn new(config: &Config, backend: Arc<dyn ChatBackend>) -> Self {
        Self {
            backend,
            model_name: config.llm_model_name.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            validation: if config.strict_schema_validation {
                ValidationMode::Strict
            } else {
                ValidationMode::SyntaxOnly
            },
        }
    }

    pub fn with_validation(mut self, validation: ValidationMode) -> Self {
        self.validation = validation;
        self
    }

    /// 按 schema 调用模型并返回解析后的 JSON
    pub async fn call_with_schema(
        &self,
        system_prompt: &str,
        user_message: &str,
        schema: SchemaKind,
        max_retries: u32,
    ) -> AppResult<JsonValue> {
        let request = GenerationRequest::new(WorkflowKind::Direct, system_prompt, user_message, schema)
            .with_max_retries(max_retries);
        self.call(&request).await
    }

    /// 执行一次结构化调用
    ///
    /// - 解析失败：非最后一次则重试，最后一次返回 `MalformedOutput`
    /// - 调用失败：非最后一次则重试，最后一次原样返回底层错误
    pub async fn call(&self, request: &GenerationRequest) -> AppResult<JsonValue> {
        request.validate()?;

        let chat_request = ChatRequest {
            model: self.model_name.clone(),
            system_message: Some(augment_prompt(&request.system_prompt, request.schema)),
            user_message: request.user_message.clone(),
            images: Vec::new(),
            temperature: Some(self.temperature),
            max_tokens: self.max_tokens,
        };

        let max = request.max_retries;
        let mut attempt = 0;
        loop {
            attempt += 1;
            let is_last = attempt == max;
            debug!("[{}] 第 {}/{} 次调用，schema: {}", request.workflow, attempt, max, request.schema.name());

            let content = match self.backend.complete(chat_request.clone()).await {
                Ok(content) => content,
                Err(e) => {
                    error!("[{}] ❌ 第 {}/{} 次调用失败: {}", request.workflow, attempt, max, e);
                    if is_last {
                        return Err(e.into());
                    }
                    continue;
                }
            };

            let value = match serde_json::from_str::<JsonValue>(&content) {
                Ok(value) => value,
                Err(e) => {
                    warn!("[{}] ⚠️ 第 {}/{} 次返回不是合法 JSON: {}", request.workflow, attempt, max, e);
                    if is_last {
                        return Err(LlmError::MalformedOutput {
                            attempts: attempt,
                            source: e,
                        }
                        .into());
                    }
                    continue;
                }
            };

            if self.validation == ValidationMode::Strict {
                if let Err(reason) = check_conformance(request.schema, &value) {
                    warn!("[{}] ⚠️ 第 {}/{} 次返回不符合 schema: {}", request.workflow, attempt, max, reason);
                    if is_last {
                        return Err(LlmError::SchemaViolation {
                            attempts: attempt,
                            reason,
                        }
                        .into());
                    }
                    continue;
                }
            }

            info!("[{}] ✓ 第 {}/{} 次获得结构化输出", request.workflow, attempt, max);
            return Ok(value);
        }
    }
}

/// 在系统提示词后附加 schema 和"只输出 JSON"的要求
pub fn augment_prompt(system_prompt: &str, schema: SchemaKind) -> String {
    format!(
        "{}\n\nYou MUST respond with valid JSON that matches this exact schema:\n{}\n\nDo not include any text before or after the JSON object.",
        system_prompt,
        schema.pretty()
    )
}

/// 严格模式校验：JSON Schema + 选择题答案必须是某个选项
fn check_conformance(schema: SchemaKind, value: &JsonValue) -> Result<(), String> {
    let validator = jsonschema::Validator::new(schema.document())
        .map_err(|e| format!("schema 编译失败: {}", e))?;
    if let Err(e) = validator.validate(value) {
        return Err(format!("{} (位置: {})", e, e.instance_path()));
    }

    let mut questions: Vec<&JsonValue> = Vec::new();
    match schema {
        SchemaKind::Mcq => {
            if let Some(items) = value.get("questions").and_then(JsonValue::as_array) {
                questions.extend(items.iter());
            }
        }
        SchemaKind::Refinement => {
            if let Some(q) = value.get("refined_question") {
                if q.get("type").and_then(JsonValue::as_str) == Some("mcq") {
                    questions.push(q);
                }
            }
        }
        SchemaKind::OpenEnded => {}
    }

    for q in questions {
        let Some(options) = q.get("options").and_then(JsonValue::as_array) else {
            continue;
        };
        let Some(answer) = q.get("correct_answer") else {
            continue;
        };
        if !options.contains(answer) {
            let id = q.get("id").and_then(JsonValue::as_str).unwrap_or("?");
            return Err(format!("题目 {} 的 correct_answer 不在 options 中", id));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{AppError, LlmResult};
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use serde_json::json;

    /// 按顺序返回预设回复的后端
    struct Scripted {
        replies: Mutex<Vec<LlmResult<String>>>,
        calls: Mutex<Vec<ChatRequest>>,
    }

    impl Scripted {
        fn new(mut replies: Vec<LlmResult<String>>) -> Arc<Self> {
            replies.reverse();
            Arc::new(Self {
                replies: Mutex::new(replies),
                calls: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> usize {
            self.calls.lock().len()
        }
    }

    #[async_trait]
    impl ChatBackend for Scripted {
        async fn complete(&self, request: ChatRequest) -> LlmResult<String> {
            self.calls.lock().push(request);
            self.replies
                .lock()
                .pop()
                .unwrap_or_else(|| Ok("not json".to_string()))
        }
    }

    fn service(backend: Arc<Scripted>) -> LlmService {
        LlmService::new(&Config::default(), backend)
    }

    fn transport_error() -> LlmError {
        LlmError::transport(
            "test-model",
            std::io::Error::new(std::io::ErrorKind::ConnectionReset, "connection reset"),
        )
    }

    #[tokio::test]
    async fn test_first_attempt_success() {
        let backend = Scripted::new(vec![Ok(r#"{"questions": []}"#.to_string())]);
        let value = service(backend.clone())
            .call_with_schema("system", "user", SchemaKind::Mcq, 3)
            .await
            .unwrap();

        assert_eq!(value, json!({"questions": []}));
        assert_eq!(backend.calls(), 1);
    }

    #[tokio::test]
    async fn test_schema_embedded_in_system_prompt() {
        let backend = Scripted::new(vec![Ok("{}".to_string())]);
        service(backend.clone())
            .call_with_schema("Be helpful.", "user", SchemaKind::OpenEnded, 1)
            .await
            .unwrap();

        let calls = backend.calls.lock();
        let system = calls[0].system_message.as_deref().unwrap();
        assert!(system.starts_with("Be helpful.\n\nYou MUST respond with valid JSON"));
        assert!(system.contains("\"sample_answer\""));
        assert!(system.ends_with("Do not include any text before or after the JSON object."));
        assert_eq!(calls[0].temperature, Some(0.7));
        assert_eq!(calls[0].max_tokens, 4096);
    }

    #[tokio::test]
    async fn test_malformed_every_attempt() {
        for n in 1..=4 {
            let backend = Scripted::new(Vec::new());
            let err = service(backend.clone())
                .call_with_schema("system", "user", SchemaKind::Mcq, n)
                .await
                .unwrap_err();

            assert!(matches!(
                err,
                AppError::Llm(LlmError::MalformedOutput { attempts, .. }) if attempts == n
            ));
            assert_eq!(backend.calls(), n as usize);
        }
    }

    #[tokio::test]
    async fn test_success_after_malformed_attempts() {
        let backend = Scripted::new(vec![
            Ok("```json".to_string()),
            Ok("Sure! Here you go".to_string()),
            Ok(r#"{"ok": true}"#.to_string()),
        ]);
        let value = service(backend.clone())
            .call_with_schema("system", "user", SchemaKind::Mcq, 3)
            .await
            .unwrap();

        assert_eq!(value["ok"], true);
        assert_eq!(backend.calls(), 3);
    }

    #[tokio::test]
    async fn test_transport_error_retried_then_reraised() {
        let backend = Scripted::new(vec![Err(transport_error()), Ok("{}".to_string())]);
        assert!(service(backend.clone())
            .call_with_schema("system", "user", SchemaKind::Mcq, 3)
            .await
            .is_ok());
        assert_eq!(backend.calls(), 2);

        let backend = Scripted::new(vec![
            Ok("broken".to_string()),
            Err(transport_error()),
        ]);
        let err = service(backend.clone())
            .call_with_schema("system", "user", SchemaKind::Mcq, 2)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Llm(LlmError::Transport { .. })));
        assert!(err.to_string().contains("connection reset"));
    }

    #[tokio::test]
    async fn test_invalid_input_rejected_before_call() {
        let backend = Scripted::new(Vec::new());
        let svc = service(backend.clone());

        let err = svc
            .call_with_schema("  ", "user", SchemaKind::Mcq, 3)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(ValidationError::Empty { .. })));

        let err = svc
            .call_with_schema("system", "user", SchemaKind::Mcq, 0)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AppError::Validation(ValidationError::InvalidRetryBudget(0))
        ));
        assert_eq!(backend.calls(), 0);
    }

    #[tokio::test]
    async fn test_default_mode_accepts_nonconforming_json() {
        let backend = Scripted::new(vec![Ok(r#"{"unexpected": 1}"#.to_string())]);
        let value = service(backend.clone())
            .call_with_schema("system", "user", SchemaKind::Mcq, 3)
            .await
            .unwrap();
        assert_eq!(value["unexpected"], 1);
        assert_eq!(backend.calls(), 1);
    }

    #[tokio::test]
    async fn test_strict_mode_retries_on_violation() {
        let bad = json!({"questions": [{
            "id": "q1", "type": "mcq", "question_text": "?",
            "options": ["A", "B"], "correct_answer": "C",
            "explanation": "", "confidence_score": 0.5
        }]});
        let good = json!({"questions": [{
            "id": "q1", "type": "mcq", "question_text": "?",
            "options": ["A", "B"], "correct_answer": "B",
            "explanation": "", "confidence_score": 0.5
        }]});
        let backend = Scripted::new(vec![
            Ok(r#"{"items": []}"#.to_string()),
            Ok(bad.to_string()),
            Ok(good.to_string()),
        ]);
        let value = service(backend.clone())
            .with_validation(ValidationMode::Strict)
            .call_with_schema("system", "user", SchemaKind::Mcq, 3)
            .await
            .unwrap();
        assert_eq!(value, good);
        assert_eq!(backend.calls(), 3);
    }

    #[tokio::test]
    async fn test_strict_mode_final_violation() {
        let backend = Scripted::new(vec![Ok(r#"{"refined_question": {}}"#.to_string())]);
        let err = service(backend)
            .with_validation(ValidationMode::Strict)
            .call_with_schema("system", "user", SchemaKind::Refinement, 1)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AppError::Llm(LlmError::SchemaViolation { attempts: 1, .. })
        ));
    }
}

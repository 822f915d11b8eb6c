//! LLM API 客户端
//!
//! 封装与 OpenAI 兼容接口（默认 OpenRouter）的单次聊天调用。
//! 上层只依赖 `ChatBackend` trait，测试中可替换为脚本化的实现。

use async_openai::{
    config::OpenAIConfig,
    types::chat::{
        ChatCompletionRequestMessage, ChatCompletionRequestMessageContentPartImage,
        ChatCompletionRequestMessageContentPartText, ChatCompletionRequestSystemMessageArgs,
        ChatCompletionRequestUserMessageArgs, ChatCompletionRequestUserMessageContent,
        ChatCompletionRequestUserMessageContentPart, CreateChatCompletionRequestArgs, ImageDetail,
        ImageUrl,
    },
    Client,
};
use async_trait::async_trait;
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::{LlmError, LlmResult};

/// 一次聊天请求
#[derive(Debug, Clone, PartialEq)]
pub struct ChatRequest {
    pub model: String,
    pub system_message: Option<String>,
    pub user_message: String,
    /// 图片 URL（可以是 data URL）
    pub images: Vec<String>,
    pub temperature: Option<f32>,
    pub max_tokens: u32,
}

/// 模型调用后端
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// 发送一次请求，返回第一条回复的文本内容
    async fn complete(&self, request: ChatRequest) -> LlmResult<String>;
}

/// 基于 `async-openai` 的后端
pub struct LlmClient {
    client: Client<OpenAIConfig>,
}

impl LlmClient {
    /// 创建新的 LLM 客户端
    pub fn new(config: &Config) -> Self {
        let openai_config = OpenAIConfig::new()
            .with_api_key(&config.llm_api_key)
            .with_api_base(&config.llm_api_base_url);

        Self {
            client: Client::with_config(openai_config),
        }
    }

    fn build_messages(request: &ChatRequest) -> LlmResult<Vec<ChatCompletionRequestMessage>> {
        let model = request.model.as_str();
        let mut messages = Vec::new();

        if let Some(sys_msg) = &request.system_message {
            let system_msg = ChatCompletionRequestSystemMessageArgs::default()
                .content(sys_msg.as_str())
                .build()
                .map_err(|e| LlmError::transport(model, e))?;
            messages.push(ChatCompletionRequestMessage::System(system_msg));
        }

        let user_msg = if request.images.is_empty() {
            ChatCompletionRequestUserMessageArgs::default()
                .content(request.user_message.as_str())
                .build()
        } else {
            // Vision：文本 + 图片
            let mut content_parts = vec![ChatCompletionRequestUserMessageContentPart::Text(
                ChatCompletionRequestMessageContentPartText {
                    text: request.user_message.clone(),
                },
            )];
            for url in &request.images {
                content_parts.push(ChatCompletionRequestUserMessageContentPart::ImageUrl(
                    ChatCompletionRequestMessageContentPartImage {
                        image_url: ImageUrl {
                            url: url.clone(),
                            detail: Some(ImageDetail::Auto),
                        },
                    },
                ));
            }
            ChatCompletionRequestUserMessageArgs::default()
                .content(ChatCompletionRequestUserMessageContent::Array(content_parts))
                .build()
        }
        .map_err(|e| LlmError::transport(model, e))?;

        messages.push(ChatCompletionRequestMessage::User(user_msg));
        Ok(messages)
    }
}

#[async_trait]
impl ChatBackend for LlmClient {
    async fn complete(&self, request: ChatRequest) -> LlmResult<String> {
        debug!("调用 LLM API，模型: {}", request.model);
        debug!("用户消息长度: {} 字符", request.user_message.len());

        let messages = Self::build_messages(&request)?;

        let mut builder = CreateChatCompletionRequestArgs::default();
        builder
            .model(request.model.as_str())
            .messages(messages)
            .max_tokens(request.max_tokens);
        if let Some(temperature) = request.temperature {
            builder.temperature(temperature);
        }
        let chat_request = builder
            .build()
            .map_err(|e| LlmError::transport(&request.model, e))?;

        let response = self.client.chat().create(chat_request).await.map_err(|e| {
            warn!("LLM API 调用失败: {}", e);
            LlmError::transport(&request.model, e)
        })?;

        debug!("LLM API 调用成功");

        let content = response
            .choices
            .first()
            .and_then(|choice| choice.message.content.clone())
            .ok_or_else(|| LlmError::EmptyContent {
                model: request.model.clone(),
            })?;

        Ok(content.trim().to_string())
    }
}

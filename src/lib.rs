//! # Question Forge
//!
//! 基于大模型的出题服务：从 PDF 文本出题、按原题生成相似题、按指令修改题目
//!
//! ## 架构设计
//!
//! 本系统采用分层架构：
//!
//! ### ① 基础设施层（Infrastructure / Clients）
//! - `clients/` - 持有模型连接，只暴露"发一次对话请求"的能力
//! - `infrastructure/` - 持有 SQLite 连接，只暴露会话与题目的读写能力
//!
//! ### ② 业务能力层（Services）
//! - `services/` - 描述"我能做什么"
//! - `SchemaKind` / `prompts` - 输出结构与提示词
//! - `LlmService` - 结构化输出（schema 注入 + 解析 + 重试）
//! - `PdfService` - PDF 文本提取
//! - `ImageStore` - 保存题目图片
//!
//! ### ③ 流程层（Workflow）
//! - `workflow/` - 一次出题请求的完整流程
//! - `GenerationFlow` - PDF 出题 / 相似题 / 修改题目 / 图片识别
//!
//! ### ④ 接口层（API）
//! - `api/` - warp 路由、参数校验、落库和错误响应
//! - `App` - 组装各层并启动服务
//!
//! ## 模块结构

pub mod api;
pub mod app;
pub mod clients;
pub mod config;
pub mod error;
pub mod infrastructure;
pub mod logger;
pub mod models;
pub mod services;
pub mod workflow;

// 重新导出常用类型
pub use app::App;
pub use clients::{ChatBackend, ChatRequest, LlmClient};
pub use config::Config;
pub use error::{AppError, AppResult, LlmError, ValidationError};
pub use infrastructure::QuestionStore;
pub use models::{QuestionKind, QuestionSpec, RefineOutcome, RefinementContext};
pub use services::{LlmService, SchemaKind};
pub use workflow::GenerationFlow;

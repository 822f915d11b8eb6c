//! 请求与响应结构

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::models::{QuestionSpec, RefinementTurn};

pub const DEFAULT_PDF_COUNT: i64 = 5;
pub const DEFAULT_SIMILAR_COUNT: i64 = 3;
pub const DEFAULT_HISTORY_LIMIT: usize = 20;

fn default_similar_count() -> i64 {
    DEFAULT_SIMILAR_COUNT
}

fn default_history_limit() -> usize {
    DEFAULT_HISTORY_LIMIT
}

/// 相似题请求，文本和图片二选一（图片优先）
#[derive(Debug, Clone, Deserialize)]
pub struct GenerateSimilarRequest {
    #[serde(default)]
    pub question_text: Option<String>,
    #[serde(default)]
    pub image_base64: Option<String>,
    #[serde(default = "default_similar_count")]
    pub count: i64,
}

/// 修改题目请求
#[derive(Debug, Clone, Deserialize)]
pub struct RefineQuestionRequest {
    pub question_id: String,
    #[serde(default)]
    pub current_question: JsonValue,
    pub refinement_prompt: String,
    #[serde(default)]
    pub conversation_history: Vec<RefinementTurn>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HistoryQuery {
    #[serde(default = "default_history_limit")]
    pub limit: usize,
    #[serde(default)]
    pub session_type: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct GenerateQuestionsResponse {
    pub questions: Vec<QuestionSpec>,
    pub total_count: usize,
}

impl From<Vec<QuestionSpec>> for GenerateQuestionsResponse {
    fn from(questions: Vec<QuestionSpec>) -> Self {
        Self {
            total_count: questions.len(),
            questions,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RefineQuestionResponse {
    pub refined_question: QuestionSpec,
    pub changes_made: String,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}

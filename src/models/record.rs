//! 持久化记录
//!
//! 会话（一次生成调用）与其下的题目

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::models::question::QuestionSpec;

/// 会话类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionType {
    Pdf,
    Similar,
    Refinement,
}

impl SessionType {
    pub fn as_str(self) -> &'static str {
        match self {
            SessionType::Pdf => "pdf",
            SessionType::Similar => "similar",
            SessionType::Refinement => "refinement",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pdf" => Some(SessionType::Pdf),
            "similar" => Some(SessionType::Similar),
            "refinement" => Some(SessionType::Refinement),
            _ => None,
        }
    }
}

/// 新建会话参数
#[derive(Debug, Clone)]
pub struct NewSession {
    pub session_type: SessionType,
    pub source_file: Option<String>,
    pub source_text: Option<String>,
    pub config: Option<JsonValue>,
}

impl NewSession {
    pub fn new(session_type: SessionType) -> Self {
        Self {
            session_type,
            source_file: None,
            source_text: None,
            config: None,
        }
    }

    pub fn source_file(mut self, file: impl Into<String>) -> Self {
        self.source_file = Some(file.into());
        self
    }

    pub fn source_text(mut self, text: impl Into<String>) -> Self {
        self.source_text = Some(text.into());
        self
    }

    pub fn config(mut self, config: JsonValue) -> Self {
        self.config = Some(config);
        self
    }
}

/// 会话摘要
#[derive(Debug, Clone, Serialize)]
pub struct SessionRecord {
    pub id: i64,
    pub session_type: String,
    pub created_at: DateTime<Utc>,
    pub source_file: Option<String>,
    pub source_text: Option<String>,
    pub config: Option<JsonValue>,
    pub question_count: usize,
}

/// 会话详情（含题目）
#[derive(Debug, Clone, Serialize)]
pub struct SessionDetail {
    #[serde(flatten)]
    pub session: SessionRecord,
    pub questions: Vec<QuestionView>,
}

/// 待写入的题目行
///
/// 不校验 `correct_answer` 是否在 `options` 中。
#[derive(Debug, Clone, PartialEq)]
pub struct NewQuestion {
    pub question_type: String,
    pub question_text: String,
    pub explanation: String,
    pub difficulty: Option<String>,
    pub confidence_score: Option<f64>,
    pub options: Option<Vec<String>>,
    pub correct_answer: Option<String>,
    pub sample_answer: Option<String>,
    pub image_url: Option<String>,
}

impl From<&QuestionSpec> for NewQuestion {
    fn from(spec: &QuestionSpec) -> Self {
        let mut row = NewQuestion {
            question_type: spec.kind().as_str().to_string(),
            question_text: spec.question_text().to_string(),
            explanation: spec.explanation().to_string(),
            difficulty: Some(spec.difficulty().as_str().to_string()),
            confidence_score: spec.confidence_score(),
            options: None,
            correct_answer: None,
            sample_answer: None,
            image_url: spec.image_url().map(str::to_string),
        };
        match spec {
            QuestionSpec::Mcq(q) => {
                row.options = Some(q.options.clone());
                row.correct_answer = Some(q.correct_answer.clone());
            }
            QuestionSpec::OpenEnded(q) => {
                row.sample_answer = Some(q.sample_answer.clone());
            }
        }
        row
    }
}

/// 已保存的题目
#[derive(Debug, Clone, PartialEq)]
pub struct QuestionRecord {
    pub id: i64,
    pub session_id: i64,
    pub question_type: String,
    pub question_text: String,
    pub explanation: String,
    pub difficulty: Option<String>,
    pub confidence_score: Option<f64>,
    pub options: Option<Vec<String>>,
    pub correct_answer: Option<String>,
    pub sample_answer: Option<String>,
    pub image_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// 对外返回的题目视图
///
/// 选择题只带 options/correct_answer，开放题只带 sample_answer。
#[derive(Debug, Clone, Serialize)]
pub struct QuestionView {
    pub id: i64,
    pub question_type: String,
    pub question_text: String,
    pub explanation: String,
    pub difficulty: Option<String>,
    pub confidence_score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correct_answer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sample_answer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

impl From<&QuestionRecord> for QuestionView {
    fn from(record: &QuestionRecord) -> Self {
        let is_mcq = record.question_type == "mcq";
        Self {
            id: record.id,
            question_type: record.question_type.clone(),
            question_text: record.question_text.clone(),
            explanation: record.explanation.clone(),
            difficulty: record.difficulty.clone(),
            confidence_score: record.confidence_score,
            options: if is_mcq { record.options.clone() } else { None },
            correct_answer: if is_mcq { record.correct_answer.clone() } else { None },
            sample_answer: if is_mcq { None } else { record.sample_answer.clone() },
            image_url: record.image_url.clone(),
        }
    }
}

/// 手动编辑题目（只覆盖文本类字段）
#[derive(Debug, Clone, Default, Deserialize)]
pub struct QuestionUpdate {
    pub question_text: Option<String>,
    pub explanation: Option<String>,
    pub options: Option<Vec<String>>,
    pub correct_answer: Option<String>,
    pub sample_answer: Option<String>,
}

/// 使用统计
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Statistics {
    pub total_sessions: i64,
    pub total_questions: i64,
    pub recent_sessions_7d: i64,
}

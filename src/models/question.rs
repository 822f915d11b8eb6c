//! 题目数据结构
//!
//! 模型返回的 JSON 在通过语法检查后立即解析为这里的类型。

use std::fmt;
use std::str::FromStr;

use serde::de::Error as DeError;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value as JsonValue;

use crate::error::ValidationError;

/// 题目类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionKind {
    /// 选择题
    Mcq,
    /// 开放题
    OpenEnded,
}

impl QuestionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            QuestionKind::Mcq => "mcq",
            QuestionKind::OpenEnded => "open_ended",
        }
    }

    /// 写入提示词的可读名称
    pub fn label(self) -> &'static str {
        match self {
            QuestionKind::Mcq => "Multiple Choice Questions (MCQ)",
            QuestionKind::OpenEnded => "Open-Ended Questions",
        }
    }
}

impl FromStr for QuestionKind {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "mcq" => Ok(QuestionKind::Mcq),
            "open_ended" => Ok(QuestionKind::OpenEnded),
            other => Err(ValidationError::UnsupportedQuestionKind(other.to_string())),
        }
    }
}

impl fmt::Display for QuestionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 难度
///
/// 解析时不区分大小写，无法识别的取值（包括 null）按默认难度处理。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    #[default]
    Medium,
    Hard,
}

impl Difficulty {
    pub fn as_str(self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        }
    }
}

impl FromStr for Difficulty {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "easy" => Ok(Difficulty::Easy),
            "medium" => Ok(Difficulty::Medium),
            "hard" => Ok(Difficulty::Hard),
            _ => Err(ValidationError::InvalidField {
                field: "difficulty",
                reason: format!("未知难度 '{}'", s),
            }),
        }
    }
}

impl<'de> Deserialize<'de> for Difficulty {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = JsonValue::deserialize(deserializer)?;
        Ok(raw
            .as_str()
            .and_then(|s| s.parse().ok())
            .unwrap_or_default())
    }
}

/// 题目 ID 可能是字符串，也可能是历史记录里的数字 ID
fn string_or_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    match JsonValue::deserialize(deserializer)? {
        JsonValue::String(s) => Ok(s),
        JsonValue::Number(n) => Ok(n.to_string()),
        other => Err(<D::Error as DeError>::custom(format!(
            "id 应为字符串或数字，实际为 {}",
            other
        ))),
    }
}

/// 选择题
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct McqQuestion {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    pub question_text: String,
    /// 选项（2~6 个，有序）
    pub options: Vec<String>,
    /// 正确答案，应与某个选项完全一致（默认不校验）
    pub correct_answer: String,
    pub explanation: String,
    #[serde(default)]
    pub difficulty: Difficulty,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence_score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

impl McqQuestion {
    /// 正确答案是否出现在选项中
    pub fn answer_in_options(&self) -> bool {
        self.options.iter().any(|o| o == &self.correct_answer)
    }
}

/// 开放题
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenEndedQuestion {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    pub question_text: String,
    pub sample_answer: String,
    pub explanation: String,
    #[serde(default)]
    pub difficulty: Difficulty,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence_score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

/// 生成的题目，按 `type` 字段区分
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum QuestionSpec {
    Mcq(McqQuestion),
    OpenEnded(OpenEndedQuestion),
}

impl QuestionSpec {
    pub fn kind(&self) -> QuestionKind {
        match self {
            QuestionSpec::Mcq(_) => QuestionKind::Mcq,
            QuestionSpec::OpenEnded(_) => QuestionKind::OpenEnded,
        }
    }

    pub fn id(&self) -> &str {
        match self {
            QuestionSpec::Mcq(q) => &q.id,
            QuestionSpec::OpenEnded(q) => &q.id,
        }
    }

    pub fn question_text(&self) -> &str {
        match self {
            QuestionSpec::Mcq(q) => &q.question_text,
            QuestionSpec::OpenEnded(q) => &q.question_text,
        }
    }

    pub fn explanation(&self) -> &str {
        match self {
            QuestionSpec::Mcq(q) => &q.explanation,
            QuestionSpec::OpenEnded(q) => &q.explanation,
        }
    }

    pub fn difficulty(&self) -> Difficulty {
        match self {
            QuestionSpec::Mcq(q) => q.difficulty,
            QuestionSpec::OpenEnded(q) => q.difficulty,
        }
    }

    pub fn confidence_score(&self) -> Option<f64> {
        match self {
            QuestionSpec::Mcq(q) => q.confidence_score,
            QuestionSpec::OpenEnded(q) => q.confidence_score,
        }
    }

    pub fn image_url(&self) -> Option<&str> {
        match self {
            QuestionSpec::Mcq(q) => q.image_url.as_deref(),
            QuestionSpec::OpenEnded(q) => q.image_url.as_deref(),
        }
    }

    /// 附加原图地址（相似题批次共用同一张图）
    pub fn with_image_url(mut self, url: impl Into<String>) -> Self {
        let url = Some(url.into());
        match &mut self {
            QuestionSpec::Mcq(q) => q.image_url = url,
            QuestionSpec::OpenEnded(q) => q.image_url = url,
        }
        self
    }
}

/// 一轮历史修改记录
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RefinementTurn {
    /// 用户指令
    #[serde(rename = "user", default)]
    pub instruction: String,
    /// 助手回复摘要
    #[serde(rename = "assistant", default)]
    pub response: String,
}

/// 修改题目的上下文
///
/// `current_question` 可能被用户手动编辑过，不保证符合 schema，
/// 因此保持为原始 JSON。
#[derive(Debug, Clone)]
pub struct RefinementContext {
    pub current_question: JsonValue,
    pub instruction: String,
    pub history: Vec<RefinementTurn>,
}

impl RefinementContext {
    pub fn new(current_question: JsonValue, instruction: impl Into<String>) -> Self {
        Self {
            current_question,
            instruction: instruction.into(),
            history: Vec::new(),
        }
    }

    pub fn with_history(mut self, history: Vec<RefinementTurn>) -> Self {
        self.history = history;
        self
    }
}

/// 修改结果
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RefineOutcome {
    pub refined_question: QuestionSpec,
    pub changes_made: String,
}

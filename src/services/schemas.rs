//! 结构化输出 schema
//!
//! 三种模型回复的 JSON Schema。默认只作为提示词的一部分交给模型，
//! 严格模式下才用于校验。

use once_cell::sync::Lazy;
use serde_json::{json, Value as JsonValue};

use crate::models::QuestionKind;

/// schema 种类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SchemaKind {
    Mcq,
    OpenEnded,
    Refinement,
}

impl SchemaKind {
    /// 按题目类型选择生成用的 schema
    pub fn for_question_kind(kind: QuestionKind) -> Self {
        match kind {
            QuestionKind::Mcq => SchemaKind::Mcq,
            QuestionKind::OpenEnded => SchemaKind::OpenEnded,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            SchemaKind::Mcq => "mcq",
            SchemaKind::OpenEnded => "open_ended",
            SchemaKind::Refinement => "refinement",
        }
    }

    pub fn document(self) -> &'static JsonValue {
        match self {
            SchemaKind::Mcq => &MCQ_SCHEMA,
            SchemaKind::OpenEnded => &OPEN_ENDED_SCHEMA,
            SchemaKind::Refinement => &REFINEMENT_SCHEMA,
        }
    }

    /// 缩进格式的 schema 文本，用于拼接提示词
    pub fn pretty(self) -> String {
        serde_json::to_string_pretty(self.document()).unwrap_or_default()
    }
}

static MCQ_SCHEMA: Lazy<JsonValue> = Lazy::new(|| {
    json!({
        "type": "object",
        "properties": {
            "questions": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "id": {"type": "string"},
                        "type": {"type": "string", "enum": ["mcq"]},
                        "question_text": {"type": "string"},
                        "options": {
                            "type": "array",
                            "items": {"type": "string"},
                            "minItems": 2,
                            "maxItems": 6
                        },
                        "correct_answer": {"type": "string"},
                        "explanation": {"type": "string"},
                        "difficulty": {"type": "string", "enum": ["easy", "medium", "hard"]},
                        "topic": {"type": "string"},
                        "confidence_score": {"type": "number", "minimum": 0, "maximum": 1},
                        "image_url": {"type": "string"}
                    },
                    "required": ["id", "type", "question_text", "options", "correct_answer", "explanation", "confidence_score"]
                }
            }
        },
        "required": ["questions"]
    })
});

static OPEN_ENDED_SCHEMA: Lazy<JsonValue> = Lazy::new(|| {
    json!({
        "type": "object",
        "properties": {
            "questions": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "id": {"type": "string"},
                        "type": {"type": "string", "enum": ["open_ended"]},
                        "question_text": {"type": "string"},
                        "sample_answer": {"type": "string"},
                        "explanation": {"type": "string"},
                        "difficulty": {"type": "string", "enum": ["easy", "medium", "hard"]},
                        "topic": {"type": "string"},
                        "confidence_score": {"type": "number", "minimum": 0, "maximum": 1},
                        "image_url": {"type": "string"}
                    },
                    "required": ["id", "type", "question_text", "sample_answer", "explanation", "confidence_score"]
                }
            }
        },
        "required": ["questions"]
    })
});

static REFINEMENT_SCHEMA: Lazy<JsonValue> = Lazy::new(|| {
    json!({
        "type": "object",
        "properties": {
            "refined_question": {
                "type": "object",
                "properties": {
                    "id": {"type": "string"},
                    "type": {"type": "string"},
                    "question_text": {"type": "string"},
                    "options": {"type": "array", "items": {"type": "string"}},
                    "correct_answer": {"type": "string"},
                    "sample_answer": {"type": "string"},
                    "explanation": {"type": "string"},
                    "difficulty": {"type": "string"},
                    "topic": {"type": "string"}
                },
                "required": ["id", "type", "question_text", "explanation"]
            },
            "changes_made": {"type": "string"}
        },
        "required": ["refined_question", "changes_made"]
    })
});

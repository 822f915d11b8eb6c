//! 测试用的模型后端和样例数据

#![allow(dead_code)]

use std::sync::Arc;

use async_trait::async_trait;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};
use parking_lot::Mutex;
use serde_json::{json, Value as JsonValue};

use question_forge::error::LlmResult;
use question_forge::{ChatBackend, ChatRequest, LlmError};

/// 按顺序返回预设回复的后端，记录每次请求
pub struct ScriptedBackend {
    replies: Mutex<Vec<LlmResult<String>>>,
    fallback: fn() -> LlmResult<String>,
    requests: Mutex<Vec<ChatRequest>>,
}

impl ScriptedBackend {
    pub fn new(replies: Vec<LlmResult<String>>) -> Arc<Self> {
        Self::with_fallback(replies, || Ok("not json".to_string()))
    }

    /// 预设回复用完后一直返回 `fallback`
    pub fn with_fallback(
        mut replies: Vec<LlmResult<String>>,
        fallback: fn() -> LlmResult<String>,
    ) -> Arc<Self> {
        replies.reverse();
        Arc::new(Self {
            replies: Mutex::new(replies),
            fallback,
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().len()
    }

    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl ChatBackend for ScriptedBackend {
    async fn complete(&self, request: ChatRequest) -> LlmResult<String> {
        self.requests.lock().push(request);
        let next = self.replies.lock().pop();
        next.unwrap_or_else(self.fallback)
    }
}

pub fn auth_error() -> LlmResult<String> {
    Err(LlmError::transport(
        "test-model",
        std::io::Error::new(
            std::io::ErrorKind::PermissionDenied,
            "Incorrect API key provided (invalid_api_key)",
        ),
    ))
}

pub fn mcq_json(id: &str, correct_answer: &str) -> JsonValue {
    json!({
        "id": id,
        "type": "mcq",
        "question_text": format!("Question {}?", id),
        "options": ["A", "B", "C", "D"],
        "correct_answer": correct_answer,
        "explanation": "Because of the text.",
        "difficulty": "medium",
        "topic": "general",
        "confidence_score": 0.9
    })
}

pub fn open_ended_json(id: &str) -> JsonValue {
    json!({
        "id": id,
        "type": "open_ended",
        "question_text": format!("Explain {}.", id),
        "sample_answer": "A thorough answer.",
        "explanation": "Grading criteria.",
        "difficulty": "hard",
        "confidence_score": 0.8
    })
}

pub fn mcq_batch(count: usize) -> String {
    let questions: Vec<JsonValue> = (1..=count)
        .map(|i| mcq_json(&format!("q{}", i), "A"))
        .collect();
    json!({ "questions": questions }).to_string()
}

pub fn open_ended_batch(count: usize) -> String {
    let questions: Vec<JsonValue> = (1..=count)
        .map(|i| open_ended_json(&format!("q{}", i)))
        .collect();
    json!({ "questions": questions }).to_string()
}

/// 150 字符左右的原文
pub fn source_text() -> String {
    "Photosynthesis is the process by which green plants use sunlight, water and carbon \
     dioxide to produce glucose and oxygen inside their chloroplasts."
        .to_string()
}

/// 生成一份简单的 PDF，每页按行写入文本，空切片表示空白页
pub fn sample_pdf(pages: &[&[&str]]) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
        "Encoding" => "WinAnsiEncoding",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });

    let mut kids = Vec::new();
    for lines in pages {
        let mut operations = Vec::new();
        if lines.is_empty() {
            operations.push(Operation::new("BT", vec![]));
            operations.push(Operation::new("ET", vec![]));
        }
        for (i, line) in lines.iter().enumerate() {
            operations.push(Operation::new("BT", vec![]));
            operations.push(Operation::new("Tf", vec!["F1".into(), 12.into()]));
            operations.push(Operation::new(
                "Td",
                vec![50.into(), (750 - 20 * i as i64).into()],
            ));
            operations.push(Operation::new("Tj", vec![Object::string_literal(*line)]));
            operations.push(Operation::new("ET", vec![]));
        }
        let content = Content { operations };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "Resources" => resources_id,
        });
        kids.push(Object::from(page_id));
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
            "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).unwrap();
    bytes
}

/// 两页正文夹一页空白，正文超过 100 个字符
pub fn lecture_pdf() -> Vec<u8> {
    sample_pdf(&[
        &[
            "Photosynthesis converts light energy into chemical energy.",
            "It takes place inside the chloroplasts of green plants.",
        ],
        &[],
        &["The light reactions produce ATP and NADPH for the Calvin cycle."],
    ])
}

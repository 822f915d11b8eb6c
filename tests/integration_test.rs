mod common;

use common::{
    lecture_pdf, mcq_batch, mcq_json, open_ended_batch, sample_pdf, source_text, ScriptedBackend,
};
use serde_json::json;

use question_forge::error::{AppError, LlmError, PdfError, ValidationError};
use question_forge::models::{RefinementTurn, SessionType};
use question_forge::services::{LlmService, PdfService};
use question_forge::{
    logger, Config, GenerationFlow, QuestionKind, QuestionSpec, QuestionStore, RefinementContext,
    SchemaKind,
};

fn flow(backend: std::sync::Arc<ScriptedBackend>) -> GenerationFlow {
    GenerationFlow::new(&Config::default(), backend)
}

#[tokio::test]
async fn test_generate_mcq_from_text() {
    let backend = ScriptedBackend::new(vec![Ok(mcq_batch(2))]);
    let questions = flow(backend.clone())
        .generate_from_text(&source_text(), QuestionKind::Mcq, 2)
        .await
        .unwrap();

    assert_eq!(questions.len(), 2);
    for question in &questions {
        match question {
            QuestionSpec::Mcq(q) => {
                assert_eq!(q.options.len(), 4);
                assert!(q.answer_in_options());
            }
            QuestionSpec::OpenEnded(_) => panic!("应该是选择题"),
        }
    }

    let requests = backend.requests();
    assert_eq!(requests.len(), 1);
    let system = requests[0].system_message.as_deref().unwrap();
    assert!(system.contains("Multiple Choice Questions (MCQ)"));
    assert!(system.contains(&SchemaKind::Mcq.pretty()));
    assert!(requests[0].user_message.ends_with(&source_text()));
}

#[tokio::test]
async fn test_open_ended_selects_label_and_schema() {
    let backend = ScriptedBackend::new(vec![Ok(open_ended_batch(1))]);
    let questions = flow(backend.clone())
        .generate_from_text(&source_text(), QuestionKind::OpenEnded, 1)
        .await
        .unwrap();

    assert_eq!(questions[0].kind(), QuestionKind::OpenEnded);
    let system = backend.requests()[0].system_message.clone().unwrap();
    assert!(system.contains("Open-Ended Questions"));
    assert!(system.contains(&SchemaKind::OpenEnded.pretty()));
}

#[tokio::test]
async fn test_retries_until_valid_json() {
    let backend = ScriptedBackend::new(vec![
        Ok("Sure! Here are your questions".to_string()),
        Ok(mcq_batch(1)),
    ]);
    let questions = flow(backend.clone())
        .generate_from_text(&source_text(), QuestionKind::Mcq, 1)
        .await
        .unwrap();

    assert_eq!(questions.len(), 1);
    assert_eq!(backend.calls(), 2);
}

#[tokio::test]
async fn test_gives_up_after_max_retries() {
    let backend = ScriptedBackend::new(vec![]);
    let err = flow(backend.clone())
        .generate_from_text(&source_text(), QuestionKind::Mcq, 1)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        AppError::Llm(LlmError::MalformedOutput { attempts: 3, .. })
    ));
    assert_eq!(backend.calls(), 3);
}

#[tokio::test]
async fn test_count_out_of_range_makes_no_call() {
    let backend = ScriptedBackend::new(vec![]);
    let flow = flow(backend.clone());

    let err = flow
        .generate_from_text(&source_text(), QuestionKind::Mcq, 21)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        AppError::Validation(ValidationError::CountOutOfRange { count: 21, .. })
    ));

    let err = flow.generate_similar("What is 2+2?", 0).await.unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));
    assert_eq!(backend.calls(), 0);
}

#[tokio::test]
async fn test_similar_always_uses_mcq_schema() {
    let backend = ScriptedBackend::new(vec![Ok(mcq_batch(3))]);
    let questions = flow(backend.clone())
        .generate_similar("Explain the causes of the French Revolution.", 3)
        .await
        .unwrap();

    assert_eq!(questions.len(), 3);
    assert!(questions.iter().all(|q| q.kind() == QuestionKind::Mcq));

    let system = backend.requests()[0].system_message.clone().unwrap();
    assert!(system.contains(&SchemaKind::Mcq.pretty()));
    assert!(!system.contains("sample_answer"));
}

#[tokio::test]
async fn test_refine_changes_correct_answer() {
    let reply = json!({
        "refined_question": mcq_json("q1", "C"),
        "changes_made": "Changed the correct answer to C"
    });
    let backend = ScriptedBackend::new(vec![Ok(reply.to_string())]);

    let ctx = RefinementContext::new(mcq_json("q1", "A"), "change correct answer to C")
        .with_history(vec![RefinementTurn {
            instruction: "make it shorter".to_string(),
            response: "Shortened the stem".to_string(),
        }]);
    let outcome = flow(backend.clone()).refine(&ctx).await.unwrap();

    match &outcome.refined_question {
        QuestionSpec::Mcq(q) => assert_eq!(q.correct_answer, "C"),
        QuestionSpec::OpenEnded(_) => panic!("应该是选择题"),
    }
    assert_eq!(outcome.changes_made, "Changed the correct answer to C");

    let system = backend.requests()[0].system_message.clone().unwrap();
    assert!(system.contains("User: make it shorter"));
    assert!(system.contains(&SchemaKind::Refinement.pretty()));
}

#[tokio::test]
async fn test_refine_accepts_history_id_and_capitalised_difficulty() {
    let mut current = mcq_json("q1", "A");
    current["id"] = json!(42);

    let mut refined = mcq_json("q1", "B");
    refined["id"] = json!(42);
    refined["difficulty"] = json!("Medium");
    let reply = json!({ "refined_question": refined, "changes_made": "Answer is now B" });
    let backend = ScriptedBackend::new(vec![Ok(reply.to_string())]);

    let ctx = RefinementContext::new(current, "change correct answer to B");
    let outcome = flow(backend.clone()).refine(&ctx).await.unwrap();

    assert_eq!(outcome.refined_question.id(), "42");
    assert_eq!(
        outcome.refined_question.difficulty(),
        question_forge::models::Difficulty::Medium
    );
    assert_eq!(backend.calls(), 1);

    let body = serde_json::to_value(&outcome).unwrap();
    assert_eq!(body["refined_question"]["id"], "42");
    assert_eq!(body["refined_question"]["difficulty"], "medium");
}

#[tokio::test]
async fn test_refine_missing_field_is_not_retried() {
    let backend = ScriptedBackend::new(vec![Ok(r#"{"changes_made": "nothing"}"#.to_string())]);
    let ctx = RefinementContext::new(mcq_json("q1", "A"), "make it harder");

    let err = flow(backend.clone()).refine(&ctx).await.unwrap_err();

    assert!(matches!(&err, AppError::Llm(e) if e.is_missing_field()));
    assert_eq!(backend.calls(), 1);
}

#[tokio::test]
async fn test_refine_rejects_empty_instruction() {
    let backend = ScriptedBackend::new(vec![]);
    let ctx = RefinementContext::new(mcq_json("q1", "A"), "   ");

    let err = flow(backend.clone()).refine(&ctx).await.unwrap_err();
    assert!(matches!(err, AppError::Validation(ValidationError::Empty { .. })));
    assert_eq!(backend.calls(), 0);
}

#[tokio::test]
async fn test_image_extraction_is_single_vision_call() {
    let backend = ScriptedBackend::new(vec![Ok("What is 2+2? A) 3 B) 4".to_string())]);
    let text = flow(backend.clone())
        .extract_question_from_image(b"\x89PNG\r\n\x1a\nfake")
        .await
        .unwrap();

    assert_eq!(text, "What is 2+2? A) 3 B) 4");
    let requests = backend.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].images.len(), 1);
    assert!(requests[0].images[0].starts_with("data:image/png;base64,"));
    assert!(requests[0].temperature.is_none());
}

#[tokio::test]
async fn test_image_extraction_failure_is_wrapped() {
    let backend = ScriptedBackend::new(vec![common::auth_error()]);
    let err = flow(backend.clone())
        .extract_question_from_image(b"\xff\xd8\xffjpeg")
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        AppError::Llm(LlmError::ExtractionFailed { .. })
    ));
    assert_eq!(backend.calls(), 1);
}

#[tokio::test]
async fn test_strict_mode_retries_answer_outside_options() {
    let bad = json!({ "questions": [mcq_json("q1", "London")] }).to_string();
    let backend = ScriptedBackend::new(vec![Ok(bad), Ok(mcq_batch(1))]);
    let config = Config::default();
    let service = LlmService::new(&config, backend.clone())
        .with_validation(question_forge::services::ValidationMode::Strict);
    let flow = GenerationFlow::new(&config, backend.clone()).with_llm_service(service);

    let questions = flow
        .generate_from_text(&source_text(), QuestionKind::Mcq, 1)
        .await
        .unwrap();

    assert_eq!(questions.len(), 1);
    assert_eq!(backend.calls(), 2);
}

#[test]
fn test_pdf_text_is_split_by_page_and_skips_blank_pages() {
    let text = PdfService::extract_text(&lecture_pdf()).unwrap();

    assert!(text.starts_with("--- Page 1 ---\nPhotosynthesis converts light energy"));
    assert!(text.contains("chloroplasts of green plants."));
    assert!(text.contains("\n\n--- Page 3 ---\nThe light reactions produce ATP"));
    assert!(!text.contains("--- Page 2 ---"));
    assert!(text.chars().count() >= 100);
}

#[test]
fn test_pdf_without_text_is_rejected() {
    let blank = sample_pdf(&[&[], &[]]);
    assert!(matches!(
        PdfService::extract_text(&blank),
        Err(PdfError::NoText)
    ));
}

#[tokio::test]
async fn test_generated_questions_persist() {
    let backend = ScriptedBackend::new(vec![Ok(mcq_batch(2))]);
    let questions = flow(backend)
        .generate_from_text(&source_text(), QuestionKind::Mcq, 2)
        .await
        .unwrap();

    let store = QuestionStore::open_in_memory().unwrap();
    let session = question_forge::models::NewSession::new(SessionType::Pdf)
        .source_file("biology.pdf")
        .config(json!({"question_type": "mcq", "count": 2}));
    let id = store.record_generation(&session, &questions, None).unwrap();

    let detail = store.session_detail(id).unwrap().unwrap();
    assert_eq!(detail.session.question_count, 2);
    assert_eq!(detail.questions[0].correct_answer.as_deref(), Some("A"));
}

#[tokio::test]
#[ignore] // 需要真实的 LLM_API_KEY：cargo test -- --ignored
async fn test_live_generation() {
    logger::init();

    let config = Config::from_env();
    let backend = std::sync::Arc::new(question_forge::LlmClient::new(&config));
    let flow = GenerationFlow::new(&config, backend);

    let questions = flow
        .generate_from_text(&source_text(), QuestionKind::Mcq, 2)
        .await
        .expect("生成题目失败");

    assert!(!questions.is_empty(), "应该至少生成一道题");
}

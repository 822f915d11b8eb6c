//! 请求处理 - 接口层
//!
//! 只负责参数校验、调用流程、落库和组装响应。
//! 生成成功后的落库失败只记录日志，不影响响应。

use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use bytes::Buf;
use futures::TryStreamExt;
use serde_json::json;
use tracing::{debug, info, warn};
use warp::multipart::{FormData, Part};
use warp::{Rejection, Reply};

use crate::api::dto::{
    GenerateQuestionsResponse, GenerateSimilarRequest, HistoryQuery, MessageResponse,
    RefineQuestionRequest, RefineQuestionResponse, DEFAULT_PDF_COUNT,
};
use crate::api::reply::{reject, ApiError};
use crate::api::ApiState;
use crate::error::{AppError, StorageError, StoreError, ValidationError};
use crate::infrastructure::QuestionStore;
use crate::models::{
    NewSession, QuestionKind, QuestionSpec, QuestionUpdate, QuestionView, RefinementContext,
    SessionType,
};
use crate::services::PdfService;
use crate::workflow::{MAX_PDF_COUNT, MAX_SIMILAR_COUNT};

/// PDF 提取文本的最少字符数
pub const MIN_PDF_TEXT_CHARS: usize = 100;
/// 相似题会话保存的原题字符数
const SOURCE_TEXT_CHARS: usize = 500;
/// 修改会话保存的指令字符数
const REFINE_PROMPT_CHARS: usize = 100;

#[derive(Debug, Default)]
struct PdfUpload {
    filename: Option<String>,
    bytes: Option<Vec<u8>>,
    question_type: Option<String>,
    count: Option<String>,
}

// ========== 出题 ==========

/// POST /api/generate-from-pdf
pub async fn generate_from_pdf(form: FormData, state: ApiState) -> Result<impl Reply, Rejection> {
    let response = pdf_questions(form, &state).await.map_err(reject)?;
    Ok(warp::reply::json(&response))
}

async fn pdf_questions(
    form: FormData,
    state: &ApiState,
) -> Result<GenerateQuestionsResponse, ApiError> {
    let upload = read_pdf_form(form).await?;

    let kind: QuestionKind = upload
        .question_type
        .as_deref()
        .ok_or(ValidationError::Empty {
            field: "question_type",
        })?
        .parse()?;
    let count = match upload.count.as_deref().map(str::trim) {
        Some(raw) if !raw.is_empty() => parse_count(raw)?,
        _ => DEFAULT_PDF_COUNT,
    };
    let count = check_count(count, MAX_PDF_COUNT)?;

    let filename = upload
        .filename
        .ok_or(ValidationError::Empty { field: "file" })?;
    if !filename.to_lowercase().ends_with(".pdf") {
        return Err(ValidationError::NotPdf { filename }.into());
    }
    let bytes = upload.bytes.ok_or(ValidationError::Empty { field: "file" })?;

    info!("📄 收到 PDF: {} ({} 字节)", filename, bytes.len());

    let text = tokio::task::spawn_blocking(move || PdfService::extract_text(&bytes))
        .await
        .map_err(|e| ApiError::internal(e.to_string()))?
        .map_err(AppError::from)?;

    let len = text.chars().count();
    if len < MIN_PDF_TEXT_CHARS {
        return Err(ValidationError::ContentTooShort {
            len,
            min: MIN_PDF_TEXT_CHARS,
        }
        .into());
    }

    let questions = state.flow.generate_from_text(&text, kind, count).await?;

    let session = NewSession::new(SessionType::Pdf)
        .source_file(filename)
        .config(json!({ "question_type": kind.as_str(), "count": count }));
    persist(&state.store, session, questions.clone(), None).await;

    Ok(questions.into())
}

/// POST /api/generate-similar
pub async fn generate_similar(
    request: GenerateSimilarRequest,
    state: ApiState,
) -> Result<impl Reply, Rejection> {
    let response = similar_questions(request, &state).await.map_err(reject)?;
    Ok(warp::reply::json(&response))
}

async fn similar_questions(
    request: GenerateSimilarRequest,
    state: &ApiState,
) -> Result<GenerateQuestionsResponse, ApiError> {
    let count = check_count(request.count, MAX_SIMILAR_COUNT)?;

    let image = non_empty(request.image_base64.as_deref());
    let text = non_empty(request.question_text.as_deref());

    let (input, image_url) = match (image, text) {
        (Some(encoded), _) => {
            let bytes = decode_image(encoded).map_err(AppError::from)?;
            info!("🖼️  从图片识别题目 ({} 字节)", bytes.len());
            let extracted = state.flow.extract_question_from_image(&bytes).await?;

            let image_url = match state.images.save(&bytes).await {
                Ok(url) => {
                    info!("✓ 图片已保存: {}", url);
                    Some(url)
                }
                Err(e) => {
                    warn!("⚠️  图片保存失败: {}", e);
                    None
                }
            };
            (extracted, image_url)
        }
        (None, Some(text)) => (text.to_string(), None),
        (None, None) => return Err(ValidationError::MissingSource.into()),
    };

    let mut questions = state.flow.generate_similar(&input, count).await?;
    if let Some(url) = &image_url {
        questions = questions
            .into_iter()
            .map(|q| q.with_image_url(url.clone()))
            .collect();
    }

    let session = NewSession::new(SessionType::Similar)
        .source_text(first_chars(&input, SOURCE_TEXT_CHARS))
        .config(json!({ "question_type": QuestionKind::Mcq.as_str(), "count": count }));
    persist(&state.store, session, questions.clone(), image_url).await;

    Ok(questions.into())
}

/// POST /api/refine-question
pub async fn refine_question(
    request: RefineQuestionRequest,
    state: ApiState,
) -> Result<impl Reply, Rejection> {
    let response = refined_question(request, &state).await.map_err(reject)?;
    Ok(warp::reply::json(&response))
}

async fn refined_question(
    request: RefineQuestionRequest,
    state: &ApiState,
) -> Result<RefineQuestionResponse, ApiError> {
    info!(
        "✏️  修改题目 {}: {}",
        request.question_id, request.refinement_prompt
    );

    let ctx = RefinementContext::new(
        request.current_question.clone(),
        request.refinement_prompt.clone(),
    )
    .with_history(request.conversation_history.clone());
    let outcome = state.flow.refine(&ctx).await?;

    let session = NewSession::new(SessionType::Refinement)
        .source_text(format!(
            "Refined: {}",
            first_chars(&request.refinement_prompt, REFINE_PROMPT_CHARS)
        ))
        .config(json!({
            "original_question_id": request.question_id,
            "refinement_prompt": request.refinement_prompt,
            "changes_made": outcome.changes_made,
        }));
    persist(
        &state.store,
        session,
        vec![outcome.refined_question.clone()],
        None,
    )
    .await;

    Ok(RefineQuestionResponse {
        refined_question: outcome.refined_question,
        changes_made: outcome.changes_made,
    })
}

// ========== 历史记录 ==========

/// GET /api/history/sessions
pub async fn list_sessions(query: HistoryQuery, state: ApiState) -> Result<impl Reply, Rejection> {
    let session_type = match non_empty(query.session_type.as_deref()) {
        None => None,
        Some(raw) => Some(SessionType::parse(raw).ok_or_else(|| {
            reject(ValidationError::InvalidField {
                field: "session_type",
                reason: format!("'{}' 不是 pdf / similar / refinement", raw),
            })
        })?),
    };

    let limit = query.limit;
    let sessions = with_store(&state.store, move |store| {
        store.recent_sessions(limit, session_type)
    })
    .await
    .map_err(reject)?;
    Ok(warp::reply::json(&sessions))
}

/// GET /api/history/sessions/{id}
pub async fn session_detail(session_id: i64, state: ApiState) -> Result<impl Reply, Rejection> {
    let detail = with_store(&state.store, move |store| store.session_detail(session_id))
        .await
        .map_err(reject)?
        .ok_or_else(|| reject(ApiError::not_found("Session not found")))?;
    Ok(warp::reply::json(&detail))
}

/// DELETE /api/history/sessions/{id}
pub async fn delete_session(session_id: i64, state: ApiState) -> Result<impl Reply, Rejection> {
    let deleted = with_store(&state.store, move |store| store.delete_session(session_id))
        .await
        .map_err(reject)?;
    if !deleted {
        return Err(reject(ApiError::not_found("Session not found")));
    }
    info!("🗑️  会话 {} 已删除", session_id);
    Ok(warp::reply::json(&MessageResponse {
        message: "Session deleted successfully",
    }))
}

/// PUT /api/history/questions/{id}
pub async fn update_question(
    question_id: i64,
    update: QuestionUpdate,
    state: ApiState,
) -> Result<impl Reply, Rejection> {
    let record = with_store(&state.store, move |store| {
        store.update_question(question_id, &update)
    })
    .await
    .map_err(reject)?
    .ok_or_else(|| reject(ApiError::not_found("Question not found")))?;
    Ok(warp::reply::json(&QuestionView::from(&record)))
}

/// GET /api/history/statistics
pub async fn statistics(state: ApiState) -> Result<impl Reply, Rejection> {
    let stats = with_store(&state.store, |store| store.statistics())
        .await
        .map_err(reject)?;
    Ok(warp::reply::json(&stats))
}

// ========== 辅助函数 ==========

/// 在阻塞线程上访问数据库
async fn with_store<T, F>(store: &Arc<QuestionStore>, op: F) -> Result<T, ApiError>
where
    F: FnOnce(&QuestionStore) -> Result<T, StoreError> + Send + 'static,
    T: Send + 'static,
{
    let store = Arc::clone(store);
    tokio::task::spawn_blocking(move || op(&store))
        .await
        .map_err(|e| ApiError::internal(e.to_string()))?
        .map_err(ApiError::from)
}

/// 保存会话和题目，失败只记录日志
async fn persist(
    store: &Arc<QuestionStore>,
    session: NewSession,
    questions: Vec<QuestionSpec>,
    image_url: Option<String>,
) {
    let session_type = session.session_type;
    let total = questions.len();
    let result = with_store(store, move |store| {
        store.record_generation(&session, &questions, image_url.as_deref())
    })
    .await;

    match result {
        Ok(id) => info!(
            "💾 已保存 {} 会话 {} ({} 道题)",
            session_type.as_str(),
            id,
            total
        ),
        Err(e) => warn!("⚠️  保存到数据库失败: {}", e.detail),
    }
}

async fn read_pdf_form(form: FormData) -> Result<PdfUpload, ApiError> {
    let parts: Vec<Part> = form
        .try_collect()
        .await
        .map_err(|e| ApiError::bad_request(format!("无法读取表单: {}", e)))?;

    let mut upload = PdfUpload::default();
    for part in parts {
        let name = part.name().to_string();
        let filename = part.filename().map(str::to_string);
        let data = read_part(part)
            .await
            .map_err(|e| ApiError::bad_request(format!("无法读取字段 {}: {}", name, e)))?;

        match name.as_str() {
            "file" => {
                upload.filename = filename;
                upload.bytes = Some(data);
            }
            "question_type" => {
                upload.question_type = Some(String::from_utf8_lossy(&data).trim().to_string())
            }
            "count" => upload.count = Some(String::from_utf8_lossy(&data).into_owned()),
            other => debug!("忽略表单字段: {}", other),
        }
    }
    Ok(upload)
}

async fn read_part(part: Part) -> Result<Vec<u8>, warp::Error> {
    part.stream()
        .try_fold(Vec::new(), |mut acc, buf| async move {
            acc.extend_from_slice(buf.chunk());
            Ok(acc)
        })
        .await
}

fn parse_count(raw: &str) -> Result<i64, ValidationError> {
    raw.parse().map_err(|_| ValidationError::InvalidField {
        field: "count",
        reason: format!("'{}' 不是整数", raw),
    })
}

fn check_count(count: i64, max: u32) -> Result<u32, ValidationError> {
    u32::try_from(count)
        .ok()
        .filter(|c| (1..=max).contains(c))
        .ok_or(ValidationError::CountOutOfRange { count, min: 1, max })
}

/// 解码 base64 图片，允许带 `data:image/...;base64,` 前缀
fn decode_image(encoded: &str) -> Result<Vec<u8>, StorageError> {
    let payload = encoded
        .split_once("base64,")
        .map(|(_, data)| data)
        .unwrap_or(encoded);
    Ok(STANDARD.decode(payload.trim())?)
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn first_chars(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}

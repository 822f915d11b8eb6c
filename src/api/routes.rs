//! 路由组装

use std::convert::Infallible;

use serde_json::json;
use warp::{Filter, Rejection, Reply};

use crate::api::dto::HistoryQuery;
use crate::api::handlers;
use crate::api::reply::handle_rejection;
use crate::api::ApiState;

/// PDF 上传大小上限
const MAX_PDF_BYTES: u64 = 32 * 1024 * 1024;
/// JSON 请求体上限（含 base64 图片）
const MAX_JSON_BYTES: u64 = 16 * 1024 * 1024;

/// 全部路由（含 CORS、静态文件和统一错误处理）
pub fn routes(state: ApiState) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    let cors = warp::cors()
        .allow_any_origin()
        .allow_headers(vec!["content-type", "authorization"])
        .allow_methods(vec!["GET", "POST", "PUT", "DELETE", "OPTIONS"]);

    let uploads = warp::path("uploads").and(warp::fs::dir(state.images.upload_dir().to_path_buf()));

    health()
        .or(root())
        .or(generate_from_pdf(state.clone()))
        .or(generate_similar(state.clone()))
        .or(refine_question(state.clone()))
        .or(history(state))
        .or(uploads)
        .recover(handle_rejection)
        .with(cors)
        .with(warp::trace::request())
}

fn with_state(state: ApiState) -> impl Filter<Extract = (ApiState,), Error = Infallible> + Clone {
    warp::any().map(move || state.clone())
}

fn health() -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    warp::path!("health").and(warp::get()).map(|| {
        warp::reply::json(&json!({
            "status": "healthy",
            "service": "ai-question-generator-api"
        }))
    })
}

fn root() -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    warp::path::end().and(warp::get()).map(|| {
        warp::reply::json(&json!({
            "message": "AI Question Generator API",
            "version": env!("CARGO_PKG_VERSION"),
            "health": "/health"
        }))
    })
}

fn generate_from_pdf(
    state: ApiState,
) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    warp::path!("api" / "generate-from-pdf")
        .and(warp::post())
        .and(warp::multipart::form().max_length(MAX_PDF_BYTES))
        .and(with_state(state))
        .and_then(handlers::generate_from_pdf)
}

fn generate_similar(
    state: ApiState,
) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    warp::path!("api" / "generate-similar")
        .and(warp::post())
        .and(warp::body::content_length_limit(MAX_JSON_BYTES))
        .and(warp::body::json())
        .and(with_state(state))
        .and_then(handlers::generate_similar)
}

fn refine_question(
    state: ApiState,
) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    warp::path!("api" / "refine-question")
        .and(warp::post())
        .and(warp::body::content_length_limit(MAX_JSON_BYTES))
        .and(warp::body::json())
        .and(with_state(state))
        .and_then(handlers::refine_question)
}

fn history(state: ApiState) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    let list = warp::path!("api" / "history" / "sessions")
        .and(warp::get())
        .and(warp::query::<HistoryQuery>())
        .and(with_state(state.clone()))
        .and_then(handlers::list_sessions);

    let detail = warp::path!("api" / "history" / "sessions" / i64)
        .and(warp::get())
        .and(with_state(state.clone()))
        .and_then(handlers::session_detail);

    let delete = warp::path!("api" / "history" / "sessions" / i64)
        .and(warp::delete())
        .and(with_state(state.clone()))
        .and_then(handlers::delete_session);

    let update = warp::path!("api" / "history" / "questions" / i64)
        .and(warp::put())
        .and(warp::body::content_length_limit(MAX_JSON_BYTES))
        .and(warp::body::json())
        .and(with_state(state.clone()))
        .and_then(handlers::update_question);

    let statistics = warp::path!("api" / "history" / "statistics")
        .and(warp::get())
        .and(with_state(state))
        .and_then(handlers::statistics);

    list.or(detail).or(delete).or(update).or(statistics)
}

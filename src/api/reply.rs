//! HTTP 错误响应
//!
//! 所有失败统一返回 `{"error": ..., "detail": ...}`

use std::convert::Infallible;

use phf::phf_map;
use serde::Serialize;
use tracing::{error, warn};
use warp::http::StatusCode;
use warp::{Rejection, Reply};

use crate::error::{AppError, LlmError, StorageError, StoreError, ValidationError};

/// 模型服务商错误信息中的关键字 → 状态码
static PROVIDER_KEYWORDS: phf::Map<&'static str, u16> = phf_map! {
    "api_key" => 401,
    "authentication" => 401,
    "unauthorized" => 401,
    "insufficient_quota" => 429,
    "billing" => 429,
};

#[derive(Debug, Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
    detail: &'a str,
}

/// 接口错误
#[derive(Debug, Clone)]
pub struct ApiError {
    pub status: StatusCode,
    pub error: String,
    pub detail: String,
}

impl warp::reject::Reject for ApiError {}

impl ApiError {
    pub fn new(status: StatusCode, error: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            status,
            error: error.into(),
            detail: detail.into(),
        }
    }

    pub fn bad_request(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "Invalid request", detail)
    }

    pub fn not_found(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, "Not found", detail)
    }

    pub fn internal(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "Internal error", detail)
    }

    pub fn reply(&self) -> warp::reply::WithStatus<warp::reply::Json> {
        let body = ErrorBody {
            error: &self.error,
            detail: &self.detail,
        };
        warp::reply::with_status(warp::reply::json(&body), self.status)
    }
}

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        let detail = err.to_string();
        match &err {
            AppError::Validation(_) => ApiError::bad_request(detail),
            AppError::Pdf(_) => ApiError::new(StatusCode::BAD_REQUEST, "Invalid PDF file", detail),
            AppError::Storage(StorageError::Decode(_)) => {
                ApiError::new(StatusCode::BAD_REQUEST, "Invalid image", detail)
            }
            AppError::Llm(LlmError::ExtractionFailed { .. }) => {
                ApiError::new(StatusCode::BAD_REQUEST, "Failed to process image", detail)
            }
            AppError::Llm(_) => match classify_provider_message(&detail) {
                Some(StatusCode::UNAUTHORIZED) => ApiError::new(
                    StatusCode::UNAUTHORIZED,
                    "Authentication failed. Please check your API Key.",
                    detail,
                ),
                Some(StatusCode::TOO_MANY_REQUESTS) => ApiError::new(
                    StatusCode::TOO_MANY_REQUESTS,
                    "API Quota exceeded or billing issue.",
                    detail,
                ),
                _ => ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, "Operation failed", detail),
            },
            AppError::Store(_) | AppError::Storage(_) | AppError::Config(_) => {
                ApiError::internal(detail)
            }
        }
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        AppError::from(err).into()
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        AppError::from(err).into()
    }
}

/// 按关键字识别服务商错误，鉴权问题优先于额度问题
pub fn classify_provider_message(message: &str) -> Option<StatusCode> {
    let lower = message.to_lowercase();
    PROVIDER_KEYWORDS
        .entries()
        .filter(|(keyword, _)| lower.contains(*keyword))
        .map(|(_, code)| *code)
        .min()
        .and_then(|code| StatusCode::from_u16(code).ok())
}

/// 把业务错误转成 warp 拒绝
pub fn reject(err: impl Into<ApiError>) -> Rejection {
    let api_error = err.into();
    if api_error.status.is_server_error() {
        error!("❌ {}: {}", api_error.error, api_error.detail);
    } else {
        warn!("⚠️  {}: {}", api_error.error, api_error.detail);
    }
    warp::reject::custom(api_error)
}

/// 统一的拒绝处理
pub async fn handle_rejection(err: Rejection) -> Result<impl Reply, Infallible> {
    let api_error = if let Some(e) = err.find::<ApiError>() {
        e.clone()
    } else if err.is_not_found() {
        ApiError::not_found("Not Found")
    } else if let Some(e) = err.find::<warp::filters::body::BodyDeserializeError>() {
        ApiError::bad_request(e.to_string())
    } else if let Some(e) = err.find::<warp::reject::InvalidQuery>() {
        ApiError::bad_request(e.to_string())
    } else if let Some(e) = err.find::<warp::reject::PayloadTooLarge>() {
        ApiError::new(StatusCode::PAYLOAD_TOO_LARGE, "Payload too large", e.to_string())
    } else if let Some(e) = err.find::<warp::reject::UnsupportedMediaType>() {
        ApiError::new(
            StatusCode::UNSUPPORTED_MEDIA_TYPE,
            "Unsupported media type",
            e.to_string(),
        )
    } else if let Some(e) = err.find::<warp::reject::MethodNotAllowed>() {
        ApiError::new(StatusCode::METHOD_NOT_ALLOWED, "Method not allowed", e.to_string())
    } else {
        ApiError::internal(format!("{:?}", err))
    };

    Ok(api_error.reply())
}

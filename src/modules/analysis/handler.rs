use crate::common::response::{ApiError, ApiSuccess, ErrorBody};
use crate::common::upload::is_accepted_content_type;
use crate::modules::analysis::dto::*;
use crate::modules::analysis::service::AnalysisService;
use crate::state::AppState;
use axum::{
    extract::{Multipart, Path, State},
    http::{HeaderMap, StatusCode, header},
    response::IntoResponse,
};
use tracing::{error, info};
use uuid::Uuid;

#[utoipa::path(
    post,
    path = "/upload",
    request_body(content_type = "multipart/form-data", description = "Video file in the `file` field"),
    responses(
        (status = 200, description = "Job queued", body = SubmitResponse),
        (status = 400, description = "No file in request", body = ErrorBody),
        (status = 415, description = "Not a video", body = ErrorBody),
        (status = 500, description = "Upload could not be stored or queued", body = ErrorBody)
    ),
    tag = "Analysis"
)]
pub async fn upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    loop {
        let field = multipart
            .next_field()
            .await
            .map_err(|e| ApiError::bad_request(format!("Invalid multipart body: {}", e)))?;

        let Some(field) = field else {
            return Err(ApiError::bad_request("No file uploaded"));
        };

        if field.name() != Some("file") && field.file_name().is_none() {
            continue;
        }

        if !is_accepted_content_type(field.content_type()) {
            return Err(ApiError(
                format!(
                    "Unsupported content type: {}",
                    field.content_type().unwrap_or_default()
                ),
                StatusCode::UNSUPPORTED_MEDIA_TYPE,
            ));
        }

        info!(
            "Receiving upload {}",
            field.file_name().unwrap_or("<unnamed>")
        );

        return match AnalysisService::submit(&state, Box::pin(field)).await {
            Ok(res) => Ok(ApiSuccess(res, StatusCode::OK)),
            Err(e) => {
                error!("Upload failed: {:#}", e);
                Err(ApiError::internal(e.to_string()))
            }
        };
    }
}

#[utoipa::path(
    get,
    path = "/status/{job_id}",
    params(
        ("job_id" = String, Path, description = "Job ID returned by /upload")
    ),
    responses(
        (status = 200, description = "Current job status", body = StatusResponse),
        (status = 400, description = "Malformed job id", body = ErrorBody),
        (status = 404, description = "Unknown job", body = ErrorBody),
        (status = 500, description = "Status registry unavailable", body = ErrorBody)
    ),
    tag = "Analysis"
)]
pub async fn status(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let job_id = parse_id(&job_id, "job id")?;

    match AnalysisService::status(&state, job_id).await {
        Ok(Some(res)) => Ok(ApiSuccess(res, StatusCode::OK)),
        Ok(None) => Err(ApiError::not_found(format!("Job not found: {}", job_id))),
        Err(e) => Err(ApiError::internal(e.to_string())),
    }
}

#[utoipa::path(
    get,
    path = "/api/results/{content_id}",
    params(
        ("content_id" = String, Path, description = "Content ID returned by /upload")
    ),
    responses(
        (status = 200, description = "Processing or complete result", body = ResultResponse),
        (status = 400, description = "Malformed content id", body = ErrorBody),
        (status = 500, description = "Result could not be read", body = ErrorBody)
    ),
    tag = "Analysis"
)]
pub async fn fetch_result(
    State(state): State<AppState>,
    Path(content_id): Path<String>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    let content_id = parse_id(&content_id, "content id")?;
    let origin = request_origin(&headers).unwrap_or_else(|| state.config.fallback_origin());

    match AnalysisService::fetch_result(&state, content_id, &origin).await {
        Ok(res) => Ok(ApiSuccess(res, StatusCode::OK)),
        Err(e) => {
            error!("[{}] Failed to load result: {:#}", content_id, e);
            Err(ApiError::internal(e.to_string()))
        }
    }
}

fn parse_id(raw: &str, what: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw).map_err(|_| ApiError::bad_request(format!("Invalid {}: {}", what, raw)))
}

/// `scheme://host` as seen by the client, honouring reverse-proxy headers.
pub fn request_origin(headers: &HeaderMap) -> Option<String> {
    let first = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|v| !v.is_empty())
    };

    let host = first("x-forwarded-host").or_else(|| first(header::HOST.as_str()))?;
    let proto = first("x-forwarded-proto").unwrap_or("http");
    Some(format!("{}://{}", proto, host))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn origin_prefers_forwarded_headers() {
        let mut headers = HeaderMap::new();
        headers.insert(header::HOST, HeaderValue::from_static("internal:8000"));
        assert_eq!(request_origin(&headers).unwrap(), "http://internal:8000");

        headers.insert("x-forwarded-host", HeaderValue::from_static("posture.example.com, proxy"));
        headers.insert("x-forwarded-proto", HeaderValue::from_static("https"));
        assert_eq!(request_origin(&headers).unwrap(), "https://posture.example.com");
    }

    #[test]
    fn origin_missing_without_host() {
        assert!(request_origin(&HeaderMap::new()).is_none());
    }

    #[test]
    fn malformed_id_is_a_bad_request() {
        let err = parse_id("../../etc/passwd", "content id").unwrap_err();
        assert_eq!(err.1, StatusCode::BAD_REQUEST);
    }
}

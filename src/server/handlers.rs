use super::{AppState, error::ServerError};
use crate::{
    engine::Engine,
    formats::{extension_of, normalize_format, validate_format},
    pipeline::ConversionRequest,
    util::content_disposition,
};
use axum::Json;
use axum::extract::multipart::MultipartRejection;
use axum::extract::{Multipart, State};
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use std::sync::Arc;
use tracing::info;

/// `POST` multipart with `file`, `sourceFormat` and `targetFormat`; answers
/// with the converted bytes as an attachment.
pub async fn convert(
    State(state): State<Arc<AppState>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Response, ServerError> {
    let mut multipart =
        multipart.map_err(|e| ServerError::InvalidUpload(format!("multipart body: {e}")))?;
    let req = read_upload(&mut multipart).await?;
    info!(
        file = ?req.file_name,
        source = %req.source_format,
        target = %req.target_format,
        bytes = req.payload.len(),
        "conversion requested"
    );

    let permit = Arc::clone(&state.limiter)
        .acquire_owned()
        .await
        .map_err(|e| ServerError::ConversionFailed(format!("conversion limiter closed: {e}")))?;

    // The permit travels with the blocking job so an abandoned request still
    // counts against the limit until its converter exits.
    let pipeline = Arc::clone(&state.pipeline);
    let converted = tokio::task::spawn_blocking(move || {
        let _permit = permit;
        pipeline.run_job(&req)
    })
    .await
    .map_err(|e| ServerError::ConversionFailed(format!("conversion task failed: {e}")))?
    .map_err(ServerError::conversion)?;

    let content_type = HeaderValue::from_str(&converted.content_type)
        .map_err(|e| ServerError::ConversionFailed(format!("content type header: {e}")))?;
    let disposition = HeaderValue::from_str(&content_disposition(&converted.file_name))
        .map_err(|e| ServerError::ConversionFailed(format!("content disposition header: {e}")))?;

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, content_type),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        converted.bytes,
    )
        .into_response())
}

pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

pub async fn doctor(State(state): State<Arc<AppState>>) -> Result<Response, ServerError> {
    let pipeline = Arc::clone(&state.pipeline);
    let diag = tokio::task::spawn_blocking(move || pipeline.engine().doctor())
        .await
        .map_err(|e| ServerError::ConversionFailed(format!("doctor task failed: {e}")))?
        .map_err(|e| ServerError::ConversionFailed(format!("{e:#}")))?;
    Ok(Json(diag).into_response())
}

async fn read_upload(multipart: &mut Multipart) -> Result<ConversionRequest, ServerError> {
    let mut file_name = None;
    let mut payload = None;
    let mut source_format = None;
    let mut target_format = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ServerError::InvalidUpload(format!("reading multipart field: {e}")))?
    {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "file" => {
                file_name = field.file_name().map(str::to_string);
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ServerError::InvalidUpload(format!("reading file: {e}")))?;
                payload = Some(bytes.to_vec());
            }
            "sourceFormat" | "targetFormat" => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| ServerError::InvalidUpload(format!("reading {name}: {e}")))?;
                if name == "sourceFormat" {
                    source_format = Some(text);
                } else {
                    target_format = Some(text);
                }
            }
            _ => {}
        }
    }

    let payload = payload.ok_or_else(|| ServerError::InvalidUpload("missing field: file".into()))?;

    let target_format = target_format
        .map(|t| normalize_format(&t))
        .filter(|t| !t.is_empty())
        .ok_or_else(|| ServerError::InvalidUpload("missing field: targetFormat".into()))?;

    let source_format = source_format
        .map(|s| normalize_format(&s))
        .filter(|s| !s.is_empty())
        .or_else(|| file_name.as_deref().and_then(extension_of))
        .ok_or_else(|| {
            ServerError::InvalidUpload("missing field: sourceFormat (and no file extension)".into())
        })?;

    for (label, tag) in [("sourceFormat", &source_format), ("targetFormat", &target_format)] {
        validate_format(tag).map_err(|e| ServerError::InvalidUpload(format!("{label}: {e}")))?;
    }

    Ok(ConversionRequest {
        file_name,
        payload,
        source_format,
        target_format,
    })
}

//! Delegated upload handler
//!
//! POST /upload: full guard (authentication + revocation + delegated
//! credential), then payload validation, then the upstream call. Validation
//! rejects before a single byte reaches the upload API — a bad extension or
//! content type never costs an upstream request.

use axum::Json;
use axum::extract::{Multipart, State};
use axum::http::HeaderMap;
use axum_extra::extract::SignedCookieJar;
use tracing::{info, warn};

use crate::AppState;
use crate::error::{ApiError, ApiResult};
use crate::guard;
use crate::metrics;
use crate::youtube::{VideoMetadata, watch_url};

/// Accepted container formats, by filename extension.
const ALLOWED_EXTENSIONS: &[&str] = &["mp4", "mov", "avi", "wmv"];

/// Accepted declared content types for the same containers.
const ALLOWED_CONTENT_TYPES: &[&str] = &[
    "video/mp4",
    "video/quicktime",
    "video/x-msvideo",
    "video/avi",
    "video/x-ms-wmv",
];

/// Reject anything that is not a capped, well-typed video payload.
fn validate_video(
    filename: &str,
    content_type: &str,
    size: usize,
    max_bytes: usize,
) -> ApiResult<()> {
    let extension = filename
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    if !ALLOWED_EXTENSIONS.contains(&extension.as_str()) {
        return Err(ApiError::Validation("Only video files are allowed!".into()));
    }

    // Strip any parameters ("video/mp4; codecs=...") before matching
    let declared = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    if !ALLOWED_CONTENT_TYPES.contains(&declared.as_str()) {
        return Err(ApiError::Validation("Only video files are allowed!".into()));
    }

    if size > max_bytes {
        return Err(ApiError::Validation(format!(
            "Video exceeds the {max_bytes} byte limit"
        )));
    }

    Ok(())
}

struct VideoPart {
    filename: String,
    content_type: String,
    data: Vec<u8>,
}

/// POST /upload — upload a video on the authenticated user's behalf.
pub async fn upload(
    State(state): State<AppState>,
    jar: SignedCookieJar,
    headers: HeaderMap,
    multipart: Multipart,
) -> ApiResult<Json<serde_json::Value>> {
    match upload_inner(&state, &jar, &headers, multipart).await {
        Ok(body) => {
            metrics::record_upload("success");
            Ok(Json(body))
        }
        Err(e) => {
            metrics::record_upload(match &e {
                ApiError::Validation(_) => "validation",
                ApiError::Upstream(_) => "upstream",
                _ => "rejected",
            });
            Err(e)
        }
    }
}

async fn upload_inner(
    state: &AppState,
    jar: &SignedCookieJar,
    headers: &HeaderMap,
    mut multipart: Multipart,
) -> ApiResult<serde_json::Value> {
    let auth = guard::authenticate(state, headers, jar).await?;
    let access_token = guard::require_delegated_access(&auth)?.to_owned();

    let mut title = String::new();
    let mut description = String::new();
    let mut tags = String::new();
    let mut video: Option<VideoPart> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::Validation(format!("invalid multipart payload: {e}")))?
    {
        match field.name().unwrap_or_default() {
            "title" => {
                title = field
                    .text()
                    .await
                    .map_err(|e| ApiError::Validation(format!("invalid title field: {e}")))?;
            }
            "description" => {
                description = field.text().await.map_err(|e| {
                    ApiError::Validation(format!("invalid description field: {e}"))
                })?;
            }
            "tags" => {
                tags = field
                    .text()
                    .await
                    .map_err(|e| ApiError::Validation(format!("invalid tags field: {e}")))?;
            }
            "video" => {
                let filename = field.file_name().unwrap_or_default().to_owned();
                let content_type = field.content_type().unwrap_or_default().to_owned();
                let data = field.bytes().await.map_err(|e| {
                    ApiError::Validation(format!("video payload unreadable or too large: {e}"))
                })?;
                video = Some(VideoPart {
                    filename,
                    content_type,
                    data: data.to_vec(),
                });
            }
            other => {
                warn!(field = other, "ignoring unknown multipart field");
            }
        }
    }

    let video = video.ok_or_else(|| ApiError::Validation("No video file provided".into()))?;
    validate_video(
        &video.filename,
        &video.content_type,
        video.data.len(),
        state.config.upload.max_bytes,
    )?;

    let metadata = VideoMetadata {
        title,
        description,
        tags: tags
            .split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_owned)
            .collect(),
    };

    let video_id = state
        .youtube
        .upload_video(&access_token, &metadata, video.data, &video.content_type)
        .await?;

    info!(google_id = %auth.user.google_id, video_id, "video uploaded");

    Ok(serde_json::json!({
        "message": "Video uploaded successfully",
        "videoId": video_id,
        "videoUrl": watch_url(&video_id),
    }))
}

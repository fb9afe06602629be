//! YouTube upload client
//!
//! Thin client for the videos.insert resumable upload: one POST creating the
//! upload session from the metadata, one PUT streaming the media bytes to
//! the session URL the API hands back. Both calls act with the user's
//! delegated access token, never a service credential.

use axum::http::header::{CONTENT_TYPE, LOCATION};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::error::{ApiError, ApiResult};

/// Production upload endpoint.
pub const UPLOAD_ENDPOINT: &str = "https://www.googleapis.com/upload/youtube/v3/videos";

/// Base of the public watch URL returned to the caller.
pub const WATCH_URL_BASE: &str = "https://www.youtube.com/watch?v=";

/// Metadata for the created video resource.
#[derive(Debug, Clone, Serialize)]
pub struct VideoMetadata {
    pub title: String,
    pub description: String,
    pub tags: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct VideoResource {
    id: String,
}

/// Client for the upload endpoint.
#[derive(Clone)]
pub struct YoutubeClient {
    client: reqwest::Client,
    upload_endpoint: String,
}

impl YoutubeClient {
    pub fn new(client: reqwest::Client) -> Self {
        Self::with_endpoint(client, UPLOAD_ENDPOINT.to_owned())
    }

    /// Custom endpoint (tests).
    pub fn with_endpoint(client: reqwest::Client, upload_endpoint: String) -> Self {
        Self {
            client,
            upload_endpoint,
        }
    }

    /// Upload a video on the user's behalf; returns the created video id.
    ///
    /// Uploads are created private — publishing is the owner's decision,
    /// made in their own account.
    #[instrument(skip_all, fields(title = %metadata.title, bytes = media.len()))]
    pub async fn upload_video(
        &self,
        access_token: &str,
        metadata: &VideoMetadata,
        media: Vec<u8>,
        content_type: &str,
    ) -> ApiResult<String> {
        let body = serde_json::json!({
            "snippet": {
                "title": metadata.title,
                "description": metadata.description,
                "tags": metadata.tags,
            },
            "status": {
                "privacyStatus": "private",
            },
        });

        let response = self
            .client
            .post(&self.upload_endpoint)
            .query(&[("uploadType", "resumable"), ("part", "snippet,status")])
            .bearer_auth(access_token)
            .header("X-Upload-Content-Type", content_type)
            .json(&body)
            .send()
            .await
            .map_err(|e| ApiError::Upstream(format!("upload session request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::Upstream(format!(
                "upload session rejected ({status}): {body}"
            )));
        }

        let session_url = response
            .headers()
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned)
            .ok_or_else(|| {
                ApiError::Upstream("upload session response missing location".into())
            })?;

        debug!("upload session created");

        let response = self
            .client
            .put(&session_url)
            .bearer_auth(access_token)
            .header(CONTENT_TYPE, content_type)
            .body(media)
            .send()
            .await
            .map_err(|e| ApiError::Upstream(format!("media upload failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::Upstream(format!(
                "media upload rejected ({status}): {body}"
            )));
        }

        let resource = response
            .json::<VideoResource>()
            .await
            .map_err(|e| ApiError::Upstream(format!("invalid upload response: {e}")))?;

        Ok(resource.id)
    }
}

/// Public viewing URL for a created video.
pub fn watch_url(video_id: &str) -> String {
    format!("{WATCH_URL_BASE}{video_id}")
}

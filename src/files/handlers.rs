use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, Multipart, Path, State},
    http::{header, HeaderValue},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use time::OffsetDateTime;
use tracing::{instrument, warn};
use uuid::Uuid;

use super::{
    dto::{DeleteResponse, DownloadRequest, FileSummary, UploadResponse},
    services::{self, DownloadedFile, UploadItem},
};
use crate::{
    auth::extractors::{AuthUser, MaybeAuthUser},
    error::{AppError, AppResult},
    state::AppState,
};

// --- public routers ---

pub fn upload_routes(max_upload_bytes: usize) -> Router<AppState> {
    Router::new()
        .route("/upload", post(upload))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
}

pub fn share_routes() -> Router<AppState> {
    Router::new()
        .route("/api/file-info/:code", get(file_info))
        .route("/download/:code", post(download).get(legacy_download))
}

pub fn owner_routes() -> Router<AppState> {
    Router::new()
        .route("/api/my-files", get(my_files))
        .route("/api/files/:id", delete(delete_file))
}

// --- handlers ---

/// POST /upload (multipart)
/// Fields: `file` (required), `password` and `expiryDays` (optional).
#[instrument(skip(state, mp))]
pub async fn upload(
    State(state): State<AppState>,
    MaybeAuthUser(session): MaybeAuthUser,
    mut mp: Multipart,
) -> AppResult<Json<UploadResponse>> {
    let mut file: Option<(String, Bytes)> = None;
    let mut password = None;
    let mut expiry_days = None;

    loop {
        let field = match mp.next_field().await {
            Ok(Some(f)) => f,
            Ok(None) => break,
            Err(e) => return Err(multipart_error(e)),
        };
        let field_name = field.name().unwrap_or_default().to_string();
        match field_name.as_str() {
            "file" => {
                let name = field.file_name().unwrap_or("file").to_string();
                let data = field.bytes().await.map_err(multipart_error)?;
                file = Some((name, data));
            }
            "password" => {
                password = Some(field.text().await.map_err(multipart_error)?);
            }
            "expiryDays" => {
                let raw = field.text().await.map_err(multipart_error)?;
                expiry_days = raw.trim().parse::<i64>().ok();
            }
            _ => {}
        }
    }

    let Some((file_name, body)) = file else {
        return Err(AppError::Validation("No file uploaded.".into()));
    };

    let receipt = services::create_upload(
        state.uploads.as_ref(),
        &state.config.uploads,
        UploadItem {
            owner_id: session.map(|s| s.id),
            file_name,
            body,
            password,
            expiry_days,
        },
        OffsetDateTime::now_utc(),
    )
    .await?;

    Ok(Json(UploadResponse {
        message: "File uploaded successfully.".into(),
        code: receipt.code,
        file_name: receipt.file_name,
        size: receipt.size,
        expires_at: receipt.expires_at,
        has_password: receipt.has_password,
    }))
}

#[instrument(skip(state))]
pub async fn file_info(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> AppResult<Json<FileSummary>> {
    let summary =
        services::get_info(state.uploads.as_ref(), &code, OffsetDateTime::now_utc()).await?;
    Ok(Json(summary))
}

/// POST /download/:code with an optional `{ "password": "..." }` body.
#[instrument(skip(state, body))]
pub async fn download(
    State(state): State<AppState>,
    Path(code): Path<String>,
    body: Bytes,
) -> AppResult<Response> {
    let req = if body.iter().all(u8::is_ascii_whitespace) {
        DownloadRequest::default()
    } else {
        serde_json::from_slice::<DownloadRequest>(&body)
            .map_err(|e| AppError::Validation(format!("Invalid request body: {e}")))?
    };

    let file = services::download(
        state.uploads.as_ref(),
        &code,
        req.password,
        OffsetDateTime::now_utc(),
    )
    .await?;
    Ok(attachment(file))
}

/// GET /download/:code, kept for old share links. Cannot carry a password.
#[instrument(skip(state))]
pub async fn legacy_download(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> AppResult<Response> {
    let file =
        services::download(state.uploads.as_ref(), &code, None, OffsetDateTime::now_utc()).await?;
    Ok(attachment(file))
}

#[instrument(skip(state))]
pub async fn my_files(
    State(state): State<AppState>,
    AuthUser(session): AuthUser,
) -> AppResult<Json<Vec<FileSummary>>> {
    let files = services::list_owned(state.uploads.as_ref(), session.id).await?;
    Ok(Json(files))
}

#[instrument(skip(state))]
pub async fn delete_file(
    State(state): State<AppState>,
    AuthUser(session): AuthUser,
    Path(id): Path<String>,
) -> AppResult<Json<DeleteResponse>> {
    // a malformed id is just another id that does not exist
    let id = Uuid::parse_str(&id).map_err(|_| AppError::NotFound("File not found".into()))?;
    services::delete_owned(state.uploads.as_ref(), id, session.id).await?;
    Ok(Json(DeleteResponse {
        message: "File deleted successfully".into(),
    }))
}

fn attachment(file: DownloadedFile) -> Response {
    let disposition = HeaderValue::from_str(&format!("attachment; filename=\"{}\"", file.file_name))
        .unwrap_or_else(|_| HeaderValue::from_static("attachment"));
    (
        [
            (
                header::CONTENT_TYPE,
                HeaderValue::from_static("application/octet-stream"),
            ),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        file.body,
    )
        .into_response()
}

fn multipart_error(e: axum::extract::multipart::MultipartError) -> AppError {
    warn!(error = %e, "multipart read failed");
    AppError::Validation("Upload rejected: file too large or malformed request".into())
}

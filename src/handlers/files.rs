use axum::{
    body::Body,
    extract::{Multipart, Path, Query, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Json, Response},
};
use futures::TryStreamExt;
use std::io;
use tokio_util::io::{ReaderStream, StreamReader};
use uuid::Uuid;

use crate::{
    errors::{AppError, Result},
    handlers::AppState,
    middleware::AuthenticatedUser,
    models::{
        FileListResponse, FileResponse, FileView, ListQuery, MessageResponse, Pagination, UploadResponse,
    },
    utils::file::base_name,
};

fn parse_file_id(raw: &str) -> Result<Uuid> {
    Uuid::parse_str(raw).map_err(|_| AppError::Validation("Invalid file ID".to_string()))
}

#[utoipa::path(
    post,
    path = "/api/files",
    tag = "files",
    request_body(content = crate::models::UploadForm, content_type = "multipart/form-data"),
    responses(
        (status = 201, description = "File stored", body = UploadResponse),
        (status = 400, description = "No file, invalid name, duplicate name or storage limit exceeded"),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "User not found")
    ),
    security(("bearer_auth" = []))
)]
pub async fn upload_file(
    State(state): State<AppState>,
    auth: AuthenticatedUser,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<UploadResponse>)> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|_| AppError::Validation("Failed to parse form".to_string()))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let file_name = base_name(field.file_name().unwrap_or_default()).to_string();
        let reader = StreamReader::new(field.map_err(|e| io::Error::new(io::ErrorKind::Other, e)));
        tokio::pin!(reader);

        let record = state.files.upload(auth.id, &file_name, &mut reader).await?;

        let formatter = state.formatter();
        return Ok((
            StatusCode::CREATED,
            Json(UploadResponse {
                message: "File uploaded successfully".to_string(),
                file: FileView::new(&record, formatter),
                unit: formatter.file_unit(),
            }),
        ));
    }

    Err(AppError::Validation("No file provided".to_string()))
}

#[utoipa::path(
    get,
    path = "/api/files",
    tag = "files",
    params(ListQuery),
    responses(
        (status = 200, description = "One page of files, newest first", body = FileListResponse),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_files(
    State(state): State<AppState>,
    auth: AuthenticatedUser,
    Query(query): Query<ListQuery>,
) -> Result<Json<FileListResponse>> {
    let page = query.page();
    let page_size = query.page_size();

    let (files, total) = state.files.list(auth.id, page, page_size).await?;

    let formatter = state.formatter();
    Ok(Json(FileListResponse {
        files: files.iter().map(|f| FileView::new(f, formatter)).collect(),
        pagination: Pagination::new(total, page, page_size),
        unit: formatter.file_unit(),
    }))
}

#[utoipa::path(
    get,
    path = "/api/files/{id}",
    tag = "files",
    params(("id" = Uuid, Path, description = "File ID")),
    responses(
        (status = 200, description = "File metadata", body = FileResponse),
        (status = 400, description = "Invalid file ID"),
        (status = 404, description = "File not found")
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_file(
    State(state): State<AppState>,
    auth: AuthenticatedUser,
    Path(id): Path<String>,
) -> Result<Json<FileResponse>> {
    let file_id = parse_file_id(&id)?;
    let record = state.files.get(file_id, auth.id).await?;

    let formatter = state.formatter();
    Ok(Json(FileResponse {
        file: FileView::new(&record, formatter),
        unit: formatter.file_unit(),
    }))
}

#[utoipa::path(
    get,
    path = "/api/files/{id}/download",
    tag = "files",
    params(("id" = Uuid, Path, description = "File ID")),
    responses(
        (status = 200, description = "File content", content_type = "application/octet-stream"),
        (status = 400, description = "Invalid file ID"),
        (status = 404, description = "File not found")
    ),
    security(("bearer_auth" = []))
)]
pub async fn download_file(
    State(state): State<AppState>,
    auth: AuthenticatedUser,
    Path(id): Path<String>,
) -> Result<Response> {
    let file_id = parse_file_id(&id)?;
    let (file_name, reader) = state.files.download(file_id, auth.id).await?;

    // Names are validated free of control characters at upload.
    let disposition = HeaderValue::from_bytes(format!("attachment; filename={}", file_name).as_bytes())
        .map_err(|e| AppError::Internal(e.into()))?;
    let content_type = HeaderValue::from_str(mime::APPLICATION_OCTET_STREAM.as_ref())
        .map_err(|e| AppError::Internal(e.into()))?;

    let body = Body::from_stream(ReaderStream::new(reader));

    Ok((
        [(header::CONTENT_TYPE, content_type), (header::CONTENT_DISPOSITION, disposition)],
        body,
    )
        .into_response())
}

#[utoipa::path(
    delete,
    path = "/api/files/{id}",
    tag = "files",
    params(("id" = Uuid, Path, description = "File ID")),
    responses(
        (status = 200, description = "File deleted", body = MessageResponse),
        (status = 400, description = "Invalid file ID"),
        (status = 404, description = "File not found")
    ),
    security(("bearer_auth" = []))
)]
pub async fn delete_file(
    State(state): State<AppState>,
    auth: AuthenticatedUser,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>> {
    let file_id = parse_file_id(&id)?;
    state.files.delete(file_id, auth.id).await?;

    Ok(Json(MessageResponse {
        message: "File deleted successfully".to_string(),
    }))
}

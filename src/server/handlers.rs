use std::path::{Path as FsPath, PathBuf};

use axum::body::Bytes;
use axum::extract::{Multipart, Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{error, info};

use crate::ingest::{split_roster_to_groups, IngestOptions, RosterSummary};
use crate::server::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OriginalFile {
    pub name: String,
    pub path: String,
    pub size: u64,
    #[serde(rename = "type")]
    pub content_type: Option<String>,
}

/// Body of a successful upload: file metadata plus the ingestion summary the
/// admin UI persists (sections, group files, students, memberships).
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub original_file: OriginalFile,
    pub upload_date: String,
    #[serde(flatten)]
    pub summary: RosterSummary,
}

pub async fn health() -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "service": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Receive a roster workbook as multipart form data, stage it on disk and run
/// the splitting pipeline over it.
///
/// The file field must be named `file`. When `branchId` and `academicYearId`
/// fields accompany it, the file is staged under that branch/year directory
/// and section names are canonicalized; otherwise it lands under the plain
/// base folder with section spelling preserved. On pipeline failure the
/// staged file is removed again so a retry starts clean.
pub async fn upload(State(state): State<AppState>, mut multipart: Multipart) -> Response {
    let mut file: Option<(String, Option<String>, Bytes)> = None;
    let mut branch_id: Option<String> = None;
    let mut academic_year_id: Option<String> = None;

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(err) => {
                return error_json(
                    StatusCode::BAD_REQUEST,
                    format!("invalid multipart body: {err}"),
                )
            }
        };
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("file") => {
                let file_name = field
                    .file_name()
                    .map(str::to_string)
                    .unwrap_or_else(|| "roster.xlsx".to_string());
                let content_type = field.content_type().map(str::to_string);
                match field.bytes().await {
                    Ok(bytes) => file = Some((file_name, content_type, bytes)),
                    Err(err) => {
                        return error_json(
                            StatusCode::BAD_REQUEST,
                            format!("failed to read upload: {err}"),
                        )
                    }
                }
            }
            Some("branchId") => branch_id = field.text().await.ok(),
            Some("academicYearId") => academic_year_id = field.text().await.ok(),
            _ => {}
        }
    }

    let Some((raw_name, content_type, bytes)) = file else {
        return error_json(StatusCode::BAD_REQUEST, "No file uploaded");
    };
    // Clients occasionally send full paths; keep only the final component.
    let file_name = FsPath::new(&raw_name)
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or(raw_name);
    let file_stem = FsPath::new(&file_name)
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| file_name.clone());

    let contextual = match (&branch_id, &academic_year_id) {
        (Some(branch), Some(year)) => state.config.upload_root.join(branch).join(year),
        _ => state.config.upload_root.join(&state.config.base_folder),
    };
    let dest_dir = contextual.join(&file_stem);
    if let Err(err) = tokio::fs::create_dir_all(&dest_dir).await {
        error!(dir = %dest_dir.display(), %err, "could not create upload directory");
        return error_json(StatusCode::INTERNAL_SERVER_ERROR, "File processing error");
    }
    let staged = dest_dir.join(&file_name);
    if let Err(err) = tokio::fs::write(&staged, &bytes).await {
        error!(file = %staged.display(), %err, "could not stage upload");
        return error_json(StatusCode::INTERNAL_SERVER_ERROR, "File processing error");
    }
    info!(file = %file_name, size = bytes.len(), dir = %dest_dir.display(), "staged upload");

    let normalized = branch_id.is_some() && academic_year_id.is_some();
    let opts = IngestOptions {
        normalize_sections: normalized,
        include_rows_in_report: !normalized,
        context: branch_id
            .as_deref()
            .zip(academic_year_id.as_deref())
            .map(|(branch, year)| format!("{branch}/{year}")),
        ..IngestOptions::default()
    };

    // The pipeline is synchronous disk work; keep it off the runtime threads.
    let task_path = staged.clone();
    let task_name = file_name.clone();
    let outcome =
        tokio::task::spawn_blocking(move || split_roster_to_groups(&task_path, &task_name, &opts))
            .await;

    let summary = match outcome {
        Ok(Ok(summary)) => summary,
        Ok(Err(err)) => {
            error!(file = %file_name, %err, "roster processing failed");
            let _ = tokio::fs::remove_file(&staged).await;
            return error_json(StatusCode::INTERNAL_SERVER_ERROR, err.to_string());
        }
        Err(err) => {
            error!(file = %file_name, %err, "roster processing task aborted");
            let _ = tokio::fs::remove_file(&staged).await;
            return error_json(StatusCode::INTERNAL_SERVER_ERROR, "File processing error");
        }
    };

    Json(UploadResponse {
        original_file: OriginalFile {
            name: file_name,
            path: staged.display().to_string(),
            size: bytes.len() as u64,
            content_type,
        },
        upload_date: Utc::now().to_rfc3339(),
        summary,
    })
    .into_response()
}

#[derive(Debug, Deserialize)]
pub struct DownloadQuery {
    #[serde(rename = "groupPath")]
    pub group_path: String,
}

/// Stream a previously generated group file back to the client.
pub async fn download(Path(group_id): Path<String>, Query(query): Query<DownloadQuery>) -> Response {
    if query.group_path.contains("..") {
        return error_json(StatusCode::BAD_REQUEST, "Invalid file path");
    }
    let file_path = PathBuf::from(&query.group_path);

    match tokio::fs::metadata(&file_path).await {
        Err(_) => return error_json(StatusCode::NOT_FOUND, "File not found"),
        Ok(meta) if !meta.is_file() => {
            return error_json(StatusCode::BAD_REQUEST, "Path does not point to a file")
        }
        Ok(_) => {}
    }

    let bytes = match tokio::fs::read(&file_path).await {
        Ok(bytes) => bytes,
        Err(err) => {
            error!(file = %file_path.display(), %err, "error reading group file");
            return error_json(StatusCode::INTERNAL_SERVER_ERROR, "Error downloading file");
        }
    };

    let file_name = file_path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "download".to_string());
    info!(group = %group_id, file = %file_name, "serving group file");

    (
        [
            (header::CONTENT_TYPE, content_type_for(&file_path).to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{file_name}\""),
            ),
        ],
        bytes,
    )
        .into_response()
}

fn content_type_for(path: &FsPath) -> &'static str {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_lowercase);
    match extension.as_deref() {
        Some("xlsx") => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        Some("xls") => "application/vnd.ms-excel",
        Some("csv") => "text/csv",
        Some("pdf") => "application/pdf",
        Some("doc") => "application/msword",
        Some("docx") => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        _ => "application/octet-stream",
    }
}

fn error_json(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(json!({ "error": message.into() }))).into_response()
}

use crate::dtos::{DeleteFileQuery, DeleteUserDataResponse, MessageResponse};
use crate::services::validation::validate_user_id;
use crate::startup::AppState;
use axum::{
    extract::{rejection::QueryRejection, Path, Query, State},
    Json,
};
use service_core::error::AppError;

pub async fn delete_user_data(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<DeleteUserDataResponse>, AppError> {
    let user_id = validate_user_id(Some(&user_id))?;

    let deleted_folders = state.uploader.delete_user_data(&user_id).await;
    let total_files_deleted: usize = deleted_folders.iter().map(|f| f.files_deleted).sum();

    let message = if deleted_folders.is_empty() {
        format!("No folders found with name '{}' in any directory", user_id)
    } else {
        format!(
            "Successfully deleted folder '{}' from {} directories",
            user_id,
            deleted_folders.len()
        )
    };
    tracing::info!(user_id = %user_id, total_files_deleted, "User data deletion finished");

    Ok(Json(DeleteUserDataResponse {
        message,
        deleted_folders,
        total_files_deleted,
    }))
}

pub async fn delete_file(
    State(state): State<AppState>,
    query: Result<Query<DeleteFileQuery>, QueryRejection>,
) -> Result<Json<MessageResponse>, AppError> {
    let Query(query) = query.map_err(|e| AppError::InvalidInput(e.body_text()))?;
    let file_url = query.file_url.trim();
    if file_url.is_empty() {
        return Err(AppError::InvalidInput("file_url is required".to_string()));
    }

    state.uploader.delete_url(file_url).await?;

    Ok(Json(MessageResponse {
        message: "File deleted successfully".to_string(),
    }))
}

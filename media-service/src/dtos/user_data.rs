use crate::services::uploader::FolderDeletion;
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct DeleteFileQuery {
    pub file_url: String,
}

#[derive(Debug, Serialize)]
pub struct DeleteUserDataResponse {
    pub message: String,
    pub deleted_folders: Vec<FolderDeletion>,
    pub total_files_deleted: usize,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

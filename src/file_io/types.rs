//! Upload/download result types.

use serde::{Deserialize, Serialize};

use crate::error::ReasonCode;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadResult {
    pub success: bool,
    pub file_path: String,
    pub reason: Option<ReasonCode>,
    pub message: Option<String>,
    pub preview_verified: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadResult {
    pub success: bool,
    pub file_path: Option<String>,
    pub size_bytes: Option<u64>,
    pub reason: Option<ReasonCode>,
    pub message: Option<String>,
    pub checksum: Option<String>,
}

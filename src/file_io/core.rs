//! File I/O Manager: uploads, downloads, and file-chooser handling.
//!
//! Stability polling uses `tokio::fs` rather than blocking `std::fs` so
//! it never stalls the runtime's worker threads, and checksums use
//! SHA-256 (`sha2`).

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use sha2::{Digest, Sha256};

use crate::error::{CdpError, ReasonCode, Result};
use crate::selectors::{ElementHandle, Locator, SelectorEngine};
use crate::session::Session;

use super::types::{DownloadResult, UploadResult};

const DEFAULT_PREVIEW_SELECTORS: &[&str] = &[
    "img[src^=\"blob:\"]",
    ".file-preview",
    "[data-file-name]",
    ".upload-preview",
];

#[derive(Debug, Clone)]
struct TrackedDownload {
    guid: String,
    suggested_filename: String,
    file_path: Option<PathBuf>,
    state: String,
}

/// Tracks in-progress/completed downloads via `Browser.downloadWillBegin`/
/// `Browser.downloadProgress`, and drives file uploads through
/// `DOM.setFileInputFiles`.
pub struct FileIOManager {
    session: Arc<Session>,
    selectors: Arc<SelectorEngine>,
    downloads: Mutex<HashMap<String, TrackedDownload>>,
}

impl FileIOManager {
    #[must_use]
    pub fn new(session: Arc<Session>, selectors: Arc<SelectorEngine>) -> Arc<Self> {
        let manager = Arc::new(Self {
            session,
            selectors,
            downloads: Mutex::new(HashMap::new()),
        });
        manager.spawn_listener();
        manager
    }

    fn spawn_listener(self: &Arc<Self>) {
        let mut begin = self.session.events().on("Browser.downloadWillBegin");
        let mut progress = self.session.events().on("Browser.downloadProgress");
        let this = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    Some(event) = begin.recv() => {
                        if let Some(guid) = event.field_str("guid") {
                            let suggested_filename = event.field_str("suggestedFilename").unwrap_or_default().to_string();
                            this.downloads.lock().insert(
                                guid.to_string(),
                                TrackedDownload { guid: guid.to_string(), suggested_filename, file_path: None, state: "pending".to_string() },
                            );
                        }
                    }
                    Some(event) = progress.recv() => {
                        let Some(guid) = event.field_str("guid") else { continue };
                        let state = event.field_str("state").unwrap_or("unknown").to_string();
                        let file_path = event.field_str("filePath").map(PathBuf::from);
                        let mut downloads = this.downloads.lock();
                        let entry = downloads.entry(guid.to_string()).or_insert_with(|| TrackedDownload {
                            guid: guid.to_string(),
                            suggested_filename: String::new(),
                            file_path: None,
                            state: String::new(),
                        });
                        entry.state = state;
                        if file_path.is_some() {
                            entry.file_path = file_path;
                        }
                    }
                    else => break,
                }
            }
        });
    }

    /// Uploads `file_path` into the file input matched by `locator`.
    /// Verifies the path exists on disk before touching the DOM.
    pub async fn upload_file(&self, locator: &Locator, file_path: &Path, verify_preview: bool) -> Result<UploadResult> {
        if !tokio::fs::try_exists(file_path).await.unwrap_or(false) {
            return Ok(UploadResult {
                success: false,
                file_path: file_path.display().to_string(),
                reason: Some(ReasonCode::UploadFailed),
                message: Some(format!("{} does not exist", file_path.display())),
                preview_verified: false,
            });
        }

        let Some(handle) = self.selectors.find(locator).await? else {
            return Ok(UploadResult {
                success: false,
                file_path: file_path.display().to_string(),
                reason: Some(ReasonCode::ElementNotFound),
                message: Some(format!("no file input matched {}", locator.description)),
                preview_verified: false,
            });
        };

        self.session
            .send_command(
                "DOM.setFileInputFiles",
                serde_json::json!({
                    "nodeId": handle.node_id,
                    "files": [file_path.to_string_lossy()],
                }),
            )
            .await?;

        self.dispatch_change(&handle).await?;

        let preview_verified = if verify_preview {
            self.verify_upload_preview().await
        } else {
            true
        };

        Ok(UploadResult {
            success: true,
            file_path: file_path.display().to_string(),
            reason: None,
            message: None,
            preview_verified,
        })
    }

    async fn dispatch_change(&self, handle: &ElementHandle) -> Result<()> {
        let Some(object_id) = handle.object_id.as_deref() else { return Ok(()) };
        self.session
            .call_function_on(
                Some(object_id),
                "function() { this.dispatchEvent(new Event('change', {bubbles: true})); return 'ok'; }",
                &[],
            )
            .await?;
        Ok(())
    }

    async fn verify_upload_preview(&self) -> bool {
        for selector in DEFAULT_PREVIEW_SELECTORS {
            if let Ok(Some(_)) = self.selectors.find(&crate::selectors::by_css(*selector)).await {
                return true;
            }
        }
        false
    }

    /// Optionally runs `trigger`, then polls for a newly completed
    /// download — whose suggested filename contains `expected_filename`,
    /// if given — and waits for its file size to stabilize.
    pub async fn wait_for_download<F, Fut>(
        &self,
        trigger: Option<F>,
        expected_filename: Option<&str>,
        timeout_ms: u64,
        download_dir: &Path,
    ) -> Result<DownloadResult>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<()>>,
    {
        self.session
            .send_command(
                "Browser.setDownloadBehavior",
                serde_json::json!({"behavior": "allow", "downloadPath": download_dir.to_string_lossy()}),
            )
            .await?;

        let known_guids: std::collections::HashSet<String> = self.downloads.lock().keys().cloned().collect();

        if let Some(trigger) = trigger {
            trigger().await?;
        }

        let deadline = Instant::now() + Duration::from_millis(timeout_ms);
        let completed_path = loop {
            if let Some(path) = self.find_newly_completed(&known_guids, expected_filename) {
                break Some(path);
            }
            if Instant::now() >= deadline {
                break None;
            }
            tokio::time::sleep(Duration::from_millis(200)).await;
        };

        let Some(path) = completed_path else {
            return Ok(DownloadResult {
                success: false,
                file_path: None,
                size_bytes: None,
                reason: Some(ReasonCode::TimeoutNetwork),
                message: Some(format!("no download completed within {timeout_ms}ms")),
                checksum: None,
            });
        };

        match self.verify_file_stable(&path, 3, Duration::from_millis(200)).await {
            Some(size) => Ok(DownloadResult {
                success: true,
                file_path: Some(path.display().to_string()),
                size_bytes: Some(size),
                reason: None,
                message: None,
                checksum: None,
            }),
            None => Ok(DownloadResult {
                success: false,
                file_path: Some(path.display().to_string()),
                size_bytes: None,
                reason: Some(ReasonCode::FileNotReady),
                message: Some("file size did not stabilize".to_string()),
                checksum: None,
            }),
        }
    }

    fn find_newly_completed(
        &self,
        known_guids: &std::collections::HashSet<String>,
        expected_filename: Option<&str>,
    ) -> Option<PathBuf> {
        self.downloads
            .lock()
            .values()
            .find(|d| {
                d.state == "completed"
                    && !known_guids.contains(&d.guid)
                    && expected_filename.is_none_or(|name| d.suggested_filename.contains(name))
            })
            .and_then(|d| d.file_path.clone())
    }

    /// Polls the file's size `checks` times at `interval`, requiring every
    /// observation to be equal and non-zero before declaring it stable.
    async fn verify_file_stable(&self, path: &Path, checks: u32, interval: Duration) -> Option<u64> {
        let mut last_size: Option<u64> = None;
        let mut stable_count = 0;
        loop {
            let size = tokio::fs::metadata(path).await.ok()?.len();
            if size > 0 && Some(size) == last_size {
                stable_count += 1;
                if stable_count >= checks {
                    return Some(size);
                }
            } else {
                stable_count = 0;
            }
            last_size = Some(size);
            tokio::time::sleep(interval).await;
        }
    }

    pub async fn calculate_checksum(&self, path: &Path) -> Result<String> {
        let bytes = tokio::fs::read(path).await.map_err(CdpError::from)?;
        let digest = Sha256::digest(&bytes);
        Ok(hex_encode(&digest))
    }

    pub async fn verify_download_checksum(&self, path: &Path, expected_hex: &str) -> Result<bool> {
        let actual = self.calculate_checksum(path).await?;
        Ok(actual.eq_ignore_ascii_case(expected_hex))
    }

    /// Enables file-chooser interception, waits for `Page.fileChooserOpened`,
    /// and responds via the accept path: `DOM.setFileInputFiles` targeted
    /// at the event's `backendNodeId` rather than a selector lookup, since
    /// the chooser may have been opened by a native `<input type=file>`
    /// click the caller never resolved a handle for.
    pub async fn handle_file_chooser(&self, files: &[PathBuf], timeout_ms: u64) -> Result<()> {
        self.session
            .send_command("Page.setInterceptFileChooserDialog", serde_json::json!({"enabled": true}))
            .await?;

        let mut opened = self.session.events().on("Page.fileChooserOpened");
        let event = tokio::time::timeout(Duration::from_millis(timeout_ms), opened.recv())
            .await
            .map_err(|_| CdpError::new(ReasonCode::TimeoutStep, "no file chooser opened"))?
            .ok_or_else(|| CdpError::new(ReasonCode::CdpDisconnected, "event stream closed"))?;

        let backend_node_id = event
            .params
            .get("backendNodeId")
            .ok_or_else(|| CdpError::new(ReasonCode::CdpProtocolError, "fileChooserOpened had no backendNodeId"))?
            .clone();
        let file_paths: Vec<String> = files.iter().map(|p| p.to_string_lossy().to_string()).collect();

        self.session
            .send_command(
                "DOM.setFileInputFiles",
                serde_json::json!({"files": file_paths, "backendNodeId": backend_node_id}),
            )
            .await?;
        Ok(())
    }
}

fn hex_encode(bytes: &[u8]) -> String {
    use std::fmt::Write;
    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        let _ = write!(out, "{byte:02x}");
    }
    out
}

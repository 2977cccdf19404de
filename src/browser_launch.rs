//! Optional local Chrome/Chromium launcher.
//!
//! The client's core assumes an already-running browser with a debugging
//! endpoint. When a caller has no such endpoint to point at, this module
//! launches one locally and hands back the `remote_port` the
//! [`crate::transport`] discovery path expects. It only launches an
//! already-installed Chrome/Chromium binary found on the host
//! ([`find_browser_executable`]) — it never downloads or bundles a
//! browser, so a caller with no local install gets a clear error rather
//! than a fetched binary.
//!
//! This module does not hand the launched process to a managed driver —
//! [`crate::session::Session`] owns its own WebSocket, so the only thing
//! this module needs from the browser is a live `remote-debugging-port`
//! and a process to tear down on close.

use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::time::Duration;

use tracing::{info, warn};

use crate::browser_profile::BrowserProfile;
use crate::error::{CdpError, ReasonCode, Result};
use crate::utils::CHROME_USER_AGENT;

/// Options for launching a local browser. `remote_port = 0` asks the OS
/// for an ephemeral port; the actual bound port is read back from the
/// `DevToolsActivePort` file Chrome writes into its user-data directory.
#[derive(Debug, Clone)]
pub struct LaunchOptions {
    pub headless: bool,
    pub remote_port: u16,
    pub window_size: (u32, u32),
    pub chrome_data_dir: Option<PathBuf>,
}

impl Default for LaunchOptions {
    fn default() -> Self {
        Self { headless: true, remote_port: 0, window_size: (1920, 1080), chrome_data_dir: None }
    }
}

/// A locally-launched browser process. Killing the process and cleaning
/// up its generated profile directory (if any) happen on `Drop` unless
/// [`Self::detach`] was called. A caller-supplied `chrome_data_dir` is
/// never auto-deleted — the caller owns its lifecycle.
pub struct LocalBrowser {
    child: Option<Child>,
    profile: Option<BrowserProfile>,
    port: u16,
}

impl LocalBrowser {
    #[must_use]
    pub fn remote_port(&self) -> u16 {
        self.port
    }

    /// Leaves the process and generated profile directory running/on-disk
    /// rather than tearing them down on drop.
    pub fn detach(&mut self) {
        self.child = None;
        if let Some(profile) = self.profile.take() {
            let _ = profile.into_path();
        }
    }
}

impl Drop for LocalBrowser {
    fn drop(&mut self) {
        if let Some(mut child) = self.child.take() {
            if let Err(e) = child.kill() {
                warn!(error = %e, "failed to kill local browser process on drop");
            }
            let _ = child.wait();
        }
    }
}

/// Finds a Chrome/Chromium executable via the environment override, a set
/// of platform-specific well-known install paths, then `which`.
pub fn find_browser_executable() -> Result<PathBuf> {
    if let Ok(path) = std::env::var("CHROMIUM_PATH") {
        let path = PathBuf::from(path);
        if path.exists() {
            info!(path = %path.display(), "using browser from CHROMIUM_PATH");
            return Ok(path);
        }
        warn!(path = %path.display(), "CHROMIUM_PATH points to a non-existent file");
    }

    let candidates: &[&str] = if cfg!(target_os = "windows") {
        &[
            r"C:\Program Files\Google\Chrome\Application\chrome.exe",
            r"C:\Program Files (x86)\Google\Chrome\Application\chrome.exe",
            r"C:\Program Files\Chromium\Application\chrome.exe",
        ]
    } else if cfg!(target_os = "macos") {
        &[
            "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
            "/Applications/Chromium.app/Contents/MacOS/Chromium",
            "/opt/homebrew/bin/chromium",
        ]
    } else {
        &[
            "/usr/bin/google-chrome",
            "/usr/bin/google-chrome-stable",
            "/usr/bin/chromium",
            "/usr/bin/chromium-browser",
            "/snap/bin/chromium",
            "/usr/local/bin/chromium",
            "/opt/google/chrome/chrome",
        ]
    };

    for candidate in candidates {
        let path = PathBuf::from(candidate);
        if path.exists() {
            info!(path = %path.display(), "found browser executable");
            return Ok(path);
        }
    }

    if !cfg!(target_os = "windows") {
        for cmd in ["chromium", "chromium-browser", "google-chrome", "chrome"] {
            if let Ok(output) = Command::new("which").arg(cmd).output()
                && output.status.success()
            {
                let found = String::from_utf8_lossy(&output.stdout).trim().to_string();
                if !found.is_empty() {
                    info!(path = %found, "found browser executable via which");
                    return Ok(PathBuf::from(found));
                }
            }
        }
    }

    Err(CdpError::new(ReasonCode::SystemError, "no Chrome/Chromium executable found"))
}

/// Launches a local Chrome/Chromium process with a fresh, isolated profile
/// and `--remote-debugging-port`, then polls the `DevToolsActivePort` file
/// Chrome writes at startup until the port is readable.
///
/// Requires an already-installed Chrome/Chromium binary (see
/// [`find_browser_executable`]); this crate never downloads or bundles a
/// browser of its own.
pub async fn launch_browser(options: LaunchOptions) -> Result<LocalBrowser> {
    let chrome_path = find_browser_executable()?;

    let (profile, profile_dir) = match options.chrome_data_dir {
        Some(dir) => {
            std::fs::create_dir_all(&dir)
                .map_err(|e| CdpError::system(format!("creating profile dir: {e}")))?;
            (None, dir)
        }
        None => {
            let profile = crate::browser_profile::create_unique_profile()
                .map_err(|e| CdpError::system(format!("creating profile: {e}")))?;
            let dir = profile.path().to_path_buf();
            (Some(profile), dir)
        }
    };

    let mut command = Command::new(&chrome_path);
    command
        .arg(format!("--remote-debugging-port={}", options.remote_port))
        .arg(format!("--user-data-dir={}", profile_dir.display()))
        .arg(format!("--window-size={},{}", options.window_size.0, options.window_size.1))
        .arg(format!("--user-agent={CHROME_USER_AGENT}"))
        .arg("--no-first-run")
        .arg("--no-default-browser-check")
        .stdout(Stdio::null())
        .stderr(Stdio::null());
    if options.headless {
        command.arg("--headless=new");
    }

    let child = command
        .spawn()
        .map_err(|e| CdpError::system(format!("spawning browser process: {e}")))?;

    let port = read_devtools_active_port(&profile_dir, Duration::from_secs(10)).await?;
    info!(port, "local browser ready");

    Ok(LocalBrowser { child: Some(child), profile, port })
}

/// Polls Chrome's `DevToolsActivePort` file (`<line 1>: port`, `<line 2>:
/// path`) until it appears and parses, or the deadline elapses.
async fn read_devtools_active_port(profile_dir: &std::path::Path, timeout: Duration) -> Result<u16> {
    let marker = profile_dir.join("DevToolsActivePort");
    let deadline = tokio::time::Instant::now() + timeout;

    loop {
        if let Ok(contents) = std::fs::read_to_string(&marker)
            && let Some(first_line) = contents.lines().next()
            && let Ok(port) = first_line.trim().parse::<u16>()
        {
            return Ok(port);
        }
        if tokio::time::Instant::now() >= deadline {
            return Err(CdpError::new(
                ReasonCode::TimeoutStep,
                "timed out waiting for DevToolsActivePort",
            ));
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn devtools_port_file_is_parsed_once_written() {
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("DevToolsActivePort");
        let path = dir.path().to_path_buf();
        let writer = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            std::fs::write(&marker, "34567\n/devtools/browser/abc-123\n").unwrap();
        });
        let port = read_devtools_active_port(&path, Duration::from_secs(2)).await.unwrap();
        assert_eq!(port, 34567);
        writer.await.unwrap();
    }

    #[tokio::test]
    async fn devtools_port_file_missing_times_out() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_devtools_active_port(dir.path(), Duration::from_millis(150)).await.unwrap_err();
        assert_eq!(err.code, ReasonCode::TimeoutStep);
    }
}

use crate::core::ScreenshotCapturer;
use crate::utils::error::{DataError, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::process::Command;

/// Headless Chromium driven through its `--screenshot` switch.
#[derive(Debug, Clone)]
pub struct ChromeCapturer {
    binary: String,
    window_width: u32,
    window_height: u32,
    settle: Duration,
    timeout: Duration,
}

impl ChromeCapturer {
    pub fn new(binary: impl Into<String>, window_width: u32, window_height: u32, settle: Duration) -> Self {
        Self {
            binary: binary.into(),
            window_width,
            window_height,
            settle,
            // 頁面等待時間之外再給 30 秒啟動與繪製
            timeout: settle + Duration::from_secs(30),
        }
    }

    pub fn args(&self, url: &str, output: &Path) -> Vec<String> {
        vec![
            "--headless".to_string(),
            "--no-sandbox".to_string(),
            "--disable-dev-shm-usage".to_string(),
            "--disable-gpu".to_string(),
            "--hide-scrollbars".to_string(),
            format!("--window-size={},{}", self.window_width, self.window_height),
            format!("--virtual-time-budget={}", self.settle.as_millis()),
            format!("--screenshot={}", output.display()),
            url.to_string(),
        ]
    }
}

#[async_trait]
impl ScreenshotCapturer for ChromeCapturer {
    async fn capture(&self, url: &str, output: &Path) -> Result<PathBuf> {
        if let Some(parent) = output.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        tracing::debug!("📸 {} {}", self.binary, url);
        let child = Command::new(&self.binary)
            .args(self.args(url, output))
            .kill_on_drop(true)
            .output();

        let result = tokio::time::timeout(self.timeout, child)
            .await
            .map_err(|_| DataError::ScreenshotError {
                message: format!("Timed out after {:?} capturing {}", self.timeout, url),
            })?
            .map_err(|e| DataError::ScreenshotError {
                message: format!("Failed to launch {}: {}", self.binary, e),
            })?;

        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr);
            return Err(DataError::ScreenshotError {
                message: format!(
                    "{} exited with {}: {}",
                    self.binary,
                    result.status,
                    stderr.lines().last().unwrap_or_default()
                ),
            });
        }

        if !tokio::fs::try_exists(output).await.unwrap_or(false) {
            return Err(DataError::ScreenshotError {
                message: format!("No screenshot written for {}", url),
            });
        }
        Ok(output.to_path_buf())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chrome_args() {
        let capturer = ChromeCapturer::new("chromium", 1400, 800, Duration::from_secs(5));
        let args = capturer.args("https://smith.example", Path::new("screenshots/smith-homepage.png"));

        assert!(args.contains(&"--headless".to_string()));
        assert!(args.contains(&"--no-sandbox".to_string()));
        assert!(args.contains(&"--window-size=1400,800".to_string()));
        assert!(args.contains(&"--virtual-time-budget=5000".to_string()));
        assert!(args.contains(&"--screenshot=screenshots/smith-homepage.png".to_string()));
        assert_eq!(args.last().map(String::as_str), Some("https://smith.example"));
    }

    #[tokio::test]
    async fn test_missing_binary_is_screenshot_error() {
        let dir = tempfile::tempdir().unwrap();
        let capturer = ChromeCapturer::new(
            "/nonexistent/diamond-chromium",
            1400,
            800,
            Duration::from_millis(10),
        );

        let err = capturer
            .capture("https://smith.example", &dir.path().join("shot.png"))
            .await
            .unwrap_err();
        assert!(matches!(err, DataError::ScreenshotError { .. }));
    }
}

//! Browser session configuration.
//!
//! Settings are read from a camelCase JSON document, and environment variables may override
//! the fields that typically differ between a developer machine and CI:
//!
//! | variable                  | field               |
//! |---------------------------|---------------------|
//! | `KARPATIUM_BROWSER`       | `browserType`       |
//! | `KARPATIUM_HEADLESS`      | `isHeadlessEnabled` |
//! | `KARPATIUM_LOCAL`         | `isLocalExecution`  |
//! | `KARPATIUM_REMOTE_URL`    | `remoteUrl`         |
//! | `KARPATIUM_WEBDRIVER_URL` | `webdriverUrl`      |
//! | `KARPATIUM_TIMEOUT`       | `defaultTimeoutSeconds` |

use crate::error::NewSessionError;
use crate::wd::BrowserType;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// How to create and drive a browser session.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BrowserSettings {
    /// The browser to start.
    pub browser_type: BrowserType,
    /// The folder below the user's home directory that downloads are saved to. An absolute
    /// path is used as is.
    pub downloaded_files_folder_name: String,
    /// Run the browser without a window.
    pub is_headless_enabled: bool,
    /// Talk to a driver on this machine rather than to `remote_url`.
    pub is_local_execution: bool,
    /// The WebDriver endpoint used when execution is not local, e.g. a Selenium Grid hub.
    pub remote_url: Option<String>,
    /// Overrides the conventional local driver endpoint of the browser.
    pub webdriver_url: Option<String>,
    /// The timeout of every wait, in seconds.
    pub default_timeout_seconds: u64,
    /// The pause between two attempts of a wait, in milliseconds.
    pub poll_interval_millis: u64,
    /// The pause between the two reads of the page stability check, in milliseconds.
    pub page_stability_interval_millis: u64,
}

impl Default for BrowserSettings {
    fn default() -> Self {
        BrowserSettings {
            browser_type: BrowserType::Chrome,
            downloaded_files_folder_name: "Downloads".to_string(),
            is_headless_enabled: false,
            is_local_execution: true,
            remote_url: None,
            webdriver_url: None,
            default_timeout_seconds: 10,
            poll_interval_millis: 50,
            page_stability_interval_millis: 100,
        }
    }
}

fn parse_flag(var: &str, value: &str) -> Result<bool, NewSessionError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(NewSessionError::InvalidSettings(format!(
            "{} must be a boolean, got `{}`",
            var, value
        ))),
    }
}

impl BrowserSettings {
    /// Parse settings from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, NewSessionError> {
        serde_json::from_str(json).map_err(|e| NewSessionError::InvalidSettings(e.to_string()))
    }

    /// Read settings from a JSON file.
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, NewSessionError> {
        let content = tokio::fs::read_to_string(path.as_ref()).await?;
        Self::from_json(&content)
    }

    /// Apply the `KARPATIUM_*` environment variables on top of these settings.
    pub fn with_env_overrides(self) -> Result<Self, NewSessionError> {
        self.with_overrides(|var| std::env::var(var).ok())
    }

    fn with_overrides<F>(mut self, lookup: F) -> Result<Self, NewSessionError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("KARPATIUM_BROWSER") {
            self.browser_type = v.parse().map_err(|e| {
                NewSessionError::InvalidSettings(format!("KARPATIUM_BROWSER: {}", e))
            })?;
        }
        if let Some(v) = lookup("KARPATIUM_HEADLESS") {
            self.is_headless_enabled = parse_flag("KARPATIUM_HEADLESS", &v)?;
        }
        if let Some(v) = lookup("KARPATIUM_LOCAL") {
            self.is_local_execution = parse_flag("KARPATIUM_LOCAL", &v)?;
        }
        if let Some(v) = lookup("KARPATIUM_REMOTE_URL") {
            self.remote_url = Some(v);
        }
        if let Some(v) = lookup("KARPATIUM_WEBDRIVER_URL") {
            self.webdriver_url = Some(v);
        }
        if let Some(v) = lookup("KARPATIUM_TIMEOUT") {
            self.default_timeout_seconds = v.trim().parse().map_err(|_| {
                NewSessionError::InvalidSettings(format!(
                    "KARPATIUM_TIMEOUT must be a number of seconds, got `{}`",
                    v
                ))
            })?;
        }
        Ok(self)
    }

    /// Reject settings no session can be created from.
    pub fn validate(&self) -> Result<(), NewSessionError> {
        if !self.is_local_execution {
            let remote = self.remote_url.as_deref().unwrap_or("").trim();
            if remote.is_empty() {
                return Err(NewSessionError::InvalidSettings(
                    "remote execution requires `remoteUrl`".to_string(),
                ));
            }
            url::Url::parse(remote)?;
        }
        if let Some(ref wd) = self.webdriver_url {
            url::Url::parse(wd)?;
        }
        if self.is_headless_enabled && self.browser_type == BrowserType::Safari {
            return Err(NewSessionError::InvalidSettings(
                "safari does not support headless mode".to_string(),
            ));
        }
        if self.downloaded_files_folder_name.trim().is_empty() {
            return Err(NewSessionError::InvalidSettings(
                "`downloadedFilesFolderName` must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// The timeout of every wait.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.default_timeout_seconds)
    }

    /// The pause between two attempts of a wait.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_millis)
    }

    /// The pause between the two reads of the page stability check.
    pub fn page_stability_interval(&self) -> Duration {
        Duration::from_millis(self.page_stability_interval_millis)
    }

    /// The folder downloads are saved to, below the user's home directory.
    pub fn download_dir(&self) -> Result<PathBuf, NewSessionError> {
        let folder = Path::new(&self.downloaded_files_folder_name);
        if folder.is_absolute() {
            return Ok(folder.to_path_buf());
        }
        let home = dirs::home_dir().ok_or_else(|| {
            NewSessionError::InvalidSettings("the user's home directory is unknown".to_string())
        })?;
        Ok(home.join(folder))
    }
}

//! Creating browser sessions.

use crate::driver::Driver;
use crate::error::NewSessionError;
use crate::remote::WebDriverBackend;
use crate::settings::BrowserSettings;
use crate::wd::BrowserType;
use async_trait::async_trait;
use serde_json::{json, Value as Json};
use std::fmt::Debug;
use std::path::Path;
use std::sync::Arc;

/// W3C capabilities, as sent in a New Session request.
pub type Capabilities = serde_json::Map<String, Json>;

const SAVE_TO_DISK_MIME_TYPES: &str = "application/pdf,application/zip,application/octet-stream,\
text/csv,application/vnd.ms-excel,image/jpeg,image/png,image/gif,image/bmp,image/webp,\
image/svg+xml,image/tiff,image/x-icon,image/pjpeg";

/// Creates driver sessions for one or more browser types.
#[async_trait]
pub trait BrowserFactory: Send + Sync + Debug {
    /// Start a session according to `settings`.
    async fn create(&self, settings: &BrowserSettings) -> Result<Arc<dyn Driver>, NewSessionError>;
}

/// The capabilities for starting `settings.browser_type` with downloads going to `download_dir`.
pub fn capabilities(
    settings: &BrowserSettings,
    download_dir: &Path,
) -> Result<Capabilities, NewSessionError> {
    let dir = download_dir.display().to_string();
    let mut caps = Capabilities::new();
    match settings.browser_type {
        BrowserType::Chrome | BrowserType::Edge => {
            let mut args = Vec::new();
            if settings.is_headless_enabled {
                args.push("--headless=new");
                args.push("window-size=1920,1080");
            }
            let opts = json!({
                "args": args,
                "prefs": {
                    "disable-popup-blocking": true,
                    "download.default_directory": dir,
                    "download.prompt_for_download": false,
                },
            });
            let (name, key) = if settings.browser_type == BrowserType::Chrome {
                ("chrome", "goog:chromeOptions")
            } else {
                ("MicrosoftEdge", "ms:edgeOptions")
            };
            caps.insert("browserName".to_string(), Json::from(name));
            caps.insert(key.to_string(), opts);
        }
        BrowserType::Firefox => {
            let mut args = Vec::new();
            if settings.is_headless_enabled {
                args.push("-headless");
                args.push("--width=1920");
                args.push("--height=1080");
            }
            let opts = json!({
                "args": args,
                "prefs": {
                    "browser.download.folderList": 2,
                    "browser.download.dir": dir,
                    "browser.download.useDownloadDir": true,
                    "browser.helperApps.neverAsk.saveToDisk": SAVE_TO_DISK_MIME_TYPES,
                    "browser.download.manager.showWhenStarting": false,
                    "browser.helperApps.alwaysAsk.force": false,
                },
            });
            caps.insert("browserName".to_string(), Json::from("firefox"));
            caps.insert("moz:firefoxOptions".to_string(), opts);
        }
        BrowserType::Safari => {
            if settings.is_headless_enabled {
                return Err(NewSessionError::InvalidSettings(
                    "safari does not support headless mode".to_string(),
                ));
            }
            caps.insert("browserName".to_string(), Json::from("safari"));
        }
    }
    Ok(caps)
}

/// The WebDriver endpoint a session for `settings` is requested from.
///
/// Local sessions go to the conventional port of the browser's driver unless `webdriverUrl`
/// says otherwise.
pub fn endpoint(settings: &BrowserSettings) -> Result<url::Url, NewSessionError> {
    let url = if !settings.is_local_execution {
        settings.remote_url.as_deref().unwrap_or("")
    } else if let Some(ref url) = settings.webdriver_url {
        url.as_str()
    } else {
        match settings.browser_type {
            BrowserType::Chrome | BrowserType::Edge => "http://localhost:9515",
            BrowserType::Firefox | BrowserType::Safari => "http://localhost:4444",
        }
    };
    Ok(url::Url::parse(url)?)
}

/// Starts sessions through a WebDriver server such as chromedriver or a Selenium Grid.
#[derive(Clone, Copy, Debug, Default)]
pub struct WebDriverFactory;

#[async_trait]
impl BrowserFactory for WebDriverFactory {
    async fn create(&self, settings: &BrowserSettings) -> Result<Arc<dyn Driver>, NewSessionError> {
        settings.validate()?;
        let caps = capabilities(settings, &settings.download_dir()?)?;
        let url = endpoint(settings)?;
        tracing::debug!(browser = %settings.browser_type, %url, "requesting webdriver session");

        let mut builder = fantoccini::ClientBuilder::native();
        builder.capabilities(caps);
        let client = builder.connect(url.as_str()).await?;
        let backend = WebDriverBackend::new(client, settings.browser_type);
        Ok(Arc::new(backend))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(browser_type: BrowserType, headless: bool) -> BrowserSettings {
        BrowserSettings {
            browser_type,
            is_headless_enabled: headless,
            ..Default::default()
        }
    }

    #[test]
    fn headless_chrome() {
        let caps = capabilities(
            &settings(BrowserType::Chrome, true),
            Path::new("/home/qa/Downloads"),
        )
        .unwrap();
        let opts = &caps["goog:chromeOptions"];
        assert_eq!(
            opts["args"],
            json!(["--headless=new", "window-size=1920,1080"])
        );
        assert_eq!(
            opts["prefs"]["download.default_directory"],
            json!("/home/qa/Downloads")
        );
        assert_eq!(
            opts["prefs"]["download.prompt_for_download"],
            json!(false)
        );
    }

    #[test]
    fn edge_uses_its_own_key() {
        let caps = capabilities(&settings(BrowserType::Edge, false), Path::new("/tmp")).unwrap();
        assert!(caps.contains_key("ms:edgeOptions"));
        assert!(!caps.contains_key("goog:chromeOptions"));
        assert_eq!(caps["ms:edgeOptions"]["args"], json!([]));
    }

    #[test]
    fn firefox_download_prefs() {
        let caps = capabilities(
            &settings(BrowserType::Firefox, true),
            Path::new("/tmp/dl"),
        )
        .unwrap();
        let opts = &caps["moz:firefoxOptions"];
        assert_eq!(opts["prefs"]["browser.download.folderList"], json!(2));
        assert_eq!(opts["prefs"]["browser.download.dir"], json!("/tmp/dl"));
        assert_eq!(opts["args"][0], json!("-headless"));
    }

    #[test]
    fn headless_safari_is_rejected() {
        assert!(capabilities(&settings(BrowserType::Safari, true), Path::new("/tmp")).is_err());
        let caps = capabilities(&settings(BrowserType::Safari, false), Path::new("/tmp")).unwrap();
        assert_eq!(caps.len(), 1);
    }

    #[test]
    fn endpoints() {
        let url = |s: &BrowserSettings| endpoint(s).unwrap().to_string();
        assert_eq!(
            url(&settings(BrowserType::Edge, false)),
            "http://localhost:9515/"
        );
        assert_eq!(
            url(&settings(BrowserType::Firefox, false)),
            "http://localhost:4444/"
        );

        let grid = BrowserSettings {
            is_local_execution: false,
            remote_url: Some("http://grid:4444/wd/hub".to_string()),
            webdriver_url: Some("http://ignored:1".to_string()),
            ..Default::default()
        };
        assert_eq!(url(&grid), "http://grid:4444/wd/hub");

        let custom = BrowserSettings {
            webdriver_url: Some("http://127.0.0.1:9999".to_string()),
            ..Default::default()
        };
        assert_eq!(url(&custom), "http://127.0.0.1:9999/");
    }
}

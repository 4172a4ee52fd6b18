//! The per-worker session registry.

use crate::browser::Browser;
use crate::error::{CmdError, NewSessionError};
use crate::factory::{BrowserFactory, WebDriverFactory};
use crate::settings::BrowserSettings;
use crate::wait::{ConditionalWaiter, LastErrors};
use crate::waiter::Waiter;
use crate::wd::{BrowserType, WorkerId};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

#[derive(Debug)]
struct Session {
    browser: Browser,
    waiter: Waiter,
}

/// Owns one browser session per worker.
///
/// Each worker moves through `initialize`, any number of [`browser`](Self::browser) and
/// [`waiter`](Self::waiter) accesses, and `quit`. Workers never see each other's session or
/// last error, so one `WebManager` can serve tests running in parallel.
///
/// ```no_run
/// # use karpatium::{BrowserSettings, WebManager, WorkerId};
/// # async fn doc() -> Result<(), Box<dyn std::error::Error>> {
/// let manager = WebManager::new();
/// let worker = WorkerId::single();
/// let settings = BrowserSettings::from_file("browser.json").await?.with_env_overrides()?;
///
/// manager.initialize(&worker, &settings).await?;
/// manager.browser(&worker)?.navigate_to("https://demoqa.com/").await?;
/// manager.quit(&worker).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct WebManager {
    factories: HashMap<BrowserType, Arc<dyn BrowserFactory>>,
    sessions: Mutex<HashMap<WorkerId, Session>>,
    last_errors: LastErrors,
}

impl Default for WebManager {
    fn default() -> Self {
        Self::new()
    }
}

impl WebManager {
    /// A manager that starts every browser type through [`WebDriverFactory`].
    pub fn new() -> Self {
        let factory: Arc<dyn BrowserFactory> = Arc::new(WebDriverFactory);
        Self::with_factories(BrowserType::ALL.into_iter().map(|ty| (ty, factory.clone())))
    }

    /// A manager that only knows the given factories.
    pub fn with_factories<I>(factories: I) -> Self
    where
        I: IntoIterator<Item = (BrowserType, Arc<dyn BrowserFactory>)>,
    {
        WebManager {
            factories: factories.into_iter().collect(),
            sessions: Mutex::default(),
            last_errors: LastErrors::new(),
        }
    }

    /// Use `factory` for sessions of `browser_type`.
    pub fn register<F>(mut self, browser_type: BrowserType, factory: F) -> Self
    where
        F: BrowserFactory + 'static,
    {
        self.factories.insert(browser_type, Arc::new(factory));
        self
    }

    fn sessions(&self) -> MutexGuard<'_, HashMap<WorkerId, Session>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Start a browser session for `worker`.
    ///
    /// This validates `settings`, creates the download folder, and pairs the new session with a
    /// waiter that uses the configured timeout and intervals. A session the worker already had
    /// is quit first.
    pub async fn initialize(
        &self,
        worker: &WorkerId,
        settings: &BrowserSettings,
    ) -> Result<Browser, NewSessionError> {
        tracing::info!(%worker, browser = %settings.browser_type, "initializing browser");
        settings.validate()?;
        let browser_type = settings.browser_type;
        let factory = self
            .factories
            .get(&browser_type)
            .cloned()
            .ok_or(NewSessionError::BrowserFactoryNotImplemented(browser_type))?;

        let downloads = settings.download_dir()?;
        tracing::debug!(%worker, path = %downloads.display(), "creating download folder");
        tokio::fs::create_dir_all(&downloads).await?;

        let driver = factory.create(settings).await?;
        let waiter = ConditionalWaiter::with_registry(worker.clone(), self.last_errors.clone())
            .at_most(settings.timeout())
            .every(settings.poll_interval());
        let browser = Browser::new(driver, waiter)
            .with_stability_interval(settings.page_stability_interval());
        let session = Session {
            waiter: browser.waiter(),
            browser: browser.clone(),
        };

        let previous = self.sessions().insert(worker.clone(), session);
        if let Some(previous) = previous {
            tracing::info!(%worker, "replacing existing browser session");
            if let Err(e) = previous.browser.quit().await {
                tracing::warn!(%worker, error = %e, "failed to quit replaced session");
            }
        }
        Ok(browser)
    }

    /// Whether `worker` has a live session.
    pub fn is_initialized(&self, worker: &WorkerId) -> bool {
        self.sessions().contains_key(worker)
    }

    /// The browser of `worker`.
    pub fn browser(&self, worker: &WorkerId) -> Result<Browser, CmdError> {
        self.sessions()
            .get(worker)
            .map(|s| s.browser.clone())
            .ok_or_else(|| CmdError::NotInitialized(worker.clone()))
    }

    /// The waiter of `worker`.
    pub fn waiter(&self, worker: &WorkerId) -> Result<Waiter, CmdError> {
        self.sessions()
            .get(worker)
            .map(|s| s.waiter.clone())
            .ok_or_else(|| CmdError::NotInitialized(worker.clone()))
    }

    /// The last failure any wait of `worker` recorded.
    pub fn last_error(&self, worker: &WorkerId) -> Option<CmdError> {
        self.last_errors.get(worker)
    }

    /// Close the browser of `worker`. Other workers are not affected.
    pub async fn quit(&self, worker: &WorkerId) -> Result<(), CmdError> {
        tracing::info!(%worker, "quitting browser");
        let session = self
            .sessions()
            .remove(worker)
            .ok_or_else(|| CmdError::NotInitialized(worker.clone()))?;
        session.browser.quit().await
    }

    /// Save the page source of `worker` to `<dir>/<name>.html`.
    pub async fn debug_page_source(
        &self,
        worker: &WorkerId,
        dir: impl AsRef<Path>,
        name: &str,
    ) -> Result<PathBuf, CmdError> {
        let source = self.browser(worker)?.page_source().await?;
        let path = dir.as_ref().join(format!("{}.html", name));
        write_artefact(&path, source.as_bytes()).await?;
        Ok(path)
    }

    /// Save a screenshot of `worker` to `<dir>/<name>.png`.
    pub async fn debug_screenshot(
        &self,
        worker: &WorkerId,
        dir: impl AsRef<Path>,
        name: &str,
    ) -> Result<PathBuf, CmdError> {
        let png = self.browser(worker)?.screenshot().await?;
        let path = dir.as_ref().join(format!("{}.png", name));
        write_artefact(&path, &png).await?;
        Ok(path)
    }
}

async fn write_artefact(path: &Path, contents: &[u8]) -> Result<(), CmdError> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(path, contents).await?;
    tracing::debug!(path = %path.display(), "saved debug artefact");
    Ok(())
}

//! The per-worker browser handle page objects talk to.

use crate::driver::Driver;
use crate::elements::{Element, ElementCollection, TypedElement};
use crate::error;
use crate::wait::ConditionalWaiter;
use crate::waiter::{Waiter, DEFAULT_STABILITY_INTERVAL};
use crate::wd::{BrowserType, ScriptArg, Selector};
use serde_json::Value as Json;
use std::sync::Arc;
use std::time::Duration;

/// A browser session bound to one worker.
///
/// `Browser` is a cheap handle: clones share the same session. It pairs the [`Driver`] with the
/// worker's [`ConditionalWaiter`], and is what every [`Element`] created from it uses to resolve
/// itself.
#[derive(Clone, Debug)]
pub struct Browser {
    driver: Arc<dyn Driver>,
    waiter: ConditionalWaiter,
    stability_interval: Duration,
}

impl Browser {
    /// Bind `driver` to the worker that `waiter` acts for.
    pub fn new(driver: Arc<dyn Driver>, waiter: ConditionalWaiter) -> Self {
        Browser {
            driver,
            waiter,
            stability_interval: DEFAULT_STABILITY_INTERVAL,
        }
    }

    /// Use a different pause between the two page source reads of the stability check.
    pub fn with_stability_interval(mut self, interval: Duration) -> Self {
        self.stability_interval = interval;
        self
    }

    /// The underlying driver.
    pub fn driver(&self) -> &Arc<dyn Driver> {
        &self.driver
    }

    /// The browser family of this session.
    pub fn family(&self) -> BrowserType {
        self.driver.family()
    }

    /// The waiter element accessors poll with.
    pub fn conditional_waiter(&self) -> &ConditionalWaiter {
        &self.waiter
    }

    /// The named waits for this session.
    pub fn waiter(&self) -> Waiter {
        Waiter::new(self.clone()).with_stability_interval(self.stability_interval)
    }

    /// Create a handle for the element matching `selector`, optionally below `parent`.
    ///
    /// Nothing is looked up until the handle is used.
    pub fn create<T: TypedElement>(&self, selector: Selector, parent: Option<&Element>) -> T {
        T::from_element(Element::locate(self.clone(), selector, parent))
    }

    /// Create a handle for every element matching `selector`, optionally below `parent`.
    pub fn create_multiple<T: TypedElement>(
        &self,
        selector: Selector,
        parent: Option<&Element>,
    ) -> ElementCollection<T> {
        ElementCollection::new(self.clone(), selector, parent)
    }
}

/// Page-level operations.
impl Browser {
    /// The URL of the current page.
    pub async fn url(&self) -> Result<String, error::CmdError> {
        self.driver.current_url().await
    }

    /// Navigate to `url`, which must be a well-formed absolute URL.
    pub async fn navigate_to(&self, url: &str) -> Result<(), error::CmdError> {
        if url.trim().is_empty() || url::Url::parse(url).is_err() {
            return Err(error::CmdError::InvalidArgument(
                "url".to_string(),
                format!("`{}` is not a valid absolute URL", url),
            ));
        }
        tracing::debug!(worker = %self.waiter.worker(), url, "navigating");
        self.driver.navigate_to(url).await
    }

    /// The serialized DOM of the current page.
    pub async fn page_source(&self) -> Result<String, error::CmdError> {
        self.driver.page_source().await
    }

    /// Run JavaScript in the context of the current page.
    pub async fn execute_script(
        &self,
        script: &str,
        args: Vec<ScriptArg>,
    ) -> Result<Json, error::CmdError> {
        self.driver.execute_script(script, args).await
    }

    /// Maximize the browser window.
    pub async fn maximize_window(&self) -> Result<(), error::CmdError> {
        self.driver.maximize_window().await
    }

    /// A PNG screenshot of the viewport.
    pub async fn screenshot(&self) -> Result<Vec<u8>, error::CmdError> {
        self.driver.screenshot().await
    }

    /// Scroll the viewport until `element` is in view.
    pub async fn scroll_to_element(&self, element: &Element) -> Result<(), error::CmdError> {
        element.scroll_to().await
    }

    pub(crate) async fn quit(&self) -> Result<(), error::CmdError> {
        self.driver.quit().await
    }
}

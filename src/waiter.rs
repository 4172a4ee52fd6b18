//! Named waits for page objects.

use crate::browser::Browser;
use crate::elements::Element;
use crate::error;
use crate::wait::ConditionalWaiter;
use serde_json::Value as Json;
use std::time::Duration;

/// The pause between the two page source reads of [`Waiter::for_page_source_is_not_changed`].
pub const DEFAULT_STABILITY_INTERVAL: Duration = Duration::from_millis(100);

fn stringify(v: &Json) -> String {
    match *v {
        Json::String(ref s) => s.clone(),
        ref v => v.to_string(),
    }
}

/// The common wait intents of page objects, for one browser session.
///
/// Obtain one through [`Browser::waiter`] or [`WebManager::waiter`](crate::WebManager::waiter).
/// Every wait uses the worker's timeout unless [`at_most`](Waiter::at_most) overrides it, and on
/// timeout fails the way [`ConditionalWaiter`] does: with the last real failure if there was
/// one.
///
/// ```no_run
/// # use karpatium::{Selector, CommonElement};
/// # use std::time::Duration;
/// # async fn doc(browser: karpatium::Browser) -> Result<(), karpatium::error::CmdError> {
/// let modal: CommonElement = browser.create(Selector::class("modal-content"), None);
/// browser.waiter().for_element_is_visible(&modal).await?;
/// browser
///     .waiter()
///     .at_most(Duration::from_secs(30))
///     .for_url_to_be("/profile")
///     .await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct Waiter {
    browser: Browser,
    waiter: ConditionalWaiter,
    stability_interval: Duration,
}

impl Waiter {
    /// Waits for conditions in `browser`.
    pub fn new(browser: Browser) -> Self {
        let waiter = browser.conditional_waiter().clone();
        Waiter {
            browser,
            waiter,
            stability_interval: DEFAULT_STABILITY_INTERVAL,
        }
    }

    /// A copy of this waiter with a different timeout.
    pub fn at_most(mut self, timeout: Duration) -> Self {
        self.waiter = self.waiter.at_most(timeout);
        self
    }

    /// A copy of this waiter with a different pause between page source reads.
    pub fn with_stability_interval(mut self, interval: Duration) -> Self {
        self.stability_interval = interval;
        self
    }

    /// The timeout of every wait.
    pub fn timeout(&self) -> Duration {
        self.waiter.timeout()
    }

    /// Wait until `document.readyState` is `complete`.
    pub async fn for_document_ready_state_to_be_complete(&self) -> Result<(), error::CmdError> {
        self.waiter
            .for_true(
                "`for_document_ready_state_to_be_complete` failed.",
                || async move {
                    let state = self
                        .browser
                        .execute_script("return document.readyState;", vec![])
                        .await?;
                    Ok::<_, error::CmdError>(stringify(&state) == "complete")
                },
            )
            .await
    }

    /// Wait until `element` exists and is displayed.
    pub async fn for_element_is_visible(&self, element: &Element) -> Result<(), error::CmdError> {
        let label = element.label("for_element_is_visible");
        self.waiter.for_true(&label, || element.displayed()).await
    }

    /// Like [`for_element_is_visible`](Self::for_element_is_visible), but a timeout is not an
    /// error. Returns whether the element became visible.
    pub async fn for_element_is_visible_if_possible(&self, element: &Element) -> bool {
        let label = element.label("for_element_is_visible_if_possible");
        let waiter = &self.waiter;
        waiter.for_true_if_possible(&label, || element.displayed()).await
    }

    /// Wait until `element` is absent or not displayed.
    pub async fn for_element_is_invisible(&self, element: &Element) -> Result<(), error::CmdError> {
        self.waiter
            .for_true(&element.label("for_element_is_invisible"), || async move {
                Ok::<_, error::CmdError>(!element.is_displayed().await)
            })
            .await
    }

    /// Wait until `element` can be located.
    pub async fn for_element_exists(&self, element: &Element) -> Result<(), error::CmdError> {
        self.waiter
            .for_true(&element.label("for_element_exists"), || async move {
                element.resolve().await.map(|_| true)
            })
            .await
    }

    /// Wait until `element` can no longer be located.
    pub async fn for_element_disappears(&self, element: &Element) -> Result<(), error::CmdError> {
        self.waiter
            .for_true(&element.label("for_element_disappears"), || async move {
                Ok::<_, error::CmdError>(!element.exists().await)
            })
            .await
    }

    /// Wait until the current URL contains `fragment`.
    pub async fn for_url_to_be(&self, fragment: &str) -> Result<(), error::CmdError> {
        self.waiter
            .for_true("`for_url_to_be` failed.", || async move {
                Ok::<_, error::CmdError>(self.browser.url().await?.contains(fragment))
            })
            .await
    }

    /// Wait until the page source contains `text`.
    pub async fn for_text_to_be_present_on_page(&self, text: &str) -> Result<(), error::CmdError> {
        self.waiter
            .for_true("`for_text_to_be_present_on_page` failed.", || async move {
                Ok::<_, error::CmdError>(self.browser.page_source().await?.contains(text))
            })
            .await
    }

    /// Wait until the text of `element` contains `text`.
    pub async fn for_text_to_be_present_in_element(
        &self,
        element: &Element,
        text: &str,
    ) -> Result<(), error::CmdError> {
        self.waiter
            .for_true(
                &element.label("for_text_to_be_present_in_element"),
                || async move {
                    let node = element.resolve().await?;
                    let shown = self.browser.driver().text(&node).await?;
                    Ok::<_, error::CmdError>(shown.contains(text))
                },
            )
            .await
    }

    /// Wait until `script` evaluates to `true`.
    pub async fn for_javascript_condition_to_be_true(
        &self,
        script: &str,
    ) -> Result<(), error::CmdError> {
        let label = "`for_javascript_condition_to_be_true` failed.";
        self.for_script_result(label, script, "true").await
    }

    /// Wait until `script` evaluates to `false`.
    pub async fn for_javascript_condition_to_be_false(
        &self,
        script: &str,
    ) -> Result<(), error::CmdError> {
        let label = "`for_javascript_condition_to_be_false` failed.";
        self.for_script_result(label, script, "false").await
    }

    async fn for_script_result(
        &self,
        label: &str,
        script: &str,
        expected: &str,
    ) -> Result<(), error::CmdError> {
        self.waiter
            .for_true(label, || async move {
                let v = self.browser.execute_script(script, vec![]).await?;
                Ok::<_, error::CmdError>(stringify(&v).eq_ignore_ascii_case(expected))
            })
            .await
    }

    /// Wait until two reads of the page source, one stability interval apart, are equal.
    ///
    /// Each attempt sleeps for the stability interval between its two reads.
    pub async fn for_page_source_is_not_changed(&self) -> Result<(), error::CmdError> {
        self.waiter
            .for_true("`for_page_source_is_not_changed` failed.", || {
                self.page_source_is_stable()
            })
            .await
    }

    /// Like [`for_page_source_is_not_changed`](Self::for_page_source_is_not_changed), but a
    /// timeout is not an error. Returns whether the page settled.
    pub async fn for_page_source_is_not_changed_if_possible(&self) -> bool {
        let settled = self
            .waiter
            .for_true_if_possible(
                "`for_page_source_is_not_changed_if_possible` failed.",
                || self.page_source_is_stable(),
            )
            .await;
        tracing::debug!(worker = %self.waiter.worker(), settled, "page settling");
        settled
    }

    async fn page_source_is_stable(&self) -> Result<bool, error::CmdError> {
        let before = self.browser.page_source().await?;
        tokio::time::sleep(self.stability_interval).await;
        let after = self.browser.page_source().await?;
        Ok(before == after)
    }
}

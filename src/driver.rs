//! The browser-automation capability the wait engine drives.

use crate::error::CmdError;
use crate::wd::{BrowserType, NodeRef, ScriptArg, Selector};
use async_trait::async_trait;
use serde_json::Value as Json;
use std::fmt::Debug;

/// Everything the core needs from a browser session.
///
/// Implementations perform exactly one attempt per call and report failures through
/// [`CmdError`]; retrying is the caller's business. Locating an element that is not (yet) in the
/// document must fail with [`CmdError::NoSuchElement`], and reading from a detached node with
/// [`CmdError::StaleElement`], so the wait engine can tell these transient states apart from
/// usage errors.
///
/// [`WebDriverBackend`](crate::WebDriverBackend) implements this trait on top of a
/// [`fantoccini::Client`].
#[async_trait]
pub trait Driver: Send + Sync + Debug {
    /// The browser family behind this session.
    fn family(&self) -> BrowserType;

    /// Locate the first node matching `selector`, in the whole document or below `scope`.
    async fn find_element(
        &self,
        scope: Option<&NodeRef>,
        selector: &Selector,
    ) -> Result<NodeRef, CmdError>;

    /// Locate every node matching `selector`, in the whole document or below `scope`.
    ///
    /// No match is not an error.
    async fn find_elements(
        &self,
        scope: Option<&NodeRef>,
        selector: &Selector,
    ) -> Result<Vec<NodeRef>, CmdError>;

    /// The rendered text of a node.
    async fn text(&self, node: &NodeRef) -> Result<String, CmdError>;

    /// An attribute of a node, `None` if it is absent.
    async fn attribute(&self, node: &NodeRef, name: &str) -> Result<Option<String>, CmdError>;

    /// A DOM property of a node, `None` if it is absent.
    async fn property(&self, node: &NodeRef, name: &str) -> Result<Option<String>, CmdError>;

    /// The computed value of a CSS property.
    async fn css_value(&self, node: &NodeRef, name: &str) -> Result<String, CmdError>;

    /// Whether the node is rendered visibly.
    async fn is_displayed(&self, node: &NodeRef) -> Result<bool, CmdError>;

    /// Whether the node is enabled.
    async fn is_enabled(&self, node: &NodeRef) -> Result<bool, CmdError>;

    /// Whether the node (a checkbox, radio button or option) is selected.
    async fn is_selected(&self, node: &NodeRef) -> Result<bool, CmdError>;

    /// The tag name of the node.
    async fn tag_name(&self, node: &NodeRef) -> Result<String, CmdError>;

    /// Click the node.
    async fn click(&self, node: &NodeRef) -> Result<(), CmdError>;

    /// Type `text` into the node.
    async fn send_keys(&self, node: &NodeRef, text: &str) -> Result<(), CmdError>;

    /// Clear the node's value.
    async fn clear(&self, node: &NodeRef) -> Result<(), CmdError>;

    /// The URL of the current page.
    async fn current_url(&self) -> Result<String, CmdError>;

    /// The serialized DOM of the current page.
    async fn page_source(&self) -> Result<String, CmdError>;

    /// Run `script` in the page and return its result.
    async fn execute_script(&self, script: &str, args: Vec<ScriptArg>) -> Result<Json, CmdError>;

    /// Navigate to an absolute URL.
    async fn navigate_to(&self, url: &str) -> Result<(), CmdError>;

    /// Maximize the browser window.
    async fn maximize_window(&self) -> Result<(), CmdError>;

    /// A PNG screenshot of the current viewport.
    async fn screenshot(&self) -> Result<Vec<u8>, CmdError>;

    /// End the session and close the browser.
    async fn quit(&self) -> Result<(), CmdError>;

    /// Double click the node with the pointer.
    async fn double_click(&self, node: &NodeRef) -> Result<(), CmdError>;

    /// Right click the node with the pointer.
    async fn context_click(&self, node: &NodeRef) -> Result<(), CmdError>;

    /// Move the pointer over the node.
    async fn move_to_element(&self, node: &NodeRef) -> Result<(), CmdError>;

    /// Press on `source`, move to `target`, and release.
    async fn drag_and_drop(&self, source: &NodeRef, target: &NodeRef) -> Result<(), CmdError>;

    /// Scroll the viewport until the node is in view.
    async fn scroll_to_element(&self, node: &NodeRef) -> Result<(), CmdError>;
}

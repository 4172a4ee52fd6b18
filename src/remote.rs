//! The [`Driver`] implementation for real browsers, on top of [`fantoccini`].

use crate::driver::Driver;
use crate::error::CmdError;
use crate::wd::{BrowserType, NodeRef, ScriptArg, Selector, Strategy};
use async_trait::async_trait;
use fantoccini::actions::{
    InputSource, MouseActions, PointerAction, MOUSE_BUTTON_LEFT, MOUSE_BUTTON_RIGHT,
};
use fantoccini::elements::Element;
use fantoccini::{Client, Locator};
use serde_json::Value as Json;

const SCROLL_INTO_VIEW: &str = "arguments[0].scrollIntoView({block: 'center', inline: 'nearest'});";

fn located(node: &NodeRef) -> Result<&Element, CmdError> {
    node.downcast_ref::<Element>().ok_or_else(|| {
        CmdError::Unsupported("the node was not located by a WebDriver session".to_string())
    })
}

fn move_to(element: &Element) -> PointerAction {
    PointerAction::MoveToElement {
        element: element.clone(),
        duration: None,
        x: Default::default(),
        y: Default::default(),
    }
}

fn mouse() -> MouseActions {
    MouseActions::new("mouse".to_string())
}

/// A WebDriver session driven through a [`fantoccini::Client`].
///
/// Nodes handed out by this backend wrap [`fantoccini::elements::Element`]s.
#[derive(Clone, Debug)]
pub struct WebDriverBackend {
    client: Client,
    family: BrowserType,
}

impl WebDriverBackend {
    /// Drive an established session of a `family` browser.
    pub fn new(client: Client, family: BrowserType) -> Self {
        WebDriverBackend { client, family }
    }

    /// The underlying client, for anything the [`Driver`] interface does not cover.
    pub fn client(&self) -> &Client {
        &self.client
    }

    async fn perform(&self, actions: MouseActions) -> Result<(), CmdError> {
        self.client.perform_actions(actions).await?;
        self.client.release_actions().await?;
        Ok(())
    }
}

#[async_trait]
impl Driver for WebDriverBackend {
    fn family(&self) -> BrowserType {
        self.family
    }

    async fn find_element(
        &self,
        scope: Option<&NodeRef>,
        selector: &Selector,
    ) -> Result<NodeRef, CmdError> {
        let css = selector.to_css().unwrap_or_default();
        let locator = match selector.strategy() {
            Strategy::XPath => Locator::XPath(selector.value()),
            _ => Locator::Css(&css),
        };
        let found = match scope {
            Some(scope) => located(scope)?.find(locator).await?,
            None => self.client.find(locator).await?,
        };
        Ok(NodeRef::new(found))
    }

    async fn find_elements(
        &self,
        scope: Option<&NodeRef>,
        selector: &Selector,
    ) -> Result<Vec<NodeRef>, CmdError> {
        let css = selector.to_css().unwrap_or_default();
        let locator = match selector.strategy() {
            Strategy::XPath => Locator::XPath(selector.value()),
            _ => Locator::Css(&css),
        };
        let found = match scope {
            Some(scope) => located(scope)?.find_all(locator).await?,
            None => self.client.find_all(locator).await?,
        };
        Ok(found.into_iter().map(NodeRef::new).collect())
    }

    async fn text(&self, node: &NodeRef) -> Result<String, CmdError> {
        Ok(located(node)?.text().await?)
    }

    async fn attribute(&self, node: &NodeRef, name: &str) -> Result<Option<String>, CmdError> {
        Ok(located(node)?.attr(name).await?)
    }

    async fn property(&self, node: &NodeRef, name: &str) -> Result<Option<String>, CmdError> {
        Ok(located(node)?.prop(name).await?)
    }

    async fn css_value(&self, node: &NodeRef, name: &str) -> Result<String, CmdError> {
        Ok(located(node)?.css_value(name).await?)
    }

    async fn is_displayed(&self, node: &NodeRef) -> Result<bool, CmdError> {
        Ok(located(node)?.is_displayed().await?)
    }

    async fn is_enabled(&self, node: &NodeRef) -> Result<bool, CmdError> {
        Ok(located(node)?.is_enabled().await?)
    }

    async fn is_selected(&self, node: &NodeRef) -> Result<bool, CmdError> {
        Ok(located(node)?.is_selected().await?)
    }

    async fn tag_name(&self, node: &NodeRef) -> Result<String, CmdError> {
        Ok(located(node)?.tag_name().await?)
    }

    async fn click(&self, node: &NodeRef) -> Result<(), CmdError> {
        Ok(located(node)?.click().await?)
    }

    async fn send_keys(&self, node: &NodeRef, text: &str) -> Result<(), CmdError> {
        Ok(located(node)?.send_keys(text).await?)
    }

    async fn clear(&self, node: &NodeRef) -> Result<(), CmdError> {
        Ok(located(node)?.clear().await?)
    }

    async fn current_url(&self) -> Result<String, CmdError> {
        Ok(self.client.current_url().await?.to_string())
    }

    async fn page_source(&self) -> Result<String, CmdError> {
        Ok(self.client.source().await?)
    }

    async fn execute_script(&self, script: &str, args: Vec<ScriptArg>) -> Result<Json, CmdError> {
        let mut raw = Vec::with_capacity(args.len());
        for arg in args {
            raw.push(match arg {
                ScriptArg::Value(v) => v,
                ScriptArg::Node(ref node) => {
                    serde_json::to_value(located(node)?).map_err(CmdError::driver)?
                }
            });
        }
        Ok(self.client.execute(script, raw).await?)
    }

    async fn navigate_to(&self, url: &str) -> Result<(), CmdError> {
        Ok(self.client.goto(url).await?)
    }

    async fn maximize_window(&self) -> Result<(), CmdError> {
        Ok(self.client.maximize_window().await?)
    }

    async fn screenshot(&self) -> Result<Vec<u8>, CmdError> {
        Ok(self.client.screenshot().await?)
    }

    async fn quit(&self) -> Result<(), CmdError> {
        Ok(self.client.clone().close().await?)
    }

    async fn double_click(&self, node: &NodeRef) -> Result<(), CmdError> {
        let element = located(node)?;
        let actions = mouse()
            .then(move_to(element))
            .then(PointerAction::Down {
                button: MOUSE_BUTTON_LEFT,
            })
            .then(PointerAction::Up {
                button: MOUSE_BUTTON_LEFT,
            })
            .then(PointerAction::Down {
                button: MOUSE_BUTTON_LEFT,
            })
            .then(PointerAction::Up {
                button: MOUSE_BUTTON_LEFT,
            });
        self.perform(actions).await
    }

    async fn context_click(&self, node: &NodeRef) -> Result<(), CmdError> {
        let element = located(node)?;
        let actions = mouse()
            .then(move_to(element))
            .then(PointerAction::Down {
                button: MOUSE_BUTTON_RIGHT,
            })
            .then(PointerAction::Up {
                button: MOUSE_BUTTON_RIGHT,
            });
        self.perform(actions).await
    }

    async fn move_to_element(&self, node: &NodeRef) -> Result<(), CmdError> {
        let element = located(node)?;
        self.perform(mouse().then(move_to(element))).await
    }

    async fn drag_and_drop(&self, source: &NodeRef, target: &NodeRef) -> Result<(), CmdError> {
        let (source, target) = (located(source)?, located(target)?);
        let actions = mouse()
            .then(move_to(source))
            .then(PointerAction::Down {
                button: MOUSE_BUTTON_LEFT,
            })
            .then(move_to(target))
            .then(PointerAction::Up {
                button: MOUSE_BUTTON_LEFT,
            });
        self.perform(actions).await
    }

    async fn scroll_to_element(&self, node: &NodeRef) -> Result<(), CmdError> {
        let element = serde_json::to_value(located(node)?).map_err(CmdError::driver)?;
        self.client.execute(SCROLL_INTO_VIEW, vec![element]).await?;
        Ok(())
    }
}

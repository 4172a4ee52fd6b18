//! Lazy element handles.
//!
//! An [`Element`] is a descriptor, not a live node: every accessor locates the node again, so a
//! re-render between two calls costs one more attempt of the surrounding wait instead of a stale
//! reference.

use crate::browser::Browser;
use crate::driver::Driver;
use crate::error;
use crate::wait::ConditionalWaiter;
use crate::wd::{NodeRef, ScriptArg, Selector};
use futures_util::future::{BoxFuture, FutureExt};
use std::fmt;
use std::marker::PhantomData;
use std::ops::Deref;
use std::sync::Arc;

const SYNTHETIC_DOUBLE_CLICK: &str = "arguments[0].dispatchEvent(new MouseEvent('dblclick', \
     {bubbles: true, cancelable: true, view: window}));";

#[derive(Clone, Debug)]
enum Locate {
    Selector {
        selector: Selector,
        parent: Option<Arc<Element>>,
    },
    /// A member of an [`ElementCollection`], bound to the node it was enumerated as.
    Bound(NodeRef),
}

/// A handle to one element on the page.
///
/// Creating an `Element` does not talk to the browser. Each read or action resolves the node
/// afresh: a bound handle returns its node, a top-level handle searches the whole document, and a
/// child handle first resolves its parent and searches below it.
///
/// Reads and actions are retried through the worker's [`ConditionalWaiter`] until they succeed
/// or the wait times out. State-mutating actions then give the page a chance to settle, see
/// [`Waiter::for_page_source_is_not_changed_if_possible`][settle].
///
/// [settle]: crate::Waiter::for_page_source_is_not_changed_if_possible
#[derive(Clone, Debug)]
pub struct Element {
    browser: Browser,
    locate: Locate,
}

impl Element {
    pub(crate) fn locate(browser: Browser, selector: Selector, parent: Option<&Element>) -> Self {
        Element {
            browser,
            locate: Locate::Selector {
                selector,
                parent: parent.map(|p| Arc::new(p.clone())),
            },
        }
    }

    pub(crate) fn bound(browser: Browser, node: NodeRef) -> Self {
        Element {
            browser,
            locate: Locate::Bound(node),
        }
    }

    /// The browser this element lives in.
    pub fn browser(&self) -> &Browser {
        &self.browser
    }

    /// The selector this element is located by, `None` for collection members.
    pub fn selector(&self) -> Option<&Selector> {
        match self.locate {
            Locate::Selector { ref selector, .. } => Some(selector),
            Locate::Bound(..) => None,
        }
    }

    fn driver(&self) -> &dyn Driver {
        &**self.browser.driver()
    }

    fn waiter(&self) -> &ConditionalWaiter {
        self.browser.conditional_waiter()
    }

    pub(crate) fn label(&self, op: &str) -> String {
        format!("`{}` failed for {}.", op, self)
    }

    /// Make one attempt at locating the underlying node.
    ///
    /// A malformed selector fails with [`CmdError::InvalidSelector`](error::CmdError) before the
    /// driver is asked anything.
    pub fn resolve(&self) -> BoxFuture<'_, Result<NodeRef, error::CmdError>> {
        async move {
            match self.locate {
                Locate::Bound(ref node) => Ok(node.clone()),
                Locate::Selector {
                    ref selector,
                    ref parent,
                } => {
                    selector.validate()?;
                    let scope = match parent {
                        Some(parent) => Some(parent.resolve().await?),
                        None => None,
                    };
                    tracing::debug!(%selector, scoped = scope.is_some(), "resolving element");
                    self.driver().find_element(scope.as_ref(), selector).await
                }
            }
        }
        .boxed()
    }

    /// A handle for the first element matching `selector` below this one.
    pub fn find<T: TypedElement>(&self, selector: Selector) -> T {
        T::from_element(Element::locate(self.browser.clone(), selector, Some(self)))
    }

    /// A handle for every element matching `selector` below this one.
    pub fn find_all<T: TypedElement>(&self, selector: Selector) -> ElementCollection<T> {
        ElementCollection::new(self.browser.clone(), selector, Some(self))
    }

    async fn settle(&self) {
        self.browser
            .waiter()
            .for_page_source_is_not_changed_if_possible()
            .await;
    }

    pub(crate) async fn displayed(&self) -> Result<bool, error::CmdError> {
        let node = self.resolve().await?;
        self.driver().is_displayed(&node).await
    }
}

/// Probes and reads.
impl Element {
    /// Check whether the element can be located right now.
    ///
    /// This makes a single attempt and never waits.
    pub async fn exists(&self) -> bool {
        self.resolve().await.is_ok()
    }

    /// Check whether the element can be located and is displayed right now.
    ///
    /// This makes a single attempt and never waits. Any failure counts as not displayed.
    pub async fn is_displayed(&self) -> bool {
        self.displayed().await.unwrap_or(false)
    }

    /// Wait until the element exists and is displayed.
    ///
    /// Returns `Ok(true)` once it is, and the last failure (or a timeout) otherwise.
    pub async fn is_visible(&self) -> Result<bool, error::CmdError> {
        self.waiter()
            .for_true(&self.label("Element::is_visible"), || self.displayed())
            .await?;
        Ok(true)
    }

    /// Whether the element is enabled.
    pub async fn is_enabled(&self) -> Result<bool, error::CmdError> {
        self.waiter()
            .for_result(&self.label("Element::is_enabled"), || async move {
                let node = self.resolve().await?;
                self.driver().is_enabled(&node).await
            })
            .await
    }

    /// Whether the element is selected.
    pub async fn is_selected(&self) -> Result<bool, error::CmdError> {
        self.waiter()
            .for_result(&self.label("Element::is_selected"), || async move {
                let node = self.resolve().await?;
                self.driver().is_selected(&node).await
            })
            .await
    }

    /// The rendered text of the element.
    pub async fn text(&self) -> Result<String, error::CmdError> {
        self.waiter()
            .for_result(&self.label("Element::text"), || async move {
                let node = self.resolve().await?;
                self.driver().text(&node).await
            })
            .await
    }

    /// The tag name of the element.
    pub async fn tag_name(&self) -> Result<String, error::CmdError> {
        self.waiter()
            .for_result(&self.label("Element::tag_name"), || async move {
                let node = self.resolve().await?;
                self.driver().tag_name(&node).await
            })
            .await
    }

    /// Look up an [attribute] of the element.
    ///
    /// Returns `None` if the element has no such attribute.
    ///
    /// [attribute]: https://dom.spec.whatwg.org/#concept-attribute
    pub async fn attribute(&self, name: &str) -> Result<Option<String>, error::CmdError> {
        self.waiter()
            .for_result(&self.label("Element::attribute"), || async move {
                let node = self.resolve().await?;
                self.driver().attribute(&node, name).await
            })
            .await
    }

    /// Look up a DOM property of the element.
    pub async fn property(&self, name: &str) -> Result<Option<String>, error::CmdError> {
        self.waiter()
            .for_result(&self.label("Element::property"), || async move {
                let node = self.resolve().await?;
                self.driver().property(&node, name).await
            })
            .await
    }

    /// The computed value of a CSS property, e.g. `background-color`.
    pub async fn css_value(&self, name: &str) -> Result<String, error::CmdError> {
        self.waiter()
            .for_result(&self.label("Element::css_value"), || async move {
                let node = self.resolve().await?;
                self.driver().css_value(&node, name).await
            })
            .await
    }
}

/// Actions.
impl Element {
    /// Click the element, then let the page settle.
    pub async fn click(&self) -> Result<(), error::CmdError> {
        self.waiter()
            .for_no_exception(&self.label("Element::click"), || async move {
                let node = self.resolve().await?;
                self.driver().click(&node).await
            })
            .await?;
        self.settle().await;
        Ok(())
    }

    /// Double click the element, then let the page settle.
    ///
    /// Browsers whose driver cannot double click natively get a synthetic `dblclick` event
    /// dispatched from a script instead.
    pub async fn double_click(&self) -> Result<(), error::CmdError> {
        let native = self.browser.family().supports_native_double_click();
        self.waiter()
            .for_no_exception(&self.label("Element::double_click"), || async move {
                let node = self.resolve().await?;
                if native {
                    self.driver().double_click(&node).await
                } else {
                    self.driver()
                        .execute_script(SYNTHETIC_DOUBLE_CLICK, vec![ScriptArg::Node(node)])
                        .await
                        .map(|_| ())
                }
            })
            .await?;
        self.settle().await;
        Ok(())
    }

    /// Right click the element, then let the page settle.
    pub async fn right_click(&self) -> Result<(), error::CmdError> {
        self.waiter()
            .for_no_exception(&self.label("Element::right_click"), || async move {
                let node = self.resolve().await?;
                self.driver().context_click(&node).await
            })
            .await?;
        self.settle().await;
        Ok(())
    }

    /// Move the pointer over the element.
    pub async fn hover_over(&self) -> Result<(), error::CmdError> {
        self.waiter()
            .for_no_exception(&self.label("Element::hover_over"), || async move {
                let node = self.resolve().await?;
                self.driver().move_to_element(&node).await
            })
            .await
    }

    /// Drag this element onto `target`, then let the page settle.
    pub async fn drag_and_drop(&self, target: &Element) -> Result<(), error::CmdError> {
        self.waiter()
            .for_no_exception(&self.label("Element::drag_and_drop"), || async move {
                let source = self.resolve().await?;
                let target = target.resolve().await?;
                self.driver().drag_and_drop(&source, &target).await
            })
            .await?;
        self.settle().await;
        Ok(())
    }

    /// Scroll the viewport until the element is in view.
    pub async fn scroll_to(&self) -> Result<(), error::CmdError> {
        self.waiter()
            .for_no_exception(&self.label("Element::scroll_to"), || async move {
                let node = self.resolve().await?;
                self.driver().scroll_to_element(&node).await
            })
            .await
    }

    /// Type `text` into the element without clearing it first, then let the page settle.
    pub async fn send_keys(&self, text: &str) -> Result<(), error::CmdError> {
        self.waiter()
            .for_no_exception(&self.label("Element::send_keys"), || async move {
                let node = self.resolve().await?;
                self.driver().send_keys(&node, text).await
            })
            .await?;
        self.settle().await;
        Ok(())
    }

    /// Clear the element's value, then let the page settle.
    pub async fn clear(&self) -> Result<(), error::CmdError> {
        self.waiter()
            .for_no_exception(&self.label("Element::clear"), || async move {
                let node = self.resolve().await?;
                self.driver().clear(&node).await
            })
            .await?;
        self.settle().await;
        Ok(())
    }
}

impl fmt::Display for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.locate {
            Locate::Selector {
                ref selector,
                parent: None,
            } => write!(f, "`{}`", selector),
            Locate::Selector {
                ref selector,
                parent: Some(ref parent),
            } => write!(f, "`{}` in {}", selector, parent),
            Locate::Bound(..) => f.write_str("collection member"),
        }
    }
}

/// An element handle with a more specific interface.
///
/// Implemented by [`Element`] itself and by the typed wrappers in this module, so any of them can
/// be produced by [`Browser::create`] and [`Browser::create_multiple`].
pub trait TypedElement: Sized {
    /// Wrap a plain element handle.
    fn from_element(element: Element) -> Self;

    /// The plain element handle.
    fn as_element(&self) -> &Element;
}

impl TypedElement for Element {
    fn from_element(element: Element) -> Self {
        element
    }

    fn as_element(&self) -> &Element {
        self
    }
}

macro_rules! typed_element {
    ($(#[$attr:meta])* $name:ident) => {
        $(#[$attr])*
        #[derive(Clone, Debug)]
        pub struct $name(Element);

        impl TypedElement for $name {
            fn from_element(element: Element) -> Self {
                $name(element)
            }

            fn as_element(&self) -> &Element {
                &self.0
            }
        }

        impl Deref for $name {
            type Target = Element;
            fn deref(&self) -> &Self::Target {
                &self.0
            }
        }
    };
}

typed_element!(
    /// Any element that is only read from or clicked.
    CommonElement
);

typed_element!(
    /// A text `input` or a `textarea`.
    InputElement
);

typed_element!(
    /// An `input` of type `checkbox`.
    CheckBoxElement
);

typed_element!(
    /// An `input` of type `radio`.
    RadioButtonElement
);

typed_element!(
    /// An `img`.
    ImageElement
);

impl InputElement {
    /// Append `text` to the current value.
    pub async fn append_text(&self, text: &str) -> Result<(), error::CmdError> {
        self.0.send_keys(text).await
    }

    /// Replace the current value with `text`.
    pub async fn set_text(&self, text: &str) -> Result<(), error::CmdError> {
        self.0.clear().await?;
        self.0.send_keys(text).await
    }
}

impl CheckBoxElement {
    /// Whether the box is checked.
    pub async fn is_checked(&self) -> Result<bool, error::CmdError> {
        self.0.is_selected().await
    }

    /// Check the box. Does nothing if it already is.
    pub async fn check(&self) -> Result<(), error::CmdError> {
        if !self.is_checked().await? {
            self.0.click().await?;
        }
        Ok(())
    }

    /// Uncheck the box. Does nothing if it already is.
    pub async fn uncheck(&self) -> Result<(), error::CmdError> {
        if self.is_checked().await? {
            self.0.click().await?;
        }
        Ok(())
    }
}

impl RadioButtonElement {
    /// Whether the button is selected.
    pub async fn is_checked(&self) -> Result<bool, error::CmdError> {
        self.0.is_selected().await
    }

    /// Select the button. Does nothing if it already is.
    pub async fn check(&self) -> Result<(), error::CmdError> {
        if !self.is_checked().await? {
            self.0.click().await?;
        }
        Ok(())
    }
}

impl ImageElement {
    /// The `src` attribute.
    pub async fn src(&self) -> Result<Option<String>, error::CmdError> {
        self.0.attribute("src").await
    }

    /// The `alt` attribute.
    pub async fn alt(&self) -> Result<Option<String>, error::CmdError> {
        self.0.attribute("alt").await
    }

    /// Whether the image was loaded, judged by a positive `naturalWidth`.
    pub async fn is_image_valid(&self) -> Result<bool, error::CmdError> {
        let element = &self.0;
        element
            .waiter()
            .for_result(&element.label("ImageElement::is_image_valid"), || async move {
                let node = element.resolve().await?;
                let width = element.driver().property(&node, "naturalWidth").await?;
                let width = width.and_then(|w| w.trim().parse::<f64>().ok());
                Ok::<_, error::CmdError>(width.map_or(false, |w| w > 0.0))
            })
            .await
    }
}

/// Handles for every element matching a selector.
///
/// A collection is a view: [`count`](Self::count), [`get`](Self::get) and [`all`](Self::all)
/// search the page again on every call. The members they return are bound to the nodes found by
/// that search and are not searched for again.
pub struct ElementCollection<T> {
    browser: Browser,
    selector: Selector,
    parent: Option<Arc<Element>>,
    _member: PhantomData<fn() -> T>,
}

impl<T> Clone for ElementCollection<T> {
    fn clone(&self) -> Self {
        ElementCollection {
            browser: self.browser.clone(),
            selector: self.selector.clone(),
            parent: self.parent.clone(),
            _member: PhantomData,
        }
    }
}

impl<T> fmt::Debug for ElementCollection<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ElementCollection")
            .field("selector", &self.selector)
            .field("parent", &self.parent)
            .finish()
    }
}

impl<T: TypedElement> ElementCollection<T> {
    pub(crate) fn new(browser: Browser, selector: Selector, parent: Option<&Element>) -> Self {
        ElementCollection {
            browser,
            selector,
            parent: parent.map(|p| Arc::new(p.clone())),
            _member: PhantomData,
        }
    }

    /// The selector members are found by.
    pub fn selector(&self) -> &Selector {
        &self.selector
    }

    async fn nodes(&self) -> Result<Vec<NodeRef>, error::CmdError> {
        let label = match self.parent {
            Some(ref parent) => format!(
                "`ElementCollection::resolve` failed for `{}` in {}.",
                self.selector, parent
            ),
            None => format!("`ElementCollection::resolve` failed for `{}`.", self.selector),
        };
        self.browser
            .conditional_waiter()
            .for_result(&label, || async move {
                self.selector.validate()?;
                let scope = match self.parent {
                    Some(ref parent) => Some(parent.resolve().await?),
                    None => None,
                };
                self.browser
                    .driver()
                    .find_elements(scope.as_ref(), &self.selector)
                    .await
            })
            .await
    }

    /// The number of matching elements right now.
    pub async fn count(&self) -> Result<usize, error::CmdError> {
        Ok(self.nodes().await?.len())
    }

    /// The matching element at `index`.
    pub async fn get(&self, index: usize) -> Result<T, error::CmdError> {
        let mut nodes = self.nodes().await?;
        if index >= nodes.len() {
            return Err(error::CmdError::InvalidArgument(
                "index".to_string(),
                format!(
                    "{} is out of range for {} elements matching `{}`",
                    index,
                    nodes.len(),
                    self.selector
                ),
            ));
        }
        let node = nodes.swap_remove(index);
        Ok(T::from_element(Element::bound(self.browser.clone(), node)))
    }

    /// Every matching element right now, in document order.
    pub async fn all(&self) -> Result<Vec<T>, error::CmdError> {
        Ok(self
            .nodes()
            .await?
            .into_iter()
            .map(|node| T::from_element(Element::bound(self.browser.clone(), node)))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeNode, FakePage};
    use crate::wd::{BrowserType, WorkerId};
    use std::time::Duration;

    fn browser(page: &FakePage) -> Browser {
        Browser::new(
            Arc::new(page.clone()),
            ConditionalWaiter::new(WorkerId::single()).at_most(Duration::from_secs(1)),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn child_is_searched_below_parent() {
        let page = FakePage::new();
        let form = page.insert(None, FakeNode::new("form").id("userForm"));
        page.insert(Some(form), FakeNode::new("label").text("inside"));
        page.insert(None, FakeNode::new("label").text("outside"));

        let b = browser(&page);
        let form: CommonElement = b.create(Selector::id("userForm"), None);
        let label: CommonElement = form.find(Selector::tag("label"));
        assert_eq!(label.text().await.unwrap(), "inside");
        assert_eq!(label.to_string(), "`By.TagName: label` in `By.Id: userForm`");
    }

    #[tokio::test(start_paused = true)]
    async fn malformed_selector_fails_without_waiting() {
        let page = FakePage::new();
        let b = browser(&page);
        let el: CommonElement = b.create(Selector::css(""), None);

        let started = tokio::time::Instant::now();
        let e = el.text().await.unwrap_err();
        assert!(matches!(e, error::CmdError::InvalidSelector(..)));
        assert!(started.elapsed() < Duration::from_millis(100));
        assert_eq!(page.calls("find_element"), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn safari_double_click_is_synthesized() {
        let page = FakePage::with_family(BrowserType::Safari);
        page.insert(None, FakeNode::new("button").id("doubleClickBtn"));
        let b = browser(&page);

        let button: CommonElement = b.create(Selector::id("doubleClickBtn"), None);
        button.double_click().await.unwrap();
        assert_eq!(page.calls("double_click"), 0);
        assert!(page.scripts().iter().any(|s| s.contains("dblclick")));
    }

    #[tokio::test(start_paused = true)]
    async fn checkbox_check_is_idempotent() {
        let page = FakePage::new();
        page.insert(
            None,
            FakeNode::new("input").id("terms").attr("type", "checkbox"),
        );
        let b = browser(&page);
        let terms: CheckBoxElement = b.create(Selector::id("terms"), None);

        terms.check().await.unwrap();
        terms.check().await.unwrap();
        assert!(terms.is_checked().await.unwrap());
        assert_eq!(page.calls("click"), 1);

        terms.uncheck().await.unwrap();
        assert!(!terms.is_checked().await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn set_text_replaces_value() {
        let page = FakePage::new();
        let input = page.insert(None, FakeNode::new("input").id("userName").prop("value", "old"));
        let b = browser(&page);
        let name: InputElement = b.create(Selector::id("userName"), None);

        name.set_text("Jane").await.unwrap();
        name.append_text(" Doe").await.unwrap();
        assert_eq!(page.prop(input, "value").as_deref(), Some("Jane Doe"));
    }

    #[tokio::test(start_paused = true)]
    async fn broken_image_is_reported() {
        let page = FakePage::new();
        page.insert(None, FakeNode::new("img").id("ok").prop("naturalWidth", "120"));
        page.insert(None, FakeNode::new("img").id("broken").prop("naturalWidth", "0"));
        let b = browser(&page);

        let ok: ImageElement = b.create(Selector::id("ok"), None);
        let broken: ImageElement = b.create(Selector::id("broken"), None);
        assert!(ok.is_image_valid().await.unwrap());
        assert!(!broken.is_image_valid().await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn out_of_range_member_is_a_usage_error() {
        let page = FakePage::new();
        page.insert(None, FakeNode::new("li"));
        let b = browser(&page);
        let items = b.create_multiple::<CommonElement>(Selector::tag("li"), None);
        assert!(items.get(0).await.is_ok());
        assert!(matches!(
            items.get(1).await.unwrap_err(),
            error::CmdError::InvalidArgument(..)
        ));
    }
}

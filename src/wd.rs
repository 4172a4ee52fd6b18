//! Value types shared between the wait engine and the driver capability.

use crate::error;
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;
use std::any::Any;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// The lookup strategy of a [`Selector`].
#[derive(Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Debug, Hash)]
pub enum Strategy {
    /// Match the element's `id` attribute.
    Id,
    /// Match one of the element's classes.
    Class,
    /// Match a CSS selector.
    Css,
    /// Match an XPath expression.
    XPath,
    /// Match the element's tag name.
    Tag,
    /// Match the element's `name` attribute.
    Name,
    /// Match the element's `data-testid` attribute.
    DataTestId,
}

impl Strategy {
    /// The name used when rendering a selector.
    pub const fn as_str(self) -> &'static str {
        match self {
            Strategy::Id => "By.Id",
            Strategy::Class => "By.ClassName",
            Strategy::Css => "By.CssSelector",
            Strategy::XPath => "By.XPath",
            Strategy::Tag => "By.TagName",
            Strategy::Name => "By.Name",
            Strategy::DataTestId => "By.DataTestId",
        }
    }
}

/// An immutable element locator.
///
/// A `Selector` carries no identity beyond its fields. It is handed to the [`Driver`] untouched
/// every time an element is resolved.
///
/// [`Driver`]: crate::Driver
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash)]
pub struct Selector {
    strategy: Strategy,
    value: String,
}

impl Selector {
    fn new(strategy: Strategy, value: impl Into<String>) -> Self {
        Selector {
            strategy,
            value: value.into(),
        }
    }

    /// Find elements by their [`id`][1] attribute.
    ///
    /// ```
    /// # use karpatium::Selector;
    /// // <button id="submit-button">Submit</button>
    /// let submit = Selector::id("submit-button");
    /// ```
    ///
    /// [1]: https://developer.mozilla.org/en-US/docs/Web/HTML/Global_attributes/id
    pub fn id(id: impl Into<String>) -> Self {
        Self::new(Strategy::Id, id)
    }

    /// Find elements carrying the given class.
    pub fn class(class_name: impl Into<String>) -> Self {
        Self::new(Strategy::Class, class_name)
    }

    /// Find elements matching the given [CSS selector][1].
    ///
    /// [1]: https://developer.mozilla.org/en-US/docs/Web/CSS/CSS_Selectors
    pub fn css(css: impl Into<String>) -> Self {
        Self::new(Strategy::Css, css)
    }

    /// Find elements whose `data-testid` attribute equals the given value.
    pub fn data_test_id(data_test_id: impl Into<String>) -> Self {
        Self::new(Strategy::DataTestId, data_test_id)
    }

    /// Find elements by their `name` attribute.
    pub fn name(name: impl Into<String>) -> Self {
        Self::new(Strategy::Name, name)
    }

    /// Find elements by tag name, e.g. `button`.
    pub fn tag(tag: impl Into<String>) -> Self {
        Self::new(Strategy::Tag, tag)
    }

    /// Find elements using the given [XPath expression][1].
    ///
    /// [1]: https://developer.mozilla.org/en-US/docs/Web/XPath
    pub fn xpath(xpath: impl Into<String>) -> Self {
        Self::new(Strategy::XPath, xpath)
    }

    /// The lookup strategy.
    pub fn strategy(&self) -> Strategy {
        self.strategy
    }

    /// The raw lookup value.
    pub fn value(&self) -> &str {
        &self.value
    }

    /// Reject selectors that can never match anything.
    ///
    /// Element resolution calls this before touching the driver, so a malformed selector fails
    /// immediately instead of being retried until the wait times out. A class name is a single
    /// token and may not contain whitespace.
    pub fn validate(&self) -> Result<(), error::CmdError> {
        if self.value.trim().is_empty() {
            return Err(error::CmdError::InvalidSelector(format!(
                "{}: selector value is empty",
                self.strategy.as_str()
            )));
        }
        if self.strategy == Strategy::Class && self.value.contains(char::is_whitespace) {
            return Err(error::CmdError::InvalidSelector(format!(
                "{}: `{}` is more than one class name",
                self.strategy.as_str(),
                self.value
            )));
        }
        Ok(())
    }

    /// Lower this selector to a CSS selector, if the strategy has a CSS equivalent.
    ///
    /// Attribute values are emitted as escaped CSS strings. `XPath` has no equivalent and yields
    /// `None`.
    pub fn to_css(&self) -> Option<String> {
        let v = &self.value;
        match self.strategy {
            Strategy::Id => Some(format!("[id={}]", css_string(v))),
            Strategy::Class if is_css_identifier(v) => Some(format!(".{}", v)),
            Strategy::Class => Some(format!("[class~={}]", css_string(v))),
            Strategy::Css => Some(v.clone()),
            Strategy::Tag => Some(v.clone()),
            Strategy::Name => Some(format!("[name={}]", css_string(v))),
            Strategy::DataTestId => Some(format!("[data-testid={}]", css_string(v))),
            Strategy::XPath => None,
        }
    }
}

/// Quote `value` as a single-quoted CSS string.
///
/// Control characters cannot appear raw inside a CSS string and become hex escapes.
fn css_string(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('\'');
    for c in value.chars() {
        match c {
            '\\' | '\'' => {
                out.push('\\');
                out.push(c);
            }
            c if c.is_control() => out.push_str(&format!("\\{:x} ", u32::from(c))),
            c => out.push(c),
        }
    }
    out.push('\'');
    out
}

/// Whether `value` can follow a `.` in a class selector without escaping.
fn is_css_identifier(value: &str) -> bool {
    let body = value.strip_prefix('-').unwrap_or(value);
    body.starts_with(|c: char| c.is_ascii_alphabetic() || c == '_' || c == '-')
        && value.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.strategy.as_str(), self.value)
    }
}

/// The browser families a session can be created for.
#[derive(Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Debug, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BrowserType {
    /// Google Chrome.
    #[serde(alias = "Chrome")]
    Chrome,
    /// Microsoft Edge.
    #[serde(alias = "Edge")]
    Edge,
    /// Mozilla Firefox.
    #[serde(alias = "Firefox")]
    Firefox,
    /// Apple Safari.
    #[serde(alias = "Safari")]
    Safari,
}

const BROWSER_NAMES: [(BrowserType, &str); 4] = [
    (BrowserType::Chrome, "chrome"),
    (BrowserType::Edge, "edge"),
    (BrowserType::Firefox, "firefox"),
    (BrowserType::Safari, "safari"),
];

impl BrowserType {
    /// Every known browser family.
    pub const ALL: [BrowserType; 4] = [
        BrowserType::Chrome,
        BrowserType::Edge,
        BrowserType::Firefox,
        BrowserType::Safari,
    ];

    /// The lowercase name, as accepted by [`FromStr`].
    pub fn as_str(self) -> &'static str {
        BROWSER_NAMES
            .iter()
            .find(|(ty, _)| *ty == self)
            .map(|(_, name)| *name)
            .unwrap_or("unknown")
    }

    /// Whether the native pointer-action double click works for this family.
    ///
    /// safaridriver drops the second click of a double click sequence.
    pub fn supports_native_double_click(self) -> bool {
        !matches!(self, BrowserType::Safari)
    }
}

impl fmt::Display for BrowserType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BrowserType {
    type Err = error::CmdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        BROWSER_NAMES
            .iter()
            .find(|(_, name)| name.eq_ignore_ascii_case(s.trim()))
            .map(|(ty, _)| *ty)
            .ok_or_else(|| {
                error::CmdError::InvalidArgument("browser".to_string(), format!("`{}`", s))
            })
    }
}

/// Identifies one logical test worker.
///
/// All mutable session state is keyed by `WorkerId`, so two workers never share a driver, a
/// waiter, or a last-error slot.
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash)]
pub struct WorkerId(String);

impl WorkerId {
    /// The key used outside of any multi-worker context.
    pub const SINGLE: &'static str = "single";

    /// Create a worker id.
    pub fn new(id: impl Into<String>) -> Self {
        WorkerId(id.into())
    }

    /// The fallback worker id, `"single"`.
    pub fn single() -> Self {
        WorkerId(Self::SINGLE.to_string())
    }

    /// The id as a string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for WorkerId {
    fn default() -> Self {
        Self::single()
    }
}

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for WorkerId {
    fn from(s: &str) -> Self {
        WorkerId::new(s)
    }
}

impl From<String> for WorkerId {
    fn from(s: String) -> Self {
        WorkerId(s)
    }
}

/// An opaque reference to a node that the driver has already located.
///
/// The core never looks inside a `NodeRef`; only the [`Driver`](crate::Driver) that produced it
/// knows how to [`downcast`](NodeRef::downcast_ref) it back.
#[derive(Clone)]
pub struct NodeRef(Arc<dyn Any + Send + Sync>);

impl NodeRef {
    /// Wrap a backend-specific node.
    pub fn new<T: Any + Send + Sync>(node: T) -> Self {
        NodeRef(Arc::new(node))
    }

    /// Get the backend-specific node back, if it is of type `T`.
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.0.downcast_ref::<T>()
    }

    /// Whether both references point at the very same located node.
    pub fn same_node(&self, other: &NodeRef) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for NodeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeRef({:p})", Arc::as_ptr(&self.0))
    }
}

/// An argument passed to a script executed in the page.
#[derive(Clone, Debug)]
pub enum ScriptArg {
    /// A plain JSON value.
    Value(Json),
    /// A located node, exposed to the script as a DOM element.
    Node(NodeRef),
}

impl From<Json> for ScriptArg {
    fn from(v: Json) -> Self {
        ScriptArg::Value(v)
    }
}

impl From<NodeRef> for ScriptArg {
    fn from(n: NodeRef) -> Self {
        ScriptArg::Node(n)
    }
}

impl From<&str> for ScriptArg {
    fn from(s: &str) -> Self {
        ScriptArg::Value(Json::from(s))
    }
}

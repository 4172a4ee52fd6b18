//! An in-memory page for exercising page objects without a browser.
//!
//! [`FakePage`] implements [`Driver`] over a small mutable DOM. Tests build the DOM up front,
//! mutate it while a wait is running (from a spawned task, say), and then inspect which driver
//! operations were called.
//!
//! Lookups understand every [`Selector`] strategy except XPath, by way of
//! [`Selector::to_css`] and a CSS subset of `#id`, `.class`, `tag`, `[attr]`,
//! `[attr='value']` and `[attr~='word']`.

use crate::driver::Driver;
use crate::error::{CmdError, NewSessionError};
use crate::factory::BrowserFactory;
use crate::settings::BrowserSettings;
use crate::wd::{BrowserType, NodeRef, ScriptArg, Selector};
use async_trait::async_trait;
use serde_json::Value as Json;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::fmt::Write as _;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Identifies a node of a [`FakePage`].
#[derive(Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Debug, Hash)]
pub struct NodeId(usize);

/// A node to insert into a [`FakePage`].
///
/// Nodes are displayed and enabled unless told otherwise.
#[derive(Clone, Debug)]
pub struct FakeNode {
    tag: String,
    id: Option<String>,
    classes: Vec<String>,
    attrs: BTreeMap<String, String>,
    props: BTreeMap<String, String>,
    text: String,
    displayed: bool,
    enabled: bool,
    selected: bool,
}

impl FakeNode {
    /// A node with the given tag name.
    pub fn new(tag: impl Into<String>) -> Self {
        FakeNode {
            tag: tag.into(),
            id: None,
            classes: Vec::new(),
            attrs: BTreeMap::new(),
            props: BTreeMap::new(),
            text: String::new(),
            displayed: true,
            enabled: true,
            selected: false,
        }
    }

    /// Set the `id`.
    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Add a class.
    pub fn class(mut self, class: impl Into<String>) -> Self {
        self.classes.push(class.into());
        self
    }

    /// Set an attribute.
    pub fn attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attrs.insert(name.into(), value.into());
        self
    }

    /// Set a DOM property.
    pub fn prop(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.props.insert(name.into(), value.into());
        self
    }

    /// Set the rendered text.
    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    /// Render the node invisibly.
    pub fn hidden(mut self) -> Self {
        self.displayed = false;
        self
    }

    /// Disable the node.
    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// Mark the node as selected.
    pub fn selected(mut self) -> Self {
        self.selected = true;
        self
    }

    /// Set whether the node is displayed.
    pub fn set_displayed(&mut self, displayed: bool) {
        self.displayed = displayed;
    }

    /// Replace the rendered text.
    pub fn set_text(&mut self, text: impl Into<String>) {
        self.text = text.into();
    }

    fn attr_value(&self, name: &str) -> Option<String> {
        match name {
            "id" => self.id.clone(),
            "class" if !self.classes.is_empty() => Some(self.classes.join(" ")),
            _ => self.attrs.get(name).cloned(),
        }
    }

    fn label(&self) -> String {
        match self.id {
            Some(ref id) => format!("#{}", id),
            None => self.tag.clone(),
        }
    }

    fn matches_css(&self, css: &str) -> Result<bool, CmdError> {
        let css = css.trim();
        if let Some(id) = css.strip_prefix('#') {
            return Ok(self.id.as_deref() == Some(id));
        }
        if let Some(class) = css.strip_prefix('.') {
            return Ok(self.classes.iter().any(|c| c == class));
        }
        if let Some(inner) = css.strip_prefix('[').and_then(|s| s.strip_suffix(']')) {
            return Ok(match inner.split_once('=') {
                Some((name, value)) => {
                    let value = unquote(value.trim());
                    match name.trim().strip_suffix('~') {
                        Some(name) => self
                            .attr_value(name.trim())
                            .map_or(false, |v| v.split_whitespace().any(|w| w == value)),
                        None => self.attr_value(name.trim()).as_deref() == Some(value.as_str()),
                    }
                }
                None => self.attr_value(inner.trim()).is_some(),
            });
        }
        if !css.is_empty() && css.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
            return Ok(self.tag.eq_ignore_ascii_case(css));
        }
        Err(CmdError::InvalidSelector(format!(
            "`{}` is not supported by the fake page",
            css
        )))
    }
}

/// Strip the quotes off a CSS string and resolve its escapes.
fn unquote(value: &str) -> String {
    let inner = match value.chars().next() {
        Some(q @ ('\'' | '"')) => value
            .strip_prefix(q)
            .and_then(|v| v.strip_suffix(q))
            .unwrap_or(value),
        _ => return value.to_string(),
    };
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        let mut hex = String::new();
        while hex.len() < 6 && chars.peek().map_or(false, char::is_ascii_hexdigit) {
            hex.extend(chars.next());
        }
        if hex.is_empty() {
            out.extend(chars.next());
            continue;
        }
        if chars.peek() == Some(&' ') {
            chars.next();
        }
        let code = u32::from_str_radix(&hex, 16).ok().and_then(char::from_u32);
        out.push(code.unwrap_or(char::REPLACEMENT_CHARACTER));
    }
    out
}

#[derive(Debug)]
struct Slot {
    node: FakeNode,
    parent: Option<NodeId>,
    attached: bool,
}

#[derive(Debug, Default)]
struct PageState {
    slots: Vec<Slot>,
    url: String,
    sources: VecDeque<String>,
    scripts: HashMap<String, VecDeque<Json>>,
    script_log: Vec<String>,
    events: Vec<String>,
    calls: HashMap<&'static str, usize>,
    failures: HashMap<&'static str, VecDeque<CmdError>>,
    quit: bool,
}

/// Pops the front of `queue`, but keeps repeating its last element.
fn next_of<T: Clone>(queue: &mut VecDeque<T>) -> Option<T> {
    if queue.len() > 1 {
        queue.pop_front()
    } else {
        queue.front().cloned()
    }
}

impl PageState {
    fn enter(&mut self, op: &'static str) -> Result<(), CmdError> {
        *self.calls.entry(op).or_insert(0) += 1;
        match self.failures.get_mut(op).and_then(VecDeque::pop_front) {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn slot(&self, node: &NodeRef) -> Result<(NodeId, &Slot), CmdError> {
        let id = *node
            .downcast_ref::<NodeId>()
            .ok_or_else(|| CmdError::Unsupported("node of another driver".to_string()))?;
        match self.slots.get(id.0) {
            Some(slot) if slot.attached => Ok((id, slot)),
            _ => Err(CmdError::StaleElement(format!(
                "node {} is no longer attached to the document",
                id.0
            ))),
        }
    }

    fn interactable(&mut self, node: &NodeRef) -> Result<(NodeId, &mut FakeNode), CmdError> {
        let (id, slot) = self.slot(node)?;
        if !slot.node.displayed {
            return Err(CmdError::NotInteractable(format!(
                "{} is not displayed",
                slot.node.label()
            )));
        }
        Ok((id, &mut self.slots[id.0].node))
    }

    fn is_below(&self, id: NodeId, ancestor: NodeId) -> bool {
        let mut cur = self.slots[id.0].parent;
        while let Some(p) = cur {
            if p == ancestor {
                return true;
            }
            cur = self.slots[p.0].parent;
        }
        false
    }

    fn matching(
        &self,
        scope: Option<&NodeRef>,
        selector: &Selector,
    ) -> Result<Vec<NodeId>, CmdError> {
        let css = selector
            .to_css()
            .ok_or_else(|| CmdError::Unsupported(format!("{} on the fake page", selector)))?;
        let scope = match scope {
            Some(node) => Some(self.slot(node)?.0),
            None => None,
        };
        let mut found = Vec::new();
        for (i, slot) in self.slots.iter().enumerate() {
            let id = NodeId(i);
            if !slot.attached || scope.map_or(false, |s| !self.is_below(id, s)) {
                continue;
            }
            if slot.node.matches_css(&css)? {
                found.push(id);
            }
        }
        Ok(found)
    }

    fn render(&self) -> String {
        let mut out = String::from("<html><body>");
        for slot in self.slots.iter().filter(|s| s.attached) {
            let n = &slot.node;
            let _ = write!(out, "<{}", n.tag);
            if let Some(ref id) = n.id {
                let _ = write!(out, " id=\"{}\"", id);
            }
            for (k, v) in &n.attrs {
                let _ = write!(out, " {}=\"{}\"", k, v);
            }
            if let Some(v) = n.props.get("value") {
                let _ = write!(out, " value=\"{}\"", v);
            }
            if !n.displayed {
                out.push_str(" hidden");
            }
            let _ = write!(out, ">{}</{}>", n.text, n.tag);
        }
        out.push_str("</body></html>");
        out
    }

    fn event(&mut self, op: &str, id: NodeId) {
        let label = self.slots[id.0].node.label();
        self.events.push(format!("{} {}", op, label));
    }
}

/// An in-memory [`Driver`].
///
/// Clones share the same page, so a test can keep one clone for inspection while the code under
/// test drives another.
#[derive(Clone, Debug)]
pub struct FakePage {
    family: BrowserType,
    state: Arc<Mutex<PageState>>,
}

impl Default for FakePage {
    fn default() -> Self {
        Self::new()
    }
}

impl FakePage {
    /// An empty Chrome page at `about:blank`.
    pub fn new() -> Self {
        Self::with_family(BrowserType::Chrome)
    }

    /// An empty page that claims to be `family`.
    pub fn with_family(family: BrowserType) -> Self {
        let state = PageState {
            url: "about:blank".to_string(),
            ..Default::default()
        };
        FakePage {
            family,
            state: Arc::new(Mutex::new(state)),
        }
    }

    fn state(&self) -> MutexGuard<'_, PageState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Attach `node` to the document, below `parent` if given.
    pub fn insert(&self, parent: Option<NodeId>, node: FakeNode) -> NodeId {
        let mut st = self.state();
        st.slots.push(Slot {
            node,
            parent,
            attached: true,
        });
        NodeId(st.slots.len() - 1)
    }

    /// Detach a node and everything below it.
    pub fn remove(&self, id: NodeId) {
        let mut st = self.state();
        for i in 0..st.slots.len() {
            if NodeId(i) == id || st.is_below(NodeId(i), id) {
                st.slots[i].attached = false;
            }
        }
    }

    /// Change a node in place.
    pub fn update(&self, id: NodeId, f: impl FnOnce(&mut FakeNode)) {
        if let Some(slot) = self.state().slots.get_mut(id.0) {
            f(&mut slot.node);
        }
    }

    /// A DOM property of a node.
    pub fn prop(&self, id: NodeId, name: &str) -> Option<String> {
        self.state()
            .slots
            .get(id.0)
            .and_then(|s| s.node.props.get(name).cloned())
    }

    /// Whether a node is selected.
    pub fn is_selected(&self, id: NodeId) -> bool {
        self.state()
            .slots
            .get(id.0)
            .map_or(false, |s| s.node.selected)
    }

    /// Change the current URL.
    pub fn set_url(&self, url: impl Into<String>) {
        self.state().url = url.into();
    }

    /// Serve these page sources in order, repeating the last one.
    ///
    /// Until this is called, the page source is rendered from the DOM.
    pub fn set_page_sources<I, S>(&self, sources: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.state().sources = sources.into_iter().map(Into::into).collect();
    }

    /// Answer `script` with `value`.
    pub fn on_script(&self, script: impl Into<String>, value: Json) {
        self.on_script_sequence(script, vec![value]);
    }

    /// Answer `script` with these values in order, repeating the last one.
    pub fn on_script_sequence(&self, script: impl Into<String>, values: Vec<Json>) {
        self.state().scripts.insert(script.into(), values.into());
    }

    /// Make the next call of the driver operation `op` fail with `e`.
    ///
    /// `op` is the [`Driver`] method name, e.g. `"find_element"`. Repeated calls queue up.
    pub fn fail_next(&self, op: &'static str, e: CmdError) {
        self.state().failures.entry(op).or_default().push_back(e);
    }

    /// How often the driver operation `op` was called.
    pub fn calls(&self, op: &str) -> usize {
        self.state().calls.get(op).copied().unwrap_or(0)
    }

    /// The total number of driver calls so far.
    pub fn total_calls(&self) -> usize {
        self.state().calls.values().sum()
    }

    /// Every script executed so far.
    pub fn scripts(&self) -> Vec<String> {
        self.state().script_log.clone()
    }

    /// Every node interaction so far, e.g. `click #submit`.
    pub fn events(&self) -> Vec<String> {
        self.state().events.clone()
    }

    /// Whether the session was quit.
    pub fn is_quit(&self) -> bool {
        self.state().quit
    }
}

#[async_trait]
impl Driver for FakePage {
    fn family(&self) -> BrowserType {
        self.family
    }

    async fn find_element(
        &self,
        scope: Option<&NodeRef>,
        selector: &Selector,
    ) -> Result<NodeRef, CmdError> {
        let mut st = self.state();
        st.enter("find_element")?;
        st.matching(scope, selector)?
            .first()
            .map(|id| NodeRef::new(*id))
            .ok_or_else(|| CmdError::NoSuchElement(format!("Unable to locate {}", selector)))
    }

    async fn find_elements(
        &self,
        scope: Option<&NodeRef>,
        selector: &Selector,
    ) -> Result<Vec<NodeRef>, CmdError> {
        let mut st = self.state();
        st.enter("find_elements")?;
        Ok(st
            .matching(scope, selector)?
            .into_iter()
            .map(NodeRef::new)
            .collect())
    }

    async fn text(&self, node: &NodeRef) -> Result<String, CmdError> {
        let mut st = self.state();
        st.enter("text")?;
        Ok(st.slot(node)?.1.node.text.clone())
    }

    async fn attribute(&self, node: &NodeRef, name: &str) -> Result<Option<String>, CmdError> {
        let mut st = self.state();
        st.enter("attribute")?;
        Ok(st.slot(node)?.1.node.attr_value(name))
    }

    async fn property(&self, node: &NodeRef, name: &str) -> Result<Option<String>, CmdError> {
        let mut st = self.state();
        st.enter("property")?;
        Ok(st.slot(node)?.1.node.props.get(name).cloned())
    }

    async fn css_value(&self, node: &NodeRef, name: &str) -> Result<String, CmdError> {
        let mut st = self.state();
        st.enter("css_value")?;
        let n = &st.slot(node)?.1.node;
        Ok(match name {
            "display" if !n.displayed => "none".to_string(),
            "display" => "block".to_string(),
            _ => {
                let style = n.attrs.get(&format!("style:{}", name));
                style.cloned().unwrap_or_default()
            }
        })
    }

    async fn is_displayed(&self, node: &NodeRef) -> Result<bool, CmdError> {
        let mut st = self.state();
        st.enter("is_displayed")?;
        Ok(st.slot(node)?.1.node.displayed)
    }

    async fn is_enabled(&self, node: &NodeRef) -> Result<bool, CmdError> {
        let mut st = self.state();
        st.enter("is_enabled")?;
        Ok(st.slot(node)?.1.node.enabled)
    }

    async fn is_selected(&self, node: &NodeRef) -> Result<bool, CmdError> {
        let mut st = self.state();
        st.enter("is_selected")?;
        Ok(st.slot(node)?.1.node.selected)
    }

    async fn tag_name(&self, node: &NodeRef) -> Result<String, CmdError> {
        let mut st = self.state();
        st.enter("tag_name")?;
        Ok(st.slot(node)?.1.node.tag.clone())
    }

    async fn click(&self, node: &NodeRef) -> Result<(), CmdError> {
        let mut st = self.state();
        st.enter("click")?;
        let (id, n) = st.interactable(node)?;
        if n.enabled && n.tag.eq_ignore_ascii_case("input") {
            match n.attrs.get("type").map(String::as_str) {
                Some("checkbox") => n.selected = !n.selected,
                Some("radio") => n.selected = true,
                _ => {}
            }
        }
        st.event("click", id);
        Ok(())
    }

    async fn send_keys(&self, node: &NodeRef, text: &str) -> Result<(), CmdError> {
        let mut st = self.state();
        st.enter("send_keys")?;
        let (id, n) = st.interactable(node)?;
        let value = n.props.entry("value".to_string()).or_default();
        value.push_str(text);
        st.event("send_keys", id);
        Ok(())
    }

    async fn clear(&self, node: &NodeRef) -> Result<(), CmdError> {
        let mut st = self.state();
        st.enter("clear")?;
        let (id, n) = st.interactable(node)?;
        n.props.insert("value".to_string(), String::new());
        st.event("clear", id);
        Ok(())
    }

    async fn current_url(&self) -> Result<String, CmdError> {
        let mut st = self.state();
        st.enter("current_url")?;
        Ok(st.url.clone())
    }

    async fn page_source(&self) -> Result<String, CmdError> {
        let mut st = self.state();
        st.enter("page_source")?;
        match next_of(&mut st.sources) {
            Some(source) => Ok(source),
            None => Ok(st.render()),
        }
    }

    async fn execute_script(&self, script: &str, args: Vec<ScriptArg>) -> Result<Json, CmdError> {
        let mut st = self.state();
        st.enter("execute_script")?;
        for arg in &args {
            if let ScriptArg::Node(ref node) = *arg {
                st.slot(node)?;
            }
        }
        st.script_log.push(script.to_string());
        Ok(st
            .scripts
            .get_mut(script)
            .and_then(next_of)
            .unwrap_or(Json::Null))
    }

    async fn navigate_to(&self, url: &str) -> Result<(), CmdError> {
        let mut st = self.state();
        st.enter("navigate_to")?;
        st.url = url.to_string();
        Ok(())
    }

    async fn maximize_window(&self) -> Result<(), CmdError> {
        self.state().enter("maximize_window")
    }

    async fn screenshot(&self) -> Result<Vec<u8>, CmdError> {
        self.state().enter("screenshot")?;
        Ok(b"\x89PNG\r\n\x1a\n".to_vec())
    }

    async fn quit(&self) -> Result<(), CmdError> {
        let mut st = self.state();
        st.enter("quit")?;
        st.quit = true;
        Ok(())
    }

    async fn double_click(&self, node: &NodeRef) -> Result<(), CmdError> {
        let mut st = self.state();
        st.enter("double_click")?;
        let (id, _) = st.interactable(node)?;
        st.event("double_click", id);
        Ok(())
    }

    async fn context_click(&self, node: &NodeRef) -> Result<(), CmdError> {
        let mut st = self.state();
        st.enter("context_click")?;
        let (id, _) = st.interactable(node)?;
        st.event("context_click", id);
        Ok(())
    }

    async fn move_to_element(&self, node: &NodeRef) -> Result<(), CmdError> {
        let mut st = self.state();
        st.enter("move_to_element")?;
        let (id, _) = st.slot(node)?;
        st.event("move_to_element", id);
        Ok(())
    }

    async fn drag_and_drop(&self, source: &NodeRef, target: &NodeRef) -> Result<(), CmdError> {
        let mut st = self.state();
        st.enter("drag_and_drop")?;
        let (from, _) = st.interactable(source)?;
        let (to, _) = st.slot(target)?;
        let to = st.slots[to.0].node.label();
        st.event("drag_and_drop", from);
        if let Some(last) = st.events.last_mut() {
            let _ = write!(last, " -> {}", to);
        }
        Ok(())
    }

    async fn scroll_to_element(&self, node: &NodeRef) -> Result<(), CmdError> {
        let mut st = self.state();
        st.enter("scroll_to_element")?;
        let (id, _) = st.slot(node)?;
        st.event("scroll_to_element", id);
        Ok(())
    }
}

/// A [`BrowserFactory`] that hands out [`FakePage`]s.
#[derive(Clone, Debug)]
pub struct FakeFactory {
    shared: Option<FakePage>,
    sessions: Arc<Mutex<Vec<FakePage>>>,
}

impl FakeFactory {
    /// Every session is backed by `page`.
    pub fn new(page: FakePage) -> Self {
        FakeFactory {
            shared: Some(page),
            sessions: Arc::default(),
        }
    }

    /// Every session gets a page of its own.
    pub fn fresh_pages() -> Self {
        FakeFactory {
            shared: None,
            sessions: Arc::default(),
        }
    }

    /// The page behind every session created so far, oldest first.
    pub fn sessions(&self) -> Vec<FakePage> {
        self.sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl BrowserFactory for FakeFactory {
    async fn create(&self, settings: &BrowserSettings) -> Result<Arc<dyn Driver>, NewSessionError> {
        let page = match self.shared {
            Some(ref page) => page.clone(),
            None => FakePage::with_family(settings.browser_type),
        };
        self.sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(page.clone());
        Ok(Arc::new(page))
    }
}

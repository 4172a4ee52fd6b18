//! Page Objects for browser tests, with waits built in.
//!
//! This crate sits on top of a [WebDriver] session (driven through [`fantoccini`]) and gives test
//! code three things:
//!
//!  - lazy element handles. An [`Element`] is a recipe for finding a node: a [`Selector`] and
//!    optionally a parent element. Nothing is looked up until the element is used, and it is
//!    looked up again on every use, so a handle never goes stale.
//!  - a polling retry engine. [`ConditionalWaiter`] re-runs a probe until it succeeds or a
//!    timeout elapses. Every element read and action goes through it, so tests do not have to
//!    sprinkle sleeps around pages that render asynchronously.
//!  - a per-worker session registry. [`WebManager`] owns one [`Browser`] and one [`Waiter`] per
//!    [`WorkerId`], so tests running in parallel never share a driver.
//!
//! # Examples
//!
//! These examples assume that you have a [WebDriver compatible] process such as `chromedriver`
//! running on port 9515.
//!
//! A Page Object declares its elements once and uses them as often as it likes:
//!
//! ```no_run
//! use karpatium::error::CmdError;
//! use karpatium::{Browser, CommonElement, InputElement, Selector};
//!
//! struct TextBoxPage {
//!     full_name: InputElement,
//!     submit: CommonElement,
//!     output: CommonElement,
//! }
//!
//! impl TextBoxPage {
//!     fn new(browser: &Browser) -> Self {
//!         TextBoxPage {
//!             full_name: browser.create(Selector::id("userName"), None),
//!             submit: browser.create(Selector::id("submit"), None),
//!             output: browser.create(Selector::id("name"), None),
//!         }
//!     }
//!
//!     async fn submit_name(&self, name: &str) -> Result<String, CmdError> {
//!         self.full_name.set_text(name).await?;
//!         self.submit.click().await?;
//!         self.output.text().await
//!     }
//! }
//! ```
//!
//! A test asks the [`WebManager`] for its worker's browser:
//!
//! ```no_run
//! # use karpatium::{BrowserSettings, CommonElement, Selector, WebManager, WorkerId};
//! # async fn doc() -> Result<(), Box<dyn std::error::Error>> {
//! let manager = WebManager::new();
//! let worker = WorkerId::new("worker-1");
//! let browser = manager.initialize(&worker, &BrowserSettings::default()).await?;
//!
//! browser.navigate_to("https://demoqa.com/text-box").await?;
//! manager.waiter(&worker)?.for_document_ready_state_to_be_complete().await?;
//!
//! let header: CommonElement = browser.create(Selector::css(".text-center"), None);
//! assert_eq!(header.text().await?, "Text Box");
//!
//! manager.quit(&worker).await?;
//! # Ok(())
//! # }
//! ```
//!
//! Waits can also be used directly. A wait returns the last real failure when it times out, so
//! the error says what was actually wrong:
//!
//! ```no_run
//! # use karpatium::{ConditionalWaiter, WorkerId};
//! # use std::time::Duration;
//! # async fn doc(probe: impl Fn() -> bool) -> Result<(), karpatium::error::CmdError> {
//! let waiter = ConditionalWaiter::new(WorkerId::single()).at_most(Duration::from_secs(2));
//! waiter
//!     .for_true("the probe never passed.", || async { Ok(probe()) })
//!     .await?;
//! # Ok(())
//! # }
//! ```
//!
//! [WebDriver]: https://www.w3.org/TR/webdriver/
//! [WebDriver compatible]: https://github.com/Fyrd/caniuse/issues/2757#issuecomment-304529217
#![deny(missing_docs)]
#![warn(missing_debug_implementations, rust_2018_idioms)]

/// Error types.
pub mod error;

mod browser;
mod driver;
mod elements;
mod factory;
mod manager;
mod remote;
mod runner;
mod settings;
mod wait;
mod waiter;
mod wd;

#[cfg(any(test, feature = "test_helpers"))]
pub mod testing;

pub use browser::Browser;
pub use driver::Driver;
pub use elements::{
    CheckBoxElement, CommonElement, Element, ElementCollection, ImageElement, InputElement,
    RadioButtonElement, TypedElement,
};
pub use factory::{capabilities, endpoint, BrowserFactory, Capabilities, WebDriverFactory};
pub use manager::WebManager;
pub use remote::WebDriverBackend;
pub use runner::ignore_errors;
pub use settings::BrowserSettings;
pub use wait::{ConditionalWaiter, LastErrors, DEFAULT_PERIOD, DEFAULT_TIMEOUT};
pub use waiter::{Waiter, DEFAULT_STABILITY_INTERVAL};
pub use wd::{BrowserType, NodeRef, ScriptArg, Selector, Strategy, WorkerId};

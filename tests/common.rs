#![allow(dead_code)]

use karpatium::testing::FakePage;
use karpatium::{Browser, ConditionalWaiter, WorkerId};
use std::sync::Arc;
use std::time::Duration;

/// Route `tracing` output through the test harness, so it shows up for failing tests only.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// A browser on `page` whose waits give up after `timeout`.
pub fn browser_with_timeout(page: &FakePage, timeout: Duration) -> Browser {
    init_tracing();
    let waiter = ConditionalWaiter::new(WorkerId::new("test")).at_most(timeout);
    Browser::new(Arc::new(page.clone()), waiter)
}

/// A browser on `page` with a short wait timeout.
pub fn browser(page: &FakePage) -> Browser {
    browser_with_timeout(page, Duration::from_secs(2))
}

//! Run actions whose failure is acceptable.

use std::fmt::Display;
use std::future::Future;

/// Run `action` once and ignore any error it fails with.
///
/// Meant for best-effort chores such as removing an ad banner that may or may not be present.
/// The error is logged at `trace` level and otherwise discarded.
///
/// ```no_run
/// # async fn doc(browser: karpatium::Browser) {
/// karpatium::ignore_errors(
///     browser.execute_script("document.getElementById('fixedban').remove()", vec![]),
/// )
/// .await;
/// # }
/// ```
pub async fn ignore_errors<T, E, Fut>(action: Fut)
where
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    if let Err(e) = action.await {
        tracing::trace!(error = %e, "ignored error");
    }
}

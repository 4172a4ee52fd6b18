use crate::wd::{BrowserType, WorkerId};
use std::error::Error;
use std::fmt;
use std::io::Error as IOError;
use std::sync::Arc;
use std::time::Duration;
use url::ParseError;

/// An error occurred while initializing a browser session for a worker.
#[derive(Debug)]
pub enum NewSessionError {
    /// No browser factory is registered for the requested browser type.
    BrowserFactoryNotImplemented(BrowserType),
    /// The given WebDriver URL is invalid.
    BadWebdriverUrl(ParseError),
    /// The browser settings are inconsistent, e.g. headless Safari.
    InvalidSettings(String),
    /// A local directory needed by the session could not be prepared.
    Io(IOError),
    /// The WebDriver server refused or failed to create a session.
    Failed(fantoccini::error::NewSessionError),
}

impl Error for NewSessionError {
    fn description(&self) -> &str {
        match *self {
            NewSessionError::BrowserFactoryNotImplemented(..) => {
                "browser factory is not implemented"
            }
            NewSessionError::BadWebdriverUrl(..) => "webdriver url is invalid",
            NewSessionError::InvalidSettings(..) => "browser settings are invalid",
            NewSessionError::Io(..) => "local session setup failed",
            NewSessionError::Failed(..) => "webdriver did not create session",
        }
    }

    fn cause(&self) -> Option<&dyn Error> {
        match *self {
            NewSessionError::BadWebdriverUrl(ref e) => Some(e),
            NewSessionError::Io(ref e) => Some(e),
            NewSessionError::Failed(ref e) => Some(e),
            NewSessionError::BrowserFactoryNotImplemented(..)
            | NewSessionError::InvalidSettings(..) => None,
        }
    }
}

impl fmt::Display for NewSessionError {
    #[allow(deprecated)]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: ", self.description())?;
        match *self {
            NewSessionError::BrowserFactoryNotImplemented(ty) => {
                write!(f, "browser factory for `{}` is not implemented", ty)
            }
            NewSessionError::BadWebdriverUrl(ref e) => write!(f, "{}", e),
            NewSessionError::InvalidSettings(ref e) => write!(f, "{}", e),
            NewSessionError::Io(ref e) => write!(f, "{}", e),
            NewSessionError::Failed(ref e) => write!(f, "{}", e),
        }
    }
}

impl From<IOError> for NewSessionError {
    fn from(e: IOError) -> Self {
        NewSessionError::Io(e)
    }
}

impl From<ParseError> for NewSessionError {
    fn from(e: ParseError) -> Self {
        NewSessionError::BadWebdriverUrl(e)
    }
}

impl From<fantoccini::error::NewSessionError> for NewSessionError {
    fn from(e: fantoccini::error::NewSessionError) -> Self {
        NewSessionError::Failed(e)
    }
}

/// An error occurred while resolving an element, reading page state, or waiting on a condition.
///
/// The variants fall into two groups. *Transient* failures (a node that is not rendered yet, has
/// been detached, or cannot be interacted with right now, and any other backend hiccup) are
/// absorbed by the wait engine and retried until the wait times out. *Usage* failures (a
/// malformed selector, an invalid argument, a worker that was never initialized) are programmer
/// or configuration errors: they are returned immediately and never retried. See
/// [`CmdError::is_transient`].
///
/// The type is cheap to clone so the wait engine can keep a copy of the last failure per worker.
#[derive(Debug, Clone)]
pub enum CmdError {
    /// No element was found matching the selector.
    NoSuchElement(String),

    /// The located node is no longer attached to the document.
    StaleElement(String),

    /// The node exists but cannot be interacted with at the moment.
    NotInteractable(String),

    /// The browser-automation backend reported some other failure.
    Driver(Arc<dyn Error + Send + Sync>),

    /// The selector can never match, e.g. because its value is empty.
    InvalidSelector(String),

    /// A function was invoked with an invalid argument.
    InvalidArgument(String, String),

    /// The browser or waiter of a worker was accessed before `initialize` or after `quit`.
    NotInitialized(WorkerId),

    /// The operation is not supported by the active backend.
    Unsupported(String),

    /// A wait condition did not hold in time, and no attempt ever failed with an error.
    WaitTimeout {
        /// The label of the wait that timed out.
        label: String,
        /// The timeout that elapsed.
        timeout: Duration,
    },
}

impl CmdError {
    /// Wrap any backend error.
    pub fn driver<E>(e: E) -> Self
    where
        E: Error + Send + Sync + 'static,
    {
        CmdError::Driver(Arc::new(e))
    }

    /// Returns true if this error indicates that a matching element was not found.
    pub fn is_miss(&self) -> bool {
        matches!(self, CmdError::NoSuchElement(..) | CmdError::StaleElement(..))
    }

    /// Returns true if a later attempt of the same operation may succeed.
    ///
    /// The wait engine retries transient errors and returns all others immediately.
    pub fn is_transient(&self) -> bool {
        match *self {
            CmdError::NoSuchElement(..)
            | CmdError::StaleElement(..)
            | CmdError::NotInteractable(..)
            | CmdError::Driver(..)
            | CmdError::WaitTimeout { .. } => true,
            CmdError::InvalidSelector(..)
            | CmdError::InvalidArgument(..)
            | CmdError::NotInitialized(..)
            | CmdError::Unsupported(..) => false,
        }
    }

    /// Returns true if this is the synthetic timeout of a wait.
    pub fn is_timeout(&self) -> bool {
        matches!(self, CmdError::WaitTimeout { .. })
    }
}

impl Error for CmdError {
    fn description(&self) -> &str {
        match *self {
            CmdError::NoSuchElement(..) => "no such element",
            CmdError::StaleElement(..) => "stale element reference",
            CmdError::NotInteractable(..) => "element not interactable",
            CmdError::Driver(..) => "browser backend failed",
            CmdError::InvalidSelector(..) => "invalid selector",
            CmdError::InvalidArgument(..) => "invalid argument provided",
            CmdError::NotInitialized(..) => "web manager is not initialized",
            CmdError::Unsupported(..) => "operation not supported",
            CmdError::WaitTimeout { .. } => "timeout waiting on condition",
        }
    }

    fn cause(&self) -> Option<&dyn Error> {
        match *self {
            CmdError::Driver(ref e) => Some(&**e),
            _ => None,
        }
    }
}

impl fmt::Display for CmdError {
    #[allow(deprecated)]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            CmdError::NoSuchElement(ref e)
            | CmdError::StaleElement(ref e)
            | CmdError::NotInteractable(ref e)
            | CmdError::InvalidSelector(ref e)
            | CmdError::Unsupported(ref e) => write!(f, "{}: {}", self.description(), e),
            CmdError::Driver(ref e) => write!(f, "{}: {}", self.description(), e),
            CmdError::InvalidArgument(ref arg, ref msg) => {
                write!(f, "Invalid argument `{}`: {}", arg, msg)
            }
            CmdError::NotInitialized(ref worker) => {
                write!(f, "{} for worker `{}`", self.description(), worker)
            }
            CmdError::WaitTimeout {
                ref label,
                timeout,
            } => write!(
                f,
                "{} Timeout of '{}' seconds reached.",
                label,
                timeout.as_secs_f64()
            ),
        }
    }
}

impl From<fantoccini::error::CmdError> for CmdError {
    fn from(e: fantoccini::error::CmdError) -> Self {
        use fantoccini::error::{CmdError as Wd, ErrorStatus};

        let classified = match e {
            Wd::Standard(ref wd) => {
                let msg = wd.to_string();
                match wd.error {
                    ErrorStatus::NoSuchElement => Some(CmdError::NoSuchElement(msg)),
                    ErrorStatus::StaleElementReference => Some(CmdError::StaleElement(msg)),
                    ErrorStatus::ElementNotInteractable | ErrorStatus::ElementClickIntercepted => {
                        Some(CmdError::NotInteractable(msg))
                    }
                    ErrorStatus::InvalidSelector => Some(CmdError::InvalidSelector(msg)),
                    ErrorStatus::InvalidArgument => {
                        Some(CmdError::InvalidArgument("webdriver".to_string(), msg))
                    }
                    _ => None,
                }
            }
            Wd::InvalidArgument(ref arg, ref msg) => {
                Some(CmdError::InvalidArgument(arg.clone(), msg.clone()))
            }
            _ => None,
        };
        classified.unwrap_or_else(|| CmdError::driver(e))
    }
}

impl From<ParseError> for CmdError {
    fn from(e: ParseError) -> Self {
        CmdError::InvalidArgument("url".to_string(), e.to_string())
    }
}

impl From<IOError> for CmdError {
    fn from(e: IOError) -> Self {
        CmdError::driver(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ensure_display_error_doesnt_stackoverflow() {
        println!("{}", CmdError::NoSuchElement("test".to_string()));
        println!("{}", CmdError::driver(IOError::last_os_error()));
        println!("{}", NewSessionError::Io(IOError::last_os_error()));
        println!(
            "{}",
            NewSessionError::BrowserFactoryNotImplemented(BrowserType::Safari)
        );
    }

    #[test]
    fn timeout_names_the_wait() {
        let e = CmdError::WaitTimeout {
            label: "`for_url_to_be` failed.".to_string(),
            timeout: Duration::from_secs(3),
        };
        assert_eq!(
            e.to_string(),
            "`for_url_to_be` failed. Timeout of '3' seconds reached."
        );
        assert!(e.is_timeout());
    }

    #[test]
    fn usage_errors_are_not_transient() {
        assert!(CmdError::NoSuchElement(String::new()).is_transient());
        assert!(CmdError::driver(IOError::last_os_error()).is_transient());
        assert!(!CmdError::InvalidSelector(String::new()).is_transient());
        assert!(!CmdError::NotInitialized(WorkerId::single()).is_transient());
        assert!(!CmdError::InvalidArgument("url".into(), "relative".into()).is_transient());
    }

    #[test]
    fn miss_message_leads_with_no_such_element() {
        let e = CmdError::NoSuchElement("Unable to locate #missing".to_string());
        assert!(e.is_miss());
        assert_eq!(e.to_string(), "no such element: Unable to locate #missing");
    }

    fn from_webdriver(status: fantoccini::error::ErrorStatus) -> CmdError {
        let wd = fantoccini::error::WebDriver::new(status, "detail from the server");
        CmdError::from(fantoccini::error::CmdError::Standard(wd))
    }

    #[test]
    fn webdriver_errors_are_classified_by_status() {
        use fantoccini::error::ErrorStatus;

        let e = from_webdriver(ErrorStatus::NoSuchElement);
        assert!(matches!(e, CmdError::NoSuchElement(ref m) if m.contains("from the server")));
        assert!(e.is_transient());

        let e = from_webdriver(ErrorStatus::StaleElementReference);
        assert!(matches!(e, CmdError::StaleElement(..)));
        assert!(e.is_transient());

        let e = from_webdriver(ErrorStatus::ElementClickIntercepted);
        assert!(matches!(e, CmdError::NotInteractable(..)));
        assert!(e.is_transient());

        let e = from_webdriver(ErrorStatus::ElementNotInteractable);
        assert!(matches!(e, CmdError::NotInteractable(..)));

        let e = from_webdriver(ErrorStatus::InvalidSelector);
        assert!(matches!(e, CmdError::InvalidSelector(..)));
        assert!(!e.is_transient());

        let e = from_webdriver(ErrorStatus::InvalidArgument);
        assert!(matches!(e, CmdError::InvalidArgument(ref arg, _) if arg == "webdriver"));
        assert!(!e.is_transient());
    }

    #[test]
    fn unclassified_webdriver_errors_are_retried() {
        use fantoccini::error::ErrorStatus;

        let e = from_webdriver(ErrorStatus::JavascriptError);
        assert!(matches!(e, CmdError::Driver(..)));
        assert!(e.is_transient());

        let e = CmdError::from(fantoccini::error::CmdError::NotJson("<html>".to_string()));
        assert!(matches!(e, CmdError::Driver(..)));

        let e = CmdError::from(fantoccini::error::CmdError::InvalidArgument(
            "script".to_string(),
            "not an object".to_string(),
        ));
        assert!(matches!(e, CmdError::InvalidArgument(ref arg, _) if arg == "script"));
        assert!(!e.is_transient());
    }
}

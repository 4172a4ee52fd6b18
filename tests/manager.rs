//! Session registry tests
use karpatium::error::{CmdError, NewSessionError};
use karpatium::testing::{FakeFactory, FakeNode, FakePage};
use karpatium::{
    BrowserFactory, BrowserSettings, BrowserType, CommonElement, Selector, WebManager, WorkerId,
};
use std::sync::Arc;
use std::time::Duration;

mod common;

fn settings(downloads: &tempfile::TempDir) -> BrowserSettings {
    common::init_tracing();
    BrowserSettings {
        downloaded_files_folder_name: downloads.path().join("Downloads").display().to_string(),
        default_timeout_seconds: 1,
        ..Default::default()
    }
}

#[tokio::test]
async fn nothing_before_initialize() {
    let manager = WebManager::new();
    let worker = WorkerId::new("gw0");

    assert!(!manager.is_initialized(&worker));
    assert!(matches!(
        manager.browser(&worker),
        Err(CmdError::NotInitialized(ref w)) if *w == worker
    ));
    assert!(matches!(
        manager.waiter(&worker),
        Err(CmdError::NotInitialized(..))
    ));
    assert!(matches!(
        manager.quit(&worker).await,
        Err(CmdError::NotInitialized(..))
    ));
}

#[tokio::test]
async fn initialize_then_quit() -> Result<(), Box<dyn std::error::Error>> {
    let downloads = tempfile::tempdir()?;
    let settings = settings(&downloads);
    let factory = FakeFactory::fresh_pages();
    let manager = WebManager::new().register(BrowserType::Chrome, factory.clone());
    let worker = WorkerId::single();

    let browser = manager.initialize(&worker, &settings).await?;
    assert!(manager.is_initialized(&worker));
    assert!(downloads.path().join("Downloads").is_dir());
    assert_eq!(browser.family(), BrowserType::Chrome);
    assert_eq!(manager.waiter(&worker)?.timeout(), Duration::from_secs(1));

    manager.quit(&worker).await?;
    assert!(factory.sessions()[0].is_quit());
    assert!(matches!(
        manager.browser(&worker),
        Err(CmdError::NotInitialized(..))
    ));
    Ok(())
}

#[tokio::test]
async fn unknown_browser_type() -> Result<(), Box<dyn std::error::Error>> {
    let downloads = tempfile::tempdir()?;
    let factory: Arc<dyn BrowserFactory> = Arc::new(FakeFactory::fresh_pages());
    let manager = WebManager::with_factories([(BrowserType::Chrome, factory)]);
    let settings = BrowserSettings {
        browser_type: BrowserType::Firefox,
        ..settings(&downloads)
    };

    assert!(matches!(
        manager.initialize(&WorkerId::single(), &settings).await,
        Err(NewSessionError::BrowserFactoryNotImplemented(BrowserType::Firefox))
    ));
    assert!(!manager.is_initialized(&WorkerId::single()));
    Ok(())
}

#[tokio::test]
async fn invalid_settings_never_reach_the_factory() -> Result<(), Box<dyn std::error::Error>> {
    let downloads = tempfile::tempdir()?;
    let factory = FakeFactory::fresh_pages();
    let manager = WebManager::new().register(BrowserType::Chrome, factory.clone());
    let settings = BrowserSettings {
        is_local_execution: false,
        ..settings(&downloads)
    };

    assert!(manager
        .initialize(&WorkerId::single(), &settings)
        .await
        .is_err());
    assert!(factory.sessions().is_empty());
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn workers_are_isolated() -> Result<(), Box<dyn std::error::Error>> {
    let downloads = tempfile::tempdir()?;
    let settings = settings(&downloads);
    let factory = FakeFactory::fresh_pages();
    let manager = WebManager::new().register(BrowserType::Chrome, factory.clone());
    let (gw0, gw1) = (WorkerId::new("gw0"), WorkerId::new("gw1"));

    manager.initialize(&gw0, &settings).await?;
    manager.initialize(&gw1, &settings).await?;
    let pages = factory.sessions();
    pages[1].insert(None, FakeNode::new("h1").class("text-center").text("Forms"));

    let header = |worker: &WorkerId| -> Result<CommonElement, CmdError> {
        Ok(manager
            .browser(worker)?
            .create(Selector::class("text-center"), None))
    };
    assert_eq!(header(&gw1)?.text().await?, "Forms");
    assert!(header(&gw0)?.text().await.is_err());
    assert!(matches!(
        manager.last_error(&gw0),
        Some(CmdError::NoSuchElement(..))
    ));
    assert!(manager.last_error(&gw1).is_none());

    manager.quit(&gw0).await?;
    assert!(pages[0].is_quit());
    assert!(!pages[1].is_quit());
    assert!(manager.is_initialized(&gw1));
    Ok(())
}

#[tokio::test]
async fn reinitializing_replaces_the_session() -> Result<(), Box<dyn std::error::Error>> {
    let downloads = tempfile::tempdir()?;
    let settings = settings(&downloads);
    let factory = FakeFactory::fresh_pages();
    let manager = WebManager::new().register(BrowserType::Chrome, factory.clone());
    let worker = WorkerId::single();

    manager.initialize(&worker, &settings).await?;
    manager.initialize(&worker, &settings).await?;
    let pages = factory.sessions();
    assert_eq!(pages.len(), 2);
    assert!(pages[0].is_quit());
    assert!(!pages[1].is_quit());
    Ok(())
}

#[tokio::test]
async fn debug_artefacts() -> Result<(), Box<dyn std::error::Error>> {
    let downloads = tempfile::tempdir()?;
    let page = FakePage::new();
    page.set_page_sources(["<html><body>broken</body></html>"]);
    let manager = WebManager::new().register(BrowserType::Chrome, FakeFactory::new(page));
    let worker = WorkerId::single();
    manager.initialize(&worker, &settings(&downloads)).await?;

    let out = downloads.path().join("artefacts");
    let html = manager.debug_page_source(&worker, &out, "failed_login").await?;
    assert_eq!(html, out.join("failed_login.html"));
    assert_eq!(
        std::fs::read_to_string(&html)?,
        "<html><body>broken</body></html>"
    );

    let png = manager.debug_screenshot(&worker, &out, "failed_login").await?;
    assert!(std::fs::read(png)?.starts_with(b"\x89PNG"));
    Ok(())
}

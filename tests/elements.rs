//! Element tests
use karpatium::error::CmdError;
use karpatium::testing::{FakeNode, FakePage};
use karpatium::{
    CheckBoxElement, CommonElement, Element, ElementCollection, InputElement, RadioButtonElement,
    Selector,
};
use std::time::Duration;

mod common;

#[tokio::test(start_paused = true)]
async fn creating_an_element_touches_nothing() -> Result<(), CmdError> {
    let page = FakePage::new();
    let browser = common::browser(&page);

    let missing: CommonElement = browser.create(Selector::id("does-not-exist"), None);
    let nested: CommonElement = missing.find(Selector::class("child"));
    let _all: ElementCollection<Element> = nested.find_all(Selector::tag("td"));
    assert_eq!(page.total_calls(), 0);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn every_read_locates_again() -> Result<(), CmdError> {
    let page = FakePage::new();
    let id = page.insert(None, FakeNode::new("div").id("output").text("first"));
    let browser = common::browser(&page);
    let output: CommonElement = browser.create(Selector::id("output"), None);

    assert_eq!(output.text().await?, "first");
    page.remove(id);
    page.insert(None, FakeNode::new("div").id("output").text("second"));
    assert_eq!(output.text().await?, "second");
    assert_eq!(page.calls("find_element"), 2);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn reads_wait_for_late_elements() -> Result<(), CmdError> {
    let page = FakePage::new();
    let browser = common::browser(&page);
    let late: CommonElement = browser.create(Selector::data_test_id("late"), None);

    let writer = page.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(500)).await;
        writer.insert(None, FakeNode::new("span").attr("data-testid", "late").text("here"));
    });

    assert_eq!(late.text().await?, "here");
    assert!(page.calls("find_element") > 1);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn timeouts_report_the_driver_error() {
    let page = FakePage::new();
    let browser = common::browser_with_timeout(&page, Duration::from_millis(300));
    let missing: CommonElement = browser.create(Selector::id("missing"), None);

    match missing.text().await {
        Err(CmdError::NoSuchElement(msg)) => assert!(msg.contains("missing"), "{}", msg),
        other => panic!("unexpected {:?}", other),
    }
    assert!(matches!(
        browser.conditional_waiter().last_error(),
        Some(CmdError::NoSuchElement(..))
    ));
}

#[tokio::test(start_paused = true)]
async fn collections_are_fresh() -> Result<(), CmdError> {
    let page = FakePage::new();
    let table = page.insert(None, FakeNode::new("div").class("rt-tbody"));
    page.insert(Some(table), FakeNode::new("div").class("rt-tr").text("Cierra"));
    let browser = common::browser(&page);
    let rows: ElementCollection<CommonElement> =
        browser.create_multiple(Selector::class("rt-tr"), None);

    assert_eq!(rows.count().await?, 1);
    page.insert(Some(table), FakeNode::new("div").class("rt-tr").text("Alden"));
    assert_eq!(rows.count().await?, 2);

    let texts = {
        let mut texts = Vec::new();
        for row in rows.all().await? {
            texts.push(row.text().await?);
        }
        texts
    };
    assert_eq!(texts, ["Cierra", "Alden"]);
    assert_eq!(rows.get(1).await?.text().await?, "Alden");
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn an_empty_collection_is_not_an_error() -> Result<(), CmdError> {
    let page = FakePage::new();
    let browser = common::browser(&page);
    let rows: ElementCollection<CommonElement> =
        browser.create_multiple(Selector::class("rt-tr"), None);

    assert_eq!(rows.count().await?, 0);
    assert!(rows.all().await?.is_empty());
    assert!(matches!(
        rows.get(0).await,
        Err(CmdError::InvalidArgument(..))
    ));
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn form_controls() -> Result<(), CmdError> {
    let page = FakePage::new();
    let name = page.insert(None, FakeNode::new("input").id("userName").prop("value", "old"));
    let terms = page.insert(None, FakeNode::new("input").id("terms").attr("type", "checkbox"));
    let yes = page.insert(None, FakeNode::new("input").id("yesRadio").attr("type", "radio"));
    let browser = common::browser(&page);

    let input: InputElement = browser.create(Selector::id("userName"), None);
    input.set_text("Jane Doe").await?;
    assert_eq!(page.prop(name, "value").as_deref(), Some("Jane Doe"));
    input.append_text("!").await?;
    assert_eq!(page.prop(name, "value").as_deref(), Some("Jane Doe!"));

    let checkbox: CheckBoxElement = browser.create(Selector::id("terms"), None);
    checkbox.check().await?;
    checkbox.check().await?;
    assert!(page.is_selected(terms));
    checkbox.uncheck().await?;
    assert!(!checkbox.is_checked().await?);

    let radio: RadioButtonElement = browser.create(Selector::id("yesRadio"), None);
    radio.check().await?;
    assert!(page.is_selected(yes));
    assert!(radio.is_checked().await?);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn hidden_elements_are_retried_until_shown() -> Result<(), CmdError> {
    let page = FakePage::new();
    let id = page.insert(None, FakeNode::new("button").id("submit").hidden());
    let browser = common::browser(&page);
    let submit: CommonElement = browser.create(Selector::id("submit"), None);

    assert!(!submit.is_displayed().await);
    let writer = page.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(200)).await;
        writer.update(id, |n| n.set_displayed(true));
    });

    submit.click().await?;
    assert_eq!(page.events(), ["click #submit"]);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn reads_do_not_wait_for_the_page_to_settle() -> Result<(), CmdError> {
    let page = FakePage::new();
    page.insert(None, FakeNode::new("h1").class("text-center").text("Elements"));
    let browser = common::browser(&page);
    let header: CommonElement = browser.create(Selector::class("text-center"), None);

    header.text().await?;
    header.hover_over().await?;
    assert_eq!(page.calls("page_source"), 0);

    header.click().await?;
    assert!(page.calls("page_source") >= 2);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn pointer_actions_settle_afterwards() -> Result<(), CmdError> {
    let page = FakePage::new();
    page.insert(None, FakeNode::new("button").id("doubleClickBtn"));
    page.insert(None, FakeNode::new("button").id("rightClickBtn"));
    page.insert(None, FakeNode::new("div").id("draggable"));
    page.insert(None, FakeNode::new("div").id("droppable"));
    let browser = common::browser(&page);

    let double: CommonElement = browser.create(Selector::id("doubleClickBtn"), None);
    double.double_click().await?;
    assert_eq!(page.events(), ["double_click #doubleClickBtn"]);
    assert!(page.scripts().is_empty());
    let after_double = page.calls("page_source");
    assert!(after_double >= 2, "{}", after_double);

    let right: CommonElement = browser.create(Selector::id("rightClickBtn"), None);
    right.right_click().await?;
    assert_eq!(
        page.events().last().map(String::as_str),
        Some("context_click #rightClickBtn")
    );
    let after_right = page.calls("page_source");
    assert!(after_right >= after_double + 2, "{}", after_right);

    let source: CommonElement = browser.create(Selector::id("draggable"), None);
    let target: CommonElement = browser.create(Selector::id("droppable"), None);
    source.drag_and_drop(&target).await?;
    assert_eq!(
        page.events().last().map(String::as_str),
        Some("drag_and_drop #draggable -> #droppable")
    );
    assert!(page.calls("page_source") >= after_right + 2);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn scrolling_does_not_settle() -> Result<(), CmdError> {
    let page = FakePage::new();
    page.insert(None, FakeNode::new("footer").id("footer"));
    let browser = common::browser(&page);
    let footer: CommonElement = browser.create(Selector::id("footer"), None);

    footer.scroll_to().await?;
    footer.hover_over().await?;
    assert_eq!(
        page.events(),
        ["scroll_to_element #footer", "move_to_element #footer"]
    );
    assert_eq!(page.calls("page_source"), 0);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn drag_and_drop_waits_for_its_target() -> Result<(), CmdError> {
    let page = FakePage::new();
    page.insert(None, FakeNode::new("div").id("draggable"));
    let browser = common::browser(&page);
    let source: CommonElement = browser.create(Selector::id("draggable"), None);
    let target: CommonElement = browser.create(Selector::id("droppable"), None);

    let writer = page.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(300)).await;
        writer.insert(None, FakeNode::new("div").id("droppable"));
    });

    source.drag_and_drop(&target).await?;
    assert_eq!(page.events(), ["drag_and_drop #draggable -> #droppable"]);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn element_reads() -> Result<(), CmdError> {
    let page = FakePage::new();
    page.insert(
        None,
        FakeNode::new("a")
            .id("home")
            .attr("href", "/home")
            .attr("style:color", "red")
            .text("Home"),
    );
    page.insert(None, FakeNode::new("button").id("submit").disabled());
    let browser = common::browser(&page);
    let link: CommonElement = browser.create(Selector::id("home"), None);
    let submit: CommonElement = browser.create(Selector::id("submit"), None);

    assert_eq!(link.tag_name().await?, "a");
    assert_eq!(link.attribute("href").await?.as_deref(), Some("/home"));
    assert_eq!(link.attribute("target").await?, None);
    assert_eq!(link.css_value("color").await?, "red");
    assert_eq!(link.css_value("display").await?, "block");
    assert!(link.is_enabled().await?);
    assert!(!submit.is_enabled().await?);
    assert!(link.is_visible().await?);
    assert_eq!(page.calls("page_source"), 0);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn is_visible_fails_with_the_cause() {
    let page = FakePage::new();
    page.insert(None, FakeNode::new("div").id("modal").hidden());
    let browser = common::browser_with_timeout(&page, Duration::from_millis(300));
    let modal: CommonElement = browser.create(Selector::id("modal"), None);
    let missing: CommonElement = browser.create(Selector::id("missing"), None);

    assert!(matches!(
        modal.is_visible().await,
        Err(CmdError::WaitTimeout { .. })
    ));
    assert!(matches!(
        missing.is_visible().await,
        Err(CmdError::NoSuchElement(..))
    ));
}

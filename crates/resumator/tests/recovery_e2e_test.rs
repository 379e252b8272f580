//! End-to-end test: the full Autopilot lifecycle against an in-memory host,
//! under a paused clock so interval and cooldown timing is exact.

use std::sync::Arc;
use std::time::Duration;

use resumator::toggle::TOGGLE_CLASS;
use resumator::{Autopilot, ElementSpec, HostBackend, HostElement, MemoryHost, SCAN_INTERVAL};

struct ChatUi {
    host: Arc<MemoryHost>,
    root: HostElement,
    chat_window: HostElement,
    composer: HostElement,
    toolbar: HostElement,
}

fn build_chat_ui() -> ChatUi {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
    let host = Arc::new(MemoryHost::new());
    let backend: Arc<dyn HostBackend> = host.clone();
    let root = HostElement::new(backend, host.root_id());

    let chat_window = root
        .append(ElementSpec::new("group").class("full-input-box"))
        .expect("build");
    let composer = chat_window
        .append(ElementSpec::new("group").class("composer-bar"))
        .expect("build");
    let toolbar = build_toolbar(&composer);

    ChatUi {
        host,
        root,
        chat_window,
        composer,
        toolbar,
    }
}

fn build_toolbar(composer: &HostElement) -> HostElement {
    let toolbar = composer
        .append(
            ElementSpec::new("group")
                .class("button-container")
                .class("composer-button-area"),
        )
        .expect("build");
    let image_button = toolbar
        .append(ElementSpec::new("button").class("anysphere-icon-button"))
        .expect("build");
    image_button
        .append(ElementSpec::new("group").class("codicon").class("codicon-image-two"))
        .expect("build");
    toolbar
}

/// Let the spawned tasks run without advancing the clock.
async fn settle() {
    for _ in 0..16 {
        tokio::task::yield_now().await;
    }
}

/// Advance the paused clock in small steps so timers fire at their scheduled
/// instants (a single large `advance` jumps `Instant::now()` straight to the
/// end, collapsing intermediate interval ticks into one late firing).
async fn advance(duration: Duration) {
    const STEP: Duration = Duration::from_millis(50);
    let mut remaining = duration;
    while remaining > Duration::ZERO {
        let step = remaining.min(STEP);
        tokio::time::advance(step).await;
        settle().await;
        remaining -= step;
    }
}

#[tokio::test(start_paused = true)]
async fn full_recovery_lifecycle() -> anyhow::Result<()> {
    let ui = build_chat_ui();
    let autopilot = Autopilot::new(ui.host.clone());
    let handle = autopilot.spawn();
    settle().await;

    // The toggle is injected immediately, before the image button.
    let toggle_node = ui.root.locator(format!("class:{TOGGLE_CLASS}").as_str()).first()?;
    let toolbar_children = ui.toolbar.children()?;
    assert_eq!(toolbar_children[0].id(), toggle_node.id());

    // A tool-limit notice appears; the next scan tick clicks the link.
    let notice = ui
        .composer
        .append(ElementSpec::new("group").class("composer-notice"))?;
    notice.append(
        ElementSpec::new("group").text("By default, we stop the agent after 25 tool calls."),
    )?;
    let link = notice.append(ElementSpec::new("link").text("resume the conversation"))?;

    advance(SCAN_INTERVAL).await;
    assert_eq!(ui.host.clicks(), vec![link.id()]);
    ui.host.clear_clicks();

    // The user disarms the watchdog via the toggle; the persisting condition
    // no longer produces clicks.
    ui.host.click(toggle_node.id())?;
    settle().await;
    assert!(!autopilot.state().is_active());
    ui.host.clear_clicks();

    advance(SCAN_INTERVAL * 3).await;
    assert!(ui.host.clicks().is_empty());

    // Re-armed, the next tick past the cooldown recovers again.
    ui.host.click(toggle_node.id())?;
    settle().await;
    assert!(autopilot.state().is_active());
    ui.host.clear_clicks();

    advance(SCAN_INTERVAL).await;
    assert_eq!(ui.host.clicks(), vec![link.id()]);
    notice.remove()?;
    ui.host.clear_clicks();

    // The host re-renders the toolbar away; the control is re-injected into
    // the replacement once it settles.
    ui.toolbar.remove()?;
    settle().await;
    let new_toolbar = build_toolbar(&ui.composer);
    advance(Duration::from_millis(300)).await;

    let reinjected = ui.root.locator(format!("class:{TOGGLE_CLASS}").as_str()).all()?;
    assert_eq!(reinjected.len(), 1);
    assert_eq!(
        reinjected[0].parent()?.map(|p| p.id()),
        Some(new_toolbar.id())
    );

    // No stray clicks happened along the way.
    assert!(ui.host.clicks().is_empty());

    handle.shutdown().await;
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn transient_error_recovery_over_time() -> anyhow::Result<()> {
    let ui = build_chat_ui();
    let autopilot = Autopilot::new(ui.host.clone());
    let handle = autopilot.spawn();
    settle().await;

    let popup = ui
        .chat_window
        .append(ElementSpec::new("group").class("composer-error-popup"))?;
    popup.append(
        ElementSpec::new("group")
            .text("We're experiencing high demand for the model you have selected."),
    )?;
    let button = popup.append(ElementSpec::new("button").class("anysphere-secondary-button"))?;
    button.append(ElementSpec::new("group").text("Try again"))?;

    // The condition persists; clicks are spaced by the cooldown, one per
    // eligible tick.
    advance(SCAN_INTERVAL * 4).await;
    let clicks = ui.host.clicks();
    assert!(!clicks.is_empty());
    assert!(clicks.iter().all(|id| *id == button.id()));
    // Ticks at 2, 4, 6 and 8 time-units; the 3-unit cooldown admits two.
    assert_eq!(clicks.len(), 2);

    handle.shutdown().await;
    Ok(())
}

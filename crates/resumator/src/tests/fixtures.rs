//! Shared host-tree fixtures shaped like the target IDE's chat interface.

use std::sync::Arc;

use crate::backend::{ElementSpec, HostBackend};
use crate::element::HostElement;
use crate::memory::MemoryHost;

/// Install the test subscriber once; `RUST_LOG` controls verbosity.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub struct Fixture {
    pub host: Arc<MemoryHost>,
    pub root: HostElement,
    pub chat_window: HostElement,
    pub composer: HostElement,
    pub toolbar: HostElement,
    pub image_button: HostElement,
}

/// A minimal chat interface: a `full-input-box` window containing a
/// `composer-bar` with its `composer-button-area` toolbar and image button.
pub fn chat_ui() -> Fixture {
    init_tracing();
    let host = Arc::new(MemoryHost::new());
    let backend: Arc<dyn HostBackend> = host.clone();
    let root = HostElement::new(backend, host.root_id());

    let chat_window = root
        .append(ElementSpec::new("group").class("full-input-box"))
        .expect("fixture build");
    let composer = chat_window
        .append(ElementSpec::new("group").class("composer-bar"))
        .expect("fixture build");
    let toolbar = composer
        .append(
            ElementSpec::new("group")
                .class("button-container")
                .class("composer-button-area"),
        )
        .expect("fixture build");
    let image_button = toolbar
        .append(ElementSpec::new("button").class("anysphere-icon-button"))
        .expect("fixture build");
    image_button
        .append(ElementSpec::new("group").class("codicon").class("codicon-image-two"))
        .expect("fixture build");

    Fixture {
        host,
        root,
        chat_window,
        composer,
        toolbar,
        image_button,
    }
}

/// Add a tool-limit notice under the composer. Returns the resume link, or
/// nothing when `with_link` is false.
pub fn add_tool_limit_notice(
    composer: &HostElement,
    text: &str,
    with_link: bool,
) -> Option<HostElement> {
    let notice = composer
        .append(ElementSpec::new("group").class("composer-notice"))
        .expect("fixture build");
    notice
        .append(ElementSpec::new("group").text(text))
        .expect("fixture build");
    if with_link {
        Some(
            notice
                .append(ElementSpec::new("link").text("resume the conversation"))
                .expect("fixture build"),
        )
    } else {
        None
    }
}

/// Add a transient-error popup to the chat window with a secondary-variant
/// button. Returns the button element.
pub fn add_error_popup(chat_window: &HostElement, error_text: &str, button_text: &str) -> HostElement {
    let popup = chat_window
        .append(ElementSpec::new("group").class("composer-error-popup"))
        .expect("fixture build");
    popup
        .append(ElementSpec::new("group").text(error_text))
        .expect("fixture build");
    let button = popup
        .append(ElementSpec::new("button").class("anysphere-secondary-button"))
        .expect("fixture build");
    button
        .append(ElementSpec::new("group").text(button_text))
        .expect("fixture build");
    button
}

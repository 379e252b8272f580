use std::sync::Arc;

use crate::backend::{HostBackend, MutationBatch};
use crate::element::HostElement;
use crate::memory::MemoryHost;
use crate::state::ScriptState;
use crate::tests::fixtures::chat_ui;
use crate::toggle::{ToggleControl, TOGGLE_CLASS};

fn toggle_for(ui: &crate::tests::fixtures::Fixture) -> (ToggleControl, Arc<ScriptState>) {
    let state = Arc::new(ScriptState::new());
    let backend: Arc<dyn HostBackend> = ui.host.clone();
    (ToggleControl::new(backend, state.clone()), state)
}

#[test]
fn injects_before_the_image_button() {
    let ui = chat_ui();
    let (toggle, _) = toggle_for(&ui);

    assert!(toggle.reinsert().expect("reinsert"));
    let children = ui.toolbar.children().expect("children");
    assert_eq!(children.len(), 2);
    assert!(children[0]
        .attr("class")
        .expect("attr")
        .expect("class set")
        .contains(TOGGLE_CLASS));
    assert_eq!(children[1].id(), ui.image_button.id());
}

#[test]
fn reinsert_is_idempotent() {
    let ui = chat_ui();
    let (toggle, _) = toggle_for(&ui);

    assert!(toggle.reinsert().expect("reinsert"));
    assert!(toggle.reinsert().expect("reinsert"));

    let instances = ui
        .root
        .locator(format!("class:{TOGGLE_CLASS}").as_str())
        .all()
        .expect("query");
    assert_eq!(instances.len(), 1);
    assert_eq!(toggle.node_id(), Some(instances[0].id()));
}

#[test]
fn reinsert_without_anchor_reports_not_found() {
    let host = Arc::new(MemoryHost::new());
    let state = Arc::new(ScriptState::new());
    let backend: Arc<dyn HostBackend> = host.clone();
    let toggle = ToggleControl::new(backend, state);

    assert!(!toggle.reinsert().expect("reinsert"));
    assert!(!toggle.is_injected().expect("is_injected"));
    assert_eq!(toggle.node_id(), None);
}

#[test]
fn concurrent_reinserts_leave_one_instance() {
    let ui = chat_ui();
    let (toggle, _) = toggle_for(&ui);

    // The retry timer and the event task can both trigger injection; the
    // remove+insert must not interleave.
    std::thread::scope(|s| {
        for _ in 0..4 {
            s.spawn(|| {
                for _ in 0..25 {
                    toggle.reinsert().expect("reinsert");
                }
            });
        }
    });

    let instances = ui
        .root
        .locator(format!("class:{TOGGLE_CLASS}").as_str())
        .all()
        .expect("query");
    assert_eq!(instances.len(), 1);
    assert_eq!(toggle.node_id(), Some(instances[0].id()));
}

#[test]
fn toggle_is_an_involution() {
    let ui = chat_ui();
    let (toggle, state) = toggle_for(&ui);
    assert!(toggle.reinsert().expect("reinsert"));

    let node = HostElement::new(ui.host.clone(), toggle.node_id().expect("injected"));
    let initial_active = state.is_active();
    let initial_attrs = (
        node.attr("title").expect("attr"),
        node.attr("data-active").expect("attr"),
    );

    toggle.on_activate();
    assert_eq!(state.is_active(), !initial_active);
    assert_ne!(node.attr("data-active").expect("attr"), initial_attrs.1);

    toggle.on_activate();
    assert_eq!(state.is_active(), initial_active);
    assert_eq!(
        (
            node.attr("title").expect("attr"),
            node.attr("data-active").expect("attr"),
        ),
        initial_attrs
    );
}

#[test]
fn clicks_on_other_elements_do_not_flip_state() {
    let ui = chat_ui();
    let (toggle, state) = toggle_for(&ui);
    assert!(toggle.reinsert().expect("reinsert"));

    let before = state.is_active();
    toggle.handle_click(ui.image_button.id());
    assert_eq!(state.is_active(), before);

    toggle.handle_click(toggle.node_id().expect("injected"));
    assert_eq!(state.is_active(), !before);
}

#[test]
fn needs_reinsert_when_toolbar_reappears_or_control_missing() {
    let ui = chat_ui();
    let (toggle, _) = toggle_for(&ui);

    // Not yet injected: any batch warrants an attempt.
    assert!(toggle
        .needs_reinsert(&MutationBatch::default())
        .expect("needs_reinsert"));

    assert!(toggle.reinsert().expect("reinsert"));
    assert!(!toggle
        .needs_reinsert(&MutationBatch::default())
        .expect("needs_reinsert"));

    // A batch adding the toolbar container triggers re-injection even while
    // an instance exists.
    let batch = MutationBatch {
        added: vec![ui.toolbar.id()],
        removed: Vec::new(),
    };
    assert!(toggle.needs_reinsert(&batch).expect("needs_reinsert"));
}

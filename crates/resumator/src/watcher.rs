//! The detection & recovery loop.
//!
//! Each tick re-queries the live host tree from scratch, classifies it
//! against the condition table and performs at most one recovery click,
//! gated by the cooldown. Host lookups that fail (structure absent, nodes
//! detached mid-scan) degrade to "condition not currently detectable"; no
//! error escapes a tick.

use std::sync::Arc;
use std::time::Duration;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::backend::HostBackend;
use crate::conditions::{
    ScanOutcome, TransientRule, RESUME_LINK_LABEL, TOOL_LIMIT_ALT_PHRASING, TOOL_LIMIT_MARKER,
    TOOL_LIMIT_PATTERN, TRANSIENT_RULES,
};
use crate::element::HostElement;
use crate::errors::HostError;
use crate::locator::Locator;
use crate::selector::Selector;
use crate::state::ScriptState;

/// Cadence of the detection scan.
pub const SCAN_INTERVAL: Duration = Duration::from_secs(2);

/// Minimum time between two recovery clicks, regardless of how many
/// conditions match in between.
pub const ACTION_COOLDOWN: Duration = Duration::from_secs(3);

const TOOL_LIMIT_DESCRIPTION: &str = "tool call limit";

/// Class-substring markers of the host regions the scan anchors on. The host
/// does not expose stable ids, so these track its current class names.
const COMPOSER_REGION_CLASS: &str = "composer-bar";
const CHAT_WINDOW_CLASS: &str = "full-input-box";
const SECONDARY_BUTTON_CLASS: &str = "anysphere-secondary-button";

/// Anything the host renders as a followable link.
fn link_selector() -> Selector {
    Selector::from("role:link, class:markdown-link, attr:role=link, attr:data-link")
}

/// Outcome of one classification pass, before cooldown bookkeeping.
enum Pass {
    Acted(&'static str),
    ControlMissing(&'static str),
    NoMatch,
}

/// Runs the periodic classification over a host backend.
pub struct Watcher {
    backend: Arc<dyn HostBackend>,
    state: Arc<ScriptState>,
}

impl Watcher {
    pub fn new(backend: Arc<dyn HostBackend>, state: Arc<ScriptState>) -> Self {
        Self { backend, state }
    }

    fn locator(&self, selector: impl Into<Selector>) -> Locator {
        Locator::new(self.backend.clone(), selector.into())
    }

    /// One detection tick. At most one recovery click happens per call.
    pub fn tick(&self) -> ScanOutcome {
        if !self.state.is_active() {
            return ScanOutcome::Disabled;
        }

        let now = Instant::now();
        if self.state.in_cooldown(now, ACTION_COOLDOWN) {
            return ScanOutcome::CoolingDown;
        }

        let mut missing: Option<&'static str> = None;

        // Pass 1: tool-call limit. Fully evaluated before any transient rule
        // is considered; a click here ends the tick.
        match self.scan_tool_limit(now) {
            Ok(Pass::Acted(description)) => return ScanOutcome::Recovered { description },
            Ok(Pass::ControlMissing(description)) => missing = Some(description),
            Ok(Pass::NoMatch) => {}
            Err(e) => debug!(error = %e, "tool-limit pass not detectable this tick"),
        }

        // Pass 2: transient provider/connectivity errors.
        match self.scan_transient_errors(now) {
            Ok(Pass::Acted(description)) => return ScanOutcome::Recovered { description },
            Ok(Pass::ControlMissing(description)) => missing = missing.or(Some(description)),
            Ok(Pass::NoMatch) => {}
            Err(e) => debug!(error = %e, "transient-error pass not detectable this tick"),
        }

        match missing {
            Some(description) => ScanOutcome::ControlMissing { description },
            None => ScanOutcome::NoMatch,
        }
    }

    /// Look for "stop the agent after <N> tool calls" under the composer
    /// region and activate the exactly-labeled resume link next to it.
    fn scan_tool_limit(&self, now: Instant) -> Result<Pass, HostError> {
        let regions = self
            .locator(Selector::ClassContains(COMPOSER_REGION_CLASS.into()))
            .all()?;

        let mut text_matched = false;
        for region in regions {
            for candidate in subtree_with_own_text(&region, TOOL_LIMIT_MARKER)? {
                // The marker text and the link are usually siblings, so the
                // search container is the enclosing parent.
                let Some(container) = candidate.parent()? else {
                    continue;
                };
                let text = container.text()?;
                if !TOOL_LIMIT_PATTERN.is_match(&text) && !text.contains(TOOL_LIMIT_ALT_PHRASING) {
                    continue;
                }
                text_matched = true;

                let links = container
                    .locator(Selector::And(vec![
                        link_selector(),
                        Selector::LabelEquals(RESUME_LINK_LABEL.into()),
                    ]))
                    .all()?;
                if let Some(link) = links.first() {
                    info!("clicking \"{RESUME_LINK_LABEL}\" link for tool call limit");
                    link.click()?;
                    self.state.record_action(now);
                    return Ok(Pass::Acted(TOOL_LIMIT_DESCRIPTION));
                }
            }
        }

        if text_matched {
            Ok(Pass::ControlMissing(TOOL_LIMIT_DESCRIPTION))
        } else {
            Ok(Pass::NoMatch)
        }
    }

    /// Evaluate the transient-error table against the chat window and click
    /// the last matching control for the first rule that matches.
    fn scan_transient_errors(&self, now: Instant) -> Result<Pass, HostError> {
        let Some(chat_window) = self.chat_window()? else {
            return Ok(Pass::NoMatch);
        };

        let mut missing: Option<&'static str> = None;
        for rule in TRANSIENT_RULES {
            if !self.rule_matches(&chat_window, rule)? {
                continue;
            }
            if let Some(button) = self.find_recovery_button(&chat_window, rule)? {
                info!(
                    "clicking \"{}\" button for {}",
                    rule.button_text, rule.description
                );
                button.click()?;
                self.state.record_action(now);
                return Ok(Pass::Acted(rule.description));
            }
            // The error is on screen but its control is not (yet); remember
            // it and keep evaluating lower-priority rules.
            missing = missing.or(Some(rule.description));
        }

        match missing {
            Some(description) => Ok(Pass::ControlMissing(description)),
            None => Ok(Pass::NoMatch),
        }
    }

    /// The chat window is the `full-input-box` ancestor of the composer
    /// region. Absent structure means the condition set is not evaluable.
    fn chat_window(&self) -> Result<Option<HostElement>, HostError> {
        let composer = match self
            .locator(Selector::ClassContains(COMPOSER_REGION_CLASS.into()))
            .first()
        {
            Ok(el) => el,
            Err(HostError::ElementNotFound(_)) => return Ok(None),
            Err(e) => return Err(e),
        };
        composer.closest(&Selector::ClassContains(CHAT_WINDOW_CLASS.into()))
    }

    fn rule_matches(
        &self,
        chat_window: &HostElement,
        rule: &TransientRule,
    ) -> Result<bool, HostError> {
        if chat_window.text()?.contains(rule.error_text) {
            return Ok(true);
        }
        // Raw-markdown variant: the error text may only be present in the
        // un-rendered attribute of a message section.
        chat_window
            .locator(Selector::Attr {
                name: "data-markdown-raw".into(),
                value: Some(rule.error_text.into()),
            })
            .exists()
    }

    /// Prefer the host's secondary-button variant with an exactly-labeled
    /// descendant; fall back to any button containing the label. In both
    /// cases the *last* match in tree order wins, because the newest message
    /// renders last.
    fn find_recovery_button(
        &self,
        chat_window: &HostElement,
        rule: &TransientRule,
    ) -> Result<Option<HostElement>, HostError> {
        let secondary = chat_window.locator(Selector::And(vec![
            Selector::ClassContains(SECONDARY_BUTTON_CLASS.into()),
            Selector::Has(Box::new(Selector::LabelEquals(rule.button_text.into()))),
        ]));
        match secondary.nth(-1) {
            Ok(button) => return Ok(Some(button)),
            Err(HostError::ElementNotFound(_)) => {}
            Err(e) => return Err(e),
        }

        let fallback = chat_window.locator(Selector::And(vec![
            Selector::Role("button".into()),
            Selector::TextContains(rule.button_text.into()),
        ]));
        match fallback.nth(-1) {
            Ok(button) => Ok(Some(button)),
            Err(HostError::ElementNotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Drive [`Watcher::tick`] on a fixed interval until cancelled.
    pub async fn run(self, cancel: CancellationToken) {
        let mut interval = tokio::time::interval(SCAN_INTERVAL);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = interval.tick() => {
                    match self.tick() {
                        ScanOutcome::Recovered { description } => {
                            info!(condition = description, "recovery action taken");
                        }
                        ScanOutcome::ControlMissing { description } => {
                            debug!(condition = description, "condition matched but control missing");
                        }
                        outcome => debug!(?outcome, "scan tick"),
                    }
                }
            }
        }
        debug!("watcher loop stopped");
    }
}

/// Elements in `scope`'s subtree, the scope itself included, whose own text
/// (excluding descendants) contains `needle`, in tree order. This mirrors
/// matching against raw text nodes; some host renders put the sentence
/// directly on the region element.
fn subtree_with_own_text(
    scope: &HostElement,
    needle: &str,
) -> Result<Vec<HostElement>, HostError> {
    let mut result = Vec::new();
    let mut stack = vec![scope.clone()];
    while let Some(el) = stack.pop() {
        if let Some(text) = el.own_text()? {
            if text.contains(needle) {
                result.push(el.clone());
            }
        }
        let mut children = el.children()?;
        children.reverse();
        stack.extend(children);
    }
    Ok(result)
}

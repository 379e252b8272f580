use serde::{Deserialize, Serialize};

/// Represents ways to locate an element in the host tree.
///
/// The host UI is an externally-controlled tree with unstable structure, so
/// every predicate here is deliberately fuzzy (substring over classes,
/// attributes and text) except [`Selector::LabelEquals`], which is the exact
/// match used for recovery controls.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Selector {
    /// Select by role (case-insensitive equality), e.g. "button" or "link"
    Role(String),
    /// Select elements whose `class` attribute contains the substring
    ClassContains(String),
    /// Select elements whose text content contains the substring
    TextContains(String),
    /// Select elements whose normalized text content equals the label exactly
    LabelEquals(String),
    /// Select by attribute presence (`value: None`) or substring match
    Attr { name: String, value: Option<String> },
    /// Select elements that have at least one descendant matching the inner
    /// selector (Playwright-style :has())
    Has(Box<Selector>),
    /// Chain multiple selectors; each segment matches within the previous one
    Chain(Vec<Selector>),
    /// Logical AND over a set of selectors (all must match the same element)
    And(Vec<Selector>),
    /// Logical OR over a set of selectors (any may match)
    Or(Vec<Selector>),
    /// Represents an invalid selector string, with a reason.
    Invalid(String),
}

impl std::fmt::Display for Selector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self:?}")
    }
}

impl From<&str> for Selector {
    fn from(s: &str) -> Self {
        // Helper: parse a single, non-chain segment with AND/OR support
        fn parse_segment(input: &str) -> Selector {
            let s = input.trim();

            // OR: comma-separated (CSS/Playwright-style) or explicit ||
            if s.contains(',') || s.contains("||") {
                let mut parts: Vec<Selector> = Vec::new();
                for piece in s.split(',') {
                    for sub in piece.split("||") {
                        let sub = sub.trim();
                        if sub.is_empty() {
                            continue;
                        }
                        parts.push(parse_segment(sub));
                    }
                }
                // Flatten single OR
                return if parts.len() == 1 {
                    parts.into_iter().next().unwrap()
                } else {
                    Selector::Or(parts)
                };
            }

            // AND: explicit && only
            if s.contains("&&") {
                let parts: Vec<Selector> = s.split("&&").map(|p| parse_segment(p.trim())).collect();
                return if parts.len() == 1 {
                    parts.into_iter().next().unwrap()
                } else {
                    Selector::And(parts)
                };
            }

            // Single '|' is not supported; guide to use && instead
            if s.contains('|') && !s.contains("||") {
                return Selector::Invalid(
                    "Use '&&' to combine conditions, e.g., 'role:button && label:Try again'"
                        .to_string(),
                );
            }

            match s {
                _ if s.to_lowercase().starts_with("role:") => Selector::Role(s[5..].to_string()),
                _ if s.to_lowercase().starts_with("class:") => {
                    Selector::ClassContains(s["class:".len()..].to_string())
                }
                _ if s.to_lowercase().starts_with("text:") => {
                    Selector::TextContains(s["text:".len()..].to_string())
                }
                _ if s.to_lowercase().starts_with("label:") => {
                    Selector::LabelEquals(s["label:".len()..].to_string())
                }
                _ if s.to_lowercase().starts_with("attr:") => {
                    let attr_part = &s["attr:".len()..];
                    if attr_part.contains('=') {
                        // Format: attr:key=value (substring match on the value)
                        let parts: Vec<&str> = attr_part.splitn(2, '=').collect();
                        Selector::Attr {
                            name: parts[0].trim().to_string(),
                            value: Some(parts[1].trim().to_string()),
                        }
                    } else {
                        // Format: attr:key (presence check)
                        Selector::Attr {
                            name: attr_part.trim().to_string(),
                            value: None,
                        }
                    }
                }
                _ if s.to_lowercase().starts_with("has:") => {
                    let inner_selector_str = &s["has:".len()..];
                    Selector::Has(Box::new(Selector::from(inner_selector_str)))
                }
                // Bare common roles read naturally in queries
                "button" | "link" | "window" | "document" | "group" => {
                    Selector::Role(s.to_string())
                }
                _ => Selector::Invalid(format!(
                    "Unknown selector format: \"{s}\". Use prefixes like 'role:', 'class:', \
                     'text:', 'label:', 'attr:', or 'has:' to specify the selector type."
                )),
            }
        }

        // Handle chained selectors first
        let parts: Vec<&str> = s.split(">>").map(|p| p.trim()).collect();
        if parts.len() > 1 {
            return Selector::Chain(parts.into_iter().map(parse_segment).collect());
        }

        // Single segment with logicals
        parse_segment(s)
    }
}

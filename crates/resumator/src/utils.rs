/// Normalize a label for exact comparison: strip zero-width and non-breaking
/// Unicode whitespace, collapse runs of whitespace to single spaces, and trim.
///
/// Case is preserved. Recovery-control labels in the host UI are matched
/// exactly ("resume the conversation" is a different control than
/// "Resume the Conversation"), but rendered text frequently carries stray
/// line breaks and zero-width joiners from markdown output.
pub fn normalize_label(s: &str) -> String {
    let cleaned: String = s
        .chars()
        .filter(|c| {
            // Remove zero-width and non-breaking spaces, but keep regular spaces
            !matches!(
                *c,
                '\u{200B}' | // zero-width space
                '\u{200C}' | // zero-width non-joiner
                '\u{200D}' | // zero-width joiner
                '\u{FEFF}' // zero-width no-break space
            )
        })
        .map(|c| if c == '\u{00A0}' { ' ' } else { c })
        .collect();

    cleaned.split_whitespace().collect::<Vec<_>>().join(" ")
}

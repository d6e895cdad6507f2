//! Text cleanup for values scraped from rendered pages.

/// Collapse runs of whitespace to single spaces and trim.
///
/// Returns `None` when nothing but whitespace remains, so an element that
/// exists but is empty reads the same as a missing one.
pub fn clean_text(s: &str) -> Option<String> {
    let cleaned = s.split_whitespace().collect::<Vec<_>>().join(" ");
    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned)
    }
}

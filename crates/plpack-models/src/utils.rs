//! Filename sanitization for archive entries.
//!
//! Archive entry names are derived from user-visible titles, which may
//! contain anything. Names are reduced to a safe `[A-Za-z0-9_-]` alphabet
//! and prefixed with the item's playlist index so two items with identical
//! titles never collide.

/// Reduce a title to a filesystem- and archive-safe slug.
///
/// Runs of characters outside `[A-Za-z0-9_-]` collapse into a single `_`;
/// leading and trailing `_` are trimmed. An empty result becomes `"item"`.
pub fn sanitize_title(title: &str) -> String {
    let mut out = String::with_capacity(title.len());
    let mut last_was_sep = false;

    for c in title.chars() {
        if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
            out.push(c);
            last_was_sep = false;
        } else if !last_was_sep {
            out.push('_');
            last_was_sep = true;
        }
    }

    let trimmed = out.trim_matches('_');
    if trimmed.is_empty() {
        "item".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Build the archive entry name for an item.
///
/// The zero-padded index prefix keeps entries sorted and collision-free
/// even when two titles sanitize to the same slug.
pub fn archive_entry_name(index: u32, title: &str, extension: &str) -> String {
    format!("{:03}_{}.{}", index, sanitize_title(title), extension)
}

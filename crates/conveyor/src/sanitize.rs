//! Normalization of untrusted filenames before they become blob paths.

/// Characters allowed through unchanged: ASCII alphanumerics plus `-`, `_`
/// and `.`. Everything else maps to `_`.
fn clean_component(component: &str) -> String {
    let mapped: String = component
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.' {
                c
            } else {
                '_'
            }
        })
        .collect();

    // Collapse runs of `_` left behind by multi-character replacements.
    let mut collapsed = String::with_capacity(mapped.len());
    let mut last_was_separator = false;
    for c in mapped.chars() {
        if c == '_' {
            if !last_was_separator {
                collapsed.push(c);
            }
            last_was_separator = true;
        } else {
            collapsed.push(c);
            last_was_separator = false;
        }
    }

    collapsed.trim_matches(['_', '-', '.']).to_string()
}

/// Sanitizes an untrusted filename, preserving its extension.
///
/// A stem that sanitizes to nothing (for example a name written entirely in
/// a non-ASCII script) falls back to `file` so the result is always a usable
/// path component.
pub fn sanitize_filename(name: &str) -> String {
    let (stem, extension) = match name.rsplit_once('.') {
        Some((stem, ext)) if !ext.is_empty() => (stem, Some(ext)),
        _ => (name, None),
    };

    let mut cleaned = clean_component(stem);
    if cleaned.is_empty() {
        cleaned = "file".to_string();
    }

    match extension.map(clean_component) {
        Some(ext) if !ext.is_empty() => format!("{}.{}", cleaned, ext),
        _ => cleaned,
    }
}

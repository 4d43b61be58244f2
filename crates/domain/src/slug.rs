//! Slug generation for entity ids and name-derived unique ids.

/// Turn a human name into an identifier fragment.
///
/// Transliterates to ASCII first (`Küche` becomes `kuche`), then lowercases,
/// replaces every run of non-alphanumeric characters with a
/// single `_` and trims leading/trailing separators. Returns `"unknown"`
/// when nothing usable is left.
#[must_use]
pub fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    let mut pending_separator = false;

    for ch in deunicode::deunicode(text)
        .chars()
        .flat_map(char::to_lowercase)
    {
        if ch.is_ascii_alphanumeric() {
            if pending_separator && !slug.is_empty() {
                slug.push('_');
            }
            pending_separator = false;
            slug.push(ch);
        } else {
            pending_separator = true;
        }
    }

    if slug.is_empty() {
        "unknown".to_string()
    } else {
        slug
    }
}

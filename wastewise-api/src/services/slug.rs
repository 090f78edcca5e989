//! URL slugs for article titles

/// Lowercase, hyphen-separated ASCII slug
///
/// Whitespace runs become one hyphen, characters outside `[a-z0-9_-]` are
/// dropped, repeated hyphens collapse and edge hyphens are trimmed.
pub fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    let mut pending_hyphen = false;

    for c in text.trim().to_lowercase().chars() {
        if c.is_whitespace() || c == '-' {
            pending_hyphen = true;
        } else if c.is_ascii_alphanumeric() || c == '_' {
            if pending_hyphen && !slug.is_empty() {
                slug.push('-');
            }
            pending_hyphen = false;
            slug.push(c);
        }
    }

    slug
}

/// `base` when unused, else `base-N+1` where N slugs already share the prefix
pub fn disambiguate(base: &str, existing_with_prefix: i64) -> String {
    if existing_with_prefix > 0 {
        format!("{}-{}", base, existing_with_prefix + 1)
    } else {
        base.to_string()
    }
}

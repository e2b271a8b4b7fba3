//! Identifier derivation from display names
//!
//! Remote rules carry free-text display names; local records are keyed by
//! file-safe identifiers. The association between the two is a pluggable
//! strategy, with the default being slug derivation: lowercase, runs of
//! non-alphanumerics collapsed to one hyphen. All collision and edge-case
//! handling lives here.

/// Derives a local identifier from a rule's display name.
pub trait NamingStrategy: Send + Sync {
    fn derive(&self, display_name: &str) -> String;
}

/// Default strategy: [`slugify`].
#[derive(Debug, Default, Clone, Copy)]
pub struct SlugNaming;

impl NamingStrategy for SlugNaming {
    fn derive(&self, display_name: &str) -> String {
        slugify(display_name)
    }
}

/// Lowercase the input and collapse every run of non-alphanumeric
/// characters into a single hyphen. An input with no alphanumerics at all
/// falls back to `"rule"` so the result is always a usable identifier.
pub fn slugify(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut pending_separator = false;

    for c in input.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_separator && !out.is_empty() {
                out.push('-');
            }
            pending_separator = false;
            out.push(c.to_ascii_lowercase());
        } else {
            pending_separator = true;
        }
    }

    if out.is_empty() {
        "rule".to_string()
    } else {
        out
    }
}

/// Resolve a derived identifier against already-taken names by appending a
/// numeric suffix: `base`, `base-2`, `base-3`, ...
pub fn disambiguate(base: &str, is_taken: impl Fn(&str) -> bool) -> String {
    if !is_taken(base) {
        return base.to_string();
    }
    let mut n = 2u32;
    loop {
        let candidate = format!("{base}-{n}");
        if !is_taken(&candidate) {
            return candidate;
        }
        n += 1;
    }
}

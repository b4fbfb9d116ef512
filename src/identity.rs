//! Queue identifier derivation
//!
//! Turns human-supplied queue names into unique, URL-safe identifiers.

use crate::utils::to_base36;
use chrono::{DateTime, Utc};
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Lowercase ASCII slug of `text`.
///
/// Diacritics are stripped, every run of other characters becomes a single
/// hyphen, and leading/trailing hyphens are removed. Text without any ASCII
/// letters or digits yields an empty string.
pub fn slugify(text: &str) -> String {
    let lowered = text.trim().to_lowercase();
    let mut slug = String::with_capacity(lowered.len());
    let mut pending_hyphen = false;

    for c in lowered.nfd().filter(|c| !is_combining_mark(*c)) {
        if c.is_ascii_alphanumeric() {
            if pending_hyphen && !slug.is_empty() {
                slug.push('-');
            }
            pending_hyphen = false;
            slug.push(c);
        } else {
            pending_hyphen = true;
        }
    }

    slug
}

/// `candidate` if unused, otherwise the first free `candidate-N` with N ≥ 1
pub fn dedupe<F>(candidate: &str, exists: F) -> String
where
    F: Fn(&str) -> bool,
{
    if !exists(candidate) {
        return candidate.to_string();
    }
    (1u64..)
        .map(|attempt| format!("{}-{}", candidate, attempt))
        .find(|id| !exists(id))
        .unwrap_or_else(|| candidate.to_string())
}

/// Timestamp-derived id used when a name has no slug-able characters
pub fn fallback_queue_id(now: DateTime<Utc>) -> String {
    let millis = u64::try_from(now.timestamp_millis()).unwrap_or_default();
    format!("queue-{}", to_base36(millis))
}

/// Pick a unique id for a new queue.
///
/// A requested id wins over the slug of `name`; the timestamp fallback is used
/// when both are empty. Collisions are resolved with [`dedupe`].
pub fn resolve_queue_id<F>(
    name: &str,
    requested: Option<&str>,
    now: DateTime<Utc>,
    exists: F,
) -> String
where
    F: Fn(&str) -> bool,
{
    let base = match requested.map(str::trim).filter(|id| !id.is_empty()) {
        Some(id) => id.to_lowercase(),
        None => slugify(name),
    };
    let base = if base.is_empty() {
        fallback_queue_id(now)
    } else {
        base
    };
    dedupe(&base, exists)
}

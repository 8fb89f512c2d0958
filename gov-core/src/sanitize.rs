// gov-core/src/sanitize.rs
// ============================================================================
// Module: Comment Sanitization and Mention Parsing
// Description: Comment text sanitization and `@group` mention extraction.
// Purpose: Provide the shared text-cleanup path used by Comment and Chat
//          commands, and the notification fan-out mention grammar.
// Dependencies: crate::model::GroupRegistry
// ============================================================================

//! ## Overview
//! Comment and chat text is sanitized the same way everywhere it enters the
//! engine: trimmed, with any `<...>` substrings stripped (a conservative
//! HTML-tag removal, not a full sanitizer). Mentions are then parsed from
//! the *sanitized* text so a mention hidden inside a stripped tag never
//! fires a notification.

// ============================================================================
// SECTION: Imports
// ============================================================================

use crate::model::GroupRegistry;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Maximum raw comment length, before sanitization.
pub const MAX_COMMENT_RAW_LEN: usize = 4000;
/// Maximum length of an actor identifier before falling back to `cockpit`.
pub const MAX_ACTOR_LEN: usize = 50;
/// Length of the notification snippet derived from a comment.
pub const NOTIFICATION_SNIPPET_LEN: usize = 200;
/// Default actor used when none is supplied or the supplied one is too long.
pub const DEFAULT_ACTOR: &str = "cockpit";

// ============================================================================
// SECTION: Sanitization
// ============================================================================

/// Error returned when a comment fails sanitization.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SanitizeError {
    /// Raw text exceeded [`MAX_COMMENT_RAW_LEN`].
    #[error("comment text exceeds {MAX_COMMENT_RAW_LEN} characters")]
    TooLong,
    /// Text was empty after trimming and tag stripping.
    #[error("comment text is empty after sanitization")]
    Empty,
}

/// Strips any `<...>` substrings from `text` (a conservative HTML-tag
/// removal), trims whitespace, and rejects text that becomes empty or was
/// too long before stripping.
///
/// # Errors
///
/// Returns [`SanitizeError::TooLong`] if `text.len() > MAX_COMMENT_RAW_LEN`,
/// or [`SanitizeError::Empty`] if nothing remains after sanitization.
pub fn sanitize_comment(text: &str) -> Result<String, SanitizeError> {
    if text.len() > MAX_COMMENT_RAW_LEN {
        return Err(SanitizeError::TooLong);
    }
    let stripped = strip_tags(text);
    let trimmed = stripped.trim().to_string();
    if trimmed.is_empty() {
        return Err(SanitizeError::Empty);
    }
    Ok(trimmed)
}

/// Removes every `<...>` substring from `text`.
fn strip_tags(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut depth: u32 = 0;
    for ch in text.chars() {
        match ch {
            '<' => depth += 1,
            '>' if depth > 0 => depth -= 1,
            _ if depth == 0 => out.push(ch),
            _ => {}
        }
    }
    out
}

/// Resolves the actor to record for a comment/chat action: the supplied
/// value when non-empty and within [`MAX_ACTOR_LEN`], otherwise
/// [`DEFAULT_ACTOR`].
#[must_use]
pub fn resolve_actor(actor: Option<&str>) -> String {
    match actor {
        Some(value) if !value.is_empty() && value.len() <= MAX_ACTOR_LEN => value.to_string(),
        _ => DEFAULT_ACTOR.to_string(),
    }
}

/// Truncates `text` to at most [`NOTIFICATION_SNIPPET_LEN`] characters,
/// respecting UTF-8 character boundaries.
#[must_use]
pub fn notification_snippet(text: &str) -> String {
    text.chars().take(NOTIFICATION_SNIPPET_LEN).collect()
}

// ============================================================================
// SECTION: Mentions
// ============================================================================

/// Parses distinct, valid `@group` mentions out of sanitized comment text.
/// Mentions are case-sensitive and bounded by the group registry; unknown
/// mentions are silently ignored. Returns mentions in first-seen order,
/// deduplicated.
#[must_use]
pub fn parse_mentions(sanitized_text: &str, registry: &GroupRegistry) -> Vec<String> {
    let mut seen = Vec::new();
    let mut chars = sanitized_text.char_indices().peekable();
    while let Some((idx, ch)) = chars.next() {
        if ch != '@' {
            continue;
        }
        let rest = &sanitized_text[idx + 1..];
        let end = rest
            .char_indices()
            .find(|(_, c)| !(c.is_ascii_alphanumeric() || *c == '_'))
            .map_or(rest.len(), |(pos, _)| pos);
        if end == 0 {
            continue;
        }
        let candidate = &rest[..end];
        if registry.contains(candidate) && !seen.iter().any(|g: &String| g == candidate) {
            seen.push(candidate.to_string());
        }
    }
    seen
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_strips_tags_and_trims() {
        let out = sanitize_comment("  hi <b>there</b> friend  ").expect("sanitize");
        assert_eq!(out, "hi there friend");
    }

    #[test]
    fn sanitize_rejects_empty_after_stripping() {
        assert_eq!(sanitize_comment("   <div></div>   "), Err(SanitizeError::Empty));
    }

    #[test]
    fn sanitize_rejects_raw_too_long() {
        let long = "a".repeat(MAX_COMMENT_RAW_LEN + 1);
        assert_eq!(sanitize_comment(&long), Err(SanitizeError::TooLong));
    }

    #[test]
    fn sanitize_accepts_raw_at_exact_boundary() {
        let exact = "a".repeat(MAX_COMMENT_RAW_LEN);
        assert!(sanitize_comment(&exact).is_ok());
    }

    #[test]
    fn resolve_actor_falls_back_on_overlong_or_missing() {
        assert_eq!(resolve_actor(None), DEFAULT_ACTOR);
        assert_eq!(resolve_actor(Some("")), DEFAULT_ACTOR);
        assert_eq!(resolve_actor(Some(&"a".repeat(51))), DEFAULT_ACTOR);
        assert_eq!(resolve_actor(Some("claims-bot")), "claims-bot");
    }

    #[test]
    fn parse_mentions_dedupes_and_ignores_unknown_groups() {
        let registry = GroupRegistry::default_groups();
        let mentions = parse_mentions(
            "cc @developer and @security please review, also @developer again and @finance",
            &registry,
        );
        assert_eq!(mentions, vec!["developer".to_string(), "security".to_string()]);
    }

    #[test]
    fn notification_snippet_truncates_to_200_chars() {
        let long = "x".repeat(500);
        let snippet = notification_snippet(&long);
        assert_eq!(snippet.chars().count(), NOTIFICATION_SNIPPET_LEN);
    }
}

use thiserror::Error;

use pulsefeed_common::text::{collapse_whitespace, truncate_chars};
use pulsefeed_common::{Post, MAX_POST_TEXT_CHARS};

#[derive(Debug, Error, PartialEq, Eq)]
#[error("validation failed, missing fields: {missing:?}")]
pub struct ValidationError {
    pub missing: Vec<&'static str>,
}

/// Enforce required fields and normalize text. Whitespace runs collapse to
/// single spaces, the result is trimmed and capped at 25,000 chars.
/// Timestamps carry an explicit UTC offset by construction.
pub fn validate_and_clean(mut post: Post) -> Result<Post, ValidationError> {
    let mut missing = Vec::new();
    if post.id.trim().is_empty() {
        missing.push("id");
    }
    if post.author_handle.trim().is_empty() {
        missing.push("author_handle");
    }
    if post.text.trim().is_empty() {
        missing.push("text");
    }
    if !missing.is_empty() {
        return Err(ValidationError { missing });
    }

    post.text = clean_text(&post.text);
    if let Some(reference) = post.reference.as_mut() {
        if let Some(text) = reference.text.take() {
            let cleaned = clean_text(&text);
            reference.text = (!cleaned.is_empty()).then_some(cleaned);
        }
    }

    Ok(post)
}

fn clean_text(text: &str) -> String {
    let collapsed = collapse_whitespace(text);
    truncate_chars(&collapsed, MAX_POST_TEXT_CHARS).to_string()
}

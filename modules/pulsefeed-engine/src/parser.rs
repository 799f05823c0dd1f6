//! Converts a provider envelope into domain posts. Lossy by design: a post
//! the provider serialized badly is skipped with a warning, never fatal.

use chrono::{DateTime, Utc};
use tracing::warn;

use firefeed_client::{FeedEnvelope, RawMedia, RawPost};
use pulsefeed_common::{Media, Post, PostRef, RefKind};

/// Parse every post in the envelope, joining author and media includes.
/// Unparsable individual posts are dropped.
pub fn parse_envelope(envelope: &FeedEnvelope) -> Vec<Post> {
    envelope
        .posts
        .iter()
        .filter_map(|raw| match parse_post(raw, envelope) {
            Some(post) => Some(post),
            None => {
                warn!(post_id = raw.id.as_deref().unwrap_or("<missing>"), "Skipping unparsable post");
                None
            }
        })
        .collect()
}

fn parse_post(raw: &RawPost, envelope: &FeedEnvelope) -> Option<Post> {
    let id = raw.id.clone()?;
    let created_at = parse_timestamp(raw.created_at.as_deref()?)?;

    let (author_handle, author_name) = author_of(raw, envelope);

    Some(Post {
        id,
        text: raw.text.clone().unwrap_or_default(),
        author_handle,
        author_name,
        created_at,
        reference: resolve_reference(raw, envelope),
        media: media_of(&raw.media_ids, envelope),
    })
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

fn author_of(raw: &RawPost, envelope: &FeedEnvelope) -> (String, String) {
    let user = raw
        .author_id
        .as_deref()
        .and_then(|id| envelope.users.get(id));
    match user {
        Some(user) => (
            user.username.clone().unwrap_or_default(),
            user.display_name.clone().unwrap_or_default(),
        ),
        None => (String::new(), String::new()),
    }
}

fn media_of(ids: &[String], envelope: &FeedEnvelope) -> Vec<Media> {
    ids.iter()
        .filter_map(|id| envelope.media.get(id).map(to_media))
        .collect()
}

fn to_media(raw: &RawMedia) -> Media {
    Media {
        id: raw.id.clone(),
        kind: raw.kind.clone().unwrap_or_else(|| "unknown".to_string()),
        url: raw.url.clone().unwrap_or_default(),
        preview_url: raw.preview_url.clone(),
        width: raw.width,
        height: raw.height,
        alt_text: raw.alt_text.clone(),
    }
}

/// When the provider reports several reference shapes on one post, only the
/// highest-priority one is kept: reshare > quote > reply.
fn resolve_reference(raw: &RawPost, envelope: &FeedEnvelope) -> Option<PostRef> {
    let chosen = raw
        .references
        .iter()
        .filter_map(|r| ref_kind(&r.kind).map(|kind| (kind, r.id.as_str())))
        .min_by_key(|(kind, _)| ref_priority(*kind))?;

    let (kind, target_id) = chosen;
    let referenced = envelope.referenced.get(target_id);

    let (text, author_handle, media) = match referenced {
        Some(post) => (
            post.text.clone(),
            post.author_id
                .as_deref()
                .and_then(|id| envelope.users.get(id))
                .and_then(|u| u.username.clone()),
            media_of(&post.media_ids, envelope),
        ),
        None => (None, None, Vec::new()),
    };

    Some(PostRef {
        target_id: target_id.to_string(),
        kind,
        text,
        author_handle,
        media,
    })
}

fn ref_kind(raw: &str) -> Option<RefKind> {
    match raw {
        "reshared" => Some(RefKind::Reshared),
        "quoted" => Some(RefKind::Quoted),
        "replied_to" => Some(RefKind::Reply),
        _ => None,
    }
}

fn ref_priority(kind: RefKind) -> u8 {
    match kind {
        RefKind::Reshared => 0,
        RefKind::Quoted => 1,
        RefKind::Reply => 2,
    }
}

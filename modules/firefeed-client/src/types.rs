use std::collections::HashMap;

use serde::Deserialize;

/// The provider answers in one of two shapes depending on endpoint version:
/// nested under `data` or with the collections at the top level. Both decode
/// into the same body.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RawFeedResponse {
    Nested { data: RawFeedBody },
    Flat(RawFeedBody),
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawFeedBody {
    #[serde(default)]
    pub posts: Vec<RawPost>,
    #[serde(default)]
    pub users: Vec<RawUser>,
    #[serde(default)]
    pub media: Vec<RawMedia>,
    /// Posts referenced by reshares/quotes/replies, included for enrichment.
    #[serde(rename = "referencedPosts", default)]
    pub referenced_posts: Vec<RawPost>,
}

/// A single post as the provider serializes it.
#[derive(Debug, Clone, Deserialize)]
pub struct RawPost {
    pub id: Option<String>,
    pub text: Option<String>,
    #[serde(rename = "authorId")]
    pub author_id: Option<String>,
    #[serde(rename = "createdAt")]
    pub created_at: Option<String>,
    #[serde(rename = "mediaIds", default)]
    pub media_ids: Vec<String>,
    #[serde(rename = "references", default)]
    pub references: Vec<RawReference>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawReference {
    #[serde(rename = "type")]
    pub kind: String,
    pub id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawUser {
    pub id: String,
    pub username: Option<String>,
    #[serde(rename = "displayName")]
    pub display_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawMedia {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub url: Option<String>,
    #[serde(rename = "previewUrl")]
    pub preview_url: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    #[serde(rename = "altText")]
    pub alt_text: Option<String>,
}

/// Normalized fetch result: posts plus the author/media/referenced-post
/// includes rebuilt into id-keyed lookup maps.
#[derive(Debug, Clone, Default)]
pub struct FeedEnvelope {
    pub posts: Vec<RawPost>,
    pub users: HashMap<String, RawUser>,
    pub media: HashMap<String, RawMedia>,
    pub referenced: HashMap<String, RawPost>,
}

impl RawFeedResponse {
    pub fn into_envelope(self) -> FeedEnvelope {
        let body = match self {
            RawFeedResponse::Nested { data } => data,
            RawFeedResponse::Flat(body) => body,
        };

        let users = body.users.into_iter().map(|u| (u.id.clone(), u)).collect();
        let media = body.media.into_iter().map(|m| (m.id.clone(), m)).collect();
        let referenced = body
            .referenced_posts
            .into_iter()
            .filter_map(|p| p.id.clone().map(|id| (id, p)))
            .collect();

        FeedEnvelope {
            posts: body.posts,
            users,
            media,
            referenced,
        }
    }
}

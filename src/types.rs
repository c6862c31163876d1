use std::fmt;

use serde::Deserialize;
use serde::Serialize;

/// Discourse post action type for "like"
pub const LIKE_ACTION: u32 = 2;

pub type PostId = u64;

/// API key and username pair every request is issued as.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub api_key: String,
    pub username: String,
}

pub type Account = Credentials;

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &"<redacted>")
            .field("username", &self.username)
            .finish()
    }
}

/// Opaque topic identifier, kept as text so file entries pass through untouched.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TopicId(pub String);

impl From<u64> for TopicId {
    fn from(id: u64) -> Self {
        TopicId(id.to_string())
    }
}

impl From<&str> for TopicId {
    fn from(id: &str) -> Self {
        TopicId(id.to_string())
    }
}

impl fmt::Display for TopicId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Serialize)]
pub struct PostAction {
    pub id: PostId,
    pub post_action_type_id: u32,
}

impl PostAction {
    pub fn like(id: PostId) -> Self {
        PostAction {
            id,
            post_action_type_id: LIKE_ACTION,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct TopicDetail {
    #[serde(default)]
    pub post_stream: PostStream,
}

#[derive(Debug, Default, Deserialize)]
pub struct PostStream {
    #[serde(default)]
    pub posts: Vec<PostRef>,
}

#[derive(Debug, Deserialize)]
pub struct PostRef {
    pub id: PostId,
}

impl TopicDetail {
    pub fn first_post_id(&self) -> Option<PostId> {
        self.post_stream.posts.first().map(|p| p.id)
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct LatestTopics {
    #[serde(default)]
    pub topic_list: TopicList,
}

#[derive(Debug, Default, Deserialize)]
pub struct TopicList {
    #[serde(default)]
    pub topics: Vec<TopicSummary>,
}

#[derive(Debug, Deserialize)]
pub struct TopicSummary {
    pub id: u64,
}

impl LatestTopics {
    pub fn ids(&self) -> impl Iterator<Item = TopicId> + '_ {
        self.topic_list.topics.iter().map(|t| TopicId::from(t.id))
    }
}

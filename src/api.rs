use std::time::Duration;

use anyhow::{bail, Context, Result};
use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::{StatusCode, Url};

use crate::types::*;

const USER_AGENT: &str = concat!("discourse-liker v", env!("CARGO_PKG_VERSION"));

#[derive(Debug, thiserror::Error)]
pub(crate) enum ApiError {
    #[error("request failed: {0}")]
    Transport(#[source] reqwest::Error),
    #[error("status {status}: {body}")]
    Status { status: StatusCode, body: String },
    #[error("unexpected response body: {0}")]
    Malformed(#[source] reqwest::Error),
    #[error("topic has no posts")]
    EmptyPostStream,
}

/// The three forum endpoints this tool talks to, each issued as `auth`.
pub(crate) trait Forum: Sync {
    fn topic(&self, auth: &Credentials, topic: &TopicId) -> Result<TopicDetail, ApiError>;
    fn like(&self, auth: &Credentials, post: PostId) -> Result<(), ApiError>;
    fn latest_topics(&self, auth: &Credentials, page: u32) -> Result<LatestTopics, ApiError>;
}

pub(crate) struct DiscourseClient {
    client: Client,
    base: Url,
}

impl DiscourseClient {
    pub fn new(server: &str, timeout: Duration) -> Result<Self> {
        let base = Url::parse(server).with_context(|| format!("{server} is not a valid url"))?;
        if base.cannot_be_a_base() {
            bail!("{server} cannot be used as a server url");
        }
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .context("cannot build custom client")?;
        Ok(DiscourseClient { client, base })
    }

    /// Appends `segments` to the server url, each percent-encoded as a single path segment.
    fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.base.clone();
        // never fails: `new` rejects urls that cannot be a base
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }
}

trait Authenticated {
    fn auth(self, auth: &Credentials) -> Self;
}
impl Authenticated for RequestBuilder {
    fn auth(self, auth: &Credentials) -> Self {
        self.header("Api-Key", &auth.api_key)
            .header("Api-Username", &auth.username)
    }
}

trait WithErrorText {
    fn with_error_text(self, accepted: fn(StatusCode) -> bool) -> Result<Self, ApiError>
    where
        Self: Sized;
}
impl WithErrorText for Response {
    fn with_error_text(self, accepted: fn(StatusCode) -> bool) -> Result<Self, ApiError> {
        let status = self.status();
        if !accepted(status) {
            return Err(ApiError::Status {
                status,
                body: self.text().unwrap_or_default(),
            });
        }
        Ok(self)
    }
}

fn is_ok(status: StatusCode) -> bool {
    status == StatusCode::OK
}

impl Forum for DiscourseClient {
    fn topic(&self, auth: &Credentials, topic: &TopicId) -> Result<TopicDetail, ApiError> {
        let segment = format!("{topic}.json");
        self.client
            .get(self.url(&["t", segment.as_str()]))
            .auth(auth)
            .send()
            .map_err(ApiError::Transport)?
            .with_error_text(is_ok)?
            .json()
            .map_err(ApiError::Malformed)
    }

    fn like(&self, auth: &Credentials, post: PostId) -> Result<(), ApiError> {
        self.client
            .post(self.url(&["post_actions.json"]))
            .auth(auth)
            .json(&PostAction::like(post))
            .send()
            .map_err(ApiError::Transport)?
            .with_error_text(|s| s.is_success())?;
        Ok(())
    }

    fn latest_topics(&self, auth: &Credentials, page: u32) -> Result<LatestTopics, ApiError> {
        self.client
            .get(self.url(&["latest.json"]))
            .query(&[("page", page)])
            .auth(auth)
            .send()
            .map_err(ApiError::Transport)?
            .with_error_text(is_ok)?
            .json()
            .map_err(ApiError::Malformed)
    }
}

#[cfg(test)]
pub(crate) mod fake {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::thread::sleep;
    use std::time::Duration;

    use super::*;

    /// In-memory forum recording every like it receives.
    #[derive(Default)]
    pub(crate) struct FakeForum {
        topics: HashMap<String, Vec<PostId>>,
        pages: Vec<Result<Vec<u64>, StatusCode>>,
        failing_likes: HashMap<PostId, StatusCode>,
        panic_for: Option<String>,
        delay: Duration,
        pub likes: Mutex<Vec<(String, PostId)>>,
        pub topic_requests: Mutex<Vec<(String, TopicId)>>,
        pub page_requests: Mutex<Vec<u32>>,
        active: AtomicUsize,
        pub peak: AtomicUsize,
    }

    impl FakeForum {
        pub fn with_topic(mut self, id: &str, posts: &[PostId]) -> Self {
            self.topics.insert(id.to_string(), posts.to_vec());
            self
        }
        pub fn with_page(mut self, page: Result<Vec<u64>, StatusCode>) -> Self {
            self.pages.push(page);
            self
        }
        pub fn with_failing_like(mut self, post: PostId, status: StatusCode) -> Self {
            self.failing_likes.insert(post, status);
            self
        }
        pub fn with_panic_for(mut self, username: &str) -> Self {
            self.panic_for = Some(username.to_string());
            self
        }
        pub fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = delay;
            self
        }

        pub fn likes(&self) -> Vec<(String, PostId)> {
            self.likes.lock().unwrap().clone()
        }
    }

    fn status(status: StatusCode) -> ApiError {
        ApiError::Status {
            status,
            body: String::new(),
        }
    }

    impl Forum for FakeForum {
        fn topic(&self, auth: &Credentials, topic: &TopicId) -> Result<TopicDetail, ApiError> {
            let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            sleep(self.delay);
            self.active.fetch_sub(1, Ordering::SeqCst);
            if self.panic_for.as_deref() == Some(auth.username.as_str()) {
                panic!("boom for {}", auth.username);
            }
            self.topic_requests
                .lock()
                .unwrap()
                .push((auth.username.clone(), topic.clone()));
            let posts = self
                .topics
                .get(&topic.0)
                .ok_or(status(StatusCode::NOT_FOUND))?;
            Ok(TopicDetail {
                post_stream: PostStream {
                    posts: posts.iter().map(|&id| PostRef { id }).collect(),
                },
            })
        }

        fn like(&self, auth: &Credentials, post: PostId) -> Result<(), ApiError> {
            if let Some(&code) = self.failing_likes.get(&post) {
                return Err(status(code));
            }
            self.likes
                .lock()
                .unwrap()
                .push((auth.username.clone(), post));
            Ok(())
        }

        fn latest_topics(&self, _auth: &Credentials, page: u32) -> Result<LatestTopics, ApiError> {
            self.page_requests.lock().unwrap().push(page);
            let ids = match self.pages.get(page as usize) {
                Some(Ok(ids)) => ids.clone(),
                Some(Err(code)) => return Err(status(*code)),
                None => Vec::new(),
            };
            Ok(LatestTopics {
                topic_list: TopicList {
                    topics: ids.into_iter().map(|id| TopicSummary { id }).collect(),
                },
            })
        }
    }
}

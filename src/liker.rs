use std::io::{self, Write};
use std::time::Duration;

use anyhow::{Context, Result};
use log::{error, info, warn};

use crate::api::{ApiError, DiscourseClient, Forum};
use crate::config::*;
use crate::dispatch::dispatch;
use crate::topics::resolve_topics;
use crate::types::*;

/// Per-account tally of what happened to each topic.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub(crate) struct AccountReport {
    pub username: String,
    pub liked: usize,
    pub skipped: usize,
    pub failed: usize,
}

pub(crate) fn first_post_id<F: Forum + ?Sized>(
    forum: &F,
    auth: &Credentials,
    topic: &TopicId,
) -> Result<PostId, ApiError> {
    forum
        .topic(auth, topic)?
        .first_post_id()
        .ok_or(ApiError::EmptyPostStream)
}

/// Likes the first post of every topic, in order. A topic that fails never stops the walk.
pub(crate) fn process_account<F: Forum + ?Sized>(
    forum: &F,
    account: &Account,
    topics: &[TopicId],
) -> AccountReport {
    let username = &account.username;
    info!("Processing topics with account: {username}");
    let mut report = AccountReport {
        username: username.clone(),
        ..Default::default()
    };
    for topic in topics {
        let post = match first_post_id(forum, account, topic) {
            Ok(post) => post,
            Err(e) => {
                warn!("[{username}] Skipping topic {topic}: {e}");
                report.skipped += 1;
                continue;
            }
        };
        match forum.like(account, post) {
            Ok(()) => {
                info!("[{username}] Successfully liked post {post} (topic {topic})");
                report.liked += 1;
            }
            Err(e) => {
                warn!("[{username}] Failed to like post {post} (topic {topic}): {e}");
                report.failed += 1;
            }
        }
    }
    report
}

fn client(config: &Config) -> Result<DiscourseClient> {
    DiscourseClient::new(&config.server, Duration::from_secs(config.timeout_secs))
}

pub(crate) fn run(config: &Config) -> Result<()> {
    let accounts = load_accounts(&config.account);
    if accounts.is_empty() {
        error!("No accounts configured, nothing to do");
        return Ok(());
    }
    let forum = client(config)?;
    let topics = resolve_topics(config, &forum)?;
    if topics.is_empty() {
        error!("No topics to process, nothing to do");
        return Ok(());
    }
    info!(
        "Processing {} topics with {} accounts ({} workers)",
        topics.len(),
        accounts.len(),
        config.workers
    );
    let outcomes = dispatch(&forum, &accounts, &topics, config.workers);
    let (mut liked, mut skipped, mut failed) = (0, 0, 0);
    let mut aborted = Vec::new();
    for outcome in &outcomes {
        match &outcome.result {
            Ok(report) => {
                liked += report.liked;
                skipped += report.skipped;
                failed += report.failed;
            }
            Err(_) => aborted.push(outcome.username.as_str()),
        }
    }
    info!("Done: {liked} liked, {skipped} skipped, {failed} failed likes");
    if !aborted.is_empty() {
        error!("Accounts aborted before finishing: {}", aborted.join(", "));
    }
    Ok(())
}

/// Prints the topic ids a run would use, one per line.
pub(crate) fn list_topics(config: &Config) -> Result<()> {
    let forum = client(config)?;
    let topics = resolve_topics(config, &forum)?;
    let mut out = io::stdout().lock();
    for topic in &topics {
        writeln!(out, "{topic}").context("cannot write to stdout")?;
    }
    Ok(())
}

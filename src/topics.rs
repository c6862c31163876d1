use std::io::ErrorKind;
use std::path::Path;

use anyhow::{bail, Context, Result};
use log::{error, info, warn};

use crate::api::Forum;
use crate::config::Config;
use crate::types::*;

/// One id per line; surrounding whitespace and blank lines are dropped.
pub(crate) fn parse_topic_ids(text: &str) -> Vec<TopicId> {
    text.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(TopicId::from)
        .collect()
}

pub(crate) fn read_topic_file(path: &Path) -> Result<Vec<TopicId>> {
    match std::fs::read_to_string(path) {
        Ok(text) => Ok(parse_topic_ids(&text)),
        Err(e) if e.kind() == ErrorKind::NotFound => {
            info!("File {} not found", path.display());
            Ok(Vec::new())
        }
        Err(e) => Err(e).with_context(|| format!("cannot read {}", path.display())),
    }
}

/// Walks `latest.json` from page 0 until an empty page or the first failure.
pub(crate) fn fetch_all_topic_ids<F: Forum + ?Sized>(forum: &F, admin: &Credentials) -> Vec<TopicId> {
    let mut ids = Vec::new();
    let mut page = 0;
    loop {
        let latest = match forum.latest_topics(admin, page) {
            Ok(latest) => latest,
            Err(e) => {
                warn!("Failed to fetch topics page {page}: {e}");
                break;
            }
        };
        let before = ids.len();
        ids.extend(latest.ids());
        if ids.len() == before {
            break;
        }
        info!("Fetched page {}, topics: {}", page + 1, ids.len() - before);
        page += 1;
    }
    ids
}

/// Topic ids from the configured file, or from the forum listing when the file has none.
pub(crate) fn resolve_topics<F: Forum + ?Sized>(config: &Config, forum: &F) -> Result<Vec<TopicId>> {
    let ids = read_topic_file(&config.topics_file)?;
    if !ids.is_empty() {
        return Ok(ids);
    }
    info!(
        "No topic ids in {}, fetching all topics",
        config.topics_file.display()
    );
    let Some(admin) = config.admin_credentials() else {
        error!("No topic ids and no admin credentials to list topics with, nothing to do");
        bail!("no topic ids available and no admin credentials configured to list topics");
    };
    Ok(fetch_all_topic_ids(forum, &admin))
}

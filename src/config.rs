use std::collections::BTreeMap;
use std::ffi::OsString;
use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;

use crate::types::{Account, Credentials};

const DEFAULT_WORKERS: usize = 5;
const DEFAULT_TIMEOUT_SECS: u64 = 20;
const DEFAULT_TOPICS_FILE: &str = "topic_ids.txt";

#[derive(Debug, Deserialize)]
pub(crate) struct Config {
    pub server: String,
    pub admin: Option<AccountEntry>,
    #[serde(default)]
    pub account: Vec<AccountEntry>,
    #[serde(default = "default_workers")]
    pub workers: usize,
    #[serde(default = "default_topics_file")]
    pub topics_file: PathBuf,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

/// One credential slot. Either field may be missing, in which case the slot is ignored.
#[derive(Debug, Default, Clone, Deserialize)]
pub(crate) struct AccountEntry {
    pub api_key: Option<String>,
    pub username: Option<String>,
}

fn default_workers() -> usize {
    DEFAULT_WORKERS
}
fn default_topics_file() -> PathBuf {
    PathBuf::from(DEFAULT_TOPICS_FILE)
}
fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

impl AccountEntry {
    pub fn credentials(&self) -> Option<Credentials> {
        match (non_empty(&self.api_key), non_empty(&self.username)) {
            (Some(api_key), Some(username)) => Some(Credentials {
                api_key: api_key.to_string(),
                username: username.to_string(),
            }),
            _ => None,
        }
    }
}

fn non_empty(field: &Option<String>) -> Option<&str> {
    field.as_deref().filter(|s| !s.is_empty())
}

/// Keeps the complete slots, in slot order.
pub(crate) fn load_accounts(entries: &[AccountEntry]) -> Vec<Account> {
    entries.iter().filter_map(AccountEntry::credentials).collect()
}

impl Config {
    pub fn admin_credentials(&self) -> Option<Credentials> {
        self.admin.as_ref().and_then(AccountEntry::credentials)
    }

    /// Builds the configuration from `DISCOURSE_URL`, `API_KEY`/`API_USERNAME` and
    /// any number of `USER{n}_API_KEY`/`USER{n}_USERNAME` pairs.
    pub fn from_vars<I>(vars: I) -> Result<Config>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut server = None;
        let mut admin = AccountEntry::default();
        let mut slots: BTreeMap<u32, AccountEntry> = BTreeMap::new();
        for (name, value) in vars {
            match name.as_str() {
                "DISCOURSE_URL" => server = Some(value),
                "API_KEY" => admin.api_key = Some(value),
                "API_USERNAME" => admin.username = Some(value),
                _ => {
                    let Some((slot, field)) = name
                        .strip_prefix("USER")
                        .and_then(|rest| rest.split_once('_'))
                    else {
                        continue;
                    };
                    let Ok(slot) = slot.parse::<u32>() else {
                        continue;
                    };
                    match field {
                        "API_KEY" => slots.entry(slot).or_default().api_key = Some(value),
                        "USERNAME" => slots.entry(slot).or_default().username = Some(value),
                        _ => {}
                    }
                }
            }
        }
        let config = Config {
            server: server.ok_or_else(|| anyhow!("DISCOURSE_URL is not set"))?,
            admin: Some(admin),
            account: slots.into_values().collect(),
            workers: DEFAULT_WORKERS,
            topics_file: default_topics_file(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn from_env() -> Result<Config> {
        Config::from_vars(utf8_vars(std::env::vars_os()))
            .context("invalid environment configuration")
    }

    fn validate(&self) -> Result<()> {
        reqwest::Url::parse(&self.server)
            .with_context(|| format!("{} is not a valid server url", self.server))?;
        Ok(())
    }
}

/// Drops variables whose name or value is not valid UTF-8; none of ours can be.
fn utf8_vars<I>(vars: I) -> impl Iterator<Item = (String, String)>
where
    I: IntoIterator<Item = (OsString, OsString)>,
{
    vars.into_iter()
        .filter_map(|(name, value)| Some((name.into_string().ok()?, value.into_string().ok()?)))
}

pub(crate) fn load_config(filename: &str) -> Result<Config> {
    let config: Config = toml::from_str(
        &std::fs::read_to_string(filename).with_context(|| format!("cannot read {filename}"))?,
    )
    .with_context(|| format!("invalid config file {filename}"))?;
    config
        .validate()
        .with_context(|| format!("invalid config file {filename}"))?;
    Ok(config)
}

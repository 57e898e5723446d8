//! Fetching and parsing the seven dashboard sources.

pub mod retry;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::Utc;
use futures_util::future::try_join_all;
use reqwest::Client;
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;
use tokio::time::timeout;
use url::Url;

use crate::data::{parse_csv, Dataset, DatasetKind};
use crate::error::{LoadError, LoadResult};
use crate::logging::{log_dataset_loaded, log_load_failed, v_str, ProfileScope};
use crate::state::{Config, DashboardData};
use retry::{retry_async, RetryConfig};

/// Where raw dataset text comes from.
#[async_trait]
pub trait Source: Send + Sync {
    fn describe(&self) -> String;
    async fn fetch_text(&self, kind: DatasetKind) -> LoadResult<String>;
}

/// Reads `<dir>/<kind>.csv` from local disk.
pub struct FileSource {
    dir: PathBuf,
}

impl FileSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

#[async_trait]
impl Source for FileSource {
    fn describe(&self) -> String {
        format!("file:{}", self.dir.display())
    }

    async fn fetch_text(&self, kind: DatasetKind) -> LoadResult<String> {
        let path = self.dir.join(kind.file_name());
        tokio::fs::read_to_string(&path).await.map_err(|e| LoadError::Io {
            dataset: kind.to_string(),
            message: format!("{}: {}", path.display(), e),
        })
    }
}

/// GETs `<base_url>/<kind>.csv`.
pub struct HttpSource {
    client: Client,
    base: Url,
}

impl HttpSource {
    pub fn new(base_url: &str) -> Result<Self> {
        let mut base = Url::parse(base_url)?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        if base.cannot_be_a_base() {
            return Err(anyhow!("base url cannot be joined: {}", base_url));
        }
        Ok(Self {
            client: Client::new(),
            base,
        })
    }

    pub fn url_for(&self, kind: DatasetKind) -> LoadResult<Url> {
        self.base.join(&kind.file_name()).map_err(|e| LoadError::Fetch {
            dataset: kind.to_string(),
            message: e.to_string(),
        })
    }
}

#[async_trait]
impl Source for HttpSource {
    fn describe(&self) -> String {
        format!("http:{}", self.base)
    }

    async fn fetch_text(&self, kind: DatasetKind) -> LoadResult<String> {
        let fetch_err = |message: String| LoadError::Fetch {
            dataset: kind.to_string(),
            message,
        };
        let url = self.url_for(kind)?;
        let resp = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| fetch_err(e.to_string()))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(fetch_err(format!("{} returned HTTP {}", url, status.as_u16())));
        }
        resp.text().await.map_err(|e| fetch_err(e.to_string()))
    }
}

/// Text already in memory, keyed by dataset. Missing kinds fail to fetch.
#[derive(Default, Clone)]
pub struct MemorySource {
    texts: HashMap<DatasetKind, String>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, kind: DatasetKind, text: impl Into<String>) -> Self {
        self.texts.insert(kind, text.into());
        self
    }
}

#[async_trait]
impl Source for MemorySource {
    fn describe(&self) -> String {
        format!("memory:{}", self.texts.len())
    }

    async fn fetch_text(&self, kind: DatasetKind) -> LoadResult<String> {
        self.texts.get(&kind).cloned().ok_or_else(|| LoadError::Fetch {
            dataset: kind.to_string(),
            message: "no text registered".to_string(),
        })
    }
}

pub fn source_from_config(cfg: &Config) -> Result<Box<dyn Source>> {
    match &cfg.base_url {
        Some(url) => Ok(Box::new(HttpSource::new(url)?)),
        None => Ok(Box::new(FileSource::new(&cfg.data_dir))),
    }
}

/// Per-source timeout and retry policy.
#[derive(Clone, Debug)]
pub struct LoadPolicy {
    pub timeout: Duration,
    pub retry: RetryConfig,
}

impl Default for LoadPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            retry: RetryConfig::default(),
        }
    }
}

impl LoadPolicy {
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            timeout: cfg.load_timeout(),
            retry: RetryConfig {
                max_retries: cfg.load_max_retries,
                base_delay_ms: cfg.load_base_delay_ms,
                max_delay_ms: cfg.load_max_delay_ms,
                ..Default::default()
            },
        }
    }
}

/// Fetch and parse one dataset, with timeout per attempt.
pub async fn load<S: Source + ?Sized>(
    source: &S,
    kind: DatasetKind,
    policy: &LoadPolicy,
) -> LoadResult<Dataset> {
    let scope = ProfileScope::with_context("load_dataset", &[("dataset", v_str(kind.as_str()))]);
    let mut attempts = 0u32;
    let result = retry_async(&policy.retry, kind.as_str(), || {
        attempts += 1;
        async move {
            let text = match timeout(policy.timeout, source.fetch_text(kind)).await {
                Ok(fetched) => fetched?,
                Err(_) => {
                    return Err(LoadError::Timeout {
                        dataset: kind.to_string(),
                        waited_ms: policy.timeout.as_millis() as u64,
                    })
                }
            };
            parse_csv(kind, &text)
        }
    })
    .await;

    match &result {
        Ok(ds) => log_dataset_loaded(kind, ds.len(), ds.qualifying().count(), scope.elapsed_ms()),
        Err(e) => log_load_failed(kind, &e.to_string(), attempts),
    }
    result
}

/// Load every dataset concurrently. The first failure fails the whole cycle;
/// loads still running at that point are dropped.
pub async fn load_all<S: Source + ?Sized>(source: &S, policy: &LoadPolicy) -> LoadResult<DashboardData> {
    let loads = DatasetKind::ALL
        .iter()
        .map(|kind| load(source, *kind, policy));
    let datasets = try_join_all(loads).await?;
    Ok(DashboardData::from_datasets(datasets, Utc::now()))
}

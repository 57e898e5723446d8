use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Duration;

use crate::data::{Dataset, DatasetKind};
use crate::derive::DEFAULT_SCALE_MAX;

#[derive(Clone, Debug)]
pub struct Config {
    pub data_dir: String,
    /// When set, datasets are fetched over HTTP instead of read from `data_dir`.
    pub base_url: Option<String>,
    pub load_timeout_secs: u64,
    pub load_max_retries: u32,
    pub load_base_delay_ms: u64,
    pub load_max_delay_ms: u64,
    pub maturity_scale_max: f64,
    pub port: u16,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            data_dir: std::env::var("DASHBOARD_DATA_DIR").unwrap_or_else(|_| "data".to_string()),
            base_url: std::env::var("DASHBOARD_BASE_URL").ok().filter(|v| !v.trim().is_empty()),
            load_timeout_secs: std::env::var("LOAD_TIMEOUT_SECS").ok().and_then(|v| v.parse().ok()).unwrap_or(10),
            load_max_retries: std::env::var("LOAD_MAX_RETRIES").ok().and_then(|v| v.parse().ok()).unwrap_or(2),
            load_base_delay_ms: std::env::var("LOAD_BASE_DELAY_MS").ok().and_then(|v| v.parse().ok()).unwrap_or(100),
            load_max_delay_ms: std::env::var("LOAD_MAX_DELAY_MS").ok().and_then(|v| v.parse().ok()).unwrap_or(2000),
            maturity_scale_max: std::env::var("MATURITY_SCALE_MAX").ok().and_then(|v| v.parse().ok()).unwrap_or(DEFAULT_SCALE_MAX),
            port: std::env::var("DASHBOARD_PORT").ok().and_then(|v| v.parse().ok()).unwrap_or(8766),
        }
    }

    pub fn load_timeout(&self) -> Duration {
        Duration::from_secs(self.load_timeout_secs)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: "data".to_string(),
            base_url: None,
            load_timeout_secs: 10,
            load_max_retries: 2,
            load_base_delay_ms: 100,
            load_max_delay_ms: 2000,
            maturity_scale_max: DEFAULT_SCALE_MAX,
            port: 8766,
        }
    }
}

/// All seven datasets from one load cycle.
///
/// Built once per cycle and never mutated; a refresh produces a new value.
#[derive(Debug, Clone, Serialize)]
pub struct DashboardData {
    pub dora_metrics: Dataset,
    pub maturity: Dataset,
    pub change_mgmt: Dataset,
    pub aup_metrics: Dataset,
    pub backlog: Dataset,
    pub weekly: Dataset,
    pub level1_metrics: Dataset,
    pub loaded_at: DateTime<Utc>,
}

impl DashboardData {
    /// Assemble from loaded datasets in any order. Kinds that are missing stay empty.
    pub fn from_datasets(datasets: Vec<Dataset>, loaded_at: DateTime<Utc>) -> Self {
        let mut data = Self::empty(loaded_at);
        for ds in datasets {
            let kind = ds.kind;
            *data.slot_mut(kind) = ds;
        }
        data
    }

    pub fn empty(loaded_at: DateTime<Utc>) -> Self {
        Self {
            dora_metrics: Dataset::empty(DatasetKind::DoraMetrics),
            maturity: Dataset::empty(DatasetKind::Maturity),
            change_mgmt: Dataset::empty(DatasetKind::ChangeMgmt),
            aup_metrics: Dataset::empty(DatasetKind::AupMetrics),
            backlog: Dataset::empty(DatasetKind::Backlog),
            weekly: Dataset::empty(DatasetKind::Weekly),
            level1_metrics: Dataset::empty(DatasetKind::Level1Metrics),
            loaded_at,
        }
    }

    pub fn get(&self, kind: DatasetKind) -> &Dataset {
        match kind {
            DatasetKind::DoraMetrics => &self.dora_metrics,
            DatasetKind::Maturity => &self.maturity,
            DatasetKind::ChangeMgmt => &self.change_mgmt,
            DatasetKind::AupMetrics => &self.aup_metrics,
            DatasetKind::Backlog => &self.backlog,
            DatasetKind::Weekly => &self.weekly,
            DatasetKind::Level1Metrics => &self.level1_metrics,
        }
    }

    fn slot_mut(&mut self, kind: DatasetKind) -> &mut Dataset {
        match kind {
            DatasetKind::DoraMetrics => &mut self.dora_metrics,
            DatasetKind::Maturity => &mut self.maturity,
            DatasetKind::ChangeMgmt => &mut self.change_mgmt,
            DatasetKind::AupMetrics => &mut self.aup_metrics,
            DatasetKind::Backlog => &mut self.backlog,
            DatasetKind::Weekly => &mut self.weekly,
            DatasetKind::Level1Metrics => &mut self.level1_metrics,
        }
    }

    pub fn total_rows(&self) -> usize {
        DatasetKind::ALL.iter().map(|k| self.get(*k).len()).sum()
    }
}

pub fn now_ts() -> u64 {
    Utc::now().timestamp() as u64
}

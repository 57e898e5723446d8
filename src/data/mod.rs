//! Dataset schemas, records and file manifests.

pub mod csv;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use crate::error::{LoadError, LoadResult};

pub use csv::parse_csv;

/// The seven sources the dashboard is built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DatasetKind {
    DoraMetrics,
    Maturity,
    ChangeMgmt,
    AupMetrics,
    Backlog,
    Weekly,
    Level1Metrics,
}

impl DatasetKind {
    pub const ALL: [DatasetKind; 7] = [
        DatasetKind::DoraMetrics,
        DatasetKind::Maturity,
        DatasetKind::ChangeMgmt,
        DatasetKind::AupMetrics,
        DatasetKind::Backlog,
        DatasetKind::Weekly,
        DatasetKind::Level1Metrics,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DatasetKind::DoraMetrics => "dora_metrics",
            DatasetKind::Maturity => "maturity",
            DatasetKind::ChangeMgmt => "change_mgmt",
            DatasetKind::AupMetrics => "aup_metrics",
            DatasetKind::Backlog => "backlog",
            DatasetKind::Weekly => "weekly",
            DatasetKind::Level1Metrics => "level1_metrics",
        }
    }

    pub fn file_name(&self) -> String {
        format!("{}.csv", self.as_str())
    }

    pub fn from_file_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.file_name() == name)
    }

    /// Columns the dashboard reads. Not enforced at load time.
    pub fn expected_columns(&self) -> &'static [&'static str] {
        match self {
            DatasetKind::DoraMetrics | DatasetKind::Level1Metrics => {
                &["metric", "baseline", "current", "target"]
            }
            DatasetKind::Maturity => &[
                "team", "baseline", "week2", "week4", "week6", "week8", "week10", "target",
            ],
            DatasetKind::ChangeMgmt => &[
                "component",
                "phase",
                "status",
                "owner",
                "completion",
                "target_date",
            ],
            DatasetKind::AupMetrics => &[
                "metric", "category", "baseline", "week2", "week4", "week6", "week8", "week10",
                "target",
            ],
            DatasetKind::Backlog => &[
                "id",
                "description",
                "team",
                "effort",
                "impact",
                "priority",
                "status",
                "owner",
            ],
            DatasetKind::Weekly => &[
                "week",
                "date",
                "focus",
                "backlog_items",
                "engineers_trained",
                "achievements",
                "blockers",
            ],
        }
    }

    /// A row is displayed only when this field is present.
    pub fn key_field(&self) -> &'static str {
        match self {
            DatasetKind::DoraMetrics | DatasetKind::AupMetrics | DatasetKind::Level1Metrics => {
                "metric"
            }
            DatasetKind::Maturity => "team",
            DatasetKind::ChangeMgmt => "component",
            DatasetKind::Backlog => "id",
            DatasetKind::Weekly => "week",
        }
    }
}

impl std::fmt::Display for DatasetKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One parsed row, column order preserved.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Record {
    fields: Vec<(String, String)>,
}

impl Record {
    pub fn new(fields: Vec<(String, String)>) -> Self {
        Self { fields }
    }

    pub fn from_pairs(pairs: &[(&str, &str)]) -> Self {
        Self {
            fields: pairs
                .iter()
                .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                .collect(),
        }
    }

    /// `None` when the column is absent or the cell is blank.
    pub fn get(&self, field: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == field)
            .map(|(_, v)| v.trim())
            .filter(|v| !v.is_empty())
    }

    pub fn get_or<'a>(&'a self, field: &str, fallback: &'a str) -> &'a str {
        self.get(field).unwrap_or(fallback)
    }

    pub fn has(&self, field: &str) -> bool {
        self.get(field).is_some()
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(k, _)| k.as_str())
    }

    pub fn values(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(_, v)| v.as_str())
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    pub kind: DatasetKind,
    pub columns: Vec<String>,
    pub records: Vec<Record>,
}

impl Dataset {
    pub fn empty(kind: DatasetKind) -> Self {
        Self {
            kind,
            columns: kind.expected_columns().iter().map(|s| s.to_string()).collect(),
            records: Vec::new(),
        }
    }

    pub fn from_records(kind: DatasetKind, records: Vec<Record>) -> Self {
        Self {
            kind,
            columns: kind.expected_columns().iter().map(|s| s.to_string()).collect(),
            records,
        }
    }

    /// Records whose key field is present, in source order.
    pub fn qualifying(&self) -> impl Iterator<Item = &Record> {
        let key = self.kind.key_field();
        self.records.iter().filter(move |r| r.has(key))
    }

    /// Exact match on a trimmed cell value.
    pub fn filter_eq<'a>(&'a self, field: &'a str, value: &'a str) -> impl Iterator<Item = &'a Record> {
        self.records
            .iter()
            .filter(move |r| r.get(field) == Some(value))
    }

    /// First qualifying record whose key matches `name`, case-insensitively.
    pub fn find_by_key(&self, name: &str) -> Option<&Record> {
        let key = self.kind.key_field();
        self.records.iter().find(|r| {
            r.get(key)
                .map(|v| v.eq_ignore_ascii_case(name.trim()))
                .unwrap_or(false)
        })
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaReport {
    pub dataset: DatasetKind,
    pub columns: Vec<String>,
    pub expected: Vec<String>,
    pub missing: Vec<String>,
    pub ok: bool,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetManifest {
    pub path: String,
    pub dataset: DatasetKind,
    pub hash_sha256: String,
    pub row_count: u64,
    pub qualifying_rows: u64,
    pub columns: Vec<String>,
    pub missing_columns: Vec<String>,
    pub warnings: Vec<String>,
    pub generated_at_epoch: u64,
}

/// Header check. Missing columns are reported, never fatal.
pub fn validate_schema(dataset: &Dataset) -> SchemaReport {
    let expected: Vec<String> = dataset
        .kind
        .expected_columns()
        .iter()
        .map(|s| s.to_string())
        .collect();
    let missing: Vec<String> = expected
        .iter()
        .filter(|c| !dataset.columns.contains(c))
        .cloned()
        .collect();
    let ok = missing.is_empty();
    let message = if ok {
        "schema ok".to_string()
    } else {
        format!("missing columns {:?}", missing)
    };
    SchemaReport {
        dataset: dataset.kind,
        columns: dataset.columns.clone(),
        expected,
        missing,
        ok,
        message,
    }
}

pub fn analyze_dataset(path: &Path, kind: DatasetKind, now_ts: u64) -> LoadResult<DatasetManifest> {
    let hash = file_sha256(path).map_err(|message| LoadError::Io {
        dataset: kind.to_string(),
        message,
    })?;
    let text = std::fs::read_to_string(path).map_err(|e| LoadError::Io {
        dataset: kind.to_string(),
        message: e.to_string(),
    })?;
    let dataset = parse_csv(kind, &text)?;
    let schema = validate_schema(&dataset);

    let mut warnings = Vec::new();
    if !schema.ok {
        warnings.push(format!("schema: {}", schema.message));
    }
    let key = kind.key_field();
    for (idx, record) in dataset.records.iter().enumerate() {
        if !record.has(key) {
            // +2: header line, 1-based
            warnings.push(format!("row {} has no {}; hidden", idx + 2, key));
        }
    }
    let unknown: Vec<&String> = dataset
        .columns
        .iter()
        .filter(|c| !kind.expected_columns().contains(&c.as_str()))
        .collect();
    if !unknown.is_empty() {
        warnings.push(format!("unused columns {:?}", unknown));
    }

    Ok(DatasetManifest {
        path: path.display().to_string(),
        dataset: kind,
        hash_sha256: hash,
        row_count: dataset.len() as u64,
        qualifying_rows: dataset.qualifying().count() as u64,
        columns: dataset.columns.clone(),
        missing_columns: schema.missing,
        warnings,
        generated_at_epoch: now_ts,
    })
}

pub fn file_sha256(path: &Path) -> Result<String, String> {
    let mut file = File::open(path).map_err(|e| e.to_string())?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 8192];
    loop {
        let n = file.read(&mut buf).map_err(|e| e.to_string())?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

pub fn default_manifest_path(dataset_path: &Path) -> PathBuf {
    let mut p = dataset_path.to_path_buf();
    let fname = dataset_path
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("dataset.csv");
    p.set_file_name(format!("{}.manifest.json", fname));
    p
}

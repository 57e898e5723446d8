//! Structured JSON-lines logging.
//!
//! Every entry carries a run id, a sequence number, a level and a domain so a
//! load/refresh cycle can be reconstructed from the log alone. Lines go to
//! stderr (stdout is reserved for dashboard output). When `LOG_DIR` is set the
//! run also gets `events.jsonl` and `trace.jsonl` under `LOG_DIR/<run_id>`.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::fs::{create_dir_all, File};
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::process;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, OnceLock};
use std::time::Instant;

use crate::data::DatasetKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl Level {
    const NAMES: [(Level, &'static str); 5] = [
        (Level::Trace, "trace"),
        (Level::Debug, "debug"),
        (Level::Info, "info"),
        (Level::Warn, "warn"),
        (Level::Error, "error"),
    ];

    pub fn parse(name: &str) -> Option<Self> {
        let name = name.trim();
        if name.eq_ignore_ascii_case("warning") {
            return Some(Level::Warn);
        }
        Self::NAMES
            .iter()
            .find(|(_, n)| n.eq_ignore_ascii_case(name))
            .map(|(l, _)| *l)
    }

    pub fn as_str(&self) -> &'static str {
        Self::NAMES[*self as usize].1
    }
}

/// Which part of the pipeline an entry comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Domain {
    Load,
    View,
    Refresh,
    System,
    Profile,
}

impl Domain {
    pub const ALL: [Domain; 5] = [
        Domain::Load,
        Domain::View,
        Domain::Refresh,
        Domain::System,
        Domain::Profile,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Domain::Load => "load",
            Domain::View => "view",
            Domain::Refresh => "refresh",
            Domain::System => "system",
            Domain::Profile => "profile",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|d| d.as_str().eq_ignore_ascii_case(name.trim()))
    }
}

/// Minimum level plus an optional domain allow-list, read once per process.
///
/// `LOG_LEVEL` defaults to `info`. `LOG_DOMAINS` is a comma-separated list;
/// unset, empty or `all` lets every domain through.
#[derive(Debug, Clone, PartialEq)]
pub struct LogFilter {
    pub min_level: Level,
    pub domains: Option<Vec<Domain>>,
}

impl LogFilter {
    pub fn from_env() -> Self {
        Self::parse(
            std::env::var("LOG_LEVEL").ok().as_deref(),
            std::env::var("LOG_DOMAINS").ok().as_deref(),
        )
    }

    pub fn parse(level: Option<&str>, domains: Option<&str>) -> Self {
        let min_level = level.and_then(Level::parse).unwrap_or(Level::Info);
        let domains = domains
            .map(str::trim)
            .filter(|d| !d.is_empty() && !d.eq_ignore_ascii_case("all"))
            .map(|list| list.split(',').filter_map(Domain::parse).collect());
        Self { min_level, domains }
    }

    pub fn allows(&self, level: Level, domain: Domain) -> bool {
        level >= self.min_level
            && self
                .domains
                .as_ref()
                .map_or(true, |allowed| allowed.contains(&domain))
    }
}

fn filter() -> &'static LogFilter {
    static FILTER: OnceLock<LogFilter> = OnceLock::new();
    FILTER.get_or_init(LogFilter::from_env)
}

static LOG_SEQ: AtomicU64 = AtomicU64::new(0);
static RUN_CONTEXT: OnceLock<RunContext> = OnceLock::new();

fn next_seq() -> u64 {
    LOG_SEQ.fetch_add(1, Ordering::SeqCst)
}

#[derive(Debug)]
struct RunContext {
    run_id: String,
    sinks: Option<FileSinks>,
}

#[derive(Debug)]
struct FileSinks {
    events: Mutex<BufWriter<File>>,
    trace: Mutex<BufWriter<File>>,
}

fn ensure_run_context() -> &'static RunContext {
    RUN_CONTEXT.get_or_init(|| {
        let run_id = std::env::var("RUN_ID")
            .unwrap_or_else(|_| format!("r-{}-{}", ts_epoch_ms(), process::id()));
        let sinks = std::env::var("LOG_DIR")
            .ok()
            .and_then(|base| open_sinks(PathBuf::from(base).join(&run_id), &run_id));
        RunContext { run_id, sinks }
    })
}

fn open_sinks(run_dir: PathBuf, run_id: &str) -> Option<FileSinks> {
    if let Err(err) = create_dir_all(&run_dir) {
        eprintln!("[log] failed to create run dir {}: {}", run_dir.display(), err);
        return None;
    }
    let _ = std::fs::write(
        run_dir.join("manifest.json"),
        json!({
            "run_id": run_id,
            "ts": ts_now(),
            "pid": process::id(),
            "log_dir": run_dir.to_string_lossy(),
        })
        .to_string(),
    );
    let open = |name: &str| match File::create(run_dir.join(name)) {
        Ok(f) => Some(Mutex::new(BufWriter::new(f))),
        Err(err) => {
            eprintln!("[log] failed to create {}: {}", name, err);
            None
        }
    };
    Some(FileSinks {
        events: open("events.jsonl")?,
        trace: open("trace.jsonl")?,
    })
}

/// Lifts the fields dashboards filter on out of `data` and onto the entry.
fn split_fields(mut fields: Map<String, Value>) -> (Map<String, Value>, Map<String, Value>) {
    let promoted = ["dataset", "source", "msg"]
        .into_iter()
        .filter_map(|key| fields.remove(key).map(|v| (key.to_string(), v)))
        .collect();
    (promoted, fields)
}

fn write_line(writer: &Mutex<BufWriter<File>>, line: &str) {
    if let Ok(mut w) = writer.lock() {
        let _ = writeln!(w, "{}", line);
        let _ = w.flush();
    }
}

pub fn ts_now() -> String {
    Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

pub fn ts_epoch_ms() -> u64 {
    Utc::now().timestamp_millis() as u64
}

/// Writes one entry to stderr and, when a run directory is open, to its sink.
pub fn log(level: Level, domain: Domain, event: &str, fields: Map<String, Value>) {
    if !filter().allows(level, domain) {
        return;
    }
    let line = format_record(level, domain.as_str(), event, fields);
    let ctx = ensure_run_context();
    if let Some(sinks) = &ctx.sinks {
        match level {
            Level::Trace | Level::Debug => write_line(&sinks.trace, &line),
            _ => write_line(&sinks.events, &line),
        }
    }
    eprintln!("{}", line);
}

fn format_record(level: Level, component: &str, event: &str, fields: Map<String, Value>) -> String {
    let (mut promoted, data) = split_fields(fields);
    let mut entry = json!({
        "ts": ts_now(),
        "run_id": &ensure_run_context().run_id,
        "seq": next_seq(),
        "lvl": level.as_str().to_ascii_uppercase(),
        "component": component,
        "event": event,
        "msg": promoted.remove("msg").unwrap_or_else(|| v_str("")),
        "data": data,
    });
    if let Value::Object(map) = &mut entry {
        map.extend(promoted);
    }
    entry.to_string()
}

pub fn log_dataset_loaded(kind: DatasetKind, rows: usize, qualifying: usize, elapsed_ms: f64) {
    log(
        Level::Info,
        Domain::Load,
        "dataset_loaded",
        obj(&[
            ("dataset", v_str(kind.as_str())),
            ("rows", json!(rows)),
            ("qualifying", json!(qualifying)),
            ("elapsed_ms", v_num(elapsed_ms)),
        ]),
    );
}

pub fn log_load_failed(kind: DatasetKind, error: &str, attempts: u32) {
    log(
        Level::Error,
        Domain::Load,
        "dataset_failed",
        obj(&[
            ("dataset", v_str(kind.as_str())),
            ("error", v_str(error)),
            ("attempts", json!(attempts)),
        ]),
    );
}

pub fn log_retry(operation: &str, attempt: u32, max_attempts: u32, error: &str, delay_ms: u64) {
    log(
        Level::Warn,
        Domain::Load,
        "retry",
        obj(&[
            ("operation", v_str(operation)),
            ("attempt", json!(attempt)),
            ("max_attempts", json!(max_attempts)),
            ("error", v_str(error)),
            ("delay_ms", json!(delay_ms)),
        ]),
    );
}

/// `outcome` is one of `swapped`, `kept_previous`, `rejected_in_flight`.
pub fn log_refresh(outcome: &str, total_rows: usize, error: Option<&str>) {
    let level = if error.is_some() { Level::Warn } else { Level::Info };
    log(
        level,
        Domain::Refresh,
        "refresh",
        obj(&[
            ("outcome", v_str(outcome)),
            ("total_rows", json!(total_rows)),
            ("error", error.map(v_str).unwrap_or(Value::Null)),
        ]),
    );
}

pub fn obj(pairs: &[(&str, Value)]) -> Map<String, Value> {
    pairs
        .iter()
        .map(|(k, v)| ((*k).to_string(), v.clone()))
        .collect()
}

pub fn v_str(s: &str) -> Value {
    Value::String(s.to_string())
}

pub fn v_num(n: f64) -> Value {
    json!(n)
}

/// Emits a `profile` trace entry with elapsed time when dropped.
pub struct ProfileScope {
    label: &'static str,
    context: Map<String, Value>,
    started: Instant,
}

impl ProfileScope {
    pub fn new(label: &'static str) -> Self {
        Self::with_context(label, &[])
    }

    pub fn with_context(label: &'static str, fields: &[(&str, Value)]) -> Self {
        Self {
            label,
            context: obj(fields),
            started: Instant::now(),
        }
    }

    pub fn elapsed_ms(&self) -> f64 {
        self.started.elapsed().as_secs_f64() * 1000.0
    }
}

impl Drop for ProfileScope {
    fn drop(&mut self) {
        let mut fields = std::mem::take(&mut self.context);
        fields.insert("label".to_string(), v_str(self.label));
        fields.insert("elapsed_ms".to_string(), v_num(self.elapsed_ms()));
        log(Level::Trace, Domain::Profile, "profile", fields);
    }
}

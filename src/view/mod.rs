//! Display-ready view models built from a loaded snapshot.
//!
//! Builders only read the snapshot. A row is shown when its dataset's key
//! field is present; every other display field falls back to `"-"`.

pub mod chart;
pub mod search;

use serde::Serialize;

use crate::data::{Dataset, Record};
use crate::derive::{
    average_completion, average_of, change, classify_free_text_status, classify_priority,
    classify_status, parse_numeric, progress_percent, Change, Direction, Priority, Status,
    PLACEHOLDER,
};
use crate::logging::{log, obj, Domain, Level, ProfileScope};
use crate::state::DashboardData;
use chart::{Charts, CHECKPOINT_FIELDS};
use search::Searchable;

pub const NO_DATA: &str = "No data available";
pub const NOT_STARTED: &str = "Not Started";
pub const PHASES: [&str; 3] = ["1", "2", "3"];
pub const LAST_UPDATED_FORMAT: &str = "%b %-d, %Y, %I:%M %p";

fn cell(r: &Record, field: &str) -> String {
    r.get_or(field, PLACEHOLDER).to_string()
}

#[derive(Debug, Clone, Serialize)]
pub struct Table<T> {
    pub rows: Vec<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub empty_message: Option<String>,
}

impl<T> Table<T> {
    pub fn from_rows(rows: Vec<T>) -> Self {
        let empty_message = rows.is_empty().then(|| NO_DATA.to_string());
        Self { rows, empty_message }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

fn table<T>(ds: &Dataset, build: impl Fn(&Record) -> T) -> Table<T> {
    Table::from_rows(ds.qualifying().map(build).collect())
}

// =============================================================================
// Table rows
// =============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct Level1Row {
    pub metric: String,
    pub baseline: String,
    pub current: String,
    pub target: String,
    pub change: Change,
    pub status: Status,
}

pub fn level1_rows(ds: &Dataset) -> Table<Level1Row> {
    table(ds, |r| {
        let delta = change(r.get("baseline"), r.get("current"));
        Level1Row {
            metric: cell(r, "metric"),
            baseline: cell(r, "baseline"),
            current: cell(r, "current"),
            target: cell(r, "target"),
            change: delta,
            status: classify_status(&delta),
        }
    })
}

#[derive(Debug, Clone, Serialize)]
pub struct MetricCard {
    pub label: String,
    pub value: String,
    pub change: Change,
    pub direction: Direction,
}

pub fn dora_cards(ds: &Dataset) -> Table<MetricCard> {
    table(ds, |r| {
        let delta = change(r.get("baseline"), r.get("current"));
        MetricCard {
            label: cell(r, "metric"),
            value: cell(r, "current"),
            change: delta,
            direction: Direction::of(&delta),
        }
    })
}

#[derive(Debug, Clone, Serialize)]
pub struct MaturityRow {
    pub team: String,
    pub baseline: String,
    pub week2: String,
    pub week4: String,
    pub week6: String,
    pub week8: String,
    pub week10: String,
    pub target: String,
    pub progress: u8,
}

pub fn maturity_rows(ds: &Dataset, scale_max: f64) -> Table<MaturityRow> {
    table(ds, |r| MaturityRow {
        team: cell(r, "team"),
        baseline: cell(r, "baseline"),
        week2: cell(r, "week2"),
        week4: cell(r, "week4"),
        week6: cell(r, "week6"),
        week8: cell(r, "week8"),
        week10: cell(r, "week10"),
        target: cell(r, "target"),
        progress: progress_percent(r.get("baseline"), r.get("week10"), scale_max),
    })
}

#[derive(Debug, Clone, Serialize)]
pub struct ChangeMgmtRow {
    pub component: String,
    pub phase: String,
    pub status_label: String,
    pub status: Status,
    pub owner: String,
    /// Parsed `completion`, 0 when absent. Same value `phase_progress` averages.
    pub completion: f64,
    pub target_date: String,
}

pub fn change_mgmt_rows(ds: &Dataset) -> Table<ChangeMgmtRow> {
    table(ds, |r| ChangeMgmtRow {
        component: cell(r, "component"),
        phase: cell(r, "phase"),
        status_label: r.get_or("status", NOT_STARTED).to_string(),
        status: classify_free_text_status(r.get("status")),
        owner: cell(r, "owner"),
        completion: parse_numeric(r.get("completion")).unwrap_or(0.0),
        target_date: cell(r, "target_date"),
    })
}

#[derive(Debug, Clone, Serialize)]
pub struct AupRow {
    pub metric: String,
    pub category: String,
    pub baseline: String,
    pub week2: String,
    pub week4: String,
    pub week6: String,
    pub week8: String,
    pub week10: String,
    pub target: String,
}

pub fn aup_rows(ds: &Dataset) -> Table<AupRow> {
    table(ds, |r| AupRow {
        metric: cell(r, "metric"),
        category: cell(r, "category"),
        baseline: cell(r, "baseline"),
        week2: cell(r, "week2"),
        week4: cell(r, "week4"),
        week6: cell(r, "week6"),
        week8: cell(r, "week8"),
        week10: cell(r, "week10"),
        target: cell(r, "target"),
    })
}

#[derive(Debug, Clone, Serialize)]
pub struct BacklogRow {
    pub id: String,
    pub description: String,
    pub team: String,
    pub effort: String,
    pub impact: String,
    pub priority_label: String,
    pub priority: Priority,
    pub status_label: String,
    pub status: Status,
    pub owner: String,
}

pub fn backlog_rows(ds: &Dataset) -> Table<BacklogRow> {
    table(ds, |r| BacklogRow {
        id: cell(r, "id"),
        description: cell(r, "description"),
        team: cell(r, "team"),
        effort: cell(r, "effort"),
        impact: cell(r, "impact"),
        priority_label: cell(r, "priority"),
        priority: classify_priority(r.get("priority")),
        status_label: r.get_or("status", NOT_STARTED).to_string(),
        status: classify_free_text_status(r.get("status")),
        owner: cell(r, "owner"),
    })
}

#[derive(Debug, Clone, Serialize)]
pub struct WeeklyRow {
    pub week: String,
    pub date: String,
    pub focus: String,
    pub backlog_items: String,
    pub engineers_trained: String,
    pub achievements: String,
    pub blockers: String,
}

pub fn weekly_rows(ds: &Dataset) -> Table<WeeklyRow> {
    table(ds, |r| WeeklyRow {
        week: cell(r, "week"),
        date: cell(r, "date"),
        focus: cell(r, "focus"),
        backlog_items: cell(r, "backlog_items"),
        engineers_trained: cell(r, "engineers_trained"),
        achievements: cell(r, "achievements"),
        blockers: cell(r, "blockers"),
    })
}

impl Searchable for Level1Row {
    fn fields(&self) -> Vec<&str> {
        vec![
            self.metric.as_str(),
            self.baseline.as_str(),
            self.current.as_str(),
            self.target.as_str(),
            self.status.as_str(),
        ]
    }
}

impl Searchable for MaturityRow {
    fn fields(&self) -> Vec<&str> {
        [
            &self.team, &self.baseline, &self.week2, &self.week4, &self.week6, &self.week8,
            &self.week10, &self.target,
        ]
        .into_iter()
        .map(String::as_str)
        .collect()
    }
}

impl Searchable for ChangeMgmtRow {
    fn fields(&self) -> Vec<&str> {
        [&self.component, &self.phase, &self.status_label, &self.owner, &self.target_date]
            .into_iter()
            .map(String::as_str)
            .collect()
    }
}

impl Searchable for AupRow {
    fn fields(&self) -> Vec<&str> {
        [
            &self.metric, &self.category, &self.baseline, &self.week2, &self.week4, &self.week6,
            &self.week8, &self.week10, &self.target,
        ]
        .into_iter()
        .map(String::as_str)
        .collect()
    }
}

impl Searchable for BacklogRow {
    fn fields(&self) -> Vec<&str> {
        [
            &self.id,
            &self.description,
            &self.team,
            &self.effort,
            &self.impact,
            &self.priority_label,
            &self.status_label,
            &self.owner,
        ]
        .into_iter()
        .map(String::as_str)
        .collect()
    }
}

impl Searchable for WeeklyRow {
    fn fields(&self) -> Vec<&str> {
        [
            &self.week,
            &self.date,
            &self.focus,
            &self.backlog_items,
            &self.engineers_trained,
            &self.achievements,
            &self.blockers,
        ]
        .into_iter()
        .map(String::as_str)
        .collect()
    }
}

// =============================================================================
// Summary cards
// =============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct KpiCard {
    pub label: String,
    pub value: String,
    pub change: Change,
    pub direction: Direction,
    /// Whether the movement is good news. `None` when flat or unknown.
    pub favorable: Option<bool>,
}

impl KpiCard {
    fn new(label: &str, value: String, delta: Change, higher_is_better: bool) -> Self {
        let direction = Direction::of(&delta);
        let favorable = match direction {
            Direction::Up => Some(higher_is_better),
            Direction::Down => Some(!higher_is_better),
            Direction::Flat | Direction::Unknown => None,
        };
        Self {
            label: label.to_string(),
            value,
            change: delta,
            direction,
            favorable,
        }
    }
}

fn metric_kpi(ds: &Dataset, name: &str, higher_is_better: bool) -> KpiCard {
    match ds.find_by_key(name) {
        Some(r) => KpiCard::new(
            name,
            cell(r, "current"),
            change(r.get("baseline"), r.get("current")),
            higher_is_better,
        ),
        None => KpiCard::new(name, PLACEHOLDER.to_string(), Change::Unknown, higher_is_better),
    }
}

/// Latest filled checkpoint for an AUP metric, compared against its baseline.
fn aup_kpi(ds: &Dataset, name: &str) -> KpiCard {
    let Some(r) = ds.find_by_key(name) else {
        return KpiCard::new(name, PLACEHOLDER.to_string(), Change::Unknown, true);
    };
    let latest = CHECKPOINT_FIELDS[1..].iter().rev().find_map(|f| r.get(f));
    KpiCard::new(
        name,
        latest.unwrap_or(PLACEHOLDER).to_string(),
        change(r.get("baseline"), latest),
        true,
    )
}

pub fn average_maturity(data: &DashboardData) -> String {
    average_of(&data.maturity.records, "week10")
}

fn maturity_kpi(data: &DashboardData) -> KpiCard {
    let records = &data.maturity.records;
    let delta = if records.is_empty() {
        Change::Unknown
    } else {
        let baseline = average_of(records, "baseline");
        let latest = average_of(records, "week10");
        change(Some(baseline.as_str()), Some(latest.as_str()))
    };
    KpiCard::new("Automation Maturity Avg", average_maturity(data), delta, true)
}

/// Headline cards, looked up by metric name so row order does not matter.
pub fn kpi_cards(data: &DashboardData) -> Vec<KpiCard> {
    vec![
        metric_kpi(&data.dora_metrics, "Deployment Frequency", true),
        metric_kpi(&data.dora_metrics, "Change Failure Rate", false),
        maturity_kpi(data),
        aup_kpi(&data.aup_metrics, "Team Engagement"),
    ]
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PhaseProgress {
    pub phase: String,
    pub components: usize,
    pub completion: u32,
}

pub fn phase_progress(data: &DashboardData) -> Vec<PhaseProgress> {
    PHASES
        .iter()
        .map(|phase| {
            let rows: Vec<&Record> = data.change_mgmt.filter_eq("phase", phase).collect();
            PhaseProgress {
                phase: phase.to_string(),
                components: rows.len(),
                completion: average_completion(rows),
            }
        })
        .collect()
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BacklogStats {
    pub total: usize,
    pub quick_wins: usize,
    pub in_progress: usize,
    pub completed: usize,
}

pub fn backlog_stats(ds: &Dataset) -> BacklogStats {
    ds.qualifying().fold(BacklogStats::default(), |mut acc, r| {
        acc.total += 1;
        if classify_priority(r.get("priority")) == Priority::QuickWin {
            acc.quick_wins += 1;
        }
        match classify_free_text_status(r.get("status")) {
            Status::InProgress => acc.in_progress += 1,
            Status::Completed => acc.completed += 1,
            Status::NotStarted => {}
        }
        acc
    })
}

// =============================================================================
// Whole dashboard
// =============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct DashboardView {
    pub last_updated: String,
    pub loaded_at: String,
    pub kpis: Vec<KpiCard>,
    pub average_maturity: String,
    pub level1: Table<Level1Row>,
    pub dora: Table<MetricCard>,
    pub maturity: Table<MaturityRow>,
    pub change_mgmt: Table<ChangeMgmtRow>,
    pub aup: Table<AupRow>,
    pub backlog: Table<BacklogRow>,
    pub weekly: Table<WeeklyRow>,
    pub phase_progress: Vec<PhaseProgress>,
    pub backlog_stats: BacklogStats,
    pub charts: Charts,
}

impl DashboardView {
    pub fn build(data: &DashboardData, scale_max: f64) -> Self {
        let scope = ProfileScope::new("build_view");
        let view = Self {
            last_updated: data.loaded_at.format(LAST_UPDATED_FORMAT).to_string(),
            loaded_at: data
                .loaded_at
                .to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
            kpis: kpi_cards(data),
            average_maturity: average_maturity(data),
            level1: level1_rows(&data.level1_metrics),
            dora: dora_cards(&data.dora_metrics),
            maturity: maturity_rows(&data.maturity, scale_max),
            change_mgmt: change_mgmt_rows(&data.change_mgmt),
            aup: aup_rows(&data.aup_metrics),
            backlog: backlog_rows(&data.backlog),
            weekly: weekly_rows(&data.weekly),
            phase_progress: phase_progress(data),
            backlog_stats: backlog_stats(&data.backlog),
            charts: Charts::build(data, scale_max),
        };
        log(
            Level::Debug,
            Domain::View,
            "view_built",
            obj(&[
                ("source_rows", serde_json::json!(data.total_rows())),
                ("backlog_rows", serde_json::json!(view.backlog.len())),
                ("elapsed_ms", serde_json::json!(scope.elapsed_ms())),
            ]),
        );
        view
    }

    /// Headline numbers only, for lightweight consumers.
    pub fn summary(&self) -> serde_json::Value {
        serde_json::json!({
            "last_updated": self.last_updated,
            "kpis": self.kpis,
            "phase_progress": self.phase_progress,
            "backlog_stats": self.backlog_stats,
        })
    }
}

//! Chart configurations as plain values.
//!
//! Nothing here knows about a charting library; a renderer reads `ChartConfig`
//! and draws it however it likes.

use serde::Serialize;

use crate::data::{Dataset, Record};
use crate::derive::{average_of, parse_integer, parse_numeric};
use crate::state::DashboardData;

/// Columns of the maturity and AUP datasets in timeline order.
pub const CHECKPOINT_FIELDS: [&str; 6] = ["baseline", "week2", "week4", "week6", "week8", "week10"];
pub const CHECKPOINT_LABELS: [&str; 6] = ["Baseline", "Week 2", "Week 4", "Week 6", "Week 8", "Week 10"];
pub const OVERVIEW_LABELS: [&str; 6] = ["Week 0", "Week 2", "Week 4", "Week 6", "Week 8", "Week 10"];

const PALETTE: [(u8, u8, u8); 5] = [
    (31, 78, 120),
    (0, 163, 224),
    (112, 173, 71),
    (255, 193, 7),
    (192, 0, 0),
];

// palette slots used for baseline/current/target comparisons
const BASELINE: usize = 3;
const CURRENT: usize = 1;
const TARGET: usize = 2;
const BAR_ALPHA: f64 = 0.6;
const LINE_TENSION: f64 = 0.4;

pub fn color(index: usize, alpha: f64) -> String {
    let (r, g, b) = PALETTE[index % PALETTE.len()];
    format!("rgba({}, {}, {}, {})", r, g, b, alpha)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartKind {
    Line,
    Bar,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartDataset {
    pub label: String,
    pub data: Vec<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub border_color: Option<String>,
    pub background_color: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tension: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartOptions {
    pub legend_position: String,
    pub begin_at_zero: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub y_max: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub y_step: Option<f64>,
}

impl Default for ChartOptions {
    fn default() -> Self {
        Self {
            legend_position: "bottom".to_string(),
            begin_at_zero: false,
            y_max: None,
            y_step: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartConfig {
    pub id: String,
    pub kind: ChartKind,
    pub labels: Vec<String>,
    pub datasets: Vec<ChartDataset>,
    pub options: ChartOptions,
}

impl ChartConfig {
    pub fn dataset(&self, label: &str) -> Option<&ChartDataset> {
        self.datasets.iter().find(|d| d.label == label)
    }
}

fn numeric(r: &Record, field: &str) -> f64 {
    parse_numeric(r.get(field)).unwrap_or(0.0)
}

fn bar(label: &str, data: Vec<f64>, palette_slot: usize) -> ChartDataset {
    ChartDataset {
        label: label.to_string(),
        data,
        border_color: None,
        background_color: color(palette_slot, BAR_ALPHA),
        tension: None,
    }
}

fn line(label: &str, data: Vec<f64>, palette_slot: usize) -> ChartDataset {
    ChartDataset {
        label: label.to_string(),
        data,
        border_color: Some(color(palette_slot, 1.0)),
        background_color: color(palette_slot, 0.1),
        tension: Some(LINE_TENSION),
    }
}

/// Grouped bars over qualifying rows. Labels and values come from the same rows.
fn comparison_bars(id: &str, ds: &Dataset, series: &[(&str, &str, usize)]) -> ChartConfig {
    let rows: Vec<&Record> = ds.qualifying().collect();
    let key = ds.kind.key_field();
    ChartConfig {
        id: id.to_string(),
        kind: ChartKind::Bar,
        labels: rows.iter().map(|r| r.get_or(key, "").to_string()).collect(),
        datasets: series
            .iter()
            .map(|(label, field, slot)| bar(label, rows.iter().map(|r| numeric(r, field)).collect(), *slot))
            .collect(),
        options: ChartOptions::default(),
    }
}

pub fn dora_chart(data: &DashboardData) -> ChartConfig {
    comparison_bars(
        "dora",
        &data.dora_metrics,
        &[
            ("Baseline", "baseline", BASELINE),
            ("Current", "current", CURRENT),
            ("Target", "target", TARGET),
        ],
    )
}

pub fn maturity_chart(data: &DashboardData, scale_max: f64) -> ChartConfig {
    let mut chart = comparison_bars(
        "maturity",
        &data.maturity,
        &[
            ("Baseline", "baseline", BASELINE),
            ("Week 10", "week10", CURRENT),
            ("Target", "target", TARGET),
        ],
    );
    chart.options.begin_at_zero = true;
    chart.options.y_max = Some(scale_max);
    chart.options.y_step = Some(1.0);
    chart
}

/// One line per AUP metric in `category`, across the checkpoint columns.
pub fn category_chart(data: &DashboardData, category: &str) -> ChartConfig {
    let datasets = data
        .aup_metrics
        .qualifying()
        .filter(|r| {
            r.get("category")
                .map(|c| c.eq_ignore_ascii_case(category))
                .unwrap_or(false)
        })
        .enumerate()
        .map(|(idx, r)| {
            let series = CHECKPOINT_FIELDS.iter().map(|f| numeric(r, f)).collect();
            line(r.get_or("metric", ""), series, idx)
        })
        .collect();
    ChartConfig {
        id: category.to_lowercase(),
        kind: ChartKind::Line,
        labels: CHECKPOINT_LABELS.iter().map(|s| s.to_string()).collect(),
        datasets,
        options: ChartOptions::default(),
    }
}

pub fn weekly_chart(data: &DashboardData) -> ChartConfig {
    let rows: Vec<&Record> = data.weekly.qualifying().collect();
    let counts = |field: &str| -> Vec<f64> {
        rows.iter()
            .map(|r| parse_integer(r.get(field)).unwrap_or(0) as f64)
            .collect()
    };
    ChartConfig {
        id: "weekly".to_string(),
        kind: ChartKind::Bar,
        labels: rows.iter().map(|r| r.get_or("week", "").to_string()).collect(),
        datasets: vec![
            bar("Backlog Items Added", counts("backlog_items"), 0),
            bar("Engineers Trained", counts("engineers_trained"), 1),
        ],
        options: ChartOptions::default(),
    }
}

/// Average team maturity per checkpoint, plus team engagement when the AUP
/// dataset tracks it.
pub fn overview_chart(data: &DashboardData) -> ChartConfig {
    let maturity: Vec<f64> = CHECKPOINT_FIELDS
        .iter()
        .map(|f| {
            let avg = average_of(&data.maturity.records, f);
            parse_numeric(Some(avg.as_str())).unwrap_or(0.0)
        })
        .collect();
    let mut datasets = vec![line("Automation Maturity", maturity, 0)];
    if let Some(engagement) = data.aup_metrics.find_by_key("Team Engagement") {
        let series = CHECKPOINT_FIELDS.iter().map(|f| numeric(engagement, f)).collect();
        datasets.push(line("Team Engagement", series, 1));
    }
    ChartConfig {
        id: "overview".to_string(),
        kind: ChartKind::Line,
        labels: OVERVIEW_LABELS.iter().map(|s| s.to_string()).collect(),
        datasets,
        options: ChartOptions {
            begin_at_zero: true,
            ..Default::default()
        },
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Charts {
    pub overview: ChartConfig,
    pub dora: ChartConfig,
    pub maturity: ChartConfig,
    pub adoption: ChartConfig,
    pub utilization: ChartConfig,
    pub proficiency: ChartConfig,
    pub weekly: ChartConfig,
}

impl Charts {
    pub fn build(data: &DashboardData, scale_max: f64) -> Self {
        Self {
            overview: overview_chart(data),
            dora: dora_chart(data),
            maturity: maturity_chart(data, scale_max),
            adoption: category_chart(data, "Adoption"),
            utilization: category_chart(data, "Utilization"),
            proficiency: category_chart(data, "Proficiency"),
            weekly: weekly_chart(data),
        }
    }
}

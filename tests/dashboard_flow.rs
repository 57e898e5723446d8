//! End-to-end: CSV files on disk through loading, derivation and view models.

use rolloutboard::data::DatasetKind;
use rolloutboard::derive::{Direction, Priority, Status};
use rolloutboard::error::LoadError;
use rolloutboard::loader::retry::RetryConfig;
use rolloutboard::loader::{load_all, FileSource, LoadPolicy};
use rolloutboard::refresh::Dashboard;
use rolloutboard::view::chart::ChartKind;
use rolloutboard::view::search::{filter_backlog, search_rows, BacklogFilter};
use rolloutboard::view::DashboardView;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

const DORA: &str = "\
metric,baseline,current,target
Lead Time,10,6,2
Change Failure Rate,15%,9%,5%
Deployment Frequency,2,5,10
,1,1,1
";

const MATURITY: &str = "\
team,baseline,week2,week4,week6,week8,week10,target
Alpha,1.0,1.4,2.0,2.4,2.8,3.0,5.0
Beta,2.0,2.2,2.6,3.0,3.4,3.6,5.0
";

const CHANGE_MGMT: &str = "\
component,phase,status,owner,completion,target_date
Executive sponsorship,1,Completed,Dana,100,2026-01-15
Training plan,1,In Progress,Lee,50,2026-02-01
Champions network,2,,Sam,,2026-03-01
";

const AUP: &str = "\
metric,category,baseline,week2,week4,week6,week8,week10,target
Active Users,Adoption,10,15,22,30,36,40,60
Pipelines Migrated,Utilization,0,2,4,7,9,12,20
Team Engagement,Proficiency,65,70,78,82,85,87,90
";

const BACKLOG: &str = "\
id,description,team,effort,impact,priority,status,owner
B-1,\"Cache build deps, per branch\",Core,S,High,Quick Win,Completed,Ana
B-2,Self-service environments,Platform,L,High,Strategic,In Progress,Raj
B-3,Flaky test triage,Core,S,Medium,Quick Win,In Progress,Ana
B-4,Release notes bot,Tools,M,Low,Nice to have,,Kim
B-5,Secrets rotation,Security,M,High,Quick Win,Not Started,Lee
,orphan,,,,,,
";

const WEEKLY: &str = "\
week,date,focus,backlog_items,engineers_trained,achievements,blockers
1,2026-01-05,Kickoff,4,3,Baseline captured,
2,2026-01-12,Pipelines,6,8,First migration,Runner capacity
";

const LEVEL1: &str = "\
metric,baseline,current,target
Developer NPS,12,25,40
Escaped Defects,34,30,10
Cost per Deploy,n/a,120,80
";

fn write_all(dir: &Path) {
    for (kind, text) in [
        (DatasetKind::DoraMetrics, DORA),
        (DatasetKind::Maturity, MATURITY),
        (DatasetKind::ChangeMgmt, CHANGE_MGMT),
        (DatasetKind::AupMetrics, AUP),
        (DatasetKind::Backlog, BACKLOG),
        (DatasetKind::Weekly, WEEKLY),
        (DatasetKind::Level1Metrics, LEVEL1),
    ] {
        fs::write(dir.join(kind.file_name()), text).unwrap();
    }
}

fn quick_policy() -> LoadPolicy {
    LoadPolicy {
        retry: RetryConfig::no_retry(),
        ..Default::default()
    }
}

async fn build_view(dir: &Path) -> DashboardView {
    let data = load_all(&FileSource::new(dir), &quick_policy()).await.unwrap();
    DashboardView::build(&data, 5.0)
}

#[tokio::test]
async fn rows_without_key_are_dropped() {
    let dir = TempDir::new().unwrap();
    write_all(dir.path());
    let data = load_all(&FileSource::new(dir.path()), &quick_policy()).await.unwrap();
    assert_eq!(data.dora_metrics.len(), 4);
    assert_eq!(data.backlog.len(), 6);

    let view = DashboardView::build(&data, 5.0);
    assert_eq!(view.dora.len(), 3);
    assert_eq!(view.backlog.len(), 5);
    assert_eq!(view.weekly.len(), 2);
    assert_eq!(view.level1.len(), 3);
    assert_eq!(view.charts.dora.labels.len(), 3);
}

#[tokio::test]
async fn derived_metrics_flow_into_rows() {
    let dir = TempDir::new().unwrap();
    write_all(dir.path());
    let view = build_view(dir.path()).await;

    let alpha = &view.maturity.rows[0];
    assert_eq!(alpha.team, "Alpha");
    assert_eq!(alpha.progress, 50);

    let level1 = &view.level1.rows;
    assert_eq!(level1[0].change.to_string(), "+13.0");
    assert_eq!(level1[0].status, Status::Completed);
    assert_eq!(level1[1].status, Status::NotStarted);
    assert_eq!(level1[2].change.to_string(), "-");
    assert_eq!(level1[2].status, Status::InProgress);

    let champions = &view.change_mgmt.rows[2];
    assert_eq!(champions.status_label, "Not Started");
    assert_eq!(champions.completion, 0.0);

    assert_eq!(view.backlog.rows[0].description, "Cache build deps, per branch");
    assert_eq!(view.backlog.rows[1].priority, Priority::Strategic);
    assert_eq!(view.backlog.rows[3].status_label, "Not Started");
}

#[tokio::test]
async fn summaries_match_source_data() {
    let dir = TempDir::new().unwrap();
    write_all(dir.path());
    let view = build_view(dir.path()).await;

    assert_eq!(view.phase_progress[0].completion, 75);
    assert_eq!(view.phase_progress[1].completion, 0);
    assert_eq!(view.phase_progress[2].components, 0);

    let stats = &view.backlog_stats;
    assert_eq!(stats.total, 5);
    assert_eq!(stats.quick_wins, 3);
    assert_eq!(stats.in_progress, 2);
    assert_eq!(stats.completed, 1);

    assert_eq!(view.average_maturity, "3.3");
    let labels: Vec<&str> = view.kpis.iter().map(|k| k.label.as_str()).collect();
    assert_eq!(
        labels,
        vec!["Deployment Frequency", "Change Failure Rate", "Automation Maturity Avg", "Team Engagement"]
    );
    assert_eq!(view.kpis[0].value, "5");
    assert_eq!(view.kpis[1].direction, Direction::Down);
    assert_eq!(view.kpis[1].favorable, Some(true));
    assert_eq!(view.kpis[3].value, "87");
}

#[tokio::test]
async fn charts_are_built_from_datasets() {
    let dir = TempDir::new().unwrap();
    write_all(dir.path());
    let view = build_view(dir.path()).await;
    let charts = &view.charts;

    assert_eq!(charts.adoption.kind, ChartKind::Line);
    assert_eq!(charts.adoption.datasets.len(), 1);
    assert_eq!(charts.adoption.datasets[0].data, vec![10.0, 15.0, 22.0, 30.0, 36.0, 40.0]);
    assert_eq!(charts.utilization.datasets[0].label, "Pipelines Migrated");
    assert_eq!(charts.proficiency.datasets.len(), 1);
    assert_eq!(charts.weekly.dataset("Engineers Trained").unwrap().data, vec![3.0, 8.0]);
    assert_eq!(charts.maturity.options.y_max, Some(5.0));
    assert_eq!(charts.overview.datasets.len(), 2);
    assert_eq!(charts.overview.datasets[1].data[5], 87.0);

    let json = serde_json::to_value(&view).unwrap();
    assert_eq!(json["charts"]["dora"]["kind"], "bar");
    assert_eq!(json["level1"]["rows"][0]["status"], "completed");
    assert_eq!(json["backlog"]["rows"][0]["priority"], "quick-win");
}

#[tokio::test]
async fn search_and_filter_over_view_rows() {
    let dir = TempDir::new().unwrap();
    write_all(dir.path());
    let view = build_view(dir.path()).await;

    let filter = BacklogFilter {
        search: "core".into(),
        priority: "Quick".into(),
        status: "progress".into(),
    };
    let hits = filter_backlog(&view.backlog.rows, &filter);
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].id, "B-3");

    assert_eq!(search_rows(&view.weekly.rows, "runner").len(), 1);
    assert_eq!(search_rows(&view.change_mgmt.rows, "").len(), 3);
}

#[tokio::test]
async fn missing_file_fails_the_whole_load() {
    let dir = TempDir::new().unwrap();
    write_all(dir.path());
    fs::remove_file(dir.path().join("weekly.csv")).unwrap();

    let err = load_all(&FileSource::new(dir.path()), &quick_policy())
        .await
        .unwrap_err();
    assert!(matches!(err, LoadError::Io { .. }));
    assert_eq!(err.dataset(), "weekly");
}

#[tokio::test]
async fn dashboard_keeps_last_good_view_after_breakage() {
    let dir = TempDir::new().unwrap();
    write_all(dir.path());
    let dash = Dashboard::new(Box::new(FileSource::new(dir.path())), quick_policy(), 5.0);
    dash.refresh().await.unwrap();

    fs::write(dir.path().join("backlog.csv"), "id,description\nB-9,\"never closed\n").unwrap();
    let err = dash.refresh().await.unwrap_err();
    assert!(err.to_string().contains("PARSE_FAILED backlog"));

    let view = dash.view().unwrap();
    assert_eq!(view.backlog_stats.total, 5);
}

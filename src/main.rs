use anyhow::{anyhow, Result};
use rolloutboard::loader::{source_from_config, LoadPolicy};
use rolloutboard::logging::{log, obj, v_str, Domain, Level};
use rolloutboard::refresh::Dashboard;
use rolloutboard::state::Config;
use rolloutboard::view::search::{filter_backlog, BacklogFilter};

fn usage() -> &'static str {
    "usage: rolloutboard [full|summary|backlog [search] [priority] [status]]"
}

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let mode = args.first().map(String::as_str).unwrap_or("full");
    if !matches!(mode, "full" | "summary" | "backlog") {
        eprintln!("{}", usage());
        std::process::exit(2);
    }

    let cfg = Config::from_env();
    let source = source_from_config(&cfg)?;
    log(
        Level::Info,
        Domain::System,
        "startup",
        obj(&[("source", v_str(&source.describe())), ("mode", v_str(mode))]),
    );

    let dashboard = Dashboard::new(source, LoadPolicy::from_config(&cfg), cfg.maturity_scale_max);
    if let Err(err) = dashboard.refresh().await {
        eprintln!("Failed to load dashboard data. Please check your CSV files. ({})", err);
        std::process::exit(1);
    }
    let view = dashboard
        .view()
        .ok_or_else(|| anyhow!("no snapshot after successful refresh"))?;

    let out = match mode {
        "summary" => serde_json::to_string_pretty(&view.summary())?,
        "backlog" => {
            let arg = |i: usize| args.get(i).cloned().unwrap_or_default();
            let filter = BacklogFilter {
                search: arg(1),
                priority: arg(2),
                status: arg(3),
            };
            serde_json::to_string_pretty(&filter_backlog(&view.backlog.rows, &filter))?
        }
        _ => serde_json::to_string_pretty(&view)?,
    };
    println!("{}", out);
    Ok(())
}

use rolloutboard::data::{analyze_dataset, default_manifest_path, DatasetKind};
use rolloutboard::state::now_ts;
use std::env;
use std::fs;
use std::path::PathBuf;

fn main() {
    let dir = env::args()
        .nth(1)
        .or_else(|| env::var("DASHBOARD_DATA_DIR").ok())
        .unwrap_or_else(|| "data".to_string());
    let now = now_ts();
    let mut failures = 0;

    for kind in DatasetKind::ALL {
        let path = PathBuf::from(&dir).join(kind.file_name());
        if !path.exists() {
            eprintln!("missing {}", path.display());
            failures += 1;
            continue;
        }
        let manifest = match analyze_dataset(&path, kind, now) {
            Ok(m) => m,
            Err(err) => {
                eprintln!("analysis failed: {}", err);
                failures += 1;
                continue;
            }
        };
        if !manifest.warnings.is_empty() {
            eprintln!("{} warnings: {:?}", kind, manifest.warnings);
        }

        let out_path = default_manifest_path(&path);
        let payload = match serde_json::to_string_pretty(&manifest) {
            Ok(p) => p,
            Err(err) => {
                eprintln!("failed to encode manifest for {}: {}", kind, err);
                failures += 1;
                continue;
            }
        };
        if let Err(err) = fs::write(&out_path, payload) {
            eprintln!("failed to write {}: {}", out_path.display(), err);
            failures += 1;
            continue;
        }
        println!(
            "wrote manifest {} rows={} shown={}",
            out_path.display(),
            manifest.row_count,
            manifest.qualifying_rows
        );
    }

    if failures > 0 {
        std::process::exit(2);
    }
}

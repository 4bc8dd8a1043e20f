use std::env;
use std::fs;
use std::hint::black_box;
use std::path::PathBuf;
use std::time::Instant;

use weave_core::{Atom, AtomId, SiteId, StateStore, VersionVector};

#[derive(serde::Serialize)]
#[serde(rename_all = "camelCase")]
struct Output {
    implementation: &'static str,
    storage: &'static str,
    workload: String,
    timestamp: String,
    name: String,
    total_ops: u64,
    duration_ms: f64,
    ops_per_sec: f64,
    extra: Extra,
    source_file: Option<String>,
}

#[derive(serde::Serialize)]
#[serde(rename_all = "camelCase")]
struct Extra {
    count: u64,
    sites: u32,
}

const SITES: u32 = 4;

/// Each site types `count / SITES` characters as a chain under a shared root, then every site's
/// chain is merged into a fresh replica in reverse delivery order.
fn run(count: u64) -> Result<u64, weave_core::Error> {
    let root = AtomId::new(SiteId(0), 0);
    let mut writers: Vec<StateStore<u64>> = (1..=SITES).map(|s| StateStore::new(SiteId(s))).collect();
    for writer in &mut writers {
        writer.apply_remote(vec![Atom::root(root, 0)]);
        let mut last = root;
        for i in 0..count / SITES as u64 {
            last = writer.mint(Some(last), i)?.atom().id;
        }
    }

    let mut reader: StateStore<u64> = StateStore::new(SiteId(SITES + 1));
    let mut ops = 0;
    for writer in writers.iter().rev() {
        for batch in writer.export_delta(reader.vector()) {
            ops += reader.apply_remote(batch.added).added.len() as u64;
        }
    }
    black_box(reader.export_delta(&VersionVector::new()));
    Ok(ops)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut count: u64 = 1_000;
    let mut out_file: Option<PathBuf> = None;
    for arg in env::args().skip(1) {
        if let Some(val) = arg.strip_prefix("--count=") {
            count = val.parse().unwrap_or(count);
        } else if let Some(val) = arg.strip_prefix("--out=") {
            out_file = Some(PathBuf::from(val));
        }
    }

    let start = Instant::now();
    let total_ops = run(count)?;
    let duration_ms = start.elapsed().as_secs_f64() * 1000.0;

    let workload = format!("type-merge-{}", count);
    let output = Output {
        implementation: "weave-core",
        storage: "memory",
        workload: workload.clone(),
        timestamp: chrono::Utc::now().to_rfc3339(),
        name: workload,
        total_ops,
        duration_ms,
        ops_per_sec: if duration_ms > 0.0 {
            total_ops as f64 / duration_ms * 1000.0
        } else {
            f64::INFINITY
        },
        extra: Extra {
            count,
            sites: SITES,
        },
        source_file: out_file.as_ref().map(|p| p.display().to_string()),
    };

    let json = serde_json::to_string_pretty(&output)?;
    if let Some(path) = out_file {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, &json)?;
    }
    println!("{}", json);
    Ok(())
}

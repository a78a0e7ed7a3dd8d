//! Dashboard runner binary
//!
//! Loads a dashboard file, dispatches every panel together, renders each
//! settled panel and exports the successful ones.
//!
//! Run with: `cargo run --bin analysis-runner -- dashboard.json`
//!
//! A dashboard file is a JSON list of panels:
//!
//! ```json
//! [{"label": "Poverty by province", "dataset_id": "survey",
//!   "config": {"kind": "grouped-stats", "group_column": "province",
//!              "value_column": "poverty", "aggregation": "mean"},
//!   "required": true}]
//! ```
//!
//! A `required` panel that comes back without rows fails the run.

use analysis_studio::{
    render_outcome, to_chart_data, AnalysisConfig, AnalysisDispatcher, AnalysisError, AnalysisRequest,
    DatasetId, ExportEncoder, ExportFormat, HistoryCache, HistoryEntry, HttpTransport, ServiceConfig,
    SqliteHistoryStore, VisualizationSpec,
};
use chrono::Utc;
use serde::Deserialize;
use std::path::PathBuf;
use tracing::warn;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Deserialize)]
struct DashboardPanel {
    label: String,
    dataset_id: DatasetId,
    config: AnalysisConfig,
    #[serde(default)]
    required: bool,
}

fn chart_family(spec: &VisualizationSpec) -> &'static str {
    match spec {
        VisualizationSpec::Bar(_) => "bar",
        VisualizationSpec::Pie(_) => "pie",
        VisualizationSpec::Table(_) => "table",
        VisualizationSpec::NoData { .. } => "no data",
        VisualizationSpec::Error { .. } => "error",
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Set RUST_LOG to control log level, e.g. RUST_LOG=analysis_studio=debug
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .compact()
        .init();

    let dashboard_path = match std::env::args().nth(1) {
        Some(path) => PathBuf::from(path),
        None => {
            eprintln!("Usage: analysis-runner <dashboard.json>");
            std::process::exit(2);
        }
    };

    // Configuration from environment variables or defaults
    let defaults = ServiceConfig::default();
    let base_url = std::env::var("ANALYSIS_BASE_URL").unwrap_or(defaults.base_url);
    let timeout_seconds = std::env::var("ANALYSIS_TIMEOUT")
        .ok()
        .and_then(|value| value.parse::<u64>().ok())
        .unwrap_or(defaults.timeout_seconds);
    let history_path = std::env::var("HISTORY_DB").unwrap_or(defaults.history_path);
    let export_dir = PathBuf::from(std::env::var("EXPORT_DIR").unwrap_or_else(|_| ".".to_string()));
    let config = ServiceConfig::new(base_url, timeout_seconds, history_path);

    println!("Analysis runner");
    println!("   Service: {}", config.base_url);
    println!("   Timeout: {}s", config.timeout_seconds);
    println!("   History: {}", config.history_path);
    println!("   Exports: {}", export_dir.display());
    println!();

    let panels: Vec<DashboardPanel> = serde_json::from_str(&std::fs::read_to_string(&dashboard_path)?)?;

    // History is best effort: without a store the dashboard still loads.
    let history = match SqliteHistoryStore::new(&config.history_path) {
        Ok(store) => Some(HistoryCache::new(store)),
        Err(error) => {
            warn!(path = %config.history_path, %error, "history disabled");
            None
        }
    };

    let dispatcher = AnalysisDispatcher::new(HttpTransport::new(config)?);
    let requests = panels
        .iter()
        .map(|panel| {
            let request = AnalysisRequest::new(panel.label.clone(), panel.config.clone(), panel.dataset_id.clone());
            if panel.required {
                request.required()
            } else {
                request
            }
        })
        .collect();
    let outcome = dispatcher.dispatch_batch(requests).await;

    let encoder = ExportEncoder::default();
    let mut pending_writes = Vec::new();
    for (index, (panel, entry)) in panels.iter().zip(&outcome.entries).enumerate() {
        let chart = match &entry.outcome {
            Ok(result) => to_chart_data(&panel.config, result)
                .map_err(|e| AnalysisError::server(e.to_string())),
            Err(error) => Err(error.clone()),
        };
        let spec = render_outcome(entry.kind, &chart);
        println!("[{}] {}: {}", entry.kind, panel.label, chart_family(&spec));

        let rows = match chart {
            Ok(rows) => rows,
            Err(error) => {
                println!("      {}", error);
                continue;
            }
        };

        if let Some(history) = &history {
            let record = HistoryEntry::new(panel.label.clone(), panel.config.clone(), panel.dataset_id.clone())
                .with_summary(format!("{} rows", rows.len()));
            pending_writes.push(history.record(record));
        }

        match encoder.encode(&rows, ExportFormat::Csv) {
            Ok(file) => {
                let path = export_dir.join(format!("{:02}_{}", index + 1, file.file_name(Utc::now())));
                std::fs::write(&path, &file.content)?;
                println!("      exported {}", path.display());
            }
            Err(error) => println!("      {}", error),
        }
    }

    // Flush background history writes before exiting.
    futures::future::join_all(pending_writes).await;

    println!();
    if outcome.is_failed() {
        println!(
            "Dashboard load failed: {} of {} panels failed",
            outcome.failure_count(),
            outcome.entries.len()
        );
        for (label, error) in outcome.failures() {
            println!("  {}: {}", label, error);
        }
        std::process::exit(1);
    }
    println!("Dashboard ready: {} panels", outcome.success_count());

    Ok(())
}

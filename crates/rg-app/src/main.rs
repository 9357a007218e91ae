//! Headless report grid session
//!
//! Usage: `report-grid [config.json]`. Runs a scripted session against the
//! in-memory settings store and record models and logs what the host would see.

use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use rg_core::events::events::{ReportChange, SelectionChange, ViewChange};
use rg_core::settings::{Aggregate, AggregateFunction, Direction, Filter, FilterOperator, Nulls};
use rg_core::sync::{DownloadFormat, InMemorySettingsStore};
use rg_core::{EventBus, GridConfig, Record, ViewSettings};
use rg_data::{MemoryModelStore, Model};
use rg_views::{Hosts, MutationOptions, Outcome, ViewCoordinator};
use serde_json::json;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

mod console;
mod demo;

use console::ConsoleHost;

fn load_config() -> Result<GridConfig> {
    match std::env::args().nth(1) {
        Some(path) => {
            info!("Loading region configuration from {}", path);
            Ok(GridConfig::from_path(&path)?)
        }
        None => demo::default_config(),
    }
}

fn subscribe(events: &EventBus) {
    events.on::<ViewChange, _>(|event| {
        info!("View changed to {} (created: {})", event.view, event.created);
    });
    events.on::<ReportChange, _>(|event| {
        info!("Report changed to {} ({})", event.report_id, event.report_name);
    });
    events.on::<SelectionChange, _>(|event| {
        let ids: Vec<String> = event.selected_records.iter().map(|r| r.id.to_string()).collect();
        info!("Selection: [{}]", ids.join(", "));
    });
}

async fn run(config: GridConfig) -> Result<()> {
    let settings = Arc::new(InMemorySettingsStore::new());
    settings.insert_report(demo::primary_report());
    settings.insert_report(demo::managers_report());
    settings.set_filter_values("JOB", vec!["CLERK".into(), "MANAGER".into(), "SALESMAN".into()]);

    let models = Arc::new(MemoryModelStore::new());
    models.set_rows(&config.region_id, demo::employees());

    let host = Arc::new(ConsoleHost::new(true));
    let events = Arc::new(EventBus::new());
    subscribe(&events);

    let hosts = Hosts {
        transport: settings.clone(),
        models: models.clone(),
        dialogs: host.clone(),
        actions: host.clone(),
        events,
    };
    let mut grid =
        ViewCoordinator::start(config, demo::registry()?, hosts, demo::primary_report()).await?;

    let jobs = grid.filter_values("JOB", 10).await?;
    info!("JOB values: {}", jobs.join(", "));

    grid.add_filter(
        Filter::column("JOB", FilterOperator::Eq, Some("MANAGER".into())),
        MutationOptions::default(),
    )
    .await?;
    grid.add_aggregate(
        Aggregate::new(AggregateFunction::Sum, "SAL"),
        MutationOptions::default(),
    )
    .await?;
    grid.set_sort("SAL", Direction::Desc, Nulls::Last, MutationOptions::default())
        .await?;
    grid.set_column_width("ENAME", 180, MutationOptions::local())
        .await?;
    grid.set_rows_per_page(10, MutationOptions::default()).await?;

    if grid.switch_view("chart").await? == Outcome::AwaitingConfiguration {
        if let Some(view) = host.take_pending_setup() {
            let chart = ViewSettings {
                chart: Some(json!({"type": "bar", "label": "ENAME", "value": "SAL"})),
                ..ViewSettings::default()
            };
            grid.complete_view_configuration(&view, chart).await?;
        }
    }
    let link = grid.download(DownloadFormat::Csv).await?;
    info!("Download ready at {}", link["url"]);

    grid.switch_view("single_row").await?;
    grid.switch_report("EMP_MANAGERS").await?;
    info!("Selected records: {}", grid.selected_records().len());

    let document = grid.settings_document();
    info!("Final settings:\n{}", serde_json::to_string_pretty(&document)?);
    info!("Requests sent to the settings store: {}", settings.requests().len());

    grid.shutdown();

    run_detail(settings, models, host).await
}

/// Detail region following a selection in a department region
async fn run_detail(
    settings: Arc<InMemorySettingsStore>,
    models: Arc<MemoryModelStore>,
    host: Arc<ConsoleHost>,
) -> Result<()> {
    let mut config = GridConfig::new("emp_by_dept");
    config.master_region_id = Some("dept".into());
    config.default_view = "detail".into();
    models.set_rows(&config.region_id, demo::employees());

    let events = Arc::new(EventBus::new());
    subscribe(&events);
    let hosts = Hosts {
        transport: settings,
        models,
        dialogs: host.clone(),
        actions: host,
        events,
    };
    let mut detail =
        ViewCoordinator::start(config, demo::detail_registry()?, hosts, demo::managers_report())
            .await?;

    // Rapid clicks in the master settle into a single rebind
    let now = Instant::now();
    detail.on_master_selection(vec![Record::new("10").with_field("DEPTNO", 10)], now)?;
    detail.on_master_selection(vec![Record::new("20").with_field("DEPTNO", 20)], now)?;
    if detail.settle_detail().await? {
        for view in detail.models().bound_views() {
            if let Some(model) = detail.models().model_for(&view) {
                info!("Detail model {} holds {} records", model.key(), model.records().len());
            }
        }
    }

    detail.shutdown();
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("Starting report grid session");

    let config = load_config()?;
    if let Err(e) = run(config).await {
        error!("Session failed: {:#}", e);
        return Err(e);
    }
    Ok(())
}

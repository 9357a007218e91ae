//! In-process settings store
//!
//! Plays the server's part for the demo binary and tests: every request goes
//! through its JSON wire form, inserts receive ids and the canonical document
//! comes back with all change tags cleared.

use std::collections::VecDeque;

use ahash::AHashMap;
use anyhow::{anyhow, bail, Context};
use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use serde_json::{json, Value};
use tracing::debug;

use super::transport::{SettingsTransport, SyncRequest};
use crate::settings::{Change, ColumnSetting, SettingItem, SettingsDocument, ViewSettings};

pub struct InMemorySettingsStore {
    reports: RwLock<AHashMap<String, SettingsDocument>>,
    /// Saved definitions restored by a reset
    originals: RwLock<AHashMap<String, SettingsDocument>>,
    filter_values: RwLock<AHashMap<String, Vec<String>>>,
    requests: RwLock<Vec<Value>>,
    failures: Mutex<VecDeque<String>>,
    counters: Mutex<AHashMap<&'static str, u64>>,
}

impl InMemorySettingsStore {
    pub fn new() -> Self {
        Self {
            reports: RwLock::new(AHashMap::new()),
            originals: RwLock::new(AHashMap::new()),
            filter_values: RwLock::new(AHashMap::new()),
            requests: RwLock::new(Vec::new()),
            failures: Mutex::new(VecDeque::new()),
            counters: Mutex::new(AHashMap::new()),
        }
    }

    /// Store a report as saved on the server
    pub fn insert_report(&self, document: SettingsDocument) {
        self.originals
            .write()
            .insert(document.id.clone(), document.clone());
        self.reports.write().insert(document.id.clone(), document);
    }

    pub fn report(&self, id: &str) -> Option<SettingsDocument> {
        self.reports.read().get(id).cloned()
    }

    pub fn set_filter_values(&self, column_id: &str, values: Vec<String>) {
        self.filter_values
            .write()
            .insert(column_id.to_string(), values);
    }

    /// Make the next call fail with `message`
    pub fn fail_next(&self, message: impl Into<String>) {
        self.failures.lock().push_back(message.into());
    }

    /// Wire form of every request received so far
    pub fn requests(&self) -> Vec<Value> {
        self.requests.read().clone()
    }

    pub fn last_request(&self) -> Option<Value> {
        self.requests.read().last().cloned()
    }

    fn next_id(&self, prefix: &'static str) -> String {
        let mut counters = self.counters.lock();
        let counter = counters.entry(prefix).or_insert(0);
        *counter += 1;
        format!("{}{}", prefix, counter)
    }

    fn merge_items<T>(
        &self,
        stored: &mut Vec<SettingItem<T>>,
        incoming: Vec<SettingItem<T>>,
        prefix: &'static str,
    ) -> anyhow::Result<()> {
        for mut item in incoming {
            match item.operation {
                Change::Unchanged => {}
                Change::Inserted => {
                    item.id = Some(self.next_id(prefix));
                    item.operation = Change::Unchanged;
                    stored.push(item);
                }
                Change::Updated => {
                    let id = item
                        .id
                        .clone()
                        .ok_or_else(|| anyhow!("update without id"))?;
                    let slot = stored
                        .iter_mut()
                        .find(|s| s.id.as_deref() == Some(id.as_str()))
                        .ok_or_else(|| anyhow!("no setting with id {}", id))?;
                    item.operation = Change::Unchanged;
                    *slot = item;
                }
                Change::Deleted => {
                    let id = item
                        .id
                        .ok_or_else(|| anyhow!("delete without id"))?;
                    stored.retain(|s| s.id.as_deref() != Some(id.as_str()));
                }
            }
        }
        Ok(())
    }

    fn merge_columns(stored: &mut Vec<ColumnSetting>, incoming: Vec<ColumnSetting>) {
        for mut column in incoming {
            let position = stored.iter().position(|c| c.column_id == column.column_id);
            match (column.operation, position) {
                (Change::Unchanged, _) => {}
                (Change::Deleted, Some(position)) => {
                    stored.remove(position);
                }
                (Change::Deleted, None) => {}
                (_, Some(position)) => {
                    column.operation = Change::Unchanged;
                    stored[position] = column;
                }
                (_, None) => {
                    column.operation = Change::Unchanged;
                    stored.push(column);
                }
            }
        }
    }

    fn merge_view(&self, stored: &mut ViewSettings, incoming: ViewSettings) -> anyhow::Result<()> {
        Self::merge_columns(&mut stored.columns, incoming.columns);
        self.merge_items(&mut stored.aggregations, incoming.aggregations, "A")?;
        self.merge_items(&mut stored.highlights, incoming.highlights, "H")?;
        stored.stretch_columns = incoming.stretch_columns;
        if incoming.chart.is_some() {
            stored.chart = incoming.chart;
        }
        Ok(())
    }

    fn set_report_settings(&self, incoming: SettingsDocument) -> anyhow::Result<SettingsDocument> {
        let mut reports = self.reports.write();
        let stored = reports
            .get_mut(&incoming.id)
            .ok_or_else(|| anyhow!("unknown report {}", incoming.id))?;
        if stored.is_read_only && incoming.has_pending_changes() {
            bail!("report {} is read only", incoming.id);
        }

        let mut next = stored.clone();
        self.merge_items(&mut next.filters, incoming.filters, "F")?;
        for (view_id, view) in incoming.views {
            let target = next.views.entry(view_id).or_default();
            self.merge_view(target, view)?;
        }
        next.name = incoming.name;
        next.rows_per_page = incoming.rows_per_page;
        next.current_view = incoming.current_view;
        next.report_settings_area_state = incoming.report_settings_area_state;
        next.flashback = incoming.flashback;

        *stored = next.clone();
        Ok(next)
    }

    fn reset(&self, id: &str) -> anyhow::Result<SettingsDocument> {
        let original = self
            .originals
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| anyhow!("unknown report {}", id))?;
        self.reports.write().insert(id.to_string(), original.clone());
        Ok(original)
    }
}

impl Default for InMemorySettingsStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SettingsTransport for InMemorySettingsStore {
    async fn call(&self, request: SyncRequest) -> anyhow::Result<Value> {
        let wire = serde_json::to_value(&request)?;
        self.requests.write().push(wire.clone());
        debug!("In-memory store received {}", request.kind());

        if let Some(message) = self.failures.lock().pop_front() {
            bail!(message);
        }

        let request: SyncRequest =
            serde_json::from_value(wire).context("malformed settings request")?;
        let response = match request {
            SyncRequest::SetReportSettings(documents) => {
                let mut last = None;
                for document in documents {
                    last = Some(self.set_report_settings(document)?);
                }
                let document = last.ok_or_else(|| anyhow!("empty setReportSettings"))?;
                serde_json::to_value(document)?
            }
            SyncRequest::ResetReportSettings(reports) => {
                let mut last = None;
                for report in reports {
                    last = Some(self.reset(&report.id)?);
                }
                let document = last.ok_or_else(|| anyhow!("empty resetReportSettings"))?;
                serde_json::to_value(document)?
            }
            SyncRequest::GetReport(report) => {
                let document = self
                    .report(&report.id)
                    .ok_or_else(|| anyhow!("unknown report {}", report.id))?;
                serde_json::to_value(document)?
            }
            SyncRequest::GetFilterValues(request) => {
                let values = self
                    .filter_values
                    .read()
                    .get(&request.column_id)
                    .map(|values| values.iter().take(request.limit as usize).cloned().collect())
                    .unwrap_or_else(Vec::new);
                json!(values)
            }
            SyncRequest::Download(request) => json!({
                "url": format!(
                    "/download/{}/{}.{}",
                    request.report_id,
                    request.view_id,
                    serde_json::to_value(request.format)?.as_str().unwrap_or("csv")
                )
            }),
        };
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::{Aggregate, AggregateFunction, Filter, ItemRef};
    use crate::sync::{DownloadFormat, DownloadRequest, ReportRef};

    fn store() -> InMemorySettingsStore {
        let store = InMemorySettingsStore::new();
        let mut document = SettingsDocument::new("R1", "grid");
        document
            .views
            .insert("grid".into(), ViewSettings::with_columns(["ENAME", "SAL"]));
        store.insert_report(document);
        store
    }

    async fn send(store: &InMemorySettingsStore, document: SettingsDocument) -> SettingsDocument {
        let value = store
            .call(SyncRequest::SetReportSettings(vec![document]))
            .await
            .unwrap();
        serde_json::from_value(value).unwrap()
    }

    #[tokio::test]
    async fn test_inserts_get_prefixed_ids() {
        let store = store();
        let mut document = store.report("R1").unwrap();
        document.add_filter(Filter::row("a")).unwrap();
        document
            .view_mut("grid")
            .unwrap()
            .add_aggregate(Aggregate::new(AggregateFunction::Sum, "SAL"))
            .unwrap();

        let canonical = send(&store, document).await;
        assert_eq!(canonical.filters[0].id.as_deref(), Some("F1"));
        assert_eq!(canonical.views["grid"].aggregations[0].id.as_deref(), Some("A1"));
        assert!(!canonical.has_pending_changes());
    }

    #[tokio::test]
    async fn test_delete_and_reset() {
        let store = store();
        let mut document = store.report("R1").unwrap();
        document.add_filter(Filter::row("a")).unwrap();
        let mut canonical = send(&store, document).await;

        canonical.delete_filter(&ItemRef::from("F1")).unwrap();
        let canonical = send(&store, canonical).await;
        assert!(canonical.filters.is_empty());

        let mut document = canonical;
        document.rows_per_page = 10;
        send(&store, document).await;
        let reset = store
            .call(SyncRequest::ResetReportSettings(vec![ReportRef { id: "R1".into() }]))
            .await
            .unwrap();
        assert_eq!(reset["rowsPerPage"], json!(50));
    }

    #[tokio::test]
    async fn test_read_only_report_rejects_changes() {
        let store = InMemorySettingsStore::new();
        let mut document = SettingsDocument::new("R9", "grid");
        document.is_read_only = true;
        store.insert_report(document.clone());

        document.add_filter(Filter::row("a")).unwrap();
        let result = store.call(SyncRequest::SetReportSettings(vec![document])).await;
        assert!(result.is_err());
        assert!(store.report("R9").unwrap().filters.is_empty());
    }

    #[tokio::test]
    async fn test_failure_injection_is_one_shot() {
        let store = store();
        store.fail_next("boom");
        let request = SyncRequest::GetReport(ReportRef { id: "R1".into() });
        assert!(store.call(request.clone()).await.is_err());
        assert!(store.call(request).await.is_ok());
        assert_eq!(store.requests().len(), 2);
    }

    #[tokio::test]
    async fn test_download_returns_url() {
        let store = store();
        let value = store
            .call(SyncRequest::Download(DownloadRequest {
                report_id: "R1".into(),
                view_id: "grid".into(),
                format: DownloadFormat::Xlsx,
            }))
            .await
            .unwrap();
        assert_eq!(value["url"], json!("/download/R1/grid.xlsx"));
    }
}

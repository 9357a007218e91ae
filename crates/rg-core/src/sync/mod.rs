//! Report settings synchronization
//!
//! The engine owns the live [`SettingsDocument`]. A sync clones it, applies
//! the caller's mutation to the clone, sends only the changed entries and,
//! on success, replaces the live document with the server's canonical copy.
//! On failure the live document is left exactly as it was.

mod memory;
mod transport;

pub use memory::InMemorySettingsStore;
pub use transport::{
    DownloadFormat, DownloadRequest, FilterValuesRequest, ReportRef, SettingsTransport,
    SyncRequest,
};

use std::sync::Arc;

use ahash::AHashMap;
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{GridError, GridResult};
use crate::settings::{diff, SettingsDocument, ViewId};

/// Queue for changes of the current view
pub const VIEW_QUEUE: &str = "view";
/// Queue for rows-per-page changes
pub const ROWS_PER_PAGE_QUEUE: &str = "rowsPerPage";

/// What to refresh once a sync has been applied, and how to deliver it
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncOptions {
    /// Re-layout the active view without touching its model
    pub refresh_view: bool,
    /// Clear the active view's cached records
    pub refresh_model: bool,
    /// With `refresh_model`: clear every bound model, not just the active one
    pub affects_other_views_models: bool,
    /// Re-derive the active view's column definitions
    pub refresh_columns: bool,
    /// Named ordered queue. `None` sends independently.
    pub queue: Option<&'static str>,
}

impl SyncOptions {
    /// Report-wide data changes (filters, flashback)
    pub fn report_wide() -> Self {
        Self {
            refresh_model: true,
            affects_other_views_models: true,
            ..Self::default()
        }
    }

    /// Data changes scoped to the settings of one view (aggregates, highlights, breaks, sorts)
    pub fn view_data() -> Self {
        Self {
            refresh_model: true,
            refresh_columns: true,
            ..Self::default()
        }
    }

    /// Column layout changes that need no new data
    pub fn layout() -> Self {
        Self {
            refresh_columns: true,
            ..Self::default()
        }
    }

    /// Presentation changes such as rows per page
    pub fn relayout() -> Self {
        Self {
            refresh_view: true,
            ..Self::default()
        }
    }

    pub fn queued(mut self, queue: &'static str) -> Self {
        self.queue = Some(queue);
        self
    }

    /// Drop the model refresh when the caller asked not to refresh data
    pub fn with_refresh_data(mut self, refresh_data: bool) -> Self {
        if !refresh_data {
            self.refresh_model = false;
            self.affects_other_views_models = false;
        }
        self
    }
}

/// A sync response that replaced the live document
#[derive(Debug, Clone)]
pub struct SyncApplied {
    pub document: SettingsDocument,
    /// Current view of the document that was replaced
    pub previous_view: ViewId,
    pub seq: u64,
    pub options: SyncOptions,
}

impl SyncApplied {
    pub fn view_changed(&self) -> bool {
        self.previous_view != self.document.current_view
    }
}

#[derive(Debug, Clone)]
pub enum SyncOutcome {
    Applied(SyncApplied),
    /// The response was older than one already applied and was dropped
    Stale { seq: u64 },
}

impl SyncOutcome {
    pub fn applied(&self) -> Option<&SyncApplied> {
        match self {
            SyncOutcome::Applied(applied) => Some(applied),
            SyncOutcome::Stale { .. } => None,
        }
    }

    pub fn is_stale(&self) -> bool {
        matches!(self, SyncOutcome::Stale { .. })
    }
}

struct SyncState {
    document: SettingsDocument,
    /// Last sequence number handed to a request
    next_seq: u64,
    /// Sequence number of the response the live document came from
    applied_seq: u64,
    in_flight: usize,
    last_synced_at: Option<DateTime<Utc>>,
}

/// Synchronizes the settings document with the remote store
pub struct SettingsSyncEngine {
    transport: Arc<dyn SettingsTransport>,
    state: Arc<RwLock<SyncState>>,
    queues: Arc<Mutex<AHashMap<&'static str, Arc<tokio::sync::Mutex<()>>>>>,
    declared_views: Vec<ViewId>,
}

impl SettingsSyncEngine {
    /// Create an engine around the startup document
    pub fn new(
        transport: Arc<dyn SettingsTransport>,
        mut document: SettingsDocument,
        declared_views: Vec<ViewId>,
    ) -> Self {
        document.normalize(&declared_views);
        Self {
            transport,
            state: Arc::new(RwLock::new(SyncState {
                document,
                next_seq: 0,
                applied_seq: 0,
                in_flight: 0,
                last_synced_at: None,
            })),
            queues: Arc::new(Mutex::new(AHashMap::new())),
            declared_views,
        }
    }

    pub fn declared_views(&self) -> &[ViewId] {
        &self.declared_views
    }

    /// Snapshot of the live document
    pub fn document(&self) -> SettingsDocument {
        self.state.read().document.clone()
    }

    /// Read the live document without cloning it
    pub fn read<R>(&self, f: impl FnOnce(&SettingsDocument) -> R) -> R {
        f(&self.state.read().document)
    }

    pub fn report_id(&self) -> String {
        self.read(|document| document.id.clone())
    }

    pub fn current_view(&self) -> ViewId {
        self.read(|document| document.current_view.clone())
    }

    pub fn last_synced_at(&self) -> Option<DateTime<Utc>> {
        self.state.read().last_synced_at
    }

    /// Number of settings calls awaiting a response
    pub fn in_flight(&self) -> usize {
        self.state.read().in_flight
    }

    /// Apply a mutation to the live document without a round trip.
    ///
    /// The change tags stay on the entries, so the next saved sync sends them.
    /// A failing mutator leaves the document untouched.
    pub fn apply_local<F>(&self, mutator: F) -> GridResult<SettingsDocument>
    where
        F: FnOnce(&mut SettingsDocument) -> GridResult<()>,
    {
        let mut state = self.state.write();
        let mut draft = state.document.clone();
        mutator(&mut draft)?;
        state.document = draft.clone();
        Ok(draft)
    }

    /// Replace the live document wholesale, e.g. after a report switch.
    /// Responses to requests issued before this call are dropped as stale.
    pub fn replace(&self, mut document: SettingsDocument) {
        document.normalize(&self.declared_views);
        let mut state = self.state.write();
        info!("Replacing settings document {} with {}", state.document.id, document.id);
        state.document = document;
        state.applied_seq = state.next_seq;
    }

    fn queue(&self, name: &'static str) -> Arc<tokio::sync::Mutex<()>> {
        self.queues
            .lock()
            .entry(name)
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }

    /// Mutate a copy of the document, send the minimal diff and apply the
    /// canonical response.
    pub async fn sync<F>(&self, mutator: F, options: SyncOptions) -> GridResult<SyncOutcome>
    where
        F: FnOnce(&mut SettingsDocument) -> GridResult<()> + Send,
    {
        // Queued calls reach the server in the order they were issued
        let _queue_guard = match options.queue {
            Some(name) => Some(self.queue(name).lock_owned().await),
            None => None,
        };

        let (seq, payload) = {
            let mut state = self.state.write();
            let mut draft = state.document.clone();
            mutator(&mut draft)?;
            state.next_seq += 1;
            state.in_flight += 1;
            (state.next_seq, diff::minimal_payload(&draft))
        };

        let request = SyncRequest::SetReportSettings(vec![payload]);
        let response = self.dispatch(seq, request).await?;
        self.apply_response(seq, response, options)
    }

    /// Restore the report to its saved definition
    pub async fn reset_report(&self, options: SyncOptions) -> GridResult<SyncOutcome> {
        let (seq, report_id) = {
            let mut state = self.state.write();
            state.next_seq += 1;
            state.in_flight += 1;
            (state.next_seq, state.document.id.clone())
        };
        let request = SyncRequest::ResetReportSettings(vec![ReportRef { id: report_id }]);
        let response = self.dispatch(seq, request).await?;
        self.apply_response(seq, response, options)
    }

    /// Fetch the settings of another report. The live document is not touched;
    /// callers tear down what depends on the old report and then [`replace`](Self::replace).
    pub async fn load_report(&self, report_id: &str) -> GridResult<SettingsDocument> {
        let request = SyncRequest::GetReport(ReportRef {
            id: report_id.to_string(),
        });
        let response = self.call(request).await?;
        SettingsDocument::from_value(response, &self.declared_views)
    }

    /// Distinct values of a column, for filter value pickers
    pub async fn filter_values(&self, column_id: &str, limit: u32) -> GridResult<Vec<String>> {
        let request = SyncRequest::GetFilterValues(FilterValuesRequest {
            report_id: self.report_id(),
            column_id: column_id.to_string(),
            limit,
        });
        let response = self.call(request).await?;
        Ok(serde_json::from_value(response)?)
    }

    pub async fn download(&self, view_id: &str, format: DownloadFormat) -> GridResult<Value> {
        let request = SyncRequest::Download(DownloadRequest {
            report_id: self.report_id(),
            view_id: view_id.to_string(),
            format,
        });
        self.call(request).await
    }

    async fn call(&self, request: SyncRequest) -> GridResult<Value> {
        let kind = request.kind();
        self.transport.call(request).await.map_err(|e| {
            warn!("Settings call {} failed: {}", kind, e);
            GridError::Transport(e)
        })
    }

    async fn dispatch(&self, seq: u64, request: SyncRequest) -> GridResult<Value> {
        let request_id = Uuid::new_v4();
        debug!("Dispatching {} #{} ({})", request.kind(), seq, request_id);
        let result = self.call(request).await;
        self.state.write().in_flight -= 1;
        if result.is_err() {
            debug!("Settings sync #{} ({}) left the document untouched", seq, request_id);
        }
        result
    }

    fn apply_response(&self, seq: u64, response: Value, options: SyncOptions) -> GridResult<SyncOutcome> {
        let document = SettingsDocument::from_value(response, &self.declared_views)?;
        let mut state = self.state.write();
        if seq <= state.applied_seq {
            debug!(
                "Dropping stale settings response #{} (already applied #{})",
                seq, state.applied_seq
            );
            return Ok(SyncOutcome::Stale { seq });
        }

        let previous = std::mem::replace(&mut state.document, document.clone());
        state.applied_seq = seq;
        state.last_synced_at = Some(Utc::now());
        debug!("Applied settings response #{} for report {}", seq, document.id);

        Ok(SyncOutcome::Applied(SyncApplied {
            document,
            previous_view: previous.current_view,
            seq,
            options,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::{Change, Filter, ItemRef, ViewSettings, DEFAULT_ROWS_PER_PAGE};
    use async_trait::async_trait;
    use serde_json::json;
    use tokio::sync::oneshot;

    fn declared() -> Vec<ViewId> {
        vec!["grid".to_string(), "icon".to_string()]
    }

    fn grid_report() -> SettingsDocument {
        let mut document = SettingsDocument::new("R1", "grid");
        document
            .views
            .insert("grid".into(), ViewSettings::with_columns(["ENAME", "SAL"]));
        document.views.insert("icon".into(), ViewSettings::default());
        document
    }

    fn engine_with_store() -> (Arc<InMemorySettingsStore>, SettingsSyncEngine) {
        let store = Arc::new(InMemorySettingsStore::new());
        store.insert_report(grid_report());
        let engine = SettingsSyncEngine::new(store.clone(), grid_report(), declared());
        (store, engine)
    }

    #[tokio::test]
    async fn test_add_filter_sends_only_new_item() {
        let (store, engine) = engine_with_store();

        let outcome = engine
            .sync(
                |doc| doc.add_filter(Filter::row("ACME")).map(|_| ()),
                SyncOptions::report_wide(),
            )
            .await
            .unwrap();
        let applied = outcome.applied().unwrap();
        assert_eq!(applied.document.filters[0].id.as_deref(), Some("F1"));
        assert_eq!(applied.document.filters[0].operation, Change::Unchanged);

        let first = store.last_request().unwrap();
        assert_eq!(
            first["setReportSettings"][0]["filters"],
            json!([{"operation": "insert", "isEnabled": true, "type": "row", "value": "ACME"}])
        );
        assert_eq!(first["setReportSettings"][0]["views"]["grid"]["columns"], json!([]));

        engine
            .sync(
                |doc| doc.add_filter(Filter::row("Smith")).map(|_| ()),
                SyncOptions::report_wide(),
            )
            .await
            .unwrap();
        let second = store.last_request().unwrap();
        let filters = second["setReportSettings"][0]["filters"].as_array().unwrap();
        assert_eq!(filters.len(), 1);
        assert_eq!(filters[0]["value"], json!("Smith"));
        assert_eq!(engine.document().live_filters().count(), 2);
    }

    #[tokio::test]
    async fn test_round_trip_leaves_nothing_to_send() {
        let (_store, engine) = engine_with_store();
        engine
            .sync(
                |doc| {
                    doc.add_filter(Filter::row("ACME"))?;
                    doc.view_mut("grid")?.set_column_width("SAL", 90)
                },
                SyncOptions::report_wide(),
            )
            .await
            .unwrap();

        assert!(!engine.document().has_pending_changes());
        assert_eq!(diff::changed_entries(&engine.document()), 0);
    }

    #[tokio::test]
    async fn test_transport_failure_leaves_document_untouched() {
        let (store, engine) = engine_with_store();
        let before = engine.document();
        store.fail_next("server unavailable");

        let result = engine
            .sync(
                |doc| doc.add_filter(Filter::row("ACME")).map(|_| ()),
                SyncOptions::report_wide(),
            )
            .await;

        assert!(matches!(result, Err(GridError::Transport(_))));
        assert_eq!(engine.document(), before);
        assert_eq!(engine.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_validation_error_never_reaches_transport() {
        let (store, engine) = engine_with_store();
        let result = engine
            .sync(
                |doc| doc.add_filter(Filter::row("")).map(|_| ()),
                SyncOptions::report_wide(),
            )
            .await;
        assert!(matches!(result, Err(GridError::Validation(_))));
        assert!(store.requests().is_empty());
    }

    #[tokio::test]
    async fn test_apply_local_changes_travel_with_next_sync() {
        let (store, engine) = engine_with_store();
        let local = engine
            .apply_local(|doc| doc.add_filter(Filter::row("local")).map(|_| ()))
            .unwrap();
        assert_eq!(local.filters[0].operation, Change::Inserted);
        assert!(store.requests().is_empty());

        engine
            .sync(|doc| doc.set_rows_per_page(25), SyncOptions::relayout())
            .await
            .unwrap();
        let sent = store.last_request().unwrap();
        assert_eq!(sent["setReportSettings"][0]["filters"][0]["value"], json!("local"));
        assert_eq!(engine.document().rows_per_page, 25);
    }

    #[tokio::test]
    async fn test_delete_of_persisted_filter_is_sent_and_applied() {
        let (_store, engine) = engine_with_store();
        engine
            .sync(
                |doc| doc.add_filter(Filter::row("ACME")).map(|_| ()),
                SyncOptions::report_wide(),
            )
            .await
            .unwrap();

        engine
            .sync(
                |doc| doc.delete_filter(&ItemRef::from("F1")),
                SyncOptions::report_wide(),
            )
            .await
            .unwrap();
        assert!(engine.document().filters.is_empty());
    }

    /// Transport that parks each settings call until the test releases it.
    /// Calls are keyed by the rows per page they carry.
    struct GatedTransport {
        inner: Arc<InMemorySettingsStore>,
        gates: Mutex<AHashMap<u32, oneshot::Receiver<()>>>,
    }

    impl GatedTransport {
        fn new(inner: Arc<InMemorySettingsStore>) -> Self {
            Self {
                inner,
                gates: Mutex::new(AHashMap::new()),
            }
        }

        fn gate(&self, rows_per_page: u32) -> oneshot::Sender<()> {
            let (release, gate) = oneshot::channel();
            self.gates.lock().insert(rows_per_page, gate);
            release
        }
    }

    #[async_trait]
    impl SettingsTransport for GatedTransport {
        async fn call(&self, request: SyncRequest) -> anyhow::Result<Value> {
            let key = match &request {
                SyncRequest::SetReportSettings(documents) => documents.first().map(|d| d.rows_per_page),
                _ => None,
            };
            // Answer as of issue time so each response reflects its own request
            let answer = self.inner.call(request).await;
            let gate = key.and_then(|key| self.gates.lock().remove(&key));
            if let Some(gate) = gate {
                let _ = gate.await;
            }
            answer
        }
    }

    fn gated_engine() -> (Arc<GatedTransport>, Arc<SettingsSyncEngine>) {
        let store = Arc::new(InMemorySettingsStore::new());
        store.insert_report(grid_report());
        let transport = Arc::new(GatedTransport::new(store));
        let engine = SettingsSyncEngine::new(transport.clone(), grid_report(), declared());
        (transport, Arc::new(engine))
    }

    fn spawn_rows_per_page(
        engine: &Arc<SettingsSyncEngine>,
        rows: u32,
    ) -> tokio::task::JoinHandle<GridResult<SyncOutcome>> {
        let engine = engine.clone();
        tokio::spawn(async move {
            engine
                .sync(move |doc| doc.set_rows_per_page(rows), SyncOptions::relayout())
                .await
        })
    }

    async fn wait_in_flight(engine: &SettingsSyncEngine, count: usize) {
        while engine.in_flight() < count {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn test_stale_response_is_dropped() {
        let (transport, engine) = gated_engine();
        let release_first = transport.gate(10);
        let release_second = transport.gate(20);

        let first = spawn_rows_per_page(&engine, 10);
        wait_in_flight(&engine, 1).await;
        let second = spawn_rows_per_page(&engine, 20);
        wait_in_flight(&engine, 2).await;

        let _ = release_second.send(());
        let second = second.await.unwrap().unwrap();
        assert_eq!(second.applied().map(|a| a.seq), Some(2));

        let _ = release_first.send(());
        let first = first.await.unwrap().unwrap();
        assert!(first.is_stale());
        assert_eq!(engine.document().rows_per_page, 20);
    }

    #[tokio::test]
    async fn test_replace_drops_in_flight_responses() {
        let (transport, engine) = gated_engine();
        let release = transport.gate(10);

        let pending = spawn_rows_per_page(&engine, 10);
        wait_in_flight(&engine, 1).await;
        engine.replace(SettingsDocument::new("R2", "grid"));
        let _ = release.send(());

        assert!(pending.await.unwrap().unwrap().is_stale());
        assert_eq!(engine.report_id(), "R2");
        assert_eq!(engine.document().rows_per_page, DEFAULT_ROWS_PER_PAGE);
    }

    #[tokio::test]
    async fn test_queued_syncs_apply_in_issue_order() {
        let (store, engine) = engine_with_store();
        let options = SyncOptions::relayout().queued(ROWS_PER_PAGE_QUEUE);

        let (a, b, c) = tokio::join!(
            engine.sync(|doc| doc.set_rows_per_page(10), options.clone()),
            engine.sync(|doc| doc.set_rows_per_page(20), options.clone()),
            engine.sync(|doc| doc.set_rows_per_page(30), options.clone()),
        );
        assert!(a.unwrap().applied().is_some());
        assert!(b.unwrap().applied().is_some());
        assert!(c.unwrap().applied().is_some());

        let sent: Vec<Value> = store
            .requests()
            .iter()
            .map(|r| r["setReportSettings"][0]["rowsPerPage"].clone())
            .collect();
        assert_eq!(sent, vec![json!(10), json!(20), json!(30)]);
        assert_eq!(engine.document().rows_per_page, 30);
    }

    #[tokio::test]
    async fn test_view_change_is_reported() {
        let (_store, engine) = engine_with_store();
        let outcome = engine
            .sync(
                |doc| {
                    doc.current_view = "icon".into();
                    Ok(())
                },
                SyncOptions::default().queued(VIEW_QUEUE),
            )
            .await
            .unwrap();
        let applied = outcome.applied().unwrap();
        assert!(applied.view_changed());
        assert_eq!(applied.previous_view, "grid");
        assert!(engine.last_synced_at().is_some());
    }

    #[tokio::test]
    async fn test_load_report_does_not_replace() {
        let (store, engine) = engine_with_store();
        let mut other = SettingsDocument::new("R2", "icon");
        other.name = "Alternative".into();
        store.insert_report(other);

        let loaded = engine.load_report("R2").await.unwrap();
        assert_eq!(loaded.current_view, "icon");
        assert_eq!(engine.report_id(), "R1");
        assert!(engine.load_report("missing").await.is_err());
    }

    #[tokio::test]
    async fn test_filter_values() {
        let (store, engine) = engine_with_store();
        store.set_filter_values("JOB", vec!["CLERK".into(), "MANAGER".into()]);
        let values = engine.filter_values("JOB", 10).await.unwrap();
        assert_eq!(values, vec!["CLERK".to_string(), "MANAGER".to_string()]);
    }
}

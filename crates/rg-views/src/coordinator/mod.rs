//! View coordinator
//!
//! Owns the active view, the settings engine and the model bindings of one
//! region. Every host-facing operation that can lose unsaved record edits
//! goes through the dirty gate first.

mod settings;


pub use settings::{MutationOptions, SettingKind};

use std::sync::Arc;
use std::time::Instant;

use rg_core::events::events::{ReportChange, ReportSettingsChange, SelectionChange, ViewChange};
use rg_core::sync::{SyncOptions, SyncOutcome, VIEW_QUEUE};
use rg_core::{
    EventBus, GridConfig, GridError, GridResult, Record, RecordId, SettingsDocument,
    SettingsSyncEngine, SettingsTransport, ViewId,
};
use rg_data::{
    DetailCascade, DetailTarget, Model, ModelHandle, ModelLifecycleManager, ModelOptions,
    ModelStore,
};
use tracing::{debug, info, warn};

use crate::actions::{ActionState, SelectionSummary};
use crate::gate::{DirtyGate, GateDecision};
use crate::host::{ActionHost, DialogHost};
use crate::registry::ViewRegistry;

/// Collaborators supplied by the host application
#[derive(Clone)]
pub struct Hosts {
    pub transport: Arc<dyn SettingsTransport>,
    pub models: Arc<dyn ModelStore>,
    pub dialogs: Arc<dyn DialogHost>,
    pub actions: Arc<dyn ActionHost>,
    pub events: Arc<EventBus>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Phase {
    Uninitialized,
    Active { view: ViewId },
    /// `view` stays active while the setup flow of `requested` is open
    AwaitingConfiguration { view: ViewId, requested: ViewId },
}

impl Phase {
    pub fn active_view(&self) -> Option<&str> {
        match self {
            Phase::Uninitialized => None,
            Phase::Active { view } | Phase::AwaitingConfiguration { view, .. } => Some(view),
        }
    }
}

/// Result of a host-facing operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Synced and applied
    Applied,
    /// Applied locally; the next saved change sends it
    Local,
    /// Nothing to do
    Unchanged,
    /// The user kept unsaved edits
    Aborted,
    /// The requested view needs its setup flow first
    AwaitingConfiguration,
    /// A newer settings response had already been applied
    Stale,
}

pub struct ViewCoordinator {
    config: GridConfig,
    registry: ViewRegistry,
    engine: SettingsSyncEngine,
    models: ModelLifecycleManager,
    gate: DirtyGate,
    dialogs: Arc<dyn DialogHost>,
    actions: Arc<dyn ActionHost>,
    events: Arc<EventBus>,
    phase: Phase,
    editable_view: Option<ViewId>,
    action_state: ActionState,
    cascade: Option<DetailCascade>,
    /// Records handed to the first model binding
    initial_records: Option<Vec<Record>>,
}

impl ViewCoordinator {
    /// Validate the configuration and activate the report's current view
    pub async fn start(
        config: GridConfig,
        registry: ViewRegistry,
        hosts: Hosts,
        document: SettingsDocument,
    ) -> GridResult<Self> {
        Self::start_with_records(config, registry, hosts, document, None).await
    }

    /// Like [`start`](Self::start), binding the first model with records the page already has
    pub async fn start_with_records(
        config: GridConfig,
        registry: ViewRegistry,
        hosts: Hosts,
        document: SettingsDocument,
        initial_records: Option<Vec<Record>>,
    ) -> GridResult<Self> {
        config.validate()?;
        if registry.is_empty() {
            return Err(GridError::Config("no views registered".into()));
        }
        if !registry.contains(&config.default_view) {
            return Err(GridError::Config(format!(
                "default view '{}' is not registered",
                config.default_view
            )));
        }
        let editable_view = registry.resolve_editable(&config)?;

        let engine = SettingsSyncEngine::new(hosts.transport, document, registry.ids());
        let cascade = config
            .is_detail()
            .then(|| DetailCascade::new(config.settle_delay()));
        let mut coordinator = Self {
            models: ModelLifecycleManager::new(hosts.models, config.region_id.clone()),
            gate: DirtyGate::new(config.discard_message.clone()),
            config,
            registry,
            engine,
            dialogs: hosts.dialogs,
            actions: hosts.actions,
            events: hosts.events,
            phase: Phase::Uninitialized,
            editable_view,
            action_state: ActionState::default(),
            cascade,
            initial_records,
        };
        coordinator.activate_initial().await?;
        Ok(coordinator)
    }

    pub fn config(&self) -> &GridConfig {
        &self.config
    }

    pub fn phase(&self) -> &Phase {
        &self.phase
    }

    pub fn current_view_id(&self) -> Option<&str> {
        self.phase.active_view()
    }

    pub fn registry(&self) -> &ViewRegistry {
        &self.registry
    }

    pub fn models(&self) -> &ModelLifecycleManager {
        &self.models
    }

    pub fn engine(&self) -> &SettingsSyncEngine {
        &self.engine
    }

    pub fn events(&self) -> &Arc<EventBus> {
        &self.events
    }

    pub fn action_state(&self) -> &ActionState {
        &self.action_state
    }

    pub fn editable_view(&self) -> Option<&str> {
        self.editable_view.as_deref()
    }

    /// Snapshot of the current settings document
    pub fn settings_document(&self) -> SettingsDocument {
        self.engine.document()
    }

    /// Switch to another view, asking first if unsaved edits would be lost
    pub async fn switch_view(&mut self, view_id: &str) -> GridResult<Outcome> {
        self.switch_view_with(view_id, false).await
    }

    pub async fn switch_view_with(&mut self, view_id: &str, skip_check: bool) -> GridResult<Outcome> {
        self.registry.get(view_id)?;
        if self.phase.active_view() == Some(view_id) {
            if let Phase::AwaitingConfiguration { view, .. } = &self.phase {
                self.phase = Phase::Active { view: view.clone() };
            }
            return Ok(Outcome::Unchanged);
        }
        if !self.pass_gate(skip_check).await {
            return Ok(Outcome::Aborted);
        }

        let configured = self
            .engine
            .read(|document| self.registry.is_configured(view_id, document))?;
        if !configured {
            info!("View {} is not configured; opening its setup", view_id);
            if let Some(active) = self.phase.active_view().map(str::to_string) {
                self.phase = Phase::AwaitingConfiguration {
                    view: active,
                    requested: view_id.to_string(),
                };
            }
            self.dialogs.open_view_setup(view_id);
            self.update_actions();
            return Ok(Outcome::AwaitingConfiguration);
        }

        let target = view_id.to_string();
        let result = self
            .engine
            .sync(
                move |document| {
                    document.current_view = target;
                    Ok(())
                },
                SyncOptions::default().queued(VIEW_QUEUE),
            )
            .await;
        let outcome = self.report_failure(result)?;
        self.apply_outcome(outcome).await
    }

    /// Leave the setup flow without configuring the requested view
    pub fn cancel_view_configuration(&mut self) {
        if let Phase::AwaitingConfiguration { view, requested } = &self.phase {
            debug!("Setup of {} cancelled", requested);
            self.phase = Phase::Active { view: view.clone() };
        }
    }

    /// Load another report, rebuilding every view and model from its settings
    pub async fn switch_report(&mut self, report_id: &str) -> GridResult<Outcome> {
        self.switch_report_with(report_id, false).await
    }

    pub async fn switch_report_with(&mut self, report_id: &str, skip_check: bool) -> GridResult<Outcome> {
        if self.engine.report_id() == report_id {
            return Ok(Outcome::Unchanged);
        }
        if !self.pass_gate(skip_check).await {
            return Ok(Outcome::Aborted);
        }

        let loaded = self.engine.load_report(report_id).await;
        let document = self.report_failure(loaded)?;

        self.teardown_views();
        self.models.release_all();
        self.engine.replace(document);
        self.phase = Phase::Uninitialized;
        self.activate_initial().await?;

        let document = self.engine.document();
        info!("Switched to report {} ({})", document.id, document.name);
        self.events.publish(ReportChange {
            report_id: document.id.clone(),
            report_name: document.name.clone(),
        });
        self.actions.render_settings_summary(&document);
        Ok(Outcome::Applied)
    }

    /// Reload the active view's records
    pub async fn refresh(&mut self) -> GridResult<Outcome> {
        self.refresh_with(false).await
    }

    pub async fn refresh_with(&mut self, skip_check: bool) -> GridResult<Outcome> {
        if !self.pass_gate(skip_check).await {
            return Ok(Outcome::Aborted);
        }
        let active = self.require_active()?;
        let model_view = self.registry.settings_view(&active)?;
        self.models.invalidate(&model_view);
        self.reload_records(&active).await?;
        self.update_actions();
        Ok(Outcome::Applied)
    }

    pub fn selected_records(&self) -> Vec<Record> {
        self.phase
            .active_view()
            .and_then(|view| self.registry.get(view).ok())
            .map(|view| view.selected_records())
            .unwrap_or_default()
    }

    pub fn set_selected_records(&mut self, records: &[Record]) -> GridResult<()> {
        let active = self.require_active()?;
        self.registry
            .slot_mut(&active)?
            .descriptor
            .set_selected_records(records);
        self.publish_selection();
        self.update_actions();
        Ok(())
    }

    pub fn active_record_id(&self) -> Option<RecordId> {
        self.phase
            .active_view()
            .and_then(|view| self.registry.get(view).ok())
            .and_then(|view| view.active_record_id())
    }

    /// Move the cell focus of the active view
    pub fn goto_cell(&mut self, record_id: &RecordId, column_id: &str) -> GridResult<bool> {
        let active = self.require_active()?;
        let moved = self
            .registry
            .slot_mut(&active)?
            .descriptor
            .goto_cell(record_id, column_id);
        if moved {
            self.publish_selection();
            self.update_actions();
        }
        Ok(moved)
    }

    /// Save pending record edits of the active model
    pub async fn save(&mut self) -> GridResult<()> {
        let Some(model) = self.active_model() else {
            return Ok(());
        };
        model.save().await.map_err(GridError::Model)?;
        info!("Saved records of {}", model.key());
        self.update_actions();
        Ok(())
    }

    /// Record a selection of the master region; the detail rebinds once it settles
    pub fn on_master_selection(&mut self, records: Vec<Record>, now: Instant) -> GridResult<()> {
        let region = self.config.region_id.clone();
        let cascade = self
            .cascade
            .as_mut()
            .ok_or_else(|| GridError::Config(format!("region '{}' has no master region", region)))?;
        cascade.on_master_selection(records, now);
        Ok(())
    }

    /// Drive the settle stage. Returns true when the detail model was rebound.
    pub async fn tick(&mut self, now: Instant) -> GridResult<bool> {
        let target = self.cascade.as_mut().and_then(|cascade| cascade.poll(now));
        match target {
            Some(target) => self.rebind_detail(target).await,
            None => Ok(false),
        }
    }

    /// Wait for a pending master selection to settle, then rebind
    pub async fn settle_detail(&mut self) -> GridResult<bool> {
        let target = match self.cascade.as_mut() {
            Some(cascade) => cascade.settled().await,
            None => None,
        };
        match target {
            Some(target) => self.rebind_detail(target).await,
            None => Ok(false),
        }
    }

    /// Destroy every view and release every model
    pub fn shutdown(&mut self) {
        self.teardown_views();
        for (_, slot) in self.registry.slots_mut() {
            slot.descriptor.destroy();
        }
        self.models.release_all();
        self.phase = Phase::Uninitialized;
    }

    async fn rebind_detail(&mut self, target: DetailTarget) -> GridResult<bool> {
        if !self.pass_gate(false).await {
            info!("Detail rebind skipped; unsaved edits were kept");
            return Ok(false);
        }
        let active = self.require_active()?;
        let model_view = self.registry.settings_view(&active)?;
        let document = self.engine.document();
        let options = self.model_options(&model_view, &document)?;
        let master = self.config.master_region_id.clone().unwrap_or_default();

        // Hidden views rebind from the committed target when shown again
        for view in self.models.bound_views() {
            if view != model_view {
                self.models.release_view(&view);
            }
        }
        let model = self.models.bind_detail(&model_view, &master, &target, options)?;
        info!(
            "Detail region {} now follows {}",
            self.config.region_id,
            match &target {
                DetailTarget::Record { record_id, .. } => record_id.to_string(),
                DetailTarget::Null => "no record".to_string(),
            }
        );
        if let Some(cascade) = self.cascade.as_mut() {
            cascade.commit(target);
        }

        model.set_current_view(&active);
        let records = model.fetch().await.map_err(GridError::Model)?;
        self.registry
            .slot_mut(&active)?
            .descriptor
            .set_records(&records);
        self.publish_selection();
        self.update_actions();
        Ok(true)
    }

    async fn activate_initial(&mut self) -> GridResult<()> {
        let document = self.engine.document();
        let requested = document.current_view.clone();
        if self.registry.is_configured(&requested, &document)? {
            return self.activate(&requested).await;
        }

        let fallback = self
            .registry
            .first_configured(&self.config.default_view, &document)
            .ok_or_else(|| GridError::Config(format!("report '{}' has no configured view", document.id)))?;
        warn!(
            "Current view {} of report {} is not configured; showing {}",
            requested, document.id, fallback
        );
        self.activate(&fallback).await?;
        self.await_configuration(fallback, requested)
    }

    /// Keep `shown` on screen while the host configures `requested`. The
    /// document names the view actually shown until the setup completes.
    fn await_configuration(&mut self, shown: ViewId, requested: ViewId) -> GridResult<()> {
        let current = shown.clone();
        self.engine.apply_local(move |document| {
            document.current_view = current;
            Ok(())
        })?;
        self.dialogs.open_view_setup(&requested);
        self.phase = Phase::AwaitingConfiguration {
            view: shown,
            requested,
        };
        Ok(())
    }

    /// Make `view_id` the one visible view, building it on first use
    async fn activate(&mut self, view_id: &str) -> GridResult<()> {
        let document = self.engine.document();
        let model_view = self.registry.settings_view(view_id)?;
        let settings = document.view(&model_view).cloned().unwrap_or_default();
        let model = self.ensure_model(&model_view, &document)?;
        let previous = self.phase.active_view().map(str::to_string);

        let slot = self.registry.slot_mut(view_id)?;
        let created = !slot.created;
        slot.descriptor.set_column_config(&settings);
        slot.descriptor.set_report_options(&document);
        if created {
            slot.descriptor.init_view(&model);
        }
        let records = model.fetch().await.map_err(GridError::Model)?;
        slot.descriptor.set_records(&records);
        if created {
            if slot.descriptor.capabilities().selection {
                if let Some(first) = records.first() {
                    slot.descriptor.set_selected_records(std::slice::from_ref(first));
                }
            }
            slot.created = true;
        }
        slot.descriptor.view_changed(true);
        slot.visible = true;
        model.set_current_view(view_id);

        if let Some(previous) = previous.filter(|previous| previous != view_id) {
            let hidden = self.registry.slot_mut(&previous)?;
            hidden.descriptor.view_changed(false);
            hidden.visible = false;
        }

        self.phase = Phase::Active {
            view: view_id.to_string(),
        };
        info!("Activated view {} (created: {})", view_id, created);
        self.events.publish(ViewChange {
            view: view_id.to_string(),
            created,
        });
        self.publish_selection();
        self.update_actions();
        Ok(())
    }

    /// Steps that follow an applied sync: view switch first, then the refresh flags
    async fn apply_outcome(&mut self, outcome: SyncOutcome) -> GridResult<Outcome> {
        let applied = match outcome {
            SyncOutcome::Stale { seq } => {
                debug!("Ignoring stale settings response #{}", seq);
                return Ok(Outcome::Stale);
            }
            SyncOutcome::Applied(applied) => applied,
        };
        let mut document = applied.document;
        let options = applied.options;

        let current = document.current_view.clone();
        if self.phase.active_view() != Some(current.as_str()) {
            if self.registry.is_configured(&current, &document)? {
                self.activate(&current).await?;
            } else if let Some(active) = self.phase.active_view().map(str::to_string) {
                warn!("Settings name unconfigured view {} as current; keeping {}", current, active);
                self.await_configuration(active, current)?;
                document = self.engine.document();
            }
        }

        if let Some(active) = self.phase.active_view().map(str::to_string) {
            let model_view = self.registry.settings_view(&active)?;
            if options.refresh_model {
                if options.affects_other_views_models {
                    self.models.invalidate_all();
                } else {
                    self.models.invalidate(&model_view);
                }
            }
            let slot = self.registry.slot_mut(&active)?;
            if options.refresh_columns {
                let settings = document.view(&model_view).cloned().unwrap_or_default();
                slot.descriptor.set_column_config(&settings);
            }
            if options.refresh_view {
                slot.descriptor.set_report_options(&document);
            }
            if options.refresh_model {
                self.reload_records(&active).await?;
            }
        }

        self.events.publish(ReportSettingsChange {
            report_id: document.id.clone(),
            report_name: document.name.clone(),
        });
        self.update_actions();
        self.actions.render_settings_summary(&document);
        Ok(Outcome::Applied)
    }

    /// Bound model for `model_view`, binding it if needed
    fn ensure_model(&mut self, model_view: &str, document: &SettingsDocument) -> GridResult<ModelHandle> {
        if let Some(model) = self.models.model_for(model_view) {
            return Ok(model);
        }
        let options = self.model_options(model_view, document)?;
        match (&self.cascade, &self.config.master_region_id) {
            (Some(cascade), Some(master)) => {
                let target = cascade.current().cloned().unwrap_or(DetailTarget::Null);
                self.models.bind_detail(model_view, master, &target, options)
            }
            _ => self
                .models
                .bind(model_view, None, options, self.initial_records.take()),
        }
    }

    fn model_options(&self, model_view: &str, document: &SettingsDocument) -> GridResult<ModelOptions> {
        let owner = self.registry.get(model_view)?;
        let can_edit =
            owner.capabilities().edit && self.editable_view.as_deref() == Some(model_view);
        Ok(ModelOptions::merge(&self.config, &document.id, &owner.fields(), can_edit))
    }

    async fn reload_records(&mut self, view_id: &str) -> GridResult<()> {
        let model_view = self.registry.settings_view(view_id)?;
        let Some(model) = self.models.model_for(&model_view) else {
            return Ok(());
        };
        let records = model.fetch().await.map_err(GridError::Model)?;
        self.registry
            .slot_mut(view_id)?
            .descriptor
            .set_records(&records);
        Ok(())
    }

    fn teardown_views(&mut self) {
        for (id, slot) in self.registry.slots_mut() {
            if slot.created {
                debug!("Destroying view {}", id);
                slot.descriptor.destroy_view();
                slot.created = false;
                slot.visible = false;
            }
        }
    }

    fn require_active(&self) -> GridResult<ViewId> {
        self.phase
            .active_view()
            .map(str::to_string)
            .ok_or_else(|| GridError::Config("no active view".into()))
    }

    fn active_model(&self) -> Option<ModelHandle> {
        let active = self.phase.active_view()?;
        let model_view = self.registry.settings_view(active).ok()?;
        self.models.model_for(&model_view)
    }

    /// Model the dirty gate watches: the active one, if it belongs to the editable view
    fn gate_model(&self) -> Option<ModelHandle> {
        let active = self.phase.active_view()?;
        let model_view = self.registry.settings_view(active).ok()?;
        if self.editable_view.as_deref() != Some(model_view.as_str()) {
            return None;
        }
        self.models.model_for(&model_view)
    }

    async fn pass_gate(&mut self, skip_check: bool) -> bool {
        let model = self.gate_model();
        let decision = self
            .gate
            .check(model.as_ref(), skip_check, self.dialogs.as_ref())
            .await;
        if decision == GateDecision::Kept {
            // Revert whatever the settings UI shows to the authoritative state
            self.engine
                .read(|document| self.actions.render_settings_summary(document));
        }
        decision.may_proceed()
    }

    fn report_failure<T>(&self, result: GridResult<T>) -> GridResult<T> {
        if let Err(err) = &result {
            if matches!(err, GridError::Transport(_)) {
                self.dialogs.notify_failure(&err.to_string());
            }
        }
        result
    }

    fn publish_selection(&self) {
        self.events.publish(SelectionChange {
            selected_records: self.selected_records(),
            model: self.active_model().map(|model| model.key().clone()),
        });
    }

    /// Recompute enabled actions from the active view and push them to the host
    fn update_actions(&mut self) {
        let Some(active) = self.phase.active_view() else {
            return;
        };
        let Ok(view) = self.registry.get(active) else {
            return;
        };
        let caps = view.capabilities();
        let selection = view.selected_records();
        let model = self.active_model();
        let summary = SelectionSummary::of(&selection, model.as_ref());
        let model_view = self.registry.settings_view(active).ok();
        let editing = self.config.editable
            && self.editable_view.is_some()
            && self.editable_view == model_view;
        let mut state = self.engine.read(|document| {
            ActionState::compute(&caps, &self.config.features, document, editing, &summary)
        });
        view.update_actions(&mut state);
        state.apply(self.actions.as_ref());
        self.action_state = state;
    }
}

//! Report settings operations exposed to the host

use rg_core::settings::{
    Aggregate, AreaState, Change, Direction, Filter, Flashback, Highlight, Nulls,
};
use rg_core::sync::{DownloadFormat, SyncOptions, ROWS_PER_PAGE_QUEUE, VIEW_QUEUE};
use rg_core::{GridError, GridResult, ItemRef, SettingsDocument, ViewId, ViewSettings};
use serde_json::Value;
use tracing::{debug, info};

use super::{Outcome, Phase, ViewCoordinator};

/// How a settings change is carried out
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MutationOptions {
    /// Sync with the server; when false the change stays local until the next sync
    pub save: bool,
    /// Reload records after the change where the change affects them
    pub refresh_data: bool,
    /// Skip the unsaved-edits confirmation
    pub skip_no_changes_check: bool,
}

impl Default for MutationOptions {
    fn default() -> Self {
        Self {
            save: true,
            refresh_data: true,
            skip_no_changes_check: false,
        }
    }
}

impl MutationOptions {
    pub fn local() -> Self {
        Self {
            save: false,
            ..Self::default()
        }
    }

    pub fn without_refresh(mut self) -> Self {
        self.refresh_data = false;
        self
    }

    pub fn skip_check(mut self) -> Self {
        self.skip_no_changes_check = true;
        self
    }
}

/// Settings lists that can be switched on and off
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingKind {
    Filter,
    Aggregate,
    Highlight,
}

impl ViewCoordinator {
    pub async fn add_filter(&mut self, filter: Filter, options: MutationOptions) -> GridResult<Outcome> {
        filter.validate()?;
        self.mutate(options, SyncOptions::report_wide(), move |document| {
            document.add_filter(filter).map(|_| ())
        })
        .await
    }

    pub async fn update_filter(
        &mut self,
        item: ItemRef,
        filter: Filter,
        options: MutationOptions,
    ) -> GridResult<Outcome> {
        filter.validate()?;
        self.mutate(options, SyncOptions::report_wide(), move |document| {
            document.update_filter(&item, filter)
        })
        .await
    }

    pub async fn delete_filter(&mut self, item: ItemRef, options: MutationOptions) -> GridResult<Outcome> {
        self.mutate(options, SyncOptions::report_wide(), move |document| {
            document.delete_filter(&item)
        })
        .await
    }

    pub async fn add_aggregate(
        &mut self,
        aggregate: Aggregate,
        options: MutationOptions,
    ) -> GridResult<Outcome> {
        aggregate.validate()?;
        let view = self.active_settings_view()?;
        self.mutate(options, SyncOptions::view_data(), move |document| {
            document.view_mut(&view)?.add_aggregate(aggregate).map(|_| ())
        })
        .await
    }

    pub async fn update_aggregate(
        &mut self,
        item: ItemRef,
        aggregate: Aggregate,
        options: MutationOptions,
    ) -> GridResult<Outcome> {
        aggregate.validate()?;
        let view = self.active_settings_view()?;
        self.mutate(options, SyncOptions::view_data(), move |document| {
            document.view_mut(&view)?.update_aggregate(&item, aggregate)
        })
        .await
    }

    pub async fn delete_aggregate(&mut self, item: ItemRef, options: MutationOptions) -> GridResult<Outcome> {
        let view = self.active_settings_view()?;
        self.mutate(options, SyncOptions::view_data(), move |document| {
            document.view_mut(&view)?.delete_aggregate(&item)
        })
        .await
    }

    pub async fn add_highlight(
        &mut self,
        highlight: Highlight,
        options: MutationOptions,
    ) -> GridResult<Outcome> {
        highlight.validate()?;
        let view = self.active_settings_view()?;
        self.mutate(options, SyncOptions::view_data(), move |document| {
            document.view_mut(&view)?.add_highlight(highlight).map(|_| ())
        })
        .await
    }

    pub async fn update_highlight(
        &mut self,
        item: ItemRef,
        highlight: Highlight,
        options: MutationOptions,
    ) -> GridResult<Outcome> {
        highlight.validate()?;
        let view = self.active_settings_view()?;
        self.mutate(options, SyncOptions::view_data(), move |document| {
            document.view_mut(&view)?.update_highlight(&item, highlight)
        })
        .await
    }

    pub async fn delete_highlight(&mut self, item: ItemRef, options: MutationOptions) -> GridResult<Outcome> {
        let view = self.active_settings_view()?;
        self.mutate(options, SyncOptions::view_data(), move |document| {
            document.view_mut(&view)?.delete_highlight(&item)
        })
        .await
    }

    /// Switch a filter, aggregate or highlight on or off without deleting it
    pub async fn toggle_setting_enabled(
        &mut self,
        kind: SettingKind,
        item: ItemRef,
        enabled: bool,
        options: MutationOptions,
    ) -> GridResult<Outcome> {
        match kind {
            SettingKind::Filter => {
                self.mutate(options, SyncOptions::report_wide(), move |document| {
                    document.set_filter_enabled(&item, enabled)
                })
                .await
            }
            SettingKind::Aggregate => {
                let view = self.active_settings_view()?;
                self.mutate(options, SyncOptions::view_data(), move |document| {
                    document.view_mut(&view)?.set_aggregate_enabled(&item, enabled)
                })
                .await
            }
            SettingKind::Highlight => {
                let view = self.active_settings_view()?;
                self.mutate(options, SyncOptions::view_data(), move |document| {
                    document.view_mut(&view)?.set_highlight_enabled(&item, enabled)
                })
                .await
            }
        }
    }

    pub async fn add_control_break(
        &mut self,
        column_id: &str,
        direction: Direction,
        options: MutationOptions,
    ) -> GridResult<Outcome> {
        self.mutate_view(options, SyncOptions::view_data(), column_id, move |view, column| {
            view.add_control_break(&column, direction)
        })
        .await
    }

    pub async fn update_control_break(
        &mut self,
        column_id: &str,
        direction: Direction,
        enabled: bool,
        options: MutationOptions,
    ) -> GridResult<Outcome> {
        self.mutate_view(options, SyncOptions::view_data(), column_id, move |view, column| {
            view.update_control_break(&column, direction, enabled)
        })
        .await
    }

    pub async fn delete_control_break(&mut self, column_id: &str, options: MutationOptions) -> GridResult<Outcome> {
        self.mutate_view(options, SyncOptions::view_data(), column_id, |view, column| {
            view.delete_control_break(&column)
        })
        .await
    }

    /// Move a control break to `position` (1-based) among the view's breaks
    pub async fn move_control_break(
        &mut self,
        column_id: &str,
        position: usize,
        options: MutationOptions,
    ) -> GridResult<Outcome> {
        self.mutate_view(options, SyncOptions::view_data(), column_id, move |view, column| {
            view.move_control_break(&column, position)
        })
        .await
    }

    pub async fn set_sort(
        &mut self,
        column_id: &str,
        direction: Direction,
        nulls: Nulls,
        options: MutationOptions,
    ) -> GridResult<Outcome> {
        self.mutate_view(options, SyncOptions::view_data(), column_id, move |view, column| {
            view.set_sort(&column, direction, nulls)
        })
        .await
    }

    pub async fn clear_sort(&mut self, column_id: &str, options: MutationOptions) -> GridResult<Outcome> {
        self.mutate_view(options, SyncOptions::view_data(), column_id, |view, column| {
            view.clear_sort(&column)
        })
        .await
    }

    /// Move a sort to `position` (1-based) among the view's sorts
    pub async fn move_sort(
        &mut self,
        column_id: &str,
        position: usize,
        options: MutationOptions,
    ) -> GridResult<Outcome> {
        self.mutate_view(options, SyncOptions::view_data(), column_id, move |view, column| {
            view.move_sort(&column, position)
        })
        .await
    }

    pub async fn set_column_width(
        &mut self,
        column_id: &str,
        width: u32,
        options: MutationOptions,
    ) -> GridResult<Outcome> {
        self.mutate_view(options, SyncOptions::layout(), column_id, move |view, column| {
            view.set_column_width(&column, width)
        })
        .await
    }

    pub async fn set_column_visibility(
        &mut self,
        column_id: &str,
        visible: bool,
        options: MutationOptions,
    ) -> GridResult<Outcome> {
        self.mutate_view(options, SyncOptions::layout(), column_id, move |view, column| {
            view.set_column_visible(&column, visible)
        })
        .await
    }

    pub async fn set_column_frozen(
        &mut self,
        column_id: &str,
        frozen: bool,
        options: MutationOptions,
    ) -> GridResult<Outcome> {
        self.mutate_view(options, SyncOptions::layout(), column_id, move |view, column| {
            view.set_column_frozen(&column, frozen)
        })
        .await
    }

    /// Move a column to `position` (1-based) in display order
    pub async fn move_column(
        &mut self,
        column_id: &str,
        position: usize,
        options: MutationOptions,
    ) -> GridResult<Outcome> {
        self.mutate_view(options, SyncOptions::layout(), column_id, move |view, column| {
            view.move_column(&column, position)
        })
        .await
    }

    pub async fn set_rows_per_page(&mut self, rows: u32, options: MutationOptions) -> GridResult<Outcome> {
        if rows == 0 {
            return Err(GridError::Validation("rows per page must be positive".into()));
        }
        let sync_options = SyncOptions::relayout().queued(ROWS_PER_PAGE_QUEUE);
        self.mutate(options, sync_options, move |document| document.set_rows_per_page(rows))
            .await
    }

    pub async fn set_flashback(&mut self, flashback: Flashback, options: MutationOptions) -> GridResult<Outcome> {
        flashback.validate()?;
        self.mutate(options, SyncOptions::report_wide(), move |document| {
            document.set_flashback(flashback)
        })
        .await
    }

    /// Expanded or collapsed state of the settings summary area
    pub async fn set_report_settings_area_state(
        &mut self,
        state: AreaState,
        options: MutationOptions,
    ) -> GridResult<Outcome> {
        self.mutate(options, SyncOptions::default(), move |document| {
            document.report_settings_area_state = state;
            Ok(())
        })
        .await
    }

    /// Restore the report to its saved definition
    pub async fn reset_report(&mut self, options: MutationOptions) -> GridResult<Outcome> {
        if !self.pass_gate(options.skip_no_changes_check).await {
            return Ok(Outcome::Aborted);
        }
        let sync_options = SyncOptions::report_wide().with_refresh_data(options.refresh_data);
        let result = self.engine.reset_report(sync_options).await;
        let outcome = self.report_failure(result)?;
        info!("Report {} reset", self.engine.report_id());
        self.apply_outcome(outcome).await
    }

    /// Finish the setup flow of a view: store its settings and show it
    pub async fn complete_view_configuration(
        &mut self,
        view_id: &str,
        settings: ViewSettings,
    ) -> GridResult<Outcome> {
        self.complete_view_configuration_with(view_id, settings, false)
            .await
    }

    pub async fn complete_view_configuration_with(
        &mut self,
        view_id: &str,
        settings: ViewSettings,
        skip_check: bool,
    ) -> GridResult<Outcome> {
        self.registry.get(view_id)?;
        if !self.pass_gate(skip_check).await {
            return Ok(Outcome::Aborted);
        }
        let mut settings = settings;
        for column in settings.columns.iter_mut() {
            if column.operation.is_unchanged() {
                column.operation = Change::Inserted;
            }
        }
        let target = view_id.to_string();
        let result = self
            .engine
            .sync(
                move |document| {
                    document.views.insert(target.clone(), settings);
                    document.current_view = target;
                    Ok(())
                },
                SyncOptions::default().queued(VIEW_QUEUE),
            )
            .await;
        let outcome = match self.report_failure(result) {
            Ok(outcome) => outcome,
            Err(err) => {
                self.cancel_view_configuration();
                return Err(err);
            }
        };
        debug!("Setup of {} complete", view_id);
        let outcome = self.apply_outcome(outcome).await?;
        if let Phase::AwaitingConfiguration { view, requested } = &self.phase {
            if requested == view_id {
                self.phase = Phase::Active { view: view.clone() };
            }
        }
        Ok(outcome)
    }

    /// Distinct values of a column, for filter value pickers
    pub async fn filter_values(&self, column_id: &str, limit: u32) -> GridResult<Vec<String>> {
        let result = self.engine.filter_values(column_id, limit).await;
        self.report_failure(result)
    }

    /// Ask the server to render the active view in `format`
    pub async fn download(&self, format: DownloadFormat) -> GridResult<Value> {
        let view = self.require_active()?;
        let result = self.engine.download(&view, format).await;
        self.report_failure(result)
    }

    fn active_settings_view(&self) -> GridResult<ViewId> {
        let active = self.require_active()?;
        self.registry.settings_view(&active)
    }

    /// Column-level change on the active view's settings
    async fn mutate_view<F>(
        &mut self,
        options: MutationOptions,
        sync_options: SyncOptions,
        column_id: &str,
        change: F,
    ) -> GridResult<Outcome>
    where
        F: FnOnce(&mut ViewSettings, String) -> GridResult<()> + Send + 'static,
    {
        let view = self.active_settings_view()?;
        let column = column_id.to_string();
        self.mutate(options, sync_options, move |document| {
            change(document.view_mut(&view)?, column)
        })
        .await
    }

    /// Run `mutator` through the gate and either sync it or keep it local
    async fn mutate<F>(
        &mut self,
        options: MutationOptions,
        sync_options: SyncOptions,
        mutator: F,
    ) -> GridResult<Outcome>
    where
        F: FnOnce(&mut SettingsDocument) -> GridResult<()> + Send + 'static,
    {
        if !self.pass_gate(options.skip_no_changes_check).await {
            return Ok(Outcome::Aborted);
        }

        if !options.save {
            let document = self.engine.apply_local(mutator)?;
            self.show_local(&document)?;
            return Ok(Outcome::Local);
        }

        let sync_options = sync_options.with_refresh_data(options.refresh_data);
        let result = self.engine.sync(mutator, sync_options).await;
        let outcome = self.report_failure(result)?;
        self.apply_outcome(outcome).await
    }

    /// Reflect a local-only change in the active view
    fn show_local(&mut self, document: &SettingsDocument) -> GridResult<()> {
        let active = self.require_active()?;
        let model_view = self.registry.settings_view(&active)?;
        let settings = document.view(&model_view).cloned().unwrap_or_default();
        let slot = self.registry.slot_mut(&active)?;
        slot.descriptor.set_column_config(&settings);
        slot.descriptor.set_report_options(document);
        self.update_actions();
        self.actions.render_settings_summary(document);
        Ok(())
    }
}

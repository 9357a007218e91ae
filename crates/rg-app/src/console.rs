//! Host collaborators that log to the console instead of drawing dialogs

use async_trait::async_trait;
use parking_lot::Mutex;
use rg_core::SettingsDocument;
use rg_views::{Action, ActionHost, DialogHost};
use tracing::{debug, info, warn};

/// Answers confirmations from a fixed policy and records what it was asked
pub struct ConsoleHost {
    discard_edits: bool,
    pending_setup: Mutex<Option<String>>,
}

impl ConsoleHost {
    pub fn new(discard_edits: bool) -> Self {
        Self {
            discard_edits,
            pending_setup: Mutex::new(None),
        }
    }

    /// View whose setup flow the coordinator asked for, if any
    pub fn take_pending_setup(&self) -> Option<String> {
        self.pending_setup.lock().take()
    }
}

#[async_trait]
impl DialogHost for ConsoleHost {
    async fn confirm(&self, message: &str) -> bool {
        info!("Confirm: {} -> {}", message, if self.discard_edits { "discard" } else { "keep" });
        self.discard_edits
    }

    fn open_view_setup(&self, view_id: &str) {
        info!("Opening setup for view {}", view_id);
        *self.pending_setup.lock() = Some(view_id.to_string());
    }

    fn notify_failure(&self, message: &str) {
        warn!("{}", message);
    }
}

impl ActionHost for ConsoleHost {
    fn set_enabled(&self, action: Action, enabled: bool) {
        debug!("Action {} enabled={}", action, enabled);
    }

    fn render_settings_summary(&self, document: &SettingsDocument) {
        let filters = document.live_filters().count();
        let (aggregates, sorts) = document
            .view(&document.current_view)
            .map(|view| (view.live_aggregations().count(), view.sorts().len()))
            .unwrap_or((0, 0));
        info!(
            "Report {} [{}]: view={} filters={} aggregates={} sorts={} rows/page={}",
            document.id,
            document.name,
            document.current_view,
            filters,
            aggregates,
            sorts,
            document.rows_per_page
        );
    }
}
